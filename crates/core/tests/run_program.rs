//! End-to-end runs of small real-mode programs through the public API

use retro_core::config::MachineConfig;
use retro_core::cpu_8086::{Cpu8086, CpuError, SegmentedMemory};
use retro_core::Cpu;

const STEP_LIMIT: usize = 1_000;

fn machine(program: &[u8]) -> Cpu8086<SegmentedMemory> {
    let config = MachineConfig::default();
    let mut cpu = Cpu8086::with_options(config.build_memory().unwrap(), config.options());
    let (cs, ip) = (cpu.registers().cs(), cpu.registers().ip());
    cpu.load_program(cs, ip, program).unwrap();
    cpu
}

fn run_to_halt<C: Cpu>(cpu: &mut C, halted: impl Fn(&C) -> bool) -> Result<usize, C::Error> {
    for steps in 0..STEP_LIMIT {
        if halted(cpu) {
            return Ok(steps);
        }
        cpu.step()?;
    }
    panic!("program did not halt within {} steps", STEP_LIMIT);
}

#[test]
fn sum_with_loop() {
    let mut cpu = machine(&[
        0xB9, 0x0A, 0x00, // MOV CX, 10
        0x31, 0xC0, // XOR AX, AX
        0x01, 0xC8, // ADD AX, CX
        0xE2, 0xFC, // LOOP -4
        0xA3, 0x00, 0x02, // MOV [0x0200], AX
        0xF4, // HLT
    ]);

    let steps = run_to_halt(&mut cpu, |cpu| cpu.halted()).unwrap();
    assert_eq!(steps, 2 + 10 * 2 + 2);
    assert_eq!(cpu.registers().ax(), 55);
    assert_eq!(cpu.registers().cx(), 0);
    assert_eq!(cpu.memory().read_segmented16(0x1000, 0x0200), 55);

    let dump = cpu.memory().dump(0x10200, 0x10210);
    assert_eq!(dump.len(), 1);
    assert!(dump[0].starts_with("10200: 37 00 00"), "{}", dump[0]);
}

#[test]
fn software_interrupt_round_trip() {
    let mut cpu = machine(&[
        0xB8, 0x15, 0x00, // MOV AX, 0x15
        0xCD, 0x80, // INT 80h
        0xF4, // HLT
    ]);
    // Handler at 0000:0500 doubles AX
    cpu.memory_mut().write16(0x80 * 4, 0x0500);
    cpu.memory_mut().write16(0x80 * 4 + 2, 0x0000);
    cpu.load_program(0x0000, 0x0500, &[0x01, 0xC0, 0xCF]).unwrap(); // ADD AX, AX ; IRET

    run_to_halt(&mut cpu, |cpu| cpu.halted()).unwrap();
    assert_eq!(cpu.registers().ax(), 0x2A);
    assert_eq!(cpu.registers().cs(), 0x1000);
    assert_eq!(cpu.registers().ip(), 0x0106);
    assert_eq!(cpu.registers().sp(), 0xFFFE);
    assert!(cpu.flags().interrupt_enabled());
}

#[test]
fn string_copy_with_subroutine() {
    let mut cpu = machine(&[
        0xBE, 0x00, 0x02, // MOV SI, 0x0200
        0xBF, 0x00, 0x03, // MOV DI, 0x0300
        0xB9, 0x05, 0x00, // MOV CX, 5
        0xE8, 0x01, 0x00, // CALL copy
        0xF4, // HLT
        0xFC, // copy: CLD
        0xF3, 0xA4, // REP MOVSB
        0xC3, // RET
    ]);
    cpu.memory_mut().load_data(0x10200, b"hello").unwrap();

    run_to_halt(&mut cpu, |cpu| cpu.halted()).unwrap();
    let copied: Vec<u8> = (0..5)
        .map(|i| cpu.memory().read_segmented(0x1000, 0x0300 + i))
        .collect();
    assert_eq!(copied, b"hello");
    assert_eq!(cpu.registers().sp(), 0xFFFE);
}

#[test]
fn invalid_opcode_stops_the_run() {
    let mut cpu = machine(&[0x90, 0x90, 0xD8]);
    let err = run_to_halt(&mut cpu, |cpu| cpu.halted()).unwrap_err();
    assert_eq!(
        err,
        CpuError::InvalidOpcode {
            opcode: 0xD8,
            address: 0x10102,
        }
    );
    assert_eq!(err.to_string(), "Invalid opcode 0xD8 at 0x10102");
}
