//! Instruction-level tests for the 8086 core, grouped by instruction family

use super::*;
use crate::Cpu;

mod tests_16bit;

/// CPU in the DOS layout (CS=DS=ES=0x1000, IP=0x0100) with `program` at CS:IP
pub(super) fn dos_cpu(program: &[u8]) -> Cpu8086 {
    let memory = SegmentedMemory::new(MAX_MEMORY_SIZE).unwrap();
    let mut cpu = Cpu8086::with_options(memory, vec![CpuOption::DosDefaults]);
    cpu.load_program(0x1000, 0x0100, program).unwrap();
    cpu
}

pub(super) fn run(cpu: &mut Cpu8086, steps: usize) {
    for _ in 0..steps {
        cpu.step().unwrap();
    }
}

pub(super) fn base_cycles(opcode: u8) -> u32 {
    OpcodeTable::global().entry(opcode).unwrap().cycles
}

#[test]
fn test_power_on_state() {
    let cpu = Cpu8086::new(SegmentedMemory::new(MIN_MEMORY_SIZE).unwrap());
    assert_eq!(cpu.registers().cs(), 0xFFFF);
    assert_eq!(cpu.registers().ip(), 0x0000);
    assert_eq!(cpu.registers().ax(), 0);
    assert_eq!(cpu.flags().bits(), FLAG_RESERVED);
    assert_eq!(cpu.cycles(), 0);
    assert!(!cpu.halted());
}

#[test]
fn test_builder_requires_memory() {
    let result = Cpu8086::<SegmentedMemory>::builder()
        .option(CpuOption::DosDefaults)
        .build();
    assert_eq!(result.err(), Some(CpuError::NilMemory));
}

#[test]
fn test_dos_defaults() {
    let cpu = Cpu8086::builder()
        .memory(SegmentedMemory::new(MAX_MEMORY_SIZE).unwrap())
        .option(CpuOption::DosDefaults)
        .build()
        .unwrap();
    let regs = cpu.registers();
    assert_eq!(regs.cs(), 0x1000);
    assert_eq!(regs.ds(), 0x1000);
    assert_eq!(regs.es(), 0x1000);
    assert_eq!(regs.ss(), 0x2000);
    assert_eq!(regs.sp(), 0xFFFE);
    assert_eq!(regs.ip(), 0x0100);
    assert!(cpu.flags().interrupt_enabled());
}

#[test]
fn test_bios_defaults() {
    let cpu = Cpu8086::with_options(
        SegmentedMemory::new(MAX_MEMORY_SIZE).unwrap(),
        vec![CpuOption::DosDefaults, CpuOption::BiosDefaults],
    );
    let regs = cpu.registers();
    assert_eq!(regs.cs(), 0xF000);
    assert_eq!(regs.ds(), 0);
    assert_eq!(regs.es(), 0);
    assert_eq!(regs.ss(), 0);
    assert_eq!(regs.sp(), 0x0400);
    assert_eq!(regs.ip(), 0xFFF0);
    assert!(!cpu.flags().interrupt_enabled());
}

#[test]
fn test_options_apply_in_order() {
    let memory = SegmentedMemory::new(MIN_MEMORY_SIZE).unwrap();
    let cpu = Cpu8086::with_options(
        memory,
        vec![
            CpuOption::DosDefaults,
            CpuOption::Ip(0x0200),
            CpuOption::MemorySize(0x20000),
        ],
    );
    assert_eq!(cpu.registers().ip(), 0x0200);

    let memory = SegmentedMemory::new(MIN_MEMORY_SIZE).unwrap();
    let cpu = Cpu8086::with_options(memory, vec![CpuOption::Ip(0x0200), CpuOption::DosDefaults]);
    assert_eq!(cpu.registers().ip(), 0x0100);
}

#[test]
fn test_reset_reapplies_options() {
    let mut cpu = dos_cpu(&[0xB8, 0x34, 0x12]); // MOV AX, 0x1234
    run(&mut cpu, 1);
    assert_eq!(cpu.registers().ax(), 0x1234);
    assert!(cpu.cycles() > 0);

    Cpu::reset(&mut cpu);
    assert_eq!(cpu.registers().ax(), 0);
    assert_eq!(cpu.registers().ip(), 0x0100);
    assert_eq!(cpu.cycles(), 0);
    // Memory survives a reset
    assert_eq!(cpu.memory().read_segmented(0x1000, 0x0100), 0xB8);
}

#[test]
fn test_push_pop_symmetry() {
    let mut cpu = dos_cpu(&[]);
    for val in [0x0000u16, 0x1234, 0xFFFF] {
        cpu.push16(val);
        assert_eq!(cpu.registers().sp(), 0xFFFC);
        assert_eq!(cpu.pop16(), val);
        assert_eq!(cpu.registers().sp(), 0xFFFE);
    }
}

#[test]
fn test_invalid_opcode_reports_address() {
    let mut cpu = dos_cpu(&[0x0F]);
    assert_eq!(
        cpu.step(),
        Err(CpuError::InvalidOpcode {
            opcode: 0x0F,
            address: 0x10100,
        })
    );
    // No rollback: the opcode byte was consumed
    assert_eq!(cpu.registers().ip(), 0x0101);
    assert_eq!(cpu.cycles(), 0);
}

#[test]
fn test_prefix_run_is_bounded() {
    let mut cpu = dos_cpu(&[]);
    cpu.memory_mut()
        .load_data(0x10000, &vec![0x26u8; 0x10000])
        .unwrap();

    assert_eq!(
        cpu.step(),
        Err(CpuError::PrefixLimit {
            address: 0x10100,
            limit: MAX_PREFIXES,
        })
    );
    assert_eq!(cpu.registers().ip(), 0x0100 + MAX_PREFIXES as u16 + 1);
    assert_eq!(cpu.cycles(), 0);
}

#[test]
fn test_longest_prefix_run_executes() {
    let mut program = vec![0x26u8; MAX_PREFIXES as usize];
    program.push(0x90); // NOP
    let mut cpu = dos_cpu(&program);

    let cycles = cpu.step().unwrap();
    assert_eq!(cpu.registers().ip(), 0x0100 + program.len() as u16);
    assert_eq!(
        cycles,
        base_cycles(0x26) * MAX_PREFIXES as u32 + base_cycles(0x90)
    );
}

#[test]
fn test_port_io_is_unsupported() {
    let mut cpu = dos_cpu(&[0xE4, 0x60]); // IN AL, 0x60
    assert_eq!(
        cpu.step(),
        Err(CpuError::UnsupportedAddressingMode {
            mode: AddressingMode::Port,
            opcode: 0xE4,
        })
    );
}

#[test]
fn test_out_of_bounds_memory_is_open_bus() {
    let memory = SegmentedMemory::new(MIN_MEMORY_SIZE).unwrap();
    let mut cpu = Cpu8086::with_options(memory, vec![CpuOption::Cs(0), CpuOption::Ip(0x0100)]);
    // MOV AL, [0000] ; MOV [0001], AL with DS beyond the 64 KiB image
    cpu.load_program(0, 0x0100, &[0xA0, 0x00, 0x00, 0xA2, 0x01, 0x00])
        .unwrap();
    cpu.registers_mut().set_ds(0x2000);

    run(&mut cpu, 2);
    assert_eq!(cpu.registers().al(), OPEN_BUS);
    assert_eq!(cpu.memory().read8(0x20001), OPEN_BUS);
    assert_eq!(cpu.memory().read8(0x00001), 0x00);
}

#[test]
fn test_cpu_trait_drives_step() {
    fn run_to_halt<C: Cpu>(cpu: &mut C, limit: usize) -> Result<u64, C::Error> {
        let mut total = 0u64;
        for _ in 0..limit {
            total += cpu.step()? as u64;
        }
        Ok(total)
    }

    // MOV AL, 1 ; HLT
    let mut cpu = dos_cpu(&[0xB0, 0x01, 0xF4]);
    let total = run_to_halt(&mut cpu, 5).unwrap();
    assert_eq!(total, (base_cycles(0xB0) + base_cycles(0xF4)) as u64);
    assert!(cpu.halted());
}
