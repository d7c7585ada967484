//! 16-bit ALU operations, stack and data movement

use super::{dos_cpu, run};
use crate::cpu_8086::CpuError;

#[test]
fn test_mov_r16_imm16() {
    let mut cpu = dos_cpu(&[0xB8, 0x34, 0x12, 0xBE, 0xCD, 0xAB]); // MOV AX, 0x1234 ; MOV SI, 0xABCD
    run(&mut cpu, 2);

    assert_eq!(cpu.registers().ax(), 0x1234);
    assert_eq!(cpu.registers().si(), 0xABCD);
    assert_eq!(cpu.registers().ip(), 0x0106);
}

#[test]
fn test_add_ax_imm16_overflow() {
    let mut cpu = dos_cpu(&[0x05, 0x01, 0x00]); // ADD AX, 0x0001
    cpu.registers_mut().set_ax(0x7FFF);
    run(&mut cpu, 1);

    assert_eq!(cpu.registers().ax(), 0x8000);
    assert!(cpu.flags().overflow());
    assert!(cpu.flags().sign());
    assert!(!cpu.flags().carry());
}

#[test]
fn test_add_rm16_r16_memory() {
    let mut cpu = dos_cpu(&[0x01, 0x06, 0x00, 0x02]); // ADD [0x0200], AX
    cpu.registers_mut().set_ax(0x2222);
    cpu.memory_mut().write_segmented16(0x1000, 0x0200, 0x1111);
    run(&mut cpu, 1);

    assert_eq!(cpu.memory().read_segmented16(0x1000, 0x0200), 0x3333);
    assert_eq!(cpu.registers().ip(), 0x0104);
}

#[test]
fn test_grp1_sign_extended_imm8() {
    let mut cpu = dos_cpu(&[0x83, 0xC3, 0xFF]); // ADD BX, -1
    cpu.registers_mut().set_bx(0x0010);
    run(&mut cpu, 1);

    assert_eq!(cpu.registers().bx(), 0x000F);
    assert!(cpu.flags().carry());
}

#[test]
fn test_grp1_cmp_imm16() {
    let mut cpu = dos_cpu(&[0x81, 0xFB, 0x34, 0x12]); // CMP BX, 0x1234
    cpu.registers_mut().set_bx(0x1234);
    run(&mut cpu, 1);

    assert_eq!(cpu.registers().bx(), 0x1234);
    assert!(cpu.flags().zero());
    assert_eq!(cpu.registers().ip(), 0x0104);
}

#[test]
fn test_inc_dec_r16() {
    let mut cpu = dos_cpu(&[0x40, 0x4B]); // INC AX ; DEC BX
    cpu.registers_mut().set_ax(0xFFFF);
    cpu.registers_mut().set_bx(0x8000);
    run(&mut cpu, 1);
    assert_eq!(cpu.registers().ax(), 0x0000);
    assert!(cpu.flags().zero());
    assert!(!cpu.flags().carry());

    run(&mut cpu, 1);
    assert_eq!(cpu.registers().bx(), 0x7FFF);
    assert!(cpu.flags().overflow());
}

#[test]
fn test_push_pop_registers() {
    let mut cpu = dos_cpu(&[0x50, 0x5B]); // PUSH AX ; POP BX
    cpu.registers_mut().set_ax(0xBEEF);
    run(&mut cpu, 1);
    assert_eq!(cpu.registers().sp(), 0xFFFC);
    assert_eq!(cpu.memory().read_segmented16(0x2000, 0xFFFC), 0xBEEF);

    run(&mut cpu, 1);
    assert_eq!(cpu.registers().bx(), 0xBEEF);
    assert_eq!(cpu.registers().sp(), 0xFFFE);
}

#[test]
fn test_push_sp_stores_decremented_value() {
    let mut cpu = dos_cpu(&[0x54]); // PUSH SP
    run(&mut cpu, 1);
    assert_eq!(cpu.memory().read_segmented16(0x2000, 0xFFFC), 0xFFFC);
}

#[test]
fn test_push_pop_segments() {
    let mut cpu = dos_cpu(&[0x1E, 0x07]); // PUSH DS ; POP ES
    cpu.registers_mut().set_ds(0x1234);
    run(&mut cpu, 2);
    assert_eq!(cpu.registers().es(), 0x1234);
}

#[test]
fn test_pop_rm16() {
    let mut cpu = dos_cpu(&[0x8F, 0x06, 0x00, 0x03]); // POP [0x0300]
    cpu.push16(0x5678);
    run(&mut cpu, 1);
    assert_eq!(cpu.memory().read_segmented16(0x1000, 0x0300), 0x5678);
    assert_eq!(cpu.registers().sp(), 0xFFFE);
}

#[test]
fn test_mov_segment_registers() {
    // MOV DS, AX ; MOV BX, ES
    let mut cpu = dos_cpu(&[0x8E, 0xD8, 0x8C, 0xC3]);
    cpu.registers_mut().set_ax(0x3000);
    cpu.registers_mut().set_es(0x4000);
    run(&mut cpu, 2);

    assert_eq!(cpu.registers().ds(), 0x3000);
    assert_eq!(cpu.registers().bx(), 0x4000);
}

#[test]
fn test_mov_segment_invalid_index() {
    let mut cpu = dos_cpu(&[0x8E, 0xE0]); // reg field 4 names no segment register
    assert_eq!(cpu.step(), Err(CpuError::InvalidSegment(4)));
}

#[test]
fn test_mov_direct_offsets() {
    // MOV AX, [0x0200] ; MOV [0x0210], AL
    let mut cpu = dos_cpu(&[0xA1, 0x00, 0x02, 0xA2, 0x10, 0x02]);
    cpu.memory_mut().write_segmented16(0x1000, 0x0200, 0xA55A);
    run(&mut cpu, 2);

    assert_eq!(cpu.registers().ax(), 0xA55A);
    assert_eq!(cpu.memory().read_segmented(0x1000, 0x0210), 0x5A);
}

#[test]
fn test_mov_rm16_imm16() {
    let mut cpu = dos_cpu(&[0xC7, 0x06, 0x00, 0x02, 0xCD, 0xAB]); // MOV word [0x0200], 0xABCD
    run(&mut cpu, 1);
    assert_eq!(cpu.memory().read_segmented16(0x1000, 0x0200), 0xABCD);
    assert_eq!(cpu.registers().ip(), 0x0106);
}

#[test]
fn test_mul_r16() {
    let mut cpu = dos_cpu(&[0xF7, 0xE3]); // MUL BX
    cpu.registers_mut().set_ax(0x1000);
    cpu.registers_mut().set_bx(0x0100);
    run(&mut cpu, 1);

    assert_eq!(cpu.registers().dx(), 0x0010);
    assert_eq!(cpu.registers().ax(), 0x0000);
    assert!(cpu.flags().carry());
    assert!(cpu.flags().overflow());
}

#[test]
fn test_imul_r16() {
    let mut cpu = dos_cpu(&[0xF7, 0xEB]); // IMUL BX
    cpu.registers_mut().set_ax(0xFFFF); // -1
    cpu.registers_mut().set_bx(0x0002);
    run(&mut cpu, 1);

    assert_eq!(cpu.registers().dx(), 0xFFFF);
    assert_eq!(cpu.registers().ax(), 0xFFFE);
    assert!(!cpu.flags().carry());
}

#[test]
fn test_div_r16() {
    let mut cpu = dos_cpu(&[0xF7, 0xF3]); // DIV BX
    cpu.registers_mut().set_dx(0x0001);
    cpu.registers_mut().set_ax(0x0005);
    cpu.registers_mut().set_bx(0x0010);
    run(&mut cpu, 1);

    assert_eq!(cpu.registers().ax(), 0x1000);
    assert_eq!(cpu.registers().dx(), 0x0005);
}

#[test]
fn test_idiv_r16_overflow() {
    let mut cpu = dos_cpu(&[0xF7, 0xFB]); // IDIV BX
    cpu.registers_mut().set_dx(0xFFFF);
    cpu.registers_mut().set_ax(0x8000); // -32768
    cpu.registers_mut().set_bx(0xFFFF); // -1
    assert_eq!(cpu.step(), Err(CpuError::DivisionByZero));
}

#[test]
fn test_idiv_r16_most_negative_quotient_faults() {
    let mut cpu = dos_cpu(&[0xF7, 0xFB]); // IDIV BX
    cpu.registers_mut().set_dx(0xFFFF);
    cpu.registers_mut().set_ax(0x0000); // -65536
    cpu.registers_mut().set_bx(0x0002);
    assert_eq!(cpu.step(), Err(CpuError::DivisionByZero));
    assert_eq!(cpu.registers().ax(), 0x0000);
}

#[test]
fn test_test_rm16_imm16() {
    let mut cpu = dos_cpu(&[0xF7, 0xC1, 0x00, 0x80]); // TEST CX, 0x8000
    cpu.registers_mut().set_cx(0x8001);
    run(&mut cpu, 1);

    assert!(cpu.flags().sign());
    assert!(!cpu.flags().zero());
    assert_eq!(cpu.registers().ip(), 0x0104);
}

#[test]
fn test_not_and_shift_r16() {
    let mut cpu = dos_cpu(&[0xF7, 0xD0, 0xD1, 0xE0]); // NOT AX ; SHL AX, 1
    cpu.registers_mut().set_ax(0x7FFE);
    run(&mut cpu, 1);
    assert_eq!(cpu.registers().ax(), 0x8001);

    run(&mut cpu, 1);
    assert_eq!(cpu.registers().ax(), 0x0002);
    assert!(cpu.flags().carry());
}

#[test]
fn test_cbw_cwd() {
    let mut cpu = dos_cpu(&[0x98, 0x99]); // CBW ; CWD
    cpu.registers_mut().set_ax(0x1280);
    run(&mut cpu, 1);
    assert_eq!(cpu.registers().ax(), 0xFF80);

    run(&mut cpu, 1);
    assert_eq!(cpu.registers().dx(), 0xFFFF);
}

#[test]
fn test_xchg_ax_r16() {
    let mut cpu = dos_cpu(&[0x91]); // XCHG AX, CX
    cpu.registers_mut().set_ax(0x1111);
    cpu.registers_mut().set_cx(0x2222);
    run(&mut cpu, 1);

    assert_eq!(cpu.registers().ax(), 0x2222);
    assert_eq!(cpu.registers().cx(), 0x1111);
}

#[test]
fn test_lea() {
    let mut cpu = dos_cpu(&[0x8D, 0x40, 0x05]); // LEA AX, [BX+SI+5]
    cpu.registers_mut().set_bx(0x0100);
    cpu.registers_mut().set_si(0x0020);
    run(&mut cpu, 1);
    assert_eq!(cpu.registers().ax(), 0x0125);
}

#[test]
fn test_lea_register_form_is_invalid() {
    let mut cpu = dos_cpu(&[0x8D, 0xC0]);
    assert_eq!(cpu.step(), Err(CpuError::InvalidOperand { opcode: 0x8D }));
}

#[test]
fn test_lds_les() {
    // LDS SI, [0x0200] ; LES DI, [0x0204]
    let mut cpu = dos_cpu(&[0xC5, 0x36, 0x00, 0x02, 0xC4, 0x3E, 0x04, 0x02]);
    cpu.memory_mut()
        .load_data(0x10200, &[0x34, 0x12, 0x00, 0x30, 0x78, 0x56, 0x00, 0x40])
        .unwrap();

    run(&mut cpu, 1);
    assert_eq!(cpu.registers().si(), 0x1234);
    assert_eq!(cpu.registers().ds(), 0x3000);

    // DS now points elsewhere, so re-seed the second pointer there
    cpu.memory_mut()
        .load_data(0x30204, &[0x78, 0x56, 0x00, 0x40])
        .unwrap();
    run(&mut cpu, 1);
    assert_eq!(cpu.registers().di(), 0x5678);
    assert_eq!(cpu.registers().es(), 0x4000);
}
