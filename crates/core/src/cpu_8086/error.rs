//! Error types for the 8086 core

use thiserror::Error;

use super::opcodes::AddressingMode;

/// Errors raised while constructing memory or bulk-loading data into it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("Invalid memory size: {size} bytes (must be between {min} and {max})")]
    InvalidSize { size: usize, min: usize, max: usize },
    #[error("Address out of bounds: {addr:#07X} + {len} bytes exceeds memory size {size:#X}")]
    OutOfBounds { addr: u32, len: usize, size: usize },
}

/// Errors raised by CPU construction and instruction execution.
///
/// A failing `step()` does not roll back: registers, IP and memory keep
/// whatever side effects were applied before the failure point.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("No memory supplied to the CPU")]
    NilMemory,
    #[error("Invalid opcode {opcode:#04X} at {address:#07X}")]
    InvalidOpcode { opcode: u8, address: u32 },
    #[error("Unsupported addressing mode {mode:?} for opcode {opcode:#04X}")]
    UnsupportedAddressingMode { mode: AddressingMode, opcode: u8 },
    #[error("More than {limit} prefix bytes before the opcode at {address:#07X}")]
    PrefixLimit { address: u32, limit: u8 },
    #[error("Invalid register index: {0}")]
    InvalidRegister(u8),
    #[error("Invalid operand for opcode {opcode:#04X}")]
    InvalidOperand { opcode: u8 },
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Invalid segment register index: {0}")]
    InvalidSegment(u8),
    #[error("Stack overflow")]
    StackOverflow,
    #[error("Stack underflow")]
    StackUnderflow,
    #[error("General protection fault")]
    GeneralProtection,
    #[error("Invalid interrupt vector: {0:#X}")]
    InvalidInterruptVector(u16),
    #[error(transparent)]
    Memory(#[from] MemoryError),
}
