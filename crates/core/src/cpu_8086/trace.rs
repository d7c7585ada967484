//! Per-instruction trace records

use serde::Serialize;

use super::flags::Flags;
use super::opcodes::Width;
use super::registers::Registers;

/// Register file and flags at one point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegisterSnapshot {
    pub ax: u16,
    pub bx: u16,
    pub cx: u16,
    pub dx: u16,
    pub si: u16,
    pub di: u16,
    pub bp: u16,
    pub sp: u16,
    pub cs: u16,
    pub ds: u16,
    pub es: u16,
    pub ss: u16,
    pub ip: u16,
    pub flags: u16,
}

impl RegisterSnapshot {
    pub fn capture(regs: &Registers, flags: Flags) -> Self {
        Self {
            ax: regs.ax(),
            bx: regs.bx(),
            cx: regs.cx(),
            dx: regs.dx(),
            si: regs.si(),
            di: regs.di(),
            bp: regs.bp(),
            sp: regs.sp(),
            cs: regs.cs(),
            ds: regs.ds(),
            es: regs.es(),
            ss: regs.ss(),
            ip: regs.ip(),
            flags: flags.bits(),
        }
    }
}

/// A data access made by an instruction (instruction fetches excluded)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemoryAccess {
    pub address: u32,
    pub value: u16,
    pub width: Width,
    pub write: bool,
}

/// Before/after view of one executed instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceStep {
    /// CS:IP of the first byte, prefixes included
    pub cs: u16,
    pub ip: u16,
    pub opcode: u8,
    pub mnemonic: &'static str,
    /// Vector dispatched at the start of this step; `before` predates it
    pub interrupt: Option<u8>,
    pub before: RegisterSnapshot,
    pub after: RegisterSnapshot,
    pub cycles: u32,
    /// Bytes fetched from the instruction stream
    pub size: u8,
    /// Last write performed, or the first read when nothing was written
    pub memory_access: Option<MemoryAccess>,
}

/// Callback invoked synchronously after every traced step
pub type TraceCallback = Box<dyn FnMut(&TraceStep) + Send>;
