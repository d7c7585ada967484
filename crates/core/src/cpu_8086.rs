//! Intel 8086/8088 real-mode CPU core
//!
//! The core is generic over a [`Memory8086`] implementation so that any
//! system (a bare test harness, a DOS loader, a PC board with mapped ROM)
//! can supply its own address space. [`SegmentedMemory`] is the owned,
//! bounds-checked default.
//!
//! Execution is table driven: `step()` fetches an opcode, looks it up in the
//! shared [`OpcodeTable`], decodes the operand bytes according to the entry's
//! [`AddressingMode`] into an [`Operand`], then dispatches on the entry's
//! [`Mnemonic`].

mod error;
mod execute;
mod flags;
mod memory;
mod modrm;
mod opcodes;
mod registers;
mod trace;

#[cfg(test)]
mod tests;

use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::logging::{log, LogCategory, LogLevel};

pub use error::{CpuError, MemoryError};
pub use execute::Operand;
pub use flags::{
    parity, Flags, FLAG_AF, FLAG_CF, FLAG_DF, FLAG_IF, FLAG_OF, FLAG_PF, FLAG_RESERVED, FLAG_SF,
    FLAG_TF, FLAG_ZF, PARITY_TABLE,
};
pub use memory::{
    calculate_address, linear_address, Memory8086, SegmentedMemory, ADDRESS_MASK,
    MAX_MEMORY_SIZE, MIN_MEMORY_SIZE, OPEN_BUS,
};
pub use modrm::{DisplacementSize, ModRm};
pub use opcodes::{
    AddressingMode, Encoding, Instruction, Mnemonic, OpcodeEntry, OpcodeTable, Width,
};
pub use registers::{Register, Registers};
pub use trace::{MemoryAccess, RegisterSnapshot, TraceCallback, TraceStep};

/// Longest run of prefix bytes accepted in front of one opcode
pub const MAX_PREFIXES: u8 = 15;

/// Construction-time settings, applied in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuOption {
    Cs(u16),
    Ds(u16),
    Es(u16),
    Ss(u16),
    Ip(u16),
    Sp(u16),
    /// COM-style layout: CS=DS=ES=0x1000, SS=0x2000, SP=0xFFFE, IP=0x0100, IF set
    DosDefaults,
    /// Reset-vector layout: CS=0xF000, DS=ES=SS=0, SP=0x0400, IP=0xFFF0, IF clear
    BiosDefaults,
    /// Consumed by the memory constructor; the CPU ignores it
    MemorySize(usize),
}

/// Repeat prefix in effect for the current instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RepeatPrefix {
    /// F3: REP, or REPE/REPZ for CMPS/SCAS
    Rep,
    /// F2: REPNE/REPNZ
    Repne,
}

/// Serializable snapshot of everything the CPU owns except memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CpuState {
    pub registers: Registers,
    pub flags: Flags,
    pub cycles: u64,
    pub halted: bool,
    pub pending_interrupt: Option<u8>,
}

/// Shared, read-mostly view of the CPU state.
///
/// The stepping thread publishes a fresh snapshot after every `step()`;
/// any number of clones may read it from other threads.
#[derive(Debug, Clone, Default)]
pub struct StateHandle(Arc<RwLock<CpuState>>);

impl StateHandle {
    /// Latest published snapshot
    pub fn get(&self) -> CpuState {
        *self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: CpuState) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = state;
    }
}

/// Intel 8086 CPU
pub struct Cpu8086<M: Memory8086 = SegmentedMemory> {
    regs: Registers,
    flags: Flags,
    memory: M,
    cycles: u64,
    halted: bool,
    pending_interrupt: Option<u8>,

    /// Set by 26/2E/36/3E, cleared at the start of every step
    segment_override: Option<Register>,
    /// Set by F2/F3, cleared at the start of every step
    repeat: Option<RepeatPrefix>,

    options: Vec<CpuOption>,
    table: &'static OpcodeTable,

    /// Instruction-stream bytes consumed by the current step
    fetched: u8,
    memory_access: Option<MemoryAccess>,
    tracer: Option<TraceCallback>,
    state_handle: Option<StateHandle>,
}

/// Fluent constructor; fails with [`CpuError::NilMemory`] if no memory was given
pub struct Cpu8086Builder<M: Memory8086> {
    memory: Option<M>,
    options: Vec<CpuOption>,
}

impl<M: Memory8086> Default for Cpu8086Builder<M> {
    fn default() -> Self {
        Self {
            memory: None,
            options: Vec::new(),
        }
    }
}

impl<M: Memory8086> Cpu8086Builder<M> {
    pub fn memory(mut self, memory: M) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn option(mut self, option: CpuOption) -> Self {
        self.options.push(option);
        self
    }

    pub fn options(mut self, options: impl IntoIterator<Item = CpuOption>) -> Self {
        self.options.extend(options);
        self
    }

    pub fn build(self) -> Result<Cpu8086<M>, CpuError> {
        let memory = self.memory.ok_or(CpuError::NilMemory)?;
        Ok(Cpu8086::with_options(memory, self.options))
    }
}

impl<M: Memory8086> Cpu8086<M> {
    /// Create a CPU in the 8086 power-on state (CS=0xFFFF, IP=0)
    pub fn new(memory: M) -> Self {
        Self::with_options(memory, Vec::new())
    }

    /// Create a CPU and apply `options` on top of the power-on state.
    ///
    /// The options are kept and re-applied by [`reset`](Self::reset).
    pub fn with_options(memory: M, options: Vec<CpuOption>) -> Self {
        let mut cpu = Self {
            regs: Registers::default(),
            flags: Flags::default(),
            memory,
            cycles: 0,
            halted: false,
            pending_interrupt: None,
            segment_override: None,
            repeat: None,
            options,
            table: OpcodeTable::global(),
            fetched: 0,
            memory_access: None,
            tracer: None,
            state_handle: None,
        };
        cpu.reset();
        cpu
    }

    pub fn builder() -> Cpu8086Builder<M> {
        Cpu8086Builder::default()
    }

    /// Return to the power-on state and re-apply the construction options.
    /// Memory is preserved.
    pub fn reset(&mut self) {
        self.regs = Registers::default();
        self.regs.set_cs(0xFFFF);
        self.flags = Flags::default();
        self.cycles = 0;
        self.halted = false;
        self.pending_interrupt = None;
        self.segment_override = None;
        self.repeat = None;
        for option in self.options.clone() {
            self.apply_option(option);
        }
        self.publish_state();
    }

    fn apply_option(&mut self, option: CpuOption) {
        match option {
            CpuOption::Cs(v) => self.regs.set_cs(v),
            CpuOption::Ds(v) => self.regs.set_ds(v),
            CpuOption::Es(v) => self.regs.set_es(v),
            CpuOption::Ss(v) => self.regs.set_ss(v),
            CpuOption::Ip(v) => self.regs.set_ip(v),
            CpuOption::Sp(v) => self.regs.set_sp(v),
            CpuOption::DosDefaults => {
                self.regs.set_cs(0x1000);
                self.regs.set_ds(0x1000);
                self.regs.set_es(0x1000);
                self.regs.set_ss(0x2000);
                self.regs.set_sp(0xFFFE);
                self.regs.set_ip(0x0100);
                self.flags.set_interrupt_enabled(true);
            }
            CpuOption::BiosDefaults => {
                self.regs.set_cs(0xF000);
                self.regs.set_ds(0);
                self.regs.set_es(0);
                self.regs.set_ss(0);
                self.regs.set_sp(0x0400);
                self.regs.set_ip(0xFFF0);
                self.flags.set_interrupt_enabled(false);
            }
            CpuOption::MemorySize(_) => {}
        }
    }

    #[inline]
    pub fn registers(&self) -> &Registers {
        &self.regs
    }

    #[inline]
    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.regs
    }

    #[inline]
    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// Replace FLAGS; undefined bits are normalized
    pub fn set_flags(&mut self, flags: Flags) {
        self.flags = Flags::from_bits(flags.bits());
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut M {
        &mut self.memory
    }

    /// Total cycles since construction or the last reset
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn halted(&self) -> bool {
        self.halted
    }

    pub fn halt(&mut self) {
        self.halted = true;
    }

    /// Leave the halted state; nothing else does
    pub fn resume(&mut self) {
        self.halted = false;
    }

    pub fn enable_interrupts(&mut self) {
        self.flags.set_interrupt_enabled(true);
    }

    pub fn disable_interrupts(&mut self) {
        self.flags.set_interrupt_enabled(false);
    }

    pub fn pending_interrupt(&self) -> Option<u8> {
        self.pending_interrupt
    }

    /// Request `vector`; the transfer happens at the start of the next step
    /// once IF is set.
    pub fn trigger_interrupt(&mut self, vector: u16) -> Result<(), CpuError> {
        let vector = u8::try_from(vector).map_err(|_| CpuError::InvalidInterruptVector(vector))?;
        self.pending_interrupt = Some(vector);
        Ok(())
    }

    /// Unmasked `segment * 16 + offset`
    pub fn calculate_address(&self, segment: u16, offset: u16) -> u32 {
        calculate_address(segment, offset)
    }

    /// Linear address of a ModR/M memory operand; 0 for register forms
    pub fn effective_address(&self, modrm: ModRm, displacement: i16, segment: Option<u16>) -> u32 {
        if modrm.is_register() {
            return 0;
        }
        let (seg, offset) = modrm.resolve(&self.regs, displacement, segment);
        linear_address(seg, offset)
    }

    pub fn push16(&mut self, val: u16) {
        let sp = self.regs.sp().wrapping_sub(2);
        self.regs.set_sp(sp);
        self.write_word(self.regs.ss(), sp, val);
    }

    pub fn pop16(&mut self) -> u16 {
        let sp = self.regs.sp();
        let val = self.read_word(self.regs.ss(), sp);
        self.regs.set_sp(sp.wrapping_add(2));
        val
    }

    /// Install a callback receiving a [`TraceStep`] after every step
    pub fn set_tracer(&mut self, tracer: TraceCallback) {
        self.tracer = Some(tracer);
    }

    pub fn clear_tracer(&mut self) {
        self.tracer = None;
    }

    pub fn tracing(&self) -> bool {
        self.tracer.is_some()
    }

    pub fn state(&self) -> CpuState {
        CpuState {
            registers: self.regs,
            flags: self.flags,
            cycles: self.cycles,
            halted: self.halted,
            pending_interrupt: self.pending_interrupt,
        }
    }

    /// Restore registers, flags, cycle count, halt and pending-interrupt state
    pub fn restore(&mut self, state: CpuState) {
        self.regs = state.registers;
        self.flags = Flags::from_bits(state.flags.bits());
        self.cycles = state.cycles;
        self.halted = state.halted;
        self.pending_interrupt = state.pending_interrupt;
        self.publish_state();
    }

    /// JSON save state (memory not included)
    pub fn save_state(&self) -> Value {
        serde_json::to_value(self.state()).unwrap_or(Value::Null)
    }

    pub fn load_state(&mut self, v: &Value) -> Result<(), serde_json::Error> {
        let state = CpuState::deserialize(v)?;
        self.restore(state);
        Ok(())
    }

    /// Handle updated after every step; created on first call
    pub fn state_handle(&mut self) -> StateHandle {
        let state = self.state();
        self.state_handle
            .get_or_insert_with(|| StateHandle(Arc::new(RwLock::new(state))))
            .clone()
    }

    fn publish_state(&self) {
        if let Some(handle) = &self.state_handle {
            handle.publish(self.state());
        }
    }

    /// Execute one instruction (prefixes included) and return the cycles it took.
    ///
    /// A halted CPU does nothing and reports 0 cycles. On error nothing is
    /// rolled back: IP stays past the bytes already fetched. The state handle
    /// is refreshed either way.
    pub fn step(&mut self) -> Result<u32, CpuError> {
        if self.halted {
            return Ok(0);
        }
        let result = self.run_step();
        self.publish_state();
        result
    }

    fn run_step(&mut self) -> Result<u32, CpuError> {
        let before = self
            .tracer
            .as_ref()
            .map(|_| RegisterSnapshot::capture(&self.regs, self.flags));
        self.memory_access = None;

        let mut interrupt = None;
        if let Some(vector) = self.pending_interrupt {
            if self.flags.interrupt_enabled() {
                self.pending_interrupt = None;
                self.handle_interrupt(vector);
                interrupt = Some(vector);
            }
        }

        let (start_cs, start_ip) = (self.regs.cs(), self.regs.ip());
        self.segment_override = None;
        self.repeat = None;
        self.fetched = 0;

        let mut cycles = 0u32;
        let (entry, operand) = loop {
            let address = linear_address(self.regs.cs(), self.regs.ip());
            let opcode = self.fetch8();
            let Some(&entry) = self.table.entry(opcode) else {
                log(LogCategory::Cpu, LogLevel::Warn, || {
                    format!(
                        "Invalid opcode {:02X} at {:04X}:{:04X}",
                        opcode,
                        self.regs.cs(),
                        self.regs.ip().wrapping_sub(1)
                    )
                });
                return Err(CpuError::InvalidOpcode { opcode, address });
            };
            cycles += entry.cycles;

            match entry.mnemonic {
                Mnemonic::Seg => self.segment_override = entry.register,
                Mnemonic::Rep => self.repeat = Some(RepeatPrefix::Rep),
                Mnemonic::Repne => self.repeat = Some(RepeatPrefix::Repne),
                _ => break (entry, self.decode_operand(&entry)?),
            }

            if self.fetched > MAX_PREFIXES {
                return Err(CpuError::PrefixLimit {
                    address: linear_address(start_cs, start_ip),
                    limit: MAX_PREFIXES,
                });
            }
        };

        cycles += self.execute(&entry, operand)?;
        self.cycles += cycles as u64;

        let mnemonic = match operand {
            Operand::ModRm { modrm, .. } | Operand::ModRmImmediate { modrm, .. } => {
                entry.mnemonic.group_name(modrm.reg)
            }
            _ => entry.mnemonic.name(),
        };
        log(LogCategory::Trace, LogLevel::Trace, || {
            format!(
                "{:04X}:{:04X} {} {}",
                start_cs,
                start_ip,
                mnemonic,
                operand.describe()
            )
        });

        if let Some(before) = before {
            let step = TraceStep {
                cs: start_cs,
                ip: start_ip,
                opcode: entry.opcode,
                mnemonic,
                interrupt,
                before,
                after: RegisterSnapshot::capture(&self.regs, self.flags),
                cycles,
                size: self.fetched,
                memory_access: self.memory_access,
            };
            if let Some(tracer) = self.tracer.as_mut() {
                tracer(&step);
            }
        }

        Ok(cycles)
    }

    /// Push FLAGS, CS, IP; clear IF and TF; vector through the IVT at 0000:0000
    fn handle_interrupt(&mut self, vector: u8) {
        log(LogCategory::Interrupts, LogLevel::Debug, || {
            format!(
                "INT {:02X} from {:04X}:{:04X}",
                vector,
                self.regs.cs(),
                self.regs.ip()
            )
        });

        self.push16(self.flags.bits());
        self.push16(self.regs.cs());
        self.push16(self.regs.ip());
        self.flags.set_interrupt_enabled(false);
        self.flags.set_trap(false);

        let ivt = vector as u32 * 4;
        let ip = self.memory.read_u16(ivt);
        let cs = self.memory.read_u16(ivt + 2);
        self.regs.set_ip(ip);
        self.regs.set_cs(cs);
    }

    fn decode_operand(&mut self, entry: &OpcodeEntry) -> Result<Operand, CpuError> {
        let operand = match entry.mode {
            AddressingMode::Implied | AddressingMode::String => Operand::None,
            AddressingMode::Register => Operand::Register(
                entry
                    .register
                    .ok_or(CpuError::InvalidOperand { opcode: entry.opcode })?,
            ),
            AddressingMode::Immediate => Operand::Immediate(match entry.operand_bytes() {
                1 => self.fetch8() as u16,
                _ => self.fetch16(),
            }),
            AddressingMode::Relative => Operand::Relative(match entry.operand_bytes() {
                1 => self.fetch8() as i8 as i16,
                _ => self.fetch16() as i16,
            }),
            AddressingMode::Direct => Operand::Direct(self.fetch16()),
            AddressingMode::ModRm => {
                let (modrm, disp) = self.fetch_modrm();
                Operand::ModRm { modrm, disp }
            }
            AddressingMode::ModRmImmediate => {
                let (modrm, disp) = self.fetch_modrm();
                let imm = match entry.operand_bytes() {
                    // 83: imm8 sign-extended to the word operand
                    1 if entry.is_word() => self.fetch8() as i8 as i16 as u16,
                    1 => self.fetch8() as u16,
                    _ => self.fetch16(),
                };
                Operand::ModRmImmediate { modrm, disp, imm }
            }
            AddressingMode::FarPointer => {
                let offset = self.fetch16();
                let segment = self.fetch16();
                Operand::FarPointer { segment, offset }
            }
            AddressingMode::Port | AddressingMode::Prefix => {
                log(LogCategory::Cpu, LogLevel::Warn, || {
                    format!(
                        "Unsupported addressing mode {:?} for opcode {:02X}",
                        entry.mode, entry.opcode
                    )
                });
                return Err(CpuError::UnsupportedAddressingMode {
                    mode: entry.mode,
                    opcode: entry.opcode,
                });
            }
        };
        Ok(operand)
    }

    /// Read the byte at CS:IP and advance IP
    #[inline]
    fn fetch8(&mut self) -> u8 {
        let ip = self.regs.ip();
        let val = self.memory.read(linear_address(self.regs.cs(), ip));
        self.regs.set_ip(ip.wrapping_add(1));
        self.fetched = self.fetched.wrapping_add(1);
        val
    }

    #[inline]
    fn fetch16(&mut self) -> u16 {
        let lo = self.fetch8() as u16;
        let hi = self.fetch8() as u16;
        (hi << 8) | lo
    }

    fn fetch_modrm(&mut self) -> (ModRm, i16) {
        let modrm = ModRm::from_byte(self.fetch8());
        let disp = match modrm.displacement_size() {
            DisplacementSize::None => 0,
            DisplacementSize::Byte => self.fetch8() as i8 as i16,
            DisplacementSize::Word => self.fetch16() as i16,
        };
        (modrm, disp)
    }

    fn record_access(&mut self, address: u32, value: u16, width: Width, write: bool) {
        if self.tracer.is_none() {
            return;
        }
        if write || self.memory_access.is_none() {
            self.memory_access = Some(MemoryAccess {
                address,
                value,
                width,
                write,
            });
        }
    }

    fn read_byte(&mut self, segment: u16, offset: u16) -> u8 {
        let address = linear_address(segment, offset);
        let val = self.memory.read(address);
        self.record_access(address, val as u16, Width::Byte, false);
        val
    }

    fn write_byte(&mut self, segment: u16, offset: u16, val: u8) {
        let address = linear_address(segment, offset);
        self.memory.write(address, val);
        self.record_access(address, val as u16, Width::Byte, true);
    }

    /// Word access; the high byte wraps within the segment
    fn read_word(&mut self, segment: u16, offset: u16) -> u16 {
        let lo = self.memory.read(linear_address(segment, offset)) as u16;
        let hi = self.memory.read(linear_address(segment, offset.wrapping_add(1))) as u16;
        let val = (hi << 8) | lo;
        self.record_access(linear_address(segment, offset), val, Width::Word, false);
        val
    }

    fn write_word(&mut self, segment: u16, offset: u16, val: u16) {
        self.memory
            .write(linear_address(segment, offset), (val & 0xFF) as u8);
        self.memory
            .write(linear_address(segment, offset.wrapping_add(1)), (val >> 8) as u8);
        self.record_access(linear_address(segment, offset), val, Width::Word, true);
    }
}

impl Cpu8086<SegmentedMemory> {
    /// Copy `bytes` to `segment:offset`
    pub fn load_program(&mut self, segment: u16, offset: u16, bytes: &[u8]) -> Result<(), CpuError> {
        self.memory
            .load_data(linear_address(segment, offset), bytes)
            .map_err(CpuError::from)
    }
}

impl<M: Memory8086> crate::Cpu for Cpu8086<M> {
    type Error = CpuError;

    fn reset(&mut self) {
        Cpu8086::reset(self);
    }

    fn step(&mut self) -> Result<u32, CpuError> {
        Cpu8086::step(self)
    }
}
