//! Instruction descriptors and the 256-entry opcode table
//!
//! The table is built once by [`OpcodeTable::build`] and shared through
//! [`OpcodeTable::global`]. Reverse indices (instruction, register and
//! addressing mode to opcodes) are arrays indexed by enum ordinal and are
//! derived from the same entries at build time.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use super::registers::Register;

macro_rules! mnemonics {
    ($($variant:ident => $name:literal,)*) => {
        /// Closed set of instruction kinds matched by the execution engine
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum Mnemonic {
            $($variant,)*
        }

        impl Mnemonic {
            pub const ALL: &'static [Mnemonic] = &[$(Mnemonic::$variant,)*];
            pub const COUNT: usize = Self::ALL.len();

            /// Lowercase mnemonic
            pub fn name(self) -> &'static str {
                match self {
                    $(Mnemonic::$variant => $name,)*
                }
            }

            #[inline]
            pub fn ordinal(self) -> usize {
                self as usize
            }
        }
    };
}

mnemonics! {
    Add => "add",
    Or => "or",
    Adc => "adc",
    Sbb => "sbb",
    And => "and",
    Sub => "sub",
    Xor => "xor",
    Cmp => "cmp",
    Test => "test",
    Inc => "inc",
    Dec => "dec",
    Push => "push",
    Pop => "pop",
    Daa => "daa",
    Das => "das",
    Aaa => "aaa",
    Aas => "aas",
    Aam => "aam",
    Aad => "aad",
    Salc => "salc",
    Jo => "jo",
    Jno => "jno",
    Jb => "jb",
    Jnb => "jnb",
    Jz => "jz",
    Jnz => "jnz",
    Jbe => "jbe",
    Ja => "ja",
    Js => "js",
    Jns => "jns",
    Jp => "jp",
    Jnp => "jnp",
    Jl => "jl",
    Jge => "jge",
    Jle => "jle",
    Jg => "jg",
    Grp1 => "grp1",
    Grp2 => "grp2",
    Grp3 => "grp3",
    Grp4 => "grp4",
    Grp5 => "grp5",
    Xchg => "xchg",
    Mov => "mov",
    Lea => "lea",
    Lds => "lds",
    Les => "les",
    Nop => "nop",
    Cbw => "cbw",
    Cwd => "cwd",
    Call => "call",
    CallFar => "callf",
    Jmp => "jmp",
    JmpFar => "jmpf",
    Wait => "wait",
    Pushf => "pushf",
    Popf => "popf",
    Sahf => "sahf",
    Lahf => "lahf",
    Movsb => "movsb",
    Movsw => "movsw",
    Cmpsb => "cmpsb",
    Cmpsw => "cmpsw",
    Stosb => "stosb",
    Stosw => "stosw",
    Lodsb => "lodsb",
    Lodsw => "lodsw",
    Scasb => "scasb",
    Scasw => "scasw",
    Ret => "ret",
    Retf => "retf",
    Int3 => "int3",
    Int => "int",
    Into => "into",
    Iret => "iret",
    Xlat => "xlat",
    Loopnz => "loopnz",
    Loopz => "loopz",
    Loop => "loop",
    Jcxz => "jcxz",
    In => "in",
    Out => "out",
    Hlt => "hlt",
    Cmc => "cmc",
    Clc => "clc",
    Stc => "stc",
    Cli => "cli",
    Sti => "sti",
    Cld => "cld",
    Std => "std",
    Seg => "seg",
    Rep => "rep",
    Repne => "repne",
}

impl Mnemonic {
    /// Undocumented on the 8086
    pub fn is_unofficial(self) -> bool {
        matches!(self, Mnemonic::Salc)
    }

    /// Name of the operation selected by the ModR/M reg field for group opcodes
    pub fn group_name(self, reg: u8) -> &'static str {
        const GRP1: [&str; 8] = ["add", "or", "adc", "sbb", "and", "sub", "xor", "cmp"];
        const GRP2: [&str; 8] = ["rol", "ror", "rcl", "rcr", "shl", "shr", "shl", "sar"];
        const GRP3: [&str; 8] = ["test", "test", "not", "neg", "mul", "imul", "div", "idiv"];
        const GRP5: [&str; 8] = ["inc", "dec", "call", "callf", "jmp", "jmpf", "push", "(bad)"];
        let reg = (reg & 0x07) as usize;
        match self {
            Mnemonic::Grp1 => GRP1[reg],
            Mnemonic::Grp2 => GRP2[reg],
            Mnemonic::Grp3 => GRP3[reg],
            Mnemonic::Grp4 => ["inc", "dec"].get(reg).copied().unwrap_or("(bad)"),
            Mnemonic::Grp5 => GRP5[reg],
            other => other.name(),
        }
    }
}

/// How the operands following an opcode byte are encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressingMode {
    /// No operand bytes
    Implied,
    /// Register selected by the opcode itself (`INC CX`, `PUSH ES`)
    Register,
    /// 1 or 2 immediate bytes (`size - 1`)
    Immediate,
    /// 16-bit memory offset (`MOV AL, [1234]`)
    Direct,
    /// Signed 1 or 2 byte IP displacement (`size - 1`)
    Relative,
    /// ModR/M byte plus displacement
    ModRm,
    /// ModR/M byte, displacement, then 1 or 2 immediate bytes (`size - 2`)
    ModRmImmediate,
    /// offset:segment pair
    FarPointer,
    /// String primitive operating on DS:SI / ES:DI
    String,
    /// I/O port access
    Port,
    /// Segment override or repeat prefix
    Prefix,
}

impl AddressingMode {
    pub const COUNT: usize = 11;

    pub const ALL: [AddressingMode; Self::COUNT] = [
        AddressingMode::Implied,
        AddressingMode::Register,
        AddressingMode::Immediate,
        AddressingMode::Direct,
        AddressingMode::Relative,
        AddressingMode::ModRm,
        AddressingMode::ModRmImmediate,
        AddressingMode::FarPointer,
        AddressingMode::String,
        AddressingMode::Port,
        AddressingMode::Prefix,
    ];

    #[inline]
    pub fn ordinal(self) -> usize {
        self as usize
    }

    pub fn has_modrm(self) -> bool {
        matches!(self, AddressingMode::ModRm | AddressingMode::ModRmImmediate)
    }
}

/// Operand size of an opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Width {
    Byte,
    Word,
}

/// Decode/execute metadata for one opcode byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeEntry {
    pub opcode: u8,
    pub mnemonic: Mnemonic,
    pub mode: AddressingMode,
    pub width: Width,
    /// Base cycle count (register form, branch not taken)
    pub cycles: u32,
    /// Instruction size in bytes, not counting ModR/M displacement
    pub size: u8,
    /// Register named by the opcode itself
    pub register: Option<Register>,
}

impl OpcodeEntry {
    /// Immediate/relative bytes following the opcode (and ModR/M byte)
    pub fn operand_bytes(&self) -> u8 {
        match self.mode {
            AddressingMode::ModRmImmediate => self.size.saturating_sub(2),
            AddressingMode::ModRm => 0,
            _ => self.size.saturating_sub(1),
        }
    }

    #[inline]
    pub fn is_word(&self) -> bool {
        self.width == Width::Word
    }
}

/// One addressing-mode encoding of an instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Encoding {
    pub opcode: u8,
    pub size: u8,
    pub cycles: u32,
    pub has_modrm: bool,
}

/// Instruction descriptor: every way one mnemonic is encoded
#[derive(Debug, Clone)]
pub struct Instruction {
    pub mnemonic: Mnemonic,
    pub unofficial: bool,
    modes: [Vec<Encoding>; AddressingMode::COUNT],
    registers: [Vec<u8>; Register::COUNT],
}

impl Instruction {
    fn new(mnemonic: Mnemonic) -> Self {
        Self {
            mnemonic,
            unofficial: mnemonic.is_unofficial(),
            modes: std::array::from_fn(|_| Vec::new()),
            registers: std::array::from_fn(|_| Vec::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.mnemonic.name()
    }

    /// Encodings using `mode`
    pub fn encodings(&self, mode: AddressingMode) -> &[Encoding] {
        &self.modes[mode.ordinal()]
    }

    /// Opcodes specific to `register` (`MOV AL, imm8` is 0xB0, `MOV CL, imm8` is 0xB1)
    pub fn register_opcodes(&self, register: Register) -> &[u8] {
        &self.registers[register.ordinal()]
    }

    /// An instruction is usable iff it has at least one encoding or register variant
    pub fn is_valid(&self) -> bool {
        self.modes.iter().any(|m| !m.is_empty()) || self.registers.iter().any(|r| !r.is_empty())
    }
}

/// The immutable opcode table plus its reverse indices
#[derive(Debug)]
pub struct OpcodeTable {
    entries: [Option<OpcodeEntry>; 256],
    instructions: Vec<Instruction>,
    by_register: [Vec<u8>; Register::COUNT],
    by_mode: [Vec<u8>; AddressingMode::COUNT],
}

impl OpcodeTable {
    /// Shared table, built on first use
    pub fn global() -> &'static OpcodeTable {
        static TABLE: OnceLock<OpcodeTable> = OnceLock::new();
        TABLE.get_or_init(OpcodeTable::build)
    }

    /// Build a fresh table. Pure: every call yields the same value.
    pub fn build() -> OpcodeTable {
        let mut entries: [Option<OpcodeEntry>; 256] = [None; 256];
        let mut instructions: Vec<Instruction> =
            Mnemonic::ALL.iter().map(|&m| Instruction::new(m)).collect();
        let mut by_register: [Vec<u8>; Register::COUNT] = std::array::from_fn(|_| Vec::new());
        let mut by_mode: [Vec<u8>; AddressingMode::COUNT] = std::array::from_fn(|_| Vec::new());

        for entry in opcode_entries() {
            let slot = &mut entries[entry.opcode as usize];
            debug_assert!(slot.is_none(), "opcode {:#04X} defined twice", entry.opcode);
            *slot = Some(entry);

            let instruction = &mut instructions[entry.mnemonic.ordinal()];
            instruction.modes[entry.mode.ordinal()].push(Encoding {
                opcode: entry.opcode,
                size: entry.size,
                cycles: entry.cycles,
                has_modrm: entry.mode.has_modrm(),
            });
            if let Some(register) = entry.register {
                instruction.registers[register.ordinal()].push(entry.opcode);
                by_register[register.ordinal()].push(entry.opcode);
            }
            by_mode[entry.mode.ordinal()].push(entry.opcode);
        }

        OpcodeTable {
            entries,
            instructions,
            by_register,
            by_mode,
        }
    }

    /// Entry for an opcode byte; `None` for reserved/undefined bytes
    #[inline]
    pub fn entry(&self, opcode: u8) -> Option<&OpcodeEntry> {
        self.entries[opcode as usize].as_ref()
    }

    pub fn instruction(&self, mnemonic: Mnemonic) -> &Instruction {
        &self.instructions[mnemonic.ordinal()]
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Every opcode implementing `mnemonic`, in ascending order
    pub fn opcodes_for(&self, mnemonic: Mnemonic) -> Vec<u8> {
        let mut opcodes: Vec<u8> = self.instructions[mnemonic.ordinal()]
            .modes
            .iter()
            .flatten()
            .map(|e| e.opcode)
            .collect();
        opcodes.sort_unstable();
        opcodes
    }

    pub fn opcodes_for_register(&self, register: Register) -> &[u8] {
        &self.by_register[register.ordinal()]
    }

    pub fn opcodes_for_mode(&self, mode: AddressingMode) -> &[u8] {
        &self.by_mode[mode.ordinal()]
    }
}

macro_rules! op {
    ($opcode:literal, $m:ident, $mode:ident, $w:ident, $cycles:literal, $size:literal) => {
        OpcodeEntry {
            opcode: $opcode,
            mnemonic: Mnemonic::$m,
            mode: AddressingMode::$mode,
            width: Width::$w,
            cycles: $cycles,
            size: $size,
            register: None,
        }
    };
    ($opcode:literal, $m:ident, $mode:ident, $w:ident, $cycles:literal, $size:literal, $reg:ident) => {
        OpcodeEntry {
            opcode: $opcode,
            mnemonic: Mnemonic::$m,
            mode: AddressingMode::$mode,
            width: Width::$w,
            cycles: $cycles,
            size: $size,
            register: Some(Register::$reg),
        }
    };
}

/// 8086 opcode map. Undefined on the 8086 and left out: 0F, 60-6F, C0, C1,
/// C8, C9, D8-DF (ESC), F0 (LOCK), F1.
#[rustfmt::skip]
fn opcode_entries() -> [OpcodeEntry; 225] {
    [
        op!(0x00, Add,  ModRm,          Byte,  3, 2),
        op!(0x01, Add,  ModRm,          Word,  3, 2),
        op!(0x02, Add,  ModRm,          Byte,  3, 2),
        op!(0x03, Add,  ModRm,          Word,  3, 2),
        op!(0x04, Add,  Immediate,      Byte,  4, 2, AL),
        op!(0x05, Add,  Immediate,      Word,  4, 3, AX),
        op!(0x06, Push, Register,       Word, 10, 1, ES),
        op!(0x07, Pop,  Register,       Word,  8, 1, ES),
        op!(0x08, Or,   ModRm,          Byte,  3, 2),
        op!(0x09, Or,   ModRm,          Word,  3, 2),
        op!(0x0A, Or,   ModRm,          Byte,  3, 2),
        op!(0x0B, Or,   ModRm,          Word,  3, 2),
        op!(0x0C, Or,   Immediate,      Byte,  4, 2, AL),
        op!(0x0D, Or,   Immediate,      Word,  4, 3, AX),
        op!(0x0E, Push, Register,       Word, 10, 1, CS),
        op!(0x10, Adc,  ModRm,          Byte,  3, 2),
        op!(0x11, Adc,  ModRm,          Word,  3, 2),
        op!(0x12, Adc,  ModRm,          Byte,  3, 2),
        op!(0x13, Adc,  ModRm,          Word,  3, 2),
        op!(0x14, Adc,  Immediate,      Byte,  4, 2, AL),
        op!(0x15, Adc,  Immediate,      Word,  4, 3, AX),
        op!(0x16, Push, Register,       Word, 10, 1, SS),
        op!(0x17, Pop,  Register,       Word,  8, 1, SS),
        op!(0x18, Sbb,  ModRm,          Byte,  3, 2),
        op!(0x19, Sbb,  ModRm,          Word,  3, 2),
        op!(0x1A, Sbb,  ModRm,          Byte,  3, 2),
        op!(0x1B, Sbb,  ModRm,          Word,  3, 2),
        op!(0x1C, Sbb,  Immediate,      Byte,  4, 2, AL),
        op!(0x1D, Sbb,  Immediate,      Word,  4, 3, AX),
        op!(0x1E, Push, Register,       Word, 10, 1, DS),
        op!(0x1F, Pop,  Register,       Word,  8, 1, DS),
        op!(0x20, And,  ModRm,          Byte,  3, 2),
        op!(0x21, And,  ModRm,          Word,  3, 2),
        op!(0x22, And,  ModRm,          Byte,  3, 2),
        op!(0x23, And,  ModRm,          Word,  3, 2),
        op!(0x24, And,  Immediate,      Byte,  4, 2, AL),
        op!(0x25, And,  Immediate,      Word,  4, 3, AX),
        op!(0x26, Seg,  Prefix,         Word,  2, 1, ES),
        op!(0x27, Daa,  Implied,        Byte,  4, 1),
        op!(0x28, Sub,  ModRm,          Byte,  3, 2),
        op!(0x29, Sub,  ModRm,          Word,  3, 2),
        op!(0x2A, Sub,  ModRm,          Byte,  3, 2),
        op!(0x2B, Sub,  ModRm,          Word,  3, 2),
        op!(0x2C, Sub,  Immediate,      Byte,  4, 2, AL),
        op!(0x2D, Sub,  Immediate,      Word,  4, 3, AX),
        op!(0x2E, Seg,  Prefix,         Word,  2, 1, CS),
        op!(0x2F, Das,  Implied,        Byte,  4, 1),
        op!(0x30, Xor,  ModRm,          Byte,  3, 2),
        op!(0x31, Xor,  ModRm,          Word,  3, 2),
        op!(0x32, Xor,  ModRm,          Byte,  3, 2),
        op!(0x33, Xor,  ModRm,          Word,  3, 2),
        op!(0x34, Xor,  Immediate,      Byte,  4, 2, AL),
        op!(0x35, Xor,  Immediate,      Word,  4, 3, AX),
        op!(0x36, Seg,  Prefix,         Word,  2, 1, SS),
        op!(0x37, Aaa,  Implied,        Byte,  8, 1),
        op!(0x38, Cmp,  ModRm,          Byte,  3, 2),
        op!(0x39, Cmp,  ModRm,          Word,  3, 2),
        op!(0x3A, Cmp,  ModRm,          Byte,  3, 2),
        op!(0x3B, Cmp,  ModRm,          Word,  3, 2),
        op!(0x3C, Cmp,  Immediate,      Byte,  4, 2, AL),
        op!(0x3D, Cmp,  Immediate,      Word,  4, 3, AX),
        op!(0x3E, Seg,  Prefix,         Word,  2, 1, DS),
        op!(0x3F, Aas,  Implied,        Byte,  8, 1),
        op!(0x40, Inc,  Register,       Word,  2, 1, AX),
        op!(0x41, Inc,  Register,       Word,  2, 1, CX),
        op!(0x42, Inc,  Register,       Word,  2, 1, DX),
        op!(0x43, Inc,  Register,       Word,  2, 1, BX),
        op!(0x44, Inc,  Register,       Word,  2, 1, SP),
        op!(0x45, Inc,  Register,       Word,  2, 1, BP),
        op!(0x46, Inc,  Register,       Word,  2, 1, SI),
        op!(0x47, Inc,  Register,       Word,  2, 1, DI),
        op!(0x48, Dec,  Register,       Word,  2, 1, AX),
        op!(0x49, Dec,  Register,       Word,  2, 1, CX),
        op!(0x4A, Dec,  Register,       Word,  2, 1, DX),
        op!(0x4B, Dec,  Register,       Word,  2, 1, BX),
        op!(0x4C, Dec,  Register,       Word,  2, 1, SP),
        op!(0x4D, Dec,  Register,       Word,  2, 1, BP),
        op!(0x4E, Dec,  Register,       Word,  2, 1, SI),
        op!(0x4F, Dec,  Register,       Word,  2, 1, DI),
        op!(0x50, Push, Register,       Word, 11, 1, AX),
        op!(0x51, Push, Register,       Word, 11, 1, CX),
        op!(0x52, Push, Register,       Word, 11, 1, DX),
        op!(0x53, Push, Register,       Word, 11, 1, BX),
        op!(0x54, Push, Register,       Word, 11, 1, SP),
        op!(0x55, Push, Register,       Word, 11, 1, BP),
        op!(0x56, Push, Register,       Word, 11, 1, SI),
        op!(0x57, Push, Register,       Word, 11, 1, DI),
        op!(0x58, Pop,  Register,       Word,  8, 1, AX),
        op!(0x59, Pop,  Register,       Word,  8, 1, CX),
        op!(0x5A, Pop,  Register,       Word,  8, 1, DX),
        op!(0x5B, Pop,  Register,       Word,  8, 1, BX),
        op!(0x5C, Pop,  Register,       Word,  8, 1, SP),
        op!(0x5D, Pop,  Register,       Word,  8, 1, BP),
        op!(0x5E, Pop,  Register,       Word,  8, 1, SI),
        op!(0x5F, Pop,  Register,       Word,  8, 1, DI),
        op!(0x70, Jo,   Relative,       Byte,  4, 2),
        op!(0x71, Jno,  Relative,       Byte,  4, 2),
        op!(0x72, Jb,   Relative,       Byte,  4, 2),
        op!(0x73, Jnb,  Relative,       Byte,  4, 2),
        op!(0x74, Jz,   Relative,       Byte,  4, 2),
        op!(0x75, Jnz,  Relative,       Byte,  4, 2),
        op!(0x76, Jbe,  Relative,       Byte,  4, 2),
        op!(0x77, Ja,   Relative,       Byte,  4, 2),
        op!(0x78, Js,   Relative,       Byte,  4, 2),
        op!(0x79, Jns,  Relative,       Byte,  4, 2),
        op!(0x7A, Jp,   Relative,       Byte,  4, 2),
        op!(0x7B, Jnp,  Relative,       Byte,  4, 2),
        op!(0x7C, Jl,   Relative,       Byte,  4, 2),
        op!(0x7D, Jge,  Relative,       Byte,  4, 2),
        op!(0x7E, Jle,  Relative,       Byte,  4, 2),
        op!(0x7F, Jg,   Relative,       Byte,  4, 2),
        op!(0x80, Grp1, ModRmImmediate, Byte,  4, 3),
        op!(0x81, Grp1, ModRmImmediate, Word,  4, 4),
        op!(0x82, Grp1, ModRmImmediate, Byte,  4, 3),
        op!(0x83, Grp1, ModRmImmediate, Word,  4, 3),
        op!(0x84, Test, ModRm,          Byte,  3, 2),
        op!(0x85, Test, ModRm,          Word,  3, 2),
        op!(0x86, Xchg, ModRm,          Byte,  4, 2),
        op!(0x87, Xchg, ModRm,          Word,  4, 2),
        op!(0x88, Mov,  ModRm,          Byte,  2, 2),
        op!(0x89, Mov,  ModRm,          Word,  2, 2),
        op!(0x8A, Mov,  ModRm,          Byte,  2, 2),
        op!(0x8B, Mov,  ModRm,          Word,  2, 2),
        op!(0x8C, Mov,  ModRm,          Word,  2, 2),
        op!(0x8D, Lea,  ModRm,          Word,  2, 2),
        op!(0x8E, Mov,  ModRm,          Word,  2, 2),
        op!(0x8F, Pop,  ModRm,          Word,  8, 2),
        op!(0x90, Nop,  Implied,        Word,  3, 1),
        op!(0x91, Xchg, Register,       Word,  3, 1, CX),
        op!(0x92, Xchg, Register,       Word,  3, 1, DX),
        op!(0x93, Xchg, Register,       Word,  3, 1, BX),
        op!(0x94, Xchg, Register,       Word,  3, 1, SP),
        op!(0x95, Xchg, Register,       Word,  3, 1, BP),
        op!(0x96, Xchg, Register,       Word,  3, 1, SI),
        op!(0x97, Xchg, Register,       Word,  3, 1, DI),
        op!(0x98, Cbw,  Implied,        Byte,  2, 1),
        op!(0x99, Cwd,  Implied,        Word,  5, 1),
        op!(0x9A, CallFar, FarPointer,  Word, 28, 5),
        op!(0x9B, Wait, Implied,        Byte,  3, 1),
        op!(0x9C, Pushf, Implied,       Word, 10, 1),
        op!(0x9D, Popf, Implied,        Word,  8, 1),
        op!(0x9E, Sahf, Implied,        Byte,  4, 1),
        op!(0x9F, Lahf, Implied,        Byte,  4, 1),
        op!(0xA0, Mov,  Direct,         Byte, 10, 3, AL),
        op!(0xA1, Mov,  Direct,         Word, 10, 3, AX),
        op!(0xA2, Mov,  Direct,         Byte, 10, 3, AL),
        op!(0xA3, Mov,  Direct,         Word, 10, 3, AX),
        op!(0xA4, Movsb, String,        Byte, 18, 1),
        op!(0xA5, Movsw, String,        Word, 18, 1),
        op!(0xA6, Cmpsb, String,        Byte, 22, 1),
        op!(0xA7, Cmpsw, String,        Word, 22, 1),
        op!(0xA8, Test, Immediate,      Byte,  4, 2, AL),
        op!(0xA9, Test, Immediate,      Word,  4, 3, AX),
        op!(0xAA, Stosb, String,        Byte, 11, 1),
        op!(0xAB, Stosw, String,        Word, 11, 1),
        op!(0xAC, Lodsb, String,        Byte, 12, 1),
        op!(0xAD, Lodsw, String,        Word, 12, 1),
        op!(0xAE, Scasb, String,        Byte, 15, 1),
        op!(0xAF, Scasw, String,        Word, 15, 1),
        op!(0xB0, Mov,  Immediate,      Byte,  4, 2, AL),
        op!(0xB1, Mov,  Immediate,      Byte,  4, 2, CL),
        op!(0xB2, Mov,  Immediate,      Byte,  4, 2, DL),
        op!(0xB3, Mov,  Immediate,      Byte,  4, 2, BL),
        op!(0xB4, Mov,  Immediate,      Byte,  4, 2, AH),
        op!(0xB5, Mov,  Immediate,      Byte,  4, 2, CH),
        op!(0xB6, Mov,  Immediate,      Byte,  4, 2, DH),
        op!(0xB7, Mov,  Immediate,      Byte,  4, 2, BH),
        op!(0xB8, Mov,  Immediate,      Word,  4, 3, AX),
        op!(0xB9, Mov,  Immediate,      Word,  4, 3, CX),
        op!(0xBA, Mov,  Immediate,      Word,  4, 3, DX),
        op!(0xBB, Mov,  Immediate,      Word,  4, 3, BX),
        op!(0xBC, Mov,  Immediate,      Word,  4, 3, SP),
        op!(0xBD, Mov,  Immediate,      Word,  4, 3, BP),
        op!(0xBE, Mov,  Immediate,      Word,  4, 3, SI),
        op!(0xBF, Mov,  Immediate,      Word,  4, 3, DI),
        op!(0xC2, Ret,  Immediate,      Word, 12, 3),
        op!(0xC3, Ret,  Implied,        Word,  8, 1),
        op!(0xC4, Les,  ModRm,          Word, 16, 2),
        op!(0xC5, Lds,  ModRm,          Word, 16, 2),
        op!(0xC6, Mov,  ModRmImmediate, Byte, 10, 3),
        op!(0xC7, Mov,  ModRmImmediate, Word, 10, 4),
        op!(0xCA, Retf, Immediate,      Word, 17, 3),
        op!(0xCB, Retf, Implied,        Word, 18, 1),
        op!(0xCC, Int3, Implied,        Byte, 52, 1),
        op!(0xCD, Int,  Immediate,      Byte, 51, 2),
        op!(0xCE, Into, Implied,        Byte,  4, 1),
        op!(0xCF, Iret, Implied,        Word, 24, 1),
        op!(0xD0, Grp2, ModRm,          Byte,  2, 2),
        op!(0xD1, Grp2, ModRm,          Word,  2, 2),
        op!(0xD2, Grp2, ModRm,          Byte,  8, 2),
        op!(0xD3, Grp2, ModRm,          Word,  8, 2),
        op!(0xD4, Aam,  Immediate,      Byte, 83, 2),
        op!(0xD5, Aad,  Immediate,      Byte, 60, 2),
        op!(0xD6, Salc, Implied,        Byte,  3, 1),
        op!(0xD7, Xlat, Implied,        Byte, 11, 1),
        op!(0xE0, Loopnz, Relative,     Byte,  5, 2),
        op!(0xE1, Loopz, Relative,      Byte,  6, 2),
        op!(0xE2, Loop, Relative,       Byte,  5, 2),
        op!(0xE3, Jcxz, Relative,       Byte,  6, 2),
        op!(0xE4, In,   Port,           Byte, 10, 2, AL),
        op!(0xE5, In,   Port,           Word, 10, 2, AX),
        op!(0xE6, Out,  Port,           Byte, 10, 2, AL),
        op!(0xE7, Out,  Port,           Word, 10, 2, AX),
        op!(0xE8, Call, Relative,       Word, 19, 3),
        op!(0xE9, Jmp,  Relative,       Word, 15, 3),
        op!(0xEA, JmpFar, FarPointer,   Word, 15, 5),
        op!(0xEB, Jmp,  Relative,       Byte, 15, 2),
        op!(0xEC, In,   Port,           Byte,  8, 1, AL),
        op!(0xED, In,   Port,           Word,  8, 1, AX),
        op!(0xEE, Out,  Port,           Byte,  8, 1, AL),
        op!(0xEF, Out,  Port,           Word,  8, 1, AX),
        op!(0xF2, Repne, Prefix,        Byte,  2, 1),
        op!(0xF3, Rep,  Prefix,         Byte,  2, 1),
        op!(0xF4, Hlt,  Implied,        Byte,  2, 1),
        op!(0xF5, Cmc,  Implied,        Byte,  2, 1),
        op!(0xF6, Grp3, ModRm,          Byte,  3, 2),
        op!(0xF7, Grp3, ModRm,          Word,  3, 2),
        op!(0xF8, Clc,  Implied,        Byte,  2, 1),
        op!(0xF9, Stc,  Implied,        Byte,  2, 1),
        op!(0xFA, Cli,  Implied,        Byte,  2, 1),
        op!(0xFB, Sti,  Implied,        Byte,  2, 1),
        op!(0xFC, Cld,  Implied,        Byte,  2, 1),
        op!(0xFD, Std,  Implied,        Byte,  2, 1),
        op!(0xFE, Grp4, ModRm,          Byte,  3, 2),
        op!(0xFF, Grp5, ModRm,          Word,  3, 2),
    ]
}
