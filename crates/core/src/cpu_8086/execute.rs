//! Instruction semantics, one handler per instruction family
//!
//! Every handler returns the cycles it adds on top of the table's base count
//! (taken branches, repeated string iterations, multiply/divide, shifts by CL).

use super::flags::Flags;
use super::memory::Memory8086;
use super::modrm::ModRm;
use super::opcodes::{Mnemonic, OpcodeEntry, Width};
use super::registers::Register;
use super::{Cpu8086, CpuError, RepeatPrefix};

/// Operand bytes of one instruction, decoded according to its addressing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    None,
    /// Register named by the opcode
    Register(Register),
    /// imm8 zero-extended, or imm16
    Immediate(u16),
    /// Sign-extended IP displacement
    Relative(i16),
    /// Memory offset in the data segment
    Direct(u16),
    ModRm { modrm: ModRm, disp: i16 },
    /// imm8 is already sign-extended for word-width 83
    ModRmImmediate { modrm: ModRm, disp: i16, imm: u16 },
    FarPointer { segment: u16, offset: u16 },
}

impl Operand {
    /// Short operand text for trace logging, e.g. `[bp+si]+4` or `ax`
    pub fn describe(&self) -> String {
        match *self {
            Operand::None => String::new(),
            Operand::Register(reg) => reg.name().to_string(),
            Operand::Immediate(imm) => format!("{:#X}", imm),
            Operand::Relative(rel) => format!("{:+}", rel),
            Operand::Direct(offset) => format!("[{:04X}]", offset),
            Operand::ModRm { modrm, disp } => modrm_text(modrm, disp),
            Operand::ModRmImmediate { modrm, disp, imm } => {
                format!("{}, {:#X}", modrm_text(modrm, disp), imm)
            }
            Operand::FarPointer { segment, offset } => format!("{:04X}:{:04X}", segment, offset),
        }
    }
}

fn modrm_text(modrm: ModRm, disp: i16) -> String {
    match (modrm.mode, modrm.rm) {
        (0b11, rm) => format!("r{}", rm),
        (0b00, 0b110) => format!("[{:04X}]", disp as u16),
        _ if disp != 0 => format!("{}{:+}", modrm.base_name(), disp),
        _ => modrm.base_name().to_string(),
    }
}

/// A ModR/M operand resolved once, so read-modify-write does not re-decode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Location {
    Register(Register),
    Memory { segment: u16, offset: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Location(Location),
    Immediate(u16),
}

const BRANCH_TAKEN: u32 = 12;

fn alu_op(mnemonic: Mnemonic) -> u8 {
    match mnemonic {
        Mnemonic::Add => 0,
        Mnemonic::Or => 1,
        Mnemonic::Adc => 2,
        Mnemonic::Sbb => 3,
        Mnemonic::And => 4,
        Mnemonic::Sub => 5,
        Mnemonic::Xor => 6,
        _ => 7,
    }
}

fn register_for(index: u8, width: Width) -> Result<Register, CpuError> {
    match width {
        Width::Byte => Register::reg8(index),
        Width::Word => Register::reg16(index),
    }
}

fn accumulator(width: Width) -> Register {
    match width {
        Width::Byte => Register::AL,
        Width::Word => Register::AX,
    }
}

impl<M: Memory8086> Cpu8086<M> {
    pub(super) fn execute(&mut self, entry: &OpcodeEntry, operand: Operand) -> Result<u32, CpuError> {
        let opcode = entry.opcode;
        let width = entry.width;
        let bad_operand = CpuError::InvalidOperand { opcode };

        match entry.mnemonic {
            m @ (Mnemonic::Add
            | Mnemonic::Or
            | Mnemonic::Adc
            | Mnemonic::Sbb
            | Mnemonic::And
            | Mnemonic::Sub
            | Mnemonic::Xor
            | Mnemonic::Cmp) => {
                let (dst, src) = self.binary_operands(entry, operand)?;
                let src = self.read_source(src, width);
                self.alu_into(alu_op(m), dst, src, width);
                Ok(0)
            }
            Mnemonic::Test => {
                let (dst, src) = self.binary_operands(entry, operand)?;
                let a = self.load(dst, width);
                let b = self.read_source(src, width);
                self.test(a, b, width);
                Ok(0)
            }
            Mnemonic::Grp1 => {
                let Operand::ModRmImmediate { modrm, disp, imm } = operand else {
                    return Err(bad_operand);
                };
                let dst = self.location(modrm, disp, width)?;
                self.alu_into(modrm.reg, dst, imm, width);
                Ok(0)
            }
            Mnemonic::Inc | Mnemonic::Dec => {
                let Operand::Register(reg) = operand else {
                    return Err(bad_operand);
                };
                let loc = Location::Register(reg);
                self.inc_dec(loc, width, entry.mnemonic == Mnemonic::Dec);
                Ok(0)
            }
            Mnemonic::Push => {
                let Operand::Register(reg) = operand else {
                    return Err(bad_operand);
                };
                self.push_location(Location::Register(reg));
                Ok(0)
            }
            Mnemonic::Pop => {
                let dst = match operand {
                    Operand::Register(reg) => Location::Register(reg),
                    Operand::ModRm { modrm, disp } => self.location(modrm, disp, Width::Word)?,
                    _ => return Err(bad_operand),
                };
                let val = self.pop16();
                self.store(dst, Width::Word, val);
                Ok(0)
            }
            Mnemonic::Xchg => {
                let (a, b) = match operand {
                    Operand::Register(reg) => (Location::Register(Register::AX), Location::Register(reg)),
                    Operand::ModRm { modrm, disp } => (
                        self.location(modrm, disp, width)?,
                        Location::Register(register_for(modrm.reg, width)?),
                    ),
                    _ => return Err(bad_operand),
                };
                let va = self.load(a, width);
                let vb = self.load(b, width);
                self.store(a, width, vb);
                self.store(b, width, va);
                Ok(0)
            }
            Mnemonic::Mov => self.mov(entry, operand).map(|_| 0),
            Mnemonic::Lea => {
                let Operand::ModRm { modrm, disp } = operand else {
                    return Err(bad_operand);
                };
                if modrm.is_register() {
                    return Err(bad_operand);
                }
                let offset = modrm.offset(&self.regs, disp);
                self.regs.set16(Register::reg16(modrm.reg)?, offset);
                Ok(0)
            }
            Mnemonic::Lds | Mnemonic::Les => {
                let Operand::ModRm { modrm, disp } = operand else {
                    return Err(bad_operand);
                };
                let Location::Memory { segment, offset } = self.location(modrm, disp, Width::Word)? else {
                    return Err(bad_operand);
                };
                let (new_offset, new_segment) = self.read_far_pointer(segment, offset);
                self.regs.set16(Register::reg16(modrm.reg)?, new_offset);
                if entry.mnemonic == Mnemonic::Lds {
                    self.regs.set_ds(new_segment);
                } else {
                    self.regs.set_es(new_segment);
                }
                Ok(0)
            }
            Mnemonic::Cbw => {
                let al = self.regs.al() as i8;
                self.regs.set_ax(al as i16 as u16);
                Ok(0)
            }
            Mnemonic::Cwd => {
                let dx = if self.regs.ax() & 0x8000 != 0 { 0xFFFF } else { 0 };
                self.regs.set_dx(dx);
                Ok(0)
            }

            Mnemonic::Jo
            | Mnemonic::Jno
            | Mnemonic::Jb
            | Mnemonic::Jnb
            | Mnemonic::Jz
            | Mnemonic::Jnz
            | Mnemonic::Jbe
            | Mnemonic::Ja
            | Mnemonic::Js
            | Mnemonic::Jns
            | Mnemonic::Jp
            | Mnemonic::Jnp
            | Mnemonic::Jl
            | Mnemonic::Jge
            | Mnemonic::Jle
            | Mnemonic::Jg => {
                let Operand::Relative(rel) = operand else {
                    return Err(bad_operand);
                };
                Ok(self.branch_if(self.flags.condition(opcode), rel))
            }
            Mnemonic::Jmp => {
                let Operand::Relative(rel) = operand else {
                    return Err(bad_operand);
                };
                self.jump_relative(rel);
                Ok(0)
            }
            Mnemonic::JmpFar => {
                let Operand::FarPointer { segment, offset } = operand else {
                    return Err(bad_operand);
                };
                self.regs.set_cs(segment);
                self.regs.set_ip(offset);
                Ok(0)
            }
            Mnemonic::Call => {
                let Operand::Relative(rel) = operand else {
                    return Err(bad_operand);
                };
                self.push16(self.regs.ip());
                self.jump_relative(rel);
                Ok(0)
            }
            Mnemonic::CallFar => {
                let Operand::FarPointer { segment, offset } = operand else {
                    return Err(bad_operand);
                };
                self.call_far(segment, offset);
                Ok(0)
            }
            Mnemonic::Ret | Mnemonic::Retf => {
                let ip = self.pop16();
                self.regs.set_ip(ip);
                if entry.mnemonic == Mnemonic::Retf {
                    let cs = self.pop16();
                    self.regs.set_cs(cs);
                }
                if let Operand::Immediate(release) = operand {
                    self.regs.set_sp(self.regs.sp().wrapping_add(release));
                }
                Ok(0)
            }
            Mnemonic::Loop | Mnemonic::Loopz | Mnemonic::Loopnz | Mnemonic::Jcxz => {
                let Operand::Relative(rel) = operand else {
                    return Err(bad_operand);
                };
                Ok(self.loop_branch(entry.mnemonic, rel))
            }

            Mnemonic::Int3 => {
                self.pending_interrupt = Some(3);
                Ok(0)
            }
            Mnemonic::Int => {
                let Operand::Immediate(vector) = operand else {
                    return Err(bad_operand);
                };
                self.pending_interrupt = Some(vector as u8);
                Ok(0)
            }
            Mnemonic::Into => {
                if self.flags.overflow() {
                    self.pending_interrupt = Some(4);
                    Ok(49)
                } else {
                    Ok(0)
                }
            }
            Mnemonic::Iret => {
                let ip = self.pop16();
                let cs = self.pop16();
                let flags = self.pop16();
                self.regs.set_ip(ip);
                self.regs.set_cs(cs);
                self.flags = Flags::from_bits(flags);
                Ok(0)
            }

            Mnemonic::Daa | Mnemonic::Das => {
                self.decimal_adjust(entry.mnemonic == Mnemonic::Das);
                Ok(0)
            }
            Mnemonic::Aaa | Mnemonic::Aas => {
                self.ascii_adjust(entry.mnemonic == Mnemonic::Aas);
                Ok(0)
            }
            Mnemonic::Aam => {
                let Operand::Immediate(base) = operand else {
                    return Err(bad_operand);
                };
                let base = base as u8;
                if base == 0 {
                    return Err(CpuError::DivisionByZero);
                }
                let al = self.regs.al();
                self.regs.set_ah(al / base);
                self.regs.set_al(al % base);
                self.flags.set_szp8(al % base);
                Ok(0)
            }
            Mnemonic::Aad => {
                let Operand::Immediate(base) = operand else {
                    return Err(bad_operand);
                };
                let al = self
                    .regs
                    .al()
                    .wrapping_add(self.regs.ah().wrapping_mul(base as u8));
                self.regs.set_ax(al as u16);
                self.flags.set_szp8(al);
                Ok(0)
            }
            Mnemonic::Salc => {
                self.regs.set_al(if self.flags.carry() { 0xFF } else { 0x00 });
                Ok(0)
            }
            Mnemonic::Xlat => {
                let offset = self.regs.bx().wrapping_add(self.regs.al() as u16);
                let val = self.read_byte(self.data_segment(), offset);
                self.regs.set_al(val);
                Ok(0)
            }

            Mnemonic::Grp2 => {
                let Operand::ModRm { modrm, disp } = operand else {
                    return Err(bad_operand);
                };
                let by_cl = opcode & 0x02 != 0;
                let count = if by_cl { self.regs.cl() } else { 1 };
                let loc = self.location(modrm, disp, width)?;
                let val = self.load(loc, width);
                let result = self.shift_rotate(val, modrm.reg, count, width);
                self.store(loc, width, result);
                Ok(if by_cl { 4 * count as u32 } else { 0 })
            }
            Mnemonic::Grp3 => {
                let Operand::ModRm { modrm, disp } = operand else {
                    return Err(bad_operand);
                };
                self.group3(modrm, disp, width)
            }
            Mnemonic::Grp4 => {
                let Operand::ModRm { modrm, disp } = operand else {
                    return Err(bad_operand);
                };
                if modrm.reg > 1 {
                    return Err(bad_operand);
                }
                let loc = self.location(modrm, disp, width)?;
                self.inc_dec(loc, width, modrm.reg == 1);
                Ok(0)
            }
            Mnemonic::Grp5 => {
                let Operand::ModRm { modrm, disp } = operand else {
                    return Err(bad_operand);
                };
                self.group5(opcode, modrm, disp)
            }

            Mnemonic::Movsb
            | Mnemonic::Movsw
            | Mnemonic::Cmpsb
            | Mnemonic::Cmpsw
            | Mnemonic::Stosb
            | Mnemonic::Stosw
            | Mnemonic::Lodsb
            | Mnemonic::Lodsw
            | Mnemonic::Scasb
            | Mnemonic::Scasw => Ok(self.string(entry.mnemonic, width)),

            Mnemonic::Pushf => {
                self.push16(self.flags.bits());
                Ok(0)
            }
            Mnemonic::Popf => {
                let flags = self.pop16();
                self.flags = Flags::from_bits(flags);
                Ok(0)
            }
            Mnemonic::Sahf => {
                self.flags.set_low_byte(self.regs.ah());
                Ok(0)
            }
            Mnemonic::Lahf => {
                self.regs.set_ah(self.flags.low_byte());
                Ok(0)
            }
            Mnemonic::Hlt => {
                self.halt();
                Ok(0)
            }
            Mnemonic::Nop | Mnemonic::Wait => Ok(0),
            Mnemonic::Cmc => {
                self.flags.set_carry(!self.flags.carry());
                Ok(0)
            }
            Mnemonic::Clc => {
                self.flags.set_carry(false);
                Ok(0)
            }
            Mnemonic::Stc => {
                self.flags.set_carry(true);
                Ok(0)
            }
            Mnemonic::Cli => {
                self.flags.set_interrupt_enabled(false);
                Ok(0)
            }
            Mnemonic::Sti => {
                self.flags.set_interrupt_enabled(true);
                Ok(0)
            }
            Mnemonic::Cld => {
                self.flags.set_direction(false);
                Ok(0)
            }
            Mnemonic::Std => {
                self.flags.set_direction(true);
                Ok(0)
            }

            Mnemonic::In | Mnemonic::Out => Err(CpuError::UnsupportedAddressingMode {
                mode: entry.mode,
                opcode,
            }),
            // Prefixes never reach dispatch
            Mnemonic::Seg | Mnemonic::Rep | Mnemonic::Repne => Err(bad_operand),
        }
    }

    /// Value of the segment-override register, if a prefix was seen
    fn override_segment(&self) -> Option<u16> {
        self.segment_override.map(|reg| self.regs.get16(reg))
    }

    /// DS unless overridden
    fn data_segment(&self) -> u16 {
        self.override_segment().unwrap_or(self.regs.ds())
    }

    fn location(&self, modrm: ModRm, disp: i16, width: Width) -> Result<Location, CpuError> {
        if modrm.is_register() {
            return Ok(Location::Register(register_for(modrm.rm, width)?));
        }
        let (segment, offset) = modrm.resolve(&self.regs, disp, self.override_segment());
        Ok(Location::Memory { segment, offset })
    }

    fn load(&mut self, loc: Location, width: Width) -> u16 {
        match (loc, width) {
            (Location::Register(reg), Width::Byte) => self.regs.get8(reg) as u16,
            (Location::Register(reg), Width::Word) => self.regs.get16(reg),
            (Location::Memory { segment, offset }, Width::Byte) => self.read_byte(segment, offset) as u16,
            (Location::Memory { segment, offset }, Width::Word) => self.read_word(segment, offset),
        }
    }

    fn store(&mut self, loc: Location, width: Width, val: u16) {
        match (loc, width) {
            (Location::Register(reg), Width::Byte) => self.regs.set8(reg, val as u8),
            (Location::Register(reg), Width::Word) => self.regs.set16(reg, val),
            (Location::Memory { segment, offset }, Width::Byte) => {
                self.write_byte(segment, offset, val as u8)
            }
            (Location::Memory { segment, offset }, Width::Word) => {
                self.write_word(segment, offset, val)
            }
        }
    }

    /// Destination and source of a two-operand ALU/TEST/MOV encoding.
    ///
    /// ModR/M forms use bit 1 of the opcode as the direction bit (set: the
    /// reg field is the destination); immediate forms target the accumulator.
    fn binary_operands(&self, entry: &OpcodeEntry, operand: Operand) -> Result<(Location, Source), CpuError> {
        let bad_operand = CpuError::InvalidOperand {
            opcode: entry.opcode,
        };
        match operand {
            Operand::ModRm { modrm, disp } => {
                let rm = self.location(modrm, disp, entry.width)?;
                let reg = Location::Register(register_for(modrm.reg, entry.width)?);
                if entry.opcode & 0x02 != 0 {
                    Ok((reg, Source::Location(rm)))
                } else {
                    Ok((rm, Source::Location(reg)))
                }
            }
            Operand::Immediate(imm) => {
                let dst = entry.register.ok_or(bad_operand)?;
                Ok((Location::Register(dst), Source::Immediate(imm)))
            }
            _ => Err(bad_operand),
        }
    }

    fn read_source(&mut self, src: Source, width: Width) -> u16 {
        match src {
            Source::Location(loc) => self.load(loc, width),
            Source::Immediate(imm) => imm,
        }
    }

    fn alu(&mut self, op: u8, a: u16, b: u16, width: Width) -> u16 {
        let f = &mut self.flags;
        match width {
            Width::Byte => {
                let (a, b) = (a as u8, b as u8);
                (match op & 0x07 {
                    0 => f.add8(a, b),
                    1 => f.or8(a, b),
                    2 => f.adc8(a, b),
                    3 => f.sbb8(a, b),
                    4 => f.and8(a, b),
                    6 => f.xor8(a, b),
                    _ => f.sub8(a, b),
                }) as u16
            }
            Width::Word => match op & 0x07 {
                0 => f.add16(a, b),
                1 => f.or16(a, b),
                2 => f.adc16(a, b),
                3 => f.sbb16(a, b),
                4 => f.and16(a, b),
                6 => f.xor16(a, b),
                _ => f.sub16(a, b),
            },
        }
    }

    /// Apply ALU op `op` (ModR/M reg-field numbering) to `dst`; CMP (7) only sets flags
    fn alu_into(&mut self, op: u8, dst: Location, src: u16, width: Width) {
        let a = self.load(dst, width);
        let result = self.alu(op, a, src, width);
        if op & 0x07 != 7 {
            self.store(dst, width, result);
        }
    }

    fn test(&mut self, a: u16, b: u16, width: Width) {
        match width {
            Width::Byte => {
                self.flags.and8(a as u8, b as u8);
            }
            Width::Word => {
                self.flags.and16(a, b);
            }
        }
    }

    fn inc_dec(&mut self, loc: Location, width: Width, dec: bool) {
        let val = self.load(loc, width);
        let result = match (width, dec) {
            (Width::Byte, false) => self.flags.inc8(val as u8) as u16,
            (Width::Byte, true) => self.flags.dec8(val as u8) as u16,
            (Width::Word, false) => self.flags.inc16(val),
            (Width::Word, true) => self.flags.dec16(val),
        };
        self.store(loc, width, result);
    }

    /// PUSH SP stores the already-decremented value on the 8086
    fn push_location(&mut self, loc: Location) {
        let val = match loc {
            Location::Register(Register::SP) => self.regs.sp().wrapping_sub(2),
            _ => self.load(loc, Width::Word),
        };
        self.push16(val);
    }

    fn mov(&mut self, entry: &OpcodeEntry, operand: Operand) -> Result<(), CpuError> {
        let width = entry.width;
        let bad_operand = CpuError::InvalidOperand {
            opcode: entry.opcode,
        };
        match (entry.opcode, operand) {
            (0x8C, Operand::ModRm { modrm, disp }) => {
                let seg = Register::segment(modrm.reg)?;
                let dst = self.location(modrm, disp, Width::Word)?;
                self.store(dst, Width::Word, self.regs.get16(seg));
            }
            (0x8E, Operand::ModRm { modrm, disp }) => {
                let seg = Register::segment(modrm.reg)?;
                let src = self.location(modrm, disp, Width::Word)?;
                let val = self.load(src, Width::Word);
                self.regs.set16(seg, val);
            }
            (_, Operand::ModRm { .. }) => {
                let (dst, src) = self.binary_operands(entry, operand)?;
                let val = self.read_source(src, width);
                self.store(dst, width, val);
            }
            (_, Operand::Direct(offset)) => {
                let reg = Location::Register(entry.register.ok_or(bad_operand)?);
                let mem = Location::Memory {
                    segment: self.data_segment(),
                    offset,
                };
                // A0/A1 load the accumulator, A2/A3 store it
                let (dst, src) = if entry.opcode & 0x02 == 0 { (reg, mem) } else { (mem, reg) };
                let val = self.load(src, width);
                self.store(dst, width, val);
            }
            (_, Operand::Immediate(imm)) => {
                let reg = entry.register.ok_or(bad_operand)?;
                self.store(Location::Register(reg), width, imm);
            }
            (_, Operand::ModRmImmediate { modrm, disp, imm }) => {
                let dst = self.location(modrm, disp, width)?;
                self.store(dst, width, imm);
            }
            _ => return Err(bad_operand),
        }
        Ok(())
    }

    /// offset, segment pair stored little-endian at `segment:offset`
    fn read_far_pointer(&mut self, segment: u16, offset: u16) -> (u16, u16) {
        let new_offset = self.read_word(segment, offset);
        let new_segment = self.read_word(segment, offset.wrapping_add(2));
        (new_offset, new_segment)
    }

    fn call_far(&mut self, segment: u16, offset: u16) {
        self.push16(self.regs.cs());
        self.push16(self.regs.ip());
        self.regs.set_cs(segment);
        self.regs.set_ip(offset);
    }

    #[inline]
    fn jump_relative(&mut self, rel: i16) {
        self.regs.set_ip(self.regs.ip().wrapping_add(rel as u16));
    }

    fn branch_if(&mut self, taken: bool, rel: i16) -> u32 {
        if taken {
            self.jump_relative(rel);
            BRANCH_TAKEN
        } else {
            0
        }
    }

    /// LOOP/LOOPZ/LOOPNZ decrement CX first; JCXZ only tests it
    fn loop_branch(&mut self, mnemonic: Mnemonic, rel: i16) -> u32 {
        if mnemonic == Mnemonic::Jcxz {
            return self.branch_if(self.regs.cx() == 0, rel);
        }
        let cx = self.regs.cx().wrapping_sub(1);
        self.regs.set_cx(cx);
        let taken = match mnemonic {
            Mnemonic::Loopz => cx != 0 && self.flags.zero(),
            Mnemonic::Loopnz => cx != 0 && !self.flags.zero(),
            _ => cx != 0,
        };
        let extra = self.branch_if(taken, rel);
        if mnemonic == Mnemonic::Loopnz && extra > 0 {
            extra + 2
        } else {
            extra
        }
    }

    /// DAA/DAS on AL
    fn decimal_adjust(&mut self, subtract: bool) {
        let old_al = self.regs.al();
        let old_cf = self.flags.carry();
        let mut al = old_al;

        if (al & 0x0F) > 9 || self.flags.aux_carry() {
            al = if subtract { al.wrapping_sub(6) } else { al.wrapping_add(6) };
            self.flags.set_aux_carry(true);
        } else {
            self.flags.set_aux_carry(false);
        }

        if old_al > 0x99 || old_cf {
            al = if subtract { al.wrapping_sub(0x60) } else { al.wrapping_add(0x60) };
            self.flags.set_carry(true);
        } else {
            self.flags.set_carry(false);
        }

        self.regs.set_al(al);
        self.flags.set_szp8(al);
    }

    /// AAA/AAS: AL adjusted without carrying into AH, AH stepped by one
    fn ascii_adjust(&mut self, subtract: bool) {
        let mut al = self.regs.al();
        let mut ah = self.regs.ah();
        let adjust = (al & 0x0F) > 9 || self.flags.aux_carry();
        if adjust {
            if subtract {
                al = al.wrapping_sub(6);
                ah = ah.wrapping_sub(1);
            } else {
                al = al.wrapping_add(6);
                ah = ah.wrapping_add(1);
            }
        }
        self.flags.set_aux_carry(adjust);
        self.flags.set_carry(adjust);
        self.regs.set_al(al & 0x0F);
        self.regs.set_ah(ah);
    }

    fn set_szp(&mut self, val: u16, width: Width) {
        match width {
            Width::Byte => self.flags.set_szp8(val as u8),
            Width::Word => self.flags.set_szp16(val),
        }
    }

    /// ROL ROR RCL RCR SHL SHR SAR selected by the ModR/M reg field (6 aliases SHL).
    ///
    /// The count is not masked; OF is only defined for single-bit operations.
    fn shift_rotate(&mut self, val: u16, op: u8, count: u8, width: Width) -> u16 {
        if count == 0 {
            return val;
        }

        let (mask, msb) = match width {
            Width::Byte => (0x00FFu16, 0x0080u16),
            Width::Word => (0xFFFF, 0x8000),
        };
        let mut result = val & mask;

        match op & 0x07 {
            // ROL
            0b000 => {
                for _ in 0..count {
                    let carry_out = result & msb != 0;
                    result = ((result << 1) | carry_out as u16) & mask;
                    self.flags.set_carry(carry_out);
                }
                if count == 1 {
                    self.flags
                        .set_overflow((result & msb != 0) != self.flags.carry());
                }
            }
            // ROR
            0b001 => {
                for _ in 0..count {
                    let carry_out = result & 1 != 0;
                    result = (result >> 1) | if carry_out { msb } else { 0 };
                    self.flags.set_carry(carry_out);
                }
                if count == 1 {
                    self.flags
                        .set_overflow((result & msb != 0) != (result & (msb >> 1) != 0));
                }
            }
            // RCL
            0b010 => {
                for _ in 0..count {
                    let carry_in = self.flags.carry() as u16;
                    let carry_out = result & msb != 0;
                    result = ((result << 1) | carry_in) & mask;
                    self.flags.set_carry(carry_out);
                }
                if count == 1 {
                    self.flags
                        .set_overflow((result & msb != 0) != self.flags.carry());
                }
            }
            // RCR
            0b011 => {
                for _ in 0..count {
                    let carry_in = if self.flags.carry() { msb } else { 0 };
                    let carry_out = result & 1 != 0;
                    result = (result >> 1) | carry_in;
                    self.flags.set_carry(carry_out);
                }
                if count == 1 {
                    self.flags
                        .set_overflow((result & msb != 0) != (result & (msb >> 1) != 0));
                }
            }
            // SHL/SAL
            0b100 | 0b110 => {
                for _ in 0..count {
                    let carry_out = result & msb != 0;
                    result = (result << 1) & mask;
                    self.flags.set_carry(carry_out);
                }
                self.set_szp(result, width);
                if count == 1 {
                    self.flags
                        .set_overflow((result & msb != 0) != self.flags.carry());
                }
            }
            // SHR
            0b101 => {
                if count == 1 {
                    self.flags.set_overflow(val & msb != 0);
                }
                for _ in 0..count {
                    self.flags.set_carry(result & 1 != 0);
                    result >>= 1;
                }
                self.set_szp(result, width);
            }
            // SAR
            _ => {
                let sign = result & msb;
                if count == 1 {
                    self.flags.set_overflow(false);
                }
                for _ in 0..count {
                    self.flags.set_carry(result & 1 != 0);
                    result = (result >> 1) | sign;
                }
                self.set_szp(result, width);
            }
        }

        result
    }

    /// F6/F7: TEST imm, NOT, NEG, MUL, IMUL, DIV, IDIV
    fn group3(&mut self, modrm: ModRm, disp: i16, width: Width) -> Result<u32, CpuError> {
        let loc = self.location(modrm, disp, width)?;
        let val = self.load(loc, width);

        match modrm.reg {
            0 | 1 => {
                let imm = match width {
                    Width::Byte => self.fetch8() as u16,
                    Width::Word => self.fetch16(),
                };
                self.test(val, imm, width);
                Ok(2)
            }
            2 => {
                self.store(loc, width, !val);
                Ok(0)
            }
            3 => {
                let result = match width {
                    Width::Byte => self.flags.neg8(val as u8) as u16,
                    Width::Word => self.flags.neg16(val),
                };
                self.store(loc, width, result);
                Ok(0)
            }
            4 => Ok(self.multiply(val, width, false)),
            5 => Ok(self.multiply(val, width, true)),
            6 => self.divide(val, width, false),
            _ => self.divide(val, width, true),
        }
    }

    /// AL*r/m8 into AX, or AX*r/m16 into DX:AX. CF=OF=upper half significant.
    fn multiply(&mut self, val: u16, width: Width, signed: bool) -> u32 {
        let overflow = match (width, signed) {
            (Width::Byte, false) => {
                let result = self.regs.al() as u16 * (val as u8) as u16;
                self.regs.set_ax(result);
                self.flags.set_szp16(result);
                result & 0xFF00 != 0
            }
            (Width::Byte, true) => {
                let result = (self.regs.al() as i8 as i16) * (val as u8 as i8 as i16);
                self.regs.set_ax(result as u16);
                self.flags.set_szp16(result as u16);
                result != (result as i8) as i16
            }
            (Width::Word, false) => {
                let result = self.regs.ax() as u32 * val as u32;
                self.regs.set_ax(result as u16);
                self.regs.set_dx((result >> 16) as u16);
                self.flags.set_szp16(result as u16);
                result & 0xFFFF_0000 != 0
            }
            (Width::Word, true) => {
                let result = (self.regs.ax() as i16 as i32) * (val as i16 as i32);
                self.regs.set_ax(result as u16);
                self.regs.set_dx((result >> 16) as u16);
                self.flags.set_szp16(result as u16);
                result != (result as i16) as i32
            }
        };
        self.flags.set_carry(overflow);
        self.flags.set_overflow(overflow);

        match (width, signed) {
            (Width::Byte, false) => 67,
            (Width::Byte, true) => 77,
            (Width::Word, false) => 115,
            (Width::Word, true) => 125,
        }
    }

    /// AX / r/m8 into AL (quotient) and AH (remainder), or DX:AX / r/m16
    /// into AX and DX. A zero divisor or a quotient that does not fit fails;
    /// signed quotients of -128 and -32768 fail as they do on the 8086.
    fn divide(&mut self, val: u16, width: Width, signed: bool) -> Result<u32, CpuError> {
        match (width, signed) {
            (Width::Byte, false) => {
                let divisor = (val as u8) as u16;
                if divisor == 0 {
                    return Err(CpuError::DivisionByZero);
                }
                let dividend = self.regs.ax();
                let quotient = dividend / divisor;
                if quotient > 0xFF {
                    return Err(CpuError::DivisionByZero);
                }
                self.regs.set_al(quotient as u8);
                self.regs.set_ah((dividend % divisor) as u8);
                Ok(77)
            }
            (Width::Byte, true) => {
                let divisor = val as u8 as i8 as i32;
                if divisor == 0 {
                    return Err(CpuError::DivisionByZero);
                }
                let dividend = self.regs.ax() as i16 as i32;
                let quotient = dividend / divisor;
                if !(-(i8::MAX as i32)..=i8::MAX as i32).contains(&quotient) {
                    return Err(CpuError::DivisionByZero);
                }
                self.regs.set_al(quotient as u8);
                self.regs.set_ah((dividend % divisor) as u8);
                Ok(98)
            }
            (Width::Word, false) => {
                let divisor = val as u32;
                if divisor == 0 {
                    return Err(CpuError::DivisionByZero);
                }
                let dividend = ((self.regs.dx() as u32) << 16) | self.regs.ax() as u32;
                let quotient = dividend / divisor;
                if quotient > 0xFFFF {
                    return Err(CpuError::DivisionByZero);
                }
                self.regs.set_ax(quotient as u16);
                self.regs.set_dx((dividend % divisor) as u16);
                Ok(141)
            }
            (Width::Word, true) => {
                let divisor = val as i16 as i64;
                if divisor == 0 {
                    return Err(CpuError::DivisionByZero);
                }
                let dividend =
                    (((self.regs.dx() as u32) << 16) | self.regs.ax() as u32) as i32 as i64;
                let quotient = dividend / divisor;
                if !(-(i16::MAX as i64)..=i16::MAX as i64).contains(&quotient) {
                    return Err(CpuError::DivisionByZero);
                }
                self.regs.set_ax(quotient as u16);
                self.regs.set_dx((dividend % divisor) as u16);
                Ok(162)
            }
        }
    }

    /// FF: INC, DEC, CALL, CALL far, JMP, JMP far, PUSH
    fn group5(&mut self, opcode: u8, modrm: ModRm, disp: i16) -> Result<u32, CpuError> {
        let bad_operand = CpuError::InvalidOperand { opcode };
        let loc = self.location(modrm, disp, Width::Word)?;

        match modrm.reg {
            0 | 1 => {
                self.inc_dec(loc, Width::Word, modrm.reg == 1);
                Ok(0)
            }
            2 => {
                let target = self.load(loc, Width::Word);
                self.push16(self.regs.ip());
                self.regs.set_ip(target);
                Ok(13)
            }
            4 => {
                let target = self.load(loc, Width::Word);
                self.regs.set_ip(target);
                Ok(8)
            }
            3 | 5 => {
                let Location::Memory { segment, offset } = loc else {
                    return Err(bad_operand);
                };
                let (new_offset, new_segment) = self.read_far_pointer(segment, offset);
                if modrm.reg == 3 {
                    self.call_far(new_segment, new_offset);
                    Ok(34)
                } else {
                    self.regs.set_cs(new_segment);
                    self.regs.set_ip(new_offset);
                    Ok(21)
                }
            }
            6 => {
                self.push_location(loc);
                Ok(8)
            }
            _ => Err(bad_operand),
        }
    }

    /// One string primitive, repeated while CX != 0 under a REP prefix.
    ///
    /// REPE/REPNE additionally stop CMPS/SCAS when ZF no longer matches.
    fn string(&mut self, mnemonic: Mnemonic, width: Width) -> u32 {
        let per_iteration = match mnemonic {
            Mnemonic::Movsb | Mnemonic::Movsw => 17,
            Mnemonic::Cmpsb | Mnemonic::Cmpsw => 22,
            Mnemonic::Stosb | Mnemonic::Stosw => 10,
            Mnemonic::Lodsb | Mnemonic::Lodsw => 13,
            _ => 15,
        };

        let Some(repeat) = self.repeat else {
            self.string_once(mnemonic, width);
            return 0;
        };

        let compares = matches!(
            mnemonic,
            Mnemonic::Cmpsb | Mnemonic::Cmpsw | Mnemonic::Scasb | Mnemonic::Scasw
        );
        let mut iterations = 0u32;
        while self.regs.cx() != 0 {
            self.string_once(mnemonic, width);
            self.regs.set_cx(self.regs.cx() - 1);
            iterations += 1;
            if compares && self.flags.zero() != (repeat == RepeatPrefix::Rep) {
                break;
            }
        }
        iterations * per_iteration
    }

    fn string_once(&mut self, mnemonic: Mnemonic, width: Width) {
        let size = match width {
            Width::Byte => 1u16,
            Width::Word => 2,
        };
        let delta = if self.flags.direction() { size.wrapping_neg() } else { size };
        let source = Location::Memory {
            segment: self.data_segment(),
            offset: self.regs.si(),
        };
        let destination = Location::Memory {
            segment: self.regs.es(),
            offset: self.regs.di(),
        };
        let acc = Location::Register(accumulator(width));
        let (advance_si, advance_di) = match mnemonic {
            Mnemonic::Movsb | Mnemonic::Movsw => {
                let val = self.load(source, width);
                self.store(destination, width, val);
                (true, true)
            }
            Mnemonic::Cmpsb | Mnemonic::Cmpsw => {
                let a = self.load(source, width);
                let b = self.load(destination, width);
                self.alu(7, a, b, width);
                (true, true)
            }
            Mnemonic::Stosb | Mnemonic::Stosw => {
                let val = self.load(acc, width);
                self.store(destination, width, val);
                (false, true)
            }
            Mnemonic::Lodsb | Mnemonic::Lodsw => {
                let val = self.load(source, width);
                self.store(acc, width, val);
                (true, false)
            }
            _ => {
                let a = self.load(acc, width);
                let b = self.load(destination, width);
                self.alu(7, a, b, width);
                (false, true)
            }
        };
        if advance_si {
            self.regs.set_si(self.regs.si().wrapping_add(delta));
        }
        if advance_di {
            self.regs.set_di(self.regs.di().wrapping_add(delta));
        }
    }
}
