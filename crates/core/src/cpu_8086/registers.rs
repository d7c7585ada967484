//! 8086 register file

use serde::{Deserialize, Serialize};

use super::error::CpuError;

/// Every register an instruction can name, in the order used for reverse
/// opcode lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Register {
    AL,
    CL,
    DL,
    BL,
    AH,
    CH,
    DH,
    BH,
    AX,
    CX,
    DX,
    BX,
    SP,
    BP,
    SI,
    DI,
    ES,
    CS,
    SS,
    DS,
}

impl Register {
    pub const COUNT: usize = 20;

    pub const ALL: [Register; Self::COUNT] = [
        Register::AL,
        Register::CL,
        Register::DL,
        Register::BL,
        Register::AH,
        Register::CH,
        Register::DH,
        Register::BH,
        Register::AX,
        Register::CX,
        Register::DX,
        Register::BX,
        Register::SP,
        Register::BP,
        Register::SI,
        Register::DI,
        Register::ES,
        Register::CS,
        Register::SS,
        Register::DS,
    ];

    /// Dense ordinal, matching `ALL`
    #[inline]
    pub fn ordinal(self) -> usize {
        self as usize
    }

    /// 8-bit register from its 3-bit encoding (AL, CL, DL, BL, AH, CH, DH, BH)
    pub fn reg8(index: u8) -> Result<Self, CpuError> {
        match index {
            0..=7 => Ok(Self::ALL[index as usize]),
            _ => Err(CpuError::InvalidRegister(index)),
        }
    }

    /// 16-bit register from its 3-bit encoding (AX, CX, DX, BX, SP, BP, SI, DI)
    pub fn reg16(index: u8) -> Result<Self, CpuError> {
        match index {
            0..=7 => Ok(Self::ALL[8 + index as usize]),
            _ => Err(CpuError::InvalidRegister(index)),
        }
    }

    /// Segment register from its 2-bit encoding (ES, CS, SS, DS)
    pub fn segment(index: u8) -> Result<Self, CpuError> {
        match index {
            0..=3 => Ok(Self::ALL[16 + index as usize]),
            _ => Err(CpuError::InvalidSegment(index)),
        }
    }

    /// Encoding within its own class (inverse of `reg8`/`reg16`/`segment`)
    pub fn index(self) -> u8 {
        match self.ordinal() {
            o @ 0..=7 => o as u8,
            o @ 8..=15 => (o - 8) as u8,
            o => (o - 16) as u8,
        }
    }

    pub fn is_byte(self) -> bool {
        self.ordinal() < 8
    }

    pub fn is_segment(self) -> bool {
        self.ordinal() >= 16
    }

    pub fn name(self) -> &'static str {
        match self {
            Register::AL => "al",
            Register::CL => "cl",
            Register::DL => "dl",
            Register::BL => "bl",
            Register::AH => "ah",
            Register::CH => "ch",
            Register::DH => "dh",
            Register::BH => "bh",
            Register::AX => "ax",
            Register::CX => "cx",
            Register::DX => "dx",
            Register::BX => "bx",
            Register::SP => "sp",
            Register::BP => "bp",
            Register::SI => "si",
            Register::DI => "di",
            Register::ES => "es",
            Register::CS => "cs",
            Register::SS => "ss",
            Register::DS => "ds",
        }
    }
}

macro_rules! word_with_halves {
    ($($word:ident, $set_word:ident, $lo:ident, $set_lo:ident, $hi:ident, $set_hi:ident;)*) => {
        $(
            #[inline]
            pub fn $word(&self) -> u16 {
                self.$word
            }

            #[inline]
            pub fn $set_word(&mut self, val: u16) {
                self.$word = val;
            }

            #[inline]
            pub fn $lo(&self) -> u8 {
                (self.$word & 0xFF) as u8
            }

            #[inline]
            pub fn $set_lo(&mut self, val: u8) {
                self.$word = (self.$word & 0xFF00) | val as u16;
            }

            #[inline]
            pub fn $hi(&self) -> u8 {
                (self.$word >> 8) as u8
            }

            #[inline]
            pub fn $set_hi(&mut self, val: u8) {
                self.$word = (self.$word & 0x00FF) | ((val as u16) << 8);
            }
        )*
    };
}

macro_rules! plain_words {
    ($($word:ident, $set_word:ident;)*) => {
        $(
            #[inline]
            pub fn $word(&self) -> u16 {
                self.$word
            }

            #[inline]
            pub fn $set_word(&mut self, val: u16) {
                self.$word = val;
            }
        )*
    };
}

/// General, index, pointer and segment registers plus IP
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    ax: u16,
    bx: u16,
    cx: u16,
    dx: u16,
    si: u16,
    di: u16,
    bp: u16,
    sp: u16,
    cs: u16,
    ds: u16,
    es: u16,
    ss: u16,
    ip: u16,
}

impl Registers {
    word_with_halves! {
        ax, set_ax, al, set_al, ah, set_ah;
        bx, set_bx, bl, set_bl, bh, set_bh;
        cx, set_cx, cl, set_cl, ch, set_ch;
        dx, set_dx, dl, set_dl, dh, set_dh;
    }

    plain_words! {
        si, set_si;
        di, set_di;
        bp, set_bp;
        sp, set_sp;
        cs, set_cs;
        ds, set_ds;
        es, set_es;
        ss, set_ss;
        ip, set_ip;
    }

    /// Read an 8-bit register; word and segment registers read their low byte
    pub fn get8(&self, reg: Register) -> u8 {
        match reg {
            Register::AL => self.al(),
            Register::CL => self.cl(),
            Register::DL => self.dl(),
            Register::BL => self.bl(),
            Register::AH => self.ah(),
            Register::CH => self.ch(),
            Register::DH => self.dh(),
            Register::BH => self.bh(),
            wide => self.get16(wide) as u8,
        }
    }

    pub fn set8(&mut self, reg: Register, val: u8) {
        match reg {
            Register::AL => self.set_al(val),
            Register::CL => self.set_cl(val),
            Register::DL => self.set_dl(val),
            Register::BL => self.set_bl(val),
            Register::AH => self.set_ah(val),
            Register::CH => self.set_ch(val),
            Register::DH => self.set_dh(val),
            Register::BH => self.set_bh(val),
            wide => {
                let current = self.get16(wide);
                self.set16(wide, (current & 0xFF00) | val as u16);
            }
        }
    }

    /// Read a 16-bit register; byte registers read zero-extended
    pub fn get16(&self, reg: Register) -> u16 {
        match reg {
            Register::AX => self.ax,
            Register::CX => self.cx,
            Register::DX => self.dx,
            Register::BX => self.bx,
            Register::SP => self.sp,
            Register::BP => self.bp,
            Register::SI => self.si,
            Register::DI => self.di,
            Register::ES => self.es,
            Register::CS => self.cs,
            Register::SS => self.ss,
            Register::DS => self.ds,
            byte => self.get8(byte) as u16,
        }
    }

    pub fn set16(&mut self, reg: Register, val: u16) {
        match reg {
            Register::AX => self.ax = val,
            Register::CX => self.cx = val,
            Register::DX => self.dx = val,
            Register::BX => self.bx = val,
            Register::SP => self.sp = val,
            Register::BP => self.bp = val,
            Register::SI => self.si = val,
            Register::DI => self.di = val,
            Register::ES => self.es = val,
            Register::CS => self.cs = val,
            Register::SS => self.ss = val,
            Register::DS => self.ds = val,
            byte => self.set8(byte, val as u8),
        }
    }
}
