//! ModR/M byte decoding and effective-address resolution

use serde::{Deserialize, Serialize};

use super::registers::{Register, Registers};

/// Decoded ModR/M byte: `mod` (bits 7-6), `reg` (5-3), `rm` (2-0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModRm {
    pub mode: u8,
    pub reg: u8,
    pub rm: u8,
}

/// Extra bytes following a ModR/M byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplacementSize {
    None,
    Byte,
    Word,
}

impl ModRm {
    /// Fields are truncated to their bit widths
    pub fn new(mode: u8, reg: u8, rm: u8) -> Self {
        Self {
            mode: mode & 0x03,
            reg: reg & 0x07,
            rm: rm & 0x07,
        }
    }

    pub fn from_byte(byte: u8) -> Self {
        Self::new(byte >> 6, byte >> 3, byte)
    }

    pub fn to_byte(self) -> u8 {
        (self.mode << 6) | (self.reg << 3) | self.rm
    }

    /// Operand is a register, not memory
    #[inline]
    pub fn is_register(self) -> bool {
        self.mode == 0b11
    }

    /// `mod=00, rm=110`: 16-bit direct address instead of `[BP]`
    #[inline]
    pub fn is_direct(self) -> bool {
        self.mode == 0b00 && self.rm == 0b110
    }

    pub fn displacement_size(self) -> DisplacementSize {
        match self.mode {
            0b01 => DisplacementSize::Byte,
            0b10 => DisplacementSize::Word,
            0b00 if self.rm == 0b110 => DisplacementSize::Word,
            _ => DisplacementSize::None,
        }
    }

    /// Addressing form uses BP as its base, so SS is the default segment
    pub fn is_bp_relative(self) -> bool {
        match self.rm {
            0b010 | 0b011 => !self.is_register(),
            0b110 => self.mode == 0b01 || self.mode == 0b10,
            _ => false,
        }
    }

    /// Default segment register for the memory form
    pub fn default_segment(self) -> Register {
        if self.is_bp_relative() {
            Register::SS
        } else {
            Register::DS
        }
    }

    /// 16-bit offset of the memory operand (wraps within the segment).
    ///
    /// Returns 0 for register forms.
    pub fn offset(self, regs: &Registers, displacement: i16) -> u16 {
        if self.is_register() {
            return 0;
        }
        if self.is_direct() {
            return displacement as u16;
        }
        let base = match self.rm {
            0b000 => regs.bx().wrapping_add(regs.si()),
            0b001 => regs.bx().wrapping_add(regs.di()),
            0b010 => regs.bp().wrapping_add(regs.si()),
            0b011 => regs.bp().wrapping_add(regs.di()),
            0b100 => regs.si(),
            0b101 => regs.di(),
            0b110 => regs.bp(),
            _ => regs.bx(),
        };
        base.wrapping_add(displacement as u16)
    }

    /// Segment value and offset of the memory operand.
    ///
    /// An explicit segment (from a segment-override prefix) wins over the
    /// default; otherwise BP-relative forms use SS and all others DS.
    pub fn resolve(self, regs: &Registers, displacement: i16, segment: Option<u16>) -> (u16, u16) {
        let seg = segment.unwrap_or_else(|| regs.get16(self.default_segment()));
        (seg, self.offset(regs, displacement))
    }

    /// Textual base for tracing, e.g. `[bp+si]`
    pub fn base_name(self) -> &'static str {
        match (self.mode, self.rm) {
            (0b11, _) => "reg",
            (0b00, 0b110) => "[disp16]",
            (_, 0b000) => "[bx+si]",
            (_, 0b001) => "[bx+di]",
            (_, 0b010) => "[bp+si]",
            (_, 0b011) => "[bp+di]",
            (_, 0b100) => "[si]",
            (_, 0b101) => "[di]",
            (_, 0b110) => "[bp]",
            _ => "[bx]",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_round_trip() {
        for b in 0..=255u8 {
            assert_eq!(ModRm::from_byte(b).to_byte(), b);
        }
    }

    #[test]
    fn test_fields() {
        let modrm = ModRm::from_byte(0b10_011_101);
        assert_eq!(modrm, ModRm::new(2, 3, 5));
        assert_eq!(modrm.displacement_size(), DisplacementSize::Word);
        assert_eq!(ModRm::from_byte(0x06).displacement_size(), DisplacementSize::Word);
        assert_eq!(ModRm::from_byte(0x46).displacement_size(), DisplacementSize::Byte);
        assert_eq!(ModRm::from_byte(0xC6).displacement_size(), DisplacementSize::None);
        assert_eq!(ModRm::from_byte(0x07).displacement_size(), DisplacementSize::None);
    }

    #[test]
    fn test_default_segments() {
        assert_eq!(ModRm::new(0, 0, 2).default_segment(), Register::SS);
        assert_eq!(ModRm::new(2, 0, 3).default_segment(), Register::SS);
        assert_eq!(ModRm::new(1, 0, 6).default_segment(), Register::SS);
        // Direct address is DS-relative
        assert_eq!(ModRm::new(0, 0, 6).default_segment(), Register::DS);
        assert_eq!(ModRm::new(0, 0, 0).default_segment(), Register::DS);
        assert_eq!(ModRm::new(1, 0, 7).default_segment(), Register::DS);
    }

    #[test]
    fn test_offsets() {
        let mut regs = Registers::default();
        regs.set_bx(0x0100);
        regs.set_si(0x0020);
        regs.set_di(0x0030);
        regs.set_bp(0xFFF0);

        assert_eq!(ModRm::new(0, 0, 0).offset(&regs, 0), 0x0120);
        assert_eq!(ModRm::new(1, 0, 1).offset(&regs, -0x10), 0x0120);
        assert_eq!(ModRm::new(2, 0, 6).offset(&regs, 0x0020), 0x0010); // wraps
        assert_eq!(ModRm::new(0, 0, 6).offset(&regs, 0x1234), 0x1234);
        assert_eq!(ModRm::new(3, 0, 0).offset(&regs, 0x1234), 0);
    }

    #[test]
    fn test_explicit_segment_wins() {
        let mut regs = Registers::default();
        regs.set_ds(0x1000);
        regs.set_ss(0x2000);
        regs.set_bp(0x0010);

        let modrm = ModRm::new(1, 0, 6);
        assert_eq!(modrm.resolve(&regs, 4, None), (0x2000, 0x0014));
        assert_eq!(modrm.resolve(&regs, 4, Some(0x3000)), (0x3000, 0x0014));
    }
}
