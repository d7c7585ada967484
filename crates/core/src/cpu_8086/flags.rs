//! FLAGS register and the arithmetic/logic primitives that drive it
//!
//! Every ALU helper computes its result and the complete set of status flags
//! it affects in one place, then returns only the result.

use serde::{Deserialize, Serialize};

// Flag bit positions in FLAGS register
pub const FLAG_CF: u16 = 0x0001; // Carry
pub const FLAG_RESERVED: u16 = 0x0002; // Always set
pub const FLAG_PF: u16 = 0x0004; // Parity
pub const FLAG_AF: u16 = 0x0010; // Auxiliary carry
pub const FLAG_ZF: u16 = 0x0040; // Zero
pub const FLAG_SF: u16 = 0x0080; // Sign
pub const FLAG_TF: u16 = 0x0100; // Trap
pub const FLAG_IF: u16 = 0x0200; // Interrupt enable
pub const FLAG_DF: u16 = 0x0400; // Direction
pub const FLAG_OF: u16 = 0x0800; // Overflow

/// Bits that can hold a value; everything else reads as zero
const FLAG_MASK: u16 = FLAG_CF
    | FLAG_PF
    | FLAG_AF
    | FLAG_ZF
    | FLAG_SF
    | FLAG_TF
    | FLAG_IF
    | FLAG_DF
    | FLAG_OF;

/// Even parity of every byte value
pub static PARITY_TABLE: [bool; 256] = build_parity_table();

const fn build_parity_table() -> [bool; 256] {
    let mut table = [false; 256];
    let mut i = 0;
    while i < 256 {
        let mut bits = 0;
        let mut v = i;
        while v != 0 {
            bits += v & 1;
            v >>= 1;
        }
        table[i] = bits % 2 == 0;
        i += 1;
    }
    table
}

/// True if the byte has an even number of set bits
#[inline]
pub fn parity(val: u8) -> bool {
    PARITY_TABLE[val as usize]
}

/// The 16-bit FLAGS register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u16", into = "u16")]
pub struct Flags(u16);

impl Default for Flags {
    fn default() -> Self {
        Self(FLAG_RESERVED)
    }
}

impl From<u16> for Flags {
    fn from(bits: u16) -> Self {
        Self::from_bits(bits)
    }
}

impl From<Flags> for u16 {
    fn from(flags: Flags) -> u16 {
        flags.0
    }
}

macro_rules! flag_accessors {
    ($($get:ident, $set:ident, $bit:ident;)*) => {
        $(
            #[inline]
            pub fn $get(&self) -> bool {
                self.get($bit)
            }

            #[inline]
            pub fn $set(&mut self, value: bool) {
                self.set($bit, value);
            }
        )*
    };
}

impl Flags {
    /// Build from a raw word; undefined bits are cleared and bit 1 forced on
    pub fn from_bits(bits: u16) -> Self {
        Self((bits & FLAG_MASK) | FLAG_RESERVED)
    }

    #[inline]
    pub fn bits(&self) -> u16 {
        self.0
    }

    #[inline]
    pub fn get(&self, flag: u16) -> bool {
        (self.0 & flag) != 0
    }

    #[inline]
    pub fn set(&mut self, flag: u16, value: bool) {
        if value {
            self.0 |= flag & FLAG_MASK;
        } else {
            self.0 &= !flag;
        }
        self.0 |= FLAG_RESERVED;
    }

    flag_accessors! {
        carry, set_carry, FLAG_CF;
        parity, set_parity, FLAG_PF;
        aux_carry, set_aux_carry, FLAG_AF;
        zero, set_zero, FLAG_ZF;
        sign, set_sign, FLAG_SF;
        trap, set_trap, FLAG_TF;
        interrupt_enabled, set_interrupt_enabled, FLAG_IF;
        direction, set_direction, FLAG_DF;
        overflow, set_overflow, FLAG_OF;
    }

    /// Sign, zero and parity for an 8-bit result
    pub fn set_szp8(&mut self, result: u8) {
        self.set_zero(result == 0);
        self.set_sign(result & 0x80 != 0);
        self.set_parity(parity(result));
    }

    /// Sign, zero and parity for a 16-bit result (parity over the low byte)
    pub fn set_szp16(&mut self, result: u16) {
        self.set_zero(result == 0);
        self.set_sign(result & 0x8000 != 0);
        self.set_parity(parity(result as u8));
    }

    /// Low byte as loaded into AH by LAHF
    pub fn low_byte(&self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    /// SAHF: replace SF, ZF, AF, PF and CF from `val`
    pub fn set_low_byte(&mut self, val: u8) {
        let mask = FLAG_SF | FLAG_ZF | FLAG_AF | FLAG_PF | FLAG_CF;
        self.0 = (self.0 & !mask) | (val as u16 & mask) | FLAG_RESERVED;
    }

    /// Evaluate a Jcc condition code (low nibble of 0x70-0x7F)
    pub fn condition(&self, code: u8) -> bool {
        match code & 0x0F {
            0x0 => self.overflow(),
            0x1 => !self.overflow(),
            0x2 => self.carry(),
            0x3 => !self.carry(),
            0x4 => self.zero(),
            0x5 => !self.zero(),
            0x6 => self.carry() || self.zero(),
            0x7 => !self.carry() && !self.zero(),
            0x8 => self.sign(),
            0x9 => !self.sign(),
            0xA => self.parity(),
            0xB => !self.parity(),
            0xC => self.sign() != self.overflow(),
            0xD => self.sign() == self.overflow(),
            0xE => self.zero() || self.sign() != self.overflow(),
            _ => !self.zero() && self.sign() == self.overflow(),
        }
    }

    fn add_flags8(&mut self, a: u8, b: u8, carry_in: u8) -> u8 {
        let wide = a as u16 + b as u16 + carry_in as u16;
        let result = wide as u8;
        self.set_carry(wide > 0xFF);
        self.set_overflow(((a ^ b ^ 0x80) & (result ^ a) & 0x80) != 0);
        self.set_aux_carry(((a ^ b ^ result) & 0x10) != 0);
        self.set_szp8(result);
        result
    }

    fn add_flags16(&mut self, a: u16, b: u16, carry_in: u16) -> u16 {
        let wide = a as u32 + b as u32 + carry_in as u32;
        let result = wide as u16;
        self.set_carry(wide > 0xFFFF);
        self.set_overflow(((a ^ b ^ 0x8000) & (result ^ a) & 0x8000) != 0);
        self.set_aux_carry(((a ^ b ^ result) & 0x10) != 0);
        self.set_szp16(result);
        result
    }

    fn sub_flags8(&mut self, a: u8, b: u8, borrow_in: u8) -> u8 {
        let result = a.wrapping_sub(b).wrapping_sub(borrow_in);
        self.set_carry((a as u16) < (b as u16 + borrow_in as u16));
        self.set_overflow(((a ^ b) & (a ^ result) & 0x80) != 0);
        self.set_aux_carry(((a ^ b ^ result) & 0x10) != 0);
        self.set_szp8(result);
        result
    }

    fn sub_flags16(&mut self, a: u16, b: u16, borrow_in: u16) -> u16 {
        let result = a.wrapping_sub(b).wrapping_sub(borrow_in);
        self.set_carry((a as u32) < (b as u32 + borrow_in as u32));
        self.set_overflow(((a ^ b) & (a ^ result) & 0x8000) != 0);
        self.set_aux_carry(((a ^ b ^ result) & 0x10) != 0);
        self.set_szp16(result);
        result
    }

    pub fn add8(&mut self, a: u8, b: u8) -> u8 {
        self.add_flags8(a, b, 0)
    }

    pub fn add16(&mut self, a: u16, b: u16) -> u16 {
        self.add_flags16(a, b, 0)
    }

    pub fn adc8(&mut self, a: u8, b: u8) -> u8 {
        let carry = self.carry() as u8;
        self.add_flags8(a, b, carry)
    }

    pub fn adc16(&mut self, a: u16, b: u16) -> u16 {
        let carry = self.carry() as u16;
        self.add_flags16(a, b, carry)
    }

    pub fn sub8(&mut self, a: u8, b: u8) -> u8 {
        self.sub_flags8(a, b, 0)
    }

    pub fn sub16(&mut self, a: u16, b: u16) -> u16 {
        self.sub_flags16(a, b, 0)
    }

    pub fn sbb8(&mut self, a: u8, b: u8) -> u8 {
        let borrow = self.carry() as u8;
        self.sub_flags8(a, b, borrow)
    }

    pub fn sbb16(&mut self, a: u16, b: u16) -> u16 {
        let borrow = self.carry() as u16;
        self.sub_flags16(a, b, borrow)
    }

    fn logic8(&mut self, result: u8) -> u8 {
        self.set_carry(false);
        self.set_overflow(false);
        self.set_aux_carry(false);
        self.set_szp8(result);
        result
    }

    fn logic16(&mut self, result: u16) -> u16 {
        self.set_carry(false);
        self.set_overflow(false);
        self.set_aux_carry(false);
        self.set_szp16(result);
        result
    }

    pub fn and8(&mut self, a: u8, b: u8) -> u8 {
        self.logic8(a & b)
    }

    pub fn and16(&mut self, a: u16, b: u16) -> u16 {
        self.logic16(a & b)
    }

    pub fn or8(&mut self, a: u8, b: u8) -> u8 {
        self.logic8(a | b)
    }

    pub fn or16(&mut self, a: u16, b: u16) -> u16 {
        self.logic16(a | b)
    }

    pub fn xor8(&mut self, a: u8, b: u8) -> u8 {
        self.logic8(a ^ b)
    }

    pub fn xor16(&mut self, a: u16, b: u16) -> u16 {
        self.logic16(a ^ b)
    }

    /// INC leaves CF untouched
    pub fn inc8(&mut self, a: u8) -> u8 {
        let carry = self.carry();
        let result = self.add_flags8(a, 1, 0);
        self.set_carry(carry);
        result
    }

    pub fn inc16(&mut self, a: u16) -> u16 {
        let carry = self.carry();
        let result = self.add_flags16(a, 1, 0);
        self.set_carry(carry);
        result
    }

    /// DEC leaves CF untouched
    pub fn dec8(&mut self, a: u8) -> u8 {
        let carry = self.carry();
        let result = self.sub_flags8(a, 1, 0);
        self.set_carry(carry);
        result
    }

    pub fn dec16(&mut self, a: u16) -> u16 {
        let carry = self.carry();
        let result = self.sub_flags16(a, 1, 0);
        self.set_carry(carry);
        result
    }

    /// NEG: 0 - a, CF set unless the operand was zero
    pub fn neg8(&mut self, a: u8) -> u8 {
        self.sub_flags8(0, a, 0)
    }

    pub fn neg16(&mut self, a: u16) -> u16 {
        self.sub_flags16(0, a, 0)
    }
}
