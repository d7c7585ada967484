//! Segmented real-mode memory
//!
//! A flat byte buffer between 64 KiB and 1 MiB addressed through 20-bit linear
//! addresses. Accesses outside the installed size do not fail: reads return
//! `0xFF` and writes are dropped, the way an 8086 bus behaves with no RAM
//! decoded at that address.

use std::fmt::{self, Write as _};
use std::sync::Arc;

use super::error::MemoryError;
use crate::logging::{Hex, LogLevel, Logger};

/// Smallest supported memory (one full segment)
pub const MIN_MEMORY_SIZE: usize = 0x10000;
/// 8086 real-mode ceiling
pub const MAX_MEMORY_SIZE: usize = 0x100000;
/// 20-bit address bus
pub const ADDRESS_MASK: u32 = 0xFFFFF;
/// Value returned for reads with nothing behind them
pub const OPEN_BUS: u8 = 0xFF;

/// Unmasked `segment * 16 + offset`
#[inline]
pub fn calculate_address(segment: u16, offset: u16) -> u32 {
    ((segment as u32) << 4) + (offset as u32)
}

/// Linear address as seen on the 20-bit bus (wraps at 1 MiB)
#[inline]
pub fn linear_address(segment: u16, offset: u16) -> u32 {
    calculate_address(segment, offset) & ADDRESS_MASK
}

/// Memory interface used by the 8086 core.
///
/// Addresses passed in are already masked to 20 bits. Implementations decide
/// what lives behind each address; word accessors are little-endian and built
/// from byte accesses.
pub trait Memory8086 {
    fn read(&self, addr: u32) -> u8;

    fn write(&mut self, addr: u32, val: u8);

    fn read_u16(&self, addr: u32) -> u16 {
        let lo = self.read(addr) as u16;
        let hi = self.read(addr.wrapping_add(1) & ADDRESS_MASK) as u16;
        (hi << 8) | lo
    }

    fn write_u16(&mut self, addr: u32, val: u16) {
        self.write(addr, (val & 0xFF) as u8);
        self.write(addr.wrapping_add(1) & ADDRESS_MASK, (val >> 8) as u8);
    }
}

/// Owned real-mode memory with a declared size
pub struct SegmentedMemory {
    data: Vec<u8>,
    logger: Option<Arc<dyn Logger>>,
}

impl fmt::Debug for SegmentedMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentedMemory")
            .field("size", &self.data.len())
            .field("logger", &self.logger.is_some())
            .finish()
    }
}

impl SegmentedMemory {
    /// Allocate `size` zeroed bytes
    pub fn new(size: usize) -> Result<Self, MemoryError> {
        if !(MIN_MEMORY_SIZE..=MAX_MEMORY_SIZE).contains(&size) {
            return Err(MemoryError::InvalidSize {
                size,
                min: MIN_MEMORY_SIZE,
                max: MAX_MEMORY_SIZE,
            });
        }
        Ok(Self {
            data: vec![0; size],
            logger: None,
        })
    }

    /// Attach a logger for out-of-bounds diagnostics
    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn set_logger(&mut self, logger: Option<Arc<dyn Logger>>) {
        self.logger = logger;
    }

    /// Declared size in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// True iff `addr` is backed by memory, both as given and once masked to 20 bits
    pub fn validate_address(&self, addr: u32) -> bool {
        (addr as usize) < self.data.len() && ((addr & ADDRESS_MASK) as usize) < self.data.len()
    }

    pub fn validate_segmented_address(&self, segment: u16, offset: u16) -> bool {
        self.validate_address(linear_address(segment, offset))
    }

    pub fn read8(&self, addr: u32) -> u8 {
        if self.validate_address(addr) {
            self.data[(addr & ADDRESS_MASK) as usize]
        } else {
            self.report("read out of bounds", addr);
            OPEN_BUS
        }
    }

    pub fn write8(&mut self, addr: u32, val: u8) {
        if self.validate_address(addr) {
            self.data[(addr & ADDRESS_MASK) as usize] = val;
        } else {
            self.report("write out of bounds dropped", addr);
        }
    }

    pub fn read16(&self, addr: u32) -> u16 {
        let lo = self.read8(addr) as u16;
        let hi = self.read8(addr.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }

    pub fn write16(&mut self, addr: u32, val: u16) {
        self.write8(addr, (val & 0xFF) as u8);
        self.write8(addr.wrapping_add(1), (val >> 8) as u8);
    }

    pub fn read_segmented(&self, segment: u16, offset: u16) -> u8 {
        self.read8(linear_address(segment, offset))
    }

    pub fn write_segmented(&mut self, segment: u16, offset: u16, val: u8) {
        self.write8(linear_address(segment, offset), val);
    }

    /// Word read at segment:offset; the high byte comes from offset+1 in the same segment
    pub fn read_segmented16(&self, segment: u16, offset: u16) -> u16 {
        let lo = self.read_segmented(segment, offset) as u16;
        let hi = self.read_segmented(segment, offset.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }

    pub fn write_segmented16(&mut self, segment: u16, offset: u16, val: u16) {
        self.write_segmented(segment, offset, (val & 0xFF) as u8);
        self.write_segmented(segment, offset.wrapping_add(1), (val >> 8) as u8);
    }

    /// Bulk copy; unlike single-byte writes this refuses to truncate
    pub fn load_data(&mut self, addr: u32, bytes: &[u8]) -> Result<(), MemoryError> {
        let start = addr as usize;
        let out_of_bounds = MemoryError::OutOfBounds {
            addr,
            len: bytes.len(),
            size: self.data.len(),
        };
        if start >= self.data.len() {
            return Err(out_of_bounds);
        }
        let end = start.checked_add(bytes.len()).ok_or(out_of_bounds.clone())?;
        if end > self.data.len() {
            return Err(out_of_bounds);
        }
        self.data[start..end].copy_from_slice(bytes);
        Ok(())
    }

    /// Hex + ASCII listing of `start..end`, 16 bytes per line.
    ///
    /// Addresses past the declared size show the open-bus value.
    pub fn dump(&self, start: u32, end: u32) -> Vec<String> {
        let mut lines = Vec::new();
        let mut line_start = start;
        while line_start < end {
            let line_end = end.min(line_start.saturating_add(16));
            let bytes: Vec<u8> = (line_start..line_end).map(|a| self.peek(a)).collect();

            let mut line = format!("{:05X}:", line_start);
            for byte in &bytes {
                let _ = write!(line, " {:02X}", byte);
            }
            for _ in bytes.len()..16 {
                line.push_str("   ");
            }
            line.push_str("  |");
            line.extend(bytes.iter().map(|&b| {
                if b.is_ascii_graphic() || b == b' ' {
                    b as char
                } else {
                    '.'
                }
            }));
            line.push('|');
            lines.push(line);

            if line_end == u32::MAX {
                break;
            }
            line_start = line_end;
        }
        lines
    }

    /// Read without diagnostics (used by dump)
    fn peek(&self, addr: u32) -> u8 {
        if self.validate_address(addr) {
            self.data[(addr & ADDRESS_MASK) as usize]
        } else {
            OPEN_BUS
        }
    }

    fn report(&self, message: &str, addr: u32) {
        if let Some(logger) = &self.logger {
            logger.log(
                LogLevel::Debug,
                message,
                &[("address", &Hex(addr)), ("size", &Hex(self.data.len()))],
            );
        }
    }
}

impl Memory8086 for SegmentedMemory {
    fn read(&self, addr: u32) -> u8 {
        self.read8(addr)
    }

    fn write(&mut self, addr: u32, val: u8) {
        self.write8(addr, val);
    }
}
