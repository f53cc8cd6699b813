//! Simulated per-object storage.
//!
//! The loader targets static binary analysis, so relocations are written into
//! byte buffers standing in for the mapped image rather than into live
//! memory. All offsets are relative to the start of the object's image.

use crate::{
    Result,
    arch::Endian,
    error::invalid_binary_error,
};
use alloc::{format, vec, vec::Vec};

/// Byte-addressable storage for one mapped object image.
pub struct MemoryImage {
    data: Vec<u8>,
    endian: Endian,
}

impl MemoryImage {
    /// Wraps an existing image buffer.
    pub fn new(data: Vec<u8>, endian: Endian) -> Self {
        Self { data, endian }
    }

    /// Creates a zero-filled image of the given length.
    pub fn zeroed(len: usize, endian: Endian) -> Self {
        Self {
            data: vec![0; len],
            endian,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    fn checked_range(&self, offset: u64, len: usize) -> Result<core::ops::Range<usize>> {
        let start = usize::try_from(offset).ok();
        let end = start.and_then(|s| s.checked_add(len));
        match (start, end) {
            (Some(start), Some(end)) if end <= self.data.len() => Ok(start..end),
            _ => Err(invalid_binary_error(format!(
                "memory access out of range: offset {offset:#x}, len {len}, image size {}",
                self.data.len()
            ))),
        }
    }

    /// Reads `len` raw bytes at `offset`.
    pub fn load(&self, offset: u64, len: usize) -> Result<&[u8]> {
        let range = self.checked_range(offset, len)?;
        Ok(&self.data[range])
    }

    /// Writes raw bytes at `offset`.
    pub fn store(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        let range = self.checked_range(offset, bytes.len())?;
        self.data[range].copy_from_slice(bytes);
        Ok(())
    }

    /// Writes the low `size` bytes of `value` at `offset` in the image's
    /// byte order. `size` must be 1, 2, 4 or 8; the value wraps modulo the
    /// field width. `signed` records the two's-complement interpretation of
    /// the field; the stored bit pattern is the same either way.
    pub fn pack_word(&mut self, offset: u64, value: u64, size: usize, signed: bool) -> Result<()> {
        debug_assert!(matches!(size, 1 | 2 | 4 | 8));
        let _ = signed;
        let bytes = match self.endian {
            Endian::Little => value.to_le_bytes(),
            Endian::Big => value.to_be_bytes(),
        };
        match self.endian {
            Endian::Little => self.store(offset, &bytes[..size]),
            Endian::Big => self.store(offset, &bytes[8 - size..]),
        }
    }

    /// Reads a `size`-byte unsigned word at `offset` in the image's byte
    /// order.
    pub fn unpack_word(&self, offset: u64, size: usize) -> Result<u64> {
        debug_assert!(matches!(size, 1 | 2 | 4 | 8));
        let raw = self.load(offset, size)?;
        let mut bytes = [0u8; 8];
        match self.endian {
            Endian::Little => {
                bytes[..size].copy_from_slice(raw);
                Ok(u64::from_le_bytes(bytes))
            }
            Endian::Big => {
                bytes[8 - size..].copy_from_slice(raw);
                Ok(u64::from_be_bytes(bytes))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_unpack_little_endian() {
        let mut mem = MemoryImage::zeroed(16, Endian::Little);
        mem.pack_word(0, 0x1122_3344_5566_7788, 8, false).unwrap();
        assert_eq!(mem.unpack_word(0, 8).unwrap(), 0x1122_3344_5566_7788);
        assert_eq!(mem.load(0, 2).unwrap(), &[0x88, 0x77]);

        mem.pack_word(8, 0xdead_beef_cafe, 4, false).unwrap();
        assert_eq!(mem.unpack_word(8, 4).unwrap(), 0xbeef_cafe);
    }

    #[test]
    fn pack_unpack_big_endian() {
        let mut mem = MemoryImage::zeroed(8, Endian::Big);
        mem.pack_word(0, 0x0102_0304, 4, false).unwrap();
        assert_eq!(mem.load(0, 4).unwrap(), &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(mem.unpack_word(0, 4).unwrap(), 0x0102_0304);
    }

    #[test]
    fn out_of_range_access_is_invalid_binary() {
        let mut mem = MemoryImage::zeroed(4, Endian::Little);
        assert!(mem.pack_word(2, 0, 4, false).is_err());
        assert!(mem.load(u64::MAX, 1).is_err());
        assert!(mem.store(4, &[1]).is_err());
    }
}
