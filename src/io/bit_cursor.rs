//! Bit-level cursor for headers whose fields are not byte aligned.
//!
//! The cursor owns a copy of the header bytes and a bit offset counting
//! from the most significant bit of the first byte. Reads never look past
//! `8 * blob.len()` bits; a read that would is an error and leaves the
//! offset untouched.
//!
//! Some headers declare trailing data only after part of them has been
//! decoded. [`BitCursor::extend`] appends bytes to the blob without
//! resetting the offset, so decoding continues exactly where it stopped.

use crate::error::IoError;

/// Maximum width of a single [`BitCursor::read_bits`] call.
pub const MAX_READ_BITS: u32 = 64;

/// MSB-first bit reader over an owned byte blob.
#[derive(Debug, Clone, Default)]
pub struct BitCursor {
    blob: Vec<u8>,
    position: u64,
}

impl BitCursor {
    /// Create a cursor at bit 0 over a copy of `blob`.
    pub fn new(blob: impl Into<Vec<u8>>) -> Self {
        Self {
            blob: blob.into(),
            position: 0,
        }
    }

    /// Current bit offset.
    #[inline]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Total number of bits in the blob.
    #[inline]
    pub fn len_bits(&self) -> u64 {
        self.blob.len() as u64 * 8
    }

    /// Bits left before the end of the blob.
    #[inline]
    pub fn remaining_bits(&self) -> u64 {
        self.len_bits() - self.position
    }

    /// Append bytes to the blob, keeping the current offset.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.blob.extend_from_slice(bytes);
    }

    /// Consume `n` bits (0..=64) MSB-first and return them right-aligned.
    pub fn read_bits(&mut self, n: u32) -> Result<u64, IoError> {
        if n > MAX_READ_BITS {
            return Err(IoError::UnsupportedWidth(n as usize));
        }
        self.check(n)?;

        let mut value = 0u64;
        let mut remaining = n;
        let mut position = self.position;

        while remaining > 0 {
            let byte = self.blob[(position / 8) as usize];
            let bit_in_byte = (position % 8) as u32;
            let available = 8 - bit_in_byte;
            let take = remaining.min(available);

            let shift = available - take;
            let mask = ((1u16 << take) - 1) as u8;
            let bits = (byte >> shift) & mask;

            value = (value << take) | bits as u64;
            position += take as u64;
            remaining -= take;
        }

        self.position = position;
        Ok(value)
    }

    /// Consume a single bit as a flag.
    #[inline]
    pub fn read_flag(&mut self) -> Result<bool, IoError> {
        Ok(self.read_bits(1)? == 1)
    }

    /// Consume `count` whole bytes starting at the current (possibly
    /// unaligned) bit offset.
    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>, IoError> {
        self.check((count as u64).saturating_mul(8).min(u32::MAX as u64) as u32)?;
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.read_bits(8)? as u8);
        }
        Ok(out)
    }

    /// Advance the offset by `n` bits without decoding them.
    pub fn skip_bits(&mut self, n: u32) -> Result<(), IoError> {
        self.check(n)?;
        self.position += n as u64;
        Ok(())
    }

    fn check(&self, n: u32) -> Result<(), IoError> {
        if n as u64 > self.remaining_bits() {
            return Err(IoError::BitsOutOfBounds {
                position: self.position,
                requested: n,
                available: self.len_bits(),
            });
        }
        Ok(())
    }
}
