//! Fixed-width integer reads with explicit byte order.
//!
//! Every format handled by this crate declares its endianness either
//! globally (AC-3, PNG and JPEG are big-endian; RIFF, LA and PAR2 are
//! little-endian) or per file (TIFF's `II`/`MM` marker). All reads are
//! bounds-checked: a read that would run past the buffer returns
//! [`IoError::RangeOutOfBounds`] instead of a garbage value.

use crate::error::IoError;

// =============================================================================
// ByteOrder
// =============================================================================

/// Byte order (endianness) of a multi-byte field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ByteOrder {
    /// Little-endian ("II" = Intel)
    #[serde(rename = "Intel")]
    LittleEndian,
    /// Big-endian ("MM" = Motorola)
    #[serde(rename = "Motorola")]
    BigEndian,
}

impl ByteOrder {
    /// Read an unsigned integer of `width` bytes at `offset`.
    ///
    /// `width` must be 1, 2, 4 or 8.
    pub fn read_uint(self, bytes: &[u8], offset: usize, width: usize) -> Result<u64, IoError> {
        read_uint(bytes, offset, width, self)
    }

    /// Read a two's-complement signed integer of `width` bytes at `offset`.
    pub fn read_int(self, bytes: &[u8], offset: usize, width: usize) -> Result<i64, IoError> {
        read_int(bytes, offset, width, self)
    }

    /// Read a u16 at `offset` using this byte order.
    #[inline]
    pub fn read_u16(self, bytes: &[u8], offset: usize) -> Result<u16, IoError> {
        Ok(self.read_uint(bytes, offset, 2)? as u16)
    }

    /// Read a u32 at `offset` using this byte order.
    #[inline]
    pub fn read_u32(self, bytes: &[u8], offset: usize) -> Result<u32, IoError> {
        Ok(self.read_uint(bytes, offset, 4)? as u32)
    }

    /// Read a u64 at `offset` using this byte order.
    #[inline]
    pub fn read_u64(self, bytes: &[u8], offset: usize) -> Result<u64, IoError> {
        self.read_uint(bytes, offset, 8)
    }

    /// Read an i32 at `offset` using this byte order.
    #[inline]
    pub fn read_i32(self, bytes: &[u8], offset: usize) -> Result<i32, IoError> {
        Ok(self.read_int(bytes, offset, 4)? as i32)
    }
}

// =============================================================================
// Free functions
// =============================================================================

/// Borrow `width` bytes at `offset`, or fail with a range error.
#[inline]
pub fn slice_at(bytes: &[u8], offset: usize, width: usize) -> Result<&[u8], IoError> {
    offset
        .checked_add(width)
        .and_then(|end| bytes.get(offset..end))
        .ok_or(IoError::RangeOutOfBounds {
            offset: offset as u64,
            requested: width as u64,
            size: bytes.len() as u64,
        })
}

/// Read an unsigned integer of `width` bytes (1, 2, 4 or 8) at `offset`.
pub fn read_uint(
    bytes: &[u8],
    offset: usize,
    width: usize,
    order: ByteOrder,
) -> Result<u64, IoError> {
    if !matches!(width, 1 | 2 | 4 | 8) {
        return Err(IoError::UnsupportedWidth(width));
    }
    let field = slice_at(bytes, offset, width)?;

    let value = match order {
        ByteOrder::BigEndian => field.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64),
        ByteOrder::LittleEndian => field
            .iter()
            .rev()
            .fold(0u64, |acc, &b| (acc << 8) | b as u64),
    };
    Ok(value)
}

/// Read a two's-complement signed integer of `width` bytes at `offset`.
pub fn read_int(bytes: &[u8], offset: usize, width: usize, order: ByteOrder) -> Result<i64, IoError> {
    let raw = read_uint(bytes, offset, width, order)?;
    let bits = (width * 8) as u32;
    if bits == 64 {
        return Ok(raw as i64);
    }
    // Sign-extend from the top bit of the field
    let shift = 64 - bits;
    Ok(((raw << shift) as i64) >> shift)
}

/// Read a big-endian u16 at `offset`.
#[inline]
pub fn read_u16_be(bytes: &[u8], offset: usize) -> Result<u16, IoError> {
    ByteOrder::BigEndian.read_u16(bytes, offset)
}

/// Read a little-endian u16 at `offset`.
#[inline]
pub fn read_u16_le(bytes: &[u8], offset: usize) -> Result<u16, IoError> {
    ByteOrder::LittleEndian.read_u16(bytes, offset)
}

/// Read a big-endian u32 at `offset`.
#[inline]
pub fn read_u32_be(bytes: &[u8], offset: usize) -> Result<u32, IoError> {
    ByteOrder::BigEndian.read_u32(bytes, offset)
}

/// Read a little-endian u32 at `offset`.
#[inline]
pub fn read_u32_le(bytes: &[u8], offset: usize) -> Result<u32, IoError> {
    ByteOrder::LittleEndian.read_u32(bytes, offset)
}

/// Read a little-endian u64 at `offset`.
#[inline]
pub fn read_u64_le(bytes: &[u8], offset: usize) -> Result<u64, IoError> {
    ByteOrder::LittleEndian.read_u64(bytes, offset)
}
