//! TIFF tag value reading.
//!
//! Values are stored either inline in the IFD entry (when they fit in the
//! 4- or 8-byte value field) or at an offset in the stream. Out-of-line
//! values larger than the configured inline limit are not read; they are
//! recorded as [`TiffValue::Deferred`] with their location so callers can
//! fetch them on demand.

use serde::Serialize;

use super::parser::{IfdEntry, TiffHeader};
use super::tags::FieldType;
use crate::error::{IoError, TiffError};
use crate::io::{slice_at, ByteOrder, ByteSource};

// =============================================================================
// Value types
// =============================================================================

/// Unsigned fraction (RATIONAL).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rational {
    pub numerator: u32,
    pub denominator: u32,
}

impl Rational {
    /// The fraction as a float; `None` for a zero denominator.
    pub fn as_f64(self) -> Option<f64> {
        (self.denominator != 0).then(|| self.numerator as f64 / self.denominator as f64)
    }
}

/// Signed fraction (SRATIONAL).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SRational {
    pub numerator: i32,
    pub denominator: i32,
}

impl SRational {
    pub fn as_f64(self) -> Option<f64> {
        (self.denominator != 0).then(|| self.numerator as f64 / self.denominator as f64)
    }
}

/// A decoded tag value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum TiffValue {
    Ascii(String),
    /// BYTE, SHORT, LONG, LONG8, IFD, IFD8
    Unsigned(Vec<u64>),
    /// SBYTE, SSHORT, SLONG, SLONG8
    Signed(Vec<i64>),
    Rational(Vec<Rational>),
    SRational(Vec<SRational>),
    /// FLOAT, DOUBLE
    Float(Vec<f64>),
    Undefined(#[serde(serialize_with = "crate::format::result::serialize_hex")] Vec<u8>),
    /// Out-of-line value above the inline limit, left unread
    Deferred { offset: u64, length: u64 },
    /// Type code outside the known set
    Unknown(u16),
}

impl TiffValue {
    /// First element as an unsigned integer.
    pub fn first_u64(&self) -> Option<u64> {
        match self {
            TiffValue::Unsigned(v) => v.first().copied(),
            TiffValue::Signed(v) => v.first().and_then(|&x| u64::try_from(x).ok()),
            _ => None,
        }
    }

    /// Sum of all integer elements.
    pub fn sum_u64(&self) -> Option<u64> {
        match self {
            TiffValue::Unsigned(v) => v.iter().try_fold(0u64, |acc, &x| acc.checked_add(x)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TiffValue::Ascii(s) => Some(s),
            _ => None,
        }
    }
}

/// Decode `count` values of `field_type` from `bytes`.
pub fn decode_value(
    bytes: &[u8],
    field_type: FieldType,
    count: usize,
    order: ByteOrder,
) -> Result<TiffValue, IoError> {
    let size = field_type.size_in_bytes();
    let total = size.checked_mul(count).ok_or(IoError::RangeOutOfBounds {
        offset: 0,
        requested: u64::MAX,
        size: bytes.len() as u64,
    })?;
    let bytes = slice_at(bytes, 0, total)?;

    let unsigned = |width: usize| -> Result<TiffValue, IoError> {
        (0..count)
            .map(|i| order.read_uint(bytes, i * width, width))
            .collect::<Result<Vec<_>, _>>()
            .map(TiffValue::Unsigned)
    };
    let signed = |width: usize| -> Result<TiffValue, IoError> {
        (0..count)
            .map(|i| order.read_int(bytes, i * width, width))
            .collect::<Result<Vec<_>, _>>()
            .map(TiffValue::Signed)
    };

    Ok(match field_type {
        FieldType::Ascii => {
            let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
            TiffValue::Ascii(String::from_utf8_lossy(&bytes[..end]).into_owned())
        }
        FieldType::Undefined => TiffValue::Undefined(bytes.to_vec()),
        FieldType::Byte | FieldType::Short | FieldType::Long | FieldType::Ifd => unsigned(size)?,
        FieldType::Long8 | FieldType::Ifd8 => unsigned(8)?,
        FieldType::SByte | FieldType::SShort | FieldType::SLong | FieldType::SLong8 => signed(size)?,
        FieldType::Rational => TiffValue::Rational(
            (0..count)
                .map(|i| {
                    Ok(Rational {
                        numerator: order.read_u32(bytes, i * 8)?,
                        denominator: order.read_u32(bytes, i * 8 + 4)?,
                    })
                })
                .collect::<Result<_, IoError>>()?,
        ),
        FieldType::SRational => TiffValue::SRational(
            (0..count)
                .map(|i| {
                    Ok(SRational {
                        numerator: order.read_i32(bytes, i * 8)?,
                        denominator: order.read_i32(bytes, i * 8 + 4)?,
                    })
                })
                .collect::<Result<_, IoError>>()?,
        ),
        FieldType::Float => TiffValue::Float(
            (0..count)
                .map(|i| Ok(f32::from_bits(order.read_u32(bytes, i * 4)?) as f64))
                .collect::<Result<_, IoError>>()?,
        ),
        FieldType::Double => TiffValue::Float(
            (0..count)
                .map(|i| Ok(f64::from_bits(order.read_u64(bytes, i * 8)?)))
                .collect::<Result<_, IoError>>()?,
        ),
    })
}

// =============================================================================
// ValueReader
// =============================================================================

/// Reads tag values from a TIFF stream.
pub struct ValueReader<'a> {
    source: &'a dyn ByteSource,
    header: &'a TiffHeader,
    /// Absolute offset of the TIFF stream in the source
    base: u64,
    stream_size: u64,
    max_inline: usize,
}

impl<'a> ValueReader<'a> {
    pub fn new(
        source: &'a dyn ByteSource,
        header: &'a TiffHeader,
        base: u64,
        stream_size: u64,
        max_inline: usize,
    ) -> Self {
        Self {
            source,
            header,
            base,
            stream_size,
            max_inline,
        }
    }

    /// Read and decode an entry's value.
    ///
    /// Fails when the value would extend past the end of the stream.
    pub fn read_value(&self, entry: &IfdEntry) -> Result<TiffValue, TiffError> {
        let Some(field_type) = entry.field_type else {
            return Ok(TiffValue::Unknown(entry.field_type_raw));
        };
        let size = entry.value_byte_size().ok_or(IoError::RangeOutOfBounds {
            offset: 0,
            requested: u64::MAX,
            size: self.stream_size,
        })?;
        let order = self.header.byte_order;

        if entry.is_inline {
            return Ok(decode_value(
                &entry.value_offset_bytes,
                field_type,
                entry.count as usize,
                order,
            )?);
        }

        let offset = entry.value_offset(self.header)?;
        if offset.checked_add(size).map_or(true, |end| end > self.stream_size) {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: size,
                size: self.stream_size,
            }
            .into());
        }
        if size > self.max_inline as u64 {
            return Ok(TiffValue::Deferred {
                offset,
                length: size,
            });
        }

        let bytes = self.source.read_exact_at(self.base + offset, size as usize)?;
        Ok(decode_value(&bytes, field_type, entry.count as usize, order)?)
    }
}

// =============================================================================
// Tests
// =============================================================================
