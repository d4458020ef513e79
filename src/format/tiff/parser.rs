//! TIFF header and IFD structure parsing.
//!
//! A TIFF stream opens with a two-byte order mark (`II` or `MM`) and a
//! version word. Version 42 is classic TIFF: a 4-byte first-IFD offset
//! follows, for an 8-byte header. Version 43 is BigTIFF: an offset width
//! (always 8), a reserved word and an 8-byte first-IFD offset, for a
//! 16-byte header.
//!
//! ```text
//! classic  | order | 42 | ifd0 (u32)                     |
//! BigTIFF  | order | 43 | 8 | 0 | ifd0 (u64)             |
//! ```
//!
//! All offsets are relative to the start of the TIFF stream, which is the
//! start of the payload window for a standalone file and the start of the
//! `Exif\0\0` payload for an embedded block.

use serde::Serialize;

use super::tags::FieldType;
use crate::error::{IoError, TiffError};
use crate::io::{slice_at, ByteOrder, ByteSource};

// =============================================================================
// Constants
// =============================================================================

const ORDER_MARK_INTEL: [u8; 2] = *b"II";
const ORDER_MARK_MOTOROLA: [u8; 2] = *b"MM";

const CLASSIC_VERSION: u16 = 42;
const BIG_VERSION: u16 = 43;

/// Classic header length
pub const TIFF_HEADER_SIZE: usize = 8;

/// BigTIFF header length
pub const BIGTIFF_HEADER_SIZE: usize = 16;

// =============================================================================
// TiffHeader
// =============================================================================

/// Byte order, variant and first IFD of a TIFF stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TiffHeader {
    pub byte_order: ByteOrder,
    /// 64-bit counts and offsets
    pub is_bigtiff: bool,
    /// Relative to the TIFF base
    pub first_ifd_offset: u64,
}

impl TiffHeader {
    /// Decode the header at the start of `bytes`.
    ///
    /// The first IFD must start inside a stream of `stream_size` bytes.
    pub fn parse(bytes: &[u8], stream_size: u64) -> Result<Self, TiffError> {
        let too_small = |required: usize| TiffError::FileTooSmall {
            required: required as u64,
            actual: bytes.len() as u64,
        };
        if bytes.len() < TIFF_HEADER_SIZE {
            return Err(too_small(TIFF_HEADER_SIZE));
        }

        let byte_order = match [bytes[0], bytes[1]] {
            ORDER_MARK_INTEL => ByteOrder::LittleEndian,
            ORDER_MARK_MOTOROLA => ByteOrder::BigEndian,
            mark => return Err(TiffError::InvalidMagic(u16::from_le_bytes(mark))),
        };

        let (is_bigtiff, first_ifd_offset) = match byte_order.read_u16(bytes, 2)? {
            CLASSIC_VERSION => (false, byte_order.read_u32(bytes, 4)? as u64),
            BIG_VERSION if bytes.len() < BIGTIFF_HEADER_SIZE => {
                return Err(too_small(BIGTIFF_HEADER_SIZE))
            }
            BIG_VERSION => match byte_order.read_u16(bytes, 4)? {
                8 => (true, byte_order.read_u64(bytes, 8)?),
                width => return Err(TiffError::InvalidBigTiffOffsetSize(width)),
            },
            version => return Err(TiffError::InvalidVersion(version)),
        };

        if first_ifd_offset >= stream_size {
            return Err(TiffError::InvalidIfdOffset(first_ifd_offset));
        }

        Ok(Self {
            byte_order,
            is_bigtiff,
            first_ifd_offset,
        })
    }

    /// Header length for this variant.
    #[inline]
    pub const fn header_size(&self) -> usize {
        if self.is_bigtiff {
            BIGTIFF_HEADER_SIZE
        } else {
            TIFF_HEADER_SIZE
        }
    }

    /// Size of an IFD entry in bytes.
    ///
    /// Classic TIFF: 12 bytes (2 tag + 2 type + 4 count + 4 value/offset)
    /// BigTIFF: 20 bytes (2 tag + 2 type + 8 count + 8 value/offset)
    #[inline]
    pub const fn ifd_entry_size(&self) -> usize {
        if self.is_bigtiff {
            20
        } else {
            12
        }
    }

    /// Size of the entry count field at the start of an IFD.
    #[inline]
    pub const fn ifd_count_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            2
        }
    }

    /// Size of the next IFD offset field at the end of an IFD.
    #[inline]
    pub const fn ifd_next_offset_size(&self) -> usize {
        self.value_offset_size()
    }

    /// Size of the value/offset field in an IFD entry; also the inline
    /// value threshold.
    #[inline]
    pub const fn value_offset_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            4
        }
    }

    /// Read an offset-sized field (4 or 8 bytes).
    #[inline]
    pub fn read_offset(&self, bytes: &[u8], at: usize) -> Result<u64, IoError> {
        self.byte_order.read_uint(bytes, at, self.value_offset_size())
    }

    fn read_count(&self, bytes: &[u8], at: usize) -> Result<u64, IoError> {
        self.byte_order.read_uint(bytes, at, self.ifd_count_size())
    }
}

// =============================================================================
// IfdEntry
// =============================================================================

/// One 12- or 20-byte IFD entry, undecoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfdEntry {
    pub tag: u16,
    pub field_type_raw: u16,
    /// `None` for a type code outside the TIFF 6 / BigTIFF set
    pub field_type: Option<FieldType>,
    pub count: u64,
    /// The raw value/offset field (4 or 8 bytes)
    pub value_offset_bytes: Vec<u8>,
    /// Whether the value fits in `value_offset_bytes`
    pub is_inline: bool,
}

impl IfdEntry {
    /// Parse an entry from its raw bytes.
    pub fn parse(bytes: &[u8], header: &TiffHeader) -> Result<Self, IoError> {
        let order = header.byte_order;
        let tag = order.read_u16(bytes, 0)?;
        let field_type_raw = order.read_u16(bytes, 2)?;
        let field_type = FieldType::from_u16(field_type_raw);

        let (count, value_at) = if header.is_bigtiff {
            (order.read_u64(bytes, 4)?, 12)
        } else {
            (order.read_u32(bytes, 4)? as u64, 8)
        };
        let value_offset_bytes = slice_at(bytes, value_at, header.value_offset_size())?.to_vec();

        let is_inline = field_type
            .map(|t| t.fits_inline(count, header.is_bigtiff))
            .unwrap_or(false);

        Ok(Self {
            tag,
            field_type_raw,
            field_type,
            count,
            value_offset_bytes,
            is_inline,
        })
    }

    /// Total size of the value in bytes, if the type is known and the size
    /// does not overflow.
    pub fn value_byte_size(&self) -> Option<u64> {
        let field_type = self.field_type?;
        (field_type.size_in_bytes() as u64).checked_mul(self.count)
    }

    /// Offset of an out-of-line value, relative to the TIFF base.
    pub fn value_offset(&self, header: &TiffHeader) -> Result<u64, IoError> {
        header.read_offset(&self.value_offset_bytes, 0)
    }
}

// =============================================================================
// Ifd
// =============================================================================

/// One Image File Directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ifd {
    /// Offset relative to the TIFF base
    pub offset: u64,
    pub entries: Vec<IfdEntry>,
    /// Pointer to the next IFD (0 terminates)
    pub next_ifd_offset: u64,
}

impl Ifd {
    /// Bytes occupied by an IFD with `entry_count` entries.
    pub fn calculate_size(entry_count: u64, header: &TiffHeader) -> Option<u64> {
        entry_count
            .checked_mul(header.ifd_entry_size() as u64)?
            .checked_add((header.ifd_count_size() + header.ifd_next_offset_size()) as u64)
    }

    /// Parse an IFD from bytes that begin with its entry count.
    pub fn parse(bytes: &[u8], offset: u64, header: &TiffHeader) -> Result<Self, TiffError> {
        let count = header.read_count(bytes, 0)?;
        let entry_size = header.ifd_entry_size();
        let mut at = header.ifd_count_size();

        let mut entries = Vec::with_capacity(count.min(4096) as usize);
        for _ in 0..count {
            entries.push(IfdEntry::parse(slice_at(bytes, at, entry_size)?, header)?);
            at += entry_size;
        }
        let next_ifd_offset = header.read_offset(bytes, at)?;

        Ok(Self {
            offset,
            entries,
            next_ifd_offset,
        })
    }

    /// Read the IFD at `offset` (relative to `base`) from a source.
    ///
    /// The declared entry count is checked against `stream_size` before the
    /// entry table is read.
    pub fn read(
        source: &dyn ByteSource,
        base: u64,
        offset: u64,
        stream_size: u64,
        header: &TiffHeader,
    ) -> Result<Self, TiffError> {
        let count_size = header.ifd_count_size();
        if offset.saturating_add(count_size as u64) > stream_size {
            return Err(TiffError::InvalidIfdOffset(offset));
        }
        let count_bytes = source.read_exact_at(base + offset, count_size)?;
        let count = header.read_count(&count_bytes, 0)?;

        let size = Ifd::calculate_size(count, header)
            .filter(|size| offset.saturating_add(*size) <= stream_size)
            .ok_or(TiffError::EntryCountOutOfBounds { offset, count })?;

        let bytes = source.read_exact_at(base + offset, size as usize)?;
        Ifd::parse(&bytes, offset, header)
    }

    /// First entry with the given tag.
    pub fn get_entry(&self, tag: u16) -> Option<&IfdEntry> {
        self.entries.iter().find(|e| e.tag == tag)
    }
}

// =============================================================================
// Tests
// =============================================================================
