//! TIFF decoder.
//!
//! # Key Concepts
//!
//! - **Byte order**: TIFF files declare their endianness (II = little-endian,
//!   MM = big-endian) in the header. All multi-byte values are read with it.
//!
//! - **Classic TIFF vs BigTIFF**: classic TIFF uses 32-bit offsets, BigTIFF
//!   64-bit. The parser handles both transparently.
//!
//! - **IFD chain**: each Image File Directory ends with the offset of the
//!   next one. The chain is followed with a [`LinkedWalker`], so a loop or a
//!   pointer past the end of the stream is a structural error instead of an
//!   endless walk.
//!
//! - **Inline vs offset values**: small values are stored in the entry
//!   itself, larger values at an offset. Values above the inline limit are
//!   recorded by location only.

mod parser;
mod tags;
mod values;

use std::collections::BTreeMap;

use serde::Serialize;

use super::handler::{Handler, Scope};
use super::lookup::Lookup;
use super::result::Section;
use super::walker::LinkedWalker;
use crate::error::FormatError;
use crate::io::{ByteOrder, ByteSource};

pub use parser::{Ifd, IfdEntry, TiffHeader, BIGTIFF_HEADER_SIZE, TIFF_HEADER_SIZE};
pub use tags::{FieldType, COMMENT_TAGS, COMPRESSION_METHODS, TAG_NAMES};
pub use values::{decode_value, Rational, SRational, TiffValue, ValueReader};

use tags::{TAG_BITS_PER_SAMPLE, TAG_COMPRESSION, TAG_IMAGE_LENGTH, TAG_IMAGE_WIDTH};

// =============================================================================
// Section types
// =============================================================================

/// One decoded IFD entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TiffField {
    pub tag: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'static str>,
    pub field_type: u16,
    pub count: u64,
    /// `None` when the value could not be read (see warnings)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<TiffValue>,
}

/// One decoded IFD.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TiffIfd {
    pub offset: u64,
    pub field_count: usize,
    pub fields: Vec<TiffField>,
}

impl TiffIfd {
    pub fn field(&self, tag: u16) -> Option<&TiffField> {
        self.fields.iter().find(|f| f.tag == tag)
    }
}

/// Decoded TIFF section.
#[derive(Debug, Clone, Serialize)]
pub struct TiffSection {
    pub byte_order: ByteOrder,
    pub is_bigtiff: bool,
    pub ifd: Vec<TiffIfd>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub comments: BTreeMap<&'static str, Vec<String>>,
}

/// Codec name for a compression code, with a readable fallback.
pub fn compression_name(code: u64) -> String {
    let lookup = u32::try_from(code)
        .map(|c| COMPRESSION_METHODS.resolve(c))
        .unwrap_or(Lookup::Invalid(u32::MAX));
    match lookup {
        Lookup::Value(name) => name.to_string(),
        _ => format!("unknown/invalid ({code})"),
    }
}

// =============================================================================
// Handler
// =============================================================================

/// TIFF handler.
#[derive(Debug, Default, Clone, Copy)]
pub struct TiffHandler;

impl TiffHandler {
    fn decode_ifd(
        reader: &ValueReader<'_>,
        ifd: &Ifd,
        index: usize,
        scope: &mut Scope<'_>,
        comments: &mut BTreeMap<&'static str, Vec<String>>,
    ) -> TiffIfd {
        let mut fields = Vec::with_capacity(ifd.entries.len());

        for entry in &ifd.entries {
            let value = match reader.read_value(entry) {
                Ok(TiffValue::Unknown(raw)) => {
                    scope.warn(format!(
                        "Unknown field type {raw} for tag {} in IFD {index}",
                        entry.tag
                    ));
                    Some(TiffValue::Unknown(raw))
                }
                Ok(value) => Some(value),
                Err(err) => {
                    scope.warn(format!(
                        "Cannot read value of tag {} in IFD {index}: {err}",
                        entry.tag
                    ));
                    None
                }
            };

            if let (Some(name), Some(text)) = (
                COMMENT_TAGS.name(entry.tag as u32),
                value.as_ref().and_then(TiffValue::as_str),
            ) {
                comments.entry(name).or_default().push(text.to_string());
            }

            fields.push(TiffField {
                tag: entry.tag,
                name: TAG_NAMES.name(entry.tag as u32),
                field_type: entry.field_type_raw,
                count: entry.count,
                value,
            });
        }

        TiffIfd {
            offset: ifd.offset,
            field_count: ifd.entries.len(),
            fields,
        }
    }

    fn summarize(first: &TiffIfd, scope: &mut Scope<'_>) {
        let value = |tag: u16| first.field(tag).and_then(|f| f.value.as_ref());

        let video = scope.summary_mut().video_mut("tiff");
        video.lossless = Some(true);
        video.resolution_x = value(TAG_IMAGE_WIDTH).and_then(TiffValue::first_u64);
        video.resolution_y = value(TAG_IMAGE_LENGTH).and_then(TiffValue::first_u64);
        video.bits_per_sample = value(TAG_BITS_PER_SAMPLE)
            .and_then(TiffValue::sum_u64)
            .and_then(|bits| u32::try_from(bits).ok());
        video.codec = value(TAG_COMPRESSION)
            .and_then(TiffValue::first_u64)
            .map(compression_name);
    }
}

impl Handler for TiffHandler {
    fn name(&self) -> &'static str {
        "tiff"
    }

    fn mime_type(&self) -> Option<&'static str> {
        Some("image/tiff")
    }

    fn analyze(&self, source: &dyn ByteSource, scope: &mut Scope<'_>) -> Result<(), FormatError> {
        let window = scope.window();
        let base = window.start;
        let stream_size = window.len();

        let head = source.read_up_to(base, BIGTIFF_HEADER_SIZE.min(stream_size as usize))?;
        let header = TiffHeader::parse(&head, stream_size)?;

        let config = scope.config();
        let mut walker = LinkedWalker::new(stream_size, config.max_ifds);
        let ifds = walker.walk(header.first_ifd_offset, |offset| {
            let ifd = Ifd::read(source, base, offset, stream_size, &header)?;
            let next = ifd.next_ifd_offset;
            Ok((ifd, next))
        })?;

        let reader = ValueReader::new(source, &header, base, stream_size, config.max_inline_bytes);
        let mut comments = BTreeMap::new();
        let mut decoded = Vec::with_capacity(ifds.len());
        for (index, ifd) in ifds.iter().enumerate() {
            decoded.push(Self::decode_ifd(&reader, ifd, index, scope, &mut comments));
        }

        if let Some(first) = decoded.first() {
            Self::summarize(first, scope);
        }

        scope.set_section(Section::Tiff(Box::new(TiffSection {
            byte_order: header.byte_order,
            is_bigtiff: header.is_bigtiff,
            ifd: decoded,
            comments,
        })));
        Ok(())
    }
}
