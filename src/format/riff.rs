//! RIFF/WAVE chunk decoder.
//!
//! ```text
//! "RIFF" | size(u32 LE) | form type(4) | chunk*
//! chunk:  id(4) | size(u32 LE) | data(size) | pad byte if size is odd
//! ```
//!
//! The declared RIFF size bounds the walk; a size past the end of the file
//! is clamped with a warning. `data` payloads are located but never read.

use std::collections::BTreeMap;

use serde::Serialize;

use super::handler::{Handler, Scope};
use super::lookup::{Entry, Lookup, SparseTable};
use super::result::Section;
use super::walker::{Framing, Record, RecordHeader, SequentialWalker};
use crate::error::{FormatError, IoError};
use crate::io::{read_u16_le, read_u32_le, slice_at, ByteSource, PayloadWindow};

/// "RIFF" + size + form type
pub const RIFF_HEADER_SIZE: usize = 12;

const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;

const fn fourcc(id: &[u8; 4]) -> u32 {
    u32::from_be_bytes(*id)
}

// =============================================================================
// Lookup tables
// =============================================================================

/// `wFormatTag` names.
pub static FORMAT_TAGS: SparseTable<&str> = SparseTable::new(&[
    (0x0000, Entry::Reserved),
    (0x0001, Entry::Value("Pulse Code Modulation (PCM)")),
    (0x0002, Entry::Value("Microsoft ADPCM")),
    (0x0003, Entry::Value("IEEE Float")),
    (0x0006, Entry::Value("Microsoft A-Law")),
    (0x0007, Entry::Value("Microsoft mu-Law")),
    (0x0011, Entry::Value("Intel DVI/IMA ADPCM")),
    (0x0031, Entry::Value("Microsoft GSM 6.10")),
    (0x0050, Entry::Value("MPEG")),
    (0x0055, Entry::Value("MPEG Layer-3")),
    (0x00FF, Entry::Value("AAC")),
    (0x0161, Entry::Value("Windows Media Audio")),
    (0x2000, Entry::Value("AC-3")),
    (0x2001, Entry::Value("DTS")),
    (0xFFFE, Entry::Value("WAVE_FORMAT_EXTENSIBLE")),
    (0xFFFF, Entry::Reserved),
]);

/// LIST/INFO item names.
pub static INFO_NAMES: SparseTable<&str> = SparseTable::new(&[
    (fourcc(b"IARL"), Entry::Value("archivallocation")),
    (fourcc(b"IART"), Entry::Value("artist")),
    (fourcc(b"ICMS"), Entry::Value("commissioned")),
    (fourcc(b"ICMT"), Entry::Value("comment")),
    (fourcc(b"ICOP"), Entry::Value("copyright")),
    (fourcc(b"ICRD"), Entry::Value("creationdate")),
    (fourcc(b"IENG"), Entry::Value("engineers")),
    (fourcc(b"IGNR"), Entry::Value("genre")),
    (fourcc(b"IKEY"), Entry::Value("keywords")),
    (fourcc(b"IMED"), Entry::Value("medium")),
    (fourcc(b"INAM"), Entry::Value("title")),
    (fourcc(b"IPRD"), Entry::Value("product")),
    (fourcc(b"ISBJ"), Entry::Value("subject")),
    (fourcc(b"ISFT"), Entry::Value("software")),
    (fourcc(b"ISRC"), Entry::Value("source")),
    (fourcc(b"ITCH"), Entry::Value("technician")),
    (fourcc(b"ITRK"), Entry::Value("track")),
]);

// =============================================================================
// Section types
// =============================================================================

/// Decoded `fmt ` chunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaveFormat {
    pub format_tag: u16,
    pub format_name: Lookup<&'static str>,
    pub channels: u16,
    pub sample_rate: u32,
    pub bytes_per_second: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensible: Option<WaveFormatExtensible>,
}

impl WaveFormat {
    /// Effective format tag (the sub-format for WAVE_FORMAT_EXTENSIBLE).
    pub fn effective_tag(&self) -> u16 {
        self.extensible
            .as_ref()
            .map_or(self.format_tag, |ext| ext.sub_format_tag)
    }

    pub fn is_lossless(&self) -> bool {
        matches!(self.effective_tag(), 0x0001 | 0x0003)
    }
}

/// WAVE_FORMAT_EXTENSIBLE tail of `fmt `.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaveFormatExtensible {
    pub valid_bits_per_sample: u16,
    pub channel_mask: u32,
    /// GUID in registry form
    pub sub_format: String,
    pub sub_format_tag: u16,
    pub sub_format_name: Lookup<&'static str>,
}

/// One LIST/INFO item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InfoItem {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'static str>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum RiffChunkBody {
    Format(WaveFormat),
    Fact { sample_length: u32 },
    /// Audio payload; located, not read
    Data { offset: u64, length: u64 },
    Info(Vec<InfoItem>),
    List { list_type: String },
    Raw(#[serde(serialize_with = "super::result::serialize_hex_opt")] Option<Vec<u8>>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiffChunk {
    pub offset: u64,
    pub id: String,
    pub length: u64,
    pub body: RiffChunkBody,
}

/// Decoded RIFF section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiffSection {
    pub form_type: String,
    pub declared_size: u32,
    pub chunks: Vec<RiffChunk>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub comments: BTreeMap<String, Vec<String>>,
}

impl RiffSection {
    pub fn format(&self) -> Option<&WaveFormat> {
        self.chunks.iter().find_map(|c| match &c.body {
            RiffChunkBody::Format(fmt) => Some(fmt),
            _ => None,
        })
    }

    pub fn chunk(&self, id: &str) -> Option<&RiffChunk> {
        self.chunks.iter().find(|c| c.id == id)
    }
}

// =============================================================================
// Framing
// =============================================================================

struct RiffFraming {
    max_inline: usize,
}

impl Framing for RiffFraming {
    type Tag = [u8; 4];

    fn header_len(&self) -> usize {
        8
    }

    fn parse_header(
        &self,
        header: &[u8],
        _offset: u64,
    ) -> Result<RecordHeader<[u8; 4]>, FormatError> {
        let mut tag = [0u8; 4];
        tag.copy_from_slice(slice_at(header, 0, 4)?);
        Ok(RecordHeader {
            tag,
            payload_len: read_u32_le(header, 4)? as u64,
        })
    }

    fn padding(&self, header: &RecordHeader<[u8; 4]>) -> u64 {
        header.payload_len & 1
    }

    fn retain_payload(&self, header: &RecordHeader<[u8; 4]>) -> bool {
        &header.tag != b"data" && header.payload_len <= self.max_inline as u64
    }
}

fn fourcc_text(id: &[u8]) -> String {
    id.iter().map(|&b| b as char).collect()
}

/// NUL-terminated text, lossy.
fn zstring(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Registry-form GUID from its little-endian storage layout.
fn guid_string(b: &[u8]) -> Result<String, IoError> {
    let d1 = read_u32_le(b, 0)?;
    let d2 = read_u16_le(b, 4)?;
    let d3 = read_u16_le(b, 6)?;
    let tail = slice_at(b, 8, 8)?;
    Ok(format!(
        "{d1:08X}-{d2:04X}-{d3:04X}-{}-{}",
        hex::encode_upper(&tail[..2]),
        hex::encode_upper(&tail[2..])
    ))
}

fn decode_format(data: &[u8]) -> Result<WaveFormat, IoError> {
    let format_tag = read_u16_le(data, 0)?;

    let extensible = if format_tag == WAVE_FORMAT_EXTENSIBLE && data.len() >= 40 {
        let guid = slice_at(data, 24, 16)?;
        let sub_format_tag = read_u16_le(guid, 0)?;
        Some(WaveFormatExtensible {
            valid_bits_per_sample: read_u16_le(data, 18)?,
            channel_mask: read_u32_le(data, 20)?,
            sub_format: guid_string(guid)?,
            sub_format_tag,
            sub_format_name: FORMAT_TAGS.resolve(sub_format_tag as u32),
        })
    } else {
        None
    };

    Ok(WaveFormat {
        format_tag,
        format_name: FORMAT_TAGS.resolve(format_tag as u32),
        channels: read_u16_le(data, 2)?,
        sample_rate: read_u32_le(data, 4)?,
        bytes_per_second: read_u32_le(data, 8)?,
        block_align: read_u16_le(data, 12)?,
        bits_per_sample: read_u16_le(data, 14)?,
        extensible,
    })
}

/// Walk the sub-chunks of a LIST/INFO payload (after the list type).
fn decode_info(data: &[u8], max_records: usize) -> Result<Vec<InfoItem>, IoError> {
    let mut items = Vec::new();
    let mut at = 0usize;
    while at + 8 <= data.len() && items.len() < max_records {
        let id = slice_at(data, at, 4)?;
        let len = read_u32_le(data, at + 4)? as usize;
        let text = slice_at(data, at + 8, len)?;
        items.push(InfoItem {
            id: fourcc_text(id),
            name: INFO_NAMES.name(u32::from_be_bytes([id[0], id[1], id[2], id[3]])),
            text: zstring(text),
        });
        at += 8 + len + (len & 1);
    }
    Ok(items)
}

// =============================================================================
// Handler
// =============================================================================

/// RIFF handler (WAVE forms decoded).
#[derive(Debug, Default, Clone, Copy)]
pub struct RiffHandler;

impl RiffHandler {
    fn decode_chunk(
        record: Record<[u8; 4]>,
        scope: &mut Scope<'_>,
        section: &mut RiffSection,
        data_window: &mut Option<PayloadWindow>,
    ) -> Result<(), FormatError> {
        let id = fourcc_text(&record.tag);
        let body = match (&record.tag, &record.payload) {
            (b"data", _) => {
                let offset = record.payload_offset();
                *data_window = Some(PayloadWindow::new(offset, offset + record.length));
                RiffChunkBody::Data {
                    offset,
                    length: record.length,
                }
            }
            (b"fmt ", Some(data)) => {
                let fmt = decode_format(data)?;
                if fmt.channels == 0 {
                    return Err(FormatError::ZeroField {
                        format: "riff",
                        field: "channels",
                    });
                }
                if fmt.sample_rate == 0 {
                    return Err(FormatError::ZeroField {
                        format: "riff",
                        field: "sample_rate",
                    });
                }
                RiffChunkBody::Format(fmt)
            }
            (b"fact", Some(data)) => RiffChunkBody::Fact {
                sample_length: read_u32_le(data, 0)?,
            },
            (b"LIST", Some(data)) => {
                let list_type = slice_at(data, 0, 4)?;
                if list_type == b"INFO" {
                    match decode_info(&data[4..], scope.config().max_records) {
                        Ok(items) => {
                            for item in &items {
                                let key = item.name.map_or_else(|| item.id.clone(), str::to_string);
                                section.comments.entry(key).or_default().push(item.text.clone());
                            }
                            RiffChunkBody::Info(items)
                        }
                        Err(err) => {
                            scope.warn(format!("Malformed LIST/INFO chunk: {err}"));
                            RiffChunkBody::Raw(Some(data.to_vec()))
                        }
                    }
                } else {
                    scope.warn(format!("Unhandled LIST type: {}", fourcc_text(list_type)));
                    RiffChunkBody::List {
                        list_type: fourcc_text(list_type),
                    }
                }
            }
            (_, None) => {
                scope.warn(format!(
                    "{id} chunk of {} bytes not decoded (exceeds inline limit)",
                    record.length
                ));
                RiffChunkBody::Raw(None)
            }
            (_, Some(data)) => {
                scope.warn(format!("Unhandled chunk type: {id}"));
                RiffChunkBody::Raw(Some(data.to_vec()))
            }
        };

        section.chunks.push(RiffChunk {
            offset: record.offset,
            id,
            length: record.length,
            body,
        });
        Ok(())
    }

    fn summarize(section: &RiffSection, data_window: Option<PayloadWindow>, scope: &mut Scope<'_>) {
        let Some(fmt) = section.format().cloned() else {
            return;
        };
        let fact = section.chunks.iter().find_map(|c| match c.body {
            RiffChunkBody::Fact { sample_length } => Some(sample_length),
            _ => None,
        });

        let summary = scope.summary_mut();
        let audio = summary.audio_mut("wav");
        audio.sample_rate = Some(fmt.sample_rate);
        audio.channels = Some(fmt.channels as u32);
        audio.bits_per_sample = Some(fmt.bits_per_sample as u32);
        audio.bitrate = Some(fmt.bytes_per_second as f64 * 8.0);
        audio.bitrate_mode = Some("cbr".into());
        audio.lossless = Some(fmt.is_lossless());

        summary.playtime_seconds = match (data_window, fact) {
            (_, Some(samples)) if !fmt.is_lossless() => Some(samples as f64 / fmt.sample_rate as f64),
            (Some(data), _) if fmt.bytes_per_second > 0 => {
                Some(data.len() as f64 / fmt.bytes_per_second as f64)
            }
            _ => None,
        };
        summary.bitrate = summary.audio.as_ref().and_then(|a| a.bitrate);
    }
}

impl Handler for RiffHandler {
    fn name(&self) -> &'static str {
        "riff"
    }

    fn mime_type(&self) -> Option<&'static str> {
        Some("audio/wav")
    }

    fn analyze(&self, source: &dyn ByteSource, scope: &mut Scope<'_>) -> Result<(), FormatError> {
        let window = scope.window();
        let head = source.read_up_to(window.start, RIFF_HEADER_SIZE)?;
        if head.len() < RIFF_HEADER_SIZE || &head[..4] != b"RIFF" {
            return Err(FormatError::signature(b"RIFF", &head[..head.len().min(4)], window.start));
        }
        let declared_size = read_u32_le(&head, 4)?;
        let form_type = fourcc_text(&head[8..12]);

        let mut end = window.start + 8 + declared_size as u64;
        if end > window.end {
            scope.warn(format!(
                "RIFF size {} extends to offset {} which is beyond end-of-file ({}); clamped",
                declared_size, end, window.end
            ));
            end = window.end;
        }

        let config = scope.config();
        let walker = SequentialWalker::new(
            source,
            RiffFraming {
                max_inline: config.max_inline_bytes,
            },
            window.start + RIFF_HEADER_SIZE as u64,
            end,
            config.max_records,
        );

        let mut section = RiffSection {
            form_type,
            declared_size,
            chunks: Vec::new(),
            comments: BTreeMap::new(),
        };
        let mut data_window = None;
        for record in walker {
            Self::decode_chunk(record?, scope, &mut section, &mut data_window)?;
        }

        if section.form_type == "WAVE" && section.format().is_none() {
            return Err(FormatError::malformed("riff", "WAVE form without fmt chunk"));
        }

        Self::summarize(&section, data_window, scope);
        if let Some(data) = data_window {
            scope.narrow_window(data.start, data.end);
        }
        scope.set_section(Section::Riff(Box::new(section)));
        Ok(())
    }
}
