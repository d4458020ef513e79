//! PAR2 (Parity Volume Set 2.0) packet decoder.
//!
//! ```text
//! packet: magic "PAR2\0PKT" | length (u64 LE, whole packet) | MD5 (16)
//!         | recovery set id (16) | type (16) | body (length - 64)
//! ```
//!
//! The MD5 covers everything from the recovery set id to the end of the
//! packet. Recovery slice bodies are hashed straight from the source in
//! blocks and never retained.

use md5::{Digest, Md5};
use serde::Serialize;

use super::handler::{Handler, Scope};
use super::result::Section;
use super::walker::{Framing, Record, RecordHeader, SequentialWalker};
use crate::error::{FormatError, IoError};
use crate::io::{read_u32_le, read_u64_le, slice_at, ByteSource};

pub const PACKET_MAGIC: &[u8; 8] = b"PAR2\0PKT";
pub const PACKET_HEADER_SIZE: usize = 64;

const TYPE_MAIN: &[u8; 16] = b"PAR 2.0\0Main\0\0\0\0";
const TYPE_FILE_DESC: &[u8; 16] = b"PAR 2.0\0FileDesc";
const TYPE_IFSC: &[u8; 16] = b"PAR 2.0\0IFSC\0\0\0\0";
const TYPE_RECOVERY_SLICE: &[u8; 16] = b"PAR 2.0\0RecvSlic";
const TYPE_CREATOR: &[u8; 16] = b"PAR 2.0\0Creator\0";

/// Bytes hashed per read when verifying packets that are not retained
const HASH_BLOCK: usize = 64 * 1024;

// =============================================================================
// Section types
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Par2Body {
    Main {
        slice_size: u64,
        recovery_file_count: u32,
        recovery_file_ids: Vec<String>,
        non_recovery_file_ids: Vec<String>,
    },
    FileDesc {
        file_id: String,
        md5_full: String,
        md5_16k: String,
        length: u64,
        name: String,
    },
    Ifsc {
        file_id: String,
        block_count: usize,
    },
    RecoverySlice {
        exponent: u32,
        data_length: u64,
    },
    Creator {
        client: String,
    },
    Raw(#[serde(serialize_with = "super::result::serialize_hex_opt")] Option<Vec<u8>>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Par2Packet {
    pub offset: u64,
    pub length: u64,
    pub packet_type: String,
    pub recovery_set_id: String,
    pub md5: String,
    /// `None` when verification is disabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub md5_verified: Option<bool>,
    pub body: Par2Body,
}

/// Decoded PAR2 section.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Par2Section {
    pub packets: Vec<Par2Packet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    pub recovery_slice_count: usize,
    pub files: Vec<String>,
}

// =============================================================================
// Framing
// =============================================================================

struct Par2Framing {
    max_inline: usize,
}

impl Framing for Par2Framing {
    type Tag = [u8; 16];

    fn header_len(&self) -> usize {
        PACKET_HEADER_SIZE
    }

    fn parse_header(
        &self,
        header: &[u8],
        offset: u64,
    ) -> Result<RecordHeader<[u8; 16]>, FormatError> {
        let magic = slice_at(header, 0, 8)?;
        if magic != PACKET_MAGIC {
            return Err(FormatError::signature(PACKET_MAGIC, magic, offset));
        }
        let length = read_u64_le(header, 8)?;
        if length < PACKET_HEADER_SIZE as u64 || length % 4 != 0 {
            return Err(FormatError::malformed(
                "par2",
                format!("invalid packet length {length}"),
            ));
        }
        let mut tag = [0u8; 16];
        tag.copy_from_slice(slice_at(header, 48, 16)?);
        Ok(RecordHeader {
            tag,
            payload_len: length - PACKET_HEADER_SIZE as u64,
        })
    }

    fn retain_payload(&self, header: &RecordHeader<[u8; 16]>) -> bool {
        &header.tag != TYPE_RECOVERY_SLICE && header.payload_len <= self.max_inline as u64
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Packet type as text, NUL padding stripped.
fn type_text(tag: &[u8]) -> String {
    String::from_utf8_lossy(tag)
        .trim_end_matches('\0')
        .replace('\0', " ")
}

fn ids(data: &[u8], count: usize) -> Result<Vec<String>, IoError> {
    (0..count)
        .map(|i| slice_at(data, i * 16, 16).map(hex::encode))
        .collect()
}

/// MD5 of the hashed region of a packet (from the recovery set id on).
fn packet_md5(source: &dyn ByteSource, record: &Record<[u8; 16]>) -> Result<[u8; 16], IoError> {
    let mut hasher = Md5::new();
    hasher.update(&record.header[32..]);
    match &record.payload {
        Some(payload) => hasher.update(payload),
        None => {
            let mut offset = record.payload_offset();
            let end = offset + record.length;
            while offset < end {
                let len = (end - offset).min(HASH_BLOCK as u64) as usize;
                hasher.update(source.read_exact_at(offset, len)?);
                offset += len as u64;
            }
        }
    }
    Ok(hasher.finalize().into())
}

fn decode_body(tag: &[u8; 16], data: &[u8]) -> Result<Option<Par2Body>, IoError> {
    let body = match tag {
        TYPE_MAIN => {
            let slice_size = read_u64_le(data, 0)?;
            let recovery_file_count = read_u32_le(data, 8)?;
            let ids_data = &data[12..];
            let total = ids_data.len() / 16;
            let recovery = (recovery_file_count as usize).min(total);
            Par2Body::Main {
                slice_size,
                recovery_file_count,
                recovery_file_ids: ids(ids_data, recovery)?,
                non_recovery_file_ids: ids(&ids_data[recovery * 16..], total - recovery)?,
            }
        }
        TYPE_FILE_DESC => {
            let name = slice_at(data, 56, data.len().saturating_sub(56))?;
            let end = name.iter().position(|&b| b == 0).unwrap_or(name.len());
            Par2Body::FileDesc {
                file_id: hex::encode(slice_at(data, 0, 16)?),
                md5_full: hex::encode(slice_at(data, 16, 16)?),
                md5_16k: hex::encode(slice_at(data, 32, 16)?),
                length: read_u64_le(data, 48)?,
                name: String::from_utf8_lossy(&name[..end]).into_owned(),
            }
        }
        TYPE_IFSC => Par2Body::Ifsc {
            file_id: hex::encode(slice_at(data, 0, 16)?),
            block_count: data.len().saturating_sub(16) / 20,
        },
        TYPE_CREATOR => {
            let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
            Par2Body::Creator {
                client: String::from_utf8_lossy(&data[..end]).into_owned(),
            }
        }
        _ => return Ok(None),
    };
    Ok(Some(body))
}

// =============================================================================
// Handler
// =============================================================================

/// PAR2 handler.
#[derive(Debug, Default, Clone, Copy)]
pub struct Par2Handler;

impl Par2Handler {
    fn decode_packet(
        source: &dyn ByteSource,
        record: Record<[u8; 16]>,
        scope: &mut Scope<'_>,
        section: &mut Par2Section,
    ) -> Result<(), FormatError> {
        let packet_type = type_text(&record.tag);
        let stored_md5 = slice_at(&record.header, 16, 16)?;

        let md5_verified = if scope.config().verify_checksums {
            let computed = packet_md5(source, &record)?;
            let ok = computed[..] == *stored_md5;
            if !ok {
                scope.warn(format!(
                    "MD5 mismatch in {packet_type} packet at offset {}: stored {}, computed {}",
                    record.offset,
                    hex::encode(stored_md5),
                    hex::encode(computed)
                ));
            }
            Some(ok)
        } else {
            None
        };

        let body = if &record.tag == TYPE_RECOVERY_SLICE && record.length < 4 {
            scope.warn(format!(
                "Truncated recovery slice at offset {}: {} bytes, expected at least 4",
                record.offset, record.length
            ));
            Par2Body::Raw(record.payload.as_ref().map(|data| data.to_vec()))
        } else if &record.tag == TYPE_RECOVERY_SLICE {
            let exponent = match &record.payload {
                Some(payload) => read_u32_le(payload, 0)?,
                None => {
                    let head = source.read_exact_at(record.payload_offset(), 4)?;
                    read_u32_le(&head, 0)?
                }
            };
            section.recovery_slice_count += 1;
            Par2Body::RecoverySlice {
                exponent,
                data_length: record.length.saturating_sub(4),
            }
        } else if let Some(data) = &record.payload {
            match decode_body(&record.tag, data) {
                Ok(Some(body)) => body,
                Ok(None) => {
                    scope.warn(format!("Unhandled packet type: {packet_type}"));
                    Par2Body::Raw(Some(data.to_vec()))
                }
                Err(err) => {
                    scope.warn(format!("Malformed {packet_type} packet: {err}"));
                    Par2Body::Raw(Some(data.to_vec()))
                }
            }
        } else {
            scope.warn(format!(
                "{packet_type} packet of {} bytes not decoded (exceeds inline limit)",
                record.length
            ));
            Par2Body::Raw(None)
        };

        match &body {
            Par2Body::Creator { client } => section.creator = Some(client.clone()),
            Par2Body::FileDesc { name, .. } if !section.files.contains(name) => {
                section.files.push(name.clone())
            }
            _ => {}
        }

        section.packets.push(Par2Packet {
            offset: record.offset,
            length: record.length + PACKET_HEADER_SIZE as u64,
            packet_type,
            recovery_set_id: hex::encode(slice_at(&record.header, 32, 16)?),
            md5: hex::encode(stored_md5),
            md5_verified,
            body,
        });
        Ok(())
    }
}

impl Handler for Par2Handler {
    fn name(&self) -> &'static str {
        "par2"
    }

    fn mime_type(&self) -> Option<&'static str> {
        Some("application/x-par2")
    }

    fn analyze(&self, source: &dyn ByteSource, scope: &mut Scope<'_>) -> Result<(), FormatError> {
        let window = scope.window();
        let magic = source.read_up_to(window.start, PACKET_MAGIC.len())?;
        if magic[..] != PACKET_MAGIC[..] {
            return Err(FormatError::signature(PACKET_MAGIC, &magic, window.start));
        }

        let config = scope.config();
        let walker = SequentialWalker::new(
            source,
            Par2Framing {
                max_inline: config.max_inline_bytes,
            },
            window.start,
            window.end,
            config.max_records,
        );

        let mut section = Par2Section::default();
        for record in walker {
            Self::decode_packet(source, record?, scope, &mut section)?;
        }

        scope.set_section(Section::Par2(Box::new(section)));
        Ok(())
    }
}
