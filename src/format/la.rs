//! LA (Lossless Audio) decoder.
//!
//! An LA file carries the `fmt ` chunk of the WAVE file it was made from
//! inside its own header and appends the rest of the WAVE trailer after the
//! compressed audio. The handler decodes its header, then rebuilds a minimal
//! RIFF/WAVE container from those pieces and hands it to [`RiffHandler`]
//! through [`analyze_embedded`].
//!
//! # Header (little-endian)
//!
//! ```text
//! 0   "LA0" + minor version digit ('2'..'4')
//! 4   uncompressed size (u32)
//! 8   "WAVE"
//! 12  fmt size (u32, v0.3+ only)
//! ..  "fmt " chunk (24 bytes for v0.2, fmt size bytes otherwise)
//! ..  total samples (u32), flags (u8), original CRC (u32)
//! ..  seekpoints (u32 each, only when seekable)
//! ..  footer start (u32, v0.3+ only)
//! ```

use serde::Serialize;

use super::bridge::analyze_embedded;
use super::handler::{Handler, Scope};
use super::lookup::Lookup;
use super::result::Section;
use super::riff::{RiffHandler, FORMAT_TAGS};
use crate::error::FormatError;
use crate::io::{read_u16_le, read_u32_le, slice_at, ByteSource};

const MAGIC_PREFIX: &[u8; 2] = b"LA";
const V02_FMT_SIZE: u32 = 24;
const V02_HEADER_SIZE: u32 = 41;

const FLAG_SEEKABLE: u8 = 0x01;
const FLAG_HIGH_COMPRESSION: u8 = 0x02;

// =============================================================================
// Section
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LaFlags {
    pub raw: u8,
    pub seekable: bool,
    /// Only defined from v0.4
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high_compression: Option<bool>,
}

/// Decoded LA header.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LaSection {
    pub version_major: u8,
    pub version_minor: u8,
    pub version: f64,
    pub uncompressed_size: u32,
    pub fmt_size: u32,
    pub header_size: u32,
    pub format: u16,
    pub format_name: Lookup<&'static str>,
    pub channels: u16,
    pub sample_rate: u32,
    pub bytes_per_second: u32,
    pub bytes_per_sample: u16,
    pub bits_per_sample: u16,
    pub samples: u32,
    pub flags: LaFlags,
    pub original_crc: u32,
    pub blocksize: u32,
    pub seekevery: u32,
    pub seekpoint_count: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub seekpoints: Vec<u32>,
    pub footerstart: u64,
    pub compression_ratio: f64,
}

impl LaSection {
    fn at_least(&self, minor: u8) -> bool {
        self.version_minor >= minor
    }
}

// =============================================================================
// Handler
// =============================================================================

/// LA handler.
#[derive(Debug, Default, Clone, Copy)]
pub struct LaHandler;

/// Build the RIFF/WAVE buffer the encoder stripped: the stored `fmt ` chunk
/// followed by everything from the footer start to the end of the payload.
pub fn synthesize_riff(fmt_chunk: &[u8], trailer: &[u8]) -> Vec<u8> {
    let body_len = 4 + fmt_chunk.len() + trailer.len();
    let mut riff = Vec::with_capacity(8 + body_len);
    riff.extend_from_slice(b"RIFF");
    riff.extend_from_slice(&(body_len as u32).to_le_bytes());
    riff.extend_from_slice(b"WAVE");
    riff.extend_from_slice(fmt_chunk);
    riff.extend_from_slice(trailer);
    riff
}

impl Handler for LaHandler {
    fn name(&self) -> &'static str {
        "la"
    }

    fn mime_type(&self) -> Option<&'static str> {
        Some("application/octet-stream")
    }

    fn analyze(&self, source: &dyn ByteSource, scope: &mut Scope<'_>) -> Result<(), FormatError> {
        let window = scope.window();
        let raw = source.read_up_to(window.start, scope.config().read_window)?;

        let magic = slice_at(&raw, 0, 4).map_err(|_| {
            FormatError::signature(b"LA04", &raw[..raw.len().min(4)], window.start)
        })?;
        if &magic[..2] != MAGIC_PREFIX {
            return Err(FormatError::signature(b"LA04", magic, window.start));
        }
        let version_major = magic[2].wrapping_sub(b'0');
        let version_minor = magic[3].wrapping_sub(b'0');
        if version_major != 0 || !(2..=4).contains(&version_minor) {
            return Err(FormatError::UnsupportedVersion {
                format: "la",
                found: format!("{}.{}", magic[2] as char, magic[3] as char),
                supported: "0.2 to 0.4".into(),
            });
        }

        let uncompressed_size = read_u32_le(&raw, 4)?;
        if uncompressed_size == 0 {
            return Err(FormatError::ZeroField {
                format: "la",
                field: "uncompressed_size",
            });
        }
        let wave = slice_at(&raw, 8, 4)?;
        if wave != b"WAVE" {
            return Err(FormatError::signature(b"WAVE", wave, window.start + 8));
        }

        let mut offset = 12usize;
        let (fmt_size, header_size) = if version_minor >= 3 {
            let fmt_size = read_u32_le(&raw, offset)?;
            offset += 4;
            (fmt_size, fmt_size.saturating_add(49 - 24))
        } else {
            (V02_FMT_SIZE, V02_HEADER_SIZE)
        };

        let fmt_start = offset;
        let fmt_id = slice_at(&raw, offset, 4)?;
        if fmt_id != b"fmt " {
            return Err(FormatError::signature(b"fmt ", fmt_id, window.start + offset as u64));
        }
        let format = read_u16_le(&raw, offset + 8)?;
        let channels = read_u16_le(&raw, offset + 10)?;
        if channels == 0 {
            return Err(FormatError::ZeroField {
                format: "la",
                field: "channels",
            });
        }
        let sample_rate = read_u32_le(&raw, offset + 12)?;
        if sample_rate == 0 {
            return Err(FormatError::ZeroField {
                format: "la",
                field: "sample_rate",
            });
        }
        let bytes_per_second = read_u32_le(&raw, offset + 16)?;
        let bytes_per_sample = read_u16_le(&raw, offset + 20)?;
        let bits_per_sample = read_u16_le(&raw, offset + 22)?;
        offset += (fmt_size.max(V02_FMT_SIZE)) as usize;

        let samples = read_u32_le(&raw, offset)?;
        let flags_raw = slice_at(&raw, offset + 4, 1)?[0];
        let original_crc = read_u32_le(&raw, offset + 5)?;
        offset += 9;

        let mut section = LaSection {
            version_major,
            version_minor,
            version: version_major as f64 + version_minor as f64 / 10.0,
            uncompressed_size,
            fmt_size,
            header_size,
            format,
            format_name: FORMAT_TAGS.resolve(format as u32),
            channels,
            sample_rate,
            bytes_per_second,
            bytes_per_sample,
            bits_per_sample,
            samples,
            flags: LaFlags {
                raw: flags_raw,
                seekable: flags_raw & FLAG_SEEKABLE != 0,
                high_compression: (version_minor >= 4).then_some(flags_raw & FLAG_HIGH_COMPRESSION != 0),
            },
            original_crc,
            blocksize: 0,
            seekevery: 0,
            seekpoint_count: 0,
            seekpoints: Vec::new(),
            footerstart: 0,
            compression_ratio: 0.0,
        };

        // Seekpoints are added every blocksize * seekevery samples
        (section.blocksize, section.seekevery) = if section.at_least(4) {
            (61440, 19)
        } else {
            (73728, 16)
        };

        if section.flags.seekable {
            let declared = samples / (section.blocksize * section.seekevery);
            let footer_len = if section.at_least(3) { 4 } else { 0 };
            let room = (raw.len().saturating_sub(offset + footer_len) / 4) as u32;
            if declared > room {
                scope.warn(format!(
                    "Seekpoint table of {declared} entries exceeds the header read window; reading {room}"
                ));
            }
            section.seekpoint_count = declared.min(room);
            for i in 0..section.seekpoint_count as usize {
                section.seekpoints.push(read_u32_le(&raw, offset + i * 4)?);
            }
            offset += section.seekpoint_count as usize * 4;
        }

        let filesize = window.len();
        section.footerstart = if section.at_least(3) {
            let footerstart = read_u32_le(&raw, offset)? as u64;
            offset += 4;
            if footerstart > filesize {
                scope.warn(format!(
                    "FooterStart value points to offset {footerstart} which is beyond end-of-file ({filesize})"
                ));
                filesize
            } else {
                footerstart
            }
        } else {
            filesize
        };

        if section.footerstart < filesize {
            let fmt_len = (fmt_size.max(V02_FMT_SIZE)) as usize;
            let fmt_chunk = slice_at(&raw, fmt_start, fmt_len)?;
            let trailer = source.read_exact_at(
                window.start + section.footerstart,
                (filesize - section.footerstart) as usize,
            )?;
            analyze_embedded(scope, &RiffHandler, synthesize_riff(fmt_chunk, &trailer));
        }

        let audio_start = window.start + offset as u64;
        let audio_end = window.start + section.footerstart;
        scope.narrow_window(audio_start, audio_end);
        let audio_len = scope.window().len();

        section.compression_ratio = audio_len as f64 / uncompressed_size as f64;
        let playtime = samples as f64 / sample_rate as f64 / channels as f64;
        if playtime == 0.0 {
            return Err(FormatError::ZeroField {
                format: "la",
                field: "playtime_seconds",
            });
        }
        let bitrate = audio_len as f64 * 8.0 / playtime;

        let summary = scope.summary_mut();
        summary.playtime_seconds = Some(playtime);
        summary.bitrate = Some(bitrate);
        let audio = summary.audio_mut("la");
        audio.lossless = Some(true);
        audio.channels = Some(channels as u32);
        audio.sample_rate = Some(sample_rate);
        audio.bits_per_sample = Some(bits_per_sample as u32);
        audio.bitrate = Some(bitrate);
        audio.compression_ratio = Some(section.compression_ratio);
        audio.encoder = Some(format!("LA v{}", section.version));

        scope.set_section(Section::La(Box::new(section)));
        Ok(())
    }
}
