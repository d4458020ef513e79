//! Format detection from leading magic bytes.
//!
//! Detection only looks at the first [`DETECT_BYTES`] bytes. The handler
//! chosen here still validates its own signature, so a false positive ends
//! in a structural error rather than a wrong result.
//!
//! Checks run strongest signature first; the two-byte AC-3 sync word is
//! tried last.

use crate::io::ByteOrder;

use super::ac3::SYNC_WORD;
use super::jpeg::JPEG_SIGNATURE;
use super::par2::PACKET_MAGIC;
use super::png::PNG_SIGNATURE;
use super::tiff::TIFF_HEADER_SIZE;

/// Bytes read from the start of the payload for detection.
pub const DETECT_BYTES: usize = 16;

// =============================================================================
// FormatKind
// =============================================================================

/// Format family recognized by [`detect_format`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatKind {
    Ac3,
    Png,
    Tiff,
    Jpeg,
    La,
    Riff,
    Par2,
}

impl FormatKind {
    /// Get a human-readable name for the format.
    pub const fn name(&self) -> &'static str {
        match self {
            FormatKind::Ac3 => "Dolby AC-3",
            FormatKind::Png => "PNG",
            FormatKind::Tiff => "TIFF",
            FormatKind::Jpeg => "JPEG",
            FormatKind::La => "Lossless Audio (LA)",
            FormatKind::Riff => "RIFF/WAVE",
            FormatKind::Par2 => "PAR2",
        }
    }
}

// =============================================================================
// Format Detection
// =============================================================================

/// Map the leading bytes of a payload to a format family.
pub fn detect_format(head: &[u8]) -> Option<FormatKind> {
    if head.starts_with(&PNG_SIGNATURE) {
        return Some(FormatKind::Png);
    }
    if head.starts_with(&JPEG_SIGNATURE) {
        return Some(FormatKind::Jpeg);
    }
    if head.starts_with(PACKET_MAGIC) {
        return Some(FormatKind::Par2);
    }
    if head.len() >= 12 && &head[..4] == b"RIFF" && &head[8..12] == b"WAVE" {
        return Some(FormatKind::Riff);
    }
    if head.len() >= 4 && &head[..3] == b"LA0" && head[3].is_ascii_digit() {
        return Some(FormatKind::La);
    }
    if is_tiff_header(head) {
        return Some(FormatKind::Tiff);
    }
    if head.starts_with(&SYNC_WORD) {
        return Some(FormatKind::Ac3);
    }
    None
}

/// Check for a TIFF or BigTIFF byte-order mark followed by version 42 or 43.
pub fn is_tiff_header(bytes: &[u8]) -> bool {
    if bytes.len() < TIFF_HEADER_SIZE {
        return false;
    }

    let byte_order = match &bytes[0..2] {
        b"II" => ByteOrder::LittleEndian,
        b"MM" => ByteOrder::BigEndian,
        _ => return false,
    };

    matches!(byte_order.read_u16(bytes, 2), Ok(42) | Ok(43))
}

// =============================================================================
// Tests
// =============================================================================
