//! The per-session result tree and diagnostic logs.
//!
//! A [`ResultTree`] holds one [`Section`] per decoded format, keyed by the
//! format's short name, a set of normalized [`Summary`] fields that every
//! applicable handler fills for uniform downstream use, and two ordered
//! diagnostic logs.
//!
//! Handlers never touch the tree directly. They write into a staging
//! [`Scope`](super::Scope) that the session commits on success and discards
//! on failure, so a failed format leaves no partial section behind.

use std::collections::BTreeMap;

use serde::Serialize;

use super::ac3::Ac3Section;
use super::jpeg::JpegSection;
use super::la::LaSection;
use super::par2::Par2Section;
use super::png::PngSection;
use super::riff::RiffSection;
use super::tiff::TiffSection;
use crate::io::PayloadWindow;
use crate::tags::{ExifData, IptcData, XmpData};

// =============================================================================
// Diagnostics
// =============================================================================

/// One entry of the `errors` or `warnings` log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Short name of the format that produced the entry
    pub format: &'static str,
    pub message: String,
}

impl Diagnostic {
    pub fn new(format: &'static str, message: impl Into<String>) -> Self {
        Self {
            format,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.format, self.message)
    }
}

/// Serialize bytes as a lower-case hex string.
pub(crate) fn serialize_hex<S: serde::Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&hex::encode(bytes))
}

pub(crate) fn serialize_hex_opt<S: serde::Serializer>(
    bytes: &Option<Vec<u8>>,
    s: S,
) -> Result<S::Ok, S::Error> {
    match bytes {
        Some(bytes) => serialize_hex(bytes, s),
        None => s.serialize_none(),
    }
}

// =============================================================================
// Sections
// =============================================================================

/// A format-specific section of the result tree.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Section {
    Ac3(Box<Ac3Section>),
    Png(Box<PngSection>),
    Tiff(Box<TiffSection>),
    Jpeg(Box<JpegSection>),
    La(Box<LaSection>),
    Riff(Box<RiffSection>),
    Par2(Box<Par2Section>),
    Exif(Box<ExifData>),
    Iptc(Box<IptcData>),
    Xmp(Box<XmpData>),
}

impl Section {
    pub fn as_ac3(&self) -> Option<&Ac3Section> {
        match self {
            Section::Ac3(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_png(&self) -> Option<&PngSection> {
        match self {
            Section::Png(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_tiff(&self) -> Option<&TiffSection> {
        match self {
            Section::Tiff(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_jpeg(&self) -> Option<&JpegSection> {
        match self {
            Section::Jpeg(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_la(&self) -> Option<&LaSection> {
        match self {
            Section::La(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_riff(&self) -> Option<&RiffSection> {
        match self {
            Section::Riff(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_par2(&self) -> Option<&Par2Section> {
        match self {
            Section::Par2(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_exif(&self) -> Option<&ExifData> {
        match self {
            Section::Exif(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_iptc(&self) -> Option<&IptcData> {
        match self {
            Section::Iptc(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_xmp(&self) -> Option<&XmpData> {
        match self {
            Section::Xmp(s) => Some(s),
            _ => None,
        }
    }
}

// =============================================================================
// Summary
// =============================================================================

/// Normalized audio fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AudioSummary {
    pub dataformat: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bits_per_sample: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lossless: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoder: Option<String>,
}

/// Normalized image/video fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VideoSummary {
    pub dataformat: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_x: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_y: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bits_per_sample: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lossless: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codec: Option<String>,
}

/// Cross-format fields every applicable handler writes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playtime_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<f64>,
    /// Media payload proper, after container/tag overhead
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<PayloadWindow>,
}

impl Summary {
    /// Mutable audio summary, created on first use.
    pub fn audio_mut(&mut self, dataformat: &str) -> &mut AudioSummary {
        self.audio.get_or_insert_with(|| AudioSummary {
            dataformat: dataformat.to_string(),
            ..Default::default()
        })
    }

    /// Mutable video summary, created on first use.
    pub fn video_mut(&mut self, dataformat: &str) -> &mut VideoSummary {
        self.video.get_or_insert_with(|| VideoSummary {
            dataformat: dataformat.to_string(),
            ..Default::default()
        })
    }
}

// =============================================================================
// ResultTree
// =============================================================================

/// Output of one analysis session.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResultTree {
    /// Source identifier (path or buffer name)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub filesize: u64,
    /// Top-level recognition tag; absent when no handler succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fileformat: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<&'static str>,
    #[serde(flatten)]
    pub sections: BTreeMap<&'static str, Section>,
    #[serde(flatten)]
    pub summary: Summary,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<Diagnostic>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Diagnostic>,
}

impl ResultTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.get(name)
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Whether `fragment` appears in any warning message.
    pub fn has_warning(&self, fragment: &str) -> bool {
        self.warnings.iter().any(|w| w.message.contains(fragment))
    }
}
