//! PNG chunk decoder.
//!
//! # Structure
//!
//! ```text
//! signature: 89 50 4E 47 0D 0A 1A 0A
//! chunk:     length(u32 BE) | type(4) | data(length) | crc(u32 BE)
//! ```
//!
//! Chunks are walked with [`SequentialWalker`] until `IEND` or the end of
//! the payload window. Each known chunk type decodes into a typed
//! [`ChunkBody`]; unknown types are kept raw with a warning. `IDAT` payloads
//! are bounds-checked and counted but never read.
//!
//! The CRC-32 over type and data is verified when
//! [`AnalyzerConfig::verify_checksums`](crate::config::AnalyzerConfig) is set;
//! a mismatch is a warning.

use std::collections::BTreeMap;
use std::io::Read;

use bytes::Bytes;
use flate2::read::ZlibDecoder;
use serde::Serialize;

use super::handler::{Handler, Scope};
use super::lookup::{CodeTable, Entry, Lookup};
use super::result::Section;
use super::walker::{Framing, Record, RecordHeader, SequentialWalker};
use crate::error::{FormatError, IoError};
use crate::io::{read_u16_be, read_u32_be, read_uint, slice_at, ByteOrder, ByteSource};

// =============================================================================
// Constants
// =============================================================================

/// PNG file signature
pub const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

const FLAG_ANCILLARY: u32 = 0x2000_0000;
const FLAG_PRIVATE: u32 = 0x0020_0000;
const FLAG_RESERVED: u32 = 0x0000_2000;
const FLAG_SAFE_TO_COPY: u32 = 0x0000_0020;

// =============================================================================
// Lookup tables
// =============================================================================

pub static COMPRESSION_METHODS: CodeTable<&str> = CodeTable::new(&[Entry::Value("deflate/inflate")]);

pub static SRGB_INTENTS: CodeTable<&str> = CodeTable::new(&[
    Entry::Value("Perceptual"),
    Entry::Value("Relative colorimetric"),
    Entry::Value("Saturation"),
    Entry::Value("Absolute colorimetric"),
]);

pub static PHYS_UNITS: CodeTable<&str> =
    CodeTable::new(&[Entry::Value("unknown"), Entry::Value("meter")]);

pub static OFFS_UNITS: CodeTable<&str> =
    CodeTable::new(&[Entry::Value("pixel"), Entry::Value("micrometer")]);

pub static SCAL_UNITS: CodeTable<&str> =
    CodeTable::new(&[Entry::Value("meter"), Entry::Value("radian")]);

pub static PCAL_EQUATIONS: CodeTable<&str> = CodeTable::new(&[
    Entry::Value("Linear mapping"),
    Entry::Value("Base-e exponential mapping"),
    Entry::Value("Arbitrary-base exponential mapping"),
    Entry::Value("Hyperbolic mapping"),
]);

/// Samples per pixel for each IHDR color type
pub static SAMPLES_PER_PIXEL: CodeTable<u32> = CodeTable::new(&[
    Entry::Value(1), // grayscale
    Entry::Reserved,
    Entry::Value(3), // RGB
    Entry::Value(1), // palette index
    Entry::Value(2), // grayscale + alpha
    Entry::Reserved,
    Entry::Value(4), // RGB + alpha
]);

/// Bits per pixel for a color type and bit depth.
pub fn bits_per_sample(color_type: u8, bit_depth: u8) -> Lookup<u32> {
    SAMPLES_PER_PIXEL
        .resolve(color_type as u32)
        .map(|samples| samples * bit_depth as u32)
}

// =============================================================================
// Section types
// =============================================================================

/// Property bits of a chunk type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChunkFlags {
    pub ancillary: bool,
    pub private: bool,
    pub reserved: bool,
    pub safe_to_copy: bool,
}

impl ChunkFlags {
    pub fn from_type(type_raw: u32) -> Self {
        Self {
            ancillary: type_raw & FLAG_ANCILLARY != 0,
            private: type_raw & FLAG_PRIVATE != 0,
            reserved: type_raw & FLAG_RESERVED != 0,
            safe_to_copy: type_raw & FLAG_SAFE_TO_COPY != 0,
        }
    }
}

/// Common chunk header fields.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkHeader {
    pub offset: u64,
    pub type_text: String,
    pub data_length: u64,
    pub crc: u32,
    pub flags: ChunkFlags,
}

/// IHDR fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageHeader {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u8,
    pub color_type: u8,
    pub compression_method: u8,
    pub compression_method_text: Lookup<&'static str>,
    pub filter_method: u8,
    pub interlace_method: u8,
    pub palette: bool,
    pub true_color: bool,
    pub alpha: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transparency {
    Gray(u16),
    Rgb { red: u16, green: u16, blue: u16 },
    PaletteOpacity(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Background {
    Gray(u16),
    Rgb { red: u16, green: u16, blue: u16 },
    Index(u8),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SignificantBits {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gray: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub red: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub green: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blue: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaletteEntry {
    pub red: u16,
    pub green: u16,
    pub blue: u16,
    pub alpha: u16,
    pub frequency: u16,
}

/// Decoded chunk body; one variant per chunk type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ChunkBody {
    ImageHeader(ImageHeader),
    /// Palette entries as 0xRRGGBB
    Palette(Vec<u32>),
    Transparency(Transparency),
    Gamma(f64),
    Chromaticities {
        white_x: f64,
        white_y: f64,
        red_x: f64,
        red_y: f64,
        green_x: f64,
        green_y: f64,
        blue_x: f64,
        blue_y: f64,
    },
    Srgb {
        rendering_intent: u8,
        rendering_intent_text: Lookup<&'static str>,
    },
    IccProfile {
        profile_name: String,
        compression_method: u8,
        compression_method_text: Lookup<&'static str>,
        profile_length: usize,
    },
    Text {
        keyword: String,
        text: String,
    },
    CompressedText {
        keyword: String,
        compression_method: u8,
        compression_method_text: Lookup<&'static str>,
        text: Option<String>,
    },
    InternationalText {
        keyword: String,
        compressed: bool,
        compression_method: u8,
        compression_method_text: Lookup<&'static str>,
        language_tag: String,
        translated_keyword: String,
        text: Option<String>,
    },
    Background(Background),
    PhysicalDimensions {
        pixels_per_unit_x: u32,
        pixels_per_unit_y: u32,
        unit_specifier: u8,
        unit: Lookup<&'static str>,
    },
    SignificantBits(SignificantBits),
    SuggestedPalette {
        palette_name: String,
        sample_depth_bits: u8,
        entries: Vec<PaletteEntry>,
    },
    Histogram(Vec<u16>),
    Time {
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
        unix: Option<i64>,
    },
    Offset {
        position_x: i32,
        position_y: i32,
        unit_specifier: u8,
        unit: Lookup<&'static str>,
    },
    Calibration {
        calibration_name: String,
        original_zero: i32,
        original_max: i32,
        equation_type: u8,
        equation_type_text: Lookup<&'static str>,
        parameter_count: u8,
        unit_name: String,
        parameters: Vec<String>,
    },
    Scale {
        unit_specifier: u8,
        unit: Lookup<&'static str>,
        pixel_width: String,
        pixel_height: String,
    },
    GifControl {
        disposal_method: u8,
        user_input_flag: u8,
        delay_time: u16,
    },
    GifApplication {
        application_identifier: String,
        authentication_code: String,
        #[serde(serialize_with = "super::result::serialize_hex")]
        application_data: Vec<u8>,
    },
    ImageData,
    End,
    /// Unknown or undecodable chunk; payload kept when small enough
    Raw(#[serde(serialize_with = "super::result::serialize_hex_opt")] Option<Vec<u8>>),
}

/// One walked chunk.
#[derive(Debug, Clone, Serialize)]
pub struct PngChunk {
    pub header: ChunkHeader,
    pub body: ChunkBody,
}

/// IDAT statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImageDataInfo {
    pub count: u64,
    pub total_bytes: u64,
}

/// Decoded PNG section.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PngSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ihdr: Option<ImageHeader>,
    pub chunks: Vec<PngChunk>,
    pub image_data: ImageDataInfo,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub comments: BTreeMap<String, Vec<String>>,
}

impl PngSection {
    /// First chunk with the given type.
    pub fn chunk(&self, type_text: &str) -> Option<&PngChunk> {
        self.chunks.iter().find(|c| c.header.type_text == type_text)
    }
}

// =============================================================================
// Framing
// =============================================================================

struct PngFraming {
    max_inline: usize,
}

impl Framing for PngFraming {
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
        tag.copy_from_slice(slice_at(header, 4, 4)?);
        Ok(RecordHeader {
            tag,
            payload_len: read_u32_be(header, 0)? as u64,
        })
    }

    fn trailer_len(&self, _header: &RecordHeader<[u8; 4]>) -> usize {
        4
    }

    fn is_terminator(&self, header: &RecordHeader<[u8; 4]>) -> bool {
        &header.tag == b"IEND"
    }

    fn retain_payload(&self, header: &RecordHeader<[u8; 4]>) -> bool {
        &header.tag != b"IDAT" && header.payload_len <= self.max_inline as u64
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Latin-1 to String (tEXt, zTXt keywords).
fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Split at the first NUL; the remainder is empty when there is none.
fn split_nul(data: &[u8]) -> (&[u8], &[u8]) {
    match data.iter().position(|&b| b == 0) {
        Some(pos) => (&data[..pos], &data[pos + 1..]),
        None => (data, &[]),
    }
}

fn byte_at(data: &[u8], offset: usize) -> Result<u8, IoError> {
    Ok(slice_at(data, offset, 1)?[0])
}

/// Inflate a zlib stream, stopping at `cap` bytes.
///
/// Returns the text and whether it was truncated.
fn inflate(data: &[u8], cap: usize) -> Result<(Vec<u8>, bool), std::io::Error> {
    let mut out = Vec::new();
    ZlibDecoder::new(data)
        .take(cap as u64 + 1)
        .read_to_end(&mut out)?;
    let truncated = out.len() > cap;
    out.truncate(cap);
    Ok((out, truncated))
}

fn unix_time(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Option<i64> {
    chrono::NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
        .and_then(|d| d.and_hms_opt(hour as u32, minute as u32, second as u32))
        .map(|dt| dt.and_utc().timestamp())
}

// =============================================================================
// Handler
// =============================================================================

/// PNG handler.
#[derive(Debug, Default, Clone, Copy)]
pub struct PngHandler;

/// Mutable decode state threaded through one chunk walk.
struct Decoder<'a, 's> {
    scope: &'a mut Scope<'s>,
    section: PngSection,
}

impl Decoder<'_, '_> {
    fn color_type(&self) -> Option<u8> {
        self.section.ihdr.as_ref().map(|h| h.color_type)
    }

    fn add_comment(&mut self, keyword: &str, text: &str) {
        self.section
            .comments
            .entry(keyword.to_string())
            .or_default()
            .push(text.to_string());
    }

    fn inflate_text(&mut self, type_text: &str, data: &[u8]) -> Option<String> {
        let cap = self.scope.config().max_inflated_text;
        match inflate(data, cap) {
            Ok((text, truncated)) => {
                if truncated {
                    self.scope.warn(format!(
                        "{type_text} text truncated to {cap} bytes after decompression"
                    ));
                }
                Some(String::from_utf8_lossy(&text).into_owned())
            }
            Err(err) => {
                self.scope
                    .warn(format!("Cannot decompress {type_text} text: {err}"));
                None
            }
        }
    }

    fn decode_ihdr(&mut self, data: &[u8]) -> Result<ImageHeader, FormatError> {
        let color_type = byte_at(data, 9)?;
        let compression_method = byte_at(data, 10)?;
        let header = ImageHeader {
            width: read_u32_be(data, 0)?,
            height: read_u32_be(data, 4)?,
            bit_depth: byte_at(data, 8)?,
            color_type,
            compression_method,
            compression_method_text: COMPRESSION_METHODS.resolve(compression_method as u32),
            filter_method: byte_at(data, 11)?,
            interlace_method: byte_at(data, 12)?,
            palette: color_type & 0x01 != 0,
            true_color: color_type & 0x02 != 0,
            alpha: color_type & 0x04 != 0,
        };
        if header.width == 0 {
            return Err(FormatError::ZeroField {
                format: "png",
                field: "width",
            });
        }
        if header.height == 0 {
            return Err(FormatError::ZeroField {
                format: "png",
                field: "height",
            });
        }

        let video = self.scope.summary_mut().video_mut("png");
        video.resolution_x = Some(header.width as u64);
        video.resolution_y = Some(header.height as u64);
        video.bits_per_sample = bits_per_sample(header.color_type, header.bit_depth).get();

        Ok(header)
    }

    /// Decode an ancillary chunk. `Ok(None)` means the chunk is not decodable
    /// in the current state and was kept raw with a warning.
    fn decode_ancillary(&mut self, tag: &[u8; 4], data: &[u8]) -> Result<Option<ChunkBody>, IoError> {
        let body = match tag {
            b"PLTE" => ChunkBody::Palette(
                data.chunks_exact(3)
                    .map(|rgb| (rgb[0] as u32) << 16 | (rgb[1] as u32) << 8 | rgb[2] as u32)
                    .collect(),
            ),

            b"tRNS" => match self.color_type() {
                Some(0) => ChunkBody::Transparency(Transparency::Gray(read_u16_be(data, 0)?)),
                Some(2) => ChunkBody::Transparency(Transparency::Rgb {
                    red: read_u16_be(data, 0)?,
                    green: read_u16_be(data, 2)?,
                    blue: read_u16_be(data, 4)?,
                }),
                Some(3) => ChunkBody::Transparency(Transparency::PaletteOpacity(data.to_vec())),
                Some(other @ (4 | 6)) => {
                    self.scope
                        .warn(format!("Invalid color_type in tRNS chunk: {other}"));
                    return Ok(None);
                }
                other => {
                    self.scope
                        .warn(format!("Unhandled color_type in tRNS chunk: {other:?}"));
                    return Ok(None);
                }
            },

            b"gAMA" => ChunkBody::Gamma(read_u32_be(data, 0)? as f64 / 100_000.0),

            b"cHRM" => {
                let f = |i: usize| -> Result<f64, IoError> {
                    Ok(read_u32_be(data, i * 4)? as f64 / 100_000.0)
                };
                ChunkBody::Chromaticities {
                    white_x: f(0)?,
                    white_y: f(1)?,
                    red_x: f(2)?,
                    red_y: f(3)?,
                    green_x: f(4)?,
                    green_y: f(5)?,
                    blue_x: f(6)?,
                    blue_y: f(7)?,
                }
            }

            b"sRGB" => {
                let intent = byte_at(data, 0)?;
                ChunkBody::Srgb {
                    rendering_intent: intent,
                    rendering_intent_text: SRGB_INTENTS.resolve(intent as u32),
                }
            }

            b"iCCP" => {
                let (name, rest) = split_nul(data);
                let method = byte_at(rest, 0)?;
                ChunkBody::IccProfile {
                    profile_name: latin1(name),
                    compression_method: method,
                    compression_method_text: COMPRESSION_METHODS.resolve(method as u32),
                    profile_length: rest.len() - 1,
                }
            }

            b"tEXt" => {
                let (keyword, text) = split_nul(data);
                let (keyword, text) = (latin1(keyword), latin1(text));
                self.add_comment(&keyword, &text);
                ChunkBody::Text { keyword, text }
            }

            b"zTXt" => {
                let (keyword, rest) = split_nul(data);
                let keyword = latin1(keyword);
                let method = byte_at(rest, 0)?;
                let text = match method {
                    0 => self.inflate_text("zTXt", &rest[1..]),
                    _ => None,
                };
                if let Some(text) = &text {
                    self.add_comment(&keyword, text);
                }
                ChunkBody::CompressedText {
                    keyword,
                    compression_method: method,
                    compression_method_text: COMPRESSION_METHODS.resolve(method as u32),
                    text,
                }
            }

            b"iTXt" => {
                let (keyword, rest) = split_nul(data);
                let keyword = String::from_utf8_lossy(keyword).into_owned();
                let compressed = byte_at(rest, 0)? != 0;
                let method = byte_at(rest, 1)?;
                let (language_tag, rest) = split_nul(&rest[2..]);
                let (translated_keyword, raw_text) = split_nul(rest);
                let text = if !compressed {
                    Some(String::from_utf8_lossy(raw_text).into_owned())
                } else if method == 0 {
                    self.inflate_text("iTXt", raw_text)
                } else {
                    None
                };
                if let Some(text) = &text {
                    self.add_comment(&keyword, text);
                }
                ChunkBody::InternationalText {
                    keyword,
                    compressed,
                    compression_method: method,
                    compression_method_text: COMPRESSION_METHODS.resolve(method as u32),
                    language_tag: latin1(language_tag),
                    translated_keyword: String::from_utf8_lossy(translated_keyword).into_owned(),
                    text,
                }
            }

            b"bKGD" => match self.color_type() {
                Some(0 | 4) => ChunkBody::Background(Background::Gray(read_u16_be(data, 0)?)),
                Some(2 | 6) => ChunkBody::Background(Background::Rgb {
                    red: read_u16_be(data, 0)?,
                    green: read_u16_be(data, 2)?,
                    blue: read_u16_be(data, 4)?,
                }),
                Some(3) => ChunkBody::Background(Background::Index(byte_at(data, 0)?)),
                other => {
                    self.scope
                        .warn(format!("Unhandled color_type in bKGD chunk: {other:?}"));
                    return Ok(None);
                }
            },

            b"pHYs" => {
                let unit = byte_at(data, 8)?;
                ChunkBody::PhysicalDimensions {
                    pixels_per_unit_x: read_u32_be(data, 0)?,
                    pixels_per_unit_y: read_u32_be(data, 4)?,
                    unit_specifier: unit,
                    unit: PHYS_UNITS.resolve(unit as u32),
                }
            }

            b"sBIT" => {
                let mut bits = SignificantBits::default();
                match self.color_type() {
                    Some(0) => bits.gray = Some(byte_at(data, 0)?),
                    Some(2 | 3) => {
                        bits.red = Some(byte_at(data, 0)?);
                        bits.green = Some(byte_at(data, 1)?);
                        bits.blue = Some(byte_at(data, 2)?);
                    }
                    Some(4) => {
                        bits.gray = Some(byte_at(data, 0)?);
                        bits.alpha = Some(byte_at(data, 1)?);
                    }
                    Some(6) => {
                        bits.red = Some(byte_at(data, 0)?);
                        bits.green = Some(byte_at(data, 1)?);
                        bits.blue = Some(byte_at(data, 2)?);
                        bits.alpha = Some(byte_at(data, 3)?);
                    }
                    _ => {}
                }
                ChunkBody::SignificantBits(bits)
            }

            b"sPLT" => {
                let (name, rest) = split_nul(data);
                let depth = byte_at(rest, 0)?;
                let width = if depth == 16 { 2 } else { 1 };
                let entry_len = 4 * width + 2;
                let entries = rest[1..]
                    .chunks_exact(entry_len)
                    .map(|e| -> Result<PaletteEntry, IoError> {
                        let sample = |i: usize| read_sample(e, i * width, width);
                        Ok(PaletteEntry {
                            red: sample(0)?,
                            green: sample(1)?,
                            blue: sample(2)?,
                            alpha: sample(3)?,
                            frequency: read_u16_be(e, 4 * width)?,
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                ChunkBody::SuggestedPalette {
                    palette_name: latin1(name),
                    sample_depth_bits: depth,
                    entries,
                }
            }

            b"hIST" => ChunkBody::Histogram(
                data.chunks_exact(2)
                    .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                    .collect(),
            ),

            b"tIME" => {
                let year = read_u16_be(data, 0)?;
                let (month, day) = (byte_at(data, 2)?, byte_at(data, 3)?);
                let (hour, minute, second) = (byte_at(data, 4)?, byte_at(data, 5)?, byte_at(data, 6)?);
                ChunkBody::Time {
                    year,
                    month,
                    day,
                    hour,
                    minute,
                    second,
                    unix: unix_time(year, month, day, hour, minute, second),
                }
            }

            b"oFFs" => {
                let unit = byte_at(data, 8)?;
                ChunkBody::Offset {
                    position_x: ByteOrder::BigEndian.read_i32(data, 0)?,
                    position_y: ByteOrder::BigEndian.read_i32(data, 4)?,
                    unit_specifier: unit,
                    unit: OFFS_UNITS.resolve(unit as u32),
                }
            }

            b"pCAL" => {
                let (name, rest) = split_nul(data);
                let equation_type = byte_at(rest, 8)?;
                let (unit_name, params) = split_nul(slice_at(rest, 10, rest.len().saturating_sub(10))?);
                ChunkBody::Calibration {
                    calibration_name: latin1(name),
                    original_zero: ByteOrder::BigEndian.read_i32(rest, 0)?,
                    original_max: ByteOrder::BigEndian.read_i32(rest, 4)?,
                    equation_type,
                    equation_type_text: PCAL_EQUATIONS.resolve(equation_type as u32),
                    parameter_count: byte_at(rest, 9)?,
                    unit_name: latin1(unit_name),
                    parameters: if params.is_empty() {
                        Vec::new()
                    } else {
                        params.split(|&b| b == 0).map(latin1).collect()
                    },
                }
            }

            b"sCAL" => {
                let unit = byte_at(data, 0)?;
                let (width, height) = split_nul(&data[1..]);
                ChunkBody::Scale {
                    unit_specifier: unit,
                    unit: SCAL_UNITS.resolve(unit as u32),
                    pixel_width: latin1(width),
                    pixel_height: latin1(height),
                }
            }

            b"gIFg" => ChunkBody::GifControl {
                disposal_method: byte_at(data, 0)?,
                user_input_flag: byte_at(data, 1)?,
                delay_time: read_u16_be(data, 2)?,
            },

            b"gIFx" => ChunkBody::GifApplication {
                application_identifier: latin1(slice_at(data, 0, 8)?),
                authentication_code: latin1(slice_at(data, 8, 3)?),
                application_data: data[11..].to_vec(),
            },

            _ => {
                self.scope
                    .warn(format!("Unhandled chunk type: {}", latin1(tag)));
                return Ok(None);
            }
        };
        Ok(Some(body))
    }

    fn verify_crc(&mut self, record: &Record<[u8; 4]>, expected: u32) {
        let Some(payload) = &record.payload else {
            return;
        };
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&record.tag);
        hasher.update(payload);
        let actual = hasher.finalize();
        if actual != expected {
            self.scope.warn(format!(
                "CRC mismatch in {} chunk at offset {}: stored {:08X}, computed {:08X}",
                latin1(&record.tag),
                record.offset,
                expected,
                actual
            ));
        }
    }

    fn decode_chunk(&mut self, record: Record<[u8; 4]>) -> Result<(), FormatError> {
        let type_raw = u32::from_be_bytes(record.tag);
        let crc = read_u32_be(&record.trailer, 0)?;
        let header = ChunkHeader {
            offset: record.offset,
            type_text: latin1(&record.tag),
            data_length: record.length,
            crc,
            flags: ChunkFlags::from_type(type_raw),
        };

        if self.scope.config().verify_checksums {
            self.verify_crc(&record, crc);
        }

        let body = match (&record.tag, &record.payload) {
            (b"IDAT", _) => {
                self.section.image_data.count += 1;
                self.section.image_data.total_bytes += record.length;
                ChunkBody::ImageData
            }
            (b"IEND", _) => ChunkBody::End,
            (b"IHDR", Some(data)) => {
                let ihdr = self.decode_ihdr(data)?;
                self.section.ihdr = Some(ihdr.clone());
                ChunkBody::ImageHeader(ihdr)
            }
            (b"IHDR", None) => {
                return Err(FormatError::malformed("png", "IHDR chunk too large"));
            }
            (tag, None) => {
                self.scope.warn(format!(
                    "{} chunk of {} bytes not decoded (exceeds inline limit)",
                    latin1(tag),
                    record.length
                ));
                ChunkBody::Raw(None)
            }
            (tag, Some(data)) => match self.decode_ancillary(tag, data) {
                Ok(Some(body)) => body,
                Ok(None) => ChunkBody::Raw(Some(data.to_vec())),
                Err(err) => {
                    self.scope
                        .warn(format!("Malformed {} chunk: {}", latin1(tag), err));
                    ChunkBody::Raw(Some(data.to_vec()))
                }
            },
        };

        self.section.chunks.push(PngChunk { header, body });
        Ok(())
    }
}

/// Big-endian unsigned sample of 1 or 2 bytes.
fn read_sample(data: &[u8], offset: usize, width: usize) -> Result<u16, IoError> {
    Ok(read_uint(data, offset, width, ByteOrder::BigEndian)? as u16)
}

impl Handler for PngHandler {
    fn name(&self) -> &'static str {
        "png"
    }

    fn mime_type(&self) -> Option<&'static str> {
        Some("image/png")
    }

    fn analyze(&self, source: &dyn ByteSource, scope: &mut Scope<'_>) -> Result<(), FormatError> {
        let window = scope.window();
        let signature: Bytes = source.read_up_to(window.start, PNG_SIGNATURE.len())?;
        if signature[..] != PNG_SIGNATURE {
            return Err(FormatError::signature(&PNG_SIGNATURE, &signature, window.start));
        }

        {
            let video = scope.summary_mut().video_mut("png");
            video.lossless = Some(true);
        }

        let config = scope.config();
        let framing = PngFraming {
            max_inline: config.max_inline_bytes,
        };
        let walker = SequentialWalker::new(
            source,
            framing,
            window.start + PNG_SIGNATURE.len() as u64,
            window.end,
            config.max_records,
        );

        let mut decoder = Decoder {
            scope,
            section: PngSection::default(),
        };
        for record in walker {
            decoder.decode_chunk(record?)?;
        }

        let Decoder { scope, section } = decoder;
        if section.ihdr.is_none() {
            return Err(FormatError::malformed("png", "missing IHDR chunk"));
        }
        scope.set_section(Section::Png(Box::new(section)));
        Ok(())
    }
}
