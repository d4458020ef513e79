//! JPEG decoder.
//!
//! Walks the marker segments between SOI and the first SOS. Each segment is
//! `FF <marker> <length u16 BE>`, the length counting itself but not the
//! marker.
//!
//! # Segments
//!
//! - **SOFn**: precision, dimensions and components. Required.
//! - **APP0 `JFIF`**: version and pixel density.
//! - **APP1 `Exif`** and **APP1 XMP**: handed to the configured
//!   [`ExifReader`] / [`XmpReader`]; without one, a warning is recorded.
//! - **APP13 `Photoshop 3.0`**: IPTC-NAA resource, decoded natively.
//! - **APP14 `Adobe`**: colour transform.
//! - **COM**: comments.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::trace;

use super::handler::{Handler, Scope};
use super::lookup::{CodeTable, Entry, Lookup, SparseTable};
use super::result::Section;
use super::walker::{Framing, RecordHeader, SequentialWalker};
use crate::error::FormatError;
use crate::io::{read_u16_be, slice_at, ByteSource};
use crate::tags::{
    parse_iptc, parse_photoshop_resources, ExifReader, IptcData, KamadakExifReader,
    QuickXmlReader, XmpReader, RESOURCE_IPTC_NAA,
};

// =============================================================================
// Markers
// =============================================================================

/// SOI followed by the first byte of the next marker
pub const JPEG_SIGNATURE: [u8; 3] = [0xFF, 0xD8, 0xFF];

const SOS: u8 = 0xDA;
const COM: u8 = 0xFE;
const APP0: u8 = 0xE0;
const APP1: u8 = 0xE1;
const APP13: u8 = 0xED;
const APP14: u8 = 0xEE;

const JFIF_ID: &[u8] = b"JFIF\0";
const EXIF_ID: &[u8] = b"Exif\0\0";
const XMP_ID: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";
const XMP_EXTENSION_ID: &[u8] = b"http://ns.adobe.com/xmp/extension/\0";
const PHOTOSHOP_ID: &[u8] = b"Photoshop 3.0\0";
const ADOBE_ID: &[u8] = b"Adobe";

/// Coding process of each start-of-frame marker
pub static SOF_PROCESSES: SparseTable<&str> = SparseTable::new(&[
    (0xC0, Entry::Value("Baseline DCT")),
    (0xC1, Entry::Value("Extended sequential DCT")),
    (0xC2, Entry::Value("Progressive DCT")),
    (0xC3, Entry::Value("Lossless (sequential)")),
    (0xC5, Entry::Value("Differential sequential DCT")),
    (0xC6, Entry::Value("Differential progressive DCT")),
    (0xC7, Entry::Value("Differential lossless (sequential)")),
    (0xC9, Entry::Value("Extended sequential DCT, arithmetic coding")),
    (0xCA, Entry::Value("Progressive DCT, arithmetic coding")),
    (0xCB, Entry::Value("Lossless (sequential), arithmetic coding")),
    (0xCD, Entry::Value("Differential sequential DCT, arithmetic coding")),
    (0xCE, Entry::Value("Differential progressive DCT, arithmetic coding")),
    (0xCF, Entry::Value("Differential lossless (sequential), arithmetic coding")),
]);

const LOSSLESS_SOF: [u8; 4] = [0xC3, 0xC7, 0xCB, 0xCF];

static MARKER_NAMES: SparseTable<&str> = SparseTable::new(&[
    (0xC4, Entry::Value("DHT")),
    (0xC8, Entry::Reserved),
    (0xCC, Entry::Value("DAC")),
    (0xDA, Entry::Value("SOS")),
    (0xDB, Entry::Value("DQT")),
    (0xDC, Entry::Value("DNL")),
    (0xDD, Entry::Value("DRI")),
    (0xDE, Entry::Value("DHP")),
    (0xDF, Entry::Value("EXP")),
    (0xFE, Entry::Value("COM")),
]);

pub static DENSITY_UNITS: CodeTable<&str> = CodeTable::new(&[
    Entry::Value("aspect ratio only"),
    Entry::Value("dots per inch"),
    Entry::Value("dots per centimeter"),
]);

pub static ADOBE_TRANSFORMS: CodeTable<&str> = CodeTable::new(&[
    Entry::Value("Unknown (RGB or CMYK)"),
    Entry::Value("YCbCr"),
    Entry::Value("YCCK"),
]);

/// Display name of a marker (`SOF2`, `APP13`, `DQT`, ...).
pub fn marker_name(marker: u8) -> String {
    match marker {
        0xC0..=0xCF if SOF_PROCESSES.name(marker as u32).is_some() => {
            format!("SOF{}", marker - 0xC0)
        }
        0xE0..=0xEF => format!("APP{}", marker - 0xE0),
        _ => match MARKER_NAMES.name(marker as u32) {
            Some(name) => name.to_string(),
            None => format!("0x{marker:02X}"),
        },
    }
}

// =============================================================================
// Section types
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JpegSegment {
    pub offset: u64,
    pub marker: String,
    pub length: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameComponent {
    pub id: u8,
    pub horizontal_sampling: u8,
    pub vertical_sampling: u8,
    pub quantization_table: u8,
}

/// Start-of-frame header.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameHeader {
    pub marker: String,
    pub process: Lookup<&'static str>,
    pub lossless: bool,
    pub precision: u8,
    pub height: u16,
    pub width: u16,
    pub components: Vec<FrameComponent>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JfifHeader {
    pub version: String,
    pub density_units: Lookup<&'static str>,
    pub x_density: u16,
    pub y_density: u16,
    pub thumbnail_width: u8,
    pub thumbnail_height: u8,
    /// `None` when either density is zero
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pixel_aspect_ratio: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdobeSegment {
    pub version: u16,
    pub flags0: u16,
    pub flags1: u16,
    pub transform: Lookup<&'static str>,
}

/// Decoded JPEG section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JpegSection {
    pub frame: FrameHeader,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jfif: Option<JfifHeader>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adobe: Option<AdobeSegment>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<String>,
    pub segments: Vec<JpegSegment>,
    /// Offset of the entropy-coded data following SOS
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_offset: Option<u64>,
}

// =============================================================================
// Framing
// =============================================================================

struct SegmentFraming;

impl Framing for SegmentFraming {
    type Tag = u8;

    fn header_len(&self) -> usize {
        4
    }

    fn parse_header(
        &self,
        header: &[u8],
        _offset: u64,
    ) -> Result<RecordHeader<u8>, FormatError> {
        if header[0] != 0xFF {
            return Err(FormatError::malformed(
                "jpeg",
                format!("expected marker, found byte 0x{:02X}", header[0]),
            ));
        }
        let marker = header[1];
        if marker == 0xD9 || marker == 0x01 || (0xD0..=0xD8).contains(&marker) {
            return Err(FormatError::malformed(
                "jpeg",
                format!("unexpected standalone marker {} before SOS", marker_name(marker)),
            ));
        }
        let length = read_u16_be(header, 2)?;
        if length < 2 {
            return Err(FormatError::malformed(
                "jpeg",
                format!("{} segment length {length} is shorter than its length field", marker_name(marker)),
            ));
        }
        Ok(RecordHeader {
            tag: marker,
            payload_len: length as u64 - 2,
        })
    }

    fn is_terminator(&self, header: &RecordHeader<u8>) -> bool {
        header.tag == SOS
    }

    fn fill_byte(&self) -> Option<u8> {
        Some(0xFF)
    }
}

// =============================================================================
// Segment decoders
// =============================================================================

fn parse_frame(marker: u8, data: &[u8]) -> Result<FrameHeader, FormatError> {
    let precision = slice_at(data, 0, 1)?[0];
    let height = read_u16_be(data, 1)?;
    let width = read_u16_be(data, 3)?;
    let count = slice_at(data, 5, 1)?[0] as usize;

    let mut components = Vec::with_capacity(count);
    for i in 0..count {
        let c = slice_at(data, 6 + i * 3, 3)?;
        components.push(FrameComponent {
            id: c[0],
            horizontal_sampling: c[1] >> 4,
            vertical_sampling: c[1] & 0x0F,
            quantization_table: c[2],
        });
    }

    Ok(FrameHeader {
        marker: marker_name(marker),
        process: SOF_PROCESSES.resolve(marker as u32),
        lossless: LOSSLESS_SOF.contains(&marker),
        precision,
        height,
        width,
        components,
    })
}

fn parse_jfif(data: &[u8]) -> Result<JfifHeader, FormatError> {
    let body = &data[JFIF_ID.len()..];
    let version = slice_at(body, 0, 2)?;
    let units = slice_at(body, 2, 1)?[0];
    let x_density = read_u16_be(body, 3)?;
    let y_density = read_u16_be(body, 5)?;
    let thumb = slice_at(body, 7, 2)?;

    Ok(JfifHeader {
        version: format!("{}.{:02}", version[0], version[1]),
        density_units: DENSITY_UNITS.resolve(units as u32),
        x_density,
        y_density,
        thumbnail_width: thumb[0],
        thumbnail_height: thumb[1],
        pixel_aspect_ratio: (x_density != 0 && y_density != 0)
            .then(|| y_density as f64 / x_density as f64),
    })
}

fn parse_adobe(data: &[u8]) -> Result<AdobeSegment, FormatError> {
    let body = &data[ADOBE_ID.len()..];
    Ok(AdobeSegment {
        version: read_u16_be(body, 0)?,
        flags0: read_u16_be(body, 2)?,
        flags1: read_u16_be(body, 4)?,
        transform: ADOBE_TRANSFORMS.resolve(slice_at(body, 6, 1)?[0] as u32),
    })
}

// =============================================================================
// Handler
// =============================================================================

/// JPEG handler with optional EXIF and XMP readers.
#[derive(Clone, Default)]
pub struct JpegHandler {
    exif: Option<Arc<dyn ExifReader>>,
    xmp: Option<Arc<dyn XmpReader>>,
}

impl fmt::Debug for JpegHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JpegHandler")
            .field("exif", &self.exif.as_ref().map(|r| r.name()))
            .field("xmp", &self.xmp.as_ref().map(|r| r.name()))
            .finish()
    }
}

/// Per-walk state collected from the segments.
#[derive(Default)]
struct Segments {
    frame: Option<FrameHeader>,
    jfif: Option<JfifHeader>,
    adobe: Option<AdobeSegment>,
    comments: Vec<String>,
    segments: Vec<JpegSegment>,
    iptc: IptcData,
    scan_offset: Option<u64>,
    saw_exif: bool,
    saw_xmp: bool,
}

impl JpegHandler {
    /// Handler without tag readers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handler with the bundled EXIF and XMP readers.
    pub fn with_default_readers() -> Self {
        Self::new()
            .with_exif(Arc::new(KamadakExifReader))
            .with_xmp(Arc::new(QuickXmlReader))
    }

    pub fn with_exif(mut self, reader: Arc<dyn ExifReader>) -> Self {
        self.exif = Some(reader);
        self
    }

    pub fn with_xmp(mut self, reader: Arc<dyn XmpReader>) -> Self {
        self.xmp = Some(reader);
        self
    }

    fn exif_block(&self, payload: &[u8], state: &mut Segments, scope: &mut Scope<'_>) {
        if state.saw_exif {
            scope.warn("Multiple EXIF blocks; only the first is decoded");
            return;
        }
        state.saw_exif = true;
        let Some(reader) = &self.exif else {
            scope.warn("EXIF block present but no EXIF reader is configured");
            return;
        };
        match reader.read(&payload[EXIF_ID.len()..]) {
            Ok(data) => scope.insert_section("exif", Section::Exif(Box::new(data))),
            Err(err) => scope.warn(format!("Cannot decode EXIF block: {err}")),
        }
    }

    fn xmp_packet(&self, payload: &[u8], state: &mut Segments, scope: &mut Scope<'_>) {
        if state.saw_xmp {
            scope.warn("Multiple XMP packets; only the first is decoded");
            return;
        }
        state.saw_xmp = true;
        let Some(reader) = &self.xmp else {
            scope.warn("XMP packet present but no XMP reader is configured");
            return;
        };
        match reader.read(&payload[XMP_ID.len()..]) {
            Ok(data) => scope.insert_section("xmp", Section::Xmp(Box::new(data))),
            Err(err) => scope.warn(format!("Cannot decode XMP packet: {err}")),
        }
    }

    fn photoshop_block(payload: &[u8], state: &mut Segments, scope: &mut Scope<'_>) {
        let resources = match parse_photoshop_resources(&payload[PHOTOSHOP_ID.len()..]) {
            Ok(resources) => resources,
            Err(err) => {
                scope.warn(format!("Malformed Photoshop resource block: {err}"));
                return;
            }
        };
        for resource in resources.iter().filter(|r| r.id == RESOURCE_IPTC_NAA) {
            match parse_iptc(resource.data) {
                Ok(iptc) => {
                    for (record, datasets) in iptc.records {
                        let target = state.iptc.records.entry(record).or_default();
                        for (name, values) in datasets {
                            target.entry(name).or_default().extend(values);
                        }
                    }
                }
                Err(err) => scope.warn(format!("Malformed IPTC block: {err}")),
            }
        }
    }

    fn decode_segment(
        &self,
        marker: u8,
        payload: &[u8],
        state: &mut Segments,
        scope: &mut Scope<'_>,
    ) -> Result<(), FormatError> {
        match marker {
            m if SOF_PROCESSES.name(m as u32).is_some() => {
                if state.frame.is_some() {
                    scope.warn(format!("Additional {} frame header ignored", marker_name(m)));
                } else {
                    state.frame = Some(parse_frame(m, payload)?);
                }
            }
            APP0 if payload.starts_with(JFIF_ID) => match parse_jfif(payload) {
                Ok(jfif) => state.jfif = Some(jfif),
                Err(err) => scope.warn(format!("Malformed JFIF segment: {err}")),
            },
            APP1 if payload.starts_with(EXIF_ID) => self.exif_block(payload, state, scope),
            APP1 if payload.starts_with(XMP_ID) => self.xmp_packet(payload, state, scope),
            APP1 if payload.starts_with(XMP_EXTENSION_ID) => {
                scope.warn("Extended XMP segment not merged");
            }
            APP1 => {
                let sig = &payload[..payload.len().min(4)];
                scope.warn(format!(
                    "APP1 segment with unrecognized signature \"{}\"",
                    String::from_utf8_lossy(sig)
                ));
            }
            APP13 if payload.starts_with(PHOTOSHOP_ID) => Self::photoshop_block(payload, state, scope),
            APP14 if payload.starts_with(ADOBE_ID) => match parse_adobe(payload) {
                Ok(adobe) => state.adobe = Some(adobe),
                Err(err) => scope.warn(format!("Malformed Adobe segment: {err}")),
            },
            COM => {
                let text = String::from_utf8_lossy(payload);
                state.comments.push(text.trim_end_matches('\0').to_string());
            }
            _ => {}
        }
        Ok(())
    }
}

impl Handler for JpegHandler {
    fn name(&self) -> &'static str {
        "jpeg"
    }

    fn mime_type(&self) -> Option<&'static str> {
        Some("image/jpeg")
    }

    fn analyze(&self, source: &dyn ByteSource, scope: &mut Scope<'_>) -> Result<(), FormatError> {
        let window = scope.window();
        let head = source.read_up_to(window.start, JPEG_SIGNATURE.len())?;
        if head[..] != JPEG_SIGNATURE[..] {
            return Err(FormatError::signature(&JPEG_SIGNATURE, &head, window.start));
        }

        let walker = SequentialWalker::new(
            source,
            SegmentFraming,
            window.start + 2,
            window.end,
            scope.config().max_records,
        );

        let mut state = Segments::default();
        for record in walker {
            let record = record?;
            trace!(offset = record.offset, marker = record.tag, length = record.length, "JPEG segment");
            state.segments.push(JpegSegment {
                offset: record.offset,
                marker: marker_name(record.tag),
                length: record.length + 2,
            });
            if record.tag == SOS {
                state.scan_offset = Some(record.payload_offset() + record.length);
                break;
            }
            self.decode_segment(record.tag, record.data(), &mut state, scope)?;
        }

        let frame = state
            .frame
            .ok_or_else(|| FormatError::malformed("jpeg", "no start-of-frame segment before SOS"))?;
        if frame.width == 0 || frame.height == 0 {
            scope.warn("Frame dimensions are zero (defined by a later DNL segment)");
        }
        if !state.iptc.is_empty() {
            scope.insert_section("iptc", Section::Iptc(Box::new(state.iptc)));
        }

        let video = scope.summary_mut().video_mut("jpg");
        video.resolution_x = Some(frame.width as u64);
        video.resolution_y = Some(frame.height as u64);
        video.bits_per_sample = Some(frame.precision as u32 * frame.components.len() as u32);
        video.lossless = Some(frame.lossless);
        video.codec = frame.process.get().map(str::to_string);

        scope.set_section(Section::Jpeg(Box::new(JpegSection {
            frame,
            jfif: state.jfif,
            adobe: state.adobe,
            comments: state.comments,
            segments: state.segments,
            scan_offset: state.scan_offset,
        })));
        Ok(())
    }
}
