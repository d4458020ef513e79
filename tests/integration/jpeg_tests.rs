//! JPEG integration tests.
//!
//! Tests verify:
//! - Frame header, JFIF and comment decoding
//! - EXIF, XMP and IPTC blocks land in their own sections
//! - Missing tag readers and duplicate blocks become warnings
//! - Marker-level corruption fails the section

use std::sync::Arc;

use media_probe::format::jpeg::JpegSection;
use media_probe::tags::{KamadakExifReader, TagValue};
use media_probe::{Analyzer, AnalyzerConfig, MemorySource, ResultTree};

use super::test_utils::{
    analyze, jfif_payload, sof_payload, IfdBuilder, JpegBuilder, TiffBuilder,
};

const SOF0: u8 = 0xC0;
const SOF2: u8 = 0xC2;
const SOF3: u8 = 0xC3;
const APP0: u8 = 0xE0;
const APP1: u8 = 0xE1;
const APP13: u8 = 0xED;
const COM: u8 = 0xFE;

fn jpeg_section(tree: &ResultTree) -> &JpegSection {
    tree.section("jpeg")
        .and_then(|s| s.as_jpeg())
        .expect("jpeg section")
}

fn exif_payload() -> Vec<u8> {
    let mut ifd = IfdBuilder::new();
    ifd.add_ascii(271, "Canon")
        .add_ascii(272, "EOS 5D")
        .add_entry(274, 3, 1, 1);
    let mut payload = b"Exif\0\0".to_vec();
    payload.extend(TiffBuilder::new().add_ifd(ifd).build());
    payload
}

fn xmp_payload() -> Vec<u8> {
    let mut payload = b"http://ns.adobe.com/xap/1.0/\0".to_vec();
    payload.extend_from_slice(
        br#"<x:xmpmeta xmlns:x="adobe:ns:meta/">
 <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
  <rdf:Description rdf:about="" xmlns:xmp="http://ns.adobe.com/xap/1.0/" xmp:Rating="5"/>
 </rdf:RDF>
</x:xmpmeta>"#,
    );
    payload
}

fn photoshop_payload() -> Vec<u8> {
    let mut iptc = Vec::new();
    for keyword in ["harbour", "boats"] {
        iptc.extend_from_slice(&[0x1C, 2, 25]);
        iptc.extend_from_slice(&(keyword.len() as u16).to_be_bytes());
        iptc.extend_from_slice(keyword.as_bytes());
    }

    let mut payload = b"Photoshop 3.0\0".to_vec();
    payload.extend_from_slice(b"8BIM");
    payload.extend_from_slice(&0x0404u16.to_be_bytes());
    payload.extend_from_slice(&[0, 0]); // empty name, padded
    payload.extend_from_slice(&(iptc.len() as u32).to_be_bytes());
    payload.extend_from_slice(&iptc);
    if iptc.len() % 2 == 1 {
        payload.push(0);
    }
    payload
}

// =============================================================================
// Frame and Segments
// =============================================================================

#[test]
fn test_baseline_jfif() {
    let data = JpegBuilder::new()
        .segment(APP0, &jfif_payload())
        .segment(COM, b"made by hand")
        .segment(SOF0, &sof_payload(800, 600, 3))
        .build();

    let tree = analyze(data);
    assert!(!tree.has_errors(), "errors: {:?}", tree.errors);
    assert!(tree.warnings.is_empty(), "warnings: {:?}", tree.warnings);
    assert_eq!(tree.fileformat, Some("jpeg"));
    assert_eq!(tree.mime_type, Some("image/jpeg"));

    let jpeg = jpeg_section(&tree);
    assert_eq!((jpeg.frame.width, jpeg.frame.height), (800, 600));
    assert_eq!(jpeg.frame.marker, "SOF0");
    assert_eq!(jpeg.frame.components.len(), 3);
    let jfif = jpeg.jfif.as_ref().unwrap();
    assert_eq!(jfif.version, "1.02");
    assert_eq!(jfif.x_density, 72);
    assert_eq!(jpeg.comments, vec!["made by hand".to_string()]);

    let markers: Vec<_> = jpeg.segments.iter().map(|s| s.marker.as_str()).collect();
    assert_eq!(markers, vec!["APP0", "COM", "SOF0", "SOS"]);
    assert!(jpeg.scan_offset.is_some());

    let video = tree.summary.video.as_ref().unwrap();
    assert_eq!(video.dataformat, "jpg");
    assert_eq!(video.resolution_x, Some(800));
    assert_eq!(video.resolution_y, Some(600));
    assert_eq!(video.bits_per_sample, Some(24));
    assert_eq!(video.lossless, Some(false));
    assert_eq!(video.codec.as_deref(), Some("Baseline DCT"));
}

#[test]
fn test_progressive_and_lossless_processes() {
    let progressive = analyze(JpegBuilder::new().segment(SOF2, &sof_payload(8, 8, 1)).build());
    let video = progressive.summary.video.as_ref().unwrap();
    assert_eq!(video.codec.as_deref(), Some("Progressive DCT"));
    assert_eq!(video.lossless, Some(false));

    let lossless = analyze(JpegBuilder::new().segment(SOF3, &sof_payload(8, 8, 1)).build());
    assert_eq!(lossless.summary.video.as_ref().unwrap().lossless, Some(true));
}

#[test]
fn test_fill_bytes_before_markers() {
    let jfif = jfif_payload();
    let mut data = JpegBuilder::new()
        .segment(APP0, &jfif)
        .segment(SOF0, &sof_payload(64, 48, 3))
        .build();
    // Three fill bytes before SOF0, one right after SOI
    let sof_at = 2 + 4 + jfif.len();
    data.splice(sof_at..sof_at, [0xFF, 0xFF, 0xFF]);
    data.insert(2, 0xFF);

    let tree = analyze(data);
    assert!(!tree.has_errors(), "errors: {:?}", tree.errors);
    assert_eq!(tree.fileformat, Some("jpeg"));

    let jpeg = jpeg_section(&tree);
    assert_eq!((jpeg.frame.width, jpeg.frame.height), (64, 48));
    let markers: Vec<_> = jpeg.segments.iter().map(|s| s.marker.as_str()).collect();
    assert_eq!(markers, vec!["APP0", "SOF0", "SOS"]);
    assert_eq!(jpeg.segments[0].offset, 3);
    assert_eq!(jpeg.segments[1].offset, (1 + sof_at + 3) as u64);
}

// =============================================================================
// Embedded Tag Blocks
// =============================================================================

#[test]
fn test_exif_xmp_and_iptc_sections() {
    let data = JpegBuilder::new()
        .segment(APP1, &exif_payload())
        .segment(APP1, &xmp_payload())
        .segment(APP13, &photoshop_payload())
        .segment(SOF0, &sof_payload(16, 16, 3))
        .build();

    let tree = analyze(data);
    assert!(!tree.has_errors(), "errors: {:?}", tree.errors);
    assert!(tree.warnings.is_empty(), "warnings: {:?}", tree.warnings);

    let exif = tree.section("exif").and_then(|s| s.as_exif()).expect("exif section");
    assert_eq!(exif.get("IFD0", "Make"), Some(&TagValue::Text("Canon".into())));
    assert_eq!(exif.get("IFD0", "Model"), Some(&TagValue::Text("EOS 5D".into())));
    assert_eq!(exif.get("IFD0", "Orientation"), Some(&TagValue::Int(1)));

    let xmp = tree.section("xmp").and_then(|s| s.as_xmp()).expect("xmp section");
    assert_eq!(xmp.get("xmp", "Rating"), Some(&TagValue::Int(5)));

    let iptc = tree.section("iptc").and_then(|s| s.as_iptc()).expect("iptc section");
    assert_eq!(
        iptc.get("IPTCApplication", "Keywords"),
        Some(&["harbour".to_string(), "boats".to_string()][..])
    );

    // The image itself still decodes
    assert_eq!(jpeg_section(&tree).frame.width, 16);
}

#[test]
fn test_readers_can_be_disabled() {
    let data = JpegBuilder::new()
        .segment(APP1, &exif_payload())
        .segment(APP1, &xmp_payload())
        .segment(SOF0, &sof_payload(16, 16, 3))
        .build();

    let source = MemorySource::new(data, "mem://no-readers");
    let tree = Analyzer::without_tag_readers(AnalyzerConfig::default()).analyze(&source);

    assert!(!tree.has_errors());
    assert!(tree.section("exif").is_none());
    assert!(tree.section("xmp").is_none());
    assert!(tree.has_warning("EXIF block present but no EXIF reader is configured"));
    assert!(tree.has_warning("XMP packet present but no XMP reader is configured"));
}

#[test]
fn test_only_exif_reader() {
    let data = JpegBuilder::new()
        .segment(APP1, &exif_payload())
        .segment(SOF0, &sof_payload(16, 16, 3))
        .build();

    let source = MemorySource::new(data, "mem://exif-only");
    let tree = Analyzer::without_tag_readers(AnalyzerConfig::default())
        .with_exif_reader(Some(Arc::new(KamadakExifReader)))
        .analyze(&source);

    assert!(tree.section("exif").is_some());
    assert!(tree.warnings.is_empty(), "warnings: {:?}", tree.warnings);
}

#[test]
fn test_duplicate_exif_block_is_warning() {
    let data = JpegBuilder::new()
        .segment(APP1, &exif_payload())
        .segment(APP1, &exif_payload())
        .segment(SOF0, &sof_payload(16, 16, 3))
        .build();

    let tree = analyze(data);
    assert!(tree.section("exif").is_some());
    assert!(tree.has_warning("Multiple EXIF blocks"));
}

#[test]
fn test_corrupt_exif_is_warning() {
    let mut payload = b"Exif\0\0".to_vec();
    payload.extend_from_slice(b"XX\0\0garbage");

    let data = JpegBuilder::new()
        .segment(APP1, &payload)
        .segment(SOF0, &sof_payload(16, 16, 3))
        .build();

    let tree = analyze(data);
    assert_eq!(tree.fileformat, Some("jpeg"));
    assert!(tree.section("exif").is_none());
    assert!(tree.has_warning("Cannot decode EXIF block"));
}

// =============================================================================
// Failures
// =============================================================================

#[test]
fn test_missing_frame_header_fails() {
    let data = JpegBuilder::new().segment(APP0, &jfif_payload()).build();

    let tree = analyze(data);
    assert!(tree.section("jpeg").is_none());
    assert!(tree.errors[0].message.contains("no start-of-frame segment"));
}

#[test]
fn test_garbage_between_segments_fails() {
    let mut data = vec![0xFF, 0xD8];
    data.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x04, 0x00, 0x00]);
    data.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
    data.extend_from_slice(&[0xFF, 0xD9]);

    let tree = analyze(data);
    assert!(tree.section("jpeg").is_none());
    assert!(tree.errors[0].message.contains("expected marker"));
}

#[test]
fn test_failed_jpeg_drops_tag_sections() {
    // EXIF decodes fine, but the stream has no frame header
    let data = JpegBuilder::new().segment(APP1, &exif_payload()).build();

    let tree = analyze(data);
    assert!(tree.fileformat.is_none());
    assert!(tree.section("exif").is_none());
}
