//! RIFF/WAVE integration tests.
//!
//! Tests verify:
//! - `fmt `, `data` and LIST/INFO decoding with the audio summary
//! - Declared sizes past the end of the file are clamped with a warning
//! - Zero channel counts and missing `fmt ` chunks fail the section

use media_probe::format::riff::{RiffChunkBody, RiffSection};
use media_probe::{AnalyzerConfig, Lookup, PayloadWindow, ResultTree};

use super::test_utils::{analyze, analyze_with, info_list, pcm_format, riff_chunk, wave_file};

fn riff_section(tree: &ResultTree) -> &RiffSection {
    tree.section("riff")
        .and_then(|s| s.as_riff())
        .expect("riff section")
}

// =============================================================================
// Well-formed Files
// =============================================================================

#[test]
fn test_pcm_wave() {
    let data = wave_file(&[
        riff_chunk(b"fmt ", &pcm_format(2, 44100, 16)),
        riff_chunk(b"data", &vec![0u8; 176_400]),
        info_list(&[(b"INAM", "Tide"), (b"IART", "Gulls")]),
    ]);

    let tree = analyze(data);
    assert!(!tree.has_errors(), "errors: {:?}", tree.errors);
    assert!(tree.warnings.is_empty(), "warnings: {:?}", tree.warnings);
    assert_eq!(tree.fileformat, Some("riff"));
    assert_eq!(tree.mime_type, Some("audio/wav"));

    let riff = riff_section(&tree);
    assert_eq!(riff.form_type, "WAVE");
    let fmt = riff.format().unwrap();
    assert_eq!(fmt.format_name, Lookup::Value("Pulse Code Modulation (PCM)"));
    assert_eq!(fmt.channels, 2);
    assert_eq!(fmt.sample_rate, 44100);
    assert_eq!(riff.comments["title"], vec!["Tide".to_string()]);
    assert_eq!(riff.comments["artist"], vec!["Gulls".to_string()]);

    match riff.chunk("data").unwrap().body {
        RiffChunkBody::Data { offset, length } => {
            assert_eq!(offset, 44);
            assert_eq!(length, 176_400);
        }
        ref other => panic!("unexpected data body: {other:?}"),
    }

    let audio = tree.summary.audio.as_ref().unwrap();
    assert_eq!(audio.dataformat, "wav");
    assert_eq!(audio.channels, Some(2));
    assert_eq!(audio.sample_rate, Some(44100));
    assert_eq!(audio.bits_per_sample, Some(16));
    assert_eq!(audio.lossless, Some(true));
    assert_eq!(tree.summary.bitrate, Some(1_411_200.0));
    assert_eq!(tree.summary.playtime_seconds, Some(1.0));
    assert_eq!(tree.summary.payload, Some(PayloadWindow::new(44, 44 + 176_400)));
}

#[test]
fn test_odd_chunk_is_padded() {
    let data = wave_file(&[
        riff_chunk(b"fmt ", &pcm_format(1, 8000, 8)),
        info_list(&[(b"ICMT", "odd")]),
        riff_chunk(b"data", &[0u8; 3]),
    ]);

    let tree = analyze(data);
    assert!(!tree.has_errors(), "errors: {:?}", tree.errors);
    let riff = riff_section(&tree);
    assert_eq!(riff.comments["comment"], vec!["odd".to_string()]);
    assert!(riff.chunk("data").is_some());
}

// =============================================================================
// Warnings
// =============================================================================

#[test]
fn test_unknown_chunk_is_warning() {
    let data = wave_file(&[
        riff_chunk(b"fmt ", &pcm_format(1, 8000, 8)),
        riff_chunk(b"junk", &[0u8; 6]),
        riff_chunk(b"data", &[0u8; 8]),
    ]);

    let tree = analyze(data);
    assert!(!tree.has_errors());
    assert!(tree.has_warning("Unhandled chunk type: junk"));
}

#[test]
fn test_oversized_riff_is_clamped() {
    let mut data = wave_file(&[
        riff_chunk(b"fmt ", &pcm_format(1, 8000, 8)),
        riff_chunk(b"data", &[0u8; 8]),
    ]);
    data[4..8].copy_from_slice(&10_000u32.to_le_bytes());

    let tree = analyze(data);
    assert!(!tree.has_errors(), "errors: {:?}", tree.errors);
    assert!(tree.has_warning("beyond end-of-file"));
}

#[test]
fn test_oversized_list_is_not_reported_as_unknown() {
    let comment = "c".repeat(200);
    let data = wave_file(&[
        riff_chunk(b"fmt ", &pcm_format(1, 8000, 8)),
        info_list(&[(b"ICMT", comment.as_str())]),
        riff_chunk(b"data", &[0u8; 8]),
    ]);

    let config = AnalyzerConfig {
        max_inline_bytes: 64,
        ..Default::default()
    };
    let tree = analyze_with(config, data);
    assert!(!tree.has_errors(), "errors: {:?}", tree.errors);
    assert!(tree.has_warning("LIST chunk of"));
    assert!(tree.has_warning("exceeds inline limit"));
    assert!(!tree.has_warning("Unhandled chunk type"));

    let list = riff_section(&tree).chunk("LIST").unwrap();
    assert_eq!(list.body, RiffChunkBody::Raw(None));
    assert!(riff_section(&tree).comments.is_empty());
}

// =============================================================================
// Failures
// =============================================================================

#[test]
fn test_zero_channels_fails() {
    let data = wave_file(&[
        riff_chunk(b"fmt ", &pcm_format(0, 8000, 8)),
        riff_chunk(b"data", &[0u8; 8]),
    ]);

    let tree = analyze(data);
    assert!(tree.section("riff").is_none());
    assert!(tree.errors[0].message.contains("channels == zero"));
}

#[test]
fn test_missing_format_chunk_fails() {
    let data = wave_file(&[riff_chunk(b"data", &[0u8; 8])]);

    let tree = analyze(data);
    assert!(tree.section("riff").is_none());
    assert!(tree.errors[0].message.contains("without fmt chunk"));
}

#[test]
fn test_chunk_past_end_fails() {
    let mut data = wave_file(&[riff_chunk(b"fmt ", &pcm_format(1, 8000, 8))]);
    data.extend_from_slice(b"data");
    data.extend_from_slice(&1_000u32.to_le_bytes());
    let size = (data.len() - 8) as u32;
    data[4..8].copy_from_slice(&size.to_le_bytes());

    let tree = analyze(data);
    assert!(tree.section("riff").is_none());
    assert!(tree.errors[0].message.contains("past end of stream"));
}
