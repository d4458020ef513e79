//! AC-3 integration tests.
//!
//! Tests verify:
//! - Sync frame and bit-stream information decoding for common layouts
//! - Gated fields appear only for the channel layouts that carry them
//! - Unsupported bit-stream versions fail the whole section

use media_probe::format::ac3::Ac3Section;
use media_probe::{Lookup, ResultTree};

use super::test_utils::{analyze, Ac3Frame};

fn ac3_section(tree: &ResultTree) -> &Ac3Section {
    tree.section("ac3")
        .and_then(|s| s.as_ac3())
        .expect("ac3 section")
}

// =============================================================================
// Layouts
// =============================================================================

#[test]
fn test_stereo_frame() {
    let frame = Ac3Frame::default().build(768);
    let mut data = frame.clone();
    data.extend(frame);

    let tree = analyze(data);
    assert!(!tree.has_errors(), "errors: {:?}", tree.errors);
    assert_eq!(tree.fileformat, Some("ac3"));
    assert_eq!(tree.mime_type, Some("audio/ac3"));

    let ac3 = ac3_section(&tree);
    assert_eq!(ac3.bsid, 8);
    assert_eq!(ac3.acmod, 2);
    assert_eq!(ac3.synchinfo.crc1, 0x1234);
    assert_eq!(ac3.sample_rate, Lookup::Value(48000));
    assert_eq!(ac3.bitrate, Lookup::Value(192000));
    assert_eq!(ac3.frame_length, Lookup::Value(768));
    assert_eq!(ac3.dolby_surround_mode, Some(Lookup::Value("Dolby Surround encoded")));
    assert!(ac3.center_mix_level.is_none());
    assert!(ac3.surround_mix_level.is_none());
    assert_eq!(ac3.program.dialogue_normalization, Lookup::Value(-27));
    assert!(ac3.program2.is_none());
    assert!(ac3.copyright && ac3.original);

    let audio = tree.summary.audio.as_ref().unwrap();
    assert_eq!(audio.dataformat, "ac3");
    assert_eq!(audio.channels, Some(2));
    assert_eq!(audio.channel_mode.as_deref(), Some("stereo"));
    assert_eq!(audio.lossless, Some(false));
    assert_eq!(audio.bitrate_mode.as_deref(), Some("cbr"));

    // 1536 bytes at 192 kbit/s
    let playtime = tree.summary.playtime_seconds.unwrap();
    assert!((playtime - 0.064).abs() < 1e-9);
}

#[test]
fn test_five_one_frame() {
    let frame = Ac3Frame {
        acmod: 7,
        lfe: true,
        frmsizecod: 30, // 448 kbit/s
        ..Default::default()
    };
    let tree = analyze(frame.build(1792));
    assert!(!tree.has_errors(), "errors: {:?}", tree.errors);

    let ac3 = ac3_section(&tree);
    assert_eq!(ac3.center_mix_level, Some(Lookup::Value(0.707_106_781_186_547_6)));
    assert_eq!(ac3.surround_mix_level, Some(Lookup::Value(0.5)));
    assert!(ac3.dolby_surround_mode.is_none());
    assert!(ac3.lfe_enabled);
    assert!(ac3.channels_enabled.lfe && ac3.channels_enabled.surround_left);

    let audio = tree.summary.audio.as_ref().unwrap();
    assert_eq!(audio.channels, Some(6));
    assert_eq!(audio.channel_mode.as_deref(), Some("surround"));
}

#[test]
fn test_mono_has_no_center_mix_level() {
    let frame = Ac3Frame {
        acmod: 1,
        ..Default::default()
    };
    let tree = analyze(frame.build(768));
    assert!(!tree.has_errors(), "errors: {:?}", tree.errors);

    let ac3 = ac3_section(&tree);
    assert!(ac3.center_mix_level.is_none());
    // Fields after the gate still line up
    assert_eq!(ac3.program.dialnorm, 27);
    assert!(ac3.copyright);
    assert_eq!(tree.summary.audio.as_ref().unwrap().channels, Some(1));
}

#[test]
fn test_dual_mono_reads_second_program() {
    let frame = Ac3Frame {
        acmod: 0,
        compr: Some(0xF0),
        ..Default::default()
    };
    let tree = analyze(frame.build(768));
    assert!(!tree.has_errors(), "errors: {:?}", tree.errors);

    let ac3 = ac3_section(&tree);
    assert_eq!(ac3.program.compr, Some(0xF0));
    let second = ac3.program2.as_ref().expect("second program");
    assert_eq!(second.dialnorm, 27);
    assert_eq!(second.compr, Some(0xF0));
    assert!(ac3.copyright && ac3.original);
    assert_eq!(
        tree.summary.audio.as_ref().unwrap().channel_mode.as_deref(),
        Some("dual mono")
    );
}

#[test]
fn test_additional_bsi_past_header_blob() {
    // 20 bytes starting at bit 33 of the BSI run well past the bytes read
    // up front, so the cursor has to pull more from the source
    let addbsi: Vec<u8> = (0xA0..=0xB3).collect();
    let frame = Ac3Frame {
        addbsi: Some(addbsi.clone()),
        ..Default::default()
    };

    let tree = analyze(frame.build(768));
    assert!(!tree.has_errors(), "errors: {:?}", tree.errors);
    let ac3 = ac3_section(&tree);
    assert_eq!(ac3.additional_bsi.as_deref(), Some(&addbsi[..]));
    assert!(ac3.timecode1.is_none());
    assert!(ac3.copyright && ac3.original);
}

// =============================================================================
// Failures
// =============================================================================

#[test]
fn test_unsupported_bsid_is_fatal() {
    let frame = Ac3Frame {
        bsid: 16, // E-AC-3
        ..Default::default()
    };
    let tree = analyze(frame.build(768));

    assert!(tree.fileformat.is_none());
    assert!(tree.section("ac3").is_none());
    assert_eq!(tree.errors.len(), 1);
    assert_eq!(tree.errors[0].format, "ac3");
    assert!(tree.errors[0].message.contains("version 16"));
}

#[test]
fn test_truncated_syncinfo() {
    let tree = analyze(vec![0x0B, 0x77, 0x00, 0x00]);
    assert!(tree.fileformat.is_none());
    assert!(tree.errors[0].message.contains("truncated syncinfo"));
}
