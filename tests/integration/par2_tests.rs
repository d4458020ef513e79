//! PAR2 integration tests.
//!
//! Tests verify:
//! - Packets of every decoded type are walked in order
//! - MD5 verification, including recovery slices hashed from the source
//! - Malformed packet headers fail the section

use media_probe::format::par2::{Par2Body, Par2Section};
use media_probe::{AnalyzerConfig, ResultTree};

use super::test_utils::{
    analyze, analyze_with, par2_creator_body, par2_file_desc_body, par2_main_body, par2_packet,
    par2_recovery_body, PAR2_CREATOR, PAR2_FILE_DESC, PAR2_MAIN, PAR2_RECOVERY_SLICE,
};

const FILE_ID: [u8; 16] = [0x3C; 16];

fn par2_section(tree: &ResultTree) -> &Par2Section {
    tree.section("par2")
        .and_then(|s| s.as_par2())
        .expect("par2 section")
}

fn recovery_set() -> Vec<u8> {
    let mut data = par2_packet(PAR2_MAIN, &par2_main_body(4096, FILE_ID));
    data.extend(par2_packet(
        PAR2_FILE_DESC,
        &par2_file_desc_body(FILE_ID, 123_456, "holiday.tar"),
    ));
    data.extend(par2_packet(PAR2_RECOVERY_SLICE, &par2_recovery_body(0, 4096)));
    data.extend(par2_packet(PAR2_RECOVERY_SLICE, &par2_recovery_body(1, 4096)));
    data.extend(par2_packet(PAR2_CREATOR, &par2_creator_body("par2cmdline 0.8.1")));
    data
}

// =============================================================================
// Packet Walk
// =============================================================================

#[test]
fn test_recovery_set() {
    let tree = analyze(recovery_set());
    assert!(!tree.has_errors(), "errors: {:?}", tree.errors);
    assert!(tree.warnings.is_empty(), "warnings: {:?}", tree.warnings);
    assert_eq!(tree.fileformat, Some("par2"));
    assert_eq!(tree.mime_type, Some("application/x-par2"));

    let par2 = par2_section(&tree);
    let types: Vec<_> = par2.packets.iter().map(|p| p.packet_type.as_str()).collect();
    assert_eq!(
        types,
        vec![
            "PAR 2.0 Main",
            "PAR 2.0 FileDesc",
            "PAR 2.0 RecvSlic",
            "PAR 2.0 RecvSlic",
            "PAR 2.0 Creator"
        ]
    );
    assert!(par2.packets.iter().all(|p| p.md5_verified == Some(true)));
    assert_eq!(par2.recovery_slice_count, 2);
    assert_eq!(par2.creator.as_deref(), Some("par2cmdline 0.8.1"));
    assert_eq!(par2.files, vec!["holiday.tar".to_string()]);

    match &par2.packets[0].body {
        Par2Body::Main {
            slice_size,
            recovery_file_count,
            recovery_file_ids,
            non_recovery_file_ids,
        } => {
            assert_eq!(*slice_size, 4096);
            assert_eq!(*recovery_file_count, 1);
            assert_eq!(recovery_file_ids, &vec![hex::encode(FILE_ID)]);
            assert!(non_recovery_file_ids.is_empty());
        }
        other => panic!("unexpected main body: {other:?}"),
    }
    match &par2.packets[3].body {
        Par2Body::RecoverySlice {
            exponent,
            data_length,
        } => {
            assert_eq!(*exponent, 1);
            assert_eq!(*data_length, 4096);
        }
        other => panic!("unexpected recovery body: {other:?}"),
    }
    assert_eq!(par2.packets[2].length, 64 + 4 + 4096);
}

#[test]
fn test_md5_mismatch_in_recovery_slice() {
    let mut data = par2_packet(PAR2_MAIN, &par2_main_body(4096, FILE_ID));
    let slice_at = data.len();
    data.extend(par2_packet(PAR2_RECOVERY_SLICE, &par2_recovery_body(0, 1024)));
    // Flip a byte in the slice data, which is never retained
    let last = data.len() - 1;
    data[last] ^= 0xFF;

    let tree = analyze(data);
    assert!(!tree.has_errors(), "errors: {:?}", tree.errors);
    assert!(tree.has_warning(&format!(
        "MD5 mismatch in PAR 2.0 RecvSlic packet at offset {slice_at}"
    )));
    let par2 = par2_section(&tree);
    assert_eq!(par2.packets[0].md5_verified, Some(true));
    assert_eq!(par2.packets[1].md5_verified, Some(false));
}

#[test]
fn test_verification_can_be_disabled() {
    let mut data = recovery_set();
    let last = data.len() - 1;
    data[last] ^= 0xFF;

    let config = AnalyzerConfig {
        verify_checksums: false,
        ..Default::default()
    };
    let tree = analyze_with(config, data);
    assert!(tree.warnings.is_empty(), "warnings: {:?}", tree.warnings);
    assert!(par2_section(&tree).packets.iter().all(|p| p.md5_verified.is_none()));
}

#[test]
fn test_unknown_packet_type_is_warning() {
    let mut data = par2_packet(PAR2_MAIN, &par2_main_body(4096, FILE_ID));
    data.extend(par2_packet(b"PAR 2.0\0Custom\0\0", &[1, 2, 3, 4]));

    let tree = analyze(data);
    assert!(!tree.has_errors(), "errors: {:?}", tree.errors);
    assert!(tree.has_warning("Unhandled packet type: PAR 2.0 Custom"));
    assert!(matches!(par2_section(&tree).packets[1].body, Par2Body::Raw(Some(_))));
}

#[test]
fn test_short_recovery_slice_is_warning() {
    let mut data = par2_packet(PAR2_MAIN, &par2_main_body(4096, FILE_ID));
    let slice_at = data.len();
    data.extend(par2_packet(PAR2_RECOVERY_SLICE, &[]));
    data.extend(par2_packet(PAR2_CREATOR, &par2_creator_body("par2cmdline 0.8.1")));

    let tree = analyze(data);
    assert!(!tree.has_errors(), "errors: {:?}", tree.errors);
    assert!(tree.has_warning(&format!("Truncated recovery slice at offset {slice_at}")));

    let par2 = par2_section(&tree);
    assert_eq!(par2.packets.len(), 3);
    assert_eq!(par2.packets[1].body, Par2Body::Raw(None));
    assert_eq!(par2.recovery_slice_count, 0);
    // The next packet's magic is not mistaken for slice data
    assert_eq!(par2.creator.as_deref(), Some("par2cmdline 0.8.1"));
}

// =============================================================================
// Failures
// =============================================================================

#[test]
fn test_misaligned_length_fails() {
    let mut data = par2_packet(PAR2_MAIN, &par2_main_body(4096, FILE_ID));
    data[8..16].copy_from_slice(&66u64.to_le_bytes());

    let tree = analyze(data);
    assert!(tree.section("par2").is_none());
    assert!(tree.errors[0].message.contains("invalid packet length 66"));
}

#[test]
fn test_trailing_garbage_fails() {
    let mut data = recovery_set();
    data.extend_from_slice(&[0u8; 80]);

    let tree = analyze(data);
    assert!(tree.fileformat.is_none());
    assert_eq!(tree.errors[0].format, "par2");
}

#[test]
fn test_packet_limit() {
    let config = AnalyzerConfig {
        max_records: 3,
        ..Default::default()
    };
    let tree = analyze_with(config, recovery_set());
    assert!(tree.section("par2").is_none());
    assert!(tree.errors[0].message.contains("Record limit of 3 exceeded"));
}

#[test]
fn test_bad_magic_reports_packet_offset() {
    let mut data = recovery_set();
    let second = par2_packet(PAR2_MAIN, &par2_main_body(4096, FILE_ID)).len();
    data[second + 4] = b'X';

    let tree = analyze(data);
    assert!(tree.section("par2").is_none());
    assert!(
        tree.errors[0].message.contains(&format!("at offset {second}")),
        "errors: {:?}",
        tree.errors
    );
}
