//! AC-3 (Dolby Digital) bit stream information decoder.
//!
//! An AC-3 stream is a sequence of synchronization frames. Each frame starts
//! with a 5-byte `syncinfo` block followed by the bit-packed `bsi` (bit
//! stream information) header, which is what this handler decodes:
//!
//! ```text
//! syncinfo: syncword(16) = 0x0B77 | crc1(16) | fscod(2) | frmsizecod(6)
//! bsi:      bsid(5) | bsmod(3) | acmod(3) | [cmixlev(2)] | [surmixlev(2)]
//!           | [dsurmod(2)] | lfeon(1) | dialnorm(5) | compre(1) [compr(8)]
//!           | langcode(1) [langcod(8)] | audprodie(1) [mixlevel(5) roomtyp(2)]
//!           | (acmod == 0: the same five fields again for Ch2)
//!           | copyrightb(1) | origbs(1) | timecod1e(1) [timecod1(14)]
//!           | timecod2e(1) [timecod2(14)] | addbsie(1) [addbsil(6) addbsi(...)]
//! ```
//!
//! Reference: ATSC A/52 "Digital Audio Compression (AC-3) Standard".
//!
//! Versions (`bsid`) above 8 are not decodable by an A/52 decoder and are
//! rejected; the section is retracted.

use serde::Serialize;

use super::handler::{Handler, Scope};
use super::lookup::{CodeTable, Entry, Lookup};
use super::result::Section;
use crate::error::FormatError;
use crate::io::{read_u16_be, BitCursor, ByteSource};

// =============================================================================
// Constants
// =============================================================================

/// Sync word at the start of every frame
pub const SYNC_WORD: [u8; 2] = [0x0B, 0x77];

/// Size of the syncinfo block
const SYNCINFO_SIZE: usize = 5;

/// Bytes of bsi read up front; covers the longest bsi without addbsi
const BSI_SIZE: usize = 15;

/// Highest bit stream identification an A/52 decoder understands
pub const MAX_BSID: u64 = 8;

/// Frame-size codes 0..=37 are defined
const MAX_FRMSIZECOD: u32 = 37;

// =============================================================================
// Lookup tables
// =============================================================================

/// fscod → sample rate (Hz)
pub static SAMPLE_RATES: CodeTable<u32> = CodeTable::new(&[
    Entry::Value(48000),
    Entry::Value(44100),
    Entry::Value(32000),
    // Decoders should mute on the reserved code
    Entry::Reserved,
]);

/// frmsizecod / 2 → nominal bitrate (bits/s)
static BITRATES: [u32; 19] = [
    32000, 40000, 48000, 56000, 64000, 80000, 96000, 112000, 128000, 160000, 192000, 224000,
    256000, 320000, 384000, 448000, 512000, 576000, 640000,
];

/// frmsizecod / 2 → frame size in 16-bit words at 48 / 44.1 / 32 kHz.
///
/// At 44.1 kHz an odd frmsizecod adds one word.
static FRAME_WORDS: [[u32; 3]; 19] = [
    [64, 69, 96],
    [80, 87, 120],
    [96, 104, 144],
    [112, 121, 168],
    [128, 139, 192],
    [160, 174, 240],
    [192, 208, 288],
    [224, 243, 336],
    [256, 278, 384],
    [320, 348, 480],
    [384, 417, 576],
    [448, 487, 672],
    [512, 557, 768],
    [640, 696, 960],
    [768, 835, 1152],
    [896, 975, 1344],
    [1024, 1114, 1536],
    [1152, 1253, 1728],
    [1280, 1393, 1920],
];

/// Channel layout for one audio coding mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CodingMode {
    pub channel_config: &'static str,
    /// Full-bandwidth channels, LFE excluded
    pub num_channels: u32,
    pub channel_order: &'static str,
}

const fn mode(
    channel_config: &'static str,
    num_channels: u32,
    channel_order: &'static str,
) -> Entry<CodingMode> {
    Entry::Value(CodingMode {
        channel_config,
        num_channels,
        channel_order,
    })
}

/// acmod → channel layout
pub static CODING_MODES: CodeTable<CodingMode> = CodeTable::new(&[
    mode("1+1", 2, "Ch1,Ch2"),
    mode("1/0", 1, "C"),
    mode("2/0", 2, "L,R"),
    mode("3/0", 3, "L,C,R"),
    mode("2/1", 3, "L,R,S"),
    mode("3/1", 4, "L,C,R,S"),
    mode("2/2", 4, "L,R,SL,SR"),
    mode("3/2", 5, "L,C,R,SL,SR"),
]);

/// bsmod → service type, for bsmod 0..=6 (independent of acmod)
static SERVICE_TYPES: CodeTable<&str> = CodeTable::new(&[
    Entry::Value("main audio service: complete main (CM)"),
    Entry::Value("main audio service: music and effects (ME)"),
    Entry::Value("associated service: visually impaired (VI)"),
    Entry::Value("associated service: hearing impaired (HI)"),
    Entry::Value("associated service: dialogue (D)"),
    Entry::Value("associated service: commentary (C)"),
    Entry::Value("associated service: emergency (E)"),
]);

/// cmixlev → center mix level (linear)
pub static CENTER_MIX_LEVELS: CodeTable<f64> = CodeTable::new(&[
    Entry::Value(0.707_106_781_186_547_6), // 2^(-3/6), -3.0 dB
    Entry::Value(0.594_603_557_501_360_5), // 2^(-4.5/6), -4.5 dB
    Entry::Value(0.5),                     // 2^(-6/6), -6.0 dB
    Entry::Reserved,
]);

/// surmixlev → surround mix level (linear)
pub static SURROUND_MIX_LEVELS: CodeTable<f64> = CodeTable::new(&[
    Entry::Value(0.707_106_781_186_547_6), // -3 dB
    Entry::Value(0.5),                     // -6 dB
    Entry::Value(0.0),
    Entry::Reserved,
]);

/// dsurmod → Dolby Surround mode
pub static DOLBY_SURROUND_MODES: CodeTable<&str> = CodeTable::new(&[
    Entry::Value("not indicated"),
    Entry::Value("Not Dolby Surround encoded"),
    Entry::Value("Dolby Surround encoded"),
    Entry::Reserved,
]);

/// roomtyp → mixing room type
pub static ROOM_TYPES: CodeTable<&str> = CodeTable::new(&[
    Entry::Value("not indicated"),
    Entry::Value("large room, X curve monitor"),
    Entry::Value("small room, flat monitor"),
    Entry::Reserved,
]);

/// Resolve the nominal bitrate for a frame-size code.
pub fn bitrate(frmsizecod: u32) -> Lookup<u32> {
    if frmsizecod > MAX_FRMSIZECOD {
        return Lookup::Invalid(frmsizecod);
    }
    Lookup::Value(BITRATES[(frmsizecod / 2) as usize])
}

/// Resolve the frame length in bytes for a frame-size code and sample rate code.
pub fn frame_length(frmsizecod: u32, fscod: u32) -> Lookup<u32> {
    if frmsizecod > MAX_FRMSIZECOD {
        return Lookup::Invalid(frmsizecod);
    }
    match SAMPLE_RATES.resolve(fscod) {
        Lookup::Value(_) => {
            let mut words = FRAME_WORDS[(frmsizecod / 2) as usize][fscod as usize];
            if fscod == 1 && frmsizecod % 2 == 1 {
                words += 1;
            }
            Lookup::Value(words * 2)
        }
        Lookup::Reserved(c) => Lookup::Reserved(c),
        Lookup::Invalid(c) => Lookup::Invalid(c),
    }
}

/// Resolve the service type from bsmod and acmod.
///
/// bsmod 7 means voice over with a single channel and karaoke with two or
/// more; with dual mono it has no defined meaning.
pub fn service_type(bsmod: u32, acmod: u32) -> Lookup<&'static str> {
    match (bsmod, acmod) {
        (0..=6, 0..=7) => SERVICE_TYPES.resolve(bsmod),
        (7, 1) => Lookup::Value("associated service: voice over (VO)"),
        (7, 2..=7) => Lookup::Value("main audio service: karaoke"),
        _ => Lookup::Invalid((bsmod << 3) | acmod),
    }
}

/// Dialogue level in dB below digital full scale; 0 is reserved.
pub fn dialogue_normalization(dialnorm: u32) -> Lookup<i32> {
    match dialnorm {
        0 => Lookup::Reserved(0),
        1..=31 => Lookup::Value(-(dialnorm as i32)),
        _ => Lookup::Invalid(dialnorm),
    }
}

/// Heavy compression gain in dB from the 8-bit `compr` word.
///
/// The top nibble is a signed gain step of 6.02 dB, the low nibble a linear
/// fraction `0.1Y4Y5Y6Y7` in base 2.
pub fn heavy_compression(compr: u8) -> f64 {
    let step = ((compr as i8) >> 4) as f64;
    let log_gain = (step + 1.0) * 20.0 * 2f64.log10();
    let lin_gain = (16 + (compr & 0x0F) as u32) as f64 / 32.0;
    log_gain - lin_gain
}

// =============================================================================
// Section types
// =============================================================================

/// Raw syncinfo fields.
#[derive(Debug, Clone, Serialize)]
pub struct SyncInfo {
    pub crc1: u16,
    pub fscod: u32,
    pub frmsizecod: u32,
}

/// Which channels the coding mode carries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChannelsEnabled {
    pub ch1: bool,
    pub ch2: bool,
    pub left: bool,
    pub right: bool,
    pub center: bool,
    pub surround_mono: bool,
    pub surround_left: bool,
    pub surround_right: bool,
    pub lfe: bool,
}

impl ChannelsEnabled {
    pub fn new(acmod: u32, lfe: bool) -> Self {
        Self {
            ch1: acmod == 0,
            ch2: acmod == 0,
            left: acmod > 1,
            right: acmod > 1,
            center: acmod & 0x01 != 0,
            surround_mono: matches!(acmod, 4 | 5),
            surround_left: matches!(acmod, 6 | 7),
            surround_right: matches!(acmod, 6 | 7),
            lfe,
        }
    }
}

/// Per-program fields; dual mono streams carry two sets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgramInfo {
    pub dialnorm: u32,
    /// dB relative to full scale
    pub dialogue_normalization: Lookup<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compr: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heavy_compression: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub langcod: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub production: Option<ProductionInfo>,
}

/// Audio production information (mixing level and room).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductionInfo {
    pub mixlevel: u32,
    /// Peak mixing level in dB SPL (80 + mixlevel)
    pub mixing_level: u32,
    pub room_type: Lookup<&'static str>,
}

/// Decoded AC-3 section.
#[derive(Debug, Clone, Serialize)]
pub struct Ac3Section {
    pub synchinfo: SyncInfo,
    pub bsid: u32,
    pub bsmod: u32,
    pub acmod: u32,
    pub sample_rate: Lookup<u32>,
    /// Bytes per frame
    pub frame_length: Lookup<u32>,
    pub bitrate: Lookup<u32>,
    pub service_type: Lookup<&'static str>,
    pub coding_mode: Lookup<CodingMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub center_mix_level: Option<Lookup<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surround_mix_level: Option<Lookup<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dolby_surround_mode: Option<Lookup<&'static str>>,
    pub lfe_enabled: bool,
    pub channels_enabled: ChannelsEnabled,
    pub program: ProgramInfo,
    /// Second program of a dual mono (1+1) stream
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program2: Option<ProgramInfo>,
    pub copyright: bool,
    pub original: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timecode1: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timecode2: Option<u16>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "super::result::serialize_hex_opt"
    )]
    pub additional_bsi: Option<Vec<u8>>,
}

// =============================================================================
// Handler
// =============================================================================

/// AC-3 handler.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ac3Handler;

impl Ac3Handler {
    fn read_program(cursor: &mut BitCursor) -> Result<ProgramInfo, FormatError> {
        let dialnorm = cursor.read_bits(5)? as u32;

        let compr = if cursor.read_flag()? {
            Some(cursor.read_bits(8)? as u8)
        } else {
            None
        };
        let langcod = if cursor.read_flag()? {
            Some(cursor.read_bits(8)? as u8)
        } else {
            None
        };
        let production = if cursor.read_flag()? {
            let mixlevel = cursor.read_bits(5)? as u32;
            let roomtyp = cursor.read_bits(2)? as u32;
            Some(ProductionInfo {
                mixlevel,
                mixing_level: 80 + mixlevel,
                room_type: ROOM_TYPES.resolve(roomtyp),
            })
        } else {
            None
        };

        Ok(ProgramInfo {
            dialnorm,
            dialogue_normalization: dialogue_normalization(dialnorm),
            compr,
            heavy_compression: compr.map(heavy_compression),
            langcod,
            production,
        })
    }
}

impl Handler for Ac3Handler {
    fn name(&self) -> &'static str {
        "ac3"
    }

    fn mime_type(&self) -> Option<&'static str> {
        Some("audio/ac3")
    }

    fn analyze(&self, source: &dyn ByteSource, scope: &mut Scope<'_>) -> Result<(), FormatError> {
        let window = scope.window();
        let start = window.start;

        let head = source.read_up_to(start, SYNCINFO_SIZE)?;
        if head.len() < 2 || head[..2] != SYNC_WORD {
            return Err(FormatError::signature(
                &SYNC_WORD,
                &head[..head.len().min(2)],
                start,
            ));
        }
        if head.len() < SYNCINFO_SIZE {
            return Err(FormatError::malformed("ac3", "truncated syncinfo"));
        }

        let synchinfo = SyncInfo {
            crc1: read_u16_be(&head, 2)?,
            fscod: (head[4] >> 6) as u32,
            frmsizecod: (head[4] & 0x3F) as u32,
        };

        let bsi_offset = start + SYNCINFO_SIZE as u64;
        let mut cursor = BitCursor::new(source.read_up_to(bsi_offset, BSI_SIZE)?.to_vec());

        let bsid = cursor.read_bits(5)?;
        if bsid > MAX_BSID {
            return Err(FormatError::UnsupportedVersion {
                format: "ac3",
                found: bsid.to_string(),
                supported: MAX_BSID.to_string(),
            });
        }

        let bsmod = cursor.read_bits(3)? as u32;
        let acmod = cursor.read_bits(3)? as u32;

        // Gated fields: each present only for specific channel layouts.
        // Mono (1/0) has a center channel but nothing to mix it into.
        let center_mix_level = if acmod & 0x01 != 0 && acmod != 0x01 {
            Some(CENTER_MIX_LEVELS.resolve(cursor.read_bits(2)? as u32))
        } else {
            None
        };
        let surround_mix_level = if acmod & 0x04 != 0 {
            Some(SURROUND_MIX_LEVELS.resolve(cursor.read_bits(2)? as u32))
        } else {
            None
        };
        let dolby_surround_mode = if acmod == 0x02 {
            Some(DOLBY_SURROUND_MODES.resolve(cursor.read_bits(2)? as u32))
        } else {
            None
        };

        let lfe_enabled = cursor.read_flag()?;
        let program = Self::read_program(&mut cursor)?;
        let program2 = if acmod == 0 {
            Some(Self::read_program(&mut cursor)?)
        } else {
            None
        };

        let copyright = cursor.read_flag()?;
        let original = cursor.read_flag()?;
        let timecode1 = if cursor.read_flag()? {
            Some(cursor.read_bits(14)? as u16)
        } else {
            None
        };
        let timecode2 = if cursor.read_flag()? {
            Some(cursor.read_bits(14)? as u16)
        } else {
            None
        };

        let additional_bsi = if cursor.read_flag()? {
            // addbsil + 1 bytes follow, possibly past the pre-read header
            let len = cursor.read_bits(6)? as usize + 1;
            let extra_offset = bsi_offset + BSI_SIZE as u64;
            cursor.extend(&source.read_up_to(extra_offset, len)?);
            Some(cursor.read_bytes(len)?)
        } else {
            None
        };

        let sample_rate = SAMPLE_RATES.resolve(synchinfo.fscod);
        let bitrate = bitrate(synchinfo.frmsizecod);
        let coding_mode = CODING_MODES.resolve(acmod);

        // Normalized summary
        let summary = scope.summary_mut();
        let audio = summary.audio_mut("ac3");
        audio.bitrate_mode = Some("cbr".into());
        audio.lossless = Some(false);
        audio.sample_rate = sample_rate.get();
        audio.bitrate = bitrate.get().map(f64::from);
        audio.channel_mode = Some(
            match acmod {
                0 => "dual mono",
                1 => "mono",
                2 => "stereo",
                _ => "surround",
            }
            .into(),
        );
        audio.channels = coding_mode
            .get()
            .map(|m| m.num_channels + u32::from(lfe_enabled));

        if let Some(rate) = bitrate.get() {
            summary.bitrate = Some(rate as f64);
            summary.playtime_seconds = Some(window.len() as f64 * 8.0 / rate as f64);
        }

        scope.set_section(Section::Ac3(Box::new(Ac3Section {
            frame_length: frame_length(synchinfo.frmsizecod, synchinfo.fscod),
            synchinfo,
            bsid: bsid as u32,
            bsmod,
            acmod,
            sample_rate,
            bitrate,
            service_type: service_type(bsmod, acmod),
            coding_mode,
            center_mix_level,
            surround_mix_level,
            dolby_surround_mode,
            lfe_enabled,
            channels_enabled: ChannelsEnabled::new(acmod, lfe_enabled),
            program,
            program2,
            copyright,
            original,
            timecode1,
            timecode2,
            additional_bsi,
        })));

        Ok(())
    }
}
