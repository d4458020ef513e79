//! Test utilities for integration tests.
//!
//! Builders for small synthetic files in every supported format, plus a
//! helper that runs the default analyzer over an in-memory buffer.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use md5::{Digest, Md5};

use media_probe::error::IoError;
use media_probe::{Analyzer, AnalyzerConfig, ByteSource, MemorySource, ResultTree};

// =============================================================================
// Byte Source with Request Tracking
// =============================================================================

/// An in-memory source that records every read request.
///
/// This is useful for verifying cache behavior and read patterns.
pub struct TrackingSource {
    inner: MemorySource,
    request_count: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<(u64, usize)>>>,
}

impl TrackingSource {
    pub fn new(data: Vec<u8>, identifier: impl Into<String>) -> Self {
        Self {
            inner: MemorySource::new(data, identifier),
            request_count: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    pub fn get_requests(&self) -> Vec<(u64, usize)> {
        self.requests.lock().unwrap().clone()
    }

    fn track(&self, offset: u64, len: usize) {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push((offset, len));
    }
}

impl ByteSource for TrackingSource {
    fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        self.track(offset, len);
        self.inner.read_exact_at(offset, len)
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }

    fn identifier(&self) -> &str {
        self.inner.identifier()
    }
}

// =============================================================================
// Analysis Helpers
// =============================================================================

/// Analyse `data` with the default configuration and tag readers.
pub fn analyze(data: Vec<u8>) -> ResultTree {
    analyze_with(AnalyzerConfig::default(), data)
}

/// Analyse `data` with a custom configuration and the default tag readers.
pub fn analyze_with(config: AnalyzerConfig, data: Vec<u8>) -> ResultTree {
    let source = MemorySource::new(data, "mem://test");
    Analyzer::new(config).analyze(&source)
}

// =============================================================================
// Bit Writer (AC-3)
// =============================================================================

/// MSB-first bit writer.
#[derive(Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    used: u32,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the low `count` bits of `value`, most significant first.
    pub fn put(&mut self, count: u32, value: u64) -> &mut Self {
        for i in (0..count).rev() {
            if self.used % 8 == 0 {
                self.bytes.push(0);
            }
            let bit = ((value >> i) & 1) as u8;
            let last = self.bytes.len() - 1;
            self.bytes[last] |= bit << (7 - self.used % 8);
            self.used += 1;
        }
        self
    }

    pub fn flag(&mut self, set: bool) -> &mut Self {
        self.put(1, set as u64)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Parameters of a synthetic AC-3 sync frame.
pub struct Ac3Frame {
    pub fscod: u8,
    pub frmsizecod: u8,
    pub bsid: u8,
    pub bsmod: u8,
    pub acmod: u8,
    pub lfe: bool,
    pub dialnorm: u8,
    pub compr: Option<u8>,
    pub copyright: bool,
    pub original: bool,
    /// Additional BSI bytes (1..=64)
    pub addbsi: Option<Vec<u8>>,
}

impl Default for Ac3Frame {
    fn default() -> Self {
        Self {
            fscod: 0,
            frmsizecod: 20, // 192 kbit/s
            bsid: 8,
            bsmod: 0,
            acmod: 2,
            lfe: false,
            dialnorm: 27,
            compr: None,
            copyright: true,
            original: true,
            addbsi: None,
        }
    }
}

impl Ac3Frame {
    /// Encode syncinfo and BSI, zero-padded to `frame_len` bytes.
    pub fn build(&self, frame_len: usize) -> Vec<u8> {
        let mut w = BitWriter::new();
        w.put(16, 0x0B77).put(16, 0x1234);
        w.put(2, self.fscod as u64).put(6, self.frmsizecod as u64);
        w.put(5, self.bsid as u64).put(3, self.bsmod as u64).put(3, self.acmod as u64);

        if self.acmod & 0x01 != 0 && self.acmod != 1 {
            w.put(2, 0); // cmixlev
        }
        if self.acmod & 0x04 != 0 {
            w.put(2, 1); // surmixlev
        }
        if self.acmod == 2 {
            w.put(2, 2); // dsurmod
        }
        w.flag(self.lfe);

        let programs = if self.acmod == 0 { 2 } else { 1 };
        for _ in 0..programs {
            w.put(5, self.dialnorm as u64);
            match self.compr {
                Some(compr) => w.flag(true).put(8, compr as u64),
                None => w.flag(false),
            };
            w.flag(false); // langcode
            w.flag(false); // audprodie
        }

        w.flag(self.copyright).flag(self.original);
        w.flag(false).flag(false); // timecodes
        match &self.addbsi {
            Some(bytes) => {
                w.flag(true).put(6, bytes.len() as u64 - 1);
                for &b in bytes {
                    w.put(8, b as u64);
                }
            }
            None => {
                w.flag(false);
            }
        }

        let mut frame = w.into_bytes();
        frame.resize(frame_len.max(frame.len()), 0);
        frame
    }
}

// =============================================================================
// PNG Builders
// =============================================================================

pub const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Encode one chunk with a correct CRC.
pub fn png_chunk(chunk_type: &[u8; 4], data: &[u8]) -> Vec<u8> {
    let mut chunk = Vec::with_capacity(12 + data.len());
    chunk.extend_from_slice(&(data.len() as u32).to_be_bytes());
    chunk.extend_from_slice(chunk_type);
    chunk.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(data);
    chunk.extend_from_slice(&hasher.finalize().to_be_bytes());
    chunk
}

/// IHDR payload.
pub fn ihdr(width: u32, height: u32, bit_depth: u8, color_type: u8) -> Vec<u8> {
    let mut data = Vec::with_capacity(13);
    data.extend_from_slice(&width.to_be_bytes());
    data.extend_from_slice(&height.to_be_bytes());
    data.extend_from_slice(&[bit_depth, color_type, 0, 0, 0]);
    data
}

/// Builder for PNG streams: signature, chunks, optional IEND.
pub struct PngBuilder {
    chunks: Vec<Vec<u8>>,
}

impl PngBuilder {
    pub fn new() -> Self {
        Self { chunks: Vec::new() }
    }

    pub fn chunk(mut self, chunk_type: &[u8; 4], data: &[u8]) -> Self {
        self.chunks.push(png_chunk(chunk_type, data));
        self
    }

    /// Append pre-encoded bytes (e.g. a chunk with a corrupted CRC).
    pub fn raw(mut self, bytes: Vec<u8>) -> Self {
        self.chunks.push(bytes);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut data = PNG_SIGNATURE.to_vec();
        for chunk in self.chunks {
            data.extend(chunk);
        }
        data
    }

    /// Build with a trailing IEND chunk.
    pub fn finish(self) -> Vec<u8> {
        self.chunk(b"IEND", &[]).build()
    }
}

impl Default for PngBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// TIFF File Builders
// =============================================================================

#[derive(Clone, Copy)]
pub enum ByteOrderType {
    LittleEndian,
    BigEndian,
}

/// Builder for creating test TIFF files.
///
/// IFDs are laid out back to back after the header, each followed by its
/// out-of-line values, and chained through their next-IFD pointers.
pub struct TiffBuilder {
    byte_order: ByteOrderType,
    is_bigtiff: bool,
    ifds: Vec<IfdBuilder>,
    cyclic: bool,
}

impl TiffBuilder {
    pub fn new() -> Self {
        Self {
            byte_order: ByteOrderType::LittleEndian,
            is_bigtiff: false,
            ifds: Vec::new(),
            cyclic: false,
        }
    }

    pub fn with_byte_order(mut self, order: ByteOrderType) -> Self {
        self.byte_order = order;
        self
    }

    pub fn with_bigtiff(mut self, is_bigtiff: bool) -> Self {
        self.is_bigtiff = is_bigtiff;
        self
    }

    pub fn add_ifd(mut self, ifd: IfdBuilder) -> Self {
        self.ifds.push(ifd);
        self
    }

    /// Point the last IFD back at the first.
    pub fn with_cycle(mut self) -> Self {
        self.cyclic = true;
        self
    }

    fn inline_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            4
        }
    }

    fn ifd_size(&self, ifd: &IfdBuilder) -> usize {
        let entries = ifd.entries.len();
        if self.is_bigtiff {
            8 + entries * 20 + 8
        } else {
            2 + entries * 12 + 4
        }
    }

    /// Build the TIFF file data.
    pub fn build(self) -> Vec<u8> {
        let order = self.byte_order;
        let inline = self.inline_size();
        let header_size: usize = if self.is_bigtiff { 16 } else { 8 };

        // Lay out every IFD and its external values first
        let mut ifd_offsets = Vec::with_capacity(self.ifds.len());
        let mut offset = header_size;
        for ifd in &self.ifds {
            ifd_offsets.push(offset as u64);
            offset += self.ifd_size(ifd) + ifd.external_len(order, inline);
            offset += offset & 1;
        }

        let mut data = Vec::new();
        match order {
            ByteOrderType::LittleEndian => data.extend_from_slice(b"II"),
            ByteOrderType::BigEndian => data.extend_from_slice(b"MM"),
        }
        let first = ifd_offsets.first().copied().unwrap_or(0);
        if self.is_bigtiff {
            write_value(&mut data, order, 43, 2);
            write_value(&mut data, order, 8, 2);
            write_value(&mut data, order, 0, 2);
            write_value(&mut data, order, first, 8);
        } else {
            write_value(&mut data, order, 42, 2);
            write_value(&mut data, order, first, 4);
        }

        for (idx, ifd) in self.ifds.iter().enumerate() {
            let next = match ifd_offsets.get(idx + 1) {
                Some(&next) => next,
                None if self.cyclic => first,
                None => 0,
            };
            let external_start = ifd_offsets[idx] + self.ifd_size(ifd) as u64;
            ifd.write_to(&mut data, order, self.is_bigtiff, external_start, next);
            if data.len() % 2 == 1 {
                data.push(0);
            }
        }

        data
    }
}

impl Default for TiffBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Entry payload, encoded in the file's byte order at build time.
enum EntryValue {
    Uints(Vec<u64>),
    Raw(Vec<u8>),
}

struct IfdEntryBuilder {
    tag: u16,
    field_type: u16,
    count: u32,
    value: EntryValue,
}

impl IfdEntryBuilder {
    fn encode(&self, order: ByteOrderType) -> Vec<u8> {
        match &self.value {
            EntryValue::Uints(values) => {
                let size = field_type_size(self.field_type);
                let mut out = Vec::with_capacity(values.len() * size);
                for &v in values {
                    write_value(&mut out, order, v, size);
                }
                out
            }
            EntryValue::Raw(bytes) => bytes.clone(),
        }
    }
}

/// Builder for creating IFD entries.
pub struct IfdBuilder {
    entries: Vec<IfdEntryBuilder>,
}

impl IfdBuilder {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// A minimal uncompressed grayscale image IFD.
    pub fn image(width: u32, height: u32) -> Self {
        let mut builder = Self::new();
        builder
            .add_entry(256, 4, 1, width as u64) // ImageWidth
            .add_entry(257, 4, 1, height as u64) // ImageLength
            .add_entry(258, 3, 1, 8) // BitsPerSample
            .add_entry(259, 3, 1, 1) // Compression = none
            .add_entry(262, 3, 1, 1); // PhotometricInterpretation = MinIsBlack
        builder
    }

    /// Add a single-valued integer entry.
    pub fn add_entry(&mut self, tag: u16, field_type: u16, count: u32, value: u64) -> &mut Self {
        self.entries.push(IfdEntryBuilder {
            tag,
            field_type,
            count,
            value: EntryValue::Uints(vec![value]),
        });
        self
    }

    /// Add an array of SHORT values.
    pub fn add_shorts(&mut self, tag: u16, values: &[u16]) -> &mut Self {
        self.entries.push(IfdEntryBuilder {
            tag,
            field_type: 3,
            count: values.len() as u32,
            value: EntryValue::Uints(values.iter().map(|&v| v as u64).collect()),
        });
        self
    }

    /// Add a NUL-terminated ASCII entry.
    pub fn add_ascii(&mut self, tag: u16, text: &str) -> &mut Self {
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0);
        self.add_entry_with_data(tag, 2, bytes.len() as u32, bytes)
    }

    /// Add a tag entry with pre-encoded data (inline when it fits).
    pub fn add_entry_with_data(
        &mut self,
        tag: u16,
        field_type: u16,
        count: u32,
        data: Vec<u8>,
    ) -> &mut Self {
        self.entries.push(IfdEntryBuilder {
            tag,
            field_type,
            count,
            value: EntryValue::Raw(data),
        });
        self
    }

    fn external_len(&self, order: ByteOrderType, inline: usize) -> usize {
        self.entries
            .iter()
            .map(|e| e.encode(order).len())
            .filter(|&len| len > inline)
            .sum()
    }

    fn write_to(
        &self,
        data: &mut Vec<u8>,
        byte_order: ByteOrderType,
        is_bigtiff: bool,
        external_start: u64,
        next_ifd_offset: u64,
    ) {
        let inline = if is_bigtiff { 8 } else { 4 };
        let mut entries: Vec<&IfdEntryBuilder> = self.entries.iter().collect();
        entries.sort_by_key(|e| e.tag);

        write_value(data, byte_order, entries.len() as u64, if is_bigtiff { 8 } else { 2 });

        let mut external = Vec::new();
        for entry in entries {
            write_value(data, byte_order, entry.tag as u64, 2);
            write_value(data, byte_order, entry.field_type as u64, 2);
            write_value(data, byte_order, entry.count as u64, inline);

            let encoded = entry.encode(byte_order);
            if encoded.len() <= inline {
                let mut field = encoded;
                field.resize(inline, 0);
                data.extend(field);
            } else {
                let offset = external_start + external.len() as u64;
                write_value(data, byte_order, offset, inline);
                external.extend(encoded);
            }
        }

        write_value(data, byte_order, next_ifd_offset, inline);
        data.extend(external);
    }
}

impl Default for IfdBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn field_type_size(field_type: u16) -> usize {
    match field_type {
        1 => 1,  // BYTE
        2 => 1,  // ASCII
        3 => 2,  // SHORT
        4 => 4,  // LONG
        5 => 8,  // RATIONAL
        6 => 1,  // SBYTE
        7 => 1,  // UNDEFINED
        8 => 2,  // SSHORT
        9 => 4,  // SLONG
        10 => 8, // SRATIONAL
        11 => 4, // FLOAT
        12 => 8, // DOUBLE
        16 => 8, // LONG8 (BigTIFF)
        17 => 8, // SLONG8 (BigTIFF)
        18 => 8, // IFD8 (BigTIFF)
        _ => 1,
    }
}

fn write_value(data: &mut Vec<u8>, byte_order: ByteOrderType, value: u64, size: usize) {
    match byte_order {
        ByteOrderType::LittleEndian => match size {
            1 => data.push(value as u8),
            2 => data.extend(&(value as u16).to_le_bytes()),
            4 => data.extend(&(value as u32).to_le_bytes()),
            8 => data.extend(&value.to_le_bytes()),
            _ => {}
        },
        ByteOrderType::BigEndian => match size {
            1 => data.push(value as u8),
            2 => data.extend(&(value as u16).to_be_bytes()),
            4 => data.extend(&(value as u32).to_be_bytes()),
            8 => data.extend(&value.to_be_bytes()),
            _ => {}
        },
    }
}

// =============================================================================
// JPEG Builders
// =============================================================================

/// Encode one marker segment (length includes the two length bytes).
pub fn jpeg_segment(marker: u8, payload: &[u8]) -> Vec<u8> {
    let mut segment = vec![0xFF, marker];
    segment.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
    segment.extend_from_slice(payload);
    segment
}

/// SOF payload for an 8-bit image with `components` components.
pub fn sof_payload(width: u16, height: u16, components: u8) -> Vec<u8> {
    let mut data = vec![8];
    data.extend_from_slice(&height.to_be_bytes());
    data.extend_from_slice(&width.to_be_bytes());
    data.push(components);
    for id in 1..=components {
        data.extend_from_slice(&[id, 0x11, 0]);
    }
    data
}

/// JFIF 1.02 APP0 payload, 72 dpi.
pub fn jfif_payload() -> Vec<u8> {
    let mut data = b"JFIF\0".to_vec();
    data.extend_from_slice(&[1, 2, 1]);
    data.extend_from_slice(&72u16.to_be_bytes());
    data.extend_from_slice(&72u16.to_be_bytes());
    data.extend_from_slice(&[0, 0]);
    data
}

/// Builder for JPEG streams: SOI, segments, SOS, scan bytes, EOI.
pub struct JpegBuilder {
    segments: Vec<Vec<u8>>,
}

impl JpegBuilder {
    pub fn new() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    pub fn segment(mut self, marker: u8, payload: &[u8]) -> Self {
        self.segments.push(jpeg_segment(marker, payload));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut data = vec![0xFF, 0xD8];
        for segment in self.segments {
            data.extend(segment);
        }
        data.extend(jpeg_segment(0xDA, &[1, 1, 0, 0, 63, 0]));
        data.extend_from_slice(&[0x12, 0x34, 0x56, 0x78]);
        data.extend_from_slice(&[0xFF, 0xD9]);
        data
    }
}

impl Default for JpegBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// RIFF / LA Builders
// =============================================================================

/// Encode one RIFF chunk, padded to an even length.
pub fn riff_chunk(id: &[u8; 4], data: &[u8]) -> Vec<u8> {
    let mut chunk = id.to_vec();
    chunk.extend_from_slice(&(data.len() as u32).to_le_bytes());
    chunk.extend_from_slice(data);
    if data.len() % 2 == 1 {
        chunk.push(0);
    }
    chunk
}

/// 16-byte PCM `fmt ` payload.
pub fn pcm_format(channels: u16, sample_rate: u32, bits: u16) -> Vec<u8> {
    let block_align = channels * bits / 8;
    let mut fmt = Vec::with_capacity(16);
    fmt.extend_from_slice(&1u16.to_le_bytes());
    fmt.extend_from_slice(&channels.to_le_bytes());
    fmt.extend_from_slice(&sample_rate.to_le_bytes());
    fmt.extend_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
    fmt.extend_from_slice(&block_align.to_le_bytes());
    fmt.extend_from_slice(&bits.to_le_bytes());
    fmt
}

/// LIST/INFO chunk with `(id, text)` items.
pub fn info_list(items: &[(&[u8; 4], &str)]) -> Vec<u8> {
    let mut body = b"INFO".to_vec();
    for (id, text) in items {
        let mut value = text.as_bytes().to_vec();
        value.push(0);
        body.extend(riff_chunk(id, &value));
    }
    riff_chunk(b"LIST", &body)
}

/// Wrap chunks in a RIFF/WAVE container.
pub fn wave_file(chunks: &[Vec<u8>]) -> Vec<u8> {
    let body: Vec<u8> = chunks.concat();
    let mut data = b"RIFF".to_vec();
    data.extend_from_slice(&((body.len() + 4) as u32).to_le_bytes());
    data.extend_from_slice(b"WAVE");
    data.extend(body);
    data
}

/// Builder for LA v0.4 files.
pub struct LaBuilder {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits: u16,
    /// Total samples over all channels
    pub samples: u32,
    pub audio_len: usize,
    pub trailer: Vec<u8>,
    /// Overrides the computed footer start
    pub footer_start: Option<u32>,
}

impl Default for LaBuilder {
    fn default() -> Self {
        Self {
            channels: 2,
            sample_rate: 44100,
            bits: 16,
            samples: 88200,
            audio_len: 1000,
            trailer: Vec::new(),
            footer_start: None,
        }
    }
}

impl LaBuilder {
    /// Offset of the compressed audio (header size plus the footer pointer).
    pub const AUDIO_START: usize = 53;

    /// The 24-byte `fmt ` chunk stored in the header.
    pub fn fmt_chunk(&self) -> Vec<u8> {
        riff_chunk(b"fmt ", &pcm_format(self.channels, self.sample_rate, self.bits))
    }

    pub fn build(&self) -> Vec<u8> {
        let fmt = self.fmt_chunk();
        let uncompressed = self.samples * (self.bits as u32 / 8);
        let footer = self
            .footer_start
            .unwrap_or((Self::AUDIO_START + self.audio_len) as u32);

        let mut data = b"LA04".to_vec();
        data.extend_from_slice(&uncompressed.to_le_bytes());
        data.extend_from_slice(b"WAVE");
        data.extend_from_slice(&(fmt.len() as u32).to_le_bytes());
        data.extend(fmt);
        data.extend_from_slice(&self.samples.to_le_bytes());
        data.push(0); // flags: not seekable
        data.extend_from_slice(&0xCAFE_F00Du32.to_le_bytes());
        data.extend_from_slice(&footer.to_le_bytes());
        assert_eq!(data.len(), Self::AUDIO_START);

        data.resize(Self::AUDIO_START + self.audio_len, 0x5A);
        data.extend_from_slice(&self.trailer);
        data
    }
}

// =============================================================================
// PAR2 Builders
// =============================================================================

pub const PAR2_MAIN: &[u8; 16] = b"PAR 2.0\0Main\0\0\0\0";
pub const PAR2_FILE_DESC: &[u8; 16] = b"PAR 2.0\0FileDesc";
pub const PAR2_RECOVERY_SLICE: &[u8; 16] = b"PAR 2.0\0RecvSlic";
pub const PAR2_CREATOR: &[u8; 16] = b"PAR 2.0\0Creator\0";

pub const RECOVERY_SET_ID: [u8; 16] = [0xA5; 16];

/// Encode one packet with a correct MD5. `body` length must be a multiple of 4.
pub fn par2_packet(packet_type: &[u8; 16], body: &[u8]) -> Vec<u8> {
    assert_eq!(body.len() % 4, 0, "PAR2 bodies are 4-byte aligned");

    let mut hashed = RECOVERY_SET_ID.to_vec();
    hashed.extend_from_slice(packet_type);
    hashed.extend_from_slice(body);
    let digest = Md5::digest(&hashed);

    let mut packet = b"PAR2\0PKT".to_vec();
    packet.extend_from_slice(&((64 + body.len()) as u64).to_le_bytes());
    packet.extend_from_slice(&digest);
    packet.extend(hashed);
    packet
}

/// Main packet body with one recovery file.
pub fn par2_main_body(slice_size: u64, file_id: [u8; 16]) -> Vec<u8> {
    let mut body = slice_size.to_le_bytes().to_vec();
    body.extend_from_slice(&1u32.to_le_bytes());
    body.extend_from_slice(&file_id);
    body
}

/// File description body for `name` (NUL padded to a multiple of 4).
pub fn par2_file_desc_body(file_id: [u8; 16], length: u64, name: &str) -> Vec<u8> {
    let mut body = file_id.to_vec();
    body.extend_from_slice(&[0x11; 16]);
    body.extend_from_slice(&[0x22; 16]);
    body.extend_from_slice(&length.to_le_bytes());
    body.extend_from_slice(name.as_bytes());
    pad4(&mut body);
    body
}

/// Creator body (NUL padded to a multiple of 4).
pub fn par2_creator_body(client: &str) -> Vec<u8> {
    let mut body = client.as_bytes().to_vec();
    pad4(&mut body);
    body
}

/// Recovery slice body: exponent then `len` bytes of recovery data.
pub fn par2_recovery_body(exponent: u32, len: usize) -> Vec<u8> {
    let mut body = exponent.to_le_bytes().to_vec();
    body.extend((0..len).map(|i| i as u8));
    body
}

fn pad4(body: &mut Vec<u8>) {
    while body.len() % 4 != 0 {
        body.push(0);
    }
}
