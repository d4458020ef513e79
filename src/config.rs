//! Configuration for media-probe.
//!
//! Analysis limits live in [`AnalyzerConfig`], a plain struct with defaults
//! that library callers construct directly. The binary builds one from
//! [`Cli`], which supports:
//! - Command-line arguments via clap
//! - Environment variables with `MEDIA_PROBE_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Environment Variables
//!
//! - `MEDIA_PROBE_MAX_RECORDS` - Records/hops per walk (default: 65536)
//! - `MEDIA_PROBE_MAX_IFDS` - TIFF IFD chain length (default: 256)
//! - `MEDIA_PROBE_READ_WINDOW` - Bytes read for fixed headers (default: 32768)
//! - `MEDIA_PROBE_MAX_INLINE_BYTES` - Largest value materialized (default: 1MB)
//! - `MEDIA_PROBE_MAX_INFLATED_TEXT` - zlib output cap (default: 1MB)
//! - `MEDIA_PROBE_VERIFY_CHECKSUMS` - Check PNG CRCs and PAR2 MD5s (default: true)
//! - `MEDIA_PROBE_SCRATCH` - `memory` or `temp-file` (default: memory)
//! - `MEDIA_PROBE_BLOCK_SIZE` - Block size for file reads (default: 64KB)
//! - `MEDIA_PROBE_CACHE_BLOCKS` - Blocks cached per file (default: 64)
//! - `MEDIA_PROBE_JOBS` - Files analysed concurrently (default: 4)

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::io::{DEFAULT_BLOCK_SIZE, DEFAULT_CACHE_CAPACITY};

// =============================================================================
// Default Values
// =============================================================================

/// Default bound on records (or links) visited by one walk.
pub const DEFAULT_MAX_RECORDS: usize = 65_536;

/// Default bound on the TIFF IFD chain.
pub const DEFAULT_MAX_IFDS: usize = 256;

/// Default number of bytes read for fixed-layout headers.
pub const DEFAULT_READ_WINDOW: usize = 32 * 1024;

/// Default largest value/payload materialized in memory.
pub const DEFAULT_MAX_INLINE_BYTES: usize = 1024 * 1024;

/// Default cap on decompressed text chunks.
pub const DEFAULT_MAX_INFLATED_TEXT: usize = 1024 * 1024;

/// Default number of concurrently analysed files.
pub const DEFAULT_JOBS: usize = 4;

// =============================================================================
// AnalyzerConfig
// =============================================================================

/// Where the sub-container bridge materializes synthesized buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ScratchKind {
    /// In-memory buffer
    #[default]
    Memory,
    /// Named temporary file, deleted when the nested analysis ends
    TempFile,
}

/// Limits and switches shared by every session.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub max_records: usize,
    pub max_ifds: usize,
    pub read_window: usize,
    pub max_inline_bytes: usize,
    pub max_inflated_text: usize,
    pub verify_checksums: bool,
    pub scratch: ScratchKind,
    pub block_size: usize,
    pub block_cache_capacity: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            max_records: DEFAULT_MAX_RECORDS,
            max_ifds: DEFAULT_MAX_IFDS,
            read_window: DEFAULT_READ_WINDOW,
            max_inline_bytes: DEFAULT_MAX_INLINE_BYTES,
            max_inflated_text: DEFAULT_MAX_INFLATED_TEXT,
            verify_checksums: true,
            scratch: ScratchKind::Memory,
            block_size: DEFAULT_BLOCK_SIZE,
            block_cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// media-probe - Extract technical metadata from media files.
///
/// Prints one JSON result tree per input file.
#[derive(Parser, Debug, Clone)]
#[command(name = "media-probe")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Files to analyse.
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    // =========================================================================
    // Limits
    // =========================================================================
    /// Maximum records (chunks, packets, segments) visited per walk.
    #[arg(long, default_value_t = DEFAULT_MAX_RECORDS, env = "MEDIA_PROBE_MAX_RECORDS")]
    pub max_records: usize,

    /// Maximum TIFF IFDs followed.
    #[arg(long, default_value_t = DEFAULT_MAX_IFDS, env = "MEDIA_PROBE_MAX_IFDS")]
    pub max_ifds: usize,

    /// Bytes read for fixed-layout headers.
    #[arg(long, default_value_t = DEFAULT_READ_WINDOW, env = "MEDIA_PROBE_READ_WINDOW")]
    pub read_window: usize,

    /// Largest value or chunk payload read into memory.
    #[arg(long, default_value_t = DEFAULT_MAX_INLINE_BYTES, env = "MEDIA_PROBE_MAX_INLINE_BYTES")]
    pub max_inline_bytes: usize,

    /// Cap on decompressed text chunk size.
    #[arg(long, default_value_t = DEFAULT_MAX_INFLATED_TEXT, env = "MEDIA_PROBE_MAX_INFLATED_TEXT")]
    pub max_inflated_text: usize,

    /// Verify PNG CRCs and PAR2 packet hashes.
    #[arg(long, default_value_t = true, env = "MEDIA_PROBE_VERIFY_CHECKSUMS", action = clap::ArgAction::Set)]
    pub verify_checksums: bool,

    /// Scratch storage for embedded containers.
    #[arg(long, value_enum, default_value_t = ScratchKind::Memory, env = "MEDIA_PROBE_SCRATCH")]
    pub scratch: ScratchKind,

    // =========================================================================
    // I/O
    // =========================================================================
    /// Block size in bytes for file reads.
    #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE, env = "MEDIA_PROBE_BLOCK_SIZE")]
    pub block_size: usize,

    /// Number of blocks cached per file.
    #[arg(long, default_value_t = DEFAULT_CACHE_CAPACITY, env = "MEDIA_PROBE_CACHE_BLOCKS")]
    pub cache_blocks: usize,

    /// Files analysed concurrently.
    #[arg(short, long, default_value_t = DEFAULT_JOBS, env = "MEDIA_PROBE_JOBS")]
    pub jobs: usize,

    // =========================================================================
    // Tag readers
    // =========================================================================
    /// Do not decode embedded EXIF blocks.
    #[arg(long, default_value_t = false)]
    pub no_exif: bool,

    /// Do not decode embedded XMP packets.
    #[arg(long, default_value_t = false)]
    pub no_xmp: bool,

    // =========================================================================
    // Output and logging
    // =========================================================================
    /// Pretty-print the JSON output.
    #[arg(long, default_value_t = false)]
    pub pretty: bool,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Cli {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_records == 0 {
            return Err("max_records must be greater than 0".to_string());
        }
        if self.max_ifds == 0 {
            return Err("max_ifds must be greater than 0".to_string());
        }
        if self.read_window < 64 {
            return Err("read_window must be at least 64 bytes".to_string());
        }
        if self.jobs == 0 {
            return Err("jobs must be greater than 0".to_string());
        }
        if self.cache_blocks == 0 {
            return Err("cache_blocks must be greater than 0".to_string());
        }
        if self.block_size < 1024 || self.block_size > 16 * 1024 * 1024 {
            return Err("block_size must be between 1KB and 16MB".to_string());
        }
        Ok(())
    }

    /// Analysis settings derived from the arguments.
    pub fn analyzer_config(&self) -> AnalyzerConfig {
        AnalyzerConfig {
            max_records: self.max_records,
            max_ifds: self.max_ifds,
            read_window: self.read_window,
            max_inline_bytes: self.max_inline_bytes,
            max_inflated_text: self.max_inflated_text,
            verify_checksums: self.verify_checksums,
            scratch: self.scratch,
            block_size: self.block_size,
            block_cache_capacity: self.cache_blocks,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
