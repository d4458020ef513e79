//! # media-probe
//!
//! Extracts technical metadata from media, image and archive files:
//! dimensions, sample rates, channel layouts, codec parameters and embedded
//! tag blocks.
//!
//! Analysis is a single synchronous pass over a random-access byte source.
//! Each file produces a [`ResultTree`]: one section per decoded format, a
//! normalized summary, and ordered error and warning logs. A handler that
//! hits a structural problem leaves no partial section behind, only an
//! error entry.
//!
//! ## Architecture
//!
//! - [`io`] - Byte sources, block caching, endian and bit-level readers
//! - [`mod@format`] - Handler contract, record walkers, format handlers
//! - [`tags`] - EXIF, XMP and IPTC decoding
//! - [`config`] - Analyzer settings and CLI arguments
//!
//! ## Example
//!
//! ```rust,no_run
//! use media_probe::{Analyzer, AnalyzerConfig};
//!
//! let analyzer = Analyzer::new(AnalyzerConfig::default());
//! let tree = analyzer.analyze_path("song.la").unwrap();
//! println!("{}", serde_json::to_string_pretty(&tree).unwrap());
//! ```

pub mod config;
pub mod error;
pub mod format;
pub mod io;
pub mod tags;

// Re-export commonly used types
pub use config::{AnalyzerConfig, Cli, ScratchKind};
pub use error::{FormatError, IoError, TagError, TiffError};
pub use format::{
    analyze_embedded, detect_format, Analyzer, Diagnostic, FormatKind, Handler, Lookup,
    ResultTree, Section, Session, Summary,
};
pub use io::{BlockCache, ByteSource, FileSource, MemorySource, PayloadWindow};
