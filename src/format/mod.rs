//! Format handlers and the machinery they share.
//!
//! Every handler implements [`Handler`] and is run by a [`Session`], which
//! commits its section into the [`ResultTree`] on success and retracts it on
//! failure. Handlers build on three shared pieces:
//!
//! - [`lookup`]: code tables distinguishing defined, reserved and invalid
//!   codes
//! - [`walker`]: sequential (length-prefixed) and linked (offset-chained)
//!   record traversal with bounds, loop and hop checks
//! - [`bridge`]: analysis of containers synthesized from embedded pieces
//!
//! # Supported formats
//!
//! - **AC-3**: sync frame and bit-stream information
//! - **PNG**: every registered chunk, CRC verification
//! - **TIFF**: classic and BigTIFF IFD chains
//! - **JPEG**: marker segments with EXIF, XMP and IPTC blocks
//! - **LA**: header plus the embedded RIFF/WAVE trailer
//! - **RIFF/WAVE**: format, fact, data and INFO chunks
//! - **PAR2**: recovery set packets

pub mod ac3;
pub mod analyzer;
pub mod bridge;
pub mod detect;
pub mod handler;
pub mod jpeg;
pub mod la;
pub mod lookup;
pub mod par2;
pub mod png;
pub mod result;
pub mod riff;
pub mod tiff;
pub mod walker;

pub use analyzer::Analyzer;
pub use bridge::analyze_embedded;
pub use detect::{detect_format, is_tiff_header, FormatKind, DETECT_BYTES};
pub use handler::{Handler, Scope, Session};
pub use lookup::{CodeTable, Entry, Lookup, SparseTable};
pub use result::{AudioSummary, Diagnostic, ResultTree, Section, Summary, VideoSummary};
pub use walker::{Framing, LinkedWalker, Record, RecordHeader, SequentialWalker};
