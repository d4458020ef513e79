//! Single-file analysis entry point.
//!
//! The [`Analyzer`] sniffs the leading bytes of a source, picks the matching
//! handler and runs it in a fresh [`Session`]. Sources opened from a path
//! are wrapped in a [`BlockCache`] so the many small reads of a record walk
//! hit the file only once per block.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use super::ac3::Ac3Handler;
use super::detect::{detect_format, FormatKind, DETECT_BYTES};
use super::handler::{Handler, Session};
use super::jpeg::JpegHandler;
use super::la::LaHandler;
use super::par2::Par2Handler;
use super::png::PngHandler;
use super::result::ResultTree;
use super::riff::RiffHandler;
use super::tiff::TiffHandler;
use crate::config::AnalyzerConfig;
use crate::error::{FormatError, IoError};
use crate::io::{BlockCache, ByteSource, FileSource, PayloadWindow};
use crate::tags::{ExifReader, KamadakExifReader, QuickXmlReader, XmpReader};

/// Format name used for diagnostics raised before any handler runs.
const DETECT_FORMAT: &str = "detect";

/// Configuration plus the optional tag readers shared by every session.
#[derive(Clone)]
pub struct Analyzer {
    config: AnalyzerConfig,
    exif: Option<Arc<dyn ExifReader>>,
    xmp: Option<Arc<dyn XmpReader>>,
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("config", &self.config)
            .field("exif", &self.exif.as_ref().map(|r| r.name()))
            .field("xmp", &self.xmp.as_ref().map(|r| r.name()))
            .finish()
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(AnalyzerConfig::default())
    }
}

impl Analyzer {
    /// Analyzer with the bundled EXIF and XMP readers.
    pub fn new(config: AnalyzerConfig) -> Self {
        Self {
            config,
            exif: Some(Arc::new(KamadakExifReader)),
            xmp: Some(Arc::new(QuickXmlReader)),
        }
    }

    /// Analyzer without any tag readers.
    pub fn without_tag_readers(config: AnalyzerConfig) -> Self {
        Self {
            config,
            exif: None,
            xmp: None,
        }
    }

    pub fn with_exif_reader(mut self, reader: Option<Arc<dyn ExifReader>>) -> Self {
        self.exif = reader;
        self
    }

    pub fn with_xmp_reader(mut self, reader: Option<Arc<dyn XmpReader>>) -> Self {
        self.xmp = reader;
        self
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    fn handler(&self, kind: FormatKind) -> Box<dyn Handler> {
        match kind {
            FormatKind::Ac3 => Box::new(Ac3Handler),
            FormatKind::Png => Box::new(PngHandler),
            FormatKind::Tiff => Box::new(TiffHandler),
            FormatKind::La => Box::new(LaHandler),
            FormatKind::Riff => Box::new(RiffHandler),
            FormatKind::Par2 => Box::new(Par2Handler),
            FormatKind::Jpeg => {
                let mut jpeg = JpegHandler::new();
                if let Some(reader) = &self.exif {
                    jpeg = jpeg.with_exif(Arc::clone(reader));
                }
                if let Some(reader) = &self.xmp {
                    jpeg = jpeg.with_xmp(Arc::clone(reader));
                }
                Box::new(jpeg)
            }
        }
    }

    /// Analyse a whole source.
    pub fn analyze(&self, source: &dyn ByteSource) -> ResultTree {
        self.analyze_window(source, PayloadWindow::whole(source))
    }

    /// Analyse the payload `window` of a source.
    ///
    /// Unrecognized input yields a tree with a single error diagnostic.
    pub fn analyze_window(&self, source: &dyn ByteSource, window: PayloadWindow) -> ResultTree {
        let mut session = Session::new(&self.config);
        session.describe_source(source);

        let head = match source.read_up_to(window.start, DETECT_BYTES) {
            Ok(head) => head,
            Err(err) => {
                session.record_error(DETECT_FORMAT, FormatError::from(err).to_string());
                return session.into_tree();
            }
        };

        match detect_format(&head) {
            Some(kind) => {
                debug!(source = source.identifier(), format = kind.name(), "Detected format");
                let handler = self.handler(kind);
                let ok = session.run(handler.as_ref(), source, window);
                info!(source = source.identifier(), format = kind.name(), ok, "Analysis finished");
            }
            None => {
                debug!(source = source.identifier(), "No format matched");
                let leading = hex::encode(&head[..head.len().min(8)]);
                session.record_error(DETECT_FORMAT, FormatError::Unrecognized(leading).to_string());
            }
        }

        session.into_tree()
    }

    /// Open `path` behind a block cache and analyse it.
    pub fn analyze_path(&self, path: impl AsRef<Path>) -> Result<ResultTree, IoError> {
        let file = FileSource::open(path)?;
        let source = BlockCache::with_capacity(
            file,
            self.config.block_size,
            self.config.block_cache_capacity,
        );
        Ok(self.analyze(&source))
    }
}
