//! The handler contract and the session that runs handlers.
//!
//! # Protocol
//!
//! A [`Handler`] decodes one format family in a single pass. It receives a
//! read-only [`ByteSource`] and a [`Scope`], the staging area for its own
//! section, the cross-format summary and its warnings.
//!
//! [`Session::run`] commits the scope into the [`ResultTree`] when the
//! handler returns `Ok`. On `Err`, the staged section and summary are
//! discarded (the format is retracted) and the error becomes exactly one
//! entry of the `errors` log. Warnings are kept either way.

use tracing::{debug, warn};

use super::result::{Diagnostic, ResultTree, Section, Summary};
use crate::config::AnalyzerConfig;
use crate::error::FormatError;
use crate::io::{ByteSource, PayloadWindow};

// =============================================================================
// Handler
// =============================================================================

/// Decoder for one format family.
pub trait Handler: Send + Sync {
    /// Short name; also the key of the handler's section in the result tree.
    fn name(&self) -> &'static str;

    /// MIME type reported on success.
    fn mime_type(&self) -> Option<&'static str> {
        None
    }

    /// Decode `source` within `scope.window()`.
    ///
    /// Returning `Err` retracts everything staged in `scope` except warnings.
    fn analyze(&self, source: &dyn ByteSource, scope: &mut Scope<'_>) -> Result<(), FormatError>;
}

// =============================================================================
// Scope
// =============================================================================

/// Staging area handed to a running handler.
pub struct Scope<'c> {
    format: &'static str,
    config: &'c AnalyzerConfig,
    window: PayloadWindow,
    section: Option<Section>,
    extra_sections: Vec<(&'static str, Section)>,
    summary: Summary,
    warnings: Vec<Diagnostic>,
}

impl<'c> Scope<'c> {
    fn new(
        format: &'static str,
        config: &'c AnalyzerConfig,
        window: PayloadWindow,
        summary: Summary,
    ) -> Self {
        Self {
            format,
            config,
            window,
            section: None,
            extra_sections: Vec::new(),
            summary,
            warnings: Vec::new(),
        }
    }

    /// Name of the running handler.
    pub fn format(&self) -> &'static str {
        self.format
    }

    pub fn config(&self) -> &'c AnalyzerConfig {
        self.config
    }

    /// Current payload window.
    pub fn window(&self) -> PayloadWindow {
        self.window
    }

    /// Narrow the payload window. The result never grows past the current one.
    pub fn narrow_window(&mut self, start: u64, end: u64) {
        let start = start.clamp(self.window.start, self.window.end);
        let end = end.clamp(start, self.window.end);
        self.window = PayloadWindow::new(start, end);
    }

    /// Append a non-fatal diagnostic.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        debug!(format = self.format, %message, "Warning");
        self.warnings.push(Diagnostic::new(self.format, message));
    }

    /// Set this handler's own section.
    pub fn set_section(&mut self, section: Section) {
        self.section = Some(section);
    }

    /// Stage an additional section under another namespace (embedded
    /// containers, tag blocks).
    pub fn insert_section(&mut self, name: &'static str, section: Section) {
        self.extra_sections.retain(|(n, _)| *n != name);
        self.extra_sections.push((name, section));
    }

    /// Whether a section is staged under `name`.
    pub fn has_section(&self, name: &str) -> bool {
        (name == self.format && self.section.is_some())
            || self.extra_sections.iter().any(|(n, _)| *n == name)
    }

    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    pub fn summary_mut(&mut self) -> &mut Summary {
        &mut self.summary
    }
}

// =============================================================================
// Session
// =============================================================================

/// One analysis session: a result tree plus the commit/retract protocol.
pub struct Session<'c> {
    config: &'c AnalyzerConfig,
    tree: ResultTree,
}

impl<'c> Session<'c> {
    pub fn new(config: &'c AnalyzerConfig) -> Self {
        Self {
            config,
            tree: ResultTree::new(),
        }
    }

    pub fn config(&self) -> &'c AnalyzerConfig {
        self.config
    }

    /// Record the source being analysed.
    pub fn describe_source(&mut self, source: &dyn ByteSource) {
        self.tree.filename = Some(source.identifier().to_string());
        self.tree.filesize = source.size();
    }

    /// Run `handler` and commit or retract its output.
    ///
    /// Returns `true` if the handler succeeded.
    pub fn run(
        &mut self,
        handler: &dyn Handler,
        source: &dyn ByteSource,
        window: PayloadWindow,
    ) -> bool {
        let name = handler.name();
        debug!(format = name, source = source.identifier(), "Running handler");

        let mut scope = Scope::new(name, self.config, window, self.tree.summary.clone());
        let result = handler.analyze(source, &mut scope);

        let Scope {
            window,
            section,
            extra_sections,
            mut summary,
            warnings,
            ..
        } = scope;
        self.tree.warnings.extend(warnings);

        match result {
            Ok(()) => {
                summary.payload = Some(window);
                self.tree.summary = summary;
                self.tree.fileformat = Some(name);
                self.tree.mime_type = handler.mime_type();
                if let Some(section) = section {
                    self.tree.sections.insert(name, section);
                }
                self.tree.sections.extend(extra_sections);
                debug!(format = name, "Handler finished");
                true
            }
            Err(err) => {
                warn!(format = name, error = %err, "Handler failed");
                self.tree.sections.remove(name);
                self.tree.errors.push(Diagnostic::new(name, err.to_string()));
                false
            }
        }
    }

    /// Record a session-level error (no handler ran).
    pub fn record_error(&mut self, format: &'static str, message: impl Into<String>) {
        self.tree.errors.push(Diagnostic::new(format, message));
    }

    pub fn tree(&self) -> &ResultTree {
        &self.tree
    }

    pub fn into_tree(self) -> ResultTree {
        self.tree
    }
}
