//! Nested analysis of synthesized sub-containers.
//!
//! Some formats store a standard container with its leading header stripped
//! (LA keeps the RIFF `fmt ` bytes in its own header and appends the RIFF
//! trailer after the compressed audio). The embedding handler rebuilds a
//! minimal container in a scratch buffer and calls [`analyze_embedded`],
//! which:
//!
//! 1. materializes the buffer as a [`ByteSource`] (memory or temp file,
//!    per [`ScratchKind`]),
//! 2. runs the target handler in a fresh [`Session`],
//! 3. on success copies the nested sections into the parent scope,
//! 4. on failure adds a single warning to the parent scope.
//!
//! The scratch resource is owned by this call and released on every path;
//! a temp file is deleted when its guard drops.

use std::io::Write;

use tempfile::NamedTempFile;
use tracing::debug;

use super::handler::{Handler, Scope, Session};
use crate::config::ScratchKind;
use crate::error::IoError;
use crate::io::{ByteSource, FileSource, MemorySource, PayloadWindow};

/// Scratch storage holding a synthesized container.
enum Scratch {
    Memory(MemorySource),
    // Field order matters: the source handle closes before the file is removed
    TempFile {
        source: FileSource,
        _guard: NamedTempFile,
    },
}

impl Scratch {
    fn create(kind: ScratchKind, buffer: Vec<u8>, label: &str) -> Result<Self, IoError> {
        match kind {
            ScratchKind::Memory => Ok(Scratch::Memory(MemorySource::new(buffer, label))),
            ScratchKind::TempFile => {
                let mut guard = tempfile::Builder::new().prefix("media-probe-").tempfile()?;
                guard.write_all(&buffer)?;
                guard.flush()?;
                let source = FileSource::open(guard.path())?;
                Ok(Scratch::TempFile {
                    source,
                    _guard: guard,
                })
            }
        }
    }

    fn source(&self) -> &dyn ByteSource {
        match self {
            Scratch::Memory(source) => source,
            Scratch::TempFile { source, .. } => source,
        }
    }
}

/// Analyse `buffer` with `handler` and splice the result into `scope`.
///
/// Returns `true` if the nested analysis succeeded and its sections were
/// merged.
pub fn analyze_embedded(scope: &mut Scope<'_>, handler: &dyn Handler, buffer: Vec<u8>) -> bool {
    let parent = scope.format();
    let target = handler.name();
    let label = format!("{parent}:embedded-{target}");

    let scratch = match Scratch::create(scope.config().scratch, buffer, &label) {
        Ok(scratch) => scratch,
        Err(err) => {
            scope.warn(format!(
                "Cannot create scratch storage for {} portion of {} file: {}",
                target.to_uppercase(),
                parent.to_uppercase(),
                err
            ));
            return false;
        }
    };

    let source = scratch.source();
    debug!(
        parent,
        target,
        size = source.size(),
        scratch = source.identifier(),
        "Analysing embedded container"
    );

    let mut session = Session::new(scope.config());
    let ok = session.run(handler, source, PayloadWindow::whole(source));
    let nested = session.into_tree();

    if ok && nested.errors.is_empty() {
        for (name, section) in nested.sections {
            scope.insert_section(name, section);
        }
        true
    } else {
        let messages: Vec<String> = nested.errors.iter().map(|e| e.message.clone()).collect();
        scope.warn(format!(
            "Error parsing {} portion of {} file: {}",
            target.to_uppercase(),
            parent.to_uppercase(),
            messages.join("; ")
        ));
        false
    }
    // `scratch` drops here on both paths
}
