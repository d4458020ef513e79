use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Mutex;

use bytes::Bytes;

use crate::error::IoError;

/// Trait for reading byte ranges from a file or buffer.
///
/// Handlers only ever see a `&dyn ByteSource`, so the same decoding code
/// runs against files, in-memory buffers and the synthesized buffers of
/// embedded containers. Implementations must be usable from any thread.
pub trait ByteSource: Send + Sync {
    /// Read exactly `len` bytes starting at `offset`.
    ///
    /// Returns an error if the range is out of bounds or if the read fails.
    fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError>;

    /// Get the total size of the resource in bytes.
    fn size(&self) -> u64;

    /// Get an identifier for this resource (for logging and diagnostics).
    fn identifier(&self) -> &str;

    /// Read up to `max_len` bytes at `offset`, clamped to the end of the source.
    fn read_up_to(&self, offset: u64, max_len: usize) -> Result<Bytes, IoError> {
        let size = self.size();
        if offset > size {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: max_len as u64,
                size,
            });
        }
        let len = (size - offset).min(max_len as u64) as usize;
        self.read_exact_at(offset, len)
    }
}

/// Check `offset..offset+len` against `size`.
pub(crate) fn check_range(offset: u64, len: usize, size: u64) -> Result<(), IoError> {
    match offset.checked_add(len as u64) {
        Some(end) if end <= size => Ok(()),
        _ => Err(IoError::RangeOutOfBounds {
            offset,
            requested: len as u64,
            size,
        }),
    }
}

// =============================================================================
// PayloadWindow
// =============================================================================

/// Start/end offsets of the media payload proper within a source.
///
/// The dispatcher supplies the initial window (usually the whole file);
/// handlers narrow it once they know where their own header ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PayloadWindow {
    pub start: u64,
    pub end: u64,
}

impl PayloadWindow {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Window covering an entire source.
    pub fn whole(source: &dyn ByteSource) -> Self {
        Self {
            start: 0,
            end: source.size(),
        }
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// MemorySource
// =============================================================================

/// A byte source backed by an in-memory buffer.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Bytes,
    identifier: String,
}

impl MemorySource {
    pub fn new(data: impl Into<Bytes>, identifier: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            identifier: identifier.into(),
        }
    }

    /// The whole buffer.
    pub fn bytes(&self) -> &Bytes {
        &self.data
    }
}

impl ByteSource for MemorySource {
    fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        check_range(offset, len, self.size())?;
        let start = offset as usize;
        Ok(self.data.slice(start..start + len))
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

// =============================================================================
// FileSource
// =============================================================================

/// A byte source backed by a file on disk.
///
/// Reads seek the shared handle under a lock; wrap in
/// [`BlockCache`](super::BlockCache) to amortize many small reads.
#[derive(Debug)]
pub struct FileSource {
    file: Mutex<File>,
    size: u64,
    identifier: String,
}

impl FileSource {
    /// Open a file for reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            file: Mutex::new(file),
            size,
            identifier: path.display().to_string(),
        })
    }
}

impl ByteSource for FileSource {
    fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        check_range(offset, len, self.size)?;
        let mut file = self
            .file
            .lock()
            .map_err(|_| IoError::Read(format!("{}: file lock poisoned", self.identifier)))?;
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf)?;
        Ok(Bytes::from(buf))
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}
