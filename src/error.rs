use thiserror::Error;

/// I/O errors that can occur when reading from a byte source
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Requested range exceeds resource bounds
    #[error("Range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// A bit-level read would run past the end of the cursor's blob
    #[error("Bit read out of bounds: requested {requested} bits at bit {position}, blob holds {available} bits")]
    BitsOutOfBounds {
        position: u64,
        requested: u32,
        available: u64,
    },

    /// Integer width other than 1, 2, 4 or 8 bytes (or more than 64 bits)
    #[error("Unsupported integer width: {0}")]
    UnsupportedWidth(usize),

    /// Underlying read failure (file system, pipe, ...)
    #[error("Read error: {0}")]
    Read(String),
}

impl From<std::io::Error> for IoError {
    fn from(err: std::io::Error) -> Self {
        IoError::Read(err.to_string())
    }
}

/// Errors that can occur when parsing TIFF files
#[derive(Debug, Clone, Error)]
pub enum TiffError {
    /// I/O error while reading the file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Invalid TIFF magic bytes (not II or MM)
    #[error("Invalid TIFF byte order identifier: expected 0x4949 (II) or 0x4D4D (MM), got 0x{0:04X}")]
    InvalidMagic(u16),

    /// Invalid TIFF version number
    #[error("Invalid TIFF version: expected 42 (TIFF) or 43 (BigTIFF), got {0}")]
    InvalidVersion(u16),

    /// Invalid BigTIFF offset byte size (must be 8)
    #[error("Invalid BigTIFF offset byte size: expected 8, got {0}")]
    InvalidBigTiffOffsetSize(u16),

    /// File is too small to contain a valid TIFF header
    #[error("File too small: need at least {required} bytes, got {actual}")]
    FileTooSmall { required: u64, actual: u64 },

    /// Invalid IFD offset (points outside file or to invalid location)
    #[error("Invalid IFD offset: {0}")]
    InvalidIfdOffset(u64),

    /// IFD declares more entries than the file can hold
    #[error("IFD at offset {offset} declares {count} entries, which extends past end of file")]
    EntryCountOutOfBounds { offset: u64, count: u64 },
}

/// Errors reported by the optional tag readers (EXIF, XMP)
#[derive(Debug, Clone, Error)]
pub enum TagError {
    /// The payload was not recognized by the reader
    #[error("{reader}: {message}")]
    Parse {
        reader: &'static str,
        message: String,
    },
}

/// Structural errors: fatal to the current format attempt.
///
/// A handler returning one of these has its section retracted; the session
/// records the message as exactly one error diagnostic.
#[derive(Debug, Clone, Error)]
pub enum FormatError {
    /// I/O error while reading the source
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// TIFF structure error
    #[error("TIFF error: {0}")]
    Tiff(#[from] TiffError),

    /// Magic bytes did not match
    #[error("Expecting \"{expected}\" at offset {offset}, found \"{found}\"")]
    SignatureMismatch {
        expected: String,
        found: String,
        offset: u64,
    },

    /// An essential field is zero
    #[error("Corrupt {format} file: {field} == zero")]
    ZeroField {
        format: &'static str,
        field: &'static str,
    },

    /// Version newer than this decoder understands
    #[error("{format} version {found} is not supported (supported up to {supported})")]
    UnsupportedVersion {
        format: &'static str,
        found: String,
        supported: String,
    },

    /// A record's declared length reaches past the end of the stream
    #[error("Record at offset {offset} declares {length} bytes, extending past end of stream at {end}")]
    RecordOutOfBounds { offset: u64, length: u64, end: u64 },

    /// A linked chain points back at an already visited record
    #[error("Chain revisits offset {0}")]
    CyclicChain(u64),

    /// Walk exceeded its record/hop bound
    #[error("Record limit of {0} exceeded")]
    TooManyRecords(usize),

    /// Payload present but not decodable
    #[error("Malformed {format} data: {message}")]
    Malformed {
        format: &'static str,
        message: String,
    },

    /// No handler recognized the input; carries the leading bytes as hex
    #[error("Unrecognized format: leading bytes {0}")]
    Unrecognized(String),
}

impl FormatError {
    /// Build a signature mismatch, rendering both sides as hex byte dumps.
    pub fn signature(expected: &[u8], found: &[u8], offset: u64) -> Self {
        FormatError::SignatureMismatch {
            expected: hex_bytes(expected),
            found: hex_bytes(found),
            offset,
        }
    }

    pub fn malformed(format: &'static str, message: impl Into<String>) -> Self {
        FormatError::Malformed {
            format,
            message: message.into(),
        }
    }
}

/// Render bytes as space-separated upper-case hex pairs ("0B 77").
pub fn hex_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| hex::encode_upper([*b]))
        .collect::<Vec<_>>()
        .join(" ")
}
