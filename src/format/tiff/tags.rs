//! TIFF field types, tag identifiers and value lookup tables.

use serde::Serialize;

use crate::format::lookup::{Entry, SparseTable};

// =============================================================================
// TIFF Field Types
// =============================================================================

/// TIFF 6 and BigTIFF field types.
///
/// The type determines the element size, which decides whether a value is
/// stored inline in the entry or at an offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u16)]
pub enum FieldType {
    Byte = 1,
    /// NUL-terminated 8-bit text
    Ascii = 2,
    Short = 3,
    Long = 4,
    /// Two LONGs: numerator, denominator
    Rational = 5,
    SByte = 6,
    Undefined = 7,
    SShort = 8,
    SLong = 9,
    /// Two SLONGs: numerator, denominator
    SRational = 10,
    Float = 11,
    Double = 12,
    /// 32-bit IFD offset
    Ifd = 13,
    /// BigTIFF only
    Long8 = 16,
    /// BigTIFF only
    SLong8 = 17,
    /// BigTIFF only
    Ifd8 = 18,
}

impl FieldType {
    /// Size of a single value of this type in bytes.
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            FieldType::Byte | FieldType::Ascii | FieldType::SByte | FieldType::Undefined => 1,
            FieldType::Short | FieldType::SShort => 2,
            FieldType::Long | FieldType::SLong | FieldType::Float | FieldType::Ifd => 4,
            FieldType::Rational
            | FieldType::SRational
            | FieldType::Double
            | FieldType::Long8
            | FieldType::SLong8
            | FieldType::Ifd8 => 8,
        }
    }

    /// Create a FieldType from its numeric value.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(FieldType::Byte),
            2 => Some(FieldType::Ascii),
            3 => Some(FieldType::Short),
            4 => Some(FieldType::Long),
            5 => Some(FieldType::Rational),
            6 => Some(FieldType::SByte),
            7 => Some(FieldType::Undefined),
            8 => Some(FieldType::SShort),
            9 => Some(FieldType::SLong),
            10 => Some(FieldType::SRational),
            11 => Some(FieldType::Float),
            12 => Some(FieldType::Double),
            13 => Some(FieldType::Ifd),
            16 => Some(FieldType::Long8),
            17 => Some(FieldType::SLong8),
            18 => Some(FieldType::Ifd8),
            _ => None,
        }
    }

    /// Maximum bytes stored inline in a classic TIFF entry.
    pub const INLINE_THRESHOLD_TIFF: usize = 4;

    /// Maximum bytes stored inline in a BigTIFF entry.
    pub const INLINE_THRESHOLD_BIGTIFF: usize = 8;

    /// Whether `count` values of this type fit in the entry's value field.
    #[inline]
    pub fn fits_inline(self, count: u64, is_bigtiff: bool) -> bool {
        let threshold = if is_bigtiff {
            Self::INLINE_THRESHOLD_BIGTIFF
        } else {
            Self::INLINE_THRESHOLD_TIFF
        };
        (self.size_in_bytes() as u64)
            .checked_mul(count)
            .is_some_and(|total| total <= threshold as u64)
    }
}

// =============================================================================
// Tag IDs
// =============================================================================

pub const TAG_IMAGE_WIDTH: u16 = 256;
pub const TAG_IMAGE_LENGTH: u16 = 257;
pub const TAG_BITS_PER_SAMPLE: u16 = 258;
pub const TAG_COMPRESSION: u16 = 259;

/// Descriptive tag names, for display.
pub static TAG_NAMES: SparseTable<&str> = SparseTable::new(&[
    (254, Entry::Value("NewSubfileType")),
    (255, Entry::Value("SubfileType")),
    (256, Entry::Value("ImageWidth")),
    (257, Entry::Value("ImageLength")),
    (258, Entry::Value("BitsPerSample")),
    (259, Entry::Value("Compression")),
    (262, Entry::Value("PhotometricInterpretation")),
    (266, Entry::Value("FillOrder")),
    (270, Entry::Value("ImageDescription")),
    (271, Entry::Value("Make")),
    (272, Entry::Value("Model")),
    (273, Entry::Value("StripOffsets")),
    (274, Entry::Value("Orientation")),
    (277, Entry::Value("SamplesPerPixel")),
    (278, Entry::Value("RowsPerStrip")),
    (279, Entry::Value("StripByteCounts")),
    (282, Entry::Value("XResolution")),
    (283, Entry::Value("YResolution")),
    (284, Entry::Value("PlanarConfiguration")),
    (296, Entry::Value("ResolutionUnit")),
    (305, Entry::Value("Software")),
    (306, Entry::Value("DateTime")),
    (315, Entry::Value("Artist")),
    (316, Entry::Value("HostComputer")),
    (317, Entry::Value("Predictor")),
    (320, Entry::Value("ColorMap")),
    (322, Entry::Value("TileWidth")),
    (323, Entry::Value("TileLength")),
    (324, Entry::Value("TileOffsets")),
    (325, Entry::Value("TileByteCounts")),
    (330, Entry::Value("SubIFDs")),
    (338, Entry::Value("ExtraSamples")),
    (339, Entry::Value("SampleFormat")),
    (347, Entry::Value("JPEGTables")),
    (530, Entry::Value("YCbCrSubSampling")),
    (700, Entry::Value("XMP")),
    (33432, Entry::Value("Copyright")),
    (33723, Entry::Value("IPTC")),
    (34665, Entry::Value("ExifIFD")),
    (34675, Entry::Value("ICCProfile")),
    (34853, Entry::Value("GPSInfo")),
]);

/// Compression scheme names (tag 259).
pub static COMPRESSION_METHODS: SparseTable<&str> = SparseTable::new(&[
    (1, Entry::Value("Uncompressed")),
    (2, Entry::Value("Huffman")),
    (3, Entry::Value("Fax - CCITT 3")),
    (4, Entry::Value("Fax - CCITT 4")),
    (5, Entry::Value("LZW")),
    (6, Entry::Value("JPEG (old-style)")),
    (7, Entry::Value("JPEG")),
    (8, Entry::Value("Deflate")),
    (32773, Entry::Value("PackBits")),
    (32946, Entry::Value("Deflate (PKZIP)")),
    (33003, Entry::Value("JPEG 2000")),
]);

/// Descriptive ASCII tags collected into the comments map.
pub static COMMENT_TAGS: SparseTable<&str> = SparseTable::new(&[
    (270, Entry::Value("imagedescription")),
    (271, Entry::Value("make")),
    (272, Entry::Value("model")),
    (305, Entry::Value("software")),
    (306, Entry::Value("datetime")),
    (315, Entry::Value("artist")),
    (316, Entry::Value("hostcomputer")),
]);

// =============================================================================
// Tests
// =============================================================================
