//! IPTC-IIM decoding from Photoshop image resources (JPEG APP13).
//!
//! ```text
//! resource: "8BIM" | id (u16 BE) | Pascal name, padded to even | size (u32 BE)
//!           | data, padded to even
//! dataset:  0x1C | record (u8) | dataset (u8) | size (u16 BE) | data
//! ```
//!
//! A dataset size with the high bit set is an extended size: the low 15 bits
//! give the byte count of the real length that follows.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::IoError;
use crate::format::lookup::{Entry, SparseTable};
use crate::io::{read_u16_be, read_u32_be, read_uint, slice_at, ByteOrder};

/// Photoshop resource id of the IPTC-NAA record
pub const RESOURCE_IPTC_NAA: u16 = 0x0404;

const DATASET_MARKER: u8 = 0x1C;

pub static IPTC_RECORD_NAMES: SparseTable<&str> = SparseTable::new(&[
    (1, Entry::Value("IPTCEnvelope")),
    (2, Entry::Value("IPTCApplication")),
    (3, Entry::Value("IPTCNewsPhoto")),
    (7, Entry::Value("IPTCPreObjectData")),
    (8, Entry::Value("IPTCObjectData")),
    (9, Entry::Value("IPTCPostObjectData")),
]);

static ENVELOPE_TAGS: SparseTable<&str> = SparseTable::new(&[
    (0, Entry::Value("EnvelopeRecordVersion")),
    (5, Entry::Value("Destination")),
    (20, Entry::Value("FileFormat")),
    (22, Entry::Value("FileVersion")),
    (30, Entry::Value("ServiceIdentifier")),
    (40, Entry::Value("EnvelopeNumber")),
    (50, Entry::Value("ProductID")),
    (60, Entry::Value("EnvelopePriority")),
    (70, Entry::Value("DateSent")),
    (80, Entry::Value("TimeSent")),
    (90, Entry::Value("CodedCharacterSet")),
    (100, Entry::Value("UniqueObjectName")),
    (120, Entry::Value("ARMIdentifier")),
    (122, Entry::Value("ARMVersion")),
]);

static APPLICATION_TAGS: SparseTable<&str> = SparseTable::new(&[
    (0, Entry::Value("ApplicationRecordVersion")),
    (3, Entry::Value("ObjectTypeReference")),
    (4, Entry::Value("ObjectAttributeReference")),
    (5, Entry::Value("ObjectName")),
    (7, Entry::Value("EditStatus")),
    (8, Entry::Value("EditorialUpdate")),
    (10, Entry::Value("Urgency")),
    (12, Entry::Value("SubjectReference")),
    (15, Entry::Value("Category")),
    (20, Entry::Value("SupplementalCategories")),
    (22, Entry::Value("FixtureIdentifier")),
    (25, Entry::Value("Keywords")),
    (26, Entry::Value("ContentLocationCode")),
    (27, Entry::Value("ContentLocationName")),
    (30, Entry::Value("ReleaseDate")),
    (35, Entry::Value("ReleaseTime")),
    (37, Entry::Value("ExpirationDate")),
    (38, Entry::Value("ExpirationTime")),
    (40, Entry::Value("SpecialInstructions")),
    (42, Entry::Value("ActionAdvised")),
    (45, Entry::Value("ReferenceService")),
    (47, Entry::Value("ReferenceDate")),
    (50, Entry::Value("ReferenceNumber")),
    (55, Entry::Value("DateCreated")),
    (60, Entry::Value("TimeCreated")),
    (62, Entry::Value("DigitalCreationDate")),
    (63, Entry::Value("DigitalCreationTime")),
    (65, Entry::Value("OriginatingProgram")),
    (70, Entry::Value("ProgramVersion")),
    (75, Entry::Value("ObjectCycle")),
    (80, Entry::Value("By-line")),
    (85, Entry::Value("By-lineTitle")),
    (90, Entry::Value("City")),
    (92, Entry::Value("Sub-location")),
    (95, Entry::Value("Province-State")),
    (100, Entry::Value("Country-PrimaryLocationCode")),
    (101, Entry::Value("Country-PrimaryLocationName")),
    (103, Entry::Value("OriginalTransmissionReference")),
    (105, Entry::Value("Headline")),
    (110, Entry::Value("Credit")),
    (115, Entry::Value("Source")),
    (116, Entry::Value("CopyrightNotice")),
    (118, Entry::Value("Contact")),
    (120, Entry::Value("Caption-Abstract")),
    (121, Entry::Value("LocalCaption")),
    (122, Entry::Value("Writer-Editor")),
    (125, Entry::Value("RasterizedCaption")),
    (130, Entry::Value("ImageType")),
    (131, Entry::Value("ImageOrientation")),
    (135, Entry::Value("LanguageIdentifier")),
    (150, Entry::Value("AudioType")),
    (151, Entry::Value("AudioSamplingRate")),
    (152, Entry::Value("AudioSamplingResolution")),
    (153, Entry::Value("AudioDuration")),
    (154, Entry::Value("AudioOutcue")),
    (184, Entry::Value("JobID")),
    (185, Entry::Value("MasterDocumentID")),
    (186, Entry::Value("ShortDocumentID")),
    (187, Entry::Value("UniqueDocumentID")),
    (188, Entry::Value("OwnerID")),
    (200, Entry::Value("ObjectPreviewFileFormat")),
    (201, Entry::Value("ObjectPreviewFileVersion")),
    (202, Entry::Value("ObjectPreviewData")),
    (221, Entry::Value("Prefs")),
    (225, Entry::Value("ClassifyState")),
    (228, Entry::Value("SimilarityIndex")),
    (230, Entry::Value("DocumentNotes")),
    (231, Entry::Value("DocumentHistory")),
    (232, Entry::Value("ExifCameraInfo")),
]);

static NEWS_PHOTO_TAGS: SparseTable<&str> = SparseTable::new(&[
    (0, Entry::Value("NewsPhotoVersion")),
    (10, Entry::Value("IPTCPictureNumber")),
    (20, Entry::Value("IPTCImageWidth")),
    (30, Entry::Value("IPTCImageHeight")),
    (40, Entry::Value("IPTCPixelWidth")),
    (50, Entry::Value("IPTCPixelHeight")),
    (55, Entry::Value("SupplementalType")),
    (60, Entry::Value("ColorRepresentation")),
    (64, Entry::Value("InterchangeColorSpace")),
    (65, Entry::Value("ColorSequence")),
    (66, Entry::Value("ICC_Profile")),
    (70, Entry::Value("ColorCalibrationMatrix")),
    (80, Entry::Value("LookupTable")),
    (84, Entry::Value("NumIndexEntries")),
    (85, Entry::Value("ColorPalette")),
    (86, Entry::Value("IPTCBitsPerSample")),
    (90, Entry::Value("SampleStructure")),
    (100, Entry::Value("ScanningDirection")),
    (102, Entry::Value("IPTCImageRotation")),
    (110, Entry::Value("DataCompressionMethod")),
    (120, Entry::Value("QuantizationMethod")),
    (125, Entry::Value("EndPoints")),
    (130, Entry::Value("ExcursionTolerance")),
    (135, Entry::Value("BitsPerComponent")),
    (140, Entry::Value("MaximumDensityRange")),
    (145, Entry::Value("GammaCompensatedValue")),
]);

static PRE_OBJECT_TAGS: SparseTable<&str> = SparseTable::new(&[
    (10, Entry::Value("SizeMode")),
    (20, Entry::Value("MaxSubfileSize")),
    (90, Entry::Value("ObjectSizeAnnounced")),
    (95, Entry::Value("MaximumObjectSize")),
]);

static OBJECT_TAGS: SparseTable<&str> = SparseTable::new(&[(10, Entry::Value("SubFile"))]);

static POST_OBJECT_TAGS: SparseTable<&str> =
    SparseTable::new(&[(10, Entry::Value("ConfirmedObjectSize"))]);

fn dataset_table(record: u8) -> Option<&'static SparseTable<&'static str>> {
    match record {
        1 => Some(&ENVELOPE_TAGS),
        2 => Some(&APPLICATION_TAGS),
        3 => Some(&NEWS_PHOTO_TAGS),
        7 => Some(&PRE_OBJECT_TAGS),
        8 => Some(&OBJECT_TAGS),
        9 => Some(&POST_OBJECT_TAGS),
        _ => None,
    }
}

/// Decoded IPTC block: record name → dataset name → values.
///
/// Unknown records and datasets are keyed by their number.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IptcData {
    #[serde(flatten)]
    pub records: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

impl IptcData {
    pub fn get(&self, record: &str, dataset: &str) -> Option<&[String]> {
        self.records
            .get(record)
            .and_then(|r| r.get(dataset))
            .map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// One Photoshop image resource block.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoshopResource<'a> {
    pub id: u16,
    pub name: String,
    pub data: &'a [u8],
}

/// Split a Photoshop image resource stream into its `8BIM` blocks.
///
/// Stops at the first block that does not start with `8BIM`.
pub fn parse_photoshop_resources(data: &[u8]) -> Result<Vec<PhotoshopResource<'_>>, IoError> {
    let mut resources = Vec::new();
    let mut offset = 0usize;

    while offset + 4 <= data.len() && &data[offset..offset + 4] == b"8BIM" {
        let id = read_u16_be(data, offset + 4)?;
        let name_len = slice_at(data, offset + 6, 1)?[0] as usize;
        let name = String::from_utf8_lossy(slice_at(data, offset + 7, name_len)?).into_owned();
        // Length byte plus name, padded to even
        let name_field = (1 + name_len + 1) & !1;
        let size_at = offset + 6 + name_field;
        let size = read_u32_be(data, size_at)? as usize;
        let body = slice_at(data, size_at + 4, size)?;

        resources.push(PhotoshopResource { id, name, data: body });
        offset = size_at + 4 + size + (size & 1);
    }

    Ok(resources)
}

/// Decode IPTC-IIM datasets.
///
/// Parsing stops quietly at the first byte that is not a dataset marker,
/// as writers commonly pad the record.
pub fn parse_iptc(data: &[u8]) -> Result<IptcData, IoError> {
    let mut iptc = IptcData::default();
    let mut offset = 0usize;

    while offset + 5 <= data.len() && data[offset] == DATASET_MARKER {
        let record = data[offset + 1];
        let dataset = data[offset + 2];
        let mut size = read_u16_be(data, offset + 3)? as usize;
        offset += 5;

        if size & 0x8000 != 0 {
            let width = size & 0x7FFF;
            size = read_uint(data, offset, width, ByteOrder::BigEndian)? as usize;
            offset += width;
        }

        let value = slice_at(data, offset, size)?;
        offset += size;

        let record_name = IPTC_RECORD_NAMES
            .name(record as u32)
            .map(str::to_string)
            .unwrap_or_else(|| record.to_string());
        let dataset_name = dataset_table(record)
            .and_then(|table| table.name(dataset as u32))
            .map(str::to_string)
            .unwrap_or_else(|| dataset.to_string());

        iptc.records
            .entry(record_name)
            .or_default()
            .entry(dataset_name)
            .or_default()
            .push(String::from_utf8_lossy(value).into_owned());
    }

    Ok(iptc)
}
