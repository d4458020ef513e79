//! EXIF reader.
//!
//! Fields are grouped by the IFD they come from (IFD0, EXIF, GPS, INTEROP,
//! THUMBNAIL). Rationals become floats and numeric strings numbers, and
//! GPS coordinates are folded into decimal degrees under `computed`.

use std::collections::BTreeMap;

use ::exif::{Context, Field, In, Reader, Value};
use serde::Serialize;

use super::{cast_as_appropriate, TagValue};
use crate::error::TagError;

/// Decoder for the TIFF structure carried in an APP1 `Exif\0\0` segment.
pub trait ExifReader: Send + Sync {
    fn name(&self) -> &'static str;

    /// Decode `tiff`, the bytes following the `Exif\0\0` preamble.
    fn read(&self, tiff: &[u8]) -> Result<ExifData, TagError>;
}

/// Values derived from the GPS group.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GpsComputed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    /// Unix time of GPSDateStamp + GPSTimeStamp (UTC)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl GpsComputed {
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Decoded EXIF block.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExifData {
    #[serde(flatten)]
    pub groups: BTreeMap<&'static str, BTreeMap<String, TagValue>>,
    #[serde(rename = "GPS_computed", skip_serializing_if = "Option::is_none")]
    pub gps: Option<GpsComputed>,
}

impl ExifData {
    pub fn get(&self, group: &str, tag: &str) -> Option<&TagValue> {
        self.groups.get(group).and_then(|fields| fields.get(tag))
    }

    pub fn insert(&mut self, group: &'static str, tag: impl Into<String>, value: TagValue) {
        self.groups.entry(group).or_default().insert(tag.into(), value);
    }

    /// Derive version, position and time from the GPS group.
    pub fn compute_gps(&mut self) {
        let gps = |tag: &str| self.get("GPS", tag);
        let mut computed = GpsComputed::default();

        if let Some(version) = gps("GPSVersionID") {
            let parts: Vec<String> = version
                .items()
                .iter()
                .filter_map(TagValue::as_f64)
                .map(|v| (v as i64).to_string())
                .collect();
            if !parts.is_empty() {
                computed.version = Some(format!("v{}", parts.join(".")));
            }
        }

        let degrees = |value: &TagValue| -> Option<f64> {
            let parts: Vec<f64> = value.items().iter().filter_map(TagValue::as_f64).collect();
            match parts.as_slice() {
                [d, m, s, ..] => Some(d + m / 60.0 + s / 3600.0),
                [d, m] => Some(d + m / 60.0),
                [d] => Some(*d),
                [] => None,
            }
        };
        let reference = |tag: &str| gps(tag).and_then(TagValue::as_str).map(str::trim);

        if let Some(lat) = gps("GPSLatitude").and_then(degrees) {
            let sign = if reference("GPSLatitudeRef") == Some("S") { -1.0 } else { 1.0 };
            computed.latitude = Some(sign * lat);
        }
        if let Some(lon) = gps("GPSLongitude").and_then(degrees) {
            let sign = if reference("GPSLongitudeRef") == Some("W") { -1.0 } else { 1.0 };
            computed.longitude = Some(sign * lon);
        }
        if let Some(alt) = gps("GPSAltitude").and_then(TagValue::as_f64) {
            // Ref 1 is below sea level
            let below = gps("GPSAltitudeRef").and_then(TagValue::as_f64) == Some(1.0);
            computed.altitude = Some(if below { -alt } else { alt });
        }

        if let Some(date) = gps("GPSDateStamp").and_then(TagValue::as_str) {
            let time: Vec<f64> = gps("GPSTimeStamp")
                .map(|t| t.items().iter().filter_map(TagValue::as_f64).collect())
                .unwrap_or_default();
            computed.timestamp = gps_timestamp(date, &time);
        }

        self.gps = (!computed.is_empty()).then_some(computed);
    }
}

fn gps_timestamp(date: &str, time: &[f64]) -> Option<i64> {
    let mut parts = date.trim().split(':').map(|p| p.parse::<u32>().ok());
    let year = parts.next()??;
    let month = parts.next()??;
    let day = parts.next()??;
    let at = |i: usize| time.get(i).copied().unwrap_or(0.0) as u32;

    chrono::NaiveDate::from_ymd_opt(year as i32, month, day)
        .and_then(|d| d.and_hms_opt(at(0), at(1), at(2)))
        .map(|dt| dt.and_utc().timestamp())
}

// =============================================================================
// kamadak-exif implementation
// =============================================================================

/// [`ExifReader`] backed by the `kamadak-exif` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct KamadakExifReader;

impl KamadakExifReader {
    fn group(field: &Field) -> &'static str {
        if field.ifd_num == In::THUMBNAIL {
            return "THUMBNAIL";
        }
        match field.tag.context() {
            Context::Tiff => "IFD0",
            Context::Gps => "GPS",
            Context::Interop => "INTEROP",
            _ => "EXIF",
        }
    }

    fn convert(value: &Value) -> TagValue {
        fn collect<T: Copy>(items: &[T], f: impl Fn(T) -> TagValue) -> TagValue {
            match items {
                [single] => f(*single),
                _ => TagValue::List(items.iter().map(|v| f(*v)).collect()),
            }
        }

        match value {
            Value::Byte(v) => collect(v, |b| TagValue::Int(b as i64)),
            Value::SByte(v) => collect(v, |b| TagValue::Int(b as i64)),
            Value::Short(v) => collect(v, |s| TagValue::Int(s as i64)),
            Value::SShort(v) => collect(v, |s| TagValue::Int(s as i64)),
            Value::Long(v) => collect(v, |l| TagValue::Int(l as i64)),
            Value::SLong(v) => collect(v, |l| TagValue::Int(l as i64)),
            Value::Float(v) => collect(v, |f| TagValue::Float(f as f64)),
            Value::Double(v) => collect(v, TagValue::Float),
            Value::Rational(v) => collect(v, |r| {
                if r.denom == 0 {
                    TagValue::Text(format!("{}/{}", r.num, r.denom))
                } else {
                    TagValue::Float(r.to_f64())
                }
            }),
            Value::SRational(v) => collect(v, |r| {
                if r.denom == 0 {
                    TagValue::Text(format!("{}/{}", r.num, r.denom))
                } else {
                    TagValue::Float(r.to_f64())
                }
            }),
            Value::Ascii(strings) => {
                let texts: Vec<TagValue> = strings
                    .iter()
                    .map(|s| {
                        let text = String::from_utf8_lossy(s);
                        cast_as_appropriate(text.trim_end_matches('\0'))
                    })
                    .collect();
                match <[TagValue; 1]>::try_from(texts) {
                    Ok([single]) => single,
                    Err(texts) => TagValue::List(texts),
                }
            }
            Value::Undefined(bytes, _) => {
                let printable = bytes
                    .iter()
                    .all(|&b| b == 0 || b.is_ascii_graphic() || b == b' ');
                if printable && !bytes.is_empty() {
                    let text = String::from_utf8_lossy(bytes);
                    cast_as_appropriate(text.trim_end_matches('\0'))
                } else {
                    TagValue::Text(hex::encode(bytes))
                }
            }
            other => TagValue::Text(format!("{other:?}")),
        }
    }
}

impl ExifReader for KamadakExifReader {
    fn name(&self) -> &'static str {
        "kamadak-exif"
    }

    fn read(&self, tiff: &[u8]) -> Result<ExifData, TagError> {
        let exif = Reader::new()
            .read_raw(tiff.to_vec())
            .map_err(|err| TagError::Parse {
                reader: self.name(),
                message: err.to_string(),
            })?;

        let mut data = ExifData::default();
        for field in exif.fields() {
            data.insert(Self::group(field), field.tag.to_string(), Self::convert(&field.value));
        }
        data.compute_gps();
        Ok(data)
    }
}
