//! Embedded tag blocks: EXIF, XMP and IPTC.
//!
//! EXIF and XMP are decoded by optional readers behind the [`ExifReader`]
//! and [`XmpReader`] traits. A handler built without one reports a warning
//! and leaves the section out. IPTC is small enough to be decoded natively.

mod exif;
mod iptc;
mod xmp;

use serde::Serialize;

pub use self::exif::{ExifData, ExifReader, GpsComputed, KamadakExifReader};
pub use self::iptc::{
    parse_iptc, parse_photoshop_resources, IptcData, PhotoshopResource, IPTC_RECORD_NAMES,
    RESOURCE_IPTC_NAA,
};
pub use self::xmp::{QuickXmlReader, XmpData, XmpReader};

/// A tag value after numeric casting.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TagValue {
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<TagValue>),
}

impl TagValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TagValue::Int(v) => Some(*v as f64),
            TagValue::Float(v) => Some(*v),
            TagValue::Text(text) => match cast_as_appropriate(text) {
                TagValue::Text(_) => None,
                value => value.as_f64(),
            },
            TagValue::List(items) if items.len() == 1 => items[0].as_f64(),
            TagValue::List(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TagValue::Text(text) => Some(text),
            TagValue::List(items) if items.len() == 1 => items[0].as_str(),
            _ => None,
        }
    }

    /// Elements of a list, or the value itself as a one-element slice.
    pub fn items(&self) -> &[TagValue] {
        match self {
            TagValue::List(items) => items,
            other => std::slice::from_ref(other),
        }
    }
}

/// Cast textual tag values to numbers where they plainly are numbers.
///
/// `"n/d"` becomes a float (left as text when `d` is zero), a run of digits
/// an integer, digits with dots a float. Anything else stays text.
pub fn cast_as_appropriate(text: &str) -> TagValue {
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

    if let Some((num, den)) = text.split_once('/') {
        if all_digits(num) && all_digits(den) {
            if let (Ok(num), Ok(den)) = (num.parse::<f64>(), den.parse::<f64>()) {
                if den != 0.0 {
                    return TagValue::Float(num / den);
                }
            }
        }
        return TagValue::Text(text.to_string());
    }
    if all_digits(text) {
        if let Ok(v) = text.parse::<i64>() {
            return TagValue::Int(v);
        }
    }
    if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        if let Ok(v) = text.parse::<f64>() {
            return TagValue::Float(v);
        }
    }
    TagValue::Text(text.to_string())
}
