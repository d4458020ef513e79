//! XMP reader.
//!
//! Properties are collected as `prefix → name → value` from three RDF
//! shapes: attributes of `rdf:Description`, simple property elements, and
//! `rdf:Seq` / `rdf:Bag` / `rdf:Alt` lists. Nested structures are not
//! descended into.

use std::collections::BTreeMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use serde::Serialize;

use super::{cast_as_appropriate, TagValue};
use crate::error::TagError;

/// Decoder for an XMP packet (the XML following the APP1 namespace header).
pub trait XmpReader: Send + Sync {
    fn name(&self) -> &'static str;

    fn read(&self, packet: &[u8]) -> Result<XmpData, TagError>;
}

/// Decoded XMP properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct XmpData {
    #[serde(flatten)]
    pub namespaces: BTreeMap<String, BTreeMap<String, TagValue>>,
}

impl XmpData {
    pub fn get(&self, prefix: &str, name: &str) -> Option<&TagValue> {
        self.namespaces.get(prefix).and_then(|props| props.get(name))
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }

    /// Insert `qualified` (`prefix:name`); unprefixed names are ignored.
    fn insert(&mut self, qualified: &str, value: TagValue) {
        if let Some((prefix, name)) = qualified.split_once(':') {
            self.namespaces
                .entry(prefix.to_string())
                .or_default()
                .insert(name.to_string(), value);
        }
    }
}

// =============================================================================
// quick-xml implementation
// =============================================================================

/// [`XmpReader`] backed by `quick-xml`.
#[derive(Debug, Default, Clone, Copy)]
pub struct QuickXmlReader;

fn qualified_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn is_container(name: &str) -> bool {
    matches!(name, "rdf:Seq" | "rdf:Bag" | "rdf:Alt")
}

fn is_structural(name: &str) -> bool {
    matches!(name, "x:xmpmeta" | "x:xapmeta" | "rdf:RDF") || is_container(name)
}

impl QuickXmlReader {
    fn parse_error(&self, err: impl std::fmt::Display) -> TagError {
        TagError::Parse {
            reader: self.name(),
            message: err.to_string(),
        }
    }

    /// Record the property attributes of an `rdf:Description`.
    fn description_attributes(&self, e: &BytesStart<'_>, data: &mut XmpData) -> Result<(), TagError> {
        for attr in e.attributes() {
            let attr = attr.map_err(|err| self.parse_error(err))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            if key.starts_with("xmlns") || key.starts_with("rdf:") || !key.contains(':') {
                continue;
            }
            let value = attr.unescape_value().map_err(|err| self.parse_error(err))?;
            data.insert(&key, cast_as_appropriate(&value));
        }
        Ok(())
    }
}

impl XmpReader for QuickXmlReader {
    fn name(&self) -> &'static str {
        "quick-xml"
    }

    fn read(&self, packet: &[u8]) -> Result<XmpData, TagError> {
        let mut reader = Reader::from_reader(packet);
        reader.config_mut().trim_text(true);

        let mut data = XmpData::default();
        let mut buf = Vec::new();

        // Property currently open, its list items and its text
        let mut property: Option<String> = None;
        let mut items: Vec<TagValue> = Vec::new();
        let mut text: Option<String> = None;
        let mut in_item = false;
        let mut depth_in_item = 0usize;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => {
                    let name = qualified_name(e);
                    if name == "rdf:Description" {
                        self.description_attributes(e, &mut data)?;
                    } else if name == "rdf:li" {
                        in_item = true;
                        depth_in_item = 0;
                    } else if in_item {
                        depth_in_item += 1;
                    } else if property.is_none() && !is_structural(&name) {
                        property = Some(name);
                        items.clear();
                        text = None;
                    }
                }
                Ok(Event::Empty(ref e)) => {
                    let name = qualified_name(e);
                    if name == "rdf:Description" {
                        self.description_attributes(e, &mut data)?;
                    } else if property.is_none() && !is_structural(&name) {
                        let resource = e
                            .try_get_attribute("rdf:resource")
                            .map_err(|err| self.parse_error(err))?
                            .map(|attr| attr.unescape_value().map(|v| v.into_owned()))
                            .transpose()
                            .map_err(|err| self.parse_error(err))?
                            .unwrap_or_default();
                        data.insert(&name, cast_as_appropriate(&resource));
                    }
                }
                Ok(Event::Text(ref e)) => {
                    let value = e.unescape().map_err(|err| self.parse_error(err))?;
                    if in_item && depth_in_item == 0 {
                        items.push(cast_as_appropriate(&value));
                    } else if property.is_some() && !in_item {
                        text = Some(value.into_owned());
                    }
                }
                Ok(Event::End(ref e)) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    if name == "rdf:li" {
                        in_item = false;
                    } else if in_item {
                        depth_in_item = depth_in_item.saturating_sub(1);
                    } else if property.as_deref() == Some(name.as_str()) {
                        let value = if !items.is_empty() {
                            TagValue::List(std::mem::take(&mut items))
                        } else {
                            cast_as_appropriate(text.take().as_deref().unwrap_or(""))
                        };
                        data.insert(&name, value);
                        property = None;
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(err) => {
                    return Err(self.parse_error(format!(
                        "at position {}: {err}",
                        reader.error_position()
                    )))
                }
            }
            buf.clear();
        }

        Ok(data)
    }
}
