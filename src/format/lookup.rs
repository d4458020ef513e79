//! Static lookup tables for coded header fields.
//!
//! Every coded enumerant resolves to one of three outcomes:
//!
//! - [`Lookup::Value`]: the code has a defined meaning we decode
//! - [`Lookup::Reserved`]: the format defines the code but assigns no meaning
//! - [`Lookup::Invalid`]: the code lies outside the defined range
//!
//! Tables are `const` slices built at compile time and never mutated, so
//! concurrent sessions share them freely.

use serde::ser::{Serialize, SerializeMap, Serializer};

// =============================================================================
// Lookup outcome
// =============================================================================

/// Outcome of resolving a coded value against a table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup<T> {
    Value(T),
    Reserved(u32),
    Invalid(u32),
}

impl<T> Lookup<T> {
    /// The decoded value, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            Lookup::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_value(&self) -> bool {
        matches!(self, Lookup::Value(_))
    }

    pub fn is_reserved(&self) -> bool {
        matches!(self, Lookup::Reserved(_))
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Lookup::Invalid(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Lookup::Value(v) => Lookup::Value(f(v)),
            Lookup::Reserved(c) => Lookup::Reserved(c),
            Lookup::Invalid(c) => Lookup::Invalid(c),
        }
    }
}

impl<T: Copy> Lookup<T> {
    /// The decoded value, if any, by copy.
    pub fn get(&self) -> Option<T> {
        self.value().copied()
    }
}

/// Serialises as the bare value, `{"reserved": code}` or `{"invalid": code}`.
impl<T: Serialize> Serialize for Lookup<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Lookup::Value(v) => v.serialize(serializer),
            Lookup::Reserved(code) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("reserved", code)?;
                map.end()
            }
            Lookup::Invalid(code) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("invalid", code)?;
                map.end()
            }
        }
    }
}

// =============================================================================
// Tables
// =============================================================================

/// A table slot: either a defined value or a reserved code.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Entry<T: 'static> {
    Value(T),
    Reserved,
}

/// Dense table indexed directly by code.
///
/// Codes beyond the end of the slice are `Invalid`.
#[derive(Debug)]
pub struct CodeTable<T: 'static> {
    entries: &'static [Entry<T>],
}

impl<T: Copy + 'static> CodeTable<T> {
    pub const fn new(entries: &'static [Entry<T>]) -> Self {
        Self { entries }
    }

    pub fn resolve(&self, code: u32) -> Lookup<T> {
        match self.entries.get(code as usize) {
            Some(Entry::Value(v)) => Lookup::Value(*v),
            Some(Entry::Reserved) => Lookup::Reserved(code),
            None => Lookup::Invalid(code),
        }
    }

    /// Number of codes with a defined slot.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Sparse table of `(code, entry)` pairs; codes not listed are `Invalid`.
#[derive(Debug)]
pub struct SparseTable<T: 'static> {
    entries: &'static [(u32, Entry<T>)],
}

impl<T: Copy + 'static> SparseTable<T> {
    pub const fn new(entries: &'static [(u32, Entry<T>)]) -> Self {
        Self { entries }
    }

    pub fn resolve(&self, code: u32) -> Lookup<T> {
        match self.entries.iter().find(|(c, _)| *c == code) {
            Some((_, Entry::Value(v))) => Lookup::Value(*v),
            Some((_, Entry::Reserved)) => Lookup::Reserved(code),
            None => Lookup::Invalid(code),
        }
    }

    /// Resolve to the value, if the code is defined.
    pub fn name(&self, code: u32) -> Option<T> {
        self.resolve(code).get()
    }
}
