//! Tagged (pointer-packed) object references.
//!
//! On the modern runtime an odd reference value is not an address: it packs a payload, a small
//! class index and some info bits into the reference itself.
//!
//! ```text
//!  63                              8 7      4 3       1  0
//! +---------------------------------+--------+---------+---+
//! |             payload             |  info  |  class  | 1 |
//! +---------------------------------+--------+---------+---+
//! ```
//!
//! The class index is looked up in a [`TaggedClassTable`]. The assignment of indices to
//! classes is an OS implementation detail that has changed between releases, so the tables are
//! data, configured through [`crate::IntrospectorConfig`], rather than code.

use std::collections::BTreeMap;

use crate::{
    config::IntrospectorConfig,
    memory::PointerWidth,
    runtime::SystemParameters,
    Error, Result,
};

/// Mapping from 3-bit tagged class index to class name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TaggedClassTable {
    entries: BTreeMap<u8, String>,
}

impl TaggedClassTable {
    /// An empty table; every tagged value decodes as unknown.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The table used by legacy OS releases.
    #[must_use]
    pub fn legacy() -> Self {
        Self::from_entries(&[
            (1, "NSNumber"),
            (5, "NSManagedObject"),
            (6, "NSDate"),
            (7, "NSDateTS"),
        ])
    }

    /// The table used by later OS releases.
    #[must_use]
    pub fn modern() -> Self {
        Self::from_entries(&[
            (0, "NSAtom"),
            (3, "NSNumber"),
            (4, "NSDateTS"),
            (5, "NSManagedObject"),
            (6, "NSDate"),
        ])
    }

    /// Builds a table from `(class_bits, name)` pairs.
    #[must_use]
    pub fn from_entries(entries: &[(u8, &str)]) -> Self {
        TaggedClassTable {
            entries: entries
                .iter()
                .map(|(bits, name)| (*bits, (*name).to_string()))
                .collect(),
        }
    }

    /// Adds or replaces an entry. Returns the previous name for `class_bits`, if any.
    pub fn insert(&mut self, class_bits: u8, name: impl Into<String>) -> Option<String> {
        self.entries.insert(class_bits, name.into())
    }

    /// Removes an entry.
    pub fn remove(&mut self, class_bits: u8) -> Option<String> {
        self.entries.remove(&class_bits)
    }

    /// Class name for `class_bits`.
    #[must_use]
    pub fn name(&self, class_bits: u8) -> Option<&str> {
        self.entries.get(&class_bits).map(String::as_str)
    }

    /// Number of known tagged classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if no tagged class is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A successfully decoded tagged reference.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TaggedClass {
    /// The raw reference value
    pub raw: u64,
    /// Bits 8 and up of the reference, shifted down
    pub payload: u64,
    /// The 3-bit class index
    pub class_bits: u8,
    /// The 4 info bits
    pub info_bits: u8,
    /// Class name from the tagged-class table
    pub name: String,
    /// Pointer width of the process the value came from
    pub pointer_width: PointerWidth,
}

impl TaggedClass {
    /// Packs a tagged reference value from its parts.
    ///
    /// `class_bits` is truncated to 3 bits and `info_bits` to 4.
    #[must_use]
    pub fn encode(payload: u64, class_bits: u8, info_bits: u8) -> u64 {
        (payload << 8)
            | (u64::from(info_bits & 0xF) << 4)
            | (u64::from(class_bits & 0x7) << 1)
            | 1
    }

    /// Instance size of a tagged value: exactly one pointer.
    #[must_use]
    pub fn instance_size(&self) -> u64 {
        self.pointer_width.bytes()
    }
}

/// Decoder for tagged references against one tagged-class table.
pub struct TaggedValueDecoder<'a> {
    table: &'a TaggedClassTable,
    pointer_width: PointerWidth,
}

impl<'a> TaggedValueDecoder<'a> {
    /// Creates a decoder using an explicit table.
    #[must_use]
    pub fn new(table: &'a TaggedClassTable, pointer_width: PointerWidth) -> Self {
        TaggedValueDecoder {
            table,
            pointer_width,
        }
    }

    /// Creates a decoder using the table the configuration selects for the process' OS class.
    #[must_use]
    pub fn for_process(config: &'a IntrospectorConfig, params: &SystemParameters) -> Self {
        Self::new(
            config.tagged_classes(params.is_legacy_os),
            params.pointer_width,
        )
    }

    /// Payload of a tagged value: everything above the low byte.
    #[must_use]
    pub fn payload(value: u64) -> u64 {
        (value & !0xFF) >> 8
    }

    /// 3-bit class index of a tagged value.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn class_bits(value: u64) -> u8 {
        ((value & 0xE) >> 1) as u8
    }

    /// 4 info bits of a tagged value.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn info_bits(value: u64) -> u8 {
        ((value & 0xF0) >> 4) as u8
    }

    /// Decodes `value`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownTagClass`] if the class index is not in the table.
    pub fn decode(&self, value: u64) -> Result<TaggedClass> {
        let class_bits = Self::class_bits(value);
        let Some(name) = self.table.name(class_bits) else {
            return Err(Error::UnknownTagClass { class_bits });
        };

        log::trace!("tagged value 0x{value:x} decoded as {name}");
        Ok(TaggedClass {
            raw: value,
            payload: Self::payload(value),
            class_bits,
            info_bits: Self::info_bits(value),
            name: name.to_string(),
            pointer_width: self.pointer_width,
        })
    }
}
