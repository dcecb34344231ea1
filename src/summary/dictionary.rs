//! Element count of dictionary objects.
//!
//! The concrete dictionary classes are private to the system frameworks, so the count is read
//! from offsets found empirically per class:
//!
//! | Class              | Count offset (64 / 32-bit) | Masked bits                     |
//! |--------------------|----------------------------|---------------------------------|
//! | `__NSCFDictionary` | 20 / 12                    | none                            |
//! | `__NSDictionaryI`  | 8 / 4                      | top six (capacity bits)         |
//! | `__NSDictionaryM`  | 8 / 4                      | top six (observation flags)     |
//!
//! Any other class would need the host to evaluate `[obj count]`; its count is reported as
//! absent.
//!
//! # Example
//!
//! ```rust
//! use objscope::{
//!     summary::{DictionarySummary, SummaryMetric, SummaryStatistics},
//!     MemorySnapshot, ModuleInfo, PointerWidth, ProcessId, Session,
//! };
//!
//! let mut memory = MemorySnapshot::new(ProcessId::new(1), PointerWidth::Eight);
//! memory.add_module(ModuleInfo::new("libobjc.A.dylib"));
//!
//! let session = Session::default();
//! let statistics = SummaryStatistics::new();
//! let resolver = session.resolver(&memory)?;
//!
//! assert!(DictionarySummary::new(resolver, 0, &statistics).is_none());
//! assert_eq!(statistics.count(SummaryMetric::InvalidPointer), 1);
//! # Ok::<(), objscope::Error>(())
//! ```

use std::fmt;

use crate::{
    runtime::{ClassDescriptor, ClassResolver, RuntimeIntrospector},
    summary::{SummaryMetric, SummaryStatistics},
};

/// Bits of the count word reused by the immutable and mutable classes.
const COUNT_MASK_64: u64 = 0xFC00_0000_0000_0000;
const COUNT_MASK_32: u64 = 0xFC00_0000;

/// Extra bits set in counts read through the CoreFoundation type on 64-bit processes.
const CF_COUNT_MASK_64: u64 = 0x0F1F_0000_0000_0000;

/// Concrete dictionary class behind a reference.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DictionaryKind {
    /// `__NSCFDictionary`, the toll-free bridged class
    CoreFoundation,
    /// `__NSDictionaryI`
    Immutable,
    /// `__NSDictionaryM`
    Mutable,
    /// Any other class, with its name
    Unknown(String),
}

impl DictionaryKind {
    /// Classifies a class name.
    #[must_use]
    pub fn from_class_name(name: &str) -> Self {
        match name {
            "__NSCFDictionary" => DictionaryKind::CoreFoundation,
            "__NSDictionaryI" => DictionaryKind::Immutable,
            "__NSDictionaryM" => DictionaryKind::Mutable,
            other => DictionaryKind::Unknown(other.to_string()),
        }
    }
}

/// Static type the host displays the reference as.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DictionaryFlavor {
    /// The Foundation class type
    #[default]
    Foundation,
    /// The CoreFoundation reference type
    CoreFoundation,
}

/// Count reader for one dictionary object.
pub struct DictionarySummary<'a> {
    resolver: ClassResolver<'a>,
    value: u64,
    class: ClassDescriptor,
    kind: DictionaryKind,
}

impl<'a> DictionarySummary<'a> {
    /// Resolves the class of the object at `value` and records the outcome in `statistics`.
    ///
    /// A key-value observing subclass is replaced by the class it observes. Returns `None` if
    /// the reference or its class can not be trusted.
    #[must_use]
    pub fn new(
        resolver: ClassResolver<'a>,
        value: u64,
        statistics: &SummaryStatistics,
    ) -> Option<Self> {
        let introspector = RuntimeIntrospector::new(resolver, value);
        if !introspector.is_valid() {
            statistics.hit(SummaryMetric::InvalidPointer);
            return None;
        }

        let class = resolver.skip_kvo(introspector.read_class_data());
        let Some(name) = class.class_name() else {
            statistics.hit(SummaryMetric::InvalidIsa);
            return None;
        };

        let kind = DictionaryKind::from_class_name(name);
        if let DictionaryKind::Unknown(name) = &kind {
            log::debug!("0x{value:x} seen as unknown dictionary class {name}");
            statistics.hit(SummaryMetric::UnknownClass);
        } else {
            statistics.hit(SummaryMetric::KnownClass);
        }

        Some(DictionarySummary {
            resolver,
            value,
            class,
            kind,
        })
    }

    /// The dictionary class.
    #[must_use]
    pub fn kind(&self) -> &DictionaryKind {
        &self.kind
    }

    /// The resolved class, after observation subclasses were skipped.
    #[must_use]
    pub fn class(&self) -> &ClassDescriptor {
        &self.class
    }

    /// Number of key/value pairs.
    ///
    /// `None` for unknown classes and unreadable objects.
    #[must_use]
    pub fn count(&self) -> Option<u64> {
        let params = self.resolver.params();
        let (offset, mask) = match (&self.kind, params.is_64_bit()) {
            (DictionaryKind::CoreFoundation, true) => (20, 0),
            (DictionaryKind::CoreFoundation, false) => (12, 0),
            (DictionaryKind::Immutable | DictionaryKind::Mutable, true) => (8, COUNT_MASK_64),
            (DictionaryKind::Immutable | DictionaryKind::Mutable, false) => (4, COUNT_MASK_32),
            (DictionaryKind::Unknown(_), _) => return None,
        };

        match self
            .resolver
            .memory()
            .read_pointer(self.value.wrapping_add(offset))
        {
            Ok(count) => Some(count & !mask),
            Err(error) => {
                log::debug!("can not read dictionary count of 0x{:x}: {error}", self.value);
                None
            }
        }
    }

    /// Number of key/value pairs as displayed for `flavor`.
    #[must_use]
    pub fn count_as(&self, flavor: DictionaryFlavor) -> Option<u64> {
        let count = self.count()?;
        if flavor == DictionaryFlavor::CoreFoundation && self.resolver.params().is_64_bit() {
            Some(count & !CF_COUNT_MASK_64)
        } else {
            Some(count)
        }
    }
}

impl fmt::Display for DictionarySummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.count() {
            Some(count) => write!(f, "{count} key/value pairs"),
            None => write!(f, "no valid dictionary here"),
        }
    }
}
