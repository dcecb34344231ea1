//! Resolved class metadata.
//!
//! A [`ClassDescriptor`] is the answer to "which class is this?". It is one of four unrelated
//! variants sharing a small query contract:
//!
//! | Variant                        | Produced by                      | Superclass chain |
//! |--------------------------------|----------------------------------|------------------|
//! | [`ClassDescriptor::V2`]        | modern heap objects ([`ClassDataV2`]) | yes         |
//! | [`ClassDescriptor::V1`]        | legacy heap objects ([`ClassDataV1`]) | yes         |
//! | [`ClassDescriptor::Tagged`]    | tagged references ([`TaggedClass`])   | no (root)   |
//! | [`ClassDescriptor::Invalid`]   | anything that failed validation       | no          |
//!
//! # Trust Model
//!
//! The V1 / V2 / Tagged payloads can only be built by parsers that validated every link they
//! followed. A descriptor is therefore either entirely trustworthy or `Invalid`; there is no
//! partially checked state. Parse errors are turned into `Invalid` at a single boundary,
//! [`ClassDescriptor::from_parse`], which logs the reason at `debug` level.
//!
//! Superclasses are resolved lazily through [`crate::ClassResolver::superclass`], which shares
//! the session's resolution cache.

mod v1;
mod v2;

use std::sync::Arc;

pub use v1::{ClassDataV1, ClassInfoFlags};
pub use v2::{ClassDataV2, ClassRoFlags};

use crate::{
    memory::{MemoryView, PointerWidth},
    runtime::{pointer::is_valid_identifier, TaggedClass},
    Error, Result,
};

/// Name prefix of the subclasses the runtime injects for key-value observing.
pub const KVO_PREFIX: &str = "NSKVONotifying_";

/// A resolved class, or the statement that none could be resolved.
///
/// Cloning is cheap; the payloads are shared.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ClassDescriptor {
    /// A class read through the legacy runtime layout
    V1(Arc<ClassDataV1>),
    /// A class read through the modern runtime layout
    V2(Arc<ClassDataV2>),
    /// A class decoded from a tagged reference
    Tagged(Arc<TaggedClass>),
    /// Nothing trustworthy could be determined
    #[default]
    Invalid,
}

impl ClassDescriptor {
    /// Converts the outcome of a class parse into a descriptor, absorbing errors into
    /// [`ClassDescriptor::Invalid`].
    pub fn from_parse<T: Into<ClassDescriptor>>(address: u64, result: Result<T>) -> Self {
        match result {
            Ok(data) => data.into(),
            Err(error) => {
                log::debug!("rejected class candidate at 0x{address:x}: {error}");
                ClassDescriptor::Invalid
            }
        }
    }

    /// `true` unless this is [`ClassDescriptor::Invalid`].
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !matches!(self, ClassDescriptor::Invalid)
    }

    /// `true` for descriptors decoded from a tagged reference.
    #[must_use]
    pub fn is_tagged(&self) -> bool {
        matches!(self, ClassDescriptor::Tagged(_))
    }

    /// The class name, or `None` for an invalid descriptor.
    #[must_use]
    pub fn class_name(&self) -> Option<&str> {
        match self {
            ClassDescriptor::V1(data) => Some(&data.name),
            ClassDescriptor::V2(data) => Some(&data.name),
            ClassDescriptor::Tagged(data) => Some(&data.name),
            ClassDescriptor::Invalid => None,
        }
    }

    /// `true` if this is a runtime-injected key-value observing subclass.
    ///
    /// Only the standard implementation technique (a subclass with a well-known prefix) is
    /// recognised.
    #[must_use]
    pub fn is_kvo(&self) -> bool {
        match self {
            ClassDescriptor::V1(_) | ClassDescriptor::V2(_) => self
                .class_name()
                .is_some_and(|name| name.starts_with(KVO_PREFIX)),
            ClassDescriptor::Tagged(_) | ClassDescriptor::Invalid => false,
        }
    }

    /// Instance size in bytes.
    ///
    /// With `aligned`, the size is rounded up to the next multiple of 8 (64-bit) or 4 (32-bit)
    /// and wrapped to 32 bits. Tagged values report one pointer. `None` for invalid descriptors.
    #[must_use]
    pub fn instance_size(&self, aligned: bool) -> Option<u64> {
        let (size, width) = match self {
            ClassDescriptor::V1(data) => (data.instance_size, data.pointer_width),
            ClassDescriptor::V2(data) => (data.instance_size, data.pointer_width),
            ClassDescriptor::Tagged(data) => return Some(data.instance_size()),
            ClassDescriptor::Invalid => return None,
        };

        Some(if aligned {
            align_instance_size(size, width)
        } else {
            size
        })
    }

    /// Address of the class structure. `None` for tagged and invalid descriptors.
    #[must_use]
    pub fn address(&self) -> Option<u64> {
        match self {
            ClassDescriptor::V1(data) => Some(data.address),
            ClassDescriptor::V2(data) => Some(data.address),
            ClassDescriptor::Tagged(_) | ClassDescriptor::Invalid => None,
        }
    }

    /// Raw superclass pointer; zero at the root of a hierarchy.
    ///
    /// `None` for tagged and invalid descriptors, which have no chain to follow.
    #[must_use]
    pub fn superclass_address(&self) -> Option<u64> {
        match self {
            ClassDescriptor::V1(data) => Some(data.superclass),
            ClassDescriptor::V2(data) => Some(data.superclass),
            ClassDescriptor::Tagged(_) | ClassDescriptor::Invalid => None,
        }
    }

    /// `true` if the class structure describes a metaclass.
    #[must_use]
    pub fn is_metaclass(&self) -> bool {
        match self {
            ClassDescriptor::V1(data) => data.is_metaclass(),
            ClassDescriptor::V2(data) => data.is_metaclass(),
            ClassDescriptor::Tagged(_) | ClassDescriptor::Invalid => false,
        }
    }
}

impl From<ClassDataV1> for ClassDescriptor {
    fn from(data: ClassDataV1) -> Self {
        ClassDescriptor::V1(Arc::new(data))
    }
}

impl From<ClassDataV2> for ClassDescriptor {
    fn from(data: ClassDataV2) -> Self {
        ClassDescriptor::V2(Arc::new(data))
    }
}

impl From<TaggedClass> for ClassDescriptor {
    fn from(data: TaggedClass) -> Self {
        ClassDescriptor::Tagged(Arc::new(data))
    }
}

/// Rounds an instance size up to pointer alignment, wrapping to 32 bits.
#[must_use]
pub fn align_instance_size(size: u64, width: PointerWidth) -> u64 {
    let mask = width.bytes() - 1;
    (size.wrapping_add(mask) & !mask) & 0xFFFF_FFFF
}

/// Reads and validates a class name.
///
/// # Errors
///
/// [`Error::AbsentMemory`] if nothing could be read, [`Error::CorruptIdentifier`] if the bytes
/// are not an identifier.
pub(crate) fn read_class_name(
    memory: &dyn MemoryView,
    address: u64,
    max_len: usize,
) -> Result<String> {
    if address == 0 {
        return Err(Error::AbsentMemory { address });
    }

    let bytes = memory.read_c_string(address, max_len)?;
    if !is_valid_identifier(&bytes) {
        return Err(Error::CorruptIdentifier { address });
    }
    String::from_utf8(bytes).map_err(|_| Error::CorruptIdentifier { address })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemorySnapshot, ProcessId};

    #[test]
    fn alignment() {
        assert_eq!(align_instance_size(0, PointerWidth::Eight), 0);
        assert_eq!(align_instance_size(1, PointerWidth::Eight), 8);
        assert_eq!(align_instance_size(17, PointerWidth::Eight), 24);
        assert_eq!(align_instance_size(24, PointerWidth::Eight), 24);
        assert_eq!(align_instance_size(5, PointerWidth::Four), 8);
        assert_eq!(align_instance_size(12, PointerWidth::Four), 12);
        assert_eq!(align_instance_size(0xFFFF_FFFF, PointerWidth::Eight), 0);
    }

    #[test]
    fn invalid_answers_nothing() {
        let invalid = ClassDescriptor::Invalid;
        assert!(!invalid.is_valid());
        assert!(!invalid.is_tagged());
        assert!(!invalid.is_kvo());
        assert!(!invalid.is_metaclass());
        assert_eq!(invalid.class_name(), None);
        assert_eq!(invalid.instance_size(true), None);
        assert_eq!(invalid.address(), None);
        assert_eq!(invalid.superclass_address(), None);
        assert_eq!(ClassDescriptor::default(), ClassDescriptor::Invalid);
    }

    #[test]
    fn tagged_variant() {
        let descriptor = ClassDescriptor::from(TaggedClass {
            raw: TaggedClass::encode(1, 3, 0),
            payload: 1,
            class_bits: 3,
            info_bits: 0,
            name: "NSNumber".to_string(),
            pointer_width: PointerWidth::Eight,
        });
        assert!(descriptor.is_valid());
        assert!(descriptor.is_tagged());
        assert!(!descriptor.is_kvo());
        assert_eq!(descriptor.class_name(), Some("NSNumber"));
        assert_eq!(descriptor.instance_size(false), Some(8));
        assert_eq!(descriptor.instance_size(true), Some(8));
        assert_eq!(descriptor.superclass_address(), None);
    }

    #[test]
    fn from_parse_absorbs_errors() {
        let result: Result<ClassDataV2> = Err(Error::UnknownRuntimeGeneration);
        assert_eq!(
            ClassDescriptor::from_parse(0x1000, result),
            ClassDescriptor::Invalid
        );
    }

    #[test]
    fn class_names() {
        let mut snapshot = MemorySnapshot::new(ProcessId::new(1), PointerWidth::Eight);
        snapshot.map_zeroed(0x1000, 0x100);
        snapshot.write_bytes(0x1000, b"NSObject\0").unwrap();
        snapshot.write_bytes(0x1010, b"bad name\0").unwrap();

        assert_eq!(read_class_name(&snapshot, 0x1000, 128).unwrap(), "NSObject");
        assert_eq!(read_class_name(&snapshot, 0x1000, 2).unwrap(), "NS");
        assert_eq!(
            read_class_name(&snapshot, 0x1010, 128),
            Err(Error::CorruptIdentifier { address: 0x1010 })
        );
        assert_eq!(
            read_class_name(&snapshot, 0, 128),
            Err(Error::AbsentMemory { address: 0 })
        );
        assert!(read_class_name(&snapshot, 0x9000, 128).is_err());
    }
}
