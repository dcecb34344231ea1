//! Per-object entry point of class resolution.
//!
//! A [`RuntimeIntrospector`] is created for one object reference. It classifies the value
//! (tagged, heap pointer or garbage), follows the isa pointer of heap objects and hands the
//! class address to the session's [`ClassResolver`]. The resolved descriptor is memoized for
//! the lifetime of the introspector.

use std::cell::OnceCell;

use strum::Display;

use crate::{
    memory::MemoryView,
    runtime::{
        pointer::is_valid_pointer, ClassDescriptor, ClassResolver, RuntimeGeneration,
        SystemParameters,
    },
    Result,
};

/// Isa value the allocator writes into freed objects.
const FREED_OBJECT_ISA: u64 = 1;

/// An opaque handle to one value in the inspected process, as supplied by the host.
#[derive(Clone, Copy)]
pub struct ObjectReference<'a> {
    /// Memory of the process the value lives in
    pub memory: &'a dyn MemoryView,
    /// The reference's unsigned integer value
    pub value: u64,
}

impl<'a> ObjectReference<'a> {
    /// Wraps a raw value read from `memory`'s process.
    #[must_use]
    pub fn new(memory: &'a dyn MemoryView, value: u64) -> Self {
        ObjectReference { memory, value }
    }
}

/// Coarse classification of a reference value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum ReferenceKind {
    /// An odd value packing payload and class index
    #[strum(serialize = "tagged")]
    Tagged,
    /// An aligned, non-null address
    #[strum(serialize = "heap")]
    Heap,
    /// Null or misaligned
    #[strum(serialize = "invalid")]
    Invalid,
}

/// Resolves the class of a single object reference.
pub struct RuntimeIntrospector<'a> {
    resolver: ClassResolver<'a>,
    value: u64,
    resolved: OnceCell<ClassDescriptor>,
}

impl<'a> RuntimeIntrospector<'a> {
    /// Creates an introspector for `value` in the resolver's process.
    #[must_use]
    pub fn new(resolver: ClassResolver<'a>, value: u64) -> Self {
        RuntimeIntrospector {
            resolver,
            value,
            resolved: OnceCell::new(),
        }
    }

    /// The raw reference value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.value
    }

    /// Facts about the process the reference lives in.
    #[must_use]
    pub fn params(&self) -> &SystemParameters {
        self.resolver.params()
    }

    /// The resolver this introspector delegates class lookups to.
    #[must_use]
    pub fn resolver(&self) -> &ClassResolver<'a> {
        &self.resolver
    }

    /// `true` if the value is a tagged reference rather than an address.
    #[must_use]
    pub fn is_tagged(&self) -> bool {
        let width = self.resolver.params().pointer_width;
        is_valid_pointer(self.value, width, true, false)
            && !is_valid_pointer(self.value, width, false, false)
    }

    /// `true` if the value is either tagged or a plausible heap address.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        is_valid_pointer(self.value, self.resolver.params().pointer_width, true, false)
    }

    /// Classifies the value.
    #[must_use]
    pub fn kind(&self) -> ReferenceKind {
        if !self.is_valid() {
            ReferenceKind::Invalid
        } else if self.is_tagged() {
            ReferenceKind::Tagged
        } else {
            ReferenceKind::Heap
        }
    }

    /// Reads the isa pointer at the start of the object.
    ///
    /// # Errors
    ///
    /// Fails if the object is unreadable or its isa is the freed-object marker.
    pub fn read_isa(&self) -> Result<u64> {
        let isa = self.resolver.memory().read_pointer(self.value)?;
        if isa == FREED_OBJECT_ISA {
            return Err(malformed_error!(
                "Object at 0x{:x} has been freed",
                self.value
            ));
        }
        Ok(isa)
    }

    /// Resolves the class of the referenced object.
    ///
    /// Never fails; anything that can not be trusted yields [`ClassDescriptor::Invalid`]. The
    /// result is computed once per introspector.
    pub fn read_class_data(&self) -> ClassDescriptor {
        self.resolved.get_or_init(|| self.resolve()).clone()
    }

    fn resolve(&self) -> ClassDescriptor {
        if self.is_tagged() {
            return match self.resolver.params().generation {
                RuntimeGeneration::V2 => self.resolver.decode_tagged(self.value),
                RuntimeGeneration::V1 => {
                    log::debug!(
                        "tagged value 0x{:x} in a process without tagged references",
                        self.value
                    );
                    ClassDescriptor::Invalid
                }
            };
        }
        if !self.is_valid() {
            log::debug!("0x{:x} is not an object reference", self.value);
            return ClassDescriptor::Invalid;
        }

        match self.read_isa() {
            Ok(isa) => self.resolver.resolve_class(isa),
            Err(error) => {
                log::debug!("can not read isa of 0x{:x}: {error}", self.value);
                ClassDescriptor::Invalid
            }
        }
    }
}
