//! Object runtime introspection.
//!
//! This module turns raw reference values from an inspected process into
//! [`ClassDescriptor`]s. It is layered bottom-up:
//!
//! # Key Components
//!
//! - [`pointer`] - Pure plausibility checks applied to every followed link
//! - [`params`] - Per-process facts ([`SystemParameters`]) and their detection
//! - [`tagged`] - Tagged-reference bit layout and the pluggable class tables
//! - [`descriptor`] - Legacy and modern class layouts and the [`ClassDescriptor`] sum type
//! - [`cache`] - Process-scoped caches for resolved classes and detected facts
//! - [`session`] - [`Session`] lifecycle and the cache-aware [`ClassResolver`]
//! - [`introspector`] - Per-object entry point, [`RuntimeIntrospector`]
//!
//! # Examples
//!
//! ```rust
//! use objscope::{
//!     runtime::TaggedClass, ModuleInfo, MemorySnapshot, ObjectReference, PointerWidth,
//!     ProcessId, Session,
//! };
//!
//! let mut memory = MemorySnapshot::new(ProcessId::new(42), PointerWidth::Eight);
//! memory.add_module(ModuleInfo::new("libobjc.A.dylib"));
//! memory.add_module(ModuleInfo::new("Foundation").with_version(&[1056, 13]));
//!
//! let session = Session::default();
//! let number = TaggedClass::encode(7, 3, 0);
//! let class = session.resolve(ObjectReference::new(&memory, number));
//! assert_eq!(class.class_name(), Some("NSNumber"));
//! ```

/// Process-scoped caches
pub mod cache;
/// Class layouts and the resolved class sum type
pub mod descriptor;
/// Per-object class resolution
pub mod introspector;
/// Detected per-process facts
pub mod params;
/// Pointer and identifier validation
pub mod pointer;
/// Session lifecycle and class resolution
pub mod session;
/// Tagged reference decoding
pub mod tagged;

pub use cache::{ClassResolutionCache, ProcessFactsCache};
pub use descriptor::{
    align_instance_size, ClassDataV1, ClassDataV2, ClassDescriptor, ClassInfoFlags, ClassRoFlags,
    KVO_PREFIX,
};
pub use introspector::{ObjectReference, ReferenceKind, RuntimeIntrospector};
pub use params::{detect_legacy_os, detect_runtime_generation, RuntimeGeneration, SystemParameters};
pub use session::{Ancestors, ClassResolver, Session};
pub use tagged::{TaggedClass, TaggedClassTable, TaggedValueDecoder};
