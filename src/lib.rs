// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # objscope
//!
//! Object runtime introspection for debuggers and memory analysis tools.
//!
//! Given a raw reference value read from another process, `objscope` answers the question
//! "which class is this object, and how large is it?". It understands both generations of the
//! object runtime ABI (the flat legacy class layout and the modern class / read-write /
//! read-only indirection), decodes tagged references, recognises runtime-injected key-value
//! observing subclasses and memoizes everything it resolves per process.
//!
//! Inspected memory is never trusted. Every pointer is checked for alignment and plausibility
//! before it is followed and every class name must look like an identifier. Anything that
//! fails a check resolves to [`ClassDescriptor::Invalid`]; no error ever escapes a resolution
//! call and no garbage value is ever reported as a class.
//!
//! ## Quick Start
//!
//! The host supplies memory access by implementing [`MemoryView`]. The crate ships
//! [`MemorySnapshot`], an implementation over captured memory regions:
//!
//! ```rust
//! use objscope::prelude::*;
//!
//! let mut memory = MemorySnapshot::new(ProcessId::new(812), PointerWidth::Eight);
//! memory.add_module(ModuleInfo::new("libobjc.A.dylib"));
//! memory.add_module(ModuleInfo::new("Foundation").with_version(&[1056, 13]));
//!
//! let session = Session::new(IntrospectorConfig::default());
//!
//! // A tagged reference encodes its class in the low bits.
//! let number = session.resolve(ObjectReference::new(&memory, TaggedClass::encode(42, 3, 0)));
//! assert_eq!(number.class_name(), Some("NSNumber"));
//!
//! // Unmapped memory is never reported as a class.
//! let garbage = session.resolve(ObjectReference::new(&memory, 0xdead_bee0));
//! assert!(!garbage.is_valid());
//! ```
//!
//! ## Architecture
//!
//! - [`memory`] - The [`MemoryView`] abstraction, [`MemorySnapshot`] and byte-level helpers
//! - [`runtime`] - Pointer validation, class layouts, tagged references, caching and the
//!   [`Session`] / [`ClassResolver`] / [`RuntimeIntrospector`] entry points
//! - [`summary`] - Consumers of resolution, e.g. dictionary element counts
//! - [`IntrospectorConfig`] - Detection inputs, tagged-class tables and fallback policy
//! - [`Error`] and [`Result`] - Reasons a piece of memory could not be trusted
//!
//! ## Process Lifecycle
//!
//! A [`Session`] keeps per-process caches keyed by [`ProcessId`]. Call
//! [`Session::attach`] when the host attaches to a process and [`Session::detach`] when it
//! goes away; both drop whatever was cached for that identity.
//!
//! ## Logging
//!
//! Diagnostics go through the [`log`] facade: rejected class candidates at `debug`, cache
//! traffic at `trace` and fallback decisions at `warn`. Install any logger to see them.
//!
//! ## Fuzzing
//!
//! ```bash
//! cargo +nightly fuzz run resolve --release
//! ```

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use objscope::prelude::*;
///
/// let memory = MemorySnapshot::new(ProcessId::new(1), PointerWidth::Four);
/// let session = Session::new(IntrospectorConfig::lenient());
/// let resolver = session.resolver(&memory)?;
/// assert_eq!(resolver.params().generation, RuntimeGeneration::V2);
/// # Ok::<(), objscope::Error>(())
/// ```
pub mod prelude;

/// Introspection configuration
pub mod config;
/// Access to the memory of an inspected process
pub mod memory;
/// Object runtime class resolution
pub mod runtime;
/// Summary providers built on class resolution
pub mod summary;

/// `objscope` Result type
pub type Result<T> = std::result::Result<T, Error>;

pub use config::IntrospectorConfig;
pub use error::Error;
pub use memory::{
    ByteOrder, MemorySnapshot, MemoryView, ModuleInfo, PointerWidth, ProcessId, StructReader,
};
pub use runtime::{
    ClassDescriptor, ClassResolver, ObjectReference, RuntimeIntrospector, Session,
};
