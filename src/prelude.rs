//! # objscope Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the objscope library. Import this module to get quick access to everything needed to
//! resolve object references in an inspected process.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all objscope operations
pub use crate::Error;

/// The result type used throughout objscope
pub use crate::Result;

/// Configuration for a resolution session
pub use crate::IntrospectorConfig;

// ================================================================================================
// Memory Access
// ================================================================================================

/// Host memory access and its captured-memory implementation
pub use crate::memory::{ByteOrder, MemorySnapshot, MemoryView, ModuleInfo, PointerWidth, ProcessId};

/// Cursor over a remote structure
pub use crate::memory::StructReader;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Session lifecycle and class resolution
pub use crate::runtime::{ClassResolver, ObjectReference, RuntimeIntrospector, Session};

/// Detected per-process facts
pub use crate::runtime::{RuntimeGeneration, SystemParameters};

// ================================================================================================
// Resolved Classes
// ================================================================================================

/// The resolved class sum type and its payloads
pub use crate::runtime::{
    ClassDataV1, ClassDataV2, ClassDescriptor, ClassInfoFlags, ClassRoFlags, ReferenceKind,
};

/// Tagged reference decoding
pub use crate::runtime::{TaggedClass, TaggedClassTable, TaggedValueDecoder};

// ================================================================================================
// Summaries
// ================================================================================================

/// Dictionary count summaries and outcome statistics
pub use crate::summary::{
    DictionaryFlavor, DictionaryKind, DictionarySummary, SummaryMetric, SummaryStatistics,
};
