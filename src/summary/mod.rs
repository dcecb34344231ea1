//! Consumers of class resolution.
//!
//! Summary providers turn a resolved class into a one-line description of an object. They
//! dispatch on the class name, so they only ever see classes that passed every validation
//! step of [`crate::runtime`].
//!
//! # Key Components
//!
//! - [`dictionary`] - Element count of the system dictionary classes
//! - [`statistics`] - Per-outcome counters shared by providers

/// Dictionary count summaries
pub mod dictionary;
/// Outcome counters
pub mod statistics;

pub use dictionary::{DictionaryFlavor, DictionaryKind, DictionarySummary};
pub use statistics::{SummaryMetric, SummaryStatistics};
