//! Outcome counters for summary providers.

use std::sync::atomic::{AtomicU64, Ordering};

use strum::{Display, EnumCount, EnumIter, IntoEnumIterator};

/// Outcome of one summary attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter, EnumCount)]
pub enum SummaryMetric {
    /// The reference was neither tagged nor a plausible address
    #[strum(serialize = "invalid_pointer")]
    InvalidPointer,
    /// The object's class could not be resolved
    #[strum(serialize = "invalid_isa")]
    InvalidIsa,
    /// The class resolved, but has no known layout
    #[strum(serialize = "unknown_class")]
    UnknownClass,
    /// The class resolved to a known layout
    #[strum(serialize = "known_class")]
    KnownClass,
}

impl SummaryMetric {
    fn index(self) -> usize {
        self as usize
    }
}

/// Thread-safe counters, one per [`SummaryMetric`].
#[derive(Debug, Default)]
pub struct SummaryStatistics {
    counters: [AtomicU64; SummaryMetric::COUNT],
}

impl SummaryStatistics {
    /// Creates a set of zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one occurrence of `metric`.
    pub fn hit(&self, metric: SummaryMetric) {
        self.counters[metric.index()].fetch_add(1, Ordering::Relaxed);
    }

    /// Occurrences of `metric` so far.
    #[must_use]
    pub fn count(&self, metric: SummaryMetric) -> u64 {
        self.counters[metric.index()].load(Ordering::Relaxed)
    }

    /// Every metric with its current count.
    pub fn iter(&self) -> impl Iterator<Item = (SummaryMetric, u64)> + '_ {
        SummaryMetric::iter().map(|metric| (metric, self.count(metric)))
    }

    /// Resets every counter to zero.
    pub fn reset(&self) {
        for counter in &self.counters {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
