//! Process-scoped caches for resolved classes and detected process facts.
//!
//! Class resolution runs for every displayed object, and most objects share a handful of
//! classes. [`ClassResolutionCache`] maps a class-structure address to its resolved
//! [`ClassDescriptor`] so that a class is parsed once per process. [`ProcessFactsCache`]
//! memoizes the runtime generation and OS class, which require walking the module list.
//!
//! # Keys
//!
//! Every entry is keyed by [`ProcessId`] composed with the class address, so sessions that
//! inspect several processes never mix them up. Entries are never evicted individually;
//! [`crate::Session::detach`] drops everything belonging to one process.
//!
//! # Thread Safety
//!
//! Both caches are backed by [`DashMap`] and may be shared between threads. Insertion is a
//! plain overwrite; two threads resolving the same class concurrently store equal values.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::{
    memory::ProcessId,
    runtime::{ClassDescriptor, RuntimeGeneration},
    Result,
};

/// Cache of resolved class descriptors keyed by process and class-structure address.
#[derive(Debug, Default)]
pub struct ClassResolutionCache {
    classes: DashMap<(ProcessId, u64), ClassDescriptor>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ClassResolutionCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the class at `address` in `process`, counting the hit or miss.
    #[must_use]
    pub fn get(&self, process: ProcessId, address: u64) -> Option<ClassDescriptor> {
        match self.classes.get(&(process, address)) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                log::trace!("class cache hit for 0x{address:x} ({process})");
                Some(entry.value().clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                log::trace!("class cache miss for 0x{address:x} ({process})");
                None
            }
        }
    }

    /// Stores a descriptor, replacing any previous entry for the key.
    ///
    /// Invalid descriptors are never stored; a later attempt may find the memory in a sane
    /// state. Returns `true` if the descriptor was stored.
    pub fn insert(&self, process: ProcessId, address: u64, descriptor: &ClassDescriptor) -> bool {
        if !descriptor.is_valid() {
            return false;
        }

        self.classes.insert((process, address), descriptor.clone());
        true
    }

    /// Removes every entry belonging to `process`. Returns the number removed.
    pub fn purge_process(&self, process: ProcessId) -> usize {
        let before = self.classes.len();
        self.classes.retain(|(owner, _), _| *owner != process);
        before.saturating_sub(self.classes.len())
    }

    /// Removes every entry and resets the counters.
    pub fn clear(&self) {
        self.classes.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Number of cached classes across all processes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Number of lookups answered from the cache.
    #[must_use]
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Number of lookups that had to parse memory.
    #[must_use]
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

/// How a memoized runtime generation was arrived at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum GenerationFact {
    /// Found by inspecting the runtime library
    Detected(RuntimeGeneration),
    /// The configured fallback, used while the runtime library is not loaded
    Assumed(RuntimeGeneration),
}

impl GenerationFact {
    fn generation(self) -> RuntimeGeneration {
        match self {
            GenerationFact::Detected(generation) | GenerationFact::Assumed(generation) => {
                generation
            }
        }
    }
}

/// Memoized per-process runtime generation and OS class.
#[derive(Debug, Default)]
pub struct ProcessFactsCache {
    generations: DashMap<ProcessId, GenerationFact>,
    legacy_os: DashMap<ProcessId, bool>,
}

impl ProcessFactsCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached generation of `process`, running `detect` on a miss.
    ///
    /// When detection fails and a `fallback` is given, the fallback is memoized as an assumed
    /// generation. [`ProcessFactsCache::confirm_assumed`] replaces it once the runtime library
    /// shows up. Without a fallback nothing is stored, so the next call detects again.
    ///
    /// # Errors
    ///
    /// Propagates the error returned by `detect` when there is no fallback.
    pub fn generation(
        &self,
        process: ProcessId,
        fallback: Option<RuntimeGeneration>,
        detect: impl FnOnce() -> Result<RuntimeGeneration>,
    ) -> Result<RuntimeGeneration> {
        if let Some(fact) = self.generations.get(&process) {
            return Ok(fact.generation());
        }

        let fact = match (detect(), fallback) {
            (Ok(generation), _) => {
                log::debug!("detected runtime {generation} for {process}");
                GenerationFact::Detected(generation)
            }
            (Err(error), Some(generation)) => {
                log::warn!("{error} for {process}, assuming runtime {generation}");
                GenerationFact::Assumed(generation)
            }
            (Err(error), None) => return Err(error),
        };
        self.generations.insert(process, fact);
        Ok(fact.generation())
    }

    /// `true` if the generation of `process` is a memoized fallback.
    #[must_use]
    pub fn is_assumed(&self, process: ProcessId) -> bool {
        self.generations
            .get(&process)
            .is_some_and(|fact| matches!(*fact, GenerationFact::Assumed(_)))
    }

    /// Runs `detect` again for a process whose generation is an assumed fallback.
    ///
    /// A successful detection replaces the assumption. Returns `true` when the detected
    /// generation differs from the assumed one, meaning everything parsed for `process` so far
    /// used the wrong layout. Detected generations are left alone.
    pub fn confirm_assumed(
        &self,
        process: ProcessId,
        detect: impl FnOnce() -> Result<RuntimeGeneration>,
    ) -> bool {
        let Some(GenerationFact::Assumed(assumed)) =
            self.generations.get(&process).map(|fact| *fact)
        else {
            return false;
        };
        let Ok(detected) = detect() else {
            return false;
        };

        log::debug!("detected runtime {detected} for {process}, was assuming {assumed}");
        self.generations
            .insert(process, GenerationFact::Detected(detected));
        detected != assumed
    }

    /// Returns the cached OS class of `process`, running `detect` on a miss.
    pub fn legacy_os(&self, process: ProcessId, detect: impl FnOnce() -> bool) -> bool {
        if let Some(is_legacy) = self.legacy_os.get(&process) {
            return *is_legacy;
        }

        let is_legacy = detect();
        log::debug!("detected legacy OS = {is_legacy} for {process}");
        self.legacy_os.insert(process, is_legacy);
        is_legacy
    }

    /// Forgets everything known about `process`.
    pub fn purge_process(&self, process: ProcessId) {
        self.generations.remove(&process);
        self.legacy_os.remove(&process);
    }

    /// Forgets everything.
    pub fn clear(&self) {
        self.generations.clear();
        self.legacy_os.clear();
    }
}
