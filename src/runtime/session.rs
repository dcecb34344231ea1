//! Inspection session and the cache-aware class resolver.
//!
//! A [`Session`] is the context object owning all process-scoped mutable state: the
//! configuration, the detected-facts cache and the class resolution cache. Its lifecycle
//! follows the host's attach / detach events. A [`ClassResolver`] is a short-lived borrow of a
//! session bound to one [`MemoryView`] and the [`SystemParameters`] of that process; every
//! class lookup goes through it.
//!
//! # Example
//!
//! ```rust
//! use objscope::{IntrospectorConfig, MemorySnapshot, ModuleInfo, PointerWidth, ProcessId, Session};
//!
//! let mut memory = MemorySnapshot::new(ProcessId::new(7), PointerWidth::Eight);
//! memory.add_module(ModuleInfo::new("libobjc.A.dylib"));
//!
//! let session = Session::new(IntrospectorConfig::default());
//! let resolver = session.resolver(&memory)?;
//! assert!(resolver.params().is_64_bit());
//!
//! // Nothing is mapped, so the candidate class can not be resolved.
//! assert!(!resolver.resolve_class(0x1000).is_valid());
//! # Ok::<(), objscope::Error>(())
//! ```

use crate::{
    config::IntrospectorConfig,
    memory::{MemoryView, ProcessId},
    runtime::{
        cache::{ClassResolutionCache, ProcessFactsCache},
        detect_legacy_os, detect_runtime_generation, ClassDataV1, ClassDataV2, ClassDescriptor,
        ObjectReference, RuntimeGeneration, RuntimeIntrospector, SystemParameters,
        TaggedValueDecoder,
    },
    Result,
};

/// Process-scoped inspection state.
#[derive(Debug, Default)]
pub struct Session {
    config: IntrospectorConfig,
    classes: ClassResolutionCache,
    facts: ProcessFactsCache,
}

impl Session {
    /// Creates a session with empty caches.
    #[must_use]
    pub fn new(config: IntrospectorConfig) -> Self {
        Session {
            config,
            classes: ClassResolutionCache::new(),
            facts: ProcessFactsCache::new(),
        }
    }

    /// The session configuration.
    #[must_use]
    pub fn config(&self) -> &IntrospectorConfig {
        &self.config
    }

    /// The class resolution cache.
    #[must_use]
    pub fn cache(&self) -> &ClassResolutionCache {
        &self.classes
    }

    /// Starts inspecting `process`.
    ///
    /// Host process identifiers get reused; anything still cached under this identity belongs
    /// to a previous process and is dropped.
    pub fn attach(&self, process: ProcessId) {
        self.detach(process);
    }

    /// Stops inspecting `process` and drops everything cached for it.
    pub fn detach(&self, process: ProcessId) {
        self.facts.purge_process(process);
        let removed = self.classes.purge_process(process);
        log::debug!("dropped {removed} cached classes for {process}");
    }

    /// Drops everything cached for every process.
    pub fn clear(&self) {
        self.facts.clear();
        self.classes.clear();
    }

    /// Collects the [`SystemParameters`] of the process behind `memory`.
    ///
    /// Runtime generation and OS class are detected once per process and memoized. When the
    /// runtime library is missing, the configured fallback generation is memoized in its place
    /// until [`Session::modules_loaded`] finds the library.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnknownRuntimeGeneration`] if the runtime library is not loaded
    /// and the configuration has no fallback generation.
    pub fn system_parameters(&self, memory: &dyn MemoryView) -> Result<SystemParameters> {
        let process = memory.process_id();

        let generation = self
            .facts
            .generation(process, self.config.fallback_generation, || {
                detect_runtime_generation(memory, &self.config)
            })?;
        let is_legacy_os = self
            .facts
            .legacy_os(process, || detect_legacy_os(memory, &self.config));

        Ok(SystemParameters {
            process,
            pointer_width: memory.pointer_width(),
            byte_order: memory.byte_order(),
            generation,
            is_legacy_os,
        })
    }

    /// Tells the session that new modules were loaded into the process behind `memory`.
    ///
    /// If the runtime generation of that process was only assumed, detection runs again. Should
    /// the detected generation differ from the assumption, every class cached for the process
    /// was parsed with the wrong layout and is dropped. Returns `true` in that case.
    ///
    /// Resolvers created before this call keep the parameters they were bound with.
    pub fn modules_loaded(&self, memory: &dyn MemoryView) -> bool {
        let process = memory.process_id();
        let changed = self.facts.confirm_assumed(process, || {
            detect_runtime_generation(memory, &self.config)
        });

        if changed {
            let removed = self.classes.purge_process(process);
            log::debug!("dropped {removed} classes parsed with the assumed runtime for {process}");
        }
        changed
    }

    /// Binds the session to one process.
    ///
    /// # Errors
    ///
    /// See [`Session::system_parameters`].
    pub fn resolver<'a>(&'a self, memory: &'a dyn MemoryView) -> Result<ClassResolver<'a>> {
        let params = self.system_parameters(memory)?;
        Ok(ClassResolver {
            session: self,
            memory,
            params,
        })
    }

    /// Starts introspecting one object reference.
    ///
    /// # Errors
    ///
    /// See [`Session::system_parameters`].
    pub fn introspect<'a>(
        &'a self,
        reference: ObjectReference<'a>,
    ) -> Result<RuntimeIntrospector<'a>> {
        Ok(RuntimeIntrospector::new(
            self.resolver(reference.memory)?,
            reference.value,
        ))
    }

    /// Resolves the class of one object reference.
    ///
    /// Every failure, including an undetectable runtime, yields [`ClassDescriptor::Invalid`].
    #[must_use]
    pub fn resolve(&self, reference: ObjectReference<'_>) -> ClassDescriptor {
        match self.introspect(reference) {
            Ok(introspector) => introspector.read_class_data(),
            Err(error) => {
                log::debug!("can not resolve 0x{:x}: {error}", reference.value);
                ClassDescriptor::Invalid
            }
        }
    }
}

/// A [`Session`] bound to one process.
#[derive(Clone, Copy)]
pub struct ClassResolver<'a> {
    session: &'a Session,
    memory: &'a dyn MemoryView,
    params: SystemParameters,
}

impl<'a> ClassResolver<'a> {
    /// Facts about the bound process.
    #[must_use]
    pub fn params(&self) -> &SystemParameters {
        &self.params
    }

    /// Memory of the bound process.
    #[must_use]
    pub fn memory(&self) -> &'a dyn MemoryView {
        self.memory
    }

    /// The session this resolver belongs to.
    #[must_use]
    pub fn session(&self) -> &'a Session {
        self.session
    }

    /// Resolves the class structure at `address`.
    ///
    /// Served from the cache when possible. On a miss the structure is parsed with the layout
    /// of the detected runtime generation, and a valid result is cached.
    #[must_use]
    pub fn resolve_class(&self, address: u64) -> ClassDescriptor {
        let process = self.params.process;
        if let Some(cached) = self.session.classes.get(process, address) {
            return cached;
        }

        let config = &self.session.config;
        let descriptor = match self.params.generation {
            RuntimeGeneration::V1 => ClassDescriptor::from_parse(
                address,
                ClassDataV1::parse(self.memory, &self.params, config, address),
            ),
            RuntimeGeneration::V2 => ClassDescriptor::from_parse(
                address,
                ClassDataV2::parse(self.memory, &self.params, config, address),
            ),
        };

        self.session.classes.insert(process, address, &descriptor);
        descriptor
    }

    /// Decodes a tagged reference with the table matching the process' OS class.
    #[must_use]
    pub fn decode_tagged(&self, value: u64) -> ClassDescriptor {
        let decoder = TaggedValueDecoder::for_process(&self.session.config, &self.params);
        ClassDescriptor::from_parse(value, decoder.decode(value))
    }

    /// The superclass of `descriptor`.
    ///
    /// Invalid for root classes, tagged and invalid descriptors.
    #[must_use]
    pub fn superclass(&self, descriptor: &ClassDescriptor) -> ClassDescriptor {
        match descriptor.superclass_address() {
            Some(address) if address != 0 => self.resolve_class(address),
            _ => ClassDescriptor::Invalid,
        }
    }

    /// Replaces a key-value observing subclass by the class it was injected over.
    ///
    /// Exactly one layer is removed; any other descriptor is returned unchanged.
    #[must_use]
    pub fn skip_kvo(&self, descriptor: ClassDescriptor) -> ClassDescriptor {
        if descriptor.is_kvo() {
            self.superclass(&descriptor)
        } else {
            descriptor
        }
    }

    /// Iterates over the superclasses of `descriptor`, nearest first.
    ///
    /// Stops at the first invalid descriptor (the root's superclass included) or after
    /// [`IntrospectorConfig::max_hierarchy_depth`] steps.
    #[must_use]
    pub fn ancestors(&self, descriptor: &ClassDescriptor) -> Ancestors<'a> {
        Ancestors {
            resolver: *self,
            current: descriptor.clone(),
            remaining: self.session.config.max_hierarchy_depth,
        }
    }
}

/// Iterator returned by [`ClassResolver::ancestors`].
pub struct Ancestors<'a> {
    resolver: ClassResolver<'a>,
    current: ClassDescriptor,
    remaining: usize,
}

impl Iterator for Ancestors<'_> {
    type Item = ClassDescriptor;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let parent = self.resolver.superclass(&self.current);
        if !parent.is_valid() {
            self.remaining = 0;
            return None;
        }

        self.current = parent.clone();
        Some(parent)
    }
}
