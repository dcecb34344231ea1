//! Per-process facts the resolution engine depends on.
//!
//! [`SystemParameters`] bundles pointer width, byte order, the detected runtime generation and
//! the OS class. The two detected facts are expensive (they walk the module list) and are
//! memoized per [`ProcessId`] by [`crate::Session`]; the detection routines themselves live
//! here and are stateless.

use strum::{Display, EnumIter};

use crate::{
    config::IntrospectorConfig,
    memory::{ByteOrder, MemoryView, PointerWidth, ProcessId},
    Error, Result,
};

/// Generation of the object runtime ABI loaded in the inspected process.
///
/// The runtime carries no explicit version field. The legacy generation is recognised by a
/// section that only its shared library contains.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum RuntimeGeneration {
    /// Legacy ABI: flat class structures, no tagged references
    #[strum(serialize = "v1")]
    V1,
    /// Modern ABI: class / read-write / read-only indirection, tagged references
    #[strum(serialize = "v2")]
    V2,
}

/// Facts about one inspected process, fixed for the lifetime of an attach.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SystemParameters {
    /// Identity of the process these facts were collected from
    pub process: ProcessId,
    /// Pointer width of the process
    pub pointer_width: PointerWidth,
    /// Byte order of the process
    pub byte_order: ByteOrder,
    /// Detected runtime ABI generation
    pub generation: RuntimeGeneration,
    /// `true` when the OS predates the modern tagged-class encoding
    pub is_legacy_os: bool,
}

impl SystemParameters {
    /// Pointer size in bytes.
    #[must_use]
    pub fn pointer_size(&self) -> u64 {
        self.pointer_width.bytes()
    }

    /// `true` for 64-bit processes.
    #[must_use]
    pub fn is_64_bit(&self) -> bool {
        self.pointer_width.is_64_bit()
    }
}

/// Determine the runtime generation by looking for the legacy-only section in the runtime
/// library.
///
/// # Errors
///
/// Returns [`Error::UnknownRuntimeGeneration`] when the runtime library is not loaded.
pub fn detect_runtime_generation(
    memory: &dyn MemoryView,
    config: &IntrospectorConfig,
) -> Result<RuntimeGeneration> {
    let Some(module) = memory.find_module(&config.runtime_library) else {
        return Err(Error::UnknownRuntimeGeneration);
    };

    if module.has_section(&config.legacy_section) {
        Ok(RuntimeGeneration::V1)
    } else {
        Ok(RuntimeGeneration::V2)
    }
}

/// Classify the OS as legacy from the version of the foundation module.
///
/// Legacy means the first version component is below
/// [`IntrospectorConfig::legacy_os_version_ceiling`]. A missing module or version is treated as
/// a modern OS.
#[must_use]
pub fn detect_legacy_os(memory: &dyn MemoryView, config: &IntrospectorConfig) -> bool {
    memory
        .find_module(&config.foundation_module)
        .and_then(|module| module.version().and_then(|v| v.first().copied()))
        .is_some_and(|major| major < config.legacy_os_version_ceiling)
}
