//! Introspection configuration.
//!
//! [`IntrospectorConfig`] collects every constant the resolution engine would otherwise have to
//! hard-code: module and section names used for feature detection, the bounded string length,
//! the tagged-class tables and the policy for processes whose runtime can not be detected.
//!
//! # Presets
//!
//! - [`IntrospectorConfig::default()`] - Conservative; undetectable runtimes are unresolvable
//! - [`IntrospectorConfig::lenient()`] - Assumes the modern runtime when detection fails
//!
//! # Example
//!
//! ```rust
//! use objscope::{IntrospectorConfig, runtime::{RuntimeGeneration, TaggedClassTable}};
//!
//! let mut modern = TaggedClassTable::modern();
//! modern.insert(2, "NSIndexPath");
//!
//! let config = IntrospectorConfig::default()
//!     .with_fallback_generation(RuntimeGeneration::V2)
//!     .with_modern_tagged_classes(modern);
//! assert_eq!(config.modern_tagged_classes.name(2), Some("NSIndexPath"));
//! ```

use crate::runtime::{RuntimeGeneration, TaggedClassTable};

/// Configuration for a [`crate::Session`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntrospectorConfig {
    /// Upper bound for class name reads, in bytes (default: 128)
    pub max_name_length: usize,

    /// File name of the runtime shared library (default: `libobjc.A.dylib`)
    pub runtime_library: String,

    /// Section only present in the legacy runtime library (default: `__OBJC`)
    pub legacy_section: String,

    /// Module whose version classifies the OS (default: `Foundation`)
    pub foundation_module: String,

    /// Foundation major versions below this value mark a legacy OS (default: 900)
    pub legacy_os_version_ceiling: u32,

    /// Generation assumed when the runtime library can not be found (default: `None`)
    ///
    /// With `None`, resolution against such a process reports nothing rather than guessing.
    pub fallback_generation: Option<RuntimeGeneration>,

    /// Tagged classes on legacy OS releases
    pub legacy_tagged_classes: TaggedClassTable,

    /// Tagged classes on modern OS releases
    pub modern_tagged_classes: TaggedClassTable,

    /// Maximum number of superclass hops followed by [`crate::ClassResolver::ancestors`]
    pub max_hierarchy_depth: usize,
}

impl Default for IntrospectorConfig {
    fn default() -> Self {
        Self {
            max_name_length: 128,
            runtime_library: "libobjc.A.dylib".to_string(),
            legacy_section: "__OBJC".to_string(),
            foundation_module: "Foundation".to_string(),
            legacy_os_version_ceiling: 900,
            fallback_generation: None,
            legacy_tagged_classes: TaggedClassTable::legacy(),
            modern_tagged_classes: TaggedClassTable::modern(),
            max_hierarchy_depth: 64,
        }
    }
}

impl IntrospectorConfig {
    /// Creates a configuration that assumes the modern runtime when detection fails.
    #[must_use]
    pub fn lenient() -> Self {
        Self {
            fallback_generation: Some(RuntimeGeneration::V2),
            ..Self::default()
        }
    }

    /// Sets the generation assumed when the runtime library is missing.
    #[must_use]
    pub fn with_fallback_generation(mut self, generation: RuntimeGeneration) -> Self {
        self.fallback_generation = Some(generation);
        self
    }

    /// Sets the class name read cap.
    #[must_use]
    pub fn with_max_name_length(mut self, max_name_length: usize) -> Self {
        self.max_name_length = max_name_length;
        self
    }

    /// Replaces the legacy-OS tagged-class table.
    #[must_use]
    pub fn with_legacy_tagged_classes(mut self, table: TaggedClassTable) -> Self {
        self.legacy_tagged_classes = table;
        self
    }

    /// Replaces the modern-OS tagged-class table.
    #[must_use]
    pub fn with_modern_tagged_classes(mut self, table: TaggedClassTable) -> Self {
        self.modern_tagged_classes = table;
        self
    }

    /// Sets the superclass walk bound.
    #[must_use]
    pub fn with_max_hierarchy_depth(mut self, depth: usize) -> Self {
        self.max_hierarchy_depth = depth;
        self
    }

    /// Tagged-class table for the given OS class.
    #[must_use]
    pub fn tagged_classes(&self, is_legacy_os: bool) -> &TaggedClassTable {
        if is_legacy_os {
            &self.legacy_tagged_classes
        } else {
            &self.modern_tagged_classes
        }
    }
}
