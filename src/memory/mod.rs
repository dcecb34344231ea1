//! Read-only access to the memory of an inspected process.
//!
//! Everything the resolution engine knows about a target process flows through the
//! [`MemoryView`] trait. Hosts (a debugger, a core-file reader, a live `ptrace` attachment)
//! implement it; the engine only ever borrows it. The crate ships one implementation,
//! [`MemorySnapshot`], which serves captured memory regions and is what the tests and the fuzz
//! harness run against.
//!
//! # Key Components
//!
//! - [`MemoryView`] - The host capability: typed reads, bounded C strings, process facts, modules
//! - [`ProcessId`], [`PointerWidth`], [`ByteOrder`] - Process-wide facts
//! - [`ModuleInfo`] - A loaded image, its section names and version
//! - [`StructReader`] - Cursor for reading consecutive fields of a remote structure
//! - [`io`] - Byte order aware integer decoding used by the default trait methods
//!
//! # Failure Model
//!
//! Every read may fail: the address may be unmapped, the process may have exited or may be
//! running. Failures surface as [`crate::Error::AbsentMemory`] and are treated as "null" by all
//! consumers. No read is ever retried.
//!
//! # Examples
//!
//! ```rust
//! use objscope::{MemorySnapshot, MemoryView, PointerWidth, ProcessId};
//!
//! let mut snapshot = MemorySnapshot::new(ProcessId::new(42), PointerWidth::Eight);
//! snapshot.map_zeroed(0x1000, 0x40);
//! snapshot.write_pointer(0x1008, 0xdead_beef)?;
//! snapshot.write_bytes(0x1020, b"NSObject\0")?;
//!
//! assert_eq!(snapshot.read_pointer(0x1008)?, 0xdead_beef);
//! assert_eq!(snapshot.read_c_string(0x1020, 128)?, b"NSObject");
//! # Ok::<(), objscope::Error>(())
//! ```

pub mod io;

mod reader;
mod snapshot;

use std::fmt;

pub use reader::StructReader;
pub use snapshot::MemorySnapshot;

use crate::{Error::AbsentMemory, Result};

/// Opaque identity of an inspected process.
///
/// All process-scoped caches are keyed by this value. Hosts should hand out a fresh identity
/// for every attach, or call [`crate::Session::attach`] when an identity is reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessId(u64);

impl ProcessId {
    /// Wraps a raw host process identifier.
    #[must_use]
    pub fn new(raw: u64) -> Self {
        ProcessId(raw)
    }

    /// Returns the raw host process identifier.
    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pid {}", self.0)
    }
}

/// Size of a pointer in the inspected process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display)]
pub enum PointerWidth {
    /// 32-bit process
    #[strum(serialize = "32-bit")]
    Four,
    /// 64-bit process
    #[strum(serialize = "64-bit")]
    Eight,
}

impl PointerWidth {
    /// Maps a byte count reported by a host to a pointer width.
    ///
    /// Returns `None` for anything other than 4 or 8.
    #[must_use]
    pub fn from_bytes(bytes: usize) -> Option<Self> {
        match bytes {
            4 => Some(PointerWidth::Four),
            8 => Some(PointerWidth::Eight),
            _ => None,
        }
    }

    /// Pointer size in bytes.
    #[must_use]
    pub fn bytes(self) -> u64 {
        match self {
            PointerWidth::Four => 4,
            PointerWidth::Eight => 8,
        }
    }

    /// `true` for 64-bit processes.
    #[must_use]
    pub fn is_64_bit(self) -> bool {
        self == PointerWidth::Eight
    }
}

/// Byte order of the inspected process.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, strum::Display)]
pub enum ByteOrder {
    /// Least significant byte first
    #[default]
    Little,
    /// Most significant byte first
    Big,
}

/// A module (executable image or shared library) loaded in the inspected process.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModuleInfo {
    /// File name of the module, without directory components
    pub name: String,
    /// Names of the sections present in the module
    pub sections: Vec<String>,
    /// Version tuple, if the image carries one
    pub version: Option<Vec<u32>>,
}

impl ModuleInfo {
    /// Creates a module description with no sections and no version.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        ModuleInfo {
            name: name.into(),
            sections: Vec::new(),
            version: None,
        }
    }

    /// Adds a section name.
    #[must_use]
    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.sections.push(section.into());
        self
    }

    /// Sets the version tuple.
    #[must_use]
    pub fn with_version(mut self, version: &[u32]) -> Self {
        self.version = Some(version.to_vec());
        self
    }

    /// `true` if a section with exactly this name is present.
    #[must_use]
    pub fn has_section(&self, section: &str) -> bool {
        self.sections.iter().any(|s| s == section)
    }

    /// The version tuple, or `None` when the module carries none (an empty tuple counts as none).
    #[must_use]
    pub fn version(&self) -> Option<&[u32]> {
        self.version.as_deref().filter(|v| !v.is_empty())
    }
}

/// Host capability for reading the memory of one specific process.
///
/// Implementors provide the raw [`MemoryView::read_bytes`] primitive and the process facts; the
/// typed readers have default implementations that decode according to
/// [`MemoryView::byte_order`] and [`MemoryView::pointer_width`]. Hosts with cheaper native
/// typed reads may override them.
///
/// Implementations must never mutate the inspected process.
pub trait MemoryView {
    /// Identity of the process this view reads from.
    fn process_id(&self) -> ProcessId;

    /// Pointer width of the process.
    fn pointer_width(&self) -> PointerWidth;

    /// Byte order of the process.
    fn byte_order(&self) -> ByteOrder;

    /// Reads exactly `len` bytes at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::AbsentMemory`] if any byte of the range is unreadable.
    fn read_bytes(&self, address: u64, len: usize) -> Result<Vec<u8>>;

    /// Looks up a loaded module by file name.
    fn find_module(&self, filename: &str) -> Option<ModuleInfo>;

    /// Reads a 32-bit unsigned integer at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::AbsentMemory`] if the memory is unreadable.
    fn read_u32(&self, address: u64) -> Result<u32> {
        let data = self.read_bytes(address, 4)?;
        let mut offset = 0;
        io::read_at::<u32>(&data, &mut offset, self.byte_order())
            .map_err(|_| AbsentMemory { address })
    }

    /// Reads a pointer-sized unsigned integer at `address`, widened to `u64`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::AbsentMemory`] if the memory is unreadable.
    fn read_pointer(&self, address: u64) -> Result<u64> {
        let width = self.pointer_width();
        #[allow(clippy::cast_possible_truncation)]
        let data = self.read_bytes(address, width.bytes() as usize)?;
        let mut offset = 0;
        io::read_uint(&data, &mut offset, width, self.byte_order())
            .map_err(|_| AbsentMemory { address })
    }

    /// Reads a NUL-terminated byte string of at most `max_len` bytes at `address`.
    ///
    /// The terminator is not included. When no terminator is found within `max_len` bytes the
    /// whole window is returned. When readable memory ends first, a shorter window is returned.
    ///
    /// The default asks [`MemoryView::read_bytes`] for the whole `max_len` window at once. Only
    /// when that window runs off the end of readable memory is the length halved and the read
    /// retried, so a string well inside a mapping costs a single read.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::AbsentMemory`] if not even one non-NUL byte could be read.
    fn read_c_string(&self, address: u64, max_len: usize) -> Result<Vec<u8>> {
        let mut len = max_len;
        while len > 0 {
            if let Ok(mut window) = self.read_bytes(address, len) {
                if let Some(end) = window.iter().position(|&byte| byte == 0) {
                    window.truncate(end);
                }
                if window.is_empty() {
                    break;
                }
                return Ok(window);
            }
            len /= 2;
        }

        Err(AbsentMemory { address })
    }
}
