//! Cursor-based reader for structures living in remote memory.
//!
//! Runtime metadata structures are sequences of pointer-sized and 32-bit fields. The
//! [`StructReader`] keeps a base address and a relative position, reads one field at a time
//! through a borrowed [`MemoryView`], and advances by the width of what it read.
//!
//! # Examples
//!
//! ```rust
//! use objscope::{MemorySnapshot, PointerWidth, ProcessId, StructReader};
//!
//! let mut snapshot = MemorySnapshot::new(ProcessId::new(1), PointerWidth::Eight);
//! snapshot.map_zeroed(0x1000, 0x20);
//! snapshot.write_pointer(0x1000, 0x2000)?;
//! snapshot.write_pointer(0x1008, 0x3000)?;
//! snapshot.write_u32(0x1010, 0x40)?;
//!
//! let mut reader = StructReader::new(&snapshot, 0x1000);
//! assert_eq!(reader.read_pointer()?, 0x2000);
//! assert_eq!(reader.read_pointer()?, 0x3000);
//! assert_eq!(reader.read_u32()?, 0x40);
//! assert_eq!(reader.position(), 0x14);
//! # Ok::<(), objscope::Error>(())
//! ```

use crate::{
    memory::{MemoryView, PointerWidth},
    Error::AbsentMemory,
    Result,
};

/// A cursor over one structure in the memory of an inspected process.
///
/// The reader does not know the size of the structure; every read goes to the host and may
/// fail independently with [`crate::Error::AbsentMemory`]. A failed read does not advance the
/// position.
pub struct StructReader<'a> {
    /// The memory the structure lives in
    memory: &'a dyn MemoryView,
    /// Address of the first byte of the structure
    base: u64,
    /// Current offset relative to `base`
    position: u64,
}

impl<'a> StructReader<'a> {
    /// Create a new [`StructReader`] positioned at the start of the structure at `base`.
    #[must_use]
    pub fn new(memory: &'a dyn MemoryView, base: u64) -> Self {
        StructReader {
            memory,
            base,
            position: 0,
        }
    }

    /// Address of the structure.
    #[must_use]
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Current offset relative to the structure base.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Pointer width of the process the structure lives in.
    #[must_use]
    pub fn pointer_width(&self) -> PointerWidth {
        self.memory.pointer_width()
    }

    /// Move to an offset relative to the structure base.
    pub fn seek(&mut self, offset: u64) {
        self.position = offset;
    }

    /// Move the position forward by `step` bytes without reading.
    pub fn advance_by(&mut self, step: u64) {
        self.position = self.position.saturating_add(step);
    }

    /// Read a pointer-sized field and advance past it.
    ///
    /// # Errors
    /// Returns [`crate::Error::AbsentMemory`] if the field is unreadable.
    pub fn read_pointer(&mut self) -> Result<u64> {
        let address = self.current()?;
        let value = self.memory.read_pointer(address)?;
        self.position += self.memory.pointer_width().bytes();
        Ok(value)
    }

    /// Read a 32-bit field and advance past it.
    ///
    /// # Errors
    /// Returns [`crate::Error::AbsentMemory`] if the field is unreadable.
    pub fn read_u32(&mut self) -> Result<u32> {
        let address = self.current()?;
        let value = self.memory.read_u32(address)?;
        self.position += 4;
        Ok(value)
    }

    fn current(&self) -> Result<u64> {
        self.base
            .checked_add(self.position)
            .ok_or(AbsentMemory { address: self.base })
    }
}
