use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicUsize, Ordering},
};

use crate::{
    memory::{io, ByteOrder, MemoryView, ModuleInfo, PointerWidth, ProcessId},
    Error::AbsentMemory,
    Result,
};

/// Captured process memory, served through [`MemoryView`].
///
/// A snapshot is a sparse set of mapped regions keyed by base address, together with the
/// process facts a live host would report. Regions never overlap; mapping a region that would
/// overlap an existing one replaces the old one. Every successful or failed read increments an
/// internal counter so callers can observe how much memory traffic a resolution caused.
#[derive(Debug)]
pub struct MemorySnapshot {
    process: ProcessId,
    width: PointerWidth,
    order: ByteOrder,
    regions: BTreeMap<u64, Vec<u8>>,
    modules: Vec<ModuleInfo>,
    reads: AtomicUsize,
}

impl MemorySnapshot {
    /// Create an empty little-endian snapshot.
    ///
    /// ## Arguments
    /// * 'process' - Identity reported through [`MemoryView::process_id`]
    /// * 'width'   - Pointer width of the captured process
    #[must_use]
    pub fn new(process: ProcessId, width: PointerWidth) -> Self {
        MemorySnapshot {
            process,
            width,
            order: ByteOrder::Little,
            regions: BTreeMap::new(),
            modules: Vec::new(),
            reads: AtomicUsize::new(0),
        }
    }

    /// Sets the byte order used for typed reads and writes.
    #[must_use]
    pub fn with_byte_order(mut self, order: ByteOrder) -> Self {
        self.order = order;
        self
    }

    /// Maps `data` at `base`, replacing any region it overlaps.
    pub fn map(&mut self, base: u64, data: Vec<u8>) {
        let end = base.saturating_add(data.len() as u64);
        let overlapping: Vec<u64> = self
            .regions
            .iter()
            .filter(|(start, bytes)| {
                let region_end = start.saturating_add(bytes.len() as u64);
                **start < end && base < region_end
            })
            .map(|(start, _)| *start)
            .collect();
        for start in overlapping {
            self.regions.remove(&start);
        }

        self.regions.insert(base, data);
    }

    /// Maps `len` zero bytes at `base`.
    pub fn map_zeroed(&mut self, base: u64, len: usize) {
        self.map(base, vec![0; len]);
    }

    /// Registers a loaded module.
    pub fn add_module(&mut self, module: ModuleInfo) {
        self.modules.push(module);
    }

    /// Number of [`MemoryView::read_bytes`] calls served so far, successful or not.
    #[must_use]
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    /// Overwrites bytes inside an already mapped region.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::AbsentMemory`] if the range is not fully mapped by one region.
    pub fn write_bytes(&mut self, address: u64, bytes: &[u8]) -> Result<()> {
        let (start, end) = self.locate(address, bytes.len())?;
        let Some(region) = self.regions.get_mut(&start) else {
            return Err(AbsentMemory { address });
        };
        region[(address - start) as usize..end].copy_from_slice(bytes);
        Ok(())
    }

    /// Writes a pointer-sized value in the snapshot's byte order.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::AbsentMemory`] if the target is not mapped.
    pub fn write_pointer(&mut self, address: u64, value: u64) -> Result<()> {
        #[allow(clippy::cast_possible_truncation)]
        let mut buffer = vec![0u8; self.width.bytes() as usize];
        let mut offset = 0;
        io::write_uint(&mut buffer, &mut offset, value, self.width, self.order)?;
        self.write_bytes(address, &buffer)
    }

    /// Writes a 32-bit value in the snapshot's byte order.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::AbsentMemory`] if the target is not mapped.
    pub fn write_u32(&mut self, address: u64, value: u32) -> Result<()> {
        let mut buffer = [0u8; 4];
        let mut offset = 0;
        io::write_at(&mut buffer, &mut offset, value, self.order)?;
        self.write_bytes(address, &buffer)
    }

    /// Finds the region containing `[address, address + len)`.
    ///
    /// Returns the region base and the end offset of the range inside that region.
    fn locate(&self, address: u64, len: usize) -> Result<(u64, usize)> {
        let Some((start, data)) = self.regions.range(..=address).next_back() else {
            return Err(AbsentMemory { address });
        };

        let Ok(offset) = usize::try_from(address - start) else {
            return Err(AbsentMemory { address });
        };
        let Some(end) = offset.checked_add(len) else {
            return Err(AbsentMemory { address });
        };
        if end > data.len() {
            return Err(AbsentMemory { address });
        }

        Ok((*start, end))
    }
}

impl MemoryView for MemorySnapshot {
    fn process_id(&self) -> ProcessId {
        self.process
    }

    fn pointer_width(&self) -> PointerWidth {
        self.width
    }

    fn byte_order(&self) -> ByteOrder {
        self.order
    }

    fn read_bytes(&self, address: u64, len: usize) -> Result<Vec<u8>> {
        self.reads.fetch_add(1, Ordering::Relaxed);

        let (start, end) = self.locate(address, len)?;
        let Some(region) = self.regions.get(&start) else {
            return Err(AbsentMemory { address });
        };
        Ok(region[(address - start) as usize..end].to_vec())
    }

    fn find_module(&self, filename: &str) -> Option<ModuleInfo> {
        self.modules.iter().find(|m| m.name == filename).cloned()
    }

    fn read_c_string(&self, address: u64, max_len: usize) -> Result<Vec<u8>> {
        self.reads.fetch_add(1, Ordering::Relaxed);

        let (start, _) = self.locate(address, 1)?;
        let Some(region) = self.regions.get(&start) else {
            return Err(AbsentMemory { address });
        };

        let tail = &region[(address - start) as usize..];
        let capped = &tail[..tail.len().min(max_len)];
        let content = match capped.iter().position(|b| *b == 0) {
            Some(nul) => &capped[..nul],
            None => capped,
        };

        if content.is_empty() {
            return Err(AbsentMemory { address });
        }
        Ok(content.to_vec())
    }
}
