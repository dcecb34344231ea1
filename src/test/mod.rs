//! Fabrication of inspected processes for unit tests.
//!
//! [`ProcessBuilder`] lays out class structures and objects in a zeroed heap region the way
//! the legacy or modern runtime would, then freezes everything into a [`MemorySnapshot`].

use crate::{
    memory::{
        io::{read_uint, write_at, write_uint},
        ByteOrder, MemorySnapshot, ModuleInfo, PointerWidth, ProcessId,
    },
    runtime::{RuntimeGeneration, SystemParameters},
};

/// Base address of the fabricated heap.
pub const HEAP_BASE: u64 = 0x10000;
const HEAP_SIZE: usize = 0x20000;
const ALLOC_ALIGN: u64 = 16;

/// Description of one class to lay out.
#[derive(Clone, Debug)]
pub struct ClassSpec {
    name: String,
    superclass: u64,
    instance_size: u64,
    flags: u32,
}

impl ClassSpec {
    pub fn new(name: &str) -> Self {
        ClassSpec {
            name: name.to_string(),
            superclass: 0,
            instance_size: 16,
            flags: 0,
        }
    }

    pub fn superclass(mut self, address: u64) -> Self {
        self.superclass = address;
        self
    }

    pub fn instance_size(mut self, size: u64) -> Self {
        self.instance_size = size;
        self
    }

    // Read-only flags on the modern runtime, the info word on the legacy one
    pub fn flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }
}

/// Builder for a fabricated process.
pub struct ProcessBuilder {
    process: ProcessId,
    width: PointerWidth,
    generation: RuntimeGeneration,
    foundation_version: Vec<u32>,
    runtime_loaded: bool,
    heap: Vec<u8>,
    next: u64,
}

impl ProcessBuilder {
    /// Modern runtime on a modern OS.
    pub fn modern(width: PointerWidth) -> Self {
        Self::new(ProcessId::new(100), width, RuntimeGeneration::V2, &[1056, 13])
    }

    /// Legacy runtime on a legacy OS.
    pub fn legacy(width: PointerWidth) -> Self {
        Self::new(ProcessId::new(200), width, RuntimeGeneration::V1, &[751, 62])
    }

    fn new(
        process: ProcessId,
        width: PointerWidth,
        generation: RuntimeGeneration,
        foundation_version: &[u32],
    ) -> Self {
        ProcessBuilder {
            process,
            width,
            generation,
            foundation_version: foundation_version.to_vec(),
            runtime_loaded: true,
            heap: vec![0; HEAP_SIZE],
            next: 0,
        }
    }

    pub fn with_process(mut self, process: ProcessId) -> Self {
        self.process = process;
        self
    }

    pub fn with_foundation_version(mut self, version: &[u32]) -> Self {
        self.foundation_version = version.to_vec();
        self
    }

    /// Leaves the runtime library out of the module list.
    pub fn without_runtime(mut self) -> Self {
        self.runtime_loaded = false;
        self
    }

    pub fn pointer_size(&self) -> u64 {
        self.width.bytes()
    }

    /// Reserves `len` zeroed bytes, 16-byte aligned.
    pub fn alloc(&mut self, len: u64) -> u64 {
        let address = HEAP_BASE + self.next;
        self.next = (self.next + len.max(1) + ALLOC_ALIGN - 1) & !(ALLOC_ALIGN - 1);
        assert!(self.next as usize <= HEAP_SIZE, "fabricated heap exhausted");
        address
    }

    pub fn alloc_bytes(&mut self, bytes: &[u8]) -> u64 {
        let address = self.alloc(bytes.len() as u64);
        let offset = self.offset(address);
        self.heap[offset..offset + bytes.len()].copy_from_slice(bytes);
        address
    }

    pub fn alloc_c_string(&mut self, value: &str) -> u64 {
        let mut bytes = value.as_bytes().to_vec();
        bytes.push(0);
        self.alloc_bytes(&bytes)
    }

    pub fn write_pointer(&mut self, address: u64, value: u64) {
        let mut offset = self.offset(address);
        write_uint(&mut self.heap, &mut offset, value, self.width, ByteOrder::Little).unwrap();
    }

    pub fn write_u32(&mut self, address: u64, value: u32) {
        let mut offset = self.offset(address);
        write_at(&mut self.heap, &mut offset, value, ByteOrder::Little).unwrap();
    }

    pub fn read_pointer(&self, address: u64) -> u64 {
        let mut offset = self.offset(address);
        read_uint(&self.heap, &mut offset, self.width, ByteOrder::Little).unwrap()
    }

    /// Lays out a class with the layout of the builder's runtime generation.
    pub fn add_class(&mut self, spec: ClassSpec) -> u64 {
        match self.generation {
            RuntimeGeneration::V1 => self.add_class_v1(&spec),
            RuntimeGeneration::V2 => self.add_class_v2(&spec),
        }
    }

    // isa, superclass, name, version, info, instance_size
    fn add_class_v1(&mut self, spec: &ClassSpec) -> u64 {
        let ptr = self.pointer_size();
        let metaclass = self.alloc(6 * ptr);
        let name = self.alloc_c_string(&spec.name);

        let class = self.alloc(6 * ptr);
        self.write_pointer(class, metaclass);
        self.write_pointer(class + ptr, spec.superclass);
        self.write_pointer(class + 2 * ptr, name);
        self.write_pointer(class + 4 * ptr, u64::from(spec.flags));
        self.write_pointer(class + 5 * ptr, spec.instance_size);
        class
    }

    // class: isa, superclass, cache, vtable, data
    // rw:    flags u32, version u32, ro
    // ro:    flags u32, instance_start u32, instance_size u32, ..., name
    fn add_class_v2(&mut self, spec: &ClassSpec) -> u64 {
        let ptr = self.pointer_size();
        let metaclass = self.alloc(5 * ptr);
        let cache = self.alloc(2 * ptr);
        let vtable = self.alloc(2 * ptr);
        let name = self.alloc_c_string(&spec.name);

        let ro = self.alloc(6 * ptr);
        self.write_u32(ro, spec.flags);
        self.write_u32(ro + 4, u32::try_from(ptr).unwrap());
        self.write_u32(ro + 8, u32::try_from(spec.instance_size).unwrap());
        self.write_pointer(ro + if self.width.is_64_bit() { 24 } else { 16 }, name);

        let rw = self.alloc(4 * ptr);
        self.write_pointer(rw + 8, ro);

        let class = self.alloc(5 * ptr);
        self.write_pointer(class, metaclass);
        self.write_pointer(class + ptr, spec.superclass);
        self.write_pointer(class + 2 * ptr, cache);
        self.write_pointer(class + 3 * ptr, vtable);
        self.write_pointer(class + 4 * ptr, rw);
        class
    }

    /// Allocates a 64-byte object whose isa is `class`.
    pub fn add_object(&mut self, class: u64) -> u64 {
        let object = self.alloc(64);
        self.write_pointer(object, class);
        object
    }

    /// Freezes the process into a snapshot and the parameters detection should arrive at.
    pub fn build(self) -> (MemorySnapshot, SystemParameters) {
        let mut runtime = ModuleInfo::new("libobjc.A.dylib").with_section("__TEXT");
        if self.generation == RuntimeGeneration::V1 {
            runtime = runtime.with_section("__OBJC");
        }

        let mut memory = MemorySnapshot::new(self.process, self.width);
        memory.map(HEAP_BASE, self.heap);
        if self.runtime_loaded {
            memory.add_module(runtime);
        }
        memory.add_module(ModuleInfo::new("Foundation").with_version(&self.foundation_version));

        let params = SystemParameters {
            process: self.process,
            pointer_width: self.width,
            byte_order: ByteOrder::Little,
            generation: self.generation,
            is_legacy_os: self.foundation_version.first().is_some_and(|major| *major < 900),
        };
        (memory, params)
    }

    fn offset(&self, address: u64) -> usize {
        (address - HEAP_BASE) as usize
    }
}
