#![no_main]

use libfuzzer_sys::fuzz_target;
use objscope::{
    summary::{DictionarySummary, SummaryStatistics},
    MemorySnapshot, ModuleInfo, ObjectReference, PointerWidth, ProcessId, Session,
};

const BASE: u64 = 0x1000;

// The first byte picks width and runtime generation, the next eight the reference value. The
// rest is mapped as process memory.
fuzz_target!(|data: &[u8]| {
    if data.len() < 9 {
        return;
    }

    let width = if data[0] & 1 == 0 {
        PointerWidth::Eight
    } else {
        PointerWidth::Four
    };
    let mut runtime = ModuleInfo::new("libobjc.A.dylib");
    if data[0] & 2 != 0 {
        runtime = runtime.with_section("__OBJC");
    }

    let mut value = [0u8; 8];
    value.copy_from_slice(&data[1..9]);
    let value = BASE.wrapping_add(u64::from_le_bytes(value) % (data.len() as u64 + 64));

    let mut memory = MemorySnapshot::new(ProcessId::new(1), width);
    memory.add_module(runtime);
    memory.map(BASE, data[9..].to_vec());

    let session = Session::default();
    let class = session.resolve(ObjectReference::new(&memory, value));
    if let Ok(resolver) = session.resolver(&memory) {
        let _ = resolver.ancestors(&class).count();
        let statistics = SummaryStatistics::new();
        if let Some(summary) = DictionarySummary::new(resolver, value, &statistics) {
            let _ = summary.count();
        }
    }
});
