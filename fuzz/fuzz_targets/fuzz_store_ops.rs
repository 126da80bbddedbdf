//! Fuzz testing for the block allocator.
//!
//! Drives an in-memory store with arbitrary allocate / free / write
//! sequences and checks after every run that the free lists are consistent
//! and that live blocks still hold what was written to them.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use ndstore::config::CHUNK_SIZE;
use ndstore::storage::{MemoryStorage, StoreOptions};
use ndstore::{Address, Store};

#[derive(Debug, Arbitrary)]
enum StoreOp {
    Allocate { size: u16 },
    Free { pick: u8 },
    Write { pick: u8, byte: u8 },
    ReadPastEnd { offset: u32 },
}

fuzz_target!(|ops: Vec<StoreOp>| {
    let options = StoreOptions {
        max_size: 64 * CHUNK_SIZE as u64,
        log_capacity: 256,
    };
    let storage = MemoryStorage::create(CHUNK_SIZE as u64).unwrap();
    let mut store = Store::create(storage, 0, &options).unwrap();
    let mut live: Vec<(Address, u64, u8)> = Vec::new();

    for op in ops.into_iter().take(512) {
        match op {
            StoreOp::Allocate { size } => {
                let size = u64::from(size);
                let Ok(address) = store.allocate(size) else {
                    continue;
                };
                store.zero(address, size).unwrap();
                live.push((address, size, 0));
            }
            StoreOp::Free { pick } if !live.is_empty() => {
                let (address, size, _) = live.swap_remove(pick as usize % live.len());
                store.free(address, size).unwrap();
            }
            StoreOp::Write { pick, byte } if !live.is_empty() => {
                let idx = pick as usize % live.len();
                let (address, size, _) = live[idx];
                store.write_bytes(address, &vec![byte; size as usize]).unwrap();
                live[idx].2 = byte;
            }
            StoreOp::ReadPastEnd { offset } => {
                let address = Address::new(store.size() + u64::from(offset));
                assert!(store.read_u64(address).is_err());
            }
            _ => {}
        }
    }

    for (address, size, byte) in &live {
        let bytes = store.read_bytes(*address, *size).unwrap();
        assert!(bytes.iter().all(|b| b == byte));
    }

    let report = store.verify();
    assert!(report.is_ok(), "{:?}", report.problems);
    assert!(store.log().balance().is_balanced());
});
