//! Fuzz testing for store open.
//!
//! Feeds arbitrary bytes to `Store::open` as if they were a store file. Open
//! must either reject the bytes or produce a store whose diagnostics run
//! without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;

use ndstore::config::CHUNK_SIZE;
use ndstore::storage::{MemoryStorage, StoreOptions};
use ndstore::Store;

fuzz_target!(|data: &[u8]| {
    let chunks = (data.len() / CHUNK_SIZE + 1).min(16);
    let Ok(mut storage) = MemoryStorage::create((chunks * CHUNK_SIZE) as u64) else {
        return;
    };
    let len = data.len().min(storage.bytes().len());
    storage.bytes_mut()[..len].copy_from_slice(&data[..len]);

    let options = StoreOptions {
        max_size: 32 * CHUNK_SIZE as u64,
        log_capacity: 64,
    };
    let Ok(mut store) = Store::open(storage, None, &options) else {
        return;
    };

    let report = store.verify();
    let _ = store.stats();
    if report.is_ok() {
        if let Ok(address) = store.allocate(24) {
            let _ = store.free(address, 24);
        }
    }
});
