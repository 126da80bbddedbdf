//! # Property Tests
//!
//! Invariants checked over generated inputs:
//! 1. Declared fields tile a record exactly, in declaration order
//! 2. Live allocations never overlap and keep their contents
//! 3. A freed block is handed out again for the same size

use ndstore::config::CHUNK_SIZE;
use ndstore::storage::{MemoryStorage, StoreOptions};
use ndstore::{Address, Field, FieldKind, FieldSpec, Store, StructDef};
use proptest::prelude::*;

fn field_kind() -> impl Strategy<Value = FieldKind> {
    prop_oneof![
        Just(FieldKind::int::<i8>()),
        Just(FieldKind::int::<u16>()),
        Just(FieldKind::int::<i32>()),
        Just(FieldKind::int::<u64>()),
        Just(FieldKind::String),
        Just(FieldKind::Pointer),
        Just(FieldKind::OneToMany),
    ]
}

fn empty_store() -> Store {
    let options = StoreOptions {
        log_capacity: 0,
        ..StoreOptions::default()
    };
    Store::create(MemoryStorage::create(CHUNK_SIZE as u64).unwrap(), 0, &options).unwrap()
}

fn rounded(size: u64) -> u64 {
    size.div_ceil(8).max(1) * 8
}

#[derive(Debug, Clone)]
enum Op {
    Allocate(u64),
    Free(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (1u64..64).prop_map(Op::Allocate),
        1 => (64u64..3000).prop_map(Op::Allocate),
        2 => any::<usize>().prop_map(Op::Free),
    ]
}

proptest! {
    #[test]
    fn fields_tile_the_record(kinds in prop::collection::vec(field_kind(), 1..24)) {
        let mut def = StructDef::new("Generated");
        for (i, kind) in kinds.iter().enumerate() {
            def.field(FieldSpec::new(format!("f{}", i), *kind));
        }
        let layout = def.done().unwrap();

        let mut expected = 0u32;
        for (field, kind) in layout.fields().iter().zip(&kinds) {
            prop_assert_eq!(field.offset(), expected);
            prop_assert_eq!(field.record_size(), kind.size());
            expected += kind.size();
        }
        prop_assert_eq!(layout.size(), expected);
    }

    #[test]
    fn live_blocks_never_overlap(ops in prop::collection::vec(op(), 1..200)) {
        let mut store = empty_store();
        let mut live: Vec<(Address, u64, u8)> = Vec::new();
        let mut stamp = 0u8;

        for op in ops {
            match op {
                Op::Allocate(size) => {
                    let address = store.allocate(size).unwrap();
                    stamp = stamp.wrapping_add(1);
                    store.write_bytes(address, &vec![stamp; size as usize]).unwrap();
                    live.push((address, size, stamp));
                }
                Op::Free(pick) if !live.is_empty() => {
                    let (address, size, _) = live.swap_remove(pick % live.len());
                    store.free(address, size).unwrap();
                }
                Op::Free(_) => {}
            }
        }

        let mut spans: Vec<(u64, u64)> = live
            .iter()
            .map(|(a, size, _)| (a.get(), a.get() + rounded(*size)))
            .collect();
        spans.sort_unstable();
        for pair in spans.windows(2) {
            prop_assert!(pair[0].1 <= pair[1].0, "overlap: {:?}", pair);
        }

        for (address, size, stamp) in &live {
            let bytes = store.read_bytes(*address, *size).unwrap();
            prop_assert!(bytes.iter().all(|b| b == stamp));
        }

        let report = store.verify();
        prop_assert!(report.is_ok(), "{:?}", report.problems);
        let allocated: u64 = live.iter().map(|(_, size, _)| rounded(*size)).sum();
        prop_assert_eq!(store.stats().allocated_bytes, allocated);
    }

    #[test]
    fn freed_block_is_reused_for_same_size(
        sizes in prop::collection::vec(1u64..4000, 1..16),
        pick in any::<prop::sample::Index>(),
    ) {
        let mut store = empty_store();
        let blocks: Vec<(Address, u64)> = sizes
            .iter()
            .map(|&size| (store.allocate(size).unwrap(), size))
            .collect();

        let (address, size) = blocks[pick.index(blocks.len())];
        store.free(address, size).unwrap();

        prop_assert_eq!(store.allocate(size).unwrap(), address);
    }
}
