//! # Relation Field Tests
//!
//! One-to-many / many-to-one pairs kept consistent from the child side:
//! 1. Assigning a parent links the child into the parent's list
//! 2. Reassigning or clearing moves or removes it
//! 3. Deleting either side repairs the other

use ndstore::{
    Address, Field, FieldManyToOne, FieldOneToMany, FieldString, FieldValue, KindId, Nd,
    Registry, StoreError, StructDef,
};

struct TypeSchema {
    type_kind: KindId,
    method_kind: KindId,
    methods: FieldOneToMany,
    owner: FieldManyToOne,
    method_name: FieldString,
}

fn type_store() -> (Nd, TypeSchema) {
    let mut type_def = StructDef::new("Type");
    type_def.add_string("name");
    let methods = type_def.add_one_to_many("methods");

    let mut method_def = StructDef::new("Method");
    let method_name = method_def.add_string("name");
    let owner = method_def.add_many_to_one("owner", &methods);

    let mut registry = Registry::builder();
    let type_kind = registry.register(type_def.done().unwrap()).unwrap();
    let method_kind = registry.register(method_def.done().unwrap()).unwrap();

    let nd = Nd::in_memory(registry.build()).unwrap();
    (
        nd,
        TypeSchema {
            type_kind,
            method_kind,
            methods,
            owner,
            method_name,
        },
    )
}

mod link_tests {
    use super::*;

    #[test]
    fn assigning_owner_links_child() {
        let (mut nd, s) = type_store();
        let ty = nd.allocate_record(s.type_kind).unwrap();
        let m1 = nd.allocate_record(s.method_kind).unwrap();
        let m2 = nd.allocate_record(s.method_kind).unwrap();

        assert!(s.methods.is_empty(&nd, ty).unwrap());

        s.owner.put(&mut nd, m1, ty).unwrap();
        s.owner.put(&mut nd, m2, ty).unwrap();

        assert_eq!(s.methods.len(&nd, ty).unwrap(), 2);
        assert_eq!(s.methods.targets(&nd, ty).unwrap(), vec![m1, m2]);
        assert_eq!(s.methods.get(&nd, ty, 1).unwrap(), Some(m2));
        assert_eq!(s.methods.get(&nd, ty, 2).unwrap(), None);
        assert_eq!(s.owner.follow(&nd, m1).unwrap(), Some(ty));
    }

    #[test]
    fn reassigning_owner_moves_child() {
        let (mut nd, s) = type_store();
        let a = nd.allocate_record(s.type_kind).unwrap();
        let b = nd.allocate_record(s.type_kind).unwrap();
        let m = nd.allocate_record(s.method_kind).unwrap();

        s.owner.put(&mut nd, m, a).unwrap();
        s.owner.put(&mut nd, m, b).unwrap();

        assert!(s.methods.targets(&nd, a).unwrap().is_empty());
        assert_eq!(s.methods.targets(&nd, b).unwrap(), vec![m]);
    }

    #[test]
    fn same_owner_twice_is_a_no_op() {
        let (mut nd, s) = type_store();
        let ty = nd.allocate_record(s.type_kind).unwrap();
        let m = nd.allocate_record(s.method_kind).unwrap();

        s.owner.put(&mut nd, m, ty).unwrap();
        s.owner.put(&mut nd, m, ty).unwrap();

        assert_eq!(s.methods.len(&nd, ty).unwrap(), 1);
    }

    #[test]
    fn clearing_owner_unlinks_child_from_middle() {
        let (mut nd, s) = type_store();
        let ty = nd.allocate_record(s.type_kind).unwrap();
        let methods: Vec<Address> = (0..3)
            .map(|_| nd.allocate_record(s.method_kind).unwrap())
            .collect();
        for m in &methods {
            s.owner.put(&mut nd, *m, ty).unwrap();
        }

        s.owner.put(&mut nd, methods[1], Address::NULL).unwrap();

        assert_eq!(
            s.methods.targets(&nd, ty).unwrap(),
            vec![methods[0], methods[2]]
        );
        assert_eq!(s.owner.follow(&nd, methods[1]).unwrap(), None);
        assert!(nd.check_integrity().is_ok());
    }

    #[test]
    fn relation_reads_by_name() {
        let (mut nd, s) = type_store();
        let ty = nd.allocate_record(s.type_kind).unwrap();
        let m = nd.allocate_record(s.method_kind).unwrap();

        nd.write_field(s.method_kind, m, "owner", &FieldValue::Pointer(ty))
            .unwrap();

        assert_eq!(
            nd.read_field(s.type_kind, ty, "methods").unwrap(),
            FieldValue::Relation(vec![m])
        );
        assert!(nd
            .write_field(s.type_kind, ty, "methods", &FieldValue::Relation(vec![]))
            .is_err());
    }
}

mod delete_tests {
    use super::*;

    #[test]
    fn deleting_child_removes_it_from_owner() {
        let (mut nd, s) = type_store();
        let ty = nd.allocate_record(s.type_kind).unwrap();
        let m1 = nd.allocate_record(s.method_kind).unwrap();
        let m2 = nd.allocate_record(s.method_kind).unwrap();
        s.owner.put(&mut nd, m1, ty).unwrap();
        s.owner.put(&mut nd, m2, ty).unwrap();

        nd.delete_record(s.method_kind, m1).unwrap();

        assert_eq!(s.methods.targets(&nd, ty).unwrap(), vec![m2]);
        assert!(nd.check_integrity().is_ok());
    }

    #[test]
    fn deleting_owner_detaches_children() {
        let (mut nd, s) = type_store();
        let ty = nd.allocate_record(s.type_kind).unwrap();
        let m = nd.allocate_record(s.method_kind).unwrap();
        s.method_name.put(&mut nd, m, "toString").unwrap();
        s.owner.put(&mut nd, m, ty).unwrap();

        nd.delete_record(s.type_kind, ty).unwrap();

        assert_eq!(s.owner.follow(&nd, m).unwrap(), None);
        assert_eq!(s.method_name.get(&nd, m).unwrap(), "toString");
        assert!(nd.check_integrity().is_ok());
    }

    #[test]
    fn deleting_everything_returns_all_space() {
        let (mut nd, s) = type_store();
        let ty = nd.allocate_record(s.type_kind).unwrap();
        let methods: Vec<Address> = (0..5)
            .map(|_| nd.allocate_record(s.method_kind).unwrap())
            .collect();
        for m in &methods {
            s.owner.put(&mut nd, *m, ty).unwrap();
            s.method_name.put(&mut nd, *m, "m").unwrap();
        }

        for m in &methods {
            nd.delete_record(s.method_kind, *m).unwrap();
        }
        nd.delete_record(s.type_kind, ty).unwrap();

        assert_eq!(nd.stats().allocated_bytes, 0);
        assert!(nd.check_integrity().is_ok());
    }

    #[test]
    fn relation_slot_sizes() {
        let (_, s) = type_store();

        assert_eq!(s.methods.record_size(), 12);
        assert_eq!(s.owner.record_size(), 8);
        assert_eq!(s.owner.inverse_offset(), s.methods.offset());
    }
}

mod corruption_tests {
    use super::*;

    fn count_slot(s: &TypeSchema, owner: Address) -> Address {
        owner.offset(s.methods.offset() + 8)
    }

    fn assert_corrupt(err: eyre::Report) {
        assert!(
            matches!(StoreError::of(&err), Some(StoreError::CorruptFormat(_))),
            "unexpected error: {:?}",
            err
        );
    }

    #[test]
    fn absurd_count_is_corrupt_format() {
        let (mut nd, s) = type_store();
        let ty = nd.allocate_record(s.type_kind).unwrap();
        let slot = count_slot(&s, ty);
        nd.store_mut().write_u32(slot, u32::MAX).unwrap();

        assert_corrupt(s.methods.targets(&nd, ty).unwrap_err());
        assert_corrupt(nd.read_field(s.type_kind, ty, "methods").unwrap_err());
    }

    #[test]
    fn count_longer_than_chain_is_corrupt_format() {
        let (mut nd, s) = type_store();
        let ty = nd.allocate_record(s.type_kind).unwrap();
        let m = nd.allocate_record(s.method_kind).unwrap();
        s.owner.put(&mut nd, m, ty).unwrap();
        let slot = count_slot(&s, ty);
        nd.store_mut().write_u32(slot, 3).unwrap();

        assert_corrupt(s.methods.targets(&nd, ty).unwrap_err());
    }

    #[test]
    fn linking_into_full_list_is_corrupt_format() {
        let (mut nd, s) = type_store();
        let ty = nd.allocate_record(s.type_kind).unwrap();
        let m = nd.allocate_record(s.method_kind).unwrap();
        let slot = count_slot(&s, ty);
        nd.store_mut().write_u32(slot, u32::MAX).unwrap();
        let allocated = nd.stats().allocated_bytes;

        assert_corrupt(s.owner.put(&mut nd, m, ty).unwrap_err());

        assert_eq!(s.owner.follow(&nd, m).unwrap(), None);
        assert_eq!(nd.stats().allocated_bytes, allocated);
        assert!(nd.modification_log().balance().is_balanced());
    }
}
