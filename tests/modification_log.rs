//! # Modification Log Tests
//!
//! The log as seen by forensic tooling:
//! 1. Every field write is bracketed by its field's tag
//! 2. Brackets stay balanced when the write fails
//! 3. "What wrote here last" is answerable from the log alone

use ndstore::modlog::Operation;
use ndstore::{Address, FieldValue, Nd, Registry, StructDef, Tag};

fn pair_store(log_capacity: usize) -> (Nd, ndstore::KindId, ndstore::FieldInt<i32>, ndstore::FieldPointer) {
    let mut pair = StructDef::new("Pair");
    let a = pair.add_int::<i32>("a");
    let next = pair.add_pointer("next");
    let mut registry = Registry::builder();
    let kind = registry.register(pair.done().unwrap()).unwrap();

    let nd = Nd::builder()
        .in_memory()
        .log_capacity(log_capacity)
        .open(registry.build())
        .unwrap();
    (nd, kind, a, next)
}

mod bracket_tests {
    use super::*;

    #[test]
    fn field_write_is_bracketed_by_its_tag() {
        let (mut nd, kind, a, _) = pair_store(64);
        let p = nd.allocate_record(kind).unwrap();
        let before = nd.modification_log().len();

        a.put(&mut nd, p, 42).unwrap();

        let entries: Vec<Operation> = nd
            .modification_log()
            .entries()
            .skip(before)
            .map(|e| e.op.clone())
            .collect();
        let tag = Tag::new("Writing field 0 (a), a FieldInt<i32> in struct Pair");
        assert_eq!(
            entries,
            vec![
                Operation::Start(tag.clone()),
                Operation::Write { address: p, len: 4 },
                Operation::End(tag),
            ]
        );
    }

    #[test]
    fn failed_write_still_closes_bracket() {
        let (mut nd, _, a, next) = pair_store(64);
        let beyond = Address::new(u64::MAX - 1);

        assert!(a.put(&mut nd, beyond, 1).is_err());
        assert!(next.put(&mut nd, beyond, Address::NULL).is_err());

        let balance = nd.modification_log().balance();
        assert_eq!(balance.starts, 2);
        assert_eq!(balance.ends, 2);
        assert!(balance.is_balanced());
        assert_eq!(nd.modification_log().mismatches(), 0);
    }

    #[test]
    fn starts_precede_their_ends() {
        let (mut nd, kind, a, next) = pair_store(1024);
        for i in 0..10 {
            let p = nd.allocate_record(kind).unwrap();
            a.put(&mut nd, p, i).unwrap();
            next.put(&mut nd, p, p).unwrap();
            if i % 3 == 0 {
                nd.delete_record(kind, p).unwrap();
            }
        }
        let _ = a.put(&mut nd, Address::new(u64::MAX), 0);

        let mut open: Vec<Tag> = Vec::new();
        for entry in nd.modification_log().entries() {
            match &entry.op {
                Operation::Start(tag) => open.push(tag.clone()),
                Operation::End(tag) => assert_eq!(open.pop().as_ref(), Some(tag)),
                _ => assert!(!open.is_empty(), "unbracketed {}", entry.op),
            }
        }
        assert!(open.is_empty());
    }

    #[test]
    fn named_writes_are_bracketed_too() {
        let (mut nd, kind, _, _) = pair_store(64);
        let p = nd.allocate_record(kind).unwrap();

        nd.write_field(kind, p, "a", &FieldValue::Signed(5)).unwrap();

        let last = nd.history_for(p, 4).pop().unwrap();
        assert_eq!(
            last.innermost().map(Tag::name),
            Some("Writing field 0 (a), a FieldInt<i32> in struct Pair")
        );
    }

    #[test]
    fn disabled_log_records_nothing() {
        let (mut nd, kind, a, _) = pair_store(0);
        let p = nd.allocate_record(kind).unwrap();

        a.put(&mut nd, p, 1).unwrap();

        assert!(nd.modification_log().is_empty());
        assert!(nd.history_for(p, 4).is_empty());
        assert_eq!(a.get(&nd, p).unwrap(), 1);
    }
}

mod forensic_tests {
    use super::*;

    #[test]
    fn last_writer_names_the_field() {
        let (mut nd, kind, a, next) = pair_store(256);
        let p1 = nd.allocate_record(kind).unwrap();
        let p2 = nd.allocate_record(kind).unwrap();
        a.put(&mut nd, p1, 1).unwrap();
        next.put(&mut nd, p1, p2).unwrap();

        let history = nd.history_for(p1.offset(4), 8);
        let last = history.last().unwrap();

        assert!(matches!(last.op, Operation::Write { .. }));
        assert_eq!(
            last.to_string(),
            format!(
                "#{} write {}+8 in [Writing field 1 (next), a FieldPointer in struct Pair]",
                last.seq,
                p1.offset(4)
            )
        );
    }

    #[test]
    fn history_shows_allocation_then_writes() {
        let (mut nd, kind, a, _) = pair_store(256);
        let p = nd.allocate_record(kind).unwrap();
        a.put(&mut nd, p, 3).unwrap();

        let history = nd.history_for(p, 12);
        let ops: Vec<String> = history
            .iter()
            .map(|r| match &r.op {
                Operation::Alloc { .. } => "alloc".to_string(),
                Operation::Write { len, .. } => format!("write{}", len),
                other => other.to_string(),
            })
            .collect();

        assert_eq!(ops, vec!["alloc", "write12", "write4"]);
        assert_eq!(
            history[0].innermost().map(Tag::name),
            Some("Allocating struct Pair")
        );
    }

    #[test]
    fn delete_is_visible_in_history() {
        let (mut nd, kind, _, _) = pair_store(256);
        let p = nd.allocate_record(kind).unwrap();
        nd.delete_record(kind, p).unwrap();

        let last = nd.history_for(p, 12).pop().unwrap();

        assert!(matches!(last.op, Operation::Free { size: 16, .. }));
        assert_eq!(
            last.innermost().map(Tag::name),
            Some("Deleting struct Pair")
        );
    }

    #[test]
    fn ring_buffer_keeps_newest_entries() {
        let (mut nd, kind, a, _) = pair_store(8);
        let p = nd.allocate_record(kind).unwrap();
        for i in 0..100 {
            a.put(&mut nd, p, i).unwrap();
        }

        let log = nd.modification_log();
        assert_eq!(log.len(), 8);
        assert!(log.dropped() > 0);
        assert!(log.balance().is_balanced());
        assert_eq!(a.get(&nd, p).unwrap(), 99);
    }
}
