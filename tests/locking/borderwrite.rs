//! Borderwrite Tests
//!
//! Borderwrite must always equal the maximal same-owner runs of all write
//! ranges, whatever order locks are taken and released in.

use crate::common::*;
use proptest::prelude::*;

fn border(lt: &LockTree) -> Vec<(Interval, u64)> {
    lt.borderwrite_ranges()
        .into_iter()
        .map(|r| (r.interval, r.owner.0))
        .collect()
}

#[test]
fn merge_order_does_not_matter() {
    let ltm = manager();
    let a = open(&ltm, 1);
    let b = open(&ltm, 2);

    a.acquire_write_range(txn(1), key(5), key(15)).unwrap();
    a.acquire_write_range(txn(1), key(10), key(20)).unwrap();
    b.acquire_write_range(txn(1), key(10), key(20)).unwrap();
    b.acquire_write_range(txn(1), key(5), key(15)).unwrap();

    assert_eq!(border(&a), vec![(range(5, 20), 1)]);
    assert_eq!(border(&a), border(&b));
    assert_eq!(a.write_ranges(txn(1)), b.write_ranges(txn(1)));
}

#[test]
fn foreign_write_splits_and_unlock_rejoins() {
    let ltm = manager();
    let lt = open(&ltm, 1);
    lt.acquire_write(txn(1), key(10)).unwrap();
    lt.acquire_write(txn(1), key(30)).unwrap();
    assert_eq!(border(&lt), vec![(range(10, 30), 1)]);

    lt.acquire_write_range(txn(2), key(15), key(25)).unwrap();
    assert_eq!(
        border(&lt),
        vec![(range(10, 10), 1), (range(15, 25), 2), (range(30, 30), 1)]
    );
    lt.verify().unwrap();

    lt.unlock(txn(2)).unwrap();
    assert_eq!(border(&lt), vec![(range(10, 30), 1)]);
    lt.verify().unwrap();
}

#[test]
fn reads_never_enter_borderwrite() {
    let ltm = manager();
    let lt = open(&ltm, 1);
    lt.acquire_read_range(txn(1), key(1), key(50)).unwrap();
    lt.acquire_read(txn(2), key(20)).unwrap();
    assert!(lt.borderwrite_ranges().is_empty());
}

#[derive(Debug, Clone)]
enum Op {
    Read(u64, u8, u8),
    Write(u64, u8, u8),
    Unlock(u64),
}

fn op() -> impl Strategy<Value = Op> {
    let bounds = (0u8..40, 0u8..4).prop_map(|(l, w)| (l, l.saturating_add(w)));
    prop_oneof![
        (1u64..5, bounds.clone()).prop_map(|(t, (l, r))| Op::Read(t, l, r)),
        (1u64..5, bounds).prop_map(|(t, (l, r))| Op::Write(t, l, r)),
        (1u64..5).prop_map(Op::Unlock),
    ]
}

proptest! {
    #[test]
    fn random_operations_keep_tree_consistent(ops in prop::collection::vec(op(), 1..60)) {
        let ltm = manager();
        let lt = open(&ltm, 1);
        for op in ops {
            let result = match op {
                Op::Read(t, l, r) => lt.acquire_read_range(txn(t), key(l), key(r)),
                Op::Write(t, l, r) => lt.acquire_write_range(txn(t), key(l), key(r)),
                Op::Unlock(t) => lt.unlock(txn(t)),
            };
            prop_assert!(matches!(result, Ok(()) | Err(LockError::NotGranted)));
            prop_assert!(lt.verify().is_ok());
        }
        prop_assert_eq!(ltm.status().curr_locks, lt.lock_count());
    }
}
