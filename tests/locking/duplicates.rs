//! Duplicate-Key Dictionary Tests
//!
//! Dictionaries that allow duplicate keys lock (key, data) pairs: points
//! with the same key and different data are different points.

use crate::common::*;
use rangelock::BytewiseComparator;
use std::cmp::Ordering;
use std::sync::Arc;

fn dup_point(k: u8, d: u8) -> Point {
    Point::key_with_data(vec![k], vec![d])
}

fn dup_tree(ltm: &LockTreeManager) -> LockTree {
    let cmp = PointComparator::with_duplicates(
        Arc::new(BytewiseComparator),
        Arc::new(|a: &[u8], b: &[u8]| b.cmp(a)),
    );
    ltm.get_lock_tree(dict(1), cmp).unwrap()
}

#[test]
fn same_key_different_data_do_not_conflict() {
    let ltm = manager();
    let lt = dup_tree(&ltm);
    lt.acquire_write(txn(1), dup_point(5, 1)).unwrap();
    lt.acquire_write(txn(2), dup_point(5, 2)).unwrap();
    assert_eq!(
        lt.acquire_read(txn(3), dup_point(5, 1)),
        Err(LockError::NotGranted)
    );
    lt.verify().unwrap();
}

#[test]
fn data_order_comes_from_duplicate_comparator() {
    let ltm = manager();
    let lt = dup_tree(&ltm);
    // Data compares in reverse, so (5, 9) sorts before (5, 1).
    lt.acquire_read_range(txn(1), dup_point(5, 9), dup_point(5, 1))
        .unwrap();
    assert!(lt.txn_holds_read(txn(1), &dup_point(5, 4)));
    assert_eq!(
        lt.comparator().compare(&dup_point(5, 9), &dup_point(5, 1)),
        Ordering::Less
    );
}

#[test]
fn points_must_match_dictionary_kind() {
    let ltm = manager();
    let dup = dup_tree(&ltm);
    assert!(matches!(
        dup.acquire_write(txn(1), key(5)),
        Err(LockError::InvalidArgument(_))
    ));

    let plain = open(&ltm, 2);
    assert!(matches!(
        plain.acquire_write(txn(1), dup_point(5, 1)),
        Err(LockError::InvalidArgument(_))
    ));
}

#[test]
fn reopening_with_other_kind_is_rejected() {
    let ltm = manager();
    let _dup = dup_tree(&ltm);
    let result = ltm.get_lock_tree(dict(1), PointComparator::bytewise());
    assert!(matches!(result, Err(LockError::InvalidArgument(_))));
}

#[test]
fn table_lock_covers_all_duplicates() {
    let ltm = manager();
    let lt = dup_tree(&ltm);
    lt.acquire_read_range(txn(1), Point::NegInf, Point::PosInf)
        .unwrap();
    assert_eq!(
        lt.acquire_write(txn(2), dup_point(200, 3)),
        Err(LockError::NotGranted)
    );
}
