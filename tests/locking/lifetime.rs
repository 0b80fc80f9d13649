//! Lock Tree Lifetime Tests
//!
//! Trees live while a handle, a lock or a pending request refers to them.

use crate::common::*;

#[test]
fn last_handle_destroys_unlocked_tree() {
    let ltm = manager();
    let lt = open(&ltm, 1);
    let clones: Vec<LockTree> = (0..3).map(|_| lt.clone()).collect();
    drop(lt);
    assert_eq!(ltm.tree_count(), 1);
    drop(clones);
    assert_eq!(ltm.tree_count(), 0);

    let status = ltm.status();
    assert_eq!(status.trees_created, 1);
    assert_eq!(status.trees_destroyed, 1);
}

#[test]
fn locks_keep_tree_alive_until_unlock() {
    let ltm = manager();
    let lt = open(&ltm, 1);
    lt.acquire_read(txn(1), key(1)).unwrap();
    lt.acquire_write(txn(2), key(2)).unwrap();
    drop(lt);

    ltm.unlock_txn(txn(1)).unwrap();
    assert_eq!(ltm.tree_count(), 1);
    ltm.unlock_txn(txn(2)).unwrap();
    assert_eq!(ltm.tree_count(), 0);
    assert_eq!(ltm.status().curr_locks, 0);
}

#[test]
fn unlock_txn_covers_every_tree() {
    let ltm = manager();
    let trees: Vec<LockTree> = (1..=3).map(|d| open(&ltm, d)).collect();
    for lt in &trees {
        lt.acquire_write(txn(1), key(1)).unwrap();
    }
    ltm.unlock_txn(txn(1)).unwrap();
    for lt in &trees {
        assert!(!lt.txn_holds_write(txn(1), &key(1)));
        lt.acquire_write(txn(2), key(1)).unwrap();
    }
}

#[test]
fn invalidated_dictionary_gets_fresh_tree() {
    let ltm = manager();
    let old = open(&ltm, 7);
    old.acquire_write(txn(1), key(1)).unwrap();

    ltm.invalidate(dict(7));
    let fresh = open(&ltm, 7);
    fresh.acquire_write(txn(2), key(1)).unwrap();
    assert!(old.txn_holds_write(txn(1), &key(1)));
    assert!(!fresh.txn_holds_write(txn(1), &key(1)));

    drop(old);
    drop(fresh);
    ltm.unlock_txn(txn(1)).unwrap();
    ltm.unlock_txn(txn(2)).unwrap();
    assert_eq!(ltm.tree_count(), 0);
    ltm.close().unwrap();
}

#[test]
fn close_fails_while_trees_live() {
    let ltm = manager();
    let lt = open(&ltm, 1);
    lt.acquire_write(txn(1), key(1)).unwrap();
    drop(lt);
    assert!(matches!(
        ltm.clone().close(),
        Err(LockError::InvalidArgument(_))
    ));
    ltm.unlock_txn(txn(1)).unwrap();
    ltm.close().unwrap();
}

#[test]
fn reserved_dictionary_rejected() {
    let ltm = manager();
    let result = ltm.get_lock_tree(DictionaryId::NONE, PointComparator::bytewise());
    assert!(matches!(result, Err(LockError::InvalidArgument(_))));
}
