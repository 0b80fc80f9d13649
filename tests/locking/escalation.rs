//! Escalation and Capacity Tests
//!
//! When a grant would exceed the lock limits the manager escalates: each
//! transaction's ranges are joined where no other transaction is in the way.

use crate::common::*;
use proptest::prelude::*;

#[test]
fn interleaved_owners_run_out_of_locks() {
    let ltm = manager_with_max_locks(10);
    let lt = open(&ltm, 1);
    let (a, b) = (txn(1), txn(2));
    for k in 1..=10u8 {
        let owner = if k % 2 == 1 { a } else { b };
        lt.acquire_write(owner, key(k)).unwrap();
    }
    assert_eq!(ltm.status().curr_locks, 10);
    assert!(lt.escalation_allowed());

    assert_eq!(lt.acquire_write(txn(3), key(20)), Err(LockError::OutOfLocks));
    assert!(!lt.escalation_allowed());
    let status = ltm.status();
    assert_eq!(status.escalation_failures, 1);
    assert_eq!(status.write_locks_out_of_locks, 1);

    // No second escalation pass until someone unlocks.
    assert_eq!(lt.acquire_read(txn(3), key(20)), Err(LockError::OutOfLocks));
    assert_eq!(ltm.status().escalation_failures, 1);

    ltm.unlock_txn(a).unwrap();
    assert!(lt.escalation_allowed());
    lt.acquire_write(txn(3), key(20)).unwrap();
    lt.verify().unwrap();
}

#[test]
fn escalation_makes_room_for_single_owner() {
    let ltm = manager_with_max_locks(10);
    let lt = open(&ltm, 1);
    for k in 1..=10u8 {
        lt.acquire_write(txn(1), key(k)).unwrap();
    }
    lt.acquire_write(txn(2), key(50)).unwrap();

    let status = ltm.status();
    assert_eq!(status.escalation_successes, 1);
    assert_eq!(status.curr_locks, 2);
    assert_eq!(lt.write_ranges(txn(1)), vec![range(1, 10)]);
    for k in 1..=10u8 {
        assert!(lt.txn_holds_write(txn(1), &key(k)));
    }
    lt.verify().unwrap();
}

#[test]
fn escalation_spans_all_trees() {
    let ltm = manager_with_max_locks(6);
    let t1 = open(&ltm, 1);
    let t2 = open(&ltm, 2);
    for k in [1u8, 2, 3] {
        t1.acquire_read(txn(1), key(k)).unwrap();
        t2.acquire_read(txn(1), key(k)).unwrap();
    }
    t2.acquire_read(txn(1), key(9)).unwrap();
    assert_eq!(t1.lock_count(), 1);
    assert_eq!(t2.lock_count(), 2);
}

#[test]
fn memory_limit_is_enforced() {
    let ltm = manager();
    let lt = open(&ltm, 1);
    lt.acquire_write(txn(1), key(1)).unwrap();
    let held = ltm.status().curr_lock_memory;
    ltm.set_max_lock_memory(held).unwrap();

    assert_eq!(lt.acquire_write(txn(2), key(2)), Err(LockError::OutOfLocks));
    ltm.unlock_txn(txn(1)).unwrap();
    lt.acquire_write(txn(2), key(2)).unwrap();
}

#[test]
fn pending_request_granted_when_unlock_frees_room() {
    let ltm = manager_with_max_locks(2);
    let lt = open(&ltm, 1);
    lt.acquire_write(txn(1), key(5)).unwrap();
    lt.acquire_write(txn(2), key(1)).unwrap();

    let mut req = LockRequest::read(&lt, txn(3), key(5), key(5));
    assert_eq!(req.start().unwrap(), RequestState::Pending);

    assert_eq!(lt.acquire_write(txn(2), key(3)), Err(LockError::OutOfLocks));
    assert!(!lt.escalation_allowed());

    // Unlocking 1 removes the conflict and frees a slot.
    ltm.unlock_txn(txn(1)).unwrap();
    req.wait(Some(std::time::Duration::ZERO)).unwrap();
    assert!(lt.txn_holds_read(txn(3), &key(5)));
}

#[derive(Debug, Clone)]
enum Op {
    Read(u64, u8),
    Write(u64, u8),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1u64..4, 0u8..32).prop_map(|(t, k)| Op::Read(t, k)),
        (1u64..4, 0u8..32).prop_map(|(t, k)| Op::Write(t, k)),
    ]
}

proptest! {
    #[test]
    fn escalation_keeps_keys_and_creates_no_conflicts(ops in prop::collection::vec(op(), 1..50)) {
        let ltm = manager();
        let lt = open(&ltm, 1);
        let mut held = Vec::new();
        for op in &ops {
            let (t, k, mode) = match *op {
                Op::Read(t, k) => (t, k, LockMode::Read),
                Op::Write(t, k) => (t, k, LockMode::Write),
            };
            let result = match mode {
                LockMode::Read => lt.acquire_read(txn(t), key(k)),
                LockMode::Write => lt.acquire_write(txn(t), key(k)),
            };
            if result.is_ok() {
                held.push((t, k, mode));
            }
        }

        let before = lt.lock_count();
        lt.escalate().unwrap();
        prop_assert!(lt.verify().is_ok());
        prop_assert!(lt.lock_count() <= before);
        for (t, k, mode) in held {
            let still = match mode {
                LockMode::Read => lt.txn_holds_read(txn(t), &key(k)),
                LockMode::Write => lt.txn_holds_write(txn(t), &key(k)),
            };
            prop_assert!(still);
        }
    }
}
