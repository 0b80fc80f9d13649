//! Deadlock Detection Tests
//!
//! Requests that would wait are checked against the waits-for relation of
//! every pending request; closing a cycle fails the new request.

use crate::common::*;
use std::time::Duration;

const NO_WAIT: Option<Duration> = Some(Duration::ZERO);

/// A reads 1; B writes 3 and 7; C reads 5.
/// A's write of 5 waits on C, B's write of 1 waits on A: a chain, no cycle.
#[test]
fn waiting_chain_resolves_in_order() {
    let ltm = manager();
    let lt = open(&ltm, 1);
    let (a, b, c) = (txn(1), txn(2), txn(3));

    lt.acquire_read(a, key(1)).unwrap();
    lt.acquire_write(b, key(3)).unwrap();
    lt.acquire_write(b, key(7)).unwrap();
    lt.acquire_read(c, key(5)).unwrap();

    let mut a_w5 = LockRequest::write(&lt, a, key(5), key(5));
    assert_eq!(a_w5.start().unwrap(), RequestState::Pending);
    assert_eq!(a_w5.conflicts().as_slice(), &[c]);

    let mut b_w1 = LockRequest::write(&lt, b, key(1), key(1));
    assert_eq!(b_w1.start().unwrap(), RequestState::Pending);
    assert_eq!(b_w1.conflicts().as_slice(), &[a]);

    ltm.unlock_txn(c).unwrap();
    assert_eq!(a_w5.state(), RequestState::Complete);
    a_w5.wait(NO_WAIT).unwrap();
    assert_eq!(b_w1.state(), RequestState::Pending);
    assert!(lt.txn_holds_write(a, &key(5)));

    ltm.unlock_txn(a).unwrap();
    b_w1.wait(NO_WAIT).unwrap();
    assert!(lt.txn_holds_write(b, &key(1)));
    lt.verify().unwrap();

    let status = ltm.status();
    assert_eq!(status.deadlocks, 0);
    assert_eq!(status.lock_waits, 2);
}

#[test]
fn three_way_cycle_is_refused() {
    let ltm = manager();
    let lt = open(&ltm, 1);
    for t in 1..=3u8 {
        lt.acquire_write(txn(t as u64), key(t)).unwrap();
    }

    let mut r1 = LockRequest::write(&lt, txn(1), key(2), key(2));
    assert_eq!(r1.start().unwrap(), RequestState::Pending);
    let mut r2 = LockRequest::write(&lt, txn(2), key(3), key(3));
    assert_eq!(r2.start().unwrap(), RequestState::Pending);

    let mut r3 = LockRequest::write(&lt, txn(3), key(1), key(1));
    assert_eq!(r3.start(), Err(LockError::Deadlock));
    assert_eq!(r3.state(), RequestState::Complete);
    assert_eq!(ltm.status().deadlocks, 1);

    // The victim aborts; the others drain.
    ltm.unlock_txn(txn(3)).unwrap();
    r2.wait(NO_WAIT).unwrap();
    ltm.unlock_txn(txn(2)).unwrap();
    r1.wait(NO_WAIT).unwrap();
}

#[test]
fn cycle_across_dictionaries_is_detected() {
    let ltm = manager();
    let d1 = open(&ltm, 1);
    let d2 = open(&ltm, 2);
    d1.acquire_write(txn(1), key(1)).unwrap();
    d2.acquire_write(txn(2), key(1)).unwrap();

    let mut r1 = LockRequest::read(&d2, txn(1), key(1), key(1));
    assert_eq!(r1.start().unwrap(), RequestState::Pending);
    let mut r2 = LockRequest::read(&d1, txn(2), key(1), key(1));
    assert_eq!(r2.start(), Err(LockError::Deadlock));
}

#[test]
fn timed_out_waiter_leaves_no_edge() {
    let ltm = manager();
    let lt = open(&ltm, 1);
    lt.acquire_write(txn(1), key(1)).unwrap();
    lt.acquire_write(txn(2), key(2)).unwrap();

    let mut r1 = LockRequest::write(&lt, txn(1), key(2), key(2));
    r1.start().unwrap();
    assert_eq!(r1.wait(NO_WAIT), Err(LockError::NotGranted));

    // 1 no longer waits on 2, so 2 may wait on 1.
    let mut r2 = LockRequest::write(&lt, txn(2), key(1), key(1));
    assert_eq!(r2.start().unwrap(), RequestState::Pending);
    ltm.unlock_txn(txn(1)).unwrap();
    r2.wait(NO_WAIT).unwrap();
}
