//! Shared test utilities for all integration test suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]
#![allow(unused_imports)]

use std::sync::Once;

pub use rangelock::{
    DictionaryId, Interval, LockError, LockManagerConfig, LockMode, LockRequest, LockTree,
    LockTreeManager, Point, PointComparator, RequestState, TxnId,
};

// ============================================================================
// Initialization
// ============================================================================

static INIT_TRACING: Once = Once::new();

/// Install a fmt subscriber once; run with `--nocapture` to see lock manager logs.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// Keys and ids
// ============================================================================

/// Single-byte key
pub fn key(v: u8) -> Point {
    Point::key(vec![v])
}

/// Closed range of single-byte keys
pub fn range(l: u8, r: u8) -> Interval {
    Interval::new(key(l), key(r))
}

pub fn dict(id: u64) -> DictionaryId {
    DictionaryId::new(id).expect("non-reserved dictionary id")
}

pub fn txn(id: u64) -> TxnId {
    TxnId(id)
}

// ============================================================================
// Managers
// ============================================================================

/// Manager with default limits
pub fn manager() -> LockTreeManager {
    init_tracing();
    LockTreeManager::new(LockManagerConfig::default()).expect("default config is valid")
}

/// Manager with a lock count limit
pub fn manager_with_max_locks(max_locks: u32) -> LockTreeManager {
    init_tracing();
    let config = LockManagerConfig {
        max_locks,
        ..LockManagerConfig::default()
    };
    LockTreeManager::new(config).expect("config is valid")
}

/// Open a bytewise lock tree
pub fn open(ltm: &LockTreeManager, id: u64) -> LockTree {
    ltm.get_lock_tree(dict(id), PointComparator::bytewise())
        .expect("lock tree opens")
}
