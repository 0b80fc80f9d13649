//! Configuration Tests
//!
//! Managers built from TOML configuration and changed at runtime.

use crate::common::*;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn manager_from_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("locks.toml");
    std::fs::write(
        &path,
        "max_locks = 3\nmax_lock_memory = 1048576\ndefault_wait_time_ms = 25\n",
    )
    .unwrap();

    let config = LockManagerConfig::from_file(&path).unwrap();
    let ltm = LockTreeManager::new(config).unwrap();
    assert_eq!(ltm.max_locks(), 3);
    assert_eq!(ltm.max_lock_memory(), 1_048_576);
    assert_eq!(ltm.default_wait_time(), Some(Duration::from_millis(25)));

    let lt = open(&ltm, 1);
    for t in 1..=3 {
        lt.acquire_read(txn(t), key(t as u8)).unwrap();
    }
    assert_eq!(lt.acquire_read(txn(4), key(4)), Err(LockError::OutOfLocks));
}

#[test]
fn default_toml_matches_defaults() {
    let config = LockManagerConfig::from_toml_str(LockManagerConfig::default_toml()).unwrap();
    assert_eq!(config, LockManagerConfig::default());
    let ltm = LockTreeManager::new(config).unwrap();
    assert_eq!(ltm.default_wait_time(), None);
}

#[test]
fn runtime_limits_respect_usage() {
    let ltm = manager();
    let lt = open(&ltm, 1);
    for k in [1u8, 3, 5] {
        lt.acquire_write(txn(1), key(k)).unwrap();
    }
    assert!(matches!(
        ltm.set_max_locks(2),
        Err(LockError::InvalidArgument(_))
    ));
    ltm.set_max_locks(3).unwrap();

    let status = ltm.status();
    assert_eq!(status.max_locks, 3);
    assert_eq!(status.curr_locks, 3);
    assert!(!status.over_limits());
}
