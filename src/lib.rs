//! rangelock - Range lock manager for transactional storage engines
//!
//! Transactions take read and write locks on keys and key ranges of a
//! dictionary. Reads share, writes exclude; a transaction keeps its locks
//! until it unlocks.
//!
//! # Quick Start
//!
//! ```
//! use rangelock::{DictionaryId, LockManagerConfig, LockTreeManager, Point, PointComparator, TxnId};
//!
//! let ltm = LockTreeManager::new(LockManagerConfig::default())?;
//! let dict = DictionaryId::new(1).expect("valid id");
//! let lt = ltm.get_lock_tree(dict, PointComparator::bytewise())?;
//!
//! lt.acquire_write(TxnId(1), Point::key(b"user:123".to_vec()))?;
//! assert!(lt.acquire_read(TxnId(2), Point::key(b"user:123".to_vec())).is_err());
//!
//! ltm.unlock_txn(TxnId(1))?;
//! # Ok::<(), rangelock::LockError>(())
//! ```
//!
//! # Architecture
//!
//! Core types (keys, intervals, errors, configuration) live in
//! `rangelock-core`; the lock trees, requests and manager live in
//! `rangelock-concurrency`. Both are re-exported here.

pub use rangelock_concurrency::*;
pub use rangelock_core::*;
