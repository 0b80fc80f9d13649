//! Core types for the range lock manager
//!
//! This crate defines the foundational types used throughout the system:
//! - TxnId / DictionaryId: Transaction and resource identifiers
//! - TxnidSet: Sorted set of transaction ids (conflict sets, graph nodes)
//! - Point / Interval: Key-space positions with -inf/+inf sentinels
//! - KeyComparator / PointComparator: Per-resource key ordering
//! - LockError: Error taxonomy
//! - LockManagerConfig: Limits and timeouts

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod point;
pub mod types;

pub use config::{LockManagerConfig, DEFAULT_MAX_LOCKS, DEFAULT_MAX_LOCK_MEMORY};
pub use error::{LockError, LockResult};
pub use point::{BytewiseComparator, Interval, KeyComparator, Point, PointComparator};
pub use types::{DictionaryId, LockMode, TxnId, TxnidSet};
