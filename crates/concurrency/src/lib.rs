//! Range locking for concurrent transactions
//!
//! This crate implements pessimistic two-phase range locks with:
//! - RangeTree: Ordered, non-overlapping interval storage
//! - LockTree: Per-dictionary read/write locks with borderwrite tracking
//! - LockRequest: Waitable lock acquisition with deadlock detection
//! - WaitForGraph: Cycle detection over waiting transactions
//! - LockTreeManager: Registry of lock trees with global limits and escalation
//! - LockDomain: The mutex a manager runs under, shareable with an embedding engine
//!
//! Locks are held until the owning transaction unlocks; there is no
//! per-range release.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod escalation;
pub mod locktree;
pub mod manager;
pub mod range_tree;
pub mod request;
pub mod status;
mod tree_state;
pub mod wfg;

pub use locktree::LockTree;
pub use manager::{DomainGuard, LockDomain, LockTreeManager, LogPanicHandler, PanicHandler};
pub use range_tree::{Range, RangeTree, RangeTreeError};
pub use request::{LockRequest, RequestId, RequestState};
pub use status::LockManagerStatus;
pub use tree_state::LockUsage;
pub use wfg::WaitForGraph;
