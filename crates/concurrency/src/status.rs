//! Lock manager status snapshot
//!
//! Counters accumulate for the lifetime of the manager. A snapshot is taken
//! under the manager mutex, so all fields are mutually consistent.

/// Point-in-time view of limits, usage and counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockManagerStatus {
    /// Configured lock count limit
    pub max_locks: u64,
    /// Locks currently held across all trees
    pub curr_locks: u64,
    /// Configured lock memory limit in bytes
    pub max_lock_memory: u64,
    /// Bytes currently charged for held locks
    pub curr_lock_memory: u64,

    /// Trees currently alive
    pub trees_live: u64,
    /// Highest number of trees alive at once
    pub trees_max_live: u64,
    /// Trees created since the manager started
    pub trees_created: u64,
    /// Trees destroyed since the manager started
    pub trees_destroyed: u64,

    /// Read locks granted
    pub read_locks_granted: u64,
    /// Read lock attempts that found a conflict
    pub read_locks_not_granted: u64,
    /// Read lock attempts refused for lack of capacity
    pub read_locks_out_of_locks: u64,
    /// Write locks granted
    pub write_locks_granted: u64,
    /// Write lock attempts that found a conflict
    pub write_locks_not_granted: u64,
    /// Write lock attempts refused for lack of capacity
    pub write_locks_out_of_locks: u64,

    /// Escalation passes that made room
    pub escalation_successes: u64,
    /// Escalation passes that left the manager over its limits
    pub escalation_failures: u64,

    /// Requests that had to wait
    pub lock_waits: u64,
    /// Waits that ended in a timeout
    pub lock_timeouts: u64,
    /// Requests refused because waiting would deadlock
    pub deadlocks: u64,
}

impl LockManagerStatus {
    /// Whether current usage exceeds either limit
    pub fn over_limits(&self) -> bool {
        self.curr_locks > self.max_locks || self.curr_lock_memory > self.max_lock_memory
    }
}
