//! Lock tree handles
//!
//! A `LockTree` is an open handle on one dictionary's lock state. Handles
//! are reference counted by the manager: cloning opens another reference,
//! dropping closes one. The state itself lives in the manager and survives
//! the last handle while any transaction still holds locks in it.

use crate::manager::{ManagerShared, TreeId};
use crate::range_tree::Range;
use crate::request::{LockRequest, RequestState};
use crate::tree_state::{LockTreeState, LockUsage};
use rangelock_core::{
    DictionaryId, Interval, LockMode, LockResult, Point, PointComparator, TxnId, TxnidSet,
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Handle on one dictionary's locks
pub struct LockTree {
    shared: Arc<ManagerShared>,
    id: TreeId,
    dict: DictionaryId,
    cmp: PointComparator,
}

impl LockTree {
    pub(crate) fn new(
        shared: Arc<ManagerShared>,
        id: TreeId,
        dict: DictionaryId,
        cmp: PointComparator,
    ) -> Self {
        LockTree {
            shared,
            id,
            dict,
            cmp,
        }
    }

    pub(crate) fn shared(&self) -> &Arc<ManagerShared> {
        &self.shared
    }

    pub(crate) fn id(&self) -> TreeId {
        self.id
    }

    /// Dictionary this tree locks
    pub fn dict(&self) -> DictionaryId {
        self.dict
    }

    /// Ordering used for this tree's keys
    pub fn comparator(&self) -> &PointComparator {
        &self.cmp
    }

    fn read<R>(&self, default: R, f: impl FnOnce(&LockTreeState) -> R) -> R {
        self.shared.state.lock().trees.get(&self.id).map_or(default, f)
    }

    fn acquire_now(&self, txn: TxnId, interval: Interval, mode: LockMode) -> LockResult<()> {
        self.shared
            .state
            .lock()
            .acquire_now(self.id, txn, &interval, mode)
    }

    /// Read-lock `key` without waiting
    pub fn acquire_read(&self, txn: TxnId, key: Point) -> LockResult<()> {
        self.acquire_now(txn, Interval::point(key), LockMode::Read)
    }

    /// Read-lock `[left, right]` without waiting
    pub fn acquire_read_range(&self, txn: TxnId, left: Point, right: Point) -> LockResult<()> {
        self.acquire_now(txn, Interval::new(left, right), LockMode::Read)
    }

    /// Write-lock `key` without waiting
    pub fn acquire_write(&self, txn: TxnId, key: Point) -> LockResult<()> {
        self.acquire_now(txn, Interval::point(key), LockMode::Write)
    }

    /// Write-lock `[left, right]` without waiting
    pub fn acquire_write_range(&self, txn: TxnId, left: Point, right: Point) -> LockResult<()> {
        self.acquire_now(txn, Interval::new(left, right), LockMode::Write)
    }

    /// Lock `[left, right]`, waiting up to `timeout` for conflicting locks
    ///
    /// `None` uses the manager's default wait.
    pub fn acquire(
        &self,
        txn: TxnId,
        left: Point,
        right: Point,
        mode: LockMode,
        timeout: Option<Duration>,
    ) -> LockResult<()> {
        let mut request = LockRequest::new(self, txn, left, right, mode);
        match request.start()? {
            RequestState::Pending => request.wait(timeout),
            _ => Ok(()),
        }
    }

    /// Release every lock `txn` holds in this tree and wake waiters
    pub fn unlock(&self, txn: TxnId) -> LockResult<()> {
        let result = self.shared.state.lock().release(self.id, txn);
        self.shared.granted.notify_all();
        result
    }

    /// Check the tree's internal invariants
    pub fn verify(&self) -> LockResult<()> {
        self.shared.state.lock().verify_tree(self.id)
    }

    /// Escalate this tree's locks now, returning the usage freed
    pub fn escalate(&self) -> LockResult<LockUsage> {
        self.shared
            .state
            .lock()
            .mutate_tree(self.id, |t| t.escalate())
    }

    /// Whether escalation may still run on this tree
    pub fn escalation_allowed(&self) -> bool {
        self.read(false, |t| t.escalation_allowed)
    }

    /// Whether `txn` holds a read or write lock on `key`
    pub fn txn_holds_read(&self, txn: TxnId, key: &Point) -> bool {
        self.read(false, |t| t.holds(txn, key, LockMode::Read))
    }

    /// Whether `txn` holds a write lock on `key`
    pub fn txn_holds_write(&self, txn: TxnId, key: &Point) -> bool {
        self.read(false, |t| t.holds(txn, key, LockMode::Write))
    }

    /// `txn`'s read ranges in key order
    pub fn read_ranges(&self, txn: TxnId) -> Vec<Interval> {
        self.read(Vec::new(), |t| t.ranges(txn, LockMode::Read))
    }

    /// `txn`'s write ranges in key order
    pub fn write_ranges(&self, txn: TxnId) -> Vec<Interval> {
        self.read(Vec::new(), |t| t.ranges(txn, LockMode::Write))
    }

    /// Borderwrite runs in key order
    pub fn borderwrite_ranges(&self) -> Vec<Range> {
        self.read(Vec::new(), |t| t.borderwrite_ranges())
    }

    /// Locks stored in this tree
    pub fn lock_count(&self) -> u64 {
        self.read(0, |t| t.usage().locks)
    }

    /// Lock count and memory charged to this tree
    pub fn usage(&self) -> LockUsage {
        self.read(LockUsage::default(), |t| t.usage())
    }

    /// Requests waiting on this tree
    pub fn pending_requests(&self) -> usize {
        self.read(0, |t| t.pending.len())
    }

    /// Transactions whose locks would block `txn` from locking `[left, right]`
    pub fn conflicts(&self, txn: TxnId, left: Point, right: Point, mode: LockMode) -> TxnidSet {
        let interval = Interval::new(left, right);
        self.read(TxnidSet::new(), |t| t.conflicts(txn, &interval, mode))
    }
}

impl Clone for LockTree {
    fn clone(&self) -> Self {
        if let Some(tree) = self.shared.state.lock().trees.get_mut(&self.id) {
            tree.handle_refs += 1;
        }
        LockTree {
            shared: Arc::clone(&self.shared),
            id: self.id,
            dict: self.dict,
            cmp: self.cmp.clone(),
        }
    }
}

impl Drop for LockTree {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        if let Some(tree) = state.trees.get_mut(&self.id) {
            tree.handle_refs = tree.handle_refs.saturating_sub(1);
        }
        state.maybe_destroy(self.id);
    }
}

impl fmt::Debug for LockTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockTree")
            .field("dict", &self.dict)
            .field("tree", &self.id)
            .finish()
    }
}
