//! Lock requests
//!
//! A `LockRequest` is one transaction's attempt to lock a point or range.
//! Unlike the immediate `acquire_*` calls on `LockTree`, a request can wait:
//!
//! ```text
//! Unstarted --start()--> Complete            granted, deadlock, out of locks
//!           --start()--> Pending --wait()--> Complete
//! ```
//!
//! A pending request is retried, in arrival order, every time a transaction
//! unlocks in the same tree. A request that is dropped while pending is
//! cancelled.

use crate::locktree::LockTree;
use rangelock_core::{Interval, LockError, LockMode, LockResult, Point, TxnId, TxnidSet};
use std::fmt;
use std::time::{Duration, Instant};

/// Identifies a started request within its manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub(crate) u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request:{}", self.0)
    }
}

/// Lifecycle of a lock request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Created, not yet started
    Unstarted,
    /// Waiting for conflicting locks to be released
    Pending,
    /// Granted or failed; see `LockRequest::result`
    Complete,
}

/// One transaction's request for a lock on `[left, right]`
pub struct LockRequest {
    tree: LockTree,
    txn: TxnId,
    interval: Interval,
    mode: LockMode,
    id: Option<RequestId>,
}

impl LockRequest {
    /// Create an unstarted request
    pub fn new(tree: &LockTree, txn: TxnId, left: Point, right: Point, mode: LockMode) -> Self {
        LockRequest {
            tree: tree.clone(),
            txn,
            interval: Interval::new(left, right),
            mode,
            id: None,
        }
    }

    /// Request a read lock on `[left, right]`
    pub fn read(tree: &LockTree, txn: TxnId, left: Point, right: Point) -> Self {
        Self::new(tree, txn, left, right, LockMode::Read)
    }

    /// Request a write lock on `[left, right]`
    pub fn write(tree: &LockTree, txn: TxnId, left: Point, right: Point) -> Self {
        Self::new(tree, txn, left, right, LockMode::Write)
    }

    /// Requesting transaction
    pub fn txn(&self) -> TxnId {
        self.txn
    }

    /// Requested range
    pub fn interval(&self) -> &Interval {
        &self.interval
    }

    /// Requested mode
    pub fn mode(&self) -> LockMode {
        self.mode
    }

    /// Manager-assigned id, once started
    pub fn id(&self) -> Option<RequestId> {
        self.id
    }

    /// Try to take the lock
    ///
    /// Returns `Complete` if granted and `Pending` if the request now waits.
    /// Fails with `Deadlock` if waiting would close a cycle, `OutOfLocks` if
    /// there is no room, or `InvalidArgument` for a malformed range or a
    /// request that was already started.
    pub fn start(&mut self) -> LockResult<RequestState> {
        if self.id.is_some() {
            return Err(LockError::invalid_argument("lock request already started"));
        }
        let shared = self.tree.shared();
        let mut state = shared.state.lock();
        let rid = state.start_request(self.tree.id(), self.txn, self.interval.clone(), self.mode);
        self.id = Some(rid);

        let rec = state.request(rid)?;
        match (&rec.state, &rec.result) {
            (RequestState::Pending, _) => Ok(RequestState::Pending),
            (_, Some(Err(e))) => Err(e.clone()),
            _ => Ok(RequestState::Complete),
        }
    }

    /// Wait until the request completes or `timeout` runs out
    ///
    /// `None` uses the manager's default wait. A zero timeout never blocks.
    /// Running out of time fails the request with `NotGranted`.
    pub fn wait(&mut self, timeout: Option<Duration>) -> LockResult<()> {
        let Some(rid) = self.id else {
            return Err(LockError::invalid_argument("lock request not started"));
        };
        let shared = self.tree.shared();
        let mut state = shared.state.lock();
        let timeout = timeout.or_else(|| state.config.default_wait());
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));

        loop {
            let rec = state.request(rid)?;
            if rec.state == RequestState::Complete {
                return rec.result.clone().unwrap_or(Ok(()));
            }
            match deadline {
                Some(deadline) if Instant::now() >= deadline => {
                    state.expire_request(rid);
                    return Err(LockError::NotGranted);
                }
                Some(deadline) => {
                    shared.granted.wait_until(&mut state, deadline);
                }
                None => shared.granted.wait(&mut state),
            }
        }
    }

    /// Current state
    pub fn state(&self) -> RequestState {
        match self.id {
            None => RequestState::Unstarted,
            Some(rid) => self
                .tree
                .shared()
                .state
                .lock()
                .requests
                .get(&rid)
                .map_or(RequestState::Complete, |rec| rec.state),
        }
    }

    /// Outcome, once complete
    pub fn result(&self) -> Option<LockResult<()>> {
        let rid = self.id?;
        let state = self.tree.shared().state.lock();
        state.requests.get(&rid).and_then(|rec| rec.result.clone())
    }

    /// Transactions this request waits for, ascending
    ///
    /// Live while pending, empty once granted, the last conflicts seen for
    /// a request that failed.
    pub fn conflicts(&self) -> TxnidSet {
        match self.id {
            None => TxnidSet::new(),
            Some(rid) => self.tree.shared().state.lock().request_conflicts(rid),
        }
    }
}

impl Drop for LockRequest {
    fn drop(&mut self) {
        if let Some(rid) = self.id.take() {
            self.tree.shared().state.lock().drop_request(rid);
        }
    }
}

impl fmt::Debug for LockRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockRequest")
            .field("dict", &self.tree.dict())
            .field("txn", &self.txn)
            .field("interval", &self.interval)
            .field("mode", &self.mode)
            .field("id", &self.id)
            .finish()
    }
}
