//! Lock tree manager
//!
//! Registry of lock trees keyed by dictionary, enforcing global limits on
//! lock count and lock memory. One mutex guards every tree, every pending
//! request and the counters; one condition variable wakes waiters whenever
//! an unlock may have granted something.
//!
//! ## Tree lifetime
//!
//! A tree is destroyed once no `LockTree` handle refers to it, no
//! transaction has locks in it that were not yet unlocked, and no request is
//! pending on it. `invalidate` detaches a tree from its dictionary: existing
//! handles keep using the detached tree, the next `get_lock_tree` for the
//! same dictionary gets a fresh one.
//!
//! ## Capacity
//!
//! Before a lock is stored the manager checks that the worst-case cost of
//! the new range fits under both limits. If it does not, every tree that
//! still allows escalation is escalated; if that is not enough the request
//! fails with `OutOfLocks` and those trees stop escalating until one of
//! their transactions unlocks.
//!
//! ## Lock domains
//!
//! The mutex and condition variable live in a `LockDomain`. A manager
//! normally creates its own; an engine that needs the lock manager's mutex
//! inside its own lock ordering creates the domain first, builds the manager
//! with `LockTreeManager::in_domain`, and takes `LockDomain::lock` wherever
//! its hierarchy requires it.

use crate::locktree::LockTree;
use crate::request::{RequestId, RequestState};
use crate::status::LockManagerStatus;
use crate::tree_state::{LockTreeState, LockUsage};
use crate::wfg::WaitForGraph;
use parking_lot::{Condvar, Mutex, MutexGuard};
use rangelock_core::{
    DictionaryId, Interval, LockError, LockManagerConfig, LockMode, LockResult, PointComparator,
    TxnId, TxnidSet,
};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Receives every fatal lock manager error
///
/// Fatal errors mean internal lock state is corrupt. The error is still
/// returned to the caller after the handler runs.
pub trait PanicHandler: Send + Sync {
    /// Called once per fatal error
    ///
    /// `dict` is `DictionaryId::NONE` when the error cannot be tied to a
    /// dictionary, e.g. a lock tree or request that no longer exists.
    fn on_fatal(&self, dict: DictionaryId, error: &LockError);
}

/// Default handler: logs the error
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPanicHandler;

impl PanicHandler for LogPanicHandler {
    fn on_fatal(&self, dict: DictionaryId, error: &LockError) {
        error!(target: "rangelock::ltm", dict = %dict, error = %error, "Fatal lock tree error");
    }
}

pub(crate) type TreeId = u64;

/// Manager-side record of one lock request
#[derive(Debug)]
pub(crate) struct RequestRecord {
    pub(crate) tree: TreeId,
    pub(crate) txn: TxnId,
    pub(crate) interval: Interval,
    pub(crate) mode: LockMode,
    pub(crate) state: RequestState,
    pub(crate) result: Option<LockResult<()>>,
    /// Last known conflicts
    pub(crate) conflicts: TxnidSet,
}

impl RequestRecord {
    fn complete(&mut self, result: LockResult<()>) {
        if result.is_ok() {
            self.conflicts.clear();
        }
        self.state = RequestState::Complete;
        self.result = Some(result);
    }
}

/// Outcome of one attempt to take a lock
pub(crate) enum Acquire {
    Granted,
    Blocked(TxnidSet),
}

pub(crate) struct ManagerState {
    pub(crate) config: LockManagerConfig,
    curr: LockUsage,
    dictionaries: FxHashMap<DictionaryId, TreeId>,
    pub(crate) trees: FxHashMap<TreeId, LockTreeState>,
    /// Trees each transaction has locked in
    txn_trees: FxHashMap<TxnId, SmallVec<[TreeId; 4]>>,
    pub(crate) requests: FxHashMap<RequestId, RequestRecord>,
    next_tree_id: TreeId,
    next_request_id: u64,
    counters: LockManagerStatus,
    panic_handler: Arc<dyn PanicHandler>,
    /// Set once a manager has been built on this state's domain
    attached: bool,
}

pub(crate) struct ManagerShared {
    pub(crate) state: Mutex<ManagerState>,
    /// Signalled after every unlock
    pub(crate) granted: Condvar,
}

/// Fatal error for state that should exist but does not
fn missing(handler: &dyn PanicHandler, what: String) -> LockError {
    let error = LockError::fatal(format!("{} does not exist", what));
    handler.on_fatal(DictionaryId::NONE, &error);
    error
}

/// The mutex and condition variable a lock tree manager runs under
///
/// Cheap to clone. At most one manager can be built on a domain.
#[derive(Clone)]
pub struct LockDomain {
    shared: Arc<ManagerShared>,
}

impl LockDomain {
    /// Create a domain with no manager attached
    pub fn new() -> Self {
        LockDomain {
            shared: Arc::new(ManagerShared {
                state: Mutex::new(ManagerState::new(
                    LockManagerConfig::default(),
                    Arc::new(LogPanicHandler),
                )),
                granted: Condvar::new(),
            }),
        }
    }

    /// Take the domain mutex
    ///
    /// Every lock manager operation on this domain, including waking
    /// waiters, is held off until the guard drops. Calling into the manager
    /// from the thread holding the guard deadlocks.
    pub fn lock(&self) -> DomainGuard<'_> {
        DomainGuard {
            _guard: self.shared.state.lock(),
        }
    }

    /// Whether a manager has been built on this domain
    pub fn has_manager(&self) -> bool {
        self.shared.state.lock().attached
    }
}

impl Default for LockDomain {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LockDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockDomain")
            .field("has_manager", &self.has_manager())
            .finish()
    }
}

/// Holds a `LockDomain`'s mutex
#[must_use = "the domain is unlocked as soon as the guard drops"]
pub struct DomainGuard<'a> {
    _guard: MutexGuard<'a, ManagerState>,
}

impl ManagerState {
    fn new(config: LockManagerConfig, panic_handler: Arc<dyn PanicHandler>) -> Self {
        ManagerState {
            config,
            curr: LockUsage::default(),
            dictionaries: FxHashMap::default(),
            trees: FxHashMap::default(),
            txn_trees: FxHashMap::default(),
            requests: FxHashMap::default(),
            next_tree_id: 1,
            next_request_id: 1,
            counters: LockManagerStatus::default(),
            panic_handler,
            attached: false,
        }
    }

    /// Pass `result` through, reporting a fatal error to the panic handler
    pub(crate) fn report<R>(&self, dict: DictionaryId, result: LockResult<R>) -> LockResult<R> {
        if let Err(e) = &result {
            if e.is_fatal() {
                self.panic_handler.on_fatal(dict, e);
            }
        }
        result
    }

    pub(crate) fn tree(&self, id: TreeId) -> LockResult<&LockTreeState> {
        self.trees
            .get(&id)
            .ok_or_else(|| missing(&*self.panic_handler, format!("lock tree {}", id)))
    }

    pub(crate) fn request(&self, rid: RequestId) -> LockResult<&RequestRecord> {
        self.requests
            .get(&rid)
            .ok_or_else(|| missing(&*self.panic_handler, rid.to_string()))
    }

    /// Check a tree's invariants
    pub(crate) fn verify_tree(&self, id: TreeId) -> LockResult<()> {
        let tree = self.tree(id)?;
        let dict = tree.dict;
        self.report(dict, tree.verify())
    }

    /// Run `f` on a tree, keeping the manager's usage in step with the tree's
    ///
    /// Fatal errors are reported to the panic handler before being returned.
    pub(crate) fn mutate_tree<R>(
        &mut self,
        id: TreeId,
        f: impl FnOnce(&mut LockTreeState) -> LockResult<R>,
    ) -> LockResult<R> {
        let tree = self
            .trees
            .get_mut(&id)
            .ok_or_else(|| missing(&*self.panic_handler, format!("lock tree {}", id)))?;
        let dict = tree.dict;
        let before = tree.usage();
        let result = f(tree);
        let after = tree.usage();

        self.curr.locks = (self.curr.locks + after.locks).saturating_sub(before.locks);
        self.curr.memory = (self.curr.memory + after.memory).saturating_sub(before.memory);
        self.report(dict, result)
    }

    fn fits(&self, cost: LockUsage) -> bool {
        self.curr.locks + cost.locks <= u64::from(self.config.max_locks)
            && self.curr.memory + cost.memory <= self.config.max_lock_memory
    }

    /// Make room for `cost`, escalating if needed
    ///
    /// Returns false if the limits still do not allow it.
    fn make_room(&mut self, cost: LockUsage) -> LockResult<bool> {
        if self.fits(cost) {
            return Ok(true);
        }
        let candidates: Vec<TreeId> = self
            .trees
            .iter()
            .filter(|(_, t)| t.escalation_allowed)
            .map(|(&id, _)| id)
            .collect();
        if candidates.is_empty() {
            return Ok(false);
        }

        let before = self.curr;
        for &id in &candidates {
            self.mutate_tree(id, |t| t.escalate())?;
        }
        if self.fits(cost) {
            self.counters.escalation_successes += 1;
            info!(
                target: "rangelock::escalation",
                trees = candidates.len(),
                locks_before = before.locks,
                locks_after = self.curr.locks,
                "Escalation made room"
            );
            return Ok(true);
        }

        for id in &candidates {
            if let Some(tree) = self.trees.get_mut(id) {
                tree.escalation_allowed = false;
            }
        }
        self.counters.escalation_failures += 1;
        warn!(
            target: "rangelock::escalation",
            trees = candidates.len(),
            curr_locks = self.curr.locks,
            max_locks = self.config.max_locks,
            "Escalation could not make room"
        );
        Ok(false)
    }

    /// Try to take a lock without waiting
    pub(crate) fn try_acquire(
        &mut self,
        id: TreeId,
        txn: TxnId,
        interval: &Interval,
        mode: LockMode,
    ) -> LockResult<Acquire> {
        let tree = self.tree(id)?;
        tree.cmp.validate_interval(interval)?;
        let dict = tree.dict;

        if !tree.is_covered(txn, interval, mode) {
            let conflicts = tree.conflicts(txn, interval, mode);
            if !conflicts.is_empty() {
                return Ok(Acquire::Blocked(conflicts));
            }
            if !self.make_room(LockTreeState::grant_cost(interval, txn))? {
                match mode {
                    LockMode::Read => self.counters.read_locks_out_of_locks += 1,
                    LockMode::Write => self.counters.write_locks_out_of_locks += 1,
                }
                warn!(target: "rangelock::locktree", dict = %dict, txn = %txn, %mode, "Out of locks");
                return Err(LockError::OutOfLocks);
            }
            self.mutate_tree(id, |t| t.grant(txn, interval.clone(), mode))?;
            let trees = self.txn_trees.entry(txn).or_default();
            if !trees.contains(&id) {
                trees.push(id);
            }
        }

        match mode {
            LockMode::Read => self.counters.read_locks_granted += 1,
            LockMode::Write => self.counters.write_locks_granted += 1,
        }
        debug!(target: "rangelock::locktree", dict = %dict, txn = %txn, %mode, "Lock granted");
        Ok(Acquire::Granted)
    }

    /// Take a lock without waiting, failing with `NotGranted` on conflict
    pub(crate) fn acquire_now(
        &mut self,
        id: TreeId,
        txn: TxnId,
        interval: &Interval,
        mode: LockMode,
    ) -> LockResult<()> {
        match self.try_acquire(id, txn, interval, mode)? {
            Acquire::Granted => Ok(()),
            Acquire::Blocked(_) => {
                self.count_not_granted(mode);
                Err(LockError::NotGranted)
            }
        }
    }

    fn count_not_granted(&mut self, mode: LockMode) {
        match mode {
            LockMode::Read => self.counters.read_locks_not_granted += 1,
            LockMode::Write => self.counters.write_locks_not_granted += 1,
        }
    }

    /// Release `txn`'s locks in one tree and retry what waits there
    ///
    /// The caller must wake waiters.
    pub(crate) fn release(&mut self, id: TreeId, txn: TxnId) -> LockResult<()> {
        let released = self.mutate_tree(id, |t| t.unlock(txn))?;
        if let Some(tree) = self.trees.get_mut(&id) {
            if released {
                tree.escalation_allowed = true;
            }
            debug!(target: "rangelock::locktree", dict = %tree.dict, txn = %txn, released, "Unlocked");
        }
        if let Some(trees) = self.txn_trees.get_mut(&txn) {
            trees.retain(|t| *t != id);
            if trees.is_empty() {
                self.txn_trees.remove(&txn);
            }
        }
        self.retry_pending(id)?;
        self.maybe_destroy(id);
        Ok(())
    }

    /// Release `txn`'s locks in every tree
    pub(crate) fn release_all(&mut self, txn: TxnId) -> LockResult<()> {
        let trees = self.txn_trees.remove(&txn).unwrap_or_default();
        for id in trees {
            self.release(id, txn)?;
        }
        Ok(())
    }

    /// Re-evaluate a tree's pending requests in arrival order
    fn retry_pending(&mut self, id: TreeId) -> LockResult<()> {
        let queue: Vec<RequestId> = match self.trees.get(&id) {
            Some(tree) => tree.pending.iter().copied().collect(),
            None => return Ok(()),
        };
        for rid in queue {
            let Some(rec) = self.requests.get(&rid) else {
                continue;
            };
            let (txn, interval, mode) = (rec.txn, rec.interval.clone(), rec.mode);
            let outcome = match self.try_acquire(id, txn, &interval, mode) {
                Ok(Acquire::Blocked(conflicts)) => {
                    if let Some(rec) = self.requests.get_mut(&rid) {
                        rec.conflicts = conflicts;
                    }
                    continue;
                }
                Ok(Acquire::Granted) => Ok(()),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => Err(e),
            };
            debug!(target: "rangelock::request", request = rid.0, txn = %txn, ok = outcome.is_ok(), "Pending request completed");
            self.finish_pending(rid, outcome);
        }
        Ok(())
    }

    /// Complete a pending request and drop it from its tree's queue
    fn finish_pending(&mut self, rid: RequestId, result: LockResult<()>) {
        if let Some(rec) = self.requests.get_mut(&rid) {
            rec.complete(result);
            let tree = rec.tree;
            if let Some(tree) = self.trees.get_mut(&tree) {
                tree.pending.retain(|r| *r != rid);
            }
        }
    }

    /// Whether `txn` waiting on `conflicts` closes a cycle of waiters
    ///
    /// The graph is rebuilt from the live conflicts of every pending request.
    /// Returns the transactions on the cycles through `txn`.
    fn deadlock_cycle(&mut self, txn: TxnId, conflicts: &TxnidSet) -> Option<TxnidSet> {
        let mut wfg = WaitForGraph::new();
        for to in conflicts {
            wfg.add_edge(txn, to);
        }

        let mut refreshed = Vec::new();
        for (&rid, rec) in &self.requests {
            if rec.state != RequestState::Pending {
                continue;
            }
            let Some(tree) = self.trees.get(&rec.tree) else {
                continue;
            };
            let live = tree.conflicts(rec.txn, &rec.interval, rec.mode);
            for to in &live {
                wfg.add_edge(rec.txn, to);
            }
            refreshed.push((rid, live));
        }
        for (rid, live) in refreshed {
            if let Some(rec) = self.requests.get_mut(&rid) {
                rec.conflicts = live;
            }
        }

        if !wfg.exist_cycle_from(txn) {
            return None;
        }
        let mut cycles = WaitForGraph::new();
        wfg.find_cycles_from(txn, &mut cycles);
        let mut members = TxnidSet::new();
        cycles.apply_nodes(|n| {
            members.insert(n);
            0
        });
        Some(members)
    }

    /// Register a request and try it once
    ///
    /// A conflict either completes the request with `Deadlock` or queues it.
    pub(crate) fn start_request(
        &mut self,
        id: TreeId,
        txn: TxnId,
        interval: Interval,
        mode: LockMode,
    ) -> RequestId {
        let rid = RequestId(self.next_request_id);
        self.next_request_id += 1;
        self.requests.insert(
            rid,
            RequestRecord {
                tree: id,
                txn,
                interval: interval.clone(),
                mode,
                state: RequestState::Unstarted,
                result: None,
                conflicts: TxnidSet::new(),
            },
        );

        let result = match self.try_acquire(id, txn, &interval, mode) {
            Ok(Acquire::Granted) => Ok(()),
            Ok(Acquire::Blocked(conflicts)) => {
                self.count_not_granted(mode);
                if let Some(cycle) = self.deadlock_cycle(txn, &conflicts) {
                    self.counters.deadlocks += 1;
                    warn!(
                        target: "rangelock::request",
                        request = rid.0,
                        txn = %txn,
                        cycle = ?cycle.as_slice(),
                        "Deadlock detected"
                    );
                    if let Some(rec) = self.requests.get_mut(&rid) {
                        rec.conflicts = conflicts;
                    }
                    Err(LockError::Deadlock)
                } else {
                    self.counters.lock_waits += 1;
                    debug!(
                        target: "rangelock::request",
                        request = rid.0,
                        txn = %txn,
                        %mode,
                        conflicts = ?conflicts.as_slice(),
                        "Request pending"
                    );
                    if let Some(tree) = self.trees.get_mut(&id) {
                        tree.pending.push_back(rid);
                    }
                    if let Some(rec) = self.requests.get_mut(&rid) {
                        rec.state = RequestState::Pending;
                        rec.conflicts = conflicts;
                    }
                    return rid;
                }
            }
            Err(e) => Err(e),
        };
        if let Some(rec) = self.requests.get_mut(&rid) {
            rec.complete(result);
        }
        rid
    }

    /// Give up on a pending request after its wait ran out
    pub(crate) fn expire_request(&mut self, rid: RequestId) {
        let Some(rec) = self.requests.get(&rid) else {
            return;
        };
        if rec.state != RequestState::Pending {
            return;
        }
        self.counters.lock_timeouts += 1;
        warn!(target: "rangelock::request", request = rid.0, txn = %rec.txn, "Lock wait timed out");
        self.finish_pending(rid, Err(LockError::NotGranted));
    }

    /// Forget a request, cancelling it if still pending
    pub(crate) fn drop_request(&mut self, rid: RequestId) {
        if let Some(rec) = self.requests.get(&rid) {
            if rec.state == RequestState::Pending {
                debug!(target: "rangelock::request", request = rid.0, txn = %rec.txn, "Pending request cancelled");
                self.finish_pending(rid, Err(LockError::NotGranted));
            }
        }
        if let Some(rec) = self.requests.remove(&rid) {
            self.maybe_destroy(rec.tree);
        }
    }

    /// Conflicts of a request: live while pending, last known otherwise
    pub(crate) fn request_conflicts(&self, rid: RequestId) -> TxnidSet {
        let Some(rec) = self.requests.get(&rid) else {
            return TxnidSet::new();
        };
        match rec.state {
            RequestState::Pending => self
                .trees
                .get(&rec.tree)
                .map(|t| t.conflicts(rec.txn, &rec.interval, rec.mode))
                .unwrap_or_default(),
            _ => rec.conflicts.clone(),
        }
    }

    pub(crate) fn open_tree(&mut self, dict: DictionaryId, cmp: PointComparator) -> LockResult<TreeId> {
        if dict.is_none() {
            return Err(LockError::invalid_argument("reserved dictionary id"));
        }
        if let Some(&id) = self.dictionaries.get(&dict) {
            let tree = self.tree(id)?;
            if tree.cmp.allows_duplicates() != cmp.allows_duplicates() {
                return Err(LockError::invalid_argument(format!(
                    "{} is already open with duplicates {}",
                    dict,
                    if tree.cmp.allows_duplicates() { "allowed" } else { "disallowed" }
                )));
            }
            return Ok(id);
        }

        let id = self.next_tree_id;
        self.next_tree_id += 1;
        self.trees.insert(id, LockTreeState::new(dict, cmp));
        self.dictionaries.insert(dict, id);

        self.counters.trees_created += 1;
        let live = self.trees.len() as u64;
        self.counters.trees_max_live = self.counters.trees_max_live.max(live);
        info!(target: "rangelock::ltm", dict = %dict, tree = id, "Lock tree created");
        Ok(id)
    }

    /// Destroy a tree nothing refers to any more
    pub(crate) fn maybe_destroy(&mut self, id: TreeId) {
        let Some(tree) = self.trees.get(&id) else {
            return;
        };
        if !tree.is_unreferenced() {
            return;
        }
        let dict = tree.dict;
        let leftover = tree.usage();
        self.trees.remove(&id);
        self.curr.locks = self.curr.locks.saturating_sub(leftover.locks);
        self.curr.memory = self.curr.memory.saturating_sub(leftover.memory);
        if self.dictionaries.get(&dict) == Some(&id) {
            self.dictionaries.remove(&dict);
        }
        self.counters.trees_destroyed += 1;
        info!(target: "rangelock::ltm", dict = %dict, tree = id, "Lock tree destroyed");
    }

    fn invalidate(&mut self, dict: DictionaryId) {
        if let Some(id) = self.dictionaries.remove(&dict) {
            info!(target: "rangelock::ltm", dict = %dict, tree = id, "Lock tree invalidated");
            self.maybe_destroy(id);
        }
    }

    fn status(&self) -> LockManagerStatus {
        LockManagerStatus {
            max_locks: u64::from(self.config.max_locks),
            curr_locks: self.curr.locks,
            max_lock_memory: self.config.max_lock_memory,
            curr_lock_memory: self.curr.memory,
            trees_live: self.trees.len() as u64,
            ..self.counters.clone()
        }
    }
}

/// Engine-wide registry of lock trees
///
/// Cheap to clone; clones share one registry.
#[derive(Clone)]
pub struct LockTreeManager {
    pub(crate) shared: Arc<ManagerShared>,
}

impl LockTreeManager {
    /// Create a manager that logs fatal errors
    pub fn new(config: LockManagerConfig) -> LockResult<Self> {
        Self::with_panic_handler(config, Arc::new(LogPanicHandler))
    }

    /// Create a manager with a custom fatal error handler
    pub fn with_panic_handler(
        config: LockManagerConfig,
        panic_handler: Arc<dyn PanicHandler>,
    ) -> LockResult<Self> {
        Self::in_domain(&LockDomain::new(), config, panic_handler)
    }

    /// Create a manager that runs under `domain`'s mutex
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an invalid config or a domain that
    /// already has a manager.
    pub fn in_domain(
        domain: &LockDomain,
        config: LockManagerConfig,
        panic_handler: Arc<dyn PanicHandler>,
    ) -> LockResult<Self> {
        config.validate()?;
        let mut state = domain.shared.state.lock();
        if state.attached {
            return Err(LockError::invalid_argument(
                "lock domain already has a manager",
            ));
        }
        info!(
            target: "rangelock::ltm",
            max_locks = config.max_locks,
            max_lock_memory = config.max_lock_memory,
            default_wait_time_ms = config.default_wait_time_ms,
            "Lock tree manager created"
        );
        state.config = config;
        state.panic_handler = panic_handler;
        state.attached = true;
        drop(state);

        Ok(LockTreeManager {
            shared: Arc::clone(&domain.shared),
        })
    }

    /// The domain this manager runs under
    pub fn domain(&self) -> LockDomain {
        LockDomain {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Open the lock tree of `dict`, creating it if needed
    ///
    /// An already open tree keeps its comparator; `cmp` must agree with it
    /// on whether duplicates are allowed.
    pub fn get_lock_tree(&self, dict: DictionaryId, cmp: PointComparator) -> LockResult<LockTree> {
        let mut state = self.shared.state.lock();
        let id = state.open_tree(dict, cmp)?;
        let tree = state.tree(id)?;
        let cmp = tree.cmp.clone();
        if let Some(tree) = state.trees.get_mut(&id) {
            tree.handle_refs += 1;
        }
        Ok(LockTree::new(Arc::clone(&self.shared), id, dict, cmp))
    }

    /// Detach `dict` from its tree
    ///
    /// Open handles keep the old tree; the next `get_lock_tree` creates a
    /// new one.
    pub fn invalidate(&self, dict: DictionaryId) {
        self.shared.state.lock().invalidate(dict);
    }

    /// Release every lock `txn` holds, in every tree
    pub fn unlock_txn(&self, txn: TxnId) -> LockResult<()> {
        let result = self.shared.state.lock().release_all(txn);
        self.shared.granted.notify_all();
        result
    }

    /// Change the lock count limit
    pub fn set_max_locks(&self, max_locks: u32) -> LockResult<()> {
        let mut state = self.shared.state.lock();
        if u64::from(max_locks) < state.curr.locks {
            return Err(LockError::invalid_argument(format!(
                "max_locks {} is below the {} locks held",
                max_locks, state.curr.locks
            )));
        }
        state.config.max_locks = max_locks;
        Ok(())
    }

    /// Change the lock memory limit
    pub fn set_max_lock_memory(&self, max_lock_memory: u64) -> LockResult<()> {
        let mut state = self.shared.state.lock();
        if max_lock_memory < state.curr.memory {
            return Err(LockError::invalid_argument(format!(
                "max_lock_memory {} is below the {} bytes held",
                max_lock_memory, state.curr.memory
            )));
        }
        state.config.max_lock_memory = max_lock_memory;
        Ok(())
    }

    /// Change the wait used when a request waits without a timeout
    ///
    /// `Duration::ZERO` waits forever; other waits round up to whole
    /// milliseconds.
    pub fn set_default_wait_time(&self, wait: Duration) {
        self.shared.state.lock().config.set_default_wait(wait);
    }

    /// Lock count limit
    pub fn max_locks(&self) -> u32 {
        self.shared.state.lock().config.max_locks
    }

    /// Lock memory limit
    pub fn max_lock_memory(&self) -> u64 {
        self.shared.state.lock().config.max_lock_memory
    }

    /// Default wait, `None` meaning unbounded
    pub fn default_wait_time(&self) -> Option<Duration> {
        self.shared.state.lock().config.default_wait()
    }

    /// Snapshot of limits, usage and counters
    pub fn status(&self) -> LockManagerStatus {
        self.shared.state.lock().status()
    }

    /// Number of live trees
    pub fn tree_count(&self) -> usize {
        self.shared.state.lock().trees.len()
    }

    /// Shut the manager down
    ///
    /// Fails while any tree is alive.
    pub fn close(self) -> LockResult<()> {
        let state = self.shared.state.lock();
        if !state.trees.is_empty() {
            return Err(LockError::invalid_argument(format!(
                "{} lock trees are still alive",
                state.trees.len()
            )));
        }
        info!(target: "rangelock::ltm", "Lock tree manager closed");
        Ok(())
    }
}

impl fmt::Debug for LockTreeManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("LockTreeManager")
            .field("trees", &state.trees.len())
            .field("curr_locks", &state.curr.locks)
            .field("max_locks", &state.config.max_locks)
            .finish()
    }
}
