//! Per-resource lock state
//!
//! A lock tree records, for one dictionary:
//! - `selfread[T]`: the ranges transaction `T` holds read locks on
//! - `selfwrite[T]`: the ranges `T` holds write locks on
//! - `borderwrite`: one range per maximal run of a single owner's writes
//!
//! Ranges within each self tree never overlap; acquiring a range that
//! overlaps ranges the owner already holds replaces them with their span.
//!
//! ## Borderwrite
//!
//! Sort every transaction's write ranges by left bound and group consecutive
//! ranges with the same owner. Each group becomes one borderwrite range from
//! the group's first left bound to its last right bound. Borderwrite ranges
//! therefore never overlap and neighbours always have different owners.
//! A lookup in borderwrite finds the only transactions that can possibly
//! hold a write lock in a given range; their `selfwrite` trees confirm it.
//!
//! Everything here runs under the lock manager mutex; this module holds no
//! locks of its own.

use crate::range_tree::{Range, RangeTree};
use crate::request::RequestId;
use rangelock_core::{
    DictionaryId, Interval, LockError, LockMode, LockResult, Point, PointComparator, TxnId,
    TxnidSet,
};
use rustc_hash::FxHashMap;
use std::collections::VecDeque;

/// Lock count and memory charged to a tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockUsage {
    /// Stored read and write ranges
    pub locks: u64,
    /// Bytes charged for those ranges
    pub memory: u64,
}

impl LockUsage {
    pub(crate) fn of_range(range: &Range) -> Self {
        LockUsage {
            locks: 1,
            memory: range.memory_size() as u64,
        }
    }

    fn add(&mut self, other: LockUsage) {
        self.locks += other.locks;
        self.memory += other.memory;
    }

    fn sub(&mut self, other: LockUsage) {
        self.locks -= other.locks;
        self.memory -= other.memory;
    }
}

/// Lock state of one dictionary
pub(crate) struct LockTreeState {
    pub(crate) dict: DictionaryId,
    pub(crate) cmp: PointComparator,
    selfread: FxHashMap<TxnId, RangeTree>,
    selfwrite: FxHashMap<TxnId, RangeTree>,
    borderwrite: RangeTree,
    usage: LockUsage,
    /// Cleared when escalation could not make room, set again by unlock
    pub(crate) escalation_allowed: bool,
    /// Requests waiting on this tree, in arrival order
    pub(crate) pending: VecDeque<RequestId>,
    /// Open `LockTree` handles
    pub(crate) handle_refs: usize,
    /// Transactions that hold, held or wait for locks here and have not unlocked
    pub(crate) txn_refs: TxnidSet,
}

impl LockTreeState {
    pub(crate) fn new(dict: DictionaryId, cmp: PointComparator) -> Self {
        LockTreeState {
            dict,
            borderwrite: RangeTree::new(cmp.clone(), false),
            cmp,
            selfread: FxHashMap::default(),
            selfwrite: FxHashMap::default(),
            usage: LockUsage::default(),
            escalation_allowed: true,
            pending: VecDeque::new(),
            handle_refs: 0,
            txn_refs: TxnidSet::new(),
        }
    }

    pub(crate) fn usage(&self) -> LockUsage {
        self.usage
    }

    /// Whether the tree can be torn down
    pub(crate) fn is_unreferenced(&self) -> bool {
        self.handle_refs == 0 && self.txn_refs.is_empty() && self.pending.is_empty()
    }

    fn self_tree(&self, mode: LockMode, txn: TxnId) -> Option<&RangeTree> {
        match mode {
            LockMode::Read => self.selfread.get(&txn),
            LockMode::Write => self.selfwrite.get(&txn),
        }
    }

    /// Whether `txn` already holds a lock of at least `mode` covering `interval`
    pub(crate) fn is_covered(&self, txn: TxnId, interval: &Interval, mode: LockMode) -> bool {
        let covered_by = |tree: Option<&RangeTree>| {
            tree.map_or(false, |t| {
                t.find_overlaps(interval, 1)
                    .first()
                    .map_or(false, |r| self.cmp.contains(&r.interval, interval))
            })
        };
        match mode {
            LockMode::Write => covered_by(self.selfwrite.get(&txn)),
            LockMode::Read => {
                covered_by(self.selfwrite.get(&txn)) || covered_by(self.selfread.get(&txn))
            }
        }
    }

    /// Whether `txn` holds a lock of at least `mode` on `point`
    pub(crate) fn holds(&self, txn: TxnId, point: &Point, mode: LockMode) -> bool {
        self.is_covered(txn, &Interval::point(point.clone()), mode)
    }

    /// Transactions other than `txn` whose locks conflict with `mode` on `interval`
    ///
    /// Both modes conflict with foreign writes; writes also conflict with
    /// foreign reads.
    pub(crate) fn conflicts(&self, txn: TxnId, interval: &Interval, mode: LockMode) -> TxnidSet {
        let mut conflicts = TxnidSet::new();
        for border in self.borderwrite.find_overlaps(interval, 0) {
            if border.owner == txn {
                continue;
            }
            let writes = self.selfwrite.get(&border.owner);
            if writes.map_or(false, |w| w.overlaps_any(interval)) {
                conflicts.insert(border.owner);
            }
        }
        if mode == LockMode::Write {
            for (&owner, reads) in &self.selfread {
                if owner != txn && reads.overlaps_any(interval) {
                    conflicts.insert(owner);
                }
            }
        }
        conflicts
    }

    /// Lock usage that granting `interval` could add in the worst case
    pub(crate) fn grant_cost(interval: &Interval, txn: TxnId) -> LockUsage {
        LockUsage::of_range(&Range::new(interval.clone(), txn))
    }

    /// Record `interval` in `txn`'s self tree for `mode`, merging with what
    /// `txn` already holds there
    ///
    /// Returns the merged range actually stored. The caller has already
    /// checked for conflicts.
    fn insert_self(&mut self, txn: TxnId, interval: Interval, mode: LockMode) -> LockResult<Interval> {
        let map = match mode {
            LockMode::Read => &mut self.selfread,
            LockMode::Write => &mut self.selfwrite,
        };
        let tree = map
            .entry(txn)
            .or_insert_with(|| RangeTree::new(self.cmp.clone(), false));

        let mut merged = interval;
        for existing in tree.find_overlaps(&merged, 0) {
            merged = self.cmp.span(&merged, &existing.interval);
            tree.delete(&existing)?;
            self.usage.sub(LockUsage::of_range(&existing));
        }
        let range = Range::new(merged.clone(), txn);
        self.usage.add(LockUsage::of_range(&range));
        tree.insert(range)?;
        Ok(merged)
    }

    /// Grant a lock that passed the conflict check
    pub(crate) fn grant(&mut self, txn: TxnId, interval: Interval, mode: LockMode) -> LockResult<()> {
        let merged = self.insert_self(txn, interval, mode)?;
        if mode == LockMode::Write {
            self.borderwrite_insert(txn, merged)?;
        }
        self.txn_refs.insert(txn);
        Ok(())
    }

    /// Account `txn`'s write run `merged` in borderwrite
    ///
    /// Foreign border ranges the new run cuts through are trimmed to their
    /// owner's nearest writes on either side; the run absorbs any border
    /// range of its own and its immediate neighbours when they belong to
    /// `txn` as well.
    fn borderwrite_insert(&mut self, txn: TxnId, merged: Interval) -> LockResult<()> {
        let mut run = merged;
        for border in self.borderwrite.find_overlaps(&run, 0) {
            self.borderwrite.delete(&border)?;
            if border.owner == txn {
                run = self.cmp.span(&run, &border.interval);
                continue;
            }
            let writes = self.selfwrite.get(&border.owner).ok_or_else(|| {
                LockError::fatal(format!(
                    "borderwrite owner {} has no write locks",
                    border.owner
                ))
            })?;
            let mut split = false;
            if self.cmp.lt(border.left(), &run.left) {
                let last_before = writes.predecessor(&run.left).ok_or_else(|| {
                    LockError::fatal("borderwrite range has no write below the split point")
                })?;
                let left_part = Range::new(
                    Interval::new(border.left().clone(), last_before.right().clone()),
                    border.owner,
                );
                self.borderwrite.insert(left_part)?;
                split = true;
            }
            if self.cmp.lt(&run.right, border.right()) {
                let first_after = writes.successor(&run.right).ok_or_else(|| {
                    LockError::fatal("borderwrite range has no write above the split point")
                })?;
                let right_part = Range::new(
                    Interval::new(first_after.left().clone(), border.right().clone()),
                    border.owner,
                );
                self.borderwrite.insert(right_part)?;
                split = true;
            }
            if !split {
                return Err(LockError::fatal(format!(
                    "write by {} swallows the borderwrite run of {}",
                    txn, border.owner
                )));
            }
        }

        if let Some(pred) = self.borderwrite.predecessor(&run.left).cloned() {
            if pred.owner == txn {
                self.borderwrite.delete(&pred)?;
                run.left = pred.interval.left;
            }
        }
        if let Some(succ) = self.borderwrite.successor(&run.right).cloned() {
            if succ.owner == txn {
                self.borderwrite.delete(&succ)?;
                run.right = succ.interval.right;
            }
        }
        self.borderwrite.insert(Range::new(run, txn))?;
        Ok(())
    }

    /// Remove `txn`'s border ranges, joining neighbours that become adjacent
    fn borderwrite_remove(&mut self, txn: TxnId) -> LockResult<()> {
        let owned: Vec<Range> = self
            .borderwrite
            .iter()
            .filter(|r| r.owner == txn)
            .cloned()
            .collect();
        for border in owned {
            self.borderwrite.delete(&border)?;
            let pred = self.borderwrite.predecessor(border.left()).cloned();
            let succ = self.borderwrite.successor(border.right()).cloned();
            if let (Some(pred), Some(succ)) = (pred, succ) {
                if pred.owner == succ.owner {
                    self.borderwrite.delete(&pred)?;
                    self.borderwrite.delete(&succ)?;
                    let joined = Interval::new(pred.interval.left, succ.interval.right);
                    self.borderwrite.insert(Range::new(joined, pred.owner))?;
                }
            }
        }
        Ok(())
    }

    /// Release every lock `txn` holds here
    ///
    /// Returns true if `txn` held anything. Pending requests are the
    /// manager's to retry.
    pub(crate) fn unlock(&mut self, txn: TxnId) -> LockResult<bool> {
        let reads = self.selfread.remove(&txn);
        let writes = self.selfwrite.remove(&txn);
        let mut released = false;
        for tree in reads.iter().chain(writes.iter()) {
            for range in tree.iter() {
                self.usage.sub(LockUsage::of_range(range));
                released = true;
            }
        }
        if writes.is_some() {
            self.borderwrite_remove(txn)?;
        }
        self.txn_refs.remove(txn);
        Ok(released)
    }

    /// Replace `txn`'s ranges for `mode` with `ranges`
    ///
    /// Used by escalation; `ranges` must be sorted, disjoint and free of
    /// conflicts. Borderwrite is left alone: escalated write ranges never
    /// leave the owner's border runs.
    pub(crate) fn replace_ranges(
        &mut self,
        txn: TxnId,
        mode: LockMode,
        ranges: Vec<Interval>,
    ) -> LockResult<()> {
        let mut tree = RangeTree::new(self.cmp.clone(), false);
        for interval in ranges {
            tree.insert(Range::new(interval, txn))?;
        }
        let map = match mode {
            LockMode::Read => &mut self.selfread,
            LockMode::Write => &mut self.selfwrite,
        };
        let old = if tree.is_empty() {
            map.remove(&txn)
        } else {
            map.insert(txn, tree.clone())
        };
        if let Some(old) = old {
            for range in old.iter() {
                self.usage.sub(LockUsage::of_range(range));
            }
        }
        for range in tree.iter() {
            self.usage.add(LockUsage::of_range(range));
        }
        Ok(())
    }

    /// Transactions with locks of `mode`, ascending
    pub(crate) fn owners(&self, mode: LockMode) -> TxnidSet {
        match mode {
            LockMode::Read => self.selfread.keys().copied().collect(),
            LockMode::Write => self.selfwrite.keys().copied().collect(),
        }
    }

    /// `txn`'s ranges for `mode`, in order
    pub(crate) fn ranges(&self, txn: TxnId, mode: LockMode) -> Vec<Interval> {
        self.self_tree(mode, txn)
            .map(|t| t.iter().map(|r| r.interval.clone()).collect())
            .unwrap_or_default()
    }

    /// Borderwrite contents, in order
    pub(crate) fn borderwrite_ranges(&self) -> Vec<Range> {
        self.borderwrite.iter().cloned().collect()
    }

    /// Borderwrite as it must be for the current `selfwrite` trees
    fn expected_borderwrite(&self) -> Vec<Range> {
        let mut writes: Vec<&Range> = self.selfwrite.values().flat_map(|t| t.iter()).collect();
        writes.sort_by(|a, b| self.cmp.compare_intervals(&a.interval, &b.interval));

        let mut runs: Vec<Range> = Vec::new();
        for w in writes {
            match runs.last_mut() {
                Some(run) if run.owner == w.owner => {
                    run.interval.right = self.cmp.max(&run.interval.right, w.right()).clone();
                }
                _ => runs.push(w.clone()),
            }
        }
        runs
    }

    /// Check every structural invariant of the tree
    pub(crate) fn verify(&self) -> LockResult<()> {
        let corrupt = |msg: String| LockError::fatal(format!("{}: {}", self.dict, msg));

        let mut recomputed = LockUsage::default();
        for (mode, map) in [(LockMode::Read, &self.selfread), (LockMode::Write, &self.selfwrite)] {
            for (&txn, tree) in map {
                if tree.is_empty() {
                    return Err(corrupt(format!("empty {} tree kept for {}", mode, txn)));
                }
                tree.check_invariants()
                    .map_err(|e| corrupt(format!("{} tree of {}: {}", mode, txn, e)))?;
                for range in tree.iter() {
                    if range.owner != txn {
                        return Err(corrupt(format!(
                            "{} tree of {} holds a range of {}",
                            mode, txn, range.owner
                        )));
                    }
                    recomputed.add(LockUsage::of_range(range));
                }
                if !self.txn_refs.contains(txn) {
                    return Err(corrupt(format!("{} holds locks but is not referenced", txn)));
                }
            }
        }
        if recomputed != self.usage {
            return Err(corrupt(format!(
                "usage is {:?}, ranges add up to {:?}",
                self.usage, recomputed
            )));
        }

        self.borderwrite
            .check_invariants()
            .map_err(|e| corrupt(format!("borderwrite: {}", e)))?;
        let expected = self.expected_borderwrite();
        let actual = self.borderwrite_ranges();
        if expected != actual {
            return Err(corrupt(format!(
                "borderwrite is {:?}, writes imply {:?}",
                actual, expected
            )));
        }

        for (&txn, writes) in &self.selfwrite {
            for w in writes.iter() {
                let conflicts = self.conflicts(txn, &w.interval, LockMode::Write);
                if !conflicts.is_empty() {
                    return Err(corrupt(format!(
                        "write {:?} of {} conflicts with {:?}",
                        w.interval, txn, conflicts
                    )));
                }
            }
        }
        Ok(())
    }
}
