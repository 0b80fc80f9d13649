//! Ordered container of owned key ranges
//!
//! A `RangeTree` keeps `[left, right] -> owner` ranges sorted by left bound,
//! then right bound, using the resource's `PointComparator`. Trees created
//! without overlap support (every tree the lock tree uses) reject any range
//! that intersects a stored one, which keeps ranges sorted by right bound as
//! well and lets overlap and neighbour queries use binary search.
//!
//! Merging and splitting are policy and live in the lock tree; this
//! container only stores, finds and removes exact ranges.

use rangelock_core::{Interval, LockError, Point, PointComparator, TxnId};
use std::cmp::Ordering;
use thiserror::Error;

/// Fixed per-range bookkeeping charged against the lock memory budget
pub const RANGE_OVERHEAD: usize = std::mem::size_of::<Range>();

/// A range of the key space owned by a transaction
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Range {
    /// Covered points
    pub interval: Interval,
    /// Owning transaction
    pub owner: TxnId,
}

impl Range {
    /// Create a range
    pub fn new(interval: Interval, owner: TxnId) -> Self {
        Range { interval, owner }
    }

    /// Lower bound
    pub fn left(&self) -> &Point {
        &self.interval.left
    }

    /// Upper bound
    pub fn right(&self) -> &Point {
        &self.interval.right
    }

    /// Bytes charged against the lock memory budget
    pub fn memory_size(&self) -> usize {
        self.interval.memory_size() + RANGE_OVERHEAD
    }
}

/// Range tree misuse; always an internal bug in the caller
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeTreeError {
    /// Insert into a no-overlap tree intersects a stored range
    #[error("range {0:?} overlaps a stored range")]
    Overlap(Interval),
    /// The exact range is already stored
    #[error("range {0:?} is already stored")]
    Duplicate(Interval),
    /// Delete of a range that is not stored
    #[error("range {0:?} is not stored")]
    NotFound(Interval),
}

impl From<RangeTreeError> for LockError {
    fn from(e: RangeTreeError) -> Self {
        LockError::fatal(format!("range tree: {}", e))
    }
}

/// Sorted range container
#[derive(Debug, Clone)]
pub struct RangeTree {
    cmp: PointComparator,
    allow_overlaps: bool,
    ranges: Vec<Range>,
}

impl RangeTree {
    /// Create an empty tree
    pub fn new(cmp: PointComparator, allow_overlaps: bool) -> Self {
        RangeTree {
            cmp,
            allow_overlaps,
            ranges: Vec::new(),
        }
    }

    /// Whether overlapping ranges may be stored
    pub fn allows_overlaps(&self) -> bool {
        self.allow_overlaps
    }

    fn compare_ranges(&self, a: &Range, b: &Range) -> Ordering {
        self.cmp
            .compare_intervals(&a.interval, &b.interval)
            .then_with(|| a.owner.cmp(&b.owner))
    }

    fn search(&self, range: &Range) -> Result<usize, usize> {
        self.ranges
            .binary_search_by(|probe| self.compare_ranges(probe, range))
    }

    /// Insert a range
    ///
    /// # Errors
    ///
    /// `Duplicate` if the exact range is stored, `Overlap` if the tree
    /// disallows overlaps and the range intersects a stored one.
    pub fn insert(&mut self, range: Range) -> Result<(), RangeTreeError> {
        let pos = match self.search(&range) {
            Ok(_) => return Err(RangeTreeError::Duplicate(range.interval)),
            Err(pos) => pos,
        };
        if !self.allow_overlaps {
            let hits_prev = pos > 0
                && self
                    .cmp
                    .overlaps(&self.ranges[pos - 1].interval, &range.interval);
            let hits_next = pos < self.ranges.len()
                && self.cmp.overlaps(&self.ranges[pos].interval, &range.interval);
            if hits_prev || hits_next {
                return Err(RangeTreeError::Overlap(range.interval));
            }
        }
        self.ranges.insert(pos, range);
        Ok(())
    }

    /// Delete an exact range
    pub fn delete(&mut self, range: &Range) -> Result<(), RangeTreeError> {
        match self.search(range) {
            Ok(pos) => {
                self.ranges.remove(pos);
                Ok(())
            }
            Err(_) => Err(RangeTreeError::NotFound(range.interval.clone())),
        }
    }

    /// Every stored range intersecting `query`, in left-ascending order
    ///
    /// `limit == 0` means no limit.
    pub fn find_overlaps(&self, query: &Interval, limit: usize) -> Vec<Range> {
        let end = self
            .ranges
            .partition_point(|r| self.cmp.le(r.left(), &query.right));
        let start = if self.allow_overlaps {
            0
        } else {
            self.ranges[..end].partition_point(|r| self.cmp.lt(r.right(), &query.left))
        };
        let hits = self.ranges[start..end]
            .iter()
            .filter(|r| self.cmp.le(&query.left, r.right()));
        if limit == 0 {
            hits.cloned().collect()
        } else {
            hits.take(limit).cloned().collect()
        }
    }

    /// Whether any stored range intersects `query`
    pub fn overlaps_any(&self, query: &Interval) -> bool {
        !self.find_overlaps(query, 1).is_empty()
    }

    /// Stored range lying entirely below `point` with the greatest right bound
    pub fn predecessor(&self, point: &Point) -> Option<&Range> {
        if self.allow_overlaps {
            return self
                .ranges
                .iter()
                .filter(|r| self.cmp.lt(r.right(), point))
                .max_by(|a, b| self.cmp.compare(a.right(), b.right()));
        }
        let idx = self.ranges.partition_point(|r| self.cmp.lt(r.right(), point));
        idx.checked_sub(1).map(|i| &self.ranges[i])
    }

    /// Stored range lying entirely above `point` with the least left bound
    pub fn successor(&self, point: &Point) -> Option<&Range> {
        let idx = self.ranges.partition_point(|r| self.cmp.le(r.left(), point));
        self.ranges.get(idx)
    }

    /// Number of stored ranges
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Check if the tree is empty
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Iterate in order
    pub fn iter(&self) -> impl Iterator<Item = &Range> {
        self.ranges.iter()
    }

    /// Remove every range
    pub fn clear(&mut self) {
        self.ranges.clear();
    }

    /// Total bytes charged for the stored ranges
    pub fn memory_size(&self) -> usize {
        self.ranges.iter().map(Range::memory_size).sum()
    }

    /// Check ordering, bound sanity and (for no-overlap trees) disjointness
    pub fn check_invariants(&self) -> Result<(), String> {
        for r in &self.ranges {
            if self.cmp.lt(r.right(), r.left()) {
                return Err(format!("range {:?} has left > right", r.interval));
            }
        }
        for pair in self.ranges.windows(2) {
            if self.compare_ranges(&pair[0], &pair[1]) != Ordering::Less {
                return Err(format!(
                    "ranges out of order: {:?} before {:?}",
                    pair[0].interval, pair[1].interval
                ));
            }
            if !self.allow_overlaps && self.cmp.overlaps(&pair[0].interval, &pair[1].interval) {
                return Err(format!(
                    "ranges overlap: {:?} and {:?}",
                    pair[0].interval, pair[1].interval
                ));
            }
        }
        Ok(())
    }
}
