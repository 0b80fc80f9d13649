//! Points, intervals and key comparison
//!
//! Keys are opaque byte strings ordered by a comparator supplied per
//! resource. The key space is closed by two sentinels, `NegInf` and `PosInf`,
//! which compare below and above every real key without ever calling the
//! comparator.
//!
//! Resources that allow duplicate keys order points by key first and by a
//! secondary "data" component second. For such resources every real point
//! carries data; for unique-key resources no point does.

use crate::error::{LockError, LockResult};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Three-way comparison of raw keys
///
/// Implemented for any `Fn(&[u8], &[u8]) -> Ordering`, so closures can be
/// passed directly.
pub trait KeyComparator: Send + Sync {
    /// Compare two keys
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;
}

impl<F> KeyComparator for F
where
    F: Fn(&[u8], &[u8]) -> Ordering + Send + Sync,
{
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        self(a, b)
    }
}

/// Lexicographic byte comparison
#[derive(Debug, Clone, Copy, Default)]
pub struct BytewiseComparator;

impl KeyComparator for BytewiseComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }
}

/// A position in the key space
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Point {
    /// Below every key
    NegInf,
    /// Above every key
    PosInf,
    /// A real key, with the secondary component for duplicate-key resources
    Key {
        /// Primary key bytes
        key: Vec<u8>,
        /// Secondary component; present only for duplicate-key resources
        data: Option<Vec<u8>>,
    },
}

impl Point {
    /// A real key without a secondary component
    pub fn key(key: impl Into<Vec<u8>>) -> Self {
        Point::Key {
            key: key.into(),
            data: None,
        }
    }

    /// A real key with a secondary component
    pub fn key_with_data(key: impl Into<Vec<u8>>, data: impl Into<Vec<u8>>) -> Self {
        Point::Key {
            key: key.into(),
            data: Some(data.into()),
        }
    }

    /// Whether this is one of the two sentinels
    pub fn is_infinite(&self) -> bool {
        matches!(self, Point::NegInf | Point::PosInf)
    }

    /// Bytes charged against the lock memory budget for this point
    pub fn memory_size(&self) -> usize {
        match self {
            Point::NegInf | Point::PosInf => 0,
            Point::Key { key, data } => key.len() + data.as_ref().map_or(0, Vec::len),
        }
    }
}

impl fmt::Debug for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Point::NegInf => write!(f, "-inf"),
            Point::PosInf => write!(f, "+inf"),
            Point::Key { key, data: None } => write!(f, "{:?}", key),
            Point::Key {
                key,
                data: Some(data),
            } => write!(f, "{:?}/{:?}", key, data),
        }
    }
}

/// A closed interval `[left, right]` of points
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Interval {
    /// Lower bound, inclusive
    pub left: Point,
    /// Upper bound, inclusive
    pub right: Point,
}

impl Interval {
    /// Create an interval; ordering of the bounds is checked by the comparator
    pub fn new(left: Point, right: Point) -> Self {
        Interval { left, right }
    }

    /// Single-point interval
    pub fn point(point: Point) -> Self {
        Interval {
            left: point.clone(),
            right: point,
        }
    }

    /// The whole key space, `[-inf, +inf]`
    pub fn full() -> Self {
        Interval {
            left: Point::NegInf,
            right: Point::PosInf,
        }
    }

    /// Bytes charged against the lock memory budget for this interval
    ///
    /// Point locks store a single copy of the key.
    pub fn memory_size(&self) -> usize {
        if self.left == self.right {
            self.left.memory_size()
        } else {
            self.left.memory_size() + self.right.memory_size()
        }
    }
}

/// Point ordering for one resource
///
/// Cloning is cheap; the comparators are shared.
#[derive(Clone)]
pub struct PointComparator {
    key_cmp: Arc<dyn KeyComparator>,
    dup_cmp: Option<Arc<dyn KeyComparator>>,
}

impl PointComparator {
    /// Ordering for a unique-key resource
    pub fn new(key_cmp: Arc<dyn KeyComparator>) -> Self {
        PointComparator {
            key_cmp,
            dup_cmp: None,
        }
    }

    /// Ordering for a duplicate-key resource
    pub fn with_duplicates(key_cmp: Arc<dyn KeyComparator>, dup_cmp: Arc<dyn KeyComparator>) -> Self {
        PointComparator {
            key_cmp,
            dup_cmp: Some(dup_cmp),
        }
    }

    /// Bytewise ordering for a unique-key resource
    pub fn bytewise() -> Self {
        Self::new(Arc::new(BytewiseComparator))
    }

    /// Whether points carry a secondary component
    pub fn allows_duplicates(&self) -> bool {
        self.dup_cmp.is_some()
    }

    /// Compare two points
    pub fn compare(&self, a: &Point, b: &Point) -> Ordering {
        match (a, b) {
            (Point::NegInf, Point::NegInf) | (Point::PosInf, Point::PosInf) => Ordering::Equal,
            (Point::NegInf, _) | (_, Point::PosInf) => Ordering::Less,
            (Point::PosInf, _) | (_, Point::NegInf) => Ordering::Greater,
            (
                Point::Key {
                    key: ka,
                    data: da,
                },
                Point::Key {
                    key: kb,
                    data: db,
                },
            ) => match self.key_cmp.compare(ka, kb) {
                Ordering::Equal => match (da, db, &self.dup_cmp) {
                    (Some(da), Some(db), Some(dup)) => dup.compare(da, db),
                    (Some(da), Some(db), None) => self.key_cmp.compare(da, db),
                    (None, None, _) => Ordering::Equal,
                    (None, Some(_), _) => Ordering::Less,
                    (Some(_), None, _) => Ordering::Greater,
                },
                ord => ord,
            },
        }
    }

    /// `a <= b`
    pub fn le(&self, a: &Point, b: &Point) -> bool {
        self.compare(a, b) != Ordering::Greater
    }

    /// `a < b`
    pub fn lt(&self, a: &Point, b: &Point) -> bool {
        self.compare(a, b) == Ordering::Less
    }

    /// The smaller of two points
    pub fn min<'a>(&self, a: &'a Point, b: &'a Point) -> &'a Point {
        if self.le(a, b) {
            a
        } else {
            b
        }
    }

    /// The larger of two points
    pub fn max<'a>(&self, a: &'a Point, b: &'a Point) -> &'a Point {
        if self.le(a, b) {
            b
        } else {
            a
        }
    }

    /// Order intervals by left bound, then right bound
    pub fn compare_intervals(&self, a: &Interval, b: &Interval) -> Ordering {
        self.compare(&a.left, &b.left)
            .then_with(|| self.compare(&a.right, &b.right))
    }

    /// Whether two closed intervals share at least one point
    pub fn overlaps(&self, a: &Interval, b: &Interval) -> bool {
        self.le(&a.left, &b.right) && self.le(&b.left, &a.right)
    }

    /// Whether `outer` covers every point of `inner`
    pub fn contains(&self, outer: &Interval, inner: &Interval) -> bool {
        self.le(&outer.left, &inner.left) && self.le(&inner.right, &outer.right)
    }

    /// Whether the interval contains the point
    pub fn contains_point(&self, interval: &Interval, point: &Point) -> bool {
        self.le(&interval.left, point) && self.le(point, &interval.right)
    }

    /// Smallest interval covering both
    pub fn span(&self, a: &Interval, b: &Interval) -> Interval {
        Interval {
            left: self.min(&a.left, &b.left).clone(),
            right: self.max(&a.right, &b.right).clone(),
        }
    }

    /// Check that a real point matches the resource's duplicate configuration
    pub fn validate_point(&self, point: &Point) -> LockResult<()> {
        if let Point::Key { data, .. } = point {
            match (data.is_some(), self.allows_duplicates()) {
                (true, false) => {
                    return Err(LockError::invalid_argument(
                        "secondary key given for a unique-key resource",
                    ))
                }
                (false, true) => {
                    return Err(LockError::invalid_argument(
                        "secondary key missing for a duplicate-key resource",
                    ))
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Check both bounds and that `left <= right`
    pub fn validate_interval(&self, interval: &Interval) -> LockResult<()> {
        self.validate_point(&interval.left)?;
        self.validate_point(&interval.right)?;
        if self.lt(&interval.right, &interval.left) {
            return Err(LockError::invalid_argument(format!(
                "malformed range: {:?} > {:?}",
                interval.left, interval.right
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for PointComparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PointComparator")
            .field("allows_duplicates", &self.allows_duplicates())
            .finish()
    }
}
