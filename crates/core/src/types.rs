//! Core identifier types for the lock manager
//!
//! This module defines the foundational types:
//! - TxnId: Transaction identifier supplied by the embedding engine
//! - DictionaryId: Opaque identifier of a locked resource (table / index)
//! - LockMode: Read or write
//! - TxnidSet: Sorted, duplicate-free set of transaction identifiers

use smallvec::SmallVec;
use std::fmt;

/// Transaction identifier
///
/// Supplied by the embedding engine's transaction manager. The lock manager
/// never allocates these, it only compares and stores them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TxnId(pub u64);

impl TxnId {
    /// Raw numeric value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for TxnId {
    fn from(id: u64) -> Self {
        TxnId(id)
    }
}

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn:{}", self.0)
    }
}

/// Identifier of a lockable resource (a dictionary)
///
/// `DictionaryId::NONE` is reserved and never names a real resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DictionaryId(u64);

impl DictionaryId {
    /// Reserved "no dictionary" value
    pub const NONE: DictionaryId = DictionaryId(u64::MAX);

    /// Create a dictionary id
    ///
    /// Returns `None` for the reserved value.
    pub fn new(id: u64) -> Option<Self> {
        let dict = DictionaryId(id);
        if dict.is_none() {
            None
        } else {
            Some(dict)
        }
    }

    /// Whether this is the reserved "no dictionary" value
    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }

    /// Raw numeric value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for DictionaryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "dict:none")
        } else {
            write!(f, "dict:{}", self.0)
        }
    }
}

/// Lock mode requested or held
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    /// Shared lock; compatible with other readers
    Read,
    /// Exclusive lock; conflicts with every other owner
    Write,
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockMode::Read => write!(f, "read"),
            LockMode::Write => write!(f, "write"),
        }
    }
}

/// Sorted, duplicate-free set of transaction ids
///
/// Iteration order is ascending numeric order. Conflict sets are small in
/// practice, so the set is a sorted inline vector rather than a tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TxnidSet {
    ids: SmallVec<[TxnId; 4]>,
}

impl TxnidSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a transaction id; returns false if it was already present
    pub fn insert(&mut self, txn: TxnId) -> bool {
        match self.ids.binary_search(&txn) {
            Ok(_) => false,
            Err(pos) => {
                self.ids.insert(pos, txn);
                true
            }
        }
    }

    /// Remove a transaction id; returns false if it was not present
    pub fn remove(&mut self, txn: TxnId) -> bool {
        match self.ids.binary_search(&txn) {
            Ok(pos) => {
                self.ids.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    /// Membership test
    pub fn contains(&self, txn: TxnId) -> bool {
        self.ids.binary_search(&txn).is_ok()
    }

    /// Number of ids
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Check if the set is empty
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Id at the given position in ascending order
    pub fn get(&self, index: usize) -> Option<TxnId> {
        self.ids.get(index).copied()
    }

    /// Iterate in ascending order
    pub fn iter(&self) -> impl Iterator<Item = TxnId> + '_ {
        self.ids.iter().copied()
    }

    /// Ids as an ascending slice
    pub fn as_slice(&self) -> &[TxnId] {
        &self.ids
    }

    /// Remove every id
    pub fn clear(&mut self) {
        self.ids.clear();
    }
}

impl FromIterator<TxnId> for TxnidSet {
    fn from_iter<I: IntoIterator<Item = TxnId>>(iter: I) -> Self {
        let mut set = TxnidSet::new();
        set.extend(iter);
        set
    }
}

impl Extend<TxnId> for TxnidSet {
    fn extend<I: IntoIterator<Item = TxnId>>(&mut self, iter: I) {
        for txn in iter {
            self.insert(txn);
        }
    }
}

impl<'a> IntoIterator for &'a TxnidSet {
    type Item = TxnId;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, TxnId>>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.iter().copied()
    }
}
