//! Lock escalation
//!
//! When the manager runs out of lock capacity it asks every lock tree to
//! trade many small ranges for fewer large ones. Per transaction:
//!
//! - consecutive write ranges are joined as long as the joined range
//!   overlaps no other transaction's reads or writes;
//! - read ranges already covered by the transaction's own writes are dropped;
//! - consecutive remaining read ranges are joined as long as the joined
//!   range overlaps no other transaction's writes.
//!
//! Every key a transaction held stays held and no currently granted lock
//! gains a conflict. Joined write ranges never cross another owner's write,
//! so they stay inside the owner's borderwrite run and borderwrite is not
//! touched.

use crate::tree_state::{LockTreeState, LockUsage};
use rangelock_core::{Interval, LockMode, LockResult, TxnId};
use tracing::debug;

impl LockTreeState {
    /// Escalate every transaction's locks in this tree
    ///
    /// Returns the usage freed.
    pub(crate) fn escalate(&mut self) -> LockResult<LockUsage> {
        let before = self.usage();

        for txn in self.owners(LockMode::Write).iter() {
            self.escalate_txn(txn, LockMode::Write)?;
        }
        for txn in self.owners(LockMode::Read).iter() {
            self.escalate_txn(txn, LockMode::Read)?;
        }

        let after = self.usage();
        let freed = LockUsage {
            locks: before.locks.saturating_sub(after.locks),
            memory: before.memory.saturating_sub(after.memory),
        };
        debug!(
            target: "rangelock::escalation",
            dict = %self.dict,
            locks_before = before.locks,
            locks_after = after.locks,
            "Escalated lock tree"
        );
        Ok(freed)
    }

    fn escalate_txn(&mut self, txn: TxnId, mode: LockMode) -> LockResult<()> {
        let held = self.ranges(txn, mode);
        let joined = self.coalesce(txn, mode, &held);
        if joined.len() < held.len() {
            self.replace_ranges(txn, mode, joined)?;
        }
        Ok(())
    }

    /// Greedy left-to-right join of `txn`'s ranges that creates no conflict
    fn coalesce(&self, txn: TxnId, mode: LockMode, held: &[Interval]) -> Vec<Interval> {
        let mut out = Vec::with_capacity(held.len());
        let mut current: Option<Interval> = None;

        for range in held {
            if mode == LockMode::Read && self.is_covered(txn, range, LockMode::Write) {
                continue;
            }
            current = match current.take() {
                None => Some(range.clone()),
                Some(cur) => {
                    let candidate = Interval::new(cur.left.clone(), range.right.clone());
                    if self.conflicts(txn, &candidate, mode).is_empty() {
                        Some(candidate)
                    } else {
                        out.push(cur);
                        Some(range.clone())
                    }
                }
            };
        }
        out.extend(current);
        out
    }
}
