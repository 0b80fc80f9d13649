//! Wait-for graph used for deadlock detection
//!
//! An edge `a -> b` means transaction `a` waits for a lock held by `b`.
//! Graphs are transient: the lock manager rebuilds one from the pending
//! requests every time a new request would have to wait, so no edge can
//! outlive the wait that produced it.
//!
//! Nodes and edges are enumerated in ascending transaction id order.

use rangelock_core::{TxnId, TxnidSet};
use std::collections::BTreeMap;

/// Directed graph over transaction ids
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WaitForGraph {
    adjacency: BTreeMap<TxnId, TxnidSet>,
}

impl WaitForGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every node and edge
    pub fn clear(&mut self) {
        self.adjacency.clear();
    }

    /// Add a node without edges; no-op if present
    pub fn add_node(&mut self, node: TxnId) {
        self.adjacency.entry(node).or_default();
    }

    /// Add the edge `from -> to`, creating either node as needed
    pub fn add_edge(&mut self, from: TxnId, to: TxnId) {
        self.add_node(to);
        self.adjacency.entry(from).or_default().insert(to);
    }

    /// Whether the node exists
    pub fn node_exists(&self, node: TxnId) -> bool {
        self.adjacency.contains_key(&node)
    }

    /// Whether the edge `from -> to` exists
    pub fn edge_exists(&self, from: TxnId, to: TxnId) -> bool {
        self.adjacency
            .get(&from)
            .map_or(false, |succ| succ.contains(to))
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Number of edges
    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(TxnidSet::len).sum()
    }

    /// Whether the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    /// Whether some path leads from `start` back to itself
    pub fn exist_cycle_from(&self, start: TxnId) -> bool {
        let mut visited = TxnidSet::new();
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            let Some(succ) = self.adjacency.get(&node) else {
                continue;
            };
            for next in succ {
                if next == start {
                    return true;
                }
                if visited.insert(next) {
                    stack.push(next);
                }
            }
        }
        false
    }

    /// Count the cycles through `start` and collect their edges
    ///
    /// Every simple path from `start` whose last edge returns to `start`
    /// counts once. Nodes and edges of those cycles are added to `cycles`;
    /// nothing else is.
    pub fn find_cycles_from(&self, start: TxnId, cycles: &mut WaitForGraph) -> usize {
        let mut path = vec![start];
        let mut on_path = TxnidSet::new();
        on_path.insert(start);
        self.cycles_from(start, start, &mut path, &mut on_path, cycles)
    }

    fn cycles_from(
        &self,
        start: TxnId,
        head: TxnId,
        path: &mut Vec<TxnId>,
        on_path: &mut TxnidSet,
        cycles: &mut WaitForGraph,
    ) -> usize {
        let Some(succ) = self.adjacency.get(&head) else {
            return 0;
        };
        let mut found = 0;
        for next in succ {
            if next == start {
                found += 1;
                for pair in path.windows(2) {
                    cycles.add_edge(pair[0], pair[1]);
                }
                cycles.add_edge(head, start);
            } else if !on_path.contains(next) {
                path.push(next);
                on_path.insert(next);
                found += self.cycles_from(start, next, path, on_path, cycles);
                on_path.remove(next);
                path.pop();
            }
        }
        found
    }

    /// Visit nodes in ascending order
    ///
    /// A non-zero return from `visit` stops the walk and is returned.
    pub fn apply_nodes<F>(&self, mut visit: F) -> i32
    where
        F: FnMut(TxnId) -> i32,
    {
        for &node in self.adjacency.keys() {
            let r = visit(node);
            if r != 0 {
                return r;
            }
        }
        0
    }

    /// Visit the edges leaving `node` in ascending target order
    ///
    /// A non-zero return from `visit` stops the walk and is returned.
    pub fn apply_edges<F>(&self, node: TxnId, mut visit: F) -> i32
    where
        F: FnMut(TxnId, TxnId) -> i32,
    {
        if let Some(succ) = self.adjacency.get(&node) {
            for next in succ {
                let r = visit(node, next);
                if r != 0 {
                    return r;
                }
            }
        }
        0
    }
}
