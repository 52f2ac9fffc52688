//! Transaction wait-for graph with strongly-connected-component search.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::common::TransactionId;

/// Directed graph of "waits for" edges between transactions.
///
/// An edge `A -> B` means A is blocked on a lock B holds. A deadlock exists
/// exactly when some strongly-connected component has more than one member.
/// Self-edges are never stored.
#[derive(Debug, Default, Clone)]
pub struct WaitForGraph {
    edges: HashMap<TransactionId, BTreeSet<TransactionId>>,
}

impl WaitForGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `waiter -> holder`. Ignored when both are the same transaction.
    pub fn add_edge(&mut self, waiter: TransactionId, holder: TransactionId) {
        if waiter != holder {
            self.edges.entry(waiter).or_default().insert(holder);
        }
    }

    /// Replace every outgoing edge of `waiter` with edges to `holders`.
    pub fn set_waits<I>(&mut self, waiter: TransactionId, holders: I)
    where
        I: IntoIterator<Item = TransactionId>,
    {
        let targets: BTreeSet<TransactionId> =
            holders.into_iter().filter(|h| *h != waiter).collect();
        if targets.is_empty() {
            self.edges.remove(&waiter);
        } else {
            self.edges.insert(waiter, targets);
        }
    }

    /// Drop every edge leaving `waiter`.
    pub fn remove_waiter(&mut self, waiter: TransactionId) {
        self.edges.remove(&waiter);
    }

    /// Drop every edge leaving or entering `txn`.
    pub fn remove_transaction(&mut self, txn: TransactionId) {
        self.edges.remove(&txn);
        self.edges.retain(|_, targets| {
            targets.remove(&txn);
            !targets.is_empty()
        });
    }

    /// Transactions `waiter` is currently waiting on, in id order.
    pub fn waits_for(&self, waiter: TransactionId) -> Vec<TransactionId> {
        self.edges
            .get(&waiter)
            .map(|t| t.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(|t| t.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Strongly-connected components (Tarjan, linear in nodes + edges).
    ///
    /// Nodes are visited in id order so the result is deterministic.
    pub fn strongly_connected_components(&self) -> Vec<Vec<TransactionId>> {
        let nodes: BTreeSet<TransactionId> = self
            .edges
            .iter()
            .flat_map(|(from, to)| std::iter::once(*from).chain(to.iter().copied()))
            .collect();

        let mut tarjan = Tarjan::new(&self.edges);
        for node in nodes {
            if !tarjan.index_of.contains_key(&node) {
                tarjan.visit(node);
            }
        }
        tarjan.components
    }

    /// Whether any component is a cycle.
    pub fn has_cycle(&self) -> bool {
        self.strongly_connected_components().iter().any(|c| {
            c.len() > 1 || self.edges.get(&c[0]).is_some_and(|t| t.contains(&c[0]))
        })
    }
}

struct Tarjan<'g> {
    edges: &'g HashMap<TransactionId, BTreeSet<TransactionId>>,
    next_index: usize,
    index_of: HashMap<TransactionId, usize>,
    lowlink: HashMap<TransactionId, usize>,
    stack: Vec<TransactionId>,
    on_stack: HashSet<TransactionId>,
    components: Vec<Vec<TransactionId>>,
}

impl<'g> Tarjan<'g> {
    fn new(edges: &'g HashMap<TransactionId, BTreeSet<TransactionId>>) -> Self {
        Self {
            edges,
            next_index: 0,
            index_of: HashMap::new(),
            lowlink: HashMap::new(),
            stack: Vec::new(),
            on_stack: HashSet::new(),
            components: Vec::new(),
        }
    }

    fn visit(&mut self, v: TransactionId) {
        self.index_of.insert(v, self.next_index);
        self.lowlink.insert(v, self.next_index);
        self.next_index += 1;
        self.stack.push(v);
        self.on_stack.insert(v);

        let edges = self.edges;
        for &w in edges.get(&v).into_iter().flatten() {
            if !self.index_of.contains_key(&w) {
                self.visit(w);
                let low = self.lowlink[&v].min(self.lowlink[&w]);
                self.lowlink.insert(v, low);
            } else if self.on_stack.contains(&w) {
                let low = self.lowlink[&v].min(self.index_of[&w]);
                self.lowlink.insert(v, low);
            }
        }

        if self.lowlink[&v] == self.index_of[&v] {
            let mut component = Vec::new();
            while let Some(w) = self.stack.pop() {
                self.on_stack.remove(&w);
                component.push(w);
                if w == v {
                    break;
                }
            }
            component.sort();
            self.components.push(component);
        }
    }
}
