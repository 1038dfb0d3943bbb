use std::cmp::Ordering;
use binary_heap_plus::BinaryHeap;
use compare::Compare;
use crate::tree::NodeId;

#[derive(Clone, Copy, Debug)]
/// Entry of the open node queue
pub struct QueuedNode {
    pub node: NodeId,
    pub lower_bound: f64,
    pub depth: usize,
    /// creation number, used to make the order deterministic
    pub number: u64,
}

#[derive(Clone, Copy, Debug)]
/// Orders open nodes for the search.
///
/// Without an incumbent we dive (deepest first) to find a primal solution quickly,
/// afterwards the node with the smallest lower bound is processed first.
pub struct NodeComparator {
    with_bound: bool,
}

impl NodeComparator {
    pub fn with_bound() -> Self {
        NodeComparator { with_bound: true }
    }
    pub fn without_bound() -> Self {
        NodeComparator { with_bound: false }
    }
}

impl Compare<QueuedNode> for NodeComparator {
    // max heap: the "greatest" node is popped first
    fn compare(&self, l: &QueuedNode, r: &QueuedNode) -> Ordering {
        let by_bound = r.lower_bound.partial_cmp(&l.lower_bound).unwrap_or(Ordering::Equal);
        let by_depth = l.depth.cmp(&r.depth);
        let by_age = r.number.cmp(&l.number);

        if self.with_bound {
            by_bound.then(by_depth).then(by_age)
        } else {
            by_depth.then(by_bound).then(by_age)
        }
    }
}

/// Priority queue of open search tree nodes
pub struct NodeQueue {
    queue: BinaryHeap<QueuedNode, NodeComparator>,
    did_swap_priority: bool,
}

impl Default for NodeQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeQueue {
    pub fn new() -> Self {
        NodeQueue {
            queue: BinaryHeap::from_vec_cmp(vec![], NodeComparator::without_bound()),
            did_swap_priority: false,
        }
    }

    /// Switch to best bound order once the first incumbent is known
    pub fn now_has_bound(&mut self) {
        // only swap if not previously
        if !self.did_swap_priority {
            self.did_swap_priority = true;
            self.queue.replace_cmp(NodeComparator::with_bound());
        }
    }

    pub fn push(&mut self, node: QueuedNode) {
        self.queue.push(node);
    }

    pub fn pop(&mut self) -> Option<QueuedNode> {
        self.queue.pop()
    }

    /// Remove all nodes whose bound can't improve on `cutoff`, returns the removed nodes
    pub fn prune(&mut self, cutoff: f64, tol: f64) -> Vec<QueuedNode> {
        let (keep, removed): (Vec<_>, Vec<_>) = std::mem::replace(&mut self.queue, BinaryHeap::from_vec_cmp(vec![], NodeComparator::without_bound()))
            .into_vec()
            .into_iter()
            .partition(|n| n.lower_bound < cutoff - tol);

        let cmp = if self.did_swap_priority { NodeComparator::with_bound() } else { NodeComparator::without_bound() };
        self.queue = BinaryHeap::from_vec_cmp(keep, cmp);
        removed
    }

    pub fn lowest_bound(&self) -> Option<f64> {
        self.queue.iter().map(|i| i.lower_bound).min_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
