use crate::branchcons::{MasterConsId, OrigConsId};
use crate::misc::node_queue::{NodeQueue, QueuedNode};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeStatus {
    Open,
    Focus,
    /// branched, waiting for its children
    Processed,
    Released,
}

#[derive(Debug, Clone)]
/// Node of the branch-and-bound tree
pub struct TreeNode {
    pub id: NodeId,
    /// creation number, the root has number 1
    pub number: u64,
    pub parent: Option<NodeId>,
    pub depth: usize,
    /// lower bound inherited from the parent, raised once the node is solved
    pub lower_bound: f64,
    pub children: Vec<NodeId>,
    pub orig_cons: Option<OrigConsId>,
    pub master_cons: Option<MasterConsId>,
    pub status: NodeStatus,
}

#[derive(Default)]
pub struct SearchTree {
    nodes: Vec<TreeNode>,
    node_counter: u64,
    pub focus: Option<NodeId>,
    pub queue: NodeQueue,
}

impl SearchTree {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_node(&mut self, parent: Option<NodeId>, depth: usize, lower_bound: f64) -> NodeId {
        self.node_counter += 1;
        let id = NodeId(self.nodes.len());
        self.nodes.push(TreeNode {
            id,
            number: self.node_counter,
            parent,
            depth,
            lower_bound,
            children: vec![],
            orig_cons: None,
            master_cons: None,
            status: NodeStatus::Open,
        });
        id
    }

    /// Returns the root node, initialized with default values
    pub fn create_root(&mut self) -> NodeId {
        assert!(self.nodes.is_empty(), "root created twice");
        self.push_node(None, 0, f64::NEG_INFINITY)
    }

    /// Given a node, create a child node starting with the parent bound
    pub fn create_child(&mut self, parent: NodeId, lower_bound: f64) -> NodeId {
        let depth = self.nodes[parent.0].depth + 1;
        let id = self.push_node(Some(parent), depth, lower_bound);
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut TreeNode {
        &mut self.nodes[id.0]
    }

    pub fn number(&self, id: NodeId) -> u64 {
        self.nodes[id.0].number
    }

    pub fn num_created(&self) -> u64 {
        self.node_counter
    }

    pub fn enqueue(&mut self, id: NodeId) {
        let node = &self.nodes[id.0];
        self.queue.push(QueuedNode { node: id, lower_bound: node.lower_bound, depth: node.depth, number: node.number });
    }

    /// Nodes from the root down to `id`
    pub fn path(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = vec![id];
        let mut current = id;
        while let Some(parent) = self.nodes[current.0].parent {
            path.push(parent);
            current = parent;
        }
        path.reverse();
        path
    }

    /// Walks at most `max_hops` parent edges from `from` looking for the node numbered `target`.
    /// Fails when the root is reached first.
    pub fn is_within_hops(&self, from: NodeId, target: u64, max_hops: i64) -> bool {
        let mut node = from;
        let mut hops = 0;
        loop {
            let current = &self.nodes[node.0];
            if current.number == target {
                return true;
            }
            if current.number == 1 || hops >= max_hops {
                return false;
            }
            match current.parent {
                Some(parent) => node = parent,
                None => return false,
            }
            hops += 1;
        }
    }

    /// Releases a finished node and every ancestor left without open children
    pub fn release(&mut self, id: NodeId) -> Vec<NodeId> {
        let mut released = vec![];
        let mut current = Some(id);
        while let Some(node) = current {
            self.nodes[node.0].status = NodeStatus::Released;
            self.nodes[node.0].children.clear();
            released.push(node);

            current = None;
            if let Some(parent) = self.nodes[node.0].parent {
                let siblings = &mut self.nodes[parent.0].children;
                siblings.retain(|c| *c != node);
                if siblings.is_empty() && self.nodes[parent.0].status == NodeStatus::Processed {
                    current = Some(parent);
                }
            }
        }
        released
    }
}
