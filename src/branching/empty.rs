use crate::branchcons::{BranchDecision, OrigConsId};
use crate::error::BnpResult;
use crate::state::SolverState;
use crate::tree::NodeId;
use super::{BranchRule, BranchingResult, ChildSpec};

/// Master side rule: every child created in the original tree gets its counterpart in the master tree.
///
/// It never picks a branching itself, the driver calls it for each node another rule creates.
#[derive(Debug, Default)]
pub struct EmptyBranchRule {
    pub mirrored: usize,
}

impl EmptyBranchRule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the root node together with its constraints in both trees
    pub fn create_root(&mut self, state: &mut SolverState) -> NodeId {
        let root = state.tree.create_root();
        let orig = state.cons.create_orig(root, None, BranchDecision::Root, None);
        self.mirror(state, root, orig);
        root
    }

    /// Creates and enqueues the children of `parent`
    pub fn create_children(&mut self, state: &mut SolverState, parent: NodeId, children: Vec<ChildSpec>) -> Vec<NodeId> {
        let parent_cons = state.tree.node(parent).orig_cons;
        children.into_iter().map(|child| {
            let node = state.tree.create_child(parent, child.lower_bound);
            let orig = state.cons.create_orig(node, parent_cons, child.decision, child.hook);
            self.mirror(state, node, orig);
            state.tree.enqueue(node);
            node
        }).collect()
    }

    fn mirror(&mut self, state: &mut SolverState, node: NodeId, orig: OrigConsId) {
        let master = state.cons.create_master(orig);
        let tree_node = state.tree.node_mut(node);
        tree_node.orig_cons = Some(orig);
        tree_node.master_cons = Some(master);
        self.mirrored += 1;
    }
}

impl BranchRule for EmptyBranchRule {
    fn name(&self) -> &'static str {
        "empty"
    }

    fn priority(&self) -> i32 {
        1_000_000
    }

    fn init(&mut self, _state: &SolverState) {
        self.mirrored = 0;
    }

    fn execute_fractional(&mut self, _state: &mut SolverState, _node: NodeId) -> BnpResult<BranchingResult> {
        Ok(BranchingResult::DidNotRun)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branchcons::BoundSense;
    use crate::problem::{Decomposition, OrigProblem, VarType};
    use crate::settings::Settings;
    use crate::solvers::{DenseSimplex, RowSense};
    use crate::ui::UISender;

    #[test]
    fn children_are_mirrored_into_the_master_tree() {
        let mut problem = OrigProblem::new();
        let x = problem.add_var("x", VarType::Integer, 0.0, 3.0, 1.0);
        problem.add_cons("demand", vec![(x, 1.0)], RowSense::Ge, 1.0);
        let mut decomposition = Decomposition::new();
        decomposition.add_block(vec![x], vec![]);
        let mut state = SolverState::new(problem, &decomposition, Settings::default(), UISender::detached(), Box::new(DenseSimplex::new())).unwrap();

        let mut rule = EmptyBranchRule::new();
        rule.init(&state);
        let root = rule.create_root(&mut state);
        let children = rule.create_children(&mut state, root, vec![
            ChildSpec { decision: BranchDecision::Bound { var: x, sense: BoundSense::Upper, bound: 1.0 }, lower_bound: 0.5, hook: None },
            ChildSpec { decision: BranchDecision::Bound { var: x, sense: BoundSense::Lower, bound: 2.0 }, lower_bound: 0.5, hook: None },
        ]);

        assert_eq!(rule.mirrored, 3);
        assert_eq!(state.tree.queue.len(), 2);
        for child in children {
            let node = state.tree.node(child);
            let (Some(orig), Some(master)) = (node.orig_cons, node.master_cons) else {
                panic!("child {child:?} is not mirrored");
            };
            assert_eq!(state.cons.orig(orig).master, Some(master));
            assert_eq!(state.cons.master(master).orig, orig);
            assert_eq!(state.cons.orig(orig).parent, state.tree.node(root).orig_cons);
        }

        assert!(matches!(rule.execute_fractional(&mut state, root).unwrap(), BranchingResult::DidNotRun));
        assert_eq!(rule.name(), "empty");
    }
}
