use std::fmt::{Display, Formatter};
use crate::branching::pseudocost::PseudocostHook;
use crate::master::column_pool::{ColumnId, MasterVar};
use crate::pricing::{PricingProblem, SideConstraint};
use crate::solvers::RowSense;
use crate::tree::{NodeId, SearchTree};
use crate::vars::{BlockAssignment, VarId, VarStore};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BoundSense {
    /// `var >= bound`
    Lower,
    /// `var <= bound`
    Upper,
}

#[derive(Clone, Debug, PartialEq)]
pub enum BranchDecision {
    Root,
    Bound { var: VarId, sense: BoundSense, bound: f64 },
    /// Ryan-Foster decision on two pricing variables of `block`
    Pair { block: usize, first: usize, second: usize, same: bool },
}

impl Display for BranchDecision {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BranchDecision::Root => write!(f, "root"),
            BranchDecision::Bound { var, sense: BoundSense::Lower, bound } => write!(f, "x{} >= {}", var.0, bound),
            BranchDecision::Bound { var, sense: BoundSense::Upper, bound } => write!(f, "x{} <= {}", var.0, bound),
            BranchDecision::Pair { block, first, second, same: true } => write!(f, "same(b{block}: {first}, {second})"),
            BranchDecision::Pair { block, first, second, same: false } => write!(f, "differ(b{block}: {first}, {second})"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OrigConsId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MasterConsId(pub usize);

#[derive(Clone, Debug, Default)]
/// Everything a decision changed, undone in reverse order
pub struct BranchEffects {
    /// blocks that got a side constraint pushed
    pub side_cons: Vec<usize>,
    pub saved_col_bounds: Vec<(ColumnId, f64, f64)>,
    pub saved_orig_bounds: Vec<(VarId, f64, f64)>,
    /// columns fixed to zero by propagation with their previous upper bound
    pub fixed_cols: Vec<(ColumnId, f64)>,
    pub cutoff: bool,
}

#[derive(Clone, Debug)]
pub struct OrigBranchCons {
    pub node: NodeId,
    pub decision: BranchDecision,
    pub parent: Option<OrigConsId>,
    pub children: Vec<OrigConsId>,
    pub master: Option<MasterConsId>,
    /// called with the lower bound once the master of the node is solved
    pub master_solved: Option<PseudocostHook>,
    effects: Option<BranchEffects>,
    released: bool,
}

#[derive(Clone, Debug)]
pub struct MasterBranchCons {
    pub node: NodeId,
    pub parent: Option<MasterConsId>,
    pub children: Vec<MasterConsId>,
    pub orig: OrigConsId,
    /// decision data is taken from the orig counterpart on first activation
    pub created: bool,
    pub decision: Option<BranchDecision>,
    effects: Option<BranchEffects>,
    /// columns below this index were already checked by propagation
    checked_cols: usize,
    released: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PropagationResult {
    pub fixed: usize,
    pub cutoff: bool,
}

/// Returns whether a column contradicts a decision and has to be fixed to zero
pub fn column_violates(vars: &VarStore, column: &MasterVar, decision: &BranchDecision, tol: f64) -> bool {
    match decision {
        BranchDecision::Root => false,
        BranchDecision::Bound { var, sense, bound } => {
            let Some(block) = column.block else {
                // master copies are restricted by their bounds
                return false;
            };
            if !vars.orig(*var).pricing.iter().any(|p| p.block == block) {
                return false;
            }
            let val = column.origval(*var);
            match (sense, column.is_ray) {
                (BoundSense::Lower, false) => val < bound - tol,
                (BoundSense::Upper, false) => val > bound + tol,
                (BoundSense::Lower, true) => val < -tol,
                (BoundSense::Upper, true) => val > tol,
            }
        }
        BranchDecision::Pair { block, first, second, same } => {
            if column.block != Some(*block) || column.is_ray {
                return false;
            }
            let first = column.origval(vars.pricing[*block][*first].origvars[0]);
            let second = column.origval(vars.pricing[*block][*second].origvars[0]);
            if *same {
                (first - second).abs() > tol
            } else {
                first > 0.5 && second > 0.5
            }
        }
    }
}

/// Tightens the local bounds of the original variable of a bound decision
pub fn apply_orig_decision(vars: &mut VarStore, decision: &BranchDecision, tol: f64, effects: &mut BranchEffects) {
    if let BranchDecision::Bound { var, sense, bound } = decision {
        let orig = vars.orig_mut(*var);
        effects.saved_orig_bounds.push((*var, orig.local_lb, orig.local_ub));
        match sense {
            BoundSense::Lower => orig.local_lb = orig.local_lb.max(*bound),
            BoundSense::Upper => orig.local_ub = orig.local_ub.min(*bound),
        }
        if orig.local_lb > orig.local_ub + tol {
            effects.cutoff = true;
        }
    }
}

/// Enforces a decision in the master (bounds of master copies) and in the pricing problems
pub fn apply_master_decision(vars: &mut VarStore, pricing: &mut [PricingProblem], decision: &BranchDecision, tol: f64, effects: &mut BranchEffects) {
    match decision {
        BranchDecision::Root => {}
        BranchDecision::Bound { var, sense, bound } => {
            let orig = vars.orig(*var);
            let blocks: Vec<_> = orig.pricing.clone();
            if let Some(direct) = orig.direct {
                let column = vars.column_mut(direct);
                effects.saved_col_bounds.push((direct, column.lb, column.ub));
                match sense {
                    BoundSense::Lower => column.lb = column.lb.max(*bound),
                    BoundSense::Upper => column.ub = column.ub.min(*bound),
                }
                if column.lb > column.ub + tol {
                    effects.cutoff = true;
                }
            }
            for p in blocks {
                assert_eq!(vars.multiplicity(p.block), 1, "bound branching on a variable of an aggregated block");
                let rhs_sense = match sense {
                    BoundSense::Lower => RowSense::Ge,
                    BoundSense::Upper => RowSense::Le,
                };
                pricing[p.block].push_side(SideConstraint { terms: vec![(p.index, 1.0)], sense: rhs_sense, rhs: *bound });
                effects.side_cons.push(p.block);
            }
        }
        BranchDecision::Pair { block, first, second, same } => {
            let side = if *same {
                SideConstraint { terms: vec![(*first, 1.0), (*second, -1.0)], sense: RowSense::Eq, rhs: 0.0 }
            } else {
                SideConstraint { terms: vec![(*first, 1.0), (*second, 1.0)], sense: RowSense::Le, rhs: 1.0 }
            };
            pricing[*block].push_side(side);
            effects.side_cons.push(*block);
        }
    }
}

/// Fixes every column from index `from` on that violates `decision`, returns the number of fixings
pub fn fix_violating_columns(vars: &mut VarStore, decision: &BranchDecision, from: usize, tol: f64, effects: &mut BranchEffects) -> usize {
    let mut fixed = 0;
    for index in from..vars.columns.count() {
        let id = ColumnId(index as u32);
        let column = vars.column(id);
        if column.ub > 0.0 && column_violates(vars, column, decision, tol) {
            effects.fixed_cols.push((id, column.ub));
            vars.column_mut(id).ub = 0.0;
            fixed += 1;
        }
    }
    fixed
}

/// Restores everything recorded in `effects`
pub fn undo_effects(vars: &mut VarStore, pricing: &mut [PricingProblem], effects: BranchEffects) {
    for (id, ub) in effects.fixed_cols.into_iter().rev() {
        vars.column_mut(id).ub = ub;
    }
    for (id, lb, ub) in effects.saved_col_bounds.into_iter().rev() {
        let column = vars.column_mut(id);
        column.lb = lb;
        column.ub = ub;
    }
    for (var, lb, ub) in effects.saved_orig_bounds.into_iter().rev() {
        let orig = vars.orig_mut(var);
        orig.local_lb = lb;
        orig.local_ub = ub;
    }
    for block in effects.side_cons.into_iter().rev() {
        let popped = pricing[block].pop_side();
        debug_assert!(popped.is_some(), "side constraint stack of block {} out of sync", block);
    }
}

/// Branching decisions of the orig and the master tree with their active stacks
#[derive(Default)]
pub struct BranchConsStore {
    orig: Vec<OrigBranchCons>,
    master: Vec<MasterBranchCons>,
    orig_stack: Vec<OrigConsId>,
    master_stack: Vec<MasterConsId>,
}

impl BranchConsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn orig(&self, id: OrigConsId) -> &OrigBranchCons {
        &self.orig[id.0]
    }

    pub fn master(&self, id: MasterConsId) -> &MasterBranchCons {
        &self.master[id.0]
    }

    pub fn orig_stack(&self) -> &[OrigConsId] {
        &self.orig_stack
    }

    pub fn master_stack(&self) -> &[MasterConsId] {
        &self.master_stack
    }

    pub fn active_orig(&self) -> Option<OrigConsId> {
        self.orig_stack.last().copied()
    }

    /// Creates the orig tree constraint of a node
    pub fn create_orig(&mut self, node: NodeId, parent: Option<OrigConsId>, decision: BranchDecision, master_solved: Option<PseudocostHook>) -> OrigConsId {
        let id = OrigConsId(self.orig.len());
        self.orig.push(OrigBranchCons {
            node,
            decision,
            parent,
            children: vec![],
            master: None,
            master_solved,
            effects: None,
            released: false,
        });
        if let Some(parent) = parent {
            self.orig[parent.0].children.push(id);
        }
        id
    }

    /// Creates the master counterpart of an orig constraint, its data is materialized on activation
    pub fn create_master(&mut self, orig: OrigConsId) -> MasterConsId {
        let id = MasterConsId(self.master.len());
        let parent = self.orig[orig.0].parent.and_then(|p| self.orig[p.0].master);
        self.master.push(MasterBranchCons {
            node: self.orig[orig.0].node,
            parent,
            children: vec![],
            orig,
            created: false,
            decision: None,
            effects: None,
            checked_cols: 0,
            released: false,
        });
        if let Some(parent) = parent {
            self.master[parent.0].children.push(id);
        }
        self.orig[orig.0].master = Some(id);
        id
    }

    pub fn activate_orig(&mut self, id: OrigConsId, vars: &mut VarStore, tol: f64) -> bool {
        let cons = &mut self.orig[id.0];
        assert!(!cons.released, "activating a released branching constraint");
        let mut effects = BranchEffects::default();
        apply_orig_decision(vars, &cons.decision, tol, &mut effects);
        let cutoff = effects.cutoff;
        cons.effects = Some(effects);
        self.orig_stack.push(id);
        cutoff
    }

    pub fn activate_master(&mut self, id: MasterConsId, vars: &mut VarStore, pricing: &mut [PricingProblem], tol: f64) -> bool {
        let orig = self.master[id.0].orig;
        let decision = self.orig[orig.0].decision.clone();
        let cons = &mut self.master[id.0];
        assert!(!cons.released, "activating a released branching constraint");
        if !cons.created {
            cons.decision = Some(decision);
            cons.created = true;
        }
        let mut effects = BranchEffects::default();
        if let Some(decision) = &cons.decision {
            apply_master_decision(vars, pricing, decision, tol, &mut effects);
        }
        let cutoff = effects.cutoff;
        cons.effects = Some(effects);
        cons.checked_cols = 0;
        self.master_stack.push(id);
        cutoff
    }

    pub fn deactivate_master(&mut self, vars: &mut VarStore, pricing: &mut [PricingProblem]) -> Option<MasterConsId> {
        let id = self.master_stack.pop()?;
        let cons = &mut self.master[id.0];
        if let Some(effects) = cons.effects.take() {
            undo_effects(vars, pricing, effects);
        }
        cons.checked_cols = 0;
        Some(id)
    }

    pub fn deactivate_orig(&mut self, vars: &mut VarStore, pricing: &mut [PricingProblem]) -> Option<OrigConsId> {
        let id = self.orig_stack.pop()?;
        if let Some(effects) = self.orig[id.0].effects.take() {
            undo_effects(vars, pricing, effects);
        }
        Some(id)
    }

    /// Checks all columns not yet seen by the active master constraints, over the whole stack
    pub fn propagate(&mut self, vars: &mut VarStore, tol: f64) -> PropagationResult {
        let mut result = PropagationResult::default();
        let ncols = vars.columns.count();
        for id in &self.master_stack {
            let cons = &mut self.master[id.0];
            let Some(decision) = &cons.decision else { continue };
            if *decision == BranchDecision::Root {
                cons.checked_cols = ncols;
                continue;
            }
            let Some(effects) = cons.effects.as_mut() else { continue };
            result.fixed += fix_violating_columns(vars, decision, cons.checked_cols, tol, effects);
            result.cutoff |= effects.cutoff;
            cons.checked_cols = ncols;
        }
        result
    }

    /// Frees the data of the constraints of a released node
    pub fn release(&mut self, id: OrigConsId) {
        debug_assert!(!self.orig_stack.contains(&id), "releasing an active branching constraint");
        let cons = &mut self.orig[id.0];
        cons.released = true;
        cons.master_solved = None;
        cons.children.clear();
        let (parent, master) = (cons.parent, cons.master);
        if let Some(parent) = parent {
            self.orig[parent.0].children.retain(|c| *c != id);
        }
        if let Some(master) = master {
            let cons = &mut self.master[master.0];
            cons.released = true;
            cons.decision = None;
            cons.children.clear();
            if let Some(parent) = cons.parent {
                self.master[parent.0].children.retain(|c| *c != master);
            }
        }
    }

    /// Verifies the cross links between both trees and the equal depth of both stacks
    #[cfg(any(test, debug_assertions, feature = "validity_assertions"))]
    pub fn check_consistency(&self, tree: &SearchTree) {
        assert_eq!(self.orig_stack.len(), self.master_stack.len(), "stacks of orig and master tree differ in depth");
        for (o, m) in self.orig_stack.iter().zip(&self.master_stack) {
            assert_eq!(
                tree.number(self.orig[o.0].node),
                tree.number(self.master[m.0].node),
                "orig and master stack disagree on the node at the same depth"
            );
            assert_eq!(self.orig[o.0].master, Some(*m));
        }

        for (i, cons) in self.orig.iter().enumerate().filter(|(_, c)| !c.released) {
            let id = OrigConsId(i);
            if let Some(parent) = cons.parent {
                assert!(self.orig[parent.0].children.contains(&id), "orig parent doesn't list its child");
            }
            for child in &cons.children {
                assert_eq!(self.orig[child.0].parent, Some(id), "orig child points to another parent");
            }
            if let Some(master) = cons.master {
                assert_eq!(self.master[master.0].orig, id, "master counterpart doesn't point back");
                let expected_parent = cons.parent.and_then(|p| self.orig[p.0].master);
                assert_eq!(self.master[master.0].parent, expected_parent, "master parent isn't the counterpart of the orig parent");
            }
        }

        for (i, cons) in self.master.iter().enumerate().filter(|(_, c)| !c.released) {
            let id = MasterConsId(i);
            assert_eq!(self.orig[cons.orig.0].master, Some(id), "orig counterpart doesn't point back");
            if cons.created {
                assert_eq!(cons.decision.as_ref(), Some(&self.orig[cons.orig.0].decision), "materialized decision differs from its origin");
            }
            for child in &cons.children {
                assert_eq!(self.master[child.0].parent, Some(id), "master child points to another parent");
            }
        }
    }

    #[cfg(not(any(test, debug_assertions, feature = "validity_assertions")))]
    pub fn check_consistency(&self, _tree: &SearchTree) {}
}

/// Whether bound branching on `var` can be enforced without touching aggregated blocks
pub fn is_bound_branchable(vars: &VarStore, var: VarId) -> bool {
    let orig = vars.orig(var);
    match orig.block {
        BlockAssignment::Master => true,
        BlockAssignment::Block(b) => vars.multiplicity(b) == 1,
        BlockAssignment::Linking => orig.pricing.iter().all(|p| vars.multiplicity(p.block) == 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::{Decomposition, OrigProblem, VarType};
    use crate::transform::{transform, Transformed};

    fn setup() -> (Transformed, VarId, VarId, VarId) {
        let mut problem = OrigProblem::new();
        let x = problem.add_var("x", VarType::Integer, 0.0, 3.0, 1.0);
        let y = problem.add_var("y", VarType::Integer, 0.0, 3.0, 1.0);
        let m = problem.add_var("m", VarType::Integer, 0.0, 3.0, 1.0);
        problem.add_cons("link", vec![(x, 1.0), (y, 1.0), (m, 1.0)], RowSense::Ge, 2.0);
        let mut decomposition = Decomposition::new();
        decomposition.add_block(vec![x, y], vec![]);
        (transform(&problem, &decomposition).unwrap(), x, y, m)
    }

    fn add(t: &mut Transformed, values: &[f64]) -> ColumnId {
        let column = t.master.make_block_column(&t.vars, 0, values, false);
        t.vars.add_column(column).unwrap()
    }

    #[test]
    fn activation_pushes_side_constraints_and_deactivation_restores() {
        let (mut t, x, _, m) = setup();
        let mut tree = SearchTree::new();
        let mut cons = BranchConsStore::new();

        let root = tree.create_root();
        let root_cons = cons.create_orig(root, None, BranchDecision::Root, None);
        cons.create_master(root_cons);
        let child = tree.create_child(root, 0.0);
        let child_cons = cons.create_orig(child, Some(root_cons), BranchDecision::Bound { var: x, sense: BoundSense::Upper, bound: 1.0 }, None);
        let child_master = cons.create_master(child_cons);
        let other = tree.create_child(root, 0.0);
        let other_cons = cons.create_orig(other, Some(root_cons), BranchDecision::Bound { var: m, sense: BoundSense::Lower, bound: 2.0 }, None);
        cons.create_master(other_cons);
        cons.check_consistency(&tree);

        for (o, master) in [(root_cons, cons.orig(root_cons).master.unwrap()), (child_cons, child_master)] {
            assert!(!cons.activate_orig(o, &mut t.vars, 1e-6));
            assert!(!cons.activate_master(master, &mut t.vars, &mut t.pricing, 1e-6));
        }
        cons.check_consistency(&tree);
        assert!(cons.master(child_master).created);
        assert_eq!(t.pricing[0].num_side(), 1);
        assert_eq!(t.vars.orig(x).local_ub, 1.0);

        cons.deactivate_master(&mut t.vars, &mut t.pricing);
        cons.deactivate_orig(&mut t.vars, &mut t.pricing);
        assert_eq!(t.pricing[0].num_side(), 0);
        assert_eq!(t.vars.orig(x).local_ub, 3.0);

        // the master copy of m gets its bound changed directly
        let other_master = cons.orig(other_cons).master.unwrap();
        cons.activate_orig(other_cons, &mut t.vars, 1e-6);
        cons.activate_master(other_master, &mut t.vars, &mut t.pricing, 1e-6);
        let direct = t.vars.orig(m).direct.unwrap();
        assert_eq!(t.vars.column(direct).lb, 2.0);
        cons.check_consistency(&tree);
    }

    #[test]
    fn propagation_checks_whole_stack_incrementally() {
        let (mut t, x, y, _) = setup();
        let mut tree = SearchTree::new();
        let mut cons = BranchConsStore::new();

        let a = add(&mut t, &[2.0, 0.0]);
        let b = add(&mut t, &[1.0, 3.0]);

        let root = tree.create_root();
        let root_cons = cons.create_orig(root, None, BranchDecision::Root, None);
        let n1 = tree.create_child(root, 0.0);
        let c1 = cons.create_orig(n1, Some(root_cons), BranchDecision::Bound { var: x, sense: BoundSense::Upper, bound: 1.0 }, None);
        let n2 = tree.create_child(n1, 0.0);
        let c2 = cons.create_orig(n2, Some(c1), BranchDecision::Bound { var: y, sense: BoundSense::Upper, bound: 2.0 }, None);
        for o in [root_cons, c1, c2] {
            let master = cons.create_master(o);
            cons.activate_orig(o, &mut t.vars, 1e-6);
            cons.activate_master(master, &mut t.vars, &mut t.pricing, 1e-6);
        }

        let result = cons.propagate(&mut t.vars, 1e-6);
        assert_eq!(result.fixed, 2);
        assert_eq!(t.vars.column(a).ub, 0.0);
        assert_eq!(t.vars.column(b).ub, 0.0);

        // nothing new to check
        assert_eq!(cons.propagate(&mut t.vars, 1e-6).fixed, 0);
        let c = add(&mut t, &[0.0, 3.0]);
        assert_eq!(cons.propagate(&mut t.vars, 1e-6).fixed, 1);
        assert_eq!(t.vars.column(c).ub, 0.0);

        // popping the deepest constraint releases only its own fixings
        cons.deactivate_master(&mut t.vars, &mut t.pricing);
        cons.deactivate_orig(&mut t.vars, &mut t.pricing);
        assert_eq!(t.vars.column(c).ub, f64::INFINITY);
        assert_eq!(t.vars.column(a).ub, 0.0);
        cons.check_consistency(&tree);
    }

    #[test]
    fn conflicting_bounds_report_cutoff() {
        let (mut t, _, _, m) = setup();
        let mut effects = BranchEffects::default();
        apply_orig_decision(&mut t.vars, &BranchDecision::Bound { var: m, sense: BoundSense::Lower, bound: 4.0 }, 1e-6, &mut effects);
        assert!(effects.cutoff);
        undo_effects(&mut t.vars, &mut t.pricing, effects);
        assert_eq!(t.vars.orig(m).local_lb, 0.0);
    }

    #[test]
    fn ryan_foster_violations() {
        let (mut t, _, _, _) = setup();
        let both = add(&mut t, &[1.0, 1.0]);
        let one = add(&mut t, &[1.0, 0.0]);
        let same = BranchDecision::Pair { block: 0, first: 0, second: 1, same: true };
        let differ = BranchDecision::Pair { block: 0, first: 0, second: 1, same: false };

        assert!(!column_violates(&t.vars, t.vars.column(both), &same, 1e-6));
        assert!(column_violates(&t.vars, t.vars.column(one), &same, 1e-6));
        assert!(column_violates(&t.vars, t.vars.column(both), &differ, 1e-6));
        assert!(!column_violates(&t.vars, t.vars.column(one), &differ, 1e-6));
    }
}
