use crate::error::BnpResult;
use crate::master::{MasterOutcome, MasterStatus};
use crate::state::SolverState;
use crate::translate::transform_master_sol_to_orig_sol;
use crate::tree::NodeId;
use crate::vars::VarId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum RelaxStatus {
    #[default]
    NotStarted,
    MasterSolving,
    /// master solved and the original solution refreshed
    Updated,
    /// fixings implied by new columns propagated
    Propagated,
}

#[derive(Clone, Copy, Debug, PartialEq)]
/// Integer original variable with a fractional value in the relaxation
pub struct BranchCand {
    pub var: VarId,
    pub value: f64,
    /// distance to the nearest integer
    pub frac: f64,
}

/// Relaxation of the focus node as seen by the branching rules
#[derive(Clone, Debug)]
pub struct RelaxationState {
    pub status: RelaxStatus,
    pub lower_bound: f64,
    pub outcome: Option<MasterOutcome>,
    pub orig_sol: Vec<f64>,
    pub cands: Vec<BranchCand>,
}

impl Default for RelaxationState {
    fn default() -> Self {
        RelaxationState {
            status: RelaxStatus::NotStarted,
            lower_bound: f64::NEG_INFINITY,
            outcome: None,
            orig_sol: vec![],
            cands: vec![],
        }
    }
}

impl RelaxationState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn lp_obj(&self) -> f64 {
        self.outcome.as_ref().map(|o| o.lp_obj).unwrap_or(f64::NEG_INFINITY)
    }
}

impl SolverState {
    /// Solves the relaxation of the focus node and publishes the translated solution.
    /// `cutoff_on_path` marks a node whose branching decisions already contradict each other.
    ///
    /// Returns the lower bound of the node, `+inf` if it is infeasible.
    pub fn relax_node(&mut self, node: NodeId, cutoff_on_path: bool) -> BnpResult<f64> {
        let tol = self.settings.general.feas_tol;
        self.relax.reset();
        self.relax.status = RelaxStatus::MasterSolving;
        self.master.node_counter += 1;
        if cutoff_on_path {
            self.relax.lower_bound = f64::INFINITY;
            self.relax.status = RelaxStatus::Propagated;
            return Ok(f64::INFINITY);
        }

        let inherited = self.tree.node(node).lower_bound;
        let propagated = self.cons.propagate(&mut self.vars, tol);
        self.stats.propagated_fixings += propagated.fixed;
        if propagated.cutoff {
            self.relax.lower_bound = f64::INFINITY;
            self.relax.status = RelaxStatus::Propagated;
            return Ok(f64::INFINITY);
        }

        let outcome = self.solve_master(true, self.settings.pricing.max_rounds_per_node)?;
        let bound = match outcome.status {
            MasterStatus::Optimal => outcome.lp_obj,
            MasterStatus::Solving => outcome.dual_bound,
            MasterStatus::Infeasible => f64::INFINITY,
        };
        let lower_bound = bound.max(inherited);

        if outcome.status != MasterStatus::Infeasible {
            self.relax.orig_sol = transform_master_sol_to_orig_sol(&self.vars, &outcome.values, tol);
            self.relax.cands = self.collect_branch_cands(tol);
        }
        self.relax.outcome = Some(outcome);
        self.relax.lower_bound = lower_bound;
        self.relax.status = RelaxStatus::Updated;

        if let Some(active) = self.cons.active_orig() {
            if let Some(hook) = self.cons.orig(active).master_solved {
                self.pseudocosts.update(&hook, lower_bound);
            }
        }

        // columns generated at this node may violate active decisions
        let propagated = self.cons.propagate(&mut self.vars, tol);
        self.stats.propagated_fixings += propagated.fixed;
        self.relax.status = RelaxStatus::Propagated;

        Ok(if propagated.cutoff { f64::INFINITY } else { lower_bound })
    }

    fn collect_branch_cands(&self, tol: f64) -> Vec<BranchCand> {
        self.relax.orig_sol.iter().enumerate()
            .filter(|(i, _)| self.vars.orig[*i].vtype.is_integral())
            .map(|(i, &value)| BranchCand { var: VarId(i as u32), value, frac: (value - value.floor()).min(value.ceil() - value) })
            .filter(|c| c.frac > tol)
            .collect()
    }

    /// Whether the relaxation solution of the focus node is integral
    pub fn relaxation_integral(&self) -> bool {
        let solved = self.relax.outcome.as_ref().map(|o| o.status != MasterStatus::Infeasible).unwrap_or(false);
        self.relax.status >= RelaxStatus::Updated && solved && self.relax.cands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branchcons::{BoundSense, BranchDecision};
    use crate::branching::empty::EmptyBranchRule;
    use crate::branching::pseudocost::PseudocostHook;
    use crate::branching::ChildSpec;
    use crate::problem::{Decomposition, OrigProblem, VarType};
    use crate::settings::Settings;
    use crate::solvers::{DenseSimplex, RowSense};
    use crate::ui::UISender;

    /// `min -x0 - x1` with `x0 + x1 <= cap`, one block per variable
    fn two_blocks(cap: f64, settings: Settings) -> (SolverState, VarId, VarId) {
        let mut problem = OrigProblem::new();
        let x0 = problem.add_var("x0", VarType::Binary, 0.0, 1.0, -1.0);
        let x1 = problem.add_var("x1", VarType::Binary, 0.0, 1.0, -1.0);
        problem.add_cons("cap", vec![(x0, 1.0), (x1, 1.0)], RowSense::Le, cap);
        let mut decomposition = Decomposition::new();
        decomposition.add_block(vec![x0], vec![]);
        decomposition.add_block(vec![x1], vec![]);
        let state = SolverState::new(problem, &decomposition, settings, UISender::detached(), Box::new(DenseSimplex::new())).unwrap();
        (state, x0, x1)
    }

    #[test]
    fn fractional_root_publishes_candidates() {
        let (mut state, _, _) = two_blocks(1.5, Settings::default());
        let root = EmptyBranchRule::new().create_root(&mut state);
        assert!(!state.move_to(root));

        let bound = state.relax_node(root, false).unwrap();
        assert!((bound + 1.5).abs() < 1e-6);
        assert_eq!(state.relax.status, RelaxStatus::Propagated);
        assert_eq!(state.relax.outcome.as_ref().map(|o| o.status), Some(MasterStatus::Optimal));
        assert_eq!(state.relax.cands.len(), 1);
        assert!((state.relax.cands[0].frac - 0.5).abs() < 1e-6);
        assert!(!state.relaxation_integral());
        assert_eq!(state.master.node_counter, 1);
    }

    #[test]
    fn child_reports_gain_to_pseudocosts() {
        let (mut state, x0, _) = two_blocks(1.5, Settings::default());
        let mut mirror = EmptyBranchRule::new();
        let root = mirror.create_root(&mut state);
        state.move_to(root);
        let root_bound = state.relax_node(root, false).unwrap();
        state.leave_focus(true);

        let hook = PseudocostHook { var: x0, up: false, distance: 0.5, parent_lb: root_bound };
        let children = mirror.create_children(&mut state, root, vec![ChildSpec {
            decision: BranchDecision::Bound { var: x0, sense: BoundSense::Upper, bound: 0.0 },
            lower_bound: root_bound,
            hook: Some(hook),
        }]);
        assert!(!state.move_to(children[0]));
        let bound = state.relax_node(children[0], false).unwrap();

        // x0 fixed to zero leaves x1 = 1 as integral optimum
        assert!((bound + 1.0).abs() < 1e-6);
        assert!(state.relax.cands.is_empty());
        assert!(state.relaxation_integral());
        assert_eq!(state.pseudocosts.count(x0), 1);
        assert!((state.pseudocosts.pseudocost(x0, false) - 1.0).abs() < 1e-6);
        assert_eq!(state.master.node_counter, 2);
    }

    #[test]
    fn infeasible_master_gives_infinite_bound() {
        let (mut state, _, _) = two_blocks(-1.0, Settings::default());
        let root = EmptyBranchRule::new().create_root(&mut state);
        state.move_to(root);

        assert_eq!(state.relax_node(root, false).unwrap(), f64::INFINITY);
        assert_eq!(state.relax.outcome.as_ref().map(|o| o.status), Some(MasterStatus::Infeasible));
        assert!(state.relax.cands.is_empty());
        assert!(!state.relaxation_integral());
    }

    #[test]
    fn round_limit_keeps_lagrangian_bound() {
        let mut settings = Settings::default();
        settings.pricing.max_rounds_per_node = Some(1);
        let (mut state, _, _) = two_blocks(1.5, settings);
        let root = EmptyBranchRule::new().create_root(&mut state);
        state.move_to(root);

        // one round prices x0 = x1 = 1 against the duals of the artificial master
        let bound = state.relax_node(root, false).unwrap();
        assert_eq!(state.relax.outcome.as_ref().map(|o| o.status), Some(MasterStatus::Solving));
        assert!((bound + 2.0).abs() < 1e-6);
    }

    #[test]
    fn contradicting_path_skips_the_master() {
        let (mut state, _, _) = two_blocks(1.5, Settings::default());
        let root = EmptyBranchRule::new().create_root(&mut state);
        state.move_to(root);

        assert_eq!(state.relax_node(root, true).unwrap(), f64::INFINITY);
        assert!(state.relax.outcome.is_none());
        assert_eq!(state.stats.lp_solves, 0);
        assert_eq!(state.master.node_counter, 1);
    }
}
