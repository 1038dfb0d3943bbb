use crate::branchcons::{apply_master_decision, apply_orig_decision, fix_violating_columns, undo_effects, BoundSense, BranchDecision, BranchEffects};
use crate::error::BnpResult;
use crate::master::{MasterOutcome, MasterStatus};
use crate::state::SolverState;
use crate::vars::VarId;

/// Temporary bound changes on the focus node, rolled back when the scope is dropped
pub struct ProbingScope<'a> {
    state: &'a mut SolverState,
    decisions: Vec<BranchDecision>,
    effects: Vec<BranchEffects>,
}

impl<'a> ProbingScope<'a> {
    pub fn new(state: &'a mut SolverState) -> Self {
        state.stats.probings += 1;
        ProbingScope { state, decisions: vec![], effects: vec![] }
    }

    pub fn state(&mut self) -> &mut SolverState {
        &mut *self.state
    }

    /// Changes a bound of an original variable in the original and the master problem.
    /// Returns whether the new bound contradicts the local domain.
    pub fn change_bound(&mut self, var: VarId, sense: BoundSense, bound: f64) -> bool {
        let tol = self.state.settings.general.feas_tol;
        let decision = BranchDecision::Bound { var, sense, bound };
        let mut effects = BranchEffects::default();
        apply_orig_decision(&mut self.state.vars, &decision, tol, &mut effects);
        apply_master_decision(&mut self.state.vars, &mut self.state.pricing, &decision, tol, &mut effects);
        let cutoff = effects.cutoff;
        self.effects.push(effects);
        self.decisions.push(decision);
        cutoff
    }

    /// Fixes every column that violates a probing bound, returns `(cutoff, nfixings)`
    pub fn propagate(&mut self) -> (bool, usize) {
        let tol = self.state.settings.general.feas_tol;
        let mut fixed = 0;
        let mut cutoff = false;
        for (decision, effects) in self.decisions.iter().zip(self.effects.iter_mut()) {
            fixed += fix_violating_columns(&mut self.state.vars, decision, 0, tol, effects);
            cutoff |= effects.cutoff;
        }
        (cutoff, fixed)
    }

    pub fn solve(&mut self, with_pricing: bool, max_rounds: Option<usize>) -> BnpResult<MasterOutcome> {
        self.state.solve_master(with_pricing, max_rounds)
    }
}

impl Drop for ProbingScope<'_> {
    fn drop(&mut self) {
        while let Some(effects) = self.effects.pop() {
            undo_effects(&mut self.state.vars, &mut self.state.pricing, effects);
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectionOutcome {
    pub bound: f64,
    pub valid: bool,
    pub infeasible: bool,
}

impl DirectionOutcome {
    fn no_info() -> Self {
        DirectionOutcome { bound: f64::NEG_INFINITY, valid: false, infeasible: false }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StrongBranchingResult {
    pub down: DirectionOutcome,
    pub up: DirectionOutcome,
}

/// Evaluates both children of branching on `var` at `value`.
///
/// Without pricing, a detected cutoff is not trusted and only marks the direction invalid.
pub fn execute_strong_branching(state: &mut SolverState, var: VarId, value: f64, with_pricing: bool, max_rounds: Option<usize>) -> BnpResult<StrongBranchingResult> {
    let down = evaluate_direction(state, var, BoundSense::Upper, value.floor(), with_pricing, max_rounds)?;
    let up = evaluate_direction(state, var, BoundSense::Lower, value.floor() + 1.0, with_pricing, max_rounds)?;
    Ok(StrongBranchingResult { down, up })
}

fn evaluate_direction(state: &mut SolverState, var: VarId, sense: BoundSense, bound: f64, with_pricing: bool, max_rounds: Option<usize>) -> BnpResult<DirectionOutcome> {
    let tol = state.settings.general.feas_tol;
    let cutoff_value = state.cutoff();
    let mut scope = ProbingScope::new(state);

    let mut cutoff = scope.change_bound(var, sense, bound);
    if !cutoff {
        cutoff = scope.propagate().0;
    }
    if cutoff {
        return Ok(DirectionOutcome { bound: f64::INFINITY, valid: false, infeasible: with_pricing });
    }

    let outcome = match scope.solve(with_pricing, max_rounds) {
        Ok(outcome) => outcome,
        Err(e) if e.is_lp_error() => {
            scope.state().ui.warn(format!("probing on x{} failed: {}", var.0, e));
            return Ok(DirectionOutcome::no_info());
        }
        Err(e) => return Err(e),
    };

    let direction = if !with_pricing {
        if outcome.status == MasterStatus::Infeasible || outcome.artificials_in_use {
            DirectionOutcome { bound: outcome.lp_obj, valid: false, infeasible: false }
        } else {
            DirectionOutcome { bound: outcome.lp_obj, valid: true, infeasible: false }
        }
    } else {
        match outcome.status {
            MasterStatus::Infeasible => DirectionOutcome { bound: f64::INFINITY, valid: false, infeasible: true },
            _ if outcome.dual_bound >= cutoff_value - tol => DirectionOutcome { bound: outcome.dual_bound, valid: false, infeasible: true },
            MasterStatus::Optimal => DirectionOutcome { bound: outcome.lp_obj, valid: true, infeasible: false },
            MasterStatus::Solving if !outcome.artificials_in_use => DirectionOutcome { bound: outcome.lp_obj, valid: true, infeasible: false },
            MasterStatus::Solving => DirectionOutcome { bound: outcome.dual_bound, valid: false, infeasible: false },
        }
    };
    Ok(direction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::{Decomposition, OrigProblem, VarType};
    use crate::settings::Settings;
    use crate::error::LpError;
    use crate::solvers::{DenseSimplex, LPSolver, LpProblem, LpSolution, RowSense};
    use crate::ui::UISender;

    fn two_block_state() -> (SolverState, VarId, VarId) {
        let mut problem = OrigProblem::new();
        let x0 = problem.add_var("x0", VarType::Binary, 0.0, 1.0, -1.0);
        let x1 = problem.add_var("x1", VarType::Binary, 0.0, 1.0, -1.0);
        problem.add_cons("cap", vec![(x0, 1.0), (x1, 1.0)], RowSense::Le, 1.5);
        let mut decomposition = Decomposition::new();
        decomposition.add_block(vec![x0], vec![]);
        decomposition.add_block(vec![x1], vec![]);
        let state = SolverState::new(problem, &decomposition, Settings::default(), UISender::detached(), Box::new(DenseSimplex::new())).unwrap();
        (state, x0, x1)
    }

    #[test]
    fn priced_probing_reports_child_bounds_and_restores_everything() {
        let (mut state, _, x1) = two_block_state();
        let result = execute_strong_branching(&mut state, x1, 0.5, true, None).unwrap();

        assert!(result.down.valid && !result.down.infeasible);
        assert!((result.down.bound + 1.0).abs() < 1e-6);
        assert!(result.up.valid && !result.up.infeasible);
        assert!((result.up.bound + 1.5).abs() < 1e-6);

        assert_eq!(state.pricing[1].num_side(), 0);
        assert_eq!(state.vars.orig(x1).local_lb, 0.0);
        assert_eq!(state.vars.orig(x1).local_ub, 1.0);
        assert!(state.vars.columns.iter().all(|c| c.data.ub == f64::INFINITY));
        assert_eq!(state.stats.probings, 2);
    }

    #[test]
    fn lp_only_probing_without_columns_is_invalid() {
        let (mut state, x0, _) = two_block_state();
        let result = execute_strong_branching(&mut state, x0, 0.5, false, None).unwrap();
        assert!(!result.down.valid && !result.down.infeasible);
        assert!(!result.up.valid && !result.up.infeasible);
    }

    #[test]
    fn conflicting_bound_is_trusted_only_with_pricing() {
        let (mut state, x0, _) = two_block_state();
        {
            let mut scope = ProbingScope::new(&mut state);
            assert!(!scope.change_bound(x0, BoundSense::Upper, 0.0));
            assert!(scope.change_bound(x0, BoundSense::Lower, 1.0));
            assert_eq!(scope.state().pricing[0].num_side(), 2);
        }
        assert_eq!(state.pricing[0].num_side(), 0);
        assert_eq!(state.vars.orig(x0).local_ub, 1.0);

        state.vars.orig_mut(x0).local_ub = 0.0;
        let priced = execute_strong_branching(&mut state, x0, 0.5, true, None).unwrap();
        assert!(priced.up.infeasible && !priced.up.valid);
        let lp_only = execute_strong_branching(&mut state, x0, 0.5, false, None).unwrap();
        assert!(!lp_only.up.infeasible && !lp_only.up.valid);
    }

    struct FailingLp;

    impl LPSolver for FailingLp {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn solve(&mut self, _problem: &LpProblem) -> Result<LpSolution, LpError> {
            Err(LpError::Numerical("singular basis".to_string()))
        }
    }

    #[test]
    fn lp_failures_give_no_information_and_roll_back() {
        let (mut state, x0, _) = two_block_state();
        state.lp = Box::new(FailingLp);

        let result = execute_strong_branching(&mut state, x0, 0.5, true, None).unwrap();
        assert_eq!(result.down, DirectionOutcome::no_info());
        assert_eq!(result.up, DirectionOutcome::no_info());

        assert_eq!(state.pricing[0].num_side(), 0);
        assert_eq!(state.vars.orig(x0).local_lb, 0.0);
        assert_eq!(state.vars.orig(x0).local_ub, 1.0);
        assert_eq!(state.stats.probings, 2);

        // failures outside probing still reach the caller
        assert!(state.solve_master(true, None).unwrap_err().is_lp_error());
    }
}
