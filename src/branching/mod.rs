use crate::branchcons::BranchDecision;
use crate::error::BnpResult;
use crate::settings::ScoreFunction;
use crate::state::SolverState;
use crate::tree::NodeId;

pub mod bpstrong;
pub mod empty;
pub mod orig;
pub mod pseudocost;
pub mod ryanfoster;

use pseudocost::PseudocostHook;

/// Minimal gain used by the product score
pub const SCORE_EPS: f64 = 1e-6;

#[derive(Clone, Debug)]
/// Child node to create, with the lower bound it inherits
pub struct ChildSpec {
    pub decision: BranchDecision,
    pub lower_bound: f64,
    pub hook: Option<PseudocostHook>,
}

#[derive(Clone, Debug)]
pub enum BranchingResult {
    Branched(Vec<ChildSpec>),
    /// the focus node can be pruned
    CutOff,
    /// no candidate, the next rule is asked
    DidNotRun,
}

/// Branching rule called on a fractional relaxation solution, rules are tried by descending priority
pub trait BranchRule {
    fn name(&self) -> &'static str;

    fn priority(&self) -> i32;

    /// Called once after the problem was transformed
    fn init(&mut self, _state: &SolverState) {}

    /// Called when the search is finished
    fn free(&mut self) {}

    fn execute_fractional(&mut self, state: &mut SolverState, node: NodeId) -> BnpResult<BranchingResult>;
}

/// Combines the gains of both directions into one score
pub fn branch_score(score_fn: ScoreFunction, down: f64, up: f64) -> f64 {
    match score_fn {
        ScoreFunction::Product => down.max(SCORE_EPS) * up.max(SCORE_EPS),
        ScoreFunction::Sum { factor } => (1.0 - factor) * down.min(up) + factor * down.max(up),
    }
}

/// Gain of an evaluated direction; an infeasible direction counts as a large gain
pub(crate) fn direction_gain(bound: f64, valid: bool, infeasible: bool, lp_obj: f64) -> f64 {
    if infeasible {
        1e6
    } else if !valid || !bound.is_finite() || !lp_obj.is_finite() {
        0.0
    } else {
        (bound - lp_obj).max(0.0)
    }
}
