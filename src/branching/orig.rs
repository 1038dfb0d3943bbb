use crate::branchcons::{is_bound_branchable, BoundSense, BranchDecision};
use crate::error::BnpResult;
use crate::relax::BranchCand;
use crate::state::SolverState;
use crate::tree::NodeId;
use crate::vars::VarId;
use super::bpstrong::{Selection, StrongBranchSelector};
use super::pseudocost::PseudocostHook;
use super::{BranchRule, BranchingResult, ChildSpec};

/// Down child `var <= floor(value)` and up child `var >= floor(value) + 1`, skipping infeasible directions
pub(crate) fn bound_children(state: &SolverState, var: VarId, value: f64, down_infeasible: bool, up_infeasible: bool) -> Vec<ChildSpec> {
    let lower_bound = state.relax.lower_bound;
    let floor = value.floor();
    let mut children = Vec::with_capacity(2);
    if !down_infeasible {
        children.push(ChildSpec {
            decision: BranchDecision::Bound { var, sense: BoundSense::Upper, bound: floor },
            lower_bound,
            hook: Some(PseudocostHook { var, up: false, distance: value - floor, parent_lb: lower_bound }),
        });
    }
    if !up_infeasible {
        children.push(ChildSpec {
            decision: BranchDecision::Bound { var, sense: BoundSense::Lower, bound: floor + 1.0 },
            lower_bound,
            hook: Some(PseudocostHook { var, up: true, distance: floor + 1.0 - value, parent_lb: lower_bound }),
        });
    }
    children
}

/// Branching on fractional original variables
#[derive(Debug, Default)]
pub struct OrigVarBranchRule {
    selector: Option<StrongBranchSelector>,
}

impl OrigVarBranchRule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selector(&self) -> Option<&StrongBranchSelector> {
        self.selector.as_ref()
    }

    /// Candidate without probing: best pseudocost score, most fractional or first
    fn fallback(state: &SolverState, cands: &[BranchCand]) -> Option<BranchCand> {
        let branching = &state.settings.branching;
        if branching.use_pseudocosts {
            let score = |c: &BranchCand| state.pseudocosts.score(c.var, c.value, branching.score_function);
            cands.iter().copied().fold(None, |best: Option<BranchCand>, c| match best {
                Some(b) if score(&b) >= score(&c) => Some(b),
                _ => Some(c),
            })
        } else if branching.most_frac {
            cands.iter().copied().fold(None, |best: Option<BranchCand>, c| match best {
                Some(b) if b.frac >= c.frac => Some(b),
                _ => Some(c),
            })
        } else {
            cands.first().copied()
        }
    }
}

impl BranchRule for OrigVarBranchRule {
    fn name(&self) -> &'static str {
        "orig"
    }

    fn priority(&self) -> i32 {
        100
    }

    fn init(&mut self, state: &SolverState) {
        self.selector = state.settings.branching.use_strong.then(StrongBranchSelector::new);
    }

    fn free(&mut self) {
        self.selector = None;
    }

    fn execute_fractional(&mut self, state: &mut SolverState, node: NodeId) -> BnpResult<BranchingResult> {
        let cands: Vec<BranchCand> = state.relax.cands.iter().copied()
            .filter(|c| is_bound_branchable(&state.vars, c.var))
            .collect();
        if cands.is_empty() {
            return Ok(BranchingResult::DidNotRun);
        }

        if let Some(selector) = self.selector.as_mut() {
            match selector.select_candidate(state, node, &cands)? {
                Selection::Winner { var, value, down_infeasible, up_infeasible } => {
                    return Ok(BranchingResult::Branched(bound_children(state, var, value, down_infeasible, up_infeasible)));
                }
                Selection::CutOff => return Ok(BranchingResult::CutOff),
                Selection::DidNotRun => {}
            }
        }

        Ok(match Self::fallback(state, &cands) {
            Some(c) => BranchingResult::Branched(bound_children(state, c.var, c.value, false, false)),
            None => BranchingResult::DidNotRun,
        })
    }
}
