use itertools::Itertools;
use crate::branchcons::BranchDecision;
use crate::error::BnpResult;
use crate::misc::FullHashMap;
use crate::problem::VarType;
use crate::state::SolverState;
use crate::tree::NodeId;
use super::{BranchRule, BranchingResult, ChildSpec};

/// Ryan-Foster branching: two binary variables of a block take the same value or differ
#[derive(Debug, Default)]
pub struct RyanFosterBranchRule {
    binary_blocks: Vec<usize>,
}

impl RyanFosterBranchRule {
    pub fn new() -> Self {
        Self::default()
    }

    /// First pair of pricing variables whose joint value in the master solution is fractional
    fn find_pair(&self, state: &SolverState) -> Option<(usize, usize, usize)> {
        let tol = state.settings.general.feas_tol;
        let outcome = state.relax.outcome.as_ref()?;

        for &block in &self.binary_blocks {
            let mut pair_sums: FullHashMap<(usize, usize), f64> = FullHashMap::default();
            for &(id, lambda) in &outcome.values {
                let column = state.vars.column(id);
                if column.block != Some(block) || column.is_ray {
                    continue;
                }
                let ones: Vec<usize> = column.origvars.iter().zip(&column.origvals)
                    .filter(|(_, val)| (*val - 1.0).abs() <= tol)
                    .filter_map(|(var, _)| state.vars.orig(*var).pricing.iter().find(|p| p.block == block).map(|p| p.index))
                    .sorted()
                    .collect();
                for (i, j) in ones.iter().tuple_combinations() {
                    *pair_sums.entry((*i, *j)).or_default() += lambda;
                }
            }
            let pair = pair_sums.into_iter()
                .filter(|(_, sum)| *sum > tol && *sum < 1.0 - tol)
                .map(|(pair, _)| pair)
                .min();
            if let Some((first, second)) = pair {
                return Some((block, first, second));
            }
        }
        None
    }
}

impl BranchRule for RyanFosterBranchRule {
    fn name(&self) -> &'static str {
        "ryanfoster"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn init(&mut self, state: &SolverState) {
        self.binary_blocks = (0..state.pricing.len())
            .filter(|b| state.pricing[*b].vtypes.iter().all(|t| *t == VarType::Binary))
            .collect();
    }

    fn execute_fractional(&mut self, state: &mut SolverState, _node: NodeId) -> BnpResult<BranchingResult> {
        let Some((block, first, second)) = self.find_pair(state) else {
            return Ok(BranchingResult::DidNotRun);
        };
        let lower_bound = state.relax.lower_bound;
        Ok(BranchingResult::Branched(
            [true, false].into_iter()
                .map(|same| ChildSpec { decision: BranchDecision::Pair { block, first, second, same }, lower_bound, hook: None })
                .collect(),
        ))
    }
}
