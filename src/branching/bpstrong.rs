//! Three phase strong branching selector.
//!
//! Phase 0 ranks all eligible candidates by a cheap estimate, phase 1 probes the
//! survivors without pricing and phase 2 probes the last few with column generation.
//! The number of candidates kept after each phase depends on the relative gap of the node.

use std::time::Instant;
use crate::branchcons::is_bound_branchable;
use crate::error::BnpResult;
use crate::misc::HashMap;
use crate::probing::execute_strong_branching;
use crate::relax::BranchCand;
use crate::settings::ScoreFunction;
use crate::state::SolverState;
use crate::tree::NodeId;
use crate::ui::{StrongBranchingUIState, UIUserMessage};
use crate::vars::{BlockAssignment, VarId, VarStore};
use super::{branch_score, direction_gain, BranchRule, BranchingResult};
use super::orig::bound_children;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Eligibility class of a variable, computed once per variable
pub enum UniqueBlockFlag {
    Unclassified,
    /// integer variable of a block without identical copies
    UniqueBlock,
    /// variable transferred directly to the master
    MasterDirect,
    Neither,
}

impl UniqueBlockFlag {
    pub fn code(&self) -> i32 {
        match self {
            UniqueBlockFlag::Unclassified => -2,
            UniqueBlockFlag::UniqueBlock => 1,
            UniqueBlockFlag::MasterDirect => 0,
            UniqueBlockFlag::Neither => -1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CandidateRecord {
    /// last phase 0 score
    pub score: f64,
    pub flag: UniqueBlockFlag,
    /// last score with pricing
    pub sb_score: f64,
    pub is_recent: bool,
    /// number of the node `sb_score` was computed at
    pub last_eval_node: u64,
}

impl Default for CandidateRecord {
    fn default() -> Self {
        CandidateRecord { score: 0.0, flag: UniqueBlockFlag::Unclassified, sb_score: 0.0, is_recent: false, last_eval_node: 0 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Selection {
    Winner { var: VarId, value: f64, down_infeasible: bool, up_infeasible: bool },
    CutOff,
    DidNotRun,
}

/// Relative gap between the bounds of a node, `1` if it is undefined
pub fn node_gap(lower_bound: f64, upper_bound: f64) -> f64 {
    if !lower_bound.is_finite() || !upper_bound.is_finite() {
        return 1.0;
    }
    if upper_bound == lower_bound {
        return 0.0;
    }
    if upper_bound * lower_bound < 0.0 {
        return 1.0;
    }
    let denominator = upper_bound.abs().min(lower_bound.abs());
    if denominator == 0.0 {
        return 1.0;
    }
    ((upper_bound - lower_bound).abs() / denominator).clamp(0.0, 1.0)
}

/// Number of candidates a phase passes on, between `min` and `max` and growing with the gap
pub fn calculate_ncands(min: i64, max: i64, gap: f64, gap_weight: f64) -> i64 {
    let range = (max - min) as f64;
    min + range.min(range * gap * gap_weight + range * (1.0 - gap_weight)).ceil() as i64
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct RankedCand {
    pub score: f64,
    pub flag: i32,
    /// valid strong branching score from an earlier node
    pub hist: Option<f64>,
}

/// Phase 0 ranking: best `nneeded` candidates by score with historical performers spliced in.
/// Returns indices into `cands`.
pub(crate) fn phase0_select(cands: &[RankedCand], nneeded: usize, histweight: f64) -> Vec<usize> {
    let n = cands.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| cands[b].score.total_cmp(&cands[a].score).then(cands[b].flag.cmp(&cands[a].flag)));
    if n <= nneeded {
        return order;
    }

    let nhist = cands.iter().filter(|c| c.hist.is_some()).count();
    let ratio = nhist as f64 / n as f64;
    let nneededhist = ((ratio.min(histweight) * n as f64).floor() as usize).min(nneeded);

    let mut selected: Vec<usize> = order[..nneeded - nneededhist].to_vec();
    let mut hist: Vec<usize> = (0..n).filter(|&i| cands[i].hist.is_some()).collect();
    let hist_score = |i: usize| cands[i].hist.unwrap_or(f64::NEG_INFINITY);
    hist.sort_by(|&a, &b| hist_score(b).total_cmp(&hist_score(a)));

    for i in hist.into_iter().chain(order) {
        if selected.len() >= nneeded {
            break;
        }
        if !selected.contains(&i) {
            selected.push(i);
        }
    }
    selected
}

struct Evaluated {
    cand: BranchCand,
    score: f64,
    /// code of the eligibility class, breaks ties between equal scores
    flag: i32,
    down_infeasible: bool,
    up_infeasible: bool,
}

impl Evaluated {
    /// Descending by score, then by eligibility class
    fn rank(&self, other: &Evaluated) -> std::cmp::Ordering {
        other.score.total_cmp(&self.score).then(other.flag.cmp(&self.flag))
    }
}

#[derive(Debug, Default)]
pub struct StrongBranchSelector {
    records: HashMap<VarId, CandidateRecord>,
}

impl StrongBranchSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, var: VarId) -> Option<&CandidateRecord> {
        self.records.get(&var)
    }

    pub fn record_mut(&mut self, var: VarId) -> &mut CandidateRecord {
        self.records.entry(var).or_default()
    }

    /// Eligibility class of `var`, looked up from the record once classified
    pub fn classify(&mut self, vars: &VarStore, var: VarId) -> UniqueBlockFlag {
        let record = self.records.entry(var).or_default();
        if record.flag != UniqueBlockFlag::Unclassified {
            return record.flag;
        }
        let orig = vars.orig(var);
        record.flag = if !orig.vtype.is_integral() {
            UniqueBlockFlag::Neither
        } else {
            match orig.block {
                BlockAssignment::Block(b) if vars.multiplicity(b) == 1 => UniqueBlockFlag::UniqueBlock,
                BlockAssignment::Linking if orig.pricing.iter().all(|p| vars.multiplicity(p.block) == 1) => UniqueBlockFlag::UniqueBlock,
                BlockAssignment::Master => UniqueBlockFlag::MasterDirect,
                _ => UniqueBlockFlag::Neither,
            }
        };
        record.flag
    }

    /// Strong branching score of `var` if it was computed within `reevalage` edges above `node`
    pub fn cached_sb_score(&self, state: &SolverState, node: NodeId, var: VarId) -> Option<f64> {
        let record = self.records.get(&var)?;
        (record.is_recent && state.tree.is_within_hops(node, record.last_eval_node, state.settings.strong.reevalage))
            .then_some(record.sb_score)
    }

    fn clear_recent(&mut self) {
        for record in self.records.values_mut() {
            record.is_recent = false;
        }
    }

    /// Selects the branching variable among the fractional candidates of the focus node
    pub fn select_candidate(&mut self, state: &mut SolverState, node: NodeId, cands: &[BranchCand]) -> BnpResult<Selection> {
        let strong = state.settings.strong.clone();
        let branching = state.settings.branching.clone();
        let node_number = state.tree.number(node);
        let gap = node_gap(state.relax.lower_bound, state.cutoff());

        let nneeded0 = calculate_ncands(strong.minphase0outcands, strong.maxphase0outcands, gap, strong.phase1gapweight).max(1) as usize;
        let nneeded1 = calculate_ncands(strong.minphase1outcands, strong.maxphase1outcands, gap, strong.phase2gapweight).max(1) as usize;

        // iteration 0 takes unique block variables, iteration 1 adds master variables if too few
        let mut eligible: Vec<BranchCand> = cands.iter().copied()
            .filter(|c| self.classify(&state.vars, c.var) == UniqueBlockFlag::UniqueBlock)
            .collect();
        if eligible.len() < nneeded0 {
            eligible.extend(cands.iter().copied().filter(|c| self.classify(&state.vars, c.var) == UniqueBlockFlag::MasterDirect));
        }
        if eligible.is_empty() {
            return Ok(Selection::DidNotRun);
        }

        // phase 0
        let start = Instant::now();
        let ranked: Vec<RankedCand> = eligible.iter().map(|c| {
            let hist = self.cached_sb_score(state, node, c.var);
            let score = if branching.use_pseudocosts {
                state.pseudocosts.score(c.var, c.value, branching.score_function)
            } else if branching.most_frac {
                c.frac
            } else {
                hist.unwrap_or(0.0)
            };
            let record = self.record_mut(c.var);
            record.score = score;
            RankedCand { score, flag: record.flag.code(), hist }
        }).collect();

        let phase0: Vec<BranchCand> = phase0_select(&ranked, nneeded0, strong.histweight).into_iter().map(|i| eligible[i]).collect();
        self.report_phase(state, node_number, 0, eligible.len(), phase0.len(), start);
        if phase0.len() == 1 {
            return Ok(winner(phase0[0], false, false));
        }

        // phase 1
        let start = Instant::now();
        let mut phase1 = Vec::with_capacity(phase0.len());
        for cand in &phase0 {
            if state.time_exceeded() {
                break;
            }
            let flag = self.classify(&state.vars, cand.var).code();
            phase1.push(evaluate(state, *cand, flag, false, None, branching.score_function)?);
        }
        if phase1.is_empty() {
            return Ok(winner(phase0[0], false, false));
        }
        phase1.sort_by(Evaluated::rank);
        let evaluated = phase1.len();
        let keep = if strong.stronglite {
            1
        } else if strong.strongtraining {
            evaluated
        } else if (evaluated as i64) < strong.mincolgencands || nneeded1 <= 1 {
            1
        } else {
            nneeded1.min(evaluated)
        };
        phase1.truncate(keep);
        self.report_phase(state, node_number, 1, phase0.len(), phase1.len(), start);
        if phase1.len() == 1 {
            return Ok(winner(phase1[0].cand, false, false));
        }

        // phase 2
        let start = Instant::now();
        let mut best: Option<Evaluated> = None;
        let mut both_infeasible = false;
        let num_in = phase1.len();
        for cand in phase1.iter().map(|e| e.cand) {
            if state.time_exceeded() {
                break;
            }
            let flag = self.classify(&state.vars, cand.var).code();
            let result = evaluate(state, cand, flag, true, strong.max_pricing_rounds, branching.score_function)?;
            let record = self.record_mut(cand.var);
            record.sb_score = result.score;
            record.is_recent = true;
            record.last_eval_node = node_number;

            if result.down_infeasible && result.up_infeasible {
                both_infeasible = true;
                if strong.immediateinf {
                    self.clear_recent();
                    self.report_phase(state, node_number, 2, num_in, 0, start);
                    return Ok(Selection::CutOff);
                }
            } else if strong.immediateinf && (result.down_infeasible || result.up_infeasible) {
                self.clear_recent();
                self.report_phase(state, node_number, 2, num_in, 1, start);
                return Ok(winner(cand, result.down_infeasible, result.up_infeasible));
            }
            if best.as_ref().map(|b| result.rank(b).is_lt()).unwrap_or(true) {
                best = Some(result);
            }
        }
        if both_infeasible {
            self.clear_recent();
            self.report_phase(state, node_number, 2, num_in, 0, start);
            return Ok(Selection::CutOff);
        }
        self.report_phase(state, node_number, 2, num_in, 1, start);

        Ok(match best {
            Some(best) => winner(best.cand, best.down_infeasible, best.up_infeasible),
            None => winner(phase1[0].cand, false, false),
        })
    }

    fn report_phase(&self, state: &SolverState, node: u64, phase: u8, num_in: usize, num_out: usize, start: Instant) {
        state.ui.send(UIUserMessage::StrongBranchingPhase(StrongBranchingUIState {
            node,
            phase,
            num_in,
            num_out,
            runtime: start.elapsed().as_secs_f64(),
        }));
    }
}

fn winner(cand: BranchCand, down_infeasible: bool, up_infeasible: bool) -> Selection {
    Selection::Winner { var: cand.var, value: cand.value, down_infeasible, up_infeasible }
}

fn evaluate(state: &mut SolverState, cand: BranchCand, flag: i32, with_pricing: bool, max_rounds: Option<usize>, score_fn: ScoreFunction) -> BnpResult<Evaluated> {
    let lp_obj = state.relax.lp_obj();
    let result = execute_strong_branching(state, cand.var, cand.value, with_pricing, max_rounds)?;
    let down = direction_gain(result.down.bound, result.down.valid, result.down.infeasible, lp_obj);
    let up = direction_gain(result.up.bound, result.up.valid, result.up.infeasible, lp_obj);
    Ok(Evaluated {
        cand,
        score: branch_score(score_fn, down, up),
        flag,
        down_infeasible: result.down.infeasible,
        up_infeasible: result.up.infeasible,
    })
}

/// Branching rule that branches on original variables selected by strong branching alone
#[derive(Debug, Default)]
pub struct StrongBranchRule {
    pub selector: StrongBranchSelector,
}

impl BranchRule for StrongBranchRule {
    fn name(&self) -> &'static str {
        "bpstrong"
    }

    fn priority(&self) -> i32 {
        -536_870_912
    }

    fn free(&mut self) {
        self.selector.records.clear();
    }

    fn execute_fractional(&mut self, state: &mut SolverState, node: NodeId) -> BnpResult<BranchingResult> {
        let cands: Vec<BranchCand> = state.relax.cands.iter().copied()
            .filter(|c| is_bound_branchable(&state.vars, c.var))
            .collect();
        Ok(match self.selector.select_candidate(state, node, &cands)? {
            Selection::Winner { var, value, down_infeasible, up_infeasible } => {
                BranchingResult::Branched(bound_children(state, var, value, down_infeasible, up_infeasible))
            }
            Selection::CutOff => BranchingResult::CutOff,
            Selection::DidNotRun => BranchingResult::DidNotRun,
        })
    }
}
