use std::time::Instant;
use crate::error::{BnpError, BnpResult};
use crate::misc::{FullHashMap, HashMap};
use crate::pricing::PricingStatus;
use crate::solvers::{LpProblem, LpStatus, RowSense};
use crate::state::SolverState;
use crate::ui::{LPSolveIterationUIState, PricingProblemUIState, UIUserMessage};
use crate::vars::{VarId, VarStore};

pub mod column_pool;

use column_pool::{ColumnId, MasterVar};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MasterRowKind {
    /// constraint of the original problem outside every block
    Linking(usize),
    Convexity(usize),
    /// master copy of a linking variable equals its value in `block`
    LinkingVar { var: VarId, block: usize },
}

#[derive(Clone, Debug)]
pub struct MasterRow {
    pub kind: MasterRowKind,
    pub sense: RowSense,
    pub rhs: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LpColumn {
    Column(ColumnId),
    Artificial(usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MasterStatus {
    /// column generation converged without artificial columns in use
    Optimal,
    /// stopped before convergence, only the dual bound is valid
    Solving,
    Infeasible,
}

#[derive(Clone, Debug)]
pub struct MasterOutcome {
    pub status: MasterStatus,
    pub lp_obj: f64,
    pub dual_bound: f64,
    /// nonzero column values in column order
    pub values: Vec<(ColumnId, f64)>,
    pub artificials_in_use: bool,
    pub rounds: usize,
    pub new_columns: usize,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MasterObjective {
    /// column costs, artificial columns cost the given penalty per unit
    Penalized(f64),
    /// phase one, only the artificial columns have cost (one per unit)
    Feasibility,
}

/// Outcome of the phase one column generation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Feasibility {
    Feasible,
    Infeasible,
    /// stopped by the time limit or an unfinished pricing problem
    Unknown,
}

/// Columns added by one pricing round and the Lagrangian bound it proves (`None` if a
/// pricing problem was unbounded)
struct PricingRound {
    added: usize,
    lagrangian: Option<f64>,
    runtime: f64,
}

/// Largest penalty the artificial columns are raised to
const MAX_ARTIFICIAL_COST: f64 = 1e15;

/// Rows of the restricted master problem
#[derive(Clone, Debug, Default)]
pub struct MasterProblem {
    pub rows: Vec<MasterRow>,
    /// coefficients of original variables in linking constraint rows
    pub var_rows: HashMap<VarId, Vec<(usize, f64)>>,
    pub convexity_rows: Vec<usize>,
    pub linking_rows: FullHashMap<(VarId, usize), usize>,
    /// number of master nodes processed, advanced once per search node
    pub node_counter: u64,
}

impl MasterProblem {
    pub fn add_row(&mut self, kind: MasterRowKind, sense: RowSense, rhs: f64) -> usize {
        self.rows.push(MasterRow { kind, sense, rhs });
        let row = self.rows.len() - 1;
        match kind {
            MasterRowKind::Convexity(_) => self.convexity_rows.push(row),
            MasterRowKind::LinkingVar { var, block } => {
                self.linking_rows.insert((var, block), row);
            }
            MasterRowKind::Linking(_) => {}
        }
        row
    }

    /// Builds the column of a pricing solution given by the values of the pricing variables
    pub fn make_block_column(&self, vars: &VarStore, block: usize, values: &[f64], is_ray: bool) -> MasterVar {
        let mut origvars = vec![];
        let mut origvals = vec![];
        let mut obj = 0.0;
        let mut coefs: FullHashMap<usize, f64> = FullHashMap::default();

        for (k, &val) in values.iter().enumerate() {
            if val.abs() <= 1e-12 {
                continue;
            }
            let rep = vars.pricing[block][k].origvars[0];
            origvars.push(rep);
            origvals.push(val);

            if vars.is_linking(rep) {
                *coefs.entry(self.linking_rows[&(rep, block)]).or_default() -= val;
            } else {
                obj += vars.orig(rep).obj * val;
                for &(row, a) in self.var_rows.get(&rep).map(|r| r.as_slice()).unwrap_or(&[]) {
                    *coefs.entry(row).or_default() += a * val;
                }
            }
        }
        if !is_ray {
            coefs.insert(self.convexity_rows[block], 1.0);
        }

        let mut coefs: Vec<(usize, f64)> = coefs.into_iter().filter(|(_, a)| *a != 0.0).collect();
        coefs.sort_by_key(|(row, _)| *row);

        MasterVar { block: Some(block), origvars, origvals, is_ray, obj, lb: 0.0, ub: f64::INFINITY, coefs }
    }

    /// Restricted master LP over all columns plus artificial columns keeping it feasible
    pub fn build_lp(&self, vars: &VarStore, objective: MasterObjective) -> (LpProblem, Vec<LpColumn>) {
        let (feasibility, artificial_cost) = match objective {
            MasterObjective::Penalized(cost) => (false, cost),
            MasterObjective::Feasibility => (true, 1.0),
        };
        let mut lp = LpProblem::default();
        let mut rows: Vec<Vec<(usize, f64)>> = vec![vec![]; self.rows.len()];
        let mut columns = Vec::with_capacity(vars.columns.count() + self.rows.len());

        for column in vars.columns.iter() {
            let obj = if feasibility { 0.0 } else { column.data.obj };
            let j = lp.add_var(obj, column.data.lb, column.data.ub);
            for &(row, a) in &column.data.coefs {
                rows[row].push((j, a));
            }
            columns.push(LpColumn::Column(column.id));
        }

        for (i, row) in self.rows.iter().enumerate() {
            let signs: &[f64] = match row.sense {
                RowSense::Ge => &[1.0],
                RowSense::Le => &[-1.0],
                RowSense::Eq => &[1.0, -1.0],
            };
            for sign in signs {
                let j = lp.add_var(artificial_cost, 0.0, f64::INFINITY);
                rows[i].push((j, *sign));
                columns.push(LpColumn::Artificial(i));
            }
        }

        for (row, coefs) in self.rows.iter().zip(rows) {
            lp.add_row(coefs, row.sense, row.rhs);
        }
        (lp, columns)
    }
}

impl SolverState {
    pub fn cutoff(&self) -> f64 {
        self.incumbent.as_ref().map(|i| i.obj).unwrap_or(f64::INFINITY)
    }

    pub fn time_exceeded(&self) -> bool {
        self.settings.general.time_limit.map(|limit| self.start.elapsed() >= limit).unwrap_or(false)
    }

    /// Pricing costs of the variables of `block` under the row duals.
    /// In phase one the original objective does not count.
    fn pricing_costs(&self, block: usize, duals: &[f64], feasibility: bool) -> Vec<f64> {
        self.vars.pricing[block].iter().map(|pv| {
            let rep = pv.origvars[0];
            if self.vars.is_linking(rep) {
                duals[self.master.linking_rows[&(rep, block)]]
            } else {
                let rows = self.master.var_rows.get(&rep).map(|r| r.as_slice()).unwrap_or(&[]);
                let obj = if feasibility { 0.0 } else { self.vars.orig(rep).obj };
                obj - rows.iter().map(|(row, a)| duals[*row] * a).sum::<f64>()
            }
        }).collect()
    }

    /// Prices every block once and adds the columns with negative reduced cost
    fn price_blocks(&mut self, duals: &[f64], lp_obj: f64, feasibility: bool) -> BnpResult<PricingRound> {
        let tol = self.settings.general.feas_tol;
        let rc_tol = self.settings.pricing.reduced_cost_tol;
        let pricing_start = Instant::now();
        let mut added = 0;
        let mut lagrangian = Some(lp_obj);

        for block in 0..self.vars.nblocks() {
            let block_start = Instant::now();
            let costs = self.pricing_costs(block, duals, feasibility);
            let convexity_dual = duals[self.master.convexity_rows[block]];

            let result = self.pricing[block].solve(&costs, self.settings.pricing.pricing_node_limit, self.lp.as_mut(), tol)?;

            let mut block_columns = 0;
            match result.status {
                PricingStatus::Unbounded => {
                    lagrangian = None;
                    if let Some(ray) = result.ray {
                        let column = self.master.make_block_column(&self.vars, block, &ray, true);
                        if self.vars.add_column(column).is_some() {
                            block_columns += 1;
                        }
                    }
                }
                _ => {
                    let rc = result.lower_bound - convexity_dual;
                    let mult = self.vars.multiplicity(block) as f64;
                    lagrangian = lagrangian.map(|l| l + mult * rc.min(0.0));
                }
            }

            for (obj, values) in result.solutions.iter() {
                if block_columns >= self.settings.pricing.max_columns_per_block {
                    break;
                }
                if obj - convexity_dual >= -rc_tol {
                    continue;
                }
                let column = self.master.make_block_column(&self.vars, block, values, false);
                if self.vars.add_column(column).is_some() {
                    block_columns += 1;
                }
            }
            added += block_columns;

            self.ui.send(UIUserMessage::PricingProblemFinish(PricingProblemUIState {
                runtime: block_start.elapsed().as_secs_f64(),
                block,
                num_columns: block_columns,
                dual_bound: result.lower_bound,
            }));
        }

        Ok(PricingRound { added, lagrangian, runtime: pricing_start.elapsed().as_secs_f64() })
    }

    /// Phase one column generation: minimizes the artificial columns over the master.
    ///
    /// The master is infeasible iff the phase one optimum stays positive once no column
    /// with negative reduced cost is left.
    pub fn master_feasibility(&mut self) -> BnpResult<Feasibility> {
        let tol = self.settings.general.feas_tol;
        loop {
            let (lp, _) = self.master.build_lp(&self.vars, MasterObjective::Feasibility);
            let solution = self.lp.solve(&lp)?;
            self.stats.lp_solves += 1;
            match solution.status {
                LpStatus::Infeasible => return Ok(Feasibility::Infeasible),
                LpStatus::Unbounded => return Err(BnpError::UnboundedMaster),
                LpStatus::Optimal => {}
            }
            if solution.objective <= tol {
                return Ok(Feasibility::Feasible);
            }
            if self.time_exceeded() {
                return Ok(Feasibility::Unknown);
            }

            self.stats.pricing_rounds += 1;
            let round = self.price_blocks(&solution.duals, solution.objective, true)?;
            if round.added == 0 {
                let proven = round.lagrangian.map(|l| l > tol).unwrap_or(false);
                return Ok(if proven { Feasibility::Infeasible } else { Feasibility::Unknown });
            }
        }
    }

    /// Solves the master problem of the active node.
    ///
    /// With pricing, columns are generated until no column with negative reduced cost
    /// exists, the round limit is hit or the Lagrangian bound exceeds the cutoff.
    /// Artificial columns left in a converged master trigger phase one pricing, and a
    /// feasible master is resolved with a larger penalty.
    pub fn solve_master(&mut self, with_pricing: bool, max_rounds: Option<usize>) -> BnpResult<MasterOutcome> {
        let tol = self.settings.general.feas_tol;
        let cutoff = self.cutoff();

        let mut artificial_cost = self.settings.pricing.artificial_cost;
        let mut proven_feasible = false;
        let mut dual_bound = f64::NEG_INFINITY;
        let mut rounds = 0;
        let mut new_columns = 0;
        let mut previous_pricing_runtime = 0.0;

        loop {
            let (lp, columns) = self.master.build_lp(&self.vars, MasterObjective::Penalized(artificial_cost));
            let solution = self.lp.solve(&lp)?;
            self.stats.lp_solves += 1;

            match solution.status {
                LpStatus::Unbounded => return Err(BnpError::UnboundedMaster),
                LpStatus::Infeasible => {
                    // only conflicting column bounds make the artificial master infeasible
                    return Ok(MasterOutcome {
                        status: MasterStatus::Infeasible,
                        lp_obj: f64::INFINITY,
                        dual_bound: f64::INFINITY,
                        values: vec![],
                        artificials_in_use: false,
                        rounds,
                        new_columns,
                    });
                }
                LpStatus::Optimal => {}
            }

            let mut values = vec![];
            let mut artificials_in_use = false;
            for (col, x) in columns.iter().zip(&solution.x) {
                match col {
                    LpColumn::Column(id) if x.abs() > 1e-9 => values.push((*id, *x)),
                    LpColumn::Artificial(_) if *x > tol => artificials_in_use = true,
                    _ => {}
                }
            }
            let lp_obj = solution.objective;

            self.ui.send(UIUserMessage::LPSolveIterationFinish(LPSolveIterationUIState {
                obj: lp_obj,
                best_dual_bound: dual_bound.is_finite().then_some(dual_bound),
                lp_runtime: solution.runtime,
                num_columns: values.len(),
                num_total_pool_columns: self.vars.columns.count(),
                previous_pricing_runtime,
            }));

            let outcome = |status: MasterStatus, dual_bound: f64, rounds: usize, new_columns: usize| MasterOutcome {
                status,
                lp_obj,
                dual_bound,
                values: values.clone(),
                artificials_in_use,
                rounds,
                new_columns,
            };

            if !with_pricing {
                return Ok(outcome(MasterStatus::Solving, dual_bound, rounds, new_columns));
            }
            if max_rounds.map(|max| rounds >= max).unwrap_or(false) || self.time_exceeded() {
                return Ok(outcome(MasterStatus::Solving, dual_bound, rounds, new_columns));
            }
            rounds += 1;
            self.stats.pricing_rounds += 1;

            let round = self.price_blocks(&solution.duals, lp_obj, false)?;
            previous_pricing_runtime = round.runtime;
            new_columns += round.added;

            if let Some(l) = round.lagrangian {
                dual_bound = dual_bound.max(l);
            }

            if round.added == 0 {
                if artificials_in_use {
                    if !proven_feasible {
                        match self.master_feasibility()? {
                            Feasibility::Infeasible => {
                                return Ok(outcome(MasterStatus::Infeasible, f64::INFINITY, rounds, new_columns));
                            }
                            Feasibility::Unknown => {
                                return Ok(outcome(MasterStatus::Solving, dual_bound, rounds, new_columns));
                            }
                            Feasibility::Feasible => proven_feasible = true,
                        }
                    }
                    // the penalty was too small to push the artificial columns out
                    artificial_cost *= 10.0;
                    if artificial_cost > MAX_ARTIFICIAL_COST {
                        return Ok(outcome(MasterStatus::Solving, dual_bound, rounds, new_columns));
                    }
                    continue;
                }
                // a pricing problem stopped at its node limit leaves a gap to the Lagrangian bound
                let unproven = dual_bound < lp_obj - tol * (1.0 + lp_obj.abs());
                return Ok(if unproven {
                    outcome(MasterStatus::Solving, dual_bound, rounds, new_columns)
                } else {
                    outcome(MasterStatus::Optimal, lp_obj, rounds, new_columns)
                });
            }

            if dual_bound >= cutoff - tol {
                return Ok(outcome(MasterStatus::Solving, dual_bound, rounds, new_columns));
            }
        }
    }
}
