use std::time::Duration;
use crate::branching::bpstrong::StrongBranchRule;
use crate::branching::empty::EmptyBranchRule;
use crate::branching::orig::OrigVarBranchRule;
use crate::branching::ryanfoster::RyanFosterBranchRule;
use crate::branching::{BranchRule, BranchingResult};
use crate::error::BnpResult;
use crate::master::MasterStatus;
use crate::problem::{Decomposition, OrigProblem};
use crate::settings::Settings;
use crate::solvers::{DenseSimplex, LPSolver};
use crate::state::SolverState;
use crate::tree::NodeId;
use crate::ui::{NodeUIState, UISender, UIUserMessage};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    TimeLimit,
    NodeLimit,
    /// a node could not be branched on, the dual bound accounts for it
    Incomplete,
}

#[derive(Clone, Debug)]
pub struct SolveResult {
    pub status: SolveStatus,
    /// objective of the best solution, `+inf` if none was found
    pub obj: f64,
    pub sol: Option<Vec<f64>>,
    pub dual_bound: f64,
    pub nodes: u64,
    /// nodes of the master tree, one per processed node
    pub master_nodes: u64,
    pub columns: usize,
    pub root_time: Option<Duration>,
}

/// Branch-and-price on a Dantzig-Wolfe reformulation of an [`OrigProblem`]
pub struct BranchAndPrice {
    pub state: SolverState,
    rules: Vec<Box<dyn BranchRule>>,
    mirror: EmptyBranchRule,
}

impl BranchAndPrice {
    /// Transforms the problem and registers the default branching rules
    pub fn new(problem: OrigProblem, decomposition: &Decomposition, settings: Settings, ui: UISender) -> BnpResult<Self> {
        Self::with_lp_solver(problem, decomposition, settings, ui, Box::new(DenseSimplex::new()))
    }

    pub fn with_lp_solver(problem: OrigProblem, decomposition: &Decomposition, settings: Settings, ui: UISender, lp: Box<dyn LPSolver>) -> BnpResult<Self> {
        let state = SolverState::new(problem, decomposition, settings, ui, lp)?;
        let mut solver = BranchAndPrice { state, rules: vec![], mirror: EmptyBranchRule::new() };
        solver.include_branch_rule(Box::new(OrigVarBranchRule::new()));
        solver.include_branch_rule(Box::new(RyanFosterBranchRule::new()));
        Ok(solver)
    }

    /// Adds a rule, rules are kept ordered by descending priority
    pub fn include_branch_rule(&mut self, rule: Box<dyn BranchRule>) {
        self.rules.push(rule);
        self.rules.sort_by_key(|r| -r.priority());
    }

    /// Replaces the default rules by the standalone strong branching rule
    pub fn use_strong_branch_rule_only(&mut self) {
        self.rules.clear();
        self.include_branch_rule(Box::new(StrongBranchRule::default()));
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    fn ui_state(&self, node: NodeId, after_obj: Option<f64>) -> NodeUIState {
        let tree_node = self.state.tree.node(node);
        NodeUIState {
            node: tree_node.number,
            parent: tree_node.parent.map(|p| self.state.tree.number(p)).unwrap_or(0),
            depth: tree_node.depth,
            num_columns: self.state.vars.columns.count(),
            current_open: self.state.tree.queue.len(),
            decision: tree_node.orig_cons.map(|c| format!("{}", self.state.cons.orig(c).decision)).unwrap_or_else(|| "-".to_string()),
            before_obj: tree_node.lower_bound,
            after_obj,
            best_obj: self.state.cutoff(),
        }
    }

    pub fn solve(&mut self) -> BnpResult<SolveResult> {
        let tol = self.state.settings.general.feas_tol;
        for rule in self.rules.iter_mut() {
            rule.init(&self.state);
        }
        self.mirror.init(&self.state);

        let root = self.mirror.create_root(&mut self.state);
        self.state.tree.enqueue(root);
        self.state.ui.send(UIUserMessage::StartPhase("Branch and Price"));

        #[cfg(feature = "validity_assertions")]
        self.state.ui.send(UIUserMessage::LogS("Validity Assertions Active"));

        let mut limit_status = None;
        let mut unresolved_bound = f64::INFINITY;
        let mut root_time = None;

        while let Some(queued) = self.state.tree.queue.pop() {
            if self.state.time_exceeded() {
                self.state.ui.send(UIUserMessage::TimeLimitReached);
                self.state.tree.queue.push(queued);
                limit_status = Some(SolveStatus::TimeLimit);
                break;
            }
            if self.state.settings.general.node_limit.map(|limit| self.state.stats.nodes >= limit).unwrap_or(false) {
                self.state.ui.send(UIUserMessage::NodeLimitReached);
                self.state.tree.queue.push(queued);
                limit_status = Some(SolveStatus::NodeLimit);
                break;
            }

            let node = queued.node;
            let number = self.state.tree.number(node);
            if self.state.tree.node(node).lower_bound >= self.state.cutoff() - tol {
                self.state.ui.send(UIUserMessage::NodeCut { node: number });
                self.state.prune_open(node);
                continue;
            }

            let node_start = std::time::Instant::now();
            self.state.stats.nodes += 1;
            let infeasible_path = self.state.move_to(node);
            self.state.ui.send(UIUserMessage::NodeStart(self.ui_state(node, None)));

            let bound = self.state.relax_node(node, infeasible_path)?;
            self.state.tree.node_mut(node).lower_bound = bound;
            if number == 1 {
                root_time = Some(node_start.elapsed());
            }
            self.state.ui.send(UIUserMessage::NodeFinish(self.ui_state(node, Some(bound))));

            if bound >= self.state.cutoff() - tol {
                self.state.ui.send(UIUserMessage::NodeCut { node: number });
                self.state.leave_focus(false);
                continue;
            }

            if self.state.relaxation_integral() && self.state.problem.is_feasible(&self.state.relax.orig_sol, tol) {
                let sol = self.state.relax.orig_sol.clone();
                if self.state.try_incumbent(sol, number) {
                    self.state.tree.queue.now_has_bound();
                    let cutoff = self.state.cutoff();
                    for pruned in self.state.tree.queue.prune(cutoff, tol) {
                        self.state.ui.send(UIUserMessage::NodeCut { node: pruned.number });
                        self.state.prune_open(pruned.node);
                    }
                }
                let converged = self.state.relax.outcome.as_ref().map(|o| o.status == MasterStatus::Optimal).unwrap_or(false);
                if converged || bound >= self.state.cutoff() - tol {
                    self.state.leave_focus(false);
                    continue;
                }
            }

            let mut branched = false;
            let mut cutoff = false;
            for rule in self.rules.iter_mut() {
                match rule.execute_fractional(&mut self.state, node)? {
                    BranchingResult::Branched(children) if !children.is_empty() => {
                        self.mirror.create_children(&mut self.state, node, children);
                        branched = true;
                        break;
                    }
                    BranchingResult::Branched(_) | BranchingResult::CutOff => {
                        cutoff = true;
                        break;
                    }
                    BranchingResult::DidNotRun => {}
                }
            }

            if cutoff {
                self.state.ui.send(UIUserMessage::NodeCut { node: number });
            } else if !branched {
                self.state.ui.warn(format!("no branching rule applies at node {number}, its bound {bound} stays unresolved"));
                unresolved_bound = unresolved_bound.min(bound);
            }
            self.state.leave_focus(branched);
        }

        for rule in self.rules.iter_mut() {
            rule.free();
        }
        self.mirror.free();
        debug_assert_eq!(self.state.master.node_counter, self.state.stats.nodes, "master and original tree advanced differently");

        let incumbent = self.state.incumbent.clone();
        let obj = incumbent.as_ref().map(|i| i.obj).unwrap_or(f64::INFINITY);
        let dual_bound = self.state.tree.queue.lowest_bound().unwrap_or(f64::INFINITY).min(unresolved_bound).min(obj);

        let status = match limit_status {
            Some(status) => status,
            None if unresolved_bound.is_finite() => SolveStatus::Incomplete,
            None if incumbent.is_some() => SolveStatus::Optimal,
            None => SolveStatus::Infeasible,
        };

        Ok(SolveResult {
            status,
            obj,
            sol: incumbent.map(|i| i.sol),
            dual_bound,
            nodes: self.state.stats.nodes,
            master_nodes: self.state.master.node_counter,
            columns: self.state.vars.columns.count(),
            root_time,
        })
    }
}
