use std::time::Instant;
use crate::branching::pseudocost::PseudocostStore;
use crate::branchcons::{BranchConsStore, OrigConsId};
use crate::error::BnpResult;
use crate::master::MasterProblem;
use crate::pricing::PricingProblem;
use crate::problem::{Decomposition, OrigProblem};
use crate::relax::RelaxationState;
use crate::settings::Settings;
use crate::solvers::LPSolver;
use crate::transform::transform;
use crate::tree::{NodeId, NodeStatus, SearchTree};
use crate::ui::{UISender, UIUserMessage};
use crate::vars::VarStore;

#[derive(Clone, Debug)]
pub struct Incumbent {
    pub obj: f64,
    pub sol: Vec<f64>,
    pub node: u64,
}

#[derive(Clone, Debug, Default)]
pub struct Statistics {
    pub lp_solves: usize,
    pub pricing_rounds: usize,
    pub probings: usize,
    pub nodes: u64,
    pub propagated_fixings: usize,
}

/// Complete state of the branch-and-price search shared by relaxation, probing and branching rules
pub struct SolverState {
    pub settings: Settings,
    pub ui: UISender,
    pub problem: OrigProblem,
    pub vars: VarStore,
    pub master: MasterProblem,
    pub pricing: Vec<PricingProblem>,
    pub tree: SearchTree,
    pub cons: BranchConsStore,
    pub relax: RelaxationState,
    pub pseudocosts: PseudocostStore,
    pub incumbent: Option<Incumbent>,
    pub lp: Box<dyn LPSolver>,
    pub start: Instant,
    pub stats: Statistics,
    pending_release: Vec<OrigConsId>,
}

impl SolverState {
    pub fn new(problem: OrigProblem, decomposition: &Decomposition, settings: Settings, ui: UISender, lp: Box<dyn LPSolver>) -> BnpResult<Self> {
        settings.validate()?;
        let transformed = transform(&problem, decomposition)?;
        let num_orig = transformed.vars.num_orig();

        Ok(SolverState {
            settings,
            ui,
            problem,
            vars: transformed.vars,
            master: transformed.master,
            pricing: transformed.pricing,
            tree: SearchTree::new(),
            cons: BranchConsStore::new(),
            relax: RelaxationState::default(),
            pseudocosts: PseudocostStore::new(num_orig),
            incumbent: None,
            lp,
            start: Instant::now(),
            stats: Statistics::default(),
            pending_release: vec![],
        })
    }

    /// Changes the active branching constraints from the current focus to `node`
    pub fn move_to(&mut self, node: NodeId) -> bool {
        let tol = self.settings.general.feas_tol;
        let target = self.tree.path(node);
        let current = self.tree.focus.map(|f| self.tree.path(f)).unwrap_or_default();
        let common = current.iter().zip(&target).take_while(|(a, b)| a == b).count();

        for _ in common..current.len() {
            self.cons.deactivate_master(&mut self.vars, &mut self.pricing);
            self.cons.deactivate_orig(&mut self.vars, &mut self.pricing);
        }
        for orig in std::mem::take(&mut self.pending_release) {
            self.cons.release(orig);
        }
        if let Some(focus) = self.tree.focus {
            if self.tree.node(focus).status == NodeStatus::Focus {
                self.tree.node_mut(focus).status = NodeStatus::Open;
            }
        }

        let mut cutoff = false;
        for id in &target[common..] {
            let tree_node = self.tree.node(*id);
            let (Some(orig), Some(master)) = (tree_node.orig_cons, tree_node.master_cons) else {
                continue;
            };
            cutoff |= self.cons.activate_orig(orig, &mut self.vars, tol);
            cutoff |= self.cons.activate_master(master, &mut self.vars, &mut self.pricing, tol);
        }

        self.tree.focus = Some(node);
        self.tree.node_mut(node).status = NodeStatus::Focus;
        self.relax.reset();
        self.cons.check_consistency(&self.tree);
        cutoff
    }

    /// Marks the focus node as finished and frees every node that has no open descendant left
    pub fn leave_focus(&mut self, branched: bool) {
        let Some(focus) = self.tree.focus else { return };
        if branched {
            self.tree.node_mut(focus).status = NodeStatus::Processed;
            return;
        }
        // constraints of released nodes stay on the stacks until the next move
        for node in self.tree.release(focus) {
            if let Some(orig) = self.tree.node(node).orig_cons {
                self.pending_release.push(orig);
            }
        }
    }

    /// Drops an open node that was never processed
    pub fn prune_open(&mut self, node: NodeId) {
        for released in self.tree.release(node) {
            if let Some(orig) = self.tree.node(released).orig_cons {
                self.pending_release.push(orig);
            }
        }
    }

    /// Stores `sol` as new incumbent if it is feasible and better
    pub fn try_incumbent(&mut self, sol: Vec<f64>, node: u64) -> bool {
        let tol = self.settings.general.feas_tol;
        if !self.problem.is_feasible(&sol, tol) {
            return false;
        }
        let obj = self.problem.objective(&sol);
        if obj >= self.cutoff() - tol {
            return false;
        }
        self.ui.send(UIUserMessage::NewBest { obj, node });
        self.incumbent = Some(Incumbent { obj, sol, node });
        true
    }
}
