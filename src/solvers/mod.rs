use crate::error::LpError;

mod simplex;
#[cfg(feature = "gurobi")]
pub mod gurobi;

pub use simplex::DenseSimplex;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RowSense {
    Le,
    Ge,
    Eq,
}

#[derive(Clone, Debug)]
pub struct LpRow {
    pub coefs: Vec<(usize, f64)>,
    pub sense: RowSense,
    pub rhs: f64,
}

#[derive(Clone, Debug, Default)]
/// Linear program in minimization form over continuous variables
pub struct LpProblem {
    pub obj: Vec<f64>,
    pub lb: Vec<f64>,
    pub ub: Vec<f64>,
    pub rows: Vec<LpRow>,
}

impl LpProblem {
    pub fn add_var(&mut self, obj: f64, lb: f64, ub: f64) -> usize {
        self.obj.push(obj);
        self.lb.push(lb);
        self.ub.push(ub);
        self.obj.len() - 1
    }

    pub fn add_row(&mut self, coefs: Vec<(usize, f64)>, sense: RowSense, rhs: f64) -> usize {
        self.rows.push(LpRow { coefs, sense, rhs });
        self.rows.len() - 1
    }

    pub fn num_vars(&self) -> usize {
        self.obj.len()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LpStatus {
    Optimal,
    Infeasible,
    Unbounded,
}

#[derive(Clone, Debug)]
pub struct LpSolution {
    pub status: LpStatus,
    pub objective: f64,
    pub x: Vec<f64>,
    /// row duals, reduced cost of column j is `c_j - sum_i duals[i] * a_ij`
    pub duals: Vec<f64>,
    /// improving direction if the problem is unbounded
    pub ray: Option<Vec<f64>>,
    pub iterations: usize,
    pub runtime: f64,
}

impl LpSolution {
    pub fn infeasible(num_vars: usize, num_rows: usize) -> Self {
        LpSolution {
            status: LpStatus::Infeasible,
            objective: f64::INFINITY,
            x: vec![0.0; num_vars],
            duals: vec![0.0; num_rows],
            ray: None,
            iterations: 0,
            runtime: 0.0,
        }
    }
}

/// Solves linear programs for the master problem and the relaxations of the pricing problems
pub trait LPSolver {
    fn name(&self) -> &'static str;
    fn solve(&mut self, problem: &LpProblem) -> Result<LpSolution, LpError>;
}
