use gurobi::{attr, param, ConstrSense, LinExpr, Minimize, Status, VarType};
use crate::error::LpError;
use super::{LPSolver, LpProblem, LpSolution, LpStatus, RowSense};

fn backend(err: gurobi::Error) -> LpError {
    LpError::Backend(format!("{:?}", err))
}

/// LP backend on top of a gurobi environment
pub struct GurobiSolver {
    env: gurobi::Env,
}

impl GurobiSolver {
    pub fn new_with_seed(seed: i32) -> Result<Self, LpError> {
        let mut env = gurobi::Env::new("").map_err(backend)?;
        env.set(param::Threads, 1).map_err(backend)?;
        env.set(param::Seed, seed).map_err(backend)?;
        env.set(param::OutputFlag, 0).map_err(backend)?;
        env.set(param::InfUnbdInfo, 1).map_err(backend)?;
        Ok(GurobiSolver { env })
    }

    pub fn set_time_limit(&mut self, seconds: f64) -> Result<(), LpError> {
        self.env.set(param::TimeLimit, seconds).map_err(backend)
    }
}

impl LPSolver for GurobiSolver {
    fn name(&self) -> &'static str {
        "gurobi"
    }

    fn solve(&mut self, problem: &LpProblem) -> Result<LpSolution, LpError> {
        let mut model = gurobi::Model::new("lp", &self.env).map_err(backend)?;
        model.set_objective(LinExpr::new(), Minimize).map_err(backend)?;

        let constrs = problem.rows.iter().enumerate().map(|(i, row)| {
            let sense = match row.sense {
                RowSense::Le => ConstrSense::Less,
                RowSense::Ge => ConstrSense::Greater,
                RowSense::Eq => ConstrSense::Equal,
            };
            model.add_constr(&format!("r{}", i), LinExpr::new(), sense, row.rhs)
        }).collect::<Result<Vec<_>, _>>().map_err(backend)?;

        // column wise coefficients
        let mut col_constrs = vec![vec![]; problem.num_vars()];
        let mut col_vals = vec![vec![]; problem.num_vars()];
        for (i, row) in problem.rows.iter().enumerate() {
            for &(j, a) in &row.coefs {
                col_constrs[j].push(constrs[i].clone());
                col_vals[j].push(a);
            }
        }

        let vars = (0..problem.num_vars()).map(|j| {
            model.add_var(&format!("x{}", j), VarType::Continuous, problem.obj[j], problem.lb[j], problem.ub[j], &col_constrs[j], &col_vals[j])
        }).collect::<Result<Vec<_>, _>>().map_err(backend)?;

        model.update().map_err(backend)?;
        model.optimize().map_err(backend)?;

        let runtime: f64 = model.get(attr::Runtime).map_err(backend)?;
        let iterations: f64 = model.get(attr::IterCount).map_err(backend)?;

        match model.status().map_err(backend)? {
            Status::Optimal => Ok(LpSolution {
                status: LpStatus::Optimal,
                objective: model.get(attr::ObjVal).map_err(backend)?,
                x: model.get_values(attr::X, &vars).map_err(backend)?,
                duals: model.get_values(attr::Pi, &constrs).map_err(backend)?,
                ray: None,
                iterations: iterations as usize,
                runtime,
            }),
            Status::Infeasible => {
                let mut solution = LpSolution::infeasible(problem.num_vars(), problem.rows.len());
                solution.runtime = runtime;
                Ok(solution)
            }
            Status::Unbounded | Status::InfOrUnbd => Ok(LpSolution {
                status: LpStatus::Unbounded,
                objective: f64::NEG_INFINITY,
                x: vec![0.0; problem.num_vars()],
                duals: vec![0.0; problem.rows.len()],
                ray: model.get_values(attr::UnbdRay, &vars).ok(),
                iterations: iterations as usize,
                runtime,
            }),
            other => Err(LpError::Backend(format!("unexpected gurobi status {:?}", other))),
        }
    }
}
