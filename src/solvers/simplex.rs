use std::time::Instant;
use crate::error::LpError;
use super::{LPSolver, LpProblem, LpSolution, LpStatus, RowSense};

const PIVOT_TOL: f64 = 1e-9;
const OPT_TOL: f64 = 1e-9;
const FEAS_TOL: f64 = 1e-7;
/// degenerate pivots in a row before switching to Bland's rule
const MAX_DEGENERATE_PIVOTS: usize = 50;

#[derive(Clone, Debug)]
/// Dense two phase primal simplex.
///
/// Suited for the small master and pricing relaxations built by this crate. Large
/// instances should use an external backend.
pub struct DenseSimplex {
    pub max_iterations: usize,
}

impl Default for DenseSimplex {
    fn default() -> Self {
        DenseSimplex { max_iterations: 50_000 }
    }
}

impl DenseSimplex {
    pub fn new() -> Self {
        Self::default()
    }
}

/// How a column of the standard form relates to an original variable
#[derive(Clone, Copy, Debug)]
struct Structural {
    var: usize,
    coef: f64,
}

struct Tableau {
    rows: Vec<Vec<f64>>,
    obj: Vec<f64>,
    basis: Vec<usize>,
    num_cols: usize,
    /// first artificial column, artificials never reenter in phase two
    first_artificial: usize,
    iterations: usize,
    max_iterations: usize,
}

enum PhaseResult {
    Optimal,
    Unbounded(usize),
}

impl Tableau {
    fn rhs(&self, row: usize) -> f64 {
        self.rows[row][self.num_cols]
    }

    fn pivot(&mut self, row: usize, col: usize) {
        let width = self.num_cols + 1;
        let p = self.rows[row][col];
        for j in 0..width {
            self.rows[row][j] /= p;
        }
        let pivot_row = self.rows[row].clone();
        for (i, other) in self.rows.iter_mut().enumerate() {
            if i == row {
                continue;
            }
            let factor = other[col];
            if factor.abs() > 0.0 {
                for j in 0..width {
                    other[j] -= factor * pivot_row[j];
                }
            }
        }
        let factor = self.obj[col];
        if factor.abs() > 0.0 {
            for j in 0..width {
                self.obj[j] -= factor * pivot_row[j];
            }
        }
        self.basis[row] = col;
    }

    /// Set the objective row to the reduced costs of `costs` under the current basis
    fn price_out(&mut self, costs: &[f64]) {
        self.obj = costs.to_vec();
        self.obj.push(0.0);
        for i in 0..self.rows.len() {
            let cb = costs[self.basis[i]];
            if cb != 0.0 {
                for j in 0..=self.num_cols {
                    self.obj[j] -= cb * self.rows[i][j];
                }
            }
        }
    }

    fn run(&mut self, allowed_cols: usize) -> Result<PhaseResult, LpError> {
        let mut degenerate = 0;
        let mut bland = false;

        loop {
            let entering = if bland {
                (0..allowed_cols).find(|&j| self.obj[j] < -OPT_TOL)
            } else {
                (0..allowed_cols)
                    .filter(|&j| self.obj[j] < -OPT_TOL)
                    .min_by(|&a, &b| self.obj[a].total_cmp(&self.obj[b]))
            };
            let Some(q) = entering else {
                return Ok(PhaseResult::Optimal);
            };

            let mut leaving: Option<(usize, f64)> = None;
            for i in 0..self.rows.len() {
                let a = self.rows[i][q];
                if a > PIVOT_TOL {
                    let ratio = self.rhs(i).max(0.0) / a;
                    leaving = match leaving {
                        None => Some((i, ratio)),
                        Some((_, best)) if ratio < best - PIVOT_TOL => Some((i, ratio)),
                        Some((r, best)) if ratio <= best + PIVOT_TOL && self.basis[i] < self.basis[r] => Some((i, ratio)),
                        keep => keep,
                    };
                }
            }
            let Some((r, ratio)) = leaving else {
                return Ok(PhaseResult::Unbounded(q));
            };

            self.iterations += 1;
            if self.iterations > self.max_iterations {
                return Err(LpError::IterationLimit(self.max_iterations));
            }

            if ratio <= PIVOT_TOL {
                degenerate += 1;
                if degenerate > MAX_DEGENERATE_PIVOTS {
                    bland = true;
                }
            } else {
                degenerate = 0;
            }

            self.pivot(r, q);
        }
    }
}

impl LPSolver for DenseSimplex {
    fn name(&self) -> &'static str {
        "dense-simplex"
    }

    fn solve(&mut self, problem: &LpProblem) -> Result<LpSolution, LpError> {
        let start = Instant::now();
        let n = problem.num_vars();
        let m = problem.rows.len();

        if problem.lb.len() != n || problem.ub.len() != n {
            return Err(LpError::Numerical("bound vectors don't match the number of variables".to_string()));
        }

        // transform every variable into nonnegative standard form columns
        let mut offset = vec![0.0; n];
        let mut structurals: Vec<Structural> = Vec::with_capacity(n);
        let mut bound_rows: Vec<(usize, f64)> = vec![];
        for j in 0..n {
            let (lb, ub) = (problem.lb[j], problem.ub[j]);
            if lb > ub + FEAS_TOL {
                return Ok(LpSolution::infeasible(n, m));
            }
            if lb.is_finite() && ub.is_finite() && (ub - lb).abs() <= FEAS_TOL {
                offset[j] = lb;
            } else if lb.is_finite() {
                offset[j] = lb;
                structurals.push(Structural { var: j, coef: 1.0 });
                if ub.is_finite() {
                    bound_rows.push((structurals.len() - 1, ub - lb));
                }
            } else if ub.is_finite() {
                offset[j] = ub;
                structurals.push(Structural { var: j, coef: -1.0 });
            } else {
                structurals.push(Structural { var: j, coef: 1.0 });
                structurals.push(Structural { var: j, coef: -1.0 });
            }
        }

        let mut col_of_var: Vec<Vec<usize>> = vec![vec![]; n];
        for (k, s) in structurals.iter().enumerate() {
            col_of_var[s.var].push(k);
        }

        let num_struct = structurals.len();
        let total_rows = m + bound_rows.len();

        // dense rows over the structural columns, flipped to a nonnegative rhs
        let mut dense: Vec<Vec<f64>> = Vec::with_capacity(total_rows);
        let mut senses: Vec<RowSense> = Vec::with_capacity(total_rows);
        let mut rhs: Vec<f64> = Vec::with_capacity(total_rows);
        let mut flip: Vec<f64> = Vec::with_capacity(total_rows);

        for row in &problem.rows {
            let mut coefs = vec![0.0; num_struct];
            let mut b = row.rhs;
            for &(j, a) in &row.coefs {
                if j >= n {
                    return Err(LpError::Numerical(format!("row references unknown variable {}", j)));
                }
                b -= a * offset[j];
                for &k in &col_of_var[j] {
                    coefs[k] += a * structurals[k].coef;
                }
            }
            dense.push(coefs);
            senses.push(row.sense);
            rhs.push(b);
        }
        for &(k, width) in &bound_rows {
            let mut coefs = vec![0.0; num_struct];
            coefs[k] = 1.0;
            dense.push(coefs);
            senses.push(RowSense::Le);
            rhs.push(width);
        }
        for i in 0..total_rows {
            if rhs[i] < 0.0 {
                rhs[i] = -rhs[i];
                dense[i].iter_mut().for_each(|a| *a = -*a);
                senses[i] = match senses[i] {
                    RowSense::Le => RowSense::Ge,
                    RowSense::Ge => RowSense::Le,
                    RowSense::Eq => RowSense::Eq,
                };
                flip.push(-1.0);
            } else {
                flip.push(1.0);
            }
        }

        // column layout: structurals | slacks and surpluses | artificials
        let num_slack = senses.iter().filter(|s| **s != RowSense::Eq).count();
        let num_art = senses.iter().filter(|s| **s != RowSense::Le).count();
        let first_slack = num_struct;
        let first_artificial = num_struct + num_slack;
        let num_cols = first_artificial + num_art;

        let mut rows = vec![vec![0.0; num_cols + 1]; total_rows];
        let mut basis = vec![0; total_rows];
        // column whose reduced cost yields the dual of the row
        let mut identity_col = vec![0; total_rows];
        let (mut next_slack, mut next_art) = (first_slack, first_artificial);
        for i in 0..total_rows {
            rows[i][..num_struct].copy_from_slice(&dense[i]);
            rows[i][num_cols] = rhs[i];
            match senses[i] {
                RowSense::Le => {
                    rows[i][next_slack] = 1.0;
                    basis[i] = next_slack;
                    identity_col[i] = next_slack;
                    next_slack += 1;
                }
                RowSense::Ge => {
                    rows[i][next_slack] = -1.0;
                    rows[i][next_art] = 1.0;
                    basis[i] = next_art;
                    identity_col[i] = next_art;
                    next_slack += 1;
                    next_art += 1;
                }
                RowSense::Eq => {
                    rows[i][next_art] = 1.0;
                    basis[i] = next_art;
                    identity_col[i] = next_art;
                    next_art += 1;
                }
            }
        }

        let mut tableau = Tableau {
            rows,
            obj: vec![],
            basis,
            num_cols,
            first_artificial,
            iterations: 0,
            max_iterations: self.max_iterations,
        };

        // phase one: minimize the sum of artificials
        if num_art > 0 {
            let mut costs = vec![0.0; num_cols];
            costs[first_artificial..].iter_mut().for_each(|c| *c = 1.0);
            tableau.price_out(&costs);
            tableau.run(num_cols)?;

            let infeasibility = -tableau.obj[num_cols];
            let scale = 1.0 + rhs.iter().fold(0.0_f64, |acc, b| acc.max(b.abs()));
            if infeasibility > FEAS_TOL * scale {
                let mut solution = LpSolution::infeasible(n, m);
                solution.iterations = tableau.iterations;
                solution.runtime = start.elapsed().as_secs_f64();
                return Ok(solution);
            }

            // drive remaining artificials out of the basis where possible
            for i in 0..total_rows {
                if tableau.basis[i] >= first_artificial {
                    if let Some(q) = (0..first_artificial).find(|&j| tableau.rows[i][j].abs() > PIVOT_TOL) {
                        tableau.pivot(i, q);
                    }
                }
            }
        }

        // phase two
        let mut costs = vec![0.0; num_cols];
        for (k, s) in structurals.iter().enumerate() {
            costs[k] = problem.obj[s.var] * s.coef;
        }
        tableau.price_out(&costs);
        let result = tableau.run(tableau.first_artificial)?;

        let mut x_std = vec![0.0; num_cols];
        for (i, &b) in tableau.basis.iter().enumerate() {
            x_std[b] = tableau.rhs(i);
        }
        let mut x = offset.clone();
        for (k, s) in structurals.iter().enumerate() {
            x[s.var] += s.coef * x_std[k];
        }
        let objective = x.iter().zip(&problem.obj).map(|(v, c)| v * c).sum();

        let duals: Vec<f64> = (0..m).map(|i| -flip[i] * tableau.obj[identity_col[i]]).collect();

        let (status, ray) = match result {
            PhaseResult::Optimal => (LpStatus::Optimal, None),
            PhaseResult::Unbounded(q) => {
                let mut direction = vec![0.0; num_cols];
                direction[q] = 1.0;
                for (i, &b) in tableau.basis.iter().enumerate() {
                    direction[b] = -tableau.rows[i][q];
                }
                let mut ray = vec![0.0; n];
                for (k, s) in structurals.iter().enumerate() {
                    ray[s.var] += s.coef * direction[k];
                }
                (LpStatus::Unbounded, Some(ray))
            }
        };

        Ok(LpSolution {
            status,
            objective: if status == LpStatus::Unbounded { f64::NEG_INFINITY } else { objective },
            x,
            duals,
            ray,
            iterations: tableau.iterations,
            runtime: start.elapsed().as_secs_f64(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-6, "{} != {}", a, b);
    }

    #[test]
    fn solves_small_maximization_with_duals() {
        // max 3x + 2y  s.t. x + y <= 4, x + 3y <= 7, x <= 3
        let mut lp = LpProblem::default();
        let x = lp.add_var(-3.0, 0.0, 3.0);
        let y = lp.add_var(-2.0, 0.0, f64::INFINITY);
        lp.add_row(vec![(x, 1.0), (y, 1.0)], RowSense::Le, 4.0);
        lp.add_row(vec![(x, 1.0), (y, 3.0)], RowSense::Le, 7.0);

        let sol = DenseSimplex::new().solve(&lp).unwrap();
        assert_eq!(sol.status, LpStatus::Optimal);
        assert_close(sol.objective, -11.0);
        assert_close(sol.x[x], 3.0);
        assert_close(sol.x[y], 1.0);
        // only the first row is binding with a nonzero multiplier
        assert_close(sol.duals[0], -2.0);
        assert_close(sol.duals[1], 0.0);
    }

    #[test]
    fn equality_and_greater_rows() {
        // min x + y  s.t. x + y >= 2, x - y = 0
        let mut lp = LpProblem::default();
        let x = lp.add_var(1.0, 0.0, f64::INFINITY);
        let y = lp.add_var(1.0, 0.0, f64::INFINITY);
        lp.add_row(vec![(x, 1.0), (y, 1.0)], RowSense::Ge, 2.0);
        lp.add_row(vec![(x, 1.0), (y, -1.0)], RowSense::Eq, 0.0);

        let sol = DenseSimplex::new().solve(&lp).unwrap();
        assert_eq!(sol.status, LpStatus::Optimal);
        assert_close(sol.objective, 2.0);
        assert_close(sol.x[x], 1.0);
        assert_close(sol.x[y], 1.0);
        assert_close(sol.duals[0], 1.0);
        assert_close(sol.duals[1], 0.0);
    }

    #[test]
    fn negative_rhs_rows_keep_dual_sign() {
        // min x  s.t. -x <= -3
        let mut lp = LpProblem::default();
        let x = lp.add_var(1.0, 0.0, f64::INFINITY);
        lp.add_row(vec![(x, -1.0)], RowSense::Le, -3.0);

        let sol = DenseSimplex::new().solve(&lp).unwrap();
        assert_close(sol.x[x], 3.0);
        assert_close(sol.duals[0], -1.0);
    }

    #[test]
    fn detects_infeasibility() {
        let mut lp = LpProblem::default();
        let x = lp.add_var(1.0, 0.0, 1.0);
        lp.add_row(vec![(x, 1.0)], RowSense::Ge, 2.0);

        let sol = DenseSimplex::new().solve(&lp).unwrap();
        assert_eq!(sol.status, LpStatus::Infeasible);
    }

    #[test]
    fn unbounded_problem_returns_ray() {
        // min -x  s.t. x - y <= 1, x >= 0, y free
        let mut lp = LpProblem::default();
        let x = lp.add_var(-1.0, 0.0, f64::INFINITY);
        let y = lp.add_var(0.0, f64::NEG_INFINITY, f64::INFINITY);
        lp.add_row(vec![(x, 1.0), (y, -1.0)], RowSense::Le, 1.0);
        lp.add_row(vec![(x, 1.0)], RowSense::Ge, 0.0);

        let sol = DenseSimplex::new().solve(&lp).unwrap();
        assert_eq!(sol.status, LpStatus::Unbounded);
        let ray = sol.ray.unwrap();
        // the ray improves the objective and keeps x - y <= 1 satisfied
        assert!(-ray[x] < 0.0);
        assert!(ray[x] - ray[y] <= 1e-9);
    }

    #[test]
    fn free_and_fixed_variables() {
        // min x + 2z  s.t. x + z >= -1, z fixed to 0.5, x free
        let mut lp = LpProblem::default();
        let x = lp.add_var(1.0, f64::NEG_INFINITY, f64::INFINITY);
        let z = lp.add_var(2.0, 0.5, 0.5);
        lp.add_row(vec![(x, 1.0), (z, 1.0)], RowSense::Ge, -1.0);

        let sol = DenseSimplex::new().solve(&lp).unwrap();
        assert_eq!(sol.status, LpStatus::Optimal);
        assert_close(sol.x[x], -1.5);
        assert_close(sol.x[z], 0.5);
        assert_close(sol.objective, -0.5);
        assert_close(sol.duals[0], 1.0);
    }
}
