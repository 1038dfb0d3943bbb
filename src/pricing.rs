use crate::error::BnpResult;
use crate::problem::VarType;
use crate::solvers::{LPSolver, LpProblem, LpRow, LpStatus, RowSense};

#[derive(Clone, Debug, PartialEq)]
/// Linear constraint over pricing variables enforcing a branching decision
pub struct SideConstraint {
    pub terms: Vec<(usize, f64)>,
    pub sense: RowSense,
    pub rhs: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PricingStatus {
    Optimal,
    /// node limit reached, the lower bound is still valid
    NodeLimit,
    Infeasible,
    Unbounded,
}

#[derive(Clone, Debug)]
pub struct PricingResult {
    pub status: PricingStatus,
    /// every incumbent found, best first
    pub solutions: Vec<(f64, Vec<f64>)>,
    pub lower_bound: f64,
    pub ray: Option<Vec<f64>>,
    pub nodes: usize,
}

/// Pricing problem of one block
#[derive(Clone, Debug)]
pub struct PricingProblem {
    pub block: usize,
    pub vtypes: Vec<VarType>,
    pub lb: Vec<f64>,
    pub ub: Vec<f64>,
    pub conss: Vec<LpRow>,
    side: Vec<SideConstraint>,
}

struct OpenNode {
    lb: Vec<f64>,
    ub: Vec<f64>,
    bound: f64,
}

impl PricingProblem {
    pub fn new(block: usize, vtypes: Vec<VarType>, lb: Vec<f64>, ub: Vec<f64>, conss: Vec<LpRow>) -> Self {
        PricingProblem { block, vtypes, lb, ub, conss, side: vec![] }
    }

    pub fn num_vars(&self) -> usize {
        self.vtypes.len()
    }

    pub fn push_side(&mut self, cons: SideConstraint) {
        self.side.push(cons);
    }

    pub fn pop_side(&mut self) -> Option<SideConstraint> {
        self.side.pop()
    }

    pub fn num_side(&self) -> usize {
        self.side.len()
    }

    pub fn side_constraints(&self) -> &[SideConstraint] {
        &self.side
    }

    /// Minimizes `costs` over the block by LP based depth first branch and bound
    pub fn solve(&self, costs: &[f64], node_limit: usize, lp_solver: &mut dyn LPSolver, tol: f64) -> BnpResult<PricingResult> {
        let mut lp = LpProblem {
            obj: costs.to_vec(),
            lb: self.lb.clone(),
            ub: self.ub.clone(),
            rows: self.conss.clone(),
        };
        for side in &self.side {
            lp.add_row(side.terms.clone(), side.sense, side.rhs);
        }

        let mut open = vec![OpenNode { lb: self.lb.clone(), ub: self.ub.clone(), bound: f64::NEG_INFINITY }];
        let mut incumbent = f64::INFINITY;
        let mut solutions: Vec<(f64, Vec<f64>)> = vec![];
        let mut nodes = 0;

        while let Some(node) = open.pop() {
            if node.bound >= incumbent - tol {
                continue;
            }
            if nodes >= node_limit {
                open.push(node);
                break;
            }
            nodes += 1;

            lp.lb.clone_from(&node.lb);
            lp.ub.clone_from(&node.ub);
            let relaxation = lp_solver.solve(&lp)?;

            match relaxation.status {
                LpStatus::Infeasible => continue,
                LpStatus::Unbounded => {
                    solutions.reverse();
                    return Ok(PricingResult {
                        status: PricingStatus::Unbounded,
                        solutions,
                        lower_bound: f64::NEG_INFINITY,
                        ray: relaxation.ray,
                        nodes,
                    });
                }
                LpStatus::Optimal => {}
            }
            if relaxation.objective >= incumbent - tol {
                continue;
            }

            // most fractional integer variable
            let branch_var = (0..self.num_vars())
                .filter(|&j| self.vtypes[j].is_integral())
                .map(|j| (j, (relaxation.x[j] - relaxation.x[j].floor()).min(relaxation.x[j].ceil() - relaxation.x[j])))
                .filter(|(_, frac)| *frac > tol)
                .max_by(|a, b| a.1.total_cmp(&b.1));

            match branch_var {
                None => {
                    let values: Vec<f64> = relaxation.x.iter().enumerate()
                        .map(|(j, x)| if self.vtypes[j].is_integral() { x.round() } else { *x })
                        .collect();
                    incumbent = values.iter().zip(costs).map(|(x, c)| x * c).sum();
                    solutions.push((incumbent, values));
                }
                Some((j, _)) => {
                    let value = relaxation.x[j];
                    let mut down = OpenNode { lb: node.lb.clone(), ub: node.ub.clone(), bound: relaxation.objective };
                    down.ub[j] = value.floor();
                    let mut up = OpenNode { lb: node.lb, ub: node.ub, bound: relaxation.objective };
                    up.lb[j] = value.ceil();

                    // nearer child is explored first
                    if value - value.floor() < 0.5 {
                        open.push(up);
                        open.push(down);
                    } else {
                        open.push(down);
                        open.push(up);
                    }
                }
            }
        }

        let open_bound = open.iter().map(|n| n.bound).fold(f64::INFINITY, f64::min);
        let status = if !open.is_empty() {
            PricingStatus::NodeLimit
        } else if solutions.is_empty() {
            PricingStatus::Infeasible
        } else {
            PricingStatus::Optimal
        };
        solutions.reverse();

        Ok(PricingResult {
            status,
            solutions,
            lower_bound: incumbent.min(open_bound),
            ray: None,
            nodes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solvers::DenseSimplex;

    fn knapsack() -> PricingProblem {
        // 3a + 4b + 5c <= 7, integer
        PricingProblem::new(
            0,
            vec![VarType::Integer, VarType::Integer, VarType::Binary],
            vec![0.0; 3],
            vec![2.0, 1.0, 1.0],
            vec![LpRow { coefs: vec![(0, 3.0), (1, 4.0), (2, 5.0)], sense: RowSense::Le, rhs: 7.0 }],
        )
    }

    #[test]
    fn solves_integer_knapsack() {
        let pricing = knapsack();
        let mut lp = DenseSimplex::new();
        let result = pricing.solve(&[-4.0, -5.0, -6.0], 1000, &mut lp, 1e-6).unwrap();

        assert_eq!(result.status, PricingStatus::Optimal);
        // a + b gives 9, 2a gives 8, c alone 6
        assert!((result.lower_bound + 9.0).abs() < 1e-6);
        let (obj, best) = &result.solutions[0];
        assert!((obj + 9.0).abs() < 1e-6);
        assert_eq!(best, &vec![1.0, 1.0, 0.0]);
    }

    #[test]
    fn side_constraints_are_respected_and_stacked() {
        let mut pricing = knapsack();
        pricing.push_side(SideConstraint { terms: vec![(1, 1.0)], sense: RowSense::Le, rhs: 0.0 });
        let mut lp = DenseSimplex::new();
        let result = pricing.solve(&[-4.0, -5.0, -6.0], 1000, &mut lp, 1e-6).unwrap();
        assert!((result.lower_bound + 8.0).abs() < 1e-6);

        assert!(pricing.pop_side().is_some());
        assert_eq!(pricing.num_side(), 0);
    }

    #[test]
    fn infeasible_side_constraints() {
        let mut pricing = knapsack();
        pricing.push_side(SideConstraint { terms: vec![(0, 1.0), (2, 1.0)], sense: RowSense::Ge, rhs: 3.5 });
        let mut lp = DenseSimplex::new();
        let result = pricing.solve(&[1.0, 1.0, 1.0], 1000, &mut lp, 1e-6).unwrap();
        assert_eq!(result.status, PricingStatus::Infeasible);
        assert_eq!(result.lower_bound, f64::INFINITY);
    }

    #[test]
    fn unbounded_block_yields_ray() {
        let pricing = PricingProblem::new(0, vec![VarType::Continuous], vec![0.0], vec![f64::INFINITY], vec![]);
        let mut lp = DenseSimplex::new();
        let result = pricing.solve(&[-1.0], 10, &mut lp, 1e-6).unwrap();
        assert_eq!(result.status, PricingStatus::Unbounded);
        assert!(result.ray.unwrap()[0] > 0.0);
    }
}
