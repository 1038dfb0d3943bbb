use crate::error::{BnpError, BnpResult};
use crate::solvers::RowSense;
use crate::misc::HashMap;
use crate::vars::VarId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VarType {
    Binary,
    Integer,
    Continuous,
}

impl VarType {
    pub fn is_integral(&self) -> bool {
        !matches!(self, VarType::Continuous)
    }
}

#[derive(Clone, Debug)]
pub struct OrigVarData {
    pub name: String,
    pub vtype: VarType,
    pub lb: f64,
    pub ub: f64,
    pub obj: f64,
}

#[derive(Clone, Debug)]
pub struct LinearCons {
    pub name: String,
    pub coefs: Vec<(VarId, f64)>,
    pub sense: RowSense,
    pub rhs: f64,
}

#[derive(Clone, Debug, Default)]
/// Mixed integer program in minimization form
pub struct OrigProblem {
    pub vars: Vec<OrigVarData>,
    pub conss: Vec<LinearCons>,
}

impl OrigProblem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_var(&mut self, name: &str, vtype: VarType, lb: f64, ub: f64, obj: f64) -> VarId {
        let (lb, ub) = match vtype {
            VarType::Binary => (lb.max(0.0), ub.min(1.0)),
            _ => (lb, ub),
        };
        self.vars.push(OrigVarData { name: name.to_string(), vtype, lb, ub, obj });
        VarId(self.vars.len() as u32 - 1)
    }

    pub fn add_cons(&mut self, name: &str, coefs: Vec<(VarId, f64)>, sense: RowSense, rhs: f64) -> usize {
        self.conss.push(LinearCons { name: name.to_string(), coefs, sense, rhs });
        self.conss.len() - 1
    }

    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    pub fn objective(&self, sol: &[f64]) -> f64 {
        self.vars.iter().zip(sol).map(|(v, x)| v.obj * x).sum()
    }

    /// Checks bounds, integrality and all constraints of a full assignment
    pub fn is_feasible(&self, sol: &[f64], tol: f64) -> bool {
        if sol.len() != self.vars.len() {
            return false;
        }
        let bounds_ok = self.vars.iter().zip(sol).all(|(v, &x)| {
            x >= v.lb - tol && x <= v.ub + tol && (!v.vtype.is_integral() || (x - x.round()).abs() <= tol)
        });
        bounds_ok && self.conss.iter().all(|c| {
            let activity: f64 = c.coefs.iter().map(|(v, a)| a * sol[v.0 as usize]).sum();
            let scaled = tol * (1.0 + c.rhs.abs());
            match c.sense {
                RowSense::Le => activity <= c.rhs + scaled,
                RowSense::Ge => activity >= c.rhs - scaled,
                RowSense::Eq => (activity - c.rhs).abs() <= scaled,
            }
        })
    }
}

#[derive(Clone, Debug, Default)]
/// One identical copy of a block, `vars[k]` of every copy plays the same role
pub struct BlockCopy {
    pub vars: Vec<VarId>,
    pub conss: Vec<usize>,
}

#[derive(Clone, Debug, Default)]
pub struct BlockSpec {
    /// more than one copy aggregates identical blocks into one pricing problem
    pub copies: Vec<BlockCopy>,
}

#[derive(Clone, Debug, Default)]
/// Block diagonal structure of an [`OrigProblem`].
///
/// Constraints outside every block are linking constraints of the master problem. A
/// variable listed in more than one block is a linking variable.
pub struct Decomposition {
    pub blocks: Vec<BlockSpec>,
}

impl Decomposition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a block consisting of a single copy
    pub fn add_block(&mut self, vars: Vec<VarId>, conss: Vec<usize>) -> usize {
        self.blocks.push(BlockSpec { copies: vec![BlockCopy { vars, conss }] });
        self.blocks.len() - 1
    }

    /// Adds a block with identical copies that are aggregated into one pricing problem
    pub fn add_identical_blocks(&mut self, copies: Vec<BlockCopy>) -> usize {
        self.blocks.push(BlockSpec { copies });
        self.blocks.len() - 1
    }

    pub(crate) fn validate(&self, problem: &OrigProblem) -> BnpResult<()> {
        let nvars = problem.num_vars();
        let ncons = problem.conss.len();
        let mut cons_owner: HashMap<usize, usize> = HashMap::default();
        let mut var_blocks: HashMap<VarId, Vec<usize>> = HashMap::default();

        for (b, block) in self.blocks.iter().enumerate() {
            let Some(first) = block.copies.first() else {
                return Err(BnpError::InvalidDecomposition(format!("block {b} has no copies")));
            };
            for (c, copy) in block.copies.iter().enumerate() {
                if copy.vars.len() != first.vars.len() || copy.conss.len() != first.conss.len() {
                    return Err(BnpError::InvalidDecomposition(format!("copy {c} of block {b} differs in size from copy 0")));
                }
                for v in &copy.vars {
                    if v.0 as usize >= nvars {
                        return Err(BnpError::InvalidDecomposition(format!("block {b} references unknown variable {}", v.0)));
                    }
                    let blocks = var_blocks.entry(*v).or_default();
                    if blocks.contains(&b) {
                        return Err(BnpError::InvalidDecomposition(format!("variable {} listed twice in block {b}", v.0)));
                    }
                    blocks.push(b);
                }
                for &cons in &copy.conss {
                    if cons >= ncons {
                        return Err(BnpError::InvalidDecomposition(format!("block {b} references unknown constraint {cons}")));
                    }
                    if cons_owner.insert(cons, b).is_some() {
                        return Err(BnpError::InvalidDecomposition(format!("constraint {cons} assigned to more than one block")));
                    }
                }
            }
        }

        for (v, blocks) in &var_blocks {
            if blocks.len() > 1 && blocks.iter().any(|b| self.blocks[*b].copies.len() > 1) {
                return Err(BnpError::InvalidDecomposition(format!("linking variable {} is part of an aggregated block", v.0)));
            }
        }

        // a block constraint may only use variables of its own block copy
        for (b, block) in self.blocks.iter().enumerate() {
            for copy in &block.copies {
                for &cons in &copy.conss {
                    if let Some((v, _)) = problem.conss[cons].coefs.iter().find(|(v, _)| !copy.vars.contains(v)) {
                        return Err(BnpError::InvalidDecomposition(format!(
                            "constraint {} of block {b} uses variable {} outside of its block", problem.conss[cons].name, v.0
                        )));
                    }
                }
            }
        }

        // aggregation requires identical objective and linking coefficients
        for (b, block) in self.blocks.iter().enumerate().filter(|(_, block)| block.copies.len() > 1) {
            let first = &block.copies[0];
            for copy in &block.copies[1..] {
                for (k, (&rep, &var)) in first.vars.iter().zip(&copy.vars).enumerate() {
                    let (r, o) = (&problem.vars[rep.0 as usize], &problem.vars[var.0 as usize]);
                    if r.obj != o.obj || r.vtype != o.vtype || r.lb != o.lb || r.ub != o.ub {
                        return Err(BnpError::InvalidDecomposition(format!("variable {k} of block {b} differs between identical copies")));
                    }
                }
                let linking = problem.conss.iter().enumerate().filter(|(i, _)| !cons_owner.contains_key(i)).map(|(_, cons)| cons);
                for cons in linking {
                    for (&rep, &var) in first.vars.iter().zip(&copy.vars) {
                        let coef = |v: VarId| cons.coefs.iter().filter(|(w, _)| *w == v).map(|(_, a)| a).sum::<f64>();
                        if coef(rep) != coef(var) {
                            return Err(BnpError::InvalidDecomposition(format!(
                                "linking constraint {} treats identical copies of block {b} differently", cons.name
                            )));
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_linking_variable_in_aggregated_block() {
        let mut problem = OrigProblem::new();
        let x = problem.add_var("x", VarType::Binary, 0.0, 1.0, 1.0);
        let y = problem.add_var("y", VarType::Binary, 0.0, 1.0, 1.0);
        let z = problem.add_var("z", VarType::Binary, 0.0, 1.0, 1.0);

        let mut decomposition = Decomposition::new();
        decomposition.add_identical_blocks(vec![
            BlockCopy { vars: vec![x], conss: vec![] },
            BlockCopy { vars: vec![y], conss: vec![] },
        ]);
        decomposition.add_block(vec![x, z], vec![]);

        assert!(matches!(decomposition.validate(&problem), Err(BnpError::InvalidDecomposition(_))));
    }

    #[test]
    fn rejects_block_constraint_with_foreign_variable() {
        let mut problem = OrigProblem::new();
        let x = problem.add_var("x", VarType::Integer, 0.0, 4.0, 1.0);
        let y = problem.add_var("y", VarType::Integer, 0.0, 4.0, 1.0);
        let c = problem.add_cons("c", vec![(x, 1.0), (y, 1.0)], RowSense::Le, 3.0);

        let mut decomposition = Decomposition::new();
        decomposition.add_block(vec![x], vec![c]);
        assert!(decomposition.validate(&problem).is_err());
    }

    #[test]
    fn feasibility_check_respects_integrality() {
        let mut problem = OrigProblem::new();
        let x = problem.add_var("x", VarType::Integer, 0.0, 4.0, 1.0);
        problem.add_cons("c", vec![(x, 2.0)], RowSense::Ge, 3.0);
        assert!(!problem.is_feasible(&[1.5], 1e-6));
        assert!(problem.is_feasible(&[2.0], 1e-6));
        assert!(!problem.is_feasible(&[1.0], 1e-6));
    }
}
