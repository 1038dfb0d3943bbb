use crate::master::column_pool::ColumnId;
use crate::vars::{VarId, VarRef, VarStore};

const EPS: f64 = 1e-9;

/// Adds `scale` times the contribution of `column` to copy `slot` of its block
fn add_to_slot(vars: &VarStore, sol: &mut [f64], column: ColumnId, block: usize, slot: usize, scale: f64) {
    let master_var = vars.column(column);
    for (rep, val) in master_var.origvars.iter().zip(&master_var.origvals) {
        // linking variables take their value from the master copy
        if vars.is_linking(*rep) {
            continue;
        }
        let var = vars.copy_var(block, slot, *rep);
        sol[var.0 as usize] += scale * val;
    }
}

/// Translates column values of the master problem into values of the original variables.
///
/// Integral parts of block columns fill one identical copy each, fractional remainders are
/// packed into the remaining copies with at most a total share of one per copy. What does
/// not fit ends up in the last copy.
pub fn transform_master_sol_to_orig_sol(vars: &VarStore, master_values: &[(ColumnId, f64)], feas_tol: f64) -> Vec<f64> {
    let nblocks = vars.nblocks();
    let mut sol = vec![0.0; vars.num_orig()];
    let mut filled = vec![0usize; nblocks];
    let mut fractional: Vec<(ColumnId, usize, f64)> = vec![];

    for &(id, value) in master_values {
        if value.abs() <= EPS {
            continue;
        }
        let column = vars.column(id);
        match column.block {
            None => {
                for (var, val) in column.origvars.iter().zip(&column.origvals) {
                    sol[var.0 as usize] += value * val;
                }
            }
            Some(block) if column.is_ray => {
                let mult = vars.multiplicity(block);
                for slot in 0..mult {
                    add_to_slot(vars, &mut sol, id, block, slot, value / mult as f64);
                }
            }
            Some(block) => {
                let last = vars.multiplicity(block) - 1;
                let mut rest = value;
                while rest >= 1.0 - feas_tol {
                    add_to_slot(vars, &mut sol, id, block, filled[block].min(last), 1.0);
                    filled[block] += 1;
                    rest -= 1.0;
                }
                if rest > EPS {
                    fractional.push((id, block, rest));
                }
            }
        }
    }

    let mut share = vec![0.0; nblocks];
    for (id, block, value) in fractional {
        let last = vars.multiplicity(block) - 1;
        let mut rest = value;
        while rest > EPS {
            let slot = filled[block].min(last);
            let amount = if filled[block] >= last { rest } else { rest.min(1.0 - share[block]) };
            add_to_slot(vars, &mut sol, id, block, slot, amount);
            share[block] += amount;
            rest -= amount;
            if share[block] >= 1.0 - EPS && filled[block] < last {
                filled[block] += 1;
                share[block] = 0.0;
            }
        }
    }

    debug_assert!({
        let master_obj: f64 = master_values.iter().map(|(id, v)| vars.column(*id).obj * v).sum();
        let orig_obj: f64 = vars.orig.iter().zip(&sol).map(|(var, x)| var.obj * x).sum();
        (master_obj - orig_obj).abs() <= feas_tol * (1.0 + master_obj.abs())
    }, "objective of the translated solution differs from the master objective");

    sol
}

/// Writes values of decomposed variables into an original space solution.
///
/// Missing values are taken from the finite lower bound (or zero). In artificial mode every
/// value is replaced by the bound pointed to by the sign of the objective.
pub fn set_original_problem_values(vars: &VarStore, entries: &[(VarRef, Option<f64>)], artificial: bool) -> Vec<f64> {
    let mut sol = vec![0.0; vars.num_orig()];

    for (var, value) in entries {
        let targets: Vec<VarId> = match var {
            VarRef::Original(v) => vec![*v],
            VarRef::Pricing(_) => vars.pricing_origvars(*var).to_vec(),
            VarRef::Master(_) => vars.master_origvars(*var).to_vec(),
        };
        for target in targets {
            let orig = vars.orig(target);
            let finite_or_zero = |bound: f64| if bound.is_finite() { bound } else { 0.0 };
            let x = if artificial {
                let bound = if orig.obj > 0.0 { orig.ub } else { orig.lb };
                if bound.is_finite() {
                    bound
                } else {
                    finite_or_zero(if orig.obj > 0.0 { orig.lb } else { orig.ub })
                }
            } else {
                value.unwrap_or_else(|| finite_or_zero(orig.lb))
            };
            sol[target.0 as usize] = x;
        }
    }
    sol
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::{BlockCopy, Decomposition, OrigProblem, VarType};
    use crate::solvers::RowSense;
    use crate::transform::{transform, Transformed};

    /// three identical copies of a block with variables (x, y), plus a master variable z
    fn aggregated() -> (Transformed, Vec<[VarId; 2]>, VarId) {
        let mut problem = OrigProblem::new();
        let copies: Vec<[VarId; 2]> = (0..3).map(|c| [
            problem.add_var(&format!("x{c}"), VarType::Integer, 0.0, 3.0, 2.0),
            problem.add_var(&format!("y{c}"), VarType::Integer, 0.0, 3.0, 1.0),
        ]).collect();
        let z = problem.add_var("z", VarType::Continuous, 0.0, 10.0, 5.0);
        let mut cover = copies.iter().flat_map(|c| [(c[0], 1.0), (c[1], 1.0)]).collect::<Vec<_>>();
        cover.push((z, 1.0));
        problem.add_cons("cover", cover, RowSense::Ge, 2.0);

        let mut decomposition = Decomposition::new();
        decomposition.add_identical_blocks(copies.iter().map(|c| BlockCopy { vars: c.to_vec(), conss: vec![] }).collect());
        (transform(&problem, &decomposition).unwrap(), copies, z)
    }

    fn add(t: &mut Transformed, values: &[f64]) -> ColumnId {
        let column = t.master.make_block_column(&t.vars, 0, values, false);
        t.vars.add_column(column).unwrap()
    }

    #[test]
    fn single_integral_column_fills_exactly_one_copy() {
        let (mut t, copies, _) = aggregated();
        let col = add(&mut t, &[1.0, 2.0]);

        let sol = transform_master_sol_to_orig_sol(&t.vars, &[(col, 1.0)], 1e-6);
        assert_eq!(sol[copies[0][0].0 as usize], 1.0);
        assert_eq!(sol[copies[0][1].0 as usize], 2.0);
        for copy in &copies[1..] {
            assert_eq!(sol[copy[0].0 as usize], 0.0);
            assert_eq!(sol[copy[1].0 as usize], 0.0);
        }
    }

    #[test]
    fn integral_parts_before_fractional_parts() {
        let (mut t, copies, z) = aggregated();
        let a = add(&mut t, &[1.0, 0.0]);
        let b = add(&mut t, &[0.0, 1.0]);
        let direct = t.vars.orig(z).direct.unwrap();

        // a = 0.5, b = 1.5 -> b fills copy 0, then a and the rest of b share copy 1
        let values = [(direct, 0.25), (a, 0.5), (b, 1.5)];
        let sol = transform_master_sol_to_orig_sol(&t.vars, &values, 1e-6);

        assert_eq!(sol[z.0 as usize], 0.25);
        assert_eq!(sol[copies[0][1].0 as usize], 1.0);
        assert_eq!(sol[copies[1][0].0 as usize], 0.5);
        assert_eq!(sol[copies[1][1].0 as usize], 0.5);
        assert_eq!(sol[copies[2][0].0 as usize], 0.0);

        let master_obj: f64 = values.iter().map(|(id, v)| t.vars.column(*id).obj * v).sum();
        let orig_obj: f64 = t.vars.orig.iter().zip(&sol).map(|(var, x)| var.obj * x).sum();
        assert!((master_obj - orig_obj).abs() < 1e-9);
    }

    #[test]
    fn overflow_stays_in_last_copy() {
        let (mut t, copies, _) = aggregated();
        let a = add(&mut t, &[1.0, 0.0]);
        let b = add(&mut t, &[0.0, 1.0]);

        // 2.6 integral units fill copies 0 and 1, the fractional parts exceed the last copy
        let sol = transform_master_sol_to_orig_sol(&t.vars, &[(a, 2.6), (b, 0.7)], 1e-6);
        assert_eq!(sol[copies[0][0].0 as usize], 1.0);
        assert_eq!(sol[copies[1][0].0 as usize], 1.0);
        assert!((sol[copies[2][0].0 as usize] - 0.6).abs() < 1e-9);
        assert!((sol[copies[2][1].0 as usize] - 0.7).abs() < 1e-9);
    }

    #[test]
    fn artificial_values_follow_objective_sign() {
        let (t, copies, z) = aggregated();
        let pricing = VarRef::Pricing(t.vars.orig(copies[0][0]).pricing[0]);
        let sol = set_original_problem_values(&t.vars, &[(pricing, None), (VarRef::Original(z), Some(4.0))], true);
        for copy in &copies {
            assert_eq!(sol[copy[0].0 as usize], 3.0);
        }
        assert_eq!(sol[z.0 as usize], 10.0);

        let sol = set_original_problem_values(&t.vars, &[(pricing, None), (VarRef::Original(z), Some(4.0))], false);
        assert_eq!(sol[copies[1][0].0 as usize], 0.0);
        assert_eq!(sol[z.0 as usize], 4.0);
    }
}
