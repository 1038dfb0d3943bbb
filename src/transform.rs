use crate::error::BnpResult;
use crate::master::column_pool::{ColumnPool, MasterVar};
use crate::master::{MasterProblem, MasterRowKind};
use crate::misc::{FullHashMap, HashMap, HashSet};
use crate::pricing::PricingProblem;
use crate::problem::{Decomposition, OrigProblem};
use crate::solvers::{LpRow, RowSense};
use crate::vars::{BlockAssignment, BlockInfo, OrigVar, PricingVar, PricingVarId, VarId, VarStore};

pub struct Transformed {
    pub vars: VarStore,
    pub master: MasterProblem,
    pub pricing: Vec<PricingProblem>,
}

/// Builds the Dantzig-Wolfe reformulation of `problem` under `decomposition`
pub fn transform(problem: &OrigProblem, decomposition: &Decomposition) -> BnpResult<Transformed> {
    decomposition.validate(problem)?;
    let nblocks = decomposition.blocks.len();

    let mut orig: Vec<OrigVar> = problem.vars.iter().map(|v| OrigVar {
        name: v.name.clone(),
        vtype: v.vtype,
        obj: v.obj,
        lb: v.lb,
        ub: v.ub,
        local_lb: v.lb,
        local_ub: v.ub,
        block: BlockAssignment::Master,
        copy: 0,
        pricing: vec![],
        direct: None,
        master_vars: vec![],
    }).collect();

    let mut block_conss: HashSet<usize> = HashSet::default();
    let mut pricing_vars = Vec::with_capacity(nblocks);
    let mut blocks = Vec::with_capacity(nblocks);
    let mut pricing = Vec::with_capacity(nblocks);

    for (b, spec) in decomposition.blocks.iter().enumerate() {
        let first = &spec.copies[0];
        let mut block_vars = Vec::with_capacity(first.vars.len());

        for k in 0..first.vars.len() {
            let id = PricingVarId { block: b, index: k };
            let origvars: Vec<VarId> = spec.copies.iter().map(|copy| copy.vars[k]).collect();
            for (c, v) in origvars.iter().enumerate() {
                let var = &mut orig[v.0 as usize];
                var.block = match var.block {
                    BlockAssignment::Master => BlockAssignment::Block(b),
                    _ => BlockAssignment::Linking,
                };
                var.copy = c;
                var.pricing.push(id);
            }
            block_vars.push(PricingVar { id, origvars });
        }

        let index_of: HashMap<VarId, usize> = first.vars.iter().enumerate().map(|(k, v)| (*v, k)).collect();
        let conss = first.conss.iter().map(|&c| {
            let cons = &problem.conss[c];
            LpRow {
                coefs: cons.coefs.iter().map(|(v, a)| (index_of[v], *a)).collect(),
                sense: cons.sense,
                rhs: cons.rhs,
            }
        }).collect();
        for copy in &spec.copies {
            block_conss.extend(copy.conss.iter().copied());
        }

        let reps = first.vars.iter().map(|v| &problem.vars[v.0 as usize]);
        pricing.push(PricingProblem::new(
            b,
            reps.clone().map(|v| v.vtype).collect(),
            reps.clone().map(|v| v.lb).collect(),
            reps.map(|v| v.ub).collect(),
            conss,
        ));
        blocks.push(BlockInfo {
            multiplicity: spec.copies.len(),
            copies: spec.copies.iter().map(|c| c.vars.clone()).collect(),
        });
        pricing_vars.push(block_vars);
    }

    let mut master = MasterProblem::default();

    for (i, cons) in problem.conss.iter().enumerate().filter(|(i, _)| !block_conss.contains(i)) {
        let row = master.add_row(MasterRowKind::Linking(i), cons.sense, cons.rhs);
        let mut merged: FullHashMap<VarId, f64> = FullHashMap::default();
        for (v, a) in &cons.coefs {
            *merged.entry(*v).or_default() += a;
        }
        let mut merged: Vec<(VarId, f64)> = merged.into_iter().collect();
        merged.sort_by_key(|(v, _)| *v);
        for (v, a) in merged {
            master.var_rows.entry(v).or_default().push((row, a));
        }
    }
    for (b, info) in blocks.iter().enumerate() {
        master.add_row(MasterRowKind::Convexity(b), RowSense::Eq, info.multiplicity as f64);
    }
    for (j, var) in orig.iter().enumerate() {
        if var.block == BlockAssignment::Linking {
            for p in &var.pricing {
                master.add_row(MasterRowKind::LinkingVar { var: VarId(j as u32), block: p.block }, RowSense::Eq, 0.0);
            }
        }
    }

    let mut vars = VarStore {
        orig,
        pricing: pricing_vars,
        blocks,
        columns: ColumnPool::new(nblocks),
    };

    // master copies of unassigned and linking variables
    for j in 0..vars.num_orig() {
        let v = VarId(j as u32);
        let var = vars.orig(v);
        if matches!(var.block, BlockAssignment::Block(_)) {
            continue;
        }
        let mut coefs = master.var_rows.get(&v).cloned().unwrap_or_default();
        for p in &var.pricing {
            coefs.push((master.linking_rows[&(v, p.block)], 1.0));
        }
        let column = MasterVar {
            block: None,
            origvars: vec![v],
            origvals: vec![1.0],
            is_ray: false,
            obj: var.obj,
            lb: var.lb,
            ub: var.ub,
            coefs,
        };
        let id = vars.add_column(column);
        vars.orig_mut(v).direct = id;
    }

    Ok(Transformed { vars, master, pricing })
}
