// Identical rods of length 10 and three pieces of length 5, every piece cut exactly once.
// The relaxation uses half of each two-piece pattern, branching on piece pairs closes the gap.

#[cfg(test)]
mod tests {
    use generic_dw::solvers::RowSense;
    use generic_dw::{BlockCopy, BranchAndPrice, Decomposition, OrigProblem, Settings, SolveStatus, VarId, VarType, UI};

    struct Instance {
        rod_length: f64,
        pieces: Vec<f64>,
        rods: usize,
    }

    fn build(instance: &Instance) -> (OrigProblem, Decomposition) {
        let mut problem = OrigProblem::new();
        let mut copies = vec![];
        let mut cuts: Vec<Vec<VarId>> = vec![vec![]; instance.pieces.len()];

        for rod in 0..instance.rods {
            let pieces: Vec<VarId> = instance.pieces.iter().enumerate()
                .map(|(i, _)| problem.add_var(&format!("cut_{i}_{rod}"), VarType::Binary, 0.0, 1.0, 0.0))
                .collect();
            let used = problem.add_var(&format!("used_{rod}"), VarType::Binary, 0.0, 1.0, 1.0);

            let mut coefs: Vec<(VarId, f64)> = pieces.iter().zip(&instance.pieces).map(|(v, len)| (*v, *len)).collect();
            coefs.push((used, -instance.rod_length));
            let length = problem.add_cons(&format!("length_{rod}"), coefs, RowSense::Le, 0.0);

            for (i, v) in pieces.iter().enumerate() {
                cuts[i].push(*v);
            }
            let mut vars = pieces;
            vars.push(used);
            copies.push(BlockCopy { vars, conss: vec![length] });
        }

        for (i, vars) in cuts.into_iter().enumerate() {
            problem.add_cons(&format!("demand_{i}"), vars.into_iter().map(|v| (v, 1.0)).collect(), RowSense::Eq, 1.0);
        }

        let mut decomposition = Decomposition::new();
        decomposition.add_identical_blocks(copies);
        (problem, decomposition)
    }

    #[test]
    fn run() {
        let ui = UI::new();

        let instance = Instance { rod_length: 10.0, pieces: vec![5.0, 5.0, 5.0], rods: 3 };
        let (problem, decomposition) = build(&instance);

        let mut bnp = BranchAndPrice::new(problem.clone(), &decomposition, Settings::default(), ui.get_sender()).unwrap();
        assert_eq!(bnp.rule_names(), vec!["orig", "ryanfoster"]);
        let result = bnp.solve().unwrap();

        assert_eq!(result.status, SolveStatus::Optimal);
        assert!((result.obj - 2.0).abs() < 1e-6);
        assert!((result.dual_bound - 2.0).abs() < 1e-6);
        // root plus at least the same/differ children
        assert!(result.nodes >= 2);
        assert_eq!(result.master_nodes, result.nodes);

        let sol = result.sol.unwrap();
        assert!(problem.is_feasible(&sol, 1e-6));
        assert!((problem.objective(&sol) - 2.0).abs() < 1e-6);

        ui.finish(result.root_time);
    }

    #[test]
    fn integral_relaxation_needs_no_branching() {
        let ui = UI::new();

        let instance = Instance { rod_length: 10.0, pieces: vec![6.0, 6.0], rods: 2 };
        let (problem, decomposition) = build(&instance);

        let mut bnp = BranchAndPrice::new(problem, &decomposition, Settings::default(), ui.get_sender()).unwrap();
        let result = bnp.solve().unwrap();

        assert_eq!(result.status, SolveStatus::Optimal);
        assert!((result.obj - 2.0).abs() < 1e-6);
        assert_eq!(result.nodes, 1);
        assert_eq!(result.master_nodes, 1);

        ui.finish(result.root_time);
    }
}
