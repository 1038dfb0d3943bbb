// The same knapsack instance solved with the Gurobi LP backend instead of the dense simplex.
#![cfg(feature = "gurobi")]

#[cfg(test)]
mod tests {
    use generic_dw::solvers::gurobi::GurobiSolver;
    use generic_dw::solvers::RowSense;
    use generic_dw::{BranchAndPrice, Decomposition, OrigProblem, Settings, SolveStatus, VarId, VarType, UI};

    fn knapsack() -> (OrigProblem, Decomposition, Vec<VarId>) {
        let mut problem = OrigProblem::new();
        let items: Vec<VarId> = [10.0, 13.0, 7.0, 8.0].iter().enumerate()
            .map(|(i, p)| problem.add_var(&format!("item_{i}"), VarType::Binary, 0.0, 1.0, -p))
            .collect();
        let weights = [4.0, 6.0, 3.0, 5.0];
        problem.add_cons("capacity", items.iter().zip(weights).map(|(v, w)| (*v, w)).collect(), RowSense::Le, 10.0);
        let mut decomposition = Decomposition::new();
        for item in &items {
            decomposition.add_block(vec![*item], vec![]);
        }
        (problem, decomposition, items)
    }

    #[test]
    fn knapsack_with_gurobi_lps() {
        let ui = UI::new();
        let (problem, decomposition, items) = knapsack();

        let mut lp = GurobiSolver::new_with_seed(1).unwrap();
        lp.set_time_limit(60.0).unwrap();
        let mut bnp = BranchAndPrice::with_lp_solver(problem, &decomposition, Settings::default(), ui.get_sender(), Box::new(lp)).unwrap();
        let result = bnp.solve().unwrap();

        assert_eq!(result.status, SolveStatus::Optimal);
        assert!((result.obj + 23.0).abs() < 1e-6);
        assert_eq!(result.master_nodes, result.nodes);
        let sol = result.sol.unwrap();
        let chosen: Vec<usize> = items.iter().enumerate().filter(|(_, v)| sol[v.0 as usize] > 0.5).map(|(i, _)| i).collect();
        assert_eq!(chosen, vec![0, 1]);

        ui.finish(result.root_time);
    }
}
