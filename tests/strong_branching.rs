// Knapsack problems decomposed into one block per item, solved with the branching rules
// on original variables.

#[cfg(test)]
mod tests {
    use generic_dw::solvers::RowSense;
    use generic_dw::{BranchAndPrice, Decomposition, OrigProblem, ParamValue, Settings, SolveStatus, VarId, VarType, UI};

    /// `max sum p_i x_i` subject to every capacity row, as a minimization
    fn knapsack(profits: &[f64], rows: &[(Vec<(usize, f64)>, f64)]) -> (OrigProblem, Decomposition, Vec<VarId>) {
        let mut problem = OrigProblem::new();
        let items: Vec<VarId> = profits.iter().enumerate()
            .map(|(i, p)| problem.add_var(&format!("item_{i}"), VarType::Binary, 0.0, 1.0, -p))
            .collect();
        for (r, (coefs, capacity)) in rows.iter().enumerate() {
            problem.add_cons(&format!("capacity_{r}"), coefs.iter().map(|(i, w)| (items[*i], *w)).collect(), RowSense::Le, *capacity);
        }
        let mut decomposition = Decomposition::new();
        for item in &items {
            decomposition.add_block(vec![*item], vec![]);
        }
        (problem, decomposition, items)
    }

    fn single_row() -> (OrigProblem, Decomposition, Vec<VarId>) {
        knapsack(&[10.0, 13.0, 7.0, 8.0], &[(vec![(0, 4.0), (1, 6.0), (2, 3.0), (3, 5.0)], 10.0)])
    }

    #[test]
    fn knapsack_is_solved_to_optimality() {
        let ui = UI::new();
        let (problem, decomposition, items) = single_row();

        let mut bnp = BranchAndPrice::new(problem, &decomposition, Settings::default(), ui.get_sender()).unwrap();
        let result = bnp.solve().unwrap();

        assert_eq!(result.status, SolveStatus::Optimal);
        assert!((result.obj + 23.0).abs() < 1e-6);
        let sol = result.sol.unwrap();
        let chosen: Vec<usize> = items.iter().enumerate().filter(|(_, v)| sol[v.0 as usize] > 0.5).map(|(i, _)| i).collect();
        assert_eq!(chosen, vec![0, 1]);

        ui.finish(result.root_time);
    }

    #[test]
    fn node_limit_keeps_root_bound() {
        let ui = UI::new();
        let (problem, decomposition, _) = single_row();

        let mut settings = Settings::default();
        settings.general.node_limit = Some(1);
        let mut bnp = BranchAndPrice::new(problem, &decomposition, settings, ui.get_sender()).unwrap();
        let result = bnp.solve().unwrap();

        assert_eq!(result.status, SolveStatus::NodeLimit);
        assert_eq!(result.nodes, 1);
        assert!((result.dual_bound + 23.5).abs() < 1e-6);
        assert!(result.sol.is_none());

        ui.finish(result.root_time);
    }

    #[test]
    fn three_phases_with_pricing_find_optimum() {
        let ui = UI::new();
        // each pair allows one and a half items, every relaxation has two fractional items
        let (problem, decomposition, _) = knapsack(
            &[1.0, 1.0, 1.0, 1.0],
            &[(vec![(0, 1.0), (1, 1.0)], 1.5), (vec![(2, 1.0), (3, 1.0)], 1.5)],
        );

        let mut settings = Settings::default();
        for (name, value) in [
            ("branching/bp_strong/minphase0outcands", 2),
            ("branching/bp_strong/maxphase0outcands", 2),
            ("branching/bp_strong/minphase1outcands", 2),
            ("branching/bp_strong/maxphase1outcands", 2),
            ("branching/bp_strong/mincolgencands", 2),
        ] {
            settings.set_param(name, ParamValue::Int(value)).unwrap();
        }

        let mut bnp = BranchAndPrice::new(problem, &decomposition, settings, ui.get_sender()).unwrap();
        bnp.use_strong_branch_rule_only();
        assert_eq!(bnp.rule_names(), vec!["bpstrong"]);
        let result = bnp.solve().unwrap();

        assert_eq!(result.status, SolveStatus::Optimal);
        assert!((result.obj + 2.0).abs() < 1e-6);
        assert!(bnp.state.stats.probings > 0);

        ui.finish(result.root_time);
    }

    #[test]
    fn infeasible_linking_row() {
        let ui = UI::new();
        let (mut problem, decomposition, items) = knapsack(&[1.0, 1.0], &[(vec![(0, 1.0), (1, 1.0)], 1.0)]);
        problem.add_cons("cover", items.iter().map(|v| (*v, 1.0)).collect(), RowSense::Ge, 3.0);

        let mut bnp = BranchAndPrice::new(problem, &decomposition, Settings::default(), ui.get_sender()).unwrap();
        let result = bnp.solve().unwrap();

        assert_eq!(result.status, SolveStatus::Infeasible);
        assert_eq!(result.obj, f64::INFINITY);

        ui.finish(result.root_time);
    }

    #[test]
    fn item_more_expensive_than_artificial_penalty() {
        let ui = UI::new();
        let mut problem = OrigProblem::new();
        let x = problem.add_var("x", VarType::Binary, 0.0, 1.0, 2e6);
        problem.add_cons("demand", vec![(x, 1.0)], RowSense::Ge, 1.0);
        let mut decomposition = Decomposition::new();
        decomposition.add_block(vec![x], vec![]);

        let mut bnp = BranchAndPrice::new(problem, &decomposition, Settings::default(), ui.get_sender()).unwrap();
        let result = bnp.solve().unwrap();

        assert_eq!(result.status, SolveStatus::Optimal);
        assert!((result.obj - 2e6).abs() < 1e-3);
        assert!((result.sol.unwrap()[x.0 as usize] - 1.0).abs() < 1e-6);

        ui.finish(result.root_time);
    }
}
