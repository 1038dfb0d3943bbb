use crate::settings::ScoreFunction;
use crate::vars::VarId;
use super::branch_score;

#[derive(Clone, Copy, Debug, PartialEq)]
/// Attached to a child created by branching on `var`, reports the gain once its master is solved
pub struct PseudocostHook {
    pub var: VarId,
    pub up: bool,
    /// distance of the parent's value to the new bound
    pub distance: f64,
    pub parent_lb: f64,
}

#[derive(Clone, Copy, Debug, Default)]
struct Entry {
    sum: f64,
    count: usize,
}

impl Entry {
    fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Average objective gain per unit change of the branching variables
#[derive(Clone, Debug, Default)]
pub struct PseudocostStore {
    down: Vec<Entry>,
    up: Vec<Entry>,
    total_down: Entry,
    total_up: Entry,
}

impl PseudocostStore {
    pub fn new(num_vars: usize) -> Self {
        PseudocostStore {
            down: vec![Entry::default(); num_vars],
            up: vec![Entry::default(); num_vars],
            total_down: Entry::default(),
            total_up: Entry::default(),
        }
    }

    pub fn update(&mut self, hook: &PseudocostHook, child_lb: f64) {
        if !child_lb.is_finite() || !hook.parent_lb.is_finite() || hook.distance <= 0.0 {
            return;
        }
        let gain = (child_lb - hook.parent_lb).max(0.0) / hook.distance;
        let (entry, total) = if hook.up {
            (&mut self.up[hook.var.0 as usize], &mut self.total_up)
        } else {
            (&mut self.down[hook.var.0 as usize], &mut self.total_down)
        };
        entry.sum += gain;
        entry.count += 1;
        total.sum += gain;
        total.count += 1;
    }

    pub fn count(&self, var: VarId) -> usize {
        self.down[var.0 as usize].count + self.up[var.0 as usize].count
    }

    /// Pseudocost of one direction, falls back to the average over all variables and then to 1
    pub fn pseudocost(&self, var: VarId, up: bool) -> f64 {
        let (entry, total) = if up {
            (&self.up[var.0 as usize], &self.total_up)
        } else {
            (&self.down[var.0 as usize], &self.total_down)
        };
        entry.mean().or_else(|| total.mean()).unwrap_or(1.0)
    }

    pub fn score(&self, var: VarId, value: f64, score_fn: ScoreFunction) -> f64 {
        let frac = value - value.floor();
        let down = self.pseudocost(var, false) * frac;
        let up = self.pseudocost(var, true) * (1.0 - frac);
        branch_score(score_fn, down, up)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_with_global_fallback() {
        let mut store = PseudocostStore::new(2);
        assert_eq!(store.pseudocost(VarId(0), true), 1.0);

        let hook = PseudocostHook { var: VarId(0), up: true, distance: 0.5, parent_lb: 10.0 };
        store.update(&hook, 11.0);
        store.update(&hook, 12.0);
        assert_eq!(store.pseudocost(VarId(0), true), 3.0);
        // unseen variable uses the average of all updates in that direction
        assert_eq!(store.pseudocost(VarId(1), true), 3.0);
        assert_eq!(store.pseudocost(VarId(1), false), 1.0);

        // infeasible children carry no gain information
        store.update(&hook, f64::INFINITY);
        assert_eq!(store.count(VarId(0)), 2);
    }

    #[test]
    fn score_weights_fractionality() {
        let mut store = PseudocostStore::new(1);
        let down = PseudocostHook { var: VarId(0), up: false, distance: 1.0, parent_lb: 0.0 };
        store.update(&down, 4.0);
        // down gain 4 * 0.25, up gain 1 * 0.75
        assert!((store.score(VarId(0), 2.25, ScoreFunction::Product) - 0.75).abs() < 1e-12);
    }
}
