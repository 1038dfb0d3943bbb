use std::fmt::{Display, Formatter};
use std::time::Duration;
use crate::error::BnpError;

#[derive(Clone, Debug)]
/// General limits of the branch-and-price search
pub struct GeneralSettings {
    pub time_limit: Option<Duration>,
    pub node_limit: Option<u64>,
    /// tolerance used for feasibility and objective comparisons
    pub feas_tol: f64,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        GeneralSettings {
            time_limit: None,
            node_limit: None,
            feas_tol: 1e-6,
        }
    }
}

#[derive(Clone, Debug)]
/// Settings for the column generation at every node
pub struct PricingSettings {
    /// maximal number of pricing rounds per node, `None` means until convergence
    pub max_rounds_per_node: Option<usize>,
    /// objective penalty of the artificial (dummy) master columns
    pub artificial_cost: f64,
    /// columns added per block and pricing round
    pub max_columns_per_block: usize,
    /// a column is only added if its reduced cost is below `-reduced_cost_tol`
    pub reduced_cost_tol: f64,
    /// node limit of the branch-and-bound that solves an integer pricing problem
    pub pricing_node_limit: usize,
}

impl Default for PricingSettings {
    fn default() -> Self {
        PricingSettings {
            max_rounds_per_node: None,
            artificial_cost: 1e6,
            max_columns_per_block: 5,
            reduced_cost_tol: 1e-6,
            pricing_node_limit: 10_000,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
/// Combination of the down and up gain into one branching score
pub enum ScoreFunction {
    /// max(down, eps) * max(up, eps)
    Product,
    /// (1 - factor) * min(down, up) + factor * max(down, up)
    Sum { factor: f64 },
}

#[derive(Clone, Debug)]
/// Settings of the branching on original variables
pub struct BranchingSettings {
    pub use_strong: bool,
    pub use_pseudocosts: bool,
    pub most_frac: bool,
    pub score_function: ScoreFunction,
}

impl Default for BranchingSettings {
    fn default() -> Self {
        BranchingSettings {
            use_strong: true,
            use_pseudocosts: true,
            most_frac: false,
            score_function: ScoreFunction::Product,
        }
    }
}

#[derive(Clone, Debug)]
/// Settings of the three phase strong branching selector
pub struct StrongBranchingSettings {
    /// skip the column generation phase
    pub stronglite: bool,
    /// evaluate all candidates as precise as possible
    pub strongtraining: bool,
    /// react on infeasible directions during phase 2 immediately
    pub immediateinf: bool,
    /// maximal number of tree edges between the node a score was computed at and the node reusing it
    pub reevalage: i64,
    /// minimal number of phase 1 candidates for column generation to be worthwhile
    pub mincolgencands: i64,
    pub minphase0outcands: i64,
    pub maxphase0outcands: i64,
    pub phase1gapweight: f64,
    pub minphase1outcands: i64,
    pub maxphase1outcands: i64,
    pub phase2gapweight: f64,
    /// weight of historical strong branching scores when filling the phase 0 output
    pub histweight: f64,
    /// maximal pricing rounds per direction in phase 2, `None` means until convergence
    pub max_pricing_rounds: Option<usize>,
}

impl Default for StrongBranchingSettings {
    fn default() -> Self {
        StrongBranchingSettings {
            stronglite: false,
            strongtraining: false,
            immediateinf: true,
            reevalage: 1,
            mincolgencands: 4,
            minphase0outcands: 10,
            maxphase0outcands: 50,
            phase1gapweight: 0.25,
            minphase1outcands: 3,
            maxphase1outcands: 20,
            phase2gapweight: 1.0,
            histweight: 0.5,
            max_pricing_rounds: None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub pricing: PricingSettings,
    pub branching: BranchingSettings,
    pub strong: StrongBranchingSettings,
}

#[derive(Clone, Copy, Debug, PartialEq)]
/// Value of a named parameter
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Real(f64),
}

impl Display for ParamValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Int(i) => write!(f, "{}", i),
            ParamValue::Real(r) => write!(f, "{}", r),
        }
    }
}

const STRONG_PREFIX: &str = "branching/bp_strong/";
const ORIG_PREFIX: &str = "branching/orig/";

impl Settings {
    /// Set a parameter by its registered name, e.g. `branching/bp_strong/reevalage`.
    /// Values are checked against the registered range.
    pub fn set_param(&mut self, name: &str, value: ParamValue) -> Result<(), BnpError> {
        let reject = || BnpError::InvalidParameter { name: name.to_string(), value: value.to_string() };

        if let Some(short) = name.strip_prefix(STRONG_PREFIX) {
            let strong = &mut self.strong;
            match (short, value) {
                ("stronglite", ParamValue::Bool(b)) => strong.stronglite = b,
                ("strongtraining", ParamValue::Bool(b)) => strong.strongtraining = b,
                ("immediateinf", ParamValue::Bool(b)) => strong.immediateinf = b,
                ("reevalage", ParamValue::Int(i)) => strong.reevalage = check_int(i, 0, 100).ok_or_else(reject)?,
                ("mincolgencands", ParamValue::Int(i)) => strong.mincolgencands = check_int(i, 0, 100_000).ok_or_else(reject)?,
                ("minphase0outcands", ParamValue::Int(i)) => strong.minphase0outcands = check_int(i, 1, 100_000).ok_or_else(reject)?,
                ("maxphase0outcands", ParamValue::Int(i)) => strong.maxphase0outcands = check_int(i, 1, 100_000).ok_or_else(reject)?,
                ("phase1gapweight", ParamValue::Real(r)) => strong.phase1gapweight = check_real(r, 0.0, 1.0).ok_or_else(reject)?,
                ("minphase1outcands", ParamValue::Int(i)) => strong.minphase1outcands = check_int(i, 1, 100_000).ok_or_else(reject)?,
                ("maxphase1outcands", ParamValue::Int(i)) => strong.maxphase1outcands = check_int(i, 1, 100_000).ok_or_else(reject)?,
                ("phase2gapweight", ParamValue::Real(r)) => strong.phase2gapweight = check_real(r, 0.0, 1.0).ok_or_else(reject)?,
                ("histweight", ParamValue::Real(r)) => strong.histweight = check_real(r, 0.0, 1.0).ok_or_else(reject)?,
                ("stronglite", _) | ("strongtraining", _) | ("immediateinf", _) | ("reevalage", _)
                | ("mincolgencands", _) | ("minphase0outcands", _) | ("maxphase0outcands", _)
                | ("phase1gapweight", _) | ("minphase1outcands", _) | ("maxphase1outcands", _)
                | ("phase2gapweight", _) | ("histweight", _) => return Err(reject()),
                _ => return Err(BnpError::UnknownParameter(name.to_string())),
            }
            return Ok(());
        }

        if let Some(short) = name.strip_prefix(ORIG_PREFIX) {
            let branching = &mut self.branching;
            match (short, value) {
                ("usestrong", ParamValue::Bool(b)) => branching.use_strong = b,
                ("usepseudo", ParamValue::Bool(b)) => branching.use_pseudocosts = b,
                ("mostfrac", ParamValue::Bool(b)) => branching.most_frac = b,
                ("usestrong", _) | ("usepseudo", _) | ("mostfrac", _) => return Err(reject()),
                _ => return Err(BnpError::UnknownParameter(name.to_string())),
            }
            return Ok(());
        }

        Err(BnpError::UnknownParameter(name.to_string()))
    }

    /// Read a parameter by its registered name
    pub fn get_param(&self, name: &str) -> Result<ParamValue, BnpError> {
        let strong = &self.strong;
        let value = match name.strip_prefix(STRONG_PREFIX) {
            Some("stronglite") => ParamValue::Bool(strong.stronglite),
            Some("strongtraining") => ParamValue::Bool(strong.strongtraining),
            Some("immediateinf") => ParamValue::Bool(strong.immediateinf),
            Some("reevalage") => ParamValue::Int(strong.reevalage),
            Some("mincolgencands") => ParamValue::Int(strong.mincolgencands),
            Some("minphase0outcands") => ParamValue::Int(strong.minphase0outcands),
            Some("maxphase0outcands") => ParamValue::Int(strong.maxphase0outcands),
            Some("phase1gapweight") => ParamValue::Real(strong.phase1gapweight),
            Some("minphase1outcands") => ParamValue::Int(strong.minphase1outcands),
            Some("maxphase1outcands") => ParamValue::Int(strong.maxphase1outcands),
            Some("phase2gapweight") => ParamValue::Real(strong.phase2gapweight),
            Some("histweight") => ParamValue::Real(strong.histweight),
            _ => match name.strip_prefix(ORIG_PREFIX) {
                Some("usestrong") => ParamValue::Bool(self.branching.use_strong),
                Some("usepseudo") => ParamValue::Bool(self.branching.use_pseudocosts),
                Some("mostfrac") => ParamValue::Bool(self.branching.most_frac),
                _ => return Err(BnpError::UnknownParameter(name.to_string())),
            },
        };
        Ok(value)
    }

    /// Check constraints between settings that single parameters can't express
    pub fn validate(&self) -> Result<(), BnpError> {
        let strong = &self.strong;
        if strong.minphase0outcands > strong.maxphase0outcands {
            return Err(BnpError::InvalidSettings(format!(
                "minphase0outcands ({}) exceeds maxphase0outcands ({})",
                strong.minphase0outcands, strong.maxphase0outcands
            )));
        }
        if strong.minphase1outcands > strong.maxphase1outcands {
            return Err(BnpError::InvalidSettings(format!(
                "minphase1outcands ({}) exceeds maxphase1outcands ({})",
                strong.minphase1outcands, strong.maxphase1outcands
            )));
        }
        if strong.minphase0outcands < 1 || strong.minphase1outcands < 1 {
            return Err(BnpError::InvalidSettings("phase output candidates must be at least 1".to_string()));
        }
        for (name, weight) in [("phase1gapweight", strong.phase1gapweight), ("phase2gapweight", strong.phase2gapweight), ("histweight", strong.histweight)] {
            if !(0.0..=1.0).contains(&weight) {
                return Err(BnpError::InvalidSettings(format!("{name} must be in [0,1], is {weight}")));
            }
        }
        if !(0..=100).contains(&strong.reevalage) {
            return Err(BnpError::InvalidSettings(format!("reevalage must be in [0,100], is {}", strong.reevalage)));
        }
        if self.pricing.max_columns_per_block == 0 {
            return Err(BnpError::InvalidSettings("max_columns_per_block must be positive".to_string()));
        }
        if let ScoreFunction::Sum { factor } = self.branching.score_function {
            if !(0.0..=1.0).contains(&factor) {
                return Err(BnpError::InvalidSettings(format!("score factor must be in [0,1], is {factor}")));
            }
        }
        Ok(())
    }
}

fn check_int(value: i64, min: i64, max: i64) -> Option<i64> {
    (min..=max).contains(&value).then_some(value)
}

fn check_real(value: f64, min: f64, max: f64) -> Option<f64> {
    (min..=max).contains(&value).then_some(value)
}
