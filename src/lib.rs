#![warn(warnings)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(non_upper_case_globals)]
#![allow(clippy::needless_return)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::module_name_repetitions, clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_possible_wrap)]

pub mod misc;
mod ui;
pub mod solvers;
pub mod error;
pub mod settings;
pub mod problem;
pub mod vars;
pub mod transform;
pub mod translate;
pub mod pricing;
pub mod master;
pub mod tree;
pub mod branchcons;
pub mod probing;
pub mod relax;
pub mod state;
pub mod branching;
pub mod solver;

pub use ui::*;
pub use error::{BnpError, BnpResult, LpError};
pub use problem::{BlockCopy, Decomposition, OrigProblem, VarType};
pub use settings::{ParamValue, ScoreFunction, Settings};
pub use solver::{BranchAndPrice, SolveResult, SolveStatus};
pub use state::SolverState;
pub use vars::{VarId, VarRef};
