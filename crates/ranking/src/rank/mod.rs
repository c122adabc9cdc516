//! Personalized influence ranking
//!
//! Builds the restart vector from account attributes and seeds, then runs
//! damped power iteration over the follow graph.

pub mod personalization;
mod solver;

pub use personalization::PersonalizationVector;
pub use solver::{RankSolver, SolveOutcome};
