//! Solver error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum SolveError {
    #[error("solve was cancelled by the interrupt callback")]
    Cancelled,

    #[error("rule {rule} is corrupt: {message}")]
    CorruptRule { rule: usize, message: String },

    #[error("invariant violated: {message}")]
    InternalInvariant { message: String },

    #[error("no problem {problem}")]
    NoSuchProblem { problem: usize },

    #[error("no solution {solution} for problem {problem}")]
    NoSuchSolution { problem: usize, solution: usize },

    #[error("transaction requested on a solve with {problems} open problems")]
    UnresolvedProblems { problems: usize },
}
