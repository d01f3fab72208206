#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Error types for the solvent dependency solver
//!
//! This crate provides fine-grained error types organized by domain.
//! All error types implement Clone for easier handling across the
//! solver/transaction boundary.

pub mod parse;
pub mod pool;
pub mod selection;
pub mod solve;

// Re-export all error types at the root
pub use parse::ParseError;
pub use pool::PoolError;
pub use selection::SelectionError;
pub use solve::SolveError;

use thiserror::Error;

/// Generic error type for cross-crate boundaries
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Error {
    #[error("pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("selection error: {0}")]
    Selection(#[from] SelectionError),

    #[error("solve error: {0}")]
    Solve(#[from] SolveError),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("I/O error: {message}")]
    Io { message: String },
}

impl Error {
    /// Create an internal error with a message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

/// Result type alias for solvent operations
pub type Result<T> = std::result::Result<T, Error>;
