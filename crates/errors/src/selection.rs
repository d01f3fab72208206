//! Selection and job construction error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum SelectionError {
    #[error("nothing matches '{pattern}'")]
    NothingMatches { pattern: String },

    #[error("invalid job: {message}")]
    InvalidJob { message: String },

    #[error("job target '{pattern}' yielded an empty selection")]
    EmptySelection { pattern: String },

    #[error("bad selection flags: {message}")]
    BadFlags { message: String },
}
