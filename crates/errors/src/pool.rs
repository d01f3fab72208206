//! Pool-related error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum PoolError {
    #[error("string pool exhausted: more than {limit} interned strings")]
    InternLimit { limit: u32 },

    #[error("unknown id: {id}")]
    UnknownId { id: u32 },

    #[error("id {id} is not a relation")]
    NotARelation { id: u32 },

    #[error("repo ranges overlap: {repo}")]
    RepoOverlap { repo: String },

    #[error("pool already has an installed repo: {repo}")]
    DuplicateInstalledRepo { repo: String },

    #[error("provides index is stale, call create_whatprovides first")]
    StaleWhatprovides,

    #[error("namespace callback failed for {namespace}: {message}")]
    NamespaceCallback { namespace: String, message: String },

    #[error("file provides iterator failed: {message}")]
    FileProvides { message: String },
}
