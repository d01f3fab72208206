//! Parse error types for testcases, `.solv` files and match specs

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum ParseError {
    #[error("malformed testcase at line {line}: {message}")]
    Testcase { line: usize, message: String },

    #[error("bad solv file: {message}")]
    SolvFile { message: String },

    #[error("unsupported solv version {version}")]
    SolvVersion { version: u32 },

    #[error("malformed match spec '{spec}': {message}")]
    MatchSpec { spec: String, message: String },

    #[error("malformed dependency '{dep}': {message}")]
    Dependency { dep: String, message: String },

    #[error("malformed version '{evr}': {message}")]
    Evr { evr: String, message: String },
}
