//! Error taxonomy for the oracle
//!
//! Each concern owns its own enum so callers can match on the failure class:
//! - `ExtractError` - one source could not produce a sample
//! - `AggregationError` - a key's dataset could not be summarized
//! - `LedgerError` - the external ledger tool failed or answered unexpectedly
//!
//! `OracleError` wraps all of them for code that spans several stages.

use crate::config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("network error fetching {url}: {message}")]
    Network { url: String, message: String },

    #[error("malformed response from {url}: {message}")]
    Malformed { url: String, message: String },

    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("path '{path}' not found for field '{field}'")]
    PathNotFound { field: String, path: String },

    #[error("field '{field}' is not numeric: {value}")]
    NotNumeric { field: String, value: String },

    #[error("normalization failed for field '{field}': {reason}")]
    Normalize { field: String, reason: String },
}

#[derive(Debug, Error, PartialEq)]
pub enum AggregationError {
    #[error("no values from any source for key '{key}'")]
    EmptyDataset { key: String },

    #[error("no samples for field '{field}'")]
    EmptySeries { field: String },

    #[error("non-finite value for field '{field}'")]
    NonFinite { field: String },
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("could not launch `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` timed out after {secs}s")]
    Timeout { command: String, secs: u64 },

    #[error("`{command}` exited with code {code}: {output}")]
    CommandFailed {
        command: String,
        code: i32,
        output: String,
    },

    #[error("unrecognized response to {step}: {output}")]
    UnrecognizedResponse { step: String, output: String },

    #[error("cannot publish non-finite value {value} for {key}.{field}")]
    NonFiniteValue { key: String, field: String, value: f64 },

    #[error("ledger state conflict during {step}: {reason}")]
    State { step: String, reason: String },

    #[error("project file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ledger command cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum OracleError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Aggregation(#[from] AggregationError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("source task failed: {0}")]
    Task(String),

    #[error("cancelled")]
    Cancelled,
}

pub type OracleResult<T> = Result<T, OracleError>;
