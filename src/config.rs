//! Runtime configuration from environment variables
//!
//! Loaded once at startup (after `dotenv`), read-only afterwards.

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    #[error("Could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Configuration for the oracle runtime
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// Project and canister name on the ledger
    pub canister_name: String,

    /// Path to the engine configuration (key mappings) JSON file
    pub engine_path: PathBuf,

    /// Time between scheduler ticks
    pub update_interval: Duration,

    /// Ledger management tool executable
    pub dfx_bin: String,

    /// Directory in which the ledger project is created
    pub workdir: PathBuf,

    /// Per-invocation timeout for the ledger tool
    pub command_timeout: Duration,

    /// Per-request HTTP timeout for sources
    pub fetch_timeout: Duration,

    /// Upper bound on concurrent source fetches for one key
    pub max_concurrent_fetches: usize,

    /// Wait after stopping or starting the local network
    pub settle_delay: Duration,

    /// Ledger program source copied into the project before building
    pub canister_source: Option<PathBuf>,

    pub rust_log: String,
}

impl OracleConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `ORACLE_CANISTER_NAME` (required)
    /// - `ORACLE_ENGINE_PATH` (default: engine.json)
    /// - `ORACLE_UPDATE_INTERVAL_SECS` (default: 300)
    /// - `ORACLE_DFX_BIN` (default: dfx)
    /// - `ORACLE_WORKDIR` (default: .)
    /// - `ORACLE_COMMAND_TIMEOUT_SECS` (default: 120)
    /// - `ORACLE_FETCH_TIMEOUT_SECS` (default: 10)
    /// - `ORACLE_MAX_CONCURRENT_FETCHES` (default: 8)
    /// - `ORACLE_SETTLE_DELAY_SECS` (default: 5)
    /// - `ORACLE_CANISTER_SOURCE` (optional)
    pub fn from_env() -> Result<Self, ConfigError> {
        let canister_name = env::var("ORACLE_CANISTER_NAME")
            .map_err(|_| ConfigError::MissingVariable("ORACLE_CANISTER_NAME".to_string()))?;
        validate_canister_name(&canister_name)?;

        let update_interval = Duration::from_secs(parse_var("ORACLE_UPDATE_INTERVAL_SECS", 300)?);
        if update_interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "ORACLE_UPDATE_INTERVAL_SECS must be greater than zero".to_string(),
            ));
        }

        let max_concurrent_fetches: usize = parse_var("ORACLE_MAX_CONCURRENT_FETCHES", 8)?;
        if max_concurrent_fetches == 0 {
            return Err(ConfigError::InvalidValue(
                "ORACLE_MAX_CONCURRENT_FETCHES must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            canister_name,
            engine_path: env::var("ORACLE_ENGINE_PATH")
                .unwrap_or_else(|_| "engine.json".to_string())
                .into(),
            update_interval,
            dfx_bin: env::var("ORACLE_DFX_BIN").unwrap_or_else(|_| "dfx".to_string()),
            workdir: env::var("ORACLE_WORKDIR").unwrap_or_else(|_| ".".to_string()).into(),
            command_timeout: Duration::from_secs(parse_var("ORACLE_COMMAND_TIMEOUT_SECS", 120)?),
            fetch_timeout: Duration::from_secs(parse_var("ORACLE_FETCH_TIMEOUT_SECS", 10)?),
            max_concurrent_fetches,
            settle_delay: Duration::from_secs(parse_var("ORACLE_SETTLE_DELAY_SECS", 5)?),
            canister_source: env::var("ORACLE_CANISTER_SOURCE")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            rust_log: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Directory of the ledger project (`<workdir>/<canister_name>`)
    pub fn project_dir(&self) -> PathBuf {
        self.workdir.join(&self.canister_name)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|_| {
            ConfigError::InvalidValue(format!("{} must be a non-negative integer, got '{}'", name, raw))
        }),
        Err(_) => Ok(default),
    }
}

pub fn validate_canister_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::InvalidValue("canister name cannot be empty".to_string()));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(ConfigError::InvalidValue(format!(
            "canister name '{}' may only contain ASCII letters, digits, '_' or '-'",
            name
        )));
    }
    Ok(())
}
