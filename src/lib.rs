//! oracleflow - off-chain data oracle
//!
//! Periodically collects numeric readings from HTTP/JSON sources, reduces
//! them to one robust value per field, and publishes the result into a
//! key-value map held by a ledger canister. Before the first update the
//! canister is provisioned idempotently by the `reconciler`.
//!
//! ```text
//! SourceFetcher ──► Collector ──► Summarizer ──► Publisher (LedgerClient)
//!        ▲                                              │
//!        └────────────── Scheduler (interval) ──────────┘
//! ```

pub mod collector;
pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod ledger;
pub mod reconciler;
pub mod scheduler;
pub mod summary;

pub use collector::Collector;
pub use config::{ConfigError, OracleConfig};
pub use engine::{EngineConfig, KeyMapping, SampleSet, SourceSpec, SummarizedValue};
pub use error::{AggregationError, ExtractError, LedgerError, OracleError, OracleResult};
pub use reconciler::{ProvisioningReport, ReconcileError, Reconciler};
pub use scheduler::{Scheduler, TickReport};
