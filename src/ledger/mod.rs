//! Ledger Client
//!
//! Boundary to the remote key-value ledger. The ledger is only reachable
//! through its command-line management tool, so this module covers:
//! - `candid` - typed values → the tool's textual argument encoding
//! - `runner` - launching the tool (`CommandRunner`)
//! - `response` - classifying the tool's human-oriented output
//! - `client` - typed operations used by the reconciler and the scheduler

pub mod candid;
pub mod client;
pub mod response;
pub mod runner;

pub use candid::CandidArg;
pub use client::{InstallMode, LedgerClient, WRITER_IDENTITY};
pub use response::{CanisterStatus, Role, RunState};
pub use runner::{CommandOutput, CommandRunner, DfxRunner};

use crate::engine::SummarizedValue;
use crate::error::LedgerError;
use async_trait::async_trait;

/// Destination for summarized values
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Write every field of `value` under `key`; stops at the first failed write
    async fn publish(&self, key: &str, value: &SummarizedValue) -> Result<(), LedgerError>;
}
