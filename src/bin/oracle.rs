//! Oracle Runtime
//!
//! Provisions the ledger canister (idempotent), then publishes summarized
//! source values on a fixed interval until CTRL+C.
//!
//! Usage:
//!   cargo run --release --bin oracle [-- --mode all|bootstrap|run]
//!
//! Modes:
//!   all        provision, then run the update loop (default)
//!   bootstrap  provision only
//!   run        update loop only (canister must already be provisioned)
//!
//! Environment variables: see `OracleConfig::from_env`.

use dotenv::dotenv;
use log::{error, info, warn};
use oracleflow::extract::HttpFetcher;
use oracleflow::ledger::{DfxRunner, LedgerClient};
use oracleflow::{Collector, EngineConfig, OracleConfig, Reconciler, Scheduler};
use std::env;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Exit code when provisioning failed but re-running is safe
const EXIT_RETRYABLE: i32 = 75;
/// Exit code when the ledger needs manual intervention
const EXIT_MANUAL: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    All,
    Bootstrap,
    Run,
}

impl Mode {
    fn provisions(self) -> bool {
        matches!(self, Mode::All | Mode::Bootstrap)
    }

    fn updates(self) -> bool {
        matches!(self, Mode::All | Mode::Run)
    }
}

fn parse_mode_from_args() -> Mode {
    let args: Vec<String> = env::args().collect();
    if let Some(idx) = args.iter().position(|x| x == "--mode") {
        match args.get(idx + 1).map(|s| s.as_str()) {
            Some("bootstrap") => return Mode::Bootstrap,
            Some("run") => return Mode::Run,
            Some("all") => return Mode::All,
            other => warn!("⚠️  Unknown mode {:?}, defaulting to all", other),
        }
    }
    Mode::All
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let config = OracleConfig::from_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.rust_log.as_str()))
        .target(env_logger::Target::Stderr)
        .init();

    let mode = parse_mode_from_args();

    info!("🚀 Oracle Runtime");
    info!("   ├─ Canister: {}", config.canister_name);
    info!("   ├─ Project: {}", config.project_dir().display());
    info!("   ├─ Engine config: {}", config.engine_path.display());
    info!("   ├─ Update interval: {}s", config.update_interval.as_secs());
    info!("   ├─ Max concurrent fetches: {}", config.max_concurrent_fetches);
    info!("   └─ Mode: {:?}", mode);

    let engine = Arc::new(EngineConfig::from_file(&config.engine_path)?);

    let cancel = CancellationToken::new();
    let runner = Arc::new(DfxRunner::new(config.dfx_bin.clone(), config.command_timeout));
    let client = LedgerClient::new(runner, config.canister_name.clone(), config.workdir.clone())
        .with_cancellation(cancel.clone());

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("");
                info!("⚠️  Received CTRL+C, shutting down...");
            }
            Err(err) => {
                error!("❌ Failed to listen for CTRL+C: {}", err);
            }
        }
        shutdown.cancel();
    });

    if mode.provisions() {
        let mut reconciler = Reconciler::new(client.clone(), config.settle_delay);
        match &config.canister_source {
            Some(source) => reconciler = reconciler.with_canister_source(source.clone()),
            None => warn!(
                "⚠️  ORACLE_CANISTER_SOURCE not set, building the program already in {}",
                config.project_dir().display()
            ),
        }

        match reconciler.reconcile().await {
            Ok(report) => {
                info!(
                    "✅ Ledger ready ({} steps, {} actions)",
                    report.steps.len(),
                    report.mutations().len()
                );
            }
            Err(e) => {
                error!("❌ Provisioning failed: {}", e);
                if e.is_retryable() {
                    error!("   └─ Safe to re-run");
                    std::process::exit(EXIT_RETRYABLE);
                }
                error!("   └─ Manual intervention required");
                std::process::exit(EXIT_MANUAL);
            }
        }
    }

    if !mode.updates() {
        info!("✅ Bootstrap complete");
        return Ok(());
    }

    let fetcher = Arc::new(HttpFetcher::new(config.fetch_timeout)?);
    let collector = Collector::new(fetcher, config.max_concurrent_fetches);
    let scheduler = Scheduler::new(engine, collector, Arc::new(client), config.update_interval);

    info!("🔄 Press CTRL+C to shutdown gracefully");
    scheduler.run(cancel).await;

    info!("✅ Oracle runtime stopped");
    Ok(())
}
