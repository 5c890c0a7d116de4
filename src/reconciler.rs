//! Provisioning reconciler
//!
//! Brings the ledger instance from "nonexistent" to "ready to receive
//! writes". Each step observes the current remote state through the
//! `LedgerClient` and acts only when its target state is not reached yet, so
//! the whole sequence can be re-run at any point and converges.
//!
//! ```text
//! project → source → network stop/start → writer identity → canister
//!   → build → install → running → owner role → writer role
//! ```
//!
//! Nothing observed in one step is trusted by a later step except the
//! canister-existence flag, which selects the install mode.

use crate::error::LedgerError;
use crate::ledger::{InstallMode, LedgerClient, Role, RunState};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    ProjectExists,
    CanisterSourceUpdated,
    NetworkStopped,
    NetworkStarted,
    WriterIdentityExists,
    CanisterExists,
    CanisterBuilt,
    CanisterInstalled,
    CanisterRunning,
    OwnerAssigned,
    WriterRoleAssigned,
}

impl Step {
    /// Steps that create, install or assign something on the ledger
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            Step::NetworkStopped | Step::NetworkStarted | Step::CanisterBuilt
        )
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::ProjectExists => "project exists",
            Step::CanisterSourceUpdated => "canister source updated",
            Step::NetworkStopped => "network stopped",
            Step::NetworkStarted => "network started",
            Step::WriterIdentityExists => "writer identity exists",
            Step::CanisterExists => "canister exists",
            Step::CanisterBuilt => "canister built",
            Step::CanisterInstalled => "canister installed",
            Step::CanisterRunning => "canister running",
            Step::OwnerAssigned => "owner assigned",
            Step::WriterRoleAssigned => "writer role assigned",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Performed(String),
    AlreadySatisfied,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub step: Step,
    pub action: Action,
}

/// What a successful reconciliation did
#[derive(Debug, Clone, Default)]
pub struct ProvisioningReport {
    pub steps: Vec<StepOutcome>,
}

impl ProvisioningReport {
    /// Create/install/assign actions taken during this run
    pub fn mutations(&self) -> Vec<&StepOutcome> {
        self.steps
            .iter()
            .filter(|o| o.step.is_mutation() && matches!(o.action, Action::Performed(_)))
            .collect()
    }

    fn record(&mut self, step: Step, action: Action) {
        match &action {
            Action::Performed(detail) => log::info!("   ├─ ✅ {}: {}", step, detail),
            Action::AlreadySatisfied => log::info!("   ├─ ✔️  {}: already satisfied", step),
        }
        self.steps.push(StepOutcome { step, action });
    }
}

/// Terminal failure of the provisioning sequence
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Transient or unrecognized failure; re-running the whole sequence is safe
    #[error("{step} failed (safe to retry): {source}")]
    Retryable {
        step: Step,
        #[source]
        source: LedgerError,
    },

    /// The ledger is in a state the reconciler must not paper over
    #[error("{step} needs manual intervention: {reason}")]
    ManualIntervention { step: Step, reason: String },
}

impl ReconcileError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ReconcileError::Retryable { .. })
    }

    pub fn step(&self) -> Step {
        match self {
            ReconcileError::Retryable { step, .. } | ReconcileError::ManualIntervention { step, .. } => *step,
        }
    }

    fn classify(step: Step, error: LedgerError) -> Self {
        match error {
            LedgerError::State { reason, .. } => ReconcileError::ManualIntervention { step, reason },
            source => ReconcileError::Retryable { step, source },
        }
    }
}

pub struct Reconciler {
    client: LedgerClient,
    settle_delay: Duration,
    canister_source: Option<PathBuf>,
}

impl Reconciler {
    pub fn new(client: LedgerClient, settle_delay: Duration) -> Self {
        Self {
            client,
            settle_delay,
            canister_source: None,
        }
    }

    /// Copy this ledger program into the project before building
    pub fn with_canister_source(mut self, source: PathBuf) -> Self {
        self.canister_source = Some(source);
        self
    }

    pub async fn reconcile(&self) -> Result<ProvisioningReport, ReconcileError> {
        log::info!("🔧 Provisioning {}...", self.client.canister());
        let mut report = ProvisioningReport::default();

        self.ensure_project(&mut report).await?;
        self.ensure_canister_source(&mut report).await?;
        self.restart_network(&mut report).await?;
        self.ensure_writer_identity(&mut report).await?;
        let existed = self.ensure_canister(&mut report).await?;
        self.build(&mut report).await?;
        self.ensure_installed(existed, &mut report).await?;
        self.ensure_running(&mut report).await?;
        self.ensure_owner(&mut report).await?;
        self.ensure_writer_role(&mut report).await?;

        log::info!(
            "   └─ ✅ {} provisioned ({} actions)",
            self.client.canister(),
            report.mutations().len()
        );
        Ok(report)
    }

    async fn ensure_project(&self, report: &mut ProvisioningReport) -> Result<(), ReconcileError> {
        let step = Step::ProjectExists;
        log::info!("Creating new project {}...", self.client.canister());
        let created = self.client.create_project().await.map_err(|e| fail(step, e))?;
        report.record(step, performed_if(created, "created project"));
        Ok(())
    }

    async fn ensure_canister_source(&self, report: &mut ProvisioningReport) -> Result<(), ReconcileError> {
        let Some(source) = &self.canister_source else {
            return Ok(());
        };
        let step = Step::CanisterSourceUpdated;
        log::info!("Updating canister code from {}...", source.display());
        let changed = self
            .client
            .write_canister_source(source)
            .await
            .map_err(|e| fail(step, e))?;
        report.record(step, performed_if(changed, "wrote canister source"));
        Ok(())
    }

    async fn restart_network(&self, report: &mut ProvisioningReport) -> Result<(), ReconcileError> {
        log::info!("Stopping existing network instances...");
        self.client
            .stop_network()
            .await
            .map_err(|e| fail(Step::NetworkStopped, e))?;
        self.settle("finish shutting down").await;
        report.record(Step::NetworkStopped, Action::Performed("stopped network".to_string()));

        log::info!("Starting network in the background...");
        self.client
            .start_network()
            .await
            .map_err(|e| fail(Step::NetworkStarted, e))?;
        self.settle("accept requests").await;
        report.record(Step::NetworkStarted, Action::Performed("started network".to_string()));
        Ok(())
    }

    async fn ensure_writer_identity(&self, report: &mut ProvisioningReport) -> Result<(), ReconcileError> {
        let step = Step::WriterIdentityExists;
        log::info!("Creating writer identity...");
        let created = self
            .client
            .create_writer_identity()
            .await
            .map_err(|e| fail(step, e))?;
        report.record(step, performed_if(created, "created writer identity"));
        Ok(())
    }

    /// Returns whether the canister already existed
    async fn ensure_canister(&self, report: &mut ProvisioningReport) -> Result<bool, ReconcileError> {
        let step = Step::CanisterExists;
        log::info!("Checking if canister already exists...");
        let id = self.client.canister_id().await.map_err(|e| fail(step, e))?;

        if let Some(id) = id {
            log::debug!("Canister id: {}", id);
            report.record(step, Action::AlreadySatisfied);
            return Ok(true);
        }

        log::info!("Creating canister...");
        self.client.create_canister().await.map_err(|e| fail(step, e))?;
        report.record(step, Action::Performed("created canister".to_string()));
        Ok(false)
    }

    async fn build(&self, report: &mut ProvisioningReport) -> Result<(), ReconcileError> {
        log::info!("Building canister...");
        self.client
            .build_canister()
            .await
            .map_err(|e| fail(Step::CanisterBuilt, e))?;
        report.record(Step::CanisterBuilt, Action::Performed("built canister".to_string()));
        Ok(())
    }

    async fn ensure_installed(&self, existed: bool, report: &mut ProvisioningReport) -> Result<(), ReconcileError> {
        let step = Step::CanisterInstalled;
        log::info!("Checking installed module...");

        let installed_hash = if existed {
            self.client
                .canister_status()
                .await
                .map_err(|e| fail(step, e))?
                .module_hash
        } else {
            None
        };
        let built_hash = self.client.built_module_hash().await.map_err(|e| fail(step, e))?;

        if installed_hash.is_some() && installed_hash == built_hash {
            report.record(step, Action::AlreadySatisfied);
            return Ok(());
        }

        let mode = if installed_hash.is_some() {
            InstallMode::Upgrade
        } else {
            InstallMode::Install
        };
        log::info!("Installing canister ({:?})...", mode);
        self.client.install_canister(mode).await.map_err(|e| fail(step, e))?;

        let detail = match mode {
            InstallMode::Install => "installed canister",
            InstallMode::Upgrade => "upgraded canister",
        };
        report.record(step, Action::Performed(detail.to_string()));
        Ok(())
    }

    async fn ensure_running(&self, report: &mut ProvisioningReport) -> Result<(), ReconcileError> {
        let step = Step::CanisterRunning;
        log::info!("Checking if canister is running...");
        let status = self.client.canister_status().await.map_err(|e| fail(step, e))?;

        if status.state == RunState::Running {
            report.record(step, Action::AlreadySatisfied);
            return Ok(());
        }

        log::info!("Starting canister...");
        self.client.start_canister().await.map_err(|e| fail(step, e))?;
        report.record(step, Action::Performed("started canister".to_string()));
        Ok(())
    }

    async fn ensure_owner(&self, report: &mut ProvisioningReport) -> Result<(), ReconcileError> {
        let step = Step::OwnerAssigned;
        log::info!("Checking if we have the owner role...");

        match self.client.my_role().await.map_err(|e| fail(step, e))? {
            Some(Role::Owner) => {
                report.record(step, Action::AlreadySatisfied);
                Ok(())
            }
            Some(Role::Writer) => Err(ReconcileError::ManualIntervention {
                step,
                reason: "the owning identity holds the writer role".to_string(),
            }),
            None => {
                log::info!("Assigning owner role to owner identity...");
                self.client.assign_owner_role().await.map_err(|e| fail(step, e))?;
                report.record(step, Action::Performed("assigned owner role".to_string()));
                Ok(())
            }
        }
    }

    async fn ensure_writer_role(&self, report: &mut ProvisioningReport) -> Result<(), ReconcileError> {
        let step = Step::WriterRoleAssigned;
        log::info!("Retrieving writer identity principal...");
        let principal = self.client.writer_principal().await.map_err(|e| fail(step, e))?;

        if self.client.has_writer_role(&principal).await.map_err(|e| fail(step, e))? {
            report.record(step, Action::AlreadySatisfied);
            return Ok(());
        }

        log::info!("Assigning writer role to {}...", principal);
        self.client
            .assign_writer_role(&principal)
            .await
            .map_err(|e| fail(step, e))?;
        report.record(step, Action::Performed(format!("assigned writer role to {}", principal)));
        Ok(())
    }

    async fn settle(&self, purpose: &str) {
        if self.settle_delay.is_zero() {
            return;
        }
        log::info!(
            "Sleeping {}s to allow the local network to {}...",
            self.settle_delay.as_secs(),
            purpose
        );
        tokio::time::sleep(self.settle_delay).await;
    }
}

fn fail(step: Step, error: LedgerError) -> ReconcileError {
    log::error!("❌ {} failed: {}", step, error);
    ReconcileError::classify(step, error)
}

fn performed_if(performed: bool, detail: &str) -> Action {
    if performed {
        Action::Performed(detail.to_string())
    } else {
        Action::AlreadySatisfied
    }
}
