//! Typed operations against the ledger through its management tool
//!
//! Every remote observation and mutation goes through here, one command at a
//! time. Most commands run inside the project directory; only project
//! creation runs in the parent working directory.

use super::candid::{encode_args, CandidArg};
use super::response::{self, CanisterStatus, Role};
use super::runner::{CommandOutput, CommandRunner};
use crate::engine::SummarizedValue;
use crate::error::LedgerError;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const WRITER_IDENTITY: &str = "writer";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallMode {
    Install,
    Upgrade,
}

#[derive(Clone)]
pub struct LedgerClient {
    runner: Arc<dyn CommandRunner>,
    canister: String,
    workdir: PathBuf,
    cancel: Option<CancellationToken>,
}

impl LedgerClient {
    pub fn new(runner: Arc<dyn CommandRunner>, canister: impl Into<String>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            canister: canister.into(),
            workdir: workdir.into(),
            cancel: None,
        }
    }

    /// Abort in-flight and future commands once `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn canister(&self) -> &str {
        &self.canister
    }

    pub fn project_dir(&self) -> PathBuf {
        self.workdir.join(&self.canister)
    }

    /// Location of the module produced by `build`
    pub fn module_path(&self) -> PathBuf {
        self.project_dir()
            .join(".dfx")
            .join("local")
            .join("canisters")
            .join(&self.canister)
            .join(format!("{}.wasm", self.canister))
    }

    // Project and network

    /// Create the project; `Ok(false)` when it already exists
    pub async fn create_project(&self) -> Result<bool, LedgerError> {
        let output = self.exec_in(&self.workdir, &["new", self.canister.as_str()]).await?;
        if output.success() {
            Ok(true)
        } else if output.text.contains(response::PROJECT_EXISTS) {
            Ok(false)
        } else {
            Err(self.failed(&["new", self.canister.as_str()], output))
        }
    }

    /// Copy the ledger program source into the project; `Ok(false)` when unchanged
    pub async fn write_canister_source(&self, source: &Path) -> Result<bool, LedgerError> {
        let code = tokio::fs::read(source).await?;
        let target = self
            .project_dir()
            .join("src")
            .join(&self.canister)
            .join("main.mo");

        if let Ok(existing) = tokio::fs::read(&target).await {
            if existing == code {
                return Ok(false);
            }
        }
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, code).await?;
        Ok(true)
    }

    pub async fn stop_network(&self) -> Result<(), LedgerError> {
        self.exec_ok(&["stop"]).await.map(|_| ())
    }

    pub async fn start_network(&self) -> Result<(), LedgerError> {
        let args = ["start", "--background"];
        let owned = to_owned_args(&args);
        let code = self
            .cancellable(self.runner.run_inherited(&self.project_dir(), &owned))
            .await?;
        if code != 0 {
            return Err(LedgerError::CommandFailed {
                command: args.join(" "),
                code,
                output: String::new(),
            });
        }
        Ok(())
    }

    // Identities

    /// Create the writer identity; `Ok(false)` when it already exists
    pub async fn create_writer_identity(&self) -> Result<bool, LedgerError> {
        let args = ["identity", "new", WRITER_IDENTITY];
        let output = self.exec(&args).await?;
        if output.success() {
            Ok(true)
        } else if output.text.contains(response::IDENTITY_EXISTS) {
            Ok(false)
        } else {
            Err(self.failed(&args, output))
        }
    }

    pub async fn writer_principal(&self) -> Result<String, LedgerError> {
        let output = self
            .exec_ok(&["--identity", WRITER_IDENTITY, "identity", "get-principal"])
            .await?;
        let principal = output.stdout.trim();
        if principal.is_empty() || principal.contains(char::is_whitespace) {
            return Err(LedgerError::UnrecognizedResponse {
                step: "writer principal".to_string(),
                output: output.text.clone(),
            });
        }
        Ok(principal.to_string())
    }

    // Canister lifecycle

    /// Canister id, or `None` when the canister has not been created
    pub async fn canister_id(&self) -> Result<Option<String>, LedgerError> {
        let output = self.exec(&["canister", "id", self.canister.as_str()]).await?;
        if output.success() {
            Ok(Some(output.stdout.trim().to_string()))
        } else if output.text.contains(response::CANISTER_ID_MISSING) {
            Ok(None)
        } else {
            Err(LedgerError::UnrecognizedResponse {
                step: "canister id".to_string(),
                output: output.text,
            })
        }
    }

    pub async fn create_canister(&self) -> Result<(), LedgerError> {
        self.exec_ok(&["canister", "create", self.canister.as_str()]).await.map(|_| ())
    }

    pub async fn build_canister(&self) -> Result<(), LedgerError> {
        self.exec_ok(&["build", self.canister.as_str()]).await.map(|_| ())
    }

    /// `0x`-prefixed SHA-256 of the built module, `None` before the first build
    pub async fn built_module_hash(&self) -> Result<Option<String>, LedgerError> {
        match tokio::fs::read(self.module_path()).await {
            Ok(bytes) => Ok(Some(format!("0x{}", hex::encode(Sha256::digest(&bytes))))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn install_canister(&self, mode: InstallMode) -> Result<(), LedgerError> {
        let mut args = vec!["canister", "install", self.canister.as_str()];
        if mode == InstallMode::Upgrade {
            args.extend(["--mode", "upgrade"]);
        }
        self.exec_ok(&args).await.map(|_| ())
    }

    pub async fn canister_status(&self) -> Result<CanisterStatus, LedgerError> {
        let output = self.exec_ok(&["canister", "status", self.canister.as_str()]).await?;
        response::parse_status(&self.canister, &output.text)
    }

    pub async fn start_canister(&self) -> Result<(), LedgerError> {
        self.exec_ok(&["canister", "start", self.canister.as_str()]).await.map(|_| ())
    }

    // Roles

    pub async fn my_role(&self) -> Result<Option<Role>, LedgerError> {
        let output = self.call("my_role", &[]).await?;
        response::parse_role(&output.text)
    }

    pub async fn assign_owner_role(&self) -> Result<(), LedgerError> {
        let args = self.call_args("assign_owner_role", &[]);
        let output = self.exec(&str_args(&args)).await?;
        if output.success() {
            return Ok(());
        }
        if output.text.contains(response::OWNER_ALREADY_SET) {
            return Err(LedgerError::State {
                step: "assign owner role".to_string(),
                reason: "another principal already owns the canister".to_string(),
            });
        }
        Err(self.failed(&str_args(&args), output))
    }

    /// Whether `principal` already holds the writer role
    pub async fn has_writer_role(&self, principal: &str) -> Result<bool, LedgerError> {
        let output = self.call("get_roles", &[]).await?;
        let needle = CandidArg::Principal(principal.to_string()).to_string();
        Ok(output.text.contains(&needle))
    }

    pub async fn assign_writer_role(&self, principal: &str) -> Result<(), LedgerError> {
        self.call("assign_writer_role", &[CandidArg::Principal(principal.to_string())])
            .await
            .map(|_| ())
    }

    // Map values

    /// `update_map_value(key, field, value)` under the writer identity
    pub async fn update_map_value(&self, key: &str, field: &str, value: f64) -> Result<(), LedgerError> {
        if !value.is_finite() {
            return Err(LedgerError::NonFiniteValue {
                key: key.to_string(),
                field: field.to_string(),
                value,
            });
        }
        let encoded = encode_args(&[
            CandidArg::Text(key.to_string()),
            CandidArg::Text(field.to_string()),
            CandidArg::Float(value),
        ]);
        self.exec_ok(&[
            "--identity",
            WRITER_IDENTITY,
            "canister",
            "call",
            self.canister.as_str(),
            "update_map_value",
            encoded.as_str(),
        ])
        .await
        .map(|_| ())
    }

    pub async fn get_map_field_value(&self, key: &str, field: &str) -> Result<Option<f64>, LedgerError> {
        let output = self
            .call(
                "get_map_field_value",
                &[CandidArg::Text(key.to_string()), CandidArg::Text(field.to_string())],
            )
            .await?;
        response::parse_opt_float(&output.text)
    }

    // Plumbing

    fn call_args(&self, method: &str, args: &[CandidArg]) -> Vec<String> {
        let mut call = vec![
            "canister".to_string(),
            "call".to_string(),
            self.canister.clone(),
            method.to_string(),
        ];
        if !args.is_empty() {
            call.push(encode_args(args));
        }
        call
    }

    async fn call(&self, method: &str, args: &[CandidArg]) -> Result<CommandOutput, LedgerError> {
        let call = self.call_args(method, args);
        self.exec_ok(&str_args(&call)).await
    }

    async fn exec(&self, args: &[&str]) -> Result<CommandOutput, LedgerError> {
        self.exec_in(&self.project_dir(), args).await
    }

    async fn exec_in(&self, dir: &Path, args: &[&str]) -> Result<CommandOutput, LedgerError> {
        let owned = to_owned_args(args);
        self.cancellable(self.runner.run(dir, &owned)).await
    }

    /// Run in the project directory, treating a non-zero exit as failure
    async fn exec_ok(&self, args: &[&str]) -> Result<CommandOutput, LedgerError> {
        let output = self.exec(args).await?;
        if !output.success() {
            return Err(self.failed(args, output));
        }
        Ok(output)
    }

    async fn cancellable<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T, LedgerError>>,
    ) -> Result<T, LedgerError> {
        match &self.cancel {
            Some(cancel) => tokio::select! {
                _ = cancel.cancelled() => Err(LedgerError::Cancelled),
                result = fut => result,
            },
            None => fut.await,
        }
    }

    fn failed(&self, args: &[&str], output: CommandOutput) -> LedgerError {
        if response::is_missing_method(&output.text) {
            return LedgerError::State {
                step: args.join(" "),
                reason: "the installed module does not implement the oracle map interface \
                         (set ORACLE_CANISTER_SOURCE to the ledger program)"
                    .to_string(),
            };
        }
        LedgerError::CommandFailed {
            command: args.join(" "),
            code: output.exit_code,
            output: output.text.trim().to_string(),
        }
    }
}

fn to_owned_args(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

fn str_args(args: &[String]) -> Vec<&str> {
    args.iter().map(String::as_str).collect()
}

#[async_trait::async_trait]
impl super::Publisher for LedgerClient {
    async fn publish(&self, key: &str, value: &SummarizedValue) -> Result<(), LedgerError> {
        for (field, v) in value {
            self.update_map_value(key, field, *v).await?;
            log::debug!("   └─ {}.{} = {:.6}", key, field, v);
        }
        Ok(())
    }
}
