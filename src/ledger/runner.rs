//! Invocation of the external ledger tool
//!
//! The tool is opaque: run a command, get text and an exit code back.

use crate::error::LedgerError;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Output of one tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// stdout followed by stderr
    pub text: String,
    /// stdout alone, for commands whose result is a single value
    pub stdout: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run the tool with `args` in `dir`, capturing its output
    async fn run(&self, dir: &Path, args: &[String]) -> Result<CommandOutput, LedgerError>;

    /// Run the tool with inherited stdio, for commands that leave a
    /// background process holding the output streams open
    async fn run_inherited(&self, dir: &Path, args: &[String]) -> Result<i32, LedgerError>;
}

/// Runs the real tool binary with a per-call timeout
#[derive(Debug, Clone)]
pub struct DfxRunner {
    program: String,
    timeout: Duration,
}

impl DfxRunner {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    fn command(&self, dir: &Path, args: &[String]) -> Command {
        let mut command = Command::new(&self.program);
        command.args(args).current_dir(dir).kill_on_drop(true);
        command
    }

    fn describe(&self, args: &[String]) -> String {
        format!("{} {}", self.program, args.join(" "))
    }

    fn launch_error(&self, source: std::io::Error) -> LedgerError {
        LedgerError::Launch {
            program: self.program.clone(),
            source,
        }
    }
}

#[async_trait]
impl CommandRunner for DfxRunner {
    async fn run(&self, dir: &Path, args: &[String]) -> Result<CommandOutput, LedgerError> {
        log::debug!("▶️  {} (in {})", self.describe(args), dir.display());

        let mut command = self.command(dir, args);
        command.stdin(Stdio::null());

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| LedgerError::Timeout {
                command: self.describe(args),
                secs: self.timeout.as_secs(),
            })?
            .map_err(|e| self.launch_error(e))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let mut text = stdout.clone();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(CommandOutput {
            text,
            stdout,
            exit_code: output.status.code().unwrap_or(-1),
        })
    }

    async fn run_inherited(&self, dir: &Path, args: &[String]) -> Result<i32, LedgerError> {
        log::debug!("▶️  {} (in {})", self.describe(args), dir.display());

        let mut command = self.command(dir, args);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let status = tokio::time::timeout(self.timeout, command.status())
            .await
            .map_err(|_| LedgerError::Timeout {
                command: self.describe(args),
                secs: self.timeout.as_secs(),
            })?
            .map_err(|e| self.launch_error(e))?;

        Ok(status.code().unwrap_or(-1))
    }
}
