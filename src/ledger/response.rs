//! Classification of the ledger tool's human-oriented output

use crate::error::LedgerError;

pub const PROJECT_EXISTS: &str = "Cannot create a new project because the directory already exists.";
pub const IDENTITY_EXISTS: &str = "Identity already exists.";
pub const CANISTER_ID_MISSING: &str = "Cannot find canister id.";
pub const OWNER_ALREADY_SET: &str = "Cannot set owner if there is already an owner";

/// Rejections for a method the installed module does not export
pub const MISSING_METHOD: [&str; 2] = ["has no update method", "has no query method"];

const STATUS_HEADER: &str = "Canister status call result for";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Stopping,
    Stopped,
}

/// Parsed `canister status` result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanisterStatus {
    pub state: RunState,
    /// Lower-case `0x…` hash of the installed module, `None` when empty
    pub module_hash: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Owner,
    Writer,
}

pub fn parse_status(canister: &str, output: &str) -> Result<CanisterStatus, LedgerError> {
    let unrecognized = || LedgerError::UnrecognizedResponse {
        step: "canister status".to_string(),
        output: output.to_string(),
    };

    let text = output.trim_start();
    let header = format!("{} {}", STATUS_HEADER, canister);
    if !text.starts_with(&header) {
        return Err(unrecognized());
    }

    let mut state = None;
    let mut module_hash = None;
    for line in text.lines().map(str::trim) {
        if let Some(value) = line.strip_prefix("Status:") {
            state = match value.trim() {
                "Running" => Some(RunState::Running),
                "Stopping" => Some(RunState::Stopping),
                "Stopped" => Some(RunState::Stopped),
                _ => return Err(unrecognized()),
            };
        } else if let Some(value) = line.strip_prefix("Module hash:") {
            let value = value.trim();
            if value != "None" {
                module_hash = Some(value.to_ascii_lowercase());
            }
        }
    }

    Ok(CanisterStatus {
        state: state.ok_or_else(unrecognized)?,
        module_hash,
    })
}

/// Whether the canister rejected a call because the method does not exist
pub fn is_missing_method(output: &str) -> bool {
    MISSING_METHOD.iter().any(|marker| output.contains(marker))
}

/// Parse the result of `my_role`; `None` means the caller holds no role
pub fn parse_role(output: &str) -> Result<Option<Role>, LedgerError> {
    let text = output.trim_start();
    if text.starts_with("(opt variant { owner })") {
        Ok(Some(Role::Owner))
    } else if text.starts_with("(opt variant { writer })") {
        Ok(Some(Role::Writer))
    } else if text.starts_with("(null)") {
        Ok(None)
    } else {
        Err(LedgerError::UnrecognizedResponse {
            step: "role query".to_string(),
            output: output.to_string(),
        })
    }
}

/// Parse an optional float result such as `(opt 1834.25 : float64)` or `(null)`
pub fn parse_opt_float(output: &str) -> Result<Option<f64>, LedgerError> {
    let unrecognized = || LedgerError::UnrecognizedResponse {
        step: "field query".to_string(),
        output: output.to_string(),
    };

    let text = output.trim();
    if text.starts_with("(null)") {
        return Ok(None);
    }

    let rest = text.strip_prefix("(opt").ok_or_else(unrecognized)?;
    let number = rest
        .trim_start()
        .split(|c: char| c.is_whitespace() || c == ')' || c == ':')
        .next()
        .ok_or_else(unrecognized)?;

    number.parse::<f64>().map(Some).map_err(|_| unrecognized())
}
