//! Shared fakes for integration tests
//!
//! `FakeDfx` imitates the ledger tool closely enough for the reconciler and
//! the publisher: it keeps the project/network/canister/role/map state in
//! memory, answers with the tool's real message formats, and writes the
//! built module to disk so build freshness can be checked.

#![allow(dead_code)]

use async_trait::async_trait;
use oracleflow::ledger::{CommandOutput, CommandRunner};
use oracleflow::{ExtractError, LedgerError};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::Mutex;

pub const OWNER_PRINCIPAL: &str = "2vxsx-fae";
pub const WRITER_PRINCIPAL: &str = "rrkah-fqaaa-aaaaa-aaaaq-cai";
pub const CANISTER_ID: &str = "ryjl3-tyaaa-aaaaa-aaaba-cai";

#[derive(Debug, Clone, Default)]
pub struct DfxState {
    pub project: bool,
    pub network: bool,
    pub writer_identity: bool,
    pub canister: bool,
    pub running: bool,
    pub module_hash: Option<String>,
    /// Installed module is the tool's project template, exporting no oracle methods
    pub scaffold: bool,
    pub owner: Option<String>,
    pub writers: BTreeSet<String>,
    pub map: BTreeMap<String, BTreeMap<String, f64>>,
}

pub struct FakeDfx {
    pub state: Mutex<DfxState>,
    /// Every invocation, joined with spaces
    pub calls: Mutex<Vec<String>>,
    /// Bytes written by `build`
    pub module: Mutex<Vec<u8>>,
    /// Commands starting with this prefix fail with exit code 255
    pub fail_prefix: Mutex<Option<String>>,
    /// Appended to stderr of every invocation
    pub warning: Mutex<Option<String>>,
}

impl FakeDfx {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DfxState::default()),
            calls: Mutex::new(Vec::new()),
            module: Mutex::new(b"\0asm module v1".to_vec()),
            fail_prefix: Mutex::new(None),
            warning: Mutex::new(None),
        }
    }

    /// A tool whose builds produce the bare project template
    pub fn scaffold() -> Self {
        let dfx = Self::new();
        dfx.state.lock().unwrap().scaffold = true;
        dfx
    }

    pub fn warn_with(&self, warning: Option<&str>) {
        *self.warning.lock().unwrap() = warning.map(str::to_string);
    }

    pub fn state(&self) -> DfxState {
        self.state.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn fail_on(&self, prefix: Option<&str>) {
        *self.fail_prefix.lock().unwrap() = prefix.map(str::to_string);
    }

    pub fn set_module(&self, bytes: &[u8]) {
        *self.module.lock().unwrap() = bytes.to_vec();
    }

    fn respond(&self, dir: &Path, args: &[String]) -> CommandOutput {
        let mut output = self.respond_quietly(dir, args);
        if let Some(warning) = self.warning.lock().unwrap().as_deref() {
            output.text.push_str(warning);
            output.text.push('\n');
        }
        output
    }

    fn respond_quietly(&self, dir: &Path, args: &[String]) -> CommandOutput {
        let line = args.join(" ");
        self.calls.lock().unwrap().push(line.clone());

        if let Some(prefix) = self.fail_prefix.lock().unwrap().as_deref() {
            if line.starts_with(prefix) {
                return err(255, "Error: Failed to connect to the local replica.");
            }
        }

        let (identity, args) = match args {
            [flag, name, rest @ ..] if flag == "--identity" => (name.as_str(), rest),
            _ => ("default", args),
        };
        let caller = if identity == "writer" {
            WRITER_PRINCIPAL
        } else {
            OWNER_PRINCIPAL
        };
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let mut state = self.state.lock().unwrap();

        match args.as_slice() {
            ["new", name] => {
                if state.project {
                    return err(
                        1,
                        "Error: Cannot create a new project because the directory already exists.",
                    );
                }
                if let Err(e) = std::fs::create_dir_all(dir.join(name)) {
                    return err(1, &e.to_string());
                }
                state.project = true;
                ok(&format!("Created new project \"{}\"", name))
            }
            ["stop"] => {
                state.network = false;
                ok("Using the default definition for the 'local' shared network.")
            }
            ["start", "--background"] => {
                state.network = true;
                ok("")
            }
            ["identity", "new", "writer"] => {
                if state.writer_identity {
                    return err(255, "Error: Identity already exists.");
                }
                state.writer_identity = true;
                ok("Created identity: \"writer\".")
            }
            ["identity", "get-principal"] if identity == "writer" => {
                if !state.writer_identity {
                    return err(255, "Error: Identity writer does not exist.");
                }
                ok(&format!("{}\n", WRITER_PRINCIPAL))
            }
            _ if !state.network => err(255, "Error: Failed to connect to the local replica."),
            ["canister", "id", _] => {
                if state.canister {
                    ok(&format!("{}\n", CANISTER_ID))
                } else {
                    err(255, "Error: Cannot find canister id. Please issue 'dfx canister create oracle'.")
                }
            }
            ["canister", "create", name] => {
                state.canister = true;
                ok(&format!("Creating canister {}...\n{} canister created with canister id: {}", name, name, CANISTER_ID))
            }
            ["build", name] => {
                if !state.canister {
                    return err(255, "Error: Cannot find canister id.");
                }
                let target = dir.join(".dfx").join("local").join("canisters").join(name);
                let module = self.module.lock().unwrap().clone();
                if let Err(e) = std::fs::create_dir_all(&target)
                    .and_then(|_| std::fs::write(target.join(format!("{}.wasm", name)), module))
                {
                    return err(1, &e.to_string());
                }
                ok("Building canisters...")
            }
            ["canister", "install", name, rest @ ..] => {
                let upgrade = rest == ["--mode", "upgrade"];
                if state.module_hash.is_some() && !upgrade {
                    return err(255, "Error: Canister already installed. Use --mode upgrade.");
                }
                if state.module_hash.is_none() && upgrade {
                    return err(255, "Error: Cannot upgrade an empty canister.");
                }
                let wasm = dir
                    .join(".dfx")
                    .join("local")
                    .join("canisters")
                    .join(name)
                    .join(format!("{}.wasm", name));
                let bytes = match std::fs::read(&wasm) {
                    Ok(bytes) => bytes,
                    Err(_) => return err(255, "Error: The canister must be built before install."),
                };
                state.module_hash = Some(format!("0x{}", hex::encode(Sha256::digest(&bytes))));
                state.running = true;
                ok(&format!("Installing code for canister {}", name))
            }
            ["canister", "status", name] => {
                if !state.canister {
                    return err(255, "Error: Cannot find canister id.");
                }
                let status = if state.running { "Running" } else { "Stopped" };
                let hash = state.module_hash.clone().unwrap_or_else(|| "None".to_string());
                ok(&format!(
                    "Canister status call result for {}.\nStatus: {}\nController: {}\nMemory allocation: 0\nCompute allocation: 0\nFreezing threshold: 2_592_000\nMemory Size: Nat(2362158)\nBalance: 3_100_000_000_000 Cycles\nModule hash: {}\n",
                    name, status, OWNER_PRINCIPAL, hash
                ))
            }
            ["canister", "start", name] => {
                state.running = true;
                ok(&format!("Starting code for canister {}", name))
            }
            ["canister", "call", _, method, call_args @ ..] => {
                if state.module_hash.is_none() || !state.running {
                    return err(255, "Error: The replica returned an HTTP Error: canister is not running");
                }
                if state.scaffold {
                    return err(
                        255,
                        &format!(
                            "Error: Failed update call.\nCaused by: The replica returned a rejection error: reject code CanisterError, reject message Canister {} has no update method '{}'",
                            CANISTER_ID, method
                        ),
                    );
                }
                call(&mut state, caller, method, call_args.first().copied().unwrap_or("()"))
            }
            other => err(255, &format!("error: unexpected arguments {:?}", other)),
        }
    }
}

fn call(state: &mut DfxState, caller: &str, method: &str, encoded: &str) -> CommandOutput {
    let params = parse_args(encoded);
    match method {
        "my_role" => {
            if state.owner.as_deref() == Some(caller) {
                ok("(opt variant { owner })\n")
            } else if state.writers.contains(caller) {
                ok("(opt variant { writer })\n")
            } else {
                ok("(null)\n")
            }
        }
        "assign_owner_role" => {
            if state.owner.is_some() {
                return err(
                    1,
                    "Error: The replica returned a replica error: Canister trapped explicitly: Cannot set owner if there is already an owner",
                );
            }
            state.owner = Some(caller.to_string());
            ok("()\n")
        }
        "get_roles" => {
            let mut entries = Vec::new();
            if let Some(owner) = &state.owner {
                entries.push(format!("record {{ principal \"{}\"; variant {{ owner }} }}", owner));
            }
            for writer in &state.writers {
                entries.push(format!("record {{ principal \"{}\"; variant {{ writer }} }}", writer));
            }
            ok(&format!("(vec {{ {} }})\n", entries.join("; ")))
        }
        "assign_writer_role" => {
            if state.owner.as_deref() != Some(caller) {
                return err(1, "Error: Canister trapped explicitly: caller is not the owner");
            }
            let principal = params
                .first()
                .and_then(|p| p.strip_prefix("principal "))
                .map(unquote)
                .unwrap_or_default();
            state.writers.insert(principal);
            ok("()\n")
        }
        "update_map_value" => {
            if !state.writers.contains(caller) {
                return err(1, "Error: Canister trapped explicitly: caller is not a writer");
            }
            match params.as_slice() {
                [key, field, value] => match value.parse::<f64>() {
                    Ok(value) => {
                        state
                            .map
                            .entry(unquote(key))
                            .or_default()
                            .insert(unquote(field), value);
                        ok("()\n")
                    }
                    Err(_) => err(255, "Error: Invalid data: Unable to parse float"),
                },
                _ => err(255, "Error: Invalid data: expected (text, text, float64)"),
            }
        }
        "get_map_field_value" => match params.as_slice() {
            [key, field] => match state.map.get(&unquote(key)).and_then(|m| m.get(&unquote(field))) {
                Some(value) => ok(&format!("(opt {} : float64)\n", value)),
                None => ok("(null)\n"),
            },
            _ => err(255, "Error: Invalid data: expected (text, text)"),
        },
        other => err(255, &format!("Error: Canister has no update method '{}'", other)),
    }
}

/// Split `("a","b",1.5)` into its top-level elements
fn parse_args(encoded: &str) -> Vec<String> {
    let inner = encoded
        .trim()
        .trim_start_matches('(')
        .trim_end_matches(')');
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut escaped = false;
    for c in inner.chars() {
        match c {
            _ if escaped => {
                current.push(c);
                escaped = false;
            }
            '\\' => {
                current.push(c);
                escaped = true;
            }
            '"' => {
                current.push(c);
                quoted = !quoted;
            }
            ',' if !quoted => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current);
    }
    parts.into_iter().map(|p| p.trim().to_string()).collect()
}

fn unquote(s: &str) -> String {
    s.trim().trim_matches('"').to_string()
}

fn ok(text: &str) -> CommandOutput {
    CommandOutput {
        text: text.to_string(),
        stdout: text.to_string(),
        exit_code: 0,
    }
}

fn err(code: i32, text: &str) -> CommandOutput {
    CommandOutput {
        text: format!("{}\n", text),
        stdout: String::new(),
        exit_code: code,
    }
}

#[async_trait]
impl CommandRunner for FakeDfx {
    async fn run(&self, dir: &Path, args: &[String]) -> Result<CommandOutput, LedgerError> {
        Ok(self.respond(dir, args))
    }

    async fn run_inherited(&self, dir: &Path, args: &[String]) -> Result<i32, LedgerError> {
        Ok(self.respond(dir, args).exit_code)
    }
}

/// Serves canned JSON documents by URL; unknown URLs are unreachable
pub struct StaticFetcher(pub HashMap<String, Value>);

#[async_trait]
impl oracleflow::extract::SourceFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<Value, ExtractError> {
        self.0.get(url).cloned().ok_or_else(|| ExtractError::Network {
            url: url.to_string(),
            message: "connection refused".to_string(),
        })
    }
}
