//! Command handler modules for tpk-cli.
//!
//! Shared argument types and helpers live here.

pub mod converge;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

/// Arguments shared by `apply` and `plan`.
#[derive(Args, Debug)]
pub struct ConvergeArgs {
    /// Topology YAML paths in merge order (base -> overlays)
    #[arg(long = "topology", required = true, num_args = 1..)]
    pub topology: Vec<PathBuf>,

    /// Credentials YAML (`users: [{username, password | password_env, tags}]`)
    #[arg(long)]
    pub credentials: PathBuf,

    /// Salt seed for user password hashes; keep it fixed across runs
    #[arg(long)]
    pub seed: u64,

    /// Optional settings YAML naming the broker env vars and timeout
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Write the run report as JSON to this path
    #[arg(long)]
    pub report: Option<PathBuf>,
}

/// Plaintext from either `--password` or the env var named by `--password-env`.
pub fn read_password(password: Option<String>, password_env: Option<String>) -> Result<String> {
    if let Some(var) = password_env {
        let value = std::env::var(&var)
            .with_context(|| format!("env var '{}' is not set", var))?;
        if value.is_empty() {
            anyhow::bail!("env var '{}' is empty", var);
        }
        return Ok(value);
    }

    let value = password.context("must provide --password or --password-env")?;
    if value.is_empty() {
        anyhow::bail!("--password must not be empty");
    }
    Ok(value)
}
