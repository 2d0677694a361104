use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Whether a run mutates the broker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Issue the planned deletes and creates.
    #[default]
    Apply,
    /// Dry run: list and diff only.
    Plan,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Apply => "apply",
            RunMode::Plan => "plan",
        }
    }

    pub fn mutates(&self) -> bool {
        matches!(self, RunMode::Apply)
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs of one convergence run. Built once at startup and passed by
/// reference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSettings {
    /// Topology files, merged in order (later files override).
    pub topology_paths: Vec<PathBuf>,
    pub credentials_path: PathBuf,
    /// Seed for password salts. Must stay the same across runs for users
    /// to compare equal.
    pub seed: u64,
    pub mode: RunMode,
}

impl RunSettings {
    pub fn new(
        topology_paths: Vec<PathBuf>,
        credentials_path: impl Into<PathBuf>,
        seed: u64,
    ) -> Self {
        Self {
            topology_paths,
            credentials_path: credentials_path.into(),
            seed,
            mode: RunMode::Apply,
        }
    }

    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }
}
