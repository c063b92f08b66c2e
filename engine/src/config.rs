//! Engine configuration.
//!
//! Values come from the environment, after loading a `.env` file if one is
//! present. Command line flags override them.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

const DEFAULT_HOME: &str = ".tabflow";
const DEFAULT_STATE_FILE: &str = "active_transformations.json";
const DEFAULT_CONTEXTS_DIR: &str = "contexts";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Workspace directory (`TABFLOW_HOME`)
    pub home: PathBuf,
    /// File holding the saved registry, relative to `home` (`TABFLOW_STATE_FILE`)
    pub state_file: String,
    /// Directory holding one JSON file per context, relative to `home` (`TABFLOW_CONTEXTS_DIR`)
    pub contexts_dir: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            home: PathBuf::from(DEFAULT_HOME),
            state_file: DEFAULT_STATE_FILE.to_string(),
            contexts_dir: DEFAULT_CONTEXTS_DIR.to_string(),
        }
    }
}

impl EngineConfig {
    /// Load `.env` (if present) and read the `TABFLOW_*` variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from a variable lookup; unset or blank variables keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();
        Self {
            home: get("TABFLOW_HOME").map(PathBuf::from).unwrap_or(defaults.home),
            state_file: get("TABFLOW_STATE_FILE").unwrap_or(defaults.state_file),
            contexts_dir: get("TABFLOW_CONTEXTS_DIR").unwrap_or(defaults.contexts_dir),
        }
    }

    pub fn with_home(mut self, home: impl AsRef<Path>) -> Self {
        self.home = home.as_ref().to_path_buf();
        self
    }

    pub fn state_path(&self) -> PathBuf {
        self.home.join(&self.state_file)
    }

    pub fn contexts_path(&self) -> PathBuf {
        self.home.join(&self.contexts_dir)
    }
}
