//! Runner configuration

use crate::error::Result;
use serde::Deserialize;
use std::path::Path;

/// Tag of this implementation in `(tag:list)` prefixes
pub const DEFAULT_RUNTIME_TAG: &str = "rs";

/// Settings shared by every specification of a run
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerConfig {
    /// Features tagged for other runtimes are skipped
    pub runtime_tag: String,

    /// Abort the run at the first failing feature
    pub exit_first: bool,
}

impl RunnerConfig {
    /// Load settings from a YAML file
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::load_string(&content)
    }

    pub fn load_string(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            runtime_tag: DEFAULT_RUNTIME_TAG.to_string(),
            exit_first: false,
        }
    }
}
