//! Compile options, optionally loaded from a JSON file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config '{}': {source}", path.display())]
    Read { path: PathBuf, source: std::io::Error },
    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompileOptions {
    /// Copy the (kind-remapped) source program ahead of the differentiation block.
    pub echo_source: bool,
    /// Log a warning for each weight whose loss partial is never produced.
    pub warn_unreachable_weights: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self { echo_source: true, warn_unreachable_weights: true }
    }
}

impl CompileOptions {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        Self::from_json(&text)
    }
}
