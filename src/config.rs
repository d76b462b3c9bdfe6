use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level configuration loaded from overseer.toml.
///
/// Every field has a default, so a partial file (or none at all) is fine.
/// CLI flags override whatever is resolved here.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct OverseerConfig {
    /// Command to run when `-c/--command` is not given.
    pub command: Option<String>,
    pub io: IoConfig,
    pub limits: LimitsConfig,
}

/// Stream redirection targets.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct IoConfig {
    pub input: Option<PathBuf>,
    pub output: PathBuf,
    pub error: PathBuf,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            input: None,
            output: PathBuf::from("monitored.out"),
            error: PathBuf::from("monitored.err"),
        }
    }
}

/// Resource ceilings in bytes; 0 means unlimited.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct LimitsConfig {
    pub file_size: u64,
    pub memory: u64,
}

/// Load config from the given path, or defaults.
///
/// A missing file is the normal case. A file that exists but does not
/// parse logs a warning and falls back to defaults rather than aborting.
pub fn load(path: &Path) -> OverseerConfig {
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!("failed to parse {}: {e}", path.display());
                OverseerConfig::default()
            }
        },
        Err(_) => OverseerConfig::default(),
    }
}
