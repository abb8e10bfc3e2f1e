//! TOML configuration for twincheck.
//!
//! Layered lookup: an explicit path, then the `TWINCHECK_CONFIG` environment
//! variable, then `twincheck.toml` inside the data directory, then
//! compiled-in defaults. Every section tolerates missing keys.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::storage::history::DEFAULT_HISTORY_CAP;

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "TWINCHECK_CONFIG";

/// Config file name looked up inside the data directory.
pub const CONFIG_FILE: &str = "twincheck.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub providers: ProviderConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Reject values that cannot be honoured.
    pub fn validate(&self) -> Result<()> {
        if self.history.max_entries == 0 {
            bail!("history.max_entries must be at least 1");
        }
        Ok(())
    }

    /// Resolve configuration.
    ///
    /// An explicit path must load; the fallbacks only warn when present but
    /// broken.
    pub fn resolve(explicit: Option<&Path>, data_dir: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return Ok(cfg),
                Err(e) => warn!(
                    path = %path.display(),
                    error = %e,
                    "{CONFIG_ENV} set but file could not be loaded, trying fallback"
                ),
            }
        }

        let dir = data_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(|| StorageConfig::default().data_dir);
        let in_data_dir = dir.join(CONFIG_FILE);
        if in_data_dir.exists() {
            match Self::load(&in_data_dir) {
                Ok(cfg) => return Ok(cfg),
                Err(e) => warn!(
                    path = %in_data_dir.display(),
                    error = %e,
                    "config file exists but could not be loaded, using defaults"
                ),
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Ok(Self::default())
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding `projects.json` and the per-project files.
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Executions kept per project; older entries are evicted first.
    pub max_entries: usize,
    /// Whether single-test runs also append an execution entry.
    pub record_single_runs: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_HISTORY_CAP,
            record_single_runs: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub generation_timeout_secs: u64,
    pub execution_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            generation_timeout_secs: 120,
            execution_timeout_secs: 300,
        }
    }
}

impl ProviderConfig {
    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    pub fn execution_timeout(&self) -> Duration {
        Duration::from_secs(self.execution_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum tracing level (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
