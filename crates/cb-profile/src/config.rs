use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Engine configuration, read from a JSON file. Missing fields take their
/// defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Writable directory for cached lists and profile metadata.
    pub data_dir: PathBuf,
    /// Read-only lists shipped with the application.
    pub bundled_dir: Option<PathBuf>,
    pub enable_wildcards: bool,
    pub user_agent: String,
    pub fetch_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            bundled_dir: None,
            enable_wildcards: true,
            user_agent: concat!("contentblock/", env!("CARGO_PKG_VERSION")).to_string(),
            fetch_timeout_secs: 30,
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Directory holding `<name>.txt` cache files.
    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("blocking")
    }

    pub fn cache_path(&self, name: &str) -> PathBuf {
        self.cache_dir().join(format!("{name}.txt"))
    }

    pub fn bundled_path(&self, name: &str) -> Option<PathBuf> {
        self.bundled_dir.as_ref().map(|dir| dir.join(format!("{name}.txt")))
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.data_dir.join("contentBlocking.json")
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}
