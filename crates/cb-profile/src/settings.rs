//! Per-profile metadata
//!
//! Entries live in one JSON document keyed by profile name. Writes go to a
//! temporary file that is renamed over the old one.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;

bitflags::bitflags! {
    /// Which header fields the user overrode.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct ProfileFlags: u8 {
        const HAS_CUSTOM_TITLE = 1 << 0;
        const HAS_CUSTOM_UPDATE_URL = 1 << 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileCategory {
    Ads,
    Privacy,
    Regional,
    #[default]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileSettings {
    pub title: Option<String>,
    pub update_url: Option<String>,
    /// Days between updates; 0 falls back to the list's `Expires`.
    pub update_interval: u32,
    /// Unix seconds of the last successful update.
    pub last_update: Option<u64>,
    pub category: ProfileCategory,
    pub languages: Vec<String>,
    pub flags: ProfileFlags,
}

#[derive(Debug, Default)]
pub struct MetadataStore {
    path: Option<PathBuf>,
    entries: RwLock<BTreeMap<String, ProfileSettings>>,
}

impl MetadataStore {
    /// A store that is never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: &Path) -> Result<Self, SettingsError> {
        let entries = match fs::read_to_string(path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text)?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => {
                return Err(SettingsError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        Ok(Self {
            path: Some(path.to_path_buf()),
            entries: RwLock::new(entries),
        })
    }

    pub fn get(&self, name: &str) -> ProfileSettings {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(name).cloned().unwrap_or_default()
    }

    pub fn names(&self) -> Vec<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.keys().cloned().collect()
    }

    /// Modify one entry and persist the store.
    pub fn update<F>(&self, name: &str, f: F) -> Result<(), SettingsError>
    where
        F: FnOnce(&mut ProfileSettings),
    {
        let snapshot = {
            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            f(entries.entry(name.to_string()).or_default());
            serde_json::to_string_pretty(&*entries)?
        };
        self.persist(&snapshot)
    }

    fn persist(&self, json: &str) -> Result<(), SettingsError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let io_err = |source| SettingsError::Io {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, path).map_err(io_err)
    }
}
