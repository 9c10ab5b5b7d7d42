use std::io;
use std::path::PathBuf;

use cb_compiler::HeaderError;

/// Failure to read a profile's list file.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid header in {0}")]
    InvalidHeader(PathBuf),
    #[error("No list file for profile {0}")]
    NotFound(String),
    #[error("Profile {0} has no rules")]
    EmptyBody(String),
}

impl ProfileError {
    pub(crate) fn from_header(path: PathBuf, err: HeaderError) -> Self {
        match err {
            HeaderError::InvalidHeader => ProfileError::InvalidHeader(path),
            HeaderError::Io(source) => ProfileError::Io { path, source },
        }
    }
}

/// Failure of a single update cycle. The loaded rules are never touched.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    #[error("Update already in progress")]
    AlreadyUpdating,
    #[error("Update URL is empty")]
    MissingUpdateUrl,
    #[error("Update URL ({0}) is invalid")]
    InvalidUpdateUrl(String),
    #[error("Network error: {0}")]
    Network(#[from] FetchError),
    #[error("Downloaded list has no [Adblock Plus] header")]
    InvalidHeader,
    #[error("Checksum mismatch: expected={expected}, computed={computed}")]
    ChecksumMismatch { expected: String, computed: String },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Metadata error: {0}")]
    Settings(#[from] SettingsError),
    #[error("Update task failed: {0}")]
    Task(String),
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP status {status} for {url}")]
    Status { status: u16, url: String },
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid metadata: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure to set up a [`crate::ProfileRegistry`].
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
}
