//! Content Blocking Profiles
//!
//! A profile is one filter list on disk together with its metadata. This
//! crate loads profiles lazily, keeps them current through checksum-verified
//! downloads and answers queries across a selection of profiles.
//!
//! # Modules
//!
//! - `config`: Engine configuration
//! - `settings`: Per-profile metadata store
//! - `fetch`: Download transport
//! - `checksum`: `! Checksum:` verification
//! - `profile`: One filter list and its update cycle
//! - `registry`: All profiles, queried together
//! - `error`: Error types

pub mod checksum;
pub mod config;
pub mod error;
pub mod fetch;
pub mod profile;
pub mod registry;
pub mod settings;

pub use config::EngineConfig;
pub use error::{ConfigError, FetchError, ProfileError, RegistryError, SettingsError, UpdateError};
pub use fetch::{Fetcher, HttpFetcher};
pub use profile::{Profile, ProfileEnv, ProfileState};
pub use registry::ProfileRegistry;
pub use settings::{MetadataStore, ProfileCategory, ProfileFlags, ProfileSettings};
