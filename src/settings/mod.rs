//! Persisted bot settings and the stores that hold them.
//!
//! Every store persists the same JSON document:
//! `{"prefix": "", "suffix": "", "approved_users": [..], "convert_mkv": false}`.
//! Mutating helpers are plain load → mutate → save sequences with no lock
//! held across them, so two concurrent writers race and the later save wins.

mod embedded;
mod file;
mod memory;

pub use embedded::RedbStore;
pub use file::FileStore;
pub use memory::MemoryStore;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{SettingsBackend, SettingsConfig};

/// A chat user identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
    #[serde(default, alias = "approvedUsers")]
    pub approved_users: BTreeSet<UserId>,
    #[serde(default, alias = "convertMkv")]
    pub convert_mkv: bool,
}

impl Settings {
    /// Settings used when nothing has been persisted yet.
    pub fn defaults(owner: UserId) -> Self {
        Self {
            approved_users: BTreeSet::from([owner]),
            ..Default::default()
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Settings document at {path} is corrupt: {source}")]
    Corrupt {
        path: String,
        source: serde_json::Error,
    },
    #[error("Database error: {0}")]
    Database(Box<redb::Error>),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(serde_json::Error),
}

impl From<redb::CommitError> for SettingsError {
    fn from(e: redb::CommitError) -> Self {
        SettingsError::Database(Box::new(e.into()))
    }
}

impl From<redb::DatabaseError> for SettingsError {
    fn from(e: redb::DatabaseError) -> Self {
        SettingsError::Database(Box::new(e.into()))
    }
}

impl From<redb::StorageError> for SettingsError {
    fn from(e: redb::StorageError) -> Self {
        SettingsError::Database(Box::new(e.into()))
    }
}

impl From<redb::TableError> for SettingsError {
    fn from(e: redb::TableError) -> Self {
        SettingsError::Database(Box::new(e.into()))
    }
}

impl From<redb::TransactionError> for SettingsError {
    fn from(e: redb::TransactionError) -> Self {
        SettingsError::Database(Box::new(e.into()))
    }
}

/// Durable home of the singleton [`Settings`] value.
pub trait SettingsStore: Send + Sync {
    /// Returns the persisted settings, or defaults when nothing is persisted.
    fn load(&self) -> Result<Settings, SettingsError>;

    /// Replaces the persisted settings. Readers never observe a partial write.
    fn save(&self, settings: &Settings) -> Result<(), SettingsError>;

    fn set_prefix(&self, prefix: &str) -> Result<Settings, SettingsError> {
        let mut settings = self.load()?;
        settings.prefix = prefix.to_string();
        self.save(&settings)?;
        Ok(settings)
    }

    fn set_suffix(&self, suffix: &str) -> Result<Settings, SettingsError> {
        let mut settings = self.load()?;
        settings.suffix = suffix.to_string();
        self.save(&settings)?;
        Ok(settings)
    }

    /// Flips `convert_mkv` and returns the new value.
    fn toggle_convert_mkv(&self) -> Result<bool, SettingsError> {
        let mut settings = self.load()?;
        settings.convert_mkv = !settings.convert_mkv;
        self.save(&settings)?;
        Ok(settings.convert_mkv)
    }

    /// Adds `user` to the approved set. Returns false (and writes nothing)
    /// when the user was already approved.
    fn approve(&self, user: UserId) -> Result<bool, SettingsError> {
        let mut settings = self.load()?;
        if !settings.approved_users.insert(user) {
            return Ok(false);
        }
        self.save(&settings)?;
        Ok(true)
    }
}

/// Opens the configured backend.
pub fn open(config: &SettingsConfig, owner: UserId) -> Result<Arc<dyn SettingsStore>, SettingsError> {
    let store: Arc<dyn SettingsStore> = match config.backend {
        SettingsBackend::File => Arc::new(FileStore::new(&config.path, owner)),
        SettingsBackend::Redb => Arc::new(RedbStore::open(&config.data_dir, owner)?),
    };
    Ok(store)
}

fn decode(path: &str, bytes: &[u8]) -> Result<Settings, SettingsError> {
    serde_json::from_slice(bytes).map_err(|source| SettingsError::Corrupt {
        path: path.to_string(),
        source,
    })
}

fn encode(settings: &Settings) -> Result<Vec<u8>, SettingsError> {
    serde_json::to_vec_pretty(settings).map_err(SettingsError::Serialization)
}
