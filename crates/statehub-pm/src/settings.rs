//! Settings storage
//!
//! A single JSON object of arbitrary keys, read and written wholesale.

use serde_json::{Map, Value};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Settings document
pub type Settings = Map<String, Value>;

/// Errors that can occur during settings operations
#[derive(Debug, Error)]
pub enum SettingsError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// File exists but is not a JSON object
    #[error("Corrupt settings file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Serialization failed
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Reads and writes `settings.json`
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Create a store backed by `path`
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Load all settings
    ///
    /// A missing file yields an empty document.
    pub fn load(&self) -> Result<Settings, SettingsError> {
        if !self.path.exists() {
            return Ok(Settings::new());
        }

        let contents = fs::read_to_string(&self.path)?;
        serde_json::from_str(&contents).map_err(|source| SettingsError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Replace all settings
    pub fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        let json = serde_json::to_string_pretty(settings)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write next to the target, then rename over it
        let tmp_path = self.path.with_extension("json.tmp");
        let mut tmp_file = fs::File::create(&tmp_path)?;
        tmp_file.write_all(json.as_bytes())?;
        tmp_file.sync_all()?;
        fs::rename(&tmp_path, &self.path)?;

        Ok(())
    }

    /// Read a single key
    pub fn get(&self, key: &str) -> Result<Option<Value>, SettingsError> {
        Ok(self.load()?.remove(key))
    }

    /// Set a single key and persist
    pub fn set(&self, key: &str, value: Value) -> Result<(), SettingsError> {
        let mut settings = self.load()?;
        settings.insert(key.to_string(), value);
        self.save(&settings)
    }

    /// Remove a single key and persist; returns the previous value
    pub fn remove(&self, key: &str) -> Result<Option<Value>, SettingsError> {
        let mut settings = self.load()?;
        let previous = settings.remove(key);
        if previous.is_some() {
            self.save(&settings)?;
        }
        Ok(previous)
    }

    /// Backing file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}
