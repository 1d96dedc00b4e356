//! Persistent key/value option storage.
//!
//! Settings and the OAuth token record live in a single JSON object keyed by
//! option name. Writes are plain overwrites: there is no versioning and no
//! locking across processes.

use crate::error::{AppError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub trait OptionStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>>;

    fn set(&self, key: &str, value: Value) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}

/// Typed access on top of [`OptionStore`].
pub trait OptionStoreExt: OptionStore {
    fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key)? {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
        }
    }

    fn set_as<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.set(key, serde_json::to_value(value)?)
    }
}

impl<S: OptionStore + ?Sized> OptionStoreExt for S {}

/// Option store backed by one JSON file.
#[derive(Debug)]
pub struct FileOptionStore {
    path: PathBuf,
}

impl FileOptionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_all(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }

        let contents = fs::read_to_string(&self.path).map_err(|e| {
            AppError::Config(format!("Failed to read options file {:?}: {}", self.path, e))
        })?;
        if contents.trim().is_empty() {
            return Ok(Map::new());
        }

        serde_json::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse options file {:?}: {}", self.path, e))
        })
    }

    fn write_all(&self, options: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                AppError::Config(format!("Failed to create options directory: {}", e))
            })?;
        }

        let contents = serde_json::to_string_pretty(options)?;

        // Write to a sibling file and rename so readers never see a partial file
        let temp_path = self.path.with_extension("json.tmp");
        write_private(&temp_path, contents.as_bytes())?;
        fs::rename(&temp_path, &self.path).map_err(|e| {
            AppError::Config(format!("Failed to replace options file: {}", e))
        })?;

        debug!(path = ?self.path, "Saved options");
        Ok(())
    }
}

impl OptionStore for FileOptionStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut options = self.read_all()?;
        options.insert(key.to_string(), value);
        self.write_all(&options)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut options = self.read_all()?;
        if options.remove(key).is_some() {
            self.write_all(&options)?;
        }
        Ok(())
    }
}

#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    // The file holds the client secret and tokens, so create it owner-only
    let mut file = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .map_err(|e| AppError::Config(format!("Failed to create options file: {}", e)))?;

    file.write_all(contents)
        .map_err(|e| AppError::Config(format!("Failed to write options file: {}", e)))?;

    Ok(())
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    fs::write(path, contents)
        .map_err(|e| AppError::Config(format!("Failed to write options file: {}", e)))
}

/// In-process option store for tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryOptionStore {
    options: std::sync::Mutex<std::collections::HashMap<String, Value>>,
}

#[cfg(test)]
impl MemoryOptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, std::collections::HashMap<String, Value>>> {
        self.options
            .lock()
            .map_err(|_| AppError::Other(anyhow::anyhow!("option store lock poisoned")))
    }
}

#[cfg(test)]
impl OptionStore for MemoryOptionStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        self.lock()?.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}
