use crate::error::Result;
use crate::structs::{HistoryEntry, LastWeather};
use log::{debug, info};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const LAST_WEATHER_KEY: &str = "lastWeather";
pub const HISTORIES_KEY: &str = "weatherHistories";

/// Key/value backend holding JSON documents.
///
/// A `get` must observe the most recent completed `set` for the same key.
pub trait Storage {
    fn get(&self, key: &str) -> Result<Option<Value>>;
    fn set(&mut self, key: &str, value: Value) -> Result<()>;
}

/// Volatile storage for tests and dry runs.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    values: HashMap<String, Value>,
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: Value) -> Result<()> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

/// A single JSON object on disk, one member per key.
///
/// Every `set` rewrites the file through a temporary sibling and a rename, so
/// the document on disk is always a complete one.
#[derive(Debug)]
pub struct JsonFileStorage {
    path: PathBuf,
    values: Map<String, Value>,
}

impl JsonFileStorage {
    /// Opens `path`, treating a missing file as an empty store.
    pub fn open(path: &Path) -> Result<Self> {
        let values = if path.exists() {
            debug!("Reading history store: {}", path.display());
            let file = File::open(path)?;
            serde_json::from_reader(file)?
        } else {
            debug!("History store {} not found, starting empty", path.display());
            Map::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            values,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let mut file = File::create(&tmp)?;
        serde_json::to_writer_pretty(&mut file, &self.values)?;
        file.flush()?;
        file.sync_all()?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl Storage for JsonFileStorage {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: Value) -> Result<()> {
        self.values.insert(key.to_string(), value);
        self.flush()
    }
}

/// Typed access to yesterday's weather and the selection log.
///
/// Opened at the start of a cycle and closed at its end; the decision code
/// only ever touches persisted state through these methods.
#[derive(Debug)]
pub struct HistoryStore<S: Storage> {
    storage: S,
    retention: Option<usize>,
}

impl<S: Storage> HistoryStore<S> {
    /// Wraps `storage`. With `retention` set, the log is cut to that many
    /// entries on every prepend.
    pub fn open(storage: S, retention: Option<usize>) -> Self {
        Self { storage, retention }
    }

    pub fn last_weather(&self) -> Result<Option<LastWeather>> {
        self.read(LAST_WEATHER_KEY)
    }

    pub fn set_last_weather(&mut self, record: LastWeather) -> Result<()> {
        self.write(LAST_WEATHER_KEY, &record)
    }

    /// Past selections, newest first.
    pub fn histories(&self) -> Result<Vec<HistoryEntry>> {
        Ok(self.read(HISTORIES_KEY)?.unwrap_or_default())
    }

    pub fn prepend_history(&mut self, entry: HistoryEntry) -> Result<()> {
        let mut histories = self.histories()?;
        histories.insert(0, entry);
        if let Some(limit) = self.retention {
            histories.truncate(limit);
        }
        self.write(HISTORIES_KEY, &histories)
    }

    pub fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.storage.get(key)? {
            Some(Value::Null) | None => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
        }
    }

    pub fn write<T: Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        self.storage.set(key, serde_json::to_value(value)?)
    }

    /// Ends the cycle, handing the backend back.
    pub fn close(self) -> S {
        info!("History store closed");
        self.storage
    }
}
