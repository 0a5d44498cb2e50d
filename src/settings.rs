//! Settings storage for the chat client.
//!
//! The orchestrator reads three scalar preferences at the start of every
//! submission: the access token and one model identifier per channel.
//! Storage is injected behind [`SettingsStore`] so tests can run against
//! an in-memory map while the binary persists to a JSON file.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::{from_reader, to_writer_pretty};

use crate::error::{Error, Result};

/// Settings key for the access token.
pub const KEY_HF_TOKEN: &str = "hf_token";

/// Settings key for the main-channel model identifier.
pub const KEY_MAIN_MODEL: &str = "main_model";

/// Settings key for the assistant-channel model identifier.
pub const KEY_ASSISTANT_MODEL: &str = "assistant_model";

/// Model requested when no model setting is stored.
pub const DEFAULT_MODEL: &str = "HuggingFaceTB/SmolLM3-3B";

/// Key-value storage for string settings.
pub trait SettingsStore: Send + Sync {
    /// Returns the stored value for `key`, if any.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`.
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// The settings in effect for one submission.
///
/// Resolved once per submission, never cached across submissions, so a
/// mid-session settings change takes effect on the next message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// Access token forwarded to the endpoint; `None` when unset or empty.
    pub hf_token: Option<String>,
    /// Model identifier for the main channel.
    pub main_model: String,
    /// Model identifier for the assistant channel.
    pub assistant_model: String,
}

impl Settings {
    /// Reads the current settings from a store, applying defaults for
    /// absent keys. An empty stored token counts as unset.
    pub fn load(store: &dyn SettingsStore) -> Self {
        let hf_token = store.get(KEY_HF_TOKEN).filter(|token| !token.is_empty());
        let main_model = store
            .get(KEY_MAIN_MODEL)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let assistant_model = store
            .get(KEY_ASSISTANT_MODEL)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        Settings {
            hf_token,
            main_model,
            assistant_model,
        }
    }
}

/// An in-memory settings store.
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySettings {
    /// Creates an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: &str) -> Option<String> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// A settings store persisted as a JSON object on disk.
///
/// Reads are served from memory; every write rewrites the file.
#[derive(Debug)]
pub struct FileSettings {
    path: PathBuf,
    values: Mutex<HashMap<String, String>>,
}

impl FileSettings {
    /// Opens the store at `path`, loading existing values. A missing file
    /// starts the store empty; it is created on the first write.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = if path.exists() {
            let file = File::open(&path)
                .map_err(|err| Error::io("failed to open settings file", err))?;
            let reader = BufReader::new(file);
            from_reader(reader).map_err(|err| {
                Error::serialization("failed to parse settings file", Some(Box::new(err)))
            })?
        } else {
            HashMap::new()
        };
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    /// Returns the path backing this store.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &HashMap<String, String>) -> Result<()> {
        let file = File::create(&self.path)
            .map_err(|err| Error::io("failed to create settings file", err))?;
        let writer = BufWriter::new(file);
        to_writer_pretty(writer, values).map_err(|err| {
            Error::serialization("failed to serialize settings", Some(Box::new(err)))
        })
    }
}

impl SettingsStore for FileSettings {
    fn get(&self, key: &str) -> Option<String> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value.to_string());
        self.persist(&values)
    }
}
