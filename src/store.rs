use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

/// String-keyed durable storage. Every operation is synchronous and never
/// fails observably; backends log and swallow their own I/O errors.
pub trait PersistentStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String);
    fn clear(&mut self, key: &str);

    fn set_many(&mut self, entries: Vec<(&str, String)>) {
        for (key, value) in entries {
            self.set(key, value);
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistentStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        self.values.insert(key.to_string(), value);
    }

    fn clear(&mut self, key: &str) {
        self.values.remove(key);
    }
}

/// A flat JSON object of string values kept in memory and rewritten to disk
/// after every mutation.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match read_store_file(&path) {
            Ok(values) => values,
            Err(err) => {
                warn!(path = %path.display(), "state file unusable, starting empty: {err:#}");
                BTreeMap::new()
            }
        };
        Self { path, values }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_back(&self) {
        if let Err(err) = write_store_file(&self.path, &self.values) {
            warn!(path = %self.path.display(), "state write dropped: {err:#}");
        }
    }
}

impl PersistentStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        self.values.insert(key.to_string(), value);
        self.write_back();
    }

    fn clear(&mut self, key: &str) {
        if self.values.remove(key).is_some() {
            self.write_back();
        }
    }

    fn set_many(&mut self, entries: Vec<(&str, String)>) {
        for (key, value) in entries {
            self.values.insert(key.to_string(), value);
        }
        self.write_back();
    }
}

fn read_store_file(path: &Path) -> Result<BTreeMap<String, String>> {
    if !path.exists() {
        debug!(path = %path.display(), "no state file yet");
        return Ok(BTreeMap::new());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("unable to read state file {}", path.display()))?;
    serde_json::from_str(&content).map_err(|err| {
        let line = err.line();
        let column = err.column();
        anyhow::anyhow!("invalid JSON at line {line}, column {column}: {err}")
    })
}

fn write_store_file(path: &Path, values: &BTreeMap<String, String>) -> Result<()> {
    let text = serde_json::to_string_pretty(values)?;
    fs::write(path, format!("{text}\n"))
        .with_context(|| format!("unable to write state file {}", path.display()))?;
    Ok(())
}
