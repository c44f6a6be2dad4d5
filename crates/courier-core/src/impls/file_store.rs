//! JsonFileCounterStore - counters persisted as one JSON object on disk.
//!
//! Writes go to a sibling temp file first and are renamed into place, so a
//! crash mid-write leaves the previous counters intact.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::domain::StoreError;
use crate::ports::CounterStore;

pub struct JsonFileCounterStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    guard: Mutex<()>,
}

impl JsonFileCounterStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, u64>, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(err.into()),
        }
    }

    fn save(&self, counters: &BTreeMap<String, u64>) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, serde_json::to_vec_pretty(counters)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl CounterStore for JsonFileCounterStore {
    fn get(&self, key: &str) -> Result<Option<u64>, StoreError> {
        let _guard = self.guard.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(self.load()?.get(key).copied())
    }

    fn set(&self, key: &str, value: u64) -> Result<(), StoreError> {
        let _guard = self.guard.lock().map_err(|_| StoreError::Poisoned)?;
        let mut counters = self.load()?;
        counters.insert(key.to_string(), value);
        self.save(&counters)
    }
}
