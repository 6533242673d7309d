use crate::error::DurabilityError;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Small key-value store that survives process death
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, DurabilityError>;

    fn set(&self, key: &str, value: Value) -> Result<(), DurabilityError>;

    fn remove(&self, key: &str) -> Result<(), DurabilityError>;

    /// Apply several writes at once; `None` removes the key. Stores that
    /// persist should land the whole batch in a single write.
    fn apply(&self, updates: &[(String, Option<Value>)]) -> Result<(), DurabilityError> {
        for (key, value) in updates {
            match value {
                Some(value) => self.set(key, value.clone())?,
                None => self.remove(key)?,
            }
        }
        Ok(())
    }
}

fn apply_to(values: &mut BTreeMap<String, Value>, updates: &[(String, Option<Value>)]) -> bool {
    let mut changed = false;
    for (key, value) in updates {
        changed |= match value {
            Some(value) => values.insert(key.clone(), value.clone()).as_ref() != Some(value),
            None => values.remove(key).is_some(),
        };
    }
    changed
}

/// Process-local preferences, for tests and ephemeral runs
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    values: Mutex<BTreeMap<String, Value>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get(&self, key: &str) -> Result<Option<Value>, DurabilityError> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), DurabilityError> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), DurabilityError> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.remove(key);
        Ok(())
    }

    fn apply(&self, updates: &[(String, Option<Value>)]) -> Result<(), DurabilityError> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        apply_to(&mut values, updates);
        Ok(())
    }
}

/// Preferences kept in a JSON object on disk.
///
/// Every write replaces the file through a temp file and rename.
#[derive(Debug)]
pub struct FilePreferences {
    path: PathBuf,
    values: Mutex<BTreeMap<String, Value>>,
}

impl FilePreferences {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DurabilityError> {
        let path = path.as_ref().to_path_buf();
        let values = match std::fs::read(&path) {
            Ok(bytes) if bytes.is_empty() => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, values: &BTreeMap<String, Value>) -> Result<(), DurabilityError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(values)?)?;
        std::fs::rename(&tmp, &self.path)?;

        debug!("Saved preferences to {}", self.path.display());
        Ok(())
    }
}

impl PreferenceStore for FilePreferences {
    fn get(&self, key: &str) -> Result<Option<Value>, DurabilityError> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), DurabilityError> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value);
        self.flush(&values)
    }

    fn remove(&self, key: &str) -> Result<(), DurabilityError> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        if values.remove(key).is_some() {
            self.flush(&values)?;
        }
        Ok(())
    }

    fn apply(&self, updates: &[(String, Option<Value>)]) -> Result<(), DurabilityError> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        let mut next = values.clone();
        if !apply_to(&mut next, updates) {
            return Ok(());
        }
        self.flush(&next)?;
        *values = next;
        Ok(())
    }
}
