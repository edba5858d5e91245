use std::collections::BTreeMap;

use rkyv::{Archive, Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub enum StoreValue {
    Int(i32),
    Float(f32),
    Text(String),
}

impl StoreValue {
    pub fn kind(&self) -> &'static str {
        match self {
            StoreValue::Int(_) => "int",
            StoreValue::Float(_) => "float",
            StoreValue::Text(_) => "text",
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored value for {key} could not be decoded")]
    Decode { key: String },
    #[error("value for {key} could not be encoded")]
    Encode { key: String },
    #[error("stored value for {key} is {found}, expected {expected}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Durable key/value progress storage.
///
/// Calls are synchronous and atomic per key. Writing the same value twice
/// leaves the store unchanged.
pub trait ProgressStore {
    fn has(&self, key: &str) -> bool;
    fn get(&self, key: &str) -> Result<Option<StoreValue>, StoreError>;
    fn set(&mut self, key: &str, value: StoreValue) -> Result<(), StoreError>;
    fn delete(&mut self, key: &str) -> Result<(), StoreError>;

    /// Every key currently held, in no particular order.
    fn keys(&self) -> Vec<String>;

    /// Push buffered writes to durable storage. In-memory stores have nothing to do.
    fn flush(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    fn try_int(&self, key: &str) -> Result<Option<i32>, StoreError> {
        match self.get(key)? {
            None => Ok(None),
            Some(StoreValue::Int(value)) => Ok(Some(value)),
            Some(other) => Err(StoreError::TypeMismatch {
                key: key.to_string(),
                expected: "int",
                found: other.kind(),
            }),
        }
    }

    fn try_float(&self, key: &str) -> Result<Option<f32>, StoreError> {
        match self.get(key)? {
            None => Ok(None),
            Some(StoreValue::Float(value)) => Ok(Some(value)),
            Some(other) => Err(StoreError::TypeMismatch {
                key: key.to_string(),
                expected: "float",
                found: other.kind(),
            }),
        }
    }

    fn try_string(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.get(key)? {
            None => Ok(None),
            Some(StoreValue::Text(value)) => Ok(Some(value)),
            Some(other) => Err(StoreError::TypeMismatch {
                key: key.to_string(),
                expected: "text",
                found: other.kind(),
            }),
        }
    }

    fn get_int(&self, key: &str, default: i32) -> i32 {
        self.try_int(key).ok().flatten().unwrap_or(default)
    }

    fn get_float(&self, key: &str, default: f32) -> f32 {
        self.try_float(key).ok().flatten().unwrap_or(default)
    }

    fn get_string(&self, key: &str, default: &str) -> String {
        self.try_string(key)
            .ok()
            .flatten()
            .unwrap_or_else(|| default.to_string())
    }

    fn set_int(&mut self, key: &str, value: i32) -> Result<(), StoreError> {
        self.set(key, StoreValue::Int(value))
    }

    fn set_float(&mut self, key: &str, value: f32) -> Result<(), StoreError> {
        self.set(key, StoreValue::Float(value))
    }

    fn set_string(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.set(key, StoreValue::Text(value.to_string()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, StoreValue>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (String, StoreValue)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &StoreValue)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ProgressStore for MemoryStore {
    fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn get(&self, key: &str) -> Result<Option<StoreValue>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: StoreValue) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_getters_fall_back_on_missing_or_mismatched() {
        let mut store = MemoryStore::new();
        store.set_int("hints", 3).unwrap();
        store.set_string("name", "").unwrap();
        assert_eq!(store.get_int("hints", -1), 3);
        assert_eq!(store.get_int("missing", -1), -1);
        assert_eq!(store.get_float("hints", 2.5), 2.5);
        assert!(matches!(
            store.try_float("hints"),
            Err(StoreError::TypeMismatch { expected: "float", found: "int", .. })
        ));
        assert!(store.has("name"));
    }

    #[test]
    fn repeated_writes_are_idempotent() {
        let mut store = MemoryStore::new();
        store.set_float("timer", 12.5).unwrap();
        store.set_float("timer", 12.5).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("timer").unwrap(), Some(StoreValue::Float(12.5)));
        store.delete("timer").unwrap();
        store.delete("timer").unwrap();
        assert!(store.is_empty());
    }
}
