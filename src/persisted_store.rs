use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use jigsaw_kit_core::{decode, encode, ProgressStore, StoreError, StoreValue};
use rkyv::{Archive, Deserialize, Serialize};
use tracing::{debug, info, warn};

pub const STORE_FILE_VERSION: u32 = 1;

#[derive(Clone, Debug, Archive, Serialize, Deserialize)]
struct StoreEntry {
    key: String,
    value: StoreValue,
}

#[derive(Clone, Debug, Archive, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    entries: Vec<StoreEntry>,
}

/// Progress store cached in memory and written to a single archive file on
/// `flush`. An unreadable or outdated file opens as an empty store.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, StoreValue>,
    dirty: bool,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = match fs::read(&path) {
            Ok(bytes) => load_entries(&path, &bytes),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no store file yet");
                BTreeMap::new()
            }
            Err(err) => return Err(err.into()),
        };
        Ok(Self {
            path,
            entries,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn load_entries(path: &Path, bytes: &[u8]) -> BTreeMap<String, StoreValue> {
    let Some(file) = decode::<StoreFile>(bytes) else {
        warn!(path = %path.display(), "store file unreadable, starting empty");
        return BTreeMap::new();
    };
    if file.version != STORE_FILE_VERSION {
        warn!(
            path = %path.display(),
            version = file.version,
            "store file version mismatch, starting empty"
        );
        return BTreeMap::new();
    }
    file.entries
        .into_iter()
        .map(|entry| (entry.key, entry.value))
        .collect()
}

impl ProgressStore for FileStore {
    fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn get(&self, key: &str) -> Result<Option<StoreValue>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: StoreValue) -> Result<(), StoreError> {
        if self.entries.get(key) != Some(&value) {
            self.entries.insert(key.to_string(), value);
            self.dirty = true;
        }
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), StoreError> {
        if self.entries.remove(key).is_some() {
            self.dirty = true;
        }
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        if !self.dirty {
            return Ok(());
        }
        let file = StoreFile {
            version: STORE_FILE_VERSION,
            entries: self
                .entries
                .iter()
                .map(|(key, value)| StoreEntry {
                    key: key.clone(),
                    value: value.clone(),
                })
                .collect(),
        };
        let bytes = encode(&file).ok_or_else(|| StoreError::Encode {
            key: self.path.display().to_string(),
        })?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        // write beside the target then rename so a crash never leaves half a file
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, &self.path)?;
        self.dirty = false;
        debug!(path = %self.path.display(), entries = self.entries.len(), "store flushed");
        Ok(())
    }
}
