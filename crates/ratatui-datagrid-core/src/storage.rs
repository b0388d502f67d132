//! Key-value persistence for column widths.
//!
//! The width map is the only state shared between grid instances. Instances sharing a namespace
//! key overwrite each other; the last write wins.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::fs::File;
use std::io::BufReader;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::RwLock;

use serde::Deserialize;
use serde::Serialize;

use crate::column::ColumnId;

/// Storage key used for column widths unless configured otherwise.
pub const DEFAULT_STORAGE_NAMESPACE: &str = "datagrid-col-sizing";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backend is unusable (poisoned lock, unreadable file layout).
    #[error("storage corrupted: {0}")]
    Corruption(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// A string key-value store.
pub trait StorageBackend: Send + Sync {
    fn name(&self) -> &str;

    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    fn set(&self, key: &str, value: String) -> StorageResult<()>;

    fn remove(&self, key: &str) -> StorageResult<()>;
}

#[derive(Default)]
pub struct MemoryStorage {
    data: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: HashMap<String, String>) -> Self {
        Self {
            data: RwLock::new(entries),
        }
    }
}

fn poisoned<T>(_: T) -> StorageError {
    StorageError::Corruption("lock poisoned".to_string())
}

impl StorageBackend for MemoryStorage {
    fn name(&self) -> &str {
        "MemoryStorage"
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let data = self.data.read().map_err(poisoned)?;
        Ok(data.get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> StorageResult<()> {
        let mut data = self.data.write().map_err(poisoned)?;
        data.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let mut data = self.data.write().map_err(poisoned)?;
        data.remove(key);
        Ok(())
    }
}

impl fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.data.read().map(|d| d.len()).unwrap_or(0);
        f.debug_struct("MemoryStorage")
            .field("entries", &entries)
            .finish()
    }
}

/// All keys live in one JSON object on disk. Writes go to `{path}.tmp` and are renamed over the
/// target, so a crash never leaves a half-written file.
pub struct FileStorage {
    path: PathBuf,
    lock: RwLock<()>,
}

impl FileStorage {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: RwLock::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone();
        tmp.set_extension("json.tmp");
        tmp
    }

    fn read_all(&self) -> StorageResult<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let reader = BufReader::new(File::open(&self.path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Entries to rewrite. An unparseable file holds nothing worth keeping and is replaced.
    fn read_for_update(&self) -> StorageResult<BTreeMap<String, String>> {
        match self.read_all() {
            Err(StorageError::Serialization(err)) => {
                tracing::debug!(
                    path = %self.path.display(),
                    %err,
                    "discarding unparseable grid state file"
                );
                Ok(BTreeMap::new())
            }
            other => other,
        }
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp_path = self.temp_path();
        {
            let mut writer = BufWriter::new(File::create(&tmp_path)?);
            serde_json::to_writer_pretty(&mut writer, entries)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        tracing::debug!(path = %self.path.display(), entries = entries.len(), "saved grid state");
        Ok(())
    }
}

impl StorageBackend for FileStorage {
    fn name(&self) -> &str {
        "FileStorage"
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let _guard = self.lock.read().map_err(poisoned)?;
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: String) -> StorageResult<()> {
        let _guard = self.lock.write().map_err(poisoned)?;
        let mut entries = self.read_for_update()?;
        entries.insert(key.to_string(), value);
        self.write_all(&entries)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let _guard = self.lock.write().map_err(poisoned)?;
        let mut entries = self.read_for_update()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

impl fmt::Debug for FileStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStorage")
            .field("path", &self.path)
            .finish()
    }
}

/// The persisted resize snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedWidths {
    pub column_widths: BTreeMap<ColumnId, u32>,
    pub is_resizing: bool,
}

/// Reads and writes [`PersistedWidths`] under one namespace key.
#[derive(Clone)]
pub struct ColumnWidthStore {
    backend: Arc<dyn StorageBackend>,
    namespace: String,
}

impl ColumnWidthStore {
    pub fn new(backend: Arc<dyn StorageBackend>, namespace: impl Into<String>) -> Self {
        Self {
            backend,
            namespace: namespace.into(),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()), DEFAULT_STORAGE_NAMESPACE)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Loads the saved widths.
    ///
    /// Absent or unparseable data is "nothing saved". Entries that are null, negative or not
    /// numbers are pruned individually.
    pub fn load(&self) -> StorageResult<Option<PersistedWidths>> {
        let Some(raw) = self.backend.get(&self.namespace)? else {
            return Ok(None);
        };
        let value: serde_json::Value = match serde_json::from_str(&raw) {
            Ok(v) => v,
            Err(err) => {
                tracing::debug!(namespace = %self.namespace, error = %err, "ignoring malformed saved widths");
                return Ok(None);
            }
        };
        let Some(widths) = value.get("columnWidths").and_then(|w| w.as_object()) else {
            tracing::debug!(namespace = %self.namespace, "saved widths have no width map");
            return Ok(None);
        };

        let mut column_widths = BTreeMap::new();
        for (id, width) in widths {
            match width.as_f64() {
                Some(w) if w.is_finite() && w >= 0.0 && w <= u32::MAX as f64 => {
                    column_widths.insert(ColumnId::new(id.clone()), w.round() as u32);
                }
                _ => tracing::debug!(column_id = %id, value = %width, "pruning invalid saved width"),
            }
        }
        Ok(Some(PersistedWidths {
            column_widths,
            is_resizing: false,
        }))
    }

    pub fn store(&self, widths: &PersistedWidths) -> StorageResult<()> {
        let raw = serde_json::to_string(widths)?;
        self.backend.set(&self.namespace, raw)
    }

    pub fn clear(&self) -> StorageResult<()> {
        self.backend.remove(&self.namespace)
    }
}

impl fmt::Debug for ColumnWidthStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnWidthStore")
            .field("backend", &self.backend.name())
            .field("namespace", &self.namespace)
            .finish()
    }
}
