//! The persisted index: one JSON document, loaded whole and replaced atomically.
//!
//! Reads are forward compatible (unknown fields are ignored). A file that does
//! not parse, or whose vectors disagree with the declared dimensionality, is
//! reported as corrupt and treated as an empty index: the index is derived
//! data and can always be rebuilt from the corpus.

use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use fd_lock::RwLock;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use notevec_core::{ChunkKey, Error, Fingerprint, Result};

pub const FORMAT_VERSION: u32 = 1;

/// One embedded chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub file: String,
    pub chunk_index: usize,
    pub text: String,
    /// Missing in indexes written before content hashing; such entries are always stale.
    #[serde(default)]
    pub fingerprint: Fingerprint,
    pub embedding: Vec<f32>,
}

impl IndexEntry {
    pub fn key(&self) -> ChunkKey {
        ChunkKey::new(self.file.clone(), self.chunk_index)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VectorIndex {
    #[serde(default)]
    pub format_version: u32,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub dimensions: usize,
    /// Unix seconds.
    #[serde(default, alias = "indexed_at")]
    pub last_built_at: Option<f64>,
    #[serde(default)]
    pub entries: Vec<IndexEntry>,
}

impl VectorIndex {
    pub fn empty(model: impl Into<String>, dimensions: usize) -> Self {
        Self { format_version: FORMAT_VERSION, model: model.into(), dimensions, last_built_at: None, entries: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn file_count(&self) -> usize {
        self.entries.iter().map(|e| e.file.as_str()).collect::<BTreeSet<_>>().len()
    }

    /// Replace the entries, keeping them sorted by key.
    pub fn set_entries(&mut self, entries: impl IntoIterator<Item = IndexEntry>) {
        self.entries = entries.into_iter().collect();
        self.entries.sort_by(|a, b| (a.file.as_str(), a.chunk_index).cmp(&(b.file.as_str(), b.chunk_index)));
    }

    pub fn touch(&mut self) {
        self.last_built_at = Some(unix_now());
    }

    /// Every vector must have the declared dimensionality.
    fn check_dimensions(&self) -> std::result::Result<(), String> {
        if let Some(bad) = self.entries.iter().find(|e| e.embedding.len() != self.dimensions) {
            return Err(format!(
                "entry {}::{} has {} dimensions, index declares {}",
                bad.file,
                bad.chunk_index,
                bad.embedding.len(),
                self.dimensions
            ));
        }
        Ok(())
    }
}

/// Merge two entry sets keyed by `(file, chunk_index)`; `new` wins on collision.
/// The result is sorted by key.
pub fn merge(existing: Vec<IndexEntry>, new: Vec<IndexEntry>) -> Vec<IndexEntry> {
    let mut by_key: BTreeMap<ChunkKey, IndexEntry> = existing.into_iter().map(|e| (e.key(), e)).collect();
    for entry in new {
        by_key.insert(entry.key(), entry);
    }
    by_key.into_values().collect()
}

pub(crate) fn unix_now() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs_f64()).unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOrigin {
    /// No file on disk.
    Missing,
    Loaded,
    /// The file exists but could not be used; the reason is kept for reporting.
    Corrupt(String),
}

#[derive(Debug, Clone)]
pub struct LoadedIndex {
    pub index: VectorIndex,
    pub origin: LoadOrigin,
}

#[derive(Debug, Clone)]
pub struct IndexStore {
    path: PathBuf,
}

impl IndexStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Load the index, never failing: a missing file yields an empty index and
    /// an unreadable one yields an empty index marked [`LoadOrigin::Corrupt`].
    pub fn load(&self) -> LoadedIndex {
        match self.try_load() {
            Ok(Some(index)) => {
                debug!(path = %self.path.display(), entries = index.len(), "index loaded");
                LoadedIndex { index, origin: LoadOrigin::Loaded }
            }
            Ok(None) => LoadedIndex { index: VectorIndex::empty("", 0), origin: LoadOrigin::Missing },
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring unreadable index, it will be rebuilt");
                LoadedIndex { index: VectorIndex::empty("", 0), origin: LoadOrigin::Corrupt(e.to_string()) }
            }
        }
    }

    /// Strict load. `Ok(None)` when there is no file.
    pub fn try_load(&self) -> Result<Option<VectorIndex>> {
        let bytes = match fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.corruption(e.to_string())),
        };
        let index: VectorIndex = serde_json::from_slice(&bytes).map_err(|e| self.corruption(e.to_string()))?;
        index.check_dimensions().map_err(|reason| self.corruption(reason))?;
        Ok(Some(index))
    }

    /// Write to a temporary file beside the target, fsync, then rename over it.
    /// Readers see either the old index or the new one, never a partial write.
    pub fn save(&self, index: &VectorIndex) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;
        let mut tmp = NamedTempFile::new_in(&dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer(&mut writer, index)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| Error::Io(e.error))?;
        debug!(path = %self.path.display(), entries = index.len(), "index saved");
        Ok(())
    }

    /// Take the exclusive build lock `<index>.lock`.
    pub fn lock(&self) -> Result<BuildLock> {
        BuildLock::acquire(lock_path(&self.path))
    }

    fn corruption(&self, reason: String) -> Error {
        Error::CacheCorruption { path: self.path.clone(), reason }
    }
}

fn lock_path(index: &Path) -> PathBuf {
    let mut name: OsString = index.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

/// Exclusive OS file lock on `<index>.lock`, held until dropped.
///
/// The lock dies with the file handle, so a build killed mid-way leaves a
/// lock file behind but never a held lock.
pub struct BuildLock {
    path: PathBuf,
    _file: RwLock<File>,
}

impl BuildLock {
    fn acquire(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().read(true).write(true).create(true).truncate(false).open(&path)?;
        let mut lock = RwLock::new(file);
        match lock.try_write() {
            // The guard borrows `lock`; forgetting it leaves the lock held until the handle closes.
            Ok(guard) => std::mem::forget(guard),
            Err(e) if e.kind() == ErrorKind::WouldBlock => return Err(Error::Locked(path)),
            Err(e) => return Err(e.into()),
        }
        debug!(path = %path.display(), "build lock acquired");
        Ok(Self { path, _file: lock })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for BuildLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildLock").field("path", &self.path).finish()
    }
}
