//! Durable, file-per-key cache of accepted generations.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::key::CacheKey;
use crate::error::{ForgeError, Result};
use crate::telemetry;

const ENTRY_EXTENSION: &str = "json";

/// One accepted generation, persisted as plain JSON.
///
/// Only strings and a timestamp are stored, so reading an entry never
/// reconstructs anything richer than this struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: CacheKey,
    /// Accepted, cleaned MCQ text.
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub model: String,
    pub subject: String,
}

impl CacheEntry {
    pub fn new(
        key: CacheKey,
        text: impl Into<String>,
        model: impl Into<String>,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            key,
            text: text.into(),
            created_at: Utc::now(),
            model: model.into(),
            subject: subject.into(),
        }
    }
}

/// Directory-backed cache store.
///
/// Each entry lives at `<dir>/<digest>.json`. Writes go to a uniquely named
/// temporary file in the same directory and are renamed over the target, so
/// readers see either the previous entry or the new one, never a torn file.
/// Writers to different keys touch different paths and never contend.
///
/// An optional in-memory layer (moka) fronts the directory for repeated
/// lookups within a run.
pub struct CacheStore {
    dir: PathBuf,
    memory: Option<moka::sync::Cache<CacheKey, CacheEntry>>,
}

impl CacheStore {
    /// Open (creating if needed) a store rooted at `dir`, without a memory layer.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        Self::with_memory(dir, 0)
    }

    /// Open a store with an in-memory layer of `memory_entries` (0 disables it).
    pub fn with_memory(dir: impl Into<PathBuf>, memory_entries: u64) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| ForgeError::io(&dir, e))?;
        let memory = (memory_entries > 0).then(|| moka::sync::Cache::new(memory_entries));
        Ok(Self { dir, memory })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{key}.{ENTRY_EXTENSION}"))
    }

    /// Look up an entry.
    ///
    /// Missing, unreadable and corrupt entries are all a miss. Corruption is
    /// logged and the run carries on.
    pub fn lookup(&self, key: &CacheKey) -> Option<CacheEntry> {
        if let Some(memory) = &self.memory
            && let Some(entry) = memory.get(key)
        {
            metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
            return Some(entry);
        }

        let path = self.entry_path(key);
        match read_entry(&path) {
            Ok(Some(entry)) if entry.key == *key => {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
                if let Some(memory) = &self.memory {
                    memory.insert(key.clone(), entry.clone());
                }
                Some(entry)
            }
            Ok(Some(entry)) => {
                warn!(
                    path = %path.display(),
                    stored = %entry.key,
                    "cache entry key mismatch, treating as miss"
                );
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
                None
            }
            Ok(None) => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
                None
            }
            Err(e) => {
                warn!(error = %e, "unreadable cache entry, treating as miss");
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
                None
            }
        }
    }

    /// Persist `entry` under `key` atomically (temp file + rename).
    ///
    /// Concurrent stores to the same key resolve to whichever rename lands
    /// last.
    pub fn store(&self, key: &CacheKey, entry: &CacheEntry) -> Result<()> {
        let json = serde_json::to_vec_pretty(entry)?;
        let target = self.entry_path(key);

        let mut tmp = tempfile::Builder::new()
            .prefix(".tmp-")
            .suffix(".partial")
            .tempfile_in(&self.dir)
            .map_err(|e| ForgeError::io(&self.dir, e))?;
        tmp.write_all(&json)
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| ForgeError::io(tmp.path(), e))?;
        tmp.persist(&target)
            .map_err(|e| ForgeError::io(&target, e.error))?;

        if let Some(memory) = &self.memory {
            memory.insert(key.clone(), entry.clone());
        }
        metrics::counter!(telemetry::CACHE_WRITES_TOTAL).increment(1);
        debug!(key = %key, path = %target.display(), "cache entry stored");
        Ok(())
    }

    /// Remove every entry whose stored metadata matches `predicate`.
    ///
    /// Temporary files of in-flight writes are never touched; an entry
    /// renamed into place after the scan simply survives. Corrupt entries
    /// are skipped. Returns the number of entries removed.
    pub fn invalidate<F>(&self, predicate: F) -> Result<usize>
    where
        F: Fn(&CacheEntry) -> bool,
    {
        let mut removed = 0;
        for path in self.entry_paths()? {
            let entry = match read_entry(&path) {
                Ok(Some(entry)) => entry,
                Ok(None) => continue,
                Err(e) => {
                    debug!(error = %e, "skipping unreadable cache entry during invalidation");
                    continue;
                }
            };
            if !predicate(&entry) {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(ForgeError::io(&path, e)),
            }
            if let Some(memory) = &self.memory {
                memory.invalidate(&entry.key);
            }
        }
        Ok(removed)
    }

    /// Remove all entries belonging to `subject` (case-insensitive).
    pub fn invalidate_subject(&self, subject: &str) -> Result<usize> {
        self.invalidate(|entry| entry.subject.eq_ignore_ascii_case(subject))
    }

    /// Remove every entry file, readable or not. Returns the number removed.
    pub fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        for path in self.entry_paths()? {
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(ForgeError::io(&path, e)),
            }
        }
        if let Some(memory) = &self.memory {
            memory.invalidate_all();
        }
        Ok(removed)
    }

    /// Number of entry files on disk.
    pub fn len(&self) -> Result<usize> {
        Ok(self.entry_paths()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Paths of committed entry files. Temporary files are excluded.
    fn entry_paths(&self) -> Result<Vec<PathBuf>> {
        let read_dir = match std::fs::read_dir(&self.dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ForgeError::io(&self.dir, e)),
        };
        let mut paths = Vec::new();
        for dirent in read_dir {
            let path = dirent.map_err(|e| ForgeError::io(&self.dir, e))?.path();
            let is_entry = path.extension().is_some_and(|ext| ext == ENTRY_EXTENSION)
                && path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .is_some_and(|s| CacheKey::from_digest(s).is_some());
            if is_entry {
                paths.push(path);
            }
        }
        Ok(paths)
    }
}

/// Read one entry. `Ok(None)` when the file does not exist.
fn read_entry(path: &Path) -> Result<Option<CacheEntry>> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ForgeError::io(path, e)),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| ForgeError::CacheCorrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}
