//! Explicit dataset memoization keyed by content hash.
//!
//! The cache never expires entries on its own. Callers invalidate a key or
//! clear the whole cache when they know the data changed; editing a file
//! changes its hash, so stale content is never served for new bytes.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// SHA-256 of a dataset's bytes, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn for_bytes(bytes: &[u8]) -> Self {
        CacheKey(hex::encode(Sha256::digest(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex chars, for logs.
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hit/miss counters and current size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Loaded datasets keyed by content hash.
pub struct DatasetCache<T> {
    entries: Mutex<HashMap<CacheKey, Arc<T>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<T> Default for DatasetCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DatasetCache<T> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the cached value for these bytes, or parse and insert it.
    ///
    /// The loader runs outside the lock. If two callers race on the same
    /// key, the first insert wins and both receive the same `Arc`.
    pub fn get_or_insert_with<E, F>(&self, bytes: &[u8], loader: F) -> Result<(CacheKey, Arc<T>), E>
    where
        F: FnOnce(&[u8]) -> Result<T, E>,
    {
        let key = CacheKey::for_bytes(bytes);
        if let Some(hit) = self.lookup(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(key = key.short(), "dataset cache hit");
            return Ok((key, hit));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(key = key.short(), "dataset cache miss");
        let value = Arc::new(loader(bytes)?);
        let mut entries = self.lock();
        let stored = entries.entry(key.clone()).or_insert(value);
        Ok((key, Arc::clone(stored)))
    }

    /// Read a file and go through `get_or_insert_with`.
    pub fn get_or_load<E, F>(&self, path: &Path, loader: F) -> Result<(CacheKey, Arc<T>), E>
    where
        E: From<std::io::Error>,
        F: FnOnce(&[u8]) -> Result<T, E>,
    {
        let bytes = std::fs::read(path)?;
        self.get_or_insert_with(&bytes, loader)
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.lock().contains_key(key)
    }

    /// Drop one entry. Returns whether it was present.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.lock().remove(key).is_some()
    }

    /// Drop every entry. Counters are kept.
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    fn lookup(&self, key: &CacheKey) -> Option<Arc<T>> {
        self.lock().get(key).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, Arc<T>>> {
        // A panicking loader never holds the lock, so poisoning only means
        // another thread panicked mid-insert; the map is still consistent.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn count_lines(bytes: &[u8]) -> Result<usize, std::io::Error> {
        Ok(bytes.iter().filter(|&&b| b == b'\n').count())
    }

    #[test]
    fn key_is_content_hash() {
        let a = CacheKey::for_bytes(b"abc");
        let b = CacheKey::for_bytes(b"abc");
        let c = CacheKey::for_bytes(b"abd");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), 64);
        assert_eq!(a.short().len(), 12);
        assert_eq!(
            a.as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn second_load_hits() {
        let cache: DatasetCache<usize> = DatasetCache::new();
        let (k1, v1) = cache.get_or_insert_with(b"a\nb\n", count_lines).unwrap();
        let (k2, v2) = cache
            .get_or_insert_with(b"a\nb\n", |_| -> Result<usize, std::io::Error> {
                panic!("loader must not run on a hit")
            })
            .unwrap();
        assert_eq!(k1, k2);
        assert!(Arc::ptr_eq(&v1, &v2));
        assert_eq!(*v1, 2);
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 1,
                misses: 1,
                entries: 1
            }
        );
    }

    #[test]
    fn invalidate_forces_reload() {
        let cache: DatasetCache<usize> = DatasetCache::new();
        let (key, _) = cache.get_or_insert_with(b"x\n", count_lines).unwrap();
        assert!(cache.contains(&key));
        assert!(cache.invalidate(&key));
        assert!(!cache.invalidate(&key));
        assert!(cache.is_empty());
        cache.get_or_insert_with(b"x\n", count_lines).unwrap();
        assert_eq!(cache.stats().misses, 2);
    }

    #[test]
    fn clear_drops_everything() {
        let cache: DatasetCache<usize> = DatasetCache::new();
        cache.get_or_insert_with(b"1\n", count_lines).unwrap();
        cache.get_or_insert_with(b"2\n", count_lines).unwrap();
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn loader_error_is_not_cached() {
        let cache: DatasetCache<usize> = DatasetCache::new();
        let err = cache.get_or_insert_with(b"bad", |_| {
            Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "nope"))
        });
        assert!(err.is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn file_edits_change_the_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.csv");
        std::fs::write(&path, "a\n").unwrap();

        let cache: DatasetCache<usize> = DatasetCache::new();
        let (k1, v1) = cache.get_or_load(&path, count_lines).unwrap();

        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(b"b\n").unwrap();
        drop(f);

        let (k2, v2) = cache.get_or_load(&path, count_lines).unwrap();
        assert_ne!(k1, k2);
        assert_eq!((*v1, *v2), (1, 2));
    }

    #[test]
    fn missing_file_is_io_error() {
        let cache: DatasetCache<usize> = DatasetCache::new();
        let result = cache.get_or_load(Path::new("/nonexistent/rows.csv"), count_lines);
        assert!(result.is_err());
    }
}
