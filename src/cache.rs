//! Disk-backed memoisation of computed tables
//!
//! Entries live at `<root>/<key>.msgpack` (with the key escaped to a portable
//! file name) and are addressed by the key string
//! alone. Whatever derives the key must capture every argument that changes
//! the result: two calls that map to the same key share one entry, even if
//! their inputs differ.
//!
//! # Example
//!
//! ```ignore
//! let cache = DiskCache::new(".histaug-cache");
//! let table = cache
//!     .memoize(|_: &()| "results".to_string(), |_: &()| load_results(&source, "histaug"))
//!     .call(&())?;
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File extension of cache entries
pub const ENTRY_EXTENSION: &str = "msgpack";

/// Errors that can occur while reading or writing cache entries
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to encode cache entry '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: rmp_serde::encode::Error,
    },

    #[error("Failed to decode cache entry '{key}': {source}")]
    Decode {
        key: String,
        #[source]
        source: rmp_serde::decode::Error,
    },
}

/// Whether existing entries may satisfy a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Return a persisted entry when one exists
    #[default]
    Reuse,
    /// Always recompute and overwrite
    Refresh,
}

/// Directory-backed key/value store for serialized results
#[derive(Debug, Clone)]
pub struct DiskCache {
    root: PathBuf,
    policy: CachePolicy,
}

impl DiskCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            policy: CachePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Cache rooted at a subdirectory named after `scope`, same policy.
    pub fn scoped(&self, scope: &str) -> Self {
        Self {
            root: self.root.join(escape_key(scope)),
            policy: self.policy,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// File that holds the entry for `key`.
    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", escape_key(key), ENTRY_EXTENSION))
    }

    /// Read an entry, `None` if it was never written.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        let path = self.entry_path(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(CacheError::Io { path, source }),
        };
        rmp_serde::from_slice(&bytes)
            .map(Some)
            .map_err(|source| CacheError::Decode {
                key: key.to_string(),
                source,
            })
    }

    /// Persist an entry, replacing any previous value.
    pub fn store<T: Serialize>(&self, key: &str, value: &T) -> Result<(), CacheError> {
        fs::create_dir_all(&self.root).map_err(|source| CacheError::Io {
            path: self.root.clone(),
            source,
        })?;

        let bytes = rmp_serde::to_vec_named(value).map_err(|source| CacheError::Encode {
            key: key.to_string(),
            source,
        })?;

        // Write then rename so readers never observe a partial entry
        let path = self.entry_path(key);
        let tmp = path.with_extension(format!("{}.tmp{}", ENTRY_EXTENSION, std::process::id()));
        fs::write(&tmp, bytes).map_err(|source| CacheError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| CacheError::Io { path, source })
    }

    /// Return the entry for `key`, computing and persisting it on a miss.
    pub fn get_or_compute<T, E, F>(&self, key: &str, compute: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Result<T, E>,
    {
        if self.policy == CachePolicy::Reuse {
            if let Some(hit) = self.load(key)? {
                tracing::debug!("Cache hit for '{}'", key);
                return Ok(hit);
            }
        }

        tracing::debug!("Cache miss for '{}', computing", key);
        let value = compute()?;
        self.store(key, &value)?;
        Ok(value)
    }

    /// Wrap an operation so calls are served from this cache.
    ///
    /// `name` maps the call's arguments to the entry key.
    pub fn memoize<N, F>(&self, name: N, op: F) -> Memoized<'_, N, F> {
        Memoized {
            cache: self,
            name,
            op,
        }
    }
}

/// An operation bound to a cache and a key-naming function
pub struct Memoized<'c, N, F> {
    cache: &'c DiskCache,
    name: N,
    op: F,
}

impl<N, F> Memoized<'_, N, F> {
    /// Run the operation for `args`, or return its persisted result.
    pub fn call<A, T, E>(&self, args: &A) -> Result<T, E>
    where
        A: ?Sized,
        N: Fn(&A) -> String,
        F: Fn(&A) -> Result<T, E>,
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
    {
        let key = (self.name)(args);
        self.cache.get_or_compute(&key, || (self.op)(args))
    }
}

/// Map a key to a portable file stem.
///
/// Bytes outside `[A-Za-z0-9_.-]` become `%XX`. `%` is escaped too, so
/// distinct keys never share a file.
fn escape_key(key: &str) -> String {
    let mut stem = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'-' | b'.') {
            stem.push(char::from(byte));
        } else {
            stem.push_str(&format!("%{:02X}", byte));
        }
    }
    stem
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_entry() {
        let dir = TempDir::new().unwrap();
        let cache = DiskCache::new(dir.path());
        let entry: Option<Vec<f64>> = cache.load("absent").unwrap();
        assert!(entry.is_none());
    }

    #[test]
    fn test_store_then_load_keeps_nan() {
        let dir = TempDir::new().unwrap();
        let cache = DiskCache::new(dir.path().join("nested"));
        cache.store("stats", &vec![0.5, f64::NAN]).unwrap();

        let back: Vec<f64> = cache.load("stats").unwrap().unwrap();
        assert_eq!(back[0], 0.5);
        assert!(back[1].is_nan());
    }

    #[test]
    fn test_memoized_call_computes_once() {
        let dir = TempDir::new().unwrap();
        let cache = DiskCache::new(dir.path());
        let calls = Cell::new(0);

        let memo = cache.memoize(
            |n: &u32| format!("square_{}", n),
            |n: &u32| -> Result<u64, CacheError> {
                calls.set(calls.get() + 1);
                Ok(u64::from(*n) * u64::from(*n))
            },
        );

        assert_eq!(memo.call(&7).unwrap(), 49);
        assert_eq!(memo.call(&7).unwrap(), 49);
        assert_eq!(calls.get(), 1);

        assert_eq!(memo.call(&8).unwrap(), 64);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_key_is_the_only_address() {
        let dir = TempDir::new().unwrap();
        let cache = DiskCache::new(dir.path());
        // Naming function ignores the argument: second call returns the stale value
        let memo = cache.memoize(
            |_: &u32| "constant".to_string(),
            |n: &u32| -> Result<u32, CacheError> { Ok(*n) },
        );
        assert_eq!(memo.call(&1).unwrap(), 1);
        assert_eq!(memo.call(&2).unwrap(), 1);
    }

    #[test]
    fn test_refresh_policy_recomputes() {
        let dir = TempDir::new().unwrap();
        DiskCache::new(dir.path()).store("value", &1u32).unwrap();

        let cache = DiskCache::new(dir.path()).with_policy(CachePolicy::Refresh);
        let value: u32 = cache
            .get_or_compute("value", || Ok::<_, CacheError>(2))
            .unwrap();
        assert_eq!(value, 2);

        let reused: Option<u32> = DiskCache::new(dir.path()).load("value").unwrap();
        assert_eq!(reused, Some(2));
    }

    #[test]
    fn test_compute_error_is_not_persisted() {
        let dir = TempDir::new().unwrap();
        let cache = DiskCache::new(dir.path());
        let result: anyhow::Result<u32> =
            cache.get_or_compute("failing", || anyhow::bail!("source unavailable"));
        assert!(result.is_err());
        assert!(!cache.entry_path("failing").exists());
    }

    #[test]
    fn test_corrupt_entry_is_a_decode_error() {
        let dir = TempDir::new().unwrap();
        let cache = DiskCache::new(dir.path());
        fs::write(cache.entry_path("broken"), b"\xc1\xc1\xc1").unwrap();
        let err = cache.load::<u32>("broken").unwrap_err();
        assert!(matches!(err, CacheError::Decode { .. }));
    }

    #[test]
    fn test_scopes_keep_entries_apart() {
        let dir = TempDir::new().unwrap();
        let cache = DiskCache::new(dir.path()).with_policy(CachePolicy::Refresh);
        let scoped = cache.scoped("runs-file__/data/runs.json");
        assert_eq!(scoped.policy(), CachePolicy::Refresh);
        assert_eq!(
            scoped.root(),
            dir.path().join("runs-file__%2Fdata%2Fruns.json")
        );

        cache.store("results", &1u32).unwrap();
        scoped.store("results", &2u32).unwrap();
        assert_eq!(cache.load::<u32>("results").unwrap(), Some(1));
        assert_eq!(scoped.load::<u32>("results").unwrap(), Some(2));
    }

    #[test]
    fn test_keys_are_escaped() {
        let cache = DiskCache::new("/tmp/cache");
        let path = cache.entry_path("norm_diff__model__a/b c");
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "norm_diff__model__a%2Fb%20c.msgpack"
        );
        assert_eq!(
            cache.entry_path("norm_diff__model__target"),
            Path::new("/tmp/cache/norm_diff__model__target.msgpack")
        );
    }

    #[test]
    fn test_similar_keys_do_not_collide() {
        let dir = TempDir::new().unwrap();
        let cache = DiskCache::new(dir.path());
        let keys = ["a/b", "a_b", "a%2Fb", "a b"];
        for (i, key) in keys.iter().enumerate() {
            cache.store(key, &(i as u32)).unwrap();
        }
        for (i, key) in keys.iter().enumerate() {
            assert_eq!(cache.load::<u32>(key).unwrap(), Some(i as u32), "{}", key);
        }
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), keys.len());
    }
}
