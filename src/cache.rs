//! Durable caption/hashtag cache.
//!
//! Calling the generation endpoint is the slow and billable part of a build,
//! and operators re-run the same photo batches while tweaking dates and
//! contact lines. This module stores every generated (or fallback) result so
//! a photo is only ever sent to the endpoint once.
//!
//! # Design
//!
//! The cache is **content-addressed**: the key is a SHA-256 digest of the
//! photo's downscaled pixels, optionally prefixed by a requester namespace.
//! Renaming files, re-saving, or re-compressing the same photo therefore
//! still hits; only actual visual content changes miss. The namespace prefix
//! keeps one account's generated text from leaking into another's sheets.
//!
//! A hit is reused verbatim — no re-validation, no re-sanitization. A miss
//! is written with insert-or-replace semantics once generation finishes.
//! Concurrent misses on the same hash are *not* serialized: both tasks may
//! call the endpoint and the last write wins. That duplicate spend is rare
//! (same photo twice in one batch) and accepted; see [`ContentCache::insert`].
//!
//! ## Storage
//!
//! The store is a versioned JSON file. Unreadable, corrupt, or
//! version-mismatched files load as an empty cache — a lost cache costs
//! money, not correctness.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use crate::types::GeneratedContent;

/// Version of the cache file format. Bump to invalidate all existing
/// caches when the format or key computation changes.
const CACHE_VERSION: u32 = 1;

/// One cached result with its write timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheRecord {
    pub content: GeneratedContent,
    pub created_at: DateTime<Utc>,
}

/// On-disk store mapping `namespace:content_hash` to cached content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentCache {
    pub version: u32,
    pub entries: HashMap<String, CacheRecord>,
    /// Where `save` writes. Set at load time, never serialized.
    #[serde(skip)]
    path: PathBuf,
}

impl ContentCache {
    /// Create an empty cache that saves to `path`.
    pub fn empty(path: PathBuf) -> Self {
        Self {
            version: CACHE_VERSION,
            entries: HashMap::new(),
            path,
        }
    }

    /// Load from `path`. Returns an empty cache if the file doesn't exist
    /// or can't be parsed (version mismatch, corruption).
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Self::empty(path.to_path_buf()),
        };
        let mut cache: Self = match serde_json::from_str(&content) {
            Ok(c) => c,
            Err(_) => return Self::empty(path.to_path_buf()),
        };
        if cache.version != CACHE_VERSION {
            return Self::empty(path.to_path_buf());
        }
        cache.path = path.to_path_buf();
        cache
    }

    /// Persist to the path the cache was loaded with.
    pub fn save(&self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&self.path, json)
    }

    /// Look up a record by namespace and content hash.
    pub fn get(&self, namespace: Option<&str>, content_hash: &str) -> Option<&CacheRecord> {
        self.entries.get(&cache_key(namespace, content_hash))
    }

    /// Record a result, replacing any existing record for the same key.
    ///
    /// Last writer wins: when two concurrent misses on the same hash both
    /// generate, whichever insert lands second stays. No per-key exclusion
    /// is attempted.
    pub fn insert(
        &mut self,
        namespace: Option<&str>,
        content_hash: &str,
        content: GeneratedContent,
    ) {
        self.entries.insert(
            cache_key(namespace, content_hash),
            CacheRecord {
                content,
                created_at: Utc::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Compose the storage key. A missing namespace gets a fixed `shared`
/// prefix so keys are unambiguous either way.
fn cache_key(namespace: Option<&str>, content_hash: &str) -> String {
    match namespace {
        Some(ns) if !ns.is_empty() => format!("{ns}:{content_hash}"),
        _ => format!("shared:{content_hash}"),
    }
}

/// SHA-256 of normalized pixel bytes, returned as a hex string. The domain
/// prefix keeps these digests from ever colliding with hashes of raw file
/// bytes, should the key scheme grow a second input kind.
pub fn hash_pixels(pixels: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"pixels\0");
    hasher.update(pixels);
    format!("{:x}", hasher.finalize())
}

/// Summary of cache performance for one build.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub misses: u32,
}

impl CacheStats {
    pub fn hit(&mut self) {
        self.hits += 1;
    }

    pub fn miss(&mut self) {
        self.misses += 1;
    }

    pub fn total(&self) -> u32 {
        self.hits + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(
                f,
                "{} cached, {} generated ({} total)",
                self.hits,
                self.misses,
                self.total()
            )
        } else {
            write!(f, "{} generated", self.misses)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::sample_content;
    use tempfile::TempDir;

    fn cache_path(tmp: &TempDir) -> PathBuf {
        tmp.path().join("content-cache.json")
    }

    // =========================================================================
    // Lookup & insert
    // =========================================================================

    #[test]
    fn empty_cache_has_no_entries() {
        let tmp = TempDir::new().unwrap();
        let cache = ContentCache::empty(cache_path(&tmp));
        assert_eq!(cache.version, CACHE_VERSION);
        assert!(cache.is_empty());
    }

    #[test]
    fn insert_then_get_hits() {
        let tmp = TempDir::new().unwrap();
        let mut cache = ContentCache::empty(cache_path(&tmp));
        let content = sample_content("Golden hour by the pool ✨");
        cache.insert(Some("hotel-a"), "abc123", content.clone());

        let record = cache.get(Some("hotel-a"), "abc123").unwrap();
        assert_eq!(record.content, content);
    }

    #[test]
    fn namespaces_do_not_leak() {
        let tmp = TempDir::new().unwrap();
        let mut cache = ContentCache::empty(cache_path(&tmp));
        cache.insert(Some("hotel-a"), "abc123", sample_content("a"));

        assert!(cache.get(Some("hotel-b"), "abc123").is_none());
        assert!(cache.get(None, "abc123").is_none());
    }

    #[test]
    fn missing_namespace_uses_shared_prefix() {
        let tmp = TempDir::new().unwrap();
        let mut cache = ContentCache::empty(cache_path(&tmp));
        cache.insert(None, "h1", sample_content("a"));
        // empty string namespace is the same bucket as None
        assert!(cache.get(Some(""), "h1").is_some());
    }

    #[test]
    fn insert_replaces_existing_record() {
        let tmp = TempDir::new().unwrap();
        let mut cache = ContentCache::empty(cache_path(&tmp));
        cache.insert(None, "h1", sample_content("first"));
        cache.insert(None, "h1", sample_content("second"));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(None, "h1").unwrap().content.caption, "second");
    }

    // =========================================================================
    // Save / Load roundtrip
    // =========================================================================

    #[test]
    fn save_and_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let mut cache = ContentCache::empty(cache_path(&tmp));
        cache.insert(Some("ns"), "h1", sample_content("kept caption"));
        cache.save().unwrap();

        let loaded = ContentCache::load(&cache_path(&tmp));
        assert_eq!(loaded.len(), 1);
        assert_eq!(
            loaded.get(Some("ns"), "h1").unwrap().content.caption,
            "kept caption"
        );
    }

    #[test]
    fn load_missing_file_returns_empty() {
        let tmp = TempDir::new().unwrap();
        let cache = ContentCache::load(&cache_path(&tmp));
        assert!(cache.is_empty());
    }

    #[test]
    fn load_corrupt_json_returns_empty() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(cache_path(&tmp), "not json").unwrap();
        let cache = ContentCache::load(&cache_path(&tmp));
        assert!(cache.is_empty());
    }

    #[test]
    fn load_wrong_version_returns_empty() {
        let tmp = TempDir::new().unwrap();
        let json = format!(r#"{{"version": {}, "entries": {{}}}}"#, CACHE_VERSION + 1);
        std::fs::write(cache_path(&tmp), json).unwrap();
        let cache = ContentCache::load(&cache_path(&tmp));
        assert!(cache.is_empty());
    }

    #[test]
    fn save_creates_parent_directories() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("deep/dir/cache.json");
        let cache = ContentCache::empty(nested.clone());
        cache.save().unwrap();
        assert!(nested.exists());
    }

    // =========================================================================
    // Hash functions
    // =========================================================================

    #[test]
    fn hash_pixels_deterministic() {
        assert_eq!(hash_pixels(b"some pixels"), hash_pixels(b"some pixels"));
        assert_eq!(hash_pixels(b"x").len(), 64);
    }

    #[test]
    fn hash_pixels_changes_with_content() {
        assert_ne!(hash_pixels(b"pixels a"), hash_pixels(b"pixels b"));
    }

    // =========================================================================
    // CacheStats
    // =========================================================================

    #[test]
    fn stats_display_with_hits() {
        let stats = CacheStats { hits: 5, misses: 2 };
        assert_eq!(format!("{}", stats), "5 cached, 2 generated (7 total)");
    }

    #[test]
    fn stats_display_no_hits() {
        let stats = CacheStats { hits: 0, misses: 3 };
        assert_eq!(format!("{}", stats), "3 generated");
    }
}
