#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Disk-backed cache of building search results.
//!
//! Each distinct `(lon, lat, radius, min_sqft)` query maps to one
//! MessagePack file named after the MD5 of its parameters. Entries are
//! reused while younger than the TTL (24 hours by default) and are only
//! ever replaced, never evicted. Unreadable entries are treated as misses,
//! and failed searches are never stored.

pub mod paths;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use building_finder_buildings_models::{BuildingQuery, BuildingSet, SearchResult};
use thiserror::Error;

/// How long a cached result stays valid.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Errors from cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Filesystem error.
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The result could not be serialized.
    #[error("Cache encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// A stored entry could not be deserialized.
    #[error("Cache decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

/// Deterministic identity of a query, used as the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuerySignature {
    hash: String,
}

impl QuerySignature {
    /// Hashes the query parameters. Identical parameters always produce the
    /// same signature.
    #[must_use]
    pub fn new(longitude: f64, latitude: f64, radius_m: f64, min_sqft: f64) -> Self {
        let material = format!("{longitude}_{latitude}_{radius_m}_{min_sqft}");
        let mut context = md5::Context::new();
        context.consume(material.as_bytes());
        Self {
            hash: format!("{:x}", context.finalize()),
        }
    }

    /// Lowercase hex MD5 of the parameters.
    #[must_use]
    pub fn as_hex(&self) -> &str {
        &self.hash
    }

    /// Filesystem-safe file name for this signature.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("buildings_{}.msgpack", self.hash)
    }
}

impl From<&BuildingQuery> for QuerySignature {
    fn from(query: &BuildingQuery) -> Self {
        Self::new(
            query.longitude,
            query.latitude,
            query.radius_m,
            query.min_sqft,
        )
    }
}

/// A directory of cached [`BuildingSet`]s.
#[derive(Debug, Clone)]
pub struct ResultCache {
    dir: PathBuf,
    ttl: Duration,
}

impl ResultCache {
    /// A cache rooted at `dir` with the default TTL. The directory does not
    /// need to exist yet.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ttl: DEFAULT_TTL,
        }
    }

    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Path of the entry for `signature`.
    #[must_use]
    pub fn path_for(&self, signature: &QuerySignature) -> PathBuf {
        self.dir.join(signature.file_name())
    }

    /// Returns the cached result for `signature` if it exists, is fresh, and
    /// decodes cleanly. Every other case is a miss.
    pub async fn read(&self, signature: &QuerySignature) -> Option<BuildingSet> {
        let path = self.path_for(signature);

        let modified = match tokio::fs::metadata(&path).await.and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::debug!("Cache metadata unavailable for {}: {e}", path.display());
                }
                return None;
            }
        };

        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        if age >= self.ttl {
            log::debug!("Cache entry {} is stale ({age:?} old)", path.display());
            return None;
        }

        match Self::decode(&path).await {
            Ok(set) => {
                log::debug!("Cache hit for {}", path.display());
                Some(set)
            }
            Err(e) => {
                log::warn!("Ignoring unreadable cache entry {}: {e}", path.display());
                None
            }
        }
    }

    async fn decode(path: &Path) -> Result<BuildingSet, CacheError> {
        let bytes = tokio::fs::read(path).await?;
        Ok(rmp_serde::from_slice(&bytes)?)
    }

    /// Stores `set` under `signature`, replacing any previous entry and
    /// creating the cache directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if encoding or writing fails.
    pub async fn write(&self, signature: &QuerySignature, set: &BuildingSet) -> Result<(), CacheError> {
        let bytes = rmp_serde::to_vec_named(set)?;
        paths::ensure_dir(&self.dir).await?;
        tokio::fs::write(self.path_for(signature), bytes).await?;
        Ok(())
    }

    /// Returns the cached result for `signature`, or runs `compute` and
    /// caches its outcome unless it is an error.
    ///
    /// Cache failures never reach the caller: unreadable entries are
    /// recomputed and write failures are only logged.
    pub async fn get_or_compute<F, Fut>(&self, signature: &QuerySignature, compute: F) -> SearchResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SearchResult>,
    {
        if let Some(cached) = self.read(signature).await {
            return SearchResult::Buildings(cached);
        }

        let result = compute().await;

        if let SearchResult::Buildings(set) = &result
            && let Err(e) = self.write(signature, set).await
        {
            log::warn!(
                "Failed to write cache entry {}: {e}",
                self.path_for(signature).display()
            );
        }

        result
    }

    /// Deletes every cached entry and recreates an empty cache directory.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the directory cannot be removed or
    /// recreated.
    pub async fn clear(&self) -> Result<(), CacheError> {
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tokio::fs::create_dir_all(&self.dir).await?;
        log::info!("Cleared result cache at {}", self.dir.display());
        Ok(())
    }
}
