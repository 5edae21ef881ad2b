//! Canonical locations for the result cache.

use std::path::{Path, PathBuf};

/// Environment variable overriding the cache directory.
pub const CACHE_DIR_ENV_VAR: &str = "BUILDING_FINDER_CACHE_DIR";

/// Returns the default cache directory (`./cache`, relative to the working
/// directory).
#[must_use]
pub fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache")
}

/// Returns the cache directory from [`CACHE_DIR_ENV_VAR`], falling back to
/// [`default_cache_dir`].
#[must_use]
pub fn cache_dir_from_env() -> PathBuf {
    std::env::var(CACHE_DIR_ENV_VAR)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map_or_else(default_cache_dir, PathBuf::from)
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub async fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !tokio::fs::try_exists(path).await? {
        tokio::fs::create_dir_all(path).await?;
    }
    Ok(())
}
