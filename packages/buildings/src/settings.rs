//! Runtime settings for [`crate::search::BuildingFinder`].

use std::path::PathBuf;
use std::time::Duration;

use building_finder_cache::{DEFAULT_TTL, paths};

/// Environment variable overriding the per-request timeout, in seconds.
pub const TIMEOUT_ENV_VAR: &str = "BUILDING_FINDER_TIMEOUT_SECS";

/// Default upper bound on a single upstream request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(180);

/// Largest radius served by a single query; above this, searches are split
/// into quadrants.
pub const DIRECT_QUERY_MAX_RADIUS_M: f64 = 2000.0;

/// Upper bound on concurrently running quadrant pipelines.
pub const MAX_QUADRANT_WORKERS: usize = 4;

#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub cache_dir: PathBuf,
    pub cache_ttl: Duration,
    /// Timeout used by [`crate::search::BuildingFinder::search_large_area`],
    /// which takes none from its caller.
    pub timeout: Duration,
    pub direct_query_max_radius_m: f64,
    pub max_quadrant_workers: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            cache_dir: paths::default_cache_dir(),
            cache_ttl: DEFAULT_TTL,
            timeout: DEFAULT_TIMEOUT,
            direct_query_max_radius_m: DIRECT_QUERY_MAX_RADIUS_M,
            max_quadrant_workers: MAX_QUADRANT_WORKERS,
        }
    }
}

impl SearchSettings {
    /// Defaults with the cache directory and timeout read from the
    /// environment. Unparseable values are ignored with a warning.
    #[must_use]
    pub fn from_env() -> Self {
        let timeout = match std::env::var(TIMEOUT_ENV_VAR) {
            Ok(value) => value.trim().parse::<u64>().map_or_else(
                |e| {
                    log::warn!("Ignoring invalid {TIMEOUT_ENV_VAR}={value:?}: {e}");
                    DEFAULT_TIMEOUT
                },
                Duration::from_secs,
            ),
            Err(_) => DEFAULT_TIMEOUT,
        };

        Self {
            cache_dir: paths::cache_dir_from_env(),
            timeout,
            ..Self::default()
        }
    }

    /// Number of quadrant pipelines to run at once: the configured maximum,
    /// capped by the host's available parallelism, never less than one.
    #[must_use]
    pub fn quadrant_workers(&self) -> usize {
        let host = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
        self.max_quadrant_workers.min(host).max(1)
    }
}
