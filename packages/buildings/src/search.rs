//! The caller-facing search entry points.

use std::sync::Arc;
use std::time::Duration;

use building_finder_buildings_models::{BuildingQuery, BuildingSet, SearchResult};
use building_finder_cache::{CacheError, QuerySignature, ResultCache};
use building_finder_overpass::{
    BuildingSource, EndpointError, EndpointRegistry, FetchRequest, RegistryError,
    client::OverpassClient, endpoints::configured_endpoints, fetch_buildings,
};
use futures::stream::{self, StreamExt as _};
use thiserror::Error;

use crate::{
    process::process_features,
    quadrant::{merge_quadrants, quadrant_queries},
    settings::SearchSettings,
};

/// Errors constructing a [`BuildingFinder`].
#[derive(Debug, Error)]
pub enum FinderError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Failed to create Overpass client: {0}")]
    Client(#[from] EndpointError),
}

/// Fetches, caches, measures, and merges building footprints.
///
/// The endpoint registry is the only state shared between concurrent
/// searches; everything else is per query.
pub struct BuildingFinder {
    registry: Arc<EndpointRegistry>,
    source: Arc<dyn BuildingSource>,
    cache: ResultCache,
    settings: SearchSettings,
}

impl BuildingFinder {
    #[must_use]
    pub fn new(
        registry: Arc<EndpointRegistry>,
        source: Arc<dyn BuildingSource>,
        settings: SearchSettings,
    ) -> Self {
        let cache = ResultCache::new(settings.cache_dir.clone()).with_ttl(settings.cache_ttl);
        Self {
            registry,
            source,
            cache,
            settings,
        }
    }

    /// A finder using the configured Overpass endpoints, the live HTTP
    /// client, and [`SearchSettings::from_env`].
    ///
    /// # Errors
    ///
    /// Returns [`FinderError`] if no endpoint is configured or the HTTP
    /// client cannot be built.
    pub fn from_env() -> Result<Self, FinderError> {
        let registry = EndpointRegistry::new(configured_endpoints())?;
        let client = OverpassClient::new()?;
        Ok(Self::new(
            Arc::new(registry),
            Arc::new(client),
            SearchSettings::from_env(),
        ))
    }

    #[must_use]
    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn cache(&self) -> &ResultCache {
        &self.cache
    }

    #[must_use]
    pub const fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    /// Finds every building of at least `query.min_sqft` square feet within
    /// `query.radius_m` meters of the query point, largest first.
    ///
    /// With `use_cache`, a fresh cached result is returned without touching
    /// the network and a successful live result is cached. Failures are
    /// returned as [`SearchResult::Error`], never cached.
    pub async fn get_buildings_by_size(
        &self,
        query: &BuildingQuery,
        timeout: Duration,
        use_cache: bool,
    ) -> SearchResult {
        self.search(query, timeout, use_cache, None).await
    }

    async fn search(
        &self,
        query: &BuildingQuery,
        timeout: Duration,
        use_cache: bool,
        worker: Option<usize>,
    ) -> SearchResult {
        if !use_cache {
            return self.fetch_and_process(query, timeout, worker).await;
        }

        let signature = QuerySignature::from(query);
        self.cache
            .get_or_compute(&signature, || {
                self.fetch_and_process(query, timeout, worker)
            })
            .await
    }

    async fn fetch_and_process(
        &self,
        query: &BuildingQuery,
        timeout: Duration,
        worker: Option<usize>,
    ) -> SearchResult {
        let request =
            FetchRequest::buildings(query.longitude, query.latitude, query.radius_m, timeout);

        let features =
            match fetch_buildings(&self.registry, self.source.as_ref(), &request, worker).await {
                Ok(features) => features,
                Err(e) => {
                    log::error!(
                        "Fetch failed at ({}, {}) radius {}m: {e}",
                        query.latitude,
                        query.longitude,
                        query.radius_m
                    );
                    return SearchResult::error(e.to_string());
                }
            };

        if features.is_empty() {
            return BuildingSet::empty().into();
        }

        match process_features(&features, query) {
            Ok(set) => {
                log::debug!(
                    "{} of {} footprint(s) at ({}, {}) are at least {} sqft",
                    set.total_buildings,
                    features.len(),
                    query.latitude,
                    query.longitude,
                    query.min_sqft
                );
                set.into()
            }
            Err(e) => {
                log::error!("Failed to process buildings: {e}");
                SearchResult::error(e.to_string())
            }
        }
    }

    /// Like [`Self::get_buildings_by_size`] with caching on and the
    /// configured timeout, but radii above
    /// [`SearchSettings::direct_query_max_radius_m`] are split into four
    /// quadrant searches run concurrently.
    ///
    /// A failed quadrant only loses its own buildings; the merged result is
    /// never an error.
    pub async fn search_large_area(
        &self,
        longitude: f64,
        latitude: f64,
        min_sqft: f64,
        radius_m: f64,
    ) -> SearchResult {
        let query = BuildingQuery::new(longitude, latitude, min_sqft, radius_m);

        if radius_m <= self.settings.direct_query_max_radius_m {
            return self
                .get_buildings_by_size(&query, self.settings.timeout, true)
                .await;
        }

        let quadrants = quadrant_queries(&query);
        let workers = self.settings.quadrant_workers();
        log::info!(
            "Splitting {radius_m}m search at ({latitude}, {longitude}) into {} quadrants ({workers} worker(s))",
            quadrants.len()
        );

        let results: Vec<SearchResult> = stream::iter(
            quadrants
                .iter()
                .enumerate()
                .map(|(worker, quadrant)| {
                    self.search(quadrant, self.settings.timeout, true, Some(worker))
                }),
        )
        .buffered(workers)
        .collect()
        .await;

        merge_quadrants(results).into()
    }

    /// Deletes every cached result.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the cache directory cannot be reset.
    pub async fn clear_cache(&self) -> Result<(), CacheError> {
        self.cache.clear().await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use building_finder_overpass::Endpoint;

    use super::*;
    use crate::testing::{StubSource, square_feature, temp_dir};

    const LON: f64 = -73.9857;
    const LAT: f64 = 40.7484;
    const TIMEOUT: Duration = Duration::from_secs(5);

    fn finder(name: &str, source: Arc<StubSource>) -> BuildingFinder {
        finder_with_urls(name, source, &["https://stub.invalid/api"])
    }

    fn finder_with_urls(name: &str, source: Arc<StubSource>, urls: &[&str]) -> BuildingFinder {
        let registry = EndpointRegistry::new(
            urls.iter()
                .enumerate()
                .map(|(i, url)| Endpoint::new(format!("stub-{i}"), *url))
                .collect(),
        )
        .unwrap();
        let settings = SearchSettings {
            cache_dir: temp_dir(name),
            timeout: TIMEOUT,
            ..SearchSettings::default()
        };
        BuildingFinder::new(Arc::new(registry), source, settings)
    }

    fn cleanup(finder: &BuildingFinder) {
        let _ = std::fs::remove_dir_all(finder.cache().dir());
    }

    fn sized_buildings() -> Vec<building_finder_overpass::RawFeature> {
        vec![
            square_feature(101, LON, LAT, 12_000.0, &[("building", "office")]),
            square_feature(102, LON + 0.0005, LAT, 4_000.0, &[("building", "yes")]),
            square_feature(103, LON, LAT + 0.0005, 8_000.0, &[("building", "retail")]),
        ]
    }

    #[tokio::test]
    async fn filters_by_size_and_sorts() {
        let source = Arc::new(StubSource::new(sized_buildings()));
        let finder = finder("filters", source);

        let result = finder
            .get_buildings_by_size(&BuildingQuery::new(LON, LAT, 5000.0, 500.0), TIMEOUT, false)
            .await;

        let set = result.buildings().unwrap();
        assert_eq!(set.total_buildings, 2);
        let ids: Vec<i64> = set.buildings.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![101, 103]);
        cleanup(&finder);
    }

    #[tokio::test]
    async fn cached_search_is_idempotent() {
        let source = Arc::new(StubSource::new(sized_buildings()));
        let finder = finder("idempotent", Arc::clone(&source));
        let query = BuildingQuery::new(LON, LAT, 5000.0, 500.0);

        let first = finder.get_buildings_by_size(&query, TIMEOUT, true).await;
        let second = finder.get_buildings_by_size(&query, TIMEOUT, true).await;

        assert_eq!(source.calls(), 1);
        assert_eq!(first, second);
        let (a, b) = (first.buildings().unwrap(), second.buildings().unwrap());
        for (x, y) in a.buildings.iter().zip(&b.buildings) {
            assert_eq!(x.lat.to_bits(), y.lat.to_bits());
            assert_eq!(x.lon.to_bits(), y.lon.to_bits());
            assert_eq!(x.sqft.to_bits(), y.sqft.to_bits());
        }
        cleanup(&finder);
    }

    #[tokio::test]
    async fn bypassing_the_cache_always_fetches() {
        let source = Arc::new(StubSource::new(sized_buildings()));
        let finder = finder("bypass", Arc::clone(&source));
        let query = BuildingQuery::new(LON, LAT, 0.0, 500.0);

        finder.get_buildings_by_size(&query, TIMEOUT, false).await;
        finder.get_buildings_by_size(&query, TIMEOUT, false).await;

        assert_eq!(source.calls(), 2);
        assert!(!finder.cache().path_for(&QuerySignature::from(&query)).exists());
        cleanup(&finder);
    }

    #[tokio::test]
    async fn failures_are_reported_and_not_cached() {
        let source = Arc::new(StubSource::new(sized_buildings()).failing_first(1));
        let finder = finder("failure", Arc::clone(&source));
        let query = BuildingQuery::new(LON, LAT, 0.0, 500.0);

        let failed = finder.get_buildings_by_size(&query, TIMEOUT, true).await;
        let message = failed.error_message().unwrap();
        assert!(message.contains("All Overpass endpoints failed"), "{message}");
        assert!(message.contains("Service Unavailable"), "{message}");

        let recovered = finder.get_buildings_by_size(&query, TIMEOUT, true).await;
        assert_eq!(recovered.buildings().unwrap().total_buildings, 3);
        assert_eq!(source.calls(), 2);
        cleanup(&finder);
    }

    #[tokio::test]
    async fn no_buildings_is_an_empty_result() {
        let source = Arc::new(StubSource::new(Vec::new()));
        let finder = finder("nothing", source);

        let result = finder
            .get_buildings_by_size(&BuildingQuery::new(LON, LAT, 0.0, 500.0), TIMEOUT, false)
            .await;

        assert!(!result.is_error());
        assert_eq!(result.buildings().unwrap().total_buildings, 0);
        cleanup(&finder);
    }

    #[tokio::test]
    async fn corrupt_cache_entry_is_recomputed() {
        let source = Arc::new(StubSource::new(sized_buildings()));
        let finder = finder("corrupt", Arc::clone(&source));
        let query = BuildingQuery::new(LON, LAT, 0.0, 500.0);

        let first = finder.get_buildings_by_size(&query, TIMEOUT, true).await;
        std::fs::write(
            finder.cache().path_for(&QuerySignature::from(&query)),
            b"\xc1not msgpack",
        )
        .unwrap();
        let second = finder.get_buildings_by_size(&query, TIMEOUT, true).await;

        assert_eq!(source.calls(), 2);
        assert_eq!(first, second);
        cleanup(&finder);
    }

    #[tokio::test]
    async fn small_radius_is_a_single_direct_search() {
        let source = Arc::new(StubSource::new(sized_buildings()));
        let finder = finder("direct", Arc::clone(&source));

        let result = finder.search_large_area(LON, LAT, 0.0, 2000.0).await;

        assert_eq!(source.calls(), 1);
        assert_eq!(result.buildings().unwrap().total_buildings, 3);
        assert!(
            finder
                .cache()
                .path_for(&QuerySignature::new(LON, LAT, 2000.0, 0.0))
                .exists()
        );
        cleanup(&finder);
    }

    /// Buildings placed so that `shared` falls in the two northern
    /// quadrants and every other one falls in exactly one quadrant.
    fn quadrant_buildings() -> Vec<building_finder_overpass::RawFeature> {
        let offset = 2000.0 / crate::quadrant::METERS_PER_DEGREE;
        vec![
            square_feature(1, LON, LAT + offset, 9_000.0, &[("name", "shared")]),
            square_feature(2, LON + offset, LAT + offset, 12_000.0, &[]),
            square_feature(3, LON - offset, LAT - offset, 6_000.0, &[]),
            square_feature(4, LON + offset, LAT - offset, 3_000.0, &[]),
        ]
    }

    #[tokio::test]
    async fn large_area_merges_and_dedups_quadrants() {
        let source = Arc::new(StubSource::new(quadrant_buildings()));
        let finder = finder("quadrants", Arc::clone(&source));

        let result = finder.search_large_area(LON, LAT, 0.0, 4000.0).await;
        let set = result.buildings().unwrap();

        assert_eq!(source.calls(), 4);
        assert_eq!(set.total_buildings, 4);
        assert_eq!(set.buildings.len(), 4);
        let ids: Vec<i64> = set.buildings.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![2, 1, 3, 4]);

        // The union of the four individual searches, deduplicated, is the
        // decomposed result.
        let query = BuildingQuery::new(LON, LAT, 0.0, 4000.0);
        let mut seen = HashSet::new();
        let mut union = Vec::new();
        for quadrant in quadrant_queries(&query) {
            let individual = finder.get_buildings_by_size(&quadrant, TIMEOUT, true).await;
            for building in individual.into_buildings().unwrap().buildings {
                if seen.insert(building.id) {
                    union.push(building);
                }
            }
        }
        assert_eq!(&BuildingSet::from_records(union), set);
        assert_eq!(source.calls(), 4);
        cleanup(&finder);
    }

    #[tokio::test]
    #[allow(clippy::float_cmp)]
    async fn quadrant_workers_spread_across_endpoints() {
        let urls = [
            "https://one.invalid/api",
            "https://two.invalid/api",
            "https://three.invalid/api",
            "https://four.invalid/api",
        ];
        let query = BuildingQuery::new(LON, LAT, 0.0, 4000.0);
        let quadrants = quadrant_queries(&query);

        for count in 2..=urls.len() {
            let source = Arc::new(StubSource::new(quadrant_buildings()));
            let finder = finder_with_urls(
                &format!("spread_{count}"),
                Arc::clone(&source),
                &urls[..count],
            );

            let result = finder.search_large_area(LON, LAT, 0.0, 4000.0).await;
            assert_eq!(result.buildings().unwrap().total_buildings, 4);

            let requests = source.requests();
            assert_eq!(requests.len(), 4);
            for (worker, quadrant) in quadrants.iter().enumerate() {
                let center = (quadrant.longitude, quadrant.latitude);
                let urls_for_center: Vec<&str> = requests
                    .iter()
                    .filter(|(c, _)| *c == center)
                    .map(|(_, url)| url.as_str())
                    .collect();
                assert_eq!(
                    urls_for_center,
                    vec![urls[worker % count]],
                    "quadrant {worker} with {count} endpoint(s)"
                );
            }
            cleanup(&finder);
        }
    }

    #[tokio::test]
    async fn failed_quadrant_only_loses_its_own_buildings() {
        let query = BuildingQuery::new(LON, LAT, 0.0, 4000.0);
        let north_east = quadrant_queries(&query)[0];
        let source = Arc::new(
            StubSource::new(quadrant_buildings())
                .failing_at(north_east.longitude, north_east.latitude),
        );
        let finder = finder("quadrant_failure", Arc::clone(&source));

        let result = finder.search_large_area(LON, LAT, 0.0, 4000.0).await;

        assert!(!result.is_error());
        let ids: Vec<i64> = result
            .buildings()
            .unwrap()
            .buildings
            .iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(ids, vec![1, 3, 4]);
        assert!(
            !finder
                .cache()
                .path_for(&QuerySignature::from(&north_east))
                .exists()
        );
        cleanup(&finder);
    }

    #[tokio::test]
    async fn clear_cache_forces_refetch() {
        let source = Arc::new(StubSource::new(sized_buildings()));
        let finder = finder("clear", Arc::clone(&source));
        let query = BuildingQuery::new(LON, LAT, 0.0, 500.0);

        finder.get_buildings_by_size(&query, TIMEOUT, true).await;
        finder.clear_cache().await.unwrap();
        assert!(finder.cache().dir().exists());
        finder.get_buildings_by_size(&query, TIMEOUT, true).await;

        assert_eq!(source.calls(), 2);
        cleanup(&finder);
    }
}
