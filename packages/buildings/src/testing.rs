//! In-memory upstream and footprint builders shared by the unit tests.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use building_finder_overpass::{
    BuildingSource, ElementType, Endpoint, EndpointError, FeatureId, FetchRequest, RawFeature,
};
use geo::{Centroid as _, MultiPolygon, polygon};

use crate::projection::{LocalProjection, SQFT_PER_SQM};

/// A square footprint of `sqft` square feet centered on `(lon, lat)`, built
/// in the local UTM zone so it measures back to `sqft`.
pub fn square_feature(id: i64, lon: f64, lat: f64, sqft: f64, tags: &[(&str, &str)]) -> RawFeature {
    let projection = LocalProjection::for_point(lon, lat).unwrap();
    let (cx, cy) = projection.to_planar_xy(lon, lat).unwrap();
    let half = (sqft / SQFT_PER_SQM).sqrt() / 2.0;

    let planar = MultiPolygon(vec![polygon![
        (x: cx - half, y: cy - half),
        (x: cx + half, y: cy - half),
        (x: cx + half, y: cy + half),
        (x: cx - half, y: cy + half),
        (x: cx - half, y: cy - half),
    ]]);

    RawFeature::from_tags(
        FeatureId(ElementType::Way, id),
        projection.to_geographic(&planar).unwrap(),
        tags.iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect::<BTreeMap<_, _>>(),
    )
}

/// A unique, initially absent directory under the system temp dir.
pub fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "building_finder_buildings_test_{name}_{}",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

/// Serves a fixed set of footprints, returning those whose centroid lies
/// within the requested radius, the way an `around:` filter would. Every
/// request's center and endpoint URL is recorded in arrival order.
pub struct StubSource {
    features: Vec<RawFeature>,
    calls: AtomicUsize,
    requests: Mutex<Vec<((f64, f64), String)>>,
    failures_remaining: AtomicUsize,
    failing_center: Option<(f64, f64)>,
}

impl StubSource {
    pub fn new(features: Vec<RawFeature>) -> Self {
        Self {
            features,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            failures_remaining: AtomicUsize::new(0),
            failing_center: None,
        }
    }

    /// Fails the first `count` requests.
    pub fn failing_first(self, count: usize) -> Self {
        self.failures_remaining.store(count, Ordering::SeqCst);
        self
    }

    /// Fails every request centered exactly on `(lon, lat)`.
    pub fn failing_at(mut self, lon: f64, lat: f64) -> Self {
        self.failing_center = Some((lon, lat));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// `((longitude, latitude), endpoint url)` of every request so far.
    pub fn requests(&self) -> Vec<((f64, f64), String)> {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl BuildingSource for StubSource {
    #[allow(clippy::float_cmp)]
    async fn fetch(
        &self,
        endpoint: &Endpoint,
        request: &FetchRequest,
    ) -> Result<Vec<RawFeature>, EndpointError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(((request.longitude, request.latitude), endpoint.url.clone()));

        let failing = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
            || self.failing_center == Some((request.longitude, request.latitude));
        if failing {
            return Err(EndpointError::Status {
                status: 503,
                message: "Service Unavailable".to_string(),
            });
        }

        let projection = LocalProjection::for_point(request.longitude, request.latitude).unwrap();
        let (cx, cy) = projection
            .to_planar_xy(request.longitude, request.latitude)
            .unwrap();

        let matching: Vec<RawFeature> = self
            .features
            .iter()
            .filter(|feature| {
                let center = feature.geometry.centroid().unwrap();
                let (x, y) = projection.to_planar_xy(center.x(), center.y()).unwrap();
                (x - cx).hypot(y - cy) <= request.radius_m
            })
            .cloned()
            .collect();

        if matching.is_empty() {
            return Err(EndpointError::NoMatchingFeatures);
        }
        Ok(matching)
    }
}
