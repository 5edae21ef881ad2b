#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Building footprint queries against the Overpass API.
//!
//! Several public Overpass instances serve the same data. This crate keeps
//! track of which ones are reachable and spreads requests across them:
//!
//! 1. [`endpoints`] loads the configured instances (embedded TOML, with an
//!    environment override).
//! 2. [`registry::EndpointRegistry`] tracks health and recency of use and
//!    picks an instance per attempt.
//! 3. [`fallback::with_endpoint_fallback`] runs one logical request against
//!    the picked instance, falling through the remaining healthy ones.
//! 4. [`client::OverpassClient`] is the HTTP [`BuildingSource`] used in
//!    production; tests plug in their own source.

pub mod client;
pub mod endpoints;
pub mod fallback;
pub mod feature;
pub mod registry;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use feature::{ElementType, FeatureId, RawFeature};
pub use registry::{Endpoint, EndpointRegistry};

/// OSM key every building footprint is tagged with.
pub const BUILDING_TAG: &str = "building";

/// Errors from a single attempt against a single endpoint.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// The endpoint could not be reached.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The request did not complete within the configured timeout.
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// The endpoint answered with a failure status or a runtime remark.
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code (200 for Overpass runtime remarks).
        status: u16,
        /// Reason phrase or remark text.
        message: String,
    },

    /// Any other transport-level failure.
    #[error("Request failed: {0}")]
    Request(String),

    /// The response body could not be understood.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// The query succeeded but returned no usable building geometry.
    #[error("No matching features for the requested query")]
    NoMatchingFeatures,
}

impl EndpointError {
    /// Returns `true` when the failure suggests the endpoint itself is down
    /// (connection refused, timeouts, gateway timeouts).
    #[must_use]
    pub fn is_unreachable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout(_) => true,
            Self::NoMatchingFeatures => false,
            other => {
                let text = other.to_string().to_lowercase();
                text.contains("connection") || text.contains("timeout")
            }
        }
    }
}

impl From<reqwest::Error> for EndpointError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else if e.is_connect() {
            Self::Connection(e.to_string())
        } else if e.is_decode() {
            Self::Parse {
                message: e.to_string(),
            }
        } else {
            Self::Request(e.to_string())
        }
    }
}

/// Errors from a logical fetch across all endpoints.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Every candidate endpoint failed.
    #[error("All Overpass endpoints failed. Errors: {}", format_endpoint_errors(.errors))]
    AllEndpointsExhausted {
        /// `(endpoint url, error)` in the order the endpoints were tried.
        errors: Vec<(String, EndpointError)>,
    },

    /// An endpoint reported that nothing matches the query.
    #[error("No matching features")]
    NoMatchingFeatures,
}

fn format_endpoint_errors(errors: &[(String, EndpointError)]) -> String {
    errors
        .iter()
        .map(|(url, e)| format!("{url}: {e}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors constructing an [`EndpointRegistry`].
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No endpoints were configured.
    #[error("At least one Overpass endpoint must be configured")]
    Empty,
}

/// A request for every tagged footprint within a radius of a point.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Longitude of the center point (WGS84).
    pub longitude: f64,
    /// Latitude of the center point (WGS84).
    pub latitude: f64,
    /// Search radius in meters.
    pub radius_m: f64,
    /// OSM key the features must carry (normally [`BUILDING_TAG`]).
    pub tag: String,
    /// Upper bound on how long one attempt may take.
    pub timeout: Duration,
}

impl FetchRequest {
    /// A building query around `(longitude, latitude)`.
    #[must_use]
    pub fn buildings(longitude: f64, latitude: f64, radius_m: f64, timeout: Duration) -> Self {
        Self {
            longitude,
            latitude,
            radius_m,
            tag: BUILDING_TAG.to_string(),
            timeout,
        }
    }
}

/// Something that can answer a [`FetchRequest`] against one endpoint.
#[async_trait]
pub trait BuildingSource: Send + Sync {
    /// Performs exactly one upstream query against `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError`] if the request fails, or
    /// [`EndpointError::NoMatchingFeatures`] if nothing matched.
    async fn fetch(
        &self,
        endpoint: &Endpoint,
        request: &FetchRequest,
    ) -> Result<Vec<RawFeature>, EndpointError>;
}

/// Fetches footprints for `request`, failing over across endpoints.
///
/// A "no matching features" answer from any endpoint ends the fetch with an
/// empty list; it is a valid outcome, not a failure.
///
/// # Errors
///
/// Returns [`FetchError::AllEndpointsExhausted`] if every candidate endpoint
/// failed.
pub async fn fetch_buildings(
    registry: &EndpointRegistry,
    source: &dyn BuildingSource,
    request: &FetchRequest,
    worker: Option<usize>,
) -> Result<Vec<RawFeature>, FetchError> {
    let result = fallback::with_endpoint_fallback(registry, worker, |endpoint| async move {
        source.fetch(&endpoint, request).await
    })
    .await;

    match result {
        Err(FetchError::NoMatchingFeatures) => {
            log::info!(
                "No buildings found at ({}, {}) with radius {}m",
                request.latitude,
                request.longitude,
                request.radius_m
            );
            Ok(Vec::new())
        }
        other => other,
    }
}
