//! Compile-time registry of Overpass endpoint configurations.
//!
//! Each endpoint is defined in a TOML file under `endpoints/`. The files are
//! embedded at compile time; [`configured_endpoints`] additionally honours
//! the `BUILDING_FINDER_OVERPASS_URLS` environment variable.

use serde::Deserialize;

use crate::registry::Endpoint;

/// Environment variable holding a comma-separated list of interpreter URLs
/// that replaces the embedded configuration.
pub const ENDPOINTS_ENV_VAR: &str = "BUILDING_FINDER_OVERPASS_URLS";

/// An Overpass endpoint configuration loaded from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    /// Unique identifier (e.g., `"overpass_de"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Interpreter URL.
    pub url: String,
    /// Whether this endpoint takes part in rotation.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Configuration order; lower values are preferred on ties.
    pub priority: u32,
}

const fn default_true() -> bool {
    true
}

impl From<&EndpointConfig> for Endpoint {
    fn from(value: &EndpointConfig) -> Self {
        Self::new(value.id.clone(), value.url.clone())
    }
}

// ── Compile-time embedded TOML files ────────────────────────────────

const ENDPOINT_TOMLS: &[(&str, &str)] = &[
    ("overpass_de", include_str!("../endpoints/overpass_de.toml")),
    (
        "private_coffee",
        include_str!("../endpoints/private_coffee.toml"),
    ),
];

/// Returns all endpoint configurations (enabled and disabled).
///
/// # Panics
///
/// Panics if any TOML config is malformed (the files are embedded, so this
/// surfaces on first use of a broken build).
#[must_use]
pub fn all_endpoints() -> Vec<EndpointConfig> {
    ENDPOINT_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            toml::de::from_str(toml_str)
                .unwrap_or_else(|e| panic!("Failed to parse Overpass endpoint '{name}': {e}"))
        })
        .collect()
}

/// Returns only enabled endpoints, sorted by priority (ascending).
#[must_use]
pub fn enabled_endpoints() -> Vec<EndpointConfig> {
    let mut endpoints: Vec<EndpointConfig> =
        all_endpoints().into_iter().filter(|e| e.enabled).collect();
    endpoints.sort_by_key(|e| e.priority);
    endpoints
}

/// Parses a comma-separated URL list, ignoring blank entries.
#[must_use]
pub fn parse_url_list(value: &str) -> Vec<Endpoint> {
    value
        .split(',')
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(|url| Endpoint::new(url, url))
        .collect()
}

/// Returns the endpoints to use: the environment override if it names at
/// least one URL, otherwise the enabled embedded configurations.
#[must_use]
pub fn configured_endpoints() -> Vec<Endpoint> {
    if let Ok(value) = std::env::var(ENDPOINTS_ENV_VAR) {
        let endpoints = parse_url_list(&value);
        if !endpoints.is_empty() {
            log::info!(
                "Using {} Overpass endpoint(s) from {ENDPOINTS_ENV_VAR}",
                endpoints.len()
            );
            return endpoints;
        }
    }

    enabled_endpoints().iter().map(Endpoint::from).collect()
}
