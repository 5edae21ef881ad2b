//! Retry one logical request across every healthy endpoint.

use std::future::Future;

use crate::{EndpointError, FetchError, registry::Endpoint, registry::EndpointRegistry};

/// Runs `attempt` against the registry's pick, then against each other
/// healthy endpoint until one succeeds.
///
/// * Endpoints marked unhealthy (possibly by a concurrent caller) are
///   skipped when their turn comes.
/// * A connection or timeout failure marks that endpoint unhealthy for all
///   later callers.
/// * [`EndpointError::NoMatchingFeatures`] stops immediately with
///   [`FetchError::NoMatchingFeatures`]; other endpoints would answer the
///   same.
///
/// # Errors
///
/// Returns [`FetchError::AllEndpointsExhausted`] carrying every endpoint's
/// error if no attempt succeeded.
pub async fn with_endpoint_fallback<T, F, Fut>(
    registry: &EndpointRegistry,
    worker: Option<usize>,
    mut attempt: F,
) -> Result<T, FetchError>
where
    F: FnMut(Endpoint) -> Fut,
    Fut: Future<Output = Result<T, EndpointError>>,
{
    let mut errors = Vec::new();

    for endpoint in registry.candidates(worker) {
        if !registry.is_healthy(&endpoint) {
            continue;
        }

        registry.mark_used(&endpoint);
        log::debug!("Querying Overpass endpoint {}", endpoint.url);

        match attempt(endpoint.clone()).await {
            Ok(value) => return Ok(value),
            Err(EndpointError::NoMatchingFeatures) => return Err(FetchError::NoMatchingFeatures),
            Err(e) => {
                if e.is_unreachable() {
                    log::warn!(
                        "Marking endpoint {} as unavailable due to: {e}",
                        endpoint.url
                    );
                    registry.mark_unhealthy(&endpoint);
                } else {
                    log::warn!("Endpoint {} failed: {e}", endpoint.url);
                }
                errors.push((endpoint.url, e));
            }
        }
    }

    Err(FetchError::AllEndpointsExhausted { errors })
}
