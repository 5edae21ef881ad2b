//! Shared health and load-balancing state for interchangeable endpoints.
//!
//! The registry is shared (behind an `Arc`) by every concurrent fetch.
//! Health flags and last-used instants are updated under a single mutex;
//! a lost last-used update only skews load balancing, never health.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::RegistryError;

/// One upstream endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Short identifier (e.g., `"overpass_de"`).
    pub id: String,
    /// Interpreter URL the query is sent to.
    pub url: String,
}

impl Endpoint {
    #[must_use]
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
        }
    }
}

/// Point-in-time view of one endpoint, for display.
#[derive(Debug, Clone)]
pub struct EndpointStatus {
    pub endpoint: Endpoint,
    pub healthy: bool,
    /// `None` if the endpoint has never been selected.
    pub last_used: Option<Instant>,
}

#[derive(Debug)]
struct EndpointState {
    endpoint: Endpoint,
    healthy: bool,
    last_used: Option<Instant>,
}

/// Tracks which endpoints are usable and which were used least recently.
#[derive(Debug)]
pub struct EndpointRegistry {
    states: Mutex<Vec<EndpointState>>,
}

impl EndpointRegistry {
    /// Creates a registry with every endpoint healthy and unused.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Empty`] if `endpoints` is empty.
    pub fn new(endpoints: Vec<Endpoint>) -> Result<Self, RegistryError> {
        if endpoints.is_empty() {
            return Err(RegistryError::Empty);
        }

        let states = endpoints
            .into_iter()
            .map(|endpoint| EndpointState {
                endpoint,
                healthy: true,
                last_used: None,
            })
            .collect();

        Ok(Self {
            states: Mutex::new(states),
        })
    }

    /// Creates a registry from bare URLs, using each URL as its id.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Empty`] if no URLs are given.
    pub fn from_urls<I, S>(urls: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            urls.into_iter()
                .map(|url| {
                    let url = url.into();
                    Endpoint::new(url.clone(), url)
                })
                .collect(),
        )
    }

    fn lock(&self) -> MutexGuard<'_, Vec<EndpointState>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Picks the endpoint for the next attempt and records it as used.
    ///
    /// With a `worker` index the pick is `healthy[worker % healthy.len()]`,
    /// so concurrent workers land on different endpoints without talking to
    /// each other. Without one, the least recently used healthy endpoint
    /// wins. If nothing is healthy, every endpoint is reset to healthy first.
    #[must_use]
    pub fn select(&self, worker: Option<usize>) -> Endpoint {
        let mut states = self.lock();
        Self::select_locked(&mut states, worker)
    }

    fn select_locked(states: &mut [EndpointState], worker: Option<usize>) -> Endpoint {
        if !states.iter().any(|s| s.healthy) {
            log::warn!("All Overpass endpoints marked unavailable; resetting all to healthy");
            for state in states.iter_mut() {
                state.healthy = true;
            }
        }

        let healthy: Vec<usize> = states
            .iter()
            .enumerate()
            .filter(|(_, s)| s.healthy)
            .map(|(i, _)| i)
            .collect();

        let idx = worker.map_or_else(
            || {
                healthy
                    .iter()
                    .copied()
                    .min_by_key(|&i| states[i].last_used)
                    .unwrap_or(0)
            },
            |w| healthy[w % healthy.len()],
        );

        let state = &mut states[idx];
        state.last_used = Some(Instant::now());
        state.endpoint.clone()
    }

    /// Returns the endpoints to try, in order: the current pick first, then
    /// every other currently healthy endpoint in configuration order.
    #[must_use]
    pub fn candidates(&self, worker: Option<usize>) -> Vec<Endpoint> {
        let mut states = self.lock();
        let primary = Self::select_locked(&mut states, worker);

        let mut candidates = vec![primary];
        for state in states.iter() {
            if state.healthy && state.endpoint != candidates[0] {
                candidates.push(state.endpoint.clone());
            }
        }
        candidates
    }

    /// Returns whether `endpoint` is currently considered healthy.
    #[must_use]
    pub fn is_healthy(&self, endpoint: &Endpoint) -> bool {
        self.lock()
            .iter()
            .any(|s| s.endpoint == *endpoint && s.healthy)
    }

    /// Records that an attempt against `endpoint` is starting now.
    pub fn mark_used(&self, endpoint: &Endpoint) {
        if let Some(state) = self.lock().iter_mut().find(|s| s.endpoint == *endpoint) {
            state.last_used = Some(Instant::now());
        }
    }

    /// Takes `endpoint` out of rotation until the next full reset.
    pub fn mark_unhealthy(&self, endpoint: &Endpoint) {
        if let Some(state) = self.lock().iter_mut().find(|s| s.endpoint == *endpoint) {
            state.healthy = false;
        }
    }

    /// Returns the current state of every endpoint, in configuration order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<EndpointStatus> {
        self.lock()
            .iter()
            .map(|s| EndpointStatus {
                endpoint: s.endpoint.clone(),
                healthy: s.healthy,
                last_used: s.last_used,
            })
            .collect()
    }
}
