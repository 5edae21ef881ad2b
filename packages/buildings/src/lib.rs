#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Building search: fetch footprints, measure them, filter and sort.
//!
//! [`search::BuildingFinder`] is the entry point. A search runs through:
//!
//! 1. the result cache ([`building_finder_cache`]),
//! 2. a failover fetch across Overpass endpoints
//!    ([`building_finder_overpass`]),
//! 3. [`process::process_features`], which measures each footprint in the
//!    local UTM zone ([`projection`]) and normalizes its tags
//!    ([`attributes`]).
//!
//! Radii above two kilometers are split into four concurrently searched
//! quadrants whose results are merged ([`quadrant`]).

pub mod attributes;
pub mod process;
pub mod projection;
pub mod quadrant;
pub mod search;
pub mod settings;

#[cfg(test)]
mod testing;

use thiserror::Error;

pub use search::{BuildingFinder, FinderError};
pub use settings::SearchSettings;

/// Errors turning raw footprints into building records.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// A coordinate could not be moved between WGS84 and UTM.
    #[error("Projection error: {message}")]
    Projection { message: String },

    /// A footprint has no measurable geometry.
    #[error("Geometry error: {message}")]
    Geometry { message: String },
}
