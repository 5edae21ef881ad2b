#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared types for building search results.
//!
//! This crate contains only data types and simple conversions. It has no
//! heavyweight dependencies (no HTTP, no projection, no I/O).

use serde::{Deserialize, Serialize};

/// Placeholder address used when a building carries no address tags.
pub const NO_ADDRESS: &str = "No address data";

/// Building type used when the upstream tag only says `building=yes`.
pub const UNKNOWN_BUILDING_TYPE: &str = "nan";

/// The parameters of a single building search around a point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BuildingQuery {
    /// Longitude of the search center (WGS84).
    pub longitude: f64,
    /// Latitude of the search center (WGS84).
    pub latitude: f64,
    /// Minimum footprint area in square feet (inclusive).
    pub min_sqft: f64,
    /// Search radius in meters.
    pub radius_m: f64,
}

impl BuildingQuery {
    #[must_use]
    pub const fn new(longitude: f64, latitude: f64, min_sqft: f64, radius_m: f64) -> Self {
        Self {
            longitude,
            latitude,
            min_sqft,
            radius_m,
        }
    }

    /// Returns a copy of this query re-centered on another point with a
    /// different radius. The size threshold is preserved.
    #[must_use]
    pub const fn recentered(&self, longitude: f64, latitude: f64, radius_m: f64) -> Self {
        Self {
            longitude,
            latitude,
            min_sqft: self.min_sqft,
            radius_m,
        }
    }
}

/// One building found by a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingRecord {
    /// `OpenStreetMap` element id. Stable across overlapping searches.
    pub id: i64,
    /// Footprint area in square feet, rounded to 2 decimals.
    pub sqft: f64,
    /// Centroid latitude (WGS84).
    pub lat: f64,
    /// Centroid longitude (WGS84).
    pub lon: f64,
    /// Formatted address, or [`NO_ADDRESS`].
    pub address: String,
    /// Whether both a street line and a city were present.
    pub has_complete_address: bool,
    /// Free-text building type, [`UNKNOWN_BUILDING_TYPE`] for `building=yes`.
    pub building_type: String,
    /// Building name, `"unnamed"` when absent.
    pub name: String,
    /// Number of levels as tagged, `"unknown"` when absent.
    pub levels: String,
}

/// An ordered set of buildings, largest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildingSet {
    /// Always equal to `buildings.len()`.
    pub total_buildings: usize,
    pub buildings: Vec<BuildingRecord>,
}

impl BuildingSet {
    /// Builds a set from records, sorting them by area (largest first).
    ///
    /// The sort is stable: records of equal area keep their relative order.
    #[must_use]
    pub fn from_records(mut buildings: Vec<BuildingRecord>) -> Self {
        sort_by_area_desc(&mut buildings);
        Self {
            total_buildings: buildings.len(),
            buildings,
        }
    }

    /// An empty result (a valid "nothing found" outcome).
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            total_buildings: 0,
            buildings: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buildings.is_empty()
    }
}

/// Sorts records by square footage, largest first, keeping ties in order.
pub fn sort_by_area_desc(buildings: &mut [BuildingRecord]) {
    buildings.sort_by(|a, b| b.sqft.total_cmp(&a.sqft));
}

/// The value every search entry point hands back to its caller.
///
/// Serializes either as `{"total_buildings": .., "buildings": [..]}` or as
/// `{"error": ".."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SearchResult {
    /// The search completed (possibly with zero buildings).
    Buildings(BuildingSet),
    /// The search failed; carries the underlying message.
    Error {
        /// Description of the failure.
        error: String,
    },
}

impl SearchResult {
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// The failure message, or `None` for a completed search.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Buildings(_) => None,
            Self::Error { error } => Some(error),
        }
    }

    /// Returns the buildings, or `None` for a failed search.
    #[must_use]
    pub const fn buildings(&self) -> Option<&BuildingSet> {
        match self {
            Self::Buildings(set) => Some(set),
            Self::Error { .. } => None,
        }
    }

    /// Consumes the result, returning the buildings or the error message.
    ///
    /// # Errors
    ///
    /// Returns the failure message if this is [`SearchResult::Error`].
    pub fn into_buildings(self) -> Result<BuildingSet, String> {
        match self {
            Self::Buildings(set) => Ok(set),
            Self::Error { error } => Err(error),
        }
    }
}

impl From<BuildingSet> for SearchResult {
    fn from(value: BuildingSet) -> Self {
        Self::Buildings(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, sqft: f64) -> BuildingRecord {
        BuildingRecord {
            id,
            sqft,
            lat: 0.0,
            lon: 0.0,
            address: NO_ADDRESS.to_string(),
            has_complete_address: false,
            building_type: UNKNOWN_BUILDING_TYPE.to_string(),
            name: "unnamed".to_string(),
            levels: "unknown".to_string(),
        }
    }

    #[test]
    fn from_records_sorts_descending_and_counts() {
        let set = BuildingSet::from_records(vec![record(1, 10.0), record(2, 30.0), record(3, 20.0)]);
        assert_eq!(set.total_buildings, 3);
        let ids: Vec<i64> = set.buildings.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn sort_keeps_ties_in_original_order() {
        let set = BuildingSet::from_records(vec![
            record(1, 50.0),
            record(2, 75.0),
            record(3, 50.0),
            record(4, 50.0),
        ]);
        let ids: Vec<i64> = set.buildings.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![2, 1, 3, 4]);
    }

    #[test]
    fn search_result_serializes_untagged() {
        let ok = SearchResult::from(BuildingSet::empty());
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            serde_json::json!({"total_buildings": 0, "buildings": []})
        );

        let err = SearchResult::error("boom");
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            serde_json::json!({"error": "boom"})
        );
    }

    #[test]
    fn recentered_keeps_threshold() {
        let query = BuildingQuery::new(-73.0, 40.0, 5000.0, 4000.0);
        let moved = query.recentered(-72.9, 40.1, 2000.0);
        assert!((moved.min_sqft - 5000.0).abs() < f64::EPSILON);
        assert!((moved.radius_m - 2000.0).abs() < f64::EPSILON);
        assert!((moved.longitude - -72.9).abs() < f64::EPSILON);
    }
}
