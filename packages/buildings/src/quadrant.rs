//! Splitting a large search into four overlapping quadrant searches and
//! merging their results.

use std::collections::HashSet;

use building_finder_buildings_models::{BuildingQuery, BuildingSet, SearchResult};

/// Meters per degree at the equator. Used as a flat approximation for the
/// quadrant offset regardless of latitude.
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Sub-queries covering `query`: centers offset by `±(radius / 2)` meters
/// (converted with [`METERS_PER_DEGREE`]) on both axes, each with half the
/// radius.
///
/// Order: north-east, north-west, south-east, south-west. The index of each
/// quadrant doubles as its worker index.
#[must_use]
pub fn quadrant_queries(query: &BuildingQuery) -> [BuildingQuery; 4] {
    let half_radius = query.radius_m / 2.0;
    let offset = half_radius / METERS_PER_DEGREE;
    let BuildingQuery {
        longitude: lon,
        latitude: lat,
        ..
    } = *query;

    [
        query.recentered(lon + offset, lat + offset, half_radius),
        query.recentered(lon - offset, lat + offset, half_radius),
        query.recentered(lon + offset, lat - offset, half_radius),
        query.recentered(lon - offset, lat - offset, half_radius),
    ]
}

/// Unions quadrant results. Failed quadrants contribute nothing; a building
/// seen in several quadrants keeps its first occurrence (in quadrant order).
/// The merged set is re-sorted largest first.
#[must_use]
pub fn merge_quadrants(results: Vec<SearchResult>) -> BuildingSet {
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    let mut failed = 0_usize;
    let mut duplicates = 0_usize;

    for (index, result) in results.into_iter().enumerate() {
        let set = match result {
            SearchResult::Buildings(set) => set,
            SearchResult::Error { error } => {
                log::warn!("Quadrant {index} failed, skipping: {error}");
                failed += 1;
                continue;
            }
        };

        for building in set.buildings {
            if seen.insert(building.id) {
                merged.push(building);
            } else {
                duplicates += 1;
            }
        }
    }

    let set = BuildingSet::from_records(merged);
    log::info!(
        "Merged quadrants: {} building(s), {duplicates} duplicate(s) removed, {failed} quadrant(s) failed",
        set.total_buildings
    );
    set
}
