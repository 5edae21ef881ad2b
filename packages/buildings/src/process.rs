//! Turns raw footprints into sorted, filtered [`BuildingRecord`]s.

use building_finder_buildings_models::{BuildingQuery, BuildingRecord, BuildingSet};
use building_finder_overpass::RawFeature;
use geo::{Area as _, Centroid as _};

use crate::{
    ProcessError,
    attributes::BuildingAttributes,
    projection::{LocalProjection, SQFT_PER_SQM},
};

/// Measures every feature in the UTM zone of the query center, keeps the
/// ones whose rounded area is `>= query.min_sqft`, and returns them largest
/// first.
///
/// Any feature that cannot be projected or measured fails the whole batch;
/// partial results are never returned.
///
/// # Errors
///
/// Returns [`ProcessError`] if the projection cannot be built or any
/// feature cannot be projected or measured.
pub fn process_features(
    features: &[RawFeature],
    query: &BuildingQuery,
) -> Result<BuildingSet, ProcessError> {
    let projection = LocalProjection::for_point(query.longitude, query.latitude)?;
    log::debug!(
        "Processing {} feature(s) in UTM zone {}{}",
        features.len(),
        projection.zone().number,
        if projection.zone().south { "S" } else { "N" }
    );

    let mut records = Vec::new();
    for feature in features {
        let planar = projection.to_planar(&feature.geometry)?;

        let area_sqft = planar.unsigned_area() * SQFT_PER_SQM;
        if !area_sqft.is_finite() {
            return Err(ProcessError::Projection {
                message: format!("Non-finite area for feature {}", feature.id.osm_id()),
            });
        }
        // Filter on the emitted value so no record rounds below the threshold.
        let sqft = round2(area_sqft);
        if sqft < query.min_sqft {
            continue;
        }

        let centroid = planar.centroid().ok_or_else(|| ProcessError::Geometry {
            message: format!("Feature {} has an empty footprint", feature.id.osm_id()),
        })?;
        let (lon, lat) = projection.to_geographic_xy(centroid.x(), centroid.y())?;

        let attrs = BuildingAttributes::resolve(feature);
        records.push(BuildingRecord {
            id: feature.id.osm_id(),
            sqft,
            lat,
            lon,
            address: attrs.address,
            has_complete_address: attrs.has_complete_address,
            building_type: attrs.building_type,
            name: attrs.name,
            levels: attrs.levels,
        });
    }

    Ok(BuildingSet::from_records(records))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
