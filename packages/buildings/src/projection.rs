//! Local UTM reprojection for accurate planar area and centroids.
//!
//! Footprints arrive in WGS84 degrees, where area is meaningless. Each query
//! is reprojected into the UTM zone of its center point, measured there, and
//! centroids are projected back to WGS84.

use geo::{Area as _, Centroid as _, Coord, MapCoords as _, MultiPolygon, Polygon};
use proj4rs::proj::Proj;
use proj4rs::transform::transform;

use crate::ProcessError;

/// Square feet per square meter.
pub const SQFT_PER_SQM: f64 = 10.764;

const WGS84_PROJ: &str = "+proj=longlat +datum=WGS84 +no_defs";

/// A six-degree UTM zone plus hemisphere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtmZone {
    /// Zone number, `1..=60`.
    pub number: u8,
    /// Southern hemisphere (false northing of 10,000 km).
    pub south: bool,
}

impl UtmZone {
    /// Zone containing `(longitude, latitude)`:
    /// `floor((lon + 180) / 6) mod 60 + 1`, south when `lat < 0`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn for_point(longitude: f64, latitude: f64) -> Self {
        let index = ((longitude + 180.0) / 6.0).floor() as i64;
        Self {
            number: (index.rem_euclid(60) + 1) as u8,
            south: latitude < 0.0,
        }
    }

    /// PROJ definition string for this zone on WGS84.
    #[must_use]
    pub fn proj_string(self) -> String {
        let hemisphere = if self.south { " +south" } else { "" };
        format!(
            "+proj=utm +zone={}{hemisphere} +datum=WGS84 +units=m +no_defs",
            self.number
        )
    }
}

/// A WGS84 <-> UTM transformer for one zone.
pub struct LocalProjection {
    zone: UtmZone,
    geographic: Proj,
    planar: Proj,
}

impl std::fmt::Debug for LocalProjection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalProjection")
            .field("zone", &self.zone)
            .finish_non_exhaustive()
    }
}

impl LocalProjection {
    /// Projection for the zone containing `(longitude, latitude)`.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::Projection`] if the projection cannot be
    /// initialised.
    pub fn for_point(longitude: f64, latitude: f64) -> Result<Self, ProcessError> {
        Self::for_zone(UtmZone::for_point(longitude, latitude))
    }

    /// Projection for an explicit zone.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::Projection`] if the projection cannot be
    /// initialised.
    pub fn for_zone(zone: UtmZone) -> Result<Self, ProcessError> {
        let geographic = Proj::from_proj_string(WGS84_PROJ).map_err(|e| ProcessError::Projection {
            message: format!("Invalid geographic projection: {e:?}"),
        })?;
        let planar = Proj::from_proj_string(&zone.proj_string()).map_err(|e| {
            ProcessError::Projection {
                message: format!("Invalid projection for UTM zone {}: {e:?}", zone.number),
            }
        })?;

        Ok(Self {
            zone,
            geographic,
            planar,
        })
    }

    #[must_use]
    pub const fn zone(&self) -> UtmZone {
        self.zone
    }

    /// Projects WGS84 degrees to UTM meters.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::Projection`] if the transform fails or
    /// produces non-finite coordinates.
    pub fn to_planar_xy(&self, longitude: f64, latitude: f64) -> Result<(f64, f64), ProcessError> {
        let mut point = (longitude.to_radians(), latitude.to_radians(), 0.0);
        transform(&self.geographic, &self.planar, &mut point).map_err(|e| {
            ProcessError::Projection {
                message: format!("Failed to project ({longitude}, {latitude}): {e:?}"),
            }
        })?;
        finite(point.0, point.1, longitude, latitude)
    }

    /// Projects UTM meters back to WGS84 degrees.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::Projection`] if the transform fails or
    /// produces non-finite coordinates.
    pub fn to_geographic_xy(&self, x: f64, y: f64) -> Result<(f64, f64), ProcessError> {
        let mut point = (x, y, 0.0);
        transform(&self.planar, &self.geographic, &mut point).map_err(|e| {
            ProcessError::Projection {
                message: format!("Failed to unproject ({x}, {y}): {e:?}"),
            }
        })?;
        finite(point.0.to_degrees(), point.1.to_degrees(), x, y)
    }

    /// Projects every coordinate of `geometry` to UTM meters.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::Projection`] on the first coordinate that
    /// cannot be projected.
    pub fn to_planar(&self, geometry: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>, ProcessError> {
        geometry.try_map_coords(|c| {
            self.to_planar_xy(c.x, c.y)
                .map(|(x, y)| Coord { x, y })
        })
    }

    /// Projects every coordinate of a planar `geometry` back to WGS84.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::Projection`] on the first coordinate that
    /// cannot be unprojected.
    pub fn to_geographic(
        &self,
        geometry: &MultiPolygon<f64>,
    ) -> Result<MultiPolygon<f64>, ProcessError> {
        geometry.try_map_coords(|c| {
            self.to_geographic_xy(c.x, c.y)
                .map(|(x, y)| Coord { x, y })
        })
    }
}

fn finite(x: f64, y: f64, in_x: f64, in_y: f64) -> Result<(f64, f64), ProcessError> {
    if x.is_finite() && y.is_finite() {
        Ok((x, y))
    } else {
        Err(ProcessError::Projection {
            message: format!("Projection of ({in_x}, {in_y}) produced non-finite coordinates"),
        })
    }
}

/// Area in square meters of one WGS84 polygon, measured in the UTM zone of
/// its own centroid.
///
/// # Errors
///
/// Returns [`ProcessError`] if the polygon is empty or cannot be projected.
pub fn polygon_area_m2(polygon: &Polygon<f64>) -> Result<f64, ProcessError> {
    let center = polygon.centroid().ok_or_else(|| ProcessError::Geometry {
        message: "Cannot measure an empty polygon".to_string(),
    })?;
    let projection = LocalProjection::for_point(center.x(), center.y())?;
    let planar = projection.to_planar(&MultiPolygon(vec![polygon.clone()]))?;
    Ok(planar.unsigned_area())
}

/// Area in square feet of one WGS84 polygon. See [`polygon_area_m2`].
///
/// # Errors
///
/// Returns [`ProcessError`] if the polygon is empty or cannot be projected.
pub fn polygon_area_sqft(polygon: &Polygon<f64>) -> Result<f64, ProcessError> {
    Ok(polygon_area_m2(polygon)? * SQFT_PER_SQM)
}
