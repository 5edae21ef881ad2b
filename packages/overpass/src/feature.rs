//! Raw upstream features, before any projection or normalization.

use std::collections::BTreeMap;

use geo::MultiPolygon;
use strum_macros::{AsRefStr, Display, EnumString};

/// OSM element kind a feature was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ElementType {
    Node,
    Way,
    Relation,
}

/// Composite upstream id: `(element type, OSM id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FeatureId(pub ElementType, pub i64);

impl FeatureId {
    /// The numeric OSM id (the second component), which is what building
    /// records are keyed by.
    #[must_use]
    pub const fn osm_id(self) -> i64 {
        self.1
    }
}

/// One footprint as returned upstream.
///
/// `columns` holds attributes the upstream exposes as first-class fields;
/// `tags` is the free-form tag bag. Consumers read `columns` first and fall
/// back to `tags`.
#[derive(Debug, Clone)]
pub struct RawFeature {
    pub id: FeatureId,
    /// Footprint in geographic coordinates (x = longitude, y = latitude).
    pub geometry: MultiPolygon<f64>,
    pub columns: BTreeMap<String, String>,
    pub tags: BTreeMap<String, String>,
}

impl RawFeature {
    /// A feature carrying only a tag bag (the shape Overpass returns).
    #[must_use]
    pub fn from_tags(
        id: FeatureId,
        geometry: MultiPolygon<f64>,
        tags: BTreeMap<String, String>,
    ) -> Self {
        Self {
            id,
            geometry,
            columns: BTreeMap::new(),
            tags,
        }
    }

    /// Looks up `key` in `columns`, then in `tags`.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.columns
            .get(key)
            .or_else(|| self.tags.get(key))
            .map(String::as_str)
    }
}
