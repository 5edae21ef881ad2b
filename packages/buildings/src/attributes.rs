//! Address and attribute normalization for raw footprints.
//!
//! Upstream attribute bags are inconsistent: the same key may appear as a
//! typed column or only in the free-form tags, and missing values are
//! sometimes spelled out as `"nan"`. [`BuildingAttributes::resolve`] reads
//! every field once, with the precedence column, then tag, then default.

use building_finder_buildings_models::{NO_ADDRESS, UNKNOWN_BUILDING_TYPE};
use building_finder_overpass::RawFeature;

const DEFAULT_NAME: &str = "unnamed";
const DEFAULT_LEVELS: &str = "unknown";
const DEFAULT_BUILDING_TYPE: &str = "unknown";

/// OSM keys of the address components, in the order they are read.
mod keys {
    pub const HOUSENUMBER: &str = "addr:housenumber";
    pub const STREET: &str = "addr:street";
    pub const CITY: &str = "addr:city";
    pub const STATE: &str = "addr:state";
    pub const POSTCODE: &str = "addr:postcode";
    pub const BUILDING: &str = "building";
    pub const NAME: &str = "name";
    pub const LEVELS: &str = "building:levels";
}

/// Normalized, display-ready attributes of one building.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildingAttributes {
    pub address: String,
    pub has_complete_address: bool,
    pub building_type: String,
    pub name: String,
    pub levels: String,
}

impl BuildingAttributes {
    /// Resolves every attribute of `feature`.
    #[must_use]
    pub fn resolve(feature: &RawFeature) -> Self {
        let address = AddressParts {
            housenumber: present(feature, keys::HOUSENUMBER),
            street: present(feature, keys::STREET),
            city: present(feature, keys::CITY),
            state: present(feature, keys::STATE),
            postcode: present(feature, keys::POSTCODE),
        };

        let building_type = normalize_building_type(
            non_blank(feature, keys::BUILDING).unwrap_or(DEFAULT_BUILDING_TYPE),
        );

        Self {
            address: address.formatted(),
            has_complete_address: address.is_complete(),
            building_type,
            name: or_default(feature, keys::NAME, DEFAULT_NAME),
            levels: or_default(feature, keys::LEVELS, DEFAULT_LEVELS),
        }
    }
}

/// Replaces a bare `yes` building tag (any case) with
/// [`UNKNOWN_BUILDING_TYPE`]. Every other value passes through unchanged.
#[must_use]
pub fn normalize_building_type(value: &str) -> String {
    if value.eq_ignore_ascii_case("yes") {
        UNKNOWN_BUILDING_TYPE.to_string()
    } else {
        value.to_string()
    }
}

#[derive(Debug, Default)]
struct AddressParts<'a> {
    housenumber: Option<&'a str>,
    street: Option<&'a str>,
    city: Option<&'a str>,
    state: Option<&'a str>,
    postcode: Option<&'a str>,
}

impl AddressParts<'_> {
    fn street_line(&self) -> Option<String> {
        match (self.housenumber, self.street) {
            (Some(number), Some(street)) => Some(format!("{number} {street}")),
            (None, Some(street)) => Some(street.to_string()),
            _ => None,
        }
    }

    /// `"{street line}, {city}, {state}, {postcode}"`, skipping missing
    /// parts, or [`NO_ADDRESS`] if nothing is left.
    fn formatted(&self) -> String {
        let parts: Vec<String> = self
            .street_line()
            .into_iter()
            .chain(
                [self.city, self.state, self.postcode]
                    .into_iter()
                    .flatten()
                    .map(str::to_string),
            )
            .collect();

        if parts.is_empty() {
            NO_ADDRESS.to_string()
        } else {
            parts.join(", ")
        }
    }

    /// Street-level detail and a city are both present. Nothing inside the
    /// search consumes this; it is carried through for callers.
    const fn is_complete(&self) -> bool {
        self.street.is_some() && self.city.is_some()
    }
}

/// The trimmed value of `key`, unless it is blank.
fn non_blank<'a>(feature: &'a RawFeature, key: &str) -> Option<&'a str> {
    feature
        .attribute(key)
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// A non-blank value that is not the textual placeholder `"nan"`.
fn present<'a>(feature: &'a RawFeature, key: &str) -> Option<&'a str> {
    non_blank(feature, key).filter(|v| *v != "nan")
}

fn or_default(feature: &RawFeature, key: &str, default: &str) -> String {
    non_blank(feature, key).unwrap_or(default).to_string()
}
