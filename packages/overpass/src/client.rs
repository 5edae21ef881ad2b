//! HTTP client for the Overpass API interpreter.
//!
//! Issues a single `around:` query per attempt with inline geometry
//! (`out tags geom`) so no second node lookup is needed, then assembles
//! closed ways and multipolygon relations into footprints.
//!
//! See <https://wiki.openstreetmap.org/wiki/Overpass_API/Overpass_QL>

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr as _;

use async_trait::async_trait;
use geo::{Contains, Coord, LineString, MultiPolygon, Point, Polygon};
use serde::Deserialize;

use crate::{
    BuildingSource, EndpointError, FetchRequest,
    feature::{ElementType, FeatureId, RawFeature},
    registry::Endpoint,
};

const USER_AGENT: &str = concat!("building_finder/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OverpassElement>,
    remark: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OverpassElement {
    #[serde(rename = "type")]
    element_type: String,
    id: i64,
    #[serde(default)]
    tags: HashMap<String, String>,
    geometry: Option<Vec<LatLon>>,
    #[serde(default)]
    members: Vec<OverpassMember>,
}

#[derive(Debug, Deserialize)]
struct OverpassMember {
    #[serde(rename = "type")]
    member_type: String,
    #[serde(default)]
    role: String,
    geometry: Option<Vec<LatLon>>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct LatLon {
    lat: f64,
    lon: f64,
}

/// [`BuildingSource`] backed by a live Overpass interpreter.
#[derive(Debug, Clone)]
pub struct OverpassClient {
    client: reqwest::Client,
}

impl OverpassClient {
    /// Creates a client with the default user agent.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::Request`] if the TLS backend cannot be
    /// initialised.
    pub fn new() -> Result<Self, EndpointError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| EndpointError::Request(e.to_string()))?;
        Ok(Self::with_client(client))
    }

    /// Wraps an existing `reqwest` client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BuildingSource for OverpassClient {
    async fn fetch(
        &self,
        endpoint: &Endpoint,
        request: &FetchRequest,
    ) -> Result<Vec<RawFeature>, EndpointError> {
        let query = build_query(request);

        let resp = self
            .client
            .post(&endpoint.url)
            .timeout(request.timeout)
            .form(&[("data", query.as_str())])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(EndpointError::Status {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string(),
            });
        }

        let body = resp.text().await?;
        parse_response(&body)
    }
}

/// Builds the Overpass QL query for every way and relation carrying
/// `request.tag` within `request.radius_m` meters of the center.
#[must_use]
pub fn build_query(request: &FetchRequest) -> String {
    let FetchRequest {
        longitude: lon,
        latitude: lat,
        radius_m: r,
        tag,
        timeout,
    } = request;
    let timeout_secs = timeout.as_secs().max(1);

    format!(
        "[out:json][timeout:{timeout_secs}];\
         (way[\"{tag}\"](around:{r},{lat},{lon});\
         relation[\"{tag}\"](around:{r},{lat},{lon}););\
         out tags geom;"
    )
}

/// Parses an Overpass JSON response into footprints.
///
/// # Errors
///
/// Returns [`EndpointError::Parse`] for malformed JSON,
/// [`EndpointError::Status`] for an Overpass runtime error, and
/// [`EndpointError::NoMatchingFeatures`] if no element yields a polygon.
pub fn parse_response(body: &str) -> Result<Vec<RawFeature>, EndpointError> {
    let response: OverpassResponse =
        serde_json::from_str(body).map_err(|e| EndpointError::Parse {
            message: format!("invalid Overpass JSON: {e}"),
        })?;

    if let Some(remark) = response
        .remark
        .as_deref()
        .filter(|r| r.contains("runtime error"))
    {
        return Err(EndpointError::Status {
            status: 200,
            message: remark.to_string(),
        });
    }

    let mut features = Vec::with_capacity(response.elements.len());
    for element in response.elements {
        let Ok(element_type) = ElementType::from_str(&element.element_type) else {
            log::trace!("Skipping unknown element type {}", element.element_type);
            continue;
        };

        let geometry = match element_type {
            ElementType::Way => element
                .geometry
                .as_deref()
                .and_then(closed_ring)
                .map(|ring| MultiPolygon(vec![Polygon::new(ring, Vec::new())])),
            ElementType::Relation => assemble_relation(&element.members),
            ElementType::Node => None,
        };

        let Some(geometry) = geometry else {
            log::debug!(
                "Dropping {element_type} {} without a closed footprint",
                element.id
            );
            continue;
        };

        features.push(RawFeature::from_tags(
            FeatureId(element_type, element.id),
            geometry,
            element.tags.into_iter().collect::<BTreeMap<_, _>>(),
        ));
    }

    if features.is_empty() {
        return Err(EndpointError::NoMatchingFeatures);
    }

    Ok(features)
}

/// Converts an inline geometry to a closed ring, or `None` if it is open
/// or degenerate.
#[allow(clippy::float_cmp)]
fn closed_ring(points: &[LatLon]) -> Option<LineString<f64>> {
    if points.len() < 4 {
        return None;
    }
    let first = points.first()?;
    let last = points.last()?;
    if first.lat != last.lat || first.lon != last.lon {
        return None;
    }

    Some(LineString::from(
        points
            .iter()
            .map(|p| Coord { x: p.lon, y: p.lat })
            .collect::<Vec<_>>(),
    ))
}

/// Builds a multipolygon from `outer`/`inner` way members. Member ways are
/// first joined end to end into rings; each inner ring becomes a hole of the
/// first outer ring that contains it.
fn assemble_relation(members: &[OverpassMember]) -> Option<MultiPolygon<f64>> {
    let mut outer_ways: Vec<Vec<LatLon>> = Vec::new();
    let mut inner_ways: Vec<Vec<LatLon>> = Vec::new();

    for member in members.iter().filter(|m| m.member_type == "way") {
        let Some(geometry) = member.geometry.clone().filter(|g| g.len() >= 2) else {
            continue;
        };
        match member.role.as_str() {
            "inner" => inner_ways.push(geometry),
            _ => outer_ways.push(geometry),
        }
    }

    let mut outers: Vec<(LineString<f64>, Vec<LineString<f64>>)> = join_ways(outer_ways)
        .iter()
        .filter_map(|ring| closed_ring(ring))
        .map(|ring| (ring, Vec::new()))
        .collect();
    let inners: Vec<LineString<f64>> = join_ways(inner_ways)
        .iter()
        .filter_map(|ring| closed_ring(ring))
        .collect();

    for inner in inners {
        let Some(first) = inner.0.first().map(|c| Point::from(*c)) else {
            continue;
        };
        if let Some((_, holes)) = outers
            .iter_mut()
            .find(|(shell, _)| Polygon::new(shell.clone(), Vec::new()).contains(&first))
        {
            holes.push(inner);
        }
    }

    if outers.is_empty() {
        return None;
    }

    Some(MultiPolygon(
        outers
            .into_iter()
            .map(|(shell, holes)| Polygon::new(shell, holes))
            .collect(),
    ))
}

#[allow(clippy::float_cmp)]
fn same_point(a: &LatLon, b: &LatLon) -> bool {
    a.lat == b.lat && a.lon == b.lon
}

fn is_closed(way: &[LatLon]) -> bool {
    match (way.first(), way.last()) {
        (Some(first), Some(last)) => way.len() > 1 && same_point(first, last),
        _ => false,
    }
}

/// Joins ways that share endpoints into longer chains, reversing ways where
/// needed. Ways that are already closed pass through unchanged; chains that
/// cannot be closed are returned open and rejected later by
/// [`closed_ring`].
fn join_ways(ways: Vec<Vec<LatLon>>) -> Vec<Vec<LatLon>> {
    let (mut rings, mut open): (Vec<_>, Vec<_>) = ways.into_iter().partition(|w| is_closed(w));

    while let Some(mut chain) = open.pop() {
        while !is_closed(&chain) {
            let Some(end) = chain.last().copied() else {
                break;
            };
            let Some(idx) = open.iter().position(|way| {
                way.first().is_some_and(|p| same_point(p, &end))
                    || way.last().is_some_and(|p| same_point(p, &end))
            }) else {
                break;
            };

            let mut next = open.swap_remove(idx);
            if next.last().is_some_and(|p| same_point(p, &end)) {
                next.reverse();
            }
            chain.extend(next.into_iter().skip(1));
        }
        rings.push(chain);
    }

    rings
}
