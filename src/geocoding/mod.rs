//! Place name resolution for the weather path.
//!
//! A bare city name is looked up once for several candidates and the best one
//! is picked; a "city, region" input is tried as a fixed sequence of
//! progressively less specific queries, taking the first hit.


use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::Result;

/// Candidates requested for a city-only lookup
pub const CITY_CANDIDATE_LIMIT: usize = 5;
const DEFAULT_COUNTRY: &str = "US";

/// Cities whose name is shared by smaller places elsewhere, with the country meant by default
const PREFERRED_COUNTRIES: &[(&str, &str)] = &[
    ("delhi", "IN"),
    ("new delhi", "IN"),
    ("paris", "FR"),
    ("london", "GB"),
    ("berlin", "DE"),
    ("madrid", "ES"),
    ("rome", "IT"),
    ("tokyo", "JP"),
    ("osaka", "JP"),
    ("seoul", "KR"),
    ("singapore", "SG"),
    ("shanghai", "CN"),
    ("beijing", "CN"),
    ("mexico city", "MX"),
    ("sydney", "AU"),
    ("toronto", "CA"),
    ("vancouver", "CA"),
];

/// One match returned by a geocoding service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoCandidate {
    #[serde(default)]
    pub name: String,
    /// ISO 3166 alpha-2 country code
    #[serde(default)]
    pub country: String,
    pub lat: f64,
    pub lon: f64,
    /// `None` when the service did not report a usable population
    #[serde(default, deserialize_with = "lenient_population")]
    pub population: Option<u64>,
    #[serde(default)]
    pub state: Option<String>,
}

impl GeoCandidate {
    #[inline]
    pub fn coordinates(&self) -> Coordinates {
        Coordinates {
            lat: self.lat,
            lon: self.lon,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl fmt::Display for Coordinates {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}, {:.4}", self.lat, self.lon)
    }
}

/// Forward geocoding: free text to candidate places
pub trait GeocodingService {
    /// Return up to `limit` candidates for `query`, best match first as the
    /// service sees it. An empty list means no match.
    fn direct(&self, query: &str, limit: usize) -> Result<Vec<GeoCandidate>>;
}

/// Accepts a number, a numeric string, null or nothing. Zero and negative
/// values count as unknown.
fn lenient_population<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    let value = match raw {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    Ok(value
        .filter(|v| v.is_finite() && *v >= 1.0)
        .map(|v| v.trunc() as u64))
}

/// Country expected for a well-known ambiguous city name
#[inline]
pub fn preferred_country(city: &str) -> Option<&'static str> {
    let city = city.trim().to_lowercase();
    PREFERRED_COUNTRIES
        .iter()
        .find(|(name, _)| *name == city)
        .map(|&(_, country)| country)
}

/// Choose among city-only candidates: the expected country for well-known
/// cities, else the largest known population, else the first candidate.
#[inline]
pub fn pick_best_location<'c>(city: &str, candidates: &'c [GeoCandidate]) -> Option<&'c GeoCandidate> {
    let preferred = preferred_country(city).and_then(|country| {
        candidates
            .iter()
            .find(|c| c.country.eq_ignore_ascii_case(country))
    });
    if preferred.is_some() {
        return preferred;
    }

    let mut best: Option<(&GeoCandidate, u64)> = None;
    for candidate in candidates {
        let Some(population) = candidate.population else {
            continue;
        };
        if best.is_none_or(|(_, best_population)| population > best_population) {
            best = Some((candidate, population));
        }
    }

    best.map(|(candidate, _)| candidate).or_else(|| candidates.first())
}

/// Queries tried, in order, for a "city, region" input
#[inline]
pub fn region_query_variants(city: &str, region: &str) -> [String; 4] {
    [
        format!("{city},{region},{DEFAULT_COUNTRY}"),
        format!("{city},{region}"),
        format!("{city},{DEFAULT_COUNTRY}"),
        city.to_string(),
    ]
}

/// Resolves place names through a [`GeocodingService`]
pub struct Geocoder<'a, S: GeocodingService + ?Sized> {
    service: &'a S,
}

impl<'a, S: GeocodingService + ?Sized> Geocoder<'a, S> {
    #[inline]
    pub fn new(service: &'a S) -> Self {
        Self { service }
    }

    /// Resolve `place` to coordinates. `Ok(None)` means nothing matched;
    /// service failures propagate unretried.
    #[inline]
    pub fn geocode(&self, place: &str) -> Result<Option<Coordinates>> {
        let parts: Vec<&str> = place
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();

        match parts.as_slice() {
            [] => {
                debug!("Empty place name, nothing to geocode");
                Ok(None)
            }
            [city] => self.geocode_city(city),
            [city, region, ..] => self.geocode_with_region(city, region),
        }
    }

    fn geocode_city(&self, city: &str) -> Result<Option<Coordinates>> {
        let candidates = self.service.direct(city, CITY_CANDIDATE_LIMIT)?;
        debug!("{} candidates for {:?}", candidates.len(), city);

        Ok(pick_best_location(city, &candidates).map(GeoCandidate::coordinates))
    }

    fn geocode_with_region(&self, city: &str, region: &str) -> Result<Option<Coordinates>> {
        for query in region_query_variants(city, region) {
            if let Some(candidate) = self.service.direct(&query, 1)?.first() {
                debug!("Resolved {:?} via {:?}", city, query);
                return Ok(Some(candidate.coordinates()));
            }
        }

        debug!("No variant of {:?}, {:?} resolved", city, region);
        Ok(None)
    }
}
