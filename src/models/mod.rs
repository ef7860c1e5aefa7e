use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name used when the listing page has no usable `<title>`
pub const UNKNOWN_NAME: &str = "Unknown Property";

/// Placeholder for price/size fields the page did not expose
pub const UNKNOWN_FIELD: &str = "Unknown";

/// Prefix of the name carried by a listing whose page could not be fetched or parsed
pub const FETCH_ERROR_PREFIX: &str = "Error fetching property";

/// Listing data scraped from one fetch of a listing page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListingRecord {
    pub url: String,
    pub name: String,
    pub price: String,
    pub size: String,
    pub address: Option<String>,
    pub scraped_at: DateTime<Utc>,
}

impl ListingRecord {
    /// Degraded record for a listing whose fetch or parse failed
    pub fn fetch_failed(url: impl Into<String>, cause: impl fmt::Display) -> Self {
        Self {
            url: url.into(),
            name: format!("{FETCH_ERROR_PREFIX}: {cause}"),
            price: UNKNOWN_FIELD.to_string(),
            size: UNKNOWN_FIELD.to_string(),
            address: None,
            scraped_at: Utc::now(),
        }
    }

    pub fn is_fetch_failure(&self) -> bool {
        self.name.starts_with(FETCH_ERROR_PREFIX)
    }
}

/// A latitude/longitude pair in degrees
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// A facility returned by the facility search, before ranking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FacilityCandidate {
    pub name: String,
    pub point: GeoPoint,
}

/// Why an enrichment lookup broke, as opposed to legitimately finding nothing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupFailure {
    CouldNotGeocode { cause: String },
    FacilitySearchFailed { cause: String },
}

impl LookupFailure {
    pub fn cause(&self) -> &str {
        match self {
            LookupFailure::CouldNotGeocode { cause } => cause,
            LookupFailure::FacilitySearchFailed { cause } => cause,
        }
    }
}

impl fmt::Display for LookupFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupFailure::CouldNotGeocode { .. } => write!(f, "could not geocode"),
            LookupFailure::FacilitySearchFailed { .. } => write!(f, "hospital search failed"),
        }
    }
}

/// Result of geocoding a single address
#[derive(Debug, Clone, PartialEq)]
pub enum GeocodeOutcome {
    Found(GeoPoint),
    /// No address to query, or the service returned zero matches
    NotFound,
    Failed(LookupFailure),
}

/// Nearest qualifying facility for a listing.
///
/// Both fields absent with no `failure_reason` means the lookups ran and found
/// nothing. A `failure_reason` means a lookup itself broke.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichmentResult {
    pub facility_name: Option<String>,
    pub distance_miles: Option<f64>,
    pub failure_reason: Option<LookupFailure>,
}

impl EnrichmentResult {
    pub fn found(name: impl Into<String>, distance_miles: f64) -> Self {
        Self {
            facility_name: Some(name.into()),
            distance_miles: Some(distance_miles),
            failure_reason: None,
        }
    }

    pub fn not_found() -> Self {
        Self::default()
    }

    pub fn failed(reason: LookupFailure) -> Self {
        Self {
            failure_reason: Some(reason),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_failed_record_degrades_every_field() {
        let record = ListingRecord::fetch_failed("https://www.zillow.com/x", "unexpected status 500");
        assert_eq!(record.name, "Error fetching property: unexpected status 500");
        assert_eq!(record.price, UNKNOWN_FIELD);
        assert_eq!(record.size, UNKNOWN_FIELD);
        assert!(record.address.is_none());
        assert!(record.is_fetch_failure());
    }

    #[test]
    fn failure_reason_renders_sentinel_text() {
        let reason = LookupFailure::CouldNotGeocode {
            cause: "timed out".into(),
        };
        assert_eq!(reason.to_string(), "could not geocode");
        assert_eq!(reason.cause(), "timed out");
    }

    #[test]
    fn not_found_is_distinct_from_failure() {
        assert!(EnrichmentResult::not_found().failure_reason.is_none());
        let failed = EnrichmentResult::failed(LookupFailure::FacilitySearchFailed {
            cause: "bad json".into(),
        });
        assert!(failed.failure_reason.is_some());
        assert!(failed.facility_name.is_none());
        assert!(failed.distance_miles.is_none());
    }
}
