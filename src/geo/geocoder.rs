use crate::http::{Fetcher, HttpRequest};
use crate::models::{GeoPoint, GeocodeOutcome, LookupFailure};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const NOMINATIM_SEARCH_URL: &str = "https://nominatim.openstreetmap.org/search";

static MLS_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)MLS\s*#?\w+").unwrap());

#[derive(Debug, Deserialize)]
struct NominatimHit {
    lat: String,
    lon: String,
}

/// Strip everything after the first pipe and any MLS number token
pub fn clean_address(address: &str) -> String {
    let head = address.split('|').next().unwrap_or("");
    let stripped = MLS_NUMBER.replace_all(head, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Free-text geocoder backed by a Nominatim-compatible search endpoint.
/// Single attempt per call, first match only.
pub struct Geocoder {
    fetcher: Arc<dyn Fetcher>,
    endpoint: String,
    user_agent: String,
    timeout: Duration,
}

impl Geocoder {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        endpoint: impl Into<String>,
        user_agent: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            endpoint: endpoint.into(),
            user_agent: user_agent.into(),
            timeout,
        }
    }

    pub async fn geocode(&self, address: Option<&str>) -> GeocodeOutcome {
        let Some(address) = address else {
            info!("No address provided, skipping geocoding");
            return GeocodeOutcome::NotFound;
        };

        let query = clean_address(address);
        if query.is_empty() {
            info!("Address '{}' is empty after cleaning", address);
            return GeocodeOutcome::NotFound;
        }

        info!("Geocoding address: {}", query);
        match self.query(&query).await {
            Ok(Some(point)) => {
                debug!("Geocoded '{}' to {:?}", query, point);
                GeocodeOutcome::Found(point)
            }
            Ok(None) => {
                info!("No geocoding result for '{}'", query);
                GeocodeOutcome::NotFound
            }
            Err(cause) => {
                warn!("Geocoding '{}' failed: {}", query, cause);
                GeocodeOutcome::Failed(LookupFailure::CouldNotGeocode { cause })
            }
        }
    }

    async fn query(&self, query: &str) -> Result<Option<GeoPoint>, String> {
        let request = HttpRequest::get(&self.endpoint)
            .query("q", query)
            .query("format", "json")
            .query("limit", "1")
            .header("User-Agent", &self.user_agent)
            .timeout(self.timeout);

        let response = self
            .fetcher
            .fetch(request)
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| e.to_string())?;

        let hits: Vec<NominatimHit> =
            serde_json::from_str(&response.body).map_err(|e| format!("malformed response: {e}"))?;

        let Some(hit) = hits.first() else {
            return Ok(None);
        };
        let latitude = hit
            .lat
            .parse::<f64>()
            .map_err(|e| format!("bad latitude '{}': {e}", hit.lat))?;
        let longitude = hit
            .lon
            .parse::<f64>()
            .map_err(|e| format!("bad longitude '{}': {e}", hit.lon))?;

        Ok(Some(GeoPoint::new(latitude, longitude)))
    }
}
