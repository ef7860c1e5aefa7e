use crate::geo::distance::{haversine_miles, round_miles};
use crate::http::{Fetcher, HttpRequest};
use crate::models::{EnrichmentResult, FacilityCandidate, GeoPoint, LookupFailure};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const OVERPASS_INTERPRETER_URL: &str = "https://overpass-api.de/api/interpreter";

/// Finds the nearest qualifying facility to a point
#[async_trait]
pub trait FacilityLocator: Send + Sync {
    async fn locate_nearest(&self, origin: GeoPoint) -> EnrichmentResult;
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OverpassElement>,
}

#[derive(Debug, Deserialize)]
struct OverpassElement {
    lat: Option<f64>,
    lon: Option<f64>,
    center: Option<OverpassCenter>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct OverpassCenter {
    lat: f64,
    lon: f64,
}

impl OverpassElement {
    /// Hospitals tagged with an emergency department
    fn qualifies(&self) -> bool {
        self.tags.get("amenity").map(String::as_str) == Some("hospital")
            && self.tags.get("emergency").map(String::as_str) == Some("yes")
    }

    fn into_candidate(self) -> Option<FacilityCandidate> {
        if !self.qualifies() {
            return None;
        }
        let name = self.tags.get("name")?.trim().to_string();
        if name.is_empty() {
            return None;
        }
        let point = match (self.lat, self.lon, self.center) {
            (Some(lat), Some(lon), _) => GeoPoint::new(lat, lon),
            (_, _, Some(center)) => GeoPoint::new(center.lat, center.lon),
            _ => return None,
        };
        Some(FacilityCandidate { name, point })
    }
}

/// Pick the closest candidate. Ties keep the one seen first.
pub fn pick_nearest<I>(candidates: I) -> Option<(FacilityCandidate, f64)>
where
    I: IntoIterator<Item = (FacilityCandidate, f64)>,
{
    let mut best: Option<(FacilityCandidate, f64)> = None;
    for (candidate, miles) in candidates {
        match &best {
            Some((_, best_miles)) if miles >= *best_miles => {}
            _ => best = Some((candidate, miles)),
        }
    }
    best
}

/// Tag-query locator: hospitals with `emergency=yes` within a fixed radius,
/// via the Overpass API.
pub struct OverpassLocator {
    fetcher: Arc<dyn Fetcher>,
    endpoint: String,
    user_agent: String,
    radius_meters: u32,
    timeout: Duration,
}

impl OverpassLocator {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        endpoint: impl Into<String>,
        user_agent: impl Into<String>,
        radius_meters: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            endpoint: endpoint.into(),
            user_agent: user_agent.into(),
            radius_meters,
            timeout,
        }
    }

    pub fn build_query(&self, origin: GeoPoint) -> String {
        let around = format!(
            "(around:{},{},{})",
            self.radius_meters, origin.latitude, origin.longitude
        );
        let filter = r#"["amenity"="hospital"]["emergency"="yes"]"#;
        format!(
            "[out:json];\n(\n  node{filter}{around};\n  way{filter}{around};\n  relation{filter}{around};\n);\nout center;\n"
        )
    }

    async fn search(&self, origin: GeoPoint) -> Result<Vec<FacilityCandidate>, String> {
        let request = HttpRequest::post(&self.endpoint, self.build_query(origin))
            .header("User-Agent", &self.user_agent)
            .timeout(self.timeout);

        let response = self
            .fetcher
            .fetch(request)
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| e.to_string())?;

        let parsed: OverpassResponse =
            serde_json::from_str(&response.body).map_err(|e| format!("malformed response: {e}"))?;

        debug!("Overpass returned {} elements", parsed.elements.len());
        Ok(parsed
            .elements
            .into_iter()
            .filter_map(OverpassElement::into_candidate)
            .collect())
    }
}

#[async_trait]
impl FacilityLocator for OverpassLocator {
    async fn locate_nearest(&self, origin: GeoPoint) -> EnrichmentResult {
        let candidates = match self.search(origin).await {
            Ok(candidates) => candidates,
            Err(cause) => {
                warn!("Hospital lookup failed near {:?}: {}", origin, cause);
                return EnrichmentResult::failed(LookupFailure::FacilitySearchFailed { cause });
            }
        };

        let ranked = candidates.into_iter().map(|c| {
            let miles = haversine_miles(origin, c.point);
            (c, miles)
        });

        match pick_nearest(ranked) {
            Some((nearest, miles)) => {
                let miles = round_miles(miles);
                info!("Nearest hospital: {} ({} miles)", nearest.name, miles);
                EnrichmentResult::found(nearest.name, miles)
            }
            None => {
                info!("No hospital with an emergency department found near {:?}", origin);
                EnrichmentResult::not_found()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{FetchError, HttpResponse};
    use std::sync::Mutex;

    fn candidate(name: &str) -> FacilityCandidate {
        FacilityCandidate {
            name: name.to_string(),
            point: GeoPoint::new(0.0, 0.0),
        }
    }

    #[test]
    fn nearest_of_three_is_selected() {
        let picked = pick_nearest(vec![
            (candidate("A"), 12.3),
            (candidate("B"), 4.7),
            (candidate("C"), 9.0),
        ]);
        let (nearest, miles) = picked.unwrap();
        assert_eq!(nearest.name, "B");
        assert_eq!(miles, 4.7);
    }

    #[test]
    fn equal_distance_keeps_first_seen() {
        let picked = pick_nearest(vec![
            (candidate("first"), 3.0),
            (candidate("second"), 3.0),
        ]);
        assert_eq!(picked.unwrap().0.name, "first");
        assert!(pick_nearest(Vec::new()).is_none());
    }

    struct Canned {
        response: Result<(u16, String), ()>,
        bodies: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Fetcher for Canned {
        async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse, FetchError> {
            self.bodies
                .lock()
                .unwrap()
                .push(request.body.clone().unwrap_or_default());
            match &self.response {
                Ok((status, body)) => Ok(HttpResponse {
                    status: *status,
                    body: body.clone(),
                }),
                Err(()) => Err(FetchError::Transport("connection reset".into())),
            }
        }
    }

    fn locator(response: Result<(u16, String), ()>) -> (OverpassLocator, Arc<Canned>) {
        let fetcher = Arc::new(Canned {
            response,
            bodies: Mutex::new(Vec::new()),
        });
        let locator = OverpassLocator::new(
            fetcher.clone(),
            OVERPASS_INTERPRETER_URL,
            "listing-scout-test",
            100_000,
            Duration::from_secs(25),
        );
        (locator, fetcher)
    }

    const ORIGIN: GeoPoint = GeoPoint {
        latitude: 38.8977,
        longitude: -77.0365,
    };

    #[tokio::test]
    async fn nearest_qualifying_hospital_wins() {
        let body = r#"{"elements":[
            {"type":"node","lat":39.2904,"lon":-76.6122,
             "tags":{"amenity":"hospital","emergency":"yes","name":"Baltimore General"}},
            {"type":"way","center":{"lat":38.9296,"lon":-77.0146},
             "tags":{"amenity":"hospital","emergency":"yes","name":"Howard University Hospital"}},
            {"type":"node","lat":38.8980,"lon":-77.0360,
             "tags":{"amenity":"hospital","emergency":"no","name":"Walk-in Clinic"}},
            {"type":"node","lat":38.8978,"lon":-77.0366,
             "tags":{"amenity":"hospital","emergency":"yes"}},
            {"type":"relation",
             "tags":{"amenity":"hospital","emergency":"yes","name":"No Coordinates"}}
        ]}"#;
        let (locator, fetcher) = locator(Ok((200, body.to_string())));

        let result = locator.locate_nearest(ORIGIN).await;
        assert_eq!(
            result.facility_name.as_deref(),
            Some("Howard University Hospital")
        );
        let miles = result.distance_miles.unwrap();
        assert_eq!(miles, round_miles(miles));
        assert!(miles > 2.0 && miles < 3.0, "got {miles}");
        assert!(result.failure_reason.is_none());

        let sent = fetcher.bodies.lock().unwrap();
        assert!(sent[0].contains("around:100000,38.8977,-77.0365"));
        assert!(sent[0].contains(r#"relation["amenity"="hospital"]["emergency"="yes"]"#));
        assert!(sent[0].contains("out center;"));
    }

    #[tokio::test]
    async fn no_qualifying_elements_is_not_found() {
        let (locator, _) = locator(Ok((200, r#"{"elements":[]}"#.to_string())));
        assert_eq!(
            locator.locate_nearest(ORIGIN).await,
            EnrichmentResult::not_found()
        );
    }

    #[tokio::test]
    async fn broken_lookup_carries_failure_reason() {
        for response in [
            Err(()),
            Ok((429, "rate limited".to_string())),
            Ok((200, "not json".to_string())),
        ] {
            let (locator, _) = locator(response);
            let result = locator.locate_nearest(ORIGIN).await;
            assert!(result.facility_name.is_none());
            assert!(matches!(
                result.failure_reason,
                Some(LookupFailure::FacilitySearchFailed { .. })
            ));
        }
    }
}
