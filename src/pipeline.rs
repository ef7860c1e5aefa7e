//! Per-link pipeline: fetch and parse, geocode, locate, persist.
//!
//! Each stage only moves forward, either to a value or to "absent"/a failure
//! sentinel. Nothing is retried and nothing raised here reaches the caller.

use crate::geo::{FacilityLocator, Geocoder};
use crate::models::{EnrichmentResult, GeocodeOutcome, ListingRecord};
use crate::scrapers::ScraperTrait;
use crate::store::RecordSink;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutcome {
    pub record: ListingRecord,
    pub enrichment: EnrichmentResult,
    /// `true` if the sink wrote a new row, `false` for a duplicate URL or a sink error
    pub persisted: bool,
    /// `true` if the sink accepted the write (new row or ignored duplicate)
    pub sink_ok: bool,
}

pub struct ListingPipeline {
    scraper: Arc<dyn ScraperTrait>,
    geocoder: Geocoder,
    locator: Arc<dyn FacilityLocator>,
    sink: Arc<dyn RecordSink>,
}

impl ListingPipeline {
    pub fn new(
        scraper: Arc<dyn ScraperTrait>,
        geocoder: Geocoder,
        locator: Arc<dyn FacilityLocator>,
        sink: Arc<dyn RecordSink>,
    ) -> Self {
        Self {
            scraper,
            geocoder,
            locator,
            sink,
        }
    }

    /// Geocode an address and look up the nearest facility.
    /// The address is sent to the geocoder at most once.
    pub async fn enrich(&self, address: Option<&str>) -> EnrichmentResult {
        match self.geocoder.geocode(address).await {
            GeocodeOutcome::Found(point) => self.locator.locate_nearest(point).await,
            GeocodeOutcome::NotFound => EnrichmentResult::not_found(),
            GeocodeOutcome::Failed(reason) => EnrichmentResult::failed(reason),
        }
    }

    /// Run one link to completion
    pub async fn process(&self, url: &str) -> PipelineOutcome {
        info!("Processing {} listing {}", self.scraper.source_name(), url);

        let record = self.scraper.scrape(url).await;
        if record.is_fetch_failure() {
            info!("No listing data for {}, saving it as a fetch failure", url);
        }

        let enrichment = self.enrich(record.address.as_deref()).await;
        if let Some(reason) = &enrichment.failure_reason {
            warn!("Hospital lookup for {} failed: {} ({})", url, reason, reason.cause());
        }

        let (persisted, sink_ok) = match self.sink.insert_or_ignore(&record, &enrichment) {
            Ok(true) => (true, true),
            Ok(false) => {
                info!("{} already saved, ignoring", url);
                (false, true)
            }
            Err(e) => {
                warn!("Could not save {}: {:#}", url, e);
                (false, false)
            }
        };

        PipelineOutcome {
            record,
            enrichment,
            persisted,
            sink_ok,
        }
    }
}
