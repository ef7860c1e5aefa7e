use crate::models::ListingRecord;
use async_trait::async_trait;

/// Common trait for listing sources.
/// A scrape never fails outright: problems degrade the returned record.
#[async_trait]
pub trait ScraperTrait: Send + Sync {
    /// Fetch and parse one listing page
    async fn scrape(&self, url: &str) -> ListingRecord;

    /// Get the name of the scraper source
    fn source_name(&self) -> &'static str;
}
