use crate::http::{browser_headers, FetchError, Fetcher, HttpRequest};
use crate::models::ListingRecord;
use crate::scrapers::address::resolve_address;
use crate::scrapers::listing::parse_listing;
use crate::scrapers::traits::ScraperTrait;
use crate::scrapers::types::ScrapeSettings;
use async_trait::async_trait;
use chrono::Utc;
use scraper::Html;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Zillow listing scraper
pub struct ZillowScraper {
    fetcher: Arc<dyn Fetcher>,
    settings: ScrapeSettings,
}

impl ZillowScraper {
    /// Create a new Zillow scraper with default settings
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self::with_settings(fetcher, ScrapeSettings::default())
    }

    /// Create a new Zillow scraper with custom settings
    pub fn with_settings(fetcher: Arc<dyn Fetcher>, settings: ScrapeSettings) -> Self {
        Self { fetcher, settings }
    }

    async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        let request = HttpRequest::get(url)
            .headers(browser_headers())
            .timeout(self.settings.page_timeout);

        let response = self.fetcher.fetch(request).await?.error_for_status()?;
        debug!("Downloaded {} bytes of HTML", response.body.len());
        Ok(response.body)
    }

    /// Parse a fetched listing page into a record
    pub fn parse_page(&self, url: &str, html: &str) -> ListingRecord {
        let document = Html::parse_document(html);
        let details = parse_listing(&document, &self.settings.title_suffix);
        let address = resolve_address(&document, &details.name);

        ListingRecord {
            url: url.to_string(),
            name: details.name,
            price: details.price,
            size: details.size,
            address,
            scraped_at: Utc::now(),
        }
    }
}

#[async_trait]
impl ScraperTrait for ZillowScraper {
    async fn scrape(&self, url: &str) -> ListingRecord {
        info!("Fetching listing {}", url);

        match self.fetch_page(url).await {
            Ok(html) => {
                let record = self.parse_page(url, &html);
                info!(
                    "Parsed listing: {} | {} | {} | address: {:?}",
                    record.name, record.price, record.size, record.address
                );
                record
            }
            Err(e) => {
                warn!("Failed to fetch listing {}: {}", url, e);
                ListingRecord::fetch_failed(url, e)
            }
        }
    }

    fn source_name(&self) -> &'static str {
        "Zillow"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpResponse;
    use crate::models::UNKNOWN_FIELD;
    use std::sync::Mutex;

    struct OneShot {
        response: Mutex<Option<Result<HttpResponse, FetchError>>>,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl OneShot {
        fn new(response: Result<HttpResponse, FetchError>) -> Arc<Self> {
            Arc::new(Self {
                response: Mutex::new(Some(response)),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Fetcher for OneShot {
        async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse, FetchError> {
            self.seen.lock().unwrap().push(request);
            self.response.lock().unwrap().take().unwrap()
        }
    }

    #[tokio::test]
    async fn scrape_sends_browser_headers_and_parses() {
        let fetcher = OneShot::new(Ok(HttpResponse {
            status: 200,
            body: "<html><head><title>1 Loop Rd, Cupertino, CA 95014 | Zillow</title></head>\
                   <body><span>$2,500,000</span><span>3,000 sqft</span></body></html>"
                .into(),
        }));
        let scraper = ZillowScraper::new(fetcher.clone());

        let record = scraper.scrape("https://www.zillow.com/homedetails/1").await;
        assert_eq!(record.name, "1 Loop Rd, Cupertino, CA 95014");
        assert_eq!(record.price, "$2,500,000");
        assert_eq!(record.size, "3,000 sqft");
        assert_eq!(record.address.as_deref(), Some("1 Loop Rd 95014"));

        let seen = fetcher.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].headers.iter().any(|(k, _)| k == "User-Agent"));
        assert!(seen[0].headers.iter().any(|(k, _)| k == "Referer"));
        assert_eq!(seen[0].timeout, ScrapeSettings::default().page_timeout);
    }

    #[tokio::test]
    async fn server_error_degrades_record() {
        let fetcher = OneShot::new(Ok(HttpResponse {
            status: 500,
            body: "oops".into(),
        }));
        let record = ZillowScraper::new(fetcher)
            .scrape("https://www.zillow.com/homedetails/2")
            .await;
        assert_eq!(record.name, "Error fetching property: unexpected status 500");
        assert_eq!(record.price, UNKNOWN_FIELD);
        assert_eq!(record.size, UNKNOWN_FIELD);
        assert!(record.address.is_none());
    }

    #[tokio::test]
    async fn timeout_degrades_record() {
        let fetcher = OneShot::new(Err(FetchError::Timeout));
        let record = ZillowScraper::new(fetcher)
            .scrape("https://www.zillow.com/homedetails/3")
            .await;
        assert_eq!(record.name, "Error fetching property: request timed out");
        assert!(record.address.is_none());
    }
}
