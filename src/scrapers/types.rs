use std::time::Duration;

/// Fields the listing parser recovers from a page
#[derive(Debug, Clone, PartialEq)]
pub struct ListingDetails {
    /// Page title with the site suffix removed
    pub name: String,
    /// First dollar amount on the page, or "Unknown"
    pub price: String,
    /// First square-footage figure on the page, or "Unknown"
    pub size: String,
}

/// Settings for fetching listing pages
#[derive(Debug, Clone)]
pub struct ScrapeSettings {
    /// Suffix the site appends to every page title
    pub title_suffix: String,
    /// Timeout for one page fetch
    pub page_timeout: Duration,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            title_suffix: " | Zillow".to_string(),
            page_timeout: Duration::from_secs(10),
        }
    }
}
