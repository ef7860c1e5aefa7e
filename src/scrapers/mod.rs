pub mod address;
pub mod listing;
pub mod traits;
pub mod types;
pub mod zillow;

pub use address::{resolve_address, AddressStrategy};
pub use listing::parse_listing;
pub use traits::ScraperTrait;
pub use types::{ListingDetails, ScrapeSettings};
pub use zillow::ZillowScraper;
