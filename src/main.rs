use anyhow::{Context, Result};
use clap::Parser;
use listing_scout::bot::{self, ConsoleTransport, DiscordTransport, MessageHandler};
use listing_scout::config::{load_token, BotConfig, Cli, TransportKind};
use listing_scout::geo::{Geocoder, OverpassLocator};
use listing_scout::http::{Fetcher, ReqwestFetcher};
use listing_scout::pipeline::ListingPipeline;
use listing_scout::scrapers::ZillowScraper;
use listing_scout::store::SqliteStore;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = BotConfig::from(Cli::parse());
    info!("🏠 Listing Scout watching for {} links", config.listing_host);

    // Credentials first: nothing runs without them
    let token = match config.transport {
        TransportKind::Discord => Some(load_token(&config.token_file)?),
        TransportKind::Console => None,
    };

    let store = SqliteStore::open(&config.db_path, config.persist_mode)?;
    let fetcher: Arc<dyn Fetcher> = Arc::new(ReqwestFetcher::new()?);

    let scraper = ZillowScraper::with_settings(fetcher.clone(), config.scrape.clone());
    let geocoder = Geocoder::new(
        fetcher.clone(),
        config.geocoder_url.clone(),
        config.api_user_agent.clone(),
        config.geocode_timeout,
    );
    let locator = OverpassLocator::new(
        fetcher,
        config.overpass_url.clone(),
        config.api_user_agent.clone(),
        config.search_radius_meters,
        config.facility_timeout,
    );
    let pipeline = ListingPipeline::new(
        Arc::new(scraper),
        geocoder,
        Arc::new(locator),
        Arc::new(store),
    );
    let handler = MessageHandler::new(pipeline, bot::link_pattern(&config.listing_host)?);

    match token {
        Some(token) => {
            if config.channel_ids.is_empty() {
                anyhow::bail!("No Discord channels configured; pass --channels");
            }
            let mut transport = DiscordTransport::connect(token, config.channel_ids.clone())
                .await
                .context("Failed to connect to Discord")?;
            bot::run(&mut transport, &handler, config.poll_interval).await
        }
        None => {
            info!("Paste listing links, one message per line (Ctrl-D to quit)");
            let mut transport = ConsoleTransport::new();
            bot::run(&mut transport, &handler, config.poll_interval).await
        }
    }
}
