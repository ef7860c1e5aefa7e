use crate::geo::facility::OVERPASS_INTERPRETER_URL;
use crate::geo::geocoder::NOMINATIM_SEARCH_URL;
use crate::scrapers::ScrapeSettings;
use crate::store::PersistMode;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransportKind {
    /// Read messages from stdin, reply on stdout
    Console,
    /// Poll Discord channels over the REST API
    Discord,
}

/// Watches chat messages for listing links and records nearby hospitals
#[derive(Debug, Clone, Parser)]
#[command(name = "listing-scout", version, about)]
pub struct Cli {
    /// Chat transport to run
    #[arg(long, value_enum, env = "SCOUT_TRANSPORT", default_value = "console")]
    pub transport: TransportKind,

    /// File whose first line is the bot token
    #[arg(long, env = "SCOUT_TOKEN_FILE", default_value = "Data/token.dat")]
    pub token_file: PathBuf,

    /// Discord channel ids to watch (comma separated)
    #[arg(long, env = "SCOUT_CHANNELS", value_delimiter = ',')]
    pub channels: Vec<String>,

    /// SQLite database file
    #[arg(long, env = "SCOUT_DB", default_value = "Data/zillow_properties.db")]
    pub db: PathBuf,

    /// Which columns to persist
    #[arg(long, value_enum, env = "SCOUT_PERSIST", default_value = "full")]
    pub persist: PersistMode,

    /// Listing site host to watch for
    #[arg(long, env = "SCOUT_LISTING_HOST", default_value = "zillow.com")]
    pub listing_host: String,

    /// Seconds between channel polls
    #[arg(long, env = "SCOUT_POLL_SECS", default_value_t = 3)]
    pub poll_secs: u64,

    /// Geocoding search endpoint
    #[arg(long, env = "SCOUT_GEOCODER_URL", default_value = NOMINATIM_SEARCH_URL)]
    pub geocoder_url: String,

    /// Overpass interpreter endpoint
    #[arg(long, env = "SCOUT_OVERPASS_URL", default_value = OVERPASS_INTERPRETER_URL)]
    pub overpass_url: String,

    /// Hospital search radius in meters
    #[arg(long, env = "SCOUT_RADIUS_M", default_value_t = 100_000)]
    pub radius_meters: u32,
}

/// Startup configuration, built once and handed to constructors
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub transport: TransportKind,
    pub token_file: PathBuf,
    pub channel_ids: Vec<String>,
    pub db_path: PathBuf,
    pub persist_mode: PersistMode,
    pub listing_host: String,
    pub scrape: ScrapeSettings,
    pub poll_interval: Duration,
    pub geocoder_url: String,
    pub geocode_timeout: Duration,
    pub overpass_url: String,
    pub facility_timeout: Duration,
    pub search_radius_meters: u32,
    /// User agent sent to the geodata services
    pub api_user_agent: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Console,
            token_file: PathBuf::from("Data/token.dat"),
            channel_ids: Vec::new(),
            db_path: PathBuf::from("Data/zillow_properties.db"),
            persist_mode: PersistMode::Full,
            listing_host: "zillow.com".to_string(),
            scrape: ScrapeSettings::default(),
            poll_interval: Duration::from_secs(3),
            geocoder_url: NOMINATIM_SEARCH_URL.to_string(),
            geocode_timeout: Duration::from_secs(10),
            overpass_url: OVERPASS_INTERPRETER_URL.to_string(),
            facility_timeout: Duration::from_secs(25),
            search_radius_meters: 100_000,
            api_user_agent: concat!("listing-scout/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl From<Cli> for BotConfig {
    fn from(cli: Cli) -> Self {
        Self {
            transport: cli.transport,
            token_file: cli.token_file,
            channel_ids: cli
                .channels
                .into_iter()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect(),
            db_path: cli.db,
            persist_mode: cli.persist,
            listing_host: cli.listing_host,
            poll_interval: Duration::from_secs(cli.poll_secs),
            geocoder_url: cli.geocoder_url,
            overpass_url: cli.overpass_url,
            search_radius_meters: cli.radius_meters,
            ..Self::default()
        }
    }
}

/// Read the bot token from the first line of `path`
pub fn load_token(path: &Path) -> Result<String> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read token file {}", path.display()))?;
    let token = contents.lines().next().unwrap_or("").trim().to_string();
    if token.is_empty() {
        anyhow::bail!(
            "Token file {} is empty; put the bot token on its first line",
            path.display()
        );
    }
    Ok(token)
}
