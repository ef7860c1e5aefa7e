//! Record sink: deduplicated listing persistence.

use crate::models::{EnrichmentResult, ListingRecord};
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS properties (
        id                      INTEGER PRIMARY KEY AUTOINCREMENT,
        url                     TEXT UNIQUE NOT NULL,
        name                    TEXT,
        price                   TEXT,
        size                    TEXT,
        address                 TEXT,
        facility_name           TEXT,
        facility_distance_miles REAL,
        scraped_at              TEXT
    );
";

/// Which columns get written
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PersistMode {
    /// Every column
    Full,
    /// Only url and name
    Minimal,
}

/// A row as stored
#[derive(Debug, Clone, PartialEq)]
pub struct StoredListing {
    pub url: String,
    pub name: Option<String>,
    pub price: Option<String>,
    pub size: Option<String>,
    pub address: Option<String>,
    pub facility_name: Option<String>,
    pub facility_distance_miles: Option<f64>,
    pub scraped_at: Option<String>,
}

/// Insert-or-ignore keyed by listing URL
pub trait RecordSink: Send + Sync {
    /// Returns `true` when a new row was written, `false` when the URL was already stored
    fn insert_or_ignore(&self, record: &ListingRecord, enrichment: &EnrichmentResult)
        -> Result<bool>;
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
    mode: PersistMode,
}

impl SqliteStore {
    /// Open (creating if needed) the database file and its parent directory
    pub fn open(path: impl AsRef<Path>, mode: PersistMode) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        info!("Opened listing database {}", path.display());
        Self::with_connection(conn, mode)
    }

    pub fn in_memory(mode: PersistMode) -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, mode)
    }

    fn with_connection(conn: Connection, mode: PersistMode) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .context("Failed to create properties table")?;
        Ok(Self {
            conn: Mutex::new(conn),
            mode,
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("database connection lock poisoned"))
    }

    pub fn get(&self, url: &str) -> Result<Option<StoredListing>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT url, name, price, size, address, facility_name, facility_distance_miles, scraped_at
                 FROM properties WHERE url = ?1",
                params![url],
                |row| {
                    Ok(StoredListing {
                        url: row.get(0)?,
                        name: row.get(1)?,
                        price: row.get(2)?,
                        size: row.get(3)?,
                        address: row.get(4)?,
                        facility_name: row.get(5)?,
                        facility_distance_miles: row.get(6)?,
                        scraped_at: row.get(7)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    pub fn count(&self) -> Result<i64> {
        let conn = self.lock()?;
        let n = conn.query_row("SELECT COUNT(*) FROM properties", [], |row| row.get(0))?;
        Ok(n)
    }
}

impl RecordSink for SqliteStore {
    fn insert_or_ignore(
        &self,
        record: &ListingRecord,
        enrichment: &EnrichmentResult,
    ) -> Result<bool> {
        let conn = self.lock()?;
        let inserted = match self.mode {
            PersistMode::Full => conn.execute(
                "INSERT OR IGNORE INTO properties
                    (url, name, price, size, address, facility_name, facility_distance_miles, scraped_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.url,
                    record.name,
                    record.price,
                    record.size,
                    record.address,
                    enrichment.facility_name,
                    enrichment.distance_miles,
                    record.scraped_at.to_rfc3339(),
                ],
            ),
            PersistMode::Minimal => conn.execute(
                "INSERT OR IGNORE INTO properties (url, name) VALUES (?1, ?2)",
                params![record.url, record.name],
            ),
        }
        .with_context(|| format!("Failed to save {}", record.url))?;

        debug!("insert_or_ignore {} -> {} row(s)", record.url, inserted);
        Ok(inserted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(url: &str, name: &str) -> ListingRecord {
        ListingRecord {
            url: url.to_string(),
            name: name.to_string(),
            price: "$100,000".to_string(),
            size: "900 sqft".to_string(),
            address: Some("1 Main St 12345".to_string()),
            scraped_at: Utc::now(),
        }
    }

    #[test]
    fn second_write_for_same_url_is_ignored() {
        let store = SqliteStore::in_memory(PersistMode::Full).unwrap();
        let url = "https://www.zillow.com/homedetails/1";
        let enrichment = EnrichmentResult::found("General", 1.5);

        assert!(store.insert_or_ignore(&record(url, "first"), &enrichment).unwrap());
        assert!(!store
            .insert_or_ignore(&record(url, "second"), &EnrichmentResult::not_found())
            .unwrap());

        assert_eq!(store.count().unwrap(), 1);
        let row = store.get(url).unwrap().unwrap();
        assert_eq!(row.name.as_deref(), Some("first"));
        assert_eq!(row.facility_name.as_deref(), Some("General"));
        assert_eq!(row.facility_distance_miles, Some(1.5));
    }

    #[test]
    fn minimal_mode_writes_url_and_name_only() {
        let store = SqliteStore::in_memory(PersistMode::Minimal).unwrap();
        let url = "https://www.zillow.com/homedetails/2";
        store
            .insert_or_ignore(&record(url, "Cottage"), &EnrichmentResult::found("General", 1.5))
            .unwrap();

        let row = store.get(url).unwrap().unwrap();
        assert_eq!(row.name.as_deref(), Some("Cottage"));
        assert_eq!(row.price, None);
        assert_eq!(row.facility_name, None);
        assert_eq!(row.facility_distance_miles, None);
    }

    #[test]
    fn missing_enrichment_is_stored_as_null() {
        let store = SqliteStore::in_memory(PersistMode::Full).unwrap();
        let failed = ListingRecord::fetch_failed("https://www.zillow.com/x", "unexpected status 500");
        store
            .insert_or_ignore(&failed, &EnrichmentResult::not_found())
            .unwrap();

        let row = store.get("https://www.zillow.com/x").unwrap().unwrap();
        assert_eq!(row.price.as_deref(), Some("Unknown"));
        assert_eq!(row.address, None);
        assert_eq!(row.facility_distance_miles, None);
    }
}
