use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS clicked_domains (
    domain TEXT PRIMARY KEY,
    clicked_at TEXT NOT NULL
)";

/// Remembers which domains the user already followed an unsubscribe link
/// for. Kept outside the scan report.
pub struct ClickStore {
    conn: Connection,
}

impl ClickStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open state database {:?}", path))?;
        info!(action = "open", component = "click_store", path = ?path, "Opened state database");
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(SCHEMA, [])
            .context("Failed to create clicked_domains table")?;
        Ok(Self { conn })
    }

    pub fn mark_clicked(&self, domain: &str) -> Result<()> {
        let domain = domain.to_lowercase();
        self.conn
            .execute(
                "INSERT OR REPLACE INTO clicked_domains (domain, clicked_at) VALUES (?1, ?2)",
                params![domain, Utc::now().to_rfc3339()],
            )
            .with_context(|| format!("Failed to mark {domain} as clicked"))?;
        info!(action = "mark", component = "click_store", domain = %domain, "Marked domain as clicked");
        Ok(())
    }

    pub fn is_clicked(&self, domain: &str) -> Result<bool> {
        let found: Option<String> = self
            .conn
            .query_row(
                "SELECT domain FROM clicked_domains WHERE domain = ?1",
                params![domain.to_lowercase()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn clicked_domains(&self) -> Result<HashSet<String>> {
        let domains = self
            .conn
            .prepare("SELECT domain FROM clicked_domains")?
            .query_map([], |row| row.get(0))?
            .collect::<SqliteResult<HashSet<String>>>()?;
        Ok(domains)
    }
}
