mod campaigns;
mod groups;
mod leads;

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use sqlx::SqlitePool;

pub use campaigns::SqliteCampaignsRepository;
pub use groups::SqliteGroupsRepository;
pub use leads::SqliteLeadsRepository;

use super::{CampaignsRepository, GroupsRepository, LeadsRepository, MIGRATION_001_INITIAL};

/// SQLite-backed store. Hands out repositories sharing one connection pool.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new store with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let store = Self::connect(database_url).await?;
        store.migrate().await?;
        Ok(store)
    }

    pub fn leads(&self) -> Arc<dyn LeadsRepository> {
        Arc::new(SqliteLeadsRepository::new(self.pool.clone()))
    }

    pub fn groups(&self) -> Arc<dyn GroupsRepository> {
        Arc::new(SqliteGroupsRepository::new(self.pool.clone()))
    }

    pub fn campaigns(&self) -> Arc<dyn CampaignsRepository> {
        Arc::new(SqliteCampaignsRepository::new(self.pool.clone()))
    }
}

/// Timestamps are stored as fixed-width RFC 3339 text so that string order
/// matches chronological order and equality checks round-trip exactly.
pub(crate) fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(s: &str, column: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("Invalid {} timestamp", column))?
        .with_timezone(&Utc))
}

/// Current time truncated to the stored precision.
pub(crate) fn now_timestamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
