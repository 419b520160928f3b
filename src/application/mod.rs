// Application layer: use cases over the repository traits.

mod campaigns;
mod error;
mod groups;
mod leads;

pub use campaigns::CampaignsService;
pub use error::*;
pub use groups::GroupsService;
pub use leads::LeadsService;

use crate::storage::{MemoryStore, SqliteStore};

/// The three services wired to one store.
pub struct Services {
    pub leads: LeadsService,
    pub groups: GroupsService,
    pub campaigns: CampaignsService,
}

impl Services {
    pub fn sqlite(store: &SqliteStore) -> Self {
        Self {
            leads: LeadsService::new(store.leads()),
            groups: GroupsService::new(store.groups(), store.leads()),
            campaigns: CampaignsService::new(store.campaigns(), store.leads()),
        }
    }

    pub fn memory(store: &MemoryStore) -> Self {
        Self {
            leads: LeadsService::new(store.leads()),
            groups: GroupsService::new(store.groups(), store.leads()),
            campaigns: CampaignsService::new(store.campaigns(), store.leads()),
        }
    }

    /// Initialize a new database (creating the file if needed) and run migrations.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let store = SqliteStore::init(&db_url).await.map_err(AppError::Database)?;
        Ok(Self::sqlite(&store))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let store = SqliteStore::connect(&db_url)
            .await
            .map_err(AppError::Database)?;
        Ok(Self::sqlite(&store))
    }
}
