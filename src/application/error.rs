use thiserror::Error;

use crate::domain::{CampaignId, GroupId, LeadId, TransitionError};
use crate::storage::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Lead Not Found! (id {0})")]
    LeadNotFound(LeadId),

    #[error("Group Not Found! (id {0})")]
    GroupNotFound(GroupId),

    #[error("Campaign Not Found! (id {0})")]
    CampaignNotFound(CampaignId),

    #[error("Lead {lead_id} is not part of campaign {campaign_id}")]
    CampaignLeadNotFound {
        campaign_id: CampaignId,
        lead_id: LeadId,
    },

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Referenced record does not exist: {0}")]
    MissingReference(String),

    #[error("Lead {0} was modified concurrently, retry the update")]
    StaleUpdate(LeadId),

    #[error("Database error: {0}")]
    Database(#[source] anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(what) => AppError::AlreadyExists(what),
            StoreError::MissingReference(what) => AppError::MissingReference(what),
            StoreError::Backend(err) => AppError::Database(err),
        }
    }
}

impl AppError {
    /// HTTP status code a transport layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::LeadNotFound(_)
            | AppError::GroupNotFound(_)
            | AppError::CampaignNotFound(_)
            | AppError::CampaignLeadNotFound { .. }
            | AppError::MissingReference(_) => 404,
            AppError::InvalidTransition(_) => 400,
            AppError::AlreadyExists(_) | AppError::StaleUpdate(_) => 409,
            AppError::Database(_) => 500,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code() == 404
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::InvalidTransition(_))
    }
}
