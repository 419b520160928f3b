mod error;
mod memory;
mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    Campaign, CampaignId, CampaignPatch, FindLeads, Group, GroupId, GroupPatch, Lead,
    LeadCampaign, LeadFilter, LeadId, LeadPatch, NewCampaign, NewGroup, NewLead,
};

pub use error::*;
pub use memory::*;
pub use sqlite::*;

/// SQL migration for initial schema
pub const MIGRATION_001_INITIAL: &str = include_str!("migrations/001_initial.sql");

/// Persistence contract for leads.
#[async_trait]
pub trait LeadsRepository: Send + Sync {
    /// Filtered, sorted and paginated leads, with the requested relations loaded.
    async fn find(&self, params: &FindLeads) -> StoreResult<Vec<Lead>>;

    /// A single lead with its groups and campaign memberships.
    async fn find_by_id(&self, id: LeadId) -> StoreResult<Option<Lead>>;

    /// Number of leads matching `filter`, ignoring limit and offset.
    async fn count(&self, filter: &LeadFilter) -> StoreResult<i64>;

    /// Insert a lead; a missing status defaults to `New`.
    async fn create(&self, lead: &NewLead) -> StoreResult<Lead>;

    /// Apply `patch` and refresh `updated_at`. `None` if the lead is absent.
    async fn update_by_id(&self, id: LeadId, patch: &LeadPatch) -> StoreResult<Option<Lead>>;

    /// Like [`update_by_id`](Self::update_by_id), but only if the lead's
    /// `updated_at` still equals `seen_updated_at`. `None` if the lead is
    /// absent or was modified in the meantime.
    async fn update_if_unmodified(
        &self,
        id: LeadId,
        seen_updated_at: DateTime<Utc>,
        patch: &LeadPatch,
    ) -> StoreResult<Option<Lead>>;

    /// Delete a lead and its memberships. Returns the deleted row.
    async fn delete_by_id(&self, id: LeadId) -> StoreResult<Option<Lead>>;
}

/// Persistence contract for groups and their lead membership.
#[async_trait]
pub trait GroupsRepository: Send + Sync {
    async fn find(&self) -> StoreResult<Vec<Group>>;
    async fn find_by_id(&self, id: GroupId) -> StoreResult<Option<Group>>;
    async fn count(&self) -> StoreResult<i64>;
    async fn create(&self, group: &NewGroup) -> StoreResult<Group>;
    async fn update_by_id(&self, id: GroupId, patch: &GroupPatch) -> StoreResult<Option<Group>>;
    async fn delete_by_id(&self, id: GroupId) -> StoreResult<Option<Group>>;

    /// Connect a lead to the group. Connecting an existing member is a no-op.
    /// Returns the group with its leads, or `None` if the group is absent.
    async fn add_lead(&self, group_id: GroupId, lead_id: LeadId) -> StoreResult<Option<Group>>;

    /// Disconnect a lead from the group. Returns the group with its leads.
    async fn remove_lead(&self, group_id: GroupId, lead_id: LeadId)
        -> StoreResult<Option<Group>>;
}

/// Persistence contract for campaigns and their lead memberships.
#[async_trait]
pub trait CampaignsRepository: Send + Sync {
    async fn find(&self) -> StoreResult<Vec<Campaign>>;

    /// A single campaign with its memberships and the member leads.
    async fn find_by_id(&self, id: CampaignId) -> StoreResult<Option<Campaign>>;

    async fn count(&self) -> StoreResult<i64>;
    async fn create(&self, campaign: &NewCampaign) -> StoreResult<Campaign>;
    async fn update_by_id(
        &self,
        id: CampaignId,
        patch: &CampaignPatch,
    ) -> StoreResult<Option<Campaign>>;
    async fn delete_by_id(&self, id: CampaignId) -> StoreResult<Option<Campaign>>;

    /// Insert a membership. Fails with [`StoreError::Duplicate`] if the pair
    /// exists and [`StoreError::MissingReference`] if either side is absent.
    async fn add_lead(&self, membership: &LeadCampaign) -> StoreResult<LeadCampaign>;

    /// Change the status of an existing membership.
    async fn update_lead_status(&self, membership: &LeadCampaign)
        -> StoreResult<Option<LeadCampaign>>;

    /// Delete a membership, returning it.
    async fn remove_lead(
        &self,
        campaign_id: CampaignId,
        lead_id: LeadId,
    ) -> StoreResult<Option<LeadCampaign>>;
}
