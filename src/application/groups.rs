use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::{
    Group, GroupId, GroupPatch, Lead, LeadFilter, LeadId, LeadInclude, LeadQuery, NewGroup, Page,
};
use crate::storage::{GroupsRepository, LeadsRepository};

use super::AppError;

/// Group use cases, including membership and the paginated member listing.
pub struct GroupsService {
    groups: Arc<dyn GroupsRepository>,
    leads: Arc<dyn LeadsRepository>,
}

impl GroupsService {
    pub fn new(groups: Arc<dyn GroupsRepository>, leads: Arc<dyn LeadsRepository>) -> Self {
        Self { groups, leads }
    }

    pub async fn get_all_groups(&self) -> Result<Vec<Group>, AppError> {
        Ok(self.groups.find().await?)
    }

    pub async fn get_group_by_id(&self, id: GroupId) -> Result<Group, AppError> {
        self.groups
            .find_by_id(id)
            .await?
            .ok_or(AppError::GroupNotFound(id))
    }

    pub async fn create_group(&self, params: NewGroup) -> Result<Group, AppError> {
        let group = self.groups.create(&params).await?;
        info!(group_id = group.id, name = %group.name, "created group");
        Ok(group)
    }

    pub async fn update_group(&self, id: GroupId, patch: GroupPatch) -> Result<Group, AppError> {
        let group = self
            .groups
            .update_by_id(id, &patch)
            .await?
            .ok_or(AppError::GroupNotFound(id))?;
        info!(group_id = id, "updated group");
        Ok(group)
    }

    /// Delete a group. Member leads survive; only the memberships go.
    pub async fn delete_group(&self, id: GroupId) -> Result<Group, AppError> {
        let group = self
            .groups
            .delete_by_id(id)
            .await?
            .ok_or(AppError::GroupNotFound(id))?;
        info!(group_id = id, "deleted group");
        Ok(group)
    }

    /// Members of a group, filtered and paginated like the global listing.
    /// Each lead carries its groups.
    pub async fn get_all_group_leads_paginated(
        &self,
        group_id: GroupId,
        query: &LeadQuery,
    ) -> Result<Page<Lead>, AppError> {
        let filter = LeadFilter {
            name: query.name_filter(),
            status: query.status,
            group_id: Some(group_id),
            ..LeadFilter::default()
        };
        let pagination = query.pagination();
        debug!(group_id, ?filter, page = pagination.page, "listing group leads");

        let data = self
            .leads
            .find(&query.to_find(filter.clone(), LeadInclude::groups()))
            .await?;
        let total = self.leads.count(&filter).await?;

        Ok(Page {
            data,
            meta: pagination.meta(total),
        })
    }

    /// Connect a lead to a group. Adding an existing member changes nothing.
    pub async fn add_group_lead(&self, group_id: GroupId, lead_id: LeadId) -> Result<Group, AppError> {
        let group = self
            .groups
            .add_lead(group_id, lead_id)
            .await?
            .ok_or(AppError::GroupNotFound(group_id))?;
        info!(group_id, lead_id, "added lead to group");
        Ok(group)
    }

    pub async fn remove_group_lead(
        &self,
        group_id: GroupId,
        lead_id: LeadId,
    ) -> Result<Group, AppError> {
        let group = self
            .groups
            .remove_lead(group_id, lead_id)
            .await?
            .ok_or(AppError::GroupNotFound(group_id))?;
        info!(group_id, lead_id, "removed lead from group");
        Ok(group)
    }
}
