use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::{
    Campaign, CampaignId, CampaignLeadQuery, CampaignPatch, Lead, LeadCampaign,
    LeadCampaignStatus, LeadFilter, LeadId, LeadInclude, NewCampaign, Page,
};
use crate::storage::{CampaignsRepository, LeadsRepository};

use super::AppError;

/// Campaign use cases and the per-campaign lead status.
pub struct CampaignsService {
    campaigns: Arc<dyn CampaignsRepository>,
    leads: Arc<dyn LeadsRepository>,
}

impl CampaignsService {
    pub fn new(campaigns: Arc<dyn CampaignsRepository>, leads: Arc<dyn LeadsRepository>) -> Self {
        Self { campaigns, leads }
    }

    pub async fn get_all_campaigns(&self) -> Result<Vec<Campaign>, AppError> {
        Ok(self.campaigns.find().await?)
    }

    pub async fn get_campaign_by_id(&self, id: CampaignId) -> Result<Campaign, AppError> {
        self.campaigns
            .find_by_id(id)
            .await?
            .ok_or(AppError::CampaignNotFound(id))
    }

    pub async fn create_campaign(&self, params: NewCampaign) -> Result<Campaign, AppError> {
        let campaign = self.campaigns.create(&params).await?;
        info!(campaign_id = campaign.id, name = %campaign.name, "created campaign");
        Ok(campaign)
    }

    pub async fn update_campaign(
        &self,
        id: CampaignId,
        patch: CampaignPatch,
    ) -> Result<Campaign, AppError> {
        let campaign = self
            .campaigns
            .update_by_id(id, &patch)
            .await?
            .ok_or(AppError::CampaignNotFound(id))?;
        info!(campaign_id = id, "updated campaign");
        Ok(campaign)
    }

    /// Delete a campaign together with its memberships.
    pub async fn delete_campaign(&self, id: CampaignId) -> Result<Campaign, AppError> {
        let campaign = self
            .campaigns
            .delete_by_id(id)
            .await?
            .ok_or(AppError::CampaignNotFound(id))?;
        info!(campaign_id = id, "deleted campaign");
        Ok(campaign)
    }

    /// Members of a campaign. `query.status` filters on the status inside the
    /// campaign, not the lead's own status. Each lead carries its memberships.
    pub async fn get_all_campaign_leads_paginated(
        &self,
        campaign_id: CampaignId,
        query: &CampaignLeadQuery,
    ) -> Result<Page<Lead>, AppError> {
        let filter = LeadFilter {
            name: query.name_filter(),
            campaign_id: Some(campaign_id),
            campaign_status: query.status,
            ..LeadFilter::default()
        };
        let pagination = query.pagination();
        debug!(campaign_id, ?filter, page = pagination.page, "listing campaign leads");

        let data = self
            .leads
            .find(&query.to_find(filter.clone(), LeadInclude::campaigns()))
            .await?;
        let total = self.leads.count(&filter).await?;

        Ok(Page {
            data,
            meta: pagination.meta(total),
        })
    }

    /// Enrol a lead in a campaign, starting at `New` unless told otherwise.
    pub async fn add_campaign_lead(
        &self,
        campaign_id: CampaignId,
        lead_id: LeadId,
        status: Option<LeadCampaignStatus>,
    ) -> Result<LeadCampaign, AppError> {
        let membership = LeadCampaign {
            campaign_id,
            lead_id,
            status: status.unwrap_or(LeadCampaignStatus::New),
        };
        let created = self.campaigns.add_lead(&membership).await?;
        info!(campaign_id, lead_id, status = %created.status, "added lead to campaign");
        Ok(created)
    }

    pub async fn update_campaign_lead(
        &self,
        campaign_id: CampaignId,
        lead_id: LeadId,
        status: LeadCampaignStatus,
    ) -> Result<LeadCampaign, AppError> {
        let membership = LeadCampaign {
            campaign_id,
            lead_id,
            status,
        };
        let updated = self
            .campaigns
            .update_lead_status(&membership)
            .await?
            .ok_or(AppError::CampaignLeadNotFound {
                campaign_id,
                lead_id,
            })?;
        info!(campaign_id, lead_id, status = %updated.status, "updated campaign lead");
        Ok(updated)
    }

    pub async fn remove_campaign_lead(
        &self,
        campaign_id: CampaignId,
        lead_id: LeadId,
    ) -> Result<LeadCampaign, AppError> {
        let removed = self
            .campaigns
            .remove_lead(campaign_id, lead_id)
            .await?
            .ok_or(AppError::CampaignLeadNotFound {
                campaign_id,
                lead_id,
            })?;
        info!(campaign_id, lead_id, "removed lead from campaign");
        Ok(removed)
    }
}
