use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::domain::{
    Lead, LeadFilter, LeadId, LeadInclude, LeadPatch, LeadQuery, LeadStatus, NewLead, Page,
};
use crate::storage::LeadsRepository;

use super::AppError;

/// Lead use cases: listing, CRUD and the status-transition rule.
pub struct LeadsService {
    leads: Arc<dyn LeadsRepository>,
}

impl LeadsService {
    pub fn new(leads: Arc<dyn LeadsRepository>) -> Self {
        Self { leads }
    }

    /// List leads matching `query`, one page at a time.
    pub async fn get_all_leads_paginated(&self, query: &LeadQuery) -> Result<Page<Lead>, AppError> {
        let filter = LeadFilter {
            name: query.name_filter(),
            status: query.status,
            ..LeadFilter::default()
        };
        let pagination = query.pagination();
        debug!(?filter, page = pagination.page, page_size = pagination.page_size, "listing leads");

        let data = self
            .leads
            .find(&query.to_find(filter.clone(), LeadInclude::default()))
            .await?;
        let total = self.leads.count(&filter).await?;

        Ok(Page {
            data,
            meta: pagination.meta(total),
        })
    }

    pub async fn get_lead_by_id(&self, id: LeadId) -> Result<Lead, AppError> {
        self.leads
            .find_by_id(id)
            .await?
            .ok_or(AppError::LeadNotFound(id))
    }

    /// Create a lead. Leads without an explicit status start as `New`.
    pub async fn create_lead(&self, mut params: NewLead) -> Result<Lead, AppError> {
        if params.status.is_none() {
            params.status = Some(LeadStatus::New);
        }
        let lead = self.leads.create(&params).await?;
        info!(lead_id = lead.id, status = %lead.status, "created lead");
        Ok(lead)
    }

    pub async fn update_lead(&self, id: LeadId, patch: LeadPatch) -> Result<Lead, AppError> {
        self.update_lead_at(id, patch, Utc::now()).await
    }

    /// Update a lead, enforcing the status-transition rule as of `now`.
    ///
    /// When the patch changes the status, the write only lands if the lead is
    /// unchanged since it was checked; otherwise [`AppError::StaleUpdate`].
    pub async fn update_lead_at(
        &self,
        id: LeadId,
        patch: LeadPatch,
        now: DateTime<Utc>,
    ) -> Result<Lead, AppError> {
        let lead = self
            .leads
            .find_by_id(id)
            .await?
            .ok_or(AppError::LeadNotFound(id))?;

        if let Err(err) = lead.check_transition(patch.status, now) {
            warn!(lead_id = id, from = %lead.status, to = ?patch.status, "rejected status change: {}", err);
            return Err(err.into());
        }

        let updated = if patch.status.is_some() {
            self.leads
                .update_if_unmodified(id, lead.updated_at, &patch)
                .await?
        } else {
            self.leads.update_by_id(id, &patch).await?
        };

        match updated {
            Some(updated) => {
                info!(lead_id = id, status = %updated.status, "updated lead");
                Ok(updated)
            }
            None => match self.leads.find_by_id(id).await? {
                Some(_) => Err(AppError::StaleUpdate(id)),
                None => Err(AppError::LeadNotFound(id)),
            },
        }
    }

    pub async fn delete_lead(&self, id: LeadId) -> Result<Lead, AppError> {
        let deleted = self
            .leads
            .delete_by_id(id)
            .await?
            .ok_or(AppError::LeadNotFound(id))?;
        info!(lead_id = id, "deleted lead");
        Ok(deleted)
    }
}
