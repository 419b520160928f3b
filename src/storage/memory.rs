use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    Campaign, CampaignId, CampaignLead, CampaignPatch, FindLeads, Group, GroupId, GroupPatch,
    Lead, LeadCampaign, LeadCampaignStatus, LeadFilter, LeadId, LeadInclude, LeadPatch,
    LeadStatus, NewCampaign, NewGroup, NewLead, SortField, SortOrder,
};

use super::{CampaignsRepository, GroupsRepository, LeadsRepository, StoreError, StoreResult};

#[derive(Default)]
struct Tables {
    leads: BTreeMap<LeadId, Lead>,
    groups: BTreeMap<GroupId, Group>,
    campaigns: BTreeMap<CampaignId, Campaign>,
    group_members: BTreeSet<(GroupId, LeadId)>,
    lead_campaigns: BTreeMap<(CampaignId, LeadId), LeadCampaignStatus>,
    last_lead_id: LeadId,
    last_group_id: GroupId,
    last_campaign_id: CampaignId,
}

impl Tables {
    fn matches(&self, lead: &Lead, filter: &LeadFilter) -> bool {
        if let Some(name) = &filter.name {
            if !lead.name.to_lowercase().contains(&name.to_lowercase()) {
                return false;
            }
        }
        if let Some(status) = filter.status {
            if lead.status != status {
                return false;
            }
        }
        if let Some(group_id) = filter.group_id {
            if !self.group_members.contains(&(group_id, lead.id)) {
                return false;
            }
        }
        if let Some(campaign_id) = filter.campaign_id {
            match self.lead_campaigns.get(&(campaign_id, lead.id)) {
                None => return false,
                Some(status) => {
                    if filter.campaign_status.is_some_and(|wanted| wanted != *status) {
                        return false;
                    }
                }
            }
        }
        true
    }

    fn with_relations(&self, lead: &Lead, include: LeadInclude) -> Lead {
        let mut lead = lead.clone();
        if include.groups {
            lead.groups = Some(
                self.group_members
                    .iter()
                    .filter(|(_, lead_id)| *lead_id == lead.id)
                    .filter_map(|(group_id, _)| self.groups.get(group_id).cloned())
                    .collect(),
            );
        }
        if include.campaigns {
            lead.campaigns = Some(
                self.lead_campaigns
                    .iter()
                    .filter(|((_, lead_id), _)| *lead_id == lead.id)
                    .map(|((campaign_id, lead_id), status)| LeadCampaign {
                        campaign_id: *campaign_id,
                        lead_id: *lead_id,
                        status: *status,
                    })
                    .collect(),
            );
        }
        lead
    }

    fn group_with_leads(&self, group_id: GroupId) -> Option<Group> {
        let mut group = self.groups.get(&group_id)?.clone();
        group.leads = Some(
            self.group_members
                .range((group_id, LeadId::MIN)..=(group_id, LeadId::MAX))
                .filter_map(|(_, lead_id)| self.leads.get(lead_id).cloned())
                .collect(),
        );
        Some(group)
    }

    fn campaign_with_leads(&self, campaign_id: CampaignId) -> Option<Campaign> {
        let mut campaign = self.campaigns.get(&campaign_id)?.clone();
        campaign.leads = Some(
            self.lead_campaigns
                .range((campaign_id, LeadId::MIN)..=(campaign_id, LeadId::MAX))
                .filter_map(|((_, lead_id), status)| {
                    self.leads.get(lead_id).map(|lead| CampaignLead {
                        status: *status,
                        lead: lead.clone(),
                    })
                })
                .collect(),
        );
        Some(campaign)
    }

    fn patch_lead(&mut self, id: LeadId, patch: &LeadPatch) -> Option<Lead> {
        let lead = self.leads.get_mut(&id)?;
        if let Some(name) = &patch.name {
            lead.name = name.clone();
        }
        if let Some(email) = &patch.email {
            lead.email = email.clone();
        }
        if let Some(phone) = &patch.phone {
            lead.phone = phone.clone();
        }
        if let Some(status) = patch.status {
            lead.status = status;
        }
        lead.updated_at = Utc::now();
        Some(lead.clone())
    }
}

/// Volatile store keeping every table in process memory.
/// Repositories handed out by one store share the same tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn leads(&self) -> Arc<dyn LeadsRepository> {
        Arc::new(MemoryLeadsRepository {
            tables: self.tables.clone(),
        })
    }

    pub fn groups(&self) -> Arc<dyn GroupsRepository> {
        Arc::new(MemoryGroupsRepository {
            tables: self.tables.clone(),
        })
    }

    pub fn campaigns(&self) -> Arc<dyn CampaignsRepository> {
        Arc::new(MemoryCampaignsRepository {
            tables: self.tables.clone(),
        })
    }
}

fn lock(tables: &Mutex<Tables>) -> StoreResult<MutexGuard<'_, Tables>> {
    tables
        .lock()
        .map_err(|_| StoreError::Backend(anyhow!("In-memory store lock poisoned")))
}

fn compare_leads(
    a: &Lead,
    b: &Lead,
    sort_by: SortField,
    order_by: SortOrder,
) -> std::cmp::Ordering {
    let primary = match sort_by {
        SortField::Name => a.name.cmp(&b.name),
        SortField::Status => a.status.cmp(&b.status),
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
    };
    let primary = match order_by {
        SortOrder::Asc => primary,
        SortOrder::Desc => primary.reverse(),
    };
    primary.then(a.id.cmp(&b.id))
}

pub struct MemoryLeadsRepository {
    tables: Arc<Mutex<Tables>>,
}

#[async_trait]
impl LeadsRepository for MemoryLeadsRepository {
    async fn find(&self, params: &FindLeads) -> StoreResult<Vec<Lead>> {
        let tables = lock(&self.tables)?;
        let mut leads: Vec<&Lead> = tables
            .leads
            .values()
            .filter(|lead| tables.matches(lead, &params.filter))
            .collect();
        leads.sort_by(|a, b| compare_leads(a, b, params.sort_by, params.order_by));

        let offset = params.offset.unwrap_or(0).max(0) as usize;
        let limit = params.limit.map_or(usize::MAX, |l| l.max(0) as usize);

        Ok(leads
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|lead| tables.with_relations(lead, params.include))
            .collect())
    }

    async fn find_by_id(&self, id: LeadId) -> StoreResult<Option<Lead>> {
        let tables = lock(&self.tables)?;
        Ok(tables
            .leads
            .get(&id)
            .map(|lead| tables.with_relations(lead, LeadInclude::all())))
    }

    async fn count(&self, filter: &LeadFilter) -> StoreResult<i64> {
        let tables = lock(&self.tables)?;
        let count = tables
            .leads
            .values()
            .filter(|lead| tables.matches(lead, filter))
            .count();
        Ok(count as i64)
    }

    async fn create(&self, lead: &NewLead) -> StoreResult<Lead> {
        let mut tables = lock(&self.tables)?;
        tables.last_lead_id += 1;
        let now = Utc::now();
        let created = Lead {
            id: tables.last_lead_id,
            name: lead.name.clone(),
            email: lead.email.clone(),
            phone: lead.phone.clone(),
            status: lead.status.unwrap_or(LeadStatus::New),
            created_at: now,
            updated_at: now,
            groups: None,
            campaigns: None,
        };
        tables.leads.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_by_id(&self, id: LeadId, patch: &LeadPatch) -> StoreResult<Option<Lead>> {
        let mut tables = lock(&self.tables)?;
        Ok(tables.patch_lead(id, patch))
    }

    async fn update_if_unmodified(
        &self,
        id: LeadId,
        seen_updated_at: DateTime<Utc>,
        patch: &LeadPatch,
    ) -> StoreResult<Option<Lead>> {
        let mut tables = lock(&self.tables)?;
        let current = tables.leads.get(&id).map(|lead| lead.updated_at);
        if current != Some(seen_updated_at) {
            return Ok(None);
        }
        Ok(tables.patch_lead(id, patch))
    }

    async fn delete_by_id(&self, id: LeadId) -> StoreResult<Option<Lead>> {
        let mut tables = lock(&self.tables)?;
        let deleted = tables.leads.remove(&id);
        if deleted.is_some() {
            tables.group_members.retain(|(_, lead_id)| *lead_id != id);
            tables.lead_campaigns.retain(|(_, lead_id), _| *lead_id != id);
        }
        Ok(deleted)
    }
}

pub struct MemoryGroupsRepository {
    tables: Arc<Mutex<Tables>>,
}

#[async_trait]
impl GroupsRepository for MemoryGroupsRepository {
    async fn find(&self) -> StoreResult<Vec<Group>> {
        let tables = lock(&self.tables)?;
        Ok(tables.groups.values().cloned().collect())
    }

    async fn find_by_id(&self, id: GroupId) -> StoreResult<Option<Group>> {
        let tables = lock(&self.tables)?;
        Ok(tables.group_with_leads(id))
    }

    async fn count(&self) -> StoreResult<i64> {
        let tables = lock(&self.tables)?;
        Ok(tables.groups.len() as i64)
    }

    async fn create(&self, group: &NewGroup) -> StoreResult<Group> {
        let mut tables = lock(&self.tables)?;
        tables.last_group_id += 1;
        let created = Group {
            id: tables.last_group_id,
            name: group.name.clone(),
            description: group.description.clone(),
            leads: None,
        };
        tables.groups.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_by_id(&self, id: GroupId, patch: &GroupPatch) -> StoreResult<Option<Group>> {
        let mut tables = lock(&self.tables)?;
        let Some(group) = tables.groups.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = &patch.name {
            group.name = name.clone();
        }
        if let Some(description) = &patch.description {
            group.description = description.clone();
        }
        Ok(Some(group.clone()))
    }

    async fn delete_by_id(&self, id: GroupId) -> StoreResult<Option<Group>> {
        let mut tables = lock(&self.tables)?;
        let deleted = tables.groups.remove(&id);
        if deleted.is_some() {
            tables.group_members.retain(|(group_id, _)| *group_id != id);
        }
        Ok(deleted)
    }

    async fn add_lead(&self, group_id: GroupId, lead_id: LeadId) -> StoreResult<Option<Group>> {
        let mut tables = lock(&self.tables)?;
        if !tables.groups.contains_key(&group_id) {
            return Ok(None);
        }
        if !tables.leads.contains_key(&lead_id) {
            return Err(StoreError::MissingReference(format!("lead {}", lead_id)));
        }
        tables.group_members.insert((group_id, lead_id));
        Ok(tables.group_with_leads(group_id))
    }

    async fn remove_lead(
        &self,
        group_id: GroupId,
        lead_id: LeadId,
    ) -> StoreResult<Option<Group>> {
        let mut tables = lock(&self.tables)?;
        if !tables.groups.contains_key(&group_id) {
            return Ok(None);
        }
        if !tables.leads.contains_key(&lead_id) {
            return Err(StoreError::MissingReference(format!("lead {}", lead_id)));
        }
        tables.group_members.remove(&(group_id, lead_id));
        Ok(tables.group_with_leads(group_id))
    }
}

pub struct MemoryCampaignsRepository {
    tables: Arc<Mutex<Tables>>,
}

#[async_trait]
impl CampaignsRepository for MemoryCampaignsRepository {
    async fn find(&self) -> StoreResult<Vec<Campaign>> {
        let tables = lock(&self.tables)?;
        Ok(tables.campaigns.values().cloned().collect())
    }

    async fn find_by_id(&self, id: CampaignId) -> StoreResult<Option<Campaign>> {
        let tables = lock(&self.tables)?;
        Ok(tables.campaign_with_leads(id))
    }

    async fn count(&self) -> StoreResult<i64> {
        let tables = lock(&self.tables)?;
        Ok(tables.campaigns.len() as i64)
    }

    async fn create(&self, campaign: &NewCampaign) -> StoreResult<Campaign> {
        let mut tables = lock(&self.tables)?;
        tables.last_campaign_id += 1;
        let created = Campaign {
            id: tables.last_campaign_id,
            name: campaign.name.clone(),
            description: campaign.description.clone(),
            start_date: campaign.start_date,
            end_date: campaign.end_date,
            leads: None,
        };
        tables.campaigns.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_by_id(
        &self,
        id: CampaignId,
        patch: &CampaignPatch,
    ) -> StoreResult<Option<Campaign>> {
        let mut tables = lock(&self.tables)?;
        let Some(campaign) = tables.campaigns.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = &patch.name {
            campaign.name = name.clone();
        }
        if let Some(description) = &patch.description {
            campaign.description = description.clone();
        }
        if let Some(start_date) = patch.start_date {
            campaign.start_date = start_date;
        }
        if let Some(end_date) = patch.end_date {
            campaign.end_date = end_date;
        }
        Ok(Some(campaign.clone()))
    }

    async fn delete_by_id(&self, id: CampaignId) -> StoreResult<Option<Campaign>> {
        let mut tables = lock(&self.tables)?;
        let deleted = tables.campaigns.remove(&id);
        if deleted.is_some() {
            tables
                .lead_campaigns
                .retain(|(campaign_id, _), _| *campaign_id != id);
        }
        Ok(deleted)
    }

    async fn add_lead(&self, membership: &LeadCampaign) -> StoreResult<LeadCampaign> {
        let mut tables = lock(&self.tables)?;
        let key = (membership.campaign_id, membership.lead_id);
        let label = format!(
            "lead {} in campaign {}",
            membership.lead_id, membership.campaign_id
        );

        if !tables.campaigns.contains_key(&membership.campaign_id)
            || !tables.leads.contains_key(&membership.lead_id)
        {
            return Err(StoreError::MissingReference(label));
        }
        if tables.lead_campaigns.contains_key(&key) {
            return Err(StoreError::Duplicate(label));
        }

        tables.lead_campaigns.insert(key, membership.status);
        Ok(membership.clone())
    }

    async fn update_lead_status(
        &self,
        membership: &LeadCampaign,
    ) -> StoreResult<Option<LeadCampaign>> {
        let mut tables = lock(&self.tables)?;
        let key = (membership.campaign_id, membership.lead_id);
        match tables.lead_campaigns.get_mut(&key) {
            Some(status) => {
                *status = membership.status;
                Ok(Some(membership.clone()))
            }
            None => Ok(None),
        }
    }

    async fn remove_lead(
        &self,
        campaign_id: CampaignId,
        lead_id: LeadId,
    ) -> StoreResult<Option<LeadCampaign>> {
        let mut tables = lock(&self.tables)?;
        Ok(tables
            .lead_campaigns
            .remove(&(campaign_id, lead_id))
            .map(|status| LeadCampaign {
                campaign_id,
                lead_id,
                status,
            }))
    }
}
