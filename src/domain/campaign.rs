use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Lead, LeadId};

pub type CampaignId = i64;

/// Status of a lead inside one campaign, independent of the lead's global status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LeadCampaignStatus {
    New,
    Engaged,
    #[serde(rename = "FollowUp_Scheduled")]
    FollowUpScheduled,
    Contacted,
    Qualified,
    Converted,
    Unresponsive,
    Disqualified,
    #[serde(rename = "Re_Engaged")]
    ReEngaged,
    #[serde(rename = "Opted_Out")]
    OptedOut,
}

impl LeadCampaignStatus {
    pub const ALL: [LeadCampaignStatus; 10] = [
        LeadCampaignStatus::New,
        LeadCampaignStatus::Engaged,
        LeadCampaignStatus::FollowUpScheduled,
        LeadCampaignStatus::Contacted,
        LeadCampaignStatus::Qualified,
        LeadCampaignStatus::Converted,
        LeadCampaignStatus::Unresponsive,
        LeadCampaignStatus::Disqualified,
        LeadCampaignStatus::ReEngaged,
        LeadCampaignStatus::OptedOut,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LeadCampaignStatus::New => "New",
            LeadCampaignStatus::Engaged => "Engaged",
            LeadCampaignStatus::FollowUpScheduled => "FollowUp_Scheduled",
            LeadCampaignStatus::Contacted => "Contacted",
            LeadCampaignStatus::Qualified => "Qualified",
            LeadCampaignStatus::Converted => "Converted",
            LeadCampaignStatus::Unresponsive => "Unresponsive",
            LeadCampaignStatus::Disqualified => "Disqualified",
            LeadCampaignStatus::ReEngaged => "Re_Engaged",
            LeadCampaignStatus::OptedOut => "Opted_Out",
        }
    }

    /// Accepts the canonical name in any case, with or without the underscore.
    pub fn parse(s: &str) -> Option<Self> {
        let wanted = normalize(s);
        Self::ALL
            .into_iter()
            .find(|status| normalize(status.as_str()) == wanted)
    }
}

fn normalize(s: &str) -> String {
    s.trim()
        .chars()
        .filter(|c| *c != '_' && *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl std::fmt::Display for LeadCampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LeadCampaignStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown campaign status '{}'", s))
    }
}

/// A named outreach effort.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: CampaignId,
    pub name: String,
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leads: Option<Vec<CampaignLead>>,
}

/// Join row between a lead and a campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadCampaign {
    pub campaign_id: CampaignId,
    pub lead_id: LeadId,
    pub status: LeadCampaignStatus,
}

/// Campaign membership with the lead loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignLead {
    pub status: LeadCampaignStatus,
    pub lead: Lead,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCampaign {
    pub name: String,
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
}

impl NewCampaign {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        start_date: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            start_date,
            end_date: None,
        }
    }

    pub fn with_end_date(mut self, end_date: DateTime<Utc>) -> Self {
        self.end_date = Some(end_date);
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    /// `Some(None)` clears the end date.
    pub end_date: Option<Option<DateTime<Utc>>>,
}

impl CampaignPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
    }
}
