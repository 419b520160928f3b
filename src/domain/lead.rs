use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Group, LeadCampaign};

pub type LeadId = i64;

/// Minimum inactivity (in days) before a lead may be archived.
pub const ARCHIVE_AFTER_DAYS: i64 = 180;

const MILLIS_PER_DAY: i64 = 1000 * 60 * 60 * 24;

/// Global lifecycle status of a lead.
/// Declaration order is the sort order used when listing by status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LeadStatus {
    New,
    Contacted,
    Qualified,
    Converted,
    Unresponsive,
    Disqualified,
    Archived,
}

impl LeadStatus {
    pub const ALL: [LeadStatus; 7] = [
        LeadStatus::New,
        LeadStatus::Contacted,
        LeadStatus::Qualified,
        LeadStatus::Converted,
        LeadStatus::Unresponsive,
        LeadStatus::Disqualified,
        LeadStatus::Archived,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "New",
            LeadStatus::Contacted => "Contacted",
            LeadStatus::Qualified => "Qualified",
            LeadStatus::Converted => "Converted",
            LeadStatus::Unresponsive => "Unresponsive",
            LeadStatus::Disqualified => "Disqualified",
            LeadStatus::Archived => "Archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

impl std::fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LeadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown lead status '{}'", s))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: LeadId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub status: LeadStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<Group>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaigns: Option<Vec<LeadCampaign>>,
}

impl Lead {
    /// Whole days since the last update, rounded up.
    pub fn days_since_update(&self, now: DateTime<Utc>) -> i64 {
        let millis = (now - self.updated_at).num_milliseconds().abs();
        (millis + MILLIS_PER_DAY - 1) / MILLIS_PER_DAY
    }

    /// Check whether moving this lead to `requested` is allowed at `now`.
    /// A missing status never violates the rule.
    pub fn check_transition(
        &self,
        requested: Option<LeadStatus>,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        let Some(requested) = requested else {
            return Ok(());
        };

        if self.status == LeadStatus::New && requested != LeadStatus::Contacted {
            return Err(TransitionError::MustBeContactedFirst);
        }

        if requested == LeadStatus::Archived {
            let days = self.days_since_update(now);
            if days < ARCHIVE_AFTER_DAYS {
                return Err(TransitionError::ArchiveTooSoon { days });
            }
        }

        Ok(())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("A new lead must be contacted before their status is updated to other values")]
    MustBeContactedFirst,

    #[error("A lead can only be archived after 180 days of inactivity ({days} days elapsed)")]
    ArchiveTooSoon { days: i64 },
}

/// Attributes for a lead that does not exist yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLead {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub status: Option<LeadStatus>,
}

impl NewLead {
    pub fn new(name: impl Into<String>, email: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            phone: phone.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: LeadStatus) -> Self {
        self.status = Some(status);
        self
    }
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeadPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: Option<LeadStatus>,
}

impl LeadPatch {
    pub fn status(status: LeadStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.phone.is_none() && self.status.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn lead_with(status: LeadStatus, updated_at: DateTime<Utc>) -> Lead {
        Lead {
            id: 1,
            name: "John".into(),
            email: "john@example.com".into(),
            phone: "555-0100".into(),
            status,
            created_at: updated_at,
            updated_at,
            groups: None,
            campaigns: None,
        }
    }

    #[test]
    fn test_lead_status_parse_is_case_insensitive() {
        assert_eq!(LeadStatus::parse("contacted"), Some(LeadStatus::Contacted));
        assert_eq!(LeadStatus::parse(" ARCHIVED "), Some(LeadStatus::Archived));
        assert_eq!(LeadStatus::parse("lost"), None);
    }

    #[test]
    fn test_new_lead_must_be_contacted_first() {
        let now = Utc::now();
        let lead = lead_with(LeadStatus::New, now);

        for status in LeadStatus::ALL {
            let result = lead.check_transition(Some(status), now);
            if status == LeadStatus::Contacted {
                assert!(result.is_ok());
            } else {
                assert_eq!(result, Err(TransitionError::MustBeContactedFirst));
            }
        }
    }

    #[test]
    fn test_missing_status_is_always_allowed() {
        let now = Utc::now();
        let lead = lead_with(LeadStatus::New, now);
        assert!(lead.check_transition(None, now).is_ok());
    }

    #[test]
    fn test_archive_requires_180_days() {
        let now = Utc::now();

        let recent = lead_with(LeadStatus::Contacted, now - Duration::days(179));
        assert_eq!(
            recent.check_transition(Some(LeadStatus::Archived), now),
            Err(TransitionError::ArchiveTooSoon { days: 179 })
        );

        let exact = lead_with(LeadStatus::Contacted, now - Duration::days(180));
        assert!(exact.check_transition(Some(LeadStatus::Archived), now).is_ok());

        let old = lead_with(LeadStatus::Qualified, now - Duration::days(400));
        assert!(old.check_transition(Some(LeadStatus::Archived), now).is_ok());
    }

    #[test]
    fn test_partial_days_round_up() {
        let now = Utc::now();
        // 179 days and one hour counts as 180 days
        let lead = lead_with(
            LeadStatus::Contacted,
            now - Duration::days(179) - Duration::hours(1),
        );
        assert_eq!(lead.days_since_update(now), 180);
        assert!(lead.check_transition(Some(LeadStatus::Archived), now).is_ok());
    }

    #[test]
    fn test_new_lead_archive_hits_contact_rule_first() {
        let now = Utc::now();
        let lead = lead_with(LeadStatus::New, now - Duration::days(365));
        assert_eq!(
            lead.check_transition(Some(LeadStatus::Archived), now),
            Err(TransitionError::MustBeContactedFirst)
        );
    }

    #[test]
    fn test_any_transition_allowed_after_contact() {
        let now = Utc::now();
        let lead = lead_with(LeadStatus::Disqualified, now);
        assert!(lead.check_transition(Some(LeadStatus::New), now).is_ok());
        assert!(lead.check_transition(Some(LeadStatus::Converted), now).is_ok());
    }
}
