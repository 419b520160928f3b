// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use leadbook::application::Services;
use leadbook::domain::{Campaign, Group, Lead, LeadStatus, NewCampaign, NewGroup, NewLead};
use tempfile::TempDir;

/// Helper to create the services over a temporary database
pub async fn test_services() -> Result<(Services, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let services = Services::init(db_path.to_str().unwrap()).await?;
    Ok((services, temp_dir))
}

/// Helper to parse a date string into DateTime<Utc>
pub fn parse_date(date_str: &str) -> DateTime<Utc> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
}

pub fn new_lead(name: &str) -> NewLead {
    NewLead::new(
        name,
        format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
        "555-0100",
    )
}

/// Create one lead per name, in order.
pub async fn seed_leads(services: &Services, names: &[&str]) -> Result<Vec<Lead>> {
    let mut leads = Vec::with_capacity(names.len());
    for name in names {
        leads.push(services.leads.create_lead(new_lead(name)).await?);
    }
    Ok(leads)
}

pub async fn seed_lead_with_status(
    services: &Services,
    name: &str,
    status: LeadStatus,
) -> Result<Lead> {
    Ok(services
        .leads
        .create_lead(new_lead(name).with_status(status))
        .await?)
}

pub async fn seed_group(services: &Services, name: &str) -> Result<Group> {
    Ok(services
        .groups
        .create_group(NewGroup::new(name, format!("{} leads", name)))
        .await?)
}

pub async fn seed_campaign(services: &Services, name: &str) -> Result<Campaign> {
    Ok(services
        .campaigns
        .create_campaign(
            NewCampaign::new(name, "Outreach", parse_date("2024-03-01"))
                .with_end_date(parse_date("2024-06-30")),
        )
        .await?)
}
