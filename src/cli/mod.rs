use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use crate::application::Services;
use crate::domain::{
    CampaignId, CampaignPatch, GroupId, GroupPatch, LeadCampaignStatus, LeadId, LeadPatch,
    LeadQuery, LeadStatus, NewCampaign, NewGroup, NewLead, SortField, SortOrder,
};

/// Leadbook - leads, groups and outreach campaigns
#[derive(Parser)]
#[command(name = "leadbook")]
#[command(about = "Manage sales leads, lead groups and campaign memberships")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "LEADBOOK_DATABASE", default_value = "leadbook.db")]
    pub database: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Lead management commands
    #[command(subcommand)]
    Lead(LeadCommands),

    /// Group management commands
    #[command(subcommand)]
    Group(GroupCommands),

    /// Campaign management commands
    #[command(subcommand)]
    Campaign(CampaignCommands),
}

/// Filters, sorting and paging shared by every lead listing.
#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Case-insensitive substring of the lead name
    #[arg(long)]
    pub name: Option<String>,

    /// Status to filter on
    #[arg(short, long)]
    pub status: Option<String>,

    /// Sort field: name, status, createdAt
    #[arg(long)]
    pub sort_by: Option<SortField>,

    /// Sort direction: asc, desc
    #[arg(long)]
    pub order_by: Option<SortOrder>,

    /// Page number, starting at 1
    #[arg(short, long)]
    pub page: Option<i64>,

    /// Leads per page
    #[arg(long)]
    pub page_size: Option<i64>,
}

impl ListArgs {
    /// Build a listing query, parsing `--status` as `S`.
    pub fn into_query<S>(self) -> Result<LeadQuery<S>>
    where
        S: std::str::FromStr<Err = String>,
    {
        let status = self
            .status
            .map(|s| s.parse::<S>())
            .transpose()
            .map_err(|e| anyhow::anyhow!("Invalid status: {}", e))?;

        Ok(LeadQuery {
            page: self.page,
            page_size: self.page_size,
            name: self.name,
            status,
            sort_by: self.sort_by,
            order_by: self.order_by,
        })
    }
}

#[derive(Subcommand)]
pub enum LeadCommands {
    /// List leads, one page at a time
    List(ListArgs),

    /// Create a new lead
    Create {
        /// Lead name
        name: String,

        /// Email address
        #[arg(short, long)]
        email: String,

        /// Phone number
        #[arg(long)]
        phone: String,

        /// Initial status (defaults to New)
        #[arg(short, long)]
        status: Option<LeadStatus>,
    },

    /// Show a lead with its groups and campaigns
    Show {
        /// Lead ID
        id: LeadId,
    },

    /// Update a lead; status changes follow the transition rules
    Update {
        /// Lead ID
        id: LeadId,

        #[arg(long)]
        name: Option<String>,

        #[arg(short, long)]
        email: Option<String>,

        #[arg(long)]
        phone: Option<String>,

        /// New status: New, Contacted, Qualified, Converted, Unresponsive, Disqualified, Archived
        #[arg(short, long)]
        status: Option<LeadStatus>,
    },

    /// Delete a lead and its memberships
    Delete {
        /// Lead ID
        id: LeadId,
    },
}

#[derive(Subcommand)]
pub enum GroupCommands {
    /// List all groups
    List,

    /// Show a group with its leads
    Show {
        /// Group ID
        id: GroupId,
    },

    /// Create a new group
    Create {
        /// Group name
        name: String,

        /// Description
        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// Update a group
    Update {
        /// Group ID
        id: GroupId,

        #[arg(long)]
        name: Option<String>,

        #[arg(short, long)]
        description: Option<String>,
    },

    /// Delete a group (its leads are kept)
    Delete {
        /// Group ID
        id: GroupId,
    },

    /// List the leads of a group
    Leads {
        /// Group ID
        id: GroupId,

        #[command(flatten)]
        list: ListArgs,
    },

    /// Add a lead to a group
    AddLead {
        /// Group ID
        id: GroupId,

        /// Lead ID
        lead_id: LeadId,
    },

    /// Remove a lead from a group
    RemoveLead {
        /// Group ID
        id: GroupId,

        /// Lead ID
        lead_id: LeadId,
    },
}

#[derive(Subcommand)]
pub enum CampaignCommands {
    /// List all campaigns
    List,

    /// Show a campaign with its leads and their campaign status
    Show {
        /// Campaign ID
        id: CampaignId,
    },

    /// Create a new campaign
    Create {
        /// Campaign name
        name: String,

        /// Description
        #[arg(short, long, default_value = "")]
        description: String,

        /// Start date (ISO 8601 format: YYYY-MM-DD)
        #[arg(long)]
        start_date: String,

        /// Optional end date (ISO 8601 format: YYYY-MM-DD)
        #[arg(long)]
        end_date: Option<String>,
    },

    /// Update a campaign
    Update {
        /// Campaign ID
        id: CampaignId,

        #[arg(long)]
        name: Option<String>,

        #[arg(short, long)]
        description: Option<String>,

        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start_date: Option<String>,

        /// End date (YYYY-MM-DD)
        #[arg(long, conflicts_with = "clear_end_date")]
        end_date: Option<String>,

        /// Remove the end date
        #[arg(long)]
        clear_end_date: bool,
    },

    /// Delete a campaign and its memberships
    Delete {
        /// Campaign ID
        id: CampaignId,
    },

    /// List the leads of a campaign; --status filters on the campaign status
    Leads {
        /// Campaign ID
        id: CampaignId,

        #[command(flatten)]
        list: ListArgs,
    },

    /// Enrol a lead in a campaign
    AddLead {
        /// Campaign ID
        id: CampaignId,

        /// Lead ID
        lead_id: LeadId,

        /// Campaign status (defaults to New)
        #[arg(short, long)]
        status: Option<LeadCampaignStatus>,
    },

    /// Change a lead's status inside a campaign
    SetStatus {
        /// Campaign ID
        id: CampaignId,

        /// Lead ID
        lead_id: LeadId,

        /// New, Engaged, FollowUp_Scheduled, Contacted, Qualified, Converted,
        /// Unresponsive, Disqualified, Re_Engaged, Opted_Out
        status: LeadCampaignStatus,
    },

    /// Remove a lead from a campaign
    RemoveLead {
        /// Campaign ID
        id: CampaignId,

        /// Lead ID
        lead_id: LeadId,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Init => {
                Services::init(&self.database).await?;
                print_json(&serde_json::json!({ "initialized": self.database }))?;
            }

            Commands::Lead(cmd) => {
                let services = Services::connect(&self.database).await?;
                run_lead_command(&services, cmd).await?;
            }

            Commands::Group(cmd) => {
                let services = Services::connect(&self.database).await?;
                run_group_command(&services, cmd).await?;
            }

            Commands::Campaign(cmd) => {
                let services = Services::connect(&self.database).await?;
                run_campaign_command(&services, cmd).await?;
            }
        }

        Ok(())
    }
}

async fn run_lead_command(services: &Services, cmd: LeadCommands) -> Result<()> {
    let service = &services.leads;
    match cmd {
        LeadCommands::List(list) => {
            let query: LeadQuery = list.into_query()?;
            print_json(&service.get_all_leads_paginated(&query).await?)?;
        }

        LeadCommands::Create {
            name,
            email,
            phone,
            status,
        } => {
            let mut params = NewLead::new(name, email, phone);
            params.status = status;
            print_json(&service.create_lead(params).await?)?;
        }

        LeadCommands::Show { id } => {
            print_json(&service.get_lead_by_id(id).await?)?;
        }

        LeadCommands::Update {
            id,
            name,
            email,
            phone,
            status,
        } => {
            let patch = LeadPatch {
                name,
                email,
                phone,
                status,
            };
            ensure_changes(patch.is_empty())?;
            print_json(&service.update_lead(id, patch).await?)?;
        }

        LeadCommands::Delete { id } => {
            print_json(&service.delete_lead(id).await?)?;
        }
    }
    Ok(())
}

async fn run_group_command(services: &Services, cmd: GroupCommands) -> Result<()> {
    let service = &services.groups;
    match cmd {
        GroupCommands::List => {
            print_json(&service.get_all_groups().await?)?;
        }

        GroupCommands::Show { id } => {
            print_json(&service.get_group_by_id(id).await?)?;
        }

        GroupCommands::Create { name, description } => {
            print_json(&service.create_group(NewGroup::new(name, description)).await?)?;
        }

        GroupCommands::Update {
            id,
            name,
            description,
        } => {
            let patch = GroupPatch { name, description };
            ensure_changes(patch.is_empty())?;
            print_json(&service.update_group(id, patch).await?)?;
        }

        GroupCommands::Delete { id } => {
            print_json(&service.delete_group(id).await?)?;
        }

        GroupCommands::Leads { id, list } => {
            let query: LeadQuery = list.into_query()?;
            print_json(&service.get_all_group_leads_paginated(id, &query).await?)?;
        }

        GroupCommands::AddLead { id, lead_id } => {
            print_json(&service.add_group_lead(id, lead_id).await?)?;
        }

        GroupCommands::RemoveLead { id, lead_id } => {
            print_json(&service.remove_group_lead(id, lead_id).await?)?;
        }
    }
    Ok(())
}

async fn run_campaign_command(services: &Services, cmd: CampaignCommands) -> Result<()> {
    let service = &services.campaigns;
    match cmd {
        CampaignCommands::List => {
            print_json(&service.get_all_campaigns().await?)?;
        }

        CampaignCommands::Show { id } => {
            print_json(&service.get_campaign_by_id(id).await?)?;
        }

        CampaignCommands::Create {
            name,
            description,
            start_date,
            end_date,
        } => {
            let mut params = NewCampaign::new(name, description, parse_date(&start_date)?);
            params.end_date = end_date.as_deref().map(parse_date).transpose()?;
            print_json(&service.create_campaign(params).await?)?;
        }

        CampaignCommands::Update {
            id,
            name,
            description,
            start_date,
            end_date,
            clear_end_date,
        } => {
            let end_date = if clear_end_date {
                Some(None)
            } else {
                end_date.as_deref().map(parse_date).transpose()?.map(Some)
            };
            let patch = CampaignPatch {
                name,
                description,
                start_date: start_date.as_deref().map(parse_date).transpose()?,
                end_date,
            };
            ensure_changes(patch.is_empty())?;
            print_json(&service.update_campaign(id, patch).await?)?;
        }

        CampaignCommands::Delete { id } => {
            print_json(&service.delete_campaign(id).await?)?;
        }

        CampaignCommands::Leads { id, list } => {
            let query = list.into_query::<LeadCampaignStatus>()?;
            print_json(&service.get_all_campaign_leads_paginated(id, &query).await?)?;
        }

        CampaignCommands::AddLead {
            id,
            lead_id,
            status,
        } => {
            print_json(&service.add_campaign_lead(id, lead_id, status).await?)?;
        }

        CampaignCommands::SetStatus {
            id,
            lead_id,
            status,
        } => {
            print_json(&service.update_campaign_lead(id, lead_id, status).await?)?;
        }

        CampaignCommands::RemoveLead { id, lead_id } => {
            print_json(&service.remove_campaign_lead(id, lead_id).await?)?;
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", out);
    Ok(())
}

fn ensure_changes(empty_patch: bool) -> Result<()> {
    if empty_patch {
        anyhow::bail!("Nothing to update. Pass at least one field to change");
    }
    Ok(())
}

fn parse_date(date_str: &str) -> Result<DateTime<Utc>> {
    let naive_date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}'. Use YYYY-MM-DD", date_str))?;

    // Midnight UTC
    let naive_datetime = naive_date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow::anyhow!("Invalid date"))?;

    Ok(DateTime::from_naive_utc_and_offset(naive_datetime, Utc))
}
