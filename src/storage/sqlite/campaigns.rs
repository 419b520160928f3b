use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::domain::{
    Campaign, CampaignId, CampaignLead, CampaignPatch, LeadCampaign, LeadCampaignStatus, LeadId,
    NewCampaign,
};
use crate::storage::{CampaignsRepository, StoreError, StoreResult};

use super::leads::{LEAD_COLUMNS, row_to_lead, row_to_lead_campaign};
use super::{format_timestamp, parse_timestamp};

const CAMPAIGN_COLUMNS: &str = "id, name, description, start_date, end_date";

/// Campaigns repository over a SQLite pool.
pub struct SqliteCampaignsRepository {
    pool: SqlitePool,
}

impl SqliteCampaignsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch_campaign(&self, id: CampaignId) -> StoreResult<Option<Campaign>> {
        let sql = format!("SELECT {} FROM campaigns WHERE id = ?", CAMPAIGN_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::from_sqlx(e, "fetch campaign"))?;

        row.as_ref().map(row_to_campaign).transpose()
    }

    async fn load_members(&self, campaign: &mut Campaign) -> StoreResult<()> {
        let sql = format!(
            r#"
            SELECT {}, lc.status AS membership_status
            FROM lead_campaigns lc
            JOIN leads l ON l.id = lc.lead_id
            WHERE lc.campaign_id = ?
            ORDER BY l.id
            "#,
            LEAD_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(campaign.id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::from_sqlx(e, "load campaign leads"))?;

        let mut members = Vec::with_capacity(rows.len());
        for row in &rows {
            let status_str: String = row.get("membership_status");
            let status = LeadCampaignStatus::parse(&status_str).ok_or_else(|| {
                anyhow::anyhow!("Invalid campaign status: {}", status_str)
            })?;
            members.push(CampaignLead {
                status,
                lead: row_to_lead(row)?,
            });
        }

        campaign.leads = Some(members);
        Ok(())
    }
}

#[async_trait]
impl CampaignsRepository for SqliteCampaignsRepository {
    async fn find(&self) -> StoreResult<Vec<Campaign>> {
        let sql = format!("SELECT {} FROM campaigns ORDER BY id", CAMPAIGN_COLUMNS);
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::from_sqlx(e, "list campaigns"))?;

        rows.iter().map(row_to_campaign).collect()
    }

    async fn find_by_id(&self, id: CampaignId) -> StoreResult<Option<Campaign>> {
        let Some(mut campaign) = self.fetch_campaign(id).await? else {
            return Ok(None);
        };
        self.load_members(&mut campaign).await?;
        Ok(Some(campaign))
    }

    async fn count(&self) -> StoreResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM campaigns")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::from_sqlx(e, "count campaigns"))?;
        Ok(row.get("count"))
    }

    async fn create(&self, campaign: &NewCampaign) -> StoreResult<Campaign> {
        let sql = format!(
            r#"
            INSERT INTO campaigns (name, description, start_date, end_date)
            VALUES (?, ?, ?, ?)
            RETURNING {}
            "#,
            CAMPAIGN_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(&campaign.name)
            .bind(&campaign.description)
            .bind(format_timestamp(campaign.start_date))
            .bind(campaign.end_date.map(format_timestamp))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::from_sqlx(e, "save campaign"))?;

        row_to_campaign(&row)
    }

    async fn update_by_id(
        &self,
        id: CampaignId,
        patch: &CampaignPatch,
    ) -> StoreResult<Option<Campaign>> {
        let sql = format!(
            r#"
            UPDATE campaigns SET
                name = COALESCE(?, name),
                description = COALESCE(?, description),
                start_date = COALESCE(?, start_date),
                end_date = CASE WHEN ? THEN ? ELSE end_date END
            WHERE id = ?
            RETURNING {}
            "#,
            CAMPAIGN_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(patch.name.as_deref())
            .bind(patch.description.as_deref())
            .bind(patch.start_date.map(format_timestamp))
            .bind(patch.end_date.is_some())
            .bind(patch.end_date.flatten().map(format_timestamp))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::from_sqlx(e, "update campaign"))?;

        row.as_ref().map(row_to_campaign).transpose()
    }

    async fn delete_by_id(&self, id: CampaignId) -> StoreResult<Option<Campaign>> {
        let sql = format!("DELETE FROM campaigns WHERE id = ? RETURNING {}", CAMPAIGN_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::from_sqlx(e, "delete campaign"))?;

        row.as_ref().map(row_to_campaign).transpose()
    }

    async fn add_lead(&self, membership: &LeadCampaign) -> StoreResult<LeadCampaign> {
        let row = sqlx::query(
            r#"
            INSERT INTO lead_campaigns (lead_id, campaign_id, status)
            VALUES (?, ?, ?)
            RETURNING campaign_id, lead_id, status
            "#,
        )
        .bind(membership.lead_id)
        .bind(membership.campaign_id)
        .bind(membership.status.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            StoreError::from_sqlx(
                e,
                &format!(
                    "lead {} in campaign {}",
                    membership.lead_id, membership.campaign_id
                ),
            )
        })?;

        row_to_lead_campaign(&row)
    }

    async fn update_lead_status(
        &self,
        membership: &LeadCampaign,
    ) -> StoreResult<Option<LeadCampaign>> {
        let row = sqlx::query(
            r#"
            UPDATE lead_campaigns SET status = ?
            WHERE lead_id = ? AND campaign_id = ?
            RETURNING campaign_id, lead_id, status
            "#,
        )
        .bind(membership.status.as_str())
        .bind(membership.lead_id)
        .bind(membership.campaign_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::from_sqlx(e, "update campaign lead status"))?;

        row.as_ref().map(row_to_lead_campaign).transpose()
    }

    async fn remove_lead(
        &self,
        campaign_id: CampaignId,
        lead_id: LeadId,
    ) -> StoreResult<Option<LeadCampaign>> {
        let row = sqlx::query(
            r#"
            DELETE FROM lead_campaigns
            WHERE lead_id = ? AND campaign_id = ?
            RETURNING campaign_id, lead_id, status
            "#,
        )
        .bind(lead_id)
        .bind(campaign_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::from_sqlx(e, "remove lead from campaign"))?;

        row.as_ref().map(row_to_lead_campaign).transpose()
    }
}

fn row_to_campaign(row: &SqliteRow) -> StoreResult<Campaign> {
    let start_date_str: String = row.get("start_date");
    let end_date_str: Option<String> = row.get("end_date");

    Ok(Campaign {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        start_date: parse_timestamp(&start_date_str, "start_date")?,
        end_date: end_date_str
            .map(|s| parse_timestamp(&s, "end_date"))
            .transpose()?,
        leads: None,
    })
}
