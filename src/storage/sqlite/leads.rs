use anyhow::{Context, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::domain::{
    FindLeads, Group, Lead, LeadCampaign, LeadCampaignStatus, LeadFilter, LeadId, LeadInclude,
    LeadPatch, LeadStatus, NewLead, SortField,
};
use crate::storage::{LeadsRepository, StoreError, StoreResult};

use super::{format_timestamp, now_timestamp, parse_timestamp};

pub(super) const LEAD_COLUMNS: &str =
    "l.id, l.name, l.email, l.phone, l.status, l.created_at, l.updated_at";

const RETURNING_LEAD: &str = "RETURNING id, name, email, phone, status, created_at, updated_at";

/// Bind value for dynamically built queries.
enum Arg {
    Text(String),
    Int(i64),
}

/// Leads repository over a SQLite pool.
pub struct SqliteLeadsRepository {
    pool: SqlitePool,
}

impl SqliteLeadsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch_lead(&self, id: LeadId) -> StoreResult<Option<Lead>> {
        let sql = format!("SELECT {} FROM leads l WHERE l.id = ?", LEAD_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::from_sqlx(e, "fetch lead"))?;

        row.as_ref().map(row_to_lead).transpose()
    }

    async fn load_relations(&self, lead: &mut Lead, include: LeadInclude) -> StoreResult<()> {
        if include.groups {
            let rows = sqlx::query(
                r#"
                SELECT g.id, g.name, g.description
                FROM lead_groups g
                JOIN group_members gm ON gm.group_id = g.id
                WHERE gm.lead_id = ?
                ORDER BY g.id
                "#,
            )
            .bind(lead.id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::from_sqlx(e, "load lead groups"))?;

            lead.groups = Some(rows.iter().map(row_to_group).collect());
        }

        if include.campaigns {
            let rows = sqlx::query(
                r#"
                SELECT campaign_id, lead_id, status
                FROM lead_campaigns
                WHERE lead_id = ?
                ORDER BY campaign_id
                "#,
            )
            .bind(lead.id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::from_sqlx(e, "load lead campaigns"))?;

            lead.campaigns = Some(
                rows.iter()
                    .map(row_to_lead_campaign)
                    .collect::<StoreResult<Vec<_>>>()?,
            );
        }

        Ok(())
    }

    async fn apply_update(
        &self,
        id: LeadId,
        seen_updated_at: Option<DateTime<Utc>>,
        patch: &LeadPatch,
    ) -> StoreResult<Option<Lead>> {
        let mut sql = String::from(
            r#"
            UPDATE leads SET
                name = COALESCE(?, name),
                name_search = COALESCE(?, name_search),
                email = COALESCE(?, email),
                phone = COALESCE(?, phone),
                status = COALESCE(?, status),
                updated_at = ?
            WHERE id = ?
            "#,
        );
        if seen_updated_at.is_some() {
            sql.push_str(" AND updated_at = ?");
        }

        let mut query = sqlx::query(&sql)
            .bind(patch.name.as_deref())
            .bind(patch.name.as_deref().map(fold_name))
            .bind(patch.email.as_deref())
            .bind(patch.phone.as_deref())
            .bind(patch.status.map(|s| s.as_str()))
            .bind(format_timestamp(now_timestamp()))
            .bind(id);
        if let Some(seen) = seen_updated_at {
            query = query.bind(format_timestamp(seen));
        }

        let result = query
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::from_sqlx(e, "update lead"))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.fetch_lead(id).await
    }
}

#[async_trait]
impl LeadsRepository for SqliteLeadsRepository {
    async fn find(&self, params: &FindLeads) -> StoreResult<Vec<Lead>> {
        let mut args = Vec::new();
        let mut sql = format!("SELECT {} FROM leads l WHERE 1=1", LEAD_COLUMNS);
        push_filter(&mut sql, &mut args, &params.filter);

        sql.push_str(&format!(
            " ORDER BY {} {}, l.id ASC",
            sort_expression(params.sort_by),
            params.order_by.as_sql()
        ));

        if params.limit.is_some() || params.offset.is_some() {
            sql.push_str(&format!(
                " LIMIT {} OFFSET {}",
                params.limit.unwrap_or(-1),
                params.offset.unwrap_or(0).max(0)
            ));
        }

        let rows = bind_args(sqlx::query(&sql), &args)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::from_sqlx(e, "list leads"))?;

        let mut leads = rows
            .iter()
            .map(row_to_lead)
            .collect::<StoreResult<Vec<_>>>()?;

        if params.include != LeadInclude::default() {
            for lead in &mut leads {
                self.load_relations(lead, params.include).await?;
            }
        }

        Ok(leads)
    }

    async fn find_by_id(&self, id: LeadId) -> StoreResult<Option<Lead>> {
        let Some(mut lead) = self.fetch_lead(id).await? else {
            return Ok(None);
        };
        self.load_relations(&mut lead, LeadInclude::all()).await?;
        Ok(Some(lead))
    }

    async fn count(&self, filter: &LeadFilter) -> StoreResult<i64> {
        let mut args = Vec::new();
        let mut sql = String::from("SELECT COUNT(*) as count FROM leads l WHERE 1=1");
        push_filter(&mut sql, &mut args, filter);

        let row = bind_args(sqlx::query(&sql), &args)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::from_sqlx(e, "count leads"))?;

        Ok(row.get("count"))
    }

    async fn create(&self, lead: &NewLead) -> StoreResult<Lead> {
        let now = format_timestamp(now_timestamp());
        let status = lead.status.unwrap_or(LeadStatus::New);

        let row = sqlx::query(
            r#"
            INSERT INTO leads (name, name_search, email, phone, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&lead.name)
        .bind(fold_name(&lead.name))
        .bind(&lead.email)
        .bind(&lead.phone)
        .bind(status.as_str())
        .bind(&now)
        .bind(&now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::from_sqlx(e, "save lead"))?;

        let id: LeadId = row.get("id");
        self.fetch_lead(id)
            .await?
            .ok_or_else(|| StoreError::Backend(anyhow!("Lead {} vanished after insert", id)))
    }

    async fn update_by_id(&self, id: LeadId, patch: &LeadPatch) -> StoreResult<Option<Lead>> {
        self.apply_update(id, None, patch).await
    }

    async fn update_if_unmodified(
        &self,
        id: LeadId,
        seen_updated_at: DateTime<Utc>,
        patch: &LeadPatch,
    ) -> StoreResult<Option<Lead>> {
        self.apply_update(id, Some(seen_updated_at), patch).await
    }

    async fn delete_by_id(&self, id: LeadId) -> StoreResult<Option<Lead>> {
        let sql = format!("DELETE FROM leads WHERE id = ? {}", RETURNING_LEAD);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::from_sqlx(e, "delete lead"))?;

        row.as_ref().map(row_to_lead).transpose()
    }
}

/// Append the WHERE clauses for `filter`. Relation filters become EXISTS
/// subqueries so membership never has to be checked in memory.
fn push_filter(sql: &mut String, args: &mut Vec<Arg>, filter: &LeadFilter) {
    if let Some(name) = &filter.name {
        sql.push_str(r" AND l.name_search LIKE ? ESCAPE '\'");
        args.push(Arg::Text(format!("%{}%", escape_like(&fold_name(name)))));
    }
    if let Some(status) = filter.status {
        sql.push_str(" AND l.status = ?");
        args.push(Arg::Text(status.as_str().to_string()));
    }
    if let Some(group_id) = filter.group_id {
        sql.push_str(
            " AND EXISTS (SELECT 1 FROM group_members gm WHERE gm.lead_id = l.id AND gm.group_id = ?)",
        );
        args.push(Arg::Int(group_id));
    }
    if let Some(campaign_id) = filter.campaign_id {
        sql.push_str(
            " AND EXISTS (SELECT 1 FROM lead_campaigns lc WHERE lc.lead_id = l.id AND lc.campaign_id = ?",
        );
        args.push(Arg::Int(campaign_id));
        if let Some(status) = filter.campaign_status {
            sql.push_str(" AND lc.status = ?");
            args.push(Arg::Text(status.as_str().to_string()));
        }
        sql.push(')');
    }
}

fn bind_args<'q>(
    mut query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    args: &'q [Arg],
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    for arg in args {
        query = match arg {
            Arg::Text(value) => query.bind(value.as_str()),
            Arg::Int(value) => query.bind(*value),
        };
    }
    query
}

/// Case folding for name search. SQLite's `LOWER()` only folds ASCII, so the
/// folded copy is computed here and stored next to the name.
fn fold_name(name: &str) -> String {
    name.to_lowercase()
}

fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Status sorts by declaration order, not alphabetically.
fn sort_expression(sort_by: SortField) -> String {
    match sort_by {
        SortField::Name => "l.name".to_string(),
        SortField::CreatedAt => "l.created_at".to_string(),
        SortField::Status => {
            let mut expr = String::from("CASE l.status");
            for (rank, status) in LeadStatus::ALL.iter().enumerate() {
                expr.push_str(&format!(" WHEN '{}' THEN {}", status.as_str(), rank));
            }
            expr.push_str(" END");
            expr
        }
    }
}

pub(super) fn row_to_lead(row: &SqliteRow) -> StoreResult<Lead> {
    let status_str: String = row.get("status");
    let created_at_str: String = row.get("created_at");
    let updated_at_str: String = row.get("updated_at");

    Ok(Lead {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        phone: row.get("phone"),
        status: LeadStatus::parse(&status_str)
            .ok_or_else(|| anyhow!("Invalid lead status: {}", status_str))?,
        created_at: parse_timestamp(&created_at_str, "created_at")?,
        updated_at: parse_timestamp(&updated_at_str, "updated_at")?,
        groups: None,
        campaigns: None,
    })
}

pub(super) fn row_to_group(row: &SqliteRow) -> Group {
    Group {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        leads: None,
    }
}

pub(super) fn row_to_lead_campaign(row: &SqliteRow) -> StoreResult<LeadCampaign> {
    let status_str: String = row.get("status");
    Ok(LeadCampaign {
        campaign_id: row.get("campaign_id"),
        lead_id: row.get("lead_id"),
        status: LeadCampaignStatus::parse(&status_str)
            .with_context(|| format!("Invalid campaign status: {}", status_str))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("jo"), "jo");
        assert_eq!(escape_like("50%_off"), r"50\%\_off");
    }

    #[test]
    fn test_fold_name_handles_non_ascii() {
        assert_eq!(fold_name("ÉLODIE"), "élodie");
        assert_eq!(fold_name("Zoë"), "zoë");
    }

    #[test]
    fn test_status_sort_uses_declaration_order() {
        let expr = sort_expression(SortField::Status);
        assert!(expr.starts_with("CASE l.status WHEN 'New' THEN 0 WHEN 'Contacted' THEN 1"));
        assert!(expr.ends_with("WHEN 'Archived' THEN 6 END"));
    }

    #[test]
    fn test_relation_filters_are_pushed_into_sql() {
        let mut sql = String::new();
        let mut args = Vec::new();
        let filter = LeadFilter {
            name: Some("Jo".into()),
            campaign_id: Some(3),
            campaign_status: Some(LeadCampaignStatus::Engaged),
            ..LeadFilter::default()
        };
        push_filter(&mut sql, &mut args, &filter);

        assert!(sql.contains("l.name_search LIKE ?"));
        assert!(sql.contains("lc.campaign_id = ? AND lc.status = ?)"));
        assert_eq!(args.len(), 3);
        assert!(matches!(&args[0], Arg::Text(p) if p == "%jo%"));
        assert!(matches!(&args[1], Arg::Int(3)));
    }
}
