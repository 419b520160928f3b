use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::domain::{Group, GroupId, GroupPatch, LeadId, NewGroup};
use crate::storage::{GroupsRepository, StoreError, StoreResult};

use super::leads::{LEAD_COLUMNS, row_to_group, row_to_lead};

/// Groups repository over a SQLite pool.
pub struct SqliteGroupsRepository {
    pool: SqlitePool,
}

impl SqliteGroupsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch_group(&self, id: GroupId) -> StoreResult<Option<Group>> {
        let row = sqlx::query("SELECT id, name, description FROM lead_groups WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::from_sqlx(e, "fetch group"))?;

        Ok(row.as_ref().map(row_to_group))
    }

    /// Fetch a group with its member leads.
    async fn fetch_group_with_leads(&self, id: GroupId) -> StoreResult<Option<Group>> {
        let Some(mut group) = self.fetch_group(id).await? else {
            return Ok(None);
        };

        let sql = format!(
            r#"
            SELECT {}
            FROM leads l
            JOIN group_members gm ON gm.lead_id = l.id
            WHERE gm.group_id = ?
            ORDER BY l.id
            "#,
            LEAD_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::from_sqlx(e, "load group leads"))?;

        group.leads = Some(
            rows.iter()
                .map(row_to_lead)
                .collect::<StoreResult<Vec<_>>>()?,
        );
        Ok(Some(group))
    }

    async fn lead_exists(&self, lead_id: LeadId) -> StoreResult<bool> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM leads WHERE id = ?")
            .bind(lead_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::from_sqlx(e, "check lead"))?;
        Ok(row.get::<i64, _>("count") > 0)
    }
}

#[async_trait]
impl GroupsRepository for SqliteGroupsRepository {
    async fn find(&self) -> StoreResult<Vec<Group>> {
        let rows = sqlx::query("SELECT id, name, description FROM lead_groups ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::from_sqlx(e, "list groups"))?;

        Ok(rows.iter().map(row_to_group).collect())
    }

    async fn find_by_id(&self, id: GroupId) -> StoreResult<Option<Group>> {
        self.fetch_group_with_leads(id).await
    }

    async fn count(&self) -> StoreResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM lead_groups")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::from_sqlx(e, "count groups"))?;
        Ok(row.get("count"))
    }

    async fn create(&self, group: &NewGroup) -> StoreResult<Group> {
        let row = sqlx::query(
            r#"
            INSERT INTO lead_groups (name, description)
            VALUES (?, ?)
            RETURNING id, name, description
            "#,
        )
        .bind(&group.name)
        .bind(&group.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::from_sqlx(e, "save group"))?;

        Ok(row_to_group(&row))
    }

    async fn update_by_id(&self, id: GroupId, patch: &GroupPatch) -> StoreResult<Option<Group>> {
        let row = sqlx::query(
            r#"
            UPDATE lead_groups SET
                name = COALESCE(?, name),
                description = COALESCE(?, description)
            WHERE id = ?
            RETURNING id, name, description
            "#,
        )
        .bind(patch.name.as_deref())
        .bind(patch.description.as_deref())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::from_sqlx(e, "update group"))?;

        Ok(row.as_ref().map(row_to_group))
    }

    async fn delete_by_id(&self, id: GroupId) -> StoreResult<Option<Group>> {
        let row = sqlx::query("DELETE FROM lead_groups WHERE id = ? RETURNING id, name, description")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::from_sqlx(e, "delete group"))?;

        Ok(row.as_ref().map(row_to_group))
    }

    async fn add_lead(&self, group_id: GroupId, lead_id: LeadId) -> StoreResult<Option<Group>> {
        if self.fetch_group(group_id).await?.is_none() {
            return Ok(None);
        }
        if !self.lead_exists(lead_id).await? {
            return Err(StoreError::MissingReference(format!("lead {}", lead_id)));
        }

        sqlx::query("INSERT OR IGNORE INTO group_members (group_id, lead_id) VALUES (?, ?)")
            .bind(group_id)
            .bind(lead_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::from_sqlx(e, "add lead to group"))?;

        self.fetch_group_with_leads(group_id).await
    }

    async fn remove_lead(
        &self,
        group_id: GroupId,
        lead_id: LeadId,
    ) -> StoreResult<Option<Group>> {
        if self.fetch_group(group_id).await?.is_none() {
            return Ok(None);
        }
        if !self.lead_exists(lead_id).await? {
            return Err(StoreError::MissingReference(format!("lead {}", lead_id)));
        }

        sqlx::query("DELETE FROM group_members WHERE group_id = ? AND lead_id = ?")
            .bind(group_id)
            .bind(lead_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::from_sqlx(e, "remove lead from group"))?;

        self.fetch_group_with_leads(group_id).await
    }
}
