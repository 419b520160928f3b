use anyhow::Result;
use chrono::Utc;
use leadbook::domain::{NewCampaign, NewGroup};
use leadbook::storage::{CampaignsRepository, GroupsRepository, SqliteStore};
use tempfile::TempDir;

async fn test_store() -> Result<(SqliteStore, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_url = format!("sqlite:{}?mode=rwc", temp_dir.path().join("test.db").display());
    let store = SqliteStore::init(&db_url).await?;
    Ok((store, temp_dir))
}

#[tokio::test]
async fn test_group_and_campaign_counts() -> Result<()> {
    let (store, _temp) = test_store().await?;
    let groups = store.groups();
    let campaigns = store.campaigns();
    assert_eq!(groups.count().await?, 0);
    assert_eq!(campaigns.count().await?, 0);

    let vip = groups.create(&NewGroup::new("VIP", "")).await?;
    groups.create(&NewGroup::new("Cold", "")).await?;
    campaigns
        .create(&NewCampaign::new("Spring", "", Utc::now()))
        .await?;
    assert_eq!(groups.count().await?, 2);
    assert_eq!(campaigns.count().await?, 1);

    groups.delete_by_id(vip.id).await?;
    assert_eq!(groups.count().await?, 1);

    Ok(())
}

#[tokio::test]
async fn test_migrate_is_idempotent() -> Result<()> {
    let (store, _temp) = test_store().await?;
    store.groups().create(&NewGroup::new("VIP", "")).await?;

    store.migrate().await?;
    assert_eq!(store.groups().count().await?, 1);

    Ok(())
}
