mod common;

use anyhow::Result;
use chrono::Duration;
use common::{seed_campaign, seed_group, seed_lead_with_status, seed_leads, test_services};
use leadbook::application::AppError;
use leadbook::domain::{LeadPatch, LeadQuery, LeadStatus, SortField, SortOrder, TransitionError};
use leadbook::storage::{LeadsRepository, SqliteStore};
use tempfile::TempDir;

#[tokio::test]
async fn test_new_lead_must_be_contacted_first() -> Result<()> {
    let (services, _temp) = test_services().await?;
    let leads = seed_leads(&services, &["John"]).await?;
    let john = &leads[0];
    assert_eq!(john.status, LeadStatus::New);

    let err = services
        .leads
        .update_lead(john.id, LeadPatch::status(LeadStatus::Qualified))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::InvalidTransition(TransitionError::MustBeContactedFirst)
    ));
    assert_eq!(err.status_code(), 400);

    // The rejected update left the lead untouched
    let unchanged = services.leads.get_lead_by_id(john.id).await?;
    assert_eq!(unchanged.status, LeadStatus::New);
    assert_eq!(unchanged.updated_at, john.updated_at);

    let contacted = services
        .leads
        .update_lead(john.id, LeadPatch::status(LeadStatus::Contacted))
        .await?;
    assert_eq!(contacted.status, LeadStatus::Contacted);

    Ok(())
}

#[tokio::test]
async fn test_archive_requires_180_days_of_inactivity() -> Result<()> {
    let (services, _temp) = test_services().await?;
    let lead = seed_lead_with_status(&services, "Amy", LeadStatus::Unresponsive).await?;

    let err = services
        .leads
        .update_lead(lead.id, LeadPatch::status(LeadStatus::Archived))
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let almost = lead.updated_at + Duration::days(179);
    let err = services
        .leads
        .update_lead_at(lead.id, LeadPatch::status(LeadStatus::Archived), almost)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::InvalidTransition(TransitionError::ArchiveTooSoon { .. })
    ));

    let enough = lead.updated_at + Duration::days(180);
    let archived = services
        .leads
        .update_lead_at(lead.id, LeadPatch::status(LeadStatus::Archived), enough)
        .await?;
    assert_eq!(archived.status, LeadStatus::Archived);

    Ok(())
}

#[tokio::test]
async fn test_new_lead_cannot_be_archived_even_when_old() -> Result<()> {
    let (services, _temp) = test_services().await?;
    let lead = seed_leads(&services, &["John"]).await?.remove(0);

    let err = services
        .leads
        .update_lead_at(
            lead.id,
            LeadPatch::status(LeadStatus::Archived),
            lead.updated_at + Duration::days(400),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::InvalidTransition(TransitionError::MustBeContactedFirst)
    ));

    Ok(())
}

#[tokio::test]
async fn test_pagination_slices_and_counts() -> Result<()> {
    let (services, _temp) = test_services().await?;
    let names: Vec<String> = (0..12).map(|i| format!("Lead {:02}", i)).collect();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    seed_leads(&services, &names).await?;

    let page = services
        .leads
        .get_all_leads_paginated(&LeadQuery::page(2, 5))
        .await?;
    assert_eq!(page.meta.total, 12);
    assert_eq!(page.meta.total_pages, 3);
    assert_eq!(page.meta.page, 2);
    assert_eq!(page.meta.page_size, 5);
    let got: Vec<_> = page.data.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(got, vec!["Lead 05", "Lead 06", "Lead 07", "Lead 08", "Lead 09"]);

    let last = services
        .leads
        .get_all_leads_paginated(&LeadQuery::page(3, 5))
        .await?;
    assert_eq!(last.data.len(), 2);

    let beyond = services
        .leads
        .get_all_leads_paginated(&LeadQuery::page(9, 5))
        .await?;
    assert!(beyond.data.is_empty());
    assert_eq!(beyond.meta.total, 12);

    // Out-of-range paging is clamped to 1
    let clamped = services
        .leads
        .get_all_leads_paginated(&LeadQuery::page(0, 0))
        .await?;
    assert_eq!(clamped.meta.page, 1);
    assert_eq!(clamped.meta.page_size, 1);
    assert_eq!(clamped.data.len(), 1);
    assert_eq!(clamped.meta.total_pages, 12);

    Ok(())
}

#[tokio::test]
async fn test_name_filter_is_case_insensitive_substring() -> Result<()> {
    let (services, _temp) = test_services().await?;
    seed_leads(&services, &["John", "Amy", "Joanna", "100% Prospect", "Bob_Smith"]).await?;

    let page = services
        .leads
        .get_all_leads_paginated(&LeadQuery::default().with_name("JO"))
        .await?;
    let got: Vec<_> = page.data.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(got, vec!["Joanna", "John"]);
    assert_eq!(page.meta.total, 2);

    // LIKE wildcards in the input match literally
    let percent = services
        .leads
        .get_all_leads_paginated(&LeadQuery::default().with_name("%"))
        .await?;
    assert_eq!(percent.meta.total, 1);
    assert_eq!(percent.data[0].name, "100% Prospect");

    let underscore = services
        .leads
        .get_all_leads_paginated(&LeadQuery::default().with_name("_"))
        .await?;
    assert_eq!(underscore.meta.total, 1);
    assert_eq!(underscore.data[0].name, "Bob_Smith");

    // Blank names do not filter
    let blank = services
        .leads
        .get_all_leads_paginated(&LeadQuery::default().with_name("  "))
        .await?;
    assert_eq!(blank.meta.total, 5);

    Ok(())
}

#[tokio::test]
async fn test_status_filter_and_status_sort() -> Result<()> {
    let (services, _temp) = test_services().await?;
    seed_lead_with_status(&services, "Archie", LeadStatus::Archived).await?;
    seed_lead_with_status(&services, "Quinn", LeadStatus::Qualified).await?;
    seed_lead_with_status(&services, "Nora", LeadStatus::New).await?;
    seed_lead_with_status(&services, "Carl", LeadStatus::Contacted).await?;
    seed_lead_with_status(&services, "Cleo", LeadStatus::Contacted).await?;

    let contacted = services
        .leads
        .get_all_leads_paginated(&LeadQuery::default().with_status(LeadStatus::Contacted))
        .await?;
    assert_eq!(contacted.meta.total, 2);
    assert!(
        contacted
            .data
            .iter()
            .all(|l| l.status == LeadStatus::Contacted)
    );

    let by_status = services
        .leads
        .get_all_leads_paginated(
            &LeadQuery::default().sorted(SortField::Status, SortOrder::Asc),
        )
        .await?;
    let got: Vec<_> = by_status.data.iter().map(|l| l.name.as_str()).collect();
    // Declaration order of the statuses, ties broken by id
    assert_eq!(got, vec!["Nora", "Carl", "Cleo", "Quinn", "Archie"]);

    let by_name_desc = services
        .leads
        .get_all_leads_paginated(&LeadQuery::default().sorted(SortField::Name, SortOrder::Desc))
        .await?;
    let got: Vec<_> = by_name_desc.data.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(got, vec!["Quinn", "Nora", "Cleo", "Carl", "Archie"]);

    Ok(())
}

#[tokio::test]
async fn test_show_lead_includes_relations() -> Result<()> {
    let (services, _temp) = test_services().await?;
    let john = seed_leads(&services, &["John"]).await?.remove(0);

    let bare = services.leads.get_lead_by_id(john.id).await?;
    assert_eq!(bare.groups.as_deref().map(<[_]>::len), Some(0));
    assert_eq!(bare.campaigns.as_deref().map(<[_]>::len), Some(0));

    let group = seed_group(&services, "VIP").await?;
    let campaign = seed_campaign(&services, "Spring").await?;
    services.groups.add_group_lead(group.id, john.id).await?;
    services
        .campaigns
        .add_campaign_lead(campaign.id, john.id, None)
        .await?;

    let full = services.leads.get_lead_by_id(john.id).await?;
    let groups = full.groups.unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].name, "VIP");
    let campaigns = full.campaigns.unwrap();
    assert_eq!(campaigns.len(), 1);
    assert_eq!(campaigns[0].campaign_id, campaign.id);

    // Listings only carry relations when asked for
    let listed = services
        .leads
        .get_all_leads_paginated(&LeadQuery::default())
        .await?;
    assert!(listed.data[0].groups.is_none());

    Ok(())
}

#[tokio::test]
async fn test_missing_lead_is_not_found() -> Result<()> {
    let (services, _temp) = test_services().await?;

    let err = services.leads.get_lead_by_id(77).await.unwrap_err();
    assert!(matches!(err, AppError::LeadNotFound(77)));

    let err = services
        .leads
        .update_lead(77, LeadPatch::status(LeadStatus::Contacted))
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let err = services.leads.delete_lead(77).await.unwrap_err();
    assert!(err.is_not_found());

    Ok(())
}

#[tokio::test]
async fn test_delete_lead_drops_memberships() -> Result<()> {
    let (services, _temp) = test_services().await?;
    let john = seed_leads(&services, &["John"]).await?.remove(0);
    let group = seed_group(&services, "VIP").await?;
    let campaign = seed_campaign(&services, "Spring").await?;
    services.groups.add_group_lead(group.id, john.id).await?;
    services
        .campaigns
        .add_campaign_lead(campaign.id, john.id, None)
        .await?;

    let deleted = services.leads.delete_lead(john.id).await?;
    assert_eq!(deleted.id, john.id);

    let group = services.groups.get_group_by_id(group.id).await?;
    assert_eq!(group.lead_ids(), Some(vec![]));
    let campaign = services.campaigns.get_campaign_by_id(campaign.id).await?;
    assert!(campaign.leads.unwrap().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_guarded_update_detects_concurrent_write() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_url = format!("sqlite:{}?mode=rwc", temp_dir.path().join("test.db").display());
    let store = SqliteStore::init(&db_url).await?;
    let leads = store.leads();

    let lead = leads.create(&common::new_lead("John")).await?;
    let seen = lead.updated_at;

    // Someone else writes first, on a later microsecond
    tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    leads
        .update_by_id(lead.id, &LeadPatch::status(LeadStatus::Contacted))
        .await?
        .unwrap();

    let lost = leads
        .update_if_unmodified(lead.id, seen, &LeadPatch::status(LeadStatus::Qualified))
        .await?;
    assert!(lost.is_none());

    let current = leads.find_by_id(lead.id).await?.unwrap();
    assert_eq!(current.status, LeadStatus::Contacted);
    let won = leads
        .update_if_unmodified(
            lead.id,
            current.updated_at,
            &LeadPatch::status(LeadStatus::Qualified),
        )
        .await?;
    assert_eq!(won.unwrap().status, LeadStatus::Qualified);

    Ok(())
}

#[tokio::test]
async fn test_name_filter_folds_non_ascii_case() -> Result<()> {
    let (services, _temp) = test_services().await?;
    seed_leads(&services, &["ÉLODIE", "Élodie", "Zoë", "Elliot"]).await?;

    let page = services
        .leads
        .get_all_leads_paginated(&LeadQuery::default().with_name("élo"))
        .await?;
    let got: Vec<_> = page.data.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(got, vec!["ÉLODIE", "Élodie"]);
    assert_eq!(page.meta.total, 2);

    let zoe = services
        .leads
        .get_all_leads_paginated(&LeadQuery::default().with_name("ZOË"))
        .await?;
    assert_eq!(zoe.meta.total, 1);

    // Renaming refreshes the searchable name
    let first = page.data[0].clone();
    services
        .leads
        .update_lead(
            first.id,
            LeadPatch {
                name: Some("Ösel".into()),
                ..LeadPatch::default()
            },
        )
        .await?;
    let renamed = services
        .leads
        .get_all_leads_paginated(&LeadQuery::default().with_name("ösel"))
        .await?;
    assert_eq!(renamed.meta.total, 1);
    assert_eq!(renamed.data[0].id, first.id);
    let old = services
        .leads
        .get_all_leads_paginated(&LeadQuery::default().with_name("élo"))
        .await?;
    assert_eq!(old.meta.total, 1);

    Ok(())
}

#[tokio::test]
async fn test_like_wildcards_in_name_match_literally() -> Result<()> {
    let (services, _temp) = test_services().await?;
    seed_leads(&services, &["50% off", "500 Club", "Back\\slash", "Backslash"]).await?;

    let percent = services
        .leads
        .get_all_leads_paginated(&LeadQuery::default().with_name("50%"))
        .await?;
    let got: Vec<_> = percent.data.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(got, vec!["50% off"]);

    let backslash = services
        .leads
        .get_all_leads_paginated(&LeadQuery::default().with_name("k\\s"))
        .await?;
    assert_eq!(backslash.meta.total, 1);
    assert_eq!(backslash.data[0].name, "Back\\slash");

    Ok(())
}

#[tokio::test]
async fn test_sort_by_created_at() -> Result<()> {
    let (services, _temp) = test_services().await?;
    for name in ["Middle", "Alpha", "Zulu"] {
        seed_leads(&services, &[name]).await?;
        // Distinct creation instants
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }

    let oldest_first = services
        .leads
        .get_all_leads_paginated(
            &LeadQuery::default().sorted(SortField::CreatedAt, SortOrder::Asc),
        )
        .await?;
    let got: Vec<_> = oldest_first.data.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(got, vec!["Middle", "Alpha", "Zulu"]);

    let newest_first = services
        .leads
        .get_all_leads_paginated(
            &LeadQuery::default().sorted(SortField::CreatedAt, SortOrder::Desc),
        )
        .await?;
    let got: Vec<_> = newest_first.data.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(got, vec!["Zulu", "Alpha", "Middle"]);

    Ok(())
}

#[tokio::test]
async fn test_extreme_paging_values() -> Result<()> {
    let (services, _temp) = test_services().await?;
    seed_leads(&services, &["John", "Amy"]).await?;

    let huge_size = services
        .leads
        .get_all_leads_paginated(&LeadQuery::page(1, i64::MAX))
        .await?;
    assert_eq!(huge_size.data.len(), 2);
    assert_eq!(huge_size.meta.total_pages, 1);

    let far_page = services
        .leads
        .get_all_leads_paginated(&LeadQuery::page(i64::MAX, 10))
        .await?;
    assert!(far_page.data.is_empty());
    assert_eq!(far_page.meta.total, 2);

    Ok(())
}
