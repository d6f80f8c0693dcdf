//! Summary repository tests against the in-memory backend.

mod common;

use chrono::{TimeZone, Utc};

use clinic_persistence::summary::{CgmPeriod, Comparator, Filter, StatField, Summary};
use clinic_persistence::{ErrorKind, Pagination, Sort};

use common::*;

fn names<T: clinic_persistence::summary::Period>(summaries: &[Summary<T>]) -> Vec<String> {
    summaries
        .iter()
        .map(|summary| summary.patients[0].full_name.clone().unwrap_or_default())
        .collect()
}

// ============================================================================
// Create Or Update Tests
// ============================================================================

#[tokio::test]
async fn test_upsert_twice_keeps_one_document_with_latest_stats() {
    let ctx = TestContext::new().await;
    let repo = ctx.services.cgm_summaries();

    let summary = cgm_summary("user-1", "clinic-1", "Alice Adams");
    repo.create_or_update(&ctx.ctx, &summary.clone().with_stats(cgm_stats_with_low(Some(0.1))))
        .await
        .unwrap();
    let first = repo.get(&ctx.ctx, "user-1").await.unwrap();

    repo.create_or_update(&ctx.ctx, &summary.with_stats(cgm_stats_with_low(Some(0.2))))
        .await
        .unwrap();
    let second = repo.get(&ctx.ctx, "user-1").await.unwrap();

    assert_eq!(ctx.backend.summaries().await.len(), 1);
    assert_eq!(second.stats.time_in_low_percent, Some(0.2));
    assert!(second.id.is_some());
    assert_eq!(first.id, second.id);
    assert_eq!(second.summary_type, "cgm");
}

#[tokio::test]
async fn test_cgm_and_bgm_summaries_coexist() {
    let ctx = TestContext::new().await;

    ctx.services
        .cgm_summaries()
        .create_or_update(&ctx.ctx, &cgm_summary("user-1", "clinic-1", "Alice"))
        .await
        .unwrap();
    ctx.services
        .bgm_summaries()
        .create_or_update(&ctx.ctx, &bgm_summary("user-1", "clinic-1", "Alice"))
        .await
        .unwrap();

    assert_eq!(ctx.backend.summaries().await.len(), 2);

    let cgm = ctx
        .services
        .cgm_summaries()
        .list(&ctx.ctx, &Filter::for_clinic("clinic-1"), Pagination::default(), &[])
        .await
        .unwrap();
    assert_eq!(cgm.total, 1);
    assert_eq!(cgm.items[0].summary_type, "cgm");

    let bgm = ctx.services.bgm_summaries().get(&ctx.ctx, "user-1").await.unwrap();
    assert_eq!(bgm.summary_type, "bgm");
}

#[tokio::test]
async fn test_mismatched_type_is_rejected_without_write() {
    let ctx = TestContext::new().await;

    let mut summary = cgm_summary("user-1", "clinic-1", "Alice");
    summary.summary_type = "bgm".to_string();
    let err = ctx
        .services
        .cgm_summaries()
        .create_or_update(&ctx.ctx, &summary)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(ctx.backend.summaries().await.is_empty());
}

// ============================================================================
// Get / Remove Tests
// ============================================================================

#[tokio::test]
async fn test_get_missing_summary() {
    let ctx = TestContext::new().await;

    let err = ctx
        .services
        .cgm_summaries()
        .get(&ctx.ctx, "user-1")
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "resource not found: CGMSummary/user-1");
}

#[tokio::test]
async fn test_remove_summary() {
    let ctx = TestContext::new().await;
    let repo = ctx.services.cgm_summaries();

    let err = repo.remove(&ctx.ctx, "user-1").await.unwrap_err();
    assert!(err.is_not_found());

    repo.create_or_update(&ctx.ctx, &cgm_summary("user-1", "clinic-1", "Alice"))
        .await
        .unwrap();
    repo.remove(&ctx.ctx, "user-1").await.unwrap();

    assert!(repo.get(&ctx.ctx, "user-1").await.unwrap_err().is_not_found());
    assert!(ctx.backend.summaries().await.is_empty());
}

#[tokio::test]
async fn test_remove_only_touches_its_type() {
    let ctx = TestContext::new().await;

    ctx.services
        .bgm_summaries()
        .create_or_update(&ctx.ctx, &bgm_summary("user-1", "clinic-1", "Alice"))
        .await
        .unwrap();

    let err = ctx
        .services
        .cgm_summaries()
        .remove(&ctx.ctx, "user-1")
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(ctx.backend.summaries().await.len(), 1);
}

// ============================================================================
// List Tests
// ============================================================================

#[tokio::test]
async fn test_list_pages_do_not_overlap() {
    let ctx = TestContext::new().await;
    let repo = ctx.services.cgm_summaries();
    for i in 0..23 {
        repo.create_or_update(
            &ctx.ctx,
            &cgm_summary(&format!("user-{i:02}"), "clinic-1", &format!("Patient {i:02}")),
        )
        .await
        .unwrap();
    }

    let filter = Filter::for_clinic("clinic-1");
    let page = repo
        .list(&ctx.ctx, &filter, Pagination::new(10, 5), &[])
        .await
        .unwrap();
    assert_eq!(page.len(), 5);
    assert_eq!(page.total, 23);
    assert_eq!(
        names(&page.items),
        vec!["Patient 10", "Patient 11", "Patient 12", "Patient 13", "Patient 14"]
    );

    let next = repo
        .list(&ctx.ctx, &filter, Pagination::new(15, 5), &[])
        .await
        .unwrap();
    assert_eq!(next.total, 23);
    let first: Vec<_> = names(&page.items);
    assert!(names(&next.items).iter().all(|name| !first.contains(name)));

    let tail = repo
        .list(&ctx.ctx, &filter, Pagination::new(20, 5), &[])
        .await
        .unwrap();
    assert_eq!(tail.len(), 3);
}

#[tokio::test]
async fn test_default_sort_is_case_insensitive_and_stable() {
    let ctx = TestContext::new().await;
    let repo = ctx.services.cgm_summaries();
    for (user, name) in [("u1", "bob"), ("u2", "Alice"), ("u3", "carol"), ("u4", "Bob")] {
        repo.create_or_update(&ctx.ctx, &cgm_summary(user, "clinic-1", name))
            .await
            .unwrap();
    }

    let filter = Filter::for_clinic("clinic-1");
    let first = repo
        .list(&ctx.ctx, &filter, Pagination::default(), &[])
        .await
        .unwrap();
    let order = names(&first.items);
    assert_eq!(order[0], "Alice");
    assert_eq!(order[3], "carol");
    assert!(order[1].eq_ignore_ascii_case("bob"));
    assert!(order[2].eq_ignore_ascii_case("bob"));

    let again = repo
        .list(&ctx.ctx, &filter, Pagination::default(), &[])
        .await
        .unwrap();
    let ids = |page: &clinic_persistence::Page<Summary<CgmPeriod>>| {
        page.items.iter().map(|s| s.id.clone()).collect::<Vec<_>>()
    };
    assert_eq!(ids(&first), ids(&again));
}

#[tokio::test]
async fn test_list_scopes_by_clinic_and_search() {
    let ctx = TestContext::new().await;
    let repo = ctx.services.cgm_summaries();
    repo.create_or_update(&ctx.ctx, &cgm_summary("u1", "clinic-1", "Alice Adams"))
        .await
        .unwrap();
    repo.create_or_update(&ctx.ctx, &cgm_summary("u2", "clinic-1", "Bob Brown"))
        .await
        .unwrap();
    repo.create_or_update(&ctx.ctx, &cgm_summary("u3", "clinic-2", "Alicia Allen"))
        .await
        .unwrap();

    let page = repo
        .list(
            &ctx.ctx,
            &Filter::for_clinic("clinic-1").with_search("ALI"),
            Pagination::default(),
            &[],
        )
        .await
        .unwrap();
    assert_eq!(names(&page.items), vec!["Alice Adams"]);
    assert_eq!(page.total, 1);

    // Email is searched too.
    let page = repo
        .list(
            &ctx.ctx,
            &Filter::for_clinic("clinic-2").with_search("u3@example"),
            Pagination::default(),
            &[],
        )
        .await
        .unwrap();
    assert_eq!(names(&page.items), vec!["Alicia Allen"]);

    let empty = repo
        .list(&ctx.ctx, &Filter::for_clinic("clinic-3"), Pagination::default(), &[])
        .await
        .unwrap();
    assert!(empty.is_empty());
    assert_eq!(empty.total, 0);
}

#[tokio::test]
async fn test_list_threshold_filter() {
    let ctx = TestContext::new().await;
    let repo = ctx.services.cgm_summaries();
    for (user, low) in [("u1", Some(0.10)), ("u2", Some(0.01)), ("u3", None)] {
        repo.create_or_update(
            &ctx.ctx,
            &cgm_summary(user, "clinic-1", user).with_stats(cgm_stats_with_low(low)),
        )
        .await
        .unwrap();
    }

    let filter = Filter::for_clinic("clinic-1").with_threshold(
        StatField::TimeInLowPercent,
        Comparator::GreaterThan,
        0.04,
    );
    let page = repo
        .list(&ctx.ctx, &filter, Pagination::default(), &[])
        .await
        .unwrap();

    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].user_id, "u1");
}

#[tokio::test]
async fn test_list_last_upload_window_and_sort() {
    let ctx = TestContext::new().await;
    let repo = ctx.services.cgm_summaries();
    let uploads = [
        ("u1", Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap()),
        ("u2", Utc.with_ymd_and_hms(2024, 1, 20, 0, 0, 0).unwrap()),
        ("u3", Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()),
    ];
    for (user, uploaded) in uploads {
        let mut summary = cgm_summary(user, "clinic-1", user);
        summary.dates.has_last_upload_date = true;
        summary.dates.last_upload_date = Some(uploaded);
        repo.create_or_update(&ctx.ctx, &summary).await.unwrap();
    }

    let filter = Filter::for_clinic("clinic-1").with_last_upload_between(
        Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
        Some(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()),
    );
    let page = repo
        .list(
            &ctx.ctx,
            &filter,
            Pagination::default(),
            &[Sort::descending("dates.lastUploadDate")],
        )
        .await
        .unwrap();

    let users: Vec<_> = page.items.iter().map(|s| s.user_id.as_str()).collect();
    assert_eq!(users, vec!["u2", "u1"]);
    assert_eq!(page.total, 2);
}

#[tokio::test]
async fn test_list_rejects_empty_page() {
    let ctx = TestContext::new().await;

    let err = ctx
        .services
        .cgm_summaries()
        .list(&ctx.ctx, &Filter::default(), Pagination::new(0, 0), &[])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}
