//! End-to-end sweeps against the in-memory mail store.
//!
//! Each test builds a fixture inbox, runs a full sweep (folders, run log,
//! overview, queries) and inspects what the sinks recorded.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use mail_sweep::config::SweepConfig;
use mail_sweep::error::{Error, PipelineError, StorageError};
use mail_sweep::mail::MessageSummary;
use mail_sweep::mail::memory::{MemoryMailStore, MemoryThread};
use mail_sweep::pipeline::keywords::KeywordGroup;
use mail_sweep::pipeline::rules::{KeywordRule, UnreadAgeRule};
use mail_sweep::pipeline::sweep::{QueryPlan, Sweep};
use mail_sweep::pipeline::types::{OverviewRow, RunStatus};
use mail_sweep::store::{FsStorage, MemoryStorage, RunLog, StorageHierarchy};

const OVERVIEW: &str = "Gmail Cleanup Debug Overview";

fn run_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 15, 8, 30, 0).unwrap()
}

fn thread(subject: &str, unread: usize, labels: &[&str]) -> MemoryThread {
    let mut messages: Vec<MessageSummary> = (0..unread)
        .map(|_| MessageSummary {
            subject: Some(subject.into()),
            date: Utc.with_ymd_and_hms(2023, 6, 1, 12, 0, 0).unwrap(),
            unread: true,
        })
        .collect();
    if messages.is_empty() {
        messages.push(MessageSummary {
            subject: Some(subject.into()),
            date: Utc.with_ymd_and_hms(2023, 6, 1, 12, 0, 0).unwrap(),
            unread: false,
        });
    }
    MemoryThread {
        messages,
        labels: labels.iter().map(|l| l.to_string()).collect(),
        ..Default::default()
    }
}

fn sweep(mail: MemoryMailStore, storage: Arc<MemoryStorage>, config: SweepConfig) -> Sweep {
    Sweep::new(Arc::new(mail), storage, config).unwrap()
}

async fn overview_rows(storage: &MemoryStorage) -> Vec<OverviewRow> {
    let root = storage
        .get_or_create_folder("Gmail Auto Cleanup Logs", &storage.root())
        .await
        .unwrap();
    let debug = storage.get_or_create_folder("Debug", &root).await.unwrap();
    storage
        .find_overview(OVERVIEW, &debug)
        .await
        .unwrap()
        .expect("overview exists")
        .rows()
        .await
        .unwrap()
}

#[tokio::test]
async fn keyword_scenario_deletes_match_and_skips_the_rest() {
    let mut mail = MemoryMailStore::new();
    mail.insert_thread("digest", thread("Weekly Digest – March", 1, &["INBOX"]));
    mail.insert_thread("invoice", thread("Invoice #123", 1, &["INBOX"]));
    mail.bind_query("in:inbox", ["digest", "invoice"]);
    let storage = Arc::new(MemoryStorage::new());

    let plan = [QueryPlan::new(
        "KeywordMatch",
        "in:inbox",
        KeywordRule::new(vec![KeywordGroup::new(["weekly", "digest"])]),
    )];
    let report = sweep(mail, storage.clone(), SweepConfig::default())
        .run_plan(run_time(), &plan)
        .await
        .unwrap();

    assert_eq!(report.totals.deleted, 1);
    assert_eq!(report.totals.skipped, 1);

    let log = &storage.run_logs()[0];
    let rows = log.rows().await.unwrap();
    assert_eq!(rows[0].reason, "Keyword: weekly digest");
    assert_eq!(rows[0].action, "Move To Bin");
    assert_eq!(rows[1].reason, "");
    assert_eq!(rows[1].action, "Skipped");
}

#[tokio::test]
async fn unread_age_scenario() {
    let mut mail = MemoryMailStore::new();
    mail.insert_thread("read", thread("Old news", 0, &["INBOX"]));
    mail.insert_thread("unread", thread("Old news", 2, &["INBOX", "UNREAD"]));
    mail.insert_thread("mine", thread("Tax papers", 3, &["INBOX", "UNREAD", "Taxes"]));
    mail.bind_query("is:unread", ["read", "unread", "mine"]);
    let storage = Arc::new(MemoryStorage::new());

    let plan = [QueryPlan::new(
        "OldUnread",
        "is:unread",
        UnreadAgeRule::new("Unread and older than 6 months", true),
    )];
    sweep(mail, storage.clone(), SweepConfig::default())
        .run_plan(run_time(), &plan)
        .await
        .unwrap();

    let rows = storage.run_logs()[0].rows().await.unwrap();
    let reasons: Vec<&str> = rows.iter().map(|r| r.reason.as_str()).collect();
    assert_eq!(
        reasons,
        ["All read", "Unread and older than 6 months", "Has user labels"]
    );
    assert_eq!(rows[2].custom_labels, "Taxes");
    assert_eq!(rows[1].unread_count, 2);
}

#[tokio::test]
async fn completed_run_is_filed_by_year_and_month() {
    let storage = Arc::new(MemoryStorage::new());
    let report = sweep(MemoryMailStore::new(), storage.clone(), SweepConfig::default())
        .run_plan(run_time(), &[])
        .await
        .unwrap();

    let log = &storage.run_logs()[0];
    assert_eq!(log.name(), "Gmail Cleanup Debug Log 2024-03-15 08-30-00");
    assert_eq!(log.folder_id(), "/Gmail Auto Cleanup Logs/Debug/2024/March");
    assert_eq!(report.run.id, log.id());

    let overview = overview_rows(&storage).await;
    assert_eq!(overview.len(), 1);
    assert_eq!(overview[0].run_timestamp, "2024/03/15 08:30:00");
    assert_eq!(overview[0].log_file_id, log.id());
    assert_eq!(overview[0].status, RunStatus::Completed);
}

#[tokio::test]
async fn default_plan_runs_all_three_queries() {
    let mut mail = MemoryMailStore::new();
    mail.insert_thread("t", thread("Weekly digest", 1, &["INBOX", "UNREAD"]));
    mail.bind_query("in:inbox", ["t"]);
    let storage = Arc::new(MemoryStorage::new());
    let config = SweepConfig {
        keyword_groups: vec![KeywordGroup::new(["digest"])],
        ..SweepConfig::default()
    };
    let mail = Arc::new(mail);

    let report = Sweep::new(mail.clone(), storage.clone(), config)
        .unwrap()
        .run()
        .await
        .unwrap();

    let names: Vec<&str> = report.queries.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, ["OldUnread", "PromoUnread", "KeywordMatch"]);
    let queries: Vec<String> = mail.searches().into_iter().map(|s| s.query).collect();
    assert!(queries[0].starts_with("is:unread before:"));
    assert!(queries[1].starts_with("category:promotions is:unread before:"));
    assert_eq!(queries[2], "in:inbox");
    assert_eq!(report.totals.deleted, 1);
}

#[tokio::test]
async fn failure_mid_run_keeps_rows_and_marks_failed() {
    let mut mail = MemoryMailStore::new();
    for id in ["a", "b", "c"] {
        mail.insert_thread(id, thread("Stale", 1, &["INBOX", "UNREAD"]));
    }
    mail.bind_query("first", ["a", "b", "c"]);
    mail.fail_query("second");
    let storage = Arc::new(MemoryStorage::new());

    let plan = [
        QueryPlan::new("First", "first", UnreadAgeRule::new("old", true)),
        QueryPlan::new("Second", "second", UnreadAgeRule::new("old", true)),
        QueryPlan::new("Third", "third", KeywordRule::default()),
    ];
    let result = sweep(mail, storage.clone(), SweepConfig::default())
        .run_plan(run_time(), &plan)
        .await;

    assert!(matches!(
        result,
        Err(Error::Pipeline(PipelineError::Mail(_)))
    ));
    assert_eq!(storage.run_logs()[0].rows().await.unwrap().len(), 3);

    let overview = overview_rows(&storage).await;
    assert_eq!(overview.len(), 1);
    assert_eq!(overview[0].status, RunStatus::Failed);
}

#[tokio::test]
async fn failure_before_run_log_leaves_no_overview() {
    let storage = Arc::new(MemoryStorage::new().fail_folder("2024"));
    let result = sweep(MemoryMailStore::new(), storage.clone(), SweepConfig::default())
        .run_plan(run_time(), &[])
        .await;

    assert!(matches!(
        result,
        Err(Error::Storage(StorageError::FolderCreation { .. }))
    ));
    assert!(storage.run_logs().is_empty());
}

#[tokio::test]
async fn overview_accumulates_one_row_per_run() {
    let storage = Arc::new(MemoryStorage::new());
    let s = sweep(MemoryMailStore::new(), storage.clone(), SweepConfig::default());

    s.run_plan(run_time(), &[]).await.unwrap();
    s.run_plan(run_time(), &[]).await.unwrap();

    let overview = overview_rows(&storage).await;
    assert_eq!(overview.len(), 2);
    assert_ne!(overview[0].log_file_id, overview[1].log_file_id);
    assert!(overview.iter().all(|r| r.status == RunStatus::Completed));
}

#[tokio::test]
async fn trash_is_only_touched_when_enabled() {
    let build = || {
        let mut mail = MemoryMailStore::new();
        mail.insert_thread("t", thread("Stale", 1, &["INBOX", "UNREAD"]));
        mail.bind_query("q", ["t"]);
        Arc::new(mail)
    };
    let plan = [QueryPlan::new("Old", "q", UnreadAgeRule::new("old", true))];

    let dry = build();
    Sweep::new(dry.clone(), Arc::new(MemoryStorage::new()), SweepConfig::default())
        .unwrap()
        .run_plan(run_time(), &plan)
        .await
        .unwrap();
    assert!(dry.trashed().is_empty());

    let live = build();
    let config = SweepConfig {
        trash_enabled: true,
        ..SweepConfig::default()
    };
    Sweep::new(live.clone(), Arc::new(MemoryStorage::new()), config)
        .unwrap()
        .run_plan(run_time(), &plan)
        .await
        .unwrap();
    assert_eq!(live.trashed(), ["t"]);
}

#[tokio::test]
async fn filesystem_sweep_writes_libsql_sinks() {
    let dir = tempfile::tempdir().unwrap();
    let mut mail = MemoryMailStore::new();
    mail.insert_thread("broken", MemoryThread {
        broken: Some("backend hiccup".into()),
        ..Default::default()
    });
    mail.insert_thread("t", thread("Weekly digest", 1, &["INBOX"]));
    mail.bind_query("in:inbox", ["broken", "t"]);

    let storage: Arc<dyn StorageHierarchy> = Arc::new(FsStorage::new(dir.path()));
    let config = SweepConfig {
        data_dir: dir.path().to_path_buf(),
        ..SweepConfig::default()
    };
    let plan = [QueryPlan::new(
        "KeywordMatch",
        "in:inbox",
        KeywordRule::new(vec![KeywordGroup::new(["weekly"])]),
    )];

    let report = Sweep::new(Arc::new(mail), storage.clone(), config)
        .unwrap()
        .run_plan(run_time(), &plan)
        .await
        .unwrap();
    assert_eq!(report.totals.fallbacks, 1);

    let debug_dir = dir.path().join("Gmail Auto Cleanup Logs").join("Debug");
    let log_path = debug_dir
        .join("2024")
        .join("March")
        .join("Gmail Cleanup Debug Log 2024-03-15 08-30-00.db");
    assert!(log_path.exists());
    assert!(debug_dir.join(format!("{OVERVIEW}.db")).exists());

    let root = storage
        .get_or_create_folder("Gmail Auto Cleanup Logs", &storage.root())
        .await
        .unwrap();
    let debug = storage.get_or_create_folder("Debug", &root).await.unwrap();
    let overview = storage
        .find_overview(OVERVIEW, &debug)
        .await
        .unwrap()
        .unwrap();
    let rows = overview.rows().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].log_file_id, report.run.id);
    assert_eq!(rows[0].status, RunStatus::Completed);
    assert!(rows[0].log_link.starts_with("file://"));
}

#[tokio::test]
async fn runs_started_in_the_same_second_are_tracked_separately() {
    let dir = tempfile::tempdir().unwrap();
    let mut mail = MemoryMailStore::new();
    mail.fail_query("boom");
    let storage: Arc<dyn StorageHierarchy> = Arc::new(FsStorage::new(dir.path()));
    let sweep = Sweep::new(Arc::new(mail), storage.clone(), SweepConfig::default()).unwrap();

    let failing = [QueryPlan::new("Boom", "boom", KeywordRule::default())];
    assert!(sweep.run_plan(run_time(), &failing).await.is_err());
    let report = sweep.run_plan(run_time(), &[]).await.unwrap();

    let month_dir = dir
        .path()
        .join("Gmail Auto Cleanup Logs")
        .join("Debug")
        .join("2024")
        .join("March");
    assert!(month_dir.join("Gmail Cleanup Debug Log 2024-03-15 08-30-00.db").exists());
    assert!(month_dir.join("Gmail Cleanup Debug Log 2024-03-15 08-30-00 (2).db").exists());
    assert_eq!(
        report.run.log_name,
        "Gmail Cleanup Debug Log 2024-03-15 08-30-00 (2)"
    );

    let root = storage
        .get_or_create_folder("Gmail Auto Cleanup Logs", &storage.root())
        .await
        .unwrap();
    let debug = storage.get_or_create_folder("Debug", &root).await.unwrap();
    let rows = storage
        .find_overview(OVERVIEW, &debug)
        .await
        .unwrap()
        .unwrap()
        .rows()
        .await
        .unwrap();
    let statuses: Vec<RunStatus> = rows.iter().map(|r| r.status).collect();
    assert_eq!(statuses, [RunStatus::Failed, RunStatus::Completed]);
    assert_ne!(rows[0].log_file_id, rows[1].log_file_id);
    assert_eq!(rows[1].log_file_id, report.run.id);
}
