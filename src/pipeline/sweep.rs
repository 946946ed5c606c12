//! Sweep: one end-to-end run across every configured query.
//!
//! 1. Ensure `Root/Debug/<Year>/<Month>` exists and create the run log there
//! 2. Record the run as `Started` in `Root/Debug/<overview>`
//! 3. Run each query with its rule, accumulating rows in the one run log
//! 4. Mark the run `Completed`
//!
//! Any error after the run log exists marks the run `Failed` (best effort)
//! and is returned to the caller. Rows written before the failure stay.

use std::sync::Arc;

use chrono::{DateTime, Days, Months, Utc};
use tracing::{error, info, warn};

use crate::clock::ReportClock;
use crate::config::SweepConfig;
use crate::error::{ConfigError, Error};
use crate::mail::MailStore;
use crate::pipeline::keywords::KeywordGroup;
use crate::pipeline::labels::LabelClassifier;
use crate::pipeline::paginator::BatchPaginator;
use crate::pipeline::rules::{DecisionRule, KeywordRule, UnreadAgeRule};
use crate::pipeline::tracker::{RunHandle, RunTracker};
use crate::pipeline::types::BatchSummary;
use crate::store::traits::{RunLog, StorageHierarchy};

/// One query bound to the rule that decides its threads.
pub struct QueryPlan {
    pub rule_name: String,
    pub query: String,
    pub rule: Box<dyn DecisionRule>,
}

impl QueryPlan {
    pub fn new(
        rule_name: impl Into<String>,
        query: impl Into<String>,
        rule: impl DecisionRule + 'static,
    ) -> Self {
        Self {
            rule_name: rule_name.into(),
            query: query.into(),
            rule: Box::new(rule),
        }
    }
}

/// The standard three queries, dated relative to `now`.
///
/// Cutoffs are counted on the calendar of the clock's timezone. Going back
/// six months from a day the target month lacks lands on that month's last
/// day (Aug 31 gives Feb 29 or Feb 28).
pub fn default_plan(
    now: DateTime<Utc>,
    clock: &ReportClock,
    keyword_groups: Vec<KeywordGroup>,
) -> Vec<QueryPlan> {
    let local = now.with_timezone(&clock.timezone());
    let six_months_ago = local
        .checked_sub_months(Months::new(6))
        .map_or(now, |d| d.with_timezone(&Utc));
    let thirty_days_ago = local
        .checked_sub_days(Days::new(30))
        .map_or(now, |d| d.with_timezone(&Utc));

    vec![
        QueryPlan::new(
            "OldUnread",
            format!("is:unread before:{}", clock.search_date(six_months_ago)),
            UnreadAgeRule::new("Unread and older than 6 months", true),
        ),
        QueryPlan::new(
            "PromoUnread",
            format!(
                "category:promotions is:unread before:{}",
                clock.search_date(thirty_days_ago)
            ),
            UnreadAgeRule::new("Unread in Promotions and older than 30 days", true),
        ),
        QueryPlan::new("KeywordMatch", "in:inbox", KeywordRule::new(keyword_groups)),
    ]
}

/// Outcome of a completed sweep.
#[derive(Debug, Clone)]
pub struct SweepReport {
    pub run: RunHandle,
    /// Per-query counters, in plan order.
    pub queries: Vec<(String, BatchSummary)>,
    pub totals: BatchSummary,
}

/// Runs sweeps against injected mail and storage backends.
pub struct Sweep {
    mail: Arc<dyn MailStore>,
    storage: Arc<dyn StorageHierarchy>,
    config: SweepConfig,
    clock: ReportClock,
    labels: LabelClassifier,
}

impl Sweep {
    pub fn new(
        mail: Arc<dyn MailStore>,
        storage: Arc<dyn StorageHierarchy>,
        config: SweepConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let clock = config.clock()?;
        let labels = config.label_classifier()?;
        Ok(Self {
            mail,
            storage,
            config,
            clock,
            labels,
        })
    }

    /// Sweep now with the standard query plan.
    pub async fn run(&self) -> Result<SweepReport, Error> {
        let now = self.clock.now();
        let plan = default_plan(now, &self.clock, self.config.keyword_groups.clone());
        self.run_plan(now, &plan).await
    }

    /// Sweep with an explicit plan, stamped as starting at `now`.
    pub async fn run_plan(
        &self,
        now: DateTime<Utc>,
        plan: &[QueryPlan],
    ) -> Result<SweepReport, Error> {
        let storage = &self.storage;
        let root = storage
            .get_or_create_folder(&self.config.root_folder_name, &storage.root())
            .await?;
        let debug = storage
            .get_or_create_folder(&self.config.debug_folder_name, &root)
            .await?;
        let year = storage
            .get_or_create_folder(&self.clock.year_folder(now), &debug)
            .await?;
        let month = storage
            .get_or_create_folder(&self.clock.month_folder(now), &year)
            .await?;

        let log_name = format!(
            "{} {}",
            self.config.log_name_prefix,
            self.clock.file_stamp(now)
        );
        let log = storage.create_run_log(&log_name, &month).await?;

        let tracker = RunTracker::new(
            Arc::clone(storage),
            debug,
            self.config.overview_name.clone(),
            self.clock,
        );
        let handle = RunHandle {
            id: log.id().to_string(),
            log_name: log.name().to_string(),
            started_at: now,
        };

        match self.execute(&tracker, &log, now, plan).await {
            Ok(report) => {
                info!(
                    run_id = %report.run.id,
                    processed = report.totals.processed,
                    deleted = report.totals.deleted,
                    fallbacks = report.totals.fallbacks,
                    "Sweep completed"
                );
                Ok(report)
            }
            Err(e) => {
                error!(run_id = %handle.id, error = %e, "Sweep failed");
                if let Err(status_err) = tracker.fail(&handle).await {
                    warn!(run_id = %handle.id, error = %status_err, "Could not mark run failed");
                }
                Err(e)
            }
        }
    }

    /// Everything between creating the run log and the final status.
    async fn execute(
        &self,
        tracker: &RunTracker,
        log: &Arc<dyn RunLog>,
        now: DateTime<Utc>,
        plan: &[QueryPlan],
    ) -> Result<SweepReport, Error> {
        let run = tracker.begin(now, log.as_ref()).await?;

        let paginator = BatchPaginator::new(Arc::clone(&self.mail), Arc::clone(log), self.clock)
            .with_page_size(self.config.page_size)
            .with_trash(self.config.trash_enabled)
            .with_labels(self.labels.clone())
            .with_link_base(self.config.thread_link_base.clone());

        let mut queries = Vec::with_capacity(plan.len());
        let mut totals = BatchSummary::default();
        for step in plan {
            let summary = paginator
                .run(&step.query, &step.rule_name, step.rule.as_ref())
                .await?;
            totals.absorb(&summary);
            queries.push((step.rule_name.clone(), summary));
        }

        tracker.complete(&run).await?;
        Ok(SweepReport {
            run,
            queries,
            totals,
        })
    }
}
