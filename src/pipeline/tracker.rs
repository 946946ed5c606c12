//! Run tracker: lifecycle of a sweep in the cross-run overview.
//!
//! `begin` records the run as `Started` (once per log file id, however often
//! it is called); `complete` and `fail` flip that row in place. Status
//! updates against a missing overview or a missing row are no-ops, never
//! errors: a lost overview row must not take the run down with it.
//!
//! ```text
//! Started ──▶ Completed
//!    └──────▶ Failed
//! ```
//!
//! A process killed mid-run leaves its row at `Started`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::clock::ReportClock;
use crate::error::StorageError;
use crate::pipeline::types::{OverviewRow, RunStatus};
use crate::store::traits::{Folder, OverviewSink, RunLog, StorageHierarchy};

/// Identity of a run, as tracked in the overview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunHandle {
    /// The run log's file id; the overview key.
    pub id: String,
    pub log_name: String,
    pub started_at: DateTime<Utc>,
}

/// Records run lifecycle in the overview kept in `folder`.
pub struct RunTracker {
    storage: Arc<dyn StorageHierarchy>,
    folder: Folder,
    overview_name: String,
    clock: ReportClock,
}

impl RunTracker {
    pub fn new(
        storage: Arc<dyn StorageHierarchy>,
        folder: Folder,
        overview_name: impl Into<String>,
        clock: ReportClock,
    ) -> Self {
        Self {
            storage,
            folder,
            overview_name: overview_name.into(),
            clock,
        }
    }

    /// Open the overview, creating it with its header when missing.
    async fn overview(&self) -> Result<Arc<dyn OverviewSink>, StorageError> {
        if let Some(existing) = self
            .storage
            .find_overview(&self.overview_name, &self.folder)
            .await?
        {
            return Ok(existing);
        }
        info!(name = %self.overview_name, "Creating run overview");
        self.storage
            .create_overview(&self.overview_name, &self.folder)
            .await
    }

    /// Record `log` as a started run.
    ///
    /// Calling this again for the same log does not add a second row.
    pub async fn begin(
        &self,
        started_at: DateTime<Utc>,
        log: &dyn RunLog,
    ) -> Result<RunHandle, StorageError> {
        let handle = RunHandle {
            id: log.id().to_string(),
            log_name: log.name().to_string(),
            started_at,
        };

        let overview = self.overview().await?;
        if overview.contains(&handle.id).await? {
            debug!(run_id = %handle.id, "Run already in overview");
            return Ok(handle);
        }

        overview
            .append(&OverviewRow {
                run_timestamp: self.clock.row_stamp(started_at),
                log_file_name: handle.log_name.clone(),
                log_file_id: handle.id.clone(),
                log_link: log.link(),
                status: RunStatus::Started,
            })
            .await?;
        info!(run_id = %handle.id, "Overview updated with: Started");
        Ok(handle)
    }

    pub async fn complete(&self, handle: &RunHandle) -> Result<(), StorageError> {
        self.set_status(handle, RunStatus::Completed).await
    }

    pub async fn fail(&self, handle: &RunHandle) -> Result<(), StorageError> {
        self.set_status(handle, RunStatus::Failed).await
    }

    async fn set_status(&self, handle: &RunHandle, status: RunStatus) -> Result<(), StorageError> {
        let Some(overview) = self
            .storage
            .find_overview(&self.overview_name, &self.folder)
            .await?
        else {
            warn!(run_id = %handle.id, %status, "No overview to update");
            return Ok(());
        };

        if overview.set_status(&handle.id, status).await? {
            info!(run_id = %handle.id, %status, "Run status updated");
        } else {
            warn!(run_id = %handle.id, %status, "Run missing from overview");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::OVERVIEW_HEADER;
    use crate::store::memory::{MemoryOverview, MemoryRunLog, MemoryStorage};

    const OVERVIEW: &str = "Gmail Cleanup Debug Overview";

    fn setup() -> (Arc<MemoryStorage>, RunTracker) {
        let storage = Arc::new(MemoryStorage::new());
        let tracker = RunTracker::new(
            storage.clone(),
            storage.root(),
            OVERVIEW,
            ReportClock::default(),
        );
        (storage, tracker)
    }

    async fn overview_rows(storage: &MemoryStorage) -> Vec<OverviewRow> {
        storage
            .find_overview(OVERVIEW, &storage.root())
            .await
            .unwrap()
            .unwrap()
            .rows()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn begin_creates_overview_and_started_row() {
        let (storage, tracker) = setup();
        let log = MemoryRunLog::new("Gmail Cleanup Debug Log x", &storage.root());

        let handle = tracker.begin(Utc::now(), &log).await.unwrap();
        assert_eq!(handle.id, log.id());

        let rows = overview_rows(&storage).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, RunStatus::Started);
        assert_eq!(rows[0].log_file_name, "Gmail Cleanup Debug Log x");
        assert_eq!(rows[0].log_link, log.link());
        assert_eq!(MemoryOverview::new(OVERVIEW).header(), OVERVIEW_HEADER);
    }

    #[tokio::test]
    async fn begin_is_idempotent_per_log_file() {
        let (storage, tracker) = setup();
        let log = MemoryRunLog::new("log", &storage.root());

        tracker.begin(Utc::now(), &log).await.unwrap();
        tracker.begin(Utc::now(), &log).await.unwrap();

        assert_eq!(overview_rows(&storage).await.len(), 1);
    }

    #[tokio::test]
    async fn overview_accumulates_across_runs() {
        let (storage, tracker) = setup();
        let first = MemoryRunLog::new("first", &storage.root());
        let second = MemoryRunLog::new("second", &storage.root());

        let h1 = tracker.begin(Utc::now(), &first).await.unwrap();
        tracker.complete(&h1).await.unwrap();
        tracker.begin(Utc::now(), &second).await.unwrap();

        let rows = overview_rows(&storage).await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].status, RunStatus::Completed);
        assert_eq!(rows[1].status, RunStatus::Started);
    }

    #[tokio::test]
    async fn fail_marks_row_failed() {
        let (storage, tracker) = setup();
        let log = MemoryRunLog::new("log", &storage.root());
        let handle = tracker.begin(Utc::now(), &log).await.unwrap();

        tracker.fail(&handle).await.unwrap();
        assert_eq!(overview_rows(&storage).await[0].status, RunStatus::Failed);
    }

    #[tokio::test]
    async fn status_update_without_overview_is_noop() {
        let (_storage, tracker) = setup();
        let handle = RunHandle {
            id: "nope".into(),
            log_name: "log".into(),
            started_at: Utc::now(),
        };
        tracker.complete(&handle).await.unwrap();
        tracker.fail(&handle).await.unwrap();
    }

    #[tokio::test]
    async fn status_update_for_unknown_run_is_noop() {
        let (storage, tracker) = setup();
        let log = MemoryRunLog::new("log", &storage.root());
        tracker.begin(Utc::now(), &log).await.unwrap();

        let stranger = RunHandle {
            id: "other".into(),
            log_name: "other".into(),
            started_at: Utc::now(),
        };
        tracker.complete(&stranger).await.unwrap();
        assert_eq!(overview_rows(&storage).await[0].status, RunStatus::Started);
    }
}
