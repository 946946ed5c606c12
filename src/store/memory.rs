//! In-memory storage backend for tests and record-only dry runs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StorageError;
use crate::pipeline::types::{
    FALLBACK_LOG_HEADER, FallbackRow, LogRow, OVERVIEW_HEADER, OverviewRow, RUN_LOG_HEADER,
    RunStatus,
};
use crate::store::traits::{Folder, OverviewSink, RunLog, StorageHierarchy};

fn poisoned(name: &str) -> StorageError {
    StorageError::SinkUnavailable {
        name: name.to_string(),
        reason: "lock poisoned".into(),
    }
}

fn header(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|c| c.to_string()).collect()
}

// ── Hierarchy ───────────────────────────────────────────────────────

/// In-memory folder tree.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    /// (parent id, name) → folder.
    folders: Mutex<HashMap<(String, String), Folder>>,
    /// (folder id, name) → overview.
    overviews: Mutex<HashMap<(String, String), Arc<MemoryOverview>>>,
    run_logs: Mutex<Vec<Arc<MemoryRunLog>>>,
    /// Folder names whose creation fails.
    failing_folders: Vec<String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make creating a folder called `name` fail.
    pub fn fail_folder(mut self, name: impl Into<String>) -> Self {
        self.failing_folders.push(name.into());
        self
    }

    /// Every run log created so far, in creation order.
    pub fn run_logs(&self) -> Vec<Arc<MemoryRunLog>> {
        self.run_logs
            .lock()
            .map(|l| l.clone())
            .unwrap_or_default()
    }

    /// Ids of every folder created so far.
    pub fn folder_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .folders
            .lock()
            .map(|f| f.values().map(|f| f.id.clone()).collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }
}

#[async_trait]
impl StorageHierarchy for MemoryStorage {
    fn root(&self) -> Folder {
        Folder {
            id: String::new(),
            name: String::new(),
        }
    }

    async fn get_or_create_folder(
        &self,
        name: &str,
        parent: &Folder,
    ) -> Result<Folder, StorageError> {
        if self.failing_folders.iter().any(|f| f == name) {
            return Err(StorageError::FolderCreation {
                name: name.to_string(),
                reason: "folder creation disabled".into(),
            });
        }
        let mut folders = self.folders.lock().map_err(|_| poisoned(name))?;
        let folder = folders
            .entry((parent.id.clone(), name.to_string()))
            .or_insert_with(|| Folder {
                id: format!("{}/{name}", parent.id),
                name: name.to_string(),
            });
        Ok(folder.clone())
    }

    async fn create_run_log(
        &self,
        name: &str,
        folder: &Folder,
    ) -> Result<Arc<dyn RunLog>, StorageError> {
        let log = Arc::new(MemoryRunLog::new(name, folder));
        self.run_logs
            .lock()
            .map_err(|_| poisoned(name))?
            .push(Arc::clone(&log));
        Ok(log)
    }

    async fn find_overview(
        &self,
        name: &str,
        folder: &Folder,
    ) -> Result<Option<Arc<dyn OverviewSink>>, StorageError> {
        let overviews = self.overviews.lock().map_err(|_| poisoned(name))?;
        Ok(overviews
            .get(&(folder.id.clone(), name.to_string()))
            .map(|o| Arc::clone(o) as Arc<dyn OverviewSink>))
    }

    async fn create_overview(
        &self,
        name: &str,
        folder: &Folder,
    ) -> Result<Arc<dyn OverviewSink>, StorageError> {
        let overview = Arc::new(MemoryOverview::new(name));
        self.overviews
            .lock()
            .map_err(|_| poisoned(name))?
            .insert((folder.id.clone(), name.to_string()), Arc::clone(&overview));
        Ok(overview)
    }
}

// ── Run log ─────────────────────────────────────────────────────────

/// In-memory run log.
#[derive(Debug)]
pub struct MemoryRunLog {
    id: String,
    name: String,
    folder_id: String,
    rows: Mutex<Vec<LogRow>>,
    fallback: Mutex<Vec<FallbackRow>>,
}

impl MemoryRunLog {
    pub fn new(name: &str, folder: &Folder) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            folder_id: folder.id.clone(),
            rows: Mutex::new(Vec::new()),
            fallback: Mutex::new(Vec::new()),
        }
    }

    pub fn folder_id(&self) -> &str {
        &self.folder_id
    }

    pub fn header(&self) -> Vec<String> {
        header(&RUN_LOG_HEADER)
    }

    pub fn fallback_header(&self) -> Vec<String> {
        header(&FALLBACK_LOG_HEADER)
    }
}

#[async_trait]
impl RunLog for MemoryRunLog {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn link(&self) -> String {
        format!("memory://{}/{}", self.folder_id, self.id)
    }

    async fn append_row(&self, row: &LogRow) -> Result<(), StorageError> {
        self.rows
            .lock()
            .map_err(|_| poisoned(&self.name))?
            .push(row.clone());
        Ok(())
    }

    async fn append_fallback(&self, row: &FallbackRow) -> Result<(), StorageError> {
        self.fallback
            .lock()
            .map_err(|_| poisoned(&self.name))?
            .push(row.clone());
        Ok(())
    }

    async fn rows(&self) -> Result<Vec<LogRow>, StorageError> {
        Ok(self.rows.lock().map_err(|_| poisoned(&self.name))?.clone())
    }

    async fn fallback_rows(&self) -> Result<Vec<FallbackRow>, StorageError> {
        Ok(self
            .fallback
            .lock()
            .map_err(|_| poisoned(&self.name))?
            .clone())
    }
}

// ── Overview ────────────────────────────────────────────────────────

/// In-memory overview.
#[derive(Debug)]
pub struct MemoryOverview {
    name: String,
    rows: Mutex<Vec<OverviewRow>>,
}

impl MemoryOverview {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            rows: Mutex::new(Vec::new()),
        }
    }

    pub fn header(&self) -> Vec<String> {
        header(&OVERVIEW_HEADER)
    }
}

#[async_trait]
impl OverviewSink for MemoryOverview {
    async fn contains(&self, log_file_id: &str) -> Result<bool, StorageError> {
        let rows = self.rows.lock().map_err(|_| poisoned(&self.name))?;
        Ok(rows.iter().any(|r| r.log_file_id == log_file_id))
    }

    async fn append(&self, row: &OverviewRow) -> Result<(), StorageError> {
        self.rows
            .lock()
            .map_err(|_| poisoned(&self.name))?
            .push(row.clone());
        Ok(())
    }

    async fn set_status(
        &self,
        log_file_id: &str,
        status: RunStatus,
    ) -> Result<bool, StorageError> {
        let mut rows = self.rows.lock().map_err(|_| poisoned(&self.name))?;
        match rows.iter_mut().find(|r| r.log_file_id == log_file_id) {
            Some(row) => {
                row.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn rows(&self) -> Result<Vec<OverviewRow>, StorageError> {
        Ok(self.rows.lock().map_err(|_| poisoned(&self.name))?.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overview_row(id: &str) -> OverviewRow {
        OverviewRow {
            run_timestamp: "2024/03/01 10:00:00".into(),
            log_file_name: "log".into(),
            log_file_id: id.into(),
            log_link: "memory://log".into(),
            status: RunStatus::Started,
        }
    }

    #[tokio::test]
    async fn folders_are_reused() {
        let storage = MemoryStorage::new();
        let root = storage.root();
        let a = storage.get_or_create_folder("Debug", &root).await.unwrap();
        let b = storage.get_or_create_folder("Debug", &root).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.id, "/Debug");
        assert_eq!(storage.folder_ids().len(), 1);
    }

    #[tokio::test]
    async fn failing_folder_is_storage_error() {
        let storage = MemoryStorage::new().fail_folder("Debug");
        let err = storage
            .get_or_create_folder("Debug", &storage.root())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::FolderCreation { .. }));
    }

    #[tokio::test]
    async fn overview_lookup_is_scoped_to_folder() {
        let storage = MemoryStorage::new();
        let root = storage.root();
        let debug = storage.get_or_create_folder("Debug", &root).await.unwrap();
        storage.create_overview("Overview", &debug).await.unwrap();

        assert!(storage.find_overview("Overview", &debug).await.unwrap().is_some());
        assert!(storage.find_overview("Overview", &root).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn overview_status_updates_in_place() {
        let overview = MemoryOverview::new("Overview");
        overview.append(&overview_row("a")).await.unwrap();
        overview.append(&overview_row("b")).await.unwrap();

        assert!(overview.set_status("b", RunStatus::Completed).await.unwrap());
        assert!(!overview.set_status("zzz", RunStatus::Failed).await.unwrap());

        let rows = overview.rows().await.unwrap();
        assert_eq!(rows[0].status, RunStatus::Started);
        assert_eq!(rows[1].status, RunStatus::Completed);
        assert_eq!(overview.header()[2], "Log File ID");
    }

    #[tokio::test]
    async fn run_log_keeps_append_order() {
        let storage = MemoryStorage::new();
        let log = storage.create_run_log("log", &storage.root()).await.unwrap();
        for n in 0..3 {
            log.append_fallback(&FallbackRow {
                timestamp: "t".into(),
                issue: "ThreadException".into(),
                subject: String::new(),
                thread_id: format!("t{n}"),
                details: "boom".into(),
            })
            .await
            .unwrap();
        }
        let ids: Vec<String> = log
            .fallback_rows()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.thread_id)
            .collect();
        assert_eq!(ids, ["t0", "t1", "t2"]);
        assert_eq!(storage.run_logs()[0].header().len(), 11);
    }
}
