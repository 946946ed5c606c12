//! Storage traits: the folder hierarchy, per-run logs, and the cross-run overview.
//!
//! The sweep never reaches for a global; every sink is handed to it through
//! these traits so a run can target the filesystem or memory alike.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::pipeline::types::{FallbackRow, LogRow, OverviewRow, RunStatus};

/// A folder in the storage hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Folder {
    /// Backend identity (a path for the filesystem backend).
    pub id: String,
    pub name: String,
}

/// Folders plus the files the sweep keeps in them.
#[async_trait]
pub trait StorageHierarchy: Send + Sync {
    /// Top of the hierarchy.
    fn root(&self) -> Folder;

    /// Find `name` under `parent`, creating it when missing.
    async fn get_or_create_folder(&self, name: &str, parent: &Folder)
    -> Result<Folder, StorageError>;

    /// Create a fresh two-table run log in `folder`.
    async fn create_run_log(
        &self,
        name: &str,
        folder: &Folder,
    ) -> Result<Arc<dyn RunLog>, StorageError>;

    /// Look up an existing overview by name.
    async fn find_overview(
        &self,
        name: &str,
        folder: &Folder,
    ) -> Result<Option<Arc<dyn OverviewSink>>, StorageError>;

    /// Create an overview with the fixed header.
    async fn create_overview(
        &self,
        name: &str,
        folder: &Folder,
    ) -> Result<Arc<dyn OverviewSink>, StorageError>;
}

/// Append-only per-run log: a decision table and a fallback table.
#[async_trait]
pub trait RunLog: Send + Sync {
    /// Stable identity used as the overview key.
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    /// Link a human can follow to open the log.
    fn link(&self) -> String;

    async fn append_row(&self, row: &LogRow) -> Result<(), StorageError>;

    async fn append_fallback(&self, row: &FallbackRow) -> Result<(), StorageError>;

    /// Decision rows in append order.
    async fn rows(&self) -> Result<Vec<LogRow>, StorageError>;

    /// Fallback rows in append order.
    async fn fallback_rows(&self) -> Result<Vec<FallbackRow>, StorageError>;
}

/// Cross-run ledger keyed by log file id.
#[async_trait]
pub trait OverviewSink: Send + Sync {
    async fn contains(&self, log_file_id: &str) -> Result<bool, StorageError>;

    async fn append(&self, row: &OverviewRow) -> Result<(), StorageError>;

    /// Update the status of the row for `log_file_id` in place.
    ///
    /// Returns `false` when no such row exists.
    async fn set_status(&self, log_file_id: &str, status: RunStatus)
    -> Result<bool, StorageError>;

    /// Rows in append order.
    async fn rows(&self) -> Result<Vec<OverviewRow>, StorageError>;
}
