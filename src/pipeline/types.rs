//! Shared types for the sweep pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Thread facts ────────────────────────────────────────────────────

/// Read-only snapshot of a thread, derived fresh on every sweep.
///
/// The representative message is the first unread message when the thread
/// has any, otherwise the first message overall. Its subject and date are
/// the ones that get logged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadFacts {
    pub thread_id: String,
    /// Subject of the representative message (empty when absent).
    pub subject: String,
    /// Date of the representative message.
    pub date: DateTime<Utc>,
    /// All label names on the thread.
    pub labels: Vec<String>,
    /// Labels that are not reserved system/category labels.
    pub custom_labels: Vec<String>,
    /// First category label (e.g. `CATEGORY_PROMOTIONS`), if any.
    pub category: Option<String>,
    pub unread_count: usize,
}

// ── Decision ────────────────────────────────────────────────────────

/// Outcome of applying one rule to one thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Delete { reason: String },
    Skip { reason: Option<String> },
}

impl Decision {
    pub fn delete(reason: impl Into<String>) -> Self {
        Self::Delete {
            reason: reason.into(),
        }
    }

    pub fn skip(reason: impl Into<String>) -> Self {
        Self::Skip {
            reason: Some(reason.into()),
        }
    }

    /// Skip without a stated reason (keyword rule miss).
    pub fn pass() -> Self {
        Self::Skip { reason: None }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, Self::Delete { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Delete { reason } => Some(reason),
            Self::Skip { reason } => reason.as_deref(),
        }
    }

    /// Action text written to the log.
    pub fn action(&self) -> Action {
        match self {
            Self::Delete { .. } => Action::MoveToBin,
            Self::Skip { .. } => Action::Skipped,
        }
    }
}

/// What the log says happened to a thread.
///
/// Recorded independently of whether trashing is actually enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    MoveToBin,
    Skipped,
}

impl Action {
    pub fn label(&self) -> &'static str {
        match self {
            Self::MoveToBin => "Move To Bin",
            Self::Skipped => "Skipped",
        }
    }
}

// ── Log rows ────────────────────────────────────────────────────────

/// Header of the run log table.
pub const RUN_LOG_HEADER: [&str; 11] = [
    "Timestamp",
    "Rule Name",
    "Subject",
    "Email Date",
    "Reason",
    "Unread Messages Count",
    "Custom Labels",
    "Labels",
    "Gmail Category",
    "Action Taken",
    "ThreadID",
];

/// Header of the fallback log table.
pub const FALLBACK_LOG_HEADER: [&str; 5] = ["Timestamp", "Issue", "Subject", "ThreadID", "Details"];

/// Issue tag for per-thread failures.
pub const THREAD_EXCEPTION: &str = "ThreadException";

/// One decision, rendered for the run log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRow {
    pub timestamp: String,
    pub rule_name: String,
    pub subject: String,
    pub email_date: String,
    pub reason: String,
    pub unread_count: usize,
    pub custom_labels: String,
    pub labels: String,
    pub category: String,
    pub action: String,
    /// Thread id cell, rendered as a deep link.
    pub thread_link: String,
}

impl LogRow {
    /// Cells in header order.
    pub fn cells(&self) -> Vec<String> {
        vec![
            self.timestamp.clone(),
            self.rule_name.clone(),
            self.subject.clone(),
            self.email_date.clone(),
            self.reason.clone(),
            self.unread_count.to_string(),
            self.custom_labels.clone(),
            self.labels.clone(),
            self.category.clone(),
            self.action.clone(),
            self.thread_link.clone(),
        ]
    }
}

/// A thread that could not be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackRow {
    pub timestamp: String,
    pub issue: String,
    pub subject: String,
    pub thread_id: String,
    pub details: String,
}

impl FallbackRow {
    pub fn cells(&self) -> Vec<String> {
        vec![
            self.timestamp.clone(),
            self.issue.clone(),
            self.subject.clone(),
            self.thread_id.clone(),
            self.details.clone(),
        ]
    }
}

/// Render a thread id as a spreadsheet hyperlink to the thread.
pub fn thread_link(link_base: &str, thread_id: &str) -> String {
    format!("=HYPERLINK(\"{link_base}{thread_id}\", \"{thread_id}\")")
}

// ── Run lifecycle ───────────────────────────────────────────────────

/// Lifecycle status of a run, as shown in the overview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Started,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "Started",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Started" => Some(Self::Started),
            "Completed" => Some(Self::Completed),
            "Failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Header of the overview table.
pub const OVERVIEW_HEADER: [&str; 5] = [
    "Run Timestamp",
    "Log File Name",
    "Log File ID",
    "Link to Log",
    "Status",
];

/// One run in the overview, keyed by `log_file_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverviewRow {
    pub run_timestamp: String,
    pub log_file_name: String,
    pub log_file_id: String,
    pub log_link: String,
    pub status: RunStatus,
}

// ── Batch summary ───────────────────────────────────────────────────

/// Counters for one paginated query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub pages: usize,
    pub processed: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub fallbacks: usize,
}

impl BatchSummary {
    pub fn absorb(&mut self, other: &BatchSummary) {
        self.pages += other.pages;
        self.processed += other.processed;
        self.deleted += other.deleted;
        self.skipped += other.skipped;
        self.fallbacks += other.fallbacks;
    }
}
