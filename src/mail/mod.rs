//! Mail store: the inbox being swept.
//!
//! The sweep only ever searches, reads thread metadata, and (when enabled)
//! moves threads to the trash. Backends:
//! - `GmailStore`: Gmail REST API.
//! - `MemoryMailStore`: in-process fixture store for tests and dry runs.

pub mod gmail;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MailError;

pub use gmail::GmailStore;
pub use memory::MemoryMailStore;

/// Opaque reference to a thread returned by a search.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadHandle {
    pub id: String,
}

impl ThreadHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// The parts of a message the rules look at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSummary {
    pub subject: Option<String>,
    pub date: DateTime<Utc>,
    pub unread: bool,
}

/// Backend-agnostic mail store.
#[async_trait]
pub trait MailStore: Send + Sync {
    /// Threads matching `query`, skipping `offset` and returning at most `limit`.
    async fn search(
        &self,
        query: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ThreadHandle>, MailError>;

    /// Messages of a thread in conversation order.
    async fn messages(&self, thread: &ThreadHandle) -> Result<Vec<MessageSummary>, MailError>;

    /// Label names on a thread.
    async fn labels(&self, thread: &ThreadHandle) -> Result<Vec<String>, MailError>;

    /// Move a thread to the trash.
    async fn move_to_trash(&self, thread: &ThreadHandle) -> Result<(), MailError>;
}
