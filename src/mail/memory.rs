//! In-memory mail store.
//!
//! Threads are registered up front and attached to queries in the order the
//! search should return them. Every search and trash call is recorded so
//! callers can assert on paging and deletion behaviour.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{MailStore, MessageSummary, ThreadHandle};
use crate::error::MailError;

/// A fixture thread.
#[derive(Debug, Clone, Default)]
pub struct MemoryThread {
    pub messages: Vec<MessageSummary>,
    pub labels: Vec<String>,
    /// Reading messages fails with this reason.
    pub broken: Option<String>,
    /// Trashing fails with this reason.
    pub trash_error: Option<String>,
}

/// One recorded `search` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCall {
    pub query: String,
    pub offset: usize,
    pub limit: usize,
}

/// In-memory `MailStore`.
#[derive(Debug, Default)]
pub struct MemoryMailStore {
    threads: HashMap<String, MemoryThread>,
    queries: HashMap<String, Vec<String>>,
    /// Truncate the page at (query, offset) to this many threads.
    page_caps: HashMap<(String, usize), usize>,
    /// Fail searches for this query.
    failing_queries: Vec<String>,
    searches: Mutex<Vec<SearchCall>>,
    trashed: Mutex<Vec<String>>,
}

impl MemoryMailStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a thread under `id`.
    pub fn insert_thread(&mut self, id: impl Into<String>, thread: MemoryThread) -> &mut Self {
        self.threads.insert(id.into(), thread);
        self
    }

    /// Make `query` return `ids`, in order.
    pub fn bind_query<I, S>(&mut self, query: impl Into<String>, ids: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.queries
            .insert(query.into(), ids.into_iter().map(Into::into).collect());
        self
    }

    /// Return a short page at `offset` even though more threads exist.
    pub fn cap_page(&mut self, query: impl Into<String>, offset: usize, len: usize) -> &mut Self {
        self.page_caps.insert((query.into(), offset), len);
        self
    }

    /// Make every search for `query` fail.
    pub fn fail_query(&mut self, query: impl Into<String>) -> &mut Self {
        self.failing_queries.push(query.into());
        self
    }

    /// Recorded search calls, in call order.
    pub fn searches(&self) -> Vec<SearchCall> {
        self.searches
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Ids of threads moved to the trash, in call order.
    pub fn trashed(&self) -> Vec<String> {
        self.trashed
            .lock()
            .map(|t| t.clone())
            .unwrap_or_default()
    }

    fn thread(&self, handle: &ThreadHandle) -> Result<&MemoryThread, MailError> {
        self.threads
            .get(&handle.id)
            .ok_or_else(|| MailError::ThreadNotFound {
                id: handle.id.clone(),
            })
    }
}

#[async_trait]
impl MailStore for MemoryMailStore {
    async fn search(
        &self,
        query: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ThreadHandle>, MailError> {
        if let Ok(mut searches) = self.searches.lock() {
            searches.push(SearchCall {
                query: query.to_string(),
                offset,
                limit,
            });
        }

        if self.failing_queries.iter().any(|q| q == query) {
            return Err(MailError::RequestFailed {
                operation: "search".into(),
                reason: format!("search for {query:?} unavailable"),
            });
        }

        let ids = self.queries.get(query).map(Vec::as_slice).unwrap_or(&[]);
        let mut len = limit;
        if let Some(cap) = self.page_caps.get(&(query.to_string(), offset)) {
            len = len.min(*cap);
        }
        Ok(ids
            .iter()
            .skip(offset)
            .take(len)
            .map(|id| ThreadHandle::new(id.clone()))
            .collect())
    }

    async fn messages(&self, thread: &ThreadHandle) -> Result<Vec<MessageSummary>, MailError> {
        let fixture = self.thread(thread)?;
        if let Some(reason) = &fixture.broken {
            return Err(MailError::RequestFailed {
                operation: "messages".into(),
                reason: reason.clone(),
            });
        }
        Ok(fixture.messages.clone())
    }

    async fn labels(&self, thread: &ThreadHandle) -> Result<Vec<String>, MailError> {
        Ok(self.thread(thread)?.labels.clone())
    }

    async fn move_to_trash(&self, thread: &ThreadHandle) -> Result<(), MailError> {
        let fixture = self.thread(thread)?;
        if let Some(reason) = &fixture.trash_error {
            return Err(MailError::RequestFailed {
                operation: "trash".into(),
                reason: reason.clone(),
            });
        }
        if let Ok(mut trashed) = self.trashed.lock() {
            trashed.push(thread.id.clone());
        }
        Ok(())
    }
}
