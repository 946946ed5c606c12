//! Gmail REST mail store.
//!
//! Gmail pages with opaque tokens rather than offsets, so the store remembers
//! the token that starts each thread index it has seen and walks forward
//! from the nearest known one when asked for a new offset.
//!
//! A `search` always returns `limit` threads unless the query is exhausted.
//! Larger requests than Gmail serves in one call, and short pages Gmail hands
//! back mid-listing, are filled from the following pages.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{MailStore, MessageSummary, ThreadHandle};
use crate::error::MailError;

/// Gmail API root for the authenticated user.
const DEFAULT_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

/// Largest page Gmail accepts for `threads.list`.
const MAX_PAGE_SIZE: usize = 500;

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreadList {
    #[serde(default)]
    threads: Vec<ThreadRef>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ThreadRef {
    id: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ThreadResource {
    id: String,
    #[serde(default)]
    messages: Vec<MessageResource>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageResource {
    #[serde(default)]
    label_ids: Vec<String>,
    internal_date: Option<String>,
    payload: Option<Payload>,
}

#[derive(Debug, Clone, Deserialize)]
struct Payload {
    #[serde(default)]
    headers: Vec<Header>,
}

#[derive(Debug, Clone, Deserialize)]
struct Header {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct LabelList {
    #[serde(default)]
    labels: Vec<LabelResource>,
}

#[derive(Debug, Deserialize)]
struct LabelResource {
    id: String,
    name: String,
}

impl MessageResource {
    fn subject(&self) -> Option<String> {
        self.payload.as_ref().and_then(|p| {
            p.headers
                .iter()
                .find(|h| h.name.eq_ignore_ascii_case("subject"))
                .map(|h| h.value.clone())
        })
    }

    fn date(&self) -> Result<DateTime<Utc>, MailError> {
        let raw = self.internal_date.as_deref().unwrap_or("0");
        raw.parse::<i64>()
            .ok()
            .and_then(DateTime::from_timestamp_millis)
            .ok_or_else(|| MailError::InvalidResponse {
                operation: "threads.get".into(),
                reason: format!("bad internalDate {raw:?}"),
            })
    }

    fn summary(&self) -> Result<MessageSummary, MailError> {
        Ok(MessageSummary {
            subject: self.subject(),
            date: self.date()?,
            unread: self.label_ids.iter().any(|l| l == "UNREAD"),
        })
    }
}

// ── Store ───────────────────────────────────────────────────────────

/// Gmail-backed `MailStore`.
pub struct GmailStore {
    client: reqwest::Client,
    token: SecretString,
    api_base: String,
    /// Per `(query, page size)`: thread index → page token starting there.
    page_tokens: Mutex<HashMap<(String, usize), BTreeMap<usize, String>>>,
    /// Label id → display name, loaded on first use.
    label_names: tokio::sync::OnceCell<HashMap<String, String>>,
    /// Most recently fetched thread; `messages` and `labels` share one fetch.
    last_thread: Mutex<Option<ThreadResource>>,
}

impl GmailStore {
    pub fn new(token: SecretString) -> Self {
        Self::with_api_base(token, DEFAULT_API_BASE)
    }

    /// Point the store at a different API root (proxies, test servers).
    pub fn with_api_base(token: SecretString, api_base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            page_tokens: Mutex::new(HashMap::new()),
            label_names: tokio::sync::OnceCell::new(),
            last_thread: Mutex::new(None),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.api_base)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, MailError> {
        let resp = self
            .client
            .get(self.url(path))
            .bearer_auth(self.token.expose_secret())
            .query(query)
            .send()
            .await
            .map_err(|e| MailError::RequestFailed {
                operation: operation.into(),
                reason: e.to_string(),
            })?;
        let resp = check_status(operation, resp)?;
        resp.json::<T>()
            .await
            .map_err(|e| MailError::InvalidResponse {
                operation: operation.into(),
                reason: e.to_string(),
            })
    }

    /// One `threads.list` call.
    async fn list_page(
        &self,
        query: &str,
        limit: usize,
        page_token: Option<&str>,
    ) -> Result<ThreadList, MailError> {
        let mut params = vec![
            ("q", query.to_string()),
            ("maxResults", limit.to_string()),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }
        self.get_json("threads.list", "threads", &params).await
    }

    /// The known page start closest to `offset` without passing it.
    fn nearest_token(&self, query: &str, page_size: usize, offset: usize) -> Option<(usize, String)> {
        let tokens = self.page_tokens.lock().ok()?;
        tokens
            .get(&(query.to_string(), page_size))?
            .range(..=offset)
            .next_back()
            .map(|(start, token)| (*start, token.clone()))
    }

    fn remember_token(&self, query: &str, page_size: usize, start: usize, token: String) {
        if let Ok(mut tokens) = self.page_tokens.lock() {
            tokens
                .entry((query.to_string(), page_size))
                .or_default()
                .insert(start, token);
        }
    }

    async fn thread(&self, handle: &ThreadHandle) -> Result<ThreadResource, MailError> {
        let cached = self
            .last_thread
            .lock()
            .ok()
            .and_then(|last| last.as_ref().filter(|t| t.id == handle.id).cloned());
        if let Some(thread) = cached {
            return Ok(thread);
        }

        let thread: ThreadResource = self
            .get_json(
                "threads.get",
                &format!("threads/{}", handle.id),
                &[
                    ("format", "metadata".to_string()),
                    ("metadataHeaders", "Subject".to_string()),
                ],
            )
            .await?;

        if let Ok(mut last) = self.last_thread.lock() {
            *last = Some(thread.clone());
        }
        Ok(thread)
    }

    async fn label_names(&self) -> Result<&HashMap<String, String>, MailError> {
        self.label_names
            .get_or_try_init(|| async {
                let list: LabelList = self.get_json("labels.list", "labels", &[]).await?;
                debug!(count = list.labels.len(), "Loaded Gmail labels");
                Ok::<_, MailError>(list.labels.into_iter().map(|l| (l.id, l.name)).collect())
            })
            .await
    }
}

fn check_status(operation: &str, resp: reqwest::Response) -> Result<reqwest::Response, MailError> {
    let status = resp.status();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(MailError::AuthFailed);
    }
    if !status.is_success() {
        return Err(MailError::RequestFailed {
            operation: operation.into(),
            reason: format!("HTTP {status}"),
        });
    }
    Ok(resp)
}

#[async_trait]
impl MailStore for GmailStore {
    async fn search(
        &self,
        query: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ThreadHandle>, MailError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let page_size = limit.min(MAX_PAGE_SIZE);
        let end = offset.saturating_add(limit);

        // Start from the closest page whose token we know, or the first page.
        let (mut cursor, mut token) = match self.nearest_token(query, page_size, offset) {
            Some((start, token)) => (start, Some(token)),
            None => (0, None),
        };

        let mut found = Vec::with_capacity(limit.min(MAX_PAGE_SIZE));
        loop {
            let page = self.list_page(query, page_size, token.as_deref()).await?;
            let count = page.threads.len();
            found.extend(
                page.threads
                    .into_iter()
                    .enumerate()
                    .filter(|(i, _)| (offset..end).contains(&(cursor + i)))
                    .map(|(_, t)| ThreadHandle::new(t.id)),
            );
            cursor += count;

            match page.next_page_token {
                Some(next) if count > 0 => {
                    self.remember_token(query, page_size, cursor, next.clone());
                    if cursor >= end {
                        break;
                    }
                    token = Some(next);
                }
                _ => break,
            }
        }

        debug!(query, offset, limit, count = found.len(), "Gmail search");
        Ok(found)
    }

    async fn messages(&self, thread: &ThreadHandle) -> Result<Vec<MessageSummary>, MailError> {
        self.thread(thread)
            .await?
            .messages
            .iter()
            .map(MessageResource::summary)
            .collect()
    }

    async fn labels(&self, thread: &ThreadHandle) -> Result<Vec<String>, MailError> {
        let resource = self.thread(thread).await?;
        let names = self.label_names().await?;

        let mut labels: Vec<String> = Vec::new();
        for id in resource.messages.iter().flat_map(|m| m.label_ids.iter()) {
            let name = names.get(id).cloned().unwrap_or_else(|| id.clone());
            if !labels.contains(&name) {
                labels.push(name);
            }
        }
        Ok(labels)
    }

    async fn move_to_trash(&self, thread: &ThreadHandle) -> Result<(), MailError> {
        let resp = self
            .client
            .post(self.url(&format!("threads/{}/trash", thread.id)))
            .bearer_auth(self.token.expose_secret())
            .send()
            .await
            .map_err(|e| MailError::RequestFailed {
                operation: "threads.trash".into(),
                reason: e.to_string(),
            })?;
        check_status("threads.trash", resp)?;
        debug!(thread_id = %thread.id, "Thread moved to trash");
        Ok(())
    }
}
