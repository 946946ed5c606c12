//! Batch paginator: walks a search query page by page and logs a decision
//! for every thread.
//!
//! Flow per thread:
//! 1. Derive `ThreadFacts` from the mail store
//! 2. Apply the query's rule
//! 3. Trash the thread if the rule says delete and trashing is enabled
//! 4. Append one row to the run log
//!
//! Anything that goes wrong in steps 1-3 is confined to that thread: it
//! becomes a row in the fallback log and the walk moves on. Failures of the
//! search itself or of the log sinks abort the walk.
//!
//! A page shorter than the page size ends the walk without asking for more.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::clock::ReportClock;
use crate::error::PipelineError;
use crate::mail::{MailStore, ThreadHandle};
use crate::pipeline::labels::LabelClassifier;
use crate::pipeline::rules::DecisionRule;
use crate::pipeline::types::{
    BatchSummary, Decision, FallbackRow, LogRow, THREAD_EXCEPTION, ThreadFacts, thread_link,
};
use crate::store::traits::RunLog;

/// Threads requested per search call.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Deep-link prefix for a thread in the Gmail web UI.
pub const DEFAULT_THREAD_LINK_BASE: &str = "https://mail.google.com/mail/u/0/#inbox/";

/// Drives queries against the mail store and records every decision.
pub struct BatchPaginator {
    mail: Arc<dyn MailStore>,
    log: Arc<dyn RunLog>,
    labels: LabelClassifier,
    clock: ReportClock,
    page_size: usize,
    /// Record-only when false: decisions are logged but nothing is trashed.
    trash_enabled: bool,
    link_base: String,
}

impl BatchPaginator {
    /// Create a record-only paginator with default page size and labels.
    pub fn new(mail: Arc<dyn MailStore>, log: Arc<dyn RunLog>, clock: ReportClock) -> Self {
        Self {
            mail,
            log,
            labels: LabelClassifier::default(),
            clock,
            page_size: DEFAULT_PAGE_SIZE,
            trash_enabled: false,
            link_base: DEFAULT_THREAD_LINK_BASE.to_string(),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_trash(mut self, enabled: bool) -> Self {
        self.trash_enabled = enabled;
        self
    }

    pub fn with_labels(mut self, labels: LabelClassifier) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_link_base(mut self, link_base: impl Into<String>) -> Self {
        self.link_base = link_base.into();
        self
    }

    /// Run `query` to exhaustion, deciding each thread with `rule`.
    ///
    /// Rows accumulate in the shared run log; a thread matched by several
    /// queries is logged once per query.
    pub async fn run(
        &self,
        query: &str,
        rule_name: &str,
        rule: &dyn DecisionRule,
    ) -> Result<BatchSummary, PipelineError> {
        info!(query, rule = rule_name, "Processing query");

        let mut summary = BatchSummary::default();
        let mut start = 0;

        loop {
            let threads = self.mail.search(query, start, self.page_size).await?;
            if threads.is_empty() {
                break;
            }
            summary.pages += 1;
            debug!(query, start, count = threads.len(), "Fetched page");

            for thread in &threads {
                summary.processed += 1;
                match self.process_thread(thread, rule_name, rule).await {
                    Ok((row, decision)) => {
                        self.log.append_row(&row).await?;
                        if decision.is_delete() {
                            summary.deleted += 1;
                        } else {
                            summary.skipped += 1;
                        }
                    }
                    Err((subject, e)) => {
                        warn!(
                            thread_id = %thread.id,
                            rule = rule_name,
                            error = %e,
                            "Thread failed, recording in fallback log"
                        );
                        self.log
                            .append_fallback(&FallbackRow {
                                timestamp: self.clock.row_stamp(self.clock.now()),
                                issue: THREAD_EXCEPTION.to_string(),
                                subject,
                                thread_id: thread.id.clone(),
                                details: e.to_string(),
                            })
                            .await?;
                        summary.fallbacks += 1;
                    }
                }
            }

            if threads.len() < self.page_size {
                break;
            }
            start += self.page_size;
        }

        info!(
            query,
            rule = rule_name,
            pages = summary.pages,
            processed = summary.processed,
            deleted = summary.deleted,
            skipped = summary.skipped,
            fallbacks = summary.fallbacks,
            "Query complete"
        );
        Ok(summary)
    }

    /// Steps 1-3 for one thread. On failure, returns the subject if it was
    /// already known alongside the error.
    async fn process_thread(
        &self,
        thread: &ThreadHandle,
        rule_name: &str,
        rule: &dyn DecisionRule,
    ) -> Result<(LogRow, Decision), (String, PipelineError)> {
        let facts = self
            .extract_facts(thread)
            .await
            .map_err(|e| (String::new(), e))?;

        let decision = rule
            .decide(&facts)
            .map_err(|e| (facts.subject.clone(), e))?;

        if decision.is_delete() && self.trash_enabled {
            self.mail
                .move_to_trash(thread)
                .await
                .map_err(|e| {
                    (
                        facts.subject.clone(),
                        PipelineError::Trash {
                            thread_id: thread.id.clone(),
                            reason: e.to_string(),
                        },
                    )
                })?;
        }

        let row = self.render_row(&facts, rule_name, &decision);
        Ok((row, decision))
    }

    /// Derive the facts a rule sees for `thread`.
    pub async fn extract_facts(&self, thread: &ThreadHandle) -> Result<ThreadFacts, PipelineError> {
        let facts_error = |reason: String| PipelineError::ThreadFacts {
            thread_id: thread.id.clone(),
            reason,
        };

        let messages = self
            .mail
            .messages(thread)
            .await
            .map_err(|e| facts_error(e.to_string()))?;
        let unread_count = messages.iter().filter(|m| m.unread).count();

        // First unread message if there is one, else the first message.
        let representative = messages
            .iter()
            .find(|m| m.unread)
            .or_else(|| messages.first())
            .ok_or_else(|| facts_error("thread has no messages".into()))?;

        let labels = self
            .mail
            .labels(thread)
            .await
            .map_err(|e| facts_error(e.to_string()))?;

        Ok(ThreadFacts {
            thread_id: thread.id.clone(),
            subject: representative.subject.clone().unwrap_or_default(),
            date: representative.date,
            custom_labels: self.labels.custom_labels(&labels),
            category: self.labels.category(&labels),
            labels,
            unread_count,
        })
    }

    fn render_row(&self, facts: &ThreadFacts, rule_name: &str, decision: &Decision) -> LogRow {
        LogRow {
            timestamp: self.clock.row_stamp(self.clock.now()),
            rule_name: rule_name.to_string(),
            subject: facts.subject.clone(),
            email_date: self.clock.row_stamp(facts.date),
            reason: decision.reason().unwrap_or_default().to_string(),
            unread_count: facts.unread_count,
            custom_labels: facts.custom_labels.join(", "),
            labels: facts.labels.join(", "),
            category: facts
                .category
                .as_deref()
                .map(|c| self.labels.category_display(c).to_string())
                .unwrap_or_default(),
            action: decision.action().label().to_string(),
            thread_link: thread_link(&self.link_base, &facts.thread_id),
        }
    }
}
