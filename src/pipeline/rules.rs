//! Decision rules: map a thread's facts to delete or skip.
//!
//! Rules are stateless and never combined: each query in a sweep is bound to
//! exactly one rule, so two queries may reach different decisions about the
//! same thread.
//!
//! - `UnreadAgeRule`: delete unread threads the query already aged out,
//!   unless the user labelled them.
//! - `KeywordRule`: delete threads whose subject matches a keyword group.

use tracing::debug;

use crate::error::PipelineError;
use crate::pipeline::keywords::{KeywordGroup, match_subject};
use crate::pipeline::types::{Decision, ThreadFacts};

/// Reason cited when a thread carries a user label.
pub const HAS_USER_LABELS: &str = "Has user labels";

/// Reason cited when an unread-only rule meets a fully read thread.
pub const ALL_READ: &str = "All read";

/// A decision function over thread facts.
///
/// Errors are contained to the thread being decided.
pub trait DecisionRule: Send + Sync {
    fn decide(&self, facts: &ThreadFacts) -> Result<Decision, PipelineError>;
}

/// Deletes threads matched by an age query, guarded by label and unread checks.
#[derive(Debug, Clone)]
pub struct UnreadAgeRule {
    /// Reason cited on delete.
    reason: String,
    /// Skip threads with no unread messages.
    require_unread: bool,
}

impl UnreadAgeRule {
    pub fn new(reason: impl Into<String>, require_unread: bool) -> Self {
        Self {
            reason: reason.into(),
            require_unread,
        }
    }
}

impl DecisionRule for UnreadAgeRule {
    fn decide(&self, facts: &ThreadFacts) -> Result<Decision, PipelineError> {
        // A user label means the thread was triaged by hand; it overrides everything.
        if !facts.custom_labels.is_empty() {
            debug!(
                thread_id = %facts.thread_id,
                labels = ?facts.custom_labels,
                "Thread has user labels"
            );
            return Ok(Decision::skip(HAS_USER_LABELS));
        }
        if self.require_unread && facts.unread_count == 0 {
            return Ok(Decision::skip(ALL_READ));
        }
        Ok(Decision::delete(self.reason.clone()))
    }
}

/// Deletes threads whose subject matches one of the configured keyword groups.
#[derive(Debug, Clone, Default)]
pub struct KeywordRule {
    groups: Vec<KeywordGroup>,
}

impl KeywordRule {
    pub fn new(groups: Vec<KeywordGroup>) -> Self {
        Self { groups }
    }

    pub fn groups(&self) -> &[KeywordGroup] {
        &self.groups
    }
}

impl DecisionRule for KeywordRule {
    fn decide(&self, facts: &ThreadFacts) -> Result<Decision, PipelineError> {
        match match_subject(&facts.subject, &self.groups) {
            Some(matched) => {
                debug!(
                    thread_id = %facts.thread_id,
                    group = %matched,
                    "Subject matched keyword group"
                );
                Ok(Decision::delete(format!("Keyword: {matched}")))
            }
            None => Ok(Decision::pass()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn make_facts(subject: &str, custom: &[&str], unread: usize) -> ThreadFacts {
        ThreadFacts {
            thread_id: "t-1".into(),
            subject: subject.into(),
            date: Utc::now(),
            labels: custom.iter().map(|s| s.to_string()).collect(),
            custom_labels: custom.iter().map(|s| s.to_string()).collect(),
            category: None,
            unread_count: unread,
        }
    }

    #[test]
    fn custom_label_always_skips() {
        let rule = UnreadAgeRule::new("Unread and older than 6 months", true);
        for unread in [0, 1, 5] {
            let d = rule.decide(&make_facts("Hi", &["Receipts"], unread)).unwrap();
            assert_eq!(d, Decision::skip(HAS_USER_LABELS));
        }
    }

    #[test]
    fn custom_label_wins_even_without_unread_requirement() {
        let rule = UnreadAgeRule::new("old", false);
        let d = rule.decide(&make_facts("Hi", &["Work"], 0)).unwrap();
        assert_eq!(d.reason(), Some(HAS_USER_LABELS));
    }

    #[test]
    fn all_read_skips_when_unread_required() {
        let rule = UnreadAgeRule::new("Unread and older than 6 months", true);
        let d = rule.decide(&make_facts("Hi", &[], 0)).unwrap();
        assert_eq!(d, Decision::skip(ALL_READ));
    }

    #[test]
    fn unread_thread_is_deleted_with_configured_reason() {
        let rule = UnreadAgeRule::new("Unread and older than 6 months", true);
        let d = rule.decide(&make_facts("Hi", &[], 2)).unwrap();
        assert_eq!(d, Decision::delete("Unread and older than 6 months"));
    }

    #[test]
    fn read_thread_is_deleted_when_unread_not_required() {
        let rule = UnreadAgeRule::new("old", false);
        let d = rule.decide(&make_facts("Hi", &[], 0)).unwrap();
        assert!(d.is_delete());
    }

    #[test]
    fn keyword_match_deletes_with_group_text() {
        let rule = KeywordRule::new(vec![KeywordGroup::new(["weekly", "digest"])]);
        let d = rule
            .decide(&make_facts("Weekly Digest – March", &[], 0))
            .unwrap();
        assert_eq!(d, Decision::delete("Keyword: weekly digest"));
    }

    #[test]
    fn keyword_miss_skips_without_reason() {
        let rule = KeywordRule::new(vec![KeywordGroup::new(["weekly", "digest"])]);
        let d = rule.decide(&make_facts("Invoice #123", &[], 0)).unwrap();
        assert_eq!(d, Decision::pass());
    }

    #[test]
    fn keyword_rule_ignores_labels() {
        let rule = KeywordRule::new(vec![KeywordGroup::new(["sale"])]);
        let d = rule.decide(&make_facts("Big sale", &["Shopping"], 0)).unwrap();
        assert!(d.is_delete());
    }

    #[test]
    fn empty_keyword_rule_skips_everything() {
        let rule = KeywordRule::default();
        assert_eq!(rule.decide(&make_facts("Anything", &[], 3)).unwrap(), Decision::pass());
    }
}
