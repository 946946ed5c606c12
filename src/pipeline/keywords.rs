//! Subject keyword matching.
//!
//! A group matches when every one of its words occurs in the subject
//! (case-insensitive substring). Groups are tried in declaration order and
//! the first matching group wins.

use serde::{Deserialize, Serialize};

/// An ordered set of words that must all appear in a subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct KeywordGroup {
    words: Vec<String>,
}

impl From<Vec<String>> for KeywordGroup {
    fn from(words: Vec<String>) -> Self {
        Self::new(words)
    }
}

impl From<KeywordGroup> for Vec<String> {
    fn from(group: KeywordGroup) -> Self {
        group.words
    }
}

impl KeywordGroup {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            words: words
                .into_iter()
                .map(|w| w.into().to_lowercase())
                .collect(),
        }
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    /// `subject` must already be lowercase. A group with no words never matches.
    fn matches_lowercase(&self, subject: &str) -> bool {
        !self.words.is_empty() && self.words.iter().all(|w| subject.contains(w.as_str()))
    }

    /// Words joined by a single space, as cited in decision reasons.
    pub fn text(&self) -> String {
        self.words.join(" ")
    }
}

/// Match `subject` against `groups`.
///
/// Returns the text of the first matching group, or `None` when the subject
/// is empty, there are no groups, or nothing matches.
pub fn match_subject(subject: &str, groups: &[KeywordGroup]) -> Option<String> {
    if subject.is_empty() || groups.is_empty() {
        return None;
    }
    let lower = subject.to_lowercase();
    groups
        .iter()
        .find(|g| g.matches_lowercase(&lower))
        .map(KeywordGroup::text)
}
