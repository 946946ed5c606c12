//! System-label classification.
//!
//! Separates labels a user applied by hand from the reserved labels the mail
//! backend manages itself. The reserved set is a regex so that other label
//! taxonomies can be plugged in through configuration.

use regex::Regex;

use crate::error::ConfigError;

/// Reserved Gmail labels: category markers and the standard system labels.
pub const DEFAULT_SYSTEM_LABEL_PATTERN: &str =
    r"^CATEGORY_|INBOX|IMPORTANT|UNREAD|SENT|DRAFT|TRASH|SPAM";

/// Prefix that marks a category label.
pub const DEFAULT_CATEGORY_PREFIX: &str = "CATEGORY_";

/// Splits thread labels into custom labels and the category label.
#[derive(Debug, Clone)]
pub struct LabelClassifier {
    system: Regex,
    category_prefix: String,
}

impl LabelClassifier {
    /// Build a classifier from a reserved-label pattern and a category prefix.
    pub fn new(system_pattern: &str, category_prefix: &str) -> Result<Self, ConfigError> {
        let system = Regex::new(system_pattern).map_err(|e| ConfigError::InvalidValue {
            key: "system_label_pattern".into(),
            message: e.to_string(),
        })?;
        Ok(Self {
            system,
            category_prefix: category_prefix.to_string(),
        })
    }

    pub fn is_system(&self, label: &str) -> bool {
        self.system.is_match(label)
    }

    /// Labels that do not match the reserved pattern, in original order.
    pub fn custom_labels(&self, labels: &[String]) -> Vec<String> {
        labels
            .iter()
            .filter(|l| !self.is_system(l))
            .cloned()
            .collect()
    }

    /// First label carrying the category prefix.
    pub fn category(&self, labels: &[String]) -> Option<String> {
        labels
            .iter()
            .find(|l| l.starts_with(&self.category_prefix))
            .cloned()
    }

    /// Category name without its prefix, as shown in the log.
    pub fn category_display<'a>(&self, category: &'a str) -> &'a str {
        category
            .strip_prefix(self.category_prefix.as_str())
            .unwrap_or(category)
    }
}

impl Default for LabelClassifier {
    fn default() -> Self {
        Self {
            system: Regex::new(DEFAULT_SYSTEM_LABEL_PATTERN).unwrap(),
            category_prefix: DEFAULT_CATEGORY_PREFIX.to_string(),
        }
    }
}
