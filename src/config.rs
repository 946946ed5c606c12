//! Configuration types.

use std::path::{Path, PathBuf};

use crate::clock::ReportClock;
use crate::error::ConfigError;
use crate::pipeline::keywords::KeywordGroup;
use crate::pipeline::labels::{DEFAULT_CATEGORY_PREFIX, DEFAULT_SYSTEM_LABEL_PATTERN, LabelClassifier};
use crate::pipeline::paginator::{DEFAULT_PAGE_SIZE, DEFAULT_THREAD_LINK_BASE};

/// Sweep configuration.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Filesystem root the storage hierarchy lives under.
    pub data_dir: PathBuf,
    /// Top-level folder name.
    pub root_folder_name: String,
    /// Folder holding the overview and the year/month tree of run logs.
    pub debug_folder_name: String,
    pub overview_name: String,
    /// Run logs are named `<prefix> <yyyy-MM-dd HH-mm-ss>`.
    pub log_name_prefix: String,
    pub page_size: usize,
    /// Actually move deleted threads to the trash. Off means record-only.
    pub trash_enabled: bool,
    /// IANA timezone for every formatted stamp.
    pub timezone: String,
    pub keyword_groups: Vec<KeywordGroup>,
    /// Regex for labels the backend reserves.
    pub system_label_pattern: String,
    pub category_prefix: String,
    pub thread_link_base: String,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            root_folder_name: "Gmail Auto Cleanup Logs".to_string(),
            debug_folder_name: "Debug".to_string(),
            overview_name: "Gmail Cleanup Debug Overview".to_string(),
            log_name_prefix: "Gmail Cleanup Debug Log".to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            trash_enabled: false,
            timezone: "UTC".to_string(),
            keyword_groups: Vec::new(),
            system_label_pattern: DEFAULT_SYSTEM_LABEL_PATTERN.to_string(),
            category_prefix: DEFAULT_CATEGORY_PREFIX.to_string(),
            thread_link_base: DEFAULT_THREAD_LINK_BASE.to_string(),
        }
    }
}

impl SweepConfig {
    /// Defaults overridden by `MAIL_SWEEP_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment, or a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup("MAIL_SWEEP_ROOT") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(name) = lookup("MAIL_SWEEP_ROOT_FOLDER") {
            config.root_folder_name = name;
        }
        if let Some(size) = lookup("MAIL_SWEEP_PAGE_SIZE") {
            config.page_size = parse_page_size(&size)?;
        }
        if let Some(flag) = lookup("MAIL_SWEEP_TRASH") {
            config.trash_enabled = parse_bool("MAIL_SWEEP_TRASH", &flag)?;
        }
        if let Some(tz) = lookup("MAIL_SWEEP_TIMEZONE") {
            config.timezone = tz;
        }
        if let Some(pattern) = lookup("MAIL_SWEEP_SYSTEM_LABELS") {
            config.system_label_pattern = pattern;
        }
        if let Some(path) = lookup("MAIL_SWEEP_KEYWORDS_FILE") {
            config.keyword_groups = load_keyword_groups(Path::new(&path))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the values that only fail later, at sweep time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "page_size".into(),
                message: "must be greater than zero".into(),
            });
        }
        self.clock()?;
        self.label_classifier()?;
        Ok(())
    }

    pub fn clock(&self) -> Result<ReportClock, ConfigError> {
        ReportClock::from_name(&self.timezone)
    }

    pub fn label_classifier(&self) -> Result<LabelClassifier, ConfigError> {
        LabelClassifier::new(&self.system_label_pattern, &self.category_prefix)
    }
}

fn parse_page_size(raw: &str) -> Result<usize, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|e| ConfigError::InvalidValue {
            key: "MAIL_SWEEP_PAGE_SIZE".into(),
            message: format!("{raw:?}: {e}"),
        })
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.into(),
            message: format!("expected a boolean, got {other:?}"),
        }),
    }
}

/// Read keyword groups from a JSON file shaped `[["weekly", "digest"], ["unsubscribe"]]`.
pub fn load_keyword_groups(path: &Path) -> Result<Vec<KeywordGroup>, ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    serde_json::from_str(&raw)
        .map_err(|e| ConfigError::ParseError(format!("{}: {e}", path.display())))
}
