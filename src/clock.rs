//! Report clock: renders instants in the configured timezone.
//!
//! Every stamp written to a sink, every file name and every search date goes
//! through here so that a sweep never mixes zones.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::error::ConfigError;

/// Row timestamp format (`yyyy/MM/dd HH:mm:ss`).
const ROW_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// File-name timestamp format (`yyyy-MM-dd HH-mm-ss`).
const FILE_FORMAT: &str = "%Y-%m-%d %H-%M-%S";

/// Mail search date format (`yyyy/MM/dd`).
const SEARCH_FORMAT: &str = "%Y/%m/%d";

/// Timezone-aware formatter for all user-facing stamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportClock {
    tz: Tz,
}

impl ReportClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Parse an IANA zone name, e.g. `Europe/Berlin`.
    ///
    /// An empty name falls back to UTC.
    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(Self::default());
        }
        let tz: Tz = name.parse().map_err(|e| ConfigError::InvalidValue {
            key: "timezone".into(),
            message: format!("{name}: {e}"),
        })?;
        Ok(Self { tz })
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Current instant.
    pub fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    /// `yyyy/MM/dd HH:mm:ss`, used for log rows and overview rows.
    pub fn row_stamp(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.tz).format(ROW_FORMAT).to_string()
    }

    /// `yyyy-MM-dd HH-mm-ss`, used when naming run log files.
    pub fn file_stamp(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.tz).format(FILE_FORMAT).to_string()
    }

    /// `yyyy/MM/dd`, used inside `before:` search operators.
    pub fn search_date(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.tz).format(SEARCH_FORMAT).to_string()
    }

    /// Four-digit year folder name.
    pub fn year_folder(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.tz).format("%Y").to_string()
    }

    /// English long month folder name, e.g. `March`.
    pub fn month_folder(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.tz).format("%B").to_string()
    }
}

impl Default for ReportClock {
    fn default() -> Self {
        Self { tz: Tz::UTC }
    }
}
