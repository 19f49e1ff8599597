//! Engine configuration handed over by the host.
//!
//! # Responsibility
//! - Hold the tunables of the scheduling engine with sane defaults.
//! - Parse and validate the host-supplied JSON document.
//!
//! # Invariants
//! - Every field has a default; an empty document is valid.
//! - `utc_offset_minutes` stays within ±18 hours.

use crate::calendar::{Calendar, WeekStart};
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const DEFAULT_SNAPSHOT_KEY: &str = "tasks_snapshot";
pub const DEFAULT_TOP_ACTIVITIES_LIMIT: usize = 5;
pub const DEFAULT_DELETE_RETRY_WARN_THRESHOLD: u32 = 3;
pub const DEFAULT_REMINDER_HORIZON_DAYS: u32 = 366;

const MAX_OFFSET_MINUTES: i32 = 18 * 60;

#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    OffsetOutOfRange(i32),
    EmptySnapshotKey,
    ZeroTopActivities,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid config document: {err}"),
            Self::OffsetOutOfRange(minutes) => write!(
                f,
                "utc_offset_minutes must be within ±{MAX_OFFSET_MINUTES}, got {minutes}"
            ),
            Self::EmptySnapshotKey => write!(f, "snapshot_key cannot be empty"),
            Self::ZeroTopActivities => write!(f, "top_activities_limit must be positive"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Engine tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub week_start: WeekStart,
    pub utc_offset_minutes: i32,
    /// Fixed key of the whole-collection snapshot.
    pub snapshot_key: String,
    pub top_activities_limit: usize,
    /// Failed remote deletes of one record are logged at `warn` from this
    /// attempt count on.
    pub delete_retry_warn_threshold: u32,
    /// How far ahead reminder planning searches for the next occurrence.
    pub reminder_horizon_days: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            week_start: WeekStart::Monday,
            utc_offset_minutes: 0,
            snapshot_key: DEFAULT_SNAPSHOT_KEY.to_string(),
            top_activities_limit: DEFAULT_TOP_ACTIVITIES_LIMIT,
            delete_retry_warn_threshold: DEFAULT_DELETE_RETRY_WARN_THRESHOLD,
            reminder_horizon_days: DEFAULT_REMINDER_HORIZON_DAYS,
        }
    }
}

impl CoreConfig {
    /// Parses and validates a JSON config document.
    ///
    /// # Errors
    /// - Returns `ConfigError::Parse` for malformed JSON or wrong field types.
    /// - Returns a validation variant for out-of-range values.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let trimmed = raw.trim();
        let config = if trimmed.is_empty() {
            Self::default()
        } else {
            serde_json::from_str::<Self>(trimmed)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.utc_offset_minutes.abs() > MAX_OFFSET_MINUTES {
            return Err(ConfigError::OffsetOutOfRange(self.utc_offset_minutes));
        }
        if self.snapshot_key.trim().is_empty() {
            return Err(ConfigError::EmptySnapshotKey);
        }
        if self.top_activities_limit == 0 {
            return Err(ConfigError::ZeroTopActivities);
        }
        Ok(())
    }

    /// Builds the calendar described by this config.
    pub fn calendar(&self) -> Result<Calendar, ConfigError> {
        let offset = FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .ok_or(ConfigError::OffsetOutOfRange(self.utc_offset_minutes))?;
        Ok(Calendar::new(self.week_start, offset))
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig, DEFAULT_SNAPSHOT_KEY};
    use crate::calendar::WeekStart;

    #[test]
    fn empty_document_yields_defaults() {
        let config = CoreConfig::from_json("  ").unwrap();
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.snapshot_key, DEFAULT_SNAPSHOT_KEY);
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let config =
            CoreConfig::from_json(r#"{"week_start":"sunday","utc_offset_minutes":-300}"#).unwrap();
        assert_eq!(config.week_start, WeekStart::Sunday);
        assert_eq!(config.top_activities_limit, 5);
        assert_eq!(config.calendar().unwrap().offset().local_minus_utc(), -300 * 60);
    }

    #[test]
    fn out_of_range_offset_is_rejected() {
        let err = CoreConfig::from_json(r#"{"utc_offset_minutes":2000}"#).unwrap_err();
        assert!(matches!(err, ConfigError::OffsetOutOfRange(2000)));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = CoreConfig::from_json("{week_start:").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
