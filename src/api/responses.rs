//! API response structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::{
    services::{BadgeColor, NotificationKind},
    state::{settings::MAX_DURATION_SECS, SettingKey, TimerSnapshot},
};

/// Response for every call that drives or reads the timer
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub timer: TimerSnapshot,
    pub badge_text: String,
    pub badge_color: Option<BadgeColor>,
    pub notifications: Vec<NotificationKind>,
    pub uptime: String,
    pub last_action: Option<String>,
    pub last_action_time: Option<DateTime<Utc>>,
    pub timestamp: DateTime<Utc>,
}

/// Partial settings write, as sent by a settings page
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SettingsUpdate {
    pub cycle_period: Option<u32>,
    pub active_duration: Option<u64>,
    pub break_duration: Option<u64>,
    pub long_break_duration: Option<u64>,
}

impl SettingsUpdate {
    /// Name of the first duration above [`MAX_DURATION_SECS`], if any
    pub fn out_of_range(&self) -> Option<SettingKey> {
        [
            (SettingKey::ActiveDuration, self.active_duration),
            (SettingKey::BreakDuration, self.break_duration),
            (SettingKey::LongBreakDuration, self.long_break_duration),
        ]
        .into_iter()
        .find(|(_, secs)| secs.is_some_and(|secs| secs > MAX_DURATION_SECS))
        .map(|(key, _)| key)
    }

    /// Store values for the fields that were provided
    pub fn into_values(self) -> HashMap<String, Value> {
        [
            (SettingKey::CyclePeriod, self.cycle_period.map(u64::from)),
            (SettingKey::ActiveDuration, self.active_duration),
            (SettingKey::BreakDuration, self.break_duration),
            (SettingKey::LongBreakDuration, self.long_break_duration),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key.as_str().to_string(), Value::from(v))))
        .collect()
    }
}

/// Error body for rejected requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorResponse {
    pub fn new(message: String) -> Self {
        Self {
            status: "error".to_string(),
            message,
            timestamp: Utc::now(),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    /// Create a new health response
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn settings_update_keeps_only_provided_fields() {
        let update: SettingsUpdate =
            serde_json::from_value(json!({"cyclePeriod": 4, "breakDuration": 120})).unwrap();
        let values = update.into_values();
        assert_eq!(values.len(), 2);
        assert_eq!(values["cyclePeriod"], json!(4));
        assert_eq!(values["breakDuration"], json!(120));
    }

    #[test]
    fn settings_update_flags_oversized_durations() {
        let update: SettingsUpdate =
            serde_json::from_value(json!({"breakDuration": 30, "longBreakDuration": u64::MAX})).unwrap();
        assert_eq!(update.out_of_range(), Some(SettingKey::LongBreakDuration));

        let update: SettingsUpdate =
            serde_json::from_value(json!({"activeDuration": MAX_DURATION_SECS})).unwrap();
        assert_eq!(update.out_of_range(), None);
    }

    #[test]
    fn settings_update_rejects_unknown_fields() {
        assert!(serde_json::from_value::<SettingsUpdate>(json!({"minutes": 5})).is_err());
    }
}
