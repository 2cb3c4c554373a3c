//! User settings for phase durations and the long-break cadence

use std::{collections::HashMap, fmt, time::Duration};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::Phase;

pub const DEFAULT_CYCLE_PERIOD: u32 = 0;
pub const DEFAULT_ACTIVE_SECS: u64 = 25 * 60;
pub const DEFAULT_BREAK_SECS: u64 = 5 * 60;
pub const DEFAULT_LONG_BREAK_SECS: u64 = 15 * 60;

/// Longest phase a setting may ask for. Larger values are clamped.
pub const MAX_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

/// Keys of the synced settings namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    CyclePeriod,
    ActiveDuration,
    BreakDuration,
    LongBreakDuration,
}

impl SettingKey {
    pub const ALL: [SettingKey; 4] = [
        SettingKey::CyclePeriod,
        SettingKey::ActiveDuration,
        SettingKey::BreakDuration,
        SettingKey::LongBreakDuration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::CyclePeriod => "cyclePeriod",
            SettingKey::ActiveDuration => "activeDuration",
            SettingKey::BreakDuration => "breakDuration",
            SettingKey::LongBreakDuration => "longBreakDuration",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.as_str() == name)
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single settings change as delivered by the store's change stream.
/// `None` means the key was removed and falls back to its default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingChange {
    pub key: SettingKey,
    pub value: Option<u64>,
}

/// Cached copy of the synced settings. Durations are in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub cycle_period: u32,
    pub active_duration: u64,
    pub break_duration: u64,
    pub long_break_duration: u64,
}

impl Settings {
    /// Build settings from raw store values, using defaults for absent keys
    pub fn from_values(values: &HashMap<String, Value>) -> Self {
        let mut settings = Self::default();
        for key in SettingKey::ALL {
            if let Some(value) = values.get(key.as_str()) {
                settings.apply(SettingChange {
                    key,
                    value: decode_seconds(key, value),
                });
            }
        }
        settings
    }

    /// Merge one change into the cached values
    pub fn apply(&mut self, change: SettingChange) {
        let defaults = Self::default();
        match change.key {
            SettingKey::CyclePeriod => {
                self.cycle_period = change
                    .value
                    .map(|v| u32::try_from(v).unwrap_or(u32::MAX))
                    .unwrap_or(defaults.cycle_period);
            }
            SettingKey::ActiveDuration => {
                self.active_duration = clamp_secs(change).unwrap_or(defaults.active_duration);
            }
            SettingKey::BreakDuration => {
                self.break_duration = clamp_secs(change).unwrap_or(defaults.break_duration);
            }
            SettingKey::LongBreakDuration => {
                self.long_break_duration = clamp_secs(change).unwrap_or(defaults.long_break_duration);
            }
        }
    }

    pub fn duration_of(&self, phase: Phase) -> Duration {
        let secs = match phase {
            Phase::Active => self.active_duration,
            Phase::Break => self.break_duration,
            Phase::LongBreak => self.long_break_duration,
        };
        Duration::from_secs(secs)
    }

    /// Whether the break following `current_cycle` completed work phases is a long one
    pub fn is_long_break(&self, current_cycle: u32) -> bool {
        self.cycle_period > 0 && current_cycle >= self.cycle_period
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cycle_period: DEFAULT_CYCLE_PERIOD,
            active_duration: DEFAULT_ACTIVE_SECS,
            break_duration: DEFAULT_BREAK_SECS,
            long_break_duration: DEFAULT_LONG_BREAK_SECS,
        }
    }
}

fn clamp_secs(change: SettingChange) -> Option<u64> {
    change.value.map(|secs| {
        if secs > MAX_DURATION_SECS {
            warn!("Clamping {} of {}s to {}s", change.key, secs, MAX_DURATION_SECS);
        }
        secs.min(MAX_DURATION_SECS)
    })
}

/// Decode a stored setting. Values written by a settings page may be numbers
/// or numeric strings; anything else is ignored with a warning.
pub fn decode_seconds(key: SettingKey, value: &Value) -> Option<u64> {
    let decoded = match value {
        Value::Null => return None,
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    if decoded.is_none() {
        warn!("Ignoring undecodable value for {}: {}", key, value);
    }
    decoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_keys_use_defaults() {
        let settings = Settings::from_values(&HashMap::new());
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.cycle_period, 0);
    }

    #[test]
    fn stored_values_override_defaults() {
        let values = HashMap::from([
            ("cyclePeriod".to_string(), json!(2)),
            ("activeDuration".to_string(), json!("60")),
            ("breakDuration".to_string(), json!(30)),
        ]);
        let settings = Settings::from_values(&values);
        assert_eq!(settings.cycle_period, 2);
        assert_eq!(settings.active_duration, 60);
        assert_eq!(settings.break_duration, 30);
        assert_eq!(settings.long_break_duration, DEFAULT_LONG_BREAK_SECS);
    }

    #[test]
    fn garbage_value_falls_back_to_default() {
        let values = HashMap::from([("activeDuration".to_string(), json!({"minutes": 3}))]);
        assert_eq!(Settings::from_values(&values).active_duration, DEFAULT_ACTIVE_SECS);
    }

    #[test]
    fn oversized_duration_is_clamped() {
        let values = HashMap::from([
            ("activeDuration".to_string(), json!("18446744073709551615")),
            ("breakDuration".to_string(), json!(1e300)),
        ]);
        let settings = Settings::from_values(&values);
        assert_eq!(settings.active_duration, MAX_DURATION_SECS);
        assert_eq!(settings.break_duration, MAX_DURATION_SECS);

        let mut merged = Settings::default();
        merged.apply(SettingChange {
            key: SettingKey::LongBreakDuration,
            value: Some(u64::MAX),
        });
        assert_eq!(merged.duration_of(Phase::LongBreak), Duration::from_secs(MAX_DURATION_SECS));
    }

    #[test]
    fn removed_key_resets_to_default() {
        let mut settings = Settings {
            break_duration: 10,
            ..Settings::default()
        };
        settings.apply(SettingChange {
            key: SettingKey::BreakDuration,
            value: None,
        });
        assert_eq!(settings.break_duration, DEFAULT_BREAK_SECS);
    }

    #[test]
    fn long_break_requires_enabled_period() {
        let disabled = Settings::default();
        assert!(!disabled.is_long_break(100));

        let every_two = Settings {
            cycle_period: 2,
            ..Settings::default()
        };
        assert!(!every_two.is_long_break(1));
        assert!(every_two.is_long_break(2));
        assert!(every_two.is_long_break(3));
    }

    #[test]
    fn key_names_round_trip() {
        for key in SettingKey::ALL {
            assert_eq!(SettingKey::from_name(key.as_str()), Some(key));
        }
        assert_eq!(SettingKey::from_name("minutes"), None);
    }
}
