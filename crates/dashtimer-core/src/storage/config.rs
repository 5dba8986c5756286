//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Countdown timer presets, auto-repeat and pre-alert threshold
//! - Pomodoro phase lengths and auto-start behavior
//! - Engine timing (tick cadence, settle delay, duration floor)
//!
//! Configuration is stored at `~/.config/dashtimer/config.toml`. The
//! `[timer]` section doubles as the external settings source that is pushed
//! into the countdown engine on every load.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::context::EngineTiming;
use crate::error::ConfigError;
use crate::pomodoro::PomodoroSettings;
use crate::timer::{SettingsPatch, TimerSettings};

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/dashtimer/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timer: TimerSettings,
    #[serde(default)]
    pub pomodoro: PomodoroSettings,
    #[serde(default)]
    pub engine: EngineTiming,
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(e.to_string()))?,
                    ),
                    // "none" only survives deserialization for nullable fields
                    // such as the pre-alert threshold.
                    serde_json::Value::Number(_) | serde_json::Value::Null => match value {
                        "none" | "null" => serde_json::Value::Null,
                        other => serde_json::Value::Number(
                            other
                                .parse::<u64>()
                                .map_err(|_| invalid(format!("cannot parse '{other}' as number")))?
                                .into(),
                        ),
                    },
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    serde_json::Value::String(_) => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("config.toml"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from the data directory, writing defaults on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config =
                    toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                        path: path.to_path_buf(),
                        message: e.to_string(),
                    })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(_) => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
        }
    }

    /// Persist to the data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dot-separated key. The change only sticks if the
    /// resulting configuration is still valid; call [`Config::save`] to persist.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value is rejected.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config =
            serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, message: &str| ConfigError::InvalidValue {
            key: key.to_string(),
            message: message.to_string(),
        };
        let p = &self.pomodoro;
        if p.focus_min == 0 {
            return Err(invalid("pomodoro.focus_min", "must be at least 1"));
        }
        if p.short_break_min == 0 {
            return Err(invalid("pomodoro.short_break_min", "must be at least 1"));
        }
        if p.long_break_min == 0 {
            return Err(invalid("pomodoro.long_break_min", "must be at least 1"));
        }
        if p.long_break_interval == 0 {
            return Err(invalid("pomodoro.long_break_interval", "must be at least 1"));
        }
        if self.engine.tick_interval_ms == 0 {
            return Err(invalid("engine.tick_interval_ms", "must be at least 1"));
        }
        Ok(())
    }

    /// The `[timer]` section as a settings push for the countdown engine.
    pub fn timer_patch(&self) -> SettingsPatch {
        SettingsPatch {
            presets_ms: Some(self.timer.presets_ms.clone()),
            auto_repeat: Some(self.timer.auto_repeat),
            pre_alert_threshold_ms: Some(self.timer.pre_alert_threshold_ms.unwrap_or(0)),
            notifications: Some(self.timer.notifications_enabled),
            sound_enabled: Some(self.timer.sound_enabled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed: Config = toml::from_str("[pomodoro]\nfocus_min = 50\n").unwrap();
        assert_eq!(parsed.pomodoro.focus_min, 50);
        assert_eq!(parsed.pomodoro.short_break_min, 5);
        assert_eq!(parsed.engine.tick_interval_ms, 200);
        assert!(!parsed.timer.presets_ms.is_empty());
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("pomodoro.focus_min").as_deref(), Some("25"));
        assert_eq!(cfg.get("timer.auto_repeat").as_deref(), Some("false"));
        assert_eq!(cfg.get("timer.pre_alert_threshold_ms").as_deref(), Some("null"));
        assert!(cfg.get("timer.missing_key").is_none());
    }

    #[test]
    fn set_updates_nested_values() {
        let mut cfg = Config::default();
        cfg.set("timer.auto_repeat", "true").unwrap();
        cfg.set("pomodoro.long_break_interval", "3").unwrap();
        cfg.set("timer.pre_alert_threshold_ms", "10000").unwrap();
        cfg.set("timer.presets_ms", "[30000, 90000]").unwrap();
        assert!(cfg.timer.auto_repeat);
        assert_eq!(cfg.pomodoro.long_break_interval, 3);
        assert_eq!(cfg.timer.pre_alert_threshold_ms, Some(10_000));
        assert_eq!(cfg.timer.presets_ms, vec![30_000, 90_000]);

        cfg.set("timer.pre_alert_threshold_ms", "none").unwrap();
        assert_eq!(cfg.timer.pre_alert_threshold_ms, None);
    }

    #[test]
    fn set_rejects_unknown_key() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("timer.nonexistent_key", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(cfg.set("", "1"), Err(ConfigError::UnknownKey(_))));
    }

    #[test]
    fn set_rejects_invalid_type_and_leaves_config_untouched() {
        let mut cfg = Config::default();
        assert!(cfg.set("timer.auto_repeat", "not_a_bool").is_err());
        assert!(cfg.set("pomodoro.long_break_interval", "0").is_err());
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn load_from_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg, Config::default());
        assert!(path.exists());

        let mut changed = cfg.clone();
        changed.set("engine.auto_repeat_settle_ms", "500").unwrap();
        changed.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().engine.auto_repeat_settle_ms, 500);
    }

    #[test]
    fn timer_patch_carries_every_field() {
        let mut cfg = Config::default();
        cfg.timer.pre_alert_threshold_ms = Some(5_000);
        let patch = cfg.timer_patch();
        assert_eq!(patch.presets_ms.as_deref(), Some(cfg.timer.presets_ms.as_slice()));
        assert_eq!(patch.pre_alert_threshold_ms, Some(5_000));
        assert_eq!(patch.notifications, Some(true));
    }
}
