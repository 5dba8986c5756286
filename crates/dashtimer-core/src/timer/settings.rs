use serde::{Deserialize, Serialize};

/// Live settings of the countdown engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSettings {
    /// Selectable durations in display order, no duplicates.
    #[serde(default = "default_presets_ms")]
    pub presets_ms: Vec<u64>,
    #[serde(default)]
    pub auto_repeat: bool,
    #[serde(default)]
    pub pre_alert_threshold_ms: Option<u64>,
    #[serde(default = "default_true")]
    pub notifications_enabled: bool,
    #[serde(default = "default_true")]
    pub sound_enabled: bool,
}

fn default_presets_ms() -> Vec<u64> {
    [1, 3, 5, 10, 15, 30]
        .into_iter()
        .map(|min| min * 60_000)
        .collect()
}
fn default_true() -> bool {
    true
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            presets_ms: default_presets_ms(),
            auto_repeat: false,
            pre_alert_threshold_ms: None,
            notifications_enabled: true,
            sound_enabled: true,
        }
    }
}

impl TimerSettings {
    /// Duration a fresh engine starts with.
    pub fn default_duration_ms(&self) -> u64 {
        self.presets_ms.first().copied().unwrap_or(0)
    }
}

/// A partial settings push from an external source.
///
/// `None` leaves a field alone. An empty preset list is treated as absent,
/// and a pre-alert threshold of `0` clears the threshold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsPatch {
    #[serde(default)]
    pub presets_ms: Option<Vec<u64>>,
    #[serde(default)]
    pub auto_repeat: Option<bool>,
    #[serde(default)]
    pub pre_alert_threshold_ms: Option<u64>,
    #[serde(default)]
    pub notifications: Option<bool>,
    #[serde(default)]
    pub sound_enabled: Option<bool>,
}

impl TimerSettings {
    /// Merge `patch` into these settings. Returns the new preset list when
    /// the presets were replaced.
    pub fn merge(&mut self, patch: &SettingsPatch) -> Option<&[u64]> {
        let mut presets_changed = false;
        if let Some(presets) = &patch.presets_ms {
            let cleaned = normalize_presets(presets);
            if !cleaned.is_empty() {
                presets_changed = cleaned != self.presets_ms;
                self.presets_ms = cleaned;
            }
        }
        if let Some(auto_repeat) = patch.auto_repeat {
            self.auto_repeat = auto_repeat;
        }
        if let Some(threshold) = patch.pre_alert_threshold_ms {
            self.pre_alert_threshold_ms = (threshold > 0).then_some(threshold);
        }
        if let Some(enabled) = patch.notifications {
            self.notifications_enabled = enabled;
        }
        if let Some(enabled) = patch.sound_enabled {
            self.sound_enabled = enabled;
        }
        presets_changed.then_some(self.presets_ms.as_slice())
    }
}

/// Drop zero durations and repeats, keeping first-seen order.
fn normalize_presets(presets: &[u64]) -> Vec<u64> {
    let mut out: Vec<u64> = Vec::with_capacity(presets.len());
    for &p in presets {
        if p > 0 && !out.contains(&p) {
            out.push(p);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_only_touches_present_fields() {
        let mut s = TimerSettings::default();
        let changed = s.merge(&SettingsPatch {
            auto_repeat: Some(true),
            ..Default::default()
        });
        assert!(changed.is_none());
        assert!(s.auto_repeat);
        assert_eq!(s.presets_ms, default_presets_ms());
        assert!(s.notifications_enabled);
    }

    #[test]
    fn empty_presets_are_ignored() {
        let mut s = TimerSettings::default();
        let changed = s.merge(&SettingsPatch {
            presets_ms: Some(vec![0, 0]),
            ..Default::default()
        });
        assert!(changed.is_none());
        assert_eq!(s.presets_ms, default_presets_ms());
    }

    #[test]
    fn presets_are_deduplicated_in_order() {
        let mut s = TimerSettings::default();
        let changed = s
            .merge(&SettingsPatch {
                presets_ms: Some(vec![90_000, 30_000, 90_000]),
                ..Default::default()
            })
            .map(<[u64]>::to_vec);
        assert_eq!(changed, Some(vec![90_000, 30_000]));
        assert_eq!(s.default_duration_ms(), 90_000);
    }

    #[test]
    fn zero_threshold_clears() {
        let mut s = TimerSettings::default();
        s.merge(&SettingsPatch {
            pre_alert_threshold_ms: Some(10_000),
            ..Default::default()
        });
        assert_eq!(s.pre_alert_threshold_ms, Some(10_000));
        s.merge(&SettingsPatch {
            pre_alert_threshold_ms: Some(0),
            ..Default::default()
        });
        assert_eq!(s.pre_alert_threshold_ms, None);
    }
}
