//! Drift-corrected countdown primitive shared by the timer and pomodoro engines.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running -> (Paused -> Running)* -> Finished
//!   ^__________ reset / set_duration __________|
//! ```
//!
//! `remaining_ms` only changes in [`Countdown::advance`], which subtracts the
//! wall-clock delta since the last stamp. Missed or late ticks therefore cost
//! nothing: the next advance covers the whole gap.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CountdownStatus {
    Idle,
    Running,
    Paused,
    Finished,
}

/// Threshold crossings observed by one [`Countdown::advance`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Crossings {
    pub pre_alert: bool,
    pub finished: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Countdown {
    status: CountdownStatus,
    total_duration_ms: u64,
    remaining_ms: u64,
    /// Set only while running.
    #[serde(default)]
    last_updated_at_ms: Option<u64>,
    #[serde(default)]
    pre_alert_fired: bool,
}

impl Countdown {
    pub fn new(total_ms: u64) -> Self {
        Self {
            status: CountdownStatus::Idle,
            total_duration_ms: total_ms,
            remaining_ms: total_ms,
            last_updated_at_ms: None,
            pre_alert_fired: false,
        }
    }

    pub fn status(&self) -> CountdownStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == CountdownStatus::Running
    }

    pub fn total_ms(&self) -> u64 {
        self.total_duration_ms
    }

    pub fn remaining_ms(&self) -> u64 {
        self.remaining_ms
    }

    pub fn last_updated_at_ms(&self) -> Option<u64> {
        self.last_updated_at_ms
    }

    pub fn pre_alert_fired(&self) -> bool {
        self.pre_alert_fired
    }

    /// Whether a deserialized countdown obeys its own invariants: the
    /// remainder fits the duration and only a running countdown has a stamp.
    pub fn is_consistent(&self) -> bool {
        self.remaining_ms <= self.total_duration_ms
            && self.is_running() == self.last_updated_at_ms.is_some()
    }

    /// 0.0 .. 1.0 progress through the current duration.
    pub fn progress(&self) -> f64 {
        if self.total_duration_ms == 0 {
            return 0.0;
        }
        1.0 - (self.remaining_ms as f64 / self.total_duration_ms as f64)
    }

    /// Begin counting. Returns `Ok(false)` when already running.
    ///
    /// A nonzero remainder is resumed; otherwise the full duration is used.
    ///
    /// # Errors
    /// [`ValidationError::InvalidDuration`] when there is nothing to count
    /// down; the countdown is left untouched.
    pub fn start(&mut self, now_ms: u64) -> Result<bool, ValidationError> {
        if self.is_running() {
            return Ok(false);
        }
        let remaining = if self.remaining_ms > 0 {
            self.remaining_ms
        } else {
            self.total_duration_ms
        };
        if remaining == 0 {
            return Err(ValidationError::InvalidDuration);
        }
        self.remaining_ms = remaining;
        self.status = CountdownStatus::Running;
        self.last_updated_at_ms = Some(now_ms);
        self.pre_alert_fired = false;
        Ok(true)
    }

    /// Stop counting without losing the remainder. Callers flush with
    /// [`Countdown::advance`] first.
    pub fn pause(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.status = CountdownStatus::Paused;
        self.last_updated_at_ms = None;
        true
    }

    pub fn resume(&mut self, now_ms: u64) -> bool {
        if self.status != CountdownStatus::Paused || self.remaining_ms == 0 {
            return false;
        }
        self.status = CountdownStatus::Running;
        self.last_updated_at_ms = Some(now_ms);
        true
    }

    pub fn reset(&mut self) {
        self.status = CountdownStatus::Idle;
        self.remaining_ms = self.total_duration_ms;
        self.last_updated_at_ms = None;
        self.pre_alert_fired = false;
    }

    pub fn set_duration(&mut self, total_ms: u64) {
        self.total_duration_ms = total_ms;
        self.reset();
    }

    /// Apply the wall-clock delta since the last stamp.
    ///
    /// The pre-alert crossing is reported once per run: only while unfired
    /// and with `0 < remaining <= threshold`. A jump straight to zero reports
    /// completion only.
    pub fn advance(&mut self, now_ms: u64, pre_alert_threshold_ms: Option<u64>) -> Crossings {
        let mut crossings = Crossings::default();
        if !self.is_running() {
            return crossings;
        }

        let last = self.last_updated_at_ms.unwrap_or(now_ms);
        let delta = now_ms.saturating_sub(last);
        let next = self.remaining_ms.saturating_sub(delta);

        if let Some(threshold) = pre_alert_threshold_ms {
            if !self.pre_alert_fired && next > 0 && next <= threshold {
                self.pre_alert_fired = true;
                crossings.pre_alert = true;
            }
        }

        self.remaining_ms = next;
        if next == 0 {
            self.status = CountdownStatus::Finished;
            self.last_updated_at_ms = None;
            crossings.finished = true;
        } else {
            self.last_updated_at_ms = Some(now_ms.max(last));
        }
        crossings
    }
}
