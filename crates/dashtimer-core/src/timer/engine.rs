//! Countdown timer engine.
//!
//! A wall-clock-based state machine. It does not use internal threads - the
//! caller (normally [`run_ticker`](crate::scheduler::run_ticker)) is
//! responsible for calling `tick()` while the engine holds a polling handle.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running -> (Paused -> Running)* -> Finished -> [settle] -> Running (auto-repeat)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::load(ctx);
//! engine.restore();
//! engine.start()?;
//! // In a loop:
//! engine.tick(); // Returns events as thresholds are crossed
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::countdown::{Countdown, CountdownStatus};
use super::settings::{SettingsPatch, TimerSettings};
use crate::clock::to_datetime;
use crate::context::EngineContext;
use crate::error::ValidationError;
use crate::events::Event;
use crate::format::format_clock;
use crate::notify::{Notification, NotificationKind};
use crate::scheduler::{DeferredKind, TickScheduler, Tickable};
use crate::storage::{load_snapshot, save_snapshot};

pub const TIMER_SNAPSHOT_KEY: &str = "timer_engine";
pub const TIMER_SNAPSHOT_VERSION: u32 = 1;

pub type TimerStatus = CountdownStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TimerSnapshot {
    #[serde(flatten)]
    countdown: Countdown,
    settings: TimerSettings,
}

/// Read view of the timer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimerView {
    pub status: TimerStatus,
    pub total_duration_ms: u64,
    pub remaining_ms: u64,
    pub display: String,
    pub progress: f64,
    pub pre_alert_fired: bool,
    pub auto_repeat_pending: bool,
    pub settings: TimerSettings,
}

/// Single countdown with presets, pre-alert and auto-repeat.
#[derive(Debug)]
pub struct TimerEngine {
    ctx: EngineContext,
    countdown: Countdown,
    settings: TimerSettings,
    scheduler: TickScheduler,
    restored: bool,
}

impl TimerEngine {
    /// Build the engine from its persisted snapshot, or defaults on first run.
    ///
    /// A snapshot that was running re-arms polling; call
    /// [`TimerEngine::restore`] next to account for the time spent offline.
    pub fn load(ctx: EngineContext) -> Self {
        let (countdown, settings) = match load_snapshot::<TimerSnapshot>(
            ctx.store.as_ref(),
            TIMER_SNAPSHOT_KEY,
            TIMER_SNAPSHOT_VERSION,
        )
        .filter(|snapshot| {
            let consistent = snapshot.countdown.is_consistent();
            if !consistent {
                tracing::warn!("timer snapshot is inconsistent, starting fresh");
            }
            consistent
        }) {
            Some(snapshot) => (snapshot.countdown, snapshot.settings),
            None => {
                let settings = TimerSettings::default();
                (Countdown::new(settings.default_duration_ms()), settings)
            }
        };
        let mut scheduler = TickScheduler::new(ctx.timing.tick_interval_ms);
        if countdown.is_running() {
            scheduler.arm();
        }
        Self {
            ctx,
            countdown,
            settings,
            scheduler,
            restored: false,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn status(&self) -> TimerStatus {
        self.countdown.status()
    }

    pub fn remaining_ms(&self) -> u64 {
        self.countdown.remaining_ms()
    }

    pub fn total_ms(&self) -> u64 {
        self.countdown.total_ms()
    }

    pub fn settings(&self) -> &TimerSettings {
        &self.settings
    }

    pub fn is_polling(&self) -> bool {
        self.scheduler.is_polling()
    }

    pub fn auto_repeat_pending(&self) -> bool {
        self.scheduler.pending().is_some()
    }

    pub fn view(&self) -> TimerView {
        TimerView {
            status: self.status(),
            total_duration_ms: self.total_ms(),
            remaining_ms: self.remaining_ms(),
            display: format_clock(self.remaining_ms()),
            progress: self.countdown.progress(),
            pre_alert_fired: self.countdown.pre_alert_fired(),
            auto_repeat_pending: self.auto_repeat_pending(),
            settings: self.settings.clone(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start counting down. A second call while running is a no-op.
    ///
    /// # Errors
    /// [`ValidationError::InvalidDuration`] when no duration is selected.
    pub fn start(&mut self) -> Result<Vec<Event>, ValidationError> {
        let now = self.ctx.now_ms();
        let mut events = self.cancel_auto_repeat(now);
        if self.countdown.is_running() {
            self.scheduler.arm();
            return Ok(events);
        }
        self.countdown.start(now)?;
        self.scheduler.arm();
        tracing::debug!(remaining_ms = self.remaining_ms(), "timer started");
        events.push(Event::TimerStarted {
            duration_ms: self.total_ms(),
            remaining_ms: self.remaining_ms(),
            auto_repeat: false,
            at: to_datetime(now),
        });
        self.persist();
        Ok(events)
    }

    pub fn pause(&mut self) -> Vec<Event> {
        let now = self.ctx.now_ms();
        let mut events = self.cancel_auto_repeat(now);
        if !self.countdown.is_running() {
            return events;
        }
        // Flush elapsed time first; this may finish the run, but a pause
        // never schedules a restart.
        events.extend(self.advance(now, false));
        if self.countdown.pause() {
            self.scheduler.cancel();
            events.push(Event::TimerPaused {
                remaining_ms: self.remaining_ms(),
                at: to_datetime(now),
            });
            self.persist();
        }
        events
    }

    pub fn resume(&mut self) -> Vec<Event> {
        let now = self.ctx.now_ms();
        let mut events = self.cancel_auto_repeat(now);
        if self.countdown.resume(now) {
            self.scheduler.arm();
            events.push(Event::TimerResumed {
                remaining_ms: self.remaining_ms(),
                at: to_datetime(now),
            });
            self.persist();
        }
        events
    }

    pub fn reset(&mut self) -> Vec<Event> {
        let now = self.ctx.now_ms();
        let mut events = self.cancel_auto_repeat(now);
        self.scheduler.cancel();
        self.countdown.reset();
        events.push(Event::TimerReset {
            remaining_ms: self.remaining_ms(),
            at: to_datetime(now),
        });
        self.persist();
        events
    }

    /// Select a preset. Always drops back to idle; the duration is clamped
    /// up to the configured floor.
    pub fn set_preset(&mut self, duration_ms: u64) -> Vec<Event> {
        let now = self.ctx.now_ms();
        let mut events = self.cancel_auto_repeat(now);
        events.push(self.select_duration(duration_ms.max(self.ctx.timing.min_duration_ms), now));
        self.persist();
        events
    }

    /// # Errors
    /// [`ValidationError::InvalidDuration`] for a zero duration; nothing changes.
    pub fn set_custom_duration(&mut self, duration_ms: u64) -> Result<Vec<Event>, ValidationError> {
        if duration_ms == 0 {
            return Err(ValidationError::InvalidDuration);
        }
        Ok(self.set_preset(duration_ms))
    }

    /// Merge an external settings push. Status and remaining time are kept
    /// unless the engine is idle, in which case the first preset becomes the
    /// selected duration.
    ///
    /// A changed pre-alert threshold is not evaluated until the next tick.
    /// Turning auto-repeat off drops a restart that is still settling.
    pub fn hydrate_settings(&mut self, patch: &SettingsPatch) -> Vec<Event> {
        let presets_changed = self.settings.merge(patch).is_some();
        let mut events = Vec::new();
        if !self.settings.auto_repeat {
            let now = self.ctx.now_ms();
            events.extend(self.cancel_auto_repeat(now));
        }
        if presets_changed && self.status() == CountdownStatus::Idle {
            let now = self.ctx.now_ms();
            let first = self
                .settings
                .default_duration_ms()
                .max(self.ctx.timing.min_duration_ms);
            if first != self.total_ms() {
                events.push(self.select_duration(first, now));
            }
        }
        self.persist();
        events
    }

    /// Advance the running countdown by the wall-clock delta since the last
    /// update, firing pre-alert and completion at most once per run.
    pub fn tick(&mut self) -> Vec<Event> {
        let now = self.ctx.now_ms();
        self.advance(now, true)
    }

    /// Close the gap left while nothing was ticking (process exit, sleep).
    ///
    /// Runs once per engine instance; later calls are no-ops.
    pub fn restore(&mut self) -> Vec<Event> {
        if std::mem::replace(&mut self.restored, true) {
            return Vec::new();
        }
        let Some(last) = self.countdown.last_updated_at_ms() else {
            return Vec::new();
        };
        if !self.countdown.is_running() {
            return Vec::new();
        }

        let now = self.ctx.now_ms();
        let gap_ms = now.saturating_sub(last);
        tracing::info!(gap_ms, remaining_ms = self.remaining_ms(), "restoring running timer");
        self.scheduler.arm();
        let mut events = vec![Event::Restored {
            gap_ms,
            at: to_datetime(now),
        }];
        events.extend(self.advance(now, true));
        events
    }

    /// Cancel every handle and write a final snapshot.
    pub fn shutdown(&mut self) {
        self.scheduler.cancel_all();
        self.persist();
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// `allow_repeat` is false when a manual command flushes the countdown.
    fn advance(&mut self, now: u64, allow_repeat: bool) -> Vec<Event> {
        if !self.countdown.is_running() {
            return Vec::new();
        }
        let crossings = self
            .countdown
            .advance(now, self.settings.pre_alert_threshold_ms);
        let mut events = Vec::new();

        if crossings.pre_alert {
            let threshold_ms = self.settings.pre_alert_threshold_ms.unwrap_or_default();
            tracing::debug!(remaining_ms = self.remaining_ms(), threshold_ms, "pre-alert");
            events.push(Event::PreAlert {
                remaining_ms: self.remaining_ms(),
                threshold_ms,
                at: to_datetime(now),
            });
            self.notify(
                NotificationKind::PreAlert,
                format!("{} remaining", format_clock(self.remaining_ms())),
            );
        }

        if crossings.finished {
            self.scheduler.cancel();
            tracing::info!(duration_ms = self.total_ms(), "timer finished");
            events.push(Event::TimerCompleted {
                duration_ms: self.total_ms(),
                at: to_datetime(now),
            });
            self.notify(NotificationKind::Completion, "Time is up".to_string());

            if allow_repeat && self.settings.auto_repeat && self.total_ms() > 0 {
                let action = self.scheduler.defer(
                    DeferredKind::AutoRepeat,
                    now,
                    self.ctx.timing.auto_repeat_settle_ms,
                );
                events.push(Event::AutoRepeatScheduled {
                    due_at: to_datetime(action.due_at_ms),
                });
            }
        }

        self.persist();
        events
    }

    fn run_due(&mut self, now: u64) -> Vec<Event> {
        let Some(action) = self.scheduler.take_due(now) else {
            return Vec::new();
        };
        match action.kind {
            DeferredKind::AutoRepeat => self.auto_restart(now),
        }
    }

    fn auto_restart(&mut self, now: u64) -> Vec<Event> {
        self.countdown.reset();
        match self.countdown.start(now) {
            Ok(_) => {
                self.scheduler.arm();
                tracing::debug!(duration_ms = self.total_ms(), "auto-repeat restart");
                self.persist();
                vec![Event::TimerStarted {
                    duration_ms: self.total_ms(),
                    remaining_ms: self.remaining_ms(),
                    auto_repeat: true,
                    at: to_datetime(now),
                }]
            }
            Err(_) => {
                tracing::debug!("auto-repeat skipped, no duration");
                self.persist();
                Vec::new()
            }
        }
    }

    fn cancel_auto_repeat(&mut self, now: u64) -> Vec<Event> {
        match self.scheduler.cancel_deferred() {
            Some(_) => {
                tracing::debug!("pending auto-repeat cancelled");
                vec![Event::AutoRepeatCancelled {
                    at: to_datetime(now),
                }]
            }
            None => Vec::new(),
        }
    }

    fn select_duration(&mut self, duration_ms: u64, now: u64) -> Event {
        self.scheduler.cancel();
        self.countdown.set_duration(duration_ms);
        Event::DurationSelected {
            duration_ms,
            at: to_datetime(now),
        }
    }

    fn notify(&self, kind: NotificationKind, message: String) {
        if !self.settings.notifications_enabled {
            return;
        }
        self.ctx.dispatch(Notification {
            kind,
            title: "Timer".to_string(),
            message,
            sound: self.settings.sound_enabled,
        });
    }

    fn persist(&self) {
        let snapshot = TimerSnapshot {
            countdown: self.countdown.clone(),
            settings: self.settings.clone(),
        };
        if let Err(e) = save_snapshot(
            self.ctx.store.as_ref(),
            TIMER_SNAPSHOT_KEY,
            TIMER_SNAPSHOT_VERSION,
            &snapshot,
        ) {
            tracing::warn!(error = %e, "failed to persist timer snapshot");
        }
    }
}

impl Tickable for TimerEngine {
    fn poll(&mut self) -> Vec<Event> {
        let now = self.ctx.now_ms();
        let mut events = self.run_due(now);
        events.extend(self.advance(now, true));
        events
    }

    fn wants_poll(&self) -> bool {
        self.scheduler.wants_poll()
    }

    fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.scheduler.interval_ms())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::notify::NoopDispatcher;
    use crate::storage::MemoryStore;
    use std::sync::Arc;

    fn engine() -> (TimerEngine, ManualClock) {
        let clock = ManualClock::new(1_000_000);
        let ctx = EngineContext::new(
            Arc::new(clock.clone()),
            Arc::new(MemoryStore::new()),
            Arc::new(NoopDispatcher),
        );
        (TimerEngine::load(ctx), clock)
    }

    #[test]
    fn start_pause_resume() {
        let (mut engine, clock) = engine();
        assert_eq!(engine.status(), TimerStatus::Idle);
        assert_eq!(engine.total_ms(), 60_000);

        assert!(!engine.start().unwrap().is_empty());
        assert_eq!(engine.status(), TimerStatus::Running);
        assert!(engine.is_polling());

        clock.advance(1_500);
        assert!(!engine.pause().is_empty());
        assert_eq!(engine.status(), TimerStatus::Paused);
        assert_eq!(engine.remaining_ms(), 58_500);
        assert!(!engine.is_polling());

        clock.advance(30_000);
        assert!(!engine.resume().is_empty());
        assert_eq!(engine.status(), TimerStatus::Running);
        assert_eq!(engine.remaining_ms(), 58_500);
    }

    #[test]
    fn second_start_is_noop() {
        let (mut engine, clock) = engine();
        engine.start().unwrap();
        clock.advance(200);
        assert!(engine.start().unwrap().is_empty());
        assert_eq!(engine.remaining_ms(), 60_000);
    }

    #[test]
    fn commands_outside_their_state_are_noops() {
        let (mut engine, _clock) = engine();
        assert!(engine.pause().is_empty());
        assert!(engine.resume().is_empty());
        assert!(engine.tick().is_empty());
        assert_eq!(engine.status(), TimerStatus::Idle);
    }

    #[test]
    fn preset_is_clamped_to_floor_and_forces_idle() {
        let (mut engine, _clock) = engine();
        engine.start().unwrap();
        engine.set_preset(10);
        assert_eq!(engine.status(), TimerStatus::Idle);
        assert_eq!(engine.total_ms(), 1_000);
        assert_eq!(engine.remaining_ms(), 1_000);
        assert!(!engine.is_polling());
    }

    #[test]
    fn zero_custom_duration_is_rejected() {
        let (mut engine, _clock) = engine();
        engine.set_custom_duration(90_000).unwrap();
        assert_eq!(
            engine.set_custom_duration(0),
            Err(ValidationError::InvalidDuration)
        );
        assert_eq!(engine.total_ms(), 90_000);
    }

    #[test]
    fn reset_restores_full_duration() {
        let (mut engine, clock) = engine();
        engine.start().unwrap();
        clock.advance(10_000);
        engine.tick();
        engine.reset();
        assert_eq!(engine.status(), TimerStatus::Idle);
        assert_eq!(engine.remaining_ms(), 60_000);
        assert!(!engine.view().pre_alert_fired);
    }

    #[test]
    fn hydrate_while_idle_selects_first_preset() {
        let (mut engine, _clock) = engine();
        engine.hydrate_settings(&SettingsPatch {
            presets_ms: Some(vec![120_000, 60_000]),
            ..Default::default()
        });
        assert_eq!(engine.total_ms(), 120_000);
    }

    #[test]
    fn hydrate_while_running_keeps_progress() {
        let (mut engine, clock) = engine();
        engine.start().unwrap();
        clock.advance(5_000);
        engine.tick();
        engine.hydrate_settings(&SettingsPatch {
            presets_ms: Some(vec![120_000]),
            auto_repeat: Some(true),
            ..Default::default()
        });
        assert_eq!(engine.status(), TimerStatus::Running);
        assert_eq!(engine.remaining_ms(), 55_000);
        assert!(engine.settings().auto_repeat);
    }

    #[test]
    fn view_formats_remaining() {
        let (engine, _clock) = engine();
        let view = engine.view();
        assert_eq!(view.display, "01:00");
        assert_eq!(view.progress, 0.0);
    }
}
