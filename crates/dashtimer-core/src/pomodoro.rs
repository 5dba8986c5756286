//! Pomodoro session engine.
//!
//! Built on the same [`Countdown`] primitive as the timer. Completion of a
//! phase never leaves the engine in a terminal state: it immediately moves
//! to the next phase, which either starts right away or waits idle
//! depending on `auto_start_break` / `auto_start_focus`.
//!
//! ```text
//! Focus -> ShortBreak -> Focus -> ... -> Focus -> LongBreak -> Focus
//!          (completed % long_break_interval != 0)  (== 0)
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::clock::to_datetime;
use crate::context::EngineContext;
use crate::error::ValidationError;
use crate::events::Event;
use crate::format::format_clock;
use crate::notify::{Notification, NotificationKind};
use crate::scheduler::{TickScheduler, Tickable};
use crate::storage::{load_snapshot, save_snapshot};
use crate::timer::{Countdown, CountdownStatus};

pub const POMODORO_SNAPSHOT_KEY: &str = "pomodoro_engine";
pub const POMODORO_SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Focus,
    ShortBreak,
    LongBreak,
}

impl SessionType {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionType::Focus => "focus",
            SessionType::ShortBreak => "short_break",
            SessionType::LongBreak => "long_break",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SessionType::Focus => "Focus",
            SessionType::ShortBreak => "Short Break",
            SessionType::LongBreak => "Long Break",
        }
    }

    pub fn is_break(self) -> bool {
        self != SessionType::Focus
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PomodoroStatus {
    Idle,
    Running,
    Paused,
}

impl From<CountdownStatus> for PomodoroStatus {
    fn from(status: CountdownStatus) -> Self {
        match status {
            CountdownStatus::Running => PomodoroStatus::Running,
            CountdownStatus::Paused => PomodoroStatus::Paused,
            CountdownStatus::Idle | CountdownStatus::Finished => PomodoroStatus::Idle,
        }
    }
}

/// Which break follows the `completed_focus_count`-th focus phase.
pub fn break_after(completed_focus_count: u32, long_break_interval: u32) -> SessionType {
    let interval = long_break_interval.max(1);
    if completed_focus_count > 0 && completed_focus_count % interval == 0 {
        SessionType::LongBreak
    } else {
        SessionType::ShortBreak
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PomodoroSettings {
    #[serde(default = "default_focus_min")]
    pub focus_min: u32,
    #[serde(default = "default_short_break_min")]
    pub short_break_min: u32,
    #[serde(default = "default_long_break_min")]
    pub long_break_min: u32,
    #[serde(default = "default_long_break_interval")]
    pub long_break_interval: u32,
    #[serde(default = "default_true")]
    pub auto_start_break: bool,
    #[serde(default)]
    pub auto_start_focus: bool,
    #[serde(default = "default_true")]
    pub notifications_enabled: bool,
    #[serde(default = "default_true")]
    pub sound_enabled: bool,
}

fn default_focus_min() -> u32 {
    25
}
fn default_short_break_min() -> u32 {
    5
}
fn default_long_break_min() -> u32 {
    15
}
fn default_long_break_interval() -> u32 {
    4
}
fn default_true() -> bool {
    true
}

impl Default for PomodoroSettings {
    fn default() -> Self {
        Self {
            focus_min: default_focus_min(),
            short_break_min: default_short_break_min(),
            long_break_min: default_long_break_min(),
            long_break_interval: default_long_break_interval(),
            auto_start_break: true,
            auto_start_focus: false,
            notifications_enabled: true,
            sound_enabled: true,
        }
    }
}

impl PomodoroSettings {
    pub fn duration_secs(&self, session_type: SessionType) -> u64 {
        let min = match session_type {
            SessionType::Focus => self.focus_min,
            SessionType::ShortBreak => self.short_break_min,
            SessionType::LongBreak => self.long_break_min,
        };
        u64::from(min.max(1)) * 60
    }

    fn duration_ms(&self, session_type: SessionType) -> u64 {
        self.duration_secs(session_type) * 1000
    }

    fn auto_start(&self, session_type: SessionType) -> bool {
        if session_type.is_break() {
            self.auto_start_break
        } else {
            self.auto_start_focus
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PomodoroSnapshot {
    #[serde(flatten)]
    countdown: Countdown,
    session_type: SessionType,
    completed_focus_count: u32,
    settings: PomodoroSettings,
}

/// Read view of the pomodoro engine, at second granularity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PomodoroView {
    pub status: PomodoroStatus,
    pub session_type: SessionType,
    pub remaining_seconds: u64,
    pub total_duration_seconds: u64,
    pub completed_focus_count: u32,
    pub display: String,
    pub progress: f64,
    pub settings: PomodoroSettings,
}

#[derive(Debug)]
pub struct PomodoroEngine {
    ctx: EngineContext,
    countdown: Countdown,
    session_type: SessionType,
    completed_focus_count: u32,
    settings: PomodoroSettings,
    scheduler: TickScheduler,
    restored: bool,
}

impl PomodoroEngine {
    /// Build from the persisted snapshot, or a fresh focus phase with `settings`.
    pub fn load(ctx: EngineContext, settings: PomodoroSettings) -> Self {
        let snapshot = load_snapshot::<PomodoroSnapshot>(
            ctx.store.as_ref(),
            POMODORO_SNAPSHOT_KEY,
            POMODORO_SNAPSHOT_VERSION,
        )
        .filter(|snapshot| {
            let consistent = snapshot.countdown.is_consistent();
            if !consistent {
                tracing::warn!("pomodoro snapshot is inconsistent, starting fresh");
            }
            consistent
        })
        .unwrap_or_else(|| PomodoroSnapshot {
            countdown: Countdown::new(settings.duration_ms(SessionType::Focus)),
            session_type: SessionType::Focus,
            completed_focus_count: 0,
            settings,
        });

        let mut scheduler = TickScheduler::new(ctx.timing.tick_interval_ms);
        if snapshot.countdown.is_running() {
            scheduler.arm();
        }
        Self {
            ctx,
            countdown: snapshot.countdown,
            session_type: snapshot.session_type,
            completed_focus_count: snapshot.completed_focus_count,
            settings: snapshot.settings,
            scheduler,
            restored: false,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn status(&self) -> PomodoroStatus {
        self.countdown.status().into()
    }

    pub fn session_type(&self) -> SessionType {
        self.session_type
    }

    pub fn completed_focus_count(&self) -> u32 {
        self.completed_focus_count
    }

    pub fn remaining_seconds(&self) -> u64 {
        self.countdown.remaining_ms().div_ceil(1000)
    }

    pub fn total_duration_seconds(&self) -> u64 {
        self.countdown.total_ms() / 1000
    }

    pub fn settings(&self) -> &PomodoroSettings {
        &self.settings
    }

    pub fn is_polling(&self) -> bool {
        self.scheduler.is_polling()
    }

    pub fn view(&self) -> PomodoroView {
        PomodoroView {
            status: self.status(),
            session_type: self.session_type,
            remaining_seconds: self.remaining_seconds(),
            total_duration_seconds: self.total_duration_seconds(),
            completed_focus_count: self.completed_focus_count,
            display: format_clock(self.countdown.remaining_ms()),
            progress: self.countdown.progress(),
            settings: self.settings.clone(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// # Errors
    /// [`ValidationError::InvalidDuration`] if the current phase has no length.
    pub fn start(&mut self) -> Result<Vec<Event>, ValidationError> {
        let now = self.ctx.now_ms();
        if self.countdown.is_running() {
            self.scheduler.arm();
            return Ok(Vec::new());
        }
        self.countdown.start(now)?;
        self.scheduler.arm();
        tracing::debug!(session_type = self.session_type.as_str(), "pomodoro phase started");
        let event = Event::PhaseStarted {
            session_type: self.session_type,
            duration_secs: self.total_duration_seconds(),
            auto_started: false,
            at: to_datetime(now),
        };
        self.persist();
        Ok(vec![event])
    }

    pub fn pause(&mut self) -> Vec<Event> {
        let now = self.ctx.now_ms();
        if !self.countdown.is_running() {
            return Vec::new();
        }
        let mut events = self.advance(now);
        if self.countdown.pause() {
            self.scheduler.cancel();
            events.push(Event::PhasePaused {
                session_type: self.session_type,
                remaining_secs: self.remaining_seconds(),
                at: to_datetime(now),
            });
            self.persist();
        }
        events
    }

    pub fn resume(&mut self) -> Vec<Event> {
        let now = self.ctx.now_ms();
        if !self.countdown.resume(now) {
            return Vec::new();
        }
        self.scheduler.arm();
        self.persist();
        vec![Event::PhaseResumed {
            session_type: self.session_type,
            remaining_secs: self.remaining_seconds(),
            at: to_datetime(now),
        }]
    }

    /// Rewind the current phase to its full length, idle.
    pub fn reset(&mut self) -> Vec<Event> {
        let now = self.ctx.now_ms();
        self.scheduler.cancel();
        self.countdown.reset();
        self.persist();
        vec![Event::PhaseReset {
            session_type: self.session_type,
            at: to_datetime(now),
        }]
    }

    /// Abandon the current phase. A skipped focus phase is not counted and
    /// is followed by a short break; the new phase waits idle.
    pub fn skip(&mut self) -> Vec<Event> {
        let now = self.ctx.now_ms();
        let from = self.session_type;
        let to = if from.is_break() {
            SessionType::Focus
        } else {
            SessionType::ShortBreak
        };
        let mut events = vec![Event::PhaseSkipped {
            from,
            to,
            at: to_datetime(now),
        }];
        events.push(self.enter_phase(to, now, false));
        self.persist();
        events
    }

    /// Back to the first focus phase with no completed pomodoros.
    pub fn reset_cycle(&mut self) -> Vec<Event> {
        let now = self.ctx.now_ms();
        self.completed_focus_count = 0;
        self.enter_phase(SessionType::Focus, now, false);
        self.persist();
        vec![Event::CycleReset {
            at: to_datetime(now),
        }]
    }

    /// Replace the settings. An idle phase picks up its new length at once;
    /// a running or paused one keeps its remaining time.
    pub fn update_settings(&mut self, settings: PomodoroSettings) {
        self.settings = settings;
        if self.status() == PomodoroStatus::Idle {
            self.countdown
                .set_duration(self.settings.duration_ms(self.session_type));
        }
        self.persist();
    }

    pub fn tick(&mut self) -> Vec<Event> {
        let now = self.ctx.now_ms();
        self.advance(now)
    }

    /// Close the gap since the last persisted update. At most one phase
    /// completes per restore; an auto-started follow-up phase begins now.
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
        tracing::info!(gap_ms, session_type = self.session_type.as_str(), "restoring running pomodoro");
        self.scheduler.arm();
        let mut events = vec![Event::Restored {
            gap_ms,
            at: to_datetime(now),
        }];
        events.extend(self.advance(now));
        events
    }

    pub fn shutdown(&mut self) {
        self.scheduler.cancel_all();
        self.persist();
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn advance(&mut self, now: u64) -> Vec<Event> {
        if !self.countdown.is_running() {
            return Vec::new();
        }
        let crossings = self.countdown.advance(now, None);
        if !crossings.finished {
            self.persist();
            return Vec::new();
        }

        let finished = self.session_type;
        let duration_secs = self.total_duration_seconds();
        let next = if finished.is_break() {
            SessionType::Focus
        } else {
            self.completed_focus_count += 1;
            break_after(self.completed_focus_count, self.settings.long_break_interval)
        };
        tracing::info!(
            finished = finished.as_str(),
            next = next.as_str(),
            completed_focus_count = self.completed_focus_count,
            "pomodoro phase complete"
        );

        let mut events = vec![Event::PhaseCompleted {
            session_type: finished,
            duration_secs,
            completed_focus_count: self.completed_focus_count,
            at: to_datetime(now),
        }];
        self.notify(finished, next);
        let auto = self.settings.auto_start(next);
        events.push(self.enter_phase(next, now, auto));
        self.persist();
        events
    }

    fn enter_phase(&mut self, next: SessionType, now: u64, auto_start: bool) -> Event {
        self.session_type = next;
        self.countdown.set_duration(self.settings.duration_ms(next));
        if auto_start && self.countdown.start(now).is_ok() {
            self.scheduler.arm();
            return Event::PhaseStarted {
                session_type: next,
                duration_secs: self.total_duration_seconds(),
                auto_started: true,
                at: to_datetime(now),
            };
        }
        self.scheduler.cancel();
        Event::PhaseReady {
            session_type: next,
            duration_secs: self.total_duration_seconds(),
            at: to_datetime(now),
        }
    }

    fn notify(&self, finished: SessionType, next: SessionType) {
        if !self.settings.notifications_enabled {
            return;
        }
        let title = if finished.is_break() {
            "Break over"
        } else {
            "Focus complete"
        };
        self.ctx.dispatch(Notification {
            kind: NotificationKind::Completion,
            title: title.to_string(),
            message: format!("Next up: {}", next.label()),
            sound: self.settings.sound_enabled,
        });
    }

    fn persist(&self) {
        let snapshot = PomodoroSnapshot {
            countdown: self.countdown.clone(),
            session_type: self.session_type,
            completed_focus_count: self.completed_focus_count,
            settings: self.settings.clone(),
        };
        if let Err(e) = save_snapshot(
            self.ctx.store.as_ref(),
            POMODORO_SNAPSHOT_KEY,
            POMODORO_SNAPSHOT_VERSION,
            &snapshot,
        ) {
            tracing::warn!(error = %e, "failed to persist pomodoro snapshot");
        }
    }
}

impl Tickable for PomodoroEngine {
    fn poll(&mut self) -> Vec<Event> {
        self.tick()
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

    fn engine(settings: PomodoroSettings) -> (PomodoroEngine, ManualClock) {
        let clock = ManualClock::new(0);
        let ctx = EngineContext::new(
            Arc::new(clock.clone()),
            Arc::new(MemoryStore::new()),
            Arc::new(NoopDispatcher),
        );
        (PomodoroEngine::load(ctx, settings), clock)
    }

    #[test]
    fn break_selection_follows_interval() {
        assert_eq!(break_after(1, 4), SessionType::ShortBreak);
        assert_eq!(break_after(3, 4), SessionType::ShortBreak);
        assert_eq!(break_after(4, 4), SessionType::LongBreak);
        assert_eq!(break_after(8, 4), SessionType::LongBreak);
        assert_eq!(break_after(0, 4), SessionType::ShortBreak);
        assert_eq!(break_after(5, 0), SessionType::LongBreak);
    }

    #[test]
    fn starts_on_focus_with_configured_length() {
        let (engine, _clock) = engine(PomodoroSettings::default());
        assert_eq!(engine.status(), PomodoroStatus::Idle);
        assert_eq!(engine.session_type(), SessionType::Focus);
        assert_eq!(engine.remaining_seconds(), 25 * 60);
    }

    #[test]
    fn focus_completion_auto_starts_break() {
        let (mut engine, clock) = engine(PomodoroSettings::default());
        engine.start().unwrap();
        clock.advance(25 * 60 * 1000);
        let events = engine.tick();
        assert!(matches!(
            events[0],
            Event::PhaseCompleted {
                session_type: SessionType::Focus,
                completed_focus_count: 1,
                ..
            }
        ));
        assert!(matches!(
            events[1],
            Event::PhaseStarted {
                session_type: SessionType::ShortBreak,
                auto_started: true,
                ..
            }
        ));
        assert_eq!(engine.status(), PomodoroStatus::Running);
        assert_eq!(engine.remaining_seconds(), 5 * 60);
    }

    #[test]
    fn break_completion_waits_for_user_when_auto_focus_off() {
        let (mut engine, clock) = engine(PomodoroSettings::default());
        engine.start().unwrap();
        clock.advance(25 * 60 * 1000);
        engine.tick();
        clock.advance(5 * 60 * 1000);
        let events = engine.tick();
        assert!(matches!(
            events.last(),
            Some(Event::PhaseReady {
                session_type: SessionType::Focus,
                ..
            })
        ));
        assert_eq!(engine.status(), PomodoroStatus::Idle);
        assert!(!engine.is_polling());
    }

    #[test]
    fn skip_does_not_count_focus() {
        let (mut engine, _clock) = engine(PomodoroSettings::default());
        engine.start().unwrap();
        engine.skip();
        assert_eq!(engine.session_type(), SessionType::ShortBreak);
        assert_eq!(engine.completed_focus_count(), 0);
        assert_eq!(engine.status(), PomodoroStatus::Idle);
        engine.skip();
        assert_eq!(engine.session_type(), SessionType::Focus);
    }

    #[test]
    fn pause_keeps_remaining_seconds() {
        let (mut engine, clock) = engine(PomodoroSettings::default());
        engine.start().unwrap();
        clock.advance(60_500);
        engine.pause();
        assert_eq!(engine.status(), PomodoroStatus::Paused);
        assert_eq!(engine.remaining_seconds(), 24 * 60);
        clock.advance(600_000);
        engine.resume();
        assert_eq!(engine.remaining_seconds(), 24 * 60);
    }

    #[test]
    fn update_settings_applies_to_idle_phase_only() {
        let (mut engine, clock) = engine(PomodoroSettings::default());
        let mut longer = PomodoroSettings::default();
        longer.focus_min = 50;
        engine.update_settings(longer.clone());
        assert_eq!(engine.total_duration_seconds(), 50 * 60);

        engine.start().unwrap();
        clock.advance(1_000);
        longer.focus_min = 10;
        engine.update_settings(longer);
        assert_eq!(engine.total_duration_seconds(), 50 * 60);
    }

    #[test]
    fn reset_cycle_clears_count() {
        let (mut engine, clock) = engine(PomodoroSettings::default());
        engine.start().unwrap();
        clock.advance(25 * 60 * 1000);
        engine.tick();
        assert_eq!(engine.completed_focus_count(), 1);
        engine.reset_cycle();
        assert_eq!(engine.completed_focus_count(), 0);
        assert_eq!(engine.session_type(), SessionType::Focus);
        assert_eq!(engine.status(), PomodoroStatus::Idle);
    }
}
