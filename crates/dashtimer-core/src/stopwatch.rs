//! Count-up stopwatch with laps and a session archive.
//!
//! Elapsed time follows the same wall-clock delta rule as the countdowns:
//! every tick adds `now - last_updated_at` and re-stamps. Saved sessions are
//! deep copies; nothing done to the live stopwatch afterwards reaches them.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::to_datetime;
use crate::context::EngineContext;
use crate::error::{CoreError, ValidationError};
use crate::events::Event;
use crate::format::format_precise;
use crate::scheduler::{TickScheduler, Tickable};
use crate::storage::{load_snapshot, save_snapshot};

pub const STOPWATCH_SNAPSHOT_KEY: &str = "stopwatch_engine";
pub const STOPWATCH_SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopwatchStatus {
    Idle,
    Running,
    Paused,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lap {
    pub id: Uuid,
    /// 1-based, contiguous within a session.
    pub lap_number: u32,
    /// Time since the previous lap (or since the start for the first lap).
    pub lap_time_ms: u64,
    /// Elapsed time when the lap was captured.
    pub total_time_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedSession {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub notes: String,
    pub duration_ms: u64,
    pub laps: Vec<Lap>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct StopwatchState {
    status: StopwatchStatus,
    elapsed_ms: u64,
    #[serde(default)]
    last_updated_at_ms: Option<u64>,
    #[serde(default)]
    laps: Vec<Lap>,
    #[serde(default)]
    saved_sessions: Vec<SavedSession>,
}

impl Default for StopwatchState {
    fn default() -> Self {
        Self {
            status: StopwatchStatus::Idle,
            elapsed_ms: 0,
            last_updated_at_ms: None,
            laps: Vec::new(),
            saved_sessions: Vec::new(),
        }
    }
}

/// Read view of the live stopwatch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopwatchView {
    pub status: StopwatchStatus,
    pub elapsed_ms: u64,
    pub display: String,
    pub laps: Vec<Lap>,
    pub fastest_lap: Option<Lap>,
    pub slowest_lap: Option<Lap>,
    pub average_lap_time_ms: u64,
    pub saved_session_count: usize,
}

#[derive(Debug)]
pub struct StopwatchEngine {
    ctx: EngineContext,
    state: StopwatchState,
    scheduler: TickScheduler,
    restored: bool,
}

impl StopwatchEngine {
    pub fn load(ctx: EngineContext) -> Self {
        let state = load_snapshot::<StopwatchState>(
            ctx.store.as_ref(),
            STOPWATCH_SNAPSHOT_KEY,
            STOPWATCH_SNAPSHOT_VERSION,
        )
        .unwrap_or_default();
        let mut scheduler = TickScheduler::new(ctx.timing.tick_interval_ms);
        if state.status == StopwatchStatus::Running {
            scheduler.arm();
        }
        Self {
            ctx,
            state,
            scheduler,
            restored: false,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn status(&self) -> StopwatchStatus {
        self.state.status
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.state.elapsed_ms
    }

    pub fn laps(&self) -> &[Lap] {
        &self.state.laps
    }

    pub fn saved_sessions(&self) -> &[SavedSession] {
        &self.state.saved_sessions
    }

    pub fn is_polling(&self) -> bool {
        self.scheduler.is_polling()
    }

    /// Lap with the smallest lap time. `None` with fewer than two laps.
    pub fn fastest_lap(&self) -> Option<&Lap> {
        if self.state.laps.len() < 2 {
            return None;
        }
        self.state.laps.iter().min_by_key(|lap| lap.lap_time_ms)
    }

    /// Lap with the largest lap time. `None` with fewer than two laps.
    pub fn slowest_lap(&self) -> Option<&Lap> {
        if self.state.laps.len() < 2 {
            return None;
        }
        self.state.laps.iter().max_by_key(|lap| lap.lap_time_ms)
    }

    /// Mean lap time rounded half-up to the millisecond; 0 without laps.
    pub fn average_lap_time_ms(&self) -> u64 {
        let count = self.state.laps.len() as u64;
        if count == 0 {
            return 0;
        }
        let sum: u64 = self.state.laps.iter().map(|lap| lap.lap_time_ms).sum();
        (sum + count / 2) / count
    }

    pub fn view(&self) -> StopwatchView {
        StopwatchView {
            status: self.state.status,
            elapsed_ms: self.state.elapsed_ms,
            display: format_precise(self.state.elapsed_ms),
            laps: self.state.laps.clone(),
            fastest_lap: self.fastest_lap().cloned(),
            slowest_lap: self.slowest_lap().cloned(),
            average_lap_time_ms: self.average_lap_time_ms(),
            saved_session_count: self.state.saved_sessions.len(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start from idle or continue from paused. No-op while running.
    pub fn start(&mut self) -> Vec<Event> {
        let now = self.ctx.now_ms();
        match self.state.status {
            StopwatchStatus::Running => {
                self.scheduler.arm();
                Vec::new()
            }
            StopwatchStatus::Idle | StopwatchStatus::Paused => {
                self.state.status = StopwatchStatus::Running;
                self.state.last_updated_at_ms = Some(now);
                self.scheduler.arm();
                self.persist();
                vec![Event::StopwatchStarted {
                    elapsed_ms: self.state.elapsed_ms,
                    at: to_datetime(now),
                }]
            }
        }
    }

    pub fn pause(&mut self) -> Vec<Event> {
        let now = self.ctx.now_ms();
        if self.state.status != StopwatchStatus::Running {
            return Vec::new();
        }
        self.flush(now);
        self.state.status = StopwatchStatus::Paused;
        self.state.last_updated_at_ms = None;
        self.scheduler.cancel();
        self.persist();
        vec![Event::StopwatchPaused {
            elapsed_ms: self.state.elapsed_ms,
            at: to_datetime(now),
        }]
    }

    pub fn resume(&mut self) -> Vec<Event> {
        let now = self.ctx.now_ms();
        if self.state.status != StopwatchStatus::Paused {
            return Vec::new();
        }
        self.state.status = StopwatchStatus::Running;
        self.state.last_updated_at_ms = Some(now);
        self.scheduler.arm();
        self.persist();
        vec![Event::StopwatchResumed {
            elapsed_ms: self.state.elapsed_ms,
            at: to_datetime(now),
        }]
    }

    /// Capture a lap. Only valid while running; otherwise nothing happens.
    pub fn record_lap(&mut self) -> Vec<Event> {
        let now = self.ctx.now_ms();
        if self.state.status != StopwatchStatus::Running {
            return Vec::new();
        }
        self.flush(now);
        let elapsed = self.state.elapsed_ms;
        let previous_total = self.state.laps.last().map_or(0, |lap| lap.total_time_ms);
        let lap = Lap {
            id: Uuid::new_v4(),
            lap_number: self.state.laps.len() as u32 + 1,
            lap_time_ms: elapsed.saturating_sub(previous_total),
            total_time_ms: elapsed,
        };
        tracing::debug!(lap = lap.lap_number, lap_time_ms = lap.lap_time_ms, "lap recorded");
        self.state.laps.push(lap.clone());
        self.persist();
        vec![Event::LapRecorded {
            lap,
            at: to_datetime(now),
        }]
    }

    /// Clear elapsed time and laps. The archive is left alone.
    pub fn reset_timer(&mut self) -> Vec<Event> {
        let now = self.ctx.now_ms();
        self.scheduler.cancel();
        self.state.status = StopwatchStatus::Idle;
        self.state.elapsed_ms = 0;
        self.state.last_updated_at_ms = None;
        self.state.laps.clear();
        self.persist();
        vec![Event::StopwatchReset {
            at: to_datetime(now),
        }]
    }

    /// Archive a deep copy of the current elapsed time and laps.
    ///
    /// A blank `name` becomes "Session N". The new entry is the last element
    /// of [`saved_sessions`](Self::saved_sessions).
    ///
    /// # Errors
    /// - [`ValidationError::NothingToSave`] when there is no elapsed time and
    ///   no lap.
    /// - [`CoreError::Store`] when the archive could not be written; the
    ///   archive is rolled back.
    pub fn save_current_session(&mut self, name: &str, notes: &str) -> Result<Vec<Event>, CoreError> {
        let now = self.ctx.now_ms();
        if self.state.status == StopwatchStatus::Running {
            self.flush(now);
        }
        if self.state.elapsed_ms == 0 && self.state.laps.is_empty() {
            return Err(ValidationError::NothingToSave.into());
        }

        let name = match name.trim() {
            "" => format!("Session {}", self.state.saved_sessions.len() + 1),
            trimmed => trimmed.to_string(),
        };
        let session = SavedSession {
            id: Uuid::new_v4(),
            name,
            notes: notes.trim().to_string(),
            duration_ms: self.state.elapsed_ms,
            laps: self.state.laps.clone(),
            created_at: to_datetime(now),
        };
        self.state.saved_sessions.push(session.clone());
        if let Err(e) = self.try_persist() {
            self.state.saved_sessions.pop();
            return Err(e.into());
        }
        tracing::info!(id = %session.id, duration_ms = session.duration_ms, "stopwatch session saved");
        Ok(vec![Event::SessionSaved {
            id: session.id,
            name: session.name,
            duration_ms: session.duration_ms,
            at: session.created_at,
        }])
    }

    /// Remove one archived session. Returns no events when the id is unknown.
    pub fn delete_saved_session(&mut self, id: Uuid) -> Vec<Event> {
        let before = self.state.saved_sessions.len();
        self.state.saved_sessions.retain(|s| s.id != id);
        if self.state.saved_sessions.len() == before {
            return Vec::new();
        }
        self.persist();
        vec![Event::SessionDeleted {
            id,
            at: to_datetime(self.ctx.now_ms()),
        }]
    }

    pub fn clear_history(&mut self) -> Vec<Event> {
        let removed = self.state.saved_sessions.len();
        self.state.saved_sessions.clear();
        self.persist();
        vec![Event::HistoryCleared {
            removed,
            at: to_datetime(self.ctx.now_ms()),
        }]
    }

    pub fn tick(&mut self) -> Vec<Event> {
        let now = self.ctx.now_ms();
        if self.state.status == StopwatchStatus::Running {
            self.flush(now);
            self.persist();
        }
        Vec::new()
    }

    /// Add the time elapsed while nothing was ticking. Runs once.
    pub fn restore(&mut self) -> Vec<Event> {
        if std::mem::replace(&mut self.restored, true) {
            return Vec::new();
        }
        let Some(last) = self.state.last_updated_at_ms else {
            return Vec::new();
        };
        if self.state.status != StopwatchStatus::Running {
            return Vec::new();
        }
        let now = self.ctx.now_ms();
        let gap_ms = now.saturating_sub(last);
        tracing::info!(gap_ms, elapsed_ms = self.state.elapsed_ms, "restoring running stopwatch");
        self.scheduler.arm();
        self.flush(now);
        self.persist();
        vec![Event::Restored {
            gap_ms,
            at: to_datetime(now),
        }]
    }

    pub fn shutdown(&mut self) {
        self.scheduler.cancel_all();
        self.persist();
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn flush(&mut self, now: u64) {
        if let Some(last) = self.state.last_updated_at_ms {
            let delta = now.saturating_sub(last);
            self.state.elapsed_ms = self.state.elapsed_ms.saturating_add(delta);
            self.state.last_updated_at_ms = Some(now.max(last));
        }
    }

    fn try_persist(&self) -> Result<(), crate::error::StoreError> {
        save_snapshot(
            self.ctx.store.as_ref(),
            STOPWATCH_SNAPSHOT_KEY,
            STOPWATCH_SNAPSHOT_VERSION,
            &self.state,
        )
    }

    fn persist(&self) {
        if let Err(e) = self.try_persist() {
            tracing::warn!(error = %e, "failed to persist stopwatch snapshot");
        }
    }
}

impl Tickable for StopwatchEngine {
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

    fn engine() -> (StopwatchEngine, ManualClock) {
        let clock = ManualClock::new(50_000);
        let ctx = EngineContext::new(
            Arc::new(clock.clone()),
            Arc::new(MemoryStore::new()),
            Arc::new(NoopDispatcher),
        );
        (StopwatchEngine::load(ctx), clock)
    }

    #[test]
    fn counts_up_across_ticks() {
        let (mut sw, clock) = engine();
        sw.start();
        clock.advance(200);
        sw.tick();
        clock.advance(350);
        sw.tick();
        assert_eq!(sw.elapsed_ms(), 550);
    }

    #[test]
    fn start_twice_is_noop() {
        let (mut sw, clock) = engine();
        assert_eq!(sw.start().len(), 1);
        clock.advance(100);
        assert!(sw.start().is_empty());
        clock.advance(100);
        sw.tick();
        assert_eq!(sw.elapsed_ms(), 200);
    }

    #[test]
    fn paused_time_is_not_counted() {
        let (mut sw, clock) = engine();
        sw.start();
        clock.advance(1_000);
        sw.pause();
        clock.advance(60_000);
        sw.tick();
        assert_eq!(sw.elapsed_ms(), 1_000);
        sw.resume();
        clock.advance(500);
        sw.tick();
        assert_eq!(sw.elapsed_ms(), 1_500);
    }

    #[test]
    fn delete_unknown_session_returns_no_events() {
        let (mut sw, clock) = engine();
        sw.start();
        clock.advance(1_000);
        sw.save_current_session("keep", "").unwrap();
        assert!(sw.delete_saved_session(Uuid::new_v4()).is_empty());
        assert_eq!(sw.saved_sessions().len(), 1);

        let id = sw.saved_sessions()[0].id;
        assert_eq!(sw.delete_saved_session(id).len(), 1);
        assert!(sw.saved_sessions().is_empty());
    }

    #[test]
    fn lap_requires_running() {
        let (mut sw, clock) = engine();
        assert!(sw.record_lap().is_empty());
        sw.start();
        clock.advance(1_000);
        sw.pause();
        assert!(sw.record_lap().is_empty());
        assert!(sw.laps().is_empty());
    }

    #[test]
    fn single_lap_has_no_fastest_or_slowest() {
        let (mut sw, clock) = engine();
        sw.start();
        clock.advance(3_000);
        sw.record_lap();
        assert_eq!(sw.laps().len(), 1);
        assert!(sw.fastest_lap().is_none());
        assert!(sw.slowest_lap().is_none());
        assert_eq!(sw.average_lap_time_ms(), 3_000);
    }

    #[test]
    fn average_of_no_laps_is_zero() {
        let (sw, _clock) = engine();
        assert_eq!(sw.average_lap_time_ms(), 0);
    }

    #[test]
    fn reset_keeps_archive() {
        let (mut sw, clock) = engine();
        sw.start();
        clock.advance(2_000);
        sw.save_current_session("warmup", "").unwrap();
        sw.reset_timer();
        assert_eq!(sw.elapsed_ms(), 0);
        assert_eq!(sw.status(), StopwatchStatus::Idle);
        assert_eq!(sw.saved_sessions().len(), 1);
    }

    #[test]
    fn blank_name_gets_numbered() {
        let (mut sw, clock) = engine();
        sw.start();
        clock.advance(10);
        sw.save_current_session("  ", "").unwrap();
        assert_eq!(sw.saved_sessions()[0].name, "Session 1");
    }

    #[test]
    fn delete_and_clear_history() {
        let (mut sw, clock) = engine();
        sw.start();
        clock.advance(10);
        sw.save_current_session("a", "").unwrap();
        sw.save_current_session("b", "").unwrap();
        let a = sw.saved_sessions()[0].clone();
        assert_eq!(sw.delete_saved_session(a.id).len(), 1);
        assert!(sw.delete_saved_session(a.id).is_empty());
        assert_eq!(sw.saved_sessions().len(), 1);
        assert!(matches!(
            sw.clear_history().as_slice(),
            [Event::HistoryCleared { removed: 1, .. }]
        ));
        assert!(sw.saved_sessions().is_empty());
        assert_eq!(sw.status(), StopwatchStatus::Running);
    }
}
