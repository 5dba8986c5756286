use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pomodoro::SessionType;
use crate::stopwatch::Lap;

/// Every state change in an engine produces an Event.
/// Returned from each command and tick; this is the in-app notification path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        duration_ms: u64,
        remaining_ms: u64,
        /// True when the start came from an auto-repeat restart.
        auto_repeat: bool,
        at: DateTime<Utc>,
    },
    TimerPaused {
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    TimerResumed {
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    TimerReset {
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    DurationSelected {
        duration_ms: u64,
        at: DateTime<Utc>,
    },
    PreAlert {
        remaining_ms: u64,
        threshold_ms: u64,
        at: DateTime<Utc>,
    },
    TimerCompleted {
        duration_ms: u64,
        at: DateTime<Utc>,
    },
    AutoRepeatScheduled {
        due_at: DateTime<Utc>,
    },
    /// A pending auto-repeat was dropped because the user acted first.
    AutoRepeatCancelled {
        at: DateTime<Utc>,
    },
    PhaseStarted {
        session_type: SessionType,
        duration_secs: u64,
        auto_started: bool,
        at: DateTime<Utc>,
    },
    PhasePaused {
        session_type: SessionType,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    PhaseResumed {
        session_type: SessionType,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    PhaseCompleted {
        session_type: SessionType,
        duration_secs: u64,
        completed_focus_count: u32,
        at: DateTime<Utc>,
    },
    /// The engine moved to a new phase that is waiting for the user.
    PhaseReady {
        session_type: SessionType,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    PhaseSkipped {
        from: SessionType,
        to: SessionType,
        at: DateTime<Utc>,
    },
    PhaseReset {
        session_type: SessionType,
        at: DateTime<Utc>,
    },
    CycleReset {
        at: DateTime<Utc>,
    },
    StopwatchStarted {
        elapsed_ms: u64,
        at: DateTime<Utc>,
    },
    StopwatchPaused {
        elapsed_ms: u64,
        at: DateTime<Utc>,
    },
    StopwatchResumed {
        elapsed_ms: u64,
        at: DateTime<Utc>,
    },
    StopwatchReset {
        at: DateTime<Utc>,
    },
    LapRecorded {
        lap: Lap,
        at: DateTime<Utc>,
    },
    SessionSaved {
        id: Uuid,
        name: String,
        duration_ms: u64,
        at: DateTime<Utc>,
    },
    SessionDeleted {
        id: Uuid,
        at: DateTime<Utc>,
    },
    HistoryCleared {
        removed: usize,
        at: DateTime<Utc>,
    },
    /// Restore closed a gap left while no ticker was running.
    Restored {
        gap_ms: u64,
        at: DateTime<Utc>,
    },
}
