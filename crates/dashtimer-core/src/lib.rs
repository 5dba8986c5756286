//! # Dashtimer Core Library
//!
//! Core logic for the dashtimer suite: a countdown timer, a Pomodoro cycle
//! and a lap stopwatch. All three are wall-clock driven state machines that
//! survive process restarts by persisting a snapshot after every change.
//!
//! ## Architecture
//!
//! - **Engines**: Each engine holds its state, a [`TickScheduler`] and an
//!   [`EngineContext`]. Commands and ticks return [`Event`]s for the caller
//!   to render; OS notifications go through the [`NotificationDispatcher`]
//!   port and never fail a command.
//! - **Time**: Progress is measured as the delta between successive clock
//!   readings, never by counting ticks, so a suspended process catches up on
//!   the next tick or on [`TimerEngine::restore`].
//! - **Storage**: Versioned JSON snapshots behind [`StateStore`] (SQLite kv
//!   table or in memory), a session log and TOML configuration.
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: Countdown with presets, pre-alert and auto-repeat
//! - [`PomodoroEngine`]: Focus/break cycle with long-break interval
//! - [`StopwatchEngine`]: Count-up stopwatch with laps and an archive
//! - [`Database`]: Snapshot store and Pomodoro session statistics
//! - [`Config`]: Application configuration management

pub mod clock;
pub mod context;
pub mod error;
pub mod events;
pub mod format;
pub mod notify;
pub mod pomodoro;
pub mod scheduler;
pub mod stopwatch;
pub mod storage;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use context::{EngineContext, EngineTiming};
pub use error::{ConfigError, CoreError, StoreError, ValidationError};
pub use events::Event;
pub use notify::{
    NoopDispatcher, Notification, NotificationDispatcher, NotificationKind, NotifyError,
    RecordingDispatcher,
};
pub use pomodoro::{PomodoroEngine, PomodoroSettings, PomodoroStatus, PomodoroView, SessionType};
pub use scheduler::{run_ticker, TickScheduler, Tickable};
pub use stopwatch::{Lap, SavedSession, StopwatchEngine, StopwatchStatus, StopwatchView};
pub use storage::{Config, Database, MemoryStore, SessionRecord, StateStore, Stats};
pub use timer::{SettingsPatch, TimerEngine, TimerSettings, TimerStatus, TimerView};
