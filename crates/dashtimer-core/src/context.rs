//! Collaborators shared by every engine instance.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::notify::{NoopDispatcher, Notification, NotificationDispatcher};
use crate::scheduler::DEFAULT_TICK_INTERVAL_MS;
use crate::storage::{MemoryStore, StateStore};

/// Engine timing knobs, read from the `[engine]` config section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineTiming {
    /// Polling cadence while an engine is running.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Pause between a countdown finishing and its auto-repeat restart.
    #[serde(default = "default_auto_repeat_settle_ms")]
    pub auto_repeat_settle_ms: u64,
    /// Shortest duration a preset or custom duration is clamped up to.
    #[serde(default = "default_min_duration_ms")]
    pub min_duration_ms: u64,
}

fn default_tick_interval_ms() -> u64 {
    DEFAULT_TICK_INTERVAL_MS
}
fn default_auto_repeat_settle_ms() -> u64 {
    1_500
}
fn default_min_duration_ms() -> u64 {
    1_000
}

impl Default for EngineTiming {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            auto_repeat_settle_ms: default_auto_repeat_settle_ms(),
            min_duration_ms: default_min_duration_ms(),
        }
    }
}

/// Time source, snapshot store and notification port handed to each engine.
#[derive(Clone)]
pub struct EngineContext {
    pub clock: Arc<dyn Clock>,
    pub store: Arc<dyn StateStore>,
    pub dispatcher: Arc<dyn NotificationDispatcher>,
    pub timing: EngineTiming,
}

impl EngineContext {
    pub fn new(
        clock: Arc<dyn Clock>,
        store: Arc<dyn StateStore>,
        dispatcher: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        Self {
            clock,
            store,
            dispatcher,
            timing: EngineTiming::default(),
        }
    }

    /// System clock, throwaway memory store, no OS notifications.
    pub fn ephemeral() -> Self {
        Self::new(
            Arc::new(SystemClock),
            Arc::new(MemoryStore::new()),
            Arc::new(NoopDispatcher),
        )
    }

    pub fn with_timing(mut self, timing: EngineTiming) -> Self {
        self.timing = timing;
        self
    }

    pub(crate) fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Fire-and-forget delivery; failures never reach the engine.
    pub(crate) fn dispatch(&self, notification: Notification) {
        if let Err(e) = self.dispatcher.notify(&notification) {
            tracing::warn!(
                kind = ?notification.kind,
                error = %e,
                "notification dispatch failed"
            );
        }
    }
}

impl fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineContext")
            .field("clock", &self.clock)
            .field("timing", &self.timing)
            .finish_non_exhaustive()
    }
}
