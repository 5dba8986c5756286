//! Cooperative tick scheduling.
//!
//! Each engine owns one [`TickScheduler`]. It holds at most one polling
//! handle (the engine wants `tick()` called every `interval_ms`) and at most
//! one deferred action (e.g. an auto-repeat restart due after a settle
//! delay). Nothing here spawns threads; [`run_ticker`] is the only place the
//! schedule is turned into actual wake-ups.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::events::Event;

pub const DEFAULT_TICK_INTERVAL_MS: u64 = 200;

/// Identifies one armed polling period. A new id is issued every time
/// polling is (re-)armed after having been cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollHandle {
    pub id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredKind {
    /// Reset to idle and start the countdown again.
    AutoRepeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeferredAction {
    pub kind: DeferredKind,
    pub due_at_ms: u64,
}

#[derive(Debug, Clone)]
pub struct TickScheduler {
    interval_ms: u64,
    next_id: u64,
    polling: Option<PollHandle>,
    deferred: Option<DeferredAction>,
}

impl TickScheduler {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms: interval_ms.max(1),
            next_id: 0,
            polling: None,
            deferred: None,
        }
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    /// Arm polling. Returns the existing handle when already armed so a
    /// double start never produces a second loop.
    pub fn arm(&mut self) -> PollHandle {
        if let Some(handle) = self.polling {
            return handle;
        }
        self.next_id += 1;
        let handle = PollHandle { id: self.next_id };
        tracing::trace!(handle = handle.id, "polling armed");
        self.polling = Some(handle);
        handle
    }

    pub fn cancel(&mut self) -> Option<PollHandle> {
        let handle = self.polling.take();
        if let Some(h) = handle {
            tracing::trace!(handle = h.id, "polling cancelled");
        }
        handle
    }

    pub fn is_polling(&self) -> bool {
        self.polling.is_some()
    }

    /// Schedule `kind` to run once `delay_ms` after `now_ms`, replacing any
    /// pending deferred action.
    pub fn defer(&mut self, kind: DeferredKind, now_ms: u64, delay_ms: u64) -> DeferredAction {
        let action = DeferredAction {
            kind,
            due_at_ms: now_ms.saturating_add(delay_ms),
        };
        self.deferred = Some(action);
        action
    }

    pub fn cancel_deferred(&mut self) -> Option<DeferredAction> {
        self.deferred.take()
    }

    pub fn pending(&self) -> Option<DeferredAction> {
        self.deferred
    }

    /// Remove and return the deferred action if it is due at `now_ms`.
    pub fn take_due(&mut self, now_ms: u64) -> Option<DeferredAction> {
        match self.deferred {
            Some(action) if action.due_at_ms <= now_ms => self.deferred.take(),
            _ => None,
        }
    }

    /// True while there is anything for a driver loop to do.
    pub fn wants_poll(&self) -> bool {
        self.polling.is_some() || self.deferred.is_some()
    }

    pub fn cancel_all(&mut self) {
        self.cancel();
        self.deferred = None;
    }
}

impl Default for TickScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_INTERVAL_MS)
    }
}

/// An engine a driver loop can poll.
pub trait Tickable {
    /// Run any due deferred action, then advance the running count.
    fn poll(&mut self) -> Vec<Event>;

    /// Whether the engine currently holds a polling handle or a pending
    /// deferred action.
    fn wants_poll(&self) -> bool;

    fn tick_interval(&self) -> Duration;
}

/// Poll `engine` at its tick interval until it stops wanting polls or
/// `shutdown` flips to `true`. Events produced by each poll are handed to
/// `on_events` outside the engine lock.
pub async fn run_ticker<E, F>(
    engine: Arc<Mutex<E>>,
    mut shutdown: watch::Receiver<bool>,
    mut on_events: F,
) where
    E: Tickable,
    F: FnMut(Vec<Event>),
{
    let period = match engine.lock() {
        Ok(guard) => guard.tick_interval(),
        Err(_) => {
            tracing::warn!("engine lock poisoned before ticker start");
            return;
        }
    };
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    tracing::debug!("ticker shut down");
                    break;
                }
                continue;
            }
        }

        let (events, keep_going) = match engine.lock() {
            Ok(mut guard) => {
                let events = guard.poll();
                (events, guard.wants_poll())
            }
            Err(_) => {
                tracing::warn!("engine lock poisoned, stopping ticker");
                break;
            }
        };

        if !events.is_empty() {
            on_events(events);
        }
        if !keep_going {
            tracing::debug!("engine idle, ticker exiting");
            break;
        }
    }
}
