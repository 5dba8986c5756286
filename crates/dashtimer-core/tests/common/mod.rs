//! Shared fixtures for the engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use dashtimer_core::{EngineContext, Event, ManualClock, MemoryStore, RecordingDispatcher};

/// Epoch milliseconds every harness clock starts at.
pub const T0: u64 = 1_700_000_000_000;

/// One clock, store and dispatcher, shareable across engine instances so a
/// test can simulate a process restart by loading a second engine.
pub struct Harness {
    pub clock: ManualClock,
    pub store: Arc<MemoryStore>,
    pub dispatcher: Arc<RecordingDispatcher>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            clock: ManualClock::new(T0),
            store: Arc::new(MemoryStore::new()),
            dispatcher: Arc::new(RecordingDispatcher::new()),
        }
    }

    pub fn ctx(&self) -> EngineContext {
        EngineContext::new(
            Arc::new(self.clock.clone()),
            self.store.clone(),
            self.dispatcher.clone(),
        )
    }

    /// Move the clock to `ms` after [`T0`].
    pub fn at(&self, ms: u64) {
        self.clock.set(T0 + ms);
    }
}

pub fn count<F: Fn(&Event) -> bool>(events: &[Event], pred: F) -> usize {
    events.iter().filter(|e| pred(e)).count()
}
