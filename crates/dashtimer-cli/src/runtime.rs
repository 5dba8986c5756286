//! Wiring shared by every command: config, database and engine context.

use std::error::Error;
use std::sync::Arc;

use dashtimer_core::{
    Config, Database, EngineContext, Event, NoopDispatcher, NotificationDispatcher, SystemClock,
};
use serde::Serialize;

use crate::desktop::DesktopDispatcher;

pub type CliResult<T = ()> = Result<T, Box<dyn Error>>;

pub struct Runtime {
    pub config: Config,
    pub db: Arc<Database>,
}

impl Runtime {
    pub fn open() -> CliResult<Self> {
        let config = Config::load()?;
        let db = Arc::new(Database::open()?);
        Ok(Self { config, db })
    }

    /// Engine context backed by the database, with desktop notifications
    /// unless `DASHTIMER_NOTIFY=off`.
    pub fn context(&self) -> EngineContext {
        let dispatcher: Arc<dyn NotificationDispatcher> =
            match std::env::var("DASHTIMER_NOTIFY").as_deref() {
                Ok("off") => Arc::new(NoopDispatcher),
                _ => Arc::new(DesktopDispatcher),
            };
        EngineContext::new(Arc::new(SystemClock), self.db.clone(), dispatcher)
            .with_timing(self.config.engine)
    }

    /// Append every finished pomodoro phase in `events` to the session log.
    pub fn record_completions(&self, events: &[Event]) {
        for event in events {
            if let Event::PhaseCompleted {
                session_type,
                duration_secs,
                at,
                ..
            } = event
            {
                if let Err(e) = self.db.record_session(*session_type, *duration_secs, *at) {
                    tracing::warn!(error = %e, "failed to record completed session");
                }
            }
        }
    }
}

#[derive(Serialize)]
struct Output<'a, S: Serialize> {
    events: &'a [Event],
    state: &'a S,
}

/// Print the events a command produced together with the resulting state.
pub fn print_output<S: Serialize>(events: &[Event], state: &S) -> CliResult {
    let json = serde_json::to_string_pretty(&Output { events, state })?;
    println!("{json}");
    Ok(())
}
