//! Foreground ticking loop.
//!
//! One-shot commands only advance an engine when they run. `watch` keeps it
//! polled at its tick interval so pre-alerts, completions and auto-repeat
//! restarts happen on time, printing each event as a JSON line.

use std::sync::{Arc, Mutex};

use clap::ValueEnum;
use dashtimer_core::{run_ticker, Event, PomodoroEngine, StopwatchEngine, Tickable, TimerEngine};
use tokio::sync::watch;

use crate::runtime::{CliResult, Runtime};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum WatchTarget {
    Timer,
    Pomodoro,
    Stopwatch,
}

pub fn run(target: WatchTarget) -> CliResult {
    let rt = Runtime::open()?;
    let tokio_rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    tokio_rt.block_on(async {
        match target {
            WatchTarget::Timer => {
                let mut engine = TimerEngine::load(rt.context());
                let mut events = engine.restore();
                events.extend(engine.hydrate_settings(&rt.config.timer_patch()));
                print_events(&events);
                let engine = Arc::new(Mutex::new(engine));
                drive(engine.clone(), |events| print_events(&events)).await;
                lock(&engine)?.shutdown();
            }
            WatchTarget::Pomodoro => {
                let mut engine = PomodoroEngine::load(rt.context(), rt.config.pomodoro.clone());
                let events = engine.restore();
                if engine.settings() != &rt.config.pomodoro {
                    engine.update_settings(rt.config.pomodoro.clone());
                }
                rt.record_completions(&events);
                print_events(&events);
                let engine = Arc::new(Mutex::new(engine));
                drive(engine.clone(), |events| {
                    rt.record_completions(&events);
                    print_events(&events);
                })
                .await;
                lock(&engine)?.shutdown();
            }
            WatchTarget::Stopwatch => {
                let mut engine = StopwatchEngine::load(rt.context());
                print_events(&engine.restore());
                let engine = Arc::new(Mutex::new(engine));
                drive(engine.clone(), |events| print_events(&events)).await;
                lock(&engine)?.shutdown();
            }
        }
        CliResult::Ok(())
    })
}

/// Run the ticker until the engine goes quiet or Ctrl-C arrives.
async fn drive<E, F>(engine: Arc<Mutex<E>>, on_events: F)
where
    E: Tickable,
    F: FnMut(Vec<Event>),
{
    let (tx, rx) = watch::channel(false);
    let signal = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted, shutting down");
            let _ = tx.send(true);
        }
    });
    run_ticker(engine, rx, on_events).await;
    signal.abort();
}

fn lock<E>(engine: &Mutex<E>) -> CliResult<std::sync::MutexGuard<'_, E>> {
    engine.lock().map_err(|_| "engine lock poisoned".into())
}

fn print_events(events: &[Event]) {
    for event in events {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!(error = %e, "failed to encode event"),
        }
    }
}
