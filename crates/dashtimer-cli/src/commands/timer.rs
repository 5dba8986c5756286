use clap::Subcommand;
use dashtimer_core::TimerEngine;

use crate::runtime::{print_output, CliResult, Runtime};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start the countdown
    Start,
    /// Pause the countdown
    Pause,
    /// Resume a paused countdown
    Resume,
    /// Rewind to the full duration
    Reset,
    /// Select a duration in minutes (stops a running countdown)
    Preset {
        /// Minutes
        minutes: u64,
    },
    /// Select a custom duration
    Set {
        #[arg(long, default_value = "0")]
        minutes: u64,
        #[arg(long, default_value = "0")]
        seconds: u64,
    },
    /// Print current timer state as JSON
    Status,
}

pub fn run(action: TimerAction) -> CliResult {
    let rt = Runtime::open()?;
    let mut engine = TimerEngine::load(rt.context());
    let mut events = engine.restore();
    events.extend(engine.hydrate_settings(&rt.config.timer_patch()));

    match action {
        TimerAction::Start => events.extend(engine.start()?),
        TimerAction::Pause => events.extend(engine.pause()),
        TimerAction::Resume => events.extend(engine.resume()),
        TimerAction::Reset => events.extend(engine.reset()),
        TimerAction::Preset { minutes } => {
            events.extend(engine.set_preset(minutes.saturating_mul(60_000)))
        }
        TimerAction::Set { minutes, seconds } => {
            let ms = minutes.saturating_mul(60).saturating_add(seconds).saturating_mul(1000);
            events.extend(engine.set_custom_duration(ms)?)
        }
        TimerAction::Status => events.extend(engine.tick()),
    }

    engine.shutdown();
    print_output(&events, &engine.view())
}
