use clap::Subcommand;
use dashtimer_core::PomodoroEngine;

use crate::runtime::{print_output, CliResult, Runtime};

#[derive(Subcommand)]
pub enum PomodoroAction {
    /// Start the current phase
    Start,
    /// Pause the current phase
    Pause,
    /// Resume a paused phase
    Resume,
    /// Rewind the current phase
    Reset,
    /// Abandon the current phase and move to the next one
    Skip,
    /// Back to the first focus phase
    ResetCycle,
    /// Print current pomodoro state as JSON
    Status,
}

pub fn run(action: PomodoroAction) -> CliResult {
    let rt = Runtime::open()?;
    let mut engine = PomodoroEngine::load(rt.context(), rt.config.pomodoro.clone());
    let mut events = engine.restore();
    if engine.settings() != &rt.config.pomodoro {
        engine.update_settings(rt.config.pomodoro.clone());
    }

    match action {
        PomodoroAction::Start => events.extend(engine.start()?),
        PomodoroAction::Pause => events.extend(engine.pause()),
        PomodoroAction::Resume => events.extend(engine.resume()),
        PomodoroAction::Reset => events.extend(engine.reset()),
        PomodoroAction::Skip => events.extend(engine.skip()),
        PomodoroAction::ResetCycle => events.extend(engine.reset_cycle()),
        PomodoroAction::Status => events.extend(engine.tick()),
    }

    rt.record_completions(&events);
    engine.shutdown();
    print_output(&events, &engine.view())
}
