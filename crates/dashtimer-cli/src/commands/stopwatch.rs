use clap::Subcommand;
use dashtimer_core::StopwatchEngine;
use uuid::Uuid;

use crate::runtime::{print_output, CliResult, Runtime};

#[derive(Subcommand)]
pub enum StopwatchAction {
    /// Start or continue counting
    Start,
    /// Pause counting
    Pause,
    /// Resume a paused stopwatch
    Resume,
    /// Record a lap
    Lap,
    /// Clear elapsed time and laps (saved sessions are kept)
    Reset,
    /// Archive the current elapsed time and laps
    Save {
        /// Session name (defaults to "Session N")
        name: Option<String>,
        #[arg(long, default_value = "")]
        notes: String,
    },
    /// List saved sessions as JSON
    Sessions,
    /// Delete a saved session
    Delete {
        /// Session ID
        id: Uuid,
    },
    /// Delete every saved session
    ClearHistory,
    /// Print current stopwatch state as JSON
    Status,
}

pub fn run(action: StopwatchAction) -> CliResult {
    let rt = Runtime::open()?;
    let mut engine = StopwatchEngine::load(rt.context());
    let mut events = engine.restore();

    match action {
        StopwatchAction::Start => events.extend(engine.start()),
        StopwatchAction::Pause => events.extend(engine.pause()),
        StopwatchAction::Resume => events.extend(engine.resume()),
        StopwatchAction::Lap => events.extend(engine.record_lap()),
        StopwatchAction::Reset => events.extend(engine.reset_timer()),
        StopwatchAction::Save { name, notes } => {
            events.extend(engine.save_current_session(name.as_deref().unwrap_or(""), &notes)?)
        }
        StopwatchAction::Sessions => {
            engine.shutdown();
            println!("{}", serde_json::to_string_pretty(engine.saved_sessions())?);
            return Ok(());
        }
        StopwatchAction::Delete { id } => {
            let deleted = engine.delete_saved_session(id);
            if deleted.is_empty() {
                return Err(format!("no saved session with id {id}").into());
            }
            events.extend(deleted);
        }
        StopwatchAction::ClearHistory => events.extend(engine.clear_history()),
        StopwatchAction::Status => events.extend(engine.tick()),
    }

    engine.shutdown();
    print_output(&events, &engine.view())
}
