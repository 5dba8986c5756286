use clap::Subcommand;
use dashtimer_core::{Clock, Database, SystemClock};

use crate::runtime::CliResult;

#[derive(Subcommand)]
pub enum StatsAction {
    /// Today's focus stats
    Today,
    /// All-time stats
    All,
    /// Most recent completed phases
    Recent {
        #[arg(long, default_value = "10")]
        limit: usize,
    },
}

pub fn run(action: StatsAction) -> CliResult {
    let db = Database::open()?;

    match action {
        StatsAction::Today => {
            let stats = db.stats_all(SystemClock.now())?;
            let today = serde_json::json!({
                "pomodoros": stats.today_pomodoros,
                "focus_min": stats.today_focus_min,
            });
            println!("{}", serde_json::to_string_pretty(&today)?);
        }
        StatsAction::All => {
            let stats = db.stats_all(SystemClock.now())?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        StatsAction::Recent { limit } => {
            let sessions = db.recent_sessions(limit)?;
            println!("{}", serde_json::to_string_pretty(&sessions)?);
        }
    }
    Ok(())
}
