mod countdown;
mod engine;
mod settings;

pub use countdown::{Countdown, CountdownStatus, Crossings};
pub use engine::{TimerEngine, TimerStatus, TimerView, TIMER_SNAPSHOT_KEY, TIMER_SNAPSHOT_VERSION};
pub use settings::{SettingsPatch, TimerSettings};
