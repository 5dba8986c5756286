pub mod config;
pub mod pomodoro;
pub mod stats;
pub mod stopwatch;
pub mod timer;
pub mod watch;
