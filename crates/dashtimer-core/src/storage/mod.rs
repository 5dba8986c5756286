mod config;
pub mod database;
mod snapshot;

pub use config::Config;
pub use database::{Database, SessionRecord, Stats};
pub use snapshot::{load_snapshot, save_snapshot, MemoryStore, StateStore};

use std::path::PathBuf;

use crate::error::StoreError;

/// Returns `~/.config/dashtimer[-dev]/` based on DASHTIMER_ENV.
///
/// Set DASHTIMER_ENV=dev to use development data directory, or
/// DASHTIMER_DATA_DIR to point somewhere else entirely.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, StoreError> {
    let dir = match std::env::var_os("DASHTIMER_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("DASHTIMER_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("dashtimer-dev")
            } else {
                base_dir.join("dashtimer")
            }
        }
    };

    std::fs::create_dir_all(&dir).map_err(StoreError::DataDir)?;
    Ok(dir)
}
