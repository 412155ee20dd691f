pub mod config;
pub mod error;
pub mod schema;
pub mod store;

use std::env;
use std::path::PathBuf;

pub use config::{ConfigFile, load_config, parse_config};
pub use error::{Result, StoreError};
pub use store::{RunRecord, RunSummary, Store};

/// Environment variable overriding where run history lives.
pub const DATA_DIR_ENV: &str = "SHAPER_DATA_DIR";

/// File name of the run history database inside the data directory.
pub const DB_FILE: &str = "runs.db";

/// `$SHAPER_DATA_DIR`, else `~/.percept-shaper`.
pub fn default_base_dir() -> PathBuf {
    if let Ok(dir) = env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".percept-shaper")
}
