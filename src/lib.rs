//! Warehouse asset tracking backend: a label registry, the two-step drone
//! scan protocol, flight session records, and aggregate analytics over them.

pub mod analytics;
pub mod config;
pub mod db;
pub mod error;
pub mod scan;

pub use config::SettingsStore;
pub use db::Database;
pub use error::{Error, Result};
pub use scan::{ScanEngine, ScanSessionStore};

/// Initialize env_logger once. Safe to call from multiple tests.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
