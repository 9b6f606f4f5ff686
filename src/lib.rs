// Library module for vaultsync
// Re-exports modules for use in integration tests and external crates

pub mod config;
pub mod error;
pub mod store;
pub mod sync;

pub use config::Settings;
pub use error::{Result, SyncError};
