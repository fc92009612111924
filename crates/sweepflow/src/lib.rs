pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod stores;
pub mod sweep;
pub mod telemetry;
pub mod variants;

pub use error::{ConfigError, SweepError, SweepResult};
