//! `cronlet-core`: configuration and process-level error types shared by the
//! cronlet crates.

pub mod config;
pub mod error;

pub use config::CronletConfig;
pub use error::{CronletError, Result};
