//! Configuration loading and persistence

pub mod config;

pub use config::{ConfigurationManager, ConfigError, SystemConfig};
