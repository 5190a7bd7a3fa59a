//! Core types and constants for the magnetic source locator

pub mod types;
pub mod constants;

pub use types::*;
pub use constants::*;
