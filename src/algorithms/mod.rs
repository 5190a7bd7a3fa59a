//! Positioning algorithms

pub mod trilateration;

pub use trilateration::{TrilaterationEngine, radius_from_magnitude, axis_estimate, MIN_RADIUS};
