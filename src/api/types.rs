//! Common API types and data structures

use crate::algorithms::TrilaterationEngine;
use crate::core::{CalibratedVector, PositionEstimate, SensorId, SENSOR_COUNT};
use crate::hardware::{LinkError, RecoveryStrategy};
use crate::processing::{CalibrationError, FilterError};
use crate::utils::config::ConfigError;
use thiserror::Error;

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigError),
    #[error("failed to start acquisition thread: {0}")]
    Spawn(std::io::Error),
}

impl ApiError {
    /// Recovery for errors raised inside a running session
    pub fn recovery_strategy(&self) -> RecoveryStrategy {
        match self {
            ApiError::Link(error) => error.recovery_strategy(),
            _ => RecoveryStrategy::Rediscover,
        }
    }
}

/// One sensor's share of a tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub sensor: SensorId,
    /// Baseline-corrected field; `None` until the sensor has a baseline
    pub field: Option<CalibratedVector>,
    pub radius: Option<f64>,
}

/// Everything the consumer sees for one steady-state tick
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    /// Increases by one per published tick, across reconnects
    pub sequence: u64,
    pub readings: [SensorReading; SENSOR_COUNT],
    /// `None` while any sensor lacks a baseline
    pub position: Option<PositionEstimate>,
    /// Calibration ratios in effect for this tick
    pub ratios: [f64; SENSOR_COUNT],
}

impl TickReport {
    /// Range each calibrated sensor and solve the position when all four are
    /// calibrated.
    pub fn build(
        sequence: u64,
        calibrated: &[Result<CalibratedVector, CalibrationError>; SENSOR_COUNT],
        engine: &TrilaterationEngine,
    ) -> Self {
        let readings = SensorId::ALL.map(|sensor| {
            let field = calibrated[sensor.index()].as_ref().ok().copied();
            SensorReading {
                sensor,
                field,
                radius: field.map(|f| engine.radius(sensor, &f)),
            }
        });

        let position = match (readings[0].radius, readings[1].radius, readings[2].radius, readings[3].radius) {
            (Some(r1), Some(r2), Some(r3), Some(r4)) => Some(engine.solve(&[r1, r2, r3, r4])),
            _ => None,
        };

        Self {
            sequence,
            readings,
            position,
            ratios: engine.ratios(),
        }
    }

    pub fn reading(&self, sensor: SensorId) -> &SensorReading {
        &self.readings[sensor.index()]
    }

    pub fn radii(&self) -> [Option<f64>; SENSOR_COUNT] {
        self.readings.map(|r| r.radius)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BoardLayout;
    use approx::assert_relative_eq;

    #[test]
    fn test_position_needs_every_baseline() {
        let engine = TrilaterationEngine::new(BoardLayout::default());
        let mut calibrated = [Ok(CalibratedVector::new(0.0, 0.0, 100.0)); SENSOR_COUNT];
        calibrated[2] = Err(CalibrationError::NotCalibrated(SensorId::S3));

        let report = TickReport::build(7, &calibrated, &engine);
        assert_eq!(report.sequence, 7);
        assert!(report.position.is_none());
        assert!(report.reading(SensorId::S3).field.is_none());
        assert!(report.reading(SensorId::S1).radius.is_some());
    }

    #[test]
    fn test_calibrated_tick_has_position() {
        let engine = TrilaterationEngine::new(BoardLayout::default());
        let calibrated = [Ok(CalibratedVector::zeros()); SENSOR_COUNT];

        let report = TickReport::build(1, &calibrated, &engine);
        let position = report.position.unwrap();
        assert_relative_eq!(position.x, 360.0);
        assert_relative_eq!(position.y, 360.0);
        assert_eq!(report.radii(), [Some(1.0); SENSOR_COUNT]);
    }

    #[test]
    fn test_link_errors_keep_their_recovery() {
        let err: ApiError = LinkError::NoDevice { ports: 2 }.into();
        assert_eq!(err.recovery_strategy(), RecoveryStrategy::RediscoverAfterBackoff);

        let err: ApiError = FilterError::NotPrimed { have: 1, need: 3 }.into();
        assert_eq!(err.recovery_strategy(), RecoveryStrategy::Rediscover);
    }
}
