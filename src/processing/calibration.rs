//! Per-sensor zero-point calibration

use crate::core::{CalibratedVector, SensorId, StableVector, SENSOR_COUNT};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CalibrationError {
    #[error("{0} has no baseline yet")]
    NotCalibrated(SensorId),
}

/// Baseline offsets captured once per session.
///
/// Only the acquisition thread writes this store; readers get a copy through
/// [`CalibrationStore::snapshot`].
#[derive(Debug, Clone, Default)]
pub struct CalibrationStore {
    offsets: [Option<StableVector>; SENSOR_COUNT],
    pending: [bool; SENSOR_COUNT],
}

impl CalibrationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `baseline` as the sensor's offset, replacing any previous one
    pub fn capture_baseline(&mut self, sensor: SensorId, baseline: StableVector) {
        self.offsets[sensor.index()] = Some(baseline);
        self.pending[sensor.index()] = false;
    }

    pub fn calibrate(&self, sensor: SensorId, stable: StableVector) -> Result<CalibratedVector, CalibrationError> {
        self.offsets[sensor.index()]
            .map(|offset| stable - offset)
            .ok_or(CalibrationError::NotCalibrated(sensor))
    }

    /// Mark a sensor so its next stable reading becomes the new baseline
    pub fn request_recalibration(&mut self, sensor: SensorId) {
        self.pending[sensor.index()] = true;
    }

    /// Capture pending baselines from this tick's readings, then calibrate
    /// every sensor.
    pub fn apply(&mut self, stable: &[StableVector; SENSOR_COUNT]) -> [Result<CalibratedVector, CalibrationError>; SENSOR_COUNT] {
        for sensor in SensorId::ALL {
            if self.pending[sensor.index()] {
                log::debug!("recapturing baseline of {}", sensor);
                self.capture_baseline(sensor, stable[sensor.index()]);
            }
        }
        SensorId::ALL.map(|sensor| self.calibrate(sensor, stable[sensor.index()]))
    }

    pub fn is_calibrated(&self, sensor: SensorId) -> bool {
        self.offsets[sensor.index()].is_some()
    }

    pub fn offset(&self, sensor: SensorId) -> Option<StableVector> {
        self.offsets[sensor.index()]
    }

    pub fn snapshot(&self) -> [Option<StableVector>; SENSOR_COUNT] {
        self.offsets
    }

    /// Forget all baselines, as on disconnect
    pub fn reset(&mut self) {
        self.offsets = [None; SENSOR_COUNT];
        self.pending = [false; SENSOR_COUNT];
    }
}
