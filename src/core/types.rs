//! Core data types for the magnetic source locator

use crate::core::constants::{BOARD_EDGE, BOARD_SIDE, SENSOR_COUNT, SENSOR_INSET};
use nalgebra::{Point2, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Trimmed-mean output of one sensor window
pub type StableVector = Vector3<f64>;

/// Stable vector with the sensor's baseline removed
pub type CalibratedVector = Vector3<f64>;

/// Solved source position in board-pixel space
pub type PositionEstimate = Point2<f64>;

/// One of the four board sensors.
///
/// Sensors are numbered 1..4 on the wire; the numbering also fixes the order
/// in which the board replies to a bulk read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SensorId {
    S1,
    S2,
    S3,
    S4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("sensor id {0} is outside 1..=4")]
pub struct InvalidSensorId(pub u8);

impl SensorId {
    /// All sensors in wire order
    pub const ALL: [SensorId; SENSOR_COUNT] = [SensorId::S1, SensorId::S2, SensorId::S3, SensorId::S4];

    /// Zero-based slot for per-sensor arrays
    pub fn index(self) -> usize {
        match self {
            SensorId::S1 => 0,
            SensorId::S2 => 1,
            SensorId::S3 => 2,
            SensorId::S4 => 3,
        }
    }

    /// One-based number as printed on the board
    pub fn number(self) -> u8 {
        self.index() as u8 + 1
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl TryFrom<u8> for SensorId {
    type Error = InvalidSensorId;

    fn try_from(number: u8) -> Result<Self, Self::Error> {
        match number {
            1..=4 => Ok(Self::ALL[number as usize - 1]),
            other => Err(InvalidSensorId(other)),
        }
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sensor {}", self.number())
    }
}

/// Decoded contents of one 6-byte wire frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawSample {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

impl RawSample {
    pub fn new(x: i16, y: i16, z: i16) -> Self {
        Self { x, y, z }
    }

    pub fn to_vector(self) -> Vector3<f64> {
        Vector3::new(self.x as f64, self.y as f64, self.z as f64)
    }
}

/// Where a sensor sits on the board and how its raw units map to board pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorPlacement {
    pub position: Point2<f64>,
    /// Board pixels per raw sensor unit
    pub pixels_per_unit: f64,
}

impl SensorPlacement {
    pub fn new(x: f64, y: f64, pixels_per_unit: f64) -> Self {
        Self {
            position: Point2::new(x, y),
            pixels_per_unit,
        }
    }
}

/// Fixed geometry of the four-sensor rig.
///
/// Sensors form a square of side `side`; y grows downward. S3 is top-left,
/// S4 top-right, S2 bottom-left, S1 bottom-right.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardLayout {
    pub sensors: [SensorPlacement; SENSOR_COUNT],
    pub side: f64,
}

impl BoardLayout {
    /// The physical 720x720 board with sensors inset 40 px from each corner,
    /// drawn with its top-left corner at `origin`.
    pub fn standard(origin: Point2<f64>, pixels_per_unit: f64) -> Self {
        let near = SENSOR_INSET;
        let far = BOARD_EDGE - SENSOR_INSET;
        Self {
            sensors: [
                SensorPlacement::new(origin.x + far, origin.y + far, pixels_per_unit),
                SensorPlacement::new(origin.x + near, origin.y + far, pixels_per_unit),
                SensorPlacement::new(origin.x + near, origin.y + near, pixels_per_unit),
                SensorPlacement::new(origin.x + far, origin.y + near, pixels_per_unit),
            ],
            side: BOARD_SIDE,
        }
    }

    pub fn placement(&self, sensor: SensorId) -> &SensorPlacement {
        &self.sensors[sensor.index()]
    }

    pub fn placement_mut(&mut self, sensor: SensorId) -> &mut SensorPlacement {
        &mut self.sensors[sensor.index()]
    }

    /// Centre of the sensor square
    pub fn centre(&self) -> Point2<f64> {
        let sum = self
            .sensors
            .iter()
            .fold(nalgebra::Vector2::zeros(), |acc, s| acc + s.position.coords);
        Point2::from(sum / SENSOR_COUNT as f64)
    }

    /// Sensor owning the board quadrant that contains `point`
    pub fn sensor_at(&self, point: Point2<f64>) -> SensorId {
        let centre = self.centre();
        match (point.x < centre.x, point.y < centre.y) {
            (true, true) => SensorId::S3,
            (true, false) => SensorId::S2,
            (false, true) => SensorId::S4,
            (false, false) => SensorId::S1,
        }
    }

    pub fn set_pixels_per_unit(&mut self, pixels_per_unit: f64) {
        for sensor in &mut self.sensors {
            sensor.pixels_per_unit = pixels_per_unit;
        }
    }
}

impl Default for BoardLayout {
    fn default() -> Self {
        Self::standard(Point2::origin(), 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensor_numbering() {
        for (i, sensor) in SensorId::ALL.iter().enumerate() {
            assert_eq!(sensor.index(), i);
            assert_eq!(sensor.number() as usize, i + 1);
            assert_eq!(SensorId::try_from(sensor.number()), Ok(*sensor));
        }
        assert_eq!(SensorId::try_from(0), Err(InvalidSensorId(0)));
        assert_eq!(SensorId::try_from(5), Err(InvalidSensorId(5)));
    }

    #[test]
    fn test_standard_layout_is_square() {
        let layout = BoardLayout::standard(Point2::new(100.0, 50.0), 1.0);
        let s1 = layout.placement(SensorId::S1).position;
        let s2 = layout.placement(SensorId::S2).position;
        let s3 = layout.placement(SensorId::S3).position;
        let s4 = layout.placement(SensorId::S4).position;

        assert_eq!(s4.x - s3.x, layout.side);
        assert_eq!(s1.x - s2.x, layout.side);
        assert_eq!(s2.y - s3.y, layout.side);
        assert_eq!(s1.y - s4.y, layout.side);
        assert_eq!(layout.centre(), Point2::new(460.0, 410.0));
    }

    #[test]
    fn test_quadrant_lookup() {
        let layout = BoardLayout::default();
        assert_eq!(layout.sensor_at(Point2::new(10.0, 10.0)), SensorId::S3);
        assert_eq!(layout.sensor_at(Point2::new(700.0, 10.0)), SensorId::S4);
        assert_eq!(layout.sensor_at(Point2::new(10.0, 700.0)), SensorId::S2);
        assert_eq!(layout.sensor_at(Point2::new(700.0, 700.0)), SensorId::S1);
    }
}
