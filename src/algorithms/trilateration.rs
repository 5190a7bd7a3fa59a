//! Field-magnitude ranging and four-sensor position solve
//!
//! The source is modelled as a dipole: field magnitude falls with the cube of
//! distance, so `(ratio / magnitude)^(1/3)` is the width of the sensor's range
//! ring and half of it is the radius fed to the solve. The per-sensor ratio
//! is captured with the source at a known ring width.
//!
//! The position solve treats each axis independently. Two sensors separated
//! by the board side L along an axis give the two-circle estimate
//!
//! ```text
//! coordinate = centre + (r_near² - r_far² + L²) / (2L)
//! ```
//!
//! and each axis has two such pairs on the square rig. Their mean is the
//! reported coordinate.

use crate::core::{BoardLayout, CalibratedVector, PositionEstimate, SensorId, BOARD_SIDE, SENSOR_COUNT};
use nalgebra::Point2;

/// Range reported when the field is too weak to invert
pub const MIN_RADIUS: f64 = 1.0;

/// Range ring radius for a scaled field magnitude: half the cube-root width.
///
/// Magnitudes at or below 1 (including exactly zero) return [`MIN_RADIUS`]
/// instead of blowing up.
pub fn radius_from_magnitude(calibration_ratio: f64, magnitude: f64) -> f64 {
    if magnitude > 1.0 {
        (calibration_ratio / magnitude).cbrt() / 2.0
    } else {
        MIN_RADIUS
    }
}

/// One-axis two-circle estimate for sensors `side` apart
pub fn axis_estimate(centre: f64, r_near: f64, r_far: f64, side: f64) -> f64 {
    centre + (r_near * r_near - r_far * r_far + side * side) / (2.0 * side)
}

/// Opposing pairs used per axis as (near, far); near has the smaller coordinate
const X_PAIRS: [(SensorId, SensorId); 2] = [(SensorId::S3, SensorId::S4), (SensorId::S2, SensorId::S1)];
const Y_PAIRS: [(SensorId, SensorId); 2] = [(SensorId::S3, SensorId::S2), (SensorId::S4, SensorId::S1)];

/// Converts calibrated field vectors to ranges and ranges to a position
#[derive(Debug, Clone)]
pub struct TrilaterationEngine {
    layout: BoardLayout,
    ratios: [f64; SENSOR_COUNT],
    calibration_distance: f64,
}

impl TrilaterationEngine {
    pub fn new(layout: BoardLayout) -> Self {
        Self {
            layout,
            ratios: [1.0; SENSOR_COUNT],
            calibration_distance: BOARD_SIDE,
        }
    }

    /// Ring width assigned to the field seen when a ratio is captured; the
    /// captured sensor then ranges to half of it
    pub fn with_calibration_distance(mut self, distance: f64) -> Self {
        self.calibration_distance = distance;
        self
    }

    pub fn with_ratios(mut self, ratios: [f64; SENSOR_COUNT]) -> Self {
        self.ratios = ratios;
        self
    }

    pub fn layout(&self) -> &BoardLayout {
        &self.layout
    }

    pub fn ratios(&self) -> [f64; SENSOR_COUNT] {
        self.ratios
    }

    pub fn set_ratio(&mut self, sensor: SensorId, ratio: f64) {
        self.ratios[sensor.index()] = ratio;
    }

    /// Field magnitude in board-pixel units
    pub fn magnitude(&self, sensor: SensorId, field: &CalibratedVector) -> f64 {
        field.norm() * self.layout.placement(sensor).pixels_per_unit
    }

    pub fn radius(&self, sensor: SensorId, field: &CalibratedVector) -> f64 {
        radius_from_magnitude(self.ratios[sensor.index()], self.magnitude(sensor, field))
    }

    /// Take the current reading as the calibration-distance ring and return
    /// the new ratio.
    pub fn capture_ratio(&mut self, sensor: SensorId, field: &CalibratedVector) -> f64 {
        let ratio = self.calibration_distance.powi(3) * self.magnitude(sensor, field);
        self.ratios[sensor.index()] = ratio;
        ratio
    }

    pub fn radii(&self, fields: &[CalibratedVector; SENSOR_COUNT]) -> [f64; SENSOR_COUNT] {
        SensorId::ALL.map(|sensor| self.radius(sensor, &fields[sensor.index()]))
    }

    /// Average of the two pair estimates on each axis
    pub fn solve(&self, radii: &[f64; SENSOR_COUNT]) -> PositionEstimate {
        let side = self.layout.side;
        let r = |sensor: SensorId| radii[sensor.index()];
        let at = |sensor: SensorId| self.layout.placement(sensor).position;

        let x = X_PAIRS
            .iter()
            .map(|&(near, far)| axis_estimate(at(near).x, r(near), r(far), side))
            .sum::<f64>()
            / X_PAIRS.len() as f64;
        let y = Y_PAIRS
            .iter()
            .map(|&(near, far)| axis_estimate(at(near).y, r(near), r(far), side))
            .sum::<f64>()
            / Y_PAIRS.len() as f64;

        Point2::new(x, y)
    }

    pub fn locate(&self, fields: &[CalibratedVector; SENSOR_COUNT]) -> ([f64; SENSOR_COUNT], PositionEstimate) {
        let radii = self.radii(fields);
        (radii, self.solve(&radii))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn engine() -> TrilaterationEngine {
        TrilaterationEngine::new(BoardLayout::default())
    }

    #[test]
    fn test_weak_field_guard() {
        for magnitude in [0.0, 0.5, 1.0] {
            assert_eq!(radius_from_magnitude(1e12, magnitude), MIN_RADIUS);
            assert_eq!(radius_from_magnitude(0.0, magnitude), MIN_RADIUS);
        }
        assert_relative_eq!(radius_from_magnitude(8000.0, 8.0), 5.0);
    }

    #[test]
    fn test_zero_field_does_not_divide() {
        let engine = engine();
        let radius = engine.radius(SensorId::S1, &CalibratedVector::zeros());
        assert_eq!(radius, MIN_RADIUS);
    }

    #[test]
    fn test_equal_pair_radii_hit_midpoint() {
        for r in [1.0, 100.0, 320.0, 900.0] {
            assert_relative_eq!(axis_estimate(40.0, r, r, 640.0), 40.0 + 320.0);
        }
    }

    #[test]
    fn test_equal_radii_give_board_centre() {
        let engine = engine();
        let position = engine.solve(&[320.0; SENSOR_COUNT]);
        assert_eq!(position, engine.layout().centre());
        assert_eq!(position, Point2::new(360.0, 360.0));
    }

    #[test]
    fn test_exact_ranges_recover_source() {
        let engine = engine();
        for source in [Point2::new(200.0, 500.0), Point2::new(41.0, 600.0), Point2::new(650.0, 90.0)] {
            let radii = SensorId::ALL.map(|s| nalgebra::distance(&engine.layout().placement(s).position, &source));
            let position = engine.solve(&radii);
            assert_abs_diff_eq!(position.x, source.x, epsilon = 1e-9);
            assert_abs_diff_eq!(position.y, source.y, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_captured_ratio_ranges_to_half_calibration_distance() {
        let mut engine = engine();
        let field = CalibratedVector::new(30.0, -40.0, 0.0);
        let ratio = engine.capture_ratio(SensorId::S2, &field);

        assert_relative_eq!(ratio, 640f64.powi(3) * 50.0);
        assert_relative_eq!(engine.radius(SensorId::S2, &field), 320.0, max_relative = 1e-12);

        // eight times the field is half the distance
        assert_relative_eq!(engine.radius(SensorId::S2, &(field * 8.0)), 160.0, max_relative = 1e-12);
    }

    #[test]
    fn test_equal_fields_after_calibration_locate_centre() {
        let mut engine = engine();
        let reference = CalibratedVector::new(0.0, 0.0, 10.0);
        for sensor in SensorId::ALL {
            engine.capture_ratio(sensor, &reference);
        }

        let fields = [reference; SENSOR_COUNT];
        let (radii, position) = engine.locate(&fields);
        for radius in radii {
            assert_relative_eq!(radius, 320.0, max_relative = 1e-12);
        }
        assert_abs_diff_eq!(position.x, 360.0, epsilon = 1e-9);
        assert_abs_diff_eq!(position.y, 360.0, epsilon = 1e-9);
    }

    #[test]
    fn test_magnitude_uses_sensor_scale() {
        let mut layout = BoardLayout::default();
        layout.placement_mut(SensorId::S3).pixels_per_unit = 0.5;
        let engine = TrilaterationEngine::new(layout);
        let field = CalibratedVector::new(3.0, 4.0, 0.0);
        assert_relative_eq!(engine.magnitude(SensorId::S3, &field), 2.5);
        assert_relative_eq!(engine.magnitude(SensorId::S1, &field), 5.0);
    }

    #[test]
    fn test_default_ratio_is_unity() {
        let engine = engine();
        assert_eq!(engine.ratios(), [1.0; SENSOR_COUNT]);
        assert_relative_eq!(engine.radius(SensorId::S1, &CalibratedVector::new(8.0, 0.0, 0.0)), 0.25);
    }

    #[test]
    fn test_stronger_field_pulls_estimate_towards_sensor() {
        let mut engine = engine();
        let reference = CalibratedVector::new(0.0, 0.0, 10.0);
        for sensor in SensorId::ALL {
            engine.capture_ratio(sensor, &reference);
        }

        let mut fields = [reference; SENSOR_COUNT];
        fields[SensorId::S3.index()] = reference * 8.0;
        let (radii, position) = engine.locate(&fields);

        assert_relative_eq!(radii[SensorId::S3.index()], 160.0, max_relative = 1e-12);
        assert_abs_diff_eq!(position.x, 330.0, epsilon = 1e-9);
        assert_abs_diff_eq!(position.y, 330.0, epsilon = 1e-9);
    }
}
