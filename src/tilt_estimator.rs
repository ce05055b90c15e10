// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

use std::time::Duration;

use canonical_error::{CanonicalError, invalid_argument_error};
use log::debug;

use pi_level_elements::imu_trait::{GyroData, ImuSample};

// Complementary filter tuning. The gyro weighting is
// alpha = tau / (tau + delta_t).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterParams {
    // Time constant (seconds) beyond which the accelerometer is trusted over
    // the integrated gyro.
    tau: f64,

    // Sample period (seconds) that alpha is derived from. Note that this is
    // not necessarily the period the loop actually runs at; the historical
    // default of 0.01s is kept even though the loop period is 0.04s.
    delta_t: f64,
}

impl Default for FilterParams {
    fn default() -> Self {
        FilterParams{tau: 0.5, delta_t: 0.01}
    }
}

impl FilterParams {
    // Both values must be finite and non-negative, and not both zero, so
    // that alpha lies within [0, 1].
    pub fn new(tau: f64, delta_t: f64) -> Result<Self, CanonicalError> {
        if !tau.is_finite() || !delta_t.is_finite() ||
            tau < 0.0 || delta_t < 0.0 || tau + delta_t <= 0.0
        {
            return Err(invalid_argument_error(
                &format!("Invalid filter time constants: tau {} delta_t {}",
                         tau, delta_t)));
        }
        Ok(FilterParams{tau, delta_t})
    }

    // Derives alpha from the period the loop really samples at.
    pub fn matched(tau: f64, loop_period: Duration) -> Result<Self, CanonicalError> {
        FilterParams::new(tau, loop_period.as_secs_f64())
    }

    pub fn tau(&self) -> f64 {
        self.tau
    }

    pub fn delta_t(&self) -> f64 {
        self.delta_t
    }

    pub fn alpha(&self) -> f64 {
        self.tau / (self.tau + self.delta_t)
    }
}

// Maps a filtered angle (degrees) onto one axis of the LED grid. The default
// slope spreads roughly ±53° across a 16 pixel axis with level at pixel 8.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridMapping {
    // Pixel index corresponding to 0°.
    pub middle: i64,
    // Pixels per degree.
    pub slope: f64,
    // Largest valid pixel index; results are clamped to [0, max_index].
    pub max_index: i64,
}

impl Default for GridMapping {
    fn default() -> Self {
        GridMapping{middle: 8, slope: 0.15, max_index: 15}
    }
}

impl GridMapping {
    pub fn map(&self, angle: f64) -> usize {
        // Float to int casts saturate, and NaN becomes 0.
        let offset = (self.slope * angle).floor() as i64;
        self.middle.saturating_add(offset).clamp(0, self.max_index.max(0)) as usize
    }
}

// Roll angle (degrees) implied by the gravity vector.
pub fn x_rotation(accel_y: f64, accel_z: f64) -> f64 {
    accel_y.atan2(accel_z).to_degrees()
}

// Pitch angle (degrees) implied by the gravity vector.
pub fn y_rotation(accel_x: f64, accel_z: f64) -> f64 {
    -accel_x.atan2(accel_z).to_degrees()
}

// Complementary filter update for one axis: the gyro-propagated previous
// estimate weighted by alpha, the accelerometer angle by (1 - alpha).
pub fn blend(alpha: f64, previous: f64, gyro_delta: f64, accel_angle: f64) -> f64 {
    alpha * (previous + gyro_delta) + (1.0 - alpha) * accel_angle
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridPoint {
    pub roll: usize,
    pub pitch: usize,
}

// Running roll/pitch estimate. Assumes the sensor is stationary when
// constructed; the first sample's gyro reading is taken as the zero rate
// offset for the lifetime of the estimator.
pub struct TiltEstimator {
    alpha: f64,
    mapping: GridMapping,

    // Filtered angles, degrees.
    angle_x: f64,
    angle_y: f64,

    gyro_offset: GyroData,
}

impl TiltEstimator {
    // Seeds the angles directly from `first_sample`'s accelerometer reading,
    // with no filtering.
    pub fn new(first_sample: &ImuSample, params: FilterParams,
               mapping: GridMapping) -> Self {
        let accel = &first_sample.accel;
        TiltEstimator{
            alpha: params.alpha(),
            mapping,
            angle_x: x_rotation(accel.y, accel.z),
            angle_y: y_rotation(accel.x, accel.z),
            gyro_offset: first_sample.gyro,
        }
    }

    // Folds in `sample`, taken `dt` after the previous one, and returns the
    // grid position of the updated estimate.
    pub fn step(&mut self, sample: &ImuSample, dt: Duration) -> GridPoint {
        let dt = dt.as_secs_f64();
        let gyro_x = sample.gyro.x - self.gyro_offset.x;
        let gyro_y = sample.gyro.y - self.gyro_offset.y;

        let gyro_delta_x = gyro_x * dt;
        let gyro_delta_y = gyro_y * dt;

        let accel = &sample.accel;
        let accel_angle_x = x_rotation(accel.y, accel.z);
        let accel_angle_y = y_rotation(accel.x, accel.z);

        self.angle_x = blend(self.alpha, self.angle_x, gyro_delta_x, accel_angle_x);
        self.angle_y = blend(self.alpha, self.angle_y, gyro_delta_y, accel_angle_y);
        debug!("angle_x={:.2} angle_y={:.2} (accel {:.2} {:.2})",
               self.angle_x, self.angle_y, accel_angle_x, accel_angle_y);

        self.grid_point()
    }

    pub fn grid_point(&self) -> GridPoint {
        GridPoint{roll: self.mapping.map(self.angle_x),
                  pitch: self.mapping.map(self.angle_y)}
    }

    pub fn angle_x(&self) -> f64 {
        self.angle_x
    }

    pub fn angle_y(&self) -> f64 {
        self.angle_y
    }

    pub fn gyro_offset(&self) -> GyroData {
        self.gyro_offset
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

// mod tests.
