// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

use canonical_error::CanonicalError;

// Acceleration data from IMU.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AccelData {
    // g units (1.0 is standard gravity).
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

// Angular velocity data from IMU.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GyroData {
    // Degrees/second.
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

// Register counts as read from the device, before scaling. Index 0/1/2 is
// x/y/z.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawSample {
    pub gyro: [i16; 3],
    pub accel: [i16; 3],
}

// One simultaneous gyro + accelerometer reading in physical units.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ImuSample {
    pub accel: AccelData,
    pub gyro: GyroData,
}

pub trait ImuTrait {
    // Obtains a fresh sample. Transient transport failures are retried
    // internally; an error is returned only once the device is deemed
    // unreachable.
    fn read_all(&mut self) -> Result<ImuSample, CanonicalError>;

    // Returns the IMU's model.
    fn get_model(&self) -> String;
}
