// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

use pi_level::imu6050::{Mpu6050, scale_sample};
use pi_level::retry::{RetryPolicy, ThreadSleeper};
use pi_level::rppal_bus::RppalI2cBus;

use canonical_error::CanonicalError;
use env_logger;

fn main() -> Result<(), CanonicalError> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Initializing MPU-6050...");
    let bus = RppalI2cBus::new(1)?;
    let mut mpu = Mpu6050::new(bus, RetryPolicy::default(), ThreadSleeper)?;
    if !mpu.who_am_i()? {
        log::warn!("Continuing anyway; readings may be meaningless");
    }

    // Read some sample data.
    for i in 0..5 {
        let raw = mpu.read_raw()?;
        let sample = scale_sample(&raw);
        log::info!("Sample {}: raw gyro {:?} raw accel {:?}",
                   i+1, raw.gyro, raw.accel);
        log::info!("Sample {}: Accel: x={:.3}g, y={:.3}g, z={:.3}g",
                   i+1, sample.accel.x, sample.accel.y, sample.accel.z);
        log::info!("Sample {}: Gyro: x={:.1}°/s, y={:.1}°/s, z={:.1}°/s",
                   i+1, sample.gyro.x, sample.gyro.y, sample.gyro.z);
        std::thread::sleep(std::time::Duration::from_millis(500));
    }

    Ok(())
}
