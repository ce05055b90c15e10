// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::sleep;
use std::time::Duration;

use canonical_error::{CanonicalError, invalid_argument_error};
use log::{debug, info};

use pi_level_elements::display_trait::{PixelDisplay, Rgb};
use pi_level_elements::imu_trait::ImuTrait;

use crate::tilt_estimator::{FilterParams, GridMapping, GridPoint, TiltEstimator};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelConfig {
    // Nominal time between samples; also the dt used for gyro integration.
    pub loop_period: Duration,

    // Deducted from `loop_period` when sleeping, to account for the time the
    // read/compute/draw steps take.
    pub loop_overhead: Duration,

    pub color: Rgb,

    // 0.0 to 1.0.
    pub brightness: f64,
}

impl Default for LevelConfig {
    fn default() -> Self {
        LevelConfig{
            loop_period: Duration::from_millis(40),
            loop_overhead: Duration::from_millis(1),
            color: Rgb::WHITE,
            brightness: 1.0,
        }
    }
}

impl LevelConfig {
    pub fn sleep_duration(&self) -> Duration {
        self.loop_period.saturating_sub(self.loop_overhead)
    }
}

// Ties the IMU, the tilt estimator, and the LED grid together: each tick reads
// a sample, updates the estimate and lights the corresponding pixel.
pub struct LevelLoop<I: ImuTrait, D: PixelDisplay> {
    imu: I,
    display: D,
    estimator: TiltEstimator,
    config: LevelConfig,
}

impl<I: ImuTrait, D: PixelDisplay> LevelLoop<I, D> {
    // Reads the first sample, which seeds the angles and the gyro zero rate
    // offset; the sensor must be held still at this point.
    pub fn new(mut imu: I, mut display: D, params: FilterParams,
               mapping: GridMapping, config: LevelConfig)
               -> Result<Self, CanonicalError> {
        let (width, height) = display.dimensions();
        if mapping.max_index < 0 || mapping.max_index as usize >= width.min(height) {
            return Err(invalid_argument_error(
                &format!("Grid index bound {} does not fit {}x{} display",
                         mapping.max_index, width, height)));
        }
        display.set_brightness(config.brightness)?;
        let first = imu.read_all()?;
        let estimator = TiltEstimator::new(&first, params, mapping);
        info!("{} ready: alpha {:.4}, initial angles x={:.1}° y={:.1}°, \
               gyro offset x={:.2}°/s y={:.2}°/s",
              imu.get_model(), estimator.alpha(), estimator.angle_x(),
              estimator.angle_y(), estimator.gyro_offset().x,
              estimator.gyro_offset().y);
        Ok(LevelLoop{imu, display, estimator, config})
    }

    pub fn estimator(&self) -> &TiltEstimator {
        &self.estimator
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    // One read/update/draw cycle. Does not sleep.
    pub fn tick(&mut self) -> Result<GridPoint, CanonicalError> {
        let sample = self.imu.read_all()?;
        let point = self.estimator.step(&sample, self.config.loop_period);
        self.display.clear();
        self.display.set_pixel(point.roll, point.pitch, self.config.color)?;
        self.display.show()?;
        debug!("roll={} pitch={}", point.roll, point.pitch);
        Ok(point)
    }

    // Runs ticks at the configured period until `got_signal` is set, then
    // blanks the display. There is no catch-up if a tick runs long.
    pub fn run(&mut self, got_signal: Arc<AtomicBool>) -> Result<(), CanonicalError> {
        let delay = self.config.sleep_duration();
        let mut ticks: u64 = 0;
        while !got_signal.load(Ordering::Relaxed) {
            sleep(delay);
            self.tick()?;
            ticks += 1;
        }
        info!("Stopping after {} ticks", ticks);
        self.display.clear();
        self.display.show()
    }
}

// mod tests.
