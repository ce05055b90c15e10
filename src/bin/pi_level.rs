// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use canonical_error::CanonicalError;
use clap::Parser;
use log::{info, warn};
use tracing_appender::non_blocking::NonBlockingBuilder;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, registry, EnvFilter};

use pi_level::imu6050::Mpu6050;
use pi_level::level_loop::{LevelConfig, LevelLoop};
use pi_level::retry::{RetryPolicy, ThreadSleeper};
use pi_level::rppal_bus::RppalI2cBus;
use pi_level::tilt_estimator::{FilterParams, GridMapping};
use pi_level::unicorn_hat_hd::UnicornHatHd;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about=None)]
struct Args {
    /// I2C bus number (/dev/i2c-N) the MPU-6050 is attached to.
    #[arg(long, default_value = "1")]
    i2c_bus: u8,

    /// Complementary filter time constant, seconds. Tilts lasting longer
    /// than this are taken from the accelerometer rather than the gyro.
    #[arg(long, default_value = "0.5")]
    tau: f64,

    /// Sample period, seconds, used to derive the filter coefficient. Note
    /// that this historically differs from --loop_period.
    #[arg(long, default_value = "0.01")]
    filter_sample_period: f64,

    /// Derive the filter coefficient from --loop_period instead of
    /// --filter_sample_period.
    #[arg(long, default_value_t = false)]
    match_filter_to_loop: bool,

    /// Time between samples, seconds. Also used as the gyro integration
    /// step.
    #[arg(long, value_parser = parse_duration, default_value = "0.04")]
    loop_period: Duration,

    /// Subtracted from --loop_period when sleeping between samples, seconds.
    #[arg(long, value_parser = parse_duration, default_value = "0.001")]
    loop_overhead: Duration,

    /// Display pixels per degree of tilt.
    #[arg(long, default_value = "0.15")]
    slope: f64,

    /// Display pixel corresponding to level.
    #[arg(long, default_value = "8")]
    middle: i64,

    /// LED brightness, 0.0 to 1.0.
    #[arg(long, default_value = "1.0")]
    brightness: f64,

    /// Sensor read attempts before the sensor is deemed unreachable.
    #[arg(long, default_value = "500")]
    retry_attempts: u32,

    /// Pause between sensor read attempts, seconds.
    #[arg(long, value_parser = parse_duration, default_value = "0.002")]
    retry_delay: Duration,

    /// Directory for the log file. If empty, logs go to stdout only.
    #[arg(long, default_value = "")]
    log_dir: String,

    /// Log file name prefix; files rotate daily.
    #[arg(long, default_value = "pi_level_log.txt")]
    log_file: String,
}

// Adapted from
// https://stackoverflow.com/questions/72313616/using-claps-deriveparser-how-can-i-accept-a-stdtimeduration
fn parse_duration(arg: &str)
                  -> Result<std::time::Duration, std::num::ParseFloatError> {
    let seconds = arg.parse()?;
    Ok(std::time::Duration::from_secs_f64(seconds))
}

fn main() -> Result<(), CanonicalError> {
    let args = Args::parse();

    // Set up logging.
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (non_blocking_stdout, _stdout_guard) = NonBlockingBuilder::default()
        .lossy(false)
        .finish(std::io::stdout());
    let mut _file_guard = None;
    let file_layer = if args.log_dir.is_empty() {
        None
    } else {
        let file_appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(&args.log_file)
            .max_log_files(10)
            .build(&args.log_dir)
            .map_err(|e| canonical_error::invalid_argument_error(
                &format!("Cannot log to {}: {:?}", args.log_dir, e)))?;
        let (non_blocking_file, guard) = NonBlockingBuilder::default()
            .lossy(false)
            .finish(file_appender);
        _file_guard = Some(guard);
        Some(fmt::layer().with_ansi(false).with_writer(non_blocking_file))
    };
    registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(non_blocking_stdout))
        .with(file_layer)
        .init();

    let params = if args.match_filter_to_loop {
        FilterParams::matched(args.tau, args.loop_period)?
    } else {
        FilterParams::new(args.tau, args.filter_sample_period)?
    };
    if (params.delta_t() - args.loop_period.as_secs_f64()).abs() > 1e-9 {
        warn!("Filter coefficient derived from {}s sample period, but loop \
               runs every {}s", params.delta_t(), args.loop_period.as_secs_f64());
    }
    let mapping = GridMapping{middle: args.middle, slope: args.slope,
                              ..Default::default()};
    let config = LevelConfig{
        loop_period: args.loop_period,
        loop_overhead: args.loop_overhead,
        brightness: args.brightness,
        ..Default::default()
    };
    let retry = RetryPolicy::new(args.retry_attempts, args.retry_delay)?;

    let got_signal = Arc::new(AtomicBool::new(false));
    let got_signal2 = got_signal.clone();
    ctrlc::set_handler(move || {
        info!("Got control-c");
        got_signal2.store(true, Ordering::Relaxed);
    }).map_err(|e| canonical_error::internal_error(
        &format!("Cannot install signal handler: {:?}", e)))?;

    let bus = RppalI2cBus::new(args.i2c_bus)?;
    let mpu = Mpu6050::new(bus, retry, ThreadSleeper)?;
    let display = UnicornHatHd::new()?;

    info!("Hold the sensor still and level while starting up");
    let mut level = LevelLoop::new(mpu, display, params, mapping, config)?;
    level.run(got_signal)?;
    info!("Exiting");
    Ok(())
}
