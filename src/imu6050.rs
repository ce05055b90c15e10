// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

use canonical_error::CanonicalError;
use log::{debug, info, warn};

use pi_level_elements::bus_trait::RegisterBus;
use pi_level_elements::imu_trait::{
    AccelData, GyroData, ImuSample, ImuTrait, RawSample};

use crate::retry::{RetryPolicy, Sleeper, ThreadSleeper};

// MPU-6050 constants.
pub const MPU6050_ADDR: u16 = 0x68;
const WHO_AM_I_REG: u8 = 0x75;
const PWR_MGMT_1_REG: u8 = 0x6B;
const EXPECTED_WHO_AM_I: u8 = 0x68;

// Data register addresses (starting addresses for consecutive reads).
const ACCEL_XOUT_H: u8 = 0x3B;  // 6 bytes: X_H, X_L, Y_H, Y_L, Z_H, Z_L
const GYRO_XOUT_H: u8 = 0x43;   // 6 bytes: X_H, X_L, Y_H, Y_L, Z_H, Z_L

// Scale factors for converting raw values to physical units.
pub const ACCEL_SCALE_FACTOR: f64 = 16384.0;  // LSB/g, ±2g range.
pub const GYRO_SCALE_FACTOR: f64 = 131.0;  // LSB/(°/s), ±250°/s range.

// Reinterprets a 16 bit register value as two's complement.
pub fn twos_complement(value: u16) -> i16 {
    let value = value as i32;
    let signed = if value >= 0x8000 {
        -((0xFFFF - value) + 1)
    } else {
        value
    };
    signed as i16
}

// Registers are big endian: high byte first.
pub fn decode_word(high: u8, low: u8) -> i16 {
    twos_complement(((high as u16) << 8) | low as u16)
}

pub fn decode_xyz(buffer: &[u8; 6]) -> [i16; 3] {
    [decode_word(buffer[0], buffer[1]),
     decode_word(buffer[2], buffer[3]),
     decode_word(buffer[4], buffer[5])]
}

pub fn scale_sample(raw: &RawSample) -> ImuSample {
    ImuSample {
        accel: AccelData {
            x: raw.accel[0] as f64 / ACCEL_SCALE_FACTOR,
            y: raw.accel[1] as f64 / ACCEL_SCALE_FACTOR,
            z: raw.accel[2] as f64 / ACCEL_SCALE_FACTOR,
        },
        gyro: GyroData {
            x: raw.gyro[0] as f64 / GYRO_SCALE_FACTOR,
            y: raw.gyro[1] as f64 / GYRO_SCALE_FACTOR,
            z: raw.gyro[2] as f64 / GYRO_SCALE_FACTOR,
        },
    }
}

pub struct Mpu6050<B: RegisterBus, S: Sleeper = ThreadSleeper> {
    bus: B,
    retry: RetryPolicy,
    sleeper: S,
}

/// Low level interface to the MPU-6050 over a register bus. Provides scaled
/// acceleration and angle rate data; this layer does not provide zero
/// calibration or data integration.
impl<B: RegisterBus, S: Sleeper> Mpu6050<B, S> {
    /// Wakes the device (it powers up in sleep mode). Returns error if the
    /// device did not respond within the retry policy.
    pub fn new(bus: B, retry: RetryPolicy, sleeper: S)
               -> Result<Self, CanonicalError> {
        let mut mpu = Mpu6050{bus, retry, sleeper};
        mpu.wake_up()?;
        info!("MPU-6050 awake at address 0x{:02X}", MPU6050_ADDR);
        Ok(mpu)
    }

    fn wake_up(&mut self) -> Result<(), CanonicalError> {
        let bus = &mut self.bus;
        self.retry.run(&mut self.sleeper, || {
            bus.write_byte(MPU6050_ADDR, PWR_MGMT_1_REG, 0)
        })
    }

    /// Reads the identity register. Returns true if it matches a genuine
    /// MPU-6050; other values are logged, since compatible parts report
    /// different ids.
    pub fn who_am_i(&mut self) -> Result<bool, CanonicalError> {
        let bus = &mut self.bus;
        let mut buffer = [0u8; 1];
        self.retry.run(&mut self.sleeper, || {
            bus.read_block(MPU6050_ADDR, WHO_AM_I_REG, &mut buffer)
        })?;
        let who_am_i = buffer[0];
        if who_am_i == EXPECTED_WHO_AM_I {
            info!("Device verified: MPU-6050 (WHO_AM_I: 0x{:02X})", who_am_i);
            Ok(true)
        } else {
            warn!("Unexpected device ID: expected 0x{:02X}, got 0x{:02X}",
                  EXPECTED_WHO_AM_I, who_am_i);
            Ok(false)
        }
    }

    /// Reads the gyro and accelerometer blocks. Both reads are repeated if
    /// either fails, so the returned values come from one attempt.
    pub fn read_raw(&mut self) -> Result<RawSample, CanonicalError> {
        let bus = &mut self.bus;
        let (gyro_buf, accel_buf) = self.retry.run(&mut self.sleeper, || {
            let mut gyro_buf = [0u8; 6];
            let mut accel_buf = [0u8; 6];
            bus.read_block(MPU6050_ADDR, GYRO_XOUT_H, &mut gyro_buf)?;
            bus.read_block(MPU6050_ADDR, ACCEL_XOUT_H, &mut accel_buf)?;
            Ok((gyro_buf, accel_buf))
        })?;
        let raw = RawSample{gyro: decode_xyz(&gyro_buf),
                            accel: decode_xyz(&accel_buf)};
        debug!("Raw gyro: {:?} accel: {:?}", raw.gyro, raw.accel);
        Ok(raw)
    }

    #[cfg(test)]
    fn into_bus(self) -> B {
        self.bus
    }
}

impl<B: RegisterBus, S: Sleeper> ImuTrait for Mpu6050<B, S> {
    fn read_all(&mut self) -> Result<ImuSample, CanonicalError> {
        Ok(scale_sample(&self.read_raw()?))
    }

    fn get_model(&self) -> String {
        "MPU-6050".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    extern crate approx;
    use approx::assert_abs_diff_eq;
    use canonical_error::{CanonicalErrorCode, internal_error};
    use super::*;

    // Register file keyed by start address, with scripted failures.
    #[derive(Default)]
    struct FakeBus {
        blocks: HashMap<u8, Vec<u8>>,
        writes: Vec<(u16, u8, u8)>,
        failures_left: usize,
        reads: usize,
    }

    impl RegisterBus for FakeBus {
        fn read_block(&mut self, device_address: u16, register: u8,
                      buffer: &mut [u8]) -> Result<(), CanonicalError> {
            assert_eq!(device_address, MPU6050_ADDR);
            self.reads += 1;
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(internal_error("Remote I/O error"));
            }
            let block = self.blocks.get(&register).unwrap();
            buffer.copy_from_slice(&block[..buffer.len()]);
            Ok(())
        }

        fn write_byte(&mut self, device_address: u16, register: u8, value: u8)
                      -> Result<(), CanonicalError> {
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(internal_error("Remote I/O error"));
            }
            self.writes.push((device_address, register, value));
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingSleeper {
        count: usize,
        total: Duration,
    }

    impl Sleeper for CountingSleeper {
        fn sleep(&mut self, duration: Duration) {
            self.count += 1;
            self.total += duration;
        }
    }

    fn level_bus() -> FakeBus {
        let mut bus = FakeBus::default();
        // Gyro x = 131 (1°/s), y = -262 (-2°/s), z = 0.
        bus.blocks.insert(GYRO_XOUT_H, vec![0x00, 0x83, 0xFE, 0xFA, 0x00, 0x00]);
        // Accel z = 16384 (1g).
        bus.blocks.insert(ACCEL_XOUT_H, vec![0x00, 0x00, 0x00, 0x00, 0x40, 0x00]);
        bus.blocks.insert(WHO_AM_I_REG, vec![0x68]);
        bus
    }

    #[test]
    fn test_twos_complement_whole_domain() {
        for v in 0..=u16::MAX {
            let decoded = twos_complement(v) as i32;
            if v < 0x8000 {
                assert_eq!(decoded, v as i32);
            } else {
                assert_eq!(decoded, v as i32 - 65536);
            }
            assert_eq!(decoded as i16, v as i16);
        }
        assert_eq!(twos_complement(0x7FFF), i16::MAX);
        assert_eq!(twos_complement(0x8000), i16::MIN);
        assert_eq!(twos_complement(0xFFFF), -1);
    }

    #[test]
    fn test_decode_word_big_endian() {
        assert_eq!(decode_word(0x40, 0x00), 16384);
        assert_eq!(decode_word(0xC0, 0x00), -16384);
        assert_eq!(decode_xyz(&[0x00, 0x01, 0xFF, 0xFE, 0x80, 0x00]),
                   [1, -2, -32768]);
    }

    #[test]
    fn test_scaling_is_linear() {
        for raw in [-16000i16, -131, 1, 77, 131, 8192, 16000] {
            let single = scale_sample(&RawSample{gyro: [raw; 3], accel: [raw; 3]});
            let double = scale_sample(
                &RawSample{gyro: [2 * raw; 3], accel: [2 * raw; 3]});
            assert_abs_diff_eq!(double.gyro.x, 2.0 * single.gyro.x, epsilon = 1e-12);
            assert_abs_diff_eq!(double.accel.z, 2.0 * single.accel.z, epsilon = 1e-12);
        }
        let unit = scale_sample(&RawSample{gyro: [131, 0, 0], accel: [0, 0, 16384]});
        assert_eq!(unit.gyro.x, 1.0);
        assert_eq!(unit.accel.z, 1.0);
    }

    #[test]
    fn test_new_wakes_device() {
        let mpu = Mpu6050::new(level_bus(), RetryPolicy::default(),
                               CountingSleeper::default()).unwrap();
        let bus = mpu.into_bus();
        assert_eq!(bus.writes, vec![(MPU6050_ADDR, PWR_MGMT_1_REG, 0)]);
    }

    #[test]
    fn test_read_all_scales() {
        let mut mpu = Mpu6050::new(level_bus(), RetryPolicy::default(),
                                   CountingSleeper::default()).unwrap();
        let sample = mpu.read_all().unwrap();
        assert_abs_diff_eq!(sample.gyro.x, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(sample.gyro.y, -2.0, epsilon = 1e-12);
        assert_eq!(sample.gyro.z, 0.0);
        assert_eq!(sample.accel, AccelData{x: 0.0, y: 0.0, z: 1.0});
        assert!(mpu.who_am_i().unwrap());
        assert_eq!(mpu.get_model(), "MPU-6050");
    }

    #[test]
    fn test_raw_and_scaled_from_one_transaction() {
        let mut mpu = Mpu6050::new(level_bus(), RetryPolicy::default(),
                                   CountingSleeper::default()).unwrap();
        let raw = mpu.read_raw().unwrap();
        assert_eq!(mpu.bus.reads, 2);
        assert_eq!(raw, RawSample{gyro: [131, -262, 0], accel: [0, 0, 16384]});
        assert_eq!(scale_sample(&raw), mpu.read_all().unwrap());
        assert_eq!(mpu.bus.reads, 4);
    }

    #[test]
    fn test_read_all_retries_transient_failures() {
        let mut mpu = Mpu6050::new(level_bus(), RetryPolicy::default(),
                                   CountingSleeper::default()).unwrap();
        mpu.bus.failures_left = 7;
        let sample = mpu.read_all().unwrap();
        assert_eq!(sample.accel.z, 1.0);
        assert!(mpu.sleeper.count >= 7);
        assert!(mpu.sleeper.total >= Duration::from_millis(2) * 7);
    }

    #[test]
    fn test_read_all_gives_up() {
        let policy = RetryPolicy::new(4, Duration::from_millis(2)).unwrap();
        let mut mpu = Mpu6050::new(level_bus(), policy,
                                   CountingSleeper::default()).unwrap();
        mpu.bus.failures_left = usize::MAX;
        let err = mpu.read_all().unwrap_err();
        assert!(err.code == CanonicalErrorCode::Unavailable);
        assert_eq!(mpu.bus.reads, 4);
        assert_eq!(mpu.sleeper.count, 3);
    }

    #[test]
    fn test_wrong_device_id_is_not_fatal() {
        let mut bus = level_bus();
        bus.blocks.insert(WHO_AM_I_REG, vec![0x70]);
        let mut mpu = Mpu6050::new(bus, RetryPolicy::default(),
                                   CountingSleeper::default()).unwrap();
        assert!(!mpu.who_am_i().unwrap());
    }

}  // mod tests.
