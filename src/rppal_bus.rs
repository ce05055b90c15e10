// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

use rppal::i2c::I2c;
use canonical_error::{CanonicalError, internal_error, unavailable_error};
use log::info;

use pi_level_elements::bus_trait::RegisterBus;

// RegisterBus on a Raspberry Pi I2C controller (/dev/i2c-N).
pub struct RppalI2cBus {
    i2c: I2c,

    // Slave address most recently set on `i2c`, if any.
    slave_address: Option<u16>,
}

impl RppalI2cBus {
    // `bus` is the N of /dev/i2c-N; the 40 pin header is bus 1 on all but
    // the earliest boards.
    pub fn new(bus: u8) -> Result<Self, CanonicalError> {
        let i2c = I2c::with_bus(bus)
            .map_err(|e| unavailable_error(
                &format!("Failed to initialize I2C bus {}: {:?}", bus, e)))?;
        info!("Opened I2C bus {} at {} Hz", bus,
              i2c.clock_speed().unwrap_or(0));
        Ok(RppalI2cBus{i2c, slave_address: None})
    }

    fn select(&mut self, device_address: u16) -> Result<(), CanonicalError> {
        if self.slave_address == Some(device_address) {
            return Ok(());
        }
        self.i2c.set_slave_address(device_address)
            .map_err(|e| internal_error(
                &format!("Failed to set I2C slave address 0x{:02X}: {:?}",
                         device_address, e)))?;
        self.slave_address = Some(device_address);
        Ok(())
    }
}

impl RegisterBus for RppalI2cBus {
    fn read_block(&mut self, device_address: u16, register: u8,
                  buffer: &mut [u8]) -> Result<(), CanonicalError> {
        self.select(device_address)?;
        self.i2c.write_read(&[register], buffer)
            .map_err(|e| internal_error(
                &format!("Failed to read register 0x{:02X}: {:?}", register, e)))
    }

    fn write_byte(&mut self, device_address: u16, register: u8, value: u8)
                  -> Result<(), CanonicalError> {
        self.select(device_address)?;
        self.i2c.write(&[register, value])
            .map_err(|e| internal_error(
                &format!("Failed to write register 0x{:02X}: {:?}", register, e)))?;
        Ok(())
    }
}
