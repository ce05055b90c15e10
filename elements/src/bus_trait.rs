// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

use canonical_error::CanonicalError;

// Register-addressed transport (I2C/SMBus style) used to talk to a sensor.
// Implementations report any transport failure as an error; retry policy is
// the caller's business.
pub trait RegisterBus {
    // Reads `buffer.len()` consecutive bytes starting at `register` of the
    // device at `device_address`.
    fn read_block(&mut self, device_address: u16, register: u8,
                  buffer: &mut [u8]) -> Result<(), CanonicalError>;

    // Writes a single byte to `register` of the device at `device_address`.
    fn write_byte(&mut self, device_address: u16, register: u8, value: u8)
                  -> Result<(), CanonicalError>;
}
