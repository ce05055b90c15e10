// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
use canonical_error::{CanonicalError, internal_error,
                      invalid_argument_error, out_of_range_error,
                      unavailable_error};
use log::info;

use pi_level_elements::display_trait::{PixelDisplay, Rgb};

pub const WIDTH: usize = 16;
pub const HEIGHT: usize = 16;

// Every frame starts with this byte, followed by WIDTH*HEIGHT RGB triples.
const START_OF_FRAME: u8 = 0x72;
const SPI_CLOCK_HZ: u32 = 9_000_000;

// In-memory display: the pixel buffer and brightness, independent of the SPI
// link. UnicornHatHd wraps one and sends frame() on show(); used on its own
// it is a display whose show() has nowhere to flush to.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    pixels: [[Rgb; HEIGHT]; WIDTH],
    brightness: f64,
}

impl Default for PixelBuffer {
    fn default() -> Self {
        PixelBuffer{pixels: [[Rgb::BLACK; HEIGHT]; WIDTH], brightness: 1.0}
    }
}

impl PixelBuffer {
    pub fn get_pixel(&self, x: usize, y: usize) -> Option<Rgb> {
        self.pixels.get(x).and_then(|column| column.get(y)).copied()
    }

    pub fn brightness(&self) -> f64 {
        self.brightness
    }

    // Wire format: start byte then pixels in column-major order (x outer,
    // y inner), each channel scaled by brightness and truncated.
    pub fn frame(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(1 + WIDTH * HEIGHT * 3);
        frame.push(START_OF_FRAME);
        for column in &self.pixels {
            for pixel in column {
                for channel in [pixel.r, pixel.g, pixel.b] {
                    frame.push((channel as f64 * self.brightness) as u8);
                }
            }
        }
        frame
    }
}

impl PixelDisplay for PixelBuffer {
    fn dimensions(&self) -> (usize, usize) {
        (WIDTH, HEIGHT)
    }

    fn set_brightness(&mut self, level: f64) -> Result<(), CanonicalError> {
        if !(0.0..=1.0).contains(&level) {
            return Err(invalid_argument_error(
                &format!("Brightness {} not in [0.0, 1.0]", level)));
        }
        self.brightness = level;
        Ok(())
    }

    fn clear(&mut self) {
        self.pixels = [[Rgb::BLACK; HEIGHT]; WIDTH];
    }

    fn set_pixel(&mut self, x: usize, y: usize, color: Rgb)
                 -> Result<(), CanonicalError> {
        if x >= WIDTH || y >= HEIGHT {
            return Err(out_of_range_error(
                &format!("Pixel ({}, {}) outside {}x{} grid", x, y, WIDTH, HEIGHT)));
        }
        self.pixels[x][y] = color;
        Ok(())
    }

    fn show(&mut self) -> Result<(), CanonicalError> {
        Ok(())
    }
}

// Pimoroni Unicorn HAT HD: 16x16 RGB LEDs behind a microcontroller that
// accepts whole frames over SPI0, chip enable 0.
pub struct UnicornHatHd {
    spi: Spi,
    buffer: PixelBuffer,
}

impl UnicornHatHd {
    pub fn new() -> Result<Self, CanonicalError> {
        let spi = Spi::new(Bus::Spi0, SlaveSelect::Ss0, SPI_CLOCK_HZ, Mode::Mode0)
            .map_err(|e| unavailable_error(
                &format!("Failed to initialize SPI: {:?}", e)))?;
        info!("Unicorn HAT HD on SPI0 at {} Hz", SPI_CLOCK_HZ);
        Ok(UnicornHatHd{spi, buffer: PixelBuffer::default()})
    }
}

impl PixelDisplay for UnicornHatHd {
    fn dimensions(&self) -> (usize, usize) {
        self.buffer.dimensions()
    }

    fn set_brightness(&mut self, level: f64) -> Result<(), CanonicalError> {
        self.buffer.set_brightness(level)
    }

    fn clear(&mut self) {
        self.buffer.clear();
    }

    fn set_pixel(&mut self, x: usize, y: usize, color: Rgb)
                 -> Result<(), CanonicalError> {
        self.buffer.set_pixel(x, y, color)
    }

    fn show(&mut self) -> Result<(), CanonicalError> {
        let frame = self.buffer.frame();
        let written = self.spi.write(&frame)
            .map_err(|e| internal_error(
                &format!("Failed to write frame: {:?}", e)))?;
        if written != frame.len() {
            return Err(internal_error(
                &format!("Short frame write: {} of {} bytes", written, frame.len())));
        }
        Ok(())
    }
}

// mod tests.
