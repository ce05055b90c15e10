// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

use canonical_error::CanonicalError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb{r: 0, g: 0, b: 0};
    pub const WHITE: Rgb = Rgb{r: 255, g: 255, b: 255};

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb{r, g, b}
    }
}

// A buffered LED grid. Drawing calls only touch the buffer; nothing appears
// on the physical panel until show() is called.
pub trait PixelDisplay {
    // (width, height) in pixels. Valid coordinates are 0..width, 0..height.
    fn dimensions(&self) -> (usize, usize);

    // `level` must be within [0.0, 1.0], else invalid_argument error. Takes
    // effect at the next show().
    fn set_brightness(&mut self, level: f64) -> Result<(), CanonicalError>;

    // Sets every pixel of the buffer to black.
    fn clear(&mut self);

    // Returns out_of_range error if (x, y) is outside of dimensions().
    fn set_pixel(&mut self, x: usize, y: usize, color: Rgb)
                 -> Result<(), CanonicalError>;

    // Flushes the buffer to the physical output.
    fn show(&mut self) -> Result<(), CanonicalError>;
}
