//! # Camera Equipment Module
//!
//! Frames are stored row-major in an `ndarray::Array2`, indexed `[(y, x)]`
//! with the origin in the top left corner of the image.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use image::RgbImage;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A single raw camera sample, 8 bits per channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// A rectangular camera frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pixels: Array2<Rgb>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors raised while building a frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("Row {row} has {found} pixels, expected {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Cannot shape the pixel data into a frame: {0}")]
    Shape(String),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl Frame {
    /// Wrap an existing pixel array, indexed `[(y, x)]`.
    pub fn new(pixels: Array2<Rgb>) -> Self {
        Self { pixels }
    }

    /// A frame with every pixel set to `rgb`.
    pub fn filled(width: usize, height: usize, rgb: Rgb) -> Self {
        Self {
            pixels: Array2::from_elem((height, width), rgb),
        }
    }

    /// A frame with no pixels at all.
    pub fn empty() -> Self {
        Self::filled(0, 0, Rgb::default())
    }

    /// Build a frame from a list of rows.
    ///
    /// All rows must be the same length, ragged input is rejected.
    pub fn from_rows(rows: Vec<Vec<Rgb>>) -> Result<Self, FrameError> {
        let height = rows.len();
        let width = rows.first().map(|r| r.len()).unwrap_or(0);

        let mut data = Vec::with_capacity(width * height);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != width {
                return Err(FrameError::Ragged {
                    row: i,
                    expected: width,
                    found: row.len(),
                });
            }
            data.extend(row);
        }

        Array2::from_shape_vec((height, width), data)
            .map(Self::new)
            .map_err(|e| FrameError::Shape(e.to_string()))
    }

    /// Convert a decoded camera image into a frame.
    pub fn from_rgb_image(image: &RgbImage) -> Self {
        let (width, height) = image.dimensions();

        let pixels = Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
            let p = image.get_pixel(x as u32, y as u32).0;
            Rgb::new(p[0], p[1], p[2])
        });

        Self { pixels }
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.pixels.ncols()
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.pixels.nrows()
    }

    /// True if the frame has no pixels.
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Get the pixel at `(x, y)`, or `None` if outside the frame.
    pub fn get(&self, x: usize, y: usize) -> Option<Rgb> {
        self.pixels.get((y, x)).copied()
    }

    /// Set the pixel at `(x, y)`. Returns false if the position is outside
    /// the frame, in which case nothing is written.
    pub fn set(&mut self, x: usize, y: usize, rgb: Rgb) -> bool {
        match self.pixels.get_mut((y, x)) {
            Some(p) => {
                *p = rgb;
                true
            }
            None => false,
        }
    }

    /// Raw access to the pixel array.
    pub fn pixels(&self) -> &Array2<Rgb> {
        &self.pixels
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
