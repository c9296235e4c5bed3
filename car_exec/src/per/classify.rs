//! # Colour classification
//!
//! Quantises each raw camera sample into one of a small closed set of
//! colours. The track markings are painted in saturated primaries so a simple
//! dominant-channel test is enough, a nearest-palette lookup is available for
//! cameras with a stronger colour cast.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use car_if::eqpt::cam::{Frame, Rgb};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::params::{ClassifyMode, ClassifyParams};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Palette used by [`ClassifyMode::NearestPalette`], in tie-break order.
pub const PALETTE: [(Color, Rgb); 7] = [
    (Color::Red, Rgb::new(255, 0, 0)),
    (Color::Green, Rgb::new(0, 255, 0)),
    (Color::Blue, Rgb::new(0, 0, 255)),
    (Color::White, Rgb::new(255, 255, 255)),
    (Color::Gray, Rgb::new(122, 122, 122)),
    (Color::Purple, Rgb::new(148, 0, 211)),
    (Color::Black, Rgb::new(0, 0, 0)),
];

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A pixel position in a frame, origin in the top left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

/// A frame in which every pixel has been classified.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedFrame {
    colors: Array2<Color>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The colours a pixel can be classified as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    Red,
    Green,
    Blue,
    Black,
    White,
    Gray,
    Purple,
    Background,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Position {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

impl Color {
    /// Representative RGB value, used when rendering a classified frame.
    pub fn to_rgb(self) -> Rgb {
        match self {
            Color::Background => Rgb::new(64, 64, 64),
            c => PALETTE
                .iter()
                .find(|(p, _)| *p == c)
                .map(|(_, rgb)| *rgb)
                .unwrap_or_default(),
        }
    }
}

impl ClassifiedFrame {
    /// Wrap an existing colour array, indexed `[(y, x)]`.
    pub fn new(colors: Array2<Color>) -> Self {
        Self { colors }
    }

    /// A frame with every pixel set to `color`.
    pub fn filled(width: usize, height: usize, color: Color) -> Self {
        Self {
            colors: Array2::from_elem((height, width), color),
        }
    }

    pub fn width(&self) -> usize {
        self.colors.ncols()
    }

    pub fn height(&self) -> usize {
        self.colors.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Colour at `pos`, or `None` outside the frame.
    pub fn get(&self, pos: Position) -> Option<Color> {
        self.colors.get((pos.y, pos.x)).copied()
    }

    /// Set the colour at `pos`, returning false if it is outside the frame.
    pub fn set(&mut self, pos: Position, color: Color) -> bool {
        match self.colors.get_mut((pos.y, pos.x)) {
            Some(c) => {
                *c = color;
                true
            }
            None => false,
        }
    }

    /// Iterate over every pixel in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (Position, Color)> + '_ {
        self.colors
            .indexed_iter()
            .map(|((y, x), c)| (Position::new(x, y), *c))
    }

    /// Iterate over the colours of a single row. Empty if the row doesn't
    /// exist.
    pub fn row(&self, y: usize) -> impl Iterator<Item = Color> + '_ {
        let cols = if y < self.height() { self.width() } else { 0 };
        (0..cols).filter_map(move |x| self.colors.get((y, x)).copied())
    }

    pub fn colors(&self) -> &Array2<Color> {
        &self.colors
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Classify a whole frame.
///
/// Border rows are forced to `Purple`, then the single-row inversion
/// correction pass is run if enabled. Never fails, an empty frame gives an
/// empty classified frame.
pub fn classify_frame(frame: &Frame, params: &ClassifyParams) -> ClassifiedFrame {
    let first = Array2::from_shape_fn((frame.height(), frame.width()), |(y, x)| {
        if y < params.border_rows {
            return Color::Purple;
        }
        match frame.get(x, y) {
            Some(rgb) => classify_pixel(rgb, params),
            None => Color::Background,
        }
    });

    if !params.correct_inversions {
        return ClassifiedFrame::new(first);
    }

    // Corrections read the first pass only so they never cascade down a column
    let corrected = Array2::from_shape_fn(first.dim(), |(y, x)| {
        let pixel = first[(y, x)];
        match (pixel, first.get((y + 1, x)).copied()) {
            (Color::Green, Some(Color::Red)) => Color::Red,
            (Color::Red, Some(Color::Green)) => Color::Green,
            _ => pixel,
        }
    });

    ClassifiedFrame::new(corrected)
}

/// Classify a single pixel.
pub fn classify_pixel(rgb: Rgb, params: &ClassifyParams) -> Color {
    match params.mode {
        ClassifyMode::Dominant => dominant_channel(rgb, params.dominance_threshold),
        ClassifyMode::NearestPalette => nearest_palette(rgb),
    }
}

/// Classify by the channel which exceeds both others by more than
/// `threshold`, checking red, then green, then blue.
pub fn dominant_channel(rgb: Rgb, threshold: i16) -> Color {
    let (r, g, b) = (rgb.r as i16, rgb.g as i16, rgb.b as i16);

    if r - g.max(b) > threshold {
        Color::Red
    } else if g - r.max(b) > threshold {
        Color::Green
    } else if b - r.max(g) > threshold {
        Color::Blue
    } else {
        Color::Black
    }
}

/// Classify as the nearest palette entry by squared euclidean distance.
pub fn nearest_palette(rgb: Rgb) -> Color {
    let dist = |p: &Rgb| {
        let dr = rgb.r as i32 - p.r as i32;
        let dg = rgb.g as i32 - p.g as i32;
        let db = rgb.b as i32 - p.b as i32;
        dr * dr + dg * dg + db * db
    };

    // min_by_key keeps the first of equal elements, giving the tie-break order
    PALETTE
        .iter()
        .min_by_key(|(_, p)| dist(p))
        .map(|(c, _)| *c)
        .unwrap_or(Color::Black)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
