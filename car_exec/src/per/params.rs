//! Perception parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use super::{
    blob::ColorFilter,
    classify::Color,
    target::{BlobSelection, TargetMode, TipMode},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the whole perception chain.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PerParams {
    pub classify: ClassifyParams,
    pub blob: BlobParams,
    pub target: TargetParams,
    pub bearing: BearingParams,
    pub overlay: OverlayParams,
}

/// Colour classification parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifyParams {
    /// How raw pixels are mapped onto colours.
    pub mode: ClassifyMode,

    /// Amount by which a channel must exceed both others to count as
    /// dominant.
    ///
    /// Units: 8-bit channel counts
    pub dominance_threshold: i16,

    /// Number of rows at the top of the frame forced to `Purple`. The top of
    /// the camera image sees past the track and is too noisy to use.
    pub border_rows: usize,

    /// Correct the red/green swap the sensor produces on horizontal edges.
    pub correct_inversions: bool,
}

/// Blob detection parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BlobParams {
    /// Regions with fewer pixels than this are discarded.
    pub min_blob_size: usize,

    /// Which pixels are considered at all.
    pub filter: ColorFilter,
}

/// Target estimation parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TargetParams {
    /// Colour of the guidance marker.
    pub guidance_color: Color,

    /// Which of the guidance blobs is used.
    pub selection: BlobSelection,

    /// How the target point is derived from the blob.
    pub mode: TargetMode,

    /// A pixel must be this many rows higher than the current tip to replace
    /// it outright.
    ///
    /// Units: pixels
    pub tip_row_margin: usize,

    /// Amount the held target moves down the frame on each tick without a
    /// detection.
    ///
    /// Units: pixels
    pub hold_decay_px: f64,

    /// Time constant of the low pass applied to each target coordinate.
    pub target_lowpass_tau: f64,
}

/// Steering error parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BearingParams {
    /// How the steering error is measured.
    pub strategy: ErrorStrategy,

    /// Colour of the track's left-hand marking.
    pub track_left_color: Color,

    /// Colour of the track's right-hand marking.
    pub track_right_color: Color,

    /// First row scanned by the colour ratio strategy.
    pub band_start: usize,

    /// Row after the last one scanned by the colour ratio strategy, `None`
    /// scans to the bottom of the frame.
    pub band_end: Option<usize>,

    /// A row needs more track pixels than this to start the sample.
    pub min_row_pixels: usize,

    /// Number of rows sampled once a track row is found.
    pub rows_to_sample: usize,

    /// Bearing origin in frame coordinates, `None` uses the centre of the
    /// bottom row.
    ///
    /// Units: pixels
    pub origin: Option<[f64; 2]>,

    /// Multiplier from bearing to steering error.
    ///
    /// Units: 1/degrees
    pub bearing_gain: f64,

    /// Time constant of the low pass applied to the error before the PID.
    pub error_lowpass_tau: f64,
}

/// Debug overlay parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OverlayParams {
    /// Length of the bearing line.
    ///
    /// Units: pixels
    pub line_length_px: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Pixel classification modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ClassifyMode {
    /// Dominant channel above a threshold, otherwise black.
    Dominant,

    /// Nearest entry of the fixed palette.
    NearestPalette,
}

/// Steering error strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ErrorStrategy {
    /// Balance between the two track marking colours near the top of the
    /// frame.
    ColorRatio,

    /// Bearing from the car to the guidance target.
    GeometricBearing,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for ClassifyParams {
    fn default() -> Self {
        Self {
            mode: ClassifyMode::Dominant,
            dominance_threshold: 10,
            border_rows: 13,
            correct_inversions: true,
        }
    }
}

impl Default for BlobParams {
    fn default() -> Self {
        Self {
            min_blob_size: 30,
            filter: ColorFilter::Only(Color::Blue),
        }
    }
}

impl Default for TargetParams {
    fn default() -> Self {
        Self {
            guidance_color: Color::Blue,
            selection: BlobSelection::Largest,
            mode: TargetMode::Blend {
                tip_mode: TipMode::FurthestFromCenter,
                tip_weight: 0.6,
            },
            tip_row_margin: 3,
            hold_decay_px: 1.0,
            target_lowpass_tau: 1.0,
        }
    }
}

impl Default for BearingParams {
    fn default() -> Self {
        Self {
            strategy: ErrorStrategy::GeometricBearing,
            track_left_color: Color::Green,
            track_right_color: Color::Red,
            band_start: 0,
            band_end: None,
            min_row_pixels: 5,
            rows_to_sample: 4,
            origin: None,
            bearing_gain: 1.0 / 90.0,
            error_lowpass_tau: 0.75,
        }
    }
}

impl Default for OverlayParams {
    fn default() -> Self {
        Self {
            line_length_px: 20.0,
        }
    }
}
