//! # Debug overlay
//!
//! Draws the controller's view of a frame on top of the classified image:
//! the raw target, the filtered target and the bearing being steered along.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use image::RgbImage;
use nalgebra::Point2;

use super::{
    classify::{ClassifiedFrame, Color, Position},
    params::OverlayParams,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Everything drawn onto the overlay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayMarks {
    /// Target straight from the estimator.
    pub raw_target: Option<Point2<f64>>,

    /// Target after low pass filtering.
    pub filtered_target: Option<Point2<f64>>,

    /// Bearing origin.
    pub origin: Point2<f64>,

    /// Bearing in degrees, no line is drawn if `None`.
    pub bearing_deg: Option<f64>,
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Annotate a copy of the classified frame.
pub fn annotate(
    frame: &ClassifiedFrame,
    marks: &OverlayMarks,
    params: &OverlayParams,
) -> ClassifiedFrame {
    let mut out = frame.clone();

    if let Some(b) = marks.bearing_deg {
        let rad = b.to_radians();
        let end = Point2::new(
            marks.origin.x + params.line_length_px * rad.sin(),
            marks.origin.y - params.line_length_px * rad.cos(),
        );
        draw_line(&mut out, marks.origin, end, Color::White);
    }

    if let Some(t) = marks.filtered_target {
        draw_square(&mut out, t, Color::Gray);
    }

    // Raw target drawn last so it stays visible when the two coincide
    if let Some(t) = marks.raw_target {
        draw_plus(&mut out, t, Color::White);
    }

    out
}

/// Plus-shaped marker, one pixel out from the centre in each direction.
pub fn draw_plus(frame: &mut ClassifiedFrame, at: Point2<f64>, color: Color) {
    let (cx, cy) = round(at);
    for (dx, dy) in [(0, 0), (-1, 0), (1, 0), (0, -1), (0, 1)].iter() {
        set_checked(frame, cx + dx, cy + dy, color);
    }
}

/// 3x3 square marker.
pub fn draw_square(frame: &mut ClassifiedFrame, at: Point2<f64>, color: Color) {
    let (cx, cy) = round(at);
    for dy in -1..=1 {
        for dx in -1..=1 {
            set_checked(frame, cx + dx, cy + dy, color);
        }
    }
}

/// Bresenham line between two points, inclusive of both ends.
///
/// The line is clipped to the frame first, so only on-frame pixels are
/// stepped over however long it is.
pub fn draw_line(frame: &mut ClassifiedFrame, from: Point2<f64>, to: Point2<f64>, color: Color) {
    let (from, to) = match clip_to_frame(from, to, frame.width(), frame.height()) {
        Some(seg) => seg,
        None => return,
    };

    let (mut x0, mut y0) = round(from);
    let (x1, y1) = round(to);

    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        set_checked(frame, x0, y0, color);

        if x0 == x1 && y0 == y1 {
            break;
        }

        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

/// Render a classified frame as an RGB image.
pub fn to_rgb_image(frame: &ClassifiedFrame) -> RgbImage {
    RgbImage::from_fn(frame.width() as u32, frame.height() as u32, |x, y| {
        let rgb = frame
            .get(Position::new(x as usize, y as usize))
            .unwrap_or(Color::Background)
            .to_rgb();
        image::Rgb([rgb.r, rgb.g, rgb.b])
    })
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Liang-Barsky clip of a segment to the pixel centres of a `width` by
/// `height` frame. `None` if nothing of the segment lies on the frame.
fn clip_to_frame(
    from: Point2<f64>,
    to: Point2<f64>,
    width: usize,
    height: usize,
) -> Option<(Point2<f64>, Point2<f64>)> {
    if width == 0 || height == 0 {
        return None;
    }
    if !(from.x.is_finite() && from.y.is_finite() && to.x.is_finite() && to.y.is_finite()) {
        return None;
    }

    let d = to - from;
    let x_max = (width - 1) as f64;
    let y_max = (height - 1) as f64;

    let mut t0 = 0f64;
    let mut t1 = 1f64;

    for (p, q) in [
        (-d.x, from.x),
        (d.x, x_max - from.x),
        (-d.y, from.y),
        (d.y, y_max - from.y),
    ]
    .iter()
    {
        if *p == 0.0 {
            if *q < 0.0 {
                return None;
            }
            continue;
        }

        let r = q / p;
        if *p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }

    Some((from + d * t0, from + d * t1))
}

fn round(p: Point2<f64>) -> (i64, i64) {
    (p.x.round() as i64, p.y.round() as i64)
}

/// Set a pixel, doing nothing if it's outside the frame.
fn set_checked(frame: &mut ClassifiedFrame, x: i64, y: i64, color: Color) {
    if x >= 0 && y >= 0 {
        frame.set(Position::new(x as usize, y as usize), color);
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
