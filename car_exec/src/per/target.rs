//! # Target estimation
//!
//! Reduces the guidance blob to a single point the car should aim at. The
//! top of the blob is the part of the marker furthest down the track, so the
//! heuristics here all look at the upper edge of the blob.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::trace;
use nalgebra::Point2;
use ordered_float::OrderedFloat;
use serde::Deserialize;

use super::{blob::Blob, classify::Position, params::TargetParams};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Holds the last target so brief detection dropouts don't reset it.
#[derive(Debug, Clone)]
pub struct TargetEstimator {
    params: TargetParams,

    /// The last target produced, fresh or held.
    last: Option<Point2<f64>>,
}

/// A target produced for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetEstimate {
    /// The target point in frame coordinates.
    pub point: Point2<f64>,

    /// True if no blob was found this tick and the previous target was
    /// reused.
    pub held: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// How the guidance blob is picked when several are found.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub enum BlobSelection {
    /// The blob with the most pixels.
    Largest,

    /// The blob at this percentile (0 to 1) of the size distribution.
    Percentile(f64),
}

/// Direction preference of the tip scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum TipMode {
    Leftmost,
    Rightmost,
    FurthestFromCenter,
}

/// How the target point is derived from the blob.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub enum TargetMode {
    /// Centre of the blob's top row.
    TopCenter,

    /// The blob's tip.
    Tip(TipMode),

    /// Weighted blend of the tip and top centre.
    Blend { tip_mode: TipMode, tip_weight: f64 },
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TargetEstimator {
    pub fn new(params: TargetParams) -> Self {
        Self { params, last: None }
    }

    /// Produce the target for this tick.
    ///
    /// Blobs of the wrong colour are ignored. If none qualify the previous
    /// target is held, nudged down the frame by the hold decay but never past
    /// the bottom row. `None` only if no target has ever been found.
    pub fn update(&mut self, blobs: &[Blob], frame_height: usize) -> Option<TargetEstimate> {
        let guidance: Vec<&Blob> = blobs
            .iter()
            .filter(|b| b.color() == self.params.guidance_color)
            .collect();

        if let Some(blob) = select_blob(&guidance, self.params.selection) {
            let point = estimate(blob, self.params.mode, self.params.tip_row_margin);
            trace!("Target from {} pixel blob: {:?}", blob.len(), point);

            self.last = Some(point);
            return Some(TargetEstimate { point, held: false });
        }

        let mut point = self.last?;
        let floor = frame_height.saturating_sub(1) as f64;
        point.y = (point.y + self.params.hold_decay_px).min(floor.max(point.y));

        self.last = Some(point);
        Some(TargetEstimate { point, held: true })
    }

    /// The last target produced.
    pub fn last(&self) -> Option<Point2<f64>> {
        self.last
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Pick one blob from the candidates.
pub fn select_blob<'a>(blobs: &[&'a Blob], selection: BlobSelection) -> Option<&'a Blob> {
    match selection {
        BlobSelection::Largest => blobs.iter().copied().max_by_key(|b| b.len()),
        BlobSelection::Percentile(p) => {
            if blobs.is_empty() {
                return None;
            }

            let mut sorted: Vec<&Blob> = blobs.to_vec();
            sorted.sort_by_key(|b| b.len());

            let p = if p.is_finite() { p.max(0.0).min(1.0) } else { 1.0 };
            let index = (p * (sorted.len() - 1) as f64).round() as usize;

            sorted.get(index).copied()
        }
    }
}

/// Derive the target point from a blob.
pub fn estimate(blob: &Blob, mode: TargetMode, tip_row_margin: usize) -> Point2<f64> {
    match mode {
        TargetMode::TopCenter => top_center(blob),
        TargetMode::Tip(tip_mode) => tip(blob, tip_mode, tip_row_margin),
        TargetMode::Blend {
            tip_mode,
            tip_weight,
        } => {
            let t = tip(blob, tip_mode, tip_row_margin);
            let c = top_center(blob);
            let w = tip_weight.max(0.0).min(1.0);

            Point2::new(w * t.x + (1.0 - w) * c.x, w * t.y + (1.0 - w) * c.y)
        }
    }
}

/// Mean position of all pixels on the blob's top row.
pub fn top_center(blob: &Blob) -> Point2<f64> {
    let top = blob.top_row();
    let (sum_x, count) = blob
        .pixels()
        .iter()
        .filter(|p| p.y == top)
        .fold((0f64, 0usize), |(s, n), p| (s + p.x as f64, n + 1));

    Point2::new(sum_x / count.max(1) as f64, top as f64)
}

/// Find the tip of the blob.
///
/// A pixel more than `row_margin` rows above the current best always wins.
/// Otherwise a pixel that isn't below the current best wins if it is further
/// in the preferred horizontal direction, measured from the blob centroid.
/// Pixels on the winning row that score the same as the winner (both ends of
/// a symmetric top edge with `FurthestFromCenter`) are averaged.
pub fn tip(blob: &Blob, mode: TipMode, row_margin: usize) -> Point2<f64> {
    let cx = blob.centroid().x;
    let score = |p: &Position| -> OrderedFloat<f64> {
        let dx = p.x as f64 - cx;
        OrderedFloat(match mode {
            TipMode::Leftmost => -dx,
            TipMode::Rightmost => dx,
            TipMode::FurthestFromCenter => dx.abs(),
        })
    };

    let mut pixels = blob.pixels().iter();
    let mut best = match pixels.next() {
        Some(p) => *p,
        None => return Point2::new(0.0, 0.0),
    };

    for p in pixels {
        if p.y + row_margin < best.y {
            best = *p;
        } else if p.y <= best.y && score(p) > score(&best) {
            best = *p;
        }
    }

    let best_score = score(&best);
    let (sum_x, count) = blob
        .pixels()
        .iter()
        .filter(|p| p.y == best.y && score(p) == best_score)
        .fold((0f64, 0usize), |(s, n), p| (s + p.x as f64, n + 1));

    Point2::new(sum_x / count.max(1) as f64, best.y as f64)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::per::{
        blob::{BlobDetector, ColorFilter},
        classify::{ClassifiedFrame, Color},
        params::BlobParams,
    };

    /// Build blobs by painting pixels into a frame and detecting them.
    fn blobs_from(width: usize, height: usize, shapes: &[(&[(usize, usize)], Color)]) -> Vec<Blob> {
        let mut frame = ClassifiedFrame::filled(width, height, Color::Black);
        for (pixels, color) in shapes {
            for (x, y) in pixels.iter() {
                frame.set(Position::new(*x, *y), *color);
            }
        }

        BlobDetector::new(BlobParams {
            min_blob_size: 1,
            filter: ColorFilter::Exclude(vec![Color::Black]),
        })
        .detect(&frame)
    }

    fn rect(x0: usize, y0: usize, x1: usize, y1: usize) -> Vec<(usize, usize)> {
        let mut v = Vec::new();
        for y in y0..=y1 {
            for x in x0..=x1 {
                v.push((x, y));
            }
        }
        v
    }

    #[test]
    fn test_top_center() {
        // A "T" shape, the top bar spans x 2..=6 on row 1
        let mut shape = rect(2, 1, 6, 1);
        shape.extend(rect(4, 2, 4, 6));
        let blobs = blobs_from(10, 10, &[(&shape[..], Color::Blue)]);

        let c = top_center(&blobs[0]);
        assert_eq!(c, Point2::new(4.0, 1.0));
    }

    #[test]
    fn test_tip_prefers_higher_rows() {
        // A diagonal staircase rising to the right, top pixel at (7, 1)
        let shape: Vec<(usize, usize)> = (0..8).map(|i| (i, 8 - i)).collect();
        let blobs = blobs_from(10, 10, &[(&shape[..], Color::Blue)]);

        for mode in [TipMode::Leftmost, TipMode::Rightmost, TipMode::FurthestFromCenter].iter() {
            assert_eq!(tip(&blobs[0], *mode, 0), Point2::new(7.0, 1.0));
        }
    }

    #[test]
    fn test_tip_direction_modes() {
        // A flat bar with a centre bump one row higher, within the row margin
        let mut shape = rect(1, 5, 9, 5);
        shape.push((5, 4));
        let blobs = blobs_from(12, 8, &[(&shape[..], Color::Blue)]);
        let blob = &blobs[0];

        // The bump is the top pixel, only pixels on its row or above compete
        assert_eq!(tip(blob, TipMode::Leftmost, 3), Point2::new(5.0, 4.0));

        // Without the bump the bar ends win
        let bar = rect(1, 5, 9, 5);
        let blobs = blobs_from(12, 8, &[(&bar[..], Color::Blue)]);
        assert_eq!(tip(&blobs[0], TipMode::Leftmost, 3), Point2::new(1.0, 5.0));
        assert_eq!(tip(&blobs[0], TipMode::Rightmost, 3), Point2::new(9.0, 5.0));
    }

    #[test]
    fn test_tip_symmetric_ends_are_averaged() {
        // Both ends of the bar are equally far from the centroid
        let bar = rect(1, 5, 9, 5);
        let blobs = blobs_from(12, 8, &[(&bar[..], Color::Blue)]);
        assert_eq!(tip(&blobs[0], TipMode::FurthestFromCenter, 3), Point2::new(5.0, 5.0));

        // Even width block, centre falls between pixels
        let block = rect(22, 20, 41, 29);
        let blobs = blobs_from(64, 48, &[(&block[..], Color::Blue)]);
        let t = tip(&blobs[0], TipMode::FurthestFromCenter, 3);
        assert!((t.x - 31.5).abs() < 1e-12);
        assert_eq!(t.y, 20.0);

        let p = estimate(&blobs[0], TargetParams::default().mode, 3);
        assert!((p.x - 31.5).abs() < 1e-9);

        // A lopsided top edge still picks the single furthest end
        let mut shape = rect(2, 3, 6, 3);
        shape.extend(rect(2, 4, 12, 6));
        let blobs = blobs_from(16, 8, &[(&shape[..], Color::Blue)]);
        assert_eq!(tip(&blobs[0], TipMode::FurthestFromCenter, 3), Point2::new(2.0, 3.0));
    }

    #[test]
    fn test_blend() {
        let bar = rect(2, 3, 8, 3);
        let blobs = blobs_from(12, 8, &[(&bar[..], Color::Blue)]);

        // Tip is (8, 3) and top centre (5, 3)
        let p = estimate(
            &blobs[0],
            TargetMode::Blend {
                tip_mode: TipMode::Rightmost,
                tip_weight: 0.6,
            },
            3,
        );
        assert!((p.x - 6.8).abs() < 1e-12);
        assert!((p.y - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_selection() {
        let small = rect(0, 0, 1, 1);
        let medium = rect(4, 0, 6, 2);
        let large = rect(0, 5, 9, 7);
        let blobs = blobs_from(
            12,
            10,
            &[
                (&small[..], Color::Blue),
                (&medium[..], Color::Blue),
                (&large[..], Color::Blue),
            ],
        );
        let refs: Vec<&Blob> = blobs.iter().collect();

        assert_eq!(select_blob(&refs, BlobSelection::Largest).unwrap().len(), 30);
        assert_eq!(select_blob(&refs, BlobSelection::Percentile(0.0)).unwrap().len(), 4);
        assert_eq!(select_blob(&refs, BlobSelection::Percentile(0.5)).unwrap().len(), 9);
        assert_eq!(select_blob(&refs, BlobSelection::Percentile(1.0)).unwrap().len(), 30);
        assert!(select_blob(&[], BlobSelection::Percentile(0.5)).is_none());
    }

    #[test]
    fn test_hold_on_dropout() {
        let mut est = TargetEstimator::new(TargetParams {
            mode: TargetMode::TopCenter,
            hold_decay_px: 1.0,
            ..Default::default()
        });

        // Nothing ever seen
        assert_eq!(est.update(&[], 10), None);

        let bar = rect(2, 7, 4, 7);
        let blobs = blobs_from(8, 10, &[(&bar[..], Color::Blue)]);
        let fresh = est.update(&blobs, 10).unwrap();
        assert_eq!(fresh.point, Point2::new(3.0, 7.0));
        assert!(!fresh.held);

        // Wrong colour blobs don't count
        let red = blobs_from(8, 10, &[(&bar[..], Color::Red)]);
        let held = est.update(&red, 10).unwrap();
        assert!(held.held);
        assert_eq!(held.point, Point2::new(3.0, 8.0));

        // Decay stops at the bottom row
        est.update(&[], 10);
        let held = est.update(&[], 10).unwrap();
        assert_eq!(held.point, Point2::new(3.0, 9.0));
    }
}
