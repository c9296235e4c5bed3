//! # Blob detection
//!
//! Finds maximal 8-connected regions of identically classified pixels. The
//! candidate pixels are held in a hash set so each pixel is looked up and
//! consumed in constant time, keeping the whole pass linear in the number of
//! pixels.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::collections::{HashSet, VecDeque};

use log::debug;
use nalgebra::Point2;
use serde::Deserialize;

use super::{
    classify::{ClassifiedFrame, Color, Position},
    params::BlobParams,
};

// ---------------------------------------------------------------------------
// STATICS
// ---------------------------------------------------------------------------

/// Offsets of the 8 neighbours of a pixel.
static NEIGHBOURS: [(i64, i64); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A connected region of one colour.
///
/// Pixels are stored in the order the region was grown, starting with the
/// top-left-most pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    color: Color,
    pixels: Vec<Position>,
}

/// Connected component detector.
#[derive(Debug, Clone)]
pub struct BlobDetector {
    params: BlobParams,
}

/// Summary of a detection pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlobStats {
    /// Number of pixels passing the colour filter.
    pub num_candidates: usize,

    /// Number of regions grown, kept or not.
    pub num_regions: usize,

    /// Number of regions at or above the minimum size.
    pub num_kept: usize,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Restricts which pixels take part in blob detection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub enum ColorFilter {
    /// Everything except `Background` and the `Purple` border sentinel.
    Any,

    /// Only pixels of one colour.
    Only(Color),

    /// Everything except the listed colours.
    Exclude(Vec<Color>),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Blob {
    pub fn color(&self) -> Color {
        self.color
    }

    pub fn pixels(&self) -> &[Position] {
        &self.pixels
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    /// Always false, a blob holds at least one pixel.
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Mean position of the blob's pixels.
    pub fn centroid(&self) -> Point2<f64> {
        let n = self.pixels.len().max(1) as f64;
        let (sx, sy) = self
            .pixels
            .iter()
            .fold((0f64, 0f64), |(sx, sy), p| (sx + p.x as f64, sy + p.y as f64));

        Point2::new(sx / n, sy / n)
    }

    /// The smallest y of any pixel in the blob.
    pub fn top_row(&self) -> usize {
        self.pixels.iter().map(|p| p.y).min().unwrap_or(0)
    }

    /// Top-left and bottom-right corners of the bounding box.
    pub fn bounds(&self) -> (Position, Position) {
        let min_x = self.pixels.iter().map(|p| p.x).min().unwrap_or(0);
        let max_x = self.pixels.iter().map(|p| p.x).max().unwrap_or(0);
        let min_y = self.top_row();
        let max_y = self.pixels.iter().map(|p| p.y).max().unwrap_or(0);

        (Position::new(min_x, min_y), Position::new(max_x, max_y))
    }
}

impl ColorFilter {
    /// True if pixels of this colour are candidates.
    pub fn matches(&self, color: Color) -> bool {
        match self {
            ColorFilter::Any => !matches!(color, Color::Background | Color::Purple),
            ColorFilter::Only(c) => *c == color,
            ColorFilter::Exclude(list) => !list.contains(&color),
        }
    }
}

impl BlobDetector {
    pub fn new(params: BlobParams) -> Self {
        Self { params }
    }

    /// Find all blobs in the frame.
    pub fn detect(&self, frame: &ClassifiedFrame) -> Vec<Blob> {
        self.detect_with_stats(frame).0
    }

    /// Find the blob with the most pixels, if any.
    pub fn largest(&self, frame: &ClassifiedFrame) -> Option<Blob> {
        self.detect(frame).into_iter().max_by_key(|b| b.len())
    }

    /// Find all blobs in the frame, also reporting how many candidates and
    /// regions were processed.
    ///
    /// Seeds are taken in row-major order, so the output order is stable for
    /// a given frame.
    pub fn detect_with_stats(&self, frame: &ClassifiedFrame) -> (Vec<Blob>, BlobStats) {
        let mut candidates: HashSet<Position> = frame
            .iter()
            .filter(|(_, c)| self.params.filter.matches(*c))
            .map(|(p, _)| p)
            .collect();

        let mut stats = BlobStats {
            num_candidates: candidates.len(),
            ..Default::default()
        };

        let mut blobs = Vec::new();
        let mut queue = VecDeque::new();

        for (seed, color) in frame.iter() {
            if candidates.is_empty() {
                break;
            }
            if !candidates.remove(&seed) {
                continue;
            }

            // Grow the region breadth first, consuming candidates as we go
            let mut pixels = vec![seed];
            queue.push_back(seed);

            while let Some(pos) = queue.pop_front() {
                for n in neighbours(pos, frame.width(), frame.height()) {
                    if frame.get(n) == Some(color) && candidates.remove(&n) {
                        pixels.push(n);
                        queue.push_back(n);
                    }
                }
            }

            stats.num_regions += 1;

            if pixels.len() >= self.params.min_blob_size {
                blobs.push(Blob { color, pixels });
            }
        }

        stats.num_kept = blobs.len();

        debug!(
            "Blob detection: {} candidates, {} regions, {} kept",
            stats.num_candidates, stats.num_regions, stats.num_kept
        );

        (blobs, stats)
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// The in-bounds 8-neighbours of `pos`.
fn neighbours(pos: Position, width: usize, height: usize) -> impl Iterator<Item = Position> {
    NEIGHBOURS.iter().filter_map(move |(dx, dy)| {
        let x = pos.x as i64 + dx;
        let y = pos.y as i64 + dy;

        if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
            None
        } else {
            Some(Position::new(x as usize, y as usize))
        }
    })
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn detector(min_blob_size: usize, filter: ColorFilter) -> BlobDetector {
        BlobDetector::new(BlobParams {
            min_blob_size,
            filter,
        })
    }

    fn paint(frame: &mut ClassifiedFrame, pixels: &[(usize, usize)], color: Color) {
        for (x, y) in pixels {
            assert!(frame.set(Position::new(*x, *y), color));
        }
    }

    #[test]
    fn test_threshold_keeps_only_large_region() {
        let mut frame = ClassifiedFrame::filled(10, 8, Color::Black);

        // Small region of 3 pixels in the top left
        let small = [(0, 0), (1, 0), (0, 1)];
        // Large region of 6 pixels, connected only diagonally in places
        let large = [(5, 3), (6, 4), (7, 5), (7, 6), (6, 6), (5, 7)];

        paint(&mut frame, &small, Color::Blue);
        paint(&mut frame, &large, Color::Blue);

        let (blobs, stats) = detector(5, ColorFilter::Only(Color::Blue)).detect_with_stats(&frame);

        assert_eq!(stats.num_candidates, 9);
        assert_eq!(stats.num_regions, 2);
        assert_eq!(stats.num_kept, 1);
        assert_eq!(blobs.len(), 1);

        let blob = &blobs[0];
        assert_eq!(blob.color(), Color::Blue);

        let got: HashSet<Position> = blob.pixels().iter().copied().collect();
        let expected: HashSet<Position> =
            large.iter().map(|(x, y)| Position::new(*x, *y)).collect();
        assert_eq!(got, expected);
        assert_eq!(blob.len(), large.len());
    }

    #[test]
    fn test_colour_equality_splits_regions() {
        let mut frame = ClassifiedFrame::filled(6, 1, Color::Background);
        paint(&mut frame, &[(0, 0), (1, 0), (2, 0)], Color::Red);
        paint(&mut frame, &[(3, 0), (4, 0), (5, 0)], Color::Green);

        let blobs = detector(1, ColorFilter::Any).detect(&frame);

        assert_eq!(blobs.len(), 2);
        assert_eq!(blobs[0].color(), Color::Red);
        assert_eq!(blobs[0].len(), 3);
        assert_eq!(blobs[1].color(), Color::Green);
        assert_eq!(blobs[1].len(), 3);
    }

    #[test]
    fn test_every_candidate_in_one_region() {
        // Checkerboard of two colours, every pixel is diagonally connected to
        // the others of its colour
        let mut frame = ClassifiedFrame::filled(7, 5, Color::Red);
        for y in 0..5 {
            for x in 0..7 {
                if (x + y) % 2 == 1 {
                    frame.set(Position::new(x, y), Color::Green);
                }
            }
        }

        let (blobs, stats) =
            detector(1, ColorFilter::Exclude(vec![Color::Background])).detect_with_stats(&frame);

        assert_eq!(stats.num_candidates, 35);
        assert_eq!(blobs.len(), 2);
        assert_eq!(blobs.iter().map(|b| b.len()).sum::<usize>(), 35);

        let mut seen = HashSet::new();
        for blob in &blobs {
            for p in blob.pixels() {
                assert!(seen.insert(*p), "pixel {:?} in two blobs", p);
            }
        }
    }

    #[test]
    fn test_filter_excludes_border() {
        let frame = ClassifiedFrame::filled(4, 4, Color::Purple);
        assert!(detector(1, ColorFilter::Any).detect(&frame).is_empty());
        assert!(detector(1, ColorFilter::Any).detect(&ClassifiedFrame::filled(0, 0, Color::Red)).is_empty());
    }

    #[test]
    fn test_blob_geometry() {
        let mut frame = ClassifiedFrame::filled(8, 8, Color::Black);
        paint(&mut frame, &[(2, 2), (3, 2), (4, 2), (3, 3), (3, 4)], Color::Blue);

        let blob = detector(1, ColorFilter::Only(Color::Blue))
            .largest(&frame)
            .unwrap();

        assert_eq!(blob.top_row(), 2);
        assert_eq!(blob.bounds(), (Position::new(2, 2), Position::new(4, 4)));

        let c = blob.centroid();
        assert!((c.x - 3.0).abs() < 1e-12);
        assert!((c.y - 2.6).abs() < 1e-12);
    }
}
