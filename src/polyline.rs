//! Nearest point on a polyline.
//!
//! Registration uses the closest point on the track outline as the matching
//! target for each mapped reference point. Two oracles answer the same query:
//! - [`Polyline`] scans every segment (linear per query)
//! - [`SegmentIndex`] walks an R-tree of segments for long outlines

use rstar::{PointDistance, RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};

use crate::error::{OptionExt, Result};
use crate::{Bounds, Point2D};

/// Closest point found on a polyline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NearestPoint {
    pub point: Point2D,
    pub squared_distance: f64,
    /// Index of the segment (start vertex) holding `point`
    pub segment_index: usize,
    /// Position along that segment, in [0, 1]
    pub t: f64,
}

/// Anything that can answer "closest point on the outline to `query`".
pub trait NearestPointOracle {
    fn nearest(&self, query: Point2D) -> NearestPoint;
}

/// Project `p` onto segment `a`-`b`, clamped to the endpoints.
///
/// Returns the projected point and the segment parameter `t ∈ [0, 1]`.
/// A zero-length segment yields `(a, 0.0)`.
pub fn closest_point_on_segment(p: Point2D, a: Point2D, b: Point2D) -> (Point2D, f64) {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len2 = dx * dx + dy * dy;
    let t = if len2 > 0.0 {
        (((p.x - a.x) * dx + (p.y - a.y) * dy) / len2).clamp(0.0, 1.0)
    } else {
        0.0
    };
    (Point2D::new(a.x + t * dx, a.y + t * dy), t)
}

/// Closest point to `query` over all segments of `points`.
///
/// Returns `None` for an empty slice. A single point is its own nearest point.
pub fn nearest_point_on_polyline(query: Point2D, points: &[Point2D]) -> Option<NearestPoint> {
    let first = *points.first()?;
    let mut best = NearestPoint {
        point: first,
        squared_distance: query.distance_squared(&first),
        segment_index: 0,
        t: 0.0,
    };

    for (i, w) in points.windows(2).enumerate() {
        let (candidate, t) = closest_point_on_segment(query, w[0], w[1]);
        let d2 = query.distance_squared(&candidate);
        if d2 < best.squared_distance || i == 0 {
            best = NearestPoint {
                point: candidate,
                squared_distance: d2,
                segment_index: i,
                t,
            };
        }
    }

    Some(best)
}

/// An open polyline with at least two vertices.
///
/// Deserializing applies the same vertex-count check as [`Polyline::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPolyline")]
pub struct Polyline {
    points: Vec<Point2D>,
}

#[derive(Deserialize)]
struct RawPolyline {
    points: Vec<Point2D>,
}

impl TryFrom<RawPolyline> for Polyline {
    type Error = crate::OverlayError;

    fn try_from(raw: RawPolyline) -> Result<Self> {
        Self::new(raw.points)
    }
}

impl Polyline {
    pub const MIN_POINTS: usize = 2;

    /// Create a polyline, rejecting fewer than two vertices.
    pub fn new(points: Vec<Point2D>) -> Result<Self> {
        let count = points.len();
        (count >= Self::MIN_POINTS)
            .then_some(Self { points })
            .ok_or_insufficient_points("polyline", count, Self::MIN_POINTS)
    }

    /// Create a closed loop by repeating the first vertex at the end (if needed).
    pub fn closed(mut points: Vec<Point2D>) -> Result<Self> {
        if let (Some(first), Some(last)) = (points.first().copied(), points.last().copied()) {
            if first != last {
                points.push(first);
            }
        }
        Self::new(points)
    }

    pub fn points(&self) -> &[Point2D] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn segment_count(&self) -> usize {
        self.points.len().saturating_sub(1)
    }

    /// Total Euclidean length along the vertices.
    pub fn length(&self) -> f64 {
        self.points.windows(2).map(|w| w[0].distance(&w[1])).sum()
    }

    pub fn bounds(&self) -> Bounds {
        let first = self.points.first().copied().unwrap_or_default();
        self.points.iter().fold(
            Bounds {
                min_x: first.x,
                max_x: first.x,
                min_y: first.y,
                max_y: first.y,
            },
            |b, p| Bounds {
                min_x: b.min_x.min(p.x),
                max_x: b.max_x.max(p.x),
                min_y: b.min_y.min(p.y),
                max_y: b.max_y.max(p.y),
            },
        )
    }
}

impl NearestPointOracle for Polyline {
    fn nearest(&self, query: Point2D) -> NearestPoint {
        nearest_point_on_polyline(query, &self.points).unwrap_or_else(|| {
            let point = self.points.first().copied().unwrap_or_default();
            NearestPoint {
                point,
                squared_distance: query.distance_squared(&point),
                segment_index: 0,
                t: 0.0,
            }
        })
    }
}

// ============================================================================
// R-tree Segment Index
// ============================================================================

/// A polyline segment with its index for R-tree queries
#[derive(Debug, Clone, Copy)]
pub struct IndexedSegment {
    pub idx: usize,
    pub a: Point2D,
    pub b: Point2D,
}

impl RTreeObject for IndexedSegment {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners([self.a.x, self.a.y], [self.b.x, self.b.y])
    }
}

impl PointDistance for IndexedSegment {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let q = Point2D::new(point[0], point[1]);
        let (closest, _) = closest_point_on_segment(q, self.a, self.b);
        q.distance_squared(&closest)
    }
}

/// R-tree over the segments of a polyline.
///
/// Answers the same query as [`Polyline::nearest`] without scanning every
/// segment; worth building once when the outline has thousands of vertices
/// and is queried every registration iteration.
pub struct SegmentIndex {
    tree: RTree<IndexedSegment>,
    fallback: Point2D,
}

impl SegmentIndex {
    /// Bulk-load all segments of `polyline`.
    pub fn build(polyline: &Polyline) -> Self {
        let segments: Vec<IndexedSegment> = polyline
            .points()
            .windows(2)
            .enumerate()
            .map(|(idx, w)| IndexedSegment { idx, a: w[0], b: w[1] })
            .collect();
        Self {
            tree: RTree::bulk_load(segments),
            fallback: polyline.points().first().copied().unwrap_or_default(),
        }
    }

    pub fn size(&self) -> usize {
        self.tree.size()
    }
}

impl NearestPointOracle for SegmentIndex {
    fn nearest(&self, query: Point2D) -> NearestPoint {
        match self.tree.nearest_neighbor(&[query.x, query.y]) {
            Some(seg) => {
                let (point, t) = closest_point_on_segment(query, seg.a, seg.b);
                NearestPoint {
                    point,
                    squared_distance: query.distance_squared(&point),
                    segment_index: seg.idx,
                    t,
                }
            }
            None => NearestPoint {
                point: self.fallback,
                squared_distance: query.distance_squared(&self.fallback),
                segment_index: 0,
                t: 0.0,
            },
        }
    }
}
