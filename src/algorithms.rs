//! # Algorithm Toolbox
//!
//! Direct access to the geometric building blocks, for callers that want the
//! math without the file formats or the playback engine.
//!
//! ## Core Algorithms
//!
//! - **Projection**: spherical Web Mercator forward and inverse
//! - **Nearest Point**: closest point on a segment or polyline
//! - **Similarity Solve**: closed-form least-squares scale/rotation/translation
//! - **Registration**: iterative alignment of control points onto an outline
//! - **Segment Lookup**: binary search over a sorted time axis
//!
//! # Example
//!
//! ```rust
//! use track_overlay::algorithms::{project, unproject, nearest_point_on_polyline, Point2D};
//!
//! let p = project(9.28, 45.62);
//! let back = unproject(p.x, p.y);
//! assert!((back.lat - 45.62).abs() < 1e-9);
//!
//! let line = [Point2D::new(0.0, 0.0), Point2D::new(10.0, 0.0)];
//! let nearest = nearest_point_on_polyline(Point2D::new(4.0, 3.0), &line).unwrap();
//! assert_eq!(nearest.squared_distance, 9.0);
//! ```

// =============================================================================
// Core Types (re-exported from lib)
// =============================================================================

pub use crate::{Bounds, GeoPoint, Point2D, Polyline, SimilarityTransform};

// =============================================================================
// Projection
// =============================================================================

pub use crate::projection::{project, project_all, unproject, unproject_all, EARTH_RADIUS_M};

// =============================================================================
// Nearest Point
// =============================================================================

/// Closest point on segment `[a, b]` and its clamped parameter `t`.
pub use crate::polyline::closest_point_on_segment;
/// Linear scan over every segment of a point sequence.
pub use crate::polyline::nearest_point_on_polyline;
pub use crate::polyline::{NearestPoint, NearestPointOracle, SegmentIndex};

// =============================================================================
// Similarity and Registration
// =============================================================================

/// Closed-form least-squares similarity between paired point sets.
pub use crate::similarity::solve_similarity;
/// Mean squared distance between transformed source and target.
pub use crate::similarity::mean_squared_residual;
pub use crate::registration::{register, seed_transform, RegistrationConfig, RegistrationReport};

// =============================================================================
// Time Axis
// =============================================================================

pub use crate::playback::{find_segment, segment_fraction};
