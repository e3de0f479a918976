//! # Track Overlay
//!
//! Places single-lap racing telemetry on a real map and plays it back.
//!
//! Telemetry is recorded in an arbitrary planar frame (vehicle-local XY) while
//! the reference track outline is geographic. This library provides:
//! - Web Mercator projection and unprojection
//! - Nearest-point-on-polyline queries (linear scan or R-tree)
//! - Closed-form least-squares similarity transform estimation
//! - Iterative registration of named corner points onto a track outline
//! - Mapping of whole telemetry traces into geographic coordinates
//! - A frame-rate independent playback engine with time interpolation
//!
//! ## Features
//!
//! - **`parallel`** - Map large traces with rayon
//! - **`async`** - Load traces on tokio's blocking pool
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use track_overlay::{Point2D, SimilarityTransform, solve_similarity};
//!
//! let source = vec![Point2D::new(0.0, 0.0), Point2D::new(10.0, 0.0), Point2D::new(0.0, 5.0)];
//! let known = SimilarityTransform::new(2.0, 0.5, 100.0, -40.0);
//! let target = known.apply_all(&source);
//!
//! let solved = solve_similarity(&source, &target).unwrap();
//! assert!((solved.s - 2.0).abs() < 1e-9);
//! ```

use geo::{BoundingRect, Coord, LineString, Rect};
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{OptionExt, OverlayError, ParseError, Result};

// Web Mercator projection
pub mod projection;
pub use projection::{project, unproject, EARTH_RADIUS_M};

// Nearest point on polyline (linear and R-tree oracles)
pub mod polyline;
pub use polyline::{NearestPoint, NearestPointOracle, Polyline, SegmentIndex};

// Least-squares similarity transform
pub mod similarity;
pub use similarity::{solve_similarity, SimilarityTransform};

// Reference corner points and geographic outline files
pub mod reference;
pub use reference::{ReferenceOutline, ReferencePoint, ReferencePointSet};

// Iterative registration of reference points onto the outline
pub mod registration;
pub use registration::{register, seed_transform, RegistrationConfig, RegistrationReport};

// Persisted transform configuration
pub mod config;
pub use config::TransformConfig;

// Telemetry traces and driver roster
pub mod telemetry;
pub use telemetry::{DriverEntry, DriverRoster, Metric, TelemetrySample, TelemetryTrace};

// Trace -> geographic coordinates
pub mod resolver;
pub use resolver::{CoordinateResolver, GeoTrace, MappingMethod};

// Time-domain playback
pub mod playback;
pub use playback::{
    find_segment, interpolate_at, GearInterpolation, InterpolatedSample, PlaybackConfig,
    PlaybackEngine, PlaybackSnapshot,
};

// Last-request-wins trace loading
pub mod loader;
pub use loader::{LoadOutcome, LoadTicket, TraceDirectory, TraceLoader};

// Distance-domain chart series
pub mod charts;
pub use charts::ChartSeries;

// Algorithm toolbox - flat access to the math without the file formats
pub mod algorithms;

// ============================================================================
// Core Types
// ============================================================================

/// A planar coordinate.
///
/// The unit depends on the space it lives in (telemetry-local units or
/// projected Web Mercator meters). Never mix spaces without a transform.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    pub fn distance_squared(&self, other: &Point2D) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &Point2D) -> f64 {
        self.distance_squared(other).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<Coord<f64>> for Point2D {
    fn from(c: Coord<f64>) -> Self {
        Self { x: c.x, y: c.y }
    }
}

impl From<Point2D> for Coord<f64> {
    fn from(p: Point2D) -> Self {
        Coord { x: p.x, y: p.y }
    }
}

/// A geographic coordinate in degrees.
///
/// # Example
/// ```
/// use track_overlay::GeoPoint;
/// let monza = GeoPoint::new(9.2811, 45.6156);
/// assert!(monza.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

impl GeoPoint {
    /// Create a new geographic point (longitude first, GeoJSON order).
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && self.lat >= -90.0
            && self.lat <= 90.0
            && self.lon >= -180.0
            && self.lon <= 180.0
    }
}

/// Axis-aligned bounding box in a planar space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Bounds {
    /// Create bounds from points. Returns `None` for an empty slice.
    pub fn from_points(points: &[Point2D]) -> Option<Self> {
        let line: LineString<f64> = points.iter().map(|p| Coord::from(*p)).collect();
        line.bounding_rect().map(Self::from)
    }

    /// Create bounds over geographic points, x = longitude and y = latitude.
    pub fn from_geo_points(points: &[GeoPoint]) -> Option<Self> {
        let line: LineString<f64> = points
            .iter()
            .map(|p| Coord { x: p.lon, y: p.lat })
            .collect();
        line.bounding_rect().map(Self::from)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> Point2D {
        Point2D::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }
}

impl From<Rect<f64>> for Bounds {
    fn from(rect: Rect<f64>) -> Self {
        Self {
            min_x: rect.min().x,
            max_x: rect.max().x,
            min_y: rect.min().y,
            max_y: rect.max().y,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
