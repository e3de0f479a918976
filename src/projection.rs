//! Spherical Web Mercator (EPSG:3857) projection.
//!
//! The only projection supported. Both directions are pure functions.
//! Latitudes at or near ±90° produce infinite or NaN output, so pole-adjacent
//! data must not be fed in.

use std::f64::consts::FRAC_PI_4;

use crate::{GeoPoint, Point2D};

/// WGS84 semi-major axis used by Web Mercator, in meters.
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Project longitude/latitude (degrees) to Web Mercator meters.
///
/// # Example
/// ```
/// use track_overlay::project;
/// let p = project(0.0, 0.0);
/// assert_eq!(p.x, 0.0);
/// assert!(p.y.abs() < 1e-9);
/// ```
pub fn project(lon: f64, lat: f64) -> Point2D {
    let x = EARTH_RADIUS_M * lon.to_radians();
    let y = EARTH_RADIUS_M * (FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln();
    Point2D::new(x, y)
}

/// Inverse of [`project`]: Web Mercator meters to longitude/latitude (degrees).
pub fn unproject(x: f64, y: f64) -> GeoPoint {
    let lon = (x / EARTH_RADIUS_M).to_degrees();
    let lat = (2.0 * (y / EARTH_RADIUS_M).exp().atan() - 2.0 * FRAC_PI_4).to_degrees();
    GeoPoint::new(lon, lat)
}

/// Project a geographic point.
pub fn project_point(p: &GeoPoint) -> Point2D {
    project(p.lon, p.lat)
}

/// Project a geographic sequence, preserving order.
pub fn project_all(points: &[GeoPoint]) -> Vec<Point2D> {
    points.iter().map(project_point).collect()
}

/// Unproject a planar sequence, preserving order.
pub fn unproject_all(points: &[Point2D]) -> Vec<GeoPoint> {
    points.iter().map(|p| unproject(p.x, p.y)).collect()
}
