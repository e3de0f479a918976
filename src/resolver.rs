//! Telemetry coordinate mapping.
//!
//! [`CoordinateResolver`] is built once with whatever the viewer could load
//! (an optional registered transform, an optional reference outline) and owns
//! the fallback policy:
//!
//! 1. Registered transform → forward similarity into Web Mercator meters,
//!    then unproject
//! 2. No transform, outline available → independent-axis bounding-box mapping
//!    from the trace's XY box onto the outline's lon/lat box. This ignores
//!    rotation and misplaces any track whose local axes are not aligned with
//!    east/north; it is a degraded path, flagged as such in the output
//! 3. Neither → unmapped (empty output), the map still draws the outline

use log::{debug, warn};
use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::projection::unproject;
use crate::similarity::SimilarityTransform;
use crate::telemetry::TelemetryTrace;
use crate::{Bounds, GeoPoint, Point2D};

/// How a [`GeoTrace`] was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MappingMethod {
    /// Registered similarity transform (accurate)
    Registered,
    /// Axis-aligned bounding-box stretch (approximate, ignores rotation)
    BoundingBoxFallback,
    /// No mapping available
    Unmapped,
}

/// Geographic positions parallel to a trace's samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoTrace {
    /// Same length and order as the source trace, empty when unmapped
    pub points: Vec<GeoPoint>,
    pub method: MappingMethod,
}

impl GeoTrace {
    pub fn unmapped() -> Self {
        Self {
            points: Vec::new(),
            method: MappingMethod::Unmapped,
        }
    }

    pub fn is_mapped(&self) -> bool {
        self.method != MappingMethod::Unmapped
    }

    pub fn is_approximate(&self) -> bool {
        self.method == MappingMethod::BoundingBoxFallback
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Linear map of one axis interval onto another; a zero-width source maps to the target center.
fn stretch(value: f64, src_min: f64, src_span: f64, dst_min: f64, dst_span: f64) -> f64 {
    if src_span > 0.0 {
        dst_min + (value - src_min) / src_span * dst_span
    } else {
        dst_min + dst_span / 2.0
    }
}

/// Resolves planar telemetry into geographic coordinates.
#[derive(Debug, Clone, Default)]
pub struct CoordinateResolver {
    transform: Option<SimilarityTransform>,
    outline_bounds: Option<Bounds>,
}

impl CoordinateResolver {
    /// Build with an optional transform and the optional geographic outline.
    pub fn new(transform: Option<SimilarityTransform>, outline: Option<&[GeoPoint]>) -> Self {
        Self {
            transform: transform.filter(SimilarityTransform::is_finite),
            outline_bounds: outline.and_then(Bounds::from_geo_points),
        }
    }

    pub fn with_transform(transform: SimilarityTransform) -> Self {
        Self::new(Some(transform), None)
    }

    pub fn fallback_only(outline: &[GeoPoint]) -> Self {
        Self::new(None, Some(outline))
    }

    /// The method [`resolve`](Self::resolve) will use.
    pub fn method(&self) -> MappingMethod {
        match (&self.transform, &self.outline_bounds) {
            (Some(_), _) => MappingMethod::Registered,
            (None, Some(_)) => MappingMethod::BoundingBoxFallback,
            (None, None) => MappingMethod::Unmapped,
        }
    }

    /// Map one planar point, `None` when no mapping is available.
    ///
    /// The bounding-box fallback needs the whole trace's extent, so single
    /// points only resolve through a registered transform.
    pub fn resolve_point(&self, p: Point2D) -> Option<GeoPoint> {
        let t = self.transform.as_ref()?;
        let m = t.apply(p);
        Some(unproject(m.x, m.y))
    }

    /// Map a whole trace. Pure function of (trace, configuration).
    pub fn resolve(&self, trace: &TelemetryTrace) -> GeoTrace {
        let positions = trace.positions();
        match self.method() {
            MappingMethod::Registered => {
                let t = self.transform.unwrap_or_default();
                debug!("[Resolver] Mapping {} samples with registered transform", positions.len());
                GeoTrace {
                    points: map_registered(&t, &positions),
                    method: MappingMethod::Registered,
                }
            }
            MappingMethod::BoundingBoxFallback => {
                let Some(dst) = self.outline_bounds else {
                    return GeoTrace::unmapped();
                };
                let Some(src) = Bounds::from_points(&positions) else {
                    return GeoTrace {
                        points: Vec::new(),
                        method: MappingMethod::BoundingBoxFallback,
                    };
                };
                warn!(
                    "[Resolver] No registered transform, using bounding-box approximation for {} samples",
                    positions.len()
                );
                let points = positions
                    .iter()
                    .map(|p| {
                        GeoPoint::new(
                            stretch(p.x, src.min_x, src.width(), dst.min_x, dst.width()),
                            stretch(p.y, src.min_y, src.height(), dst.min_y, dst.height()),
                        )
                    })
                    .collect();
                GeoTrace {
                    points,
                    method: MappingMethod::BoundingBoxFallback,
                }
            }
            MappingMethod::Unmapped => {
                warn!("[Resolver] No transform or outline, telemetry stays unmapped");
                GeoTrace::unmapped()
            }
        }
    }
}

#[cfg(not(feature = "parallel"))]
fn map_registered(t: &SimilarityTransform, positions: &[Point2D]) -> Vec<GeoPoint> {
    positions
        .iter()
        .map(|p| {
            let m = t.apply(*p);
            unproject(m.x, m.y)
        })
        .collect()
}

#[cfg(feature = "parallel")]
fn map_registered(t: &SimilarityTransform, positions: &[Point2D]) -> Vec<GeoPoint> {
    positions
        .par_iter()
        .map(|p| {
            let m = t.apply(*p);
            unproject(m.x, m.y)
        })
        .collect()
}
