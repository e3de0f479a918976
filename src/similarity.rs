//! 2D similarity transforms (uniform scale, rotation, translation).
//!
//! [`solve_similarity`] is the closed-form least-squares fit for paired
//! points, written in the complex-number form: treating centered points as
//! complex numbers `a` (source) and `b` (destination), the optimal scaled
//! rotation is `Σ conj(a)·b / Σ |a|²`. This is the global optimum for the
//! given correspondence, not an approximation.

use serde::{Deserialize, Serialize};

use crate::error::{OverlayError, Result};
use crate::Point2D;

/// Source variance below which all source points are treated as coincident.
const DEGENERATE_VARIANCE: f64 = 1e-12;

/// `p' = s · R(θ) · p + (tx, ty)` with rotation stored as `(cos θ, sin θ)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityTransform {
    pub s: f64,
    pub cos: f64,
    pub sin: f64,
    pub tx: f64,
    pub ty: f64,
}

impl Default for SimilarityTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl SimilarityTransform {
    pub const IDENTITY: Self = Self {
        s: 1.0,
        cos: 1.0,
        sin: 0.0,
        tx: 0.0,
        ty: 0.0,
    };

    /// Build from scale, rotation angle (radians) and translation.
    pub fn new(s: f64, angle: f64, tx: f64, ty: f64) -> Self {
        Self {
            s,
            cos: angle.cos(),
            sin: angle.sin(),
            tx,
            ty,
        }
    }

    /// Pure translation.
    pub fn translation(tx: f64, ty: f64) -> Self {
        Self {
            tx,
            ty,
            ..Self::IDENTITY
        }
    }

    /// Rotation angle in radians, in (-π, π].
    pub fn angle(&self) -> f64 {
        self.sin.atan2(self.cos)
    }

    pub fn apply(&self, p: Point2D) -> Point2D {
        Point2D::new(
            self.s * (self.cos * p.x - self.sin * p.y) + self.tx,
            self.s * (self.sin * p.x + self.cos * p.y) + self.ty,
        )
    }

    pub fn apply_all(&self, points: &[Point2D]) -> Vec<Point2D> {
        points.iter().map(|p| self.apply(*p)).collect()
    }

    /// `self ∘ other`: apply `other` first, then `self`.
    pub fn compose(&self, other: &SimilarityTransform) -> SimilarityTransform {
        let t = self.apply(Point2D::new(other.tx, other.ty));
        SimilarityTransform {
            s: self.s * other.s,
            cos: self.cos * other.cos - self.sin * other.sin,
            sin: self.sin * other.cos + self.cos * other.sin,
            tx: t.x,
            ty: t.y,
        }
    }

    /// Inverse transform, or `None` when the scale is zero.
    pub fn inverse(&self) -> Option<SimilarityTransform> {
        if self.s == 0.0 || !self.s.is_finite() {
            return None;
        }
        let s = 1.0 / self.s;
        // R^T · (-t) / s
        let tx = -s * (self.cos * self.tx + self.sin * self.ty);
        let ty = -s * (-self.sin * self.tx + self.cos * self.ty);
        Some(SimilarityTransform {
            s,
            cos: self.cos,
            sin: -self.sin,
            tx,
            ty,
        })
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    pub fn is_finite(&self) -> bool {
        self.s.is_finite()
            && self.cos.is_finite()
            && self.sin.is_finite()
            && self.tx.is_finite()
            && self.ty.is_finite()
    }

    /// Restore `cos² + sin² = 1` for hand-edited or rounded values.
    pub fn normalized(&self) -> SimilarityTransform {
        let norm = self.cos.hypot(self.sin);
        if norm == 0.0 || !norm.is_finite() {
            return SimilarityTransform {
                cos: 1.0,
                sin: 0.0,
                ..*self
            };
        }
        SimilarityTransform {
            cos: self.cos / norm,
            sin: self.sin / norm,
            ..*self
        }
    }
}

fn centroid(points: &[Point2D]) -> Point2D {
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Point2D::new(sx / n, sy / n)
}

/// Least-squares similarity transform mapping `source[i]` onto `target[i]`.
///
/// - 0 pairs → identity
/// - all source points coincident → translation between centroids
///
/// # Errors
/// [`OverlayError::LengthMismatch`] if the sequences differ in length.
///
/// # Example
/// ```
/// use track_overlay::{Point2D, solve_similarity};
///
/// let src = vec![Point2D::new(0.0, 0.0), Point2D::new(1.0, 0.0)];
/// let dst = vec![Point2D::new(5.0, 5.0), Point2D::new(5.0, 7.0)];
/// let t = solve_similarity(&src, &dst).unwrap();
/// assert!((t.s - 2.0).abs() < 1e-12);
/// assert!((t.angle() - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
/// ```
pub fn solve_similarity(source: &[Point2D], target: &[Point2D]) -> Result<SimilarityTransform> {
    if source.len() != target.len() {
        return Err(OverlayError::LengthMismatch {
            source_len: source.len(),
            target_len: target.len(),
        });
    }
    if source.is_empty() {
        return Ok(SimilarityTransform::IDENTITY);
    }

    let cs = centroid(source);
    let cd = centroid(target);

    let mut c_real = 0.0;
    let mut c_imag = 0.0;
    let mut denom = 0.0;
    for (p, q) in source.iter().zip(target) {
        let (ax, ay) = (p.x - cs.x, p.y - cs.y);
        let (bx, by) = (q.x - cd.x, q.y - cd.y);
        c_real += ax * bx + ay * by;
        c_imag += ax * by - ay * bx;
        denom += ax * ax + ay * ay;
    }

    if denom <= DEGENERATE_VARIANCE {
        return Ok(SimilarityTransform::translation(cd.x - cs.x, cd.y - cs.y));
    }

    let s = c_real.hypot(c_imag) / denom;
    let angle = c_imag.atan2(c_real);
    let (sin, cos) = angle.sin_cos();

    // Map the source centroid exactly onto the destination centroid
    let tx = cd.x - s * (cos * cs.x - sin * cs.y);
    let ty = cd.y - s * (sin * cs.x + cos * cs.y);

    Ok(SimilarityTransform { s, cos, sin, tx, ty })
}

/// Mean squared distance between `transform(source[i])` and `target[i]`.
pub fn mean_squared_residual(
    transform: &SimilarityTransform,
    source: &[Point2D],
    target: &[Point2D],
) -> f64 {
    if source.is_empty() {
        return 0.0;
    }
    let sum: f64 = source
        .iter()
        .zip(target)
        .map(|(p, q)| transform.apply(*p).distance_squared(q))
        .sum();
    sum / source.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    fn sample_points() -> Vec<Point2D> {
        vec![
            Point2D::new(0.0, 0.0),
            Point2D::new(12.0, 1.5),
            Point2D::new(7.0, -4.0),
            Point2D::new(-3.0, 9.0),
            Point2D::new(20.0, 11.0),
        ]
    }

    fn assert_same(a: &SimilarityTransform, b: &SimilarityTransform) {
        assert_abs_diff_eq!(a.s, b.s, epsilon = 1e-9);
        assert_abs_diff_eq!(a.cos, b.cos, epsilon = 1e-9);
        assert_abs_diff_eq!(a.sin, b.sin, epsilon = 1e-9);
        assert_abs_diff_eq!(a.tx, b.tx, epsilon = 1e-6);
        assert_abs_diff_eq!(a.ty, b.ty, epsilon = 1e-6);
    }

    #[test]
    fn test_recovers_known_transforms() {
        let src = sample_points();
        for &(s, angle, tx, ty) in &[
            (1.0, 0.0, 0.0, 0.0),
            (2.5, 0.7, 100.0, -250.0),
            (0.01, -2.9, 1.0e4, 5.0e4),
            (3.0, PI, -7.0, 3.0),
        ] {
            let known = SimilarityTransform::new(s, angle, tx, ty);
            let dst = known.apply_all(&src);
            let solved = solve_similarity(&src, &dst).unwrap();
            assert_same(&solved, &known);
            assert!(mean_squared_residual(&solved, &src, &dst) < 1e-12);
        }
    }

    #[test]
    fn test_single_pair_is_translation() {
        let src = vec![Point2D::new(1.0, 2.0)];
        let dst = vec![Point2D::new(4.0, -1.0)];
        let t = solve_similarity(&src, &dst).unwrap();
        assert_eq!(t.s, 1.0);
        assert_eq!(t.cos, 1.0);
        assert_eq!(t.sin, 0.0);
        assert_abs_diff_eq!(t.tx, 3.0);
        assert_abs_diff_eq!(t.ty, -3.0);
    }

    #[test]
    fn test_coincident_sources_translate_centroids() {
        let src = vec![Point2D::new(5.0, 5.0); 3];
        let dst = vec![
            Point2D::new(0.0, 0.0),
            Point2D::new(3.0, 0.0),
            Point2D::new(0.0, 3.0),
        ];
        let t = solve_similarity(&src, &dst).unwrap();
        assert_eq!(t.s, 1.0);
        assert_abs_diff_eq!(t.tx, -4.0);
        assert_abs_diff_eq!(t.ty, -4.0);
    }

    #[test]
    fn test_empty_is_identity() {
        let t = solve_similarity(&[], &[]).unwrap();
        assert!(t.is_identity());
    }

    #[test]
    fn test_length_mismatch() {
        let err = solve_similarity(&sample_points(), &[Point2D::default()]).unwrap_err();
        assert!(matches!(err, OverlayError::LengthMismatch { source_len: 5, target_len: 1 }));
    }

    #[test]
    fn test_maps_centroid_exactly() {
        let src = sample_points();
        let dst: Vec<Point2D> = src
            .iter()
            .enumerate()
            .map(|(i, p)| Point2D::new(p.y * 2.0 + i as f64, -p.x + 0.3 * i as f64))
            .collect();
        let t = solve_similarity(&src, &dst).unwrap();
        let mapped = t.apply(centroid(&src));
        let cd = centroid(&dst);
        assert_abs_diff_eq!(mapped.x, cd.x, epsilon = 1e-9);
        assert_abs_diff_eq!(mapped.y, cd.y, epsilon = 1e-9);
    }

    #[test]
    fn test_inverse_and_compose() {
        let t = SimilarityTransform::new(4.0, 1.1, 30.0, -12.0);
        let inv = t.inverse().unwrap();
        let p = Point2D::new(3.5, -8.25);
        let back = inv.apply(t.apply(p));
        assert_abs_diff_eq!(back.x, p.x, epsilon = 1e-9);
        assert_abs_diff_eq!(back.y, p.y, epsilon = 1e-9);
        assert_same(&t.compose(&inv), &SimilarityTransform::IDENTITY);

        let zero = SimilarityTransform { s: 0.0, ..SimilarityTransform::IDENTITY };
        assert!(zero.inverse().is_none());
    }

    #[test]
    fn test_normalized() {
        let t = SimilarityTransform { cos: 3.0, sin: 4.0, ..SimilarityTransform::IDENTITY };
        let n = t.normalized();
        assert_abs_diff_eq!(n.cos, 0.6);
        assert_abs_diff_eq!(n.sin, 0.8);
    }
}
