//! # Transform Registration
//!
//! Finds the similarity transform that places planar corner points onto the
//! projected geographic track outline. This is a restricted ICP: one set of
//! named points matched against one polyline.
//!
//! ## Algorithm
//! 1. Seed from bounding boxes (isotropic scale = mean of the x/y ratios,
//!    centers aligned, no rotation)
//! 2. Map every reference point with the current transform
//! 3. Match each mapped point to its nearest point on the outline
//! 4. Re-solve the least-squares similarity from the *original* reference
//!    points to those nearest points
//! 5. Stop when the mean squared residual changes by less than the tolerance,
//!    or after the iteration cap
//!
//! Runs synchronously to completion; there are no externally visible
//! intermediate states.

use std::time::Instant;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{OptionExt, Result};
use crate::polyline::{NearestPointOracle, Polyline, SegmentIndex};
use crate::similarity::{solve_similarity, SimilarityTransform};
use crate::{Bounds, Point2D};

/// Configuration for registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationConfig {
    /// Hard cap on match/solve rounds.
    /// Default: 20
    pub max_iterations: u32,

    /// Stop once |Δ mean squared residual| between rounds falls below this (m²).
    /// Default: 1e-6
    pub convergence_tolerance: f64,

    /// Outlines with more vertices than this are queried through an R-tree.
    /// Default: 256
    pub spatial_index_threshold: usize,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            convergence_tolerance: 1e-6,
            spatial_index_threshold: 256,
        }
    }
}

/// Outcome of a registration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationReport {
    /// Final transform, reference frame → projected Web Mercator meters
    pub transform: SimilarityTransform,
    /// Bounding-box seed the iterations started from
    pub seed: SimilarityTransform,
    /// Rounds actually run
    pub iterations: u32,
    /// True if the tolerance was met before the cap
    pub converged: bool,
    /// Mean squared residual measured at the start of each round (m²)
    pub residual_history: Vec<f64>,
    /// Mean squared residual of the final transform (m²)
    pub mean_squared_residual: f64,
    /// Mean distance from mapped points to the outline with the final transform (m)
    pub mean_error_m: f64,
    /// Number of reference points used
    pub point_count: usize,
}

impl RegistrationReport {
    /// Root mean squared residual of the final transform (m).
    pub fn rms_error_m(&self) -> f64 {
        self.mean_squared_residual.sqrt()
    }
}

/// Initial transform from matching bounding boxes.
///
/// The x and y scale ratios are averaged into one isotropic scale; axes with
/// zero extent are ignored, and if both are degenerate the scale is 1.
pub fn seed_transform(reference: &Bounds, target: &Bounds) -> SimilarityTransform {
    let ratio = |t: f64, r: f64| {
        let q = t / r;
        (r > 0.0 && q.is_finite() && q > 0.0).then_some(q)
    };
    let s = match (
        ratio(target.width(), reference.width()),
        ratio(target.height(), reference.height()),
    ) {
        (Some(sx), Some(sy)) => (sx + sy) / 2.0,
        (Some(sx), None) => sx,
        (None, Some(sy)) => sy,
        (None, None) => 1.0,
    };

    let rc = reference.center();
    let tc = target.center();
    SimilarityTransform {
        s,
        cos: 1.0,
        sin: 0.0,
        tx: tc.x - s * rc.x,
        ty: tc.y - s * rc.y,
    }
}

/// Match every reference point through `transform` against the outline.
///
/// Returns the nearest outline points and the mean squared residual.
fn match_points(
    reference: &[Point2D],
    transform: &SimilarityTransform,
    oracle: &dyn NearestPointOracle,
) -> (Vec<Point2D>, f64) {
    let mut targets = Vec::with_capacity(reference.len());
    let mut sum = 0.0;
    for p in reference {
        let hit = oracle.nearest(transform.apply(*p));
        sum += hit.squared_distance;
        targets.push(hit.point);
    }
    (targets, sum / reference.len() as f64)
}

/// Register planar reference points onto a projected outline.
///
/// # Arguments
/// * `reference` - Corner points in the telemetry's planar frame
/// * `outline` - Track outline in Web Mercator meters
/// * `config` - Iteration cap, tolerance and index threshold
///
/// # Errors
/// [`crate::OverlayError::InsufficientPoints`] if `reference` is empty.
pub fn register(
    reference: &[Point2D],
    outline: &Polyline,
    config: &RegistrationConfig,
) -> Result<RegistrationReport> {
    let start = Instant::now();
    let reference_bounds = Bounds::from_points(reference).ok_or_insufficient_points(
        "reference point set",
        reference.len(),
        1,
    )?;

    let seed = seed_transform(&reference_bounds, &outline.bounds());
    info!(
        "[Registration] {} reference points, {} outline vertices, seed scale {:.6}",
        reference.len(),
        outline.len(),
        seed.s
    );

    let index;
    let oracle: &dyn NearestPointOracle = if outline.len() > config.spatial_index_threshold {
        index = SegmentIndex::build(outline);
        &index
    } else {
        outline
    };

    let mut transform = seed;
    let mut history = Vec::with_capacity(config.max_iterations as usize);
    let mut previous: Option<f64> = None;
    let mut converged = false;

    for iteration in 0..config.max_iterations {
        let (targets, msr) = match_points(reference, &transform, oracle);
        history.push(msr);
        transform = solve_similarity(reference, &targets)?;

        debug!(
            "[Registration] iter {}: msr={:.9} s={:.6} angle={:.6}",
            iteration + 1,
            msr,
            transform.s,
            transform.angle()
        );

        if let Some(prev) = previous {
            if (prev - msr).abs() < config.convergence_tolerance {
                converged = true;
                break;
            }
        }
        previous = Some(msr);
    }

    let mut error_sum = 0.0;
    let mut squared_sum = 0.0;
    for p in reference {
        let hit = oracle.nearest(transform.apply(*p));
        squared_sum += hit.squared_distance;
        error_sum += hit.squared_distance.sqrt();
    }
    let n = reference.len() as f64;

    let report = RegistrationReport {
        transform,
        seed,
        iterations: history.len() as u32,
        converged,
        residual_history: history,
        mean_squared_residual: squared_sum / n,
        mean_error_m: error_sum / n,
        point_count: reference.len(),
    };

    info!(
        "[Registration] {} after {} iterations in {}ms: s={:.6} angle={:.6} mean error {:.3}m",
        if report.converged { "Converged" } else { "Stopped" },
        report.iterations,
        start.elapsed().as_millis(),
        report.transform.s,
        report.transform.angle(),
        report.mean_error_m
    );

    Ok(report)
}
