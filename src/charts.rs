//! Distance-domain chart series.
//!
//! Charts plot a metric against lap distance rather than time, so two drivers
//! line up corner by corner. The playback cursor is placed on a chart by
//! looking up the current interpolated distance.

use geo::{Coord, LineString, Simplify};
use serde::{Deserialize, Serialize};

use crate::playback::segment_fraction;
use crate::telemetry::{Metric, TelemetryTrace};

/// `(distance, value)` pairs for one metric, ordered by distance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub metric: Metric,
    pub points: Vec<(f64, f64)>,
}

impl ChartSeries {
    /// Extract a series from a trace. Samples with non-finite values are skipped.
    pub fn from_trace(trace: &TelemetryTrace, metric: Metric) -> Self {
        let points = trace
            .distances()
            .iter()
            .zip(trace.column(metric))
            .map(|(&d, &v)| (d, v))
            .filter(|(d, v)| d.is_finite() && v.is_finite())
            .collect();
        Self { metric, points }
    }

    /// One series per metric.
    pub fn all(trace: &TelemetryTrace) -> Vec<Self> {
        Metric::ALL
            .iter()
            .map(|&m| Self::from_trace(trace, m))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// `(min, max)` of the values.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        let mut values = self.points.iter().map(|&(_, v)| v);
        let first = values.next()?;
        Some(values.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
    }

    /// Value at `distance`, clamped to the series' extent.
    ///
    /// Discrete metrics take the nearer sample, matching
    /// [`GearInterpolation::Nearest`](crate::GearInterpolation::Nearest);
    /// the rest interpolate linearly.
    pub fn value_at_distance(&self, distance: f64) -> Option<f64> {
        let n = self.points.len();
        if n == 0 {
            return None;
        }
        let after = self.points.partition_point(|&(d, _)| d <= distance);
        if after == 0 {
            return Some(self.points[0].1);
        }
        if after == n {
            return Some(self.points[n - 1].1);
        }
        let (d0, v0) = self.points[after - 1];
        let (d1, v1) = self.points[after];
        let f = segment_fraction(d0, d1, distance);
        if self.metric.is_discrete() {
            // Same nearest-sample rule as playback
            return Some(if f < 0.5 { v0 } else { v1 });
        }
        Some(v0 + (v1 - v0) * f)
    }

    /// Douglas-Peucker simplification for drawing, endpoints kept.
    pub fn simplified(&self, tolerance: f64) -> Self {
        if self.points.len() < 3 || tolerance <= 0.0 {
            return self.clone();
        }
        let line: LineString<f64> = self
            .points
            .iter()
            .map(|&(x, y)| Coord { x, y })
            .collect();
        let points = line
            .simplify(&tolerance)
            .coords()
            .map(|c| (c.x, c.y))
            .collect();
        Self {
            metric: self.metric,
            points,
        }
    }
}
