//! Telemetry traces and the driver roster.
//!
//! A trace file holds parallel numeric arrays, either at the top level or
//! under a `tel` key:
//!
//! ```json
//! {"tel": {"time": [...], "distance": [...], "x": [...], "y": [...],
//!          "speed": [...], "throttle": [...], "brake": [...], "rpm": [...], "gear": [...]}}
//! ```
//!
//! Parsing validates the document once at the loading boundary; downstream
//! code only ever sees a well-formed [`TelemetryTrace`]. `x` and `y` are
//! required. `time` is optional: without it the trace can still be drawn but
//! not played back. Absent metric columns are filled with zeros.

use std::fs;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{OverlayError, ParseError, Result};
use crate::Point2D;

/// Per-sample scalar channels that can be charted or interpolated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Speed,
    Throttle,
    Brake,
    Rpm,
    Gear,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::Speed,
        Metric::Throttle,
        Metric::Brake,
        Metric::Rpm,
        Metric::Gear,
    ];

    /// Discrete channels are not smoothly interpolated.
    pub fn is_discrete(&self) -> bool {
        matches!(self, Metric::Gear)
    }
}

/// One recorded instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// Elapsed lap time (s), `None` if the trace has no time column
    pub time: Option<f64>,
    /// Lap distance (m)
    pub distance: f64,
    pub x: f64,
    pub y: f64,
    pub speed: f64,
    pub throttle: f64,
    pub brake: f64,
    pub rpm: f64,
    pub gear: i32,
}

#[derive(Debug, Default, Deserialize)]
struct RawColumns {
    time: Option<Vec<f64>>,
    distance: Option<Vec<f64>>,
    x: Option<Vec<f64>>,
    y: Option<Vec<f64>>,
    speed: Option<Vec<f64>>,
    throttle: Option<Vec<f64>>,
    brake: Option<Vec<f64>>,
    rpm: Option<Vec<f64>>,
    gear: Option<Vec<f64>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTraceFile {
    Wrapped { tel: RawColumns },
    Bare(RawColumns),
}

/// A single lap's samples as parallel columns.
///
/// Invariants (checked at construction): all columns share one length, and
/// `time`, when present, is finite and non-decreasing. Deserializing goes
/// through the same checks as [`TelemetryTrace::from_json_str`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTraceFile")]
pub struct TelemetryTrace {
    time: Option<Vec<f64>>,
    distance: Vec<f64>,
    x: Vec<f64>,
    y: Vec<f64>,
    speed: Vec<f64>,
    throttle: Vec<f64>,
    brake: Vec<f64>,
    rpm: Vec<f64>,
    gear: Vec<f64>,
}

fn required(column: Option<Vec<f64>>, name: &'static str) -> std::result::Result<Vec<f64>, ParseError> {
    column.ok_or(ParseError::MissingColumn(name))
}

fn optional(
    column: Option<Vec<f64>>,
    name: &'static str,
    len: usize,
) -> std::result::Result<Vec<f64>, ParseError> {
    match column {
        Some(values) if values.len() == len => Ok(values),
        Some(values) => Err(ParseError::LengthMismatch {
            column: name,
            expected: len,
            found: values.len(),
        }),
        None => {
            debug!("[Telemetry] Column '{}' absent, filling with zeros", name);
            Ok(vec![0.0; len])
        }
    }
}

fn validate_time(time: &[f64]) -> std::result::Result<(), ParseError> {
    for (index, t) in time.iter().enumerate() {
        if !t.is_finite() {
            return Err(ParseError::NonFiniteTime { index });
        }
    }
    for (i, w) in time.windows(2).enumerate() {
        if w[1] < w[0] {
            return Err(ParseError::NonMonotonicTime {
                index: i + 1,
                previous: w[0],
                current: w[1],
            });
        }
    }
    Ok(())
}

impl TryFrom<RawTraceFile> for TelemetryTrace {
    type Error = ParseError;

    fn try_from(raw: RawTraceFile) -> std::result::Result<Self, Self::Error> {
        match raw {
            RawTraceFile::Wrapped { tel } => Self::from_raw(tel),
            RawTraceFile::Bare(columns) => Self::from_raw(columns),
        }
    }
}

impl TelemetryTrace {
    fn from_raw(raw: RawColumns) -> std::result::Result<Self, ParseError> {
        let x = required(raw.x, "x")?;
        let len = x.len();
        let y = optional(Some(required(raw.y, "y")?), "y", len)?;

        let time = match raw.time {
            Some(t) => {
                let t = optional(Some(t), "time", len)?;
                validate_time(&t)?;
                Some(t)
            }
            None => None,
        };

        Ok(Self {
            time,
            distance: optional(raw.distance, "distance", len)?,
            x,
            y,
            speed: optional(raw.speed, "speed", len)?,
            throttle: optional(raw.throttle, "throttle", len)?,
            brake: optional(raw.brake, "brake", len)?,
            rpm: optional(raw.rpm, "rpm", len)?,
            gear: optional(raw.gear, "gear", len)?,
        })
    }

    /// Parse a trace document (wrapped in `tel` or bare).
    pub fn from_json_str(json: &str) -> std::result::Result<Self, ParseError> {
        Self::try_from(serde_json::from_str::<RawTraceFile>(json)?)
    }

    /// Read and parse a trace file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| OverlayError::from_io(path, e))?;
        Self::from_json_str(&json).map_err(|e| OverlayError::parse_file(path, e))
    }

    /// Build a trace from samples. Time is kept only if every sample has one.
    pub fn from_samples(samples: &[TelemetrySample]) -> std::result::Result<Self, ParseError> {
        let time: Option<Vec<f64>> = samples.iter().map(|s| s.time).collect();
        if let Some(t) = &time {
            validate_time(t)?;
        }
        Ok(Self {
            time,
            distance: samples.iter().map(|s| s.distance).collect(),
            x: samples.iter().map(|s| s.x).collect(),
            y: samples.iter().map(|s| s.y).collect(),
            speed: samples.iter().map(|s| s.speed).collect(),
            throttle: samples.iter().map(|s| s.throttle).collect(),
            brake: samples.iter().map(|s| s.brake).collect(),
            rpm: samples.iter().map(|s| s.rpm).collect(),
            gear: samples.iter().map(|s| s.gear as f64).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// True if the trace can drive playback (has time and at least one sample).
    pub fn has_playback_data(&self) -> bool {
        self.time.as_ref().is_some_and(|t| !t.is_empty())
    }

    pub fn times(&self) -> Option<&[f64]> {
        self.time.as_deref()
    }

    pub fn distances(&self) -> &[f64] {
        &self.distance
    }

    pub fn xs(&self) -> &[f64] {
        &self.x
    }

    pub fn ys(&self) -> &[f64] {
        &self.y
    }

    /// Column for a scalar metric.
    pub fn column(&self, metric: Metric) -> &[f64] {
        match metric {
            Metric::Speed => &self.speed,
            Metric::Throttle => &self.throttle,
            Metric::Brake => &self.brake,
            Metric::Rpm => &self.rpm,
            Metric::Gear => &self.gear,
        }
    }

    /// Planar positions in recording order.
    pub fn positions(&self) -> Vec<Point2D> {
        self.x
            .iter()
            .zip(&self.y)
            .map(|(&x, &y)| Point2D::new(x, y))
            .collect()
    }

    pub fn position(&self, index: usize) -> Option<Point2D> {
        Some(Point2D::new(*self.x.get(index)?, *self.y.get(index)?))
    }

    pub fn sample(&self, index: usize) -> Option<TelemetrySample> {
        if index >= self.len() {
            return None;
        }
        Some(TelemetrySample {
            time: self.time.as_ref().map(|t| t[index]),
            distance: self.distance[index],
            x: self.x[index],
            y: self.y[index],
            speed: self.speed[index],
            throttle: self.throttle[index],
            brake: self.brake[index],
            rpm: self.rpm[index],
            gear: self.gear[index].round() as i32,
        })
    }

    pub fn samples(&self) -> impl Iterator<Item = TelemetrySample> + '_ {
        (0..self.len()).filter_map(move |i| self.sample(i))
    }

    /// `(first, last)` sample time, if the trace has time.
    pub fn time_range(&self) -> Option<(f64, f64)> {
        let t = self.time.as_ref()?;
        Some((*t.first()?, *t.last()?))
    }

    /// Lap duration in seconds (0 without time).
    pub fn duration(&self) -> f64 {
        self.time_range().map(|(a, b)| b - a).unwrap_or(0.0)
    }
}

// ============================================================================
// Driver Roster
// ============================================================================

/// One roster entry, used for name/colour lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverEntry {
    /// Three-letter driver code, also the trace file stem
    pub driver: String,
    pub team: String,
    /// Hex colour, with or without a leading '#'
    pub color: String,
}

impl DriverEntry {
    /// Colour normalized to `#rrggbb` form.
    pub fn css_color(&self) -> String {
        if self.color.starts_with('#') {
            self.color.clone()
        } else {
            format!("#{}", self.color)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DriverRoster {
    #[serde(default)]
    pub drivers: Vec<DriverEntry>,
}

impl DriverRoster {
    pub fn from_json_str(json: &str) -> std::result::Result<Self, ParseError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| OverlayError::from_io(path, e))?;
        Self::from_json_str(&json).map_err(|e| OverlayError::parse_file(path, e))
    }

    pub fn find(&self, code: &str) -> Option<&DriverEntry> {
        self.drivers
            .iter()
            .find(|d| d.driver.eq_ignore_ascii_case(code))
    }

    pub fn codes(&self) -> Vec<&str> {
        self.drivers.iter().map(|d| d.driver.as_str()).collect()
    }
}
