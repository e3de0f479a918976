//! Unified error handling for the track-overlay library.
//!
//! Offline registration failures are fatal and surface as [`OverlayError`].
//! The interactive path (trace loading, coordinate mapping, playback) never
//! propagates these to the map view: it degrades to a defined fallback instead.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while parsing a telemetry trace, roster or reference file.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Input was not valid JSON for the expected shape
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// A required column/array is absent
    #[error("missing required column '{0}'")]
    MissingColumn(&'static str),
    /// Parallel arrays disagree on length
    #[error("column '{column}' has {found} values, expected {expected}")]
    LengthMismatch {
        column: &'static str,
        expected: usize,
        found: usize,
    },
    /// Time column decreases between two samples
    #[error("time decreases at sample {index} ({previous} -> {current})")]
    NonMonotonicTime {
        index: usize,
        previous: f64,
        current: f64,
    },
    /// Time column contains NaN or infinity
    #[error("time is not finite at sample {index}")]
    NonFiniteTime { index: usize },
    /// A coordinate pair has fewer than two components
    #[error("coordinate {index} has {found} components, expected at least 2")]
    ShortCoordinate { index: usize, found: usize },
    /// The document has no usable feature geometry
    #[error("no feature geometry found")]
    MissingGeometry,
}

/// Unified error type for track-overlay operations.
#[derive(Debug, Error)]
pub enum OverlayError {
    /// Input has too few points for the operation
    #[error("{context} has {point_count} points, minimum {minimum_required} required")]
    InsufficientPoints {
        context: String,
        point_count: usize,
        minimum_required: usize,
    },
    /// Paired point sequences differ in length
    #[error("point sets differ in length: {source_len} source vs {target_len} target")]
    LengthMismatch { source_len: usize, target_len: usize },
    /// Playback speed multiplier must be finite and positive
    #[error("invalid playback speed multiplier {multiplier}")]
    InvalidSpeed { multiplier: f64 },
    /// Required input file does not exist
    #[error("missing input file: {}", path.display())]
    MissingInput { path: PathBuf },
    /// I/O failure on a named file
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A named input file could not be parsed
    #[error("cannot parse {}: {source}", path.display())]
    ParseFile {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
    /// Parsing failed
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    /// Serializing output failed
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl OverlayError {
    /// Wrap an I/O error for `path`, reporting missing files as [`OverlayError::MissingInput`].
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            OverlayError::MissingInput { path }
        } else {
            OverlayError::Io { path, source }
        }
    }

    /// Attach the file name to a parse failure.
    pub fn parse_file(path: impl Into<PathBuf>, source: impl Into<ParseError>) -> Self {
        OverlayError::ParseFile {
            path: path.into(),
            source: source.into(),
        }
    }
}

/// Result type alias for track-overlay operations.
pub type Result<T> = std::result::Result<T, OverlayError>;

/// Extension trait for converting Option to OverlayError.
pub trait OptionExt<T> {
    /// Convert Option to Result with insufficient points error.
    fn ok_or_insufficient_points(self, context: &str, point_count: usize, minimum: usize)
        -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_insufficient_points(
        self,
        context: &str,
        point_count: usize,
        minimum: usize,
    ) -> Result<T> {
        self.ok_or_else(|| OverlayError::InsufficientPoints {
            context: context.to_string(),
            point_count,
            minimum_required: minimum,
        })
    }
}
