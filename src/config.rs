//! Persisted transform configuration.
//!
//! The only interface between the offline registration run and the
//! interactive path: registration writes it once, the viewer reads it once at
//! start and never recomputes a transform.
//!
//! ```json
//! {
//!   "created_at": "2024-05-01T12:00:00.000Z",
//!   "transform": {"s": 1.02, "cos": 0.98, "sin": 0.17, "tx": 1033000.1, "ty": 5721000.9, "angle": 0.17},
//!   "corners_count": 11,
//!   "seedS": 1.01,
//!   "notes": "..."
//! }
//! ```

use std::fs;
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{OverlayError, Result};
use crate::registration::RegistrationReport;
use crate::similarity::SimilarityTransform;

/// Serialized transform parameters; `angle` is informational.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformRecord {
    pub s: f64,
    pub cos: f64,
    pub sin: f64,
    pub tx: f64,
    pub ty: f64,
    #[serde(default)]
    pub angle: f64,
}

impl From<&SimilarityTransform> for TransformRecord {
    fn from(t: &SimilarityTransform) -> Self {
        Self {
            s: t.s,
            cos: t.cos,
            sin: t.sin,
            tx: t.tx,
            ty: t.ty,
            angle: t.angle(),
        }
    }
}

/// Transform file written by registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformConfig {
    /// ISO-8601 creation time
    pub created_at: String,
    pub transform: TransformRecord,
    pub corners_count: usize,
    /// Scale of the bounding-box seed
    #[serde(rename = "seedS")]
    pub seed_s: f64,
    #[serde(default)]
    pub notes: String,
}

impl TransformConfig {
    /// Build from a registration report, stamped with the current time.
    pub fn from_report(report: &RegistrationReport, notes: impl Into<String>) -> Self {
        Self {
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            transform: TransformRecord::from(&report.transform),
            corners_count: report.point_count,
            seed_s: report.seed.s,
            notes: notes.into(),
        }
    }

    /// The stored transform, with `(cos, sin)` renormalized to a unit pair.
    pub fn similarity(&self) -> SimilarityTransform {
        let r = &self.transform;
        SimilarityTransform {
            s: r.s,
            cos: r.cos,
            sin: r.sin,
            tx: r.tx,
            ty: r.ty,
        }
        .normalized()
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read a transform file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| OverlayError::from_io(path, e))?;
        serde_json::from_str(&json).map_err(|e| OverlayError::parse_file(path, e))
    }

    /// Read a transform file, returning `None` (and logging) on any failure.
    ///
    /// Used at viewer start, where a missing transform degrades to the
    /// bounding-box fallback instead of failing.
    pub fn load_optional(path: &Path) -> Option<Self> {
        match Self::load(path) {
            Ok(config) if config.similarity().is_finite() => {
                info!(
                    "[TransformConfig] Loaded {} ({} corners, created {})",
                    path.display(),
                    config.corners_count,
                    config.created_at
                );
                Some(config)
            }
            Ok(_) => {
                warn!("[TransformConfig] {} has non-finite parameters, ignoring", path.display());
                None
            }
            Err(e) => {
                warn!("[TransformConfig] Unavailable, using fallback mapping: {}", e);
                None
            }
        }
    }

    /// Write the transform file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| OverlayError::from_io(parent, e))?;
        }
        let json = self.to_json_pretty()?;
        fs::write(path, json).map_err(|e| OverlayError::from_io(path, e))?;
        info!("[TransformConfig] Wrote {}", path.display());
        Ok(())
    }
}
