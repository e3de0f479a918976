//! Reference inputs for registration.
//!
//! - Corner file: `{"X": [...], "Y": [...], "CornerNumber": [...]}` in the
//!   telemetry's planar frame. `CornerNumber` is optional.
//! - Outline file: GeoJSON-like, the first feature's `geometry.coordinates`
//!   as `[longitude, latitude]` pairs (extra components such as altitude are
//!   ignored).

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{OverlayError, ParseError, Result};
use crate::projection::project_all;
use crate::{GeoPoint, Point2D, Polyline};

/// Corner identifier as it appears in the file: a number or free text.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
enum RawCornerId {
    Number(f64),
    Text(String),
}

impl RawCornerId {
    fn label(&self) -> String {
        match self {
            RawCornerId::Number(n) if n.fract() == 0.0 => format!("{}", *n as i64),
            RawCornerId::Number(n) => n.to_string(),
            RawCornerId::Text(s) => s.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawCorners {
    #[serde(rename = "X")]
    x: Option<Vec<f64>>,
    #[serde(rename = "Y")]
    y: Option<Vec<f64>>,
    #[serde(rename = "CornerNumber", default)]
    corner_number: Option<Vec<RawCornerId>>,
}

/// A named control point in the telemetry's planar frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencePoint {
    pub index: usize,
    /// Corner identifier, e.g. "4" or "10a"
    pub label: Option<String>,
    pub position: Point2D,
}

/// Source set for registration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReferencePointSet {
    pub points: Vec<ReferencePoint>,
}

impl ReferencePointSet {
    /// Build an unlabeled set from planar positions.
    pub fn from_positions(positions: &[Point2D]) -> Self {
        Self {
            points: positions
                .iter()
                .enumerate()
                .map(|(index, p)| ReferencePoint {
                    index,
                    label: None,
                    position: *p,
                })
                .collect(),
        }
    }

    /// Parse the `{X, Y, CornerNumber?}` document.
    pub fn from_json_str(json: &str) -> std::result::Result<Self, ParseError> {
        let raw: RawCorners = serde_json::from_str(json)?;
        let xs = raw.x.ok_or(ParseError::MissingColumn("X"))?;
        let ys = raw.y.ok_or(ParseError::MissingColumn("Y"))?;
        if ys.len() != xs.len() {
            return Err(ParseError::LengthMismatch {
                column: "Y",
                expected: xs.len(),
                found: ys.len(),
            });
        }
        if let Some(ids) = &raw.corner_number {
            if ids.len() != xs.len() {
                return Err(ParseError::LengthMismatch {
                    column: "CornerNumber",
                    expected: xs.len(),
                    found: ids.len(),
                });
            }
        }

        let points = xs
            .iter()
            .zip(&ys)
            .enumerate()
            .map(|(index, (&x, &y))| ReferencePoint {
                index,
                label: raw
                    .corner_number
                    .as_ref()
                    .and_then(|ids| ids.get(index))
                    .map(RawCornerId::label),
                position: Point2D::new(x, y),
            })
            .collect();

        Ok(Self { points })
    }

    /// Read and parse a corner file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| OverlayError::from_io(path, e))?;
        Self::from_json_str(&json).map_err(|e| OverlayError::parse_file(path, e))
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn positions(&self) -> Vec<Point2D> {
        self.points.iter().map(|p| p.position).collect()
    }

    /// Find a corner by its label.
    pub fn by_label(&self, label: &str) -> Option<&ReferencePoint> {
        self.points
            .iter()
            .find(|p| p.label.as_deref() == Some(label))
    }
}

#[derive(Debug, Deserialize)]
struct RawFeatureCollection {
    #[serde(default)]
    features: Vec<RawFeature>,
}

#[derive(Debug, Deserialize)]
struct RawFeature {
    geometry: Option<RawGeometry>,
}

#[derive(Debug, Deserialize)]
struct RawGeometry {
    coordinates: Vec<Vec<f64>>,
}

/// Authoritative track outline in geographic coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceOutline {
    pub points: Vec<GeoPoint>,
}

impl ReferenceOutline {
    /// Parse `features[0].geometry.coordinates`.
    pub fn from_geojson_str(json: &str) -> std::result::Result<Self, ParseError> {
        let raw: RawFeatureCollection = serde_json::from_str(json)?;
        let geometry = raw
            .features
            .into_iter()
            .next()
            .and_then(|f| f.geometry)
            .ok_or(ParseError::MissingGeometry)?;

        let points = geometry
            .coordinates
            .iter()
            .enumerate()
            .map(|(index, c)| match c.as_slice() {
                [lon, lat, ..] => Ok(GeoPoint::new(*lon, *lat)),
                _ => Err(ParseError::ShortCoordinate {
                    index,
                    found: c.len(),
                }),
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self { points })
    }

    /// Read and parse an outline file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| OverlayError::from_io(path, e))?;
        Self::from_geojson_str(&json).map_err(|e| OverlayError::parse_file(path, e))
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Project into Web Mercator meters as a polyline (the registration target).
    pub fn projected(&self) -> Result<Polyline> {
        Polyline::new(project_all(&self.points)).map_err(|_| OverlayError::InsufficientPoints {
            context: "reference outline".to_string(),
            point_count: self.points.len(),
            minimum_required: Polyline::MIN_POINTS,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_corners_with_labels() {
        let json = r#"{"X": [0, 10.5, 3], "Y": [1, 2, 3], "CornerNumber": [1, 2, "2a"]}"#;
        let set = ReferencePointSet::from_json_str(json).unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.points[1].position, Point2D::new(10.5, 2.0));
        assert_eq!(set.points[0].label.as_deref(), Some("1"));
        assert_eq!(set.by_label("2a").unwrap().index, 2);
    }

    #[test]
    fn test_parse_corners_without_labels() {
        let set = ReferencePointSet::from_json_str(r#"{"X": [1, 2], "Y": [3, 4]}"#).unwrap();
        assert!(set.points.iter().all(|p| p.label.is_none()));
    }

    #[test]
    fn test_corner_length_mismatch() {
        let err = ReferencePointSet::from_json_str(r#"{"X": [1, 2], "Y": [3]}"#).unwrap_err();
        assert!(matches!(err, ParseError::LengthMismatch { column: "Y", .. }));

        let err = ReferencePointSet::from_json_str(r#"{"X": [1], "Y": [3], "CornerNumber": []}"#)
            .unwrap_err();
        assert!(matches!(err, ParseError::LengthMismatch { column: "CornerNumber", .. }));
    }

    #[test]
    fn test_corner_missing_column() {
        let err = ReferencePointSet::from_json_str(r#"{"Y": [3]}"#).unwrap_err();
        assert!(matches!(err, ParseError::MissingColumn("X")));
    }

    #[test]
    fn test_parse_outline() {
        let json = r#"{
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {"name": "test"},
                "geometry": {"type": "LineString", "coordinates": [[9.28, 45.61], [9.29, 45.62, 180.0]]}
            }]
        }"#;
        let outline = ReferenceOutline::from_geojson_str(json).unwrap();
        assert_eq!(outline.len(), 2);
        assert_eq!(outline.points[1], GeoPoint::new(9.29, 45.62));
        assert_eq!(outline.projected().unwrap().len(), 2);
    }

    #[test]
    fn test_outline_errors() {
        assert!(matches!(
            ReferenceOutline::from_geojson_str(r#"{"features": []}"#),
            Err(ParseError::MissingGeometry)
        ));
        let short = r#"{"features": [{"geometry": {"coordinates": [[1.0]]}}]}"#;
        assert!(matches!(
            ReferenceOutline::from_geojson_str(short),
            Err(ParseError::ShortCoordinate { index: 0, found: 1 })
        ));
        let single = r#"{"features": [{"geometry": {"coordinates": [[1.0, 2.0]]}}]}"#;
        let outline = ReferenceOutline::from_geojson_str(single).unwrap();
        assert!(outline.projected().is_err());
    }
}
