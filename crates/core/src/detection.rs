//! Detection records produced by server-side analysis.
//!
//! A [`Detection`] is deserialized straight from the backend's anomaly
//! records. The bounding box is kept in its wire form (`"x1,y1,x2,y2"`)
//! and parsed at draw time with [`BoundingBox::parse`], so a single
//! malformed record can be skipped without discarding its siblings.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CoreError;
use crate::types::{FrameIndex, Timestamp};

/// Class name shown when a detection carries none.
pub const UNKNOWN_CLASS: &str = "Unknown";

/// Score text shown when a detection carries no confidence.
pub const MISSING_SCORE: &str = "N/A";

/* --------------------------------------------------------------------------
Colours
-------------------------------------------------------------------------- */

/// An opaque sRGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Critical detections (`#ef4444`).
    pub const RED: Rgb = Rgb(0xef, 0x44, 0x44);
    /// Warning detections (`#f59e0b`).
    pub const AMBER: Rgb = Rgb(0xf5, 0x9e, 0x0b);
    /// Every other level (`#a855f7`).
    pub const PURPLE: Rgb = Rgb(0xa8, 0x55, 0xf7);
    /// Label text.
    pub const WHITE: Rgb = Rgb(0xff, 0xff, 0xff);

    /// CSS-style hex form, e.g. `#ef4444`.
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/* --------------------------------------------------------------------------
Severity
-------------------------------------------------------------------------- */

/// Severity level attached to a detection.
///
/// Any level other than `critical` or `warning` (including a missing or
/// null one) is treated as [`Severity::Other`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    #[default]
    Other,
}

impl Severity {
    /// Map a backend `level` string onto a severity.
    pub fn from_level(level: Option<&str>) -> Self {
        match level.map(str::trim) {
            Some(l) if l.eq_ignore_ascii_case("critical") => Severity::Critical,
            Some(l) if l.eq_ignore_ascii_case("warning") => Severity::Warning,
            _ => Severity::Other,
        }
    }

    /// Stroke and label-background colour for this severity.
    pub fn color(self) -> Rgb {
        match self {
            Severity::Critical => Rgb::RED,
            Severity::Warning => Rgb::AMBER,
            Severity::Other => Rgb::PURPLE,
        }
    }
}

fn deserialize_level<'de, D>(deserializer: D) -> Result<Severity, D::Error>
where
    D: Deserializer<'de>,
{
    let level = Option::<String>::deserialize(deserializer)?;
    Ok(Severity::from_level(level.as_deref()))
}

/* --------------------------------------------------------------------------
Bounding box
-------------------------------------------------------------------------- */

/// Box corners in source-video pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    /// Parse the wire form `"x1,y1,x2,y2"`.
    ///
    /// Exactly four finite numbers are required. Ordering of the corners
    /// is not checked here; a box that collapses to a non-positive size
    /// is rejected when it is mapped onto a surface.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let malformed = |reason: String| CoreError::MalformedBox {
            raw: raw.to_string(),
            reason,
        };

        let parts: Vec<&str> = raw.split(',').collect();
        if parts.len() != 4 {
            return Err(malformed(format!(
                "expected 4 coordinates, got {}",
                parts.len()
            )));
        }

        let mut coords = [0.0f64; 4];
        for (slot, part) in coords.iter_mut().zip(&parts) {
            let value: f64 = part
                .trim()
                .parse()
                .map_err(|_| malformed(format!("'{}' is not a number", part.trim())))?;
            if !value.is_finite() {
                return Err(malformed(format!("'{}' is not finite", part.trim())));
            }
            *slot = value;
        }

        let [x1, y1, x2, y2] = coords;
        Ok(Self { x1, y1, x2, y2 })
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }
}

/* --------------------------------------------------------------------------
Detection
-------------------------------------------------------------------------- */

/// One bounding-box annotation for a single frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Detection {
    /// Backend row id, when the endpoint includes it.
    #[serde(default)]
    pub id: Option<i64>,
    pub frame_id: FrameIndex,
    /// Wire form `"x1,y1,x2,y2"`; absent boxes are treated as malformed.
    #[serde(default)]
    pub bounding_box: Option<String>,
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(rename = "level", default, deserialize_with = "deserialize_level")]
    pub severity: Severity,
    #[serde(rename = "anomaly_score", default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
}

impl Detection {
    /// Build a detection in code (tests, fixtures, synthetic feeds).
    pub fn new(frame_id: FrameIndex, bounding_box: impl Into<String>) -> Self {
        Self {
            id: None,
            frame_id,
            bounding_box: Some(bounding_box.into()),
            class_name: None,
            severity: Severity::Other,
            confidence: None,
            timestamp: None,
        }
    }

    pub fn with_class(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Parse this detection's box.
    pub fn parse_box(&self) -> Result<BoundingBox, CoreError> {
        match self.bounding_box.as_deref() {
            Some(raw) => BoundingBox::parse(raw),
            None => Err(CoreError::MalformedBox {
                raw: String::new(),
                reason: "bounding box missing".to_string(),
            }),
        }
    }

    /// Class name, or [`UNKNOWN_CLASS`] when absent or blank.
    pub fn display_class(&self) -> &str {
        match self.class_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => UNKNOWN_CLASS,
        }
    }

    /// Overlay label: `"<class> (<score to 2dp>)"`.
    pub fn label(&self) -> String {
        let score = match self.confidence {
            Some(c) if c.is_finite() => format!("{c:.2}"),
            _ => MISSING_SCORE.to_string(),
        };
        format!("{} ({score})", self.display_class())
    }
}

/* --------------------------------------------------------------------------
Tests
-------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    // -- BoundingBox::parse --

    #[test]
    fn parses_four_coordinates() {
        let b = BoundingBox::parse("10,20,110,220").unwrap();
        assert_eq!(b, BoundingBox { x1: 10.0, y1: 20.0, x2: 110.0, y2: 220.0 });
        assert_eq!(b.width(), 100.0);
        assert_eq!(b.height(), 200.0);
    }

    #[test]
    fn tolerates_whitespace_and_decimals() {
        let b = BoundingBox::parse(" 1.5, 2 ,3.25 ,4 ").unwrap();
        assert_eq!(b.x1, 1.5);
        assert_eq!(b.x2, 3.25);
    }

    #[test]
    fn three_coordinates_rejected() {
        assert_matches!(
            BoundingBox::parse("10,20,30"),
            Err(CoreError::MalformedBox { reason, .. }) if reason.contains("got 3")
        );
    }

    #[test]
    fn non_numeric_rejected() {
        assert_matches!(
            BoundingBox::parse("10,abc,30,40"),
            Err(CoreError::MalformedBox { .. })
        );
        assert!(BoundingBox::parse("").is_err());
        assert!(BoundingBox::parse("1,2,3,inf").is_err());
    }

    // -- Severity --

    #[test]
    fn severity_colours() {
        assert_eq!(Severity::from_level(Some("critical")).color().to_hex(), "#ef4444");
        assert_eq!(Severity::from_level(Some("warning")).color().to_hex(), "#f59e0b");
        assert_eq!(Severity::from_level(Some("info")).color().to_hex(), "#a855f7");
        assert_eq!(Severity::from_level(None), Severity::Other);
    }

    // -- Detection --

    #[test]
    fn deserializes_backend_record() {
        let json = serde_json::json!({
            "id": 7,
            "frame_id": 120,
            "bounding_box": "960,540,1920,1080",
            "class_name": "car",
            "level": "critical",
            "anomaly_score": 0.876,
        });
        let d: Detection = serde_json::from_value(json).unwrap();
        assert_eq!(d.frame_id, 120);
        assert_eq!(d.severity, Severity::Critical);
        assert_eq!(d.label(), "car (0.88)");
    }

    #[test]
    fn missing_optional_fields_default() {
        let json = serde_json::json!({
            "frame_id": 3,
            "bounding_box": "1,2,3,4",
            "level": null,
            "class_name": null,
        });
        let d: Detection = serde_json::from_value(json).unwrap();
        assert_eq!(d.severity, Severity::Other);
        assert_eq!(d.label(), "Unknown (N/A)");
    }

    #[test]
    fn missing_box_is_malformed() {
        let mut d = Detection::new(1, "1,2,3,4");
        d.bounding_box = None;
        assert!(d.parse_box().is_err());
    }

    #[test]
    fn zero_score_still_formatted() {
        let d = Detection::new(1, "1,2,3,4").with_class("bus").with_confidence(0.0);
        assert_eq!(d.label(), "bus (0.00)");
    }
}
