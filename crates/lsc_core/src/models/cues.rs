//! Mouth cue data types.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::shapes::ShapeKey;

/// One mouth shape held over a time interval. Times are in seconds from
/// the start of the sound file; `end >= start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MouthCue {
    /// The mouth shape to show.
    #[serde(rename = "value")]
    pub key: ShapeKey,
    /// Interval start in seconds.
    pub start: f64,
    /// Interval end in seconds.
    pub end: f64,
}

impl MouthCue {
    pub fn new(key: ShapeKey, start: f64, end: f64) -> Self {
        Self { key, start, end }
    }

    /// Cue length in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Approximate equality with a millisecond tolerance. Useful in tests
    /// comparing against expected captures; exact float equality is too
    /// strict after the times went through frame conversions.
    pub fn approx_eq(&self, other: &MouthCue) -> bool {
        const TOLERANCE: f64 = 0.001;
        self.key == other.key
            && (self.start - other.start).abs() < TOLERANCE
            && (self.end - other.end).abs() < TOLERANCE
    }
}

impl fmt::Display for MouthCue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' {:.2}-{:.2}", self.key, self.start, self.end)
    }
}

/// Metadata block of the tool's output document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureMetadata {
    /// Name of the analyzed sound file.
    #[serde(rename = "soundFile", default)]
    pub sound_file: String,
    /// Sound duration in seconds.
    #[serde(default)]
    pub duration: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cue_deserializes_from_tool_json() {
        let cue: MouthCue =
            serde_json::from_str(r#"{"start": 0.00, "end": 0.28, "value": "X"}"#).unwrap();
        assert_eq!(cue.key, ShapeKey::X);
        assert!((cue.duration() - 0.28).abs() < 1e-9);
    }

    #[test]
    fn approx_eq_tolerates_millisecond_drift() {
        let a = MouthCue::new(ShapeKey::A, 1.0, 2.0);
        let b = MouthCue::new(ShapeKey::A, 1.0005, 2.0);
        let c = MouthCue::new(ShapeKey::A, 1.01, 2.0);
        assert!(a.approx_eq(&b));
        assert!(!a.approx_eq(&c));
    }

    #[test]
    fn display_shows_key_and_interval() {
        let cue = MouthCue::new(ShapeKey::B, 0.5, 1.25);
        assert_eq!(cue.to_string(), "'B' 0.50-1.25");
    }
}
