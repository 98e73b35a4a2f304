//! Frame/time conversion.
//!
//! Pure conversions between seconds and frame numbers. The effective frame
//! rate is `fps / fps_base` (29.97 fps is expressed as 2997/100) and
//! `offset` shifts which time maps to frame 0. Every optimization pass
//! relies on these two conversions agreeing bit-for-bit, so the formula
//! lives here and nowhere else.

/// Scale used to round decimal frame numbers to 7 decimal places.
///
/// A time that is mathematically on a frame boundary can land a few ulps
/// off after a frame->time->frame round trip; rounding snaps it back so
/// floor/ceil stay consistent across repeated conversions.
const FRAME_ROUND_SCALE: f64 = 1e7;

/// Maps cue times to frame numbers of the target timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameConfig {
    /// Frame rate numerator, frames per `fps_base` seconds.
    pub fps: f64,
    /// Frame rate divisor; the effective rate is `fps / fps_base`.
    pub fps_base: f64,
    /// Frame number the timeline starts at, in frames (may be fractional).
    pub offset: f64,
}

impl FrameConfig {
    /// Create a config. Panics on a non-positive rate; that is a caller
    /// bug, not a runtime condition.
    pub fn new(fps: f64, fps_base: f64, offset: f64) -> Self {
        assert!(
            fps > 0.0 && fps_base > 0.0,
            "invalid frame rate {fps}/{fps_base}"
        );
        Self {
            fps,
            fps_base,
            offset,
        }
    }

    /// Whole-number rate with no offset.
    pub fn from_fps(fps: f64) -> Self {
        Self::new(fps, 1.0, 0.0)
    }

    /// Effective frame rate in frames per second.
    pub fn effective_fps(&self) -> f64 {
        self.fps / self.fps_base
    }

    /// Exact decimal frame number at the given time, rounded to 7 decimals
    /// for frame<=>time round-trip stability.
    pub fn time_to_frame(&self, time: f64) -> f64 {
        let frame = time * self.fps / self.fps_base + self.offset;
        (frame * FRAME_ROUND_SCALE).round() / FRAME_ROUND_SCALE
    }

    /// Start time of the given (possibly fractional) frame number.
    pub fn frame_to_time(&self, frame: f64) -> f64 {
        (frame - self.offset) * self.fps_base / self.fps
    }

    /// Closest whole frame number.
    pub fn time_to_frame_nearest(&self, time: f64) -> i64 {
        self.time_to_frame(time).round() as i64
    }

    /// Whole frame at or after the given time.
    pub fn time_to_frame_up(&self, time: f64) -> i64 {
        self.time_to_frame(time).ceil() as i64
    }

    /// Whole frame at or before the given time.
    pub fn time_to_frame_down(&self, time: f64) -> i64 {
        self.time_to_frame(time).floor() as i64
    }
}
