//! Frame-domain view over a mouth cue.

use crate::models::MouthCue;

use super::timing::FrameConfig;

/// A cue plus its blend-in time, with frame-domain quantities computed on
/// demand from a [`FrameConfig`]. The cue is the only owned mutable state;
/// everything else is derived, so a pass that moves `start` or `end` never
/// has stale frame numbers to invalidate.
#[derive(Debug, Clone, PartialEq)]
pub struct CueFrames {
    pub cue: MouthCue,
    /// Blend-in duration in seconds. The animated value ramps up over the
    /// interval ending at `cue.start`.
    pub blend_in: f64,
}

impl CueFrames {
    pub fn new(cue: MouthCue) -> Self {
        Self { cue, blend_in: 0.0 }
    }

    /// Exact decimal frame number of the cue start.
    pub fn start_frame_float(&self, cfg: &FrameConfig) -> f64 {
        cfg.time_to_frame(self.cue.start)
    }

    /// Exact decimal frame number of the cue end.
    pub fn end_frame_float(&self, cfg: &FrameConfig) -> f64 {
        cfg.time_to_frame(self.cue.end)
    }

    /// Closest whole frame of the cue start.
    pub fn start_frame(&self, cfg: &FrameConfig) -> i64 {
        cfg.time_to_frame_nearest(self.cue.start)
    }

    /// Closest whole frame of the cue end.
    pub fn end_frame(&self, cfg: &FrameConfig) -> i64 {
        cfg.time_to_frame_nearest(self.cue.end)
    }

    /// Start rounded up to the next whole frame.
    pub fn start_frame_up(&self, cfg: &FrameConfig) -> i64 {
        cfg.time_to_frame_up(self.cue.start)
    }

    /// Start rounded down to the previous whole frame.
    pub fn start_frame_down(&self, cfg: &FrameConfig) -> i64 {
        cfg.time_to_frame_down(self.cue.start)
    }

    /// End rounded up to the next whole frame.
    pub fn end_frame_up(&self, cfg: &FrameConfig) -> i64 {
        cfg.time_to_frame_up(self.cue.end)
    }

    /// End rounded down to the previous whole frame.
    pub fn end_frame_down(&self, cfg: &FrameConfig) -> i64 {
        cfg.time_to_frame_down(self.cue.end)
    }

    /// Whether at least one whole frame falls inside the cue interval.
    ///
    /// A cue shorter than one frame can sit entirely between two frame
    /// boundaries; such a cue would never be sampled and stays invisible
    /// on a frame-quantized timeline.
    pub fn intersects_frame(&self, cfg: &FrameConfig) -> bool {
        self.end_frame_down(cfg) >= self.start_frame_up(cfg)
    }

    /// Cue start shifted left by the blend-in.
    pub fn pre_start(&self) -> f64 {
        self.cue.start - self.blend_in
    }

    /// Cue length in frames.
    pub fn duration_frames(&self, cfg: &FrameConfig) -> f64 {
        self.end_frame_float(cfg) - self.start_frame_float(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ShapeKey;

    fn cue_at(cfg: &FrameConfig, start_frame: f64, duration_frames: f64) -> CueFrames {
        let start = cfg.frame_to_time(start_frame);
        let end = cfg.frame_to_time(start_frame + duration_frames);
        CueFrames::new(MouthCue::new(ShapeKey::A, start, end))
    }

    fn configs() -> Vec<FrameConfig> {
        vec![
            FrameConfig::from_fps(60.0),
            FrameConfig::new(60.0, 1.0, 10.0),
            FrameConfig::new(2997.0, 100.0, -2.0),
            FrameConfig::from_fps(5.0),
        ]
    }

    #[test]
    fn rounding_across_two_frames() {
        for cfg in configs() {
            // Starts slightly before frame 1, ends a bit after frame 2.
            let c = cue_at(&cfg, 0.9, 1.2);

            assert_eq!(c.start_frame(&cfg), 1);
            assert_eq!(c.end_frame(&cfg), 2);
            assert_eq!(c.start_frame_up(&cfg), 1);
            assert_eq!(c.end_frame_up(&cfg), 3);
            assert_eq!(c.end_frame_down(&cfg), 2);
            assert!(c.intersects_frame(&cfg));
        }
    }

    #[test]
    fn rounding_across_one_frame() {
        for cfg in configs() {
            // Starts slightly before frame 1 and ends right after it.
            let c = cue_at(&cfg, 0.9, 0.3);

            assert_eq!(c.start_frame(&cfg), 1);
            assert_eq!(c.end_frame(&cfg), 1);
            assert_eq!(c.start_frame_up(&cfg), 1);
            assert_eq!(c.end_frame_up(&cfg), 2);
            assert_eq!(c.end_frame_down(&cfg), 1);
            assert!(c.intersects_frame(&cfg));
        }
    }

    #[test]
    fn short_cue_between_frames_intersects_nothing() {
        for cfg in configs() {
            // Shorter than one frame and placed in the middle of two.
            let c = cue_at(&cfg, 1.1, 0.5);

            assert_eq!(c.start_frame(&cfg), 1);
            assert_eq!(c.end_frame(&cfg), 2);
            assert_eq!(c.start_frame_up(&cfg), 2);
            assert_eq!(c.end_frame_up(&cfg), 2);
            assert_eq!(c.end_frame_down(&cfg), 1);
            assert!(!c.intersects_frame(&cfg));
        }
    }

    #[test]
    fn pre_start_subtracts_blend_in() {
        let cfg = FrameConfig::from_fps(60.0);
        let mut c = cue_at(&cfg, 2.0, 2.0);
        c.blend_in = 0.02;
        assert!((c.pre_start() - (c.cue.start - 0.02)).abs() < 1e-12);
    }
}
