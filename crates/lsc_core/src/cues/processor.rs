//! Cue optimization passes.
//!
//! Converts the raw cue timing reported by the lipsync tool into
//! frame-aligned intervals ready to be placed on a timeline. The passes
//! are ordered; each one assumes the invariants established by the
//! previous one:
//!
//! 1. Trim over-long cues (a mouth shape held too long reads as stuck).
//! 2. Expand sub-frame cues until they intersect a whole frame.
//! 3. Round cue ends down to a whole frame.
//! 4. Assign blend-in times without starving the previous cue.

use crate::models::{MouthCue, ShapeKey};

use super::frames::CueFrames;
use super::timing::FrameConfig;

/// Skip rounding an end down when it would land within this many frames of
/// the rounded-up start; the cue would collapse to its blend-in with no
/// held frame left. Tunable; the value has no derivation beyond working
/// well at common frame rates.
pub const ROUND_DOWN_EPSILON_FRAMES: f64 = 1e-4;

/// Tolerance when re-checking values a pass has already written, so a
/// second run over optimized cues reports zero modifications.
const REAPPLY_TOLERANCE: f64 = 1e-9;

/// Parameters for [`CueProcessor::optimize`].
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizeParams {
    /// Longest a non-silence cue may stay before its end is clamped, in
    /// seconds.
    pub max_cue_duration: f64,
    /// Default blend-in assigned to every cue, in seconds.
    pub blend_in_time: f64,
    /// Refill the span cut off a long cue with an inserted silence cue so
    /// the timeline keeps its total coverage.
    pub insert_silence: bool,
    /// Slack in seconds when comparing durations against the maximum, so
    /// an already-clamped cue is not clamped again.
    pub trim_tolerance: f64,
}

impl Default for OptimizeParams {
    fn default() -> Self {
        Self {
            max_cue_duration: 0.2,
            blend_in_time: 0.02,
            insert_silence: false,
            trim_tolerance: 0.001,
        }
    }
}

/// Per-pass modification counts for one optimization run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptimizeStats {
    /// Cues whose end was clamped to the maximum duration.
    pub trimmed: usize,
    /// Silence cues inserted to refill trimmed-off spans.
    pub silence_inserted: usize,
    /// Cues expanded until they intersect a whole frame.
    pub expanded: usize,
    /// Cue ends rounded down to a whole frame.
    pub rounded: usize,
    /// Cues whose blend-in changed.
    pub blend_adjusted: usize,
}

impl OptimizeStats {
    /// Total number of modifications across all passes.
    pub fn total(&self) -> usize {
        self.trimmed + self.silence_inserted + self.expanded + self.rounded + self.blend_adjusted
    }

    /// One fragment per pass that changed anything, concatenated.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if self.trimmed > 0 {
            parts.push(format!("ends trimmed: {}", self.trimmed));
        }
        if self.silence_inserted > 0 {
            parts.push(format!("silence refills: {}", self.silence_inserted));
        }
        if self.expanded > 0 {
            parts.push(format!("duration enlarged: {}", self.expanded));
        }
        if self.rounded > 0 {
            parts.push(format!("ends rounded to frame: {}", self.rounded));
        }
        if self.blend_adjusted > 0 {
            parts.push(format!("blend-in times set: {}", self.blend_adjusted));
        }
        if parts.is_empty() {
            "no cues modified".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Holds and processes the detected mouth cues before they are baked.
///
/// All passes mutate `end` and `blend_in` in place through the frame view;
/// only [`CueProcessor::ensure_frame_intersection`] may move a `start`,
/// and only the trim pass (with silence refill enabled) may insert cues.
/// The sequence is never reordered.
#[derive(Debug, Clone)]
pub struct CueProcessor {
    pub frame_cfg: FrameConfig,
    pub cue_frames: Vec<CueFrames>,
}

impl CueProcessor {
    pub fn new(frame_cfg: FrameConfig, cues: Vec<MouthCue>) -> Self {
        Self {
            frame_cfg,
            cue_frames: cues.into_iter().map(CueFrames::new).collect(),
        }
    }

    /// Run all passes in order and collect the per-pass counts.
    pub fn optimize(&mut self, params: &OptimizeParams) -> OptimizeStats {
        let before = self.cue_frames.len();
        let trimmed = self.trim_long_cues(
            params.max_cue_duration,
            params.insert_silence,
            params.trim_tolerance,
        );
        let silence_inserted = self.cue_frames.len() - before;
        let expanded = self.ensure_frame_intersection();
        let rounded = self.round_ends_down();
        let blend_adjusted = self.set_blend_in_times(params.blend_in_time);

        let stats = OptimizeStats {
            trimmed,
            silence_inserted,
            expanded,
            rounded,
            blend_adjusted,
        };
        tracing::debug!("Cue optimization done: {}", stats.summary());
        stats
    }

    /// Clamp cues longer than `max_dur`. Silence cues are exempt; a long
    /// pause looks fine, a long mouth shape looks frozen.
    ///
    /// With `insert_silence` the trimmed-off remainder (when longer than
    /// `tolerance`) is refilled with an inserted `X` cue, preserving the
    /// total covered duration.
    pub fn trim_long_cues(&mut self, max_dur: f64, insert_silence: bool, tolerance: f64) -> usize {
        let mut modified = 0;
        let mut refills: Vec<(usize, CueFrames)> = Vec::new();

        for (i, cf) in self.cue_frames.iter_mut().enumerate() {
            if cf.cue.key.is_silence() {
                continue;
            }
            if cf.cue.duration() <= max_dur + tolerance {
                continue;
            }
            let old_end = cf.cue.end;
            cf.cue.end = cf.cue.start + max_dur;
            modified += 1;
            if insert_silence && old_end - cf.cue.end > tolerance {
                let filler = MouthCue::new(ShapeKey::X, cf.cue.end, old_end);
                refills.push((i + 1, CueFrames::new(filler)));
            }
        }

        // Insert back-to-front so recorded indices stay valid.
        for (index, filler) in refills.into_iter().rev() {
            self.cue_frames.insert(index, filler);
        }

        if modified > 0 {
            tracing::info!("Trimmed {} cues that were too long", modified);
        }
        modified
    }

    /// Expand cues that do not intersect any whole frame.
    ///
    /// Such a cue sits entirely between two frame boundaries; move the end
    /// that is closer to a boundary onto it, so every cue renders on at
    /// least one frame.
    pub fn ensure_frame_intersection(&mut self) -> usize {
        let cfg = self.frame_cfg;
        let mut modified = 0;

        for cf in &mut self.cue_frames {
            if cf.intersects_frame(&cfg) {
                continue;
            }
            let d_start = cf.start_frame_float(&cfg) - cf.start_frame_down(&cfg) as f64;
            let d_end = cf.end_frame_up(&cfg) as f64 - cf.end_frame_float(&cfg);
            debug_assert!(d_start > 0.0 && d_end > 0.0);
            if d_start < d_end {
                cf.cue.start = cfg.frame_to_time(cf.start_frame_down(&cfg) as f64);
            } else {
                cf.cue.end = cfg.frame_to_time(cf.end_frame_up(&cfg) as f64);
            }
            modified += 1;
        }

        if modified > 0 {
            tracing::info!(
                "Prolonged {} cues that were too short to be visible",
                modified
            );
        }
        modified
    }

    /// Round cue ends down to the whole frame at or before them.
    ///
    /// Skips a cue when the rounded end would coincide with the rounded-up
    /// start (within [`ROUND_DOWN_EPSILON_FRAMES`]); rounding it would
    /// leave no held frame before the blend-out.
    pub fn round_ends_down(&mut self) -> usize {
        let cfg = self.frame_cfg;
        let mut modified = 0;
        let mut skipped = 0;

        for cf in &mut self.cue_frames {
            if !cf.intersects_frame(&cfg) {
                // Shouldn't happen after ensure_frame_intersection.
                skipped += 1;
                continue;
            }
            let new_end_frame = cf.end_frame_down(&cfg) as f64;
            if (cf.start_frame_up(&cfg) as f64 - new_end_frame).abs() < ROUND_DOWN_EPSILON_FRAMES {
                // Still a short cue that happens to cross a frame; leave it.
                skipped += 1;
                continue;
            }
            if (cf.end_frame_float(&cfg) - new_end_frame).abs() < REAPPLY_TOLERANCE {
                continue; // Already on a frame boundary.
            }
            cf.cue.end = cfg.frame_to_time(new_end_frame);
            modified += 1;
        }

        if modified > 0 {
            tracing::info!(
                "Rounded {} cue ends down to a whole frame, skipped {} short cues",
                modified,
                skipped
            );
        }
        modified
    }

    /// Assign each cue its blend-in, in timeline order.
    ///
    /// When a cue's start minus the blend-in would reach back before the
    /// previous cue's first intersected frame, the blend-in is shrunk just
    /// enough that the previous cue stays fully visible on that frame. The
    /// first cue always receives the full default.
    pub fn set_blend_in_times(&mut self, blend_in_time: f64) -> usize {
        let cfg = self.frame_cfg;
        let mut modified = 0;
        let mut last_start_frame_time: Option<f64> = None;

        for cf in &mut self.cue_frames {
            let mut blend_in = blend_in_time;
            if let Some(last) = last_start_frame_time {
                let d = (cf.cue.start - blend_in_time) - last;
                if d < 0.0 {
                    debug_assert!(
                        blend_in_time + d >= -REAPPLY_TOLERANCE,
                        "cue {} overlaps the previous cue's start",
                        cf.cue
                    );
                    blend_in = (blend_in_time + d).max(0.0);
                }
            }
            if (blend_in - cf.blend_in).abs() > REAPPLY_TOLERANCE {
                modified += 1;
            }
            cf.blend_in = blend_in;
            last_start_frame_time = Some(cfg.frame_to_time(cf.start_frame_up(&cfg) as f64));
        }

        if modified > 0 {
            tracing::info!("Adjusted blend-in on {} cues", modified);
        }
        modified
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cue_at(cfg: &FrameConfig, start_frame: f64, duration_frames: f64, key: ShapeKey) -> MouthCue {
        let start = cfg.frame_to_time(start_frame);
        let end = cfg.frame_to_time(start_frame + duration_frames);
        MouthCue::new(key, start, end)
    }

    /// Build a processor with back-to-back cues at the given frame marks.
    fn processor_at(cfg: FrameConfig, frames: &[f64]) -> CueProcessor {
        let cues = frames
            .windows(2)
            .map(|w| cue_at(&cfg, w[0], w[1] - w[0], ShapeKey::A))
            .collect();
        CueProcessor::new(cfg, cues)
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
    fn trim_clamps_only_long_cues() {
        for cfg in configs() {
            let mut cp = processor_at(cfg, &[2.0, 7.0, 8.0]);
            let max_dur = cfg.frame_to_time(2.0 + cfg.offset);

            assert!((cp.cue_frames[0].duration_frames(&cfg) - 5.0).abs() < 1e-6);
            let modified = cp.trim_long_cues(max_dur, false, 0.001);

            assert_eq!(modified, 1);
            assert!((cp.cue_frames[0].cue.duration() - max_dur).abs() < 1e-9);
            assert!((cp.cue_frames[1].duration_frames(&cfg) - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn trim_leaves_silence_cues_alone() {
        let cfg = FrameConfig::from_fps(60.0);
        let cues = vec![cue_at(&cfg, 0.0, 120.0, ShapeKey::X)];
        let mut cp = CueProcessor::new(cfg, cues);

        assert_eq!(cp.trim_long_cues(0.2, false, 0.001), 0);
        assert!((cp.cue_frames[0].duration_frames(&cfg) - 120.0).abs() < 1e-6);
    }

    #[test]
    fn trim_refills_cut_spans_with_silence() {
        for cfg in configs() {
            let mut cp = processor_at(cfg, &[2.0, 7.0, 8.0, 18.0]);
            let max_dur = cfg.frame_to_time(2.0 + cfg.offset);

            let modified = cp.trim_long_cues(max_dur, true, 0.01);

            assert_eq!(modified, 2);
            assert_eq!(cp.cue_frames.len(), 5);

            // First long cue: clamped, refilled with silence up to the
            // original end.
            assert!(!cp.cue_frames[0].cue.key.is_silence());
            assert!((cp.cue_frames[0].cue.duration() - max_dur).abs() < 1e-9);
            assert!(cp.cue_frames[1].cue.key.is_silence());
            let total =
                cp.cue_frames[0].duration_frames(&cfg) + cp.cue_frames[1].duration_frames(&cfg);
            assert!((total - 5.0).abs() < 1e-6);

            // Short middle cue untouched.
            assert!((cp.cue_frames[2].duration_frames(&cfg) - 1.0).abs() < 1e-6);

            // Second long cue, same treatment.
            assert!(!cp.cue_frames[3].cue.key.is_silence());
            assert!((cp.cue_frames[3].cue.duration() - max_dur).abs() < 1e-9);
            assert!(cp.cue_frames[4].cue.key.is_silence());
        }
    }

    #[test]
    fn expand_moves_the_closer_end_onto_a_frame() {
        for cfg in configs() {
            // First cue sits between frames 1 and 2, second crosses frame 2.
            let mut cp = processor_at(cfg, &[1.1, 1.3, 2.3]);

            assert!((cp.cue_frames[0].duration_frames(&cfg) - 0.2).abs() < 1e-6);
            let modified = cp.ensure_frame_intersection();

            // Expanded left: 1.1 is closer to 1 than 1.3 is to 2.
            assert_eq!(modified, 1);
            assert!((cp.cue_frames[0].start_frame_float(&cfg) - 1.0).abs() < 1e-6);
            assert!((cp.cue_frames[0].end_frame_float(&cfg) - 1.3).abs() < 1e-6);
            assert!((cp.cue_frames[1].duration_frames(&cfg) - 1.0).abs() < 1e-6);
            assert!(cp.cue_frames[0].intersects_frame(&cfg));
            assert!(cp.cue_frames[1].intersects_frame(&cfg));
        }
    }

    #[test]
    fn expand_guarantees_intersection_for_all() {
        let cfg = FrameConfig::new(2997.0, 100.0, 0.0);
        let cues = vec![
            cue_at(&cfg, 0.2, 0.3, ShapeKey::A),
            cue_at(&cfg, 1.6, 0.2, ShapeKey::B),
            cue_at(&cfg, 3.4, 0.4, ShapeKey::C),
        ];
        let mut cp = CueProcessor::new(cfg, cues);
        cp.ensure_frame_intersection();
        for cf in &cp.cue_frames {
            assert!(cf.intersects_frame(&cfg), "cue {} misses all frames", cf.cue);
        }
    }

    #[test]
    fn round_ends_skips_degenerate_and_shrinks_the_rest() {
        for cfg in configs() {
            let mut cp = processor_at(cfg, &[1.0, 1.9, 2.3, 4.3]);
            let ends_before: Vec<f64> = cp.cue_frames.iter().map(|c| c.cue.end).collect();

            cp.round_ends_down();

            // First cue crosses frame 1 but rounding would collapse it.
            assert!((cp.cue_frames[0].duration_frames(&cfg) - 0.9).abs() < 1e-6);
            // Second cue crosses frame 2; rounding would collapse it too.
            assert!((cp.cue_frames[1].end_frame_float(&cfg) - 2.3).abs() < 1e-6);
            // Third cue has room; end shrinks from 4.3 to 4.
            assert!((cp.cue_frames[2].end_frame_float(&cfg) - 4.0).abs() < 1e-6);

            // Rounding only ever shrinks.
            for (cf, before) in cp.cue_frames.iter().zip(ends_before) {
                assert!(cf.cue.end <= before + 1e-9);
            }
        }
    }

    #[test]
    fn blend_in_shrinks_to_protect_previous_cue() {
        for cfg in configs() {
            // First cue crosses frame 1 and ends right after it, so the
            // second cue's blend-in would reach back over that frame.
            let mut cp = processor_at(cfg, &[0.5, 1.1, 4.0]);
            let blend = 0.02;

            let modified = cp.set_blend_in_times(blend);

            assert_eq!(modified, 2);
            assert!((cp.cue_frames[0].blend_in - blend).abs() < 1e-9);
            let first_frame_time = cfg.frame_to_time(1.0);
            assert!((cp.cue_frames[1].pre_start() - first_frame_time).abs() < 1e-6);
        }
    }

    #[test]
    fn blend_in_keeps_full_default_when_there_is_room() {
        let cfg = FrameConfig::from_fps(60.0);
        let mut cp = processor_at(cfg, &[0.0, 30.0, 60.0]);

        cp.set_blend_in_times(0.02);

        for cf in &cp.cue_frames {
            assert!((cf.blend_in - 0.02).abs() < 1e-9);
        }
    }

    #[test]
    fn optimize_runs_passes_in_order_and_reports() {
        let cfg = FrameConfig::from_fps(60.0);
        let cues = vec![
            cue_at(&cfg, 0.0, 30.0, ShapeKey::A),
            cue_at(&cfg, 30.1, 0.5, ShapeKey::B),
            cue_at(&cfg, 31.0, 3.4, ShapeKey::C),
        ];
        let mut cp = CueProcessor::new(cfg, cues);

        let stats = cp.optimize(&OptimizeParams::default());

        assert!(stats.trimmed >= 1);
        assert!(stats.expanded >= 1);
        assert!(stats.blend_adjusted >= 1);
        let summary = stats.summary();
        assert!(summary.contains("ends trimmed"));
        assert!(summary.contains("blend-in"));

        // No cue's blend-in reaches back over the previous cue's first
        // intersected frame.
        for pair in cp.cue_frames.windows(2) {
            let previous_first_frame = cfg.frame_to_time(pair[0].start_frame_up(&cfg) as f64);
            assert!(pair[1].pre_start() >= previous_first_frame - 1e-9);
        }
    }

    #[test]
    fn optimize_twice_changes_nothing_the_second_time() {
        for cfg in configs() {
            let cues = vec![
                cue_at(&cfg, 0.0, 30.0, ShapeKey::A),
                cue_at(&cfg, 30.1, 0.5, ShapeKey::B),
                cue_at(&cfg, 31.0, 3.4, ShapeKey::C),
                cue_at(&cfg, 34.4, 0.3, ShapeKey::D),
                cue_at(&cfg, 35.0, 25.0, ShapeKey::X),
            ];
            let mut cp = CueProcessor::new(cfg, cues);
            let params = OptimizeParams {
                insert_silence: true,
                ..OptimizeParams::default()
            };

            let first = cp.optimize(&params);
            assert!(first.total() > 0);

            let second = cp.optimize(&params);
            assert_eq!(second, OptimizeStats::default(), "second run modified cues");
            assert_eq!(second.summary(), "no cues modified");
        }
    }

    #[test]
    fn optimize_respects_duration_bound() {
        let cfg = FrameConfig::from_fps(30.0);
        let cues = vec![
            cue_at(&cfg, 0.0, 60.0, ShapeKey::A),
            cue_at(&cfg, 60.0, 90.0, ShapeKey::X),
            cue_at(&cfg, 150.0, 45.0, ShapeKey::E),
        ];
        let mut cp = CueProcessor::new(cfg, cues);
        let params = OptimizeParams::default();

        cp.optimize(&params);

        for cf in &cp.cue_frames {
            if cf.cue.key.is_silence() {
                continue;
            }
            assert!(cf.cue.duration() <= params.max_cue_duration + params.trim_tolerance + 1e-9);
        }
    }
}
