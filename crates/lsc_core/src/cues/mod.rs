//! Cue timing and optimization.
//!
//! This module turns the seconds-domain cues reported by the lipsync tool
//! into frame-aligned intervals:
//!
//! - **Timing**: the single seconds<->frames conversion pair
//! - **Frames**: per-cue frame-domain view (floor/ceil frames, blend-in)
//! - **Processor**: the ordered optimization passes
//!
//! # Usage
//!
//! ```
//! use lsc_core::cues::{CueProcessor, FrameConfig, OptimizeParams};
//! use lsc_core::models::{MouthCue, ShapeKey};
//!
//! let cues = vec![MouthCue::new(ShapeKey::A, 0.0, 0.7)];
//! let mut processor = CueProcessor::new(FrameConfig::from_fps(30.0), cues);
//! let stats = processor.optimize(&OptimizeParams::default());
//! println!("{}", stats.summary());
//! ```

mod frames;
mod processor;
mod timing;

pub use frames::CueFrames;
pub use processor::{CueProcessor, OptimizeParams, OptimizeStats, ROUND_DOWN_EPSILON_FRAMES};
pub use timing::FrameConfig;
