//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Each section can be updated independently for atomic section-level
//! updates.

use serde::{Deserialize, Serialize};

use crate::cues::OptimizeParams;
use crate::logging::LogLevel;
use crate::rhubarb::Recognizer;

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// External tool configuration.
    #[serde(default)]
    pub rhubarb: RhubarbSettings,

    /// Cue optimization parameters.
    #[serde(default)]
    pub optimize: OptimizeSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Configuration of the lipsync executable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RhubarbSettings {
    /// Path to the lipsync executable.
    #[serde(default)]
    pub executable: String,

    /// Speech recognizer to analyze the audio with.
    #[serde(default)]
    pub recognizer: Recognizer,

    /// Produce the extended mouth shapes (G, H, X) in addition to the six
    /// basic ones.
    #[serde(default = "default_true")]
    pub use_extended_shapes: bool,

    /// Prefix command the tool is launched through (e.g. wine).
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl Default for RhubarbSettings {
    fn default() -> Self {
        Self {
            executable: String::new(),
            recognizer: Recognizer::default(),
            use_extended_shapes: true,
            extra_args: Vec::new(),
        }
    }
}

/// Cue optimization parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizeSettings {
    /// Longest a non-silence cue may stay, in seconds.
    #[serde(default = "default_max_cue_duration")]
    pub max_cue_duration: f64,

    /// Default blend-in assigned to every cue, in seconds.
    #[serde(default = "default_blend_in_time")]
    pub blend_in_time: f64,

    /// Refill trimmed-off spans with inserted silence cues.
    #[serde(default)]
    pub insert_silence: bool,

    /// Slack in seconds when comparing durations against the maximum.
    #[serde(default = "default_trim_tolerance")]
    pub trim_tolerance: f64,
}

fn default_true() -> bool {
    true
}

fn default_max_cue_duration() -> f64 {
    0.2
}

fn default_blend_in_time() -> f64 {
    0.02
}

fn default_trim_tolerance() -> f64 {
    0.001
}

impl Default for OptimizeSettings {
    fn default() -> Self {
        Self {
            max_cue_duration: default_max_cue_duration(),
            blend_in_time: default_blend_in_time(),
            insert_silence: false,
            trim_tolerance: default_trim_tolerance(),
        }
    }
}

impl OptimizeSettings {
    /// View as optimizer parameters.
    pub fn to_params(&self) -> OptimizeParams {
        OptimizeParams {
            max_cue_duration: self.max_cue_duration,
            blend_in_time: self.blend_in_time,
            insert_silence: self.insert_silence,
            trim_tolerance: self.trim_tolerance,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Minimum log level to output.
    #[serde(default)]
    pub level: LogLevel,
}

/// Names of config sections for targeted updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigSection {
    Rhubarb,
    Optimize,
    Logging,
}

impl ConfigSection {
    /// Get the TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Rhubarb => "rhubarb",
            ConfigSection::Optimize => "optimize",
            ConfigSection::Logging => "logging",
        }
    }
}
