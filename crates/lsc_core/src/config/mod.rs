//! Configuration management.
//!
//! This module provides:
//! - TOML-based configuration with logical sections
//! - Atomic file writes (write to temp, then rename)
//! - Section-level updates (only changed section is modified)
//! - Defaults for missing fields on load
//!
//! # Example
//!
//! ```no_run
//! use lsc_core::config::{ConfigManager, ConfigSection};
//!
//! let mut config = ConfigManager::new(".config/lipsync.toml");
//! config.load_or_create().unwrap();
//!
//! println!("Tool: {}", config.settings().rhubarb.executable);
//!
//! config.settings_mut().optimize.blend_in_time = 0.04;
//! config.update_section(ConfigSection::Optimize).unwrap();
//! ```

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    ConfigSection, LoggingSettings, OptimizeSettings, RhubarbSettings, Settings,
};
