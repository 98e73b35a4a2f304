//! LSC Core - backend logic for Lip Sync Capture.
//!
//! This crate drives the Rhubarb Lip Sync executable and turns its raw
//! mouth cues into frame-aligned, blend-ready animation timing. It has no
//! UI dependencies; a front-end owns the tick loop, polls the driver once
//! per tick, and bakes the optimized cues onto its own timeline.

pub mod config;
pub mod cues;
pub mod logging;
pub mod models;
pub mod rhubarb;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_returns_value() {
        assert!(!version().is_empty());
    }
}
