//! Storage Layer
//!
//! Config file location and the session capture sink.

pub mod session;

use anyhow::Result;
use std::path::PathBuf;

pub use session::{CaptureKind, InMemorySession, SessionCapture, SessionSink};

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("com", "panelscan", "PanelScan")
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    let config_dir = proj_dirs.config_dir().to_path_buf();
    std::fs::create_dir_all(&config_dir)?;

    Ok(config_dir)
}

/// Default path of the engine config file
pub fn default_config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("config.toml"))
}
