pub use self::config::{
    CameraConfig, CaptureConfig, Config, LocatorConfig, ModelConfig, OverlayConfig,
};

use crate::result::Result;

pub mod config;

/// Which frame processor drives the session.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Record labeled face crops into the dataset.
    Capture,
    /// Classify expressions and cover faces with the matching character.
    Detect,
    /// Show a random character in the corner, rotating while a face is visible.
    Characters,
}

#[derive(Default, Debug)]
pub struct Setting {
    pub config: Config,
}

impl Setting {
    pub fn get() -> Result<Self> {
        Ok(Self {
            config: Config::get()?,
        })
    }

    pub fn from_path(path: std::path::PathBuf) -> Result<Self> {
        Ok(Self {
            config: Config::load(path)?,
        })
    }
}
