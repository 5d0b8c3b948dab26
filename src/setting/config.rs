use std::{
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use crate::{capture::dataset::SequencePolicy, error::Error, overlay::FitMode, result::Result};

#[derive(serde::Deserialize, serde::Serialize, Clone, Debug, Default)]
#[serde(default)]
pub struct Config {
    pub camera: CameraConfig,
    pub locator: LocatorConfig,
    pub capture: CaptureConfig,
    pub overlay: OverlayConfig,
    pub model: ModelConfig,
}

#[derive(serde::Deserialize, serde::Serialize, Clone, Debug)]
#[serde(default)]
pub struct CameraConfig {
    pub device: i32,
    pub mirror: bool,
    /// Consecutive failed reads tolerated before the stream is treated as ended.
    pub max_read_retries: u32,
    pub window_title: String,
}

#[derive(serde::Deserialize, serde::Serialize, Clone, Debug)]
#[serde(default)]
pub struct LocatorConfig {
    pub cascade_path: PathBuf,
    pub scale_factor: f64,
    pub min_neighbors: i32,
    pub min_face_size: i32,
}

#[derive(serde::Deserialize, serde::Serialize, Clone, Debug)]
#[serde(default)]
pub struct CaptureConfig {
    pub dataset_dir: PathBuf,
    pub classes: Vec<String>,
    pub target_per_class: u32,
    pub countdown_frames: u32,
    pub inter_capture_delay: u32,
    pub train_ratio: f64,
    pub sequence_policy: SequencePolicy,
}

#[derive(serde::Deserialize, serde::Serialize, Clone, Debug)]
#[serde(default)]
pub struct OverlayConfig {
    pub asset_dir: PathBuf,
    pub margin: u32,
    pub character_interval_secs: u64,
    pub detection_fit: FitMode,
}

#[derive(serde::Deserialize, serde::Serialize, Clone, Debug)]
#[serde(default)]
pub struct ModelConfig {
    pub path: PathBuf,
    pub cuda: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: 0,
            mirror: true,
            max_read_retries: 3,
            window_title: "facemoji".into(),
        }
    }
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            cascade_path: PathBuf::from("haarcascade_frontalface_default.xml"),
            scale_factor: 1.3,
            min_neighbors: 5,
            min_face_size: 30,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            dataset_dir: PathBuf::from("dataset"),
            classes: ["angry", "disgust", "fear", "happy", "sad", "surprise", "neutral"]
                .into_iter()
                .map(String::from)
                .collect(),
            target_per_class: crate::capture::TARGET_PER_CLASS,
            countdown_frames: crate::capture::COUNTDOWN_FRAMES,
            inter_capture_delay: crate::capture::INTER_CAPTURE_DELAY,
            train_ratio: crate::capture::dataset::TRAIN_RATIO,
            sequence_policy: SequencePolicy::default(),
        }
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            asset_dir: PathBuf::from("personajes"),
            margin: 10,
            character_interval_secs: 3,
            detection_fit: FitMode::ExactFit,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("models/expression.onnx"),
            cuda: false,
        }
    }
}

impl Config {
    pub fn get() -> Result<Config> {
        Self::load(Self::get_config_dir()?)
    }

    /// Reads `path`; a missing or unparsable file is replaced by the defaults.
    #[tracing::instrument(name = "Loading configuration", err)]
    pub fn load(path: PathBuf) -> Result<Config> {
        let config_str = match fs::read_to_string(&path) {
            Ok(config) => config,
            Err(err) => {
                if err.kind() == ErrorKind::NotFound {
                    return Self::upsert_new(&path);
                }
                tracing::warn!("could not read {}: {}, using defaults", path.display(), err);
                return Ok(Self::default());
            }
        };

        match config::Config::builder()
            .add_source(config::File::from_str(
                &config_str,
                config::FileFormat::Json,
            ))
            .build()
            .and_then(|cfg| cfg.try_deserialize::<Config>())
        {
            Ok(cfg) => Ok(cfg),
            Err(err) => {
                tracing::warn!("invalid configuration in {}: {}", path.display(), err);
                Self::upsert_new(&path)
            }
        }
    }

    fn get_config_dir() -> Result<PathBuf> {
        Ok(std::env::current_dir()
            .map_err(|_| Error::UnknownError("failed to get current directory".into()))?
            .join("config.json"))
    }

    fn upsert_new(config_dir: &Path) -> Result<Config> {
        let config = Self::default();
        Self::upsert_config_file(config_dir, &config)?;
        Ok(config)
    }

    fn upsert_config_file(config_dir: &Path, config: &Config) -> Result<()> {
        fs::File::create(config_dir)
            .map_err(Error::io_failure(config_dir))?
            .write_all(
                serde_json::to_string_pretty(config)
                    .map_err(Error::as_unknown_error)?
                    .as_bytes(),
            )
            .map_err(Error::io_failure(config_dir))
    }
}
