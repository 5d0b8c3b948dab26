use std::{error::Error as StdError, path::PathBuf};

#[derive(Debug)]
pub enum Error {
    /// Video source could not be opened. The only fatal condition.
    DeviceUnavailable(String),
    FrameReadFailure(String),
    /// Bounding box has no area left after clipping to the frame.
    InvalidRegion,
    IOFailure(PathBuf, std::io::Error),
    /// No sequence index left for the class without overwriting a sample.
    SequenceExhausted(String),
    ModelUnavailable(String),
    #[cfg(feature = "camera")]
    OpenCVError(opencv::Error),
    ImageError(image::ImageError),
    ConfigError(config::ConfigError),
    #[cfg(feature = "onnx")]
    ModelError(ort::Error),
    InvalidModelOutput(String),
    UnknownError(Box<dyn StdError + Send + Sync>),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::DeviceUnavailable(msg) => write!(f, "video device unavailable: {}", msg),
            Error::FrameReadFailure(msg) => write!(f, "failed to read frame: {}", msg),
            Error::InvalidRegion => write!(f, "region has zero area after clipping"),
            Error::IOFailure(path, err) => write!(f, "io error on {}: {}", path.display(), err),
            Error::SequenceExhausted(class) => {
                write!(f, "no free sample index left for {}", class)
            }
            Error::ModelUnavailable(msg) => write!(f, "expression model unavailable: {}", msg),
            #[cfg(feature = "camera")]
            Error::OpenCVError(err) => write!(f, "opencv error: {}", err),
            Error::ImageError(err) => write!(f, "image error: {}", err),
            Error::ConfigError(err) => write!(f, "configuration error: {}", err),
            #[cfg(feature = "onnx")]
            Error::ModelError(err) => write!(f, "model error: {}", err),
            Error::InvalidModelOutput(msg) => write!(f, "invalid model output: {}", msg),
            Error::UnknownError(err) => write!(f, "unknown error: {}", err),
        }
    }
}

impl StdError for Error {}

impl Error {
    pub fn as_unknown_error<E>(err: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        Self::UnknownError(err.into())
    }

    pub fn io_failure(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |err| Self::IOFailure(path, err)
    }

    /// Everything except a missing device can be recovered from inside the frame loop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::DeviceUnavailable(_))
    }
}

#[cfg(feature = "camera")]
impl From<opencv::Error> for Error {
    fn from(value: opencv::Error) -> Self {
        Self::OpenCVError(value)
    }
}

impl From<image::ImageError> for Error {
    fn from(value: image::ImageError) -> Self {
        Self::ImageError(value)
    }
}

impl From<config::ConfigError> for Error {
    fn from(value: config::ConfigError) -> Self {
        Self::ConfigError(value)
    }
}

#[cfg(feature = "onnx")]
impl From<ort::Error> for Error {
    fn from(value: ort::Error) -> Self {
        Self::ModelError(value)
    }
}
