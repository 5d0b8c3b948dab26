use opencv::{core, prelude::*, videoio};

pub use cascade::CascadeLocator;
pub use matrix::Matrix;
pub use window::Window;

use crate::{image::Frame, setting::CameraConfig, Error, Result};

pub mod cascade;
pub mod matrix;
pub mod window;

/// Video source, released when dropped.
pub struct Camera(videoio::VideoCapture);

impl Camera {
    #[tracing::instrument(name = "Opening camera", skip_all, fields(device = config.device), err)]
    pub fn open(config: &CameraConfig) -> Result<Self> {
        //https://docs.opencv.org/4.x/d4/d15/group__videoio__flags__base.html
        let cam = videoio::VideoCapture::new(config.device, videoio::CAP_ANY)
            .map_err(|err| Error::DeviceUnavailable(err.to_string()))?;

        if !cam.is_opened()? {
            return Err(Error::DeviceUnavailable(format!(
                "unable to open camera {}",
                config.device
            )));
        }

        Ok(Self(cam))
    }

    pub fn read_frame(&mut self) -> Result<Frame> {
        let mut frame = core::Mat::default();
        let grabbed = self
            .read(&mut frame)
            .map_err(|err| Error::FrameReadFailure(err.to_string()))?;
        if !grabbed || frame.rows() == 0 {
            return Err(Error::FrameReadFailure("camera returned no frame".into()));
        }
        Matrix::from(frame).to_frame()
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        match self.0.release() {
            Ok(()) => log::info!("camera released"),
            Err(err) => log::warn!("failed to release camera: {}", err),
        }
    }
}

impl std::ops::Deref for Camera {
    type Target = videoio::VideoCapture;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::ops::DerefMut for Camera {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}
