use opencv::{core, objdetect, prelude::*};

use super::Matrix;
use crate::{
    face::{BoundingBox, Detection, FaceLocator},
    image::Frame,
    setting::LocatorConfig,
    Error, Result,
};

/// Haar cascade frontal face detector.
pub struct CascadeLocator {
    classifier: objdetect::CascadeClassifier,
    scale_factor: f64,
    min_neighbors: i32,
    min_size: core::Size,
}

impl CascadeLocator {
    #[tracing::instrument(name = "Loading face cascade", skip_all, err)]
    pub fn new(config: &LocatorConfig) -> Result<Self> {
        let path = config.cascade_path.to_string_lossy();
        let classifier = objdetect::CascadeClassifier::new(&path)?;
        if classifier.empty()? {
            return Err(Error::ModelUnavailable(format!(
                "face cascade {} could not be loaded",
                path
            )));
        }
        Ok(Self {
            classifier,
            scale_factor: config.scale_factor,
            min_neighbors: config.min_neighbors,
            min_size: core::Size::new(config.min_face_size, config.min_face_size),
        })
    }
}

impl FaceLocator for CascadeLocator {
    fn locate(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let gray = Matrix::from_gray(&frame.to_gray())?;
        let mut faces = core::Vector::<core::Rect>::new();
        self.classifier.detect_multi_scale(
            &*gray,
            &mut faces,
            self.scale_factor,
            self.min_neighbors,
            0,
            self.min_size,
            core::Size::default(),
        )?;
        // cascades report no score
        Ok(faces
            .iter()
            .map(|r| Detection::new(BoundingBox::new(r.x, r.y, r.width, r.height), 1.))
            .collect())
    }
}
