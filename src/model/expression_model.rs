use std::path::PathBuf;

use super::{Classification, ExpressionClassifier};
use crate::{face::NormalizedFace, Error, Result};

// input (1, 48, 48, 1) | output (1, 7) softmax
pub struct ExpressionModel(ort::Session);

impl ExpressionModel {
    #[tracing::instrument(name = "Initialize expression model", err)]
    pub fn new(onnx_path: PathBuf) -> Result<Self> {
        if !onnx_path.exists() {
            return Err(Error::ModelUnavailable(format!(
                "{} not found",
                onnx_path.display()
            )));
        }
        Ok(Self(super::start_session_from_file(&onnx_path)?))
    }
}

impl ExpressionClassifier for ExpressionModel {
    fn classify(&self, face: &NormalizedFace) -> Result<Classification> {
        let outputs = self
            .0
            .run(ort::inputs![face.to_tensor()].map_err(Error::ModelError)?)
            .map_err(Error::ModelError)?;

        let probabilities = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(Error::ModelError)?
            .iter()
            .copied()
            .collect::<Vec<f32>>();

        Classification::from_probabilities(&probabilities)
    }
}
