#[cfg(feature = "onnx")]
pub use expression_model::ExpressionModel;

use crate::{face::NormalizedFace, setting::ModelConfig, Error, Result};

#[cfg(feature = "onnx")]
mod expression_model;

/// Output order of the expression model (alphabetical, as the training folders sort).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Expression {
    Angry,
    Disgust,
    Fear,
    Happy,
    Neutral,
    Sad,
    Surprise,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub expression: Expression,
    pub confidence: f32,
}

/// Black-box expression model fed with a single normalized face.
pub trait ExpressionClassifier {
    fn classify(&self, face: &NormalizedFace) -> Result<Classification>;
}

impl Expression {
    pub const COUNT: usize = 7;
    pub const ALL: [Expression; Self::COUNT] = [
        Expression::Angry,
        Expression::Disgust,
        Expression::Fear,
        Expression::Happy,
        Expression::Neutral,
        Expression::Sad,
        Expression::Surprise,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn label(self) -> &'static str {
        match self {
            Expression::Angry => "angry",
            Expression::Disgust => "disgust",
            Expression::Fear => "fear",
            Expression::Happy => "happy",
            Expression::Neutral => "neutral",
            Expression::Sad => "sad",
            Expression::Surprise => "surprise",
        }
    }

    /// File stem of the character image under the asset directory.
    pub fn asset_stem(self) -> &'static str {
        match self {
            Expression::Angry => "cara-enojo-96",
            Expression::Disgust => "cara-disgusto-96",
            Expression::Fear => "cara-miedo-96",
            Expression::Happy => "cara-feliz-96",
            Expression::Neutral => "cara-neutral-96",
            Expression::Sad => "cara-triste-96",
            Expression::Surprise => "cara-asombro-96",
        }
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl Classification {
    /// Arg max over a probability vector in [`Expression::ALL`] order.
    pub fn from_probabilities(probabilities: &[f32]) -> Result<Self> {
        if probabilities.len() != Expression::COUNT {
            return Err(Error::InvalidModelOutput(format!(
                "expected {} probabilities, got {}",
                Expression::COUNT,
                probabilities.len()
            )));
        }
        let (index, confidence) = probabilities
            .iter()
            .copied()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |best, (idx, p)| {
                if p > best.1 {
                    (idx, p)
                } else {
                    best
                }
            });
        let expression = Expression::from_index(index)
            .ok_or_else(|| Error::InvalidModelOutput("probabilities are all NaN".into()))?;
        Ok(Self {
            expression,
            confidence,
        })
    }
}

/// Loads the expression model, or `None` when it is unavailable. Detection keeps running without it.
pub fn load_classifier(config: &ModelConfig) -> Option<Box<dyn ExpressionClassifier>> {
    match try_load_classifier(config) {
        Ok(model) => Some(model),
        Err(err) => {
            tracing::warn!("classification disabled: {}", err);
            None
        }
    }
}

#[cfg(feature = "onnx")]
fn try_load_classifier(config: &ModelConfig) -> Result<Box<dyn ExpressionClassifier>> {
    register_ort(config)?;
    Ok(Box::new(ExpressionModel::new(config.path.clone())?))
}

#[cfg(not(feature = "onnx"))]
fn try_load_classifier(config: &ModelConfig) -> Result<Box<dyn ExpressionClassifier>> {
    Err(Error::ModelUnavailable(format!(
        "built without the onnx feature, ignoring {}",
        config.path.display()
    )))
}

#[cfg(feature = "onnx")]
#[tracing::instrument(err)]
pub fn register_ort(config: &ModelConfig) -> Result<()> {
    let onnx_env = ort::init().with_name("facemoji_expression");

    let onnx_env = match config.cuda {
        true => onnx_env.with_execution_providers([ort::CUDAExecutionProvider::default().build()]),
        false => onnx_env,
    };

    onnx_env.commit().map_err(Error::ModelError)?;
    Ok(())
}

#[cfg(feature = "onnx")]
fn start_session_from_file(onnx_path: &std::path::Path) -> Result<ort::Session> {
    ort::Session::builder()
        .map_err(Error::ModelError)?
        .with_intra_threads(4)
        .map_err(Error::ModelError)?
        .commit_from_file(onnx_path)
        .map_err(Error::ModelError)
}
