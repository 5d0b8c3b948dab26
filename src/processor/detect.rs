use std::time::Instant;

use super::{face_boxes, help_line, Annotation, Flow, FrameProcessor, Key};
use crate::{
    face::{self, Detection},
    image::Frame,
    model::{Classification, ExpressionClassifier},
    overlay::{AssetTable, Composite, OverlayCompositor},
    setting::OverlayConfig,
};

/// Classifies every face and covers it with the matching character.
pub struct DetectProcessor {
    classifier: Option<Box<dyn ExpressionClassifier>>,
    assets: AssetTable,
    compositor: OverlayCompositor,
}

impl DetectProcessor {
    pub fn new(config: &OverlayConfig, classifier: Option<Box<dyn ExpressionClassifier>>) -> Self {
        Self::with_assets(
            classifier,
            AssetTable::load(&config.asset_dir),
            OverlayCompositor::new(config.detection_fit, 0),
        )
    }

    pub fn with_assets(
        classifier: Option<Box<dyn ExpressionClassifier>>,
        assets: AssetTable,
        compositor: OverlayCompositor,
    ) -> Self {
        if classifier.is_none() {
            tracing::warn!("no expression model, faces are located but not classified");
        }
        Self {
            classifier,
            assets,
            compositor,
        }
    }

    fn classify(&self, frame: &Frame, detection: &Detection) -> Option<Classification> {
        let classifier = self.classifier.as_ref()?;
        let face = match face::normalize(frame, &detection.bbox) {
            Ok(face) => face,
            Err(err) => {
                tracing::debug!("skipping detection {:?}: {}", detection.bbox, err);
                return None;
            }
        };
        classifier
            .classify(&face)
            .inspect_err(|err| tracing::warn!("classification failed: {}", err))
            .ok()
    }
}

impl FrameProcessor for DetectProcessor {
    fn help(&self) -> &'static str {
        "'q' quit"
    }

    fn process(&mut self, frame: &mut Frame, detections: &[Detection], _now: Instant) -> Vec<Annotation> {
        let mut annotations: Vec<Annotation> = face_boxes(detections).collect();

        // classify on the untouched frame, earlier overlays must not leak into later crops
        let results: Vec<Option<Classification>> =
            detections.iter().map(|d| self.classify(frame, d)).collect();

        for (detection, result) in detections.iter().zip(results) {
            let origin = (detection.bbox.x, detection.bbox.y - 10);
            let Some(classification) = result else {
                annotations.push(Annotation::text("unavailable", origin));
                continue;
            };
            if let Some(asset) = self.assets.get(classification.expression) {
                if self.compositor.composite(frame, &detection.bbox, asset) == Composite::Skipped {
                    tracing::trace!("character for {:?} does not fit the frame", detection.bbox);
                }
            }
            annotations.push(Annotation::text(
                format!("{} ({:.2})", classification.expression, classification.confidence),
                origin,
            ));
        }
        annotations.push(help_line(frame, self.help()));
        annotations
    }

    fn handle_key(&mut self, key: Key) -> Flow {
        match key {
            Key::Quit => Flow::Quit,
            _ => Flow::Continue,
        }
    }
}
