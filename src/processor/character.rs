use std::time::{Duration, Instant};

use rand::{rngs::StdRng, seq::SliceRandom, RngCore, SeedableRng};

use super::{face_boxes, help_line, Annotation, Flow, FrameProcessor, Key};
use crate::{
    face::{BoundingBox, Detection},
    image::Frame,
    model::Expression,
    overlay::{AssetTable, Composite, OverlayCompositor},
    setting::OverlayConfig,
};

/// Shows a random character in the top-right corner and swaps it while someone is watching.
pub struct CharacterProcessor {
    assets: AssetTable,
    compositor: OverlayCompositor,
    interval: Duration,
    current: Expression,
    changed_at: Option<Instant>,
    rng: Box<dyn RngCore + Send>,
}

impl CharacterProcessor {
    pub fn new(config: &OverlayConfig) -> Self {
        Self::with_parts(
            AssetTable::load(&config.asset_dir),
            OverlayCompositor::aspect_fit(config.margin),
            Duration::from_secs(config.character_interval_secs),
            StdRng::from_entropy(),
        )
    }

    pub fn with_parts(
        assets: AssetTable,
        compositor: OverlayCompositor,
        interval: Duration,
        rng: impl RngCore + Send + 'static,
    ) -> Self {
        let mut processor = Self {
            assets,
            compositor,
            interval,
            current: Expression::Neutral,
            changed_at: None,
            rng: Box::new(rng),
        };
        processor.pick();
        processor
    }

    pub fn current(&self) -> Expression {
        self.current
    }

    /// When the current character was shown first, `None` until the next frame after a change.
    pub fn changed_at(&self) -> Option<Instant> {
        self.changed_at
    }

    fn pick(&mut self) {
        self.current = Expression::ALL
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(self.current);
        self.changed_at = None;
        tracing::info!("new character: {} ({})", self.current.asset_stem(), self.current);
    }

    /// Top-right third of the frame.
    fn corner(frame: &Frame) -> BoundingBox {
        let (w, h) = (frame.width() as i32, frame.height() as i32);
        BoundingBox::new(w - w / 3, 0, w / 3, h / 3)
    }
}

impl FrameProcessor for CharacterProcessor {
    fn help(&self) -> &'static str {
        "'q' quit, 'c' change character"
    }

    fn process(&mut self, frame: &mut Frame, detections: &[Detection], now: Instant) -> Vec<Annotation> {
        let since = *self.changed_at.get_or_insert(now);
        if !detections.is_empty() && now.duration_since(since) > self.interval {
            self.pick();
            self.changed_at = Some(now);
        }

        let mut annotations: Vec<Annotation> = face_boxes(detections).collect();
        let stem = self.current.asset_stem();
        let corner = Self::corner(frame);
        match self.assets.get(self.current) {
            Some(asset) => {
                if self.compositor.composite(frame, &corner, asset) == Composite::Skipped {
                    tracing::trace!("{} does not fit the corner", stem);
                }
            }
            None => annotations.push(Annotation::text(
                format!("image unavailable: {}", stem),
                (frame.width() as i32 - 350, 50),
            )),
        }
        annotations.push(Annotation::text(format!("Character: {}", stem), (10, 30)));
        annotations.push(Annotation::text(format!("Expression: {}", self.current), (10, 60)));
        annotations.push(help_line(frame, self.help()));
        annotations
    }

    fn handle_key(&mut self, key: Key) -> Flow {
        match key {
            Key::Quit => Flow::Quit,
            Key::C => {
                self.pick();
                Flow::Continue
            }
            Key::N => Flow::Continue,
        }
    }
}
