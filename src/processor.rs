use std::time::Instant;

pub use capture::CaptureProcessor;
pub use character::CharacterProcessor;
pub use detect::DetectProcessor;

use crate::{
    face::{BoundingBox, Detection},
    image::Frame,
    model::ExpressionClassifier,
    setting::{Config, Mode},
    Result,
};

mod capture;
mod character;
mod detect;

pub const GREEN: [u8; 3] = [0, 255, 0];
pub const RED: [u8; 3] = [255, 0, 0];
pub const WHITE: [u8; 3] = [255, 255, 255];

/// Something to draw over the frame after processing. Colors are RGB.
#[derive(Debug, Clone, PartialEq)]
pub enum Annotation {
    Rect {
        bbox: BoundingBox,
        color: [u8; 3],
    },
    Text {
        text: String,
        origin: (i32, i32),
        scale: f64,
        color: [u8; 3],
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Quit,
    C,
    N,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// One mode of the frame loop. Gets every frame and every key press.
pub trait FrameProcessor {
    /// Usage line logged at startup and drawn at the bottom of the window.
    fn help(&self) -> &'static str;

    /// `frame` holds the mirrored camera image; annotations are drawn on top afterwards.
    fn process(&mut self, frame: &mut Frame, detections: &[Detection], now: Instant) -> Vec<Annotation>;

    fn handle_key(&mut self, key: Key) -> Flow;
}

impl Annotation {
    pub fn rect(bbox: BoundingBox) -> Self {
        Self::Rect { bbox, color: GREEN }
    }

    pub fn text(text: impl Into<String>, origin: (i32, i32)) -> Self {
        Self::Text {
            text: text.into(),
            origin,
            scale: 0.7,
            color: RED,
        }
    }

    pub fn with_scale(mut self, new_scale: f64) -> Self {
        if let Self::Text { scale, .. } = &mut self {
            *scale = new_scale;
        }
        self
    }

    pub fn with_color(mut self, new_color: [u8; 3]) -> Self {
        match &mut self {
            Self::Rect { color, .. } | Self::Text { color, .. } => *color = new_color,
        }
        self
    }
}

impl Key {
    /// Maps the low byte of a polled key code.
    pub fn from_code(code: i32) -> Option<Self> {
        match (code & 0xFF) as u8 {
            b'q' => Some(Key::Quit),
            b'c' => Some(Key::C),
            b'n' => Some(Key::N),
            _ => None,
        }
    }
}

/// Builds the processor for `mode`. `classifier` is only used by detection.
pub fn for_mode(
    mode: Mode,
    config: &Config,
    classifier: Option<Box<dyn ExpressionClassifier>>,
) -> Result<Box<dyn FrameProcessor>> {
    Ok(match mode {
        Mode::Capture => Box::new(CaptureProcessor::new(&config.capture)?),
        Mode::Detect => Box::new(DetectProcessor::new(&config.overlay, classifier)),
        Mode::Characters => Box::new(CharacterProcessor::new(&config.overlay)),
    })
}

/// Rectangles around every detected face.
fn face_boxes(detections: &[Detection]) -> impl Iterator<Item = Annotation> + '_ {
    detections.iter().map(|d| Annotation::rect(d.bbox))
}

fn help_line(frame: &Frame, help: &str) -> Annotation {
    Annotation::text(help, (10, frame.height() as i32 - 20))
        .with_scale(0.5)
        .with_color(WHITE)
}
