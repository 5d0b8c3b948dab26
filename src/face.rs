pub use normalize::{normalize, NormalizedFace, FACE_SIZE};

use crate::{image::Frame, Result};

pub mod normalize;

/// Axis-aligned box in frame pixels. Detectors may report boxes that hang off
/// the frame edge, so nothing here is guaranteed to be inside the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// A non-empty rectangle fully inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub confidence: f32,
}

/// Black-box face detector. Order of the returned detections is whatever the
/// detector produces and says nothing about identity across frames.
pub trait FaceLocator {
    fn locate(&mut self, frame: &Frame) -> Result<Vec<Detection>>;
}

impl BoundingBox {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    pub fn bottom(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    /// Intersection with a `frame_w` x `frame_h` frame, `None` when empty.
    pub fn clip(&self, frame_w: u32, frame_h: u32) -> Option<Region> {
        let (x0, y0) = ((self.x as i64).max(0), (self.y as i64).max(0));
        let (x1, y1) = (
            self.right().min(frame_w as i64),
            self.bottom().min(frame_h as i64),
        );
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Region {
            x: x0 as u32,
            y: y0 as u32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        })
    }
}

impl Region {
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && y >= self.y && x < self.x + self.width && y < self.y + self.height
    }
}

impl From<Region> for BoundingBox {
    fn from(value: Region) -> Self {
        Self::new(
            value.x as i32,
            value.y as i32,
            value.width as i32,
            value.height as i32,
        )
    }
}

impl Detection {
    pub fn new(bbox: BoundingBox, confidence: f32) -> Self {
        Self { bbox, confidence }
    }
}
