use opencv::{core, highgui, imgproc};

use super::Matrix;
use crate::{
    image::Frame,
    processor::{Annotation, Key},
    Result,
};

/// Preview window, destroyed when dropped.
pub struct Window {
    title: String,
}

impl Window {
    pub fn open(title: &str) -> Result<Self> {
        highgui::named_window(title, highgui::WINDOW_AUTOSIZE)?;
        Ok(Self {
            title: title.to_string(),
        })
    }

    pub fn show(&self, frame: &Frame, annotations: &[Annotation]) -> Result<()> {
        let mut mat = Matrix::from_frame(frame)?;
        for annotation in annotations {
            draw(&mut mat, annotation)?;
        }
        highgui::imshow(&self.title, &*mat)?;
        Ok(())
    }

    /// Non-blocking, waits at most one millisecond.
    pub fn poll_key(&self) -> Result<Option<Key>> {
        Ok(Key::from_code(highgui::wait_key(1)?))
    }
}

fn bgr(color: [u8; 3]) -> core::Scalar {
    core::Scalar::new(color[2] as f64, color[1] as f64, color[0] as f64, 0.)
}

fn draw(mat: &mut Matrix, annotation: &Annotation) -> Result<()> {
    match annotation {
        Annotation::Rect { bbox, color } => imgproc::rectangle(
            &mut mat.0,
            core::Rect::new(bbox.x, bbox.y, bbox.width, bbox.height),
            bgr(*color),
            2,
            imgproc::LINE_8,
            0,
        )?,
        Annotation::Text {
            text,
            origin,
            scale,
            color,
        } => imgproc::put_text(
            &mut mat.0,
            text,
            core::Point::new(origin.0, origin.1),
            imgproc::FONT_HERSHEY_SIMPLEX,
            *scale,
            bgr(*color),
            if *scale < 0.6 { 1 } else { 2 },
            imgproc::LINE_8,
            false,
        )?,
    }
    Ok(())
}

impl Drop for Window {
    fn drop(&mut self) {
        if let Err(err) = highgui::destroy_window(&self.title) {
            log::warn!("failed to close window {}: {}", self.title, err);
        }
    }
}
