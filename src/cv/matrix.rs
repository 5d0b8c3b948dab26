use opencv::{core, prelude::*};
use rayon::{
    iter::{IndexedParallelIterator, ParallelIterator},
    slice::{ParallelSlice, ParallelSliceMut},
};

use crate::{image::Frame, Error, Result};

/// OpenCV matrix, BGR for colour images.
#[derive(Debug, Clone)]
pub struct Matrix(pub core::Mat);

impl Matrix {
    fn with_size(width: u32, height: u32, typ: i32) -> Result<Self> {
        Ok(Self(core::Mat::new_rows_cols_with_default(
            height as i32,
            width as i32,
            typ,
            core::Scalar::all(0.),
        )?))
    }

    pub fn from_frame(frame: &Frame) -> Result<Self> {
        let mut mat = Self::with_size(frame.width(), frame.height(), core::CV_8UC3)?;
        mat.data_bytes_mut()?
            .par_chunks_exact_mut(3)
            .zip(frame.as_raw().par_chunks_exact(3))
            // RGB -> BGR
            .for_each(|(dst, src)| {
                dst[0] = src[2];
                dst[1] = src[1];
                dst[2] = src[0];
            });
        Ok(mat)
    }

    pub fn from_gray(gray: &image::GrayImage) -> Result<Self> {
        let mut mat = Self::with_size(gray.width(), gray.height(), core::CV_8UC1)?;
        mat.data_bytes_mut()?.copy_from_slice(gray.as_raw());
        Ok(mat)
    }

    pub fn to_frame(&self) -> Result<Frame> {
        if self.typ() != core::CV_8UC3 || !self.is_continuous() {
            return Err(Error::FrameReadFailure(format!(
                "unsupported frame layout (type {})",
                self.typ()
            )));
        }
        let (w, h) = (self.cols() as u32, self.rows() as u32);
        let pixels = self
            .data_bytes()?
            .par_chunks_exact(3)
            // BGR -> RGB
            .flat_map_iter(|p| [p[2], p[1], p[0]])
            .collect::<Vec<u8>>();
        image::RgbImage::from_raw(w, h, pixels)
            .map(Frame::from)
            .ok_or_else(|| Error::FrameReadFailure("frame buffer size mismatch".into()))
    }
}

impl From<core::Mat> for Matrix {
    fn from(value: core::Mat) -> Self {
        Self(value)
    }
}

impl std::ops::Deref for Matrix {
    type Target = core::Mat;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::ops::DerefMut for Matrix {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}
