use ndarray::{Array2, Array4};

use super::BoundingBox;
use crate::{image::Frame, Error, Result};

/// Side of the square classifier input.
pub const FACE_SIZE: usize = 48;

/// 48 x 48 single channel crop scaled to [0, 1], indexed `[row, col]`.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedFace(Array2<f32>);

impl NormalizedFace {
    pub fn new(data: Array2<f32>) -> Result<Self> {
        if data.dim() != (FACE_SIZE, FACE_SIZE) {
            return Err(Error::as_unknown_error(format!(
                "normalized face must be {}x{}, got {:?}",
                FACE_SIZE,
                FACE_SIZE,
                data.dim()
            )));
        }
        Ok(Self(data))
    }

    /// (batch, height, width, channel) layout expected by the expression model.
    pub fn to_tensor(&self) -> Array4<f32> {
        Array4::from_shape_fn((1, FACE_SIZE, FACE_SIZE, 1), |(_, y, x, _)| self.0[[y, x]])
    }

    pub fn to_gray_image(&self) -> image::GrayImage {
        image::GrayImage::from_fn(FACE_SIZE as u32, FACE_SIZE as u32, |x, y| {
            image::Luma([(self.0[[y as usize, x as usize]] * 255.).round() as u8])
        })
    }
}

impl std::ops::Deref for NormalizedFace {
    type Target = Array2<f32>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Crop `bbox` out of `frame`, resize it to 48 x 48 and scale intensity to [0, 1].
pub fn normalize(frame: &Frame, bbox: &BoundingBox) -> Result<NormalizedFace> {
    let region = bbox
        .clip(frame.width(), frame.height())
        .ok_or(Error::InvalidRegion)?;

    let crop = image::imageops::crop_imm(
        &**frame,
        region.x,
        region.y,
        region.width,
        region.height,
    )
    .to_image();
    let resized = image::imageops::resize(
        &crop,
        FACE_SIZE as u32,
        FACE_SIZE as u32,
        image::imageops::FilterType::Triangle,
    );

    Ok(NormalizedFace(Array2::from_shape_fn(
        (FACE_SIZE, FACE_SIZE),
        |(y, x)| (Frame::luma(resized.get_pixel(x as u32, y as u32)) / 255.).clamp(0., 1.),
    )))
}

#[cfg(test)]
mod test {
    use rand::Rng;

    use super::{normalize, FACE_SIZE};
    use crate::{face::BoundingBox, image::Frame, Error};

    fn noise_frame(w: u32, h: u32) -> Frame {
        let mut rand = rand::thread_rng();
        Frame::from(image::RgbImage::from_fn(w, h, |_, _| {
            image::Rgb([rand.gen(), rand.gen(), rand.gen()])
        }))
    }

    #[test]
    fn boxes_inside_frame_give_fixed_shape_in_unit_range() {
        let mut rand = rand::thread_rng();
        let frame = noise_frame(160, 120);
        for _ in 0..20 {
            let (w, h) = (rand.gen_range(1..=160), rand.gen_range(1..=120));
            let bbox = BoundingBox::new(
                rand.gen_range(0..=160 - w),
                rand.gen_range(0..=120 - h),
                w,
                h,
            );
            let face = normalize(&frame, &bbox).expect("box is inside the frame");
            assert_eq!(face.dim(), (FACE_SIZE, FACE_SIZE));
            assert!(face.iter().all(|v| (0. ..=1.).contains(v)), "{:?}", bbox);
        }
    }

    #[test]
    fn box_outside_frame_is_invalid_region() {
        let frame = noise_frame(64, 64);
        let err = normalize(&frame, &BoundingBox::new(100, 100, 20, 20))
            .expect_err("box is outside the frame");
        assert!(matches!(err, Error::InvalidRegion));
    }

    #[test]
    fn partially_outside_box_uses_visible_part() {
        let frame = Frame::from(image::RgbImage::from_pixel(
            64,
            64,
            image::Rgb([255, 255, 255]),
        ));
        let face = normalize(&frame, &BoundingBox::new(40, 40, 60, 60))
            .expect("box overlaps the frame");
        assert!(face.iter().all(|v| (v - 1.).abs() < 1e-3));
    }

    #[test]
    fn tensor_layout_matches_rows_and_columns() {
        let frame = Frame::from(image::RgbImage::from_fn(48, 48, |x, _| {
            image::Rgb([(x * 5) as u8; 3])
        }));
        let face = normalize(&frame, &BoundingBox::new(0, 0, 48, 48)).expect("full frame");
        let tensor = face.to_tensor();
        assert_eq!(tensor.dim(), (1, 48, 48, 1));
        assert_eq!(tensor[[0, 3, 10, 0]], face[[3, 10]]);
        assert_eq!(face.to_gray_image().get_pixel(10, 3)[0], 50);
    }
}
