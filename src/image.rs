// RgbImage = ImageBuffer<Rgb<u8>, Vec<u8>>
#[derive(Debug, Clone, PartialEq)]
pub struct Frame(image::RgbImage);

impl Default for Frame {
    fn default() -> Self {
        Self(image::RgbImage::new(0, 0))
    }
}

impl Frame {
    pub fn new(width: u32, height: u32) -> Self {
        Self(image::RgbImage::new(width, height))
    }

    pub fn mirror(&mut self) {
        image::imageops::flip_horizontal_in_place(&mut self.0);
    }

    /// Rec.601 luma, the weighting the expression model was trained with.
    pub fn luma(pixel: &image::Rgb<u8>) -> f32 {
        0.299 * pixel[0] as f32 + 0.587 * pixel[1] as f32 + 0.114 * pixel[2] as f32
    }

    pub fn to_gray(&self) -> image::GrayImage {
        let (w, h) = self.dimensions();
        image::GrayImage::from_fn(w, h, |x, y| {
            image::Luma([Self::luma(self.get_pixel(x, y)).round() as u8])
        })
    }
}

impl From<image::RgbImage> for Frame {
    fn from(value: image::RgbImage) -> Self {
        Self(value)
    }
}

impl std::ops::Deref for Frame {
    type Target = image::RgbImage;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::ops::DerefMut for Frame {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}
