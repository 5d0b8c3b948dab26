pub use asset::{AssetSlot, AssetTable, OverlayAsset};

use rayon::{iter::IndexedParallelIterator, iter::ParallelIterator, slice::ParallelSliceMut};

use crate::{
    face::{BoundingBox, Region},
    image::Frame,
};

pub mod asset;

/// How an overlay is sized to its target region.
#[derive(serde::Deserialize, serde::Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FitMode {
    /// Stretch to the region's width and height.
    #[default]
    ExactFit,
    /// Keep the aspect ratio, fit inside the region, pin to its top-right corner.
    AspectFit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Composite {
    Blended(Region),
    Pasted(Region),
    /// Overlay would cross the frame edge, frame left untouched.
    Skipped,
}

#[derive(Debug, Clone, Copy)]
pub struct OverlayCompositor {
    fit: FitMode,
    margin: u32,
}

impl OverlayCompositor {
    pub fn new(fit: FitMode, margin: u32) -> Self {
        Self { fit, margin }
    }

    pub fn exact_fit() -> Self {
        Self::new(FitMode::ExactFit, 0)
    }

    pub fn aspect_fit(margin: u32) -> Self {
        Self::new(FitMode::AspectFit, margin)
    }

    /// Destination rectangle for an overlay of `size` drawn into `region`.
    pub fn placement(&self, region: &BoundingBox, size: (u32, u32)) -> Option<BoundingBox> {
        if region.width <= 0 || region.height <= 0 || size.0 == 0 || size.1 == 0 {
            return None;
        }
        match self.fit {
            FitMode::ExactFit => Some(*region),
            FitMode::AspectFit => {
                let scale = (region.width as f64 / size.0 as f64)
                    .min(region.height as f64 / size.1 as f64);
                let (w, h) = (
                    (size.0 as f64 * scale) as i32,
                    (size.1 as f64 * scale) as i32,
                );
                if w == 0 || h == 0 {
                    return None;
                }
                Some(BoundingBox::new(
                    (region.right() - self.margin as i64 - w as i64) as i32,
                    region.y + self.margin as i32,
                    w,
                    h,
                ))
            }
        }
    }

    /// Draws `asset` into `region` of `frame`. Nothing is written unless the
    /// whole resized overlay fits inside the frame.
    pub fn composite(&self, frame: &mut Frame, region: &BoundingBox, asset: &OverlayAsset) -> Composite {
        let Some(target) = self.placement(region, asset.dimensions()) else {
            return Composite::Skipped;
        };
        let Some(clipped) = target.clip(frame.width(), frame.height()) else {
            return Composite::Skipped;
        };
        if BoundingBox::from(clipped) != target {
            tracing::trace!("overlay {:?} crosses the frame edge, skipped", target);
            return Composite::Skipped;
        }

        let overlay = asset.resize(clipped.width, clipped.height);
        match overlay.alpha.as_ref() {
            Some(mask) => {
                blend_rows(frame, &clipped, |x, y, dst| {
                    let a = mask.get_pixel(x, y)[0] as f32 / 255.;
                    let src = overlay.rgb.get_pixel(x, y);
                    for c in 0..3 {
                        dst[c] = (src[c] as f32 * a + dst[c] as f32 * (1. - a)).round() as u8;
                    }
                });
                Composite::Blended(clipped)
            }
            None => {
                blend_rows(frame, &clipped, |x, y, dst| {
                    dst.copy_from_slice(&overlay.rgb.get_pixel(x, y).0);
                });
                Composite::Pasted(clipped)
            }
        }
    }
}

/// Runs `f(x, y, pixel)` for every pixel of `region`, with `x, y` relative to the region.
fn blend_rows<F>(frame: &mut Frame, region: &Region, f: F)
where
    F: Fn(u32, u32, &mut [u8]) + Sync,
{
    let stride = frame.width() as usize * 3;
    let (x0, x1) = (region.x as usize * 3, (region.x + region.width) as usize * 3);
    let buffer: &mut [u8] = &mut ***frame;
    buffer
        .par_chunks_exact_mut(stride)
        .enumerate()
        .skip(region.y as usize)
        .take(region.height as usize)
        .for_each(|(row, line)| {
            let y = (row - region.y as usize) as u32;
            for (col, px) in line[x0..x1].chunks_exact_mut(3).enumerate() {
                f(col as u32, y, px);
            }
        });
}

#[cfg(test)]
mod test {
    use rand::Rng;

    use super::{Composite, OverlayAsset, OverlayCompositor};
    use crate::{
        face::{BoundingBox, Region},
        image::Frame,
    };

    fn noise_frame(w: u32, h: u32) -> Frame {
        let mut rand = rand::thread_rng();
        Frame::from(image::RgbImage::from_fn(w, h, |_, _| {
            image::Rgb([rand.gen(), rand.gen(), rand.gen()])
        }))
    }

    fn noise_asset(w: u32, h: u32, alpha: bool) -> OverlayAsset {
        let mut rand = rand::thread_rng();
        let rgb = image::RgbImage::from_fn(w, h, |_, _| {
            image::Rgb([rand.gen(), rand.gen(), rand.gen()])
        });
        let mask = alpha.then(|| image::GrayImage::from_fn(w, h, |_, _| image::Luma([rand.gen()])));
        OverlayAsset::new(rgb, mask)
    }

    #[test]
    fn alpha_blend_matches_float_formula() {
        let original = noise_frame(100, 100);
        let asset = noise_asset(50, 50, true);
        let mut frame = original.clone();

        let result = OverlayCompositor::exact_fit().composite(
            &mut frame,
            &BoundingBox::new(0, 0, 50, 50),
            &asset,
        );

        let region = Region {
            x: 0,
            y: 0,
            width: 50,
            height: 50,
        };
        assert_eq!(result, Composite::Blended(region));
        let mask = asset.alpha.as_ref().expect("asset has alpha");
        for (x, y, px) in frame.enumerate_pixels() {
            let before = original.get_pixel(x, y);
            if !region.contains(x, y) {
                assert_eq!(px, before, "pixel ({}, {}) outside region changed", x, y);
                continue;
            }
            let a = mask.get_pixel(x, y)[0] as f32 / 255.;
            let src = asset.rgb.get_pixel(x, y);
            for c in 0..3 {
                let expected = (src[c] as f32 * a + before[c] as f32 * (1. - a)).round() as u8;
                assert_eq!(px[c], expected);
            }
        }
    }

    #[test]
    fn opaque_paste_is_idempotent() {
        let asset = noise_asset(30, 20, false);
        let compositor = OverlayCompositor::exact_fit();
        let region = BoundingBox::new(12, 7, 45, 33);

        let mut once = noise_frame(80, 60);
        compositor.composite(&mut once, &region, &asset);
        let mut twice = once.clone();
        let result = compositor.composite(&mut twice, &region, &asset);

        assert!(matches!(result, Composite::Pasted(_)));
        assert_eq!(once, twice);
    }

    #[test]
    fn region_past_frame_edge_writes_nothing() {
        let mut rand = rand::thread_rng();
        let compositor = OverlayCompositor::exact_fit();
        for alpha in [true, false] {
            let asset = noise_asset(16, 16, alpha);
            for _ in 0..20 {
                let original = noise_frame(64, 48);
                let mut frame = original.clone();
                let region = BoundingBox::new(
                    rand.gen_range(-40..60),
                    rand.gen_range(-40..44),
                    rand.gen_range(20..60),
                    rand.gen_range(10..40),
                );
                let inside = region.x >= 0
                    && region.y >= 0
                    && region.right() <= 64
                    && region.bottom() <= 48;

                let result = compositor.composite(&mut frame, &region, &asset);

                if !inside {
                    assert_eq!(result, Composite::Skipped, "{:?}", region);
                    assert_eq!(frame, original);
                }
            }
        }
    }

    #[test]
    fn aspect_fit_pins_to_top_right_with_margin() {
        let compositor = OverlayCompositor::aspect_fit(10);
        // top-right third of a 640x480 frame
        let region = BoundingBox::new(640 - 213, 0, 213, 160);

        let placed = compositor
            .placement(&region, (96, 96))
            .expect("overlay has a size");

        assert_eq!(placed, BoundingBox::new(640 - 10 - 160, 10, 160, 160));

        let mut frame = Frame::new(640, 480);
        let asset = OverlayAsset::new(image::RgbImage::from_pixel(96, 96, image::Rgb([9, 9, 9])), None);
        let result = compositor.composite(&mut frame, &region, &asset);
        assert_eq!(
            result,
            Composite::Pasted(Region {
                x: 470,
                y: 10,
                width: 160,
                height: 160
            })
        );
        assert_eq!(frame.get_pixel(470, 10).0, [9, 9, 9]);
        assert_eq!(frame.get_pixel(469, 10).0, [0, 0, 0]);
        assert_eq!(frame.get_pixel(630, 10).0, [0, 0, 0]);
    }

    #[test]
    fn wide_overlay_keeps_aspect_ratio() {
        let compositor = OverlayCompositor::aspect_fit(0);
        let placed = compositor
            .placement(&BoundingBox::new(0, 0, 100, 100), (200, 50))
            .expect("overlay has a size");
        assert_eq!((placed.width, placed.height), (100, 25));
        assert_eq!((placed.x, placed.y), (0, 0));
    }

    #[test]
    fn empty_region_is_skipped() {
        let mut frame = Frame::new(10, 10);
        let asset = noise_asset(4, 4, false);
        let result =
            OverlayCompositor::exact_fit().composite(&mut frame, &BoundingBox::new(2, 2, 0, 5), &asset);
        assert_eq!(result, Composite::Skipped);
    }
}
