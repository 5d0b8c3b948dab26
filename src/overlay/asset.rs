use std::path::{Path, PathBuf};

use image::DynamicImage;

use crate::{model::Expression, Error, Result};

/// Character image with its transparency split out, as loaded from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayAsset {
    pub rgb: image::RgbImage,
    pub alpha: Option<image::GrayImage>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssetSlot {
    Loaded(OverlayAsset),
    Absent,
}

/// One slot per expression, filled once at startup.
#[derive(Debug, Clone)]
pub struct AssetTable {
    slots: [AssetSlot; Expression::COUNT],
}

impl OverlayAsset {
    pub fn new(rgb: image::RgbImage, alpha: Option<image::GrayImage>) -> Self {
        Self { rgb, alpha }
    }

    pub fn open(path: &Path) -> Result<Self> {
        let image = image::open(path).map_err(|err| match err {
            image::ImageError::IoError(io) => Error::IOFailure(path.to_path_buf(), io),
            other => Error::ImageError(other),
        })?;
        Ok(Self::from(image))
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.rgb.dimensions()
    }

    pub fn resize(&self, width: u32, height: u32) -> Self {
        if self.dimensions() == (width, height) {
            return self.clone();
        }
        let filter = image::imageops::FilterType::Triangle;
        Self {
            rgb: image::imageops::resize(&self.rgb, width, height, filter),
            alpha: self
                .alpha
                .as_ref()
                .map(|mask| image::imageops::resize(mask, width, height, filter)),
        }
    }
}

impl From<DynamicImage> for OverlayAsset {
    fn from(value: DynamicImage) -> Self {
        if !value.color().has_alpha() {
            return Self::new(value.to_rgb8(), None);
        }
        let rgba = value.to_rgba8();
        let (w, h) = rgba.dimensions();
        Self::new(
            image::RgbImage::from_fn(w, h, |x, y| {
                let p = rgba.get_pixel(x, y);
                image::Rgb([p[0], p[1], p[2]])
            }),
            Some(image::GrayImage::from_fn(w, h, |x, y| {
                image::Luma([rgba.get_pixel(x, y)[3]])
            })),
        )
    }
}

impl AssetSlot {
    pub fn asset(&self) -> Option<&OverlayAsset> {
        match self {
            AssetSlot::Loaded(asset) => Some(asset),
            AssetSlot::Absent => None,
        }
    }
}

impl Default for AssetTable {
    fn default() -> Self {
        Self {
            slots: std::array::from_fn(|_| AssetSlot::Absent),
        }
    }
}

impl AssetTable {
    /// `{dir}/{stem}.png` for every expression. Missing or unreadable files leave the slot absent.
    #[tracing::instrument(name = "Loading character assets")]
    pub fn load(dir: &Path) -> Self {
        let table = Self {
            slots: Expression::ALL.map(|expression| {
                let path = Self::path_for(dir, expression);
                if !path.exists() {
                    tracing::warn!("no character image for {} at {}", expression, path.display());
                    return AssetSlot::Absent;
                }
                match OverlayAsset::open(&path) {
                    Ok(asset) => AssetSlot::Loaded(asset),
                    Err(err) => {
                        tracing::warn!("could not load {}: {}", path.display(), err);
                        AssetSlot::Absent
                    }
                }
            }),
        };
        tracing::info!("{} of {} character images loaded", table.loaded_count(), Expression::COUNT);
        table
    }

    pub fn path_for(dir: &Path, expression: Expression) -> PathBuf {
        dir.join(format!("{}.png", expression.asset_stem()))
    }

    pub fn insert(&mut self, expression: Expression, asset: OverlayAsset) {
        self.slots[expression.index()] = AssetSlot::Loaded(asset);
    }

    pub fn slot(&self, expression: Expression) -> &AssetSlot {
        &self.slots[expression.index()]
    }

    pub fn get(&self, expression: Expression) -> Option<&OverlayAsset> {
        self.slot(expression).asset()
    }

    pub fn loaded_count(&self) -> usize {
        self.slots.iter().filter(|s| s.asset().is_some()).count()
    }
}
