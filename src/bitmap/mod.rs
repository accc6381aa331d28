// Icon bitmaps: shared image handles plus the PNG form stored on disk

pub mod low_res;

use std::fmt;
use std::io::Cursor;
use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use low_res::LowResGenerator;

/// A cached icon image.
///
/// Cloning shares the underlying pixels. Two handles are "the same icon" only
/// when they share an allocation (see [`IconBitmap::same_instance`]); pixel
/// equality is never used for identity.
#[derive(Clone)]
pub struct IconBitmap {
    image: Arc<DynamicImage>,
}

impl IconBitmap {
    pub fn new(image: DynamicImage) -> Self {
        Self {
            image: Arc::new(image),
        }
    }

    pub fn from_rgba(image: RgbaImage) -> Self {
        Self::new(DynamicImage::ImageRgba8(image))
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn to_rgba(&self) -> RgbaImage {
        self.image.to_rgba8()
    }

    pub fn same_instance(&self, other: &IconBitmap) -> bool {
        Arc::ptr_eq(&self.image, &other.image)
    }

    /// True if any pixel is not fully opaque.
    pub fn has_transparency(&self) -> bool {
        match self.image.as_ref() {
            DynamicImage::ImageRgba8(img) => img.pixels().any(|p| p[3] < u8::MAX),
            other if other.color().has_alpha() => {
                other.to_rgba8().pixels().any(|p| p[3] < u8::MAX)
            }
            _ => false,
        }
    }

    /// Flatten to PNG bytes for the store.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }

    /// Decode stored bytes. Corrupt or empty data yields `None`.
    pub fn from_png(data: &[u8]) -> Option<Self> {
        if data.is_empty() {
            return None;
        }
        match image::load_from_memory_with_format(data, ImageFormat::Png) {
            Ok(img) => Some(Self::new(img)),
            Err(e) => {
                log::debug!("Discarding undecodable icon blob ({} bytes): {}", data.len(), e);
                None
            }
        }
    }
}

impl fmt::Debug for IconBitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IconBitmap")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("color", &self.image.color())
            .finish()
    }
}

/// Scale a raw provider image to the configured square icon size.
pub fn normalize_icon(raw: RgbaImage, size: u32) -> RgbaImage {
    if raw.width() == size && raw.height() == size {
        return raw;
    }
    imageops::resize(&raw, size.max(1), size.max(1), FilterType::Triangle)
}

/// ARGB colour, `0xAARRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Color(pub u32);

impl Color {
    pub const TRANSPARENT: Color = Color(0);

    pub fn alpha(self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub fn red(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub fn green(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub fn blue(self) -> u8 {
        self.0 as u8
    }

    pub fn is_transparent(self) -> bool {
        self.alpha() == 0
    }

    /// Colour as a fully opaque pixel.
    pub fn to_opaque_pixel(self) -> Rgba<u8> {
        Rgba([self.red(), self.green(), self.blue(), u8::MAX])
    }
}
