// Low-resolution icon generation
//
// Transparent background: plain 1/5 downscale, alpha preserved.
// Opaque background: downscale drawn onto a canvas pre-filled with the
// background colour, then reduced to RGB565 unless the source had alpha.

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};

use super::{Color, IconBitmap};
use crate::constants::LOW_RES_SCALE_FACTOR;

/// Pixel layout of a generated low-res icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LowResFormat {
    Rgba8888,
    /// 5/6/5-bit colour, carried in an RGB8 buffer.
    Rgb565,
}

#[derive(Debug, Clone, Copy)]
pub struct LowResGenerator {
    factor: u32,
}

impl Default for LowResGenerator {
    fn default() -> Self {
        Self {
            factor: LOW_RES_SCALE_FACTOR,
        }
    }
}

impl LowResGenerator {
    pub fn target_size(&self, width: u32, height: u32) -> (u32, u32) {
        ((width / self.factor).max(1), (height / self.factor).max(1))
    }

    pub fn format_for(&self, icon: &IconBitmap, background: Color) -> LowResFormat {
        if background.is_transparent() || icon.has_transparency() {
            LowResFormat::Rgba8888
        } else {
            LowResFormat::Rgb565
        }
    }

    pub fn generate(&self, icon: &IconBitmap, background: Color) -> IconBitmap {
        let (w, h) = self.target_size(icon.width(), icon.height());
        let scaled = imageops::resize(&icon.to_rgba(), w, h, FilterType::Triangle);

        if background.is_transparent() {
            return IconBitmap::from_rgba(scaled);
        }

        let canvas = composite_over(&scaled, background);

        match self.format_for(icon, background) {
            LowResFormat::Rgba8888 => IconBitmap::from_rgba(canvas),
            LowResFormat::Rgb565 => IconBitmap::new(DynamicImage::ImageRgb8(to_rgb565(&canvas))),
        }
    }
}

/// Draw `top` over an opaque canvas of `background`. Integer blend so the
/// output is bit-exact across platforms.
fn composite_over(top: &RgbaImage, background: Color) -> RgbaImage {
    let bg = background.to_opaque_pixel();
    RgbaImage::from_fn(top.width(), top.height(), |x, y| {
        let fg = top.get_pixel(x, y);
        let a = u32::from(fg[3]);
        let mix = |f: u8, b: u8| ((u32::from(f) * a + u32::from(b) * (255 - a) + 127) / 255) as u8;
        Rgba([mix(fg[0], bg[0]), mix(fg[1], bg[1]), mix(fg[2], bg[2]), u8::MAX])
    })
}

fn to_rgb565(canvas: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(canvas.width(), canvas.height(), |x, y| {
        let p = canvas.get_pixel(x, y);
        Rgb([quantize(p[0], 5), quantize(p[1], 6), quantize(p[2], 5)])
    })
}

/// Drop to `bits` of precision, then replicate the high bits into the low
/// ones so full-scale values stay full-scale.
fn quantize(value: u8, bits: u32) -> u8 {
    let reduced = value >> (8 - bits);
    (reduced << (8 - bits)) | (reduced >> (2 * bits - 8))
}
