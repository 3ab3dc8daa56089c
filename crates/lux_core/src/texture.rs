//! Texture pixel storage shared by materials, lights and the environment.
//!
//! Textures are decoded elsewhere; this type only holds linear RGBA float
//! pixels so that both CPU encoders and GPU uploaders can consume them.

use image::{DynamicImage, Rgba32FImage};
use lux_math::Vec3;

/// A loaded texture with pixel data.
///
/// Stores pixels in linear RGBA float format for rendering.
#[derive(Clone, Debug)]
pub struct Texture {
    /// Texture width in pixels
    pub width: u32,

    /// Texture height in pixels
    pub height: u32,

    /// Pixel data in RGBA format (linear, 0-1 range for LDR)
    /// Stored as [R, G, B, A] per pixel, row-major order, top row first
    pub pixels: Vec<[f32; 4]>,

    /// Name for debugging (file path, generator, ...)
    pub name: String,
}

impl Texture {
    /// Create a new texture from pixel data.
    pub fn new(width: u32, height: u32, pixels: Vec<[f32; 4]>, name: impl Into<String>) -> Self {
        debug_assert_eq!(pixels.len(), (width * height) as usize);
        Self {
            width,
            height,
            pixels,
            name: name.into(),
        }
    }

    /// Create a solid color texture (1x1).
    pub fn solid_color(color: Vec3) -> Self {
        Self::new(1, 1, vec![[color.x, color.y, color.z, 1.0]], "<solid>")
    }

    /// Convert a decoded image into linear float pixels.
    pub fn from_image(image: &DynamicImage, name: impl Into<String>) -> Self {
        Self::from_rgba32f(&image.to_rgba32f(), name)
    }

    /// Wrap an RGBA float image buffer.
    pub fn from_rgba32f(image: &Rgba32FImage, name: impl Into<String>) -> Self {
        let pixels = image.pixels().map(|p| p.0).collect();
        Self::new(image.width(), image.height(), pixels, name)
    }

    /// Copy the pixels into an image buffer (for resampling).
    pub fn to_rgba32f(&self) -> Rgba32FImage {
        let raw: Vec<f32> = self.pixels.iter().flatten().copied().collect();
        Rgba32FImage::from_raw(self.width, self.height, raw).unwrap_or_else(|| {
            log::warn!(
                "Texture '{}' pixel count does not match {}x{}",
                self.name,
                self.width,
                self.height
            );
            Rgba32FImage::new(self.width, self.height)
        })
    }

    /// Get pixel at integer coordinates (opaque black if out of range).
    pub fn pixel(&self, x: u32, y: u32) -> [f32; 4] {
        let idx = (y * self.width + x) as usize;
        self.pixels
            .get(idx)
            .copied()
            .unwrap_or([0.0, 0.0, 0.0, 1.0])
    }

    /// Get total size in bytes (approximate).
    pub fn size_bytes(&self) -> usize {
        self.pixels.len() * std::mem::size_of::<[f32; 4]>()
    }
}
