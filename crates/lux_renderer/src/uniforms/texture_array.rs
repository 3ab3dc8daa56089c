use std::sync::Arc;

use image::imageops::{self, FilterType};
use lux_core::{DataTexture, TexelFormat, Texture};

/// Heterogeneous textures resampled into one layered RGBA32F texture.
#[derive(Debug, Clone)]
pub struct TextureArray {
    pub texture: DataTexture,
    /// Fixed layer size; `None` uses the largest input dimensions
    size: Option<(u32, u32)>,
    count: usize,
}

impl TextureArray {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            texture: DataTexture::new(label, TexelFormat::Rgba32Float),
            size: None,
            count: 0,
        }
    }

    /// Resample every layer to `width` x `height`.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = Some((width.max(1), height.max(1)));
        self
    }

    pub fn set_size(&mut self, width: u32, height: u32) {
        self.size = Some((width.max(1), height.max(1)));
    }

    /// Number of input textures in the array.
    ///
    /// An empty array still holds one zeroed placeholder layer.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Layer resolution that `update_from` will use for `textures`.
    pub fn target_size(&self, textures: &[Arc<Texture>]) -> (u32, u32) {
        self.size.unwrap_or_else(|| {
            textures
                .iter()
                .fold((1, 1), |(w, h), t| (w.max(t.width), h.max(t.height)))
        })
    }

    /// Rebuild every layer from `textures`, in order.
    pub fn update_from(&mut self, textures: &[Arc<Texture>]) {
        let (width, height) = self.target_size(textures);
        let layer_len = width as usize * height as usize * 4;
        let layers = textures.len().max(1);

        let mut data: Vec<f32> = Vec::with_capacity(layer_len * layers);
        for texture in textures {
            let start = data.len();
            if texture.width == width && texture.height == height {
                data.extend(texture.pixels.iter().flatten());
            } else {
                let resized = imageops::resize(&texture.to_rgba32f(), width, height, FilterType::Triangle);
                data.extend_from_slice(resized.as_raw());
            }
            // Textures whose pixel count disagrees with their size are cut or padded
            data.resize(start + layer_len, 0.0);
        }
        data.resize(layer_len * layers, 0.0);

        self.texture.write_f32(width, height, layers as u32, data);
        self.count = textures.len();
        log::debug!(
            "Texture array '{}': {} layers at {}x{}",
            self.texture.label,
            self.count,
            width,
            height
        );
    }
}
