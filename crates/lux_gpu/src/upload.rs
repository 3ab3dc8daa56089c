//! CPU payload to wgpu texture transfers.

use anyhow::{bail, Context, Result};
use lux_core::{DataTexture, TexelFormat};
use lux_renderer::{RenderTarget, TileRect};

/// Row pitch alignment required for texture/buffer copies.
pub const COPY_BYTES_PER_ROW_ALIGNMENT: u32 = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

pub fn texture_format(format: TexelFormat) -> wgpu::TextureFormat {
    match format {
        TexelFormat::R32Float => wgpu::TextureFormat::R32Float,
        TexelFormat::Rg32Float => wgpu::TextureFormat::Rg32Float,
        TexelFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
        TexelFormat::R32Uint => wgpu::TextureFormat::R32Uint,
        TexelFormat::Rgba32Uint => wgpu::TextureFormat::Rgba32Uint,
    }
}

/// `unpadded` rounded up to the copy row alignment.
pub fn padded_bytes_per_row(unpadded: u32) -> u32 {
    unpadded.div_ceil(COPY_BYTES_PER_ROW_ALIGNMENT) * COPY_BYTES_PER_ROW_ALIGNMENT
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Extent {
    width: u32,
    height: u32,
    layers: u32,
    format: wgpu::TextureFormat,
}

/// A wgpu texture mirroring a [`DataTexture`] or a [`RenderTarget`].
///
/// The texture is recreated when the size or format changes and rewritten
/// only when the source version moves.
#[derive(Debug)]
pub struct GpuTexture {
    label: String,
    array: bool,
    texture: Option<(wgpu::Texture, wgpu::TextureView, Extent)>,
    /// Revision of the last uploaded source
    uploaded: Option<(u64, u64)>,
}

impl GpuTexture {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            array: false,
            texture: None,
            uploaded: None,
        }
    }

    /// Bind as a `texture_2d_array` view even with a single layer.
    pub fn as_array(mut self) -> Self {
        self.array = true;
        self
    }

    pub fn view(&self) -> Option<&wgpu::TextureView> {
        self.texture.as_ref().map(|(_, view, _)| view)
    }

    pub fn texture(&self) -> Option<&wgpu::Texture> {
        self.texture.as_ref().map(|(texture, _, _)| texture)
    }

    /// Upload `source` if it changed since the last call. Returns whether an
    /// upload happened.
    pub fn sync(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, source: &DataTexture) -> Result<bool> {
        if self.texture.is_some() && is_current(self.uploaded, source) {
            return Ok(false);
        }
        let extent = Extent {
            width: source.width(),
            height: source.height(),
            layers: source.layers(),
            format: texture_format(source.format()),
        };
        let row_bytes = source.width() * source.format().texel_size() as u32;
        self.write(device, queue, extent, row_bytes, source.bytes())?;
        self.uploaded = Some(source.revision());
        Ok(true)
    }

    /// Upload a render target. Targets change in place, so this always writes.
    pub fn write_target(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, target: &RenderTarget) -> Result<()> {
        let extent = Extent {
            width: target.width(),
            height: target.height(),
            layers: 1,
            format: wgpu::TextureFormat::Rgba32Float,
        };
        let bytes: &[u8] = bytemuck::cast_slice(target.pixels());
        self.write(device, queue, extent, target.width() * 16, bytes)?;
        self.uploaded = None;
        Ok(())
    }

    fn write(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        extent: Extent,
        row_bytes: u32,
        bytes: &[u8],
    ) -> Result<()> {
        let expected = row_bytes as usize * extent.height as usize * extent.layers as usize;
        if bytes.len() != expected {
            bail!(
                "'{}': {} bytes do not fill {}x{}x{}",
                self.label,
                bytes.len(),
                extent.width,
                extent.height,
                extent.layers
            );
        }

        if self.texture.as_ref().map(|(_, _, current)| *current) != Some(extent) {
            self.texture = Some(self.create(device, extent));
            log::debug!(
                "Created GPU texture '{}' {}x{}x{} {:?}",
                self.label,
                extent.width,
                extent.height,
                extent.layers,
                extent.format
            );
        }
        let (texture, _, _) = self.texture.as_ref().context("texture was just created")?;

        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytes,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(row_bytes),
                rows_per_image: Some(extent.height),
            },
            wgpu::Extent3d {
                width: extent.width,
                height: extent.height,
                depth_or_array_layers: extent.layers,
            },
        );
        Ok(())
    }

    fn create(&self, device: &wgpu::Device, extent: Extent) -> (wgpu::Texture, wgpu::TextureView, Extent) {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&self.label),
            size: wgpu::Extent3d {
                width: extent.width,
                height: extent.height,
                depth_or_array_layers: extent.layers,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: extent.format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let dimension = if self.array || extent.layers > 1 {
            wgpu::TextureViewDimension::D2Array
        } else {
            wgpu::TextureViewDimension::D2
        };
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(&self.label),
            dimension: Some(dimension),
            ..Default::default()
        });
        (texture, view, extent)
    }
}

/// Whether a texture uploaded at `uploaded` already holds `source`.
fn is_current(uploaded: Option<(u64, u64)>, source: &DataTexture) -> bool {
    uploaded == Some(source.revision())
}

/// Copy an RGBA32F texture back to the CPU, blocking until the GPU is done.
pub fn read_rgba32f(device: &wgpu::Device, queue: &wgpu::Queue, texture: &wgpu::Texture) -> Result<Vec<[f32; 4]>> {
    let full = TileRect::new(0, 0, texture.width(), texture.height());
    read_rgba32f_region(device, queue, texture, full)
}

/// Copy one region of an RGBA32F texture back to the CPU, row-major.
pub fn read_rgba32f_region(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    region: TileRect,
) -> Result<Vec<[f32; 4]>> {
    if texture.format() != wgpu::TextureFormat::Rgba32Float {
        bail!("cannot read back a {:?} texture", texture.format());
    }
    if region.is_empty() || region.x + region.width > texture.width() || region.y + region.height > texture.height() {
        bail!("region {:?} is outside the {}x{} texture", region, texture.width(), texture.height());
    }
    let row_bytes = region.width * 16;
    let padded = padded_bytes_per_row(row_bytes);

    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Readback Buffer"),
        size: padded as u64 * region.height as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Readback Encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d {
                x: region.x,
                y: region.y,
                z: 0,
            },
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::ImageCopyBuffer {
            buffer: &buffer,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(region.height),
            },
        },
        wgpu::Extent3d {
            width: region.width,
            height: region.height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(Some(encoder.finish()));

    let slice = buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device.poll(wgpu::Maintain::Wait);
    rx.recv().context("readback callback was dropped")??;

    let pixels = {
        let mapped = slice.get_mapped_range();
        mapped
            .chunks_exact(padded as usize)
            .flat_map(|row| bytemuck::cast_slice::<u8, [f32; 4]>(&row[..row_bytes as usize]).iter().copied())
            .collect()
    };
    buffer.unmap();
    Ok(pixels)
}
