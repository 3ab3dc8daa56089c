//! CPU-side texture payloads destined for the GPU.
//!
//! Encoders write typed texel arrays into a [`DataTexture`]; uploaders
//! compare [`DataTexture::version`] against what they last uploaded and
//! only transfer payloads that changed. Versions are per texture, so every
//! texture also carries a process-unique [`DataTexture::id`].

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(1);

fn next_texture_id() -> u64 {
    NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Texel layout of a [`DataTexture`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TexelFormat {
    R32Float,
    Rg32Float,
    Rgba32Float,
    R32Uint,
    Rgba32Uint,
}

impl TexelFormat {
    /// Components per texel.
    pub fn channels(self) -> usize {
        match self {
            TexelFormat::R32Float | TexelFormat::R32Uint => 1,
            TexelFormat::Rg32Float => 2,
            TexelFormat::Rgba32Float | TexelFormat::Rgba32Uint => 4,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(
            self,
            TexelFormat::R32Float | TexelFormat::Rg32Float | TexelFormat::Rgba32Float
        )
    }

    /// Bytes per texel (all formats use 32-bit components).
    pub fn texel_size(self) -> usize {
        self.channels() * 4
    }
}

/// Typed texel storage.
#[derive(Clone, Debug, PartialEq)]
pub enum TexelData {
    F32(Vec<f32>),
    U32(Vec<u32>),
}

impl TexelData {
    pub fn len(&self) -> usize {
        match self {
            TexelData::F32(data) => data.len(),
            TexelData::U32(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A 2D (or layered 2D array) texture payload.
///
/// Clones get a fresh id, so a clone and its source never share an upload.
#[derive(Debug)]
pub struct DataTexture {
    pub label: String,
    id: u64,
    width: u32,
    height: u32,
    layers: u32,
    format: TexelFormat,
    data: TexelData,
    version: u64,
}

impl DataTexture {
    /// A 1x1 zeroed placeholder at version 0.
    pub fn new(label: impl Into<String>, format: TexelFormat) -> Self {
        let data = if format.is_float() {
            TexelData::F32(vec![0.0; format.channels()])
        } else {
            TexelData::U32(vec![0; format.channels()])
        };
        Self {
            label: label.into(),
            id: next_texture_id(),
            width: 1,
            height: 1,
            layers: 1,
            format,
            data,
            version: 0,
        }
    }

    /// Replace the float contents, resizing as needed. Bumps the version.
    ///
    /// `data` must hold `width * height * layers * channels` values.
    pub fn write_f32(&mut self, width: u32, height: u32, layers: u32, data: Vec<f32>) {
        debug_assert!(self.format.is_float(), "{} is not a float texture", self.label);
        self.write(width, height, layers, TexelData::F32(data));
    }

    /// Replace the integer contents, resizing as needed. Bumps the version.
    pub fn write_u32(&mut self, width: u32, height: u32, layers: u32, data: Vec<u32>) {
        debug_assert!(!self.format.is_float(), "{} is not an integer texture", self.label);
        self.write(width, height, layers, TexelData::U32(data));
    }

    fn write(&mut self, width: u32, height: u32, layers: u32, data: TexelData) {
        debug_assert_eq!(
            data.len(),
            width as usize * height as usize * layers as usize * self.format.channels(),
            "{}: payload does not match {}x{}x{}",
            self.label,
            width,
            height,
            layers
        );
        self.width = width;
        self.height = height;
        self.layers = layers;
        self.data = data;
        self.version += 1;
    }

    /// Mark contents as changed after editing them through `f32_mut`.
    pub fn touch(&mut self) {
        self.version += 1;
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layers(&self) -> u32 {
        self.layers
    }

    pub fn format(&self) -> TexelFormat {
        self.format
    }

    /// Incremented on every write.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// `(id, version)`; equal keys mean identical contents.
    pub fn revision(&self) -> (u64, u64) {
        (self.id, self.version)
    }

    pub fn data(&self) -> &TexelData {
        &self.data
    }

    pub fn as_f32(&self) -> Option<&[f32]> {
        match &self.data {
            TexelData::F32(data) => Some(data),
            TexelData::U32(_) => None,
        }
    }

    pub fn as_u32(&self) -> Option<&[u32]> {
        match &self.data {
            TexelData::U32(data) => Some(data),
            TexelData::F32(_) => None,
        }
    }

    /// Mutable float contents. Call [`DataTexture::touch`] afterwards.
    pub fn f32_mut(&mut self) -> Option<&mut [f32]> {
        match &mut self.data {
            TexelData::F32(data) => Some(data),
            TexelData::U32(_) => None,
        }
    }

    /// Raw bytes for upload.
    pub fn bytes(&self) -> &[u8] {
        match &self.data {
            TexelData::F32(data) => bytemuck::cast_slice(data),
            TexelData::U32(data) => bytemuck::cast_slice(data),
        }
    }

    /// Offset of texel (x, y, layer) into the component array.
    pub fn texel_offset(&self, x: u32, y: u32, layer: u32) -> usize {
        let texel = (layer as usize * self.height as usize + y as usize) * self.width as usize + x as usize;
        texel * self.format.channels()
    }

    /// Float components of one texel.
    pub fn texel_f32(&self, x: u32, y: u32, layer: u32) -> &[f32] {
        let offset = self.texel_offset(x, y, layer);
        let channels = self.format.channels();
        self.as_f32()
            .map(|data| &data[offset..offset + channels])
            .unwrap_or(&[])
    }

    /// Integer components of one texel.
    pub fn texel_u32(&self, x: u32, y: u32, layer: u32) -> &[u32] {
        let offset = self.texel_offset(x, y, layer);
        let channels = self.format.channels();
        self.as_u32()
            .map(|data| &data[offset..offset + channels])
            .unwrap_or(&[])
    }
}

/// Nearly square dimensions holding at least `count` texels (minimum 1x1).
pub fn square_dimensions(count: usize) -> (u32, u32) {
    let count = count.max(1);
    let width = (count as f64).sqrt().ceil() as usize;
    let height = count.div_ceil(width);
    (width as u32, height as u32)
}

impl Clone for DataTexture {
    fn clone(&self) -> Self {
        Self {
            label: self.label.clone(),
            id: next_texture_id(),
            width: self.width,
            height: self.height,
            layers: self.layers,
            format: self.format,
            data: self.data.clone(),
            version: self.version,
        }
    }
}
