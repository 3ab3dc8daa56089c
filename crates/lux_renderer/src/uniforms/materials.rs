//! Material list encoded as one row of RGBA32F texels per material.
//!
//! Texel layout of a row (`-1` marks an unbound texture index):
//!
//! | texel | r                    | g                     | b                       | a                      |
//! |-------|----------------------|-----------------------|-------------------------|------------------------|
//! | 0     | color.r              | color.g               | color.b                 | map                    |
//! | 1     | metalness            | metalness map         | roughness               | roughness map          |
//! | 2     | ior                  | transmission          | transmission map        | emissive intensity     |
//! | 3     | emissive.r           | emissive.g            | emissive.b              | emissive map           |
//! | 4     | normal map           | normal scale.x        | normal scale.y          | clearcoat              |
//! | 5     | clearcoat map        | clearcoat roughness   | clearcoat roughness map | clearcoat normal map   |
//! | 6     | sheen color.r        | sheen color.g         | sheen color.b           | sheen                  |
//! | 7     | sheen color map      | sheen roughness       | sheen roughness map     | iridescence            |
//! | 8     | iridescence map      | iridescence ior       | thickness range min     | thickness range max    |
//! | 9     | iridescence thickness map | specular intensity | specular intensity map | 0                     |
//! | 10    | specular color.r     | specular color.g      | specular color.b        | specular color map     |
//! | 11    | attenuation color.r  | attenuation color.g   | attenuation color.b     | attenuation distance   |
//! | 12    | thickness            | opacity               | alpha map               | alpha test             |
//! | 13    | side                 | matte                 | cast shadow             | vertex colors          |
//! | 14    | transparent          | flat shading          | 0                       | 0                      |
//!
//! Texels 15.. hold two rows of the UV transform of every slot in
//! [`TextureSlot::ALL`] order.

use std::collections::HashMap;
use std::sync::Arc;

use lux_core::{DataTexture, Material, TexelFormat, Texture, TextureSlot};
use lux_math::Mat3;

use crate::error::{UniformError, UniformResult};

const PROPERTY_TEXELS: usize = 15;
const FLAGS_TEXEL: usize = 13;

/// Texels per material row.
pub const MATERIAL_TEXELS: usize = PROPERTY_TEXELS + 2 * TextureSlot::COUNT;

/// Materials uniform with renderer-level override bits.
#[derive(Debug, Clone)]
pub struct MaterialsTexture {
    pub texture: DataTexture,
    cast_shadow: Vec<bool>,
    matte: Vec<bool>,
    count: usize,
}

impl Default for MaterialsTexture {
    fn default() -> Self {
        Self::new()
    }
}

impl MaterialsTexture {
    pub fn new() -> Self {
        Self {
            texture: DataTexture::new("materials", TexelFormat::Rgba32Float),
            cast_shadow: Vec::new(),
            matte: Vec::new(),
            count: 0,
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Whether material `index` casts shadows (default true).
    pub fn cast_shadow(&self, index: usize) -> bool {
        self.cast_shadow.get(index).copied().unwrap_or(true)
    }

    pub fn set_cast_shadow(&mut self, index: usize, value: bool) {
        set_override(&mut self.cast_shadow, index, value, true);
        self.write_flags(index);
    }

    /// Whether material `index` is a matte (shadow catcher, default false).
    pub fn matte(&self, index: usize) -> bool {
        self.matte.get(index).copied().unwrap_or(false)
    }

    pub fn set_matte(&mut self, index: usize, value: bool) {
        set_override(&mut self.matte, index, value, false);
        self.write_flags(index);
    }

    /// Reset every override to its default.
    pub fn clear_overrides(&mut self) {
        self.cast_shadow.clear();
        self.matte.clear();
        for index in 0..self.count {
            self.write_flags_untouched(index);
        }
        self.texture.touch();
    }

    /// Rewrite every row from `materials`.
    ///
    /// Texture indices are resolved by identity against `textures`.
    pub fn update_from(&mut self, materials: &[Arc<Material>], textures: &[Arc<Texture>]) -> UniformResult<()> {
        let lookup: HashMap<*const Texture, usize> = textures
            .iter()
            .enumerate()
            .map(|(i, t)| (Arc::as_ptr(t), i))
            .collect();

        let rows = materials.len().max(1);
        let mut data = vec![0.0f32; rows * MATERIAL_TEXELS * 4];
        for (index, (material, row)) in materials
            .iter()
            .zip(data.chunks_exact_mut(MATERIAL_TEXELS * 4))
            .enumerate()
        {
            let map_index = |slot: TextureSlot| -> UniformResult<f32> {
                match material.map(slot) {
                    None => Ok(-1.0),
                    Some(map) => lookup
                        .get(&Arc::as_ptr(&map.texture))
                        .map(|&i| i as f32)
                        .ok_or(UniformError::UnknownTexture { material: index, slot }),
                }
            };
            let texels = [
                [material.color.x, material.color.y, material.color.z, map_index(TextureSlot::Map)?],
                [
                    material.metalness,
                    map_index(TextureSlot::Metalness)?,
                    material.roughness,
                    map_index(TextureSlot::Roughness)?,
                ],
                [
                    material.ior,
                    material.transmission,
                    map_index(TextureSlot::Transmission)?,
                    material.emissive_intensity,
                ],
                [
                    material.emissive.x,
                    material.emissive.y,
                    material.emissive.z,
                    map_index(TextureSlot::Emissive)?,
                ],
                [
                    map_index(TextureSlot::Normal)?,
                    material.normal_scale.x,
                    material.normal_scale.y,
                    material.clearcoat,
                ],
                [
                    map_index(TextureSlot::Clearcoat)?,
                    material.clearcoat_roughness,
                    map_index(TextureSlot::ClearcoatRoughness)?,
                    map_index(TextureSlot::ClearcoatNormal)?,
                ],
                [
                    material.sheen_color.x,
                    material.sheen_color.y,
                    material.sheen_color.z,
                    material.sheen,
                ],
                [
                    map_index(TextureSlot::SheenColor)?,
                    material.sheen_roughness,
                    map_index(TextureSlot::SheenRoughness)?,
                    material.iridescence,
                ],
                [
                    map_index(TextureSlot::Iridescence)?,
                    material.iridescence_ior,
                    material.iridescence_thickness_range.x,
                    material.iridescence_thickness_range.y,
                ],
                [
                    map_index(TextureSlot::IridescenceThickness)?,
                    material.specular_intensity,
                    map_index(TextureSlot::SpecularIntensity)?,
                    0.0,
                ],
                [
                    material.specular_color.x,
                    material.specular_color.y,
                    material.specular_color.z,
                    map_index(TextureSlot::SpecularColor)?,
                ],
                [
                    material.attenuation_color.x,
                    material.attenuation_color.y,
                    material.attenuation_color.z,
                    material.attenuation_distance,
                ],
                [
                    material.thickness,
                    material.opacity,
                    map_index(TextureSlot::Alpha)?,
                    material.alpha_test,
                ],
                [0.0; 4],
                [
                    bool_texel(material.transparent),
                    bool_texel(material.flat_shading),
                    0.0,
                    0.0,
                ],
            ];
            for (dst, texel) in row.chunks_exact_mut(4).zip(texels) {
                dst.copy_from_slice(&texel);
            }
            row[FLAGS_TEXEL * 4..FLAGS_TEXEL * 4 + 4].copy_from_slice(&self.flags(index, material));

            let transforms = &mut row[PROPERTY_TEXELS * 4..];
            for (slot, dst) in TextureSlot::ALL.iter().zip(transforms.chunks_exact_mut(8)) {
                let transform = material.map(*slot).map(|m| m.transform).unwrap_or(Mat3::IDENTITY);
                dst[..3].copy_from_slice(&transform.row(0).to_array());
                dst[4..7].copy_from_slice(&transform.row(1).to_array());
            }
        }

        self.texture.write_f32(MATERIAL_TEXELS as u32, rows as u32, 1, data);
        self.count = materials.len();
        Ok(())
    }

    fn flags(&self, index: usize, material: &Material) -> [f32; 4] {
        [
            material.side.code(),
            bool_texel(self.matte(index)),
            bool_texel(self.cast_shadow(index)),
            bool_texel(material.vertex_colors),
        ]
    }

    fn write_flags(&mut self, index: usize) {
        if index < self.count {
            self.write_flags_untouched(index);
            self.texture.touch();
        }
    }

    /// Patch the override channels of one row without bumping the version.
    fn write_flags_untouched(&mut self, index: usize) {
        let matte = bool_texel(self.matte(index));
        let cast_shadow = bool_texel(self.cast_shadow(index));
        let offset = (index * MATERIAL_TEXELS + FLAGS_TEXEL) * 4;
        if let Some(texel) = self
            .texture
            .f32_mut()
            .and_then(|data| data.get_mut(offset..offset + 4))
        {
            texel[1] = matte;
            texel[2] = cast_shadow;
        }
    }
}

fn bool_texel(value: bool) -> f32 {
    if value {
        1.0
    } else {
        0.0
    }
}

fn set_override(values: &mut Vec<bool>, index: usize, value: bool, default: bool) {
    if index >= values.len() {
        values.resize(index + 1, default);
    }
    values[index] = value;
}
