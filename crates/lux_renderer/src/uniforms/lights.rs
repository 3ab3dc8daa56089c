use std::f32::consts::PI;

use lux_core::{DataTexture, LightKind, TexelFormat};
use lux_scene::LightRecord;

use crate::error::{UniformError, UniformResult};

/// RGBA32F texels per light:
/// position+type, color+intensity, u+area, v, direction+radius,
/// distance+decay+cone cosines, IES index.
pub const LIGHT_TEXELS: usize = 7;

/// Light list uniform.
#[derive(Debug, Clone)]
pub struct LightsInfo {
    pub texture: DataTexture,
    count: usize,
}

impl Default for LightsInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl LightsInfo {
    pub fn new() -> Self {
        Self {
            texture: DataTexture::new("lights", TexelFormat::Rgba32Float),
            count: 0,
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Rewrite the texture to hold exactly `lights`.
    ///
    /// `ies_count` is the length of the IES profile list the records index.
    pub fn update_from(&mut self, lights: &[LightRecord], ies_count: usize) -> UniformResult<()> {
        if lights.is_empty() {
            self.texture.write_f32(1, 1, 1, vec![0.0; 4]);
            self.count = 0;
            return Ok(());
        }

        let mut data = Vec::with_capacity(lights.len() * LIGHT_TEXELS * 4);
        for (index, record) in lights.iter().enumerate() {
            let ies = match record.ies {
                Some(ies) if ies >= ies_count => {
                    return Err(UniformError::InvalidIesIndex {
                        light: index,
                        index: ies,
                        count: ies_count,
                    })
                }
                Some(ies) => ies as f32,
                None => -1.0,
            };

            let light = &record.light;
            let cross = record.u.cross(record.v).length();
            let (area, radius, cone) = match light.kind {
                LightKind::RectArea { circular: false, .. } => (4.0 * cross, 0.0, [0.0; 4]),
                LightKind::RectArea { circular: true, .. } => (PI * cross, 0.0, [0.0; 4]),
                LightKind::Spot {
                    angle,
                    penumbra,
                    distance,
                    decay,
                    radius,
                    ..
                } => (
                    0.0,
                    radius,
                    [distance, decay, angle.cos(), (angle * (1.0 - penumbra)).cos()],
                ),
                LightKind::Point { distance, decay } => (0.0, 0.0, [distance, decay, 0.0, 0.0]),
                LightKind::Directional => (0.0, 0.0, [0.0; 4]),
            };

            let p = record.position;
            let d = record.direction;
            data.extend_from_slice(&[p.x, p.y, p.z, light.kind.code() as f32]);
            data.extend_from_slice(&[light.color.x, light.color.y, light.color.z, light.intensity]);
            data.extend_from_slice(&[record.u.x, record.u.y, record.u.z, area]);
            data.extend_from_slice(&[record.v.x, record.v.y, record.v.z, 0.0]);
            data.extend_from_slice(&[d.x, d.y, d.z, radius]);
            data.extend_from_slice(&cone);
            data.extend_from_slice(&[ies, 0.0, 0.0, 0.0]);
        }

        self.texture.write_f32(LIGHT_TEXELS as u32, lights.len() as u32, 1, data);
        self.count = lights.len();
        Ok(())
    }
}
