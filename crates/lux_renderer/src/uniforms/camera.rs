use bytemuck::{Pod, Zeroable};
use lux_core::Camera;

/// Depth of field parameters, laid out for a uniform buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PhysicalCameraUniform {
    /// Aperture diameter; 0 for a pinhole
    pub bokeh_size: f32,
    /// Polygonal aperture blade count; 0 for a round aperture
    pub aperture_blades: u32,
    pub aperture_rotation: f32,
    pub focus_distance: f32,
    pub anamorphic_ratio: f32,
    _padding: [f32; 3],
}

impl Default for PhysicalCameraUniform {
    fn default() -> Self {
        Self {
            bokeh_size: 0.0,
            aperture_blades: 0,
            aperture_rotation: 0.0,
            focus_distance: 25.0,
            anamorphic_ratio: 1.0,
            _padding: [0.0; 3],
        }
    }
}

impl PhysicalCameraUniform {
    pub fn update_from(&mut self, camera: &Camera) {
        *self = match &camera.lens {
            Some(lens) => Self {
                bokeh_size: lens.bokeh_size(camera.fov_y),
                aperture_blades: lens.aperture_blades,
                aperture_rotation: lens.aperture_rotation,
                focus_distance: lens.focus_distance,
                anamorphic_ratio: lens.anamorphic_ratio,
                _padding: [0.0; 3],
            },
            None => Self::default(),
        };
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lux_core::PhysicalLens;
    use lux_math::Vec3;

    #[test]
    fn test_pinhole_defaults() {
        let mut uniform = PhysicalCameraUniform::default();
        uniform.bokeh_size = 3.0;
        uniform.update_from(&Camera::new(Vec3::Z, Vec3::ZERO, 1.0));
        assert_eq!(uniform, PhysicalCameraUniform::default());
        assert_eq!(uniform.as_bytes().len(), 32);
    }

    #[test]
    fn test_copies_lens() {
        let lens = PhysicalLens {
            f_stop: 2.0,
            aperture_blades: 6,
            aperture_rotation: 0.3,
            focus_distance: 4.0,
            anamorphic_ratio: 1.5,
        };
        let camera = Camera::new(Vec3::Z, Vec3::ZERO, 1.0).with_lens(lens);
        let mut uniform = PhysicalCameraUniform::default();
        uniform.update_from(&camera);

        assert_eq!(uniform.bokeh_size, lens.bokeh_size(camera.fov_y));
        assert_eq!(uniform.aperture_blades, 6);
        assert_eq!(uniform.focus_distance, 4.0);
        assert_eq!(uniform.anamorphic_ratio, 1.5);
    }
}
