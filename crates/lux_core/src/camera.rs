use lux_math::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Film gauge (mm) used to derive a focal length from the vertical FOV.
const FILM_GAUGE_MM: f32 = 35.0;

/// Thin-lens parameters for depth of field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicalLens {
    pub f_stop: f32,
    pub aperture_blades: u32,
    pub aperture_rotation: f32,
    pub focus_distance: f32,
    pub anamorphic_ratio: f32,
}

impl Default for PhysicalLens {
    fn default() -> Self {
        Self {
            f_stop: 1.4,
            aperture_blades: 0,
            aperture_rotation: 0.0,
            focus_distance: 25.0,
            anamorphic_ratio: 1.0,
        }
    }
}

impl PhysicalLens {
    /// Aperture diameter in millimetres for a camera with vertical FOV `fov_y`.
    pub fn bokeh_size(&self, fov_y: f32) -> f32 {
        focal_length_mm(fov_y) / self.f_stop
    }

    /// Set the f-stop that yields the given aperture diameter.
    pub fn set_bokeh_size(&mut self, size: f32, fov_y: f32) {
        self.f_stop = focal_length_mm(fov_y) / size;
    }
}

fn focal_length_mm(fov_y: f32) -> f32 {
    0.5 * FILM_GAUGE_MM / (0.5 * fov_y).tan()
}

/// Perspective camera, optionally with a physical lens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in radians
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub lens: Option<PhysicalLens>,
}

impl Camera {
    /// Create a new camera
    pub fn new(position: Vec3, target: Vec3, aspect: f32) -> Self {
        Self {
            position,
            target,
            up: Vec3::Y,
            fov_y: 45.0_f32.to_radians(),
            aspect,
            near: 0.1,
            far: 1000.0,
            lens: None,
        }
    }

    /// Set the vertical field of view (degrees).
    pub fn with_fov_degrees(mut self, fov: f32) -> Self {
        self.fov_y = fov.to_radians();
        self
    }

    /// Attach a physical lens for depth of field.
    pub fn with_lens(mut self, lens: PhysicalLens) -> Self {
        self.lens = Some(lens);
        self
    }

    /// Get the view matrix (world → camera space)
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// Camera → world transform.
    pub fn world_matrix(&self) -> Mat4 {
        self.view_matrix().inverse()
    }

    /// Get the projection matrix (camera → clip space)
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    /// Get the combined view-projection matrix
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Update aspect ratio (e.g., on resize)
    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }
}
