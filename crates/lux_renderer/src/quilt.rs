//! Multi-view rendering for light field displays.
//!
//! A quilt is a grid of views of the same scene, each taken from a camera
//! slid sideways along a horizontal arc. Views are rendered one per update
//! in place of tiles; a full sweep over every view is one sample.

use lux_core::Camera;
use lux_math::{Mat4, UVec2};
use serde::{Deserialize, Serialize};

use crate::error::RenderResult;
use crate::program::{PathTracingProgram, ProgramInputs};
use crate::renderer::{Accumulator, RendererSettings, View};
use crate::target::RenderTarget;
use crate::tiles::{TileGrid, TileRect};
use crate::uniforms::PhysicalCameraUniform;

/// Layout and viewing geometry of a quilt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuiltSettings {
    pub view_count: u32,
    /// Columns x rows of the view grid
    pub quilt_dimensions: UVec2,
    /// Horizontal angle swept by the views, radians
    pub view_cone: f32,
    /// Vertical field of view of each view, radians
    pub view_fov: f32,
    /// Distance from the camera to the plane kept fixed across views
    pub display_distance: f32,
    /// Width over height of the display
    pub display_aspect: f32,
}

impl Default for QuiltSettings {
    fn default() -> Self {
        Self {
            view_count: 48,
            quilt_dimensions: UVec2::new(8, 6),
            view_cone: 35.0_f32.to_radians(),
            view_fov: 14.0_f32.to_radians(),
            display_distance: 1.0,
            display_aspect: 0.75,
        }
    }
}

/// Viewing parameters derived from a physical display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayViewParameters {
    pub display_distance: f32,
    pub display_aspect: f32,
    pub view_cone: f32,
    pub view_fov: f32,
}

/// Parameters for a viewer `viewer_distance` away from a
/// `display_width x display_height` display, all in the same unit.
pub fn display_view_parameters(viewer_distance: f32, display_width: f32, display_height: f32) -> DisplayViewParameters {
    DisplayViewParameters {
        display_distance: viewer_distance,
        display_aspect: display_width / display_height,
        view_cone: 2.0 * (display_width / 2.0 / viewer_distance).atan(),
        view_fov: 2.0 * (display_height / 2.0 / viewer_distance).atan(),
    }
}

impl QuiltSettings {
    pub fn set_from_display_view(&mut self, viewer_distance: f32, display_width: f32, display_height: f32) {
        let params = display_view_parameters(viewer_distance, display_width, display_height);
        self.display_distance = params.display_distance;
        self.display_aspect = params.display_aspect;
        self.view_cone = params.view_cone;
        self.view_fov = params.view_fov;
    }

    fn grid(&self) -> TileGrid {
        TileGrid::new(self.quilt_dimensions)
    }

    /// Region of view `index`. Views fill the grid left to right from the
    /// bottom row up.
    pub fn view_rect(&self, index: usize, width: u32, height: u32) -> TileRect {
        let grid = self.grid();
        let column = (index % grid.columns as usize) as u32;
        let row = (index / grid.columns as usize) as u32;
        grid.cell(column, grid.rows.saturating_sub(row + 1), width, height)
    }

    /// Camera to world and projection for view `index`.
    pub fn view_camera(&self, index: usize, camera_world: Mat4, near: f32, far: f32) -> (Mat4, Mat4) {
        let t = if self.view_count > 1 {
            index as f32 / (self.view_count - 1) as f32 - 0.5
        } else {
            0.0
        };
        let offset = self.display_distance * (t * self.view_cone).tan();

        let right = camera_world.x_axis.truncate().normalize_or_zero();
        let world = Mat4::from_translation(right * offset) * camera_world;

        let mut projection = Mat4::perspective_rh(self.view_fov, self.display_aspect, near, far);
        // Skew the frustum back so the display plane stays centered
        projection.z_axis.x -= offset / (self.display_distance * self.display_aspect * (self.view_fov / 2.0).tan());
        (world, projection)
    }
}

/// Progressive quilt renderer: one view per [`QuiltPathTracingRenderer::update`].
pub struct QuiltPathTracingRenderer<P> {
    program: P,
    settings: RendererSettings,
    quilt: QuiltSettings,
    physical_camera: PhysicalCameraUniform,
    accumulator: Option<Accumulator>,
}

impl<P: PathTracingProgram> QuiltPathTracingRenderer<P> {
    pub fn new(program: P, settings: RendererSettings, quilt: QuiltSettings) -> Self {
        Self {
            program,
            settings,
            quilt,
            physical_camera: PhysicalCameraUniform::default(),
            accumulator: Some(Self::accumulator(1, 1, settings, &quilt)),
        }
    }

    fn accumulator(width: u32, height: u32, settings: RendererSettings, quilt: &QuiltSettings) -> Accumulator {
        Accumulator::new(width, height, quilt.view_count.max(1) as usize, true, settings)
    }

    pub fn quilt(&self) -> &QuiltSettings {
        &self.quilt
    }

    /// Replace the quilt layout and restart accumulation.
    pub fn set_quilt(&mut self, quilt: QuiltSettings) {
        self.quilt = quilt;
        if let Some(accumulator) = &mut self.accumulator {
            let (width, height) = accumulator.size();
            *accumulator = Self::accumulator(width, height, self.settings, &self.quilt);
        }
    }

    /// Match the views to a physical display and restart accumulation.
    pub fn set_from_display_view(&mut self, viewer_distance: f32, display_width: f32, display_height: f32) {
        let mut quilt = self.quilt;
        quilt.set_from_display_view(viewer_distance, display_width, display_height);
        self.set_quilt(quilt);
    }

    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    pub fn program_mut(&mut self) -> &mut P {
        &mut self.program
    }

    pub fn set_size(&mut self, width: u32, height: u32) -> RenderResult<()> {
        match &mut self.accumulator {
            Some(accumulator) => accumulator.set_size(width, height),
            None => {
                log::warn!("set_size() called on a disposed quilt renderer");
                Ok(())
            }
        }
    }

    pub fn reset(&mut self) {
        if let Some(accumulator) = &mut self.accumulator {
            accumulator.reset();
        }
    }

    /// Completed sweeps over all views, counting partial sweeps by view.
    pub fn samples(&self) -> f32 {
        self.accumulator.as_ref().map_or(0.0, Accumulator::samples)
    }

    pub fn target(&self) -> Option<&RenderTarget> {
        self.accumulator.as_ref().map(Accumulator::target)
    }

    /// Render the next view.
    pub fn update(&mut self, camera: &Camera, inputs: &ProgramInputs) -> RenderResult<()> {
        let Some(accumulator) = &mut self.accumulator else {
            log::warn!("update() called on a disposed quilt renderer");
            return Ok(());
        };
        self.physical_camera.update_from(camera);

        let quilt = self.quilt;
        let camera_world = camera.world_matrix();
        accumulator.step(&mut self.program, inputs, self.physical_camera, |view, width, height| {
            let (camera_world, projection) = quilt.view_camera(view, camera_world, camera.near, camera.far);
            let region = quilt.view_rect(view, width, height);
            View {
                camera_world,
                projection,
                viewport: UVec2::new(region.width, region.height),
                region,
            }
        })
    }

    pub fn dispose(&mut self) {
        if self.accumulator.take().is_some() {
            log::debug!("Quilt renderer disposed");
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.accumulator.is_none()
    }
}
