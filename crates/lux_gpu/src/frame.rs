use bytemuck::{Pod, Zeroable};
use lux_renderer::{FrameParams, ProgramInputs, TileRect};

/// The `Frame` uniform of `path_tracing_inputs.wgsl`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FrameUniform {
    pub camera_world: [[f32; 4]; 4],
    pub inverse_projection: [[f32; 4]; 4],
    pub jitter: [f32; 2],
    pub resolution: [u32; 2],
    pub tile_origin: [u32; 2],
    pub tile_size: [u32; 2],
    pub seed: u32,
    pub sample_index: u32,
    pub bounces: u32,
    pub transmissive_bounces: u32,
    pub light_count: u32,
    pub environment_intensity: f32,
    pub environment_rotation: f32,
    _padding: u32,
}

impl FrameUniform {
    pub fn new(frame: &FrameParams, region: TileRect, inputs: &ProgramInputs) -> Self {
        Self {
            camera_world: frame.camera_world.to_cols_array_2d(),
            inverse_projection: frame.projection.inverse().to_cols_array_2d(),
            jitter: frame.jitter.to_array(),
            resolution: frame.resolution.to_array(),
            tile_origin: [region.x, region.y],
            tile_size: [region.width, region.height],
            seed: frame.seed,
            sample_index: frame.pass,
            bounces: frame.bounces,
            transmissive_bounces: frame.transmissive_bounces,
            light_count: inputs.lights.count() as u32,
            environment_intensity: inputs.environment_intensity,
            environment_rotation: inputs.environment_rotation,
            _padding: 0,
        }
    }
}
