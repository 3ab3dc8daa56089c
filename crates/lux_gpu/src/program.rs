use anyhow::Result;
use lux_renderer::{FrameParams, PathTracingProgram, ProgramInputs, RenderError, RenderResult, RenderTarget, TileRect};

use crate::bindings;
use crate::context::GpuContext;
use crate::inputs::GpuProgramInputs;
use crate::upload;

const WORKGROUP_SIZE: u32 = 8;

/// A WGSL compute program run once per tile.
///
/// The entry point must be `main` with an 8x8 workgroup. Each dispatch
/// covers the tile, the result is read back and copied into the target.
pub struct GpuPathTracingProgram {
    context: GpuContext,
    inputs: GpuProgramInputs,
    pipeline: wgpu::ComputePipeline,
    output: Option<(wgpu::Texture, wgpu::TextureView)>,
}

impl GpuPathTracingProgram {
    pub fn new(context: GpuContext, wgsl: &str) -> Result<Self> {
        let used = bindings::validate_program(wgsl)?;
        log::info!("Compiling path tracing program ({} resources)", used.len());

        let device = &context.device;
        let inputs = GpuProgramInputs::new(device);
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Path Tracing Shader"),
            source: wgpu::ShaderSource::Wgsl(wgsl.into()),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Path Tracing Pipeline Layout"),
            bind_group_layouts: &inputs.layouts(),
            push_constant_ranges: &[],
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Path Tracing Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: "main",
            compilation_options: Default::default(),
            cache: None,
        });

        Ok(Self {
            context,
            inputs,
            pipeline,
            output: None,
        })
    }

    /// Program built from the reference shader.
    pub fn reference(context: GpuContext) -> Result<Self> {
        Self::new(context, bindings::PATH_TRACING_INPUTS_WGSL)
    }

    pub fn context(&self) -> &GpuContext {
        &self.context
    }

    fn ensure_output(&mut self, width: u32, height: u32) {
        let stale = self
            .output
            .as_ref()
            .map_or(true, |(texture, _)| texture.width() != width || texture.height() != height);
        if stale {
            let texture = self.context.device.create_texture(&wgpu::TextureDescriptor {
                label: Some("Path Tracing Output"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba32Float,
                usage: wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            });
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            self.output = Some((texture, view));
        }
    }

    fn run(&mut self, inputs: &ProgramInputs, frame: &FrameParams, region: TileRect, out: &mut RenderTarget) -> Result<()> {
        self.inputs.sync(&self.context.device, &self.context.queue, inputs)?;
        self.inputs.write_frame(&self.context.queue, frame, region, inputs);

        self.ensure_output(out.width(), out.height());
        let Some((texture, view)) = &self.output else {
            anyhow::bail!("output texture missing");
        };
        let bind_groups = self.inputs.bind_groups(&self.context.device, view)?;

        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Path Tracing Encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Path Tracing Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            for (index, group) in bind_groups.iter().enumerate() {
                pass.set_bind_group(index as u32, group, &[]);
            }
            pass.dispatch_workgroups(
                region.width.div_ceil(WORKGROUP_SIZE),
                region.height.div_ceil(WORKGROUP_SIZE),
                1,
            );
        }
        self.context.queue.submit(Some(encoder.finish()));

        let pixels = upload::read_rgba32f_region(&self.context.device, &self.context.queue, texture, region)?;
        for (row, source) in out.rows_mut(region).zip(pixels.chunks_exact(region.width as usize)) {
            row.copy_from_slice(&source[..row.len()]);
        }
        Ok(())
    }
}

impl PathTracingProgram for GpuPathTracingProgram {
    fn render_tile(
        &mut self,
        inputs: &ProgramInputs,
        frame: &FrameParams,
        region: TileRect,
        out: &mut RenderTarget,
    ) -> RenderResult<()> {
        if region.is_empty() {
            return Ok(());
        }
        self.run(inputs, frame, region, out)
            .map_err(|e| RenderError::Program(format!("{e:#}")))
    }
}
