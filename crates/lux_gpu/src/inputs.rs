use anyhow::{Context, Result};
use bytemuck::Zeroable;
use lux_renderer::{FrameParams, ProgramInputs, TileRect};
use wgpu::util::DeviceExt;

use crate::bindings::{self, SlotKind, UniformSlot, FRAME_GROUP, GEOMETRY_GROUP, SHADING_GROUP, UNIFORM_SLOTS};
use crate::frame::FrameUniform;
use crate::upload::GpuTexture;

/// GPU copies of everything in a [`ProgramInputs`], plus the per-sample
/// uniform buffers.
pub struct GpuProgramInputs {
    textures: Vec<(&'static UniformSlot, GpuTexture)>,
    frame_buffer: wgpu::Buffer,
    camera_buffer: wgpu::Buffer,
    layouts: [wgpu::BindGroupLayout; 3],
}

impl GpuProgramInputs {
    pub fn new(device: &wgpu::Device) -> Self {
        let textures = UNIFORM_SLOTS
            .iter()
            .filter_map(|slot| {
                let texture = GpuTexture::new(slot.name);
                match slot.kind {
                    SlotKind::FloatTexture | SlotKind::UintTexture => Some((slot, texture)),
                    SlotKind::FloatTextureArray => Some((slot, texture.as_array())),
                    SlotKind::Uniform | SlotKind::OutputTexture => None,
                }
            })
            .collect();

        let frame_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Frame Uniform Buffer"),
            contents: bytemuck::bytes_of(&FrameUniform::zeroed()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Physical Camera Uniform Buffer"),
            contents: lux_renderer::uniforms::PhysicalCameraUniform::default().as_bytes(),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let layout = |group: u32, label: &str| {
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(label),
                entries: &bindings::layout_entries(group),
            })
        };
        let layouts = [
            layout(GEOMETRY_GROUP, "Geometry Bind Group Layout"),
            layout(SHADING_GROUP, "Shading Bind Group Layout"),
            layout(FRAME_GROUP, "Frame Bind Group Layout"),
        ];

        Self {
            textures,
            frame_buffer,
            camera_buffer,
            layouts,
        }
    }

    /// Bind group layouts in group order, for building a pipeline layout.
    pub fn layouts(&self) -> [&wgpu::BindGroupLayout; 3] {
        [&self.layouts[0], &self.layouts[1], &self.layouts[2]]
    }

    /// Upload every texture whose payload changed. Returns the number of
    /// textures written.
    pub fn sync(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, inputs: &ProgramInputs) -> Result<usize> {
        let mut uploaded = 0;
        for (slot, texture) in &mut self.textures {
            let source = bindings::slot_texture(inputs, slot.name)
                .with_context(|| format!("no data texture feeds '{}'", slot.name))?;
            if texture.sync(device, queue, source)? {
                uploaded += 1;
            }
        }
        if uploaded > 0 {
            log::debug!("Uploaded {} of {} program textures", uploaded, self.textures.len());
        }
        Ok(uploaded)
    }

    /// Write the per-sample uniforms for one tile.
    pub fn write_frame(&self, queue: &wgpu::Queue, frame: &FrameParams, region: TileRect, inputs: &ProgramInputs) {
        let uniform = FrameUniform::new(frame, region, inputs);
        queue.write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(&uniform));
        queue.write_buffer(&self.camera_buffer, 0, frame.physical_camera.as_bytes());
    }

    /// Bind groups for groups 0, 1 and 2. Textures must have been synced.
    pub fn bind_groups(&self, device: &wgpu::Device, output: &wgpu::TextureView) -> Result<[wgpu::BindGroup; 3]> {
        let group = |group: u32, label: &str| -> Result<wgpu::BindGroup> {
            let mut entries = Vec::new();
            for slot in bindings::group_slots(group) {
                let resource = match slot.kind {
                    SlotKind::Uniform if slot.name == "frame" => self.frame_buffer.as_entire_binding(),
                    SlotKind::Uniform => self.camera_buffer.as_entire_binding(),
                    SlotKind::OutputTexture => wgpu::BindingResource::TextureView(output),
                    _ => wgpu::BindingResource::TextureView(self.texture_view(slot.name)?),
                };
                entries.push(wgpu::BindGroupEntry {
                    binding: slot.binding,
                    resource,
                });
            }
            Ok(device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &self.layouts[group as usize],
                entries: &entries,
            }))
        };
        Ok([
            group(GEOMETRY_GROUP, "Geometry Bind Group")?,
            group(SHADING_GROUP, "Shading Bind Group")?,
            group(FRAME_GROUP, "Frame Bind Group")?,
        ])
    }

    fn texture_view(&self, name: &str) -> Result<&wgpu::TextureView> {
        self.textures
            .iter()
            .find(|(slot, _)| slot.name == name)
            .and_then(|(_, texture)| texture.view())
            .with_context(|| format!("texture '{}' has not been uploaded", name))
    }
}
