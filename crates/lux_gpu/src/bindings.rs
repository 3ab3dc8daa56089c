//! Static table of program resources and WGSL validation against it.

use anyhow::{anyhow, bail, Context, Result};
use lux_core::DataTexture;
use lux_renderer::ProgramInputs;

/// Resource type of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    /// `texture_2d<f32>`
    FloatTexture,
    /// `texture_2d<u32>`
    UintTexture,
    /// `texture_2d_array<f32>`
    FloatTextureArray,
    /// `var<uniform>` struct
    Uniform,
    /// `texture_storage_2d<rgba32float, write>`
    OutputTexture,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformSlot {
    pub name: &'static str,
    pub group: u32,
    pub binding: u32,
    pub kind: SlotKind,
}

const fn slot(name: &'static str, group: u32, binding: u32, kind: SlotKind) -> UniformSlot {
    UniformSlot {
        name,
        group,
        binding,
        kind,
    }
}

pub const GEOMETRY_GROUP: u32 = 0;
pub const SHADING_GROUP: u32 = 1;
pub const FRAME_GROUP: u32 = 2;

/// Every resource a path tracing program can bind.
///
/// Kept in sync with `shaders/path_tracing_inputs.wgsl`.
pub static UNIFORM_SLOTS: &[UniformSlot] = &[
    slot("bvh_bounds", GEOMETRY_GROUP, 0, SlotKind::FloatTexture),
    slot("bvh_contents", GEOMETRY_GROUP, 1, SlotKind::UintTexture),
    slot("bvh_index", GEOMETRY_GROUP, 2, SlotKind::UintTexture),
    slot("attr_position", GEOMETRY_GROUP, 3, SlotKind::FloatTexture),
    slot("attr_normal", GEOMETRY_GROUP, 4, SlotKind::FloatTexture),
    slot("attr_tangent", GEOMETRY_GROUP, 5, SlotKind::FloatTexture),
    slot("attr_uv", GEOMETRY_GROUP, 6, SlotKind::FloatTexture),
    slot("attr_color", GEOMETRY_GROUP, 7, SlotKind::FloatTexture),
    slot("attr_material_index", GEOMETRY_GROUP, 8, SlotKind::UintTexture),
    slot("materials", SHADING_GROUP, 0, SlotKind::FloatTexture),
    slot("material_textures", SHADING_GROUP, 1, SlotKind::FloatTextureArray),
    slot("lights", SHADING_GROUP, 2, SlotKind::FloatTexture),
    slot("ies_profiles", SHADING_GROUP, 3, SlotKind::FloatTextureArray),
    slot("env_map", SHADING_GROUP, 4, SlotKind::FloatTexture),
    slot("env_marginal", SHADING_GROUP, 5, SlotKind::FloatTexture),
    slot("env_conditional", SHADING_GROUP, 6, SlotKind::FloatTexture),
    slot("frame", FRAME_GROUP, 0, SlotKind::Uniform),
    slot("physical_camera", FRAME_GROUP, 1, SlotKind::Uniform),
    slot("output", FRAME_GROUP, 2, SlotKind::OutputTexture),
];

/// Reference WGSL declaring every slot.
pub const PATH_TRACING_INPUTS_WGSL: &str = include_str!("shaders/path_tracing_inputs.wgsl");

/// Look up a slot by its WGSL name.
pub fn find_slot(name: &str) -> Option<&'static UniformSlot> {
    UNIFORM_SLOTS.iter().find(|slot| slot.name == name)
}

/// Slots of one bind group, ordered by binding.
pub fn group_slots(group: u32) -> impl Iterator<Item = &'static UniformSlot> {
    UNIFORM_SLOTS.iter().filter(move |slot| slot.group == group)
}

/// The data texture in `inputs` that feeds a texture slot.
pub fn slot_texture<'a>(inputs: &'a ProgramInputs, name: &str) -> Option<&'a DataTexture> {
    Some(match name {
        "bvh_bounds" => &inputs.bvh.bounds,
        "bvh_contents" => &inputs.bvh.contents,
        "bvh_index" => &inputs.bvh.index,
        "attr_position" => &inputs.attributes.position,
        "attr_normal" => &inputs.attributes.normal,
        "attr_tangent" => &inputs.attributes.tangent,
        "attr_uv" => &inputs.attributes.uv,
        "attr_color" => &inputs.attributes.color,
        "attr_material_index" => &inputs.attributes.material_index,
        "materials" => &inputs.materials.texture,
        "material_textures" => &inputs.textures.texture,
        "lights" => &inputs.lights.texture,
        "ies_profiles" => &inputs.ies_profiles.array.texture,
        "env_map" => &inputs.env_map.map,
        "env_marginal" => &inputs.env_map.marginal,
        "env_conditional" => &inputs.env_map.conditional,
        _ => return None,
    })
}

/// Bind group layout entries for one group.
pub fn layout_entries(group: u32) -> Vec<wgpu::BindGroupLayoutEntry> {
    group_slots(group)
        .map(|slot| wgpu::BindGroupLayoutEntry {
            binding: slot.binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: binding_type(slot.kind),
            count: None,
        })
        .collect()
}

fn binding_type(kind: SlotKind) -> wgpu::BindingType {
    let texture = |sample_type, view_dimension| wgpu::BindingType::Texture {
        sample_type,
        view_dimension,
        multisampled: false,
    };
    let float = wgpu::TextureSampleType::Float { filterable: false };
    match kind {
        SlotKind::FloatTexture => texture(float, wgpu::TextureViewDimension::D2),
        SlotKind::UintTexture => texture(wgpu::TextureSampleType::Uint, wgpu::TextureViewDimension::D2),
        SlotKind::FloatTextureArray => texture(float, wgpu::TextureViewDimension::D2Array),
        SlotKind::Uniform => wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        SlotKind::OutputTexture => wgpu::BindingType::StorageTexture {
            access: wgpu::StorageTextureAccess::WriteOnly,
            format: wgpu::TextureFormat::Rgba32Float,
            view_dimension: wgpu::TextureViewDimension::D2,
        },
    }
}

/// Resource kind of a WGSL global, if it is one the table can describe.
fn global_kind(module: &naga::Module, var: &naga::GlobalVariable) -> Option<SlotKind> {
    use naga::{AddressSpace, ImageClass, ImageDimension, ScalarKind, TypeInner};

    match (var.space, &module.types[var.ty].inner) {
        (AddressSpace::Uniform, TypeInner::Struct { .. }) => Some(SlotKind::Uniform),
        (
            AddressSpace::Handle,
            TypeInner::Image {
                dim: ImageDimension::D2,
                arrayed,
                class,
            },
        ) => match (class, arrayed) {
            (ImageClass::Sampled { kind: ScalarKind::Float, multi: false }, false) => Some(SlotKind::FloatTexture),
            (ImageClass::Sampled { kind: ScalarKind::Float, multi: false }, true) => Some(SlotKind::FloatTextureArray),
            (ImageClass::Sampled { kind: ScalarKind::Uint, multi: false }, false) => Some(SlotKind::UintTexture),
            (
                ImageClass::Storage {
                    format: naga::StorageFormat::Rgba32Float,
                    ..
                },
                false,
            ) => Some(SlotKind::OutputTexture),
            _ => None,
        },
        _ => None,
    }
}

/// Parse and validate a WGSL program, then check every resource it declares
/// against [`UNIFORM_SLOTS`].
///
/// Returns the slots the program uses, in declaration order.
pub fn validate_program(wgsl: &str) -> Result<Vec<&'static UniformSlot>> {
    let module = naga::front::wgsl::parse_str(wgsl).map_err(|e| anyhow!("WGSL parse error: {}", e.emit_to_string(wgsl)))?;

    let mut validator = naga::valid::Validator::new(naga::valid::ValidationFlags::all(), naga::valid::Capabilities::all());
    validator
        .validate(&module)
        .map_err(|e| anyhow!("WGSL validation error: {e}"))?;

    let mut used = Vec::new();
    for (_, var) in module.global_variables.iter() {
        let Some(binding) = &var.binding else {
            continue;
        };
        let name = var.name.as_deref().unwrap_or("<unnamed>");
        let slot = find_slot(name).with_context(|| {
            format!("unknown resource '{}' at @group({}) @binding({})", name, binding.group, binding.binding)
        })?;

        if (slot.group, slot.binding) != (binding.group, binding.binding) {
            bail!(
                "resource '{}' is declared at @group({}) @binding({}) but belongs at @group({}) @binding({})",
                name,
                binding.group,
                binding.binding,
                slot.group,
                slot.binding
            );
        }
        match global_kind(&module, var) {
            Some(kind) if kind == slot.kind => used.push(slot),
            Some(kind) => bail!("resource '{}' is a {:?} but must be a {:?}", name, kind, slot.kind),
            None => bail!("resource '{}' has an unsupported type; expected {:?}", name, slot.kind),
        }
    }
    log::debug!("Program binds {} of {} slots", used.len(), UNIFORM_SLOTS.len());
    Ok(used)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_program_declares_every_slot() {
        let used = validate_program(PATH_TRACING_INPUTS_WGSL).unwrap();
        assert_eq!(used.len(), UNIFORM_SLOTS.len());
    }

    #[test]
    fn test_slots_are_unique() {
        for (i, a) in UNIFORM_SLOTS.iter().enumerate() {
            for b in &UNIFORM_SLOTS[i + 1..] {
                assert_ne!(a.name, b.name);
                assert_ne!((a.group, a.binding), (b.group, b.binding), "{} and {}", a.name, b.name);
            }
        }
    }

    #[test]
    fn test_texture_slots_have_sources() {
        let inputs = ProgramInputs::new();
        for slot in UNIFORM_SLOTS {
            let is_texture = matches!(
                slot.kind,
                SlotKind::FloatTexture | SlotKind::UintTexture | SlotKind::FloatTextureArray
            );
            assert_eq!(slot_texture(&inputs, slot.name).is_some(), is_texture, "{}", slot.name);
        }
    }

    #[test]
    fn test_subset_program_is_accepted() {
        let wgsl = r#"
            @group(0) @binding(0) var bvh_bounds: texture_2d<f32>;
            @group(1) @binding(3) var ies_profiles: texture_2d_array<f32>;
        "#;
        let used = validate_program(wgsl).unwrap();
        let names: Vec<_> = used.iter().map(|slot| slot.name).collect();
        assert_eq!(names, vec!["bvh_bounds", "ies_profiles"]);
    }

    #[test]
    fn test_wrong_binding_is_rejected() {
        let wgsl = "@group(0) @binding(1) var bvh_bounds: texture_2d<f32>;";
        let err = validate_program(wgsl).unwrap_err().to_string();
        assert!(err.contains("belongs at @group(0) @binding(0)"), "{err}");
    }

    #[test]
    fn test_wrong_kind_is_rejected() {
        let wgsl = "@group(0) @binding(1) var bvh_contents: texture_2d<f32>;";
        let err = validate_program(wgsl).unwrap_err().to_string();
        assert!(err.contains("FloatTexture"), "{err}");
    }

    #[test]
    fn test_unknown_resource_is_rejected() {
        let wgsl = "@group(3) @binding(0) var extra: texture_2d<f32>;";
        let err = validate_program(wgsl).unwrap_err().to_string();
        assert!(err.contains("unknown resource 'extra'"), "{err}");
    }

    #[test]
    fn test_syntax_errors_are_reported() {
        assert!(validate_program("@group(0) @binding(0) var broken").is_err());
    }

    #[test]
    fn test_layout_entries_per_group() {
        assert_eq!(layout_entries(GEOMETRY_GROUP).len(), 9);
        assert_eq!(layout_entries(SHADING_GROUP).len(), 7);
        assert_eq!(layout_entries(FRAME_GROUP).len(), 3);
    }
}
