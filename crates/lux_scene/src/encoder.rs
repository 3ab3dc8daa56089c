//! Full scene encode: flatten, deduplicate, merge, build.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use lux_core::{Light, LightKind, Material, NodeKind, Scene, Texture};
use lux_math::{Mat4, Vec3};

use crate::bvh::{Bvh, BvhOptions};
use crate::error::{EncodeError, EncodeIssue, EncodeResult};
use crate::geometry::MergedGeometry;
use crate::progress::{Progress, ProgressFn};

/// Share of total progress spent walking the graph and merging geometry.
const WALK_END: f32 = 0.1;
const MERGE_END: f32 = 0.3;

/// Highest triangle count whose vertex indices still fit in `u32`.
const MAX_TRIANGLES: usize = (u32::MAX / 3) as usize;

/// Options for [`SceneEncoder::generate`].
#[derive(Clone, Default)]
pub struct GenerateOptions {
    pub bvh: BvhOptions,
    pub on_progress: Option<ProgressFn>,
}

impl GenerateOptions {
    pub fn with_bvh(mut self, bvh: BvhOptions) -> Self {
        self.bvh = bvh;
        self
    }

    pub fn with_progress(mut self, on_progress: impl Fn(f32) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(on_progress));
        self
    }
}

impl std::fmt::Debug for GenerateOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerateOptions")
            .field("bvh", &self.bvh)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

/// A light resolved into world space.
#[derive(Clone, Debug)]
pub struct LightRecord {
    pub light: Light,
    pub position: Vec3,
    /// Emission direction (the node's world -Z), normalized
    pub direction: Vec3,
    /// World half-extent along the light's width (area lights, else zero)
    pub u: Vec3,
    /// World half-extent along the light's height (area lights, else zero)
    pub v: Vec3,
    /// Index into [`GeneratedScene::ies_profiles`]
    pub ies: Option<usize>,
}

impl LightRecord {
    pub fn new(light: Light, world: Mat4, ies: Option<usize>) -> Self {
        let mut record = Self {
            light,
            position: Vec3::ZERO,
            direction: Vec3::NEG_Z,
            u: Vec3::ZERO,
            v: Vec3::ZERO,
            ies,
        };
        record.set_world(world);
        record
    }

    /// Re-derive position, direction and extents from a world transform.
    pub fn set_world(&mut self, world: Mat4) {
        self.position = world.transform_point3(Vec3::ZERO);
        self.direction = world.transform_vector3(Vec3::NEG_Z).normalize_or_zero();
        if let LightKind::RectArea { width, height, .. } = self.light.kind {
            self.u = world.transform_vector3(Vec3::X * (0.5 * width));
            self.v = world.transform_vector3(Vec3::Y * (0.5 * height));
        }
    }
}

/// Everything a path tracing program needs from a scene.
#[derive(Clone, Debug)]
pub struct GeneratedScene {
    pub geometry: MergedGeometry,
    pub bvh: Bvh,
    /// Unique materials in discovery order
    pub materials: Vec<Arc<Material>>,
    /// Unique textures referenced by `materials`, in material then slot order
    pub textures: Vec<Arc<Texture>>,
    pub lights: Vec<LightRecord>,
    /// Unique IES profiles referenced by spot lights
    pub ies_profiles: Vec<Arc<Texture>>,
    /// Mesh nodes that were skipped
    pub issues: Vec<EncodeIssue>,
}

impl GeneratedScene {
    /// Index of `texture` in the texture list.
    pub fn texture_index(&self, texture: &Arc<Texture>) -> Option<usize> {
        self.textures.iter().position(|t| Arc::ptr_eq(t, texture))
    }
}

/// Flattens a scene graph into merged geometry, a BVH and deduplicated
/// material, texture and light lists.
#[derive(Debug, Default, Clone, Copy)]
pub struct SceneEncoder;

impl SceneEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Encode `scene`.
    ///
    /// Malformed mesh nodes are skipped and listed in
    /// [`GeneratedScene::issues`]; everything else is still encoded.
    pub fn generate(&self, scene: &Scene, options: &GenerateOptions) -> EncodeResult<GeneratedScene> {
        generate_with_cancel(scene, options, &AtomicBool::new(false))
    }
}

/// Identity-keyed append-only list.
struct Interner<T> {
    items: Vec<Arc<T>>,
    lookup: HashMap<*const T, usize>,
}

impl<T> Interner<T> {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            lookup: HashMap::new(),
        }
    }

    fn intern(&mut self, item: &Arc<T>) -> usize {
        *self.lookup.entry(Arc::as_ptr(item)).or_insert_with(|| {
            self.items.push(item.clone());
            self.items.len() - 1
        })
    }
}

pub(crate) fn generate_with_cancel(
    scene: &Scene,
    options: &GenerateOptions,
    cancel: &AtomicBool,
) -> EncodeResult<GeneratedScene> {
    let mut progress = Progress::new(options.on_progress.as_deref());
    let visits = scene.walk();

    let mut materials = Interner::<Material>::new();
    let mut ies_profiles = Interner::<Texture>::new();
    let mut lights = Vec::new();
    let mut issues = Vec::new();
    // (visit index, material index, mesh ordinal)
    let mut meshes = Vec::new();
    let mut triangle_count = 0usize;
    let mut mesh_ordinal = 0usize;

    progress.enter(0.0, WALK_END);
    for (i, visit) in visits.iter().enumerate() {
        if cancel.load(Ordering::Relaxed) {
            return Err(EncodeError::Cancelled);
        }
        match &visit.node.kind {
            NodeKind::Mesh(instance) => {
                let ordinal = mesh_ordinal;
                mesh_ordinal += 1;
                match instance.mesh.validate() {
                    Err(error) => {
                        let issue = EncodeIssue {
                            node: visit.node.name.clone(),
                            mesh_ordinal: ordinal,
                            error,
                        };
                        log::warn!("Skipping {}", issue);
                        issues.push(issue);
                    }
                    Ok(()) if instance.mesh.triangle_count() == 0 => {}
                    Ok(()) => {
                        let material_index = materials.intern(&instance.material) as u32;
                        triangle_count += instance.mesh.triangle_count();
                        meshes.push((i, material_index, ordinal));
                    }
                }
            }
            NodeKind::Light(light) => {
                let ies = light.ies().map(|profile| ies_profiles.intern(profile));
                lights.push(LightRecord::new(light.clone(), visit.world, ies));
            }
            NodeKind::Group => {}
        }
        progress.report((i + 1) as f32 / visits.len() as f32);
    }

    if triangle_count > MAX_TRIANGLES {
        return Err(EncodeError::TooManyTriangles {
            count: triangle_count,
            max: MAX_TRIANGLES,
        });
    }

    let mut textures = Interner::<Texture>::new();
    for material in &materials.items {
        for (_, map) in material.textures() {
            textures.intern(&map.texture);
        }
    }

    progress.enter(WALK_END, MERGE_END);
    let mut geometry = MergedGeometry::default();
    for (n, &(visit_index, material_index, ordinal)) in meshes.iter().enumerate() {
        if cancel.load(Ordering::Relaxed) {
            return Err(EncodeError::Cancelled);
        }
        let visit = &visits[visit_index];
        if let Some(instance) = visit.node.mesh_instance() {
            geometry.append(&instance.mesh, visit.world, material_index, ordinal);
        }
        progress.report((n + 1) as f32 / meshes.len() as f32);
    }
    if options.bvh.set_bounding_box {
        geometry.update_bounds();
    }

    progress.enter(MERGE_END, 1.0);
    let bvh = Bvh::build_with(
        &geometry.positions,
        &geometry.indices,
        options.bvh,
        &mut progress,
        cancel,
    )?;
    progress.finish();

    log::info!(
        "Encoded scene '{}': {} triangles, {} materials, {} textures, {} lights, {} skipped",
        scene.name,
        geometry.triangle_count(),
        materials.items.len(),
        textures.items.len(),
        lights.len(),
        issues.len()
    );

    Ok(GeneratedScene {
        geometry,
        bvh,
        materials: materials.items,
        textures: textures.items,
        lights,
        ies_profiles: ies_profiles.items,
        issues,
    })
}
