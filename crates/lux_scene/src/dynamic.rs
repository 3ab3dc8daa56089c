//! Build once, refit afterwards.
//!
//! The first [`DynamicSceneEncoder::generate`] runs the full encoder. Later
//! calls re-read world transforms and vertex positions, rewrite the merged
//! geometry in place and refit the BVH without touching its topology.
//! Adding or removing nodes, changing vertex counts or swapping materials
//! all require [`DynamicSceneEncoder::reset`] first.

use std::sync::atomic::AtomicBool;

use lux_core::{NodeKind, Scene};

use crate::encoder::{generate_with_cancel, GenerateOptions, GeneratedScene};
use crate::error::EncodeResult;

/// Output of a [`DynamicSceneEncoder`].
#[derive(Debug, Clone)]
pub struct DynamicScene {
    pub scene: GeneratedScene,
    /// Incremented on every full build
    pub structure_version: u64,
    /// Incremented on every build or refit
    pub geometry_version: u64,
    mesh_node_count: usize,
}

/// Scene encoder for continuously deforming scenes.
#[derive(Debug, Default)]
pub struct DynamicSceneEncoder {
    options: GenerateOptions,
    built: Option<DynamicScene>,
    structure_version: u64,
    geometry_version: u64,
}

impl DynamicSceneEncoder {
    pub fn new(options: GenerateOptions) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    /// Whether the next `generate` will refit instead of build.
    pub fn is_built(&self) -> bool {
        self.built.is_some()
    }

    /// Drop the built structure so the next `generate` rebuilds.
    pub fn reset(&mut self) {
        if self.built.take().is_some() {
            log::debug!("Dynamic scene encoder reset");
        }
    }

    /// The last generated output, if built.
    pub fn current(&self) -> Option<&DynamicScene> {
        self.built.as_ref()
    }

    /// Build on first use, refit afterwards.
    pub fn generate(&mut self, scene: &Scene) -> EncodeResult<&DynamicScene> {
        match self.built.take() {
            Some(mut built) => {
                refit(&mut built, scene, &self.options);
                self.geometry_version += 1;
                built.geometry_version = self.geometry_version;
                Ok(self.built.insert(built))
            }
            None => {
                let generated = generate_with_cancel(scene, &self.options, &AtomicBool::new(false))?;
                self.structure_version += 1;
                self.geometry_version += 1;
                let mesh_node_count = scene
                    .walk()
                    .iter()
                    .filter(|visit| matches!(visit.node.kind, NodeKind::Mesh(_)))
                    .count();
                Ok(self.built.insert(DynamicScene {
                    scene: generated,
                    structure_version: self.structure_version,
                    geometry_version: self.geometry_version,
                    mesh_node_count,
                }))
            }
        }
    }
}

fn refit(built: &mut DynamicScene, scene: &Scene, options: &GenerateOptions) {
    let visits = scene.walk();
    let mut meshes = Vec::with_capacity(built.mesh_node_count);
    let mut light_index = 0;
    for visit in &visits {
        match &visit.node.kind {
            NodeKind::Mesh(instance) => meshes.push((&instance.mesh, visit.world)),
            NodeKind::Light(_) => {
                if let Some(record) = built.scene.lights.get_mut(light_index) {
                    record.set_world(visit.world);
                }
                light_index += 1;
            }
            NodeKind::Group => {}
        }
    }

    if meshes.len() != built.mesh_node_count || light_index != built.scene.lights.len() {
        log::warn!(
            "Scene has {} mesh and {} light nodes but was built with {} and {}; untracked nodes are ignored until reset()",
            meshes.len(),
            light_index,
            built.mesh_node_count,
            built.scene.lights.len()
        );
    }

    let geometry = &mut built.scene.geometry;
    let mut stale = 0;
    for range in geometry.ranges.clone() {
        let rewritten = meshes
            .get(range.mesh_ordinal)
            .is_some_and(|&(mesh, world)| geometry.rewrite(&range, mesh, world));
        if !rewritten {
            stale += 1;
        }
    }
    if stale > 0 {
        log::warn!("{} mesh nodes were left stale during refit; call reset() after topology changes", stale);
    }

    if options.bvh.set_bounding_box {
        geometry.update_bounds();
    }
    built.scene.bvh.refit(&geometry.positions, &geometry.indices);
    log::debug!("Refit {} triangles", geometry.triangle_count());

    if let Some(on_progress) = &options.on_progress {
        on_progress(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::SceneEncoder;
    use crate::BvhOptions;
    use lux_core::{Light, Material, Mesh, Node, Transform};
    use lux_math::Vec3;
    use std::sync::Arc;

    fn grid_mesh() -> Arc<Mesh> {
        let mut positions = Vec::new();
        let mut indices = Vec::new();
        for i in 0..8u32 {
            let x = i as f32;
            positions.extend([Vec3::new(x, 0.0, 0.0), Vec3::new(x + 1.0, 0.0, 0.0), Vec3::new(x, 1.0, 0.0)]);
            indices.extend([i * 3, i * 3 + 1, i * 3 + 2]);
        }
        Arc::new(Mesh::new(positions, indices, None))
    }

    fn scene_at(offset: Vec3) -> Scene {
        let material = Arc::new(Material::default());
        let mut scene = Scene::new("dynamic");
        scene.add_root(Node::mesh("static", grid_mesh(), material.clone()));
        scene.add_root(
            Node::mesh("moving", grid_mesh(), material)
                .with_transform(Transform::from_translation(Vec3::new(0.0, 3.0, 0.0) + offset)),
        );
        scene.add_root(
            Node::light("lamp", Light::point(Vec3::ONE, 1.0)).with_transform(Transform::from_translation(offset)),
        );
        scene
    }

    fn options() -> GenerateOptions {
        GenerateOptions::default().with_bvh(BvhOptions {
            max_leaf_size: 2,
            ..Default::default()
        })
    }

    fn assert_same_bounds(a: &crate::Bvh, b: &crate::Bvh) {
        assert_eq!(a.nodes().len(), b.nodes().len());
        for (x, y) in a.nodes().iter().zip(b.nodes()) {
            assert_eq!(x.kind, y.kind);
            assert!(x.bounds.abs_diff_eq(&y.bounds, 1e-5));
        }
    }

    #[test]
    fn test_refit_without_motion_matches_rebuild() {
        let scene = scene_at(Vec3::ZERO);
        let mut encoder = DynamicSceneEncoder::new(options());
        encoder.generate(&scene).unwrap();
        let refit = encoder.generate(&scene).unwrap();

        let rebuilt = SceneEncoder::new().generate(&scene, &options()).unwrap();
        assert_same_bounds(&refit.scene.bvh, &rebuilt.bvh);
        assert_eq!(refit.scene.geometry.positions, rebuilt.geometry.positions);
    }

    #[test]
    fn test_refit_follows_motion() {
        let mut encoder = DynamicSceneEncoder::new(options());
        encoder.generate(&scene_at(Vec3::ZERO)).unwrap();

        let moved = scene_at(Vec3::new(0.0, 0.0, -2.0));
        let refit = encoder.generate(&moved).unwrap();
        assert_eq!(refit.scene.bvh.bounds().min().z, -2.0);
        assert_eq!(refit.scene.geometry.bounds.unwrap().min().z, -2.0);
        assert_eq!(refit.scene.lights[0].position, Vec3::new(0.0, 0.0, -2.0));
    }

    #[test]
    fn test_versions() {
        let scene = scene_at(Vec3::ZERO);
        let mut encoder = DynamicSceneEncoder::new(options());
        assert!(!encoder.is_built());

        let first = encoder.generate(&scene).unwrap();
        assert_eq!((first.structure_version, first.geometry_version), (1, 1));
        let second = encoder.generate(&scene).unwrap();
        assert_eq!((second.structure_version, second.geometry_version), (1, 2));

        encoder.reset();
        assert!(!encoder.is_built());
        let rebuilt = encoder.generate(&scene).unwrap();
        assert_eq!((rebuilt.structure_version, rebuilt.geometry_version), (2, 3));
    }

    #[test]
    fn test_added_node_requires_reset() {
        let mut scene = scene_at(Vec3::ZERO);
        let mut encoder = DynamicSceneEncoder::new(options());
        encoder.generate(&scene).unwrap();

        scene.add_root(Node::mesh("late", grid_mesh(), Arc::new(Material::default())));
        let refit = encoder.generate(&scene).unwrap();
        assert_ne!(refit.scene.bvh.primitive_count(), scene.total_triangle_count());

        encoder.reset();
        let rebuilt = encoder.generate(&scene).unwrap();
        assert_eq!(rebuilt.scene.bvh.primitive_count(), scene.total_triangle_count());
    }

    #[test]
    fn test_changed_vertex_count_is_left_stale() {
        let mut scene = scene_at(Vec3::ZERO);
        let mut encoder = DynamicSceneEncoder::new(options());
        let before = encoder.generate(&scene).unwrap().scene.geometry.positions.clone();

        let NodeKind::Mesh(instance) = &mut scene.roots[0].kind else {
            unreachable!()
        };
        instance.mesh = Arc::new(Mesh::new(vec![Vec3::ZERO, Vec3::Z, Vec3::Y], vec![0, 1, 2], None));
        let after = encoder.generate(&scene).unwrap();
        assert_eq!(after.scene.geometry.positions, before);
    }
}
