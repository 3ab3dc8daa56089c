//! Merges value-equal materials so the material texture stays small.

use std::collections::HashMap;
use std::sync::Arc;

use lux_core::{Material, Node, NodeKind, Scene};

/// Outcome of [`MaterialReducer::process`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReducerReport {
    /// Distinct materials that were swapped for an equal one
    pub replaced: usize,
    /// Distinct materials left in the scene
    pub retained: usize,
}

/// Replaces every material with the first render-equal material found in
/// traversal order.
///
/// Equality follows [`Material::render_eq`]: names are ignored and textures
/// compare by identity.
#[derive(Debug, Default, Clone, Copy)]
pub struct MaterialReducer;

impl MaterialReducer {
    pub fn new() -> Self {
        Self
    }

    /// Whether two nodes render identically.
    ///
    /// Mesh nodes compare by material only. Lights compare every emission
    /// parameter and their transform; groups compare their transform.
    pub fn are_equal(&self, a: &Node, b: &Node) -> bool {
        match (&a.kind, &b.kind) {
            (NodeKind::Mesh(x), NodeKind::Mesh(y)) => {
                Arc::ptr_eq(&x.material, &y.material) || x.material.render_eq(&y.material)
            }
            (NodeKind::Light(x), NodeKind::Light(y)) => a.transform == b.transform && x.render_eq(y),
            (NodeKind::Group, NodeKind::Group) => a.transform == b.transform,
            _ => false,
        }
    }

    /// Deduplicate the materials of every mesh node, visible or not.
    pub fn process(&self, scene: &mut Scene) -> ReducerReport {
        let mut retained: Vec<Arc<Material>> = Vec::new();
        let mut resolved: HashMap<*const Material, Arc<Material>> = HashMap::new();
        let mut replaced = 0;

        scene.for_each_node_mut(|node| {
            let NodeKind::Mesh(instance) = &mut node.kind else {
                return;
            };
            let canonical = resolved
                .entry(Arc::as_ptr(&instance.material))
                .or_insert_with(|| {
                    match retained.iter().find(|m| m.render_eq(&instance.material)) {
                        Some(existing) => {
                            replaced += 1;
                            existing.clone()
                        }
                        None => {
                            retained.push(instance.material.clone());
                            instance.material.clone()
                        }
                    }
                })
                .clone();
            instance.material = canonical;
        });

        let report = ReducerReport {
            replaced,
            retained: retained.len(),
        };
        log::debug!("Material reducer: {:?}", report);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lux_core::{Light, Mesh, Texture, TextureRef, TextureSlot, Transform};
    use lux_math::Vec3;

    fn triangle() -> Arc<Mesh> {
        Arc::new(Mesh::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y], vec![0, 1, 2], None))
    }

    fn node(name: &str, material: Material) -> Node {
        Node::mesh(name, triangle(), Arc::new(material))
    }

    #[test]
    fn test_equal_materials_are_merged() {
        let texture = Arc::new(Texture::solid_color(Vec3::ONE));
        let make = |name: &str| {
            Material::new(name, Vec3::new(0.8, 0.2, 0.2)).with_map(TextureSlot::Map, TextureRef::new(texture.clone()))
        };

        let mut scene = Scene::new("reduce");
        scene.add_root(node("a", make("first")));
        scene.add_root(node("b", make("second")));
        scene.add_root(node("c", Material::new("other", Vec3::ONE)));

        let reducer = MaterialReducer::new();
        assert!(reducer.are_equal(&scene.roots[0], &scene.roots[1]));
        assert!(!reducer.are_equal(&scene.roots[0], &scene.roots[2]));

        let report = reducer.process(&mut scene);
        assert_eq!(report, ReducerReport { replaced: 1, retained: 2 });

        let a = &scene.roots[0].mesh_instance().unwrap().material;
        let b = &scene.roots[1].mesh_instance().unwrap().material;
        assert!(Arc::ptr_eq(a, b));
        assert_eq!(a.name, "first");
    }

    #[test]
    fn test_any_difference_keeps_materials_apart() {
        let base = Material::new("base", Vec3::ONE);
        let rougher = Material {
            roughness: 0.5,
            ..base.clone()
        };
        let other_texture = base
            .clone()
            .with_map(TextureSlot::Normal, TextureRef::new(Arc::new(Texture::solid_color(Vec3::Z))));
        let double_sided = Material {
            side: lux_core::Side::Double,
            ..base.clone()
        };

        let reducer = MaterialReducer::new();
        let reference = node("ref", base);
        for (name, material) in [("rough", rougher), ("tex", other_texture), ("side", double_sided)] {
            assert!(!reducer.are_equal(&reference, &node(name, material)), "{name}");
        }
    }

    #[test]
    fn test_lights_compare_by_emission_and_transform() {
        let reducer = MaterialReducer::new();
        let lamp = Node::light("lamp", Light::point(Vec3::ONE, 1.0));
        assert!(reducer.are_equal(&lamp, &Node::light("copy", Light::point(Vec3::ONE, 1.0))));

        let brighter = Node::light("lamp", Light::point(Vec3::ONE, 4.0));
        let warmer = Node::light("lamp", Light::point(Vec3::new(1.0, 0.8, 0.6), 1.0));
        let moved =
            Node::light("lamp", Light::point(Vec3::ONE, 1.0)).with_transform(Transform::from_translation(Vec3::Y));
        for other in [&brighter, &warmer, &moved] {
            assert!(!reducer.are_equal(&lamp, other));
        }
        assert!(!reducer.are_equal(&lamp, &Node::group("lamp")));
        assert!(!reducer.are_equal(&lamp, &node("mesh", Material::default())));

        // Lights never take part in material deduplication
        let mut scene = Scene::new("lights");
        scene.add_root(lamp);
        scene.add_root(brighter);
        scene.add_root(node("a", Material::default()));
        let report = reducer.process(&mut scene);
        assert_eq!(report, ReducerReport { replaced: 0, retained: 1 });
        assert!(!reducer.are_equal(&scene.roots[0], &scene.roots[1]));
    }

    #[test]
    fn test_same_texture_content_different_identity() {
        let make = || {
            Material::default().with_map(
                TextureSlot::Map,
                TextureRef::new(Arc::new(Texture::solid_color(Vec3::ONE))),
            )
        };
        let mut scene = Scene::new("identity");
        scene.add_root(node("a", make()));
        scene.add_root(node("b", make()));

        let report = MaterialReducer::new().process(&mut scene);
        assert_eq!(report, ReducerReport { replaced: 0, retained: 2 });
    }

    #[test]
    fn test_shared_material_counts_once() {
        let shared = Arc::new(Material::default());
        let mut scene = Scene::new("shared");
        let mut hidden = Node::mesh("hidden", triangle(), shared.clone());
        hidden.visible = false;
        scene.add_root(Node::mesh("a", triangle(), shared.clone()));
        scene.add_root(hidden);
        scene.add_root(Node::mesh("c", triangle(), Arc::new(Material::default())));

        let report = MaterialReducer::new().process(&mut scene);
        assert_eq!(report, ReducerReport { replaced: 1, retained: 1 });
        for root in &scene.roots {
            assert!(Arc::ptr_eq(&root.mesh_instance().unwrap().material, &shared));
        }
    }
}
