//! Scene graph types for Lux.
//!
//! A scene is an ordered list of root nodes. Traversal order is depth-first
//! pre-order (a node before its children, siblings in insertion order); the
//! encoders rely on this order for deterministic material, light and
//! geometry numbering.

use std::sync::Arc;

use lux_math::{Aabb, Mat4, Quat, Vec3};

use crate::{Light, Material, Mesh, Texture};

/// Transform components that can be composed into a matrix.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    /// Translation
    pub translation: Vec3,

    /// Rotation (as quaternion)
    pub rotation: Quat,

    /// Scale
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// Create a new transform with only translation.
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Default::default()
        }
    }

    /// Create a new transform from a 4x4 matrix.
    ///
    /// Decomposes the matrix into translation, rotation, and scale.
    pub fn from_matrix(matrix: Mat4) -> Self {
        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        Self {
            translation,
            rotation,
            scale,
        }
    }

    /// Convert to a 4x4 transformation matrix.
    ///
    /// Order: Scale -> Rotate -> Translate (SRT)
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// A mesh drawn with a material.
///
/// Both are shared: the same `Arc<Material>` on two nodes is one material
/// after encoding.
#[derive(Clone, Debug)]
pub struct MeshInstance {
    pub mesh: Arc<Mesh>,
    pub material: Arc<Material>,
}

/// What a node contributes to the scene.
#[derive(Clone, Debug)]
pub enum NodeKind {
    Group,
    Mesh(MeshInstance),
    Light(Light),
}

/// A node in the scene graph.
#[derive(Clone, Debug)]
pub struct Node {
    pub name: String,
    pub transform: Transform,
    /// Invisible nodes are skipped together with their children
    pub visible: bool,
    pub kind: NodeKind,
    pub children: Vec<Node>,
}

impl Node {
    fn with_kind(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            transform: Transform::default(),
            visible: true,
            kind,
            children: Vec::new(),
        }
    }

    /// An empty grouping node.
    pub fn group(name: impl Into<String>) -> Self {
        Self::with_kind(name, NodeKind::Group)
    }

    /// A renderable mesh node.
    pub fn mesh(name: impl Into<String>, mesh: Arc<Mesh>, material: Arc<Material>) -> Self {
        Self::with_kind(name, NodeKind::Mesh(MeshInstance { mesh, material }))
    }

    /// A light node.
    pub fn light(name: impl Into<String>, light: Light) -> Self {
        Self::with_kind(name, NodeKind::Light(light))
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    /// Local transform as a matrix.
    pub fn local_matrix(&self) -> Mat4 {
        self.transform.to_matrix()
    }

    /// The mesh instance, if this is a mesh node.
    pub fn mesh_instance(&self) -> Option<&MeshInstance> {
        match &self.kind {
            NodeKind::Mesh(instance) => Some(instance),
            _ => None,
        }
    }

    fn visit<'a>(&'a self, parent: Mat4, depth: usize, out: &mut Vec<SceneVisit<'a>>) {
        if !self.visible {
            return;
        }
        let world = parent * self.local_matrix();
        out.push(SceneVisit {
            node: self,
            world,
            depth,
        });
        for child in &self.children {
            child.visit(world, depth + 1, out);
        }
    }

    fn visit_mut(&mut self, f: &mut dyn FnMut(&mut Node)) {
        f(self);
        for child in &mut self.children {
            child.visit_mut(f);
        }
    }
}

/// A node reached during traversal, with its resolved world transform.
#[derive(Clone, Copy, Debug)]
pub struct SceneVisit<'a> {
    pub node: &'a Node,
    pub world: Mat4,
    pub depth: usize,
}

/// Image-based lighting surrounding the scene.
#[derive(Clone, Debug)]
pub struct Environment {
    /// Equirectangular radiance map
    pub texture: Arc<Texture>,
    pub intensity: f32,
    /// Rotation about +Y in radians
    pub rotation: f32,
}

impl Environment {
    pub fn new(texture: Arc<Texture>) -> Self {
        Self {
            texture,
            intensity: 1.0,
            rotation: 0.0,
        }
    }
}

/// A complete scene: root nodes plus optional environment lighting.
#[derive(Clone, Debug, Default)]
pub struct Scene {
    /// Scene name (usually from filename)
    pub name: String,

    /// Root nodes in traversal order
    pub roots: Vec<Node>,

    pub environment: Option<Environment>,
}

impl Scene {
    /// Create an empty scene.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Append a root node.
    pub fn add_root(&mut self, node: Node) {
        self.roots.push(node);
    }

    /// Visible nodes in depth-first pre-order with world transforms.
    pub fn walk(&self) -> Vec<SceneVisit<'_>> {
        let mut out = Vec::new();
        for root in &self.roots {
            root.visit(Mat4::IDENTITY, 0, &mut out);
        }
        out
    }

    /// Visit every node (visible or not) mutably in pre-order.
    pub fn for_each_node_mut(&mut self, mut f: impl FnMut(&mut Node)) {
        for root in &mut self.roots {
            root.visit_mut(&mut f);
        }
    }

    /// Get total triangle count across visible mesh nodes.
    pub fn total_triangle_count(&self) -> usize {
        self.walk()
            .iter()
            .filter_map(|visit| visit.node.mesh_instance())
            .map(|instance| instance.mesh.triangle_count())
            .sum()
    }

    /// Compute the world-space bounding box of all visible meshes.
    pub fn world_bounds(&self) -> Aabb {
        let mut bounds = Aabb::EMPTY;
        for visit in self.walk() {
            let Some(instance) = visit.node.mesh_instance() else {
                continue;
            };
            for p in &instance.mesh.positions {
                bounds = bounds.include_point(visit.world.transform_point3(*p));
            }
        }
        bounds
    }
}
