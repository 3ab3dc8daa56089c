//! Merged world-space geometry.
//!
//! Every visible mesh node is baked into one set of vertex buffers in
//! traversal order. Indices are rebased onto the merged vertex array and
//! each triangle records the index of its material in the material list.

use lux_core::{mesh::smooth_normals, Mesh};
use lux_math::{Aabb, Mat3, Mat4, Vec2, Vec3, Vec4};

/// Where one source mesh landed in the merged buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryRange {
    pub vertex_start: u32,
    pub vertex_count: u32,
    pub triangle_start: u32,
    pub triangle_count: u32,
    /// Pre-order ordinal of the source node among visible mesh nodes
    pub mesh_ordinal: usize,
}

/// Concatenated world-space vertex attributes for the whole scene.
#[derive(Debug, Clone, Default)]
pub struct MergedGeometry {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub tangents: Vec<Vec4>,
    pub uvs: Vec<Vec2>,
    pub colors: Vec<Vec4>,
    pub indices: Vec<u32>,
    /// Material list index of every triangle
    pub material_indices: Vec<u32>,
    pub ranges: Vec<GeometryRange>,
    /// World bounds, computed only when requested
    pub bounds: Option<Aabb>,
}

impl MergedGeometry {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Append a validated mesh transformed by `world`.
    pub(crate) fn append(&mut self, mesh: &Mesh, world: Mat4, material_index: u32, mesh_ordinal: usize) {
        let vertex_start = self.positions.len() as u32;
        let triangle_start = self.triangle_count() as u32;
        let vertex_count = mesh.vertex_count();

        self.positions.reserve(vertex_count);
        self.normals.reserve(vertex_count);
        self.tangents.reserve(vertex_count);

        let computed;
        let normals = match &mesh.normals {
            Some(normals) => normals.as_slice(),
            None => {
                computed = smooth_normals(&mesh.positions, &mesh.indices);
                computed.as_slice()
            }
        };
        write_world_attributes(
            mesh,
            normals,
            world,
            &mut self.positions,
            &mut self.normals,
            &mut self.tangents,
        );

        match &mesh.uvs {
            Some(uvs) => self.uvs.extend_from_slice(uvs),
            None => self.uvs.resize(self.positions.len(), Vec2::ZERO),
        }
        match &mesh.colors {
            Some(colors) => self.colors.extend_from_slice(colors),
            None => self.colors.resize(self.positions.len(), Vec4::ONE),
        }

        self.indices
            .extend(mesh.indices.iter().map(|&i| i + vertex_start));
        self.material_indices
            .resize(self.material_indices.len() + mesh.triangle_count(), material_index);

        self.ranges.push(GeometryRange {
            vertex_start,
            vertex_count: vertex_count as u32,
            triangle_start,
            triangle_count: mesh.triangle_count() as u32,
            mesh_ordinal,
        });
    }

    /// Rewrite the vertices of `range` from `mesh` in place.
    ///
    /// Returns false (and leaves the range untouched) when the vertex count
    /// no longer matches.
    pub(crate) fn rewrite(&mut self, range: &GeometryRange, mesh: &Mesh, world: Mat4) -> bool {
        if mesh.vertex_count() != range.vertex_count as usize {
            return false;
        }
        let start = range.vertex_start as usize;
        let end = start + range.vertex_count as usize;

        let computed;
        let normals = match &mesh.normals {
            Some(normals) => normals.as_slice(),
            None => {
                computed = smooth_normals(&mesh.positions, &mesh.indices);
                computed.as_slice()
            }
        };

        let mut positions = Vec::with_capacity(range.vertex_count as usize);
        let mut world_normals = Vec::with_capacity(range.vertex_count as usize);
        let mut tangents = Vec::with_capacity(range.vertex_count as usize);
        write_world_attributes(mesh, normals, world, &mut positions, &mut world_normals, &mut tangents);

        self.positions[start..end].copy_from_slice(&positions);
        self.normals[start..end].copy_from_slice(&world_normals);
        self.tangents[start..end].copy_from_slice(&tangents);
        true
    }

    /// Recompute `bounds` from the current positions.
    pub(crate) fn update_bounds(&mut self) {
        self.bounds = Some(
            self.positions
                .iter()
                .fold(Aabb::EMPTY, |bounds, p| bounds.include_point(*p)),
        );
    }
}

fn write_world_attributes(
    mesh: &Mesh,
    normals: &[Vec3],
    world: Mat4,
    positions: &mut Vec<Vec3>,
    world_normals: &mut Vec<Vec3>,
    tangents: &mut Vec<Vec4>,
) {
    let linear = Mat3::from_mat4(world);
    let normal_matrix = linear.inverse().transpose();
    let handedness = if linear.determinant() < 0.0 { -1.0 } else { 1.0 };

    positions.extend(mesh.positions.iter().map(|p| world.transform_point3(*p)));
    world_normals.extend(
        normals
            .iter()
            .map(|n| (normal_matrix * *n).try_normalize().unwrap_or(Vec3::Y)),
    );
    match &mesh.tangents {
        Some(source) => tangents.extend(source.iter().map(|t| {
            let direction = (linear * t.truncate()).try_normalize().unwrap_or(Vec3::X);
            direction.extend(t.w * handedness)
        })),
        None => tangents.extend(std::iter::repeat(Vec4::new(1.0, 0.0, 0.0, 1.0)).take(mesh.vertex_count())),
    }
}
