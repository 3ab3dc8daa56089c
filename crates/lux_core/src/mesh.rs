//! Mesh geometry representation for the Lux scene graph.
//!
//! Meshes are indexed triangle lists in object space. Only positions and
//! indices are required; the encoder fills every other attribute with a
//! default when it is absent.

use lux_math::{Aabb, Vec2, Vec3, Vec4};
use thiserror::Error;

/// Reasons a mesh cannot be encoded.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeshError {
    #[error("mesh has no vertex positions")]
    NoPositions,

    #[error("index count {0} is not a multiple of 3")]
    PartialTriangle(usize),

    #[error("index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange { index: u32, vertex_count: usize },

    #[error("{attribute} has {len} entries but the mesh has {vertex_count} vertices")]
    AttributeLength {
        attribute: &'static str,
        len: usize,
        vertex_count: usize,
    },
}

/// A mesh consisting of vertex positions, optional attributes, and triangle indices.
#[derive(Clone, Debug, Default)]
pub struct Mesh {
    /// Vertex positions (one Vec3 per vertex)
    pub positions: Vec<Vec3>,

    /// Vertex normals (optional - computed by the encoder if absent)
    pub normals: Option<Vec<Vec3>>,

    /// Tangents with handedness in `w` (optional)
    pub tangents: Option<Vec<Vec4>>,

    /// UV coordinates (optional)
    pub uvs: Option<Vec<Vec2>>,

    /// Vertex colors, RGBA (optional)
    pub colors: Option<Vec<Vec4>>,

    /// Triangle indices (every 3 indices form a triangle)
    pub indices: Vec<u32>,

    /// Axis-aligned bounding box
    pub bounds: Aabb,
}

impl Mesh {
    /// A mesh from positions, triangle indices and optional vertex normals.
    ///
    /// Missing normals are left as `None`; the scene encoder fills them with
    /// smooth normals when merging. Nothing is validated here, see
    /// [`Mesh::validate`].
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>, normals: Option<Vec<Vec3>>) -> Self {
        let bounds = Self::compute_bounds(&positions);
        Self {
            positions,
            normals,
            indices,
            bounds,
            ..Default::default()
        }
    }

    /// Attach UV coordinates.
    pub fn with_uvs(mut self, uvs: Vec<Vec2>) -> Self {
        self.uvs = Some(uvs);
        self
    }

    /// Attach vertex colors.
    pub fn with_colors(mut self, colors: Vec<Vec4>) -> Self {
        self.colors = Some(colors);
        self
    }

    /// Attach tangents.
    pub fn with_tangents(mut self, tangents: Vec<Vec4>) -> Self {
        self.tangents = Some(tangents);
        self
    }

    /// Replace vertex positions in place (skinning, morphing) and refresh bounds.
    ///
    /// The vertex count must stay the same for the mesh to remain refittable.
    pub fn set_positions(&mut self, positions: Vec<Vec3>) {
        self.bounds = Self::compute_bounds(&positions);
        self.positions = positions;
    }

    /// Compute axis-aligned bounding box from positions.
    fn compute_bounds(positions: &[Vec3]) -> Aabb {
        positions
            .iter()
            .fold(Aabb::EMPTY, |bounds, p| bounds.include_point(*p))
    }

    /// Check that the mesh can be encoded.
    ///
    /// Every optional attribute that is present must have one entry per vertex.
    pub fn validate(&self) -> Result<(), MeshError> {
        let vertex_count = self.positions.len();
        if vertex_count == 0 {
            return Err(MeshError::NoPositions);
        }
        if self.indices.len() % 3 != 0 {
            return Err(MeshError::PartialTriangle(self.indices.len()));
        }
        if let Some(&index) = self.indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(MeshError::IndexOutOfRange { index, vertex_count });
        }

        let lengths = [
            ("normals", self.normals.as_ref().map(Vec::len)),
            ("tangents", self.tangents.as_ref().map(Vec::len)),
            ("uvs", self.uvs.as_ref().map(Vec::len)),
            ("colors", self.colors.as_ref().map(Vec::len)),
        ];
        for (attribute, len) in lengths {
            if let Some(len) = len.filter(|&len| len != vertex_count) {
                return Err(MeshError::AttributeLength {
                    attribute,
                    len,
                    vertex_count,
                });
            }
        }
        Ok(())
    }

    /// Compute smooth vertex normals by averaging face normals.
    ///
    /// Faces are counter-clockwise. Each vertex normal is the normalized
    /// area-weighted average of the faces sharing it.
    pub fn compute_normals(&mut self) {
        self.normals = Some(smooth_normals(&self.positions, &self.indices));
    }

    /// Check if the mesh has normals.
    pub fn has_normals(&self) -> bool {
        self.normals.is_some()
    }

    /// Get the number of triangles in the mesh.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Get the number of vertices in the mesh.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}

/// Area-weighted smooth normals for a counter-clockwise triangle list.
///
/// Out-of-range faces are ignored; vertices touched by no face get +Y.
pub fn smooth_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let vertex_count = positions.len();
    let mut normals = vec![Vec3::ZERO; vertex_count];

    for face in indices.chunks_exact(3) {
        let [i0, i1, i2] = [face[0] as usize, face[1] as usize, face[2] as usize];
        if i0 >= vertex_count || i1 >= vertex_count || i2 >= vertex_count {
            continue;
        }

        let edge1 = positions[i1] - positions[i0];
        let edge2 = positions[i2] - positions[i0];
        let face_normal = edge1.cross(edge2);

        normals[i0] += face_normal;
        normals[i1] += face_normal;
        normals[i2] += face_normal;
    }

    for normal in &mut normals {
        *normal = normal.try_normalize().unwrap_or(Vec3::Y);
    }
    normals
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Mesh {
        let positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        Mesh::new(positions, vec![0, 1, 2], None)
    }

    #[test]
    fn test_mesh_creation() {
        let mesh = triangle();

        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.triangle_count(), 1);
        assert!(!mesh.has_normals());
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_compute_normals() {
        let mut mesh = triangle();
        mesh.compute_normals();

        // CCW triangle in the XY plane faces +Z
        for normal in mesh.normals.as_ref().unwrap() {
            assert!((normal.z - 1.0).abs() < 0.001);
        }
    }

    #[test]
    fn test_bounds_computation() {
        let positions = vec![
            Vec3::new(-1.0, -2.0, -3.0),
            Vec3::new(4.0, 5.0, 6.0),
            Vec3::new(0.0, 0.0, 0.0),
        ];
        let mut mesh = Mesh::new(positions, vec![0, 1, 2], None);

        assert_eq!(mesh.bounds.min(), Vec3::new(-1.0, -2.0, -3.0));
        assert_eq!(mesh.bounds.max(), Vec3::new(4.0, 5.0, 6.0));

        mesh.set_positions(vec![Vec3::ZERO, Vec3::ONE, Vec3::X]);
        assert_eq!(mesh.bounds.max(), Vec3::ONE);
    }

    #[test]
    fn test_validate_rejects_malformed() {
        let mut mesh = triangle();
        mesh.indices = vec![0, 1];
        assert_eq!(mesh.validate(), Err(MeshError::PartialTriangle(2)));

        let mut mesh = triangle();
        mesh.indices = vec![0, 1, 7];
        assert!(matches!(
            mesh.validate(),
            Err(MeshError::IndexOutOfRange { index: 7, .. })
        ));

        let mesh = triangle().with_uvs(vec![Vec2::ZERO]);
        assert!(matches!(
            mesh.validate(),
            Err(MeshError::AttributeLength { attribute: "uvs", .. })
        ));

        assert_eq!(Mesh::default().validate(), Err(MeshError::NoPositions));
    }
}
