//! Data texture layouts for the BVH and merged vertex attributes.
//!
//! Arrays are packed row-major into nearly square textures
//! (see [`square_dimensions`]) and padded with zeros.
//!
//! | texture        | format     | texels per item | contents                          |
//! |----------------|------------|-----------------|-----------------------------------|
//! | `bounds`       | RGBA32F    | 2 per node      | `min.xyz, 0` then `max.xyz, 0`    |
//! | `contents`     | RGBA32U    | 1 per node      | leaf `offset, count, LEAF_FLAG, 0` or inner `right, axis, 0, 0` |
//! | `index`        | RGBA32U    | 1 per triangle  | `i0, i1, i2, triangle` in leaf order |
//! | `position`     | RGBA32F    | 1 per vertex    | `xyz, 1`                          |
//! | `normal`       | RGBA32F    | 1 per vertex    | `xyz, 0`                          |
//! | `tangent`      | RGBA32F    | 1 per vertex    | `xyz, handedness`                 |
//! | `uv`           | RG32F      | 1 per vertex    | `uv`                              |
//! | `color`        | RGBA32F    | 1 per vertex    | `rgba`                            |
//! | `material_index` | R32U     | 1 per triangle  | material list index               |

use lux_core::{square_dimensions, DataTexture, TexelFormat};

use crate::bvh::{Bvh, BvhNodeKind};
use crate::geometry::MergedGeometry;

/// Marks a leaf in the third channel of the `contents` texture.
pub const LEAF_FLAG: u32 = 0xFFFF;

/// Pad `data` to fill a `count`-texel square texture.
fn pack<T: Copy + Default>(mut data: Vec<T>, count: usize, channels: usize) -> (u32, u32, Vec<T>) {
    let (width, height) = square_dimensions(count);
    data.resize(width as usize * height as usize * channels, T::default());
    (width, height, data)
}

fn write_f32(texture: &mut DataTexture, count: usize, data: Vec<f32>) {
    let (width, height, data) = pack(data, count, texture.format().channels());
    texture.write_f32(width, height, 1, data);
}

fn write_u32(texture: &mut DataTexture, count: usize, data: Vec<u32>) {
    let (width, height, data) = pack(data, count, texture.format().channels());
    texture.write_u32(width, height, 1, data);
}

/// Texture mirror of a [`Bvh`].
#[derive(Debug, Clone)]
pub struct BvhTextures {
    pub bounds: DataTexture,
    pub contents: DataTexture,
    pub index: DataTexture,
}

impl Default for BvhTextures {
    fn default() -> Self {
        Self::new()
    }
}

impl BvhTextures {
    pub fn new() -> Self {
        Self {
            bounds: DataTexture::new("bvh_bounds", TexelFormat::Rgba32Float),
            contents: DataTexture::new("bvh_contents", TexelFormat::Rgba32Uint),
            index: DataTexture::new("bvh_index", TexelFormat::Rgba32Uint),
        }
    }

    /// Re-encode every node and the leaf-ordered triangle indices.
    pub fn update_from(&mut self, bvh: &Bvh, indices: &[u32]) {
        let nodes = bvh.nodes();

        let mut bounds = Vec::with_capacity(nodes.len() * 8);
        let mut contents = Vec::with_capacity(nodes.len() * 4);
        for node in nodes {
            let (min, max) = (node.bounds.min(), node.bounds.max());
            bounds.extend_from_slice(&[min.x, min.y, min.z, 0.0, max.x, max.y, max.z, 0.0]);
            contents.extend_from_slice(&match node.kind {
                BvhNodeKind::Leaf { offset, count } => [offset, count, LEAF_FLAG, 0],
                BvhNodeKind::Inner { right, axis } => [right, axis as u32, 0, 0],
            });
        }
        write_f32(&mut self.bounds, nodes.len() * 2, bounds);
        write_u32(&mut self.contents, nodes.len(), contents);

        let primitives = bvh.primitives();
        let mut index = Vec::with_capacity(primitives.len() * 4);
        for &triangle in primitives {
            let base = triangle as usize * 3;
            match indices.get(base..base + 3) {
                Some(tri) => index.extend_from_slice(&[tri[0], tri[1], tri[2], triangle]),
                None => index.extend_from_slice(&[0, 0, 0, triangle]),
            }
        }
        write_u32(&mut self.index, primitives.len(), index);
    }

    /// Rewrite node bounds in place after a refit.
    ///
    /// Falls back to a no-op when the node count no longer matches the
    /// texture; the caller must run a full [`BvhTextures::update_from`].
    pub fn update_bounds_only(&mut self, bvh: &Bvh) -> bool {
        let nodes = bvh.nodes();
        let Some(data) = self.bounds.f32_mut() else {
            return false;
        };
        if data.len() < nodes.len() * 8 {
            return false;
        }
        for (texels, node) in data.chunks_exact_mut(8).zip(nodes) {
            let (min, max) = (node.bounds.min(), node.bounds.max());
            texels.copy_from_slice(&[min.x, min.y, min.z, 0.0, max.x, max.y, max.z, 0.0]);
        }
        self.bounds.touch();
        true
    }
}

/// Texture mirror of [`MergedGeometry`] vertex and triangle attributes.
#[derive(Debug, Clone)]
pub struct AttributeTextures {
    pub position: DataTexture,
    pub normal: DataTexture,
    pub tangent: DataTexture,
    pub uv: DataTexture,
    pub color: DataTexture,
    pub material_index: DataTexture,
}

impl Default for AttributeTextures {
    fn default() -> Self {
        Self::new()
    }
}

impl AttributeTextures {
    pub fn new() -> Self {
        Self {
            position: DataTexture::new("attr_position", TexelFormat::Rgba32Float),
            normal: DataTexture::new("attr_normal", TexelFormat::Rgba32Float),
            tangent: DataTexture::new("attr_tangent", TexelFormat::Rgba32Float),
            uv: DataTexture::new("attr_uv", TexelFormat::Rg32Float),
            color: DataTexture::new("attr_color", TexelFormat::Rgba32Float),
            material_index: DataTexture::new("attr_material_index", TexelFormat::R32Uint),
        }
    }

    /// Re-encode every attribute.
    pub fn update_from(&mut self, geometry: &MergedGeometry) {
        self.update_positions(geometry);

        let vertex_count = geometry.vertex_count();
        let uvs = geometry.uvs.iter().flat_map(|uv| uv.to_array()).collect();
        write_f32(&mut self.uv, vertex_count, uvs);
        let colors = geometry.colors.iter().flat_map(|c| c.to_array()).collect();
        write_f32(&mut self.color, vertex_count, colors);
        write_u32(
            &mut self.material_index,
            geometry.triangle_count(),
            geometry.material_indices.clone(),
        );
    }

    /// Re-encode only the attributes a refit rewrites.
    pub fn update_positions(&mut self, geometry: &MergedGeometry) {
        let vertex_count = geometry.vertex_count();
        let positions = geometry.positions.iter().flat_map(|p| p.extend(1.0).to_array()).collect();
        write_f32(&mut self.position, vertex_count, positions);
        let normals = geometry.normals.iter().flat_map(|n| n.extend(0.0).to_array()).collect();
        write_f32(&mut self.normal, vertex_count, normals);
        let tangents = geometry.tangents.iter().flat_map(|t| t.to_array()).collect();
        write_f32(&mut self.tangent, vertex_count, tangents);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bvh::BvhOptions;
    use lux_core::Mesh;
    use lux_math::{Mat4, Vec3};

    fn merged_triangles(n: usize) -> MergedGeometry {
        let mut merged = MergedGeometry::default();
        for i in 0..n {
            let offset = Vec3::new(i as f32 * 2.0, 0.0, 0.0);
            let mesh = Mesh::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y], vec![0, 1, 2], None);
            merged.append(&mesh, Mat4::from_translation(offset), (i % 2) as u32, i);
        }
        merged
    }

    #[test]
    fn test_bvh_textures_layout() {
        let merged = merged_triangles(12);
        let options = BvhOptions {
            max_leaf_size: 2,
            ..Default::default()
        };
        let bvh = Bvh::build(&merged.positions, &merged.indices, options);
        let mut textures = BvhTextures::new();
        textures.update_from(&bvh, &merged.indices);

        let node_count = bvh.nodes().len();
        let (w, h) = (textures.contents.width(), textures.contents.height());
        assert!((w * h) as usize >= node_count);
        assert!((textures.bounds.width() * textures.bounds.height()) as usize >= node_count * 2);

        // root bounds are the first two texels
        let root = bvh.bounds();
        assert_eq!(&textures.bounds.as_f32().unwrap()[0..3], &root.min().to_array());
        assert_eq!(&textures.bounds.as_f32().unwrap()[4..7], &root.max().to_array());

        let contents = textures.contents.as_u32().unwrap();
        let leaf_triangles: u32 = contents
            .chunks_exact(4)
            .take(node_count)
            .filter(|texel| texel[2] == LEAF_FLAG)
            .map(|texel| texel[1])
            .sum();
        assert_eq!(leaf_triangles, 12);

        // index texels reference the original triangle and its vertices
        let index = textures.index.as_u32().unwrap();
        for texel in index.chunks_exact(4).take(12) {
            let triangle = texel[3] as usize;
            assert_eq!(&texel[0..3], &merged.indices[triangle * 3..triangle * 3 + 3]);
        }
    }

    #[test]
    fn test_bounds_only_update_keeps_size() {
        let mut merged = merged_triangles(8);
        let mut bvh = Bvh::build(&merged.positions, &merged.indices, BvhOptions::default());
        let mut textures = BvhTextures::new();
        textures.update_from(&bvh, &merged.indices);
        let version = textures.bounds.version();

        for p in &mut merged.positions {
            p.y += 1.0;
        }
        bvh.refit(&merged.positions, &merged.indices);
        assert!(textures.update_bounds_only(&bvh));
        assert!(textures.bounds.version() > version);
        assert_eq!(textures.bounds.as_f32().unwrap()[1], 1.0);
    }

    #[test]
    fn test_attribute_textures() {
        let merged = merged_triangles(3);
        let mut textures = AttributeTextures::new();
        textures.update_from(&merged);

        assert_eq!(textures.position.format(), TexelFormat::Rgba32Float);
        assert_eq!(textures.position.texel_f32(0, 1, 0), &[2.0, 0.0, 0.0, 1.0]);
        assert_eq!(textures.uv.texel_f32(0, 0, 0), &[0.0, 0.0]);
        assert_eq!(textures.material_index.as_u32().unwrap()[..3], [0, 1, 0]);
        assert_eq!((textures.position.width(), textures.position.height()), (3, 3));
    }
}
