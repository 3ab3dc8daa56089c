//! Lux Core - Scene graph types for progressive path tracing.
//!
//! This crate provides the renderer-agnostic scene description that the
//! encoders in `lux_scene` flatten into GPU-friendly buffers:
//!
//! - **Scene graph**: `Scene`, `Node`, `NodeKind`, `Transform`
//! - **Geometry**: `Mesh`
//! - **Shading inputs**: `Material`, `Texture`, `Light`, `Environment`
//! - **Viewing**: `Camera`, `PhysicalLens`
//! - **GPU payloads**: `DataTexture`
//!
//! # Example
//!
//! ```ignore
//! use lux_core::{Material, Mesh, Node, Scene, Transform};
//!
//! let mut scene = Scene::new("demo");
//! scene.add_root(Node::mesh("floor", mesh, Arc::new(Material::default())));
//! println!("{} triangles", scene.total_triangle_count());
//! ```

pub mod camera;
pub mod data_texture;
pub mod light;
pub mod material;
pub mod mesh;
pub mod scene;
pub mod texture;

// Re-export commonly used types
pub use camera::{Camera, PhysicalLens};
pub use data_texture::{square_dimensions, DataTexture, TexelData, TexelFormat};
pub use light::{Light, LightKind};
pub use material::{Material, Side, TextureRef, TextureSlot};
pub use mesh::{Mesh, MeshError};
pub use scene::{Environment, MeshInstance, Node, NodeKind, Scene, SceneVisit, Transform};
pub use texture::Texture;
