//! Scene data packed into GPU-ready [`lux_core::DataTexture`]s.
//!
//! Each uniform owns its textures and rewrites them from an encoded scene
//! with `update_from`. Uploaders watch the texture versions.

mod camera;
mod env_map;
mod ies;
mod lights;
mod materials;
mod texture_array;

pub use camera::PhysicalCameraUniform;
pub use env_map::EnvMapInfo;
pub use ies::{IesProfilesTexture, IES_PROFILE_SIZE};
pub use lights::{LightsInfo, LIGHT_TEXELS};
pub use materials::{MaterialsTexture, MATERIAL_TEXELS};
pub use texture_array::TextureArray;
