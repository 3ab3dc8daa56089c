//! The boundary between the renderer and a path tracing program.
//!
//! A program is whatever actually traces rays: a wgpu compute pipeline, a
//! CPU reference tracer or a test double. The renderer hands it every
//! uniform in [`ProgramInputs`], the per-sample [`FrameParams`] and the tile
//! to fill.

use std::sync::Arc;

use lux_core::{Environment, Texture};
use lux_math::{Mat4, UVec2, Vec2};
use lux_scene::{AttributeTextures, BvhTextures, DynamicScene, GeneratedScene};

use crate::error::{RenderResult, UniformResult};
use crate::target::RenderTarget;
use crate::tiles::TileRect;
use crate::uniforms::{EnvMapInfo, IesProfilesTexture, LightsInfo, MaterialsTexture, PhysicalCameraUniform, TextureArray};

/// Per-sample parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameParams {
    /// Camera to world
    pub camera_world: Mat4,
    /// Projection with the sub-pixel jitter applied
    pub projection: Mat4,
    /// Jitter in pixels
    pub jitter: Vec2,
    pub seed: u32,
    /// Completed passes before this one
    pub pass: u32,
    pub bounces: u32,
    pub transmissive_bounces: u32,
    pub resolution: UVec2,
    pub physical_camera: PhysicalCameraUniform,
}

/// Renders one region of one sample.
pub trait PathTracingProgram {
    /// Write straight-alpha radiance and opacity for every pixel of `region`.
    /// Pixels outside `region` must be left untouched.
    fn render_tile(
        &mut self,
        inputs: &ProgramInputs,
        frame: &FrameParams,
        region: TileRect,
        out: &mut RenderTarget,
    ) -> RenderResult<()>;
}

impl<F> PathTracingProgram for F
where
    F: FnMut(&ProgramInputs, &FrameParams, TileRect, &mut RenderTarget) -> RenderResult<()>,
{
    fn render_tile(
        &mut self,
        inputs: &ProgramInputs,
        frame: &FrameParams,
        region: TileRect,
        out: &mut RenderTarget,
    ) -> RenderResult<()> {
        self(inputs, frame, region, out)
    }
}

/// Every uniform a program reads.
#[derive(Debug, Clone)]
pub struct ProgramInputs {
    pub bvh: BvhTextures,
    pub attributes: AttributeTextures,
    pub materials: MaterialsTexture,
    pub textures: TextureArray,
    pub lights: LightsInfo,
    pub ies_profiles: IesProfilesTexture,
    pub env_map: EnvMapInfo,
    pub environment_intensity: f32,
    /// Rotation of the environment about +Y in radians
    pub environment_rotation: f32,
    environment: Option<Arc<Texture>>,
    versions: Option<(u64, u64)>,
}

impl Default for ProgramInputs {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramInputs {
    pub fn new() -> Self {
        Self {
            bvh: BvhTextures::new(),
            attributes: AttributeTextures::new(),
            materials: MaterialsTexture::new(),
            textures: TextureArray::new("material_textures"),
            lights: LightsInfo::new(),
            ies_profiles: IesProfilesTexture::new(),
            env_map: EnvMapInfo::new(),
            environment_intensity: 0.0,
            environment_rotation: 0.0,
            environment: None,
            versions: None,
        }
    }

    /// Upload everything from a freshly generated scene.
    pub fn update_from(&mut self, scene: &GeneratedScene, environment: Option<&Environment>) -> UniformResult<()> {
        self.bvh.update_from(&scene.bvh, &scene.geometry.indices);
        self.attributes.update_from(&scene.geometry);
        self.materials.update_from(&scene.materials, &scene.textures)?;
        self.textures.update_from(&scene.textures);
        self.lights.update_from(&scene.lights, scene.ies_profiles.len())?;
        self.ies_profiles.update_from(&scene.ies_profiles);
        self.update_environment(environment);
        self.versions = None;
        log::info!(
            "Program inputs: {} triangles, {} materials, {} textures, {} lights",
            scene.geometry.triangle_count(),
            scene.materials.len(),
            scene.textures.len(),
            scene.lights.len()
        );
        Ok(())
    }

    /// Upload only what changed since the last dynamic update.
    ///
    /// A new `structure_version` uploads everything; a new
    /// `geometry_version` rewrites vertex positions, node bounds and lights.
    pub fn update_from_dynamic(&mut self, scene: &DynamicScene, environment: Option<&Environment>) -> UniformResult<()> {
        let versions = (scene.structure_version, scene.geometry_version);
        match self.versions {
            Some((structure, _)) if structure == versions.0 => {
                if self.versions != Some(versions) {
                    let generated = &scene.scene;
                    self.attributes.update_positions(&generated.geometry);
                    if !self.bvh.update_bounds_only(&generated.bvh) {
                        self.bvh.update_from(&generated.bvh, &generated.geometry.indices);
                    }
                    self.lights.update_from(&generated.lights, generated.ies_profiles.len())?;
                    log::debug!("Program inputs refit to geometry version {}", versions.1);
                }
                self.update_environment(environment);
            }
            _ => self.update_from(&scene.scene, environment)?,
        }
        self.versions = Some(versions);
        Ok(())
    }

    /// Rebuild the environment sampling tables when the map changes.
    ///
    /// Without an environment a black 1x1 map is bound.
    pub fn update_environment(&mut self, environment: Option<&Environment>) {
        match environment {
            Some(environment) => {
                self.environment_intensity = environment.intensity;
                self.environment_rotation = environment.rotation;
                let unchanged = self
                    .environment
                    .as_ref()
                    .is_some_and(|current| Arc::ptr_eq(current, &environment.texture));
                if !unchanged {
                    self.env_map.update_from(&environment.texture);
                    self.environment = Some(environment.texture.clone());
                }
            }
            None => {
                self.environment_intensity = 0.0;
                self.environment_rotation = 0.0;
                if self.environment.take().is_some() || self.env_map.map.version() == 0 {
                    self.env_map.update_from(&Texture::new(1, 1, vec![[0.0, 0.0, 0.0, 1.0]], "black"));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lux_core::{Light, Material, Mesh, Node, Scene, Transform};
    use lux_math::Vec3;
    use lux_scene::{DynamicSceneEncoder, GenerateOptions, SceneEncoder};

    fn scene(offset: f32) -> Scene {
        let mesh = Arc::new(Mesh::new(
            vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::ONE],
            vec![0, 1, 2, 1, 3, 2],
            None,
        ));
        let mut scene = Scene::new("inputs");
        scene.add_root(
            Node::mesh("quad", mesh, Arc::new(Material::default()))
                .with_transform(Transform::from_translation(Vec3::new(0.0, offset, 0.0))),
        );
        scene.add_root(Node::light("sun", Light::directional(Vec3::ONE, 2.0)));
        scene
    }

    #[test]
    fn test_update_from_generated_scene() {
        let generated = SceneEncoder::new().generate(&scene(0.0), &GenerateOptions::default()).unwrap();
        let mut inputs = ProgramInputs::new();
        inputs.update_from(&generated, None).unwrap();

        assert_eq!(inputs.materials.count(), 1);
        assert_eq!(inputs.lights.count(), 1);
        assert_eq!(inputs.textures.count(), 0);
        assert_eq!(inputs.environment_intensity, 0.0);
        assert_eq!(inputs.env_map.map.width(), 1);
    }

    #[test]
    fn test_dynamic_updates_follow_versions() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut encoder = DynamicSceneEncoder::new(GenerateOptions::default());
        let mut inputs = ProgramInputs::new();

        inputs.update_from_dynamic(encoder.generate(&scene(0.0)).unwrap(), None).unwrap();
        let materials = inputs.materials.texture.version();
        let position = inputs.attributes.position.version();
        let bounds = inputs.bvh.bounds.version();

        // Same versions: nothing is rewritten
        let current = encoder.current().unwrap().clone();
        inputs.update_from_dynamic(&current, None).unwrap();
        assert_eq!(inputs.attributes.position.version(), position);

        // Refit: positions and bounds change, materials do not
        inputs.update_from_dynamic(encoder.generate(&scene(1.0)).unwrap(), None).unwrap();
        assert!(inputs.attributes.position.version() > position);
        assert!(inputs.bvh.bounds.version() > bounds);
        assert_eq!(inputs.materials.texture.version(), materials);
        assert_eq!(inputs.attributes.position.texel_f32(0, 0, 0)[1], 1.0);

        // Rebuild: everything is rewritten
        encoder.reset();
        inputs.update_from_dynamic(encoder.generate(&scene(1.0)).unwrap(), None).unwrap();
        assert!(inputs.materials.texture.version() > materials);
    }

    #[test]
    fn test_refit_rewrites_tangents() {
        let mesh = Arc::new(
            Mesh::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y], vec![0, 1, 2], None)
                .with_tangents(vec![lux_math::Vec4::new(1.0, 0.0, 0.0, 1.0); 3]),
        );
        let rotated = |angle: f32| {
            let mut scene = Scene::new("tangents");
            scene.add_root(
                Node::mesh("tri", mesh.clone(), Arc::new(Material::default()))
                    .with_transform(Transform::from_matrix(lux_math::Mat4::from_rotation_z(angle))),
            );
            scene
        };
        let mut encoder = DynamicSceneEncoder::new(GenerateOptions::default());
        let mut inputs = ProgramInputs::new();
        inputs.update_from_dynamic(encoder.generate(&rotated(0.0)).unwrap(), None).unwrap();
        assert_eq!(&inputs.attributes.tangent.texel_f32(0, 0, 0)[..], &[1.0, 0.0, 0.0, 1.0]);

        let refit = encoder.generate(&rotated(std::f32::consts::FRAC_PI_2)).unwrap();
        inputs.update_from_dynamic(refit, None).unwrap();

        let geometry = &encoder.current().unwrap().scene.geometry;
        let texels = inputs.attributes.tangent.as_f32().unwrap();
        for (i, tangent) in geometry.tangents.iter().enumerate() {
            assert_eq!(&texels[i * 4..i * 4 + 4], &tangent.to_array());
        }
        let first = inputs.attributes.tangent.texel_f32(0, 0, 0);
        assert!(first[0].abs() < 1e-6 && (first[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_environment_tables_follow_texture_identity() {
        let texture = Arc::new(Texture::solid_color(Vec3::ONE));
        let mut environment = Environment::new(texture);
        let mut inputs = ProgramInputs::new();

        inputs.update_environment(Some(&environment));
        let version = inputs.env_map.conditional.version();
        environment.intensity = 3.0;
        inputs.update_environment(Some(&environment));
        assert_eq!(inputs.env_map.conditional.version(), version);
        assert_eq!(inputs.environment_intensity, 3.0);

        environment.texture = Arc::new(Texture::solid_color(Vec3::ONE));
        inputs.update_environment(Some(&environment));
        assert!(inputs.env_map.conditional.version() > version);
    }
}
