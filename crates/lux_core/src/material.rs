//! Physically based material description.
//!
//! The parameter set follows a metallic-roughness model extended with the
//! usual layered lobes (clearcoat, sheen, iridescence, transmission with
//! volumetric attenuation). Only values that influence rendering live here;
//! renderer-level overrides such as shadow casting or matte are stored by
//! the materials uniform, not on the material.

use std::sync::Arc;

use lux_math::{Mat3, Vec2, Vec3};

use crate::Texture;

/// Which faces of a surface are rendered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Side {
    #[default]
    Front,
    Back,
    Double,
}

impl Side {
    /// Numeric code written to the GPU: front = 1, back = -1, double = 0.
    pub fn code(self) -> f32 {
        match self {
            Side::Front => 1.0,
            Side::Back => -1.0,
            Side::Double => 0.0,
        }
    }
}

/// Texture slots a material can reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    Map,
    Metalness,
    Roughness,
    Normal,
    Emissive,
    Transmission,
    Alpha,
    Clearcoat,
    ClearcoatRoughness,
    ClearcoatNormal,
    SheenColor,
    SheenRoughness,
    Iridescence,
    IridescenceThickness,
    SpecularColor,
    SpecularIntensity,
}

impl TextureSlot {
    pub const COUNT: usize = 16;

    /// All slots in encoding order.
    pub const ALL: [TextureSlot; Self::COUNT] = [
        TextureSlot::Map,
        TextureSlot::Metalness,
        TextureSlot::Roughness,
        TextureSlot::Normal,
        TextureSlot::Emissive,
        TextureSlot::Transmission,
        TextureSlot::Alpha,
        TextureSlot::Clearcoat,
        TextureSlot::ClearcoatRoughness,
        TextureSlot::ClearcoatNormal,
        TextureSlot::SheenColor,
        TextureSlot::SheenRoughness,
        TextureSlot::Iridescence,
        TextureSlot::IridescenceThickness,
        TextureSlot::SpecularColor,
        TextureSlot::SpecularIntensity,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// A texture bound to a material slot together with its UV transform.
#[derive(Clone, Debug)]
pub struct TextureRef {
    pub texture: Arc<Texture>,
    pub transform: Mat3,
}

impl TextureRef {
    pub fn new(texture: Arc<Texture>) -> Self {
        Self {
            texture,
            transform: Mat3::IDENTITY,
        }
    }

    /// Build the UV transform from offset/repeat/rotation about `center`.
    pub fn with_uv_transform(mut self, offset: Vec2, repeat: Vec2, rotation: f32, center: Vec2) -> Self {
        self.transform = Mat3::from_translation(offset + center)
            * Mat3::from_angle(rotation)
            * Mat3::from_scale(repeat)
            * Mat3::from_translation(-center);
        self
    }
}

/// Textures are compared by identity; the same image loaded twice is two textures.
impl PartialEq for TextureRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.texture, &other.texture) && self.transform == other.transform
    }
}

/// A PBR material definition.
#[derive(Clone, Debug)]
pub struct Material {
    /// Material name (not used for rendering or equality)
    pub name: String,

    pub color: Vec3,
    pub metalness: f32,
    pub roughness: f32,

    pub emissive: Vec3,
    pub emissive_intensity: f32,

    pub specular_intensity: f32,
    pub specular_color: Vec3,

    pub transmission: f32,
    pub ior: f32,
    /// Volumetric attenuation distance; `f32::INFINITY` means no absorption
    pub attenuation_distance: f32,
    pub attenuation_color: Vec3,
    pub thickness: f32,

    pub clearcoat: f32,
    pub clearcoat_roughness: f32,

    pub sheen: f32,
    pub sheen_color: Vec3,
    pub sheen_roughness: f32,

    pub iridescence: f32,
    pub iridescence_ior: f32,
    pub iridescence_thickness_range: Vec2,

    pub normal_scale: Vec2,

    pub opacity: f32,
    pub alpha_test: f32,
    pub transparent: bool,
    pub side: Side,
    pub vertex_colors: bool,
    pub flat_shading: bool,

    /// Texture bindings indexed by [`TextureSlot`]
    pub maps: [Option<TextureRef>; TextureSlot::COUNT],
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            color: Vec3::ONE,
            metalness: 0.0,
            roughness: 1.0,
            emissive: Vec3::ZERO,
            emissive_intensity: 1.0,
            specular_intensity: 1.0,
            specular_color: Vec3::ONE,
            transmission: 0.0,
            ior: 1.5,
            attenuation_distance: f32::INFINITY,
            attenuation_color: Vec3::ONE,
            thickness: 0.0,
            clearcoat: 0.0,
            clearcoat_roughness: 0.0,
            sheen: 0.0,
            sheen_color: Vec3::ZERO,
            sheen_roughness: 1.0,
            iridescence: 0.0,
            iridescence_ior: 1.3,
            iridescence_thickness_range: Vec2::new(100.0, 400.0),
            normal_scale: Vec2::ONE,
            opacity: 1.0,
            alpha_test: 0.0,
            transparent: false,
            side: Side::Front,
            vertex_colors: false,
            flat_shading: false,
            maps: Default::default(),
        }
    }
}

impl Material {
    /// Create a new material with just a name and base color.
    pub fn new(name: impl Into<String>, color: Vec3) -> Self {
        Self {
            name: name.into(),
            color,
            ..Default::default()
        }
    }

    /// Bind a texture to a slot.
    pub fn with_map(mut self, slot: TextureSlot, texture: TextureRef) -> Self {
        self.maps[slot.index()] = Some(texture);
        self
    }

    /// Texture bound to `slot`, if any.
    pub fn map(&self, slot: TextureSlot) -> Option<&TextureRef> {
        self.maps[slot.index()].as_ref()
    }

    /// Bound textures in slot order.
    pub fn textures(&self) -> impl Iterator<Item = (TextureSlot, &TextureRef)> {
        TextureSlot::ALL
            .iter()
            .filter_map(move |&slot| self.map(slot).map(|t| (slot, t)))
    }

    /// Check if this material uses any textures.
    pub fn has_textures(&self) -> bool {
        self.maps.iter().any(Option::is_some)
    }

    /// Check if this material is emissive.
    pub fn is_emissive(&self) -> bool {
        (self.emissive.length_squared() > 0.0 && self.emissive_intensity > 0.0)
            || self.map(TextureSlot::Emissive).is_some()
    }

    /// Value equality over every property that affects rendering.
    ///
    /// The name is ignored; textures compare by identity.
    pub fn render_eq(&self, other: &Material) -> bool {
        self.color == other.color
            && self.metalness == other.metalness
            && self.roughness == other.roughness
            && self.emissive == other.emissive
            && self.emissive_intensity == other.emissive_intensity
            && self.specular_intensity == other.specular_intensity
            && self.specular_color == other.specular_color
            && self.transmission == other.transmission
            && self.ior == other.ior
            && self.attenuation_distance == other.attenuation_distance
            && self.attenuation_color == other.attenuation_color
            && self.thickness == other.thickness
            && self.clearcoat == other.clearcoat
            && self.clearcoat_roughness == other.clearcoat_roughness
            && self.sheen == other.sheen
            && self.sheen_color == other.sheen_color
            && self.sheen_roughness == other.sheen_roughness
            && self.iridescence == other.iridescence
            && self.iridescence_ior == other.iridescence_ior
            && self.iridescence_thickness_range == other.iridescence_thickness_range
            && self.normal_scale == other.normal_scale
            && self.opacity == other.opacity
            && self.alpha_test == other.alpha_test
            && self.transparent == other.transparent
            && self.side == other.side
            && self.vertex_colors == other.vertex_colors
            && self.flat_shading == other.flat_shading
            && self.maps == other.maps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_eq_ignores_name() {
        let a = Material::new("a", Vec3::new(0.8, 0.1, 0.1));
        let b = Material::new("b", Vec3::new(0.8, 0.1, 0.1));
        assert!(a.render_eq(&b));

        let mut c = b.clone();
        c.roughness = 0.2;
        assert!(!a.render_eq(&c));
    }

    #[test]
    fn test_textures_compare_by_identity() {
        let texture = Arc::new(Texture::solid_color(Vec3::ONE));
        let same_pixels = Arc::new(Texture::solid_color(Vec3::ONE));

        let a = Material::default().with_map(TextureSlot::Map, TextureRef::new(texture.clone()));
        let b = Material::default().with_map(TextureSlot::Map, TextureRef::new(texture));
        let c = Material::default().with_map(TextureSlot::Map, TextureRef::new(same_pixels));

        assert!(a.render_eq(&b));
        assert!(!a.render_eq(&c));
        assert!(a.has_textures());
    }

    #[test]
    fn test_textures_in_slot_order() {
        let t = Arc::new(Texture::solid_color(Vec3::ONE));
        let material = Material::default()
            .with_map(TextureSlot::Roughness, TextureRef::new(t.clone()))
            .with_map(TextureSlot::Map, TextureRef::new(t));

        let slots: Vec<_> = material.textures().map(|(slot, _)| slot).collect();
        assert_eq!(slots, vec![TextureSlot::Map, TextureSlot::Roughness]);
    }

    #[test]
    fn test_uv_transform_repeat() {
        let t = TextureRef::new(Arc::new(Texture::solid_color(Vec3::ONE)))
            .with_uv_transform(Vec2::new(0.5, 0.0), Vec2::splat(2.0), 0.0, Vec2::ZERO);
        let uv = t.transform.transform_point2(Vec2::new(0.25, 0.25));
        assert!((uv - Vec2::new(1.0, 0.5)).length() < 1e-6);
    }

    #[test]
    fn test_emissive_detection() {
        let mut material = Material::default();
        assert!(!material.is_emissive());
        material.emissive = Vec3::ONE;
        assert!(material.is_emissive());
    }
}
