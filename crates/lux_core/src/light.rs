//! Light sources.
//!
//! Lights are plain data attached to scene nodes. Position and orientation
//! come from the owning node's world transform: lights emit along their
//! local -Z axis, and rect area lights span their local XY plane.

use std::sync::Arc;

use lux_math::Vec3;

use crate::Texture;

/// Shape-specific light parameters.
#[derive(Clone, Debug)]
pub enum LightKind {
    /// Infinitely distant light along the node's -Z axis.
    Directional,

    /// Omnidirectional light with an optional cutoff distance (0 = none).
    Point { distance: f32, decay: f32 },

    /// Cone light with a soft edge and optional IES profile.
    Spot {
        /// Half angle of the cone in radians
        angle: f32,
        /// Fraction of the cone that is attenuated (0..1)
        penumbra: f32,
        distance: f32,
        decay: f32,
        /// Radius of the emitting disk (0 = point emitter)
        radius: f32,
        ies: Option<Arc<Texture>>,
    },

    /// Rectangular (or elliptical) area light in the node's XY plane.
    RectArea {
        width: f32,
        height: f32,
        circular: bool,
    },
}

impl LightKind {
    /// Discriminant written to the GPU.
    pub fn code(&self) -> u32 {
        match self {
            LightKind::RectArea { circular: false, .. } => 0,
            LightKind::RectArea { circular: true, .. } => 1,
            LightKind::Spot { .. } => 2,
            LightKind::Directional => 3,
            LightKind::Point { .. } => 4,
        }
    }
}

/// A light source.
#[derive(Clone, Debug)]
pub struct Light {
    pub kind: LightKind,
    pub color: Vec3,
    pub intensity: f32,
}

impl Light {
    pub fn directional(color: Vec3, intensity: f32) -> Self {
        Self {
            kind: LightKind::Directional,
            color,
            intensity,
        }
    }

    pub fn point(color: Vec3, intensity: f32) -> Self {
        Self {
            kind: LightKind::Point {
                distance: 0.0,
                decay: 2.0,
            },
            color,
            intensity,
        }
    }

    pub fn spot(color: Vec3, intensity: f32, angle: f32, penumbra: f32) -> Self {
        Self {
            kind: LightKind::Spot {
                angle,
                penumbra,
                distance: 0.0,
                decay: 2.0,
                radius: 0.0,
                ies: None,
            },
            color,
            intensity,
        }
    }

    pub fn rect_area(color: Vec3, intensity: f32, width: f32, height: f32) -> Self {
        Self {
            kind: LightKind::RectArea {
                width,
                height,
                circular: false,
            },
            color,
            intensity,
        }
    }

    /// Attach an IES profile. Only spot lights carry profiles; other kinds
    /// are returned unchanged.
    pub fn with_ies(mut self, profile: Arc<Texture>) -> Self {
        if let LightKind::Spot { ies, .. } = &mut self.kind {
            *ies = Some(profile);
        } else {
            log::warn!("IES profiles are only supported on spot lights");
        }
        self
    }

    /// The IES profile texture, if any.
    pub fn ies(&self) -> Option<&Arc<Texture>> {
        match &self.kind {
            LightKind::Spot { ies, .. } => ies.as_ref(),
            _ => None,
        }
    }

    /// Whether two lights emit identically. IES profiles compare by identity.
    pub fn render_eq(&self, other: &Light) -> bool {
        let same_kind = match (&self.kind, &other.kind) {
            (LightKind::Directional, LightKind::Directional) => true,
            (
                LightKind::Point { distance, decay },
                LightKind::Point {
                    distance: other_distance,
                    decay: other_decay,
                },
            ) => distance == other_distance && decay == other_decay,
            (
                LightKind::Spot {
                    angle,
                    penumbra,
                    distance,
                    decay,
                    radius,
                    ies,
                },
                LightKind::Spot {
                    angle: other_angle,
                    penumbra: other_penumbra,
                    distance: other_distance,
                    decay: other_decay,
                    radius: other_radius,
                    ies: other_ies,
                },
            ) => {
                angle == other_angle
                    && penumbra == other_penumbra
                    && distance == other_distance
                    && decay == other_decay
                    && radius == other_radius
                    && match (ies, other_ies) {
                        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                        (None, None) => true,
                        _ => false,
                    }
            }
            (
                LightKind::RectArea { width, height, circular },
                LightKind::RectArea {
                    width: other_width,
                    height: other_height,
                    circular: other_circular,
                },
            ) => width == other_width && height == other_height && circular == other_circular,
            _ => false,
        };
        same_kind && self.color == other.color && self.intensity == other.intensity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let codes = [
            Light::rect_area(Vec3::ONE, 1.0, 1.0, 1.0).kind.code(),
            Light::spot(Vec3::ONE, 1.0, 0.5, 0.1).kind.code(),
            Light::directional(Vec3::ONE, 1.0).kind.code(),
            Light::point(Vec3::ONE, 1.0).kind.code(),
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_ies_only_on_spot() {
        let profile = Arc::new(Texture::solid_color(Vec3::ONE));
        let spot = Light::spot(Vec3::ONE, 1.0, 0.5, 0.0).with_ies(profile.clone());
        assert!(spot.ies().is_some());

        let point = Light::point(Vec3::ONE, 1.0).with_ies(profile);
        assert!(point.ies().is_none());
    }

    #[test]
    fn test_render_eq() {
        let profile = Arc::new(Texture::solid_color(Vec3::ONE));
        let spot = Light::spot(Vec3::ONE, 1.0, 0.5, 0.1).with_ies(profile.clone());
        assert!(spot.render_eq(&spot.clone()));

        let brighter = Light {
            intensity: 2.0,
            ..spot.clone()
        };
        assert!(!spot.render_eq(&brighter));

        let other_profile = Light::spot(Vec3::ONE, 1.0, 0.5, 0.1).with_ies(Arc::new(Texture::solid_color(Vec3::ONE)));
        assert!(!spot.render_eq(&other_profile));
        assert!(!Light::point(Vec3::ONE, 1.0).render_eq(&Light::directional(Vec3::ONE, 1.0)));
    }
}
