// Re-export glam for convenience
pub use glam::*;

// Lux math types
mod aabb;
mod interval;

pub use aabb::Aabb;
pub use interval::Interval;

/// Rec. 709 luminance of a linear RGB color.
#[inline]
pub fn luminance(r: f32, g: f32, b: f32) -> f32 {
    0.212671 * r + 0.715160 * g + 0.072169 * b
}
