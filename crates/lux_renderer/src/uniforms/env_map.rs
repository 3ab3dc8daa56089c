//! Importance sampling tables for an equirectangular environment map.
//!
//! `marginal` maps a uniform number to a row and `conditional` maps a
//! uniform number to a column within a row. Both store normalized texel
//! centers, so a shader loads the texel for its random number and uses the
//! value as the map coordinate.

use lux_core::{DataTexture, TexelFormat, Texture};
use lux_math::luminance;
use rayon::prelude::*;

#[derive(Debug, Clone)]
pub struct EnvMapInfo {
    /// Radiance texels
    pub map: DataTexture,
    /// 1 x H row lookup
    pub marginal: DataTexture,
    /// W x H column lookup per row
    pub conditional: DataTexture,
    total_sum: f32,
}

impl Default for EnvMapInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvMapInfo {
    pub fn new() -> Self {
        Self {
            map: DataTexture::new("env_map", TexelFormat::Rgba32Float),
            marginal: DataTexture::new("env_marginal", TexelFormat::R32Float),
            conditional: DataTexture::new("env_conditional", TexelFormat::R32Float),
            total_sum: 0.0,
        }
    }

    /// Sum of pixel luminance over the whole map.
    pub fn total_sum(&self) -> f32 {
        self.total_sum
    }

    /// Recompute every table from `texture`.
    pub fn update_from(&mut self, texture: &Texture) {
        let width = texture.width.max(1) as usize;
        let height = texture.height.max(1) as usize;

        let mut radiance: Vec<f32> = texture.pixels.iter().flatten().copied().collect();
        radiance.resize(width * height * 4, 0.0);

        let mut row_sums = vec![0.0f32; height];
        let mut conditional_cdf = vec![0.0f32; width * height];
        conditional_cdf
            .par_chunks_mut(width)
            .zip(radiance.par_chunks(width * 4))
            .zip(row_sums.par_iter_mut())
            .for_each(|((cdf, pixels), row_sum)| {
                let mut sum = 0.0;
                for (c, pixel) in cdf.iter_mut().zip(pixels.chunks_exact(4)) {
                    sum += luminance(pixel[0], pixel[1], pixel[2]).max(0.0);
                    *c = sum;
                }
                normalize_cdf(cdf, sum);
                *row_sum = sum;
            });

        let mut marginal_cdf = Vec::with_capacity(height);
        let mut total = 0.0;
        for sum in &row_sums {
            total += sum;
            marginal_cdf.push(total);
        }
        normalize_cdf(&mut marginal_cdf, total);

        let mut conditional = vec![0.0f32; width * height];
        conditional
            .par_chunks_mut(width)
            .zip(conditional_cdf.par_chunks(width))
            .for_each(|(lookup, cdf)| invert_cdf(cdf, lookup));
        let mut marginal = vec![0.0f32; height];
        invert_cdf(&marginal_cdf, &mut marginal);

        self.total_sum = total;
        self.map.write_f32(width as u32, height as u32, 1, radiance);
        self.marginal.write_f32(1, height as u32, 1, marginal);
        self.conditional.write_f32(width as u32, height as u32, 1, conditional);
        log::debug!("Environment distribution {}x{}, luminance sum {}", width, height, total);
    }
}

/// Scale a running sum to end at 1, or make it uniform when `sum` is zero.
fn normalize_cdf(cdf: &mut [f32], sum: f32) {
    let n = cdf.len() as f32;
    if sum > 0.0 {
        cdf.iter_mut().for_each(|c| *c /= sum);
    } else {
        cdf.iter_mut().enumerate().for_each(|(i, c)| *c = (i + 1) as f32 / n);
    }
}

/// Tabulate the inverse of `cdf` at `lookup.len()` evenly spaced points.
fn invert_cdf(cdf: &[f32], lookup: &mut [f32]) {
    let n = cdf.len();
    let steps = lookup.len() as f32;
    for (i, value) in lookup.iter_mut().enumerate() {
        let target = (i + 1) as f32 / steps;
        let index = cdf.partition_point(|&c| c < target).min(n - 1);
        *value = (index as f32 + 0.5) / n as f32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(width: u32, height: u32, bright: Option<(u32, u32)>) -> Texture {
        let pixels = (0..width * height)
            .map(|i| match bright {
                Some((x, y)) if i == y * width + x => [10.0, 10.0, 10.0, 1.0],
                _ => [0.0, 0.0, 0.0, 1.0],
            })
            .collect();
        Texture::new(width, height, pixels, "env")
    }

    #[test]
    fn test_black_map_is_uniform() {
        let mut info = EnvMapInfo::new();
        info.update_from(&env(8, 4, None));

        assert_eq!(info.total_sum(), 0.0);
        assert_eq!((info.conditional.width(), info.conditional.height()), (8, 4));
        assert_eq!((info.marginal.width(), info.marginal.height()), (1, 4));
        for x in 0..8 {
            assert!((info.conditional.texel_f32(x, 2, 0)[0] - (x as f32 + 0.5) / 8.0).abs() < 1e-6);
        }
        for y in 0..4 {
            assert!((info.marginal.texel_f32(0, y, 0)[0] - (y as f32 + 0.5) / 4.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_single_bright_pixel_takes_all_samples() {
        let mut info = EnvMapInfo::new();
        info.update_from(&env(8, 4, Some((5, 1))));

        assert!((info.total_sum() - 10.0).abs() < 1e-3);
        for y in 0..4 {
            assert!((info.marginal.texel_f32(0, y, 0)[0] - 1.5 / 4.0).abs() < 1e-6);
        }
        for x in 0..8 {
            assert!((info.conditional.texel_f32(x, 1, 0)[0] - 5.5 / 8.0).abs() < 1e-6);
        }
        // black rows fall back to uniform
        assert!((info.conditional.texel_f32(0, 0, 0)[0] - 0.5 / 8.0).abs() < 1e-6);
    }

    #[test]
    fn test_lookup_is_monotonic() {
        let pixels = (0..16 * 8).map(|i| [(i % 7) as f32, (i % 3) as f32, 0.5, 1.0]).collect();
        let mut info = EnvMapInfo::new();
        info.update_from(&Texture::new(16, 8, pixels, "noise"));

        let marginal = info.marginal.as_f32().unwrap();
        assert!(marginal.windows(2).all(|w| w[0] <= w[1]));
        for row in info.conditional.as_f32().unwrap().chunks(16) {
            assert!(row.windows(2).all(|w| w[0] <= w[1]));
        }
    }
}
