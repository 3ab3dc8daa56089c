//! Sub-pixel jitter and per-pass seeds.
//!
//! Jitter follows the R2 low-discrepancy sequence, rotated by a random
//! offset so that different seeds produce different (but equally well
//! distributed) patterns.

use lux_math::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Plastic number, the generator of the R2 sequence.
const PLASTIC: f64 = 1.324_717_957_244_746;
const R2_A1: f64 = 1.0 / PLASTIC;
const R2_A2: f64 = 1.0 / (PLASTIC * PLASTIC);

/// Noise inputs for one accumulation pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassNoise {
    /// Sub-pixel offset in pixels, in [-0.5, 0.5)
    pub jitter: Vec2,
    /// Seed for the program's random number generator
    pub seed: u32,
}

/// Point `n` of the R2 sequence in [0, 1)^2.
pub fn r2(n: u32) -> Vec2 {
    let n = n as f64;
    Vec2::new((0.5 + R2_A1 * n).fract() as f32, (0.5 + R2_A2 * n).fract() as f32)
}

#[derive(Debug, Clone)]
pub struct JitterSequence {
    seed: u64,
    rng: StdRng,
    rotation: Vec2,
    index: u32,
}

impl JitterSequence {
    pub fn new(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let rotation = Vec2::new(rng.gen(), rng.gen());
        Self {
            seed,
            rng,
            rotation,
            index: 0,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Start over from the seed; the following passes repeat the ones
    /// produced after construction.
    pub fn restart(&mut self) {
        *self = Self::new(self.seed);
    }

    /// Keep drawing from the random stream but pick a fresh rotation.
    pub fn rerotate(&mut self) {
        self.rotation = Vec2::new(self.rng.gen(), self.rng.gen());
        self.index = 0;
    }

    pub fn next_pass(&mut self) -> PassNoise {
        let point = r2(self.index) + self.rotation;
        self.index = self.index.wrapping_add(1);
        PassNoise {
            jitter: Vec2::new(point.x.fract(), point.y.fract()) - Vec2::splat(0.5),
            seed: self.rng.gen(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_r2_is_well_spread() {
        // Every cell of a 4x4 grid is hit within the first 64 points
        let mut cells = [0; 16];
        for n in 0..64 {
            let p = r2(n);
            assert!((0.0..1.0).contains(&p.x) && (0.0..1.0).contains(&p.y));
            cells[(p.y * 4.0) as usize * 4 + (p.x * 4.0) as usize] += 1;
        }
        assert!(cells.iter().all(|&c| c > 0));
    }

    #[test]
    fn test_restart_repeats_sequence() {
        let mut sequence = JitterSequence::new(42);
        let first: Vec<_> = (0..8).map(|_| sequence.next_pass()).collect();
        sequence.restart();
        let second: Vec<_> = (0..8).map(|_| sequence.next_pass()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_rerotate_differs() {
        let mut sequence = JitterSequence::new(42);
        let first: Vec<_> = (0..8).map(|_| sequence.next_pass()).collect();
        sequence.rerotate();
        let second: Vec<_> = (0..8).map(|_| sequence.next_pass()).collect();
        assert_ne!(first, second);
        assert!(second.iter().all(|p| p.jitter.abs().max_element() <= 0.5));
    }

    #[test]
    fn test_seeds_differ() {
        let a = JitterSequence::new(1).next_pass();
        let b = JitterSequence::new(2).next_pass();
        assert_ne!(a, b);
    }
}
