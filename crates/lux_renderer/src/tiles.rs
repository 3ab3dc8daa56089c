//! Tile layout and round-robin scheduling.
//!
//! The frame is split into a `columns x rows` grid. Each renderer update
//! draws one tile; a pass is complete once every tile has been drawn once.

use lux_math::UVec2;

/// Stride applied to the first tile of each pass when tiles are not stable.
///
/// Only the start moves, so every tile is still drawn exactly once per pass
/// whatever the grid size.
pub const TILE_STRIDE: usize = 7;

/// A rectangular pixel region of a render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileRect {
    /// X coordinate of the region's top-left corner
    pub x: u32,
    /// Y coordinate of the region's top-left corner
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl TileRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// The whole of a `width x height` target.
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn pixel_count(&self) -> u32 {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A `columns x rows` split of the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    pub columns: u32,
    pub rows: u32,
}

impl TileGrid {
    /// Zero dimensions are treated as one.
    pub fn new(tiles: UVec2) -> Self {
        Self {
            columns: tiles.x.max(1),
            rows: tiles.y.max(1),
        }
    }

    pub fn count(&self) -> usize {
        self.columns as usize * self.rows as usize
    }

    /// Region of tile `index` (row-major from the top-left) in a
    /// `width x height` frame. Tiles cover the frame without gaps or overlap.
    pub fn rect(&self, index: usize, width: u32, height: u32) -> TileRect {
        let column = (index % self.columns as usize) as u32;
        let row = (index / self.columns as usize) as u32;
        self.cell(column, row, width, height)
    }

    /// Region of grid cell (`column`, `row`).
    pub fn cell(&self, column: u32, row: u32, width: u32, height: u32) -> TileRect {
        let split = |extent: u32, parts: u32, i: u32| (extent as u64 * i as u64 / parts as u64) as u32;
        let x0 = split(width, self.columns, column);
        let x1 = split(width, self.columns, column + 1);
        let y0 = split(height, self.rows, row);
        let y1 = split(height, self.rows, row + 1);
        TileRect::new(x0, y0, x1 - x0, y1 - y0)
    }
}

/// Round-robin cursor over `count` tiles.
#[derive(Debug, Clone)]
pub struct TileScheduler {
    count: usize,
    stable: bool,
    pass: u32,
    done: usize,
}

impl TileScheduler {
    pub fn new(count: usize, stable: bool) -> Self {
        Self {
            count: count.max(1),
            stable,
            pass: 0,
            done: 0,
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Completed passes.
    pub fn pass(&self) -> u32 {
        self.pass
    }

    /// Tiles drawn in the current pass.
    pub fn done(&self) -> usize {
        self.done
    }

    /// Completed passes plus the fraction of the current one.
    pub fn samples(&self) -> f32 {
        self.pass as f32 + self.done as f32 / self.count as f32
    }

    /// Tile to draw next.
    pub fn current(&self) -> usize {
        let start = if self.stable {
            0
        } else {
            (self.pass as usize * TILE_STRIDE) % self.count
        };
        (start + self.done) % self.count
    }

    /// Mark the current tile drawn. Returns true when that completed a pass.
    pub fn advance(&mut self) -> bool {
        self.done += 1;
        if self.done == self.count {
            self.done = 0;
            self.pass += 1;
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.pass = 0;
        self.done = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_covers_frame() {
        let grid = TileGrid::new(UVec2::new(3, 3));
        assert_eq!(grid.count(), 9);

        let mut covered = vec![0u32; 100 * 70];
        for i in 0..grid.count() {
            let rect = grid.rect(i, 100, 70);
            for y in rect.y..rect.y + rect.height {
                for x in rect.x..rect.x + rect.width {
                    covered[(y * 100 + x) as usize] += 1;
                }
            }
        }
        assert!(covered.iter().all(|&c| c == 1));
    }

    #[test]
    fn test_zero_tiles_is_full_frame() {
        let grid = TileGrid::new(UVec2::ZERO);
        assert_eq!(grid.count(), 1);
        assert_eq!(grid.rect(0, 64, 32), TileRect::full(64, 32));
    }

    #[test]
    fn test_every_tile_once_per_pass() {
        for stable in [true, false] {
            for count in [1, 4, 7, 9, 14] {
                let mut scheduler = TileScheduler::new(count, stable);
                for pass in 0..5 {
                    let mut seen = vec![0; count];
                    for i in 0..count {
                        seen[scheduler.current()] += 1;
                        assert_eq!(scheduler.advance(), i + 1 == count);
                    }
                    assert!(seen.iter().all(|&n| n == 1), "count {count} pass {pass}");
                }
                assert_eq!(scheduler.pass(), 5);
            }
        }
    }

    #[test]
    fn test_unstable_tiles_shift_start() {
        let mut scheduler = TileScheduler::new(9, false);
        let mut starts = Vec::new();
        for _ in 0..3 {
            starts.push(scheduler.current());
            while !scheduler.advance() {}
        }
        assert_eq!(starts, vec![0, 7, 5]);
    }

    #[test]
    fn test_samples_advance_fractionally() {
        let mut scheduler = TileScheduler::new(4, true);
        scheduler.advance();
        assert_eq!(scheduler.samples(), 0.25);
        for _ in 0..3 {
            scheduler.advance();
        }
        assert_eq!(scheduler.samples(), 1.0);
        scheduler.reset();
        assert_eq!(scheduler.samples(), 0.0);
    }
}
