use std::sync::atomic::{AtomicU64, Ordering};

use image::Rgba32FImage;

use crate::tiles::TileRect;

static NEXT_TARGET_ID: AtomicU64 = AtomicU64::new(1);

/// An RGBA32F pixel buffer, rows top to bottom.
///
/// Every target gets a unique [`RenderTarget::id`], so consumers can tell a
/// swapped buffer from one that was updated in place.
#[derive(Debug)]
pub struct RenderTarget {
    id: u64,
    width: u32,
    height: u32,
    pixels: Vec<[f32; 4]>,
}

impl RenderTarget {
    /// A zeroed target.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            id: NEXT_TARGET_ID.fetch_add(1, Ordering::Relaxed),
            width,
            height,
            pixels: vec![[0.0; 4]; width as usize * height as usize],
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[[f32; 4]] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [[f32; 4]] {
        &mut self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> [f32; 4] {
        self.pixels[self.index(x, y)]
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, value: [f32; 4]) {
        let index = self.index(x, y);
        self.pixels[index] = value;
    }

    /// Set every pixel of `region` to `value`.
    pub fn fill(&mut self, region: TileRect, value: [f32; 4]) {
        for row in self.rows_mut(region) {
            row.fill(value);
        }
    }

    /// Mutable pixel rows of `region`, clipped to the target.
    pub fn rows_mut(&mut self, region: TileRect) -> impl Iterator<Item = &mut [[f32; 4]]> {
        let (x0, x1) = clip(region.x, region.width, self.width);
        let (y0, y1) = clip(region.y, region.height, self.height);
        let width = self.width.max(1) as usize;
        self.pixels
            .chunks_exact_mut(width)
            .skip(y0 as usize)
            .take((y1 - y0) as usize)
            .map(move |row| &mut row[x0 as usize..x1 as usize])
    }

    /// Copy into an `image` buffer for saving or inspection.
    pub fn to_image(&self) -> Rgba32FImage {
        let data = self.pixels.iter().flatten().copied().collect();
        // Length always matches the dimensions
        Rgba32FImage::from_raw(self.width, self.height, data).unwrap_or_default()
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

fn clip(start: u32, extent: u32, limit: u32) -> (u32, u32) {
    let start = start.min(limit);
    (start, start.saturating_add(extent).min(limit))
}

/// Running mean of straight colors over `region`: `acc = (1-w)·acc + w·sample`.
pub fn blend_region(accumulation: &mut RenderTarget, sample: &RenderTarget, region: TileRect, weight: f32) {
    let width = sample.width as usize;
    for (y, row) in (region.y as usize..).zip(accumulation.rows_mut(region)) {
        let start = y * width + region.x as usize;
        for (acc, new) in row.iter_mut().zip(&sample.pixels[start..]) {
            for c in 0..4 {
                acc[c] += (new[c] - acc[c]) * weight;
            }
        }
    }
}

/// Running mean with premultiplied alpha, written to `out`.
///
/// `sample` holds straight alpha; the stored color is
/// `(1-w)·acc.rgb + w·new.rgb·new.a` and alpha `(1-w)·acc.a + w·new.a`.
pub fn blend_premultiplied(accumulation: &RenderTarget, sample: &RenderTarget, out: &mut RenderTarget, weight: f32) {
    for ((dst, acc), new) in out.pixels.iter_mut().zip(&accumulation.pixels).zip(&sample.pixels) {
        let keep = 1.0 - weight;
        let a = new[3];
        *dst = [
            keep * acc[0] + weight * new[0] * a,
            keep * acc[1] + weight * new[1] * a,
            keep * acc[2] + weight * new[2] * a,
            keep * acc[3] + weight * a,
        ];
    }
}
