//! Progressive path tracing renderer.
//!
//! Each [`PathTracingRenderer::update`] renders a single tile of a single
//! sample and folds it into a running mean, so a host can interleave
//! rendering with its own frame loop and display [`PathTracingRenderer::target`]
//! at any point.

use lux_core::Camera;
use lux_math::{Mat4, UVec2, Vec2};
use serde::{Deserialize, Serialize};

use crate::error::{RenderError, RenderResult};
use crate::program::{FrameParams, PathTracingProgram, ProgramInputs};
use crate::sequence::{JitterSequence, PassNoise};
use crate::target::{blend_premultiplied, blend_region, RenderTarget};
use crate::tiles::{TileGrid, TileRect, TileScheduler};
use crate::uniforms::PhysicalCameraUniform;

/// Renderer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    /// Tile grid; one tile is rendered per update
    pub tiles: UVec2,
    /// Replay the same jitter and seeds after every reset
    pub stable_noise: bool,
    /// Start every pass at the first tile
    pub stable_tiles: bool,
    /// Transparent background with premultiplied accumulation
    pub alpha: bool,
    pub bounces: u32,
    pub transmissive_bounces: u32,
    pub seed: u64,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            tiles: UVec2::new(3, 3),
            stable_noise: false,
            stable_tiles: true,
            alpha: false,
            bounces: 10,
            transmissive_bounces: 10,
            seed: 0,
        }
    }
}

impl RendererSettings {
    pub fn with_tiles(mut self, columns: u32, rows: u32) -> Self {
        self.tiles = UVec2::new(columns, rows);
        self
    }

    pub fn with_alpha(mut self, alpha: bool) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_stable_noise(mut self, stable_noise: bool) -> Self {
        self.stable_noise = stable_noise;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Camera and region for one scheduled tile.
#[derive(Debug, Clone, Copy)]
pub(crate) struct View {
    pub camera_world: Mat4,
    pub projection: Mat4,
    /// Pixels the projection spans, used to scale the jitter
    pub viewport: UVec2,
    pub region: TileRect,
}

/// Shared accumulation state of the flat and quilt renderers.
#[derive(Debug)]
pub(crate) struct Accumulator {
    width: u32,
    height: u32,
    settings: RendererSettings,
    scheduler: TileScheduler,
    noise: JitterSequence,
    pass_noise: Option<PassNoise>,
    scratch: RenderTarget,
    /// Alpha mode blends from `targets[front]` into the other one and swaps
    targets: [RenderTarget; 2],
    front: usize,
}

impl Accumulator {
    pub fn new(width: u32, height: u32, tile_count: usize, stable_tiles: bool, settings: RendererSettings) -> Self {
        Self {
            width,
            height,
            settings,
            scheduler: TileScheduler::new(tile_count, stable_tiles),
            noise: JitterSequence::new(settings.seed),
            pass_noise: None,
            scratch: RenderTarget::new(width, height),
            targets: [RenderTarget::new(width, height), RenderTarget::new(width, height)],
            front: 0,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn samples(&self) -> f32 {
        self.scheduler.samples()
    }

    pub fn target(&self) -> &RenderTarget {
        &self.targets[self.front]
    }

    pub fn set_size(&mut self, width: u32, height: u32) -> RenderResult<()> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidSize { width, height });
        }
        self.width = width;
        self.height = height;
        self.scratch = RenderTarget::new(width, height);
        self.targets = [RenderTarget::new(width, height), RenderTarget::new(width, height)];
        self.front = 0;
        self.reset();
        log::info!("Render targets resized to {}x{}", width, height);
        Ok(())
    }

    pub fn reset(&mut self) {
        self.scheduler.reset();
        self.pass_noise = None;
        if self.settings.stable_noise {
            self.noise.restart();
        } else {
            self.noise.rerotate();
        }
    }

    /// Render the next scheduled tile and fold it into the accumulation.
    pub fn step<P, F>(
        &mut self,
        program: &mut P,
        inputs: &ProgramInputs,
        physical_camera: PhysicalCameraUniform,
        view: F,
    ) -> RenderResult<()>
    where
        P: PathTracingProgram,
        F: FnOnce(usize, u32, u32) -> View,
    {
        let noise = *self.pass_noise.get_or_insert_with(|| self.noise.next_pass());
        let pass = self.scheduler.pass();
        let View {
            camera_world,
            projection,
            viewport,
            region,
        } = view(self.scheduler.current(), self.width, self.height);

        let frame = FrameParams {
            camera_world,
            projection: jitter_projection(projection, noise.jitter, viewport),
            jitter: noise.jitter,
            seed: noise.seed,
            pass,
            bounces: self.settings.bounces,
            transmissive_bounces: self.settings.transmissive_bounces,
            resolution: UVec2::new(self.width, self.height),
            physical_camera,
        };
        program.render_tile(inputs, &frame, region, &mut self.scratch)?;

        let weight = 1.0 / (pass as f32 + 1.0);
        if !self.settings.alpha {
            blend_region(&mut self.targets[self.front], &self.scratch, region, weight);
        }
        if self.scheduler.advance() {
            if self.settings.alpha {
                let [a, b] = &mut self.targets;
                let (from, to) = if self.front == 0 { (&*a, b) } else { (&*b, a) };
                blend_premultiplied(from, &self.scratch, to, weight);
                self.front = 1 - self.front;
            }
            self.pass_noise = None;
            log::debug!("Completed sample {}", pass + 1);
        }
        Ok(())
    }
}

/// Shift a perspective projection by `jitter` pixels.
fn jitter_projection(mut projection: Mat4, jitter: Vec2, viewport: UVec2) -> Mat4 {
    let viewport = viewport.max(UVec2::ONE).as_vec2();
    // Clip w is -z for a right-handed perspective, so the shift is negated
    projection.z_axis.x -= 2.0 * jitter.x / viewport.x;
    projection.z_axis.y -= 2.0 * jitter.y / viewport.y;
    projection
}

/// Progressive renderer drawing one tile per [`PathTracingRenderer::update`].
pub struct PathTracingRenderer<P> {
    program: P,
    settings: RendererSettings,
    physical_camera: PhysicalCameraUniform,
    accumulator: Option<Accumulator>,
}

impl<P: PathTracingProgram> PathTracingRenderer<P> {
    /// A renderer with 1x1 targets; call [`PathTracingRenderer::set_size`].
    pub fn new(program: P, settings: RendererSettings) -> Self {
        let grid = TileGrid::new(settings.tiles);
        Self {
            program,
            settings,
            physical_camera: PhysicalCameraUniform::default(),
            accumulator: Some(Accumulator::new(1, 1, grid.count(), settings.stable_tiles, settings)),
        }
    }

    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    /// Replace the settings and restart accumulation.
    pub fn set_settings(&mut self, settings: RendererSettings) {
        self.settings = settings;
        if let Some(accumulator) = &mut self.accumulator {
            let (width, height) = accumulator.size();
            let grid = TileGrid::new(settings.tiles);
            *accumulator = Accumulator::new(width, height, grid.count(), settings.stable_tiles, settings);
        }
    }

    pub fn program(&self) -> &P {
        &self.program
    }

    pub fn program_mut(&mut self) -> &mut P {
        &mut self.program
    }

    pub fn size(&self) -> Option<(u32, u32)> {
        self.accumulator.as_ref().map(Accumulator::size)
    }

    /// Resize the targets and restart accumulation.
    pub fn set_size(&mut self, width: u32, height: u32) -> RenderResult<()> {
        match &mut self.accumulator {
            Some(accumulator) => accumulator.set_size(width, height),
            None => {
                log::warn!("set_size() called on a disposed renderer");
                Ok(())
            }
        }
    }

    /// Restart accumulation at sample 0.
    pub fn reset(&mut self) {
        if let Some(accumulator) = &mut self.accumulator {
            accumulator.reset();
        }
    }

    /// Completed samples, counting partial passes by tile.
    pub fn samples(&self) -> f32 {
        self.accumulator.as_ref().map_or(0.0, Accumulator::samples)
    }

    /// The accumulated image; `None` after [`PathTracingRenderer::dispose`].
    pub fn target(&self) -> Option<&RenderTarget> {
        self.accumulator.as_ref().map(Accumulator::target)
    }

    /// Render the next tile.
    pub fn update(&mut self, camera: &Camera, inputs: &ProgramInputs) -> RenderResult<()> {
        let Some(accumulator) = &mut self.accumulator else {
            log::warn!("update() called on a disposed renderer");
            return Ok(());
        };
        self.physical_camera.update_from(camera);

        let grid = TileGrid::new(self.settings.tiles);
        let camera_world = camera.world_matrix();
        let projection = camera.projection_matrix();
        accumulator.step(&mut self.program, inputs, self.physical_camera, |tile, width, height| View {
            camera_world,
            projection,
            viewport: UVec2::new(width, height),
            region: grid.rect(tile, width, height),
        })
    }

    /// Release the targets. Safe to call more than once.
    pub fn dispose(&mut self) {
        if self.accumulator.take().is_some() {
            log::debug!("Path tracing renderer disposed");
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.accumulator.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lux_math::Vec3;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn camera() -> Camera {
        Camera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, 1.0)
    }

    /// Writes `value(pass)` into every pixel of the region.
    fn constant(value: impl Fn(u32) -> [f32; 4]) -> impl PathTracingProgram {
        move |_: &ProgramInputs, frame: &FrameParams, region: TileRect, out: &mut RenderTarget| -> RenderResult<()> {
            out.fill(region, value(frame.pass));
            Ok(())
        }
    }

    #[test]
    fn test_settings_from_json() {
        let settings: RendererSettings = serde_json::from_str(r#"{ "tiles": [2, 4], "alpha": true }"#).unwrap();
        assert_eq!(settings.tiles, UVec2::new(2, 4));
        assert!(settings.alpha);
        assert!(settings.stable_tiles);
        assert_eq!(settings.bounces, RendererSettings::default().bounces);
    }

    #[test]
    fn test_samples_increment_by_one_with_single_tile() {
        let settings = RendererSettings::default().with_tiles(1, 1);
        let mut renderer = PathTracingRenderer::new(constant(|_| [1.0; 4]), settings);
        renderer.set_size(8, 8).unwrap();

        let inputs = ProgramInputs::new();
        for i in 1..=5 {
            renderer.update(&camera(), &inputs).unwrap();
            assert_eq!(renderer.samples(), i as f32);
        }
    }

    #[test]
    fn test_tiles_advance_fractionally() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut renderer = PathTracingRenderer::new(constant(|_| [1.0; 4]), RendererSettings::default());
        renderer.set_size(9, 9).unwrap();
        let inputs = ProgramInputs::new();

        for _ in 0..3 {
            renderer.update(&camera(), &inputs).unwrap();
        }
        assert!((renderer.samples() - 1.0 / 3.0).abs() < 1e-6);
        for _ in 0..6 {
            renderer.update(&camera(), &inputs).unwrap();
        }
        assert_eq!(renderer.samples(), 1.0);
        assert!(renderer.target().unwrap().pixels().iter().all(|p| *p == [1.0; 4]));
    }

    #[test]
    fn test_accumulation_is_running_mean() {
        // Samples 0, 1, 2, ..., n-1 average to (n-1)/2
        let settings = RendererSettings::default().with_tiles(1, 1);
        let mut renderer = PathTracingRenderer::new(constant(|pass| [pass as f32, 0.0, 0.0, 1.0]), settings);
        renderer.set_size(2, 2).unwrap();
        let inputs = ProgramInputs::new();

        for _ in 0..9 {
            renderer.update(&camera(), &inputs).unwrap();
        }
        let pixel = renderer.target().unwrap().pixel(1, 1);
        assert!((pixel[0] - 4.0).abs() < 1e-4);
        assert_eq!(pixel[3], 1.0);
    }

    #[test]
    fn test_reset_restarts_accumulation() {
        let settings = RendererSettings::default().with_tiles(1, 1);
        let mut renderer = PathTracingRenderer::new(constant(|pass| [pass as f32; 4]), settings);
        renderer.set_size(2, 2).unwrap();
        let inputs = ProgramInputs::new();

        for _ in 0..4 {
            renderer.update(&camera(), &inputs).unwrap();
        }
        renderer.reset();
        assert_eq!(renderer.samples(), 0.0);
        renderer.update(&camera(), &inputs).unwrap();
        assert_eq!(renderer.target().unwrap().pixel(0, 0), [0.0; 4]);
    }

    fn record_frames(settings: RendererSettings, updates: usize, reset_after: usize) -> (Vec<FrameParams>, Vec<FrameParams>) {
        let frames = Rc::new(RefCell::new(Vec::new()));
        let program = {
            let frames = frames.clone();
            move |_: &ProgramInputs, frame: &FrameParams, _: TileRect, _: &mut RenderTarget| -> RenderResult<()> {
                frames.borrow_mut().push(*frame);
                Ok(())
            }
        };
        let mut renderer = PathTracingRenderer::new(program, settings);
        renderer.set_size(4, 4).unwrap();
        let inputs = ProgramInputs::new();

        for _ in 0..reset_after {
            renderer.update(&camera(), &inputs).unwrap();
        }
        let before = frames.borrow_mut().drain(..).collect::<Vec<_>>();
        renderer.reset();
        for _ in 0..updates {
            renderer.update(&camera(), &inputs).unwrap();
        }
        let after = frames.borrow_mut().drain(..).collect::<Vec<_>>();
        (before, after)
    }

    #[test]
    fn test_stable_noise_repeats_after_reset() {
        let settings = RendererSettings::default().with_tiles(1, 1).with_stable_noise(true).with_seed(7);
        let (before, after) = record_frames(settings, 6, 6);
        assert_eq!(before, after);

        let jitters: Vec<_> = before.iter().map(|f| f.jitter).collect();
        assert!(jitters.windows(2).all(|w| w[0] != w[1]));
        assert!(jitters.iter().all(|j| j.abs().max_element() <= 0.5));
    }

    #[test]
    fn test_unstable_noise_differs_after_reset() {
        let settings = RendererSettings::default().with_tiles(1, 1).with_seed(7);
        let (before, after) = record_frames(settings, 6, 6);
        assert_ne!(before, after);
    }

    #[test]
    fn test_jitter_is_shared_within_a_pass() {
        let settings = RendererSettings::default().with_tiles(2, 2).with_stable_noise(true);
        let (before, _) = record_frames(settings, 0, 8);
        assert_eq!(before.len(), 8);
        assert!(before[..4].iter().all(|f| f.jitter == before[0].jitter && f.pass == 0));
        assert!(before[4..].iter().all(|f| f.jitter == before[4].jitter && f.pass == 1));
        assert_ne!(before[0].seed, before[4].seed);
    }

    #[test]
    fn test_jitter_is_measured_in_pixels() {
        let settings = RendererSettings::default().with_tiles(2, 2).with_seed(11);
        let (frames, _) = record_frames(settings, 0, 8);
        let projection = camera().projection_matrix();
        let point = lux_math::Vec4::new(0.2, -0.1, -4.0, 1.0);
        let plain = projection * point;
        for frame in &frames {
            let jittered = frame.projection * point;
            // 4x4 target
            let shift_x = (jittered.x / jittered.w - plain.x / plain.w) * 2.0;
            let shift_y = (jittered.y / jittered.w - plain.y / plain.w) * 2.0;
            assert!((shift_x - frame.jitter.x).abs() < 1e-4);
            assert!((shift_y - frame.jitter.y).abs() < 1e-4);
        }
    }

    #[test]
    fn test_noisy_samples_converge() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let program = |_: &ProgramInputs, frame: &FrameParams, region: TileRect, out: &mut RenderTarget| -> RenderResult<()> {
            let mut rng = StdRng::seed_from_u64(frame.seed as u64);
            for row in out.rows_mut(region) {
                for pixel in row {
                    let v = rng.gen_range(0.0f32..1.0);
                    *pixel = [v, v, v, 1.0];
                }
            }
            Ok(())
        };
        let mut renderer = PathTracingRenderer::new(program, RendererSettings::default().with_tiles(1, 1).with_seed(5));
        renderer.set_size(8, 8).unwrap();
        let inputs = ProgramInputs::new();

        fn error(target: &RenderTarget) -> f32 {
            let pixels = target.pixels();
            pixels.iter().map(|p| (p[0] - 0.5).powi(2)).sum::<f32>() / pixels.len() as f32
        }
        for _ in 0..4 {
            renderer.update(&camera(), &inputs).unwrap();
        }
        let early = error(renderer.target().unwrap());
        for _ in 4..256 {
            renderer.update(&camera(), &inputs).unwrap();
        }
        let late = error(renderer.target().unwrap());

        assert_eq!(renderer.samples(), 256.0);
        // Uniform noise has variance 1/12; the mean of n samples 1/(12n)
        assert!(late < early / 8.0, "{late} vs {early}");
        assert!(late < 2e-3, "{late}");
        assert!(renderer.target().unwrap().pixels().iter().all(|p| p[3] == 1.0));
    }

    #[test]
    fn test_alpha_mode_swaps_targets() {
        let settings = RendererSettings::default().with_tiles(1, 1).with_alpha(true);
        let mut renderer = PathTracingRenderer::new(constant(|_| [1.0, 0.5, 0.0, 0.5]), settings);
        renderer.set_size(2, 2).unwrap();
        let inputs = ProgramInputs::new();

        let mut ids = vec![renderer.target().unwrap().id()];
        for _ in 0..3 {
            renderer.update(&camera(), &inputs).unwrap();
            ids.push(renderer.target().unwrap().id());
        }
        assert!(ids.windows(2).all(|w| w[0] != w[1]));
        assert_eq!(renderer.target().unwrap().pixel(0, 0), [0.5, 0.25, 0.0, 0.5]);
    }

    #[test]
    fn test_alpha_mode_swaps_once_per_pass() {
        let settings = RendererSettings::default().with_tiles(2, 1).with_alpha(true);
        let mut renderer = PathTracingRenderer::new(constant(|_| [1.0; 4]), settings);
        renderer.set_size(4, 4).unwrap();
        let inputs = ProgramInputs::new();

        let id = renderer.target().unwrap().id();
        renderer.update(&camera(), &inputs).unwrap();
        assert_eq!(renderer.target().unwrap().id(), id);
        renderer.update(&camera(), &inputs).unwrap();
        assert_ne!(renderer.target().unwrap().id(), id);
        assert!(renderer.target().unwrap().pixels().iter().all(|p| *p == [1.0; 4]));
    }

    #[test]
    fn test_only_scheduled_tile_changes() {
        let mut renderer = PathTracingRenderer::new(constant(|_| [1.0; 4]), RendererSettings::default().with_tiles(2, 1));
        renderer.set_size(4, 2).unwrap();
        renderer.update(&camera(), &ProgramInputs::new()).unwrap();

        let target = renderer.target().unwrap();
        assert_eq!(target.pixel(1, 1), [1.0; 4]);
        assert_eq!(target.pixel(2, 1), [0.0; 4]);
    }

    #[test]
    fn test_zero_size_is_rejected() {
        let mut renderer = PathTracingRenderer::new(constant(|_| [1.0; 4]), RendererSettings::default());
        assert!(matches!(
            renderer.set_size(0, 4),
            Err(RenderError::InvalidSize { width: 0, height: 4 })
        ));
        assert_eq!(renderer.size(), Some((1, 1)));
    }

    #[test]
    fn test_program_errors_do_not_advance() {
        let failing = |_: &ProgramInputs, _: &FrameParams, _: TileRect, _: &mut RenderTarget| -> RenderResult<()> {
            Err(RenderError::Program("device lost".into()))
        };
        let mut renderer = PathTracingRenderer::new(failing, RendererSettings::default());
        assert!(renderer.update(&camera(), &ProgramInputs::new()).is_err());
        assert_eq!(renderer.samples(), 0.0);
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let mut renderer = PathTracingRenderer::new(constant(|_| [1.0; 4]), RendererSettings::default());
        renderer.dispose();
        renderer.dispose();
        assert!(renderer.is_disposed());
        assert!(renderer.target().is_none());
        assert!(renderer.update(&camera(), &ProgramInputs::new()).is_ok());
        assert_eq!(renderer.samples(), 0.0);
    }
}
