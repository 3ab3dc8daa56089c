//! Lux progressive path tracing.
//!
//! Holds everything between an encoded scene and a path tracing program:
//!
//! - [`uniforms`] pack materials, lights, textures, IES profiles and the
//!   environment sampling tables into data textures;
//! - [`ProgramInputs`] gathers them and tracks scene versions;
//! - [`PathTracingRenderer`] schedules tiles, jitters the camera and keeps a
//!   running mean of the samples;
//! - [`QuiltPathTracingRenderer`] does the same for a grid of views.
//!
//! The program itself is supplied by the host through [`PathTracingProgram`].

mod error;
mod program;
mod quilt;
mod renderer;
mod sequence;
mod target;
mod tiles;
pub mod uniforms;

pub use error::{RenderError, RenderResult, UniformError, UniformResult};
pub use program::{FrameParams, PathTracingProgram, ProgramInputs};
pub use quilt::{display_view_parameters, DisplayViewParameters, QuiltPathTracingRenderer, QuiltSettings};
pub use renderer::{PathTracingRenderer, RendererSettings};
pub use sequence::{r2, JitterSequence, PassNoise};
pub use target::{blend_premultiplied, blend_region, RenderTarget};
pub use tiles::{TileGrid, TileRect, TileScheduler, TILE_STRIDE};
