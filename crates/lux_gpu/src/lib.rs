//! Lux GPU - wgpu backend for path tracing programs.
//!
//! Mirrors the data textures of a `ProgramInputs` on the GPU and runs a WGSL
//! compute program per tile:
//!
//! - [`bindings`]: the resource table every program binds against, and
//!   naga validation of user WGSL
//! - [`GpuProgramInputs`]: versioned texture uploads and bind groups
//! - [`GpuPathTracingProgram`]: a `PathTracingProgram` backed by a compute
//!   pipeline
//! - [`GpuContext`]: headless device creation

pub mod bindings;
mod context;
mod frame;
mod inputs;
mod program;
pub mod upload;

pub use bindings::{validate_program, SlotKind, UniformSlot, PATH_TRACING_INPUTS_WGSL, UNIFORM_SLOTS};
pub use context::GpuContext;
pub use frame::FrameUniform;
pub use inputs::GpuProgramInputs;
pub use program::GpuPathTracingProgram;
pub use upload::GpuTexture;
