use lux_core::TextureSlot;
use thiserror::Error;

/// Errors raised while encoding scene data into uniform textures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UniformError {
    #[error("light {light} references IES profile {index} but only {count} profiles were provided")]
    InvalidIesIndex { light: usize, index: usize, count: usize },

    #[error("material {material} binds a {slot:?} texture that is not in the texture list")]
    UnknownTexture { material: usize, slot: TextureSlot },
}

pub type UniformResult<T> = Result<T, UniformError>;

/// Errors raised by the progressive renderers.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("render target size must be non-zero, got {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    #[error("path tracing program failed: {0}")]
    Program(String),

    #[error(transparent)]
    Uniform(#[from] UniformError),
}

pub type RenderResult<T> = Result<T, RenderError>;
