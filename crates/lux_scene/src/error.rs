use lux_core::MeshError;
use thiserror::Error;

/// Errors that abort a scene encode.
///
/// Problems local to one node are not errors; they are collected as
/// [`EncodeIssue`]s and the rest of the scene is still encoded.
#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("scene encoding was cancelled")]
    Cancelled,

    #[error("the encoder has been disposed")]
    Disposed,

    #[error("failed to start encoder worker: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("encoder worker stopped before replying")]
    WorkerDisconnected,

    #[error("scene has {count} triangles, more than the {max} a 32-bit index can address")]
    TooManyTriangles { count: usize, max: usize },
}

pub type EncodeResult<T> = Result<T, EncodeError>;

/// A node that was skipped during encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeIssue {
    /// Name of the offending node
    pub node: String,
    /// Pre-order ordinal of the node among all visible mesh nodes
    pub mesh_ordinal: usize,
    pub error: MeshError,
}

impl std::fmt::Display for EncodeIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "mesh node '{}' (#{}): {}", self.node, self.mesh_ordinal, self.error)
    }
}
