//! Lux scene encoding.
//!
//! Turns a [`lux_core::Scene`] into the flat data a GPU path tracer
//! consumes:
//!
//! - [`SceneEncoder`] flattens the graph, deduplicates materials, textures
//!   and IES profiles, merges geometry and builds a [`Bvh`];
//! - [`DynamicSceneEncoder`] keeps the first build and refits it on later
//!   calls for deforming scenes;
//! - [`WorkerSceneEncoder`] runs the encoder on a background thread;
//! - [`MaterialReducer`] merges value-equal materials before encoding;
//! - [`encoding`] packs the BVH and vertex attributes into data textures.

mod bvh;
mod dynamic;
mod encoder;
pub mod encoding;
mod error;
mod geometry;
mod progress;
mod reducer;
mod worker;

pub use bvh::{Bvh, BvhNode, BvhNodeKind, BvhOptions, SplitStrategy};
pub use dynamic::{DynamicScene, DynamicSceneEncoder};
pub use encoder::{GenerateOptions, GeneratedScene, LightRecord, SceneEncoder};
pub use encoding::{AttributeTextures, BvhTextures};
pub use error::{EncodeError, EncodeIssue, EncodeResult};
pub use geometry::{GeometryRange, MergedGeometry};
pub use progress::ProgressFn;
pub use reducer::{MaterialReducer, ReducerReport};
pub use worker::{GenerateTask, WorkerSceneEncoder};
