//! Gpu driven draw batching and cluster culling.
//!
//! Renderable instances are registered in a [`DrawStorage`], which groups
//! them by mesh and material into buckets, by pipeline into draw commands,
//! and splits their geometry into clusters of meshlets. Every frame the gpu
//! culls the clusters of each viewport on its own and draws the survivors
//! with one indirect draw per command.
//!
//! The storage talks to the gpu through the [`device::GpuDevice`] trait,
//! [`WgpuDevice`] is the wgpu implementation.

pub use drawstore_types as types;

pub use backend::*;
pub use error::*;
pub use options::DrawStorageOptions;
pub use pipeline::{PipelineCache, PipelineTable, VisibilityPipelines};
pub use resources::{AnimMesh, Material, SceneGlobals, StaticMesh};
pub use storage::{CommitState, DrawStorage, DrawStorageStats, Item, ItemMut, ItemRef};

mod backend;
pub mod device;
mod error;
pub mod managers;
mod options;
mod pipeline;
mod resources;
pub mod rt_scene;
pub mod storage;
pub mod util;
