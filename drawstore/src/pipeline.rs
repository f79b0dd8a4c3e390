use std::sync::Arc;

use crate::{
    device::GpuDevice,
    resources::Material,
    types::{AlphaFunc, ObjectType},
};

/// Resolves the pipelines used to draw a material on a given kind of object.
///
/// Pipelines are compared by address when commands are deduplicated, so a
/// cache must hand out the same `Arc` for the same pipeline every time.
pub trait PipelineCache<D: GpuDevice> {
    /// Pipeline used in the main viewport, `None` if the combination is not
    /// drawn there.
    fn color_pipeline(&self, material: &Material<D>, ty: ObjectType) -> Option<Arc<D::RenderPipeline>>;

    /// Pipeline used in the shadow viewports, `None` if the combination does
    /// not cast shadows.
    fn depth_pipeline(&self, material: &Material<D>, ty: ObjectType) -> Option<Arc<D::RenderPipeline>>;
}

/// A fixed table of cluster pipelines.
///
/// Only solid and alpha tested materials are drawn. Landscape, static and
/// animated geometry each get their own gbuffer pipeline, every other object
/// type only casts shadows.
pub struct PipelineTable<D: GpuDevice> {
    pub landscape_gbuffer: Option<Arc<D::RenderPipeline>>,
    pub landscape_gbuffer_at: Option<Arc<D::RenderPipeline>>,
    pub object_gbuffer: Option<Arc<D::RenderPipeline>>,
    pub object_gbuffer_at: Option<Arc<D::RenderPipeline>>,
    pub animated_gbuffer: Option<Arc<D::RenderPipeline>>,
    pub animated_gbuffer_at: Option<Arc<D::RenderPipeline>>,
    pub depth: Option<Arc<D::RenderPipeline>>,
    pub depth_at: Option<Arc<D::RenderPipeline>>,
}

impl<D: GpuDevice> Default for PipelineTable<D> {
    fn default() -> Self {
        Self {
            landscape_gbuffer: None,
            landscape_gbuffer_at: None,
            object_gbuffer: None,
            object_gbuffer_at: None,
            animated_gbuffer: None,
            animated_gbuffer_at: None,
            depth: None,
            depth_at: None,
        }
    }
}

impl<D: GpuDevice> PipelineCache<D> for PipelineTable<D> {
    fn color_pipeline(&self, material: &Material<D>, ty: ObjectType) -> Option<Arc<D::RenderPipeline>> {
        let pipeline = match (material.alpha, ty) {
            (AlphaFunc::Solid, ObjectType::Landscape) => &self.landscape_gbuffer,
            (AlphaFunc::Solid, ObjectType::Static) => &self.object_gbuffer,
            (AlphaFunc::Solid, ObjectType::Animated) => &self.animated_gbuffer,
            (AlphaFunc::AlphaTest, ObjectType::Landscape) => &self.landscape_gbuffer_at,
            (AlphaFunc::AlphaTest, ObjectType::Static) => &self.object_gbuffer_at,
            (AlphaFunc::AlphaTest, ObjectType::Animated) => &self.animated_gbuffer_at,
            _ => return None,
        };
        pipeline.clone()
    }

    fn depth_pipeline(&self, material: &Material<D>, _ty: ObjectType) -> Option<Arc<D::RenderPipeline>> {
        match material.alpha {
            AlphaFunc::Solid => self.depth.clone(),
            AlphaFunc::AlphaTest => self.depth_at.clone(),
            _ => None,
        }
    }
}

/// The compute programs driving the visibility pass.
pub struct VisibilityPipelines<D: GpuDevice> {
    /// Resets the indirect arguments of every command, one thread per command.
    pub cluster_init: D::ComputePipeline,
    /// Frustum culls one cluster per thread and appends the visible ones.
    pub cluster_task: D::ComputePipeline,
    /// Like `cluster_task`, additionally occlusion culling against the hi-z
    /// pyramid. Used for the main viewport.
    pub cluster_task_hiz: D::ComputePipeline,
}
