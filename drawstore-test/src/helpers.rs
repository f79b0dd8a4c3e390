use std::sync::Arc;

use drawstore::{
    types::{AlphaFunc, Bounds, PackedCluster},
    AnimMesh, DrawStorage, DrawStorageOptions, Material, PipelineTable, SceneGlobals, StaticMesh, VisibilityPipelines,
};
use glam::Vec3;
use wgpu::BufferUsages;

use crate::mock::{MockBuffer, MockDevice, MockPipeline, MockSampler, MockTexture};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn pipeline(name: &str) -> Option<Arc<MockPipeline>> {
    Some(Arc::new(MockPipeline::new(name)))
}

/// Every pipeline named after its field.
pub fn pipeline_table() -> PipelineTable<MockDevice> {
    PipelineTable {
        landscape_gbuffer: pipeline("landscape_gbuffer"),
        landscape_gbuffer_at: pipeline("landscape_gbuffer_at"),
        object_gbuffer: pipeline("object_gbuffer"),
        object_gbuffer_at: pipeline("object_gbuffer_at"),
        animated_gbuffer: pipeline("animated_gbuffer"),
        animated_gbuffer_at: pipeline("animated_gbuffer_at"),
        depth: pipeline("depth"),
        depth_at: pipeline("depth_at"),
    }
}

pub fn visibility_pipelines() -> VisibilityPipelines<MockDevice> {
    VisibilityPipelines {
        cluster_init: MockPipeline::new("cluster_init"),
        cluster_task: MockPipeline::new("cluster_task"),
        cluster_task_hiz: MockPipeline::new("cluster_task_hiz"),
    }
}

pub fn storage_with(options: DrawStorageOptions) -> (Arc<MockDevice>, DrawStorage<MockDevice>) {
    init_logging();
    let device = MockDevice::new();
    let storage = DrawStorage::new(
        Arc::clone(&device),
        pipeline_table(),
        visibility_pipelines(),
        options,
    );
    (device, storage)
}

pub fn storage() -> (Arc<MockDevice>, DrawStorage<MockDevice>) {
    storage_with(DrawStorageOptions::default())
}

pub fn scene() -> SceneGlobals<MockDevice> {
    let uniforms = |name: &str| MockBuffer::new(name, 256, BufferUsages::UNIFORM);
    SceneGlobals {
        uniforms: [uniforms("main"), uniforms("shadow0"), uniforms("shadow1")],
        hi_z: MockTexture::new(),
        sampler: MockSampler,
        fallback_texture: MockTexture::new(),
    }
}

fn cube_bounds(half_extent: f32) -> Bounds {
    Bounds::from_points(&[Vec3::splat(-half_extent), Vec3::splat(half_extent)])
}

/// A mesh with `meshlets` meshlets worth of indices.
pub fn static_mesh(meshlets: usize) -> Arc<StaticMesh<MockDevice>> {
    Arc::new(StaticMesh {
        bounds: cube_bounds(1.0),
        vertex_buffer: MockBuffer::new("vbo", 1024, BufferUsages::STORAGE),
        index_buffer: MockBuffer::new("ibo", meshlets as u64 * 64 * 4, BufferUsages::STORAGE),
    })
}

pub fn anim_mesh() -> Arc<AnimMesh<MockDevice>> {
    Arc::new(AnimMesh {
        bounds: cube_bounds(2.0),
        vertex_buffer: MockBuffer::new("anim vbo", 1024, BufferUsages::STORAGE),
        index_buffer: MockBuffer::new("anim ibo", 1024, BufferUsages::STORAGE),
        bone_count: 16,
    })
}

pub fn material(alpha: AlphaFunc) -> Material<MockDevice> {
    Material::new(alpha)
}

pub fn textured(alpha: AlphaFunc) -> Material<MockDevice> {
    Material::new(alpha).with_texture(Arc::new(MockTexture::new()))
}

/// `count` clusters lined up along x.
pub fn packed_clusters(count: usize) -> Vec<PackedCluster> {
    (0..count)
        .map(|i| PackedCluster {
            pos: Vec3::new(i as f32 * 4.0, 0.0, 0.0),
            r: 1.5,
        })
        .collect()
}
