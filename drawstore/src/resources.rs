//! Inputs owned by the rest of the renderer.
//!
//! Meshes and textures are handed to the storage as `Arc`s and compared by
//! address, so they must stay alive and unchanged for as long as any object
//! references them.

use std::sync::Arc;

use glam::IVec2;

use crate::{
    device::GpuDevice,
    types::{AlphaFunc, Bounds, VIEWPORT_COUNT},
};

/// Static geometry living in its own vertex and index buffer.
pub struct StaticMesh<D: GpuDevice> {
    pub bounds: Bounds,
    pub vertex_buffer: D::Buffer,
    pub index_buffer: D::Buffer,
}

/// Skinned geometry. The skinning matrices live in a separate pose buffer
/// addressed by the per-instance animation pointer.
pub struct AnimMesh<D: GpuDevice> {
    pub bounds: Bounds,
    pub vertex_buffer: D::Buffer,
    pub index_buffer: D::Buffer,
    pub bone_count: u32,
}

/// Surface description of a draw. Two materials are equal when all their
/// values are equal and they sample the very same texture.
pub struct Material<D: GpuDevice> {
    pub texture: Option<Arc<D::TextureView>>,
    pub alpha: AlphaFunc,
    pub tex_ani_map_dir_period: IVec2,
    pub wave_max_amplitude: f32,
    pub alpha_weight: f32,
    pub env_mapping: f32,
}

impl<D: GpuDevice> Material<D> {
    pub fn new(alpha: AlphaFunc) -> Self {
        Self {
            texture: None,
            alpha,
            tex_ani_map_dir_period: IVec2::ZERO,
            wave_max_amplitude: 0.0,
            alpha_weight: 1.0,
            env_mapping: 0.0,
        }
    }

    pub fn with_texture(mut self, texture: Arc<D::TextureView>) -> Self {
        self.texture = Some(texture);
        self
    }
}

impl<D: GpuDevice> Clone for Material<D> {
    fn clone(&self) -> Self {
        Self {
            texture: self.texture.clone(),
            alpha: self.alpha,
            tex_ani_map_dir_period: self.tex_ani_map_dir_period,
            wave_max_amplitude: self.wave_max_amplitude,
            alpha_weight: self.alpha_weight,
            env_mapping: self.env_mapping,
        }
    }
}

impl<D: GpuDevice> PartialEq for Material<D> {
    fn eq(&self, other: &Self) -> bool {
        let same_texture = match (&self.texture, &other.texture) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        same_texture
            && self.alpha == other.alpha
            && self.tex_ani_map_dir_period == other.tex_ani_map_dir_period
            && self.wave_max_amplitude == other.wave_max_amplitude
            && self.alpha_weight == other.alpha_weight
            && self.env_mapping == other.env_mapping
    }
}

/// Per frame resources shared by every draw, owned by the scene.
pub struct SceneGlobals<D: GpuDevice> {
    /// Camera uniforms, indexed by [`Viewport::index`](crate::types::Viewport::index).
    pub uniforms: [D::Buffer; VIEWPORT_COUNT],
    /// Hierarchical depth of the previous frame, used to occlusion cull the
    /// main viewport.
    pub hi_z: D::TextureView,
    pub sampler: D::Sampler,
    /// Bound in place of the diffuse texture of untextured materials.
    pub fallback_texture: D::TextureView,
}
