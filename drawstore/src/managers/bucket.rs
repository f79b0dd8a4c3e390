use std::sync::Arc;

use encase::ShaderType;
use glam::{IVec2, Vec4};

use crate::{
    device::GpuDevice,
    resources::{AnimMesh, Material, StaticMesh},
    types::{Bounds, ObjectType},
};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BucketId(pub u32);

impl BucketId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The geometry a bucket draws from.
pub enum BucketMesh<D: GpuDevice> {
    Static(Arc<StaticMesh<D>>),
    Animated(Arc<AnimMesh<D>>),
}

impl<D: GpuDevice> BucketMesh<D> {
    pub fn bounds(&self) -> &Bounds {
        match self {
            BucketMesh::Static(mesh) => &mesh.bounds,
            BucketMesh::Animated(mesh) => &mesh.bounds,
        }
    }

    pub fn vertex_buffer(&self) -> &D::Buffer {
        match self {
            BucketMesh::Static(mesh) => &mesh.vertex_buffer,
            BucketMesh::Animated(mesh) => &mesh.vertex_buffer,
        }
    }

    pub fn index_buffer(&self) -> &D::Buffer {
        match self {
            BucketMesh::Static(mesh) => &mesh.index_buffer,
            BucketMesh::Animated(mesh) => &mesh.index_buffer,
        }
    }

    pub fn as_static(&self) -> Option<&Arc<StaticMesh<D>>> {
        match self {
            BucketMesh::Static(mesh) => Some(mesh),
            BucketMesh::Animated(_) => None,
        }
    }

    fn same_mesh(&self, other: &Self) -> bool {
        match (self, other) {
            (BucketMesh::Static(a), BucketMesh::Static(b)) => Arc::ptr_eq(a, b),
            (BucketMesh::Animated(a), BucketMesh::Animated(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl<D: GpuDevice> Clone for BucketMesh<D> {
    fn clone(&self) -> Self {
        match self {
            BucketMesh::Static(mesh) => BucketMesh::Static(Arc::clone(mesh)),
            BucketMesh::Animated(mesh) => BucketMesh::Animated(Arc::clone(mesh)),
        }
    }
}

/// A unique mesh, material and object type combination.
pub struct Bucket<D: GpuDevice> {
    pub mesh: BucketMesh<D>,
    pub material: Material<D>,
    pub ty: ObjectType,
}

/// Packed per-bucket data read by the culling and draw programs.
#[derive(Debug, Copy, Clone, ShaderType)]
pub struct ShaderBucket {
    pub bbox_min: Vec4,
    pub bbox_max: Vec4,
    pub tex_ani_map_dir_period: IVec2,
    pub bbox_radius: f32,
    pub wave_max_amplitude: f32,
    pub alpha_weight: f32,
    pub env_mapping: f32,
}

impl ShaderBucket {
    fn new<D: GpuDevice>(bucket: &Bucket<D>) -> Self {
        let bounds = bucket.mesh.bounds();
        Self {
            bbox_min: bounds.bbox[0].extend(0.0),
            bbox_max: bounds.bbox[1].extend(0.0),
            tex_ani_map_dir_period: bucket.material.tex_ani_map_dir_period,
            bbox_radius: bounds.r_conservative,
            wave_max_amplitude: bucket.material.wave_max_amplitude,
            alpha_weight: bucket.material.alpha_weight,
            env_mapping: bucket.material.env_mapping,
        }
    }
}

/// Append-only registry of buckets.
///
/// Lookups are a linear scan, which stays cheap as there are orders of
/// magnitude fewer distinct buckets than objects.
pub struct BucketRegistry<D: GpuDevice> {
    buckets: Vec<Bucket<D>>,
    changed: bool,
}

impl<D: GpuDevice> BucketRegistry<D> {
    pub fn new() -> Self {
        Self {
            buckets: Vec::new(),
            changed: false,
        }
    }

    /// Returns the bucket drawing `mesh` with `material` on objects of type
    /// `ty`, creating it if needed.
    pub fn bucket_id(&mut self, material: &Material<D>, mesh: &BucketMesh<D>, ty: ObjectType) -> BucketId {
        let existing = self
            .buckets
            .iter()
            .position(|b| b.ty == ty && b.mesh.same_mesh(mesh) && b.material == *material);
        if let Some(idx) = existing {
            return BucketId(idx as u32);
        }

        let id = BucketId(self.buckets.len() as u32);
        self.buckets.push(Bucket {
            mesh: mesh.clone(),
            material: material.clone(),
            ty,
        });
        self.changed = true;
        id
    }

    pub fn get(&self, id: BucketId) -> Option<&Bucket<D>> {
        self.buckets.get(id.index())
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Bucket<D>> + '_ {
        self.buckets.iter()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// True if buckets were added since the last call to [`Self::shader_data`].
    pub fn changed(&self) -> bool {
        self.changed
    }

    pub fn shader_data(&mut self) -> Vec<ShaderBucket> {
        profiling::scope!("BucketRegistry::shader_data");
        self.changed = false;
        self.buckets.iter().map(ShaderBucket::new).collect()
    }
}

impl<D: GpuDevice> Default for BucketRegistry<D> {
    fn default() -> Self {
        Self::new()
    }
}
