//! Collects the geometry the ray tracing acceleration structures are built
//! from.
//!
//! Building the acceleration structures is up to the caller, this only
//! tracks when the set of traceable geometry changed and gathers it in the
//! layout the builder expects.

use std::sync::Arc;

use bitflags::bitflags;
use glam::Mat4;

use crate::{
    device::GpuDevice,
    resources::{Material, StaticMesh},
    types::{AlphaFunc, ObjectType},
};

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct RtInstanceFlags: u32 {
        /// Hits must run the any-hit program to evaluate the alpha test.
        const NON_OPAQUE = 1 << 0;
    }
}

/// Solid landscape geometry, merged into a single bottom level structure.
pub struct RtGeometry<D: GpuDevice> {
    pub mesh: Arc<StaticMesh<D>>,
    pub first_index: usize,
    pub index_len: usize,
}

/// Geometry and texture one or more instances read on hit.
pub struct RtHitSlot<D: GpuDevice> {
    pub texture: Option<Arc<D::TextureView>>,
    pub mesh: Arc<StaticMesh<D>>,
    pub first_primitive: u32,
}

pub struct RtInstance<D: GpuDevice> {
    pub transform: Mat4,
    /// Index into [`RtBuild::hit_slots`].
    pub hit_slot: u32,
    pub mesh: Arc<StaticMesh<D>>,
    pub first_index: usize,
    pub index_len: usize,
    pub flags: RtInstanceFlags,
}

/// Everything needed to build the top level structure of one frame.
pub struct RtBuild<D: GpuDevice> {
    pub static_opaque: Vec<RtGeometry<D>>,
    pub hit_slots: Vec<RtHitSlot<D>>,
    pub instances: Vec<RtInstance<D>>,
}

impl<D: GpuDevice> Default for RtBuild<D> {
    fn default() -> Self {
        Self {
            static_opaque: Vec::new(),
            hit_slots: Vec::new(),
            instances: Vec::new(),
        }
    }
}

impl<D: GpuDevice> RtBuild<D> {
    pub fn is_empty(&self) -> bool {
        self.static_opaque.is_empty() && self.instances.is_empty()
    }
}

pub struct RtScene<D: GpuDevice> {
    update_required: bool,
    build: RtBuild<D>,
}

impl<D: GpuDevice> Default for RtScene<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: GpuDevice> RtScene<D> {
    pub fn new() -> Self {
        Self {
            update_required: false,
            build: RtBuild::default(),
        }
    }

    /// Only solid and alpha tested landscape and static geometry is traced.
    pub fn is_eligible(alpha: AlphaFunc, ty: ObjectType) -> bool {
        matches!(ty, ObjectType::Landscape | ObjectType::Static)
            && matches!(alpha, AlphaFunc::Solid | AlphaFunc::AlphaTest)
    }

    /// Records that traceable geometry was added or removed.
    pub fn notify_tlas(&mut self, material: &Material<D>, ty: ObjectType) {
        if Self::is_eligible(material.alpha, ty) {
            self.update_required = true;
        }
    }

    pub fn is_update_required(&self) -> bool {
        self.update_required
    }

    pub fn add_instance(
        &mut self,
        transform: Mat4,
        material: &Material<D>,
        mesh: &Arc<StaticMesh<D>>,
        first_index: usize,
        index_len: usize,
        ty: ObjectType,
    ) {
        if !Self::is_eligible(material.alpha, ty) {
            return;
        }

        if material.alpha == AlphaFunc::Solid && ty == ObjectType::Landscape {
            self.build.static_opaque.push(RtGeometry {
                mesh: Arc::clone(mesh),
                first_index,
                index_len,
            });
            return;
        }

        let first_primitive = (first_index / 3) as u32;
        let reuse_last = self.build.hit_slots.last().is_some_and(|slot| {
            same_texture::<D>(&slot.texture, &material.texture)
                && Arc::ptr_eq(&slot.mesh, mesh)
                && slot.first_primitive == first_primitive
        });
        if !reuse_last {
            self.build.hit_slots.push(RtHitSlot {
                texture: material.texture.clone(),
                mesh: Arc::clone(mesh),
                first_primitive,
            });
        }

        let flags = if material.alpha == AlphaFunc::Solid {
            RtInstanceFlags::empty()
        } else {
            RtInstanceFlags::NON_OPAQUE
        };
        self.build.instances.push(RtInstance {
            transform,
            hit_slot: self.build.hit_slots.len() as u32 - 1,
            mesh: Arc::clone(mesh),
            first_index,
            index_len,
            flags,
        });
    }

    /// Hands the gathered geometry to the builder and starts a new frame.
    pub fn take_build(&mut self) -> RtBuild<D> {
        self.update_required = false;
        std::mem::take(&mut self.build)
    }
}

fn same_texture<D: GpuDevice>(a: &Option<Arc<D::TextureView>>, b: &Option<Arc<D::TextureView>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}
