use std::{fmt, sync::Arc};

use glam::Mat4;
use parking_lot::Mutex;

use crate::{
    device::GpuDevice,
    managers::{BucketMesh, InstanceSlot, MorphAnim, Object, ObjectId},
    resources::{Material, StaticMesh},
    storage::{CommitState, DrawStorage},
    types::{Bounds, ObjectType, WindMode},
};

/// Objects whose [`Item`] was dropped, waiting to be freed by their storage.
#[derive(Default)]
pub(crate) struct ReleaseQueue {
    released: Mutex<Vec<ObjectId>>,
}

impl ReleaseQueue {
    fn push(&self, id: ObjectId) {
        self.released.lock().push(id);
    }

    pub(crate) fn drain(&self) -> Vec<ObjectId> {
        std::mem::take(&mut *self.released.lock())
    }
}

/// Owning handle to an object of a [`DrawStorage`].
///
/// Dropping the handle frees the object the next time the storage is
/// mutated. Use [`DrawStorage::release`] to free it right away. An empty item
/// refers to nothing, which is what allocation returns for combinations that
/// are never drawn.
#[must_use = "Dropping an item frees the object it refers to"]
pub struct Item {
    owner: Option<Arc<ReleaseQueue>>,
    id: ObjectId,
}

impl Item {
    pub(crate) fn new(owner: Arc<ReleaseQueue>, id: ObjectId) -> Self {
        Self { owner: Some(owner), id }
    }

    pub fn empty() -> Self {
        Self {
            owner: None,
            id: ObjectId(0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.owner.is_none()
    }

    pub fn id(&self) -> Option<ObjectId> {
        self.owner.as_ref().map(|_| self.id)
    }

    pub(crate) fn belongs_to(&self, queue: &Arc<ReleaseQueue>) -> bool {
        self.owner.as_ref().is_some_and(|owner| Arc::ptr_eq(owner, queue))
    }

    /// Disarms the handle, the caller becomes responsible for freeing.
    pub(crate) fn into_id(mut self) -> Option<ObjectId> {
        self.owner.take().map(|_| self.id)
    }
}

impl Default for Item {
    fn default() -> Self {
        Self::empty()
    }
}

impl Drop for Item {
    fn drop(&mut self) {
        if let Some(owner) = self.owner.take() {
            owner.push(self.id);
        }
    }
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Item").field("id", &self.id()).finish()
    }
}

/// Read access to a live object.
pub struct ItemRef<'a, D: GpuDevice> {
    pub(super) storage: &'a DrawStorage<D>,
    pub(super) id: ObjectId,
    pub(super) object: &'a Object,
}

impl<'a, D: GpuDevice> ItemRef<'a, D> {
    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn ty(&self) -> ObjectType {
        self.object.ty
    }

    pub fn material(&self) -> Option<&'a Material<D>> {
        self.storage.buckets.get(self.object.bucket).map(|b| &b.material)
    }

    pub fn bounds(&self) -> Option<&'a Bounds> {
        self.bucket_mesh().map(BucketMesh::bounds)
    }

    pub fn position(&self) -> Mat4 {
        self.object.transform
    }

    /// The static mesh drawn, `None` for skinned objects.
    pub fn mesh(&self) -> Option<&'a Arc<StaticMesh<D>>> {
        self.bucket_mesh().and_then(BucketMesh::as_static)
    }

    /// Index range drawn out of the mesh, as `(offset, length)`.
    pub fn mesh_slice(&self) -> (usize, usize) {
        (self.object.ibo_offset, self.object.ibo_len)
    }

    pub fn instance(&self) -> Option<InstanceSlot> {
        self.object.instance
    }

    /// Running morph animation layers, oldest first.
    pub fn morph_layers(&self) -> &'a [MorphAnim] {
        &self.object.morph
    }

    pub fn object(&self) -> &'a Object {
        self.object
    }

    fn bucket_mesh(&self) -> Option<&'a BucketMesh<D>> {
        self.storage.buckets.get(self.object.bucket).map(|b| &b.mesh)
    }
}

/// Write access to a live object.
pub struct ItemMut<'a, D: GpuDevice> {
    pub(super) storage: &'a mut DrawStorage<D>,
    pub(super) id: ObjectId,
}

impl<'a, D: GpuDevice> ItemMut<'a, D> {
    pub fn id(&self) -> ObjectId {
        self.id
    }

    fn object(&mut self) -> Option<&mut Object> {
        self.storage.objects.get_mut(self.id)
    }

    pub fn set_obj_matrix(&mut self, matrix: Mat4) {
        if let Some(object) = self.object() {
            object.transform = matrix;
            self.storage.update_instance(self.id);
        }
    }

    pub fn set_as_ghost(&mut self, ghost: bool) {
        if let Some(object) = self.object() {
            object.ghost = ghost;
            self.storage.update_instance(self.id);
        }
    }

    pub fn set_fatness(&mut self, fatness: f32) {
        if let Some(object) = self.object() {
            object.fatness = fatness;
            self.storage.update_instance(self.id);
        }
    }

    /// Wind sway is applied by [`DrawStorage::pre_frame_update`].
    pub fn set_wind(&mut self, mode: WindMode, intensity: f32) {
        let Some(object) = self.object() else {
            return;
        };
        object.wind = mode;
        object.wind_intensity = intensity;
        let instance = object.instance;

        if mode == WindMode::None {
            if let Some(slot) = instance {
                self.storage.instances.update(slot, |desc| desc.wind = 0.0);
                self.storage.state = CommitState::Dirty;
            }
        }
    }

    /// Starts a morph animation layer. When every layer is taken the oldest
    /// one is replaced.
    ///
    /// Layers are cpu side bookkeeping only. Nothing here uploads them, the
    /// morph pass reads them through [`ItemRef::morph_layers`] and samples
    /// its own morph buffers.
    pub fn start_morph_anim(&mut self, anim: u32, intensity: f32, time_start: u64, time_until: Option<u64>) {
        let Some(object) = self.object() else {
            return;
        };
        if object.morph.is_full() {
            object.morph.remove(0);
        }
        object.morph.push(MorphAnim {
            anim,
            intensity,
            time_start,
            time_until,
        });
    }
}
