//! The draw storage: every renderable instance of a scene, grouped into
//! buckets and draw commands and split into clusters the gpu culls on its
//! own.
//!
//! Per frame the storage is driven in this order:
//!
//! 1. objects are allocated, mutated and released through [`Item`]s,
//! 2. [`DrawStorage::provision`] brings every gpu resource up to date,
//! 3. [`DrawStorage::visibility_pass`] culls all viewports,
//! 4. [`DrawStorage::draw_gbuffer`] and [`DrawStorage::draw_shadow`] issue
//!    the indirect draws.

use std::sync::Arc;

use crate::{
    device::GpuDevice,
    managers::{
        BucketMesh, BucketRegistry, ClusterTable, CommandRegistry, InstanceFlags, InstanceStorage, Object, ObjectId,
        ObjectTable,
    },
    options::DrawStorageOptions,
    pipeline::{PipelineCache, VisibilityPipelines},
    resources::{AnimMesh, Material, StaticMesh},
    rt_scene::{RtBuild, RtScene},
    types::{ObjectType, PackedCluster, MESHLET_INDICES},
    util::math::is_multiple_of,
};

mod animation;
mod commit;
mod draw;
mod item;
mod visibility;

pub use commit::*;
pub use item::{Item, ItemMut, ItemRef};
pub(crate) use item::ReleaseQueue;
pub use visibility::*;

/// Whether the gpu side reflects the cpu tables.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CommitState {
    Clean,
    Dirty,
}

/// Sizes of the tables, for debug overlays.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct DrawStorageStats {
    pub objects: usize,
    pub free_objects: usize,
    pub buckets: usize,
    pub commands: usize,
    pub clusters: usize,
    pub instances: usize,
    pub total_payload: u32,
}

pub struct DrawStorage<D: GpuDevice> {
    device: Arc<D>,
    pipelines: Box<dyn PipelineCache<D>>,
    visibility: VisibilityPipelines<D>,
    options: DrawStorageOptions,
    released: Arc<ReleaseQueue>,

    objects: ObjectTable,
    buckets: BucketRegistry<D>,
    commands: CommandRegistry<D>,
    clusters: ClusterTable,
    instances: InstanceStorage<D>,
    rt: RtScene<D>,

    state: CommitState,
    gpu: Option<GpuResources<D>>,
    bucket_buffer: Option<D::Buffer>,
    bindings_stale: bool,
}

impl<D: GpuDevice> DrawStorage<D> {
    pub fn new(
        device: Arc<D>,
        pipelines: impl PipelineCache<D> + 'static,
        visibility: VisibilityPipelines<D>,
        options: DrawStorageOptions,
    ) -> Self {
        Self {
            device,
            pipelines: Box::new(pipelines),
            visibility,
            options,
            released: Arc::new(ReleaseQueue::default()),

            objects: ObjectTable::new(),
            buckets: BucketRegistry::new(),
            commands: CommandRegistry::new(),
            clusters: ClusterTable::new(),
            instances: InstanceStorage::new(),
            rt: RtScene::new(),

            state: CommitState::Clean,
            gpu: None,
            bucket_buffer: None,
            bindings_stale: false,
        }
    }

    /// Adds an object drawn as a single cluster.
    ///
    /// # Panics
    ///
    /// If `ibo_offset` or `ibo_len` is not a multiple of
    /// [`MESHLET_INDICES`](crate::types::MESHLET_INDICES).
    pub fn alloc(
        &mut self,
        mesh: &Arc<StaticMesh<D>>,
        material: &Material<D>,
        ibo_offset: usize,
        ibo_len: usize,
        ty: ObjectType,
    ) -> Item {
        profiling::scope!("DrawStorage::alloc");
        self.alloc_inner(
            BucketMesh::Static(Arc::clone(mesh)),
            material,
            ibo_offset,
            ibo_len,
            None,
            ty,
            0,
        )
    }

    /// Adds an object made of offline-built clusters, one per meshlet of the
    /// index range.
    ///
    /// Pre-clustered geometry is always drawn straight from the cluster
    /// table, so the object is stored as [`ObjectType::Landscape`] whatever
    /// `ty` says.
    ///
    /// # Panics
    ///
    /// If the index range is not meshlet aligned or `clusters` does not
    /// hold exactly one entry per meshlet.
    pub fn alloc_clustered(
        &mut self,
        mesh: &Arc<StaticMesh<D>>,
        material: &Material<D>,
        ibo_offset: usize,
        ibo_len: usize,
        clusters: &[PackedCluster],
        ty: ObjectType,
    ) -> Item {
        profiling::scope!("DrawStorage::alloc_clustered");
        if ty != ObjectType::Landscape {
            log::debug!("Pre-clustered {:?} geometry is drawn as landscape", ty);
        }
        self.alloc_inner(
            BucketMesh::Static(Arc::clone(mesh)),
            material,
            ibo_offset,
            ibo_len,
            Some(clusters),
            ObjectType::Landscape,
            0,
        )
    }

    /// Adds a skinned object. `anim_ptr` locates its skinning matrices in the
    /// pose buffer.
    ///
    /// # Panics
    ///
    /// If the index range is not meshlet aligned.
    pub fn alloc_animated(
        &mut self,
        mesh: &Arc<AnimMesh<D>>,
        material: &Material<D>,
        anim_ptr: u32,
        ibo_offset: usize,
        ibo_len: usize,
    ) -> Item {
        profiling::scope!("DrawStorage::alloc_animated");
        self.alloc_inner(
            BucketMesh::Animated(Arc::clone(mesh)),
            material,
            ibo_offset,
            ibo_len,
            None,
            ObjectType::Animated,
            anim_ptr,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn alloc_inner(
        &mut self,
        mesh: BucketMesh<D>,
        material: &Material<D>,
        ibo_offset: usize,
        ibo_len: usize,
        packed: Option<&[PackedCluster]>,
        ty: ObjectType,
        anim_ptr: u32,
    ) -> Item {
        assert!(
            is_multiple_of(ibo_offset, MESHLET_INDICES),
            "index offset {ibo_offset} is not a multiple of the meshlet size {MESHLET_INDICES}"
        );
        assert!(
            is_multiple_of(ibo_len, MESHLET_INDICES),
            "index count {ibo_len} is not a multiple of the meshlet size {MESHLET_INDICES}"
        );
        if let Some(packed) = packed {
            assert_eq!(
                packed.len(),
                ibo_len / MESHLET_INDICES,
                "expected one packed cluster per meshlet"
            );
        }

        self.reclaim_released();

        let bucket = self.buckets.bucket_id(material, &mesh, ty);
        let Some(command) = self
            .commands
            .command_id(&*self.pipelines, material, ty, bucket, self.options.bindless)
        else {
            log::trace!("No pipeline draws {:?} with alpha {:?}, skipping", ty, material.alpha);
            return Item::empty();
        };

        let first_meshlet = (ibo_offset / MESHLET_INDICES) as u32;
        let meshlets = (ibo_len / MESHLET_INDICES) as u32;
        let (cluster, cluster_count) = match packed {
            Some(packed) => (
                self.clusters.push_packed(packed, first_meshlet, bucket, command),
                packed.len() as u32,
            ),
            None => (
                self.clusters
                    .push_whole(mesh.bounds().r_conservative, first_meshlet, meshlets, bucket, command),
                1,
            ),
        };
        self.commands.add_payload(command, meshlets);

        let instance = if packed.is_none() && ty.is_instanced() {
            let slot = self.instances.alloc();
            self.instances.update(slot, |desc| desc.anim_ptr = anim_ptr);
            if let Some(cluster) = self.clusters.get_mut(cluster) {
                cluster.instance = Some(slot);
            }
            Some(slot)
        } else {
            None
        };

        let id = self.objects.insert(Object {
            ty,
            ibo_offset,
            ibo_len,
            bucket,
            command: Some(command),
            cluster,
            cluster_count,
            instance,
            anim_ptr,
            ..Object::empty()
        });

        self.rt.notify_tlas(material, ty);
        self.state = CommitState::Dirty;
        Item::new(Arc::clone(&self.released), id)
    }

    /// Frees the object behind `item` right away.
    pub fn release(&mut self, item: Item) {
        if item.is_empty() {
            return;
        }
        if !item.belongs_to(&self.released) {
            log::warn!("Releasing an item that belongs to a different draw storage");
            return;
        }
        if let Some(id) = item.into_id() {
            self.free(id);
        }
    }

    /// Frees every object whose [`Item`] was dropped since the last call.
    pub fn reclaim_released(&mut self) {
        let released = self.released.drain();
        if released.is_empty() {
            return;
        }
        profiling::scope!("DrawStorage::reclaim_released");
        log::trace!("Reclaiming {} released objects", released.len());
        for id in released {
            self.free(id);
        }
    }

    fn free(&mut self, id: ObjectId) {
        let Some(object) = self.objects.remove(id) else {
            log::warn!("Freeing object {} which is not alive", id.0);
            return;
        };

        if let Some(command) = object.command {
            self.commands.remove_payload(command, object.meshlet_count());
        }
        self.clusters.reset(object.cluster, object.cluster_count);
        if let Some(slot) = object.instance {
            self.instances.free(slot);
        }
        if let Some(bucket) = self.buckets.get(object.bucket) {
            self.rt.notify_tlas(&bucket.material, object.ty);
        }
        self.state = CommitState::Dirty;
    }

    /// Pushes the transform, fatness and ghost flag of an instanced object to
    /// its instance slot and moves its cluster along.
    fn update_instance(&mut self, id: ObjectId) {
        let Some(object) = self.objects.get(id) else {
            return;
        };
        let Some(slot) = object.instance else {
            return;
        };

        let transform = object.transform;
        let fatness = object.fatness;
        let ghost = object.ghost;
        let cluster = object.cluster;
        self.instances.update(slot, |desc| {
            desc.set_matrix(transform);
            desc.fatness = fatness;
            let mut flags = desc.flags();
            flags.set(InstanceFlags::GHOST, ghost);
            desc.set_flags(flags);
        });
        if let Some(cluster) = self.clusters.get_mut(cluster) {
            cluster.center = transform.w_axis.truncate();
        }
        self.state = CommitState::Dirty;
    }

    fn live_object(&self, item: &Item) -> Option<(ObjectId, &Object)> {
        if !item.belongs_to(&self.released) {
            return None;
        }
        let id = item.id()?;
        self.objects.get(id).map(|object| (id, object))
    }

    /// Read access to the object behind `item`, `None` for empty items and
    /// items of other storages.
    pub fn item(&self, item: &Item) -> Option<ItemRef<'_, D>> {
        let (id, object) = self.live_object(item)?;
        Some(ItemRef {
            storage: self,
            id,
            object,
        })
    }

    pub fn item_mut(&mut self, item: &Item) -> Option<ItemMut<'_, D>> {
        let (id, _) = self.live_object(item)?;
        Some(ItemMut { storage: self, id })
    }

    /// Collects the traceable geometry if it changed since the last build.
    pub fn build_rt_scene(&mut self) -> Option<RtBuild<D>> {
        if !self.rt.is_update_required() {
            return None;
        }
        profiling::scope!("DrawStorage::build_rt_scene");
        let mut rt = std::mem::take(&mut self.rt);
        self.fill_tlas(&mut rt);
        let build = rt.take_build();
        self.rt = rt;
        Some(build)
    }

    /// Adds every live static object to `rt`.
    pub fn fill_tlas(&self, rt: &mut RtScene<D>) {
        for (_, object) in self.objects.iter() {
            let Some(bucket) = self.buckets.get(object.bucket) else {
                continue;
            };
            let Some(mesh) = bucket.mesh.as_static() else {
                continue;
            };
            rt.add_instance(
                object.transform,
                &bucket.material,
                mesh,
                object.ibo_offset,
                object.ibo_len,
                object.ty,
            );
        }
    }

    pub fn needs_tlas_update(&self) -> bool {
        self.rt.is_update_required()
    }

    pub fn set_visibility_frozen(&mut self, frozen: bool) {
        self.options.freeze_visibility = frozen;
    }

    pub fn options(&self) -> &DrawStorageOptions {
        &self.options
    }

    pub fn state(&self) -> CommitState {
        self.state
    }

    pub fn objects(&self) -> &ObjectTable {
        &self.objects
    }

    pub fn buckets(&self) -> &BucketRegistry<D> {
        &self.buckets
    }

    pub fn commands(&self) -> &CommandRegistry<D> {
        &self.commands
    }

    pub fn clusters(&self) -> &ClusterTable {
        &self.clusters
    }

    pub fn instances(&self) -> &InstanceStorage<D> {
        &self.instances
    }

    pub fn stats(&self) -> DrawStorageStats {
        DrawStorageStats {
            objects: self.objects.live_count(),
            free_objects: self.objects.free_count(),
            buckets: self.buckets.len(),
            commands: self.commands.len(),
            clusters: self.clusters.len(),
            instances: self.instances.live_count(),
            total_payload: self.commands.iter().map(|c| c.max_payload).sum(),
        }
    }
}
