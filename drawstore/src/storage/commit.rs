use arrayvec::ArrayVec;
use encase::{internal::WriteInto, ShaderType, StorageBuffer};
use wgpu::BufferUsages;

use crate::{
    device::{Binding, BindingEntry, GpuDevice, LayoutSource},
    format_sso,
    managers::{ClusterTable, CommandRegistry, GeometrySource, IndirectCmd},
    resources::SceneGlobals,
    storage::{CommitState, DrawStorage},
    types::{Viewport, VIEWPORT_COUNT},
    util::error_scope::AllocationErrorScope,
    DrawStorageError,
};

/// Binding slots of the culling programs.
pub mod task_binding {
    pub const SCENE: u32 = 0;
    pub const PAYLOAD: u32 = 1;
    pub const INSTANCE: u32 = 2;
    pub const BUCKET: u32 = 3;
    pub const INDIRECT: u32 = 4;
    pub const CLUSTERS: u32 = 5;
    pub const HI_Z: u32 = 6;
}

/// Binding slots of the cluster draw programs.
pub mod draw_binding {
    pub const SCENE: u32 = 0;
    pub const PAYLOAD: u32 = 1;
    pub const INSTANCE: u32 = 2;
    pub const BUCKET: u32 = 3;
    pub const IBO: u32 = 4;
    pub const VBO: u32 = 5;
    pub const DIFFUSE: u32 = 6;
    pub const SAMPLER: u32 = 7;
}

/// Size of one entry of the visible cluster list.
pub const VISIBLE_CLUSTER_SIZE: u64 = 16;

/// Gpu buffers are never created empty.
const MIN_BUFFER_SIZE: u64 = 16;

/// The culling dispatch of one viewport.
pub struct TaskCmd<D: GpuDevice> {
    pub viewport: Viewport,
    pub bind_group: Option<D::BindGroup>,
}

impl<D: GpuDevice> TaskCmd<D> {
    /// The main viewport additionally occlusion culls against the hi-z pyramid.
    pub fn uses_hi_z(&self) -> bool {
        self.viewport == Viewport::Main
    }
}

/// Per viewport culling output.
pub struct View<D: GpuDevice> {
    /// Cluster references appended by the culling program.
    pub vis_clusters: D::Buffer,
    /// One [`IndirectCmd`] per command.
    pub indirect: D::Buffer,
    pub desc_init: D::BindGroup,
    pub task: TaskCmd<D>,
}

/// Shape of the tables the gpu resources were last built for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutSignature {
    pub cluster_count: usize,
    /// `(first_payload, max_payload)` of every command.
    pub payload: Vec<(u32, u32)>,
}

impl LayoutSignature {
    fn new<D: GpuDevice>(clusters: &ClusterTable, commands: &CommandRegistry<D>) -> Self {
        Self {
            cluster_count: clusters.len(),
            payload: commands.payload_layout(),
        }
    }
}

/// Gpu resources whose size depends on the table sizes.
pub struct GpuResources<D: GpuDevice> {
    pub cluster_buffer: D::Buffer,
    pub views: [View<D>; VIEWPORT_COUNT],
    pub signature: LayoutSignature,
}

fn encode<T: ShaderType + WriteInto>(
    what: &'static str,
    value: &T,
) -> Result<Vec<u8>, DrawStorageError> {
    let mut buffer = StorageBuffer::new(Vec::new());
    buffer.write(value).map_err(|e| DrawStorageError::Encode {
        what,
        message: e.to_string(),
    })?;
    let mut bytes = buffer.into_inner();
    if (bytes.len() as u64) < MIN_BUFFER_SIZE {
        bytes.resize(MIN_BUFFER_SIZE as usize, 0);
    }
    Ok(bytes)
}

impl<D: GpuDevice> DrawStorage<D> {
    /// Brings the payload layout, the cluster buffer and the per viewport
    /// buffers up to date.
    ///
    /// Returns true if gpu resources were recreated, in which case every bind
    /// group has to be rebuilt.
    pub fn commit(&mut self) -> Result<bool, DrawStorageError> {
        profiling::scope!("DrawStorage::commit");

        self.reclaim_released();

        if self.state == CommitState::Clean {
            log::trace!("Commit skipped, nothing changed");
            return Ok(false);
        }
        if self.commands.is_empty() {
            log::trace!("Commit skipped, there are no commands");
            return Ok(false);
        }

        self.commands.layout_payload();

        if self.instances.flush(&*self.device) {
            self.bindings_stale = true;
        }

        let clusters = encode("clusters", &self.clusters.shader_data())?;
        let signature = LayoutSignature::new(&self.clusters, &self.commands);

        if let Some(gpu) = &self.gpu {
            if gpu.signature == signature {
                profiling::scope!("Upload Clusters");
                self.device.write_buffer(&gpu.cluster_buffer, 0, &clusters);
                self.state = CommitState::Clean;
                return Ok(false);
            }
        }

        log::debug!(
            "Rebuilding draw storage buffers: {} clusters, {} commands, {} payload",
            signature.cluster_count,
            signature.payload.len(),
            self.commands.total_payload()
        );

        self.device.wait_idle();
        self.gpu = None;

        let scope = AllocationErrorScope::new(&*self.device);
        let gpu = self.create_gpu_resources(&clusters, signature);
        scope.end().map_err(|source| DrawStorageError::Allocation {
            what: "cluster and viewport buffers",
            source,
        })?;

        self.gpu = Some(gpu);
        self.bindings_stale = true;
        self.state = CommitState::Clean;
        Ok(true)
    }

    fn create_gpu_resources(&self, clusters: &[u8], signature: LayoutSignature) -> GpuResources<D> {
        profiling::scope!("Create Gpu Resources");

        let device = &*self.device;
        let cluster_buffer = device.create_buffer_init(
            "cluster buffer",
            clusters,
            BufferUsages::STORAGE | BufferUsages::COPY_DST,
        );

        let indirect_table: &[IndirectCmd] = self.commands.indirect_table();
        let vis_size = (self.commands.total_payload() as u64 * VISIBLE_CLUSTER_SIZE).max(MIN_BUFFER_SIZE);

        let views = Viewport::ALL.map(|viewport| {
            let vis_clusters = device.create_buffer(
                &format_sso!("visible clusters {viewport:?}"),
                vis_size,
                BufferUsages::STORAGE,
            );
            let indirect = device.create_buffer_init(
                &format_sso!("indirect commands {viewport:?}"),
                bytemuck::cast_slice(indirect_table),
                BufferUsages::STORAGE | BufferUsages::INDIRECT | BufferUsages::COPY_DST,
            );
            let desc_init = device.create_bind_group(
                &format_sso!("cluster init {viewport:?}"),
                LayoutSource::Compute(&self.visibility.cluster_init),
                &[BindingEntry::new(task_binding::INDIRECT, Binding::Buffer(&indirect))],
            );

            View {
                vis_clusters,
                indirect,
                desc_init,
                task: TaskCmd {
                    viewport,
                    bind_group: None,
                },
            }
        });

        GpuResources {
            cluster_buffer,
            views,
            signature,
        }
    }

    /// Commits, then rebuilds the per bucket descriptors and every bind group.
    pub fn prepare_uniforms(&mut self, scene: &SceneGlobals<D>) -> Result<(), DrawStorageError> {
        profiling::scope!("DrawStorage::prepare_uniforms");

        if self.commands.is_empty() {
            return Ok(());
        }

        self.commit()?;
        self.upload_buckets()?;
        self.invalidate_ubo(scene)
    }

    fn upload_buckets(&mut self) -> Result<(), DrawStorageError> {
        profiling::scope!("Upload Buckets");

        let data = encode("buckets", &self.buckets.shader_data())?;

        let scope = AllocationErrorScope::new(&*self.device);
        let buffer = self
            .device
            .create_buffer_init("bucket buffer", &data, BufferUsages::STORAGE);
        scope.end().map_err(|source| DrawStorageError::Allocation {
            what: "bucket buffer",
            source,
        })?;

        self.device.wait_idle();
        self.bucket_buffer = Some(buffer);
        self.bindings_stale = true;
        Ok(())
    }

    /// Rebuilds the bind group of every culling task and every command in
    /// every viewport it is drawn in.
    pub fn invalidate_ubo(&mut self, scene: &SceneGlobals<D>) -> Result<(), DrawStorageError> {
        profiling::scope!("DrawStorage::invalidate_ubo");

        let Self {
            device,
            visibility,
            buckets,
            commands,
            instances,
            gpu,
            bucket_buffer,
            bindings_stale,
            ..
        } = self;

        let (Some(gpu), Some(bucket_buffer), Some(instance_buffer)) = (gpu.as_mut(), bucket_buffer.as_ref(), instances.buffer())
        else {
            log::trace!("Skipping rebind, gpu resources are not built yet");
            return Ok(());
        };

        device.wait_idle();

        let ibos: Vec<&D::Buffer> = buckets.iter().map(|b| b.mesh.index_buffer()).collect();
        let vbos: Vec<&D::Buffer> = buckets.iter().map(|b| b.mesh.vertex_buffer()).collect();
        let textures: Vec<&D::TextureView> = buckets
            .iter()
            .map(|b| b.material.texture.as_deref().unwrap_or(&scene.fallback_texture))
            .collect();

        for view in &mut gpu.views {
            let vp = view.task.viewport;
            let pipeline = if view.task.uses_hi_z() {
                &visibility.cluster_task_hiz
            } else {
                &visibility.cluster_task
            };

            let mut entries = ArrayVec::<BindingEntry<'_, D>, 7>::new();
            entries.push(BindingEntry::new(task_binding::SCENE, Binding::Buffer(&scene.uniforms[vp.index()])));
            entries.push(BindingEntry::new(task_binding::PAYLOAD, Binding::Buffer(&view.vis_clusters)));
            entries.push(BindingEntry::new(task_binding::INSTANCE, Binding::Buffer(instance_buffer)));
            entries.push(BindingEntry::new(task_binding::BUCKET, Binding::Buffer(bucket_buffer)));
            entries.push(BindingEntry::new(task_binding::INDIRECT, Binding::Buffer(&view.indirect)));
            entries.push(BindingEntry::new(task_binding::CLUSTERS, Binding::Buffer(&gpu.cluster_buffer)));
            if view.task.uses_hi_z() {
                entries.push(BindingEntry::new(task_binding::HI_Z, Binding::Texture(&scene.hi_z)));
            }

            view.task.bind_group = Some(device.create_bind_group(
                &format_sso!("cluster task {vp:?}"),
                LayoutSource::Compute(pipeline),
                &entries,
            ));
        }

        for (idx, command) in commands.iter_mut().enumerate() {
            for vp in Viewport::ALL {
                let Some(pipeline) = command.pipeline(vp).cloned() else {
                    continue;
                };
                let Some(set) = command.bindings[vp.index()].as_mut() else {
                    continue;
                };

                let instance = match command.source {
                    GeometrySource::Batched => &gpu.cluster_buffer,
                    GeometrySource::Instanced => instance_buffer,
                };

                // Only bindful commands are tied to a bucket.
                let single;
                let (ibo, vbo, diffuse) = match command.bucket {
                    Some(bucket) => {
                        single = (
                            [ibos[bucket.index()]],
                            [vbos[bucket.index()]],
                            textures[bucket.index()],
                        );
                        (
                            Binding::BufferArray(&single.0[..]),
                            Binding::BufferArray(&single.1[..]),
                            Binding::Texture(single.2),
                        )
                    }
                    None => (
                        Binding::BufferArray(&ibos[..]),
                        Binding::BufferArray(&vbos[..]),
                        Binding::TextureArray(&textures[..]),
                    ),
                };

                let entries = [
                    BindingEntry::new(draw_binding::SCENE, Binding::Buffer(&scene.uniforms[vp.index()])),
                    BindingEntry::new(draw_binding::PAYLOAD, Binding::Buffer(&gpu.views[vp.index()].vis_clusters)),
                    BindingEntry::new(draw_binding::INSTANCE, Binding::Buffer(instance)),
                    BindingEntry::new(draw_binding::BUCKET, Binding::Buffer(bucket_buffer)),
                    BindingEntry::new(draw_binding::IBO, ibo),
                    BindingEntry::new(draw_binding::VBO, vbo),
                    BindingEntry::new(draw_binding::DIFFUSE, diffuse),
                    BindingEntry::new(draw_binding::SAMPLER, Binding::Sampler(&scene.sampler)),
                ];

                set.group = Some(device.create_bind_group(
                    &format_sso!("draw command {idx} {vp:?}"),
                    LayoutSource::Render(&*pipeline),
                    &entries,
                ));
            }
        }

        *bindings_stale = false;
        Ok(())
    }

    /// Brings every gpu resource up to date. Call once per frame before
    /// culling. Does nothing if nothing changed.
    pub fn provision(&mut self, scene: &SceneGlobals<D>) -> Result<(), DrawStorageError> {
        profiling::scope!("DrawStorage::provision");

        self.reclaim_released();

        let rebuilt = self.commit()?;

        if self.buckets.changed() || rebuilt || self.bucket_buffer.is_none() {
            self.upload_buckets()?;
        }

        if self.bindings_stale {
            self.invalidate_ubo(scene)?;
        }
        Ok(())
    }

    pub fn gpu_resources(&self) -> Option<&GpuResources<D>> {
        self.gpu.as_ref()
    }

    pub fn bucket_buffer(&self) -> Option<&D::Buffer> {
        self.bucket_buffer.as_ref()
    }
}
