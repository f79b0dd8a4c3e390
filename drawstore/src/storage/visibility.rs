use bytemuck::{Pod, Zeroable};

use crate::{
    device::{ComputeEncoder, GpuDevice},
    managers::ClusterId,
    storage::DrawStorage,
    util::frustum::ShaderFrustum,
};

/// Push constants shared by the culling and draw programs.
#[repr(C)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Pod, Zeroable)]
pub struct DrawPush {
    pub first_meshlet: u32,
    pub meshlet_count: u32,
}

/// A cluster that passed cpu culling.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct VisibleCluster {
    pub cluster: ClusterId,
    pub first_meshlet: u32,
    pub meshlet_count: u32,
}

impl<D: GpuDevice> DrawStorage<D> {
    /// Records the culling of every viewport.
    ///
    /// First the indirect arguments of every command are reset, then every
    /// cluster is tested and the visible ones appended to the visible cluster
    /// list of their command.
    pub fn visibility_pass<'a, E: ComputeEncoder<'a, D>>(&'a self, encoder: &mut E) {
        profiling::scope!("DrawStorage::visibility_pass");

        if self.options.freeze_visibility {
            log::trace!("Visibility is frozen, keeping last frame's results");
            return;
        }
        let Some(gpu) = &self.gpu else {
            return;
        };

        let command_count = gpu.signature.payload.len() as u32;
        if command_count == 0 {
            return;
        }

        for view in &gpu.views {
            encoder.dispatch_threads(&self.visibility.cluster_init, &view.desc_init, &[], command_count);
        }

        let push = DrawPush {
            first_meshlet: 0,
            meshlet_count: gpu.signature.cluster_count as u32,
        };
        for view in &gpu.views {
            let Some(bind_group) = &view.task.bind_group else {
                continue;
            };
            let pipeline = if view.task.uses_hi_z() {
                &self.visibility.cluster_task_hiz
            } else {
                &self.visibility.cluster_task
            };
            encoder.dispatch_threads(pipeline, bind_group, bytemuck::bytes_of(&push), push.meshlet_count);
        }
    }

    /// Cpu equivalent of the culling program without occlusion culling.
    ///
    /// Returns the visible clusters of every command, indexed by command.
    pub fn cull_cpu(&self, frustum: &ShaderFrustum) -> Vec<Vec<VisibleCluster>> {
        profiling::scope!("DrawStorage::cull_cpu");

        let mut visible = Vec::new();
        visible.resize_with(self.commands.len(), Vec::new);

        for (idx, cluster) in self.clusters.as_slice().iter().enumerate() {
            let Some(command) = cluster.command else {
                continue;
            };
            if !frustum.contains_sphere(cluster.bounding_sphere()) {
                continue;
            }
            visible[command.index()].push(VisibleCluster {
                cluster: ClusterId(idx as u32),
                first_meshlet: cluster.first_meshlet,
                meshlet_count: cluster.meshlet_count,
            });
        }

        visible
    }
}
