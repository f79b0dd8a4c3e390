use std::ops::Range;

use encase::ShaderType;
use glam::Vec3;

use crate::{
    managers::{BucketId, CommandId, InstanceSlot},
    types::PackedCluster,
    util::frustum::BoundingSphere,
};

/// Value written in place of an absent id in gpu-side data.
pub const SHADER_NONE: u32 = u32::MAX;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClusterId(pub u32);

impl ClusterId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One culling unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cluster {
    pub center: Vec3,
    /// Negative for freed clusters, which are never visible.
    pub radius: f32,
    pub bucket: BucketId,
    pub command: Option<CommandId>,
    pub first_meshlet: u32,
    pub meshlet_count: u32,
    pub instance: Option<InstanceSlot>,
}

impl Cluster {
    pub const EMPTY: Self = Self {
        center: Vec3::ZERO,
        radius: -1.0,
        bucket: BucketId(0),
        command: None,
        first_meshlet: 0,
        meshlet_count: 0,
        instance: None,
    };

    pub fn is_empty(&self) -> bool {
        self.command.is_none()
    }

    pub fn bounding_sphere(&self) -> BoundingSphere {
        BoundingSphere {
            center: self.center,
            radius: self.radius,
        }
    }
}

#[derive(Debug, Copy, Clone, ShaderType)]
pub struct ShaderCluster {
    pub center: Vec3,
    pub radius: f32,
    pub bucket_id: u32,
    pub command_id: u32,
    pub first_meshlet: u32,
    pub meshlet_count: u32,
    pub instance_id: u32,
}

impl From<&Cluster> for ShaderCluster {
    fn from(c: &Cluster) -> Self {
        Self {
            center: c.center,
            radius: c.radius,
            bucket_id: c.bucket.0,
            command_id: c.command.map_or(SHADER_NONE, |c| c.0),
            first_meshlet: c.first_meshlet,
            meshlet_count: c.meshlet_count,
            instance_id: c.instance.map_or(SHADER_NONE, |i| i.0),
        }
    }
}

/// Flat, never compacted, array of clusters.
///
/// Indices stay stable for the lifetime of the table so gpu data built from a
/// previous frame never refers to a different cluster.
#[derive(Debug, Default)]
pub struct ClusterTable {
    clusters: Vec<Cluster>,
}

impl ClusterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one single-meshlet cluster per packed cluster.
    pub fn push_packed(
        &mut self,
        packed: &[PackedCluster],
        first_meshlet: u32,
        bucket: BucketId,
        command: CommandId,
    ) -> ClusterId {
        let id = ClusterId(self.clusters.len() as u32);
        self.clusters
            .extend(packed.iter().zip(first_meshlet..).map(|(p, meshlet)| Cluster {
                center: p.pos,
                radius: p.r,
                bucket,
                command: Some(command),
                first_meshlet: meshlet,
                meshlet_count: 1,
                instance: None,
            }));
        id
    }

    /// Appends a single cluster covering a whole object.
    pub fn push_whole(
        &mut self,
        radius: f32,
        first_meshlet: u32,
        meshlet_count: u32,
        bucket: BucketId,
        command: CommandId,
    ) -> ClusterId {
        let id = ClusterId(self.clusters.len() as u32);
        self.clusters.push(Cluster {
            center: Vec3::ZERO,
            radius,
            bucket,
            command: Some(command),
            first_meshlet,
            meshlet_count,
            instance: None,
        });
        id
    }

    /// Resets `count` clusters starting at `first` to the empty sentinel.
    pub fn reset(&mut self, first: ClusterId, count: u32) {
        let range = Self::range(first, count);
        for cluster in &mut self.clusters[range] {
            *cluster = Cluster::EMPTY;
        }
    }

    pub fn get(&self, id: ClusterId) -> Option<&Cluster> {
        self.clusters.get(id.index())
    }

    pub fn get_mut(&mut self, id: ClusterId) -> Option<&mut Cluster> {
        self.clusters.get_mut(id.index())
    }

    pub fn slice(&self, first: ClusterId, count: u32) -> &[Cluster] {
        &self.clusters[Self::range(first, count)]
    }

    pub fn as_slice(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn shader_data(&self) -> Vec<ShaderCluster> {
        profiling::scope!("ClusterTable::shader_data");
        self.clusters.iter().map(ShaderCluster::from).collect()
    }

    fn range(first: ClusterId, count: u32) -> Range<usize> {
        first.index()..first.index() + count as usize
    }
}

#[cfg(test)]
mod test {
    use glam::Vec3;

    use super::{Cluster, ClusterTable, ShaderCluster, SHADER_NONE};
    use crate::{
        managers::{BucketId, CommandId},
        types::PackedCluster,
    };

    fn packed(n: usize) -> Vec<PackedCluster> {
        (0..n)
            .map(|i| PackedCluster {
                pos: Vec3::new(i as f32, 0.0, 0.0),
                r: 2.0,
            })
            .collect()
    }

    #[test]
    fn packed_clusters_are_single_meshlets() {
        let mut table = ClusterTable::new();
        let id = table.push_packed(&packed(3), 10, BucketId(1), CommandId(2));

        assert_eq!(id.0, 0);
        assert_eq!(table.len(), 3);
        for (i, cluster) in table.slice(id, 3).iter().enumerate() {
            assert_eq!(cluster.first_meshlet, 10 + i as u32);
            assert_eq!(cluster.meshlet_count, 1);
            assert_eq!(cluster.center, Vec3::new(i as f32, 0.0, 0.0));
            assert_eq!(cluster.command, Some(CommandId(2)));
        }
    }

    #[test]
    fn whole_object_cluster_spans_range() {
        let mut table = ClusterTable::new();
        table.push_packed(&packed(2), 0, BucketId(0), CommandId(0));
        let id = table.push_whole(5.0, 4, 6, BucketId(3), CommandId(1));

        assert_eq!(id.0, 2);
        let cluster = table.get(id).unwrap();
        assert_eq!(cluster.radius, 5.0);
        assert_eq!(cluster.first_meshlet, 4);
        assert_eq!(cluster.meshlet_count, 6);
    }

    #[test]
    fn reset_keeps_indices_stable() {
        let mut table = ClusterTable::new();
        let first = table.push_packed(&packed(2), 0, BucketId(0), CommandId(0));
        let second = table.push_whole(1.0, 2, 1, BucketId(0), CommandId(0));

        table.reset(first, 2);

        assert_eq!(table.len(), 3);
        assert!(table.slice(first, 2).iter().all(|c| *c == Cluster::EMPTY));
        assert!(!table.get(second).unwrap().is_empty());
        assert!(table.get(first).unwrap().bounding_sphere().is_empty());
    }

    #[test]
    fn absent_ids_become_shader_none() {
        let shader = ShaderCluster::from(&Cluster::EMPTY);
        assert_eq!(shader.command_id, SHADER_NONE);
        assert_eq!(shader.instance_id, SHADER_NONE);
        assert_eq!(shader.radius, -1.0);
    }
}
