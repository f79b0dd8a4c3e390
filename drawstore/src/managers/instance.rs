use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use wgpu::BufferUsages;

use crate::device::GpuDevice;

const STARTING_SIZE: usize = 16;
const NEEDED_USAGES: BufferUsages = BufferUsages::STORAGE.union(BufferUsages::COPY_DST);

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceSlot(pub u32);

impl InstanceSlot {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct InstanceFlags: u32 {
        /// Drawn see-through in the gbuffer pass.
        const GHOST = 1 << 0;
    }
}

/// Per instance data read by the draw programs.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct InstanceDesc {
    /// Affine part of the object matrix, column major.
    pub pos: [[f32; 3]; 4],
    pub fatness: f32,
    /// Offset of the skinning matrices in the pose buffer.
    pub anim_ptr: u32,
    /// Current wind sway, zero for objects without wind.
    pub wind: f32,
    pub flags: u32,
}

impl Default for InstanceDesc {
    fn default() -> Self {
        Self::from_matrix(Mat4::IDENTITY)
    }
}

impl InstanceDesc {
    pub fn from_matrix(matrix: Mat4) -> Self {
        let mut desc = Self::zeroed();
        desc.set_matrix(matrix);
        desc
    }

    pub fn set_matrix(&mut self, matrix: Mat4) {
        self.pos = [
            matrix.x_axis.truncate().to_array(),
            matrix.y_axis.truncate().to_array(),
            matrix.z_axis.truncate().to_array(),
            matrix.w_axis.truncate().to_array(),
        ];
    }

    pub fn translation(&self) -> Vec3 {
        Vec3::from_array(self.pos[3])
    }

    pub fn flags(&self) -> InstanceFlags {
        InstanceFlags::from_bits_truncate(self.flags)
    }

    pub fn set_flags(&mut self, flags: InstanceFlags) {
        self.flags = flags.bits();
    }
}

/// Growable gpu array of [`InstanceDesc`] with a cpu mirror.
///
/// Slots are handed out from a freelist. Writes are recorded as stale and
/// uploaded on [`InstanceStorage::flush`]. When the array grows the gpu buffer
/// is recreated, which invalidates every bind group referencing it.
pub struct InstanceStorage<D: GpuDevice> {
    inner: Option<D::Buffer>,
    data: Vec<InstanceDesc>,

    current_count: usize,
    freelist: Vec<usize>,

    stale: Vec<usize>,
}

impl<D: GpuDevice> InstanceStorage<D> {
    pub fn new() -> Self {
        Self {
            inner: None,
            data: vec![InstanceDesc::default(); STARTING_SIZE],
            current_count: 0,
            freelist: (0..STARTING_SIZE).rev().collect(),
            stale: Vec::new(),
        }
    }

    pub fn alloc(&mut self) -> InstanceSlot {
        if self.freelist.is_empty() {
            let old_count = self.data.len();
            let new_count = (old_count + 1).next_power_of_two();
            self.data.resize(new_count, InstanceDesc::default());
            self.freelist.extend((old_count..new_count).rev());
        }

        // Refilled above, lowest slots are at the end.
        let idx = self.freelist.pop().unwrap_or_default();
        self.data[idx] = InstanceDesc::default();
        self.stale.push(idx);
        InstanceSlot(idx as u32)
    }

    pub fn free(&mut self, slot: InstanceSlot) {
        debug_assert!(!self.freelist.contains(&slot.index()));
        self.freelist.push(slot.index());
    }

    pub fn get(&self, slot: InstanceSlot) -> &InstanceDesc {
        &self.data[slot.index()]
    }

    pub fn update(&mut self, slot: InstanceSlot, f: impl FnOnce(&mut InstanceDesc)) {
        f(&mut self.data[slot.index()]);
        self.stale.push(slot.index());
    }

    pub fn buffer(&self) -> Option<&D::Buffer> {
        self.inner.as_ref()
    }

    /// Amount of slots currently in use.
    pub fn live_count(&self) -> usize {
        self.data.len() - self.freelist.len()
    }

    /// Uploads every stale slot. Returns true if the gpu buffer was recreated.
    pub fn flush(&mut self, device: &D) -> bool {
        profiling::scope!("InstanceStorage::flush");

        if self.inner.is_none() || self.current_count != self.data.len() {
            if self.inner.is_some() {
                device.wait_idle();
            }
            log::debug!("Recreating instance buffer with {} slots", self.data.len());
            self.inner = Some(device.create_buffer_init(
                "instance buffer",
                bytemuck::cast_slice(&self.data),
                NEEDED_USAGES,
            ));
            self.current_count = self.data.len();
            self.stale.clear();
            return true;
        }

        let Some(buffer) = &self.inner else {
            return false;
        };

        self.stale.sort_unstable();
        self.stale.dedup();
        let stride = std::mem::size_of::<InstanceDesc>() as u64;
        for idx in self.stale.drain(..) {
            device.write_buffer(buffer, idx as u64 * stride, bytemuck::bytes_of(&self.data[idx]));
        }
        false
    }
}

impl<D: GpuDevice> Default for InstanceStorage<D> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use glam::{Mat4, Vec3};

    use super::{InstanceDesc, InstanceFlags};

    #[test]
    fn desc_is_64_bytes() {
        assert_eq!(std::mem::size_of::<InstanceDesc>(), 64);
    }

    #[test]
    fn desc_keeps_translation() {
        let desc = InstanceDesc::from_matrix(Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(desc.translation(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(desc.pos[0], [1.0, 0.0, 0.0]);
    }

    #[test]
    fn flags_round_trip_through_bits() {
        let mut desc = InstanceDesc::default();
        desc.set_flags(InstanceFlags::GHOST);
        assert_eq!(desc.flags, 1);
        assert!(desc.flags().contains(InstanceFlags::GHOST));
    }
}
