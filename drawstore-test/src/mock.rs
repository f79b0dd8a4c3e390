use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use bytemuck::Pod;
use drawstore::{
    device::{Binding, BindingEntry, ComputeEncoder, GpuDevice, LayoutSource, RenderEncoder},
    DeviceError,
};
use parking_lot::Mutex;
use wgpu::BufferUsages;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug)]
pub struct MockBuffer {
    pub id: u64,
    pub label: String,
    pub size: u64,
    pub usage: BufferUsages,
    pub data: Mutex<Vec<u8>>,
}

impl MockBuffer {
    pub fn new(label: &str, size: u64, usage: BufferUsages) -> Arc<Self> {
        Arc::new(Self {
            id: next_id(),
            label: label.to_owned(),
            size,
            usage,
            data: Mutex::new(vec![0; size as usize]),
        })
    }

    /// Reinterprets the contents as `T`s.
    pub fn read<T: Pod>(&self) -> Vec<T> {
        self.data
            .lock()
            .chunks_exact(std::mem::size_of::<T>())
            .map(bytemuck::pod_read_unaligned)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockPipeline {
    pub name: String,
}

impl MockPipeline {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_owned() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockTexture {
    pub id: u64,
}

impl MockTexture {
    pub fn new() -> Self {
        Self { id: next_id() }
    }
}

impl Default for MockTexture {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockSampler;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockResource {
    Buffer(u64),
    BufferArray(Vec<u64>),
    Texture(u64),
    TextureArray(Vec<u64>),
    Sampler,
}

#[derive(Debug, Clone)]
pub struct MockBindGroup {
    pub label: String,
    pub layout: String,
    pub entries: Vec<(u32, MockResource)>,
}

impl MockBindGroup {
    pub fn resource(&self, binding: u32) -> Option<&MockResource> {
        self.entries.iter().find(|(b, _)| *b == binding).map(|(_, r)| r)
    }
}

#[derive(Debug, Default)]
pub struct MockStats {
    pub buffers: Vec<Arc<MockBuffer>>,
    /// `(buffer id, offset, length)` of every write.
    pub writes: Vec<(u64, u64, usize)>,
    pub bind_groups: usize,
    pub wait_idle: usize,
    pub open_scopes: usize,
}

/// Device recording everything asked of it.
#[derive(Default)]
pub struct MockDevice {
    pub stats: Mutex<MockStats>,
    /// When set, every closing allocation scope reports out of memory.
    pub fail_allocations: Mutex<bool>,
}

impl MockDevice {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn buffers_created(&self) -> usize {
        self.stats.lock().buffers.len()
    }

    pub fn wait_idle_count(&self) -> usize {
        self.stats.lock().wait_idle
    }

    pub fn write_count(&self) -> usize {
        self.stats.lock().writes.len()
    }

    pub fn last_buffer(&self, label: &str) -> Option<Arc<MockBuffer>> {
        self.stats.lock().buffers.iter().rev().find(|b| b.label == label).cloned()
    }
}

impl GpuDevice for MockDevice {
    type Buffer = Arc<MockBuffer>;
    type BindGroup = MockBindGroup;
    type ComputePipeline = MockPipeline;
    type RenderPipeline = MockPipeline;
    type TextureView = MockTexture;
    type Sampler = MockSampler;

    fn create_buffer(&self, label: &str, size: u64, usage: BufferUsages) -> Self::Buffer {
        let buffer = MockBuffer::new(label, size, usage);
        self.stats.lock().buffers.push(Arc::clone(&buffer));
        buffer
    }

    fn create_buffer_init(&self, label: &str, contents: &[u8], usage: BufferUsages) -> Self::Buffer {
        let buffer = self.create_buffer(label, contents.len() as u64, usage);
        buffer.data.lock().copy_from_slice(contents);
        buffer
    }

    fn write_buffer(&self, buffer: &Self::Buffer, offset: u64, data: &[u8]) {
        let offset_usize = offset as usize;
        buffer.data.lock()[offset_usize..offset_usize + data.len()].copy_from_slice(data);
        self.stats.lock().writes.push((buffer.id, offset, data.len()));
    }

    fn create_bind_group(
        &self,
        label: &str,
        layout: LayoutSource<'_, Self>,
        entries: &[BindingEntry<'_, Self>],
    ) -> Self::BindGroup {
        let layout = match layout {
            LayoutSource::Compute(pipeline) | LayoutSource::Render(pipeline) => pipeline.name.clone(),
        };
        let entries = entries
            .iter()
            .map(|entry| {
                let resource = match entry.resource {
                    Binding::Buffer(buffer) => MockResource::Buffer(buffer.id),
                    Binding::BufferArray(buffers) => MockResource::BufferArray(buffers.iter().map(|b| b.id).collect()),
                    Binding::Texture(view) => MockResource::Texture(view.id),
                    Binding::TextureArray(views) => MockResource::TextureArray(views.iter().map(|v| v.id).collect()),
                    Binding::Sampler(_) => MockResource::Sampler,
                };
                (entry.binding, resource)
            })
            .collect();

        self.stats.lock().bind_groups += 1;
        MockBindGroup {
            label: label.to_owned(),
            layout,
            entries,
        }
    }

    fn wait_idle(&self) {
        self.stats.lock().wait_idle += 1;
    }

    fn push_allocation_scope(&self) {
        self.stats.lock().open_scopes += 1;
    }

    fn pop_allocation_scope(&self) -> Result<(), DeviceError> {
        let mut stats = self.stats.lock();
        assert!(stats.open_scopes > 0, "popped an allocation scope that was never pushed");
        stats.open_scopes -= 1;
        if *self.fail_allocations.lock() {
            return Err(DeviceError::OutOfMemory {
                message: String::from("mock device is out of memory"),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub pipeline: String,
    pub bind_group: String,
    pub push_constants: Vec<u8>,
    pub threads: u32,
}

#[derive(Debug, Default)]
pub struct MockComputeEncoder {
    pub dispatches: Vec<Dispatch>,
}

impl<'a> ComputeEncoder<'a, MockDevice> for MockComputeEncoder {
    fn dispatch_threads(
        &mut self,
        pipeline: &'a MockPipeline,
        bind_group: &'a MockBindGroup,
        push_constants: &[u8],
        threads: u32,
    ) {
        self.dispatches.push(Dispatch {
            pipeline: pipeline.name.clone(),
            bind_group: bind_group.label.clone(),
            push_constants: push_constants.to_vec(),
            threads,
        });
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draw {
    pub pipeline: String,
    pub bind_group: String,
    pub push_constants: Vec<u8>,
    pub indirect: String,
    pub offset: u64,
}

#[derive(Debug, Default)]
pub struct MockRenderEncoder {
    pub draws: Vec<Draw>,
}

impl<'a> RenderEncoder<'a, MockDevice> for MockRenderEncoder {
    fn draw_indirect_command(
        &mut self,
        pipeline: &'a MockPipeline,
        bind_group: &'a MockBindGroup,
        push_constants: &[u8],
        indirect: &'a Arc<MockBuffer>,
        offset: u64,
    ) {
        self.draws.push(Draw {
            pipeline: pipeline.name.clone(),
            bind_group: bind_group.label.clone(),
            push_constants: push_constants.to_vec(),
            indirect: indirect.label.clone(),
            offset,
        });
    }
}

/// Decodes `(first, count)` push constants.
pub fn push_pair(push_constants: &[u8]) -> (u32, u32) {
    let word = |i: usize| {
        let mut bytes = [0; 4];
        bytes.copy_from_slice(&push_constants[i * 4..i * 4 + 4]);
        u32::from_ne_bytes(bytes)
    };
    (word(0), word(1))
}
