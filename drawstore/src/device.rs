//! The seam between the draw storage and a gpu api.
//!
//! The storage never talks to a graphics api directly. Everything it needs,
//! buffer creation, bind groups, synchronization, dispatch and indirect draws,
//! goes through these traits. [`crate::backend::WgpuDevice`] is the production
//! implementation.

use wgpu::BufferUsages;

use crate::DeviceError;

/// Factory for the gpu objects the storage owns.
pub trait GpuDevice: Send + Sync + 'static {
    /// Buffers are shared between the storage and in-flight binding sets, so
    /// they must be cheap to clone.
    type Buffer: Clone;
    type BindGroup;
    type ComputePipeline;
    type RenderPipeline;
    type TextureView;
    type Sampler;

    /// Creates a zero initialized buffer.
    fn create_buffer(&self, label: &str, size: u64, usage: BufferUsages) -> Self::Buffer;

    /// Creates a buffer holding `contents`.
    fn create_buffer_init(&self, label: &str, contents: &[u8], usage: BufferUsages) -> Self::Buffer;

    fn write_buffer(&self, buffer: &Self::Buffer, offset: u64, data: &[u8]);

    /// Creates a bind group matching the first bind group layout of the given
    /// pipeline.
    fn create_bind_group(
        &self,
        label: &str,
        layout: LayoutSource<'_, Self>,
        entries: &[BindingEntry<'_, Self>],
    ) -> Self::BindGroup;

    /// Blocks until every submitted piece of gpu work has finished.
    fn wait_idle(&self);

    fn push_allocation_scope(&self);

    fn pop_allocation_scope(&self) -> Result<(), DeviceError>;
}

/// Which pipeline a bind group is laid out for.
pub enum LayoutSource<'a, D: GpuDevice + ?Sized> {
    Compute(&'a D::ComputePipeline),
    Render(&'a D::RenderPipeline),
}

pub struct BindingEntry<'a, D: GpuDevice + ?Sized> {
    pub binding: u32,
    pub resource: Binding<'a, D>,
}

impl<'a, D: GpuDevice + ?Sized> BindingEntry<'a, D> {
    pub fn new(binding: u32, resource: Binding<'a, D>) -> Self {
        Self { binding, resource }
    }
}

pub enum Binding<'a, D: GpuDevice + ?Sized> {
    Buffer(&'a D::Buffer),
    BufferArray(&'a [&'a D::Buffer]),
    Texture(&'a D::TextureView),
    TextureArray(&'a [&'a D::TextureView]),
    Sampler(&'a D::Sampler),
}

/// Records compute work.
pub trait ComputeEncoder<'a, D: GpuDevice> {
    /// Runs `threads` invocations of `pipeline`.
    fn dispatch_threads(
        &mut self,
        pipeline: &'a D::ComputePipeline,
        bind_group: &'a D::BindGroup,
        push_constants: &[u8],
        threads: u32,
    );
}

/// Records draw calls.
pub trait RenderEncoder<'a, D: GpuDevice> {
    /// Issues a single non-indexed indirect draw whose arguments live at
    /// `offset` inside `indirect`.
    fn draw_indirect_command(
        &mut self,
        pipeline: &'a D::RenderPipeline,
        bind_group: &'a D::BindGroup,
        push_constants: &[u8],
        indirect: &'a D::Buffer,
        offset: u64,
    );
}
