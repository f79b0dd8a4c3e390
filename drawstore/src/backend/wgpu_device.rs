use std::{
    future::Future,
    pin::pin,
    sync::Arc,
    task::{Context, Poll},
};

use wgpu::{
    util::{BufferInitDescriptor, DeviceExt},
    BindGroupDescriptor, BindGroupEntry, BindingResource, BufferBinding, BufferDescriptor, BufferUsages, ShaderStages,
};

use crate::{
    device::{Binding, BindingEntry, ComputeEncoder, GpuDevice, LayoutSource, RenderEncoder},
    util::math::round_up_div,
    DeviceError,
};

/// Workgroup size every culling program is compiled with.
pub const WORKGROUP_SIZE: u32 = 64;

/// [`GpuDevice`] backed by wgpu.
///
/// Culling and draw pipelines are expected to use push constants, so the
/// device must be created with [`wgpu::Features::PUSH_CONSTANTS`], and with
/// the binding array features when bindless buckets are used.
#[derive(Clone)]
pub struct WgpuDevice {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
}

impl WgpuDevice {
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        Self { device, queue }
    }
}

/// Reports whether a blocking poll left the submission queue empty.
fn queue_drained(result: wgpu::MaintainResult) -> bool {
    let drained = result.is_queue_empty();
    if drained {
        log::trace!("Gpu is idle, submission queue is empty");
    } else {
        log::trace!("Gpu wait returned with submissions still in flight");
    }
    drained
}

impl GpuDevice for WgpuDevice {
    type Buffer = Arc<wgpu::Buffer>;
    type BindGroup = wgpu::BindGroup;
    type ComputePipeline = wgpu::ComputePipeline;
    type RenderPipeline = wgpu::RenderPipeline;
    type TextureView = wgpu::TextureView;
    type Sampler = wgpu::Sampler;

    fn create_buffer(&self, label: &str, size: u64, usage: BufferUsages) -> Self::Buffer {
        Arc::new(self.device.create_buffer(&BufferDescriptor {
            label: Some(label),
            size,
            usage,
            mapped_at_creation: false,
        }))
    }

    fn create_buffer_init(&self, label: &str, contents: &[u8], usage: BufferUsages) -> Self::Buffer {
        Arc::new(self.device.create_buffer_init(&BufferInitDescriptor {
            label: Some(label),
            contents,
            usage,
        }))
    }

    fn write_buffer(&self, buffer: &Self::Buffer, offset: u64, data: &[u8]) {
        self.queue.write_buffer(buffer, offset, data);
    }

    fn create_bind_group(
        &self,
        label: &str,
        layout: LayoutSource<'_, Self>,
        entries: &[BindingEntry<'_, Self>],
    ) -> Self::BindGroup {
        let layout = match layout {
            LayoutSource::Compute(pipeline) => pipeline.get_bind_group_layout(0),
            LayoutSource::Render(pipeline) => pipeline.get_bind_group_layout(0),
        };

        // Buffer arrays need their bindings to outlive the entry list.
        let buffer_arrays: Vec<Vec<BufferBinding<'_>>> = entries
            .iter()
            .map(|entry| match entry.resource {
                Binding::BufferArray(buffers) => buffers.iter().map(|b| b.as_entire_buffer_binding()).collect(),
                _ => Vec::new(),
            })
            .collect();

        let wgpu_entries: Vec<BindGroupEntry<'_>> = entries
            .iter()
            .zip(&buffer_arrays)
            .map(|(entry, buffer_array)| BindGroupEntry {
                binding: entry.binding,
                resource: match entry.resource {
                    Binding::Buffer(buffer) => buffer.as_entire_binding(),
                    Binding::BufferArray(_) => BindingResource::BufferArray(buffer_array),
                    Binding::Texture(view) => BindingResource::TextureView(view),
                    Binding::TextureArray(views) => BindingResource::TextureViewArray(views),
                    Binding::Sampler(sampler) => BindingResource::Sampler(sampler),
                },
            })
            .collect();

        self.device.create_bind_group(&BindGroupDescriptor {
            label: Some(label),
            layout: &layout,
            entries: &wgpu_entries,
        })
    }

    fn wait_idle(&self) {
        profiling::scope!("WgpuDevice::wait_idle");
        queue_drained(self.device.poll(wgpu::Maintain::Wait));
    }

    fn push_allocation_scope(&self) {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    }

    fn pop_allocation_scope(&self) -> Result<(), DeviceError> {
        let mut future = pin!(self.device.pop_error_scope());
        match future.as_mut().poll(&mut Context::from_waker(&noop_waker::noop_waker())) {
            Poll::Ready(Some(error)) => Err(DeviceError::OutOfMemory {
                message: error.to_string(),
            }),
            Poll::Ready(None) => Ok(()),
            // We're on webgpu, pretend everything always works.
            Poll::Pending => Ok(()),
        }
    }
}

impl<'a> ComputeEncoder<'a, WgpuDevice> for wgpu::ComputePass<'a> {
    fn dispatch_threads(
        &mut self,
        pipeline: &'a wgpu::ComputePipeline,
        bind_group: &'a wgpu::BindGroup,
        push_constants: &[u8],
        threads: u32,
    ) {
        if threads == 0 {
            return;
        }
        self.set_pipeline(pipeline);
        self.set_bind_group(0, bind_group, &[]);
        if !push_constants.is_empty() {
            self.set_push_constants(0, push_constants);
        }
        self.dispatch_workgroups(round_up_div(threads, WORKGROUP_SIZE), 1, 1);
    }
}

impl<'a> RenderEncoder<'a, WgpuDevice> for wgpu::RenderPass<'a> {
    fn draw_indirect_command(
        &mut self,
        pipeline: &'a wgpu::RenderPipeline,
        bind_group: &'a wgpu::BindGroup,
        push_constants: &[u8],
        indirect: &'a Arc<wgpu::Buffer>,
        offset: u64,
    ) {
        self.set_pipeline(pipeline);
        self.set_bind_group(0, bind_group, &[]);
        if !push_constants.is_empty() {
            self.set_push_constants(ShaderStages::VERTEX_FRAGMENT, 0, push_constants);
        }
        self.draw_indirect(indirect, offset);
    }
}

#[cfg(test)]
mod test {
    use super::queue_drained;

    #[test]
    fn poll_result_reports_queue_state() {
        assert!(queue_drained(wgpu::MaintainResult::SubmissionQueueEmpty));
        assert!(!queue_drained(wgpu::MaintainResult::Ok));
    }
}
