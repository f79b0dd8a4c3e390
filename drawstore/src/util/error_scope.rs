use crate::{device::GpuDevice, DeviceError};

/// Captures out-of-memory errors raised by every allocation made while the
/// scope is alive.
#[must_use = "All error scopes must end in a call to `end`"]
pub struct AllocationErrorScope<'a, D: GpuDevice> {
    device: &'a D,
    ended: bool,
}

impl<'a, D: GpuDevice> AllocationErrorScope<'a, D> {
    pub fn new(device: &'a D) -> Self {
        device.push_allocation_scope();
        Self { device, ended: false }
    }

    pub fn end(mut self) -> Result<(), DeviceError> {
        self.ended = true;
        self.device.pop_allocation_scope()
    }
}

impl<'a, D: GpuDevice> Drop for AllocationErrorScope<'a, D> {
    fn drop(&mut self) {
        if !self.ended {
            log::error!("AllocationErrorScope dropped without calling `end`");
            // Keep the device's scope stack balanced.
            let _ = self.device.pop_allocation_scope();
        }
    }
}
