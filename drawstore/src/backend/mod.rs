//! Gpu api implementations of the [`crate::device`] traits.

mod wgpu_device;

pub use wgpu_device::*;
