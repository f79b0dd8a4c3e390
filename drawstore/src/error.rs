use thiserror::Error;

/// Failure reported by a [`GpuDevice`](crate::device::GpuDevice).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Gpu ran out of memory: {message}")]
    OutOfMemory { message: String },
}

/// Reason why provisioning the gpu side of the storage failed.
#[derive(Error, Debug)]
pub enum DrawStorageError {
    #[error("Failed to allocate gpu resources for {what}")]
    Allocation {
        what: &'static str,
        #[source]
        source: DeviceError,
    },
    #[error("Failed to encode {what} for upload: {message}")]
    Encode { what: &'static str, message: String },
}
