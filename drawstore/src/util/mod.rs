//! Utilities shared by the storage and the gpu backends.

pub mod error_scope;
pub mod frustum;
pub mod math;
pub mod typedefs;
