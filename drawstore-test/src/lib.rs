//! Recording gpu device and fixtures for testing drawstore without a gpu.

mod helpers;
mod mock;

pub use helpers::*;
pub use mock::*;
