//! The four linked tables behind the draw storage.
//!
//! Objects point at a bucket, a command and a contiguous range of clusters.
//! Every reference between tables is a plain index, validated against the
//! current table bounds.

mod bucket;
mod cluster;
mod command;
mod instance;
mod object;

pub use bucket::*;
pub use cluster::*;
pub use command::*;
pub use instance::*;
pub use object::*;
