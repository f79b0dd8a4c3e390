//! Type declarations for the drawstore draw batching crate.
//!
//! This is reexported in the drawstore crate proper and includes all the
//! "surface" api arguments that do not depend on a gpu backend.

use bytemuck::{Pod, Zeroable};
/// Reexport of the glam version drawstore is using.
pub use glam;
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Amount of indices in a single meshlet. Every index range handed to the
/// draw storage must be a multiple of this.
pub const MESHLET_INDICES: usize = 64;

/// Amount of concurrently running morph animations on a single object.
pub const MAX_MORPH_LAYERS: usize = 3;

/// Amount of viewports the storage culls and draws for.
pub const VIEWPORT_COUNT: usize = 3;

/// The kind of a renderable instance.
///
/// Landscape geometry is batched and pre-clustered, everything else is drawn
/// as a single cluster with its own per-instance transform.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectType {
    Landscape,
    Static,
    Movable,
    Animated,
    Particle,
    Morph,
}

impl ObjectType {
    /// Objects of this type read their transform from the instance buffer.
    pub fn is_instanced(self) -> bool {
        self != ObjectType::Landscape
    }
}

/// Blending classification of a material.
///
/// Ordering matters: draw commands are issued in ascending order, so every
/// opaque class sorts before every blended one.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum AlphaFunc {
    #[default]
    Solid,
    AlphaTest,
    Water,
    Ghost,
    Multiply,
    Multiply2,
    Transparent,
    AdditiveLight,
}

impl AlphaFunc {
    pub fn is_opaque(self) -> bool {
        matches!(self, AlphaFunc::Solid | AlphaFunc::AlphaTest)
    }
}

/// Vertex wind animation applied to an object.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WindMode {
    #[default]
    None,
    Wind,
    Wind2,
}

/// A culling and drawing target.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Viewport {
    Main,
    Shadow0,
    Shadow1,
}

impl Viewport {
    pub const ALL: [Viewport; VIEWPORT_COUNT] = [Viewport::Main, Viewport::Shadow0, Viewport::Shadow1];

    pub const fn index(self) -> usize {
        self as usize
    }

    /// The viewport of the given shadow cascade, if there is one.
    pub fn shadow(layer: usize) -> Option<Self> {
        match layer {
            0 => Some(Viewport::Shadow0),
            1 => Some(Viewport::Shadow1),
            _ => None,
        }
    }

    pub fn is_shadow(self) -> bool {
        self != Viewport::Main
    }
}

/// Axis aligned box plus a conservative bounding radius around the mesh
/// origin.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Bounds {
    pub bbox: [Vec3; 2],
    pub r_conservative: f32,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            bbox: [Vec3::ZERO; 2],
            r_conservative: 0.0,
        }
    }
}

impl Bounds {
    pub fn from_points(points: &[Vec3]) -> Self {
        let Some(&first) = points.first() else {
            return Self::default();
        };

        let mut min = first;
        let mut max = first;
        let mut radius_sq = 0.0_f32;
        for &point in points {
            min = min.min(point);
            max = max.max(point);
            radius_sq = radius_sq.max(point.length_squared());
        }

        Self {
            bbox: [min, max],
            r_conservative: radius_sq.sqrt(),
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.bbox[0] + self.bbox[1]) * 0.5
    }
}

/// One offline-sliced meshlet of batched landscape geometry.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct PackedCluster {
    pub pos: Vec3,
    pub r: f32,
}
