//! Frustums and bounding spheres for cpu-side cluster culling.
//!
//! Plane extraction follows <https://www.gamedevs.org/uploads/fast-extraction-viewing-frustum-planes-from-world-view-projection-matrix.pdf>,
//! assuming reverse-z with an infinite far plane.

use glam::{Mat4, Vec3};

/// A point in space and a radius from that point.
///
/// A negative radius marks a sphere that is never visible, which is how freed
/// clusters are kept out of the culling results.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl BoundingSphere {
    pub const EMPTY: Self = Self {
        center: Vec3::ZERO,
        radius: -1.0,
    };

    pub fn is_empty(&self) -> bool {
        self.radius < 0.0
    }
}

#[derive(Debug, Copy, Clone)]
struct Plane {
    abc: Vec3,
    d: f32,
}

impl Plane {
    fn new(a: f32, b: f32, c: f32, d: f32) -> Self {
        let abc = Vec3::new(a, b, c);
        let mag = abc.length();
        Self {
            abc: abc / mag,
            d: d / mag,
        }
    }

    fn distance(self, point: Vec3) -> f32 {
        self.abc.dot(point) + self.d
    }
}

/// A frustum made of 5 planes. There is no far plane.
#[derive(Debug, Copy, Clone)]
pub struct ShaderFrustum {
    planes: [Plane; 5],
}

impl ShaderFrustum {
    pub fn from_matrix(view_proj: Mat4) -> Self {
        let m = view_proj.to_cols_array_2d();
        let row = |r: usize, sign: f32| {
            Plane::new(
                m[0][3] + sign * m[0][r],
                m[1][3] + sign * m[1][r],
                m[2][3] + sign * m[2][r],
                m[3][3] + sign * m[3][r],
            )
        };

        Self {
            planes: [
                // left, right
                row(0, 1.0),
                row(0, -1.0),
                // bottom, top
                row(1, 1.0),
                row(1, -1.0),
                // near, as z is reversed
                row(2, -1.0),
            ],
        }
    }

    /// Determines if the sphere is at all inside the frustum.
    pub fn contains_sphere(&self, sphere: BoundingSphere) -> bool {
        if sphere.is_empty() {
            return false;
        }
        self.planes
            .iter()
            .all(|plane| plane.distance(sphere.center) >= -sphere.radius)
    }
}

#[cfg(test)]
mod test {
    use glam::{Mat4, Vec3};

    use super::{BoundingSphere, ShaderFrustum};

    fn frustum() -> ShaderFrustum {
        let proj = Mat4::perspective_infinite_reverse_rh(90_f32.to_radians(), 1.0, 0.1);
        let view = Mat4::look_at_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
        ShaderFrustum::from_matrix(proj * view)
    }

    #[test]
    fn sphere_in_front_is_visible() {
        let sphere = BoundingSphere {
            center: Vec3::new(0.0, 0.0, -10.0),
            radius: 1.0,
        };
        assert!(frustum().contains_sphere(sphere));
    }

    #[test]
    fn sphere_behind_is_culled() {
        let sphere = BoundingSphere {
            center: Vec3::new(0.0, 0.0, 10.0),
            radius: 1.0,
        };
        assert!(!frustum().contains_sphere(sphere));
    }

    #[test]
    fn sphere_straddling_side_plane_is_visible() {
        let sphere = BoundingSphere {
            center: Vec3::new(-10.5, 0.0, -10.0),
            radius: 1.0,
        };
        assert!(frustum().contains_sphere(sphere));
    }

    #[test]
    fn empty_sphere_is_never_visible() {
        assert!(!frustum().contains_sphere(BoundingSphere::EMPTY));
    }
}
