//! View frustum for chunk visibility culling

use crate::core::types::{Mat4, Vec3, Vec4};
use super::aabb::Aabb;

/// A plane defined by normal and distance from origin
#[derive(Clone, Copy, Debug)]
pub struct Plane {
    pub normal: Vec3,
    pub distance: f32,
}

impl Plane {
    pub fn new(normal: Vec3, distance: f32) -> Self {
        Self { normal, distance }
    }

    /// Signed distance from point to plane (positive = in front)
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.distance
    }
}

/// View frustum with 6 planes (Near, Far, Left, Right, Top, Bottom).
///
/// Plane normals point into the visible volume.
#[derive(Clone, Copy, Debug)]
pub struct Frustum {
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Extract frustum planes from a view-projection matrix (Gribb/Hartmann).
    pub fn from_view_projection(vp: &Mat4) -> Self {
        let row = |i: usize| Vec4::new(vp.col(0)[i], vp.col(1)[i], vp.col(2)[i], vp.col(3)[i]);
        let (r0, r1, r2, r3) = (row(0), row(1), row(2), row(3));

        Self {
            planes: [
                Self::normalize_plane(r3 + r2), // near
                Self::normalize_plane(r3 - r2), // far
                Self::normalize_plane(r3 + r0), // left
                Self::normalize_plane(r3 - r0), // right
                Self::normalize_plane(r3 - r1), // top
                Self::normalize_plane(r3 + r1), // bottom
            ],
        }
    }

    fn normalize_plane(plane: Vec4) -> Plane {
        let normal = plane.truncate();
        let len = normal.length();
        if len <= f32::EPSILON {
            // Degenerate plane never rejects anything
            return Plane::new(Vec3::ZERO, 0.0);
        }
        Plane::new(normal / len, plane.w / len)
    }

    /// Check if point is inside frustum
    pub fn contains_point(&self, point: Vec3) -> bool {
        self.planes.iter().all(|plane| plane.distance_to_point(point) >= 0.0)
    }

    /// Check if AABB intersects frustum (conservative test)
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        for plane in &self.planes {
            // p-vertex: the corner furthest along the plane normal
            let p = Vec3::new(
                if plane.normal.x >= 0.0 { aabb.max.x } else { aabb.min.x },
                if plane.normal.y >= 0.0 { aabb.max.y } else { aabb.min.y },
                if plane.normal.z >= 0.0 { aabb.max.z } else { aabb.min.z },
            );

            if plane.distance_to_point(p) < 0.0 {
                return false;
            }
        }
        true
    }
}
