// Math utilities for picking and projection

use glam::{Mat4, Vec3};

/// Cosines smaller than this are treated as a ray parallel to the plane.
pub const PARALLEL_EPSILON: f32 = 1e-6;

/// Builds a matrix from rows written out the way they read on paper.
pub fn mat4_from_rows(rows: [[f32; 4]; 4]) -> Mat4 {
    Mat4::from_cols_array_2d(&rows).transpose()
}

/// A half-line starting at `origin`. `direction` is unit length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// Ray from `origin` through `through`. `None` when the two points coincide.
    pub fn through(origin: Vec3, through: Vec3) -> Option<Self> {
        let direction = (through - origin).try_normalize()?;
        Some(Self { origin, direction })
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + t * self.direction
    }

    /// Intersects the infinite plane through `anchor` with normal `normal`.
    ///
    /// Near-parallel rays and hits behind the origin are no intersection.
    pub fn intersect_plane(&self, anchor: Vec3, normal: Vec3) -> Option<Vec3> {
        let cos_angle = normal.dot(self.direction);
        if cos_angle.abs() < PARALLEL_EPSILON {
            return None;
        }

        let t = normal.dot(anchor - self.origin) / cos_angle;
        if t < 0.0 {
            return None;
        }
        Some(self.at(t))
    }
}

/// Axis-aligned box stored as a center and full extents.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoundingBox {
    pub position: Vec3,
    pub bounds: Vec3,
}

impl BoundingBox {
    /// Corners in the order used for edge drawing:
    ///
    /// ```text
    ///        7 ---- 6
    ///       / |    /|
    ///      0 ---- 1 |
    ///      |  4 --|-5
    ///      | /    |/
    ///      3 ---- 2
    /// ```
    pub fn corners(&self) -> [Vec3; 8] {
        let h = self.bounds / 2.0;
        let p = self.position;
        [
            p + Vec3::new(-h.x, -h.y, h.z),
            p + Vec3::new(h.x, -h.y, h.z),
            p + Vec3::new(h.x, -h.y, -h.z),
            p + Vec3::new(-h.x, -h.y, -h.z),
            p + Vec3::new(-h.x, h.y, -h.z),
            p + Vec3::new(h.x, h.y, -h.z),
            p + Vec3::new(h.x, h.y, h.z),
            p + Vec3::new(-h.x, h.y, h.z),
        ]
    }

    /// The twelve edges as corner index pairs.
    pub const EDGES: [(usize, usize); 12] = [
        (0, 1),
        (1, 2),
        (2, 3),
        (3, 0),
        (3, 4),
        (2, 5),
        (0, 7),
        (1, 6),
        (4, 5),
        (5, 6),
        (6, 7),
        (7, 4),
    ];
}
