use crate::{Interval, Vec3};

/// Axis-Aligned Bounding Box of a loaded asset.
///
/// Defined by three intervals (one per axis). Used to center and scale
/// meshes into the normalization cube.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub x: Interval,
    pub y: Interval,
    pub z: Interval,
}

impl Aabb {
    /// Create an empty AABB (contains nothing).
    pub fn empty() -> Self {
        Self {
            x: Interval::EMPTY,
            y: Interval::EMPTY,
            z: Interval::EMPTY,
        }
    }

    /// Smallest AABB containing every point, or `empty()` for no points.
    pub fn enclosing<'a>(points: impl IntoIterator<Item = &'a Vec3>) -> Self {
        points.into_iter().fold(Self::empty(), |aabb, p| aabb.include(*p))
    }

    /// Grow the box so it contains `p`.
    pub fn include(&self, p: Vec3) -> Aabb {
        Aabb {
            x: self.x.include(p.x),
            y: self.y.include(p.y),
            z: self.z.include(p.z),
        }
    }

    /// True if no point was ever included.
    pub fn is_empty(&self) -> bool {
        self.x.min > self.x.max
    }

    /// Per-axis extent of the box.
    pub fn extent(&self) -> Vec3 {
        if self.is_empty() {
            return Vec3::ZERO;
        }
        Vec3::new(self.x.size(), self.y.size(), self.z.size())
    }

    /// Length of the longest side.
    pub fn max_extent(&self) -> f32 {
        self.extent().max_element()
    }

    /// Returns the center point of the bounding box.
    pub fn centroid(&self) -> Vec3 {
        if self.is_empty() {
            return Vec3::ZERO;
        }
        Vec3::new(self.x.center(), self.y.center(), self.z.center())
    }
}
