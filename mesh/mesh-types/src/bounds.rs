//! Patch bounding boxes.
//!
//! Every level of a hierarchy keeps one box per patch. Screen-space cut
//! selection projects a box's center and half extents, so those two are the
//! queries that matter; the box itself is accumulated one vertex at a time.

use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Axis-aligned box around a set of positions.
///
/// A box that has seen no point is *empty*: its `min` is `+inf` and its
/// `max` is `-inf` on every axis, so the first [`Aabb::expand_to_include`]
/// snaps both corners onto that point.
///
/// ```
/// use mesh_types::{Aabb, Point3};
///
/// let mut patch = Aabb::empty();
/// for p in [Point3::new(2.0, 0.0, 1.0), Point3::new(4.0, 2.0, 1.0)] {
///     patch.expand_to_include(&p);
/// }
/// assert_eq!(patch.center(), Point3::new(3.0, 1.0, 1.0));
/// assert_eq!(patch.half_extents().z, 0.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Aabb {
    /// Smallest coordinate seen on each axis.
    pub min: Point3<f64>,
    /// Largest coordinate seen on each axis.
    pub max: Point3<f64>,
}

impl Aabb {
    /// Box spanning two opposite corners, given in any order.
    #[must_use]
    pub fn new(a: Point3<f64>, b: Point3<f64>) -> Self {
        Self {
            min: a.inf(&b),
            max: a.sup(&b),
        }
    }

    /// A box containing nothing.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Point3::new is not const in nalgebra
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    /// Smallest box containing every point.
    #[must_use]
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3<f64>>) -> Self {
        points.into_iter().fold(Self::empty(), |mut aabb, p| {
            aabb.expand_to_include(p);
            aabb
        })
    }

    /// True until the first point is added.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        (0..3).any(|axis| self.min[axis] > self.max[axis])
    }

    /// Midpoint of the two corners.
    #[inline]
    #[must_use]
    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    /// Half the box size on each axis; zero for an empty box.
    #[must_use]
    pub fn half_extents(&self) -> Vector3<f64> {
        if self.is_empty() {
            Vector3::zeros()
        } else {
            (self.max - self.min) * 0.5
        }
    }

    /// Grow the box so it contains `point`.
    pub fn expand_to_include(&mut self, point: &Point3<f64>) {
        self.min = self.min.inf(point);
        self.max = self.max.sup(point);
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}
