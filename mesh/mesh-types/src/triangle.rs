//! Face geometry for error quadrics.

use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Three resolved corner positions of a face.
///
/// Quadric construction needs a face's plane and, when area weighting is on,
/// its area. Both come from the same cross product, which follows the CCW
/// winding of the face.
///
/// ```
/// use mesh_types::{Point3, Triangle};
///
/// let face = Triangle::new(
///     Point3::new(0.0, 0.0, 2.0),
///     Point3::new(2.0, 0.0, 2.0),
///     Point3::new(0.0, 2.0, 2.0),
/// );
/// assert_eq!(face.area(), 2.0);
/// assert_eq!(face.normal(), Some(mesh_types::Vector3::z()));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Triangle {
    /// First corner.
    pub v0: Point3<f64>,
    /// Second corner.
    pub v1: Point3<f64>,
    /// Third corner.
    pub v2: Point3<f64>,
}

impl Triangle {
    /// Face from corners in winding order.
    #[inline]
    #[must_use]
    pub const fn new(v0: Point3<f64>, v1: Point3<f64>, v2: Point3<f64>) -> Self {
        Self { v0, v1, v2 }
    }

    // Length is twice the area
    fn cross(&self) -> Vector3<f64> {
        (self.v1 - self.v0).cross(&(self.v2 - self.v0))
    }

    /// Unit normal of the face plane, or `None` once the face has collapsed
    /// to a sliver.
    #[must_use]
    pub fn normal(&self) -> Option<Vector3<f64>> {
        self.cross().try_normalize(f64::EPSILON * f64::EPSILON)
    }

    /// Face area.
    #[inline]
    #[must_use]
    pub fn area(&self) -> f64 {
        self.cross().norm() * 0.5
    }
}
