//! Quadric error metric.
//!
//! A quadric accumulates squared distances to a set of planes. Summing the
//! quadrics of two vertices gives the error of placing their merged vertex
//! anywhere in space.

use mesh_types::{Point3, Vector3};
use nalgebra::{Matrix3, Matrix4, Vector4};

/// Quadric error matrix (4x4 symmetric matrix stored as 10 values).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Quadric {
    // Symmetric 4x4 matrix stored as upper triangle:
    // [a b c d]
    // [  e f g]
    // [    h i]
    // [      j]
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    e: f64,
    f: f64,
    g: f64,
    h: f64,
    i: f64,
    j: f64,
}

impl Quadric {
    /// Create a quadric from a plane `n·p + d = 0` with unit normal `n`.
    #[must_use]
    pub fn from_plane(n: &Vector3<f64>, d: f64) -> Self {
        Self {
            a: n.x * n.x,
            b: n.x * n.y,
            c: n.x * n.z,
            d: n.x * d,
            e: n.y * n.y,
            f: n.y * n.z,
            g: n.y * d,
            h: n.z * n.z,
            i: n.z * d,
            j: d * d,
        }
    }

    /// Create a quadric for the plane through `point` with unit normal `n`.
    #[must_use]
    pub fn through_point(n: &Vector3<f64>, point: &Point3<f64>) -> Self {
        Self::from_plane(n, -n.dot(&point.coords))
    }

    /// Scale every coefficient by `weight`.
    #[must_use]
    pub fn scaled(self, weight: f64) -> Self {
        Self {
            a: self.a * weight,
            b: self.b * weight,
            c: self.c * weight,
            d: self.d * weight,
            e: self.e * weight,
            f: self.f * weight,
            g: self.g * weight,
            h: self.h * weight,
            i: self.i * weight,
            j: self.j * weight,
        }
    }

    /// Evaluate the weighted sum of squared plane distances at `p`.
    ///
    /// Rounding can push the result slightly below zero; it is clamped.
    #[must_use]
    pub fn evaluate(&self, p: &Point3<f64>) -> f64 {
        let v = Vector4::new(p.x, p.y, p.z, 1.0);
        (v.transpose() * self.matrix() * v)[0].max(0.0)
    }

    /// The point minimizing the quadric, or `None` if the system is singular.
    #[must_use]
    pub fn optimal_point(&self) -> Option<Point3<f64>> {
        let m = Matrix3::new(
            self.a, self.b, self.c, //
            self.b, self.e, self.f, //
            self.c, self.f, self.h,
        );
        if m.determinant().abs() < 1e-10 {
            return None;
        }
        let inverse = m.try_inverse()?;
        let p = inverse * Vector3::new(-self.d, -self.g, -self.i);
        p.iter().all(|c| c.is_finite()).then(|| Point3::from(p))
    }

    fn matrix(&self) -> Matrix4<f64> {
        Matrix4::new(
            self.a, self.b, self.c, self.d, //
            self.b, self.e, self.f, self.g, //
            self.c, self.f, self.h, self.i, //
            self.d, self.g, self.i, self.j,
        )
    }
}

impl std::ops::Add for Quadric {
    type Output = Self;

    fn add(mut self, other: Self) -> Self {
        self += other;
        self
    }
}

impl std::ops::AddAssign for Quadric {
    fn add_assign(&mut self, other: Self) {
        self.a += other.a;
        self.b += other.b;
        self.c += other.c;
        self.d += other.d;
        self.e += other.e;
        self.f += other.f;
        self.g += other.g;
        self.h += other.h;
        self.i += other.i;
        self.j += other.j;
    }
}
