//! Level selection and readback.

use mesh_types::{AttributeLayout, Matrix4, Point3, Vector3};

use crate::error::{LodError, LodResult};
use crate::hierarchy::Hierarchy;

/// Projects an object-space error into screen space.
///
/// Arguments are a bounding box center, its half extents, the object-space
/// error and the view-projection matrix.
pub trait ErrorProjector {
    /// The projected error.
    fn project(
        &self,
        center: &Point3<f64>,
        half_extents: &Vector3<f64>,
        error: f64,
        view_proj: &Matrix4<f64>,
    ) -> f64;
}

impl<F> ErrorProjector for F
where
    F: Fn(&Point3<f64>, &Vector3<f64>, f64, &Matrix4<f64>) -> f64,
{
    fn project(
        &self,
        center: &Point3<f64>,
        half_extents: &Vector3<f64>,
        error: f64,
        view_proj: &Matrix4<f64>,
    ) -> f64 {
        self(center, half_extents, error, view_proj)
    }
}

/// What a cut must satisfy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CutSelector {
    /// Finest level with at most this many triangles.
    TriangleBudget(usize),
    /// Coarsest level whose error does not exceed this threshold.
    ErrorThreshold(f64),
}

/// How level errors are compared against an error threshold.
#[derive(Clone, Copy)]
pub enum CutMode<'a> {
    /// Compare the stored object-space error directly.
    ObjectSpace,
    /// Project each patch's error first; a level's error is the largest
    /// projected patch error.
    Projected {
        /// View-projection matrix handed to the projector.
        view_proj: Matrix4<f64>,
        /// The projection.
        projector: &'a dyn ErrorProjector,
    },
}

impl std::fmt::Debug for CutMode<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ObjectSpace => f.write_str("ObjectSpace"),
            Self::Projected { view_proj, .. } => f
                .debug_struct("Projected")
                .field("view_proj", view_proj)
                .finish_non_exhaustive(),
        }
    }
}

/// A selected level of a hierarchy.
#[derive(Debug, Clone, Copy)]
pub struct Cut<'h> {
    hierarchy: &'h Hierarchy,
    level: usize,
}

/// Buffers of one patch of a cut, ready to draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatchReadback<'h> {
    /// Triangle indices.
    pub indices: &'h [u32],
    /// Interleaved vertex data (position, then attributes per the layout).
    pub vertices: &'h [f32],
    /// Number of vertices in `vertices`.
    pub vertex_count: usize,
    /// Number of entries in `indices`.
    pub index_count: usize,
    /// Layout of each vertex.
    pub layout: AttributeLayout,
}

impl<'h> Cut<'h> {
    /// Index of the selected level.
    #[must_use]
    pub const fn level(&self) -> usize {
        self.level
    }

    /// Object-space error of the selected level.
    #[must_use]
    pub fn error(&self) -> f64 {
        self.hierarchy.error(self.level).unwrap_or(0.0)
    }

    /// Triangles of the selected level.
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.hierarchy.triangle_count(self.level).unwrap_or(0)
    }

    /// Index and vertex data of one patch.
    ///
    /// # Errors
    ///
    /// Returns [`LodError::PatchOutOfRange`] for an unknown patch.
    pub fn readback(&self, patch: usize) -> LodResult<PatchReadback<'h>> {
        let out_of_range = || LodError::PatchOutOfRange {
            patch,
            patch_count: self.hierarchy.patch_count(),
        };
        let hierarchy: &'h Hierarchy = self.hierarchy;
        let geometry = hierarchy
            .level(self.level)
            .and_then(|l| l.patch(patch))
            .ok_or_else(out_of_range)?;
        let vertices = hierarchy
            .patch_vertices(self.level, patch)
            .ok_or_else(out_of_range)?;

        let stride = hierarchy.layout().stride();
        Ok(PatchReadback {
            indices: geometry.indices(),
            vertices,
            vertex_count: vertices.len() / stride,
            index_count: geometry.indices().len(),
            layout: hierarchy.layout(),
        })
    }
}

impl Hierarchy {
    /// Select a level.
    ///
    /// A triangle budget picks the finest level that fits, or the coarsest
    /// level if none does. An error threshold picks the coarsest level whose
    /// error does not exceed it, or level 0 if none does.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_lod::{CutMode, CutSelector, LodParams, build_hierarchy};
    /// use mesh_types::icosphere;
    ///
    /// let hierarchy = build_hierarchy(&icosphere(2), &LodParams::default()).unwrap();
    ///
    /// let cut = hierarchy.select_cut(CutSelector::TriangleBudget(100), CutMode::ObjectSpace);
    /// assert!(cut.triangle_count() <= 100);
    /// ```
    #[must_use]
    pub fn select_cut(&self, selector: CutSelector, mode: CutMode<'_>) -> Cut<'_> {
        let last = self.level_count().saturating_sub(1);
        let level = match selector {
            CutSelector::TriangleBudget(budget) => (0..self.level_count())
                .find(|&k| self.triangle_count(k).is_some_and(|n| n <= budget))
                .unwrap_or(last),
            CutSelector::ErrorThreshold(threshold) => (0..self.level_count())
                .rev()
                .find(|&k| self.effective_error(k, &mode) <= threshold)
                .unwrap_or(0),
        };
        Cut {
            hierarchy: self,
            level,
        }
    }

    /// A cut at a fixed level.
    ///
    /// # Errors
    ///
    /// Returns [`LodError::LevelOutOfRange`] for an unknown level.
    pub fn cut_at(&self, level: usize) -> LodResult<Cut<'_>> {
        if level >= self.level_count() {
            return Err(LodError::LevelOutOfRange {
                level,
                level_count: self.level_count(),
            });
        }
        Ok(Cut {
            hierarchy: self,
            level,
        })
    }

    fn effective_error(&self, level: usize, mode: &CutMode<'_>) -> f64 {
        let error = self.error(level).unwrap_or(f64::INFINITY);
        match mode {
            CutMode::ObjectSpace => error,
            CutMode::Projected {
                view_proj,
                projector,
            } => self
                .bounds
                .iter()
                .map(|b| projector.project(&b.center(), &b.half_extents(), error, view_proj))
                .fold(0.0, f64::max),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::hierarchy::{Level, PatchGeometry};
    use crate::params::OperatorKind;
    use mesh_types::{Aabb, Vertex, VertexBuffer};

    /// Three half-edge levels over one patch sharing a 4-vertex buffer.
    fn shared() -> Hierarchy {
        let mut base = VertexBuffer::new(AttributeLayout::POSITION_ONLY);
        for x in 0..4 {
            base.push(&Vertex::from_coords(f64::from(x), 0.0, 0.0));
        }
        let level = |indices: Vec<u32>, vertices: VertexBuffer, vertex_count: usize, error: f64| {
            Level {
                patches: vec![PatchGeometry {
                    indices,
                    vertices,
                    vertex_count,
                }],
                original_error: error,
                error,
            }
        };
        let empty = VertexBuffer::new(AttributeLayout::POSITION_ONLY);
        Hierarchy {
            operator: OperatorKind::HalfEdge,
            layout: AttributeLayout::POSITION_ONLY,
            levels: vec![
                level(vec![0, 1, 2, 0, 2, 3, 1, 3, 2], base, 4, 0.0),
                level(vec![0, 1, 2, 0, 2, 1], empty.clone(), 3, 0.25),
                level(vec![0, 1, 2], empty, 3, 1.0),
            ],
            multiplier: 1.0,
            bounds: vec![Aabb::new(Point3::origin(), Point3::new(3.0, 0.0, 0.0))],
            original_triangles: 3,
            collapses_performed: 2,
            collapses_rejected: 0,
        }
    }

    #[test]
    fn triangle_budget_picks_finest_fit() {
        let h = shared();
        let cut = |n| h.select_cut(CutSelector::TriangleBudget(n), CutMode::ObjectSpace).level();
        assert_eq!(cut(10), 0);
        assert_eq!(cut(3), 0);
        assert_eq!(cut(2), 1);
        assert_eq!(cut(1), 2);
        // Nothing fits: coarsest
        assert_eq!(cut(0), 2);
    }

    #[test]
    fn error_threshold_picks_coarsest_fit() {
        let h = shared();
        let cut = |e| h.select_cut(CutSelector::ErrorThreshold(e), CutMode::ObjectSpace).level();
        assert_eq!(cut(5.0), 2);
        assert_eq!(cut(1.0), 2);
        assert_eq!(cut(0.5), 1);
        assert_eq!(cut(0.0), 0);
        assert_eq!(cut(-1.0), 0);
    }

    #[test]
    fn projected_errors_use_patch_bounds() {
        let h = shared();
        let halve = |_: &Point3<f64>, _: &Vector3<f64>, error: f64, _: &Matrix4<f64>| error * 0.5;
        let mode = CutMode::Projected {
            view_proj: Matrix4::identity(),
            projector: &halve,
        };
        // Projected errors are 0, 0.125 and 0.5
        let cut = h.select_cut(CutSelector::ErrorThreshold(0.5), mode);
        assert_eq!(cut.level(), 2);

        let saw_center =
            |center: &Point3<f64>, _: &Vector3<f64>, _: f64, _: &Matrix4<f64>| center.x;
        let mode = CutMode::Projected {
            view_proj: Matrix4::identity(),
            projector: &saw_center,
        };
        // Every level projects to 1.5
        assert_eq!(h.select_cut(CutSelector::ErrorThreshold(1.0), mode).level(), 0);
        assert_eq!(h.select_cut(CutSelector::ErrorThreshold(1.5), mode).level(), 2);
    }

    #[test]
    fn half_edge_readback_uses_shared_prefix() {
        let h = shared();
        let fine = h.cut_at(0).unwrap().readback(0).unwrap();
        assert_eq!(fine.vertex_count, 4);
        assert_eq!(fine.index_count, 9);

        let coarse = h.cut_at(2).unwrap().readback(0).unwrap();
        assert_eq!(coarse.vertex_count, 3);
        assert_eq!(coarse.vertices.len(), 9);
        assert_eq!(coarse.indices, &[0, 1, 2]);
        assert_eq!(&coarse.vertices[..3], &fine.vertices[..3]);
    }

    #[test]
    fn out_of_range_queries() {
        let h = shared();
        assert!(matches!(
            h.cut_at(3),
            Err(LodError::LevelOutOfRange { level: 3, level_count: 3 })
        ));
        assert!(matches!(
            h.cut_at(0).unwrap().readback(1),
            Err(LodError::PatchOutOfRange { patch: 1, patch_count: 1 })
        ));
    }
}
