//! The built level-of-detail hierarchy.

// Triangle counts don't overflow in practice
#![allow(clippy::cast_precision_loss)]

use mesh_types::{Aabb, AttributeLayout, VertexBuffer};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{LodError, LodResult};
use crate::params::OperatorKind;

/// One patch of one level: triangle indices plus its vertex storage.
///
/// For half-edge hierarchies only level 0 stores vertices; every level
/// indexes a prefix of `vertex_count` entries of that shared buffer.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PatchGeometry {
    pub(crate) indices: Vec<u32>,
    pub(crate) vertices: VertexBuffer,
    pub(crate) vertex_count: usize,
}

impl PatchGeometry {
    /// Triangle indices, three per triangle.
    #[inline]
    #[must_use]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Stored vertices (empty for coarse half-edge levels).
    #[inline]
    #[must_use]
    pub const fn vertices(&self) -> &VertexBuffer {
        &self.vertices
    }

    /// Number of vertices this patch addresses.
    #[inline]
    #[must_use]
    pub const fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Number of triangles.
    #[inline]
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// One snapshot of every patch at a given coarseness.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Level {
    pub(crate) patches: Vec<PatchGeometry>,
    pub(crate) original_error: f64,
    pub(crate) error: f64,
}

impl Level {
    /// Geometry of each patch.
    #[must_use]
    pub fn patches(&self) -> &[PatchGeometry] {
        &self.patches
    }

    /// Geometry of one patch.
    #[must_use]
    pub fn patch(&self, patch: usize) -> Option<&PatchGeometry> {
        self.patches.get(patch)
    }

    /// Error after applying the hierarchy's multiplier.
    #[must_use]
    pub const fn error(&self) -> f64 {
        self.error
    }

    /// Error as measured while simplifying.
    #[must_use]
    pub const fn original_error(&self) -> f64 {
        self.original_error
    }

    /// Triangles over all patches.
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.patches.iter().map(PatchGeometry::triangle_count).sum()
    }

    /// Vertices addressed over all patches.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.patches.iter().map(PatchGeometry::vertex_count).sum()
    }
}

/// A discrete LOD hierarchy: levels from finest (0) to coarsest.
///
/// Levels are immutable once built. The only mutation is
/// [`set_quadric_multiplier`](Self::set_quadric_multiplier), which rescales
/// every level's error from the errors recorded at build time.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Hierarchy {
    pub(crate) operator: OperatorKind,
    pub(crate) layout: AttributeLayout,
    pub(crate) levels: Vec<Level>,
    pub(crate) multiplier: f64,
    pub(crate) bounds: Vec<Aabb>,
    pub(crate) original_triangles: usize,
    pub(crate) collapses_performed: usize,
    pub(crate) collapses_rejected: usize,
}

impl Hierarchy {
    /// Number of levels (at least one).
    #[must_use]
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Look up a level.
    #[must_use]
    pub fn level(&self, level: usize) -> Option<&Level> {
        self.levels.get(level)
    }

    /// All levels, finest first.
    #[must_use]
    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    /// Operator the hierarchy was built with.
    #[must_use]
    pub const fn operator(&self) -> OperatorKind {
        self.operator
    }

    /// Attribute layout of every vertex buffer.
    #[must_use]
    pub const fn layout(&self) -> AttributeLayout {
        self.layout
    }

    /// Number of patches per level.
    #[must_use]
    pub fn patch_count(&self) -> usize {
        self.levels.first().map_or(0, |l| l.patches.len())
    }

    /// Error of a level.
    #[must_use]
    pub fn error(&self, level: usize) -> Option<f64> {
        self.level(level).map(Level::error)
    }

    /// Triangles of a level over all patches.
    #[must_use]
    pub fn triangle_count(&self, level: usize) -> Option<usize> {
        self.level(level).map(Level::triangle_count)
    }

    /// Triangles in the mesh the hierarchy was built from.
    #[must_use]
    pub const fn original_triangles(&self) -> usize {
        self.original_triangles
    }

    /// Current error multiplier.
    #[must_use]
    pub const fn quadric_multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Rescale every level's error to `original × multiplier`.
    ///
    /// Not synchronized: callers sharing the hierarchy across threads must
    /// not query it while this runs.
    ///
    /// # Errors
    ///
    /// Returns [`LodError::InvalidMultiplier`] unless `multiplier` is finite
    /// and positive.
    pub fn set_quadric_multiplier(&mut self, multiplier: f64) -> LodResult<()> {
        if !multiplier.is_finite() || multiplier <= 0.0 {
            return Err(LodError::InvalidMultiplier(multiplier));
        }
        self.multiplier = multiplier;
        for level in &mut self.levels {
            level.error = level.original_error * multiplier;
        }
        Ok(())
    }

    /// Bounding box of a patch's level-0 geometry.
    #[must_use]
    pub fn patch_bounds(&self, patch: usize) -> Option<&Aabb> {
        self.bounds.get(patch)
    }

    /// Interleaved vertex data a level's patch indexes.
    pub(crate) fn patch_vertices(&self, level: usize, patch: usize) -> Option<&[f32]> {
        let geometry = self.level(level)?.patch(patch)?;
        match self.operator {
            OperatorKind::HalfEdge => {
                let base = self.level(0)?.patch(patch)?;
                Some(base.vertices.prefix(geometry.vertex_count))
            }
            OperatorKind::FullEdge => Some(geometry.vertices.as_slice()),
        }
    }

    /// Summary of the build.
    #[must_use]
    pub fn stats(&self) -> HierarchyStats {
        HierarchyStats {
            operator: self.operator,
            original_triangles: self.original_triangles,
            triangles: self.levels.iter().map(Level::triangle_count).collect(),
            errors: self.levels.iter().map(Level::error).collect(),
            collapses_performed: self.collapses_performed,
            collapses_rejected: self.collapses_rejected,
        }
    }
}

/// Summary of a built hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct HierarchyStats {
    /// Operator used.
    pub operator: OperatorKind,

    /// Triangles in the input mesh.
    pub original_triangles: usize,

    /// Triangles per level, finest first.
    pub triangles: Vec<usize>,

    /// Error per level, finest first.
    pub errors: Vec<f64>,

    /// Number of collapses applied.
    pub collapses_performed: usize,

    /// Number of operations left forbidden when simplification stopped.
    pub collapses_rejected: usize,
}

impl HierarchyStats {
    /// Number of levels.
    #[must_use]
    pub fn level_count(&self) -> usize {
        self.triangles.len()
    }

    /// Triangles in the coarsest level.
    #[must_use]
    pub fn coarsest_triangles(&self) -> usize {
        self.triangles.last().copied().unwrap_or(0)
    }

    /// Get the percentage of triangles the coarsest level removed.
    #[must_use]
    pub fn reduction_percent(&self) -> f64 {
        if self.original_triangles == 0 {
            0.0
        } else {
            (1.0 - self.coarsest_triangles() as f64 / self.original_triangles as f64) * 100.0
        }
    }
}

impl std::fmt::Display for HierarchyStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "LOD ({}): {} → {} triangles over {} levels ({:.1}% reduction, {} collapses, {} \
             rejected)",
            self.operator,
            self.original_triangles,
            self.coarsest_triangles(),
            self.level_count(),
            self.reduction_percent(),
            self.collapses_performed,
            self.collapses_rejected
        )
    }
}
