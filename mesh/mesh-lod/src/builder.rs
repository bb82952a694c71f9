//! Snapshots the collapse sequence into hierarchy levels.
//!
//! The builder watches the simplifier: it is told about the initial model,
//! about every collapse before it is applied (with its cost) and after it is
//! applied. Whenever the configured snapshot policy fires it captures the
//! live model into per-patch index and vertex buffers.

// Triangle counts don't overflow in practice
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]

use hashbrown::HashMap;
use mesh_types::{Aabb, AttributeLayout, MeshBounds, VertexBuffer};
use tracing::info;

use crate::hierarchy::{Hierarchy, Level, PatchGeometry};
use crate::layout::optimize_shared_layout;
use crate::model::{Model, VertexId};
use crate::params::{LodParams, OperatorKind, SnapshotPolicy};
use crate::simplify::CollapseRecord;

/// Growing per-patch buffer shared by every level of a half-edge hierarchy.
#[derive(Debug, Clone)]
struct SharedBuffer {
    vertices: VertexBuffer,
    slots: HashMap<VertexId, u32>,
}

impl SharedBuffer {
    fn new(layout: AttributeLayout) -> Self {
        Self {
            vertices: VertexBuffer::new(layout),
            slots: HashMap::new(),
        }
    }

    fn slot(&mut self, model: &Model, id: VertexId) -> u32 {
        if let Some(&slot) = self.slots.get(&id) {
            return slot;
        }
        let slot = match model.vertex(id) {
            Some(v) => self.vertices.push(&v.vertex),
            None => 0,
        };
        self.slots.insert(id, slot);
        slot
    }
}

/// Collects levels while a [`Simplifier`](crate::Simplifier) runs.
#[derive(Debug, Clone)]
pub struct HierarchyBuilder {
    policy: SnapshotPolicy,
    operator: OperatorKind,
    layout: AttributeLayout,
    patch_count: usize,
    shared: Vec<SharedBuffer>,
    snapshots: Vec<Level>,
    error: f64,
    next_target: usize,
    last_snapshot_triangles: usize,
    original_triangles: usize,
    collapses: usize,
    done: bool,
}

impl HierarchyBuilder {
    /// Create a builder for a model with the given layout and patch count.
    #[must_use]
    pub fn new(params: &LodParams, layout: AttributeLayout, patch_count: usize) -> Self {
        let patch_count = patch_count.max(1);
        let shared = if params.operator == OperatorKind::HalfEdge {
            (0..patch_count).map(|_| SharedBuffer::new(layout)).collect()
        } else {
            Vec::new()
        };
        Self {
            policy: params.policy.clone(),
            operator: params.operator,
            layout,
            patch_count,
            shared,
            snapshots: Vec::new(),
            error: 0.0,
            next_target: 0,
            last_snapshot_triangles: 0,
            original_triangles: 0,
            collapses: 0,
            done: false,
        }
    }

    /// Create a builder matching a model.
    #[must_use]
    pub fn for_model(params: &LodParams, model: &Model) -> Self {
        Self::new(params, model.layout(), model.patch_count())
    }

    /// Check whether every requested level has been captured.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.done
    }

    /// Number of levels captured so far.
    #[must_use]
    pub fn level_count(&self) -> usize {
        self.snapshots.len()
    }

    /// Running error: the largest cost applied so far.
    #[must_use]
    pub const fn current_error(&self) -> f64 {
        self.error
    }

    /// Record the model before any collapse.
    pub fn observe_initial(&mut self, model: &Model) {
        let count = model.triangle_count();
        self.original_triangles = count;
        self.last_snapshot_triangles = count;

        match &self.policy {
            SnapshotPolicy::PercentReduction(_) => self.snapshot(model),
            SnapshotPolicy::TriangleCounts(counts) => {
                if counts.first().is_some_and(|&first| count <= first) {
                    self.snapshot(model);
                    self.advance_counts(count);
                }
            }
            SnapshotPolicy::ErrorThresholds(_) => {}
        }
    }

    /// Called with the cost of the next collapse before it is applied.
    ///
    /// Returns `false` if the collapse should not be applied because every
    /// level has been captured.
    pub fn before_apply(&mut self, model: &Model, cost: f64) -> bool {
        if self.done {
            return false;
        }
        let SnapshotPolicy::ErrorThresholds(thresholds) = &self.policy else {
            return true;
        };
        let total = thresholds.len();
        let passed = thresholds
            .iter()
            .skip(self.next_target)
            .take_while(|&&t| cost >= t)
            .count();
        if passed > 0 {
            self.snapshot(model);
            self.next_target += passed;
            self.done = self.next_target >= total;
        }
        !self.done
    }

    /// Called after a collapse has been applied.
    pub fn after_apply(&mut self, model: &Model, record: &CollapseRecord) {
        self.collapses += 1;
        self.error = self.error.max(record.cost);
        let count = model.triangle_count();

        match &self.policy {
            SnapshotPolicy::PercentReduction(percent) => {
                let target = self.last_snapshot_triangles as f64 * (1.0 - percent);
                if count > 0 && count as f64 <= target {
                    self.snapshot(model);
                }
            }
            SnapshotPolicy::TriangleCounts(counts) => {
                if counts.get(self.next_target).is_some_and(|&t| count <= t) {
                    self.snapshot(model);
                    self.advance_counts(count);
                }
            }
            SnapshotPolicy::ErrorThresholds(_) => {}
        }
    }

    fn advance_counts(&mut self, count: usize) {
        if let SnapshotPolicy::TriangleCounts(counts) = &self.policy {
            while counts.get(self.next_target).is_some_and(|&t| count <= t) {
                self.next_target += 1;
            }
            if self.next_target >= counts.len() {
                self.done = true;
            }
        }
    }

    fn snapshot(&mut self, model: &Model) {
        let patches = match self.operator {
            OperatorKind::HalfEdge => self.capture_shared(model),
            OperatorKind::FullEdge => self.capture_owned(model),
        };
        info!(
            level = self.snapshots.len(),
            triangles = model.triangle_count(),
            error = self.error,
            "Captured LOD level"
        );
        self.snapshots.push(Level {
            patches,
            original_error: self.error,
            error: self.error,
        });
        self.last_snapshot_triangles = model.triangle_count();
    }

    fn capture_shared(&mut self, model: &Model) -> Vec<PatchGeometry> {
        let mut patches = self.empty_patches();
        for (_, tri) in model.triangles() {
            let patch = tri.patch as usize;
            let (Some(shared), Some(geometry)) =
                (self.shared.get_mut(patch), patches.get_mut(patch))
            else {
                continue;
            };
            for corner in tri.corners {
                geometry.indices.push(shared.slot(model, corner));
            }
        }
        patches
    }

    fn empty_patches(&self) -> Vec<PatchGeometry> {
        (0..self.patch_count)
            .map(|_| PatchGeometry {
                vertices: VertexBuffer::new(self.layout),
                ..PatchGeometry::default()
            })
            .collect()
    }

    fn capture_owned(&self, model: &Model) -> Vec<PatchGeometry> {
        let mut patches = self.empty_patches();
        let mut slots: Vec<HashMap<VertexId, u32>> = vec![HashMap::new(); self.patch_count];

        for (_, tri) in model.triangles() {
            let patch = tri.patch as usize;
            let (Some(geometry), Some(slots)) = (patches.get_mut(patch), slots.get_mut(patch))
            else {
                continue;
            };
            for corner in tri.corners {
                let slot = match slots.get(&corner) {
                    Some(&slot) => slot,
                    None => {
                        let slot = match model.vertex(corner) {
                            Some(v) => geometry.vertices.push(&v.vertex),
                            None => 0,
                        };
                        slots.insert(corner, slot);
                        slot
                    }
                };
                geometry.indices.push(slot);
            }
        }
        for geometry in &mut patches {
            geometry.vertex_count = geometry.vertices.len();
        }
        patches
    }

    /// Finish the hierarchy.
    ///
    /// Captures the final model if no level exists yet or if it is coarser
    /// than the last level, then lays out the shared buffers of a half-edge
    /// hierarchy.
    #[must_use]
    pub fn finish(mut self, model: &Model, collapses_rejected: usize) -> Hierarchy {
        let count = model.triangle_count();
        let coarser = count > 0 && count < self.last_snapshot_triangles;
        if self.snapshots.is_empty() || coarser {
            self.snapshot(model);
        }

        if self.operator == OperatorKind::HalfEdge {
            self.lay_out_shared();
        }

        let bounds: Vec<Aabb> = self
            .snapshots
            .first()
            .map(|level| {
                level
                    .patches
                    .iter()
                    .map(|geometry| geometry.vertices.bounds())
                    .collect()
            })
            .unwrap_or_default();

        let hierarchy = Hierarchy {
            operator: self.operator,
            layout: self.layout,
            levels: self.snapshots,
            multiplier: 1.0,
            bounds,
            original_triangles: self.original_triangles,
            collapses_performed: self.collapses,
            collapses_rejected,
        };
        info!(
            levels = hierarchy.level_count(),
            original = self.original_triangles,
            coarsest = hierarchy.levels.last().map_or(0, Level::triangle_count),
            operator = %self.operator,
            "Built LOD hierarchy"
        );
        hierarchy
    }

    fn lay_out_shared(&mut self) {
        for (p, shared) in self.shared.iter_mut().enumerate() {
            let mut levels: Vec<&mut Vec<u32>> = self
                .snapshots
                .iter_mut()
                .filter_map(|level| level.patches.get_mut(p).map(|g| &mut g.indices))
                .collect();
            let bounds = optimize_shared_layout(&mut shared.vertices, &mut levels);

            for (level, bound) in self.snapshots.iter_mut().zip(bounds) {
                if let Some(geometry) = level.patches.get_mut(p) {
                    geometry.vertex_count = bound;
                }
            }
            if let Some(geometry) = self.snapshots.first_mut().and_then(|l| l.patches.get_mut(p)) {
                geometry.vertices = std::mem::take(&mut shared.vertices);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::metric::MoveKind;
    use mesh_types::{IndexedMesh, tetrahedron};

    fn record(cost: f64) -> CollapseRecord {
        CollapseRecord {
            source: VertexId(0),
            destination: VertexId(1),
            survivor: Some(VertexId(1)),
            cost,
            kind: MoveKind::MoveSource,
            triangles_destroyed: 2,
            triangles_changed: 0,
            vertices_created: 0,
        }
    }

    fn strip(triangles: usize) -> Model {
        // A fan strip: triangle i is (i, i+1, i+2)
        let positions: Vec<f64> = (0..triangles + 2)
            .flat_map(|i| [i as f64, (i % 2) as f64, 0.0])
            .collect();
        let indices: Vec<u32> = (0..triangles as u32).flat_map(|i| [i, i + 1, i + 2]).collect();
        Model::from_mesh(&IndexedMesh::from_raw(&positions, &indices)).unwrap()
    }

    fn shrink(model: &mut Model, to: usize) {
        let ids: Vec<_> = model.triangles().map(|(id, _)| id).collect();
        for id in ids.into_iter().skip(to) {
            model.remove_triangle(id);
        }
    }

    #[test]
    fn percent_policy_snapshots_on_each_halving() {
        let params = LodParams::with_percent_reduction(0.5).with_operator(OperatorKind::FullEdge);
        let mut model = strip(8);
        let mut builder = HierarchyBuilder::for_model(&params, &model);

        builder.observe_initial(&model);
        assert_eq!(builder.level_count(), 1);

        for (to, expected_levels) in [(6, 1), (4, 2), (3, 2), (2, 3)] {
            shrink(&mut model, to);
            builder.after_apply(&model, &record(0.1));
            assert_eq!(builder.level_count(), expected_levels, "at {to} triangles");
        }

        shrink(&mut model, 1);
        builder.after_apply(&model, &record(0.2));
        let hierarchy = builder.finish(&model, 0);
        let counts: Vec<usize> = hierarchy.levels().iter().map(Level::triangle_count).collect();
        assert_eq!(counts, vec![8, 4, 2, 1]);
        assert_eq!(hierarchy.error(3), Some(0.2));
    }

    #[test]
    fn triangle_policy_skips_satisfied_targets() {
        let params = LodParams::with_triangle_counts(vec![10, 6, 5, 1]);
        let mut model = strip(8);
        let mut builder = HierarchyBuilder::for_model(&params, &model);

        builder.observe_initial(&model);
        assert_eq!(builder.level_count(), 1);

        // Dropping straight to 4 satisfies both 6 and 5
        shrink(&mut model, 4);
        builder.after_apply(&model, &record(0.3));
        assert_eq!(builder.level_count(), 2);
        assert!(!builder.is_done());

        shrink(&mut model, 1);
        builder.after_apply(&model, &record(0.4));
        assert!(builder.is_done());
        assert!(!builder.before_apply(&model, 0.5));

        let hierarchy = builder.finish(&model, 0);
        assert_eq!(hierarchy.level_count(), 3);
    }

    #[test]
    fn error_policy_snapshots_before_applying() {
        let params = LodParams::with_error_thresholds(vec![0.5, 1.0, 2.0]);
        let mut model = strip(8);
        let mut builder = HierarchyBuilder::for_model(&params, &model);
        builder.observe_initial(&model);
        assert_eq!(builder.level_count(), 0);

        assert!(builder.before_apply(&model, 0.1));
        shrink(&mut model, 6);
        builder.after_apply(&model, &record(0.1));

        // Crosses 0.5 and 1.0 at once: one level, taken before the collapse
        assert!(builder.before_apply(&model, 1.5));
        assert_eq!(builder.level_count(), 1);
        shrink(&mut model, 4);
        builder.after_apply(&model, &record(1.5));

        assert!(!builder.before_apply(&model, 2.0));
        assert!(builder.is_done());

        let hierarchy = builder.finish(&model, 3);
        let counts: Vec<usize> = hierarchy.levels().iter().map(Level::triangle_count).collect();
        assert_eq!(counts, vec![6, 4]);
        assert_eq!(hierarchy.error(0), Some(0.1));
        assert_eq!(hierarchy.error(1), Some(1.5));
        assert_eq!(hierarchy.stats().collapses_rejected, 3);
    }

    #[test]
    fn finish_keeps_the_coarsest_state_when_targets_run_out() {
        // Thresholds: the second one is never reached
        let params = LodParams::with_error_thresholds(vec![0.5, 100.0]);
        let mut model = strip(8);
        let mut builder = HierarchyBuilder::for_model(&params, &model);
        builder.observe_initial(&model);

        assert!(builder.before_apply(&model, 0.6));
        shrink(&mut model, 5);
        builder.after_apply(&model, &record(0.6));
        assert!(builder.before_apply(&model, 0.9));
        shrink(&mut model, 3);
        builder.after_apply(&model, &record(0.9));
        assert_eq!(builder.level_count(), 1);
        assert_eq!(builder.current_error(), 0.9);

        let hierarchy = builder.finish(&model, 0);
        let counts: Vec<usize> = hierarchy.levels().iter().map(Level::triangle_count).collect();
        assert_eq!(counts, vec![8, 3]);
        assert_eq!(hierarchy.error(1), Some(0.9));

        // Counts: only the first target is met before the run stops
        let params = LodParams::with_triangle_counts(vec![6, 1]);
        let mut model = strip(8);
        let mut builder = HierarchyBuilder::for_model(&params, &model);
        builder.observe_initial(&model);
        for to in [6, 4] {
            shrink(&mut model, to);
            builder.after_apply(&model, &record(0.2));
        }
        assert!(!builder.is_done());

        let hierarchy = builder.finish(&model, 0);
        let counts: Vec<usize> = hierarchy.levels().iter().map(Level::triangle_count).collect();
        assert_eq!(counts, vec![6, 4]);
    }

    #[test]
    fn finish_forces_a_level() {
        let params = LodParams::with_triangle_counts(vec![2]);
        let model = Model::from_mesh(&tetrahedron()).unwrap();
        let builder = HierarchyBuilder::for_model(&params, &model);
        let hierarchy = builder.finish(&model, 0);
        assert_eq!(hierarchy.level_count(), 1);
        assert_eq!(hierarchy.triangle_count(0), Some(4));
    }

    #[test]
    fn half_edge_levels_share_one_buffer() {
        let params = LodParams::with_percent_reduction(0.5);
        let mut model = strip(8);
        let mut builder = HierarchyBuilder::for_model(&params, &model);
        builder.observe_initial(&model);
        shrink(&mut model, 4);
        builder.after_apply(&model, &record(0.1));
        let hierarchy = builder.finish(&model, 0);

        assert_eq!(hierarchy.level_count(), 2);
        let fine = hierarchy.level(0).unwrap().patch(0).unwrap();
        let coarse = hierarchy.level(1).unwrap().patch(0).unwrap();
        assert_eq!(fine.vertices().len(), 10);
        assert!(coarse.vertices().is_empty());
        assert_eq!(coarse.vertex_count(), 6);
        assert!(coarse.indices().iter().all(|&i| (i as usize) < coarse.vertex_count()));
    }
}
