//! End-to-end scenarios for hierarchy construction.
//!
//! Run with: cargo test -p mesh-lod --test scenarios

#![allow(clippy::unwrap_used, clippy::float_cmp, clippy::cast_precision_loss)]

use hashbrown::HashSet;
use mesh_lod::{
    CutMode, CutSelector, ErrorMetric, LodError, LodParams, Model, OperatorKind, PermissionGrid,
    Simplifier, VertexId, build_hierarchy,
};
use mesh_types::{IndexedMesh, Point3, Vector3, grid_plane, icosphere, tetrahedron};

// =============================================================================
// Helpers
// =============================================================================

/// No two live triangles connect the same three rings.
fn has_duplicate_triangles(model: &Model) -> bool {
    let mut seen = HashSet::new();
    model.triangles().any(|(_, tri)| {
        let mut reps = tri.corners.map(|c| model.representative(c));
        reps.sort_unstable();
        !seen.insert(reps)
    })
}

fn two_patch_mesh() -> IndexedMesh {
    let mut mesh = grid_plane(4, 4);
    let mut other = grid_plane(4, 4);
    other.translate(Vector3::new(10.0, 0.0, 0.0));
    mesh.append_patch(&other);
    mesh
}

// =============================================================================
// Named scenarios
// =============================================================================

#[test]
fn tetrahedron_without_reduction_is_one_level() {
    let params = LodParams::with_triangle_counts(vec![4]).with_metric(ErrorMetric::Sphere);
    let hierarchy = build_hierarchy(&tetrahedron(), &params).unwrap();

    assert_eq!(hierarchy.operator(), OperatorKind::HalfEdge);
    assert_eq!(hierarchy.level_count(), 1);
    assert_eq!(hierarchy.triangle_count(0), Some(4));
    assert_eq!(hierarchy.error(0), Some(0.0));
    assert_eq!(hierarchy.stats().collapses_performed, 0);
}

#[test]
fn collapse_into_duplicate_keeps_one_copy() {
    // Every edge collapse of a tetrahedron folds the far triangle onto the
    // remaining one
    let model = Model::from_mesh(&tetrahedron()).unwrap();
    let mut simplifier = Simplifier::new(model, &LodParams::default()).unwrap();

    let record = simplifier.step().unwrap();
    assert_eq!(record.triangles_destroyed, 3);
    assert_eq!(simplifier.model().triangle_count(), 1);
    assert!(!has_duplicate_triangles(simplifier.model()));
}

#[test]
fn simplification_never_leaves_duplicates() {
    for operator in [OperatorKind::HalfEdge, OperatorKind::FullEdge] {
        let model = Model::from_mesh(&icosphere(2)).unwrap();
        let params = LodParams::default().with_operator(operator);
        let mut simplifier = Simplifier::new(model, &params).unwrap();

        while let Some(record) = simplifier.step() {
            assert!(record.triangles_destroyed >= 1, "{operator}: {record:?}");
            assert!(!has_duplicate_triangles(simplifier.model()), "{operator}");
        }
        assert!(simplifier.model().check_triangles());
        assert!(simplifier.model().check_rings());
    }
}

#[test]
fn border_lock_never_moves_a_border_vertex() {
    let model = Model::from_mesh(&grid_plane(6, 6)).unwrap();
    let border: HashSet<VertexId> = model.vertex_ids().filter(|&v| model.is_on_border(v)).collect();
    assert_eq!(border.len(), 24);

    let params = LodParams::half_edge().with_border_lock(true);
    let mut simplifier = Simplifier::new(model, &params).unwrap();

    let mut applied = 0;
    while let Some(record) = simplifier.step() {
        assert!(!border.contains(&record.source), "border vertex {} moved", record.source);
        applied += 1;
    }
    assert!(applied > 0);
    let model = simplifier.model();
    assert!(border.iter().all(|&v| model.contains_vertex(v)));
}

#[test]
fn percent_reduction_halves_between_levels() {
    let mesh = grid_plane(25, 20);
    assert_eq!(mesh.face_count(), 1000);

    let hierarchy = build_hierarchy(&mesh, &LodParams::with_percent_reduction(0.5)).unwrap();
    let counts = hierarchy.stats().triangles;

    assert_eq!(counts[0], 1000);
    assert!(counts.len() >= 4, "{counts:?}");
    // All but the last level were taken by the policy
    for pair in counts[..counts.len() - 1].windows(2) {
        assert!(pair[1] as f64 <= pair[0] as f64 * 0.5, "{counts:?}");
    }
    assert!(counts.windows(2).all(|w| w[1] < w[0]), "{counts:?}");
}

// =============================================================================
// Policies and metrics
// =============================================================================

#[test]
fn error_thresholds_give_increasing_levels() {
    let thresholds = vec![0.01, 0.05, 0.2];
    let params = LodParams::with_error_thresholds(thresholds.clone());
    let hierarchy = build_hierarchy(&icosphere(2), &params).unwrap();

    let stats = hierarchy.stats();
    assert!(!stats.triangles.is_empty());
    assert!(stats.triangles.windows(2).all(|w| w[1] < w[0]), "{stats}");
    assert!(stats.errors.windows(2).all(|w| w[0] <= w[1]), "{stats}");
    // The first level precedes the first collapse that reaches a threshold
    assert!(stats.errors[0] < thresholds[0]);
}

#[test]
fn unreached_threshold_still_keeps_the_coarsest_mesh() {
    let params = LodParams::with_error_thresholds(vec![0.001, 1e6]);
    let hierarchy = build_hierarchy(&icosphere(2), &params).unwrap();
    let stats = hierarchy.stats();

    assert!(stats.collapses_performed > 0, "{stats}");
    assert!(hierarchy.level_count() >= 2, "{stats}");
    let coarsest = stats.coarsest_triangles();
    assert!(coarsest < stats.triangles[0], "{stats}");
    assert!(stats.errors.windows(2).all(|w| w[0] <= w[1]), "{stats}");
}

#[test]
fn unreached_triangle_target_still_keeps_the_coarsest_mesh() {
    // Border lock stalls the grid long before one triangle is left
    let params = LodParams::with_triangle_counts(vec![72, 1]).with_border_lock(true);
    let hierarchy = build_hierarchy(&grid_plane(6, 6), &params).unwrap();
    let stats = hierarchy.stats();

    assert_eq!(stats.triangles[0], 72);
    assert!(stats.coarsest_triangles() > 1, "{stats}");
    assert!(hierarchy.level_count() >= 2, "{stats}");
    assert!(stats.triangles.windows(2).all(|w| w[1] < w[0]), "{stats}");
}

#[test]
fn triangle_targets_are_met_in_order() {
    let params =
        LodParams::with_triangle_counts(vec![300, 150, 60]).with_operator(OperatorKind::FullEdge);
    let hierarchy = build_hierarchy(&icosphere(2), &params).unwrap();

    assert_eq!(hierarchy.level_count(), 3);
    for (level, target) in [300, 150, 60].into_iter().enumerate() {
        let count = hierarchy.triangle_count(level).unwrap();
        // A collapse removes at most a handful of triangles
        assert!(count <= target && count + 4 >= target, "level {level}: {count}");
    }
}

#[test]
fn permission_grid_outside_the_mesh_forbids_everything() {
    let far = Point3::new(100.0, 100.0, 100.0);
    let grid = PermissionGrid::new(far, 1.0, [1, 1, 1], vec![1.0]).unwrap();
    let params = LodParams::default().with_metric(ErrorMetric::PermissionGrid(grid));
    let hierarchy = build_hierarchy(&grid_plane(4, 4), &params).unwrap();

    assert_eq!(hierarchy.level_count(), 1);
    assert_eq!(hierarchy.triangle_count(0), Some(32));
    let stats = hierarchy.stats();
    assert_eq!(stats.collapses_performed, 0);
    assert!(stats.collapses_rejected > 0);
}

#[test]
fn permission_grid_prices_moves_by_weight() {
    let origin = Point3::new(-1.0, -1.0, -1.0);
    let grid = PermissionGrid::new(origin, 0.5, [14, 14, 4], vec![2.0; 14 * 14 * 4]).unwrap();
    let params =
        LodParams::with_percent_reduction(0.5).with_metric(ErrorMetric::PermissionGrid(grid));
    let hierarchy = build_hierarchy(&grid_plane(4, 4), &params).unwrap();

    assert!(hierarchy.level_count() > 1);
    // Each half-edge collapse moves a vertex one grid step at weight 2
    let error = hierarchy.error(1).unwrap();
    assert!(error >= 2.0 - 1e-9, "{error}");
}

// =============================================================================
// Cuts and patches
// =============================================================================

#[test]
fn patches_are_simplified_and_read_back_independently() {
    let mesh = two_patch_mesh();
    for operator in [OperatorKind::HalfEdge, OperatorKind::FullEdge] {
        let params = LodParams::with_percent_reduction(0.5).with_operator(operator);
        let hierarchy = build_hierarchy(&mesh, &params).unwrap();

        assert_eq!(hierarchy.patch_count(), 2);
        assert!(hierarchy.patch_bounds(1).unwrap().min.x >= 10.0);

        for level in 0..hierarchy.level_count() {
            let cut = hierarchy.cut_at(level).unwrap();
            let mut triangles = 0;
            for patch in 0..2 {
                let buffers = cut.readback(patch).unwrap();
                assert_eq!(buffers.vertices.len(), buffers.vertex_count * buffers.layout.stride());
                assert!(buffers.indices.iter().all(|&i| (i as usize) < buffers.vertex_count));
                triangles += buffers.index_count / 3;

                // Patch 1 never borrows vertices from patch 0
                if patch == 1 {
                    assert!(buffers.vertices.chunks(buffers.layout.stride()).all(|v| v[0] >= 10.0));
                }
            }
            assert_eq!(Some(triangles), hierarchy.triangle_count(level));
        }
        assert!(matches!(
            hierarchy.cut_at(0).unwrap().readback(2),
            Err(LodError::PatchOutOfRange { patch: 2, patch_count: 2 })
        ));
    }
}

#[test]
fn texture_coordinates_survive_in_readback() {
    let params = LodParams::with_percent_reduction(0.5);
    let hierarchy = build_hierarchy(&grid_plane(8, 8), &params).unwrap();
    let cut = hierarchy.select_cut(CutSelector::TriangleBudget(40), CutMode::ObjectSpace);
    assert!(cut.level() > 0);

    let buffers = cut.readback(0).unwrap();
    assert_eq!(buffers.layout.stride(), 5);
    // Half-edge collapse keeps original vertices, so uv = position / 8
    for v in buffers.vertices.chunks(5) {
        assert!((v[3] * 8.0 - v[0]).abs() < 1e-5, "{v:?}");
        assert!((v[4] * 8.0 - v[1]).abs() < 1e-5, "{v:?}");
    }
}

#[test]
fn multiplier_changes_cut_selection() {
    let params = LodParams::with_percent_reduction(0.5);
    let mut hierarchy = build_hierarchy(&icosphere(2), &params).unwrap();
    let last = hierarchy.level_count() - 1;
    let threshold = hierarchy.error(last).unwrap();
    assert!(threshold > 0.0);

    let select = |h: &mesh_lod::Hierarchy| {
        h.select_cut(CutSelector::ErrorThreshold(threshold), CutMode::ObjectSpace)
            .level()
    };
    assert_eq!(select(&hierarchy), last);

    hierarchy.set_quadric_multiplier(10.0).unwrap();
    assert!(select(&hierarchy) < last);
    assert_eq!(hierarchy.level(last).unwrap().original_error(), threshold);
}

#[test]
fn rejects_bad_input() {
    assert!(matches!(
        build_hierarchy(&IndexedMesh::new(), &LodParams::default()),
        Err(LodError::EmptyMesh)
    ));
    assert!(matches!(
        build_hierarchy(&tetrahedron(), &LodParams::with_percent_reduction(1.5)),
        Err(LodError::InvalidPercent(_))
    ));
    assert!(matches!(
        build_hierarchy(&tetrahedron(), &LodParams::with_triangle_counts(vec![4, 8])),
        Err(LodError::TriangleSpecNotDecreasing { index: 1 })
    ));

    let mut broken = tetrahedron();
    broken.faces.push([0, 1, 9]);
    assert!(matches!(
        build_hierarchy(&broken, &LodParams::default()),
        Err(LodError::InvalidIndex { index: 9, .. })
    ));
}
