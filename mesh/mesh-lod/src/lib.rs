//! Incremental mesh simplification into discrete level-of-detail hierarchies.
//!
//! This crate turns an indexed triangle mesh into a sequence of progressively
//! coarser levels by repeatedly collapsing the cheapest edge:
//!
//! - **Welding**: Vertices within a tolerance are merged, and vertices that
//!   share a position but differ in attributes are linked into coincident
//!   rings so seams simplify as one vertex
//! - **Operators**: Half-edge collapse keeps surviving vertices in place (all
//!   levels share one vertex buffer); full-edge collapse may move or create
//!   vertices
//! - **Error metrics**: Bounding sphere, quadric error and a permission grid
//!   of spatial weights
//! - **Snapshot policies**: Percent reduction, triangle counts or error
//!   thresholds decide which states become levels
//! - **Cuts**: Select a level by triangle budget or (optionally projected)
//!   error and read back its buffers per patch
//! - **Serialization**: A compact little-endian binary format
//!
//! The crate has no renderer or engine dependency; readback hands out plain
//! slices that any graphics API can upload.
//!
//! # Example
//!
//! ```
//! use mesh_lod::{CutMode, CutSelector, LodParams, build_hierarchy};
//! use mesh_types::icosphere;
//!
//! let sphere = icosphere(2);
//! let hierarchy = build_hierarchy(&sphere, &LodParams::with_percent_reduction(0.5)).unwrap();
//! println!("{}", hierarchy.stats());
//!
//! let cut = hierarchy.select_cut(CutSelector::TriangleBudget(200), CutMode::ObjectSpace);
//! let buffers = cut.readback(0).unwrap();
//! assert!(buffers.index_count / 3 <= 200);
//! ```
//!
//! # Algorithm
//!
//! 1. Build a model: vertex and triangle pools with incidence lists
//! 2. Weld vertices and link coincident rings
//! 3. Queue a collapse operation for every adjacent ring pair, priced by the
//!    error metric; illegal collapses cost infinity
//! 4. Pop the cheapest operation, re-pricing it if it went stale, apply it,
//!    drop degenerate and duplicate triangles, and re-queue affected operations
//! 5. Snapshot the model whenever the policy fires

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod builder;
mod cut;
mod error;
mod hierarchy;
mod layout;
mod metric;
mod model;
mod params;
mod quadric;
mod queue;
mod serialize;
mod simplify;
mod weld;

use mesh_types::IndexedMesh;
use tracing::info;

// Re-export main types and functions
pub use builder::HierarchyBuilder;
pub use cut::{Cut, CutMode, CutSelector, ErrorProjector, PatchReadback};
pub use error::{LodError, LodResult};
pub use hierarchy::{Hierarchy, HierarchyStats, Level, PatchGeometry};
pub use metric::{MoveKind, PermissionGrid, SATURATED_COST};
pub use model::{Model, ModelTriangle, ModelVertex, Ring, TriangleId, VertexId};
pub use params::{ErrorMetric, LodParams, OperatorKind, QuadricConfig, SnapshotPolicy};
pub use quadric::Quadric;
pub use serialize::{deserialize, serialize};
pub use simplify::{CollapseRecord, Simplifier};
pub use weld::{WeldReport, weld_vertices};

/// Build a level-of-detail hierarchy from a mesh.
///
/// Faces with repeated corners are dropped, vertices are welded with
/// `params.weld_tolerance`, and the mesh is simplified until the snapshot
/// policy is satisfied or no legal collapse remains.
///
/// # Errors
///
/// Returns an error if the parameters are invalid, the mesh is malformed
/// or has no triangles left after welding.
///
/// # Example
///
/// ```
/// use mesh_lod::{LodParams, SnapshotPolicy, build_hierarchy};
/// use mesh_types::grid_plane;
///
/// let params = LodParams::full_edge()
///     .with_policy(SnapshotPolicy::TriangleCounts(vec![100, 50, 10]));
/// let hierarchy = build_hierarchy(&grid_plane(10, 10), &params).unwrap();
///
/// // 200 triangles in; the first level is taken at the first target
/// assert!(hierarchy.triangle_count(0).is_some_and(|n| n <= 100));
/// assert!(hierarchy.levels().windows(2).all(|w| w[1].triangle_count() <= w[0].triangle_count()));
/// ```
pub fn build_hierarchy(mesh: &IndexedMesh, params: &LodParams) -> LodResult<Hierarchy> {
    params.validate()?;
    info!(
        vertices = mesh.vertex_count(),
        triangles = mesh.face_count(),
        operator = %params.operator,
        metric = params.metric.name(),
        "Building LOD hierarchy"
    );

    let mut model = Model::from_mesh(mesh)?;
    weld_vertices(&mut model, params.weld_tolerance)?;
    if model.triangle_count() == 0 {
        return Err(LodError::NoTriangles);
    }

    let mut builder = HierarchyBuilder::for_model(params, &model);
    let mut simplifier = Simplifier::new(model, params)?;
    simplifier.run(&mut builder);

    let rejected = simplifier.blocked_operations();
    let hierarchy = builder.finish(simplifier.model(), rejected);
    info!("{}", hierarchy.stats());
    Ok(hierarchy)
}
