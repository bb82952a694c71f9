//! Vertex welding with attribute-aware splitting.
//!
//! Welding is fuzzy in position and strict in attributes: vertices within
//! the tolerance of a group's first vertex snap onto it, then the group is
//! split into buckets of bit-identical attributes. Each bucket becomes one
//! vertex and the buckets of a group share a coincident ring.

// Cell coordinates and table sizes don't overflow in practice
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

use mesh_types::{Point3, VertexAttributes};
use tracing::debug;

use crate::error::{LodError, LodResult};
use crate::model::{Model, TriangleId, VertexId};

/// Statistics from a weld pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WeldReport {
    /// Live vertices before welding.
    pub input_vertices: usize,

    /// Live vertices after welding.
    pub output_vertices: usize,

    /// Vertices merged into an attribute-identical neighbour.
    pub vertices_merged: usize,

    /// Vertices removed because no triangle used them.
    pub empty_vertices_removed: usize,

    /// Coincident rings with more than one member.
    pub coincident_rings: usize,

    /// Triangles removed because two corners fell into one ring.
    pub degenerate_triangles_removed: usize,
}

impl WeldReport {
    /// Check if the pass changed anything.
    #[must_use]
    pub const fn had_changes(&self) -> bool {
        self.vertices_merged > 0
            || self.empty_vertices_removed > 0
            || self.degenerate_triangles_removed > 0
    }
}

impl std::fmt::Display for WeldReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Weld: {} → {} vertices ({} merged, {} unused, {} rings, {} degenerate triangles)",
            self.input_vertices,
            self.output_vertices,
            self.vertices_merged,
            self.empty_vertices_removed,
            self.coincident_rings,
            self.degenerate_triangles_removed
        )
    }
}

/// Uniform grid hashed into a fixed number of buckets.
struct SpatialHash {
    cell_size: f64,
    buckets: Vec<Vec<usize>>,
}

impl SpatialHash {
    fn new(cell_size: f64, capacity: usize) -> Self {
        let table_size = (capacity * 2).max(64).next_power_of_two() - 1;
        Self {
            cell_size,
            buckets: vec![Vec::new(); table_size],
        }
    }

    fn cell(&self, p: &Point3<f64>) -> [i64; 3] {
        [
            (p.x / self.cell_size).floor() as i64,
            (p.y / self.cell_size).floor() as i64,
            (p.z / self.cell_size).floor() as i64,
        ]
    }

    fn slot(&self, [x, y, z]: [i64; 3]) -> usize {
        let h = x.wrapping_mul(73_856_093)
            ^ y.wrapping_mul(19_349_663)
            ^ z.wrapping_mul(83_492_791);
        h.rem_euclid(self.buckets.len() as i64) as usize
    }

    fn insert(&mut self, p: &Point3<f64>, item: usize) {
        let slot = self.slot(self.cell(p));
        self.buckets[slot].push(item);
    }

    /// Items in the 27 cells around `p`. May repeat items on hash collisions.
    fn neighbors(&self, p: &Point3<f64>) -> impl Iterator<Item = usize> + '_ {
        let [cx, cy, cz] = self.cell(p);
        (-1..=1)
            .flat_map(move |dx| (-1..=1).flat_map(move |dy| (-1..=1).map(move |dz| [dx, dy, dz])))
            .flat_map(move |[dx, dy, dz]| {
                let slot = self.slot([cx + dx, cy + dy, cz + dz]);
                self.buckets[slot].iter().copied()
            })
    }
}

/// Weld vertices within `tolerance` of each other.
///
/// Groups are claimed greedily in handle order: the first unclaimed vertex
/// claims every unclaimed vertex within `tolerance` of it. Positions snap
/// to the claiming vertex, attributes split each group into buckets that
/// share a ring, triangles with two corners in one ring are removed, and
/// vertices left without triangles are discarded.
///
/// Welding the result again with the same tolerance changes nothing.
///
/// # Errors
///
/// Returns [`LodError::InvalidTolerance`] for negative or non-finite
/// tolerances.
///
/// # Example
///
/// ```
/// use mesh_types::IndexedMesh;
/// use mesh_lod::{Model, weld_vertices};
///
/// // Two triangles sharing an edge, stored with duplicated vertices
/// let positions = [
///     0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0,
///     1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0,
/// ];
/// let mesh = IndexedMesh::from_raw(&positions, &[0, 1, 2, 3, 4, 5]);
/// let mut model = Model::from_mesh(&mesh).unwrap();
///
/// let report = weld_vertices(&mut model, 1e-6).unwrap();
/// assert_eq!(report.vertices_merged, 2);
/// assert_eq!(model.vertex_count(), 4);
/// ```
pub fn weld_vertices(model: &mut Model, tolerance: f64) -> LodResult<WeldReport> {
    if !tolerance.is_finite() || tolerance < 0.0 {
        return Err(LodError::InvalidTolerance(tolerance));
    }

    let ids: Vec<VertexId> = model.vertex_ids().collect();
    let positions: Vec<Point3<f64>> = ids
        .iter()
        .map(|&id| model.position(id).unwrap_or_else(Point3::origin))
        .collect();
    let mut report = WeldReport {
        input_vertices: ids.len(),
        ..WeldReport::default()
    };

    // Geometric grouping
    let cell_size = if tolerance > 0.0 { tolerance } else { 1.0 };
    let mut hash = SpatialHash::new(cell_size, ids.len());
    for (i, p) in positions.iter().enumerate() {
        hash.insert(p, i);
    }

    let mut claimed: Vec<Option<usize>> = vec![None; ids.len()];
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for i in 0..ids.len() {
        if claimed[i].is_some() {
            continue;
        }
        let group_idx = groups.len();
        claimed[i] = Some(group_idx);
        let mut group = vec![i];
        for j in hash.neighbors(&positions[i]) {
            if claimed[j].is_none() && (positions[j] - positions[i]).norm() <= tolerance {
                claimed[j] = Some(group_idx);
                group.push(j);
            }
        }
        group.sort_unstable();
        groups.push(group);
    }

    // Attribute split: every member maps to the first member of its bucket
    let mut group_of = vec![usize::MAX; model.vertex_slots()];
    let mut survivor_of = vec![VertexId(u32::MAX); model.vertex_slots()];
    let mut survivors: Vec<Vec<VertexId>> = Vec::with_capacity(groups.len());
    for (group_idx, group) in groups.iter().enumerate() {
        let anchor = positions[group[0]];
        let mut buckets: Vec<(VertexAttributes, VertexId)> = Vec::new();
        for &member in group {
            let id = ids[member];
            group_of[id.index()] = group_idx;
            let attributes = model
                .vertex(id)
                .map(|v| *v.attributes())
                .unwrap_or_default();
            let survivor = if let Some((_, s)) = buckets.iter().find(|(a, _)| *a == attributes) {
                *s
            } else {
                buckets.push((attributes, id));
                id
            };
            survivor_of[id.index()] = survivor;
            if positions[member] != anchor {
                model.set_position(id, anchor);
            }
        }
        survivors.push(buckets.into_iter().map(|(_, s)| s).collect());
    }

    // Triangle remap
    let triangles: Vec<(TriangleId, [VertexId; 3])> =
        model.triangles().map(|(id, t)| (id, t.corners)).collect();
    for (tri, corners) in triangles {
        let [a, b, c] = corners.map(|v| group_of[v.index()]);
        if a == b || b == c || a == c {
            model.remove_triangle(tri);
            report.degenerate_triangles_removed += 1;
            continue;
        }
        for corner in corners {
            let target = survivor_of[corner.index()];
            if target != corner {
                model.replace_corner(tri, corner, target);
            }
        }
    }

    // Ring rebuild, then discard merged duplicates
    for (group, group_survivors) in groups.iter().zip(&survivors) {
        for &member in group {
            model.unlink(ids[member]);
        }
        for pair in group_survivors.windows(2) {
            model.link_coincident(pair[0], pair[1]);
        }
        for &member in group {
            let id = ids[member];
            if survivor_of[id.index()] != id {
                model.remove_vertex(id);
                report.vertices_merged += 1;
            }
        }
    }

    report.empty_vertices_removed = model.remove_empty_verts();
    report.output_vertices = model.vertex_count();
    report.coincident_rings = model
        .representatives()
        .filter(|&r| model.ring_size(r) > 1)
        .count();

    debug!(
        input = report.input_vertices,
        output = report.output_vertices,
        merged = report.vertices_merged,
        rings = report.coincident_rings,
        degenerate = report.degenerate_triangles_removed,
        "Welded vertices"
    );

    Ok(report)
}
