//! The live mesh model mutated by simplification.
//!
//! Vertices and triangles live in arenas addressed by stable handles that
//! are never reused. Vertices sharing one 3D position but carrying
//! different attributes are linked into a circular *coincident ring*; the
//! member with the smallest handle is the ring's representative.

use std::fmt;

use hashbrown::HashMap;
use mesh_types::{AttributeLayout, IndexedMesh, Point3, Vertex, VertexAttributes};
use smallvec::SmallVec;

use crate::error::{LodError, LodResult};

/// Stable handle of a vertex in a [`Model`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VertexId(pub u32);

impl VertexId {
    /// Arena slot.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Stable handle of a triangle in a [`Model`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TriangleId(pub u32);

impl TriangleId {
    /// Arena slot.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TriangleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// A vertex stored in the model.
#[derive(Debug, Clone)]
pub struct ModelVertex {
    /// Position and attributes.
    pub vertex: Vertex,
    next_coincident: VertexId,
    triangles: SmallVec<[TriangleId; 8]>,
}

impl ModelVertex {
    /// Position of the vertex.
    #[inline]
    #[must_use]
    pub const fn position(&self) -> &Point3<f64> {
        &self.vertex.position
    }

    /// Attributes of the vertex.
    #[inline]
    #[must_use]
    pub const fn attributes(&self) -> &VertexAttributes {
        &self.vertex.attributes
    }

    /// Next member of the coincident ring (itself for a singleton ring).
    #[inline]
    #[must_use]
    pub const fn next_coincident(&self) -> VertexId {
        self.next_coincident
    }

    /// Triangles using this vertex.
    #[inline]
    #[must_use]
    pub fn triangles(&self) -> &[TriangleId] {
        &self.triangles
    }
}

/// A triangle stored in the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelTriangle {
    /// Corner vertices, counter-clockwise.
    pub corners: [VertexId; 3],
    /// Patch the triangle came from.
    pub patch: u32,
}

impl ModelTriangle {
    /// Check whether `v` is one of the corners.
    #[inline]
    #[must_use]
    pub fn contains(&self, v: VertexId) -> bool {
        self.corners.contains(&v)
    }
}

/// Vertex and triangle pools with coincident rings and back-references.
#[derive(Debug, Clone, Default)]
pub struct Model {
    vertices: Vec<Option<ModelVertex>>,
    triangles: Vec<Option<ModelTriangle>>,
    vertex_count: usize,
    triangle_count: usize,
    patch_count: usize,
    layout: AttributeLayout,
}

impl Model {
    /// Create an empty model.
    #[must_use]
    pub fn new(layout: AttributeLayout) -> Self {
        Self {
            layout,
            patch_count: 1,
            ..Self::default()
        }
    }

    /// Build a model from an indexed mesh.
    ///
    /// Every vertex starts in its own ring. Faces that repeat an index are
    /// dropped. Vertices are kept even when no face uses them; see
    /// [`remove_empty_verts`](Self::remove_empty_verts).
    ///
    /// # Errors
    ///
    /// Returns an error if the mesh is empty, a face index is out of range,
    /// the patch tags do not match the faces, or vertices disagree on their
    /// attribute layout.
    pub fn from_mesh(mesh: &IndexedMesh) -> LodResult<Self> {
        if mesh.vertices.is_empty() {
            return Err(LodError::EmptyMesh);
        }
        if mesh.faces.is_empty() {
            return Err(LodError::NoTriangles);
        }
        if !mesh.patches.is_empty() && mesh.patches.len() != mesh.faces.len() {
            return Err(LodError::PatchCountMismatch {
                faces: mesh.faces.len(),
                patches: mesh.patches.len(),
            });
        }

        let layout = mesh.vertices[0].layout();
        if let Some(index) = mesh.vertices.iter().position(|v| v.layout() != layout) {
            return Err(LodError::InconsistentAttributes { index });
        }

        let vertex_count = mesh.vertices.len();
        if let Some(&index) = mesh
            .faces
            .iter()
            .flatten()
            .find(|&&i| i as usize >= vertex_count)
        {
            return Err(LodError::InvalidIndex {
                index,
                vertex_count,
            });
        }

        let mut model = Self::new(layout);
        model.patch_count = mesh.patch_count();
        model.vertices.reserve(vertex_count);
        model.triangles.reserve(mesh.faces.len());

        for vertex in &mesh.vertices {
            model.add_vertex(*vertex);
        }
        for (face_idx, &[a, b, c]) in mesh.faces.iter().enumerate() {
            if a == b || b == c || a == c {
                continue;
            }
            model.add_triangle(
                [VertexId(a), VertexId(b), VertexId(c)],
                mesh.patch_of(face_idx),
            );
        }

        if model.triangle_count == 0 {
            return Err(LodError::NoTriangles);
        }
        Ok(model)
    }

    // ========================================================================
    // Pools
    // ========================================================================

    /// Add a vertex in its own ring.
    #[allow(clippy::cast_possible_truncation)]
    // Truncation: handles are u32, models with >4B vertices are unsupported
    pub fn add_vertex(&mut self, vertex: Vertex) -> VertexId {
        let id = VertexId(self.vertices.len() as u32);
        self.vertices.push(Some(ModelVertex {
            vertex,
            next_coincident: id,
            triangles: SmallVec::new(),
        }));
        self.vertex_count += 1;
        id
    }

    /// Remove a vertex, unlinking it from its ring.
    ///
    /// The vertex must not be used by any triangle.
    pub fn remove_vertex(&mut self, id: VertexId) -> Option<Vertex> {
        debug_assert!(
            self.vertex(id).is_none_or(|v| v.triangles.is_empty()),
            "removing {id} while triangles still use it"
        );
        self.unlink(id);
        let removed = self.vertices.get_mut(id.index())?.take()?;
        self.vertex_count -= 1;
        Some(removed.vertex)
    }

    /// Add a triangle and register it with its corners.
    #[allow(clippy::cast_possible_truncation)]
    // Truncation: handles are u32, models with >4B triangles are unsupported
    pub fn add_triangle(&mut self, corners: [VertexId; 3], patch: u32) -> TriangleId {
        let id = TriangleId(self.triangles.len() as u32);
        self.triangles.push(Some(ModelTriangle { corners, patch }));
        for corner in corners {
            if let Some(v) = self.vertex_mut(corner) {
                v.triangles.push(id);
            }
        }
        self.triangle_count += 1;
        id
    }

    /// Remove a triangle and its back-references.
    pub fn remove_triangle(&mut self, id: TriangleId) -> Option<ModelTriangle> {
        let triangle = self.triangles.get_mut(id.index())?.take()?;
        for corner in triangle.corners {
            self.detach(corner, id);
        }
        self.triangle_count -= 1;
        Some(triangle)
    }

    /// Repoint the corner of `triangle` that is `from` to `to`.
    ///
    /// Returns `false` if the triangle is dead or does not use `from`.
    pub fn replace_corner(&mut self, triangle: TriangleId, from: VertexId, to: VertexId) -> bool {
        let Some(Some(tri)) = self.triangles.get_mut(triangle.index()) else {
            return false;
        };
        let Some(slot) = tri.corners.iter().position(|&c| c == from) else {
            return false;
        };
        tri.corners[slot] = to;
        self.detach(from, triangle);
        if let Some(v) = self.vertex_mut(to) {
            v.triangles.push(triangle);
        }
        true
    }

    fn detach(&mut self, vertex: VertexId, triangle: TriangleId) {
        if let Some(v) = self.vertex_mut(vertex) {
            if let Some(pos) = v.triangles.iter().position(|&t| t == triangle) {
                v.triangles.swap_remove(pos);
            }
        }
    }

    /// Rebuild every vertex's triangle back-references from the triangles.
    #[allow(clippy::cast_possible_truncation)]
    pub fn index_vert_tris(&mut self) {
        for v in self.vertices.iter_mut().flatten() {
            v.triangles.clear();
        }
        for (idx, slot) in self.triangles.iter().enumerate() {
            let Some(tri) = slot else { continue };
            for corner in tri.corners {
                if let Some(Some(v)) = self.vertices.get_mut(corner.index()) {
                    v.triangles.push(TriangleId(idx as u32));
                }
            }
        }
    }

    /// Remove every vertex no triangle uses.
    ///
    /// Returns the number of vertices removed.
    pub fn remove_empty_verts(&mut self) -> usize {
        let empty: Vec<VertexId> = self
            .vertex_ids()
            .filter(|&id| self.vertex(id).is_some_and(|v| v.triangles.is_empty()))
            .collect();
        for &id in &empty {
            self.remove_vertex(id);
        }
        empty.len()
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Look up a live vertex.
    #[inline]
    #[must_use]
    pub fn vertex(&self, id: VertexId) -> Option<&ModelVertex> {
        self.vertices.get(id.index()).and_then(Option::as_ref)
    }

    #[inline]
    fn vertex_mut(&mut self, id: VertexId) -> Option<&mut ModelVertex> {
        self.vertices.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Position of a live vertex.
    #[inline]
    #[must_use]
    pub fn position(&self, id: VertexId) -> Option<Point3<f64>> {
        self.vertex(id).map(|v| v.vertex.position)
    }

    /// Set the position of a live vertex.
    pub fn set_position(&mut self, id: VertexId, position: Point3<f64>) {
        if let Some(v) = self.vertex_mut(id) {
            v.vertex.position = position;
        }
    }

    /// Look up a live triangle.
    #[inline]
    #[must_use]
    pub fn triangle(&self, id: TriangleId) -> Option<&ModelTriangle> {
        self.triangles.get(id.index()).and_then(Option::as_ref)
    }

    /// Check whether a vertex is live.
    #[inline]
    #[must_use]
    pub fn contains_vertex(&self, id: VertexId) -> bool {
        self.vertex(id).is_some()
    }

    /// Triangles using a vertex (empty for dead vertices).
    #[inline]
    #[must_use]
    pub fn vertex_triangles(&self, id: VertexId) -> &[TriangleId] {
        self.vertex(id).map_or(&[], ModelVertex::triangles)
    }

    /// Handles of all live vertices, ascending.
    #[allow(clippy::cast_possible_truncation)]
    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.vertices
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_some())
            .map(|(i, _)| VertexId(i as u32))
    }

    /// All live triangles with their handles, ascending.
    #[allow(clippy::cast_possible_truncation)]
    pub fn triangles(&self) -> impl Iterator<Item = (TriangleId, &ModelTriangle)> + '_ {
        self.triangles
            .iter()
            .enumerate()
            .filter_map(|(i, t)| t.as_ref().map(|t| (TriangleId(i as u32), t)))
    }

    /// Number of live vertices.
    #[inline]
    #[must_use]
    pub const fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Number of live triangles.
    #[inline]
    #[must_use]
    pub const fn triangle_count(&self) -> usize {
        self.triangle_count
    }

    /// Number of patches the triangles are tagged with.
    #[inline]
    #[must_use]
    pub const fn patch_count(&self) -> usize {
        self.patch_count
    }

    /// Attribute layout shared by every vertex.
    #[inline]
    #[must_use]
    pub const fn layout(&self) -> AttributeLayout {
        self.layout
    }

    /// Upper bound (exclusive) on vertex handle slots.
    #[inline]
    #[must_use]
    pub fn vertex_slots(&self) -> usize {
        self.vertices.len()
    }

    // ========================================================================
    // Coincident rings
    // ========================================================================

    /// Iterate the ring containing `id`, starting at `id`.
    #[must_use]
    pub fn ring(&self, id: VertexId) -> Ring<'_> {
        Ring {
            model: self,
            start: id,
            next: self.contains_vertex(id).then_some(id),
            remaining: self.vertices.len(),
        }
    }

    /// Number of members in the ring containing `id`.
    #[must_use]
    pub fn ring_size(&self, id: VertexId) -> usize {
        self.ring(id).count()
    }

    /// The ring member with the smallest handle.
    #[must_use]
    pub fn representative(&self, id: VertexId) -> VertexId {
        self.ring(id).min().unwrap_or(id)
    }

    /// Check whether `id` is the representative of its ring.
    #[must_use]
    pub fn is_representative(&self, id: VertexId) -> bool {
        self.contains_vertex(id) && self.representative(id) == id
    }

    /// The representative the ring would have if `id` were removed.
    #[must_use]
    pub fn next_representative(&self, id: VertexId) -> Option<VertexId> {
        self.ring(id).filter(|&m| m != id).min()
    }

    /// Live ring representatives, ascending.
    pub fn representatives(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.vertex_ids().filter(|&id| self.representative(id) == id)
    }

    /// Check whether `a` and `b` are in the same ring.
    #[must_use]
    pub fn same_ring(&self, a: VertexId, b: VertexId) -> bool {
        self.ring(a).any(|m| m == b)
    }

    /// Number of ring members that carry at least one triangle.
    #[must_use]
    pub fn nonempty_coincident_count(&self, id: VertexId) -> usize {
        self.ring(id)
            .filter(|&m| !self.vertex_triangles(m).is_empty())
            .count()
    }

    /// Every triangle used by any member of the ring.
    pub fn ring_triangles(&self, id: VertexId) -> impl Iterator<Item = TriangleId> + '_ {
        self.ring(id)
            .flat_map(move |m| self.vertex_triangles(m).iter().copied())
    }

    /// Check whether the rings of `a` and `b` share a triangle edge.
    #[must_use]
    pub fn rings_adjacent(&self, a: VertexId, b: VertexId) -> bool {
        let target = self.representative(b);
        self.ring_triangles(a).any(|t| {
            self.triangle(t).is_some_and(|tri| {
                tri.corners
                    .iter()
                    .any(|&c| self.representative(c) == target)
            })
        })
    }

    /// Representatives of all rings adjacent to the ring of `id`, sorted.
    #[must_use]
    pub fn neighbor_reps(&self, id: VertexId) -> Vec<VertexId> {
        let own = self.representative(id);
        let mut neighbors: Vec<VertexId> = self
            .ring_triangles(id)
            .filter_map(|t| self.triangle(t))
            .flat_map(|tri| tri.corners)
            .map(|c| self.representative(c))
            .filter(|&r| r != own)
            .collect();
        neighbors.sort_unstable();
        neighbors.dedup();
        neighbors
    }

    /// Check whether the ring of `id` lies on a geometric border.
    ///
    /// The ring's triangles form a closed fan exactly when every adjacent
    /// ring appears in exactly two of them.
    #[must_use]
    pub fn is_on_border(&self, id: VertexId) -> bool {
        let own = self.representative(id);
        let mut counts: HashMap<VertexId, u32> = HashMap::new();
        for tri in self.ring_triangles(id).filter_map(|t| self.triangle(t)) {
            for &corner in &tri.corners {
                let rep = self.representative(corner);
                if rep != own {
                    *counts.entry(rep).or_insert(0) += 1;
                }
            }
        }
        counts.values().any(|&n| n != 2)
    }

    /// Merge the rings of `a` and `b`. No-op if they already share a ring.
    pub fn link_coincident(&mut self, a: VertexId, b: VertexId) {
        if !self.contains_vertex(a) || !self.contains_vertex(b) || self.same_ring(a, b) {
            return;
        }
        let (Some(next_a), Some(next_b)) = (
            self.vertex(a).map(|v| v.next_coincident),
            self.vertex(b).map(|v| v.next_coincident),
        ) else {
            return;
        };
        if let Some(v) = self.vertex_mut(a) {
            v.next_coincident = next_b;
        }
        if let Some(v) = self.vertex_mut(b) {
            v.next_coincident = next_a;
        }
    }

    /// Take `id` out of its ring, leaving it in a ring of its own.
    pub fn unlink(&mut self, id: VertexId) {
        let Some(next) = self.vertex(id).map(|v| v.next_coincident) else {
            return;
        };
        if next == id {
            return;
        }
        let prev = self
            .ring(id)
            .find(|&m| self.vertex(m).is_some_and(|v| v.next_coincident == id));
        if let Some(prev) = prev {
            if let Some(v) = self.vertex_mut(prev) {
                v.next_coincident = next;
            }
        }
        if let Some(v) = self.vertex_mut(id) {
            v.next_coincident = id;
        }
    }

    // ========================================================================
    // Export and checks
    // ========================================================================

    /// Compact the live model back into an indexed mesh.
    ///
    /// Vertices and faces keep their relative handle order; every face
    /// carries its patch tag.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_indexed_mesh(&self) -> IndexedMesh {
        let mut mesh = IndexedMesh::with_capacity(self.vertex_count, self.triangle_count);
        let mut remap: HashMap<VertexId, u32> = HashMap::with_capacity(self.vertex_count);
        for id in self.vertex_ids() {
            if let Some(v) = self.vertex(id) {
                remap.insert(id, mesh.vertices.len() as u32);
                mesh.vertices.push(v.vertex);
            }
        }
        for (_, tri) in self.triangles() {
            let [a, b, c] = tri.corners.map(|c| remap.get(&c).copied().unwrap_or(0));
            mesh.faces.push([a, b, c]);
            mesh.patches.push(tri.patch);
        }
        mesh
    }

    /// Verify ring closure and that ring members share one position.
    #[must_use]
    pub fn check_rings(&self) -> bool {
        for id in self.vertex_ids() {
            let Some(position) = self.position(id) else {
                return false;
            };
            let mut current = id;
            let mut steps = 0;
            loop {
                let Some(v) = self.vertex(current) else {
                    return false;
                };
                if v.vertex.position != position {
                    return false;
                }
                steps += 1;
                current = v.next_coincident;
                if current == id {
                    break;
                }
                if steps > self.vertex_count {
                    return false;
                }
            }
            if steps != self.ring_size(id) {
                return false;
            }
        }
        true
    }

    /// Verify triangle corners are live, belong to three distinct rings and
    /// agree with the back-references.
    #[must_use]
    pub fn check_triangles(&self) -> bool {
        for (id, tri) in self.triangles() {
            let reps = tri.corners.map(|c| self.representative(c));
            if reps[0] == reps[1] || reps[1] == reps[2] || reps[0] == reps[2] {
                return false;
            }
            for corner in tri.corners {
                if !self.vertex_triangles(corner).contains(&id) {
                    return false;
                }
            }
        }
        self.vertex_ids().all(|v| {
            self.vertex_triangles(v)
                .iter()
                .all(|&t| self.triangle(t).is_some_and(|tri| tri.contains(v)))
        })
    }
}

/// Iterator over the members of a coincident ring.
#[derive(Debug, Clone)]
pub struct Ring<'a> {
    model: &'a Model,
    start: VertexId,
    next: Option<VertexId>,
    remaining: usize,
}

impl Iterator for Ring<'_> {
    type Item = VertexId;

    fn next(&mut self) -> Option<VertexId> {
        let current = self.next?;
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let following = self.model.vertex(current)?.next_coincident;
        self.next = (following != self.start).then_some(following);
        Some(current)
    }
}
