//! Indexed triangle mesh with patch tags.

use std::collections::HashMap;

use crate::{Aabb, AttributeLayout, MeshBounds, Triangle, Vertex};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Input mesh for the LOD builder.
///
/// Faces index into `vertices`. Every face belongs to a *patch*, a group
/// that is simplified together with its neighbours but read back on its
/// own. Leaving `patches` empty puts the whole mesh in patch 0.
///
/// ```
/// use mesh_types::tetrahedron;
///
/// let mut mesh = tetrahedron();
/// mesh.append_patch(&tetrahedron());
///
/// assert_eq!(mesh.patch_count(), 2);
/// assert_eq!(mesh.patch_of(4), 1);
/// assert_eq!(mesh.faces[4], [4, 5, 6]);
/// ```
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IndexedMesh {
    /// Positions plus attributes.
    pub vertices: Vec<Vertex>,

    /// Corner indices, counter-clockwise from the front.
    pub faces: Vec<[u32; 3]>,

    /// Patch tag per face. Either empty or the same length as `faces`.
    pub patches: Vec<u32>,
}

impl IndexedMesh {
    /// Create a new empty mesh.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            vertices: Vec::new(),
            faces: Vec::new(),
            patches: Vec::new(),
        }
    }

    /// Create a mesh with pre-allocated capacity.
    #[inline]
    #[must_use]
    pub fn with_capacity(vertex_count: usize, face_count: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertex_count),
            faces: Vec::with_capacity(face_count),
            patches: Vec::new(),
        }
    }

    /// Create a single-patch mesh from vertices and faces.
    #[inline]
    #[must_use]
    pub const fn from_parts(vertices: Vec<Vertex>, faces: Vec<[u32; 3]>) -> Self {
        Self {
            vertices,
            faces,
            patches: Vec::new(),
        }
    }

    /// Create a single-patch mesh from raw coordinate and index data.
    ///
    /// Returns an empty mesh if either array length is not a multiple of 3.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_types::IndexedMesh;
    ///
    /// let positions = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
    /// let indices = [0, 1, 2];
    ///
    /// let mesh = IndexedMesh::from_raw(&positions, &indices);
    /// assert_eq!(mesh.vertex_count(), 3);
    /// assert_eq!(mesh.face_count(), 1);
    /// ```
    #[must_use]
    pub fn from_raw(positions: &[f64], indices: &[u32]) -> Self {
        if positions.len() % 3 != 0 || indices.len() % 3 != 0 {
            return Self::new();
        }

        let vertices = positions
            .chunks_exact(3)
            .map(|c| Vertex::from_coords(c[0], c[1], c[2]))
            .collect();

        let faces = indices
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect();

        Self::from_parts(vertices, faces)
    }

    /// Number of vertices.
    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of faces.
    #[inline]
    #[must_use]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Check if the mesh has no vertices or no faces.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.faces.is_empty()
    }

    /// Patch tag of a face (0 when no tags are stored).
    #[inline]
    #[must_use]
    pub fn patch_of(&self, face: usize) -> u32 {
        self.patches.get(face).copied().unwrap_or(0)
    }

    /// Number of patches: one more than the largest tag, or 1 if untagged.
    #[must_use]
    pub fn patch_count(&self) -> usize {
        self.patches.iter().max().map_or(1, |&max| max as usize + 1)
    }

    /// The attribute layout of the first vertex, if any.
    #[must_use]
    pub fn layout(&self) -> Option<AttributeLayout> {
        self.vertices.first().map(Vertex::layout)
    }

    /// Resolve a face into a [`Triangle`] of positions.
    ///
    /// Returns `None` if the face or any of its indices is out of range.
    #[must_use]
    pub fn triangle(&self, face: usize) -> Option<Triangle> {
        let [a, b, c] = *self.faces.get(face)?;
        Some(Triangle::new(
            self.vertices.get(a as usize)?.position,
            self.vertices.get(b as usize)?.position,
            self.vertices.get(c as usize)?.position,
        ))
    }

    /// Append `other` as a new patch.
    ///
    /// Face indices are offset and every face of `other` receives the tag
    /// `self.patch_count()` (existing untagged faces become patch 0).
    #[allow(clippy::cast_possible_truncation)]
    // Mesh indices are u32
    pub fn append_patch(&mut self, other: &Self) {
        let patch = if self.faces.is_empty() {
            0
        } else {
            self.patch_count() as u32
        };
        if self.patches.len() != self.faces.len() {
            self.patches = (0..self.faces.len()).map(|f| self.patch_of(f)).collect();
        }

        let offset = self.vertices.len() as u32;
        self.vertices.extend(other.vertices.iter().copied());
        for face in &other.faces {
            self.faces
                .push([face[0] + offset, face[1] + offset, face[2] + offset]);
            self.patches.push(patch);
        }
    }

    /// Translate every vertex.
    pub fn translate(&mut self, offset: nalgebra::Vector3<f64>) {
        for vertex in &mut self.vertices {
            vertex.position += offset;
        }
    }
}

impl MeshBounds for IndexedMesh {
    fn bounds(&self) -> Aabb {
        Aabb::from_points(self.vertices.iter().map(|v| &v.position))
    }
}

/// Axis-aligned cube spanning `[0, 1]^3`: 8 vertices, 12 outward faces.
///
/// Vertex `i` sits at `(i & 1, (i >> 1) & 1, (i >> 2) & 1)`.
///
/// ```
/// use mesh_types::{MeshBounds, unit_cube};
///
/// let cube = unit_cube();
/// assert_eq!(cube.face_count(), 12);
/// assert_eq!(cube.bounds().center().x, 0.5);
/// ```
#[must_use]
pub fn unit_cube() -> IndexedMesh {
    let vertices = (0..8u32)
        .map(|i| Vertex::from_coords(f64::from(i & 1), f64::from((i >> 1) & 1), f64::from(i >> 2)))
        .collect();
    // One quad per side, counter-clockwise seen from outside
    let quads = [
        [0, 2, 3, 1],
        [4, 5, 7, 6],
        [0, 1, 5, 4],
        [2, 6, 7, 3],
        [0, 4, 6, 2],
        [1, 3, 7, 5],
    ];
    let faces = quads
        .iter()
        .flat_map(|&[a, b, c, d]| [[a, b, c], [a, c, d]])
        .collect();
    IndexedMesh::from_parts(vertices, faces)
}

/// Create a regular tetrahedron: 4 vertices, 4 outward-facing triangles.
#[must_use]
pub fn tetrahedron() -> IndexedMesh {
    let positions = [
        [1.0, 1.0, 1.0],
        [1.0, -1.0, -1.0],
        [-1.0, 1.0, -1.0],
        [-1.0, -1.0, 1.0],
    ];
    let faces = vec![[0, 1, 2], [0, 3, 1], [0, 2, 3], [1, 3, 2]];
    IndexedMesh::from_parts(positions.into_iter().map(Vertex::from).collect(), faces)
}

/// Create a flat grid in the XY plane with `nx * ny` quads.
///
/// The grid spans `[0, nx] x [0, ny]`; every quad is split into two
/// triangles, so the mesh has `2 * nx * ny` faces and an open border.
/// Vertices carry texture coordinates spanning `[0, 1]`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn grid_plane(nx: u32, ny: u32) -> IndexedMesh {
    let mut mesh = IndexedMesh::with_capacity(
        ((nx + 1) * (ny + 1)) as usize,
        (2 * nx * ny) as usize,
    );
    for j in 0..=ny {
        for i in 0..=nx {
            let u = if nx == 0 { 0.0 } else { i as f32 / nx as f32 };
            let v = if ny == 0 { 0.0 } else { j as f32 / ny as f32 };
            mesh.vertices.push(
                Vertex::from_coords(f64::from(i), f64::from(j), 0.0).with_tex_coord([u, v]),
            );
        }
    }
    let row = nx + 1;
    for j in 0..ny {
        for i in 0..nx {
            let a = j * row + i;
            let b = a + 1;
            let c = a + row + 1;
            let d = a + row;
            mesh.faces.push([a, b, c]);
            mesh.faces.push([a, c, d]);
        }
    }
    mesh
}

/// Create an icosphere of unit radius.
///
/// Starts from an icosahedron (20 faces) and splits every face into four
/// `subdivisions` times, so the result has `20 * 4^subdivisions` faces.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn icosphere(subdivisions: u32) -> IndexedMesh {
    let phi = (1.0 + 5.0_f64.sqrt()) * 0.5;
    let a = 1.0;
    let b = 1.0 / phi;

    let corners = [
        [0.0, b, -a],
        [b, a, 0.0],
        [-b, a, 0.0],
        [0.0, b, a],
        [0.0, -b, a],
        [-a, 0.0, b],
        [0.0, -b, -a],
        [a, 0.0, -b],
        [a, 0.0, b],
        [-a, 0.0, -b],
        [b, -a, 0.0],
        [-b, -a, 0.0],
    ];

    let mut mesh = IndexedMesh::new();
    for c in &corners {
        mesh.vertices.push(normalized_vertex(*c));
    }
    mesh.faces = vec![
        [0, 1, 2],
        [3, 2, 1],
        [3, 4, 5],
        [3, 8, 4],
        [0, 6, 7],
        [0, 9, 6],
        [4, 10, 11],
        [6, 11, 10],
        [2, 5, 9],
        [11, 9, 5],
        [1, 7, 8],
        [10, 8, 7],
        [3, 5, 2],
        [3, 1, 8],
        [0, 2, 9],
        [0, 7, 1],
        [6, 9, 11],
        [6, 10, 7],
        [4, 11, 5],
        [4, 8, 10],
    ];

    for _ in 0..subdivisions {
        let mut midpoints: HashMap<(u32, u32), u32> = HashMap::new();
        let mut faces = Vec::with_capacity(mesh.faces.len() * 4);
        for &[v0, v1, v2] in &mesh.faces {
            let mut midpoint = |p: u32, q: u32| -> u32 {
                let key = (p.min(q), p.max(q));
                *midpoints.entry(key).or_insert_with(|| {
                    let pa = mesh.vertices[p as usize].position;
                    let pb = mesh.vertices[q as usize].position;
                    let m = nalgebra::center(&pa, &pb);
                    mesh.vertices.push(normalized_vertex([m.x, m.y, m.z]));
                    (mesh.vertices.len() - 1) as u32
                })
            };
            let a = midpoint(v0, v1);
            let b = midpoint(v1, v2);
            let c = midpoint(v2, v0);
            faces.extend([[v0, a, c], [v1, b, a], [v2, c, b], [a, b, c]]);
        }
        mesh.faces = faces;
    }

    mesh
}

fn normalized_vertex([x, y, z]: [f64; 3]) -> Vertex {
    let len = z.mul_add(z, x.mul_add(x, y * y)).sqrt();
    Vertex::from_coords(x / len, y / len, z / len)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn mesh_is_empty() {
        let mesh = IndexedMesh::new();
        assert!(mesh.is_empty());

        let mut mesh2 = IndexedMesh::new();
        mesh2.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
        assert!(mesh2.is_empty());
    }

    #[test]
    fn mesh_from_raw_rejects_ragged_input() {
        let mesh = IndexedMesh::from_raw(&[0.0, 0.0], &[0, 1, 2]);
        assert!(mesh.is_empty());
    }

    #[test]
    fn append_patch_tags_faces() {
        let mut mesh = tetrahedron();
        assert_eq!(mesh.patch_count(), 1);

        let mut other = tetrahedron();
        other.translate(nalgebra::Vector3::new(5.0, 0.0, 0.0));
        mesh.append_patch(&other);

        assert_eq!(mesh.patch_count(), 2);
        assert_eq!(mesh.face_count(), 8);
        assert_eq!(mesh.patch_of(0), 0);
        assert_eq!(mesh.patch_of(7), 1);
        assert_eq!(mesh.faces[4], [4, 5, 6]);
    }

    #[test]
    fn grid_plane_counts() {
        let grid = grid_plane(4, 3);
        assert_eq!(grid.vertex_count(), 20);
        assert_eq!(grid.face_count(), 24);
        assert!(grid.triangle(0).is_some_and(|t| (t.area() - 0.5).abs() < 1e-12));
    }

    #[test]
    fn icosphere_counts() {
        let sphere = icosphere(2);
        assert_eq!(sphere.face_count(), 320);
        assert_eq!(sphere.vertex_count(), 162);
        for v in &sphere.vertices {
            assert!((v.position.coords.norm() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn unit_cube_faces_point_outward() {
        let cube = unit_cube();
        let center = cube.bounds().center();
        for face in 0..cube.face_count() {
            let tri = cube.triangle(face).unwrap();
            let normal = tri.normal().unwrap();
            assert!(normal.dot(&(tri.v0 - center)) > 0.0, "face {face}");
            assert!((tri.area() - 0.5).abs() < 1e-12);
        }
    }

    #[test]
    fn grid_bounds_lie_in_the_xy_plane() {
        let b = grid_plane(5, 2).bounds();
        assert_eq!(b.min, nalgebra::Point3::origin());
        assert_eq!(b.max, nalgebra::Point3::new(5.0, 2.0, 0.0));
    }
}
