//! Mesh data shared by the LOD builder and the hosts that feed it.
//!
//! Input meshes arrive as an [`IndexedMesh`]: [`Vertex`] records with a
//! position and a small [`VertexAttributes`] table, `u32` faces, and an
//! optional patch tag per face. Levels leave as [`VertexBuffer`]s, flat
//! interleaved `f32` data whose [`AttributeLayout`] fixes the stride.
//! [`Aabb`] and [`Triangle`] cover the geometry queries the builder needs.
//!
//! Positions are `f64` while attributes and output buffers are `f32`. Faces
//! wind counter-clockwise seen from the front, in a right-handed frame; no
//! unit is assumed.
//!
//! ```
//! use mesh_types::{IndexedMesh, MeshBounds, Point3, Vertex};
//!
//! let mut mesh = IndexedMesh::new();
//! mesh.vertices.push(Vertex::new(Point3::new(0.0, 0.0, 0.0)));
//! mesh.vertices.push(Vertex::new(Point3::new(1.0, 0.0, 0.0)));
//! mesh.vertices.push(Vertex::new(Point3::new(0.5, 1.0, 0.0)));
//! mesh.faces.push([0, 1, 2]);
//!
//! assert_eq!(mesh.patch_count(), 1);
//! assert_eq!(mesh.bounds().max.x, 1.0);
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod bounds;
mod buffer;
mod mesh;
mod traits;
mod triangle;
mod vertex;

pub use bounds::Aabb;
pub use buffer::VertexBuffer;
pub use mesh::{IndexedMesh, grid_plane, icosphere, tetrahedron, unit_cube};
pub use traits::MeshBounds;
pub use triangle::Triangle;
pub use vertex::{AttributeKind, AttributeLayout, MAX_ATTRIBUTE_FLOATS, Vertex, VertexAttributes};

pub use nalgebra::{Matrix4, Point3, Vector3};
