//! Shared behaviour across vertex containers.

use crate::Aabb;

/// Anything holding positions that a patch box can be fitted around.
///
/// Implemented for [`IndexedMesh`](crate::IndexedMesh) and
/// [`VertexBuffer`](crate::VertexBuffer); an empty container yields
/// [`Aabb::empty`].
pub trait MeshBounds {
    /// Box around every position held.
    fn bounds(&self) -> Aabb;
}
