//! Interleaved, attribute-set vertex storage.

use nalgebra::Point3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Aabb, AttributeLayout, MeshBounds, Vertex, VertexAttributes};

/// A fixed-layout vertex buffer.
///
/// Each vertex occupies [`AttributeLayout::stride`] consecutive `f32`
/// values: position first, then the present attributes in storage order.
/// This is the layout handed to renderers and written by serialization.
///
/// # Example
///
/// ```
/// use mesh_types::{AttributeKind, AttributeLayout, Vertex, VertexBuffer};
///
/// let layout = AttributeLayout::POSITION_ONLY.with(AttributeKind::TexCoord);
/// let mut buffer = VertexBuffer::new(layout);
/// let index = buffer.push(&Vertex::from_coords(1.0, 2.0, 3.0).with_tex_coord([0.5, 1.0]));
///
/// assert_eq!(index, 0);
/// assert_eq!(buffer.as_slice(), &[1.0, 2.0, 3.0, 0.5, 1.0]);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VertexBuffer {
    layout: AttributeLayout,
    data: Vec<f32>,
}

impl VertexBuffer {
    /// Create an empty buffer with the given layout.
    #[inline]
    #[must_use]
    pub const fn new(layout: AttributeLayout) -> Self {
        Self {
            layout,
            data: Vec::new(),
        }
    }

    /// Create an empty buffer with room for `vertex_count` vertices.
    #[must_use]
    pub fn with_capacity(layout: AttributeLayout, vertex_count: usize) -> Self {
        Self {
            layout,
            data: Vec::with_capacity(vertex_count * layout.stride()),
        }
    }

    /// Wrap raw interleaved data.
    ///
    /// Returns `None` if `data.len()` is not a multiple of the stride.
    #[must_use]
    pub fn from_raw(layout: AttributeLayout, data: Vec<f32>) -> Option<Self> {
        if data.len() % layout.stride() == 0 {
            Some(Self { layout, data })
        } else {
            None
        }
    }

    /// The attribute layout of every vertex in the buffer.
    #[inline]
    #[must_use]
    pub const fn layout(&self) -> AttributeLayout {
        self.layout
    }

    /// Floats per vertex.
    #[inline]
    #[must_use]
    pub fn stride(&self) -> usize {
        self.layout.stride()
    }

    /// Number of vertices.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len() / self.stride()
    }

    /// Check if the buffer holds no vertices.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw interleaved data.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Raw interleaved data of the first `count` vertices.
    ///
    /// `count` is clamped to the buffer length.
    #[must_use]
    pub fn prefix(&self, count: usize) -> &[f32] {
        let end = count.min(self.len()) * self.stride();
        &self.data[..end]
    }

    /// Append a vertex, returning its index.
    ///
    /// Attributes absent from the vertex are zero-filled; attributes absent
    /// from the buffer layout are dropped.
    #[allow(clippy::cast_possible_truncation)]
    // Buffers hold f32 positions and u32 indices
    pub fn push(&mut self, vertex: &Vertex) -> u32 {
        let index = self.len() as u32;
        self.data.extend([
            vertex.position.x as f32,
            vertex.position.y as f32,
            vertex.position.z as f32,
        ]);
        let attributes = vertex.attributes.conformed(self.layout);
        self.data.extend_from_slice(attributes.as_slice());
        index
    }

    /// Read back a vertex.
    #[must_use]
    pub fn vertex(&self, index: usize) -> Option<Vertex> {
        let stride = self.stride();
        let chunk = self.data.get(index * stride..(index + 1) * stride)?;
        Some(Vertex {
            position: Point3::new(
                f64::from(chunk[0]),
                f64::from(chunk[1]),
                f64::from(chunk[2]),
            ),
            attributes: VertexAttributes::from_slice(self.layout, &chunk[3..]),
        })
    }

    /// Read back a position.
    #[must_use]
    pub fn position(&self, index: usize) -> Option<Point3<f64>> {
        let base = index * self.stride();
        let p = self.data.get(base..base + 3)?;
        Some(Point3::new(f64::from(p[0]), f64::from(p[1]), f64::from(p[2])))
    }

    /// Reorder vertices so that new vertex `i` is old vertex `order[i]`.
    ///
    /// Indices in `order` past the end of the buffer are skipped.
    pub fn permute(&mut self, order: &[u32]) {
        let stride = self.stride();
        let mut data = Vec::with_capacity(order.len() * stride);
        for &old in order {
            let base = old as usize * stride;
            if let Some(chunk) = self.data.get(base..base + stride) {
                data.extend_from_slice(chunk);
            }
        }
        self.data = data;
    }

    /// Remove every vertex, keeping the layout.
    pub fn clear(&mut self) {
        self.data.clear();
    }
}

impl MeshBounds for VertexBuffer {
    fn bounds(&self) -> Aabb {
        let mut aabb = Aabb::empty();
        for chunk in self.data.chunks_exact(self.stride()) {
            aabb.expand_to_include(&Point3::new(
                f64::from(chunk[0]),
                f64::from(chunk[1]),
                f64::from(chunk[2]),
            ));
        }
        aabb
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AttributeKind;
    use nalgebra::Vector3;

    fn normal_layout() -> AttributeLayout {
        AttributeLayout::POSITION_ONLY.with(AttributeKind::Normal)
    }

    #[test]
    fn push_and_read_back() {
        let mut buffer = VertexBuffer::new(normal_layout());
        buffer.push(&Vertex::from_coords(1.0, 2.0, 3.0).with_normal(Vector3::z()));
        buffer.push(&Vertex::from_coords(4.0, 5.0, 6.0));

        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.stride(), 6);

        let v = buffer.vertex(0).map(|v| v.normal());
        assert_eq!(v, Some(Some(Vector3::z())));

        // Missing normal is zero-filled
        let v = buffer.vertex(1).and_then(|v| v.normal());
        assert_eq!(v, Some(Vector3::zeros()));
        assert!(buffer.vertex(2).is_none());
    }

    #[test]
    fn permute_reorders_whole_vertices() {
        let mut buffer = VertexBuffer::new(AttributeLayout::POSITION_ONLY);
        for i in 0..3_u8 {
            buffer.push(&Vertex::from_coords(f64::from(i), 0.0, 0.0));
        }

        buffer.permute(&[2, 0, 1]);
        assert_eq!(
            buffer.as_slice(),
            &[2.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0]
        );
        assert_eq!(buffer.prefix(1), &[2.0, 0.0, 0.0]);
        assert_eq!(buffer.prefix(10).len(), 9);
    }

    #[test]
    fn from_raw_checks_stride() {
        assert!(VertexBuffer::from_raw(normal_layout(), vec![0.0; 12]).is_some());
        assert!(VertexBuffer::from_raw(normal_layout(), vec![0.0; 7]).is_none());
    }

    #[test]
    fn bounds_cover_all_positions() {
        let mut buffer = VertexBuffer::new(AttributeLayout::POSITION_ONLY);
        buffer.push(&Vertex::from_coords(-1.0, 0.0, 2.0));
        buffer.push(&Vertex::from_coords(3.0, 4.0, -2.0));

        let b = buffer.bounds();
        assert_eq!(b.min, Point3::new(-1.0, 0.0, -2.0));
        assert_eq!(b.max, Point3::new(3.0, 4.0, 2.0));
    }
}
