//! Vertex types and attributes.
//!
//! A vertex is a position plus a small, fixed-capacity attribute table. The
//! table is addressed through an [`AttributeLayout`], so one record type
//! covers every combination of color, normal and texture coordinate.

use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maximum number of attribute floats a single vertex can carry.
pub const MAX_ATTRIBUTE_FLOATS: usize = 8;

/// The kinds of optional per-vertex attributes.
///
/// The declaration order is also the storage order inside a vertex and
/// inside an interleaved [`VertexBuffer`](crate::VertexBuffer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AttributeKind {
    /// Linear RGB color, components in `[0, 1]`.
    Color,
    /// Unit surface normal.
    Normal,
    /// Texture coordinates (U, V).
    TexCoord,
}

impl AttributeKind {
    /// Every attribute kind, in storage order.
    pub const ALL: [Self; 3] = [Self::Color, Self::Normal, Self::TexCoord];

    /// Number of `f32` components this attribute occupies.
    #[inline]
    #[must_use]
    pub const fn components(self) -> usize {
        match self {
            Self::Color | Self::Normal => 3,
            Self::TexCoord => 2,
        }
    }

    const fn bit(self) -> u8 {
        match self {
            Self::Color => 0b001,
            Self::Normal => 0b010,
            Self::TexCoord => 0b100,
        }
    }
}

/// The set of attributes present on a vertex or in a vertex buffer.
///
/// # Example
///
/// ```
/// use mesh_types::{AttributeKind, AttributeLayout};
///
/// let layout = AttributeLayout::POSITION_ONLY
///     .with(AttributeKind::Normal)
///     .with(AttributeKind::TexCoord);
///
/// assert!(layout.contains(AttributeKind::Normal));
/// assert!(!layout.contains(AttributeKind::Color));
/// assert_eq!(layout.stride(), 3 + 3 + 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AttributeLayout(u8);

impl AttributeLayout {
    /// Layout with no optional attributes.
    pub const POSITION_ONLY: Self = Self(0);

    /// Layout with every optional attribute.
    pub const ALL: Self = Self(0b111);

    /// Rebuild a layout from its bit representation.
    ///
    /// Returns `None` if unknown bits are set.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u8) -> Option<Self> {
        if bits & !Self::ALL.0 == 0 {
            Some(Self(bits))
        } else {
            None
        }
    }

    /// Bit representation, stable across versions.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Return this layout with `kind` added.
    #[inline]
    #[must_use]
    pub const fn with(self, kind: AttributeKind) -> Self {
        Self(self.0 | kind.bit())
    }

    /// Return this layout with `kind` removed.
    #[inline]
    #[must_use]
    pub const fn without(self, kind: AttributeKind) -> Self {
        Self(self.0 & !kind.bit())
    }

    /// Check whether `kind` is present.
    #[inline]
    #[must_use]
    pub const fn contains(self, kind: AttributeKind) -> bool {
        self.0 & kind.bit() != 0
    }

    /// Iterate the present attribute kinds in storage order.
    pub fn kinds(self) -> impl Iterator<Item = AttributeKind> {
        AttributeKind::ALL
            .into_iter()
            .filter(move |kind| self.contains(*kind))
    }

    /// Number of attribute floats (excluding position).
    #[must_use]
    pub fn attribute_floats(self) -> usize {
        self.kinds().map(AttributeKind::components).sum()
    }

    /// Number of floats per interleaved vertex (position + attributes).
    #[inline]
    #[must_use]
    pub fn stride(self) -> usize {
        3 + self.attribute_floats()
    }

    /// Offset of `kind` within the attribute floats, if present.
    #[must_use]
    pub fn offset(self, kind: AttributeKind) -> Option<usize> {
        if !self.contains(kind) {
            return None;
        }
        Some(
            self.kinds()
                .take_while(|k| *k != kind)
                .map(AttributeKind::components)
                .sum(),
        )
    }
}

/// Optional attributes attached to a vertex.
///
/// Values are stored packed according to the layout. Equality and hashing
/// compare the raw bits of the stored floats: two attribute sets are equal
/// only if every component is bit-identical.
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VertexAttributes {
    layout: AttributeLayout,
    data: [f32; MAX_ATTRIBUTE_FLOATS],
}

impl VertexAttributes {
    /// Create empty attributes with no values set.
    #[inline]
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            layout: AttributeLayout::POSITION_ONLY,
            data: [0.0; MAX_ATTRIBUTE_FLOATS],
        }
    }

    /// Build attributes from packed floats.
    ///
    /// Missing trailing values are zero-filled; extra values are ignored.
    #[must_use]
    pub fn from_slice(layout: AttributeLayout, values: &[f32]) -> Self {
        let mut data = [0.0; MAX_ATTRIBUTE_FLOATS];
        let n = layout.attribute_floats().min(values.len());
        data[..n].copy_from_slice(&values[..n]);
        Self { layout, data }
    }

    /// The layout of the stored attributes.
    #[inline]
    #[must_use]
    pub const fn layout(&self) -> AttributeLayout {
        self.layout
    }

    /// Packed attribute floats.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data[..self.layout.attribute_floats()]
    }

    /// Check if any attributes are set.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.layout.bits() == 0
    }

    /// Get the components of `kind`, if present.
    #[must_use]
    pub fn get(&self, kind: AttributeKind) -> Option<&[f32]> {
        let offset = self.layout.offset(kind)?;
        Some(&self.data[offset..offset + kind.components()])
    }

    /// Set the components of `kind`, inserting it into the layout if needed.
    ///
    /// Missing components are zero-filled.
    pub fn set(&mut self, kind: AttributeKind, values: &[f32]) {
        let layout = self.layout.with(kind);
        let mut data = [0.0; MAX_ATTRIBUTE_FLOATS];
        let mut cursor = 0;
        for k in layout.kinds() {
            let n = k.components();
            if k == kind {
                let m = n.min(values.len());
                data[cursor..cursor + m].copy_from_slice(&values[..m]);
            } else if let Some(old) = self.get(k) {
                data[cursor..cursor + n].copy_from_slice(old);
            }
            cursor += n;
        }
        self.layout = layout;
        self.data = data;
    }

    /// Restrict or extend the attributes to `layout`.
    ///
    /// Attributes missing from `self` are zero-filled.
    #[must_use]
    pub fn conformed(&self, layout: AttributeLayout) -> Self {
        let mut out = Self {
            layout,
            data: [0.0; MAX_ATTRIBUTE_FLOATS],
        };
        let mut cursor = 0;
        for kind in layout.kinds() {
            let n = kind.components();
            if let Some(values) = self.get(kind) {
                out.data[cursor..cursor + n].copy_from_slice(values);
            }
            cursor += n;
        }
        out
    }

    /// Unit normal, if present.
    #[must_use]
    pub fn normal(&self) -> Option<Vector3<f32>> {
        self.get(AttributeKind::Normal)
            .map(|n| Vector3::new(n[0], n[1], n[2]))
    }

    /// RGB color, if present.
    #[must_use]
    pub fn color(&self) -> Option<[f32; 3]> {
        self.get(AttributeKind::Color).map(|c| [c[0], c[1], c[2]])
    }

    /// Texture coordinates, if present.
    #[must_use]
    pub fn tex_coord(&self) -> Option<[f32; 2]> {
        self.get(AttributeKind::TexCoord).map(|t| [t[0], t[1]])
    }

    /// Interpolate towards `other` by `t`.
    ///
    /// Only attributes present in both are interpolated; the result uses
    /// `self`'s layout. Normals are renormalized and colors clamped.
    #[must_use]
    pub fn lerp(&self, other: &Self, t: f32) -> Self {
        let mut out = *self;
        for kind in self.layout.kinds() {
            let (Some(offset), Some(theirs)) = (self.layout.offset(kind), other.get(kind)) else {
                continue;
            };
            let slot = &mut out.data[offset..offset + kind.components()];
            for (value, target) in slot.iter_mut().zip(theirs) {
                *value += (target - *value) * t;
            }
            match kind {
                AttributeKind::Normal => {
                    let len = slot.iter().map(|c| c * c).sum::<f32>().sqrt();
                    if len > f32::EPSILON {
                        slot.iter_mut().for_each(|c| *c /= len);
                    }
                }
                AttributeKind::Color => {
                    slot.iter_mut().for_each(|c| *c = c.clamp(0.0, 1.0));
                }
                AttributeKind::TexCoord => {}
            }
        }
        out
    }

    fn bit_pattern(&self) -> impl Iterator<Item = u32> + '_ {
        self.as_slice().iter().map(|v| v.to_bits())
    }
}

impl PartialEq for VertexAttributes {
    fn eq(&self, other: &Self) -> bool {
        self.layout == other.layout && self.bit_pattern().eq(other.bit_pattern())
    }
}

impl Eq for VertexAttributes {}

impl std::hash::Hash for VertexAttributes {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.layout.hash(state);
        for bits in self.bit_pattern() {
            bits.hash(state);
        }
    }
}

/// A vertex in 3D space with optional attributes.
///
/// The position is stored as a `Point3<f64>` for high precision; attributes
/// are render-facing and stored as `f32`.
///
/// # Example
///
/// ```
/// use mesh_types::{Vertex, Point3};
///
/// // Create a vertex with just position
/// let v1 = Vertex::new(Point3::new(1.0, 2.0, 3.0));
///
/// // Create from raw coordinates
/// let v2 = Vertex::from_coords(1.0, 2.0, 3.0);
///
/// assert_eq!(v1.position, v2.position);
/// ```
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Vertex {
    /// 3D position.
    pub position: Point3<f64>,

    /// Optional attributes (color, normal, texture coordinates).
    pub attributes: VertexAttributes,
}

impl Vertex {
    /// Create a new vertex with only position set.
    #[inline]
    #[must_use]
    pub const fn new(position: Point3<f64>) -> Self {
        Self {
            position,
            attributes: VertexAttributes::empty(),
        }
    }

    /// Create a vertex from raw coordinates.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_types::Vertex;
    ///
    /// let v = Vertex::from_coords(1.0, 2.0, 3.0);
    /// assert_eq!(v.position.x, 1.0);
    /// assert!(v.attributes.is_empty());
    /// ```
    #[inline]
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Point3::new is not const in nalgebra
    pub fn from_coords(x: f64, y: f64, z: f64) -> Self {
        Self::new(Point3::new(x, y, z))
    }

    /// Return this vertex with a normal attached.
    #[must_use]
    pub fn with_normal(mut self, normal: Vector3<f32>) -> Self {
        self.attributes
            .set(AttributeKind::Normal, &[normal.x, normal.y, normal.z]);
        self
    }

    /// Return this vertex with an RGB color attached.
    #[must_use]
    pub fn with_color(mut self, color: [f32; 3]) -> Self {
        self.attributes.set(AttributeKind::Color, &color);
        self
    }

    /// Return this vertex with texture coordinates attached.
    #[must_use]
    pub fn with_tex_coord(mut self, uv: [f32; 2]) -> Self {
        self.attributes.set(AttributeKind::TexCoord, &uv);
        self
    }

    /// The attribute layout of this vertex.
    #[inline]
    #[must_use]
    pub const fn layout(&self) -> AttributeLayout {
        self.attributes.layout()
    }

    /// Get the normal if set.
    #[inline]
    #[must_use]
    pub fn normal(&self) -> Option<Vector3<f32>> {
        self.attributes.normal()
    }

    /// Interpolate position and attributes towards `other`.
    #[must_use]
    pub fn lerp(&self, other: &Self, t: f64) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let t32 = t as f32;
        Self {
            position: self.position + (other.position - self.position) * t,
            attributes: self.attributes.lerp(&other.attributes, t32),
        }
    }
}

impl From<Point3<f64>> for Vertex {
    fn from(position: Point3<f64>) -> Self {
        Self::new(position)
    }
}

impl From<[f64; 3]> for Vertex {
    fn from([x, y, z]: [f64; 3]) -> Self {
        Self::from_coords(x, y, z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_offsets_follow_storage_order() {
        let layout = AttributeLayout::ALL;
        assert_eq!(layout.offset(AttributeKind::Color), Some(0));
        assert_eq!(layout.offset(AttributeKind::Normal), Some(3));
        assert_eq!(layout.offset(AttributeKind::TexCoord), Some(6));
        assert_eq!(layout.stride(), 11);

        let tex_only = AttributeLayout::POSITION_ONLY.with(AttributeKind::TexCoord);
        assert_eq!(tex_only.offset(AttributeKind::TexCoord), Some(0));
        assert_eq!(tex_only.offset(AttributeKind::Normal), None);
    }

    #[test]
    fn layout_bits_roundtrip() {
        let layout = AttributeLayout::POSITION_ONLY.with(AttributeKind::Normal);
        assert_eq!(AttributeLayout::from_bits(layout.bits()), Some(layout));
        assert_eq!(AttributeLayout::from_bits(0b1000), None);
        assert!(!layout.without(AttributeKind::Normal).contains(AttributeKind::Normal));
    }

    #[test]
    fn set_inserts_in_storage_order() {
        let mut attrs = VertexAttributes::empty();
        attrs.set(AttributeKind::TexCoord, &[0.25, 0.75]);
        attrs.set(AttributeKind::Color, &[1.0, 0.0, 0.5]);

        assert_eq!(attrs.as_slice(), &[1.0, 0.0, 0.5, 0.25, 0.75]);
        assert_eq!(attrs.tex_coord(), Some([0.25, 0.75]));
        assert_eq!(attrs.color(), Some([1.0, 0.0, 0.5]));
        assert!(attrs.normal().is_none());
    }

    #[test]
    fn equality_is_exact() {
        let a = Vertex::from_coords(0.0, 0.0, 0.0).with_tex_coord([0.5, 0.5]);
        let b = Vertex::from_coords(9.0, 9.0, 9.0).with_tex_coord([0.5, 0.5]);
        let c = Vertex::from_coords(0.0, 0.0, 0.0).with_tex_coord([0.5, 0.500_001]);

        assert_eq!(a.attributes, b.attributes);
        assert_ne!(a.attributes, c.attributes);
        assert_ne!(a.attributes, VertexAttributes::empty());
    }

    #[test]
    fn lerp_renormalizes_normals_and_clamps_colors() {
        let a = Vertex::from_coords(0.0, 0.0, 0.0)
            .with_normal(Vector3::x())
            .with_color([1.0, 0.0, 0.0]);
        let b = Vertex::from_coords(2.0, 0.0, 0.0)
            .with_normal(Vector3::y())
            .with_color([0.0, 1.0, 0.0]);

        let mid = a.lerp(&b, 0.5);
        assert!((mid.position.x - 1.0).abs() < f64::EPSILON);

        let n = mid.normal().map(|n| n.norm());
        assert!(n.is_some_and(|len| (len - 1.0).abs() < 1e-6));

        let c = mid.attributes.color().unwrap_or_default();
        assert!((c[0] - 0.5).abs() < 1e-6);
        assert!((c[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn conformed_zero_fills_missing() {
        let v = Vertex::from_coords(0.0, 0.0, 0.0).with_tex_coord([0.1, 0.2]);
        let wide = v.attributes.conformed(AttributeLayout::ALL);
        assert_eq!(wide.layout(), AttributeLayout::ALL);
        assert_eq!(wide.get(AttributeKind::Normal), Some(&[0.0, 0.0, 0.0][..]));
        assert_eq!(wide.tex_coord(), Some([0.1, 0.2]));
    }
}
