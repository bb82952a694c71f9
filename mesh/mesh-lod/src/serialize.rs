//! Binary hierarchy format.
//!
//! All values are little-endian:
//!
//! ```text
//! magic         b"LODH"
//! version       u32 (1)
//! operator      u8  (0 half-edge, 1 full-edge)
//! layout        u8  (attribute bits)
//! multiplier    f64
//! original      u64 triangles in the source mesh
//! performed     u64 collapses applied
//! rejected      u64 operations left forbidden
//! level count   u32
//! per level:
//!   error       f64 (before the multiplier)
//!   patch count u32
//!   per patch:
//!     vertex count u32 (vertices addressed)
//!     float count  u32, then that many f32 (stored vertex data)
//!     index count  u32, then that many u32
//! ```
//!
//! Patch bounds are not stored; they are recomputed from level 0 on load.

// Counts are bounded by u32 when written
#![allow(clippy::cast_possible_truncation)]

use std::io::{self, Read, Write};

use mesh_types::{Aabb, AttributeLayout, MeshBounds, VertexBuffer};
use tracing::debug;

use crate::error::{LodError, LodResult};
use crate::hierarchy::{Hierarchy, Level, PatchGeometry};
use crate::params::OperatorKind;

const MAGIC: &[u8; 4] = b"LODH";
const VERSION: u32 = 1;

/// Upper bound on speculative preallocation while reading.
const MAX_PREALLOC: usize = 1 << 16;

/// Serialize a hierarchy into a byte vector.
///
/// # Example
///
/// ```
/// use mesh_lod::{LodParams, build_hierarchy, deserialize, serialize};
/// use mesh_types::icosphere;
///
/// let hierarchy = build_hierarchy(&icosphere(1), &LodParams::default()).unwrap();
/// let bytes = serialize(&hierarchy);
/// let loaded = deserialize(&bytes).unwrap();
/// assert_eq!(loaded.level_count(), hierarchy.level_count());
/// ```
#[must_use]
pub fn serialize(hierarchy: &Hierarchy) -> Vec<u8> {
    hierarchy.encode()
}

/// Deserialize a hierarchy written by [`serialize`].
///
/// # Errors
///
/// Returns [`LodError::UnexpectedEof`] if the data is truncated and
/// [`LodError::InvalidFormat`] if it is not a valid hierarchy.
pub fn deserialize(bytes: &[u8]) -> LodResult<Hierarchy> {
    Hierarchy::read_from(bytes)
}

impl Hierarchy {
    /// Write the hierarchy in the binary format.
    ///
    /// # Errors
    ///
    /// Returns [`LodError::Io`] if the writer fails.
    pub fn write_to<W: Write>(&self, mut writer: W) -> LodResult<()> {
        writer.write_all(&self.encode())?;
        Ok(())
    }

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&VERSION.to_le_bytes());
        out.extend_from_slice(&[self.operator.to_byte(), self.layout.bits()]);
        out.extend_from_slice(&self.multiplier.to_le_bytes());
        out.extend_from_slice(&(self.original_triangles as u64).to_le_bytes());
        out.extend_from_slice(&(self.collapses_performed as u64).to_le_bytes());
        out.extend_from_slice(&(self.collapses_rejected as u64).to_le_bytes());

        out.extend_from_slice(&(self.levels.len() as u32).to_le_bytes());
        for level in &self.levels {
            out.extend_from_slice(&level.original_error.to_le_bytes());
            out.extend_from_slice(&(level.patches.len() as u32).to_le_bytes());
            for patch in &level.patches {
                out.extend_from_slice(&(patch.vertex_count as u32).to_le_bytes());

                let floats = patch.vertices.as_slice();
                out.extend_from_slice(&(floats.len() as u32).to_le_bytes());
                out.extend(floats.iter().flat_map(|value| value.to_le_bytes()));

                out.extend_from_slice(&(patch.indices.len() as u32).to_le_bytes());
                out.extend(patch.indices.iter().flat_map(|index| index.to_le_bytes()));
            }
        }

        debug!(
            levels = self.levels.len(),
            patches = self.patch_count(),
            bytes = out.len(),
            "Serialized LOD hierarchy"
        );
        out
    }

    /// Read a hierarchy in the binary format.
    ///
    /// # Errors
    ///
    /// Returns [`LodError::UnexpectedEof`] if the data is truncated,
    /// [`LodError::InvalidFormat`] if it is malformed and [`LodError::Io`]
    /// for other reader failures.
    pub fn read_from<R: Read>(reader: R) -> LodResult<Self> {
        let mut reader = CountingReader {
            inner: reader,
            position: 0,
        };

        let magic: [u8; 4] = reader.bytes()?;
        if &magic != MAGIC {
            return Err(invalid("bad magic"));
        }
        let version = reader.u32()?;
        if version != VERSION {
            return Err(invalid(format!("unsupported version {version}")));
        }

        let [operator, layout]: [u8; 2] = reader.bytes()?;
        let operator = OperatorKind::from_byte(operator)
            .ok_or_else(|| invalid(format!("unknown operator {operator}")))?;
        let layout = AttributeLayout::from_bits(layout)
            .ok_or_else(|| invalid(format!("unknown layout bits {layout:#04x}")))?;

        let multiplier = reader.f64()?;
        if !multiplier.is_finite() || multiplier <= 0.0 {
            return Err(invalid(format!("invalid error multiplier {multiplier}")));
        }
        let original_triangles = reader.count64()?;
        let collapses_performed = reader.count64()?;
        let collapses_rejected = reader.count64()?;

        let level_count = reader.u32()? as usize;
        if level_count == 0 {
            return Err(invalid("hierarchy has no levels"));
        }

        let mut levels: Vec<Level> = Vec::with_capacity(level_count.min(MAX_PREALLOC));
        for k in 0..level_count {
            let original_error = reader.f64()?;
            if !original_error.is_finite() || original_error < 0.0 {
                return Err(invalid(format!("level {k} has invalid error {original_error}")));
            }

            let patch_count = reader.u32()? as usize;
            if let Some(first) = levels.first() {
                if patch_count != first.patches.len() {
                    return Err(invalid(format!(
                        "level {k} has {patch_count} patches, level 0 has {}",
                        first.patches.len()
                    )));
                }
            }

            let mut patches = Vec::with_capacity(patch_count.min(MAX_PREALLOC));
            for p in 0..patch_count {
                let patch = read_patch(&mut reader, layout)?;
                let capacity = match (operator, levels.first()) {
                    (OperatorKind::HalfEdge, Some(first)) => {
                        if !patch.vertices.is_empty() {
                            return Err(invalid(format!(
                                "level {k} patch {p} stores its own vertices"
                            )));
                        }
                        first.patches.get(p).map_or(0, |base| base.vertices.len())
                    }
                    _ => patch.vertices.len(),
                };
                if patch.vertex_count > capacity {
                    return Err(invalid(format!(
                        "level {k} patch {p} addresses {} vertices but only {capacity} exist",
                        patch.vertex_count
                    )));
                }
                let out_of_range = patch
                    .indices
                    .iter()
                    .find(|&&i| i as usize >= patch.vertex_count);
                if let Some(&index) = out_of_range {
                    return Err(invalid(format!(
                        "level {k} patch {p} has out-of-range index {index}"
                    )));
                }
                patches.push(patch);
            }

            levels.push(Level {
                patches,
                original_error,
                error: original_error * multiplier,
            });
        }

        let bounds: Vec<Aabb> = levels
            .first()
            .map(|level| level.patches.iter().map(|p| p.vertices.bounds()).collect())
            .unwrap_or_default();

        debug!(
            levels = levels.len(),
            bytes = reader.position,
            "Deserialized LOD hierarchy"
        );

        Ok(Self {
            operator,
            layout,
            levels,
            multiplier,
            bounds,
            original_triangles,
            collapses_performed,
            collapses_rejected,
        })
    }
}

fn read_patch<R: Read>(
    reader: &mut CountingReader<R>,
    layout: AttributeLayout,
) -> LodResult<PatchGeometry> {
    let vertex_count = reader.u32()? as usize;

    let float_count = reader.u32()? as usize;
    let mut data = Vec::with_capacity(float_count.min(MAX_PREALLOC));
    for _ in 0..float_count {
        data.push(f32::from_le_bytes(reader.bytes()?));
    }
    let vertices = VertexBuffer::from_raw(layout, data)
        .ok_or_else(|| invalid(format!("{float_count} floats is not a whole number of vertices")))?;

    let index_count = reader.u32()? as usize;
    if index_count % 3 != 0 {
        return Err(invalid(format!("{index_count} indices is not a whole number of triangles")));
    }
    let mut indices = Vec::with_capacity(index_count.min(MAX_PREALLOC));
    for _ in 0..index_count {
        indices.push(reader.u32()?);
    }

    Ok(PatchGeometry {
        indices,
        vertices,
        vertex_count,
    })
}

fn invalid(message: impl Into<String>) -> LodError {
    LodError::InvalidFormat {
        message: message.into(),
    }
}

/// Reader that tracks its offset so truncation can be reported precisely.
struct CountingReader<R> {
    inner: R,
    position: u64,
}

impl<R: Read> CountingReader<R> {
    fn bytes<const N: usize>(&mut self) -> LodResult<[u8; N]> {
        let mut buf = [0u8; N];
        match self.inner.read_exact(&mut buf) {
            Ok(()) => {
                self.position += N as u64;
                Ok(buf)
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(LodError::UnexpectedEof {
                position: self.position,
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn u32(&mut self) -> LodResult<u32> {
        self.bytes().map(u32::from_le_bytes)
    }

    fn f64(&mut self) -> LodResult<f64> {
        self.bytes().map(f64::from_le_bytes)
    }

    fn count64(&mut self) -> LodResult<usize> {
        let value = u64::from_le_bytes(self.bytes()?);
        usize::try_from(value).map_err(|_| invalid(format!("count {value} does not fit in memory")))
    }
}
