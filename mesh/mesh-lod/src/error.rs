//! Error types for hierarchy construction, queries and serialization.

use thiserror::Error;

/// Errors that can occur while building, querying or loading a hierarchy.
#[derive(Debug, Error)]
pub enum LodError {
    /// Mesh has no vertices.
    #[error("mesh has no vertices")]
    EmptyMesh,

    /// Mesh has no (non-degenerate) triangles.
    #[error("mesh has no triangles")]
    NoTriangles,

    /// Weld tolerance is negative or not finite.
    #[error("invalid weld tolerance: {0} (must be finite and >= 0)")]
    InvalidTolerance(f64),

    /// Percent reduction is outside `(0, 1)`.
    #[error("invalid percent reduction: {0} (must be between 0.0 and 1.0, exclusive)")]
    InvalidPercent(f64),

    /// A manual snapshot specification has no entries.
    #[error("snapshot specification is empty")]
    EmptySnapshotSpec,

    /// Triangle-count targets must strictly decrease.
    #[error("triangle targets must strictly decrease (entry {index})")]
    TriangleSpecNotDecreasing {
        /// Index of the first offending entry.
        index: usize,
    },

    /// Error thresholds must strictly increase.
    #[error("error thresholds must be finite, non-negative and increasing (entry {index})")]
    ErrorSpecNotIncreasing {
        /// Index of the first offending entry.
        index: usize,
    },

    /// A face references a vertex that does not exist.
    #[error("face index {index} out of range ({vertex_count} vertices)")]
    InvalidIndex {
        /// The offending index.
        index: u32,
        /// Number of vertices in the mesh.
        vertex_count: usize,
    },

    /// Patch tags are present but do not cover every face.
    #[error("patch tags do not match faces: {faces} faces, {patches} tags")]
    PatchCountMismatch {
        /// Number of faces.
        faces: usize,
        /// Number of patch tags.
        patches: usize,
    },

    /// A vertex carries a different attribute layout than the first one.
    #[error("vertex {index} has an attribute layout different from vertex 0")]
    InconsistentAttributes {
        /// Index of the offending vertex.
        index: usize,
    },

    /// Permission grid dimensions or contents are unusable.
    #[error("invalid permission grid: {reason}")]
    InvalidPermissionGrid {
        /// What is wrong with the grid.
        reason: String,
    },

    /// Error multiplier is negative, zero or not finite.
    #[error("invalid error multiplier: {0} (must be finite and > 0)")]
    InvalidMultiplier(f64),

    /// Requested level does not exist.
    #[error("level {level} out of range ({level_count} levels)")]
    LevelOutOfRange {
        /// Requested level.
        level: usize,
        /// Number of levels in the hierarchy.
        level_count: usize,
    },

    /// Requested patch does not exist.
    #[error("patch {patch} out of range ({patch_count} patches)")]
    PatchOutOfRange {
        /// Requested patch.
        patch: usize,
        /// Number of patches in the hierarchy.
        patch_count: usize,
    },

    /// Serialized data is malformed.
    #[error("invalid hierarchy data: {message}")]
    InvalidFormat {
        /// Description of what was invalid.
        message: String,
    },

    /// Serialized data ended early.
    #[error("unexpected end of data at byte {position}")]
    UnexpectedEof {
        /// Byte offset where the data ran out.
        position: u64,
    },

    /// I/O error from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for LOD operations.
pub type LodResult<T> = std::result::Result<T, LodError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LodError::EmptyMesh;
        assert_eq!(format!("{err}"), "mesh has no vertices");

        let err = LodError::InvalidPercent(1.5);
        assert!(format!("{err}").contains("1.5"));

        let err = LodError::InvalidIndex {
            index: 7,
            vertex_count: 3,
        };
        assert!(format!("{err}").contains("7"));
        assert!(format!("{err}").contains("3 vertices"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::other("disk on fire");
        let err: LodError = io.into();
        assert!(matches!(err, LodError::Io(_)));
    }
}
