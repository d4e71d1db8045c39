//! Error types for mesh construction and queries.

use thiserror::Error;

/// Result type for geometry operations.
pub type GeometryResult<T> = Result<T, GeometryError>;

/// Errors that can occur while building, loading, or sampling a mesh.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Mesh has no vertices or no faces.
    #[error("mesh is empty")]
    EmptyMesh,

    /// A face refers to a vertex that does not exist.
    #[error("face {face} references vertex {index}, mesh has {vertex_count} vertices")]
    IndexOutOfBounds {
        face: usize,
        index: usize,
        vertex_count: usize,
    },

    /// Mesh has faces but zero total surface area.
    #[error("mesh has zero surface area")]
    ZeroArea,

    /// A primitive was requested with a non-positive dimension.
    #[error("invalid dimension {name}: {value}")]
    InvalidDimension { name: &'static str, value: f32 },

    /// Malformed Wavefront OBJ record.
    #[error("OBJ parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_error_message() {
        let err = GeometryError::IndexOutOfBounds {
            face: 2,
            index: 9,
            vertex_count: 4,
        };
        assert_eq!(
            err.to_string(),
            "face 2 references vertex 9, mesh has 4 vertices"
        );
    }

    #[test]
    fn parse_error_message() {
        let err = GeometryError::Parse {
            line: 7,
            message: "expected 3 coordinates".into(),
        };
        assert!(err.to_string().starts_with("OBJ parse error at line 7"));
    }
}
