use assembly_core::error::{ConfigError, SimError, ValidationError};
use assembly_geometry::GeometryError;
use thiserror::Error;

/// Any failure surfaced by the assembly environment.
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sim(#[from] SimError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

pub type AssemblyResult<T> = Result<T, AssemblyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_lower_level_errors() {
        let err: AssemblyError = ValidationError::ActionNotFinite.into();
        assert!(matches!(err, AssemblyError::Validation(_)));
        assert_eq!(err.to_string(), "Action contains a non-finite value");

        let err: AssemblyError = SimError::Diverged(3).into();
        assert!(matches!(err, AssemblyError::Sim(SimError::Diverged(3))));

        let err: AssemblyError = GeometryError::EmptyMesh.into();
        assert!(matches!(err, AssemblyError::Geometry(_)));
    }
}
