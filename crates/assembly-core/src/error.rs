use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid physics_dt: {0} (must be > 0)")]
    InvalidPhysicsDt(f64),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Invalid gain at index {index}: {value} (must be finite and >= 0)")]
    InvalidGain { index: usize, value: f32 },

    #[error("Curriculum bounds inverted: low ({low}) > high ({high})")]
    CurriculumBoundsInverted { low: f32, high: f32 },

    #[error("Unknown observation field: {0}")]
    UnknownObservationField(String),

    #[error("Observation field {field} is not available for the {vector} vector")]
    FieldNotAvailable { field: String, vector: &'static str },

    #[error("Batch size mismatch: expected {expected}, got {got}")]
    BatchSizeMismatch { expected: usize, got: usize },
}

impl ConfigError {
    /// Shorthand for [`ConfigError::InvalidValue`].
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors raised by a physics provider.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("Batch size mismatch: provider has {expected} instances, got {got}")]
    BatchSizeMismatch { expected: usize, got: usize },

    #[error("Physics diverged: non-finite state in instance {0}")]
    Diverged(usize),

    #[error("Step failed: {0}")]
    StepFailed(String),
}

/// Per-step input validation errors.
///
/// Copy + static messages for cheap propagation in hot paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Action batch mismatch: expected {expected} rows, got {got}")]
    ActionBatchMismatch { expected: usize, got: usize },

    #[error("Action contains a non-finite value")]
    ActionNotFinite,

    #[error("Keypoint count mismatch: held={held}, fixed={fixed}")]
    KeypointCountMismatch { held: usize, fixed: usize },
}
