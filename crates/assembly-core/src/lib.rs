// assembly-core: data model, rotation math, config, errors, and the physics
// interface for contact-rich peg/hole assembly.

pub mod config;
pub mod error;
pub mod math;
pub mod provider;
pub mod types;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

pub mod prelude {
    pub use crate::config::{
        AssemblyConfig, CtrlConfig, CurriculumConfig, DistanceAggregate, FixedAssetConfig,
        HeldAssetConfig, IkConfig, ObsRandConfig, ProximityConfig, RewardScaleShape, SimConfig,
        Squash, TaskConfig,
    };
    pub use crate::error::{ConfigError, SimError, ValidationError};
    pub use crate::provider::PhysicsProvider;
    pub use crate::types::{
        ARM_DOF, ControlTarget, Jacobian, JointVector, MassMatrix, PoseState, RobotSnapshot,
        TaskVector,
    };
}
