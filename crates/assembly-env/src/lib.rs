//! Batched peg/hole insertion environment.
//!
//! [`AssemblyEnv`] drives a [`PhysicsProvider`] through the policy step
//! (action smoothing, impedance control over `decimation` physics steps,
//! classification, rewards, curriculum updates) and the full-batch reset
//! sequence (randomized part poses, reset IK, grasp).
//!
//! [`PhysicsProvider`]: assembly_core::provider::PhysicsProvider

pub mod assets;
pub mod env;
pub mod episode;
pub mod error;
pub mod randomize;

pub use assets::AssetMeshes;
pub use env::{AssemblyEnv, Observations, StepResult};
pub use episode::{EpisodeTracker, ResetReport, StepExtras};
pub use error::{AssemblyError, AssemblyResult};
pub use randomize::ResetSampler;
