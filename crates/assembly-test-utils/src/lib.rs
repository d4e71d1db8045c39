//! Shared test fixtures and utilities for assembly crates.
//!
//! Provides deterministic RNG setup, primitive plug/socket meshes, small
//! batch configurations, and pose builders.

pub mod fixtures;
pub mod rng;

// ---------------------------------------------------------------------------
// Re-exports for convenience
// ---------------------------------------------------------------------------

pub use fixtures::{plug_mesh, pose, small_config, socket_mesh};
pub use rng::{deterministic_actions, seeded_rng};
