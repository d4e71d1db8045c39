//! Reference physics provider for the assembly task.
//!
//! [`GantryArm`] implements [`PhysicsProvider`](assembly_core::provider::PhysicsProvider)
//! with a kinematically simple arm so controllers, resets, and rewards can
//! be exercised end to end without an external engine.

pub mod gantry;

pub use gantry::{GantryArm, GantryParams};
