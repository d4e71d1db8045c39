//! Damped least squares differential IK for the assembly arm.
//!
//! The solver itself is a single pure step that turns a 6-D pose error into
//! a joint displacement. [`ResetIk`] drives that step open-loop against a
//! [`PhysicsProvider`](assembly_core::provider::PhysicsProvider) while a
//! reset places the gripper at its grasp pose.
//!
//! # Architecture
//!
//! ```text
//! (current pose, target pose) ──► pose_error ──► DlsIk::delta ──► dq
//!                                      ▲                          │
//!                                      └── provider.step() ◄── q += dq
//! ```

pub mod reset;
pub mod solver;

pub use reset::ResetIk;
pub use solver::{DlsIk, IkResult, PoseError, pose_error};
