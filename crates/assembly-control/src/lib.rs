//! Task-space control for the assembly arm.
//!
//! - [`ActionProcessor`] turns smoothed policy actions into [`ControlTarget`]s.
//! - [`VelocityEstimator`] differences poses into an end-effector twist.
//! - [`ImpedanceController`] maps a target and [`TaskGains`] to joint torques.
//!
//! [`ControlTarget`]: assembly_core::types::ControlTarget

pub mod action;
pub mod estimator;
pub mod gains;
pub mod impedance;
pub mod inverse;

pub use action::{Action, ActionParams, ActionProcessor, GRIPPER_CLOSED};
pub use estimator::{VelocityEstimate, VelocityEstimator};
pub use gains::{GainMode, GainSchedule, TaskGains};
pub use impedance::{ControllerState, ImpedanceController, TorqueCommand};
pub use inverse::{damped_pseudo_inverse, robust_inverse};
