//! Engine-agnostic physics interface.
//!
//! Scene construction, contact dynamics, and stepping live behind
//! [`PhysicsProvider`]. The task only reads [`RobotSnapshot`]s and writes
//! joint commands and root poses, all batch-wide.

use crate::error::SimError;
use crate::types::{JointVector, PoseState, RobotSnapshot};

/// Batched simulator seen by the assembly task.
///
/// Every write takes one entry per instance; implementations reject slices
/// whose length differs from [`num_envs`](Self::num_envs).
pub trait PhysicsProvider {
    /// Number of parallel instances.
    fn num_envs(&self) -> usize;

    /// Physics timestep in seconds.
    fn physics_dt(&self) -> f64;

    /// Monotonic simulated time in seconds.
    fn sim_time(&self) -> f64;

    /// Current state of every instance.
    fn snapshots(&self) -> Vec<RobotSnapshot>;

    /// Teleport arm joints. Velocities are written as given.
    fn write_joint_state(
        &mut self,
        positions: &[JointVector],
        velocities: &[JointVector],
    ) -> Result<(), SimError>;

    /// Joint position targets for the arm plus gripper aperture targets.
    fn set_joint_position_targets(
        &mut self,
        positions: &[JointVector],
        gripper: &[f32],
    ) -> Result<(), SimError>;

    /// Arm joint torques applied on every following step until replaced.
    fn set_joint_torques(&mut self, torques: &[JointVector]) -> Result<(), SimError>;

    /// Teleport the held part and zero its velocity.
    fn write_held_poses(&mut self, poses: &[PoseState]) -> Result<(), SimError>;

    /// Teleport the fixed part and zero its velocity.
    fn write_fixed_poses(&mut self, poses: &[PoseState]) -> Result<(), SimError>;

    fn set_gravity(&mut self, gravity: [f32; 3]);

    /// Advance by one physics timestep.
    fn step(&mut self) -> Result<(), SimError>;

    /// Human-readable engine name.
    fn name(&self) -> &str;
}

/// Check a batched write against the provider's instance count.
pub fn check_batch(expected: usize, got: usize) -> Result<(), SimError> {
    if expected == got {
        Ok(())
    } else {
        Err(SimError::BatchSizeMismatch { expected, got })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trait_is_object_safe() {
        fn _accepts_boxed(_: Box<dyn PhysicsProvider>) {}
    }

    #[test]
    fn check_batch_accepts_equal() {
        assert!(check_batch(4, 4).is_ok());
    }

    #[test]
    fn check_batch_rejects_mismatch() {
        let err = check_batch(4, 3).unwrap_err();
        assert!(matches!(
            err,
            SimError::BatchSizeMismatch {
                expected: 4,
                got: 3
            }
        ));
    }
}
