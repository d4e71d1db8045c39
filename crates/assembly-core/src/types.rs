//! Shared data model: poses, control targets, and per-instance robot state.

use nalgebra::{SMatrix, SVector, UnitQuaternion, Vector3};

use crate::math::canonical_quat;

/// Number of actuated arm joints.
pub const ARM_DOF: usize = 7;

/// Joint-space vector (positions, velocities, or torques) for the arm.
pub type JointVector = SVector<f32, ARM_DOF>;

/// Geometric end-effector Jacobian: linear rows 0..3, angular rows 3..6.
pub type Jacobian = SMatrix<f32, 6, ARM_DOF>;

/// Joint-space mass matrix of the arm.
pub type MassMatrix = SMatrix<f32, ARM_DOF, ARM_DOF>;

/// Task-space 6-vector (wrench, twist, gains, or pose error).
pub type TaskVector = SVector<f32, 6>;

// ---------------------------------------------------------------------------
// PoseState
// ---------------------------------------------------------------------------

/// A rigid pose with a canonicalized (non-negative scalar) unit quaternion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseState {
    pub position: Vector3<f32>,
    pub orientation: UnitQuaternion<f32>,
}

impl Default for PoseState {
    fn default() -> Self {
        Self::identity()
    }
}

impl PoseState {
    /// Build a pose, flipping the quaternion so its scalar part is `>= 0`.
    pub fn new(position: Vector3<f32>, orientation: UnitQuaternion<f32>) -> Self {
        Self {
            position,
            orientation: canonical_quat(&orientation),
        }
    }

    pub fn identity() -> Self {
        Self {
            position: Vector3::zeros(),
            orientation: UnitQuaternion::identity(),
        }
    }

    pub fn from_position(position: Vector3<f32>) -> Self {
        Self {
            position,
            orientation: UnitQuaternion::identity(),
        }
    }

    /// Map a point from this pose's local frame into the parent frame.
    pub fn transform_point(&self, local: &Vector3<f32>) -> Vector3<f32> {
        self.position + self.orientation * local
    }

    /// Map a point from the parent frame into this pose's local frame.
    pub fn inverse_transform_point(&self, world: &Vector3<f32>) -> Vector3<f32> {
        self.orientation.inverse() * (world - self.position)
    }

    /// Compose with a pose expressed in this pose's local frame.
    pub fn compose(&self, local: &Self) -> Self {
        Self::new(
            self.transform_point(&local.position),
            self.orientation * local.orientation,
        )
    }

    /// Relative pose of `other` expressed in this pose's frame.
    pub fn relative(&self, other: &Self) -> Self {
        Self::new(
            self.inverse_transform_point(&other.position),
            self.orientation.inverse() * other.orientation,
        )
    }

    /// Orientation as `[w, x, y, z]`.
    pub fn quat_wxyz(&self) -> [f32; 4] {
        crate::math::quat_wxyz(&self.orientation)
    }

    pub fn is_finite(&self) -> bool {
        self.position.iter().all(|v| v.is_finite())
            && self.orientation.coords.iter().all(|v| v.is_finite())
    }
}

// ---------------------------------------------------------------------------
// ControlTarget
// ---------------------------------------------------------------------------

/// Desired end-effector pose plus gripper aperture.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControlTarget {
    pub pose: PoseState,
    /// Gripper joint target (0 = closed).
    pub gripper: f32,
}

impl ControlTarget {
    pub const fn new(pose: PoseState, gripper: f32) -> Self {
        Self { pose, gripper }
    }
}

// ---------------------------------------------------------------------------
// RobotSnapshot
// ---------------------------------------------------------------------------

/// Everything the task reads from the physics side for one instance, at one
/// instant of simulated time.
#[derive(Debug, Clone, PartialEq)]
pub struct RobotSnapshot {
    /// Fingertip-centered end-effector pose.
    pub ee_pose: PoseState,
    /// End-effector linear velocity reported by the simulator.
    pub ee_linvel: Vector3<f32>,
    /// End-effector angular velocity reported by the simulator.
    pub ee_angvel: Vector3<f32>,
    pub joint_pos: JointVector,
    pub joint_vel: JointVector,
    /// Current gripper joint position.
    pub gripper_pos: f32,
    pub jacobian: Jacobian,
    pub mass_matrix: MassMatrix,
    /// Root pose of the held part (plug).
    pub held_pose: PoseState,
    /// Root pose of the fixed part (socket).
    pub fixed_pose: PoseState,
}

impl Default for RobotSnapshot {
    fn default() -> Self {
        Self {
            ee_pose: PoseState::identity(),
            ee_linvel: Vector3::zeros(),
            ee_angvel: Vector3::zeros(),
            joint_pos: JointVector::zeros(),
            joint_vel: JointVector::zeros(),
            gripper_pos: 0.0,
            jacobian: Jacobian::zeros(),
            mass_matrix: MassMatrix::identity(),
            held_pose: PoseState::identity(),
            fixed_pose: PoseState::identity(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn new_canonicalizes_negative_scalar() {
        let q = UnitQuaternion::from_quaternion(nalgebra::Quaternion::new(-0.5, 0.5, 0.5, 0.5));
        let pose = PoseState::new(Vector3::zeros(), q);
        assert!(pose.orientation.w >= 0.0);
        assert_relative_eq!(pose.orientation.angle_to(&q), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn transform_roundtrip() {
        let pose = PoseState::new(
            Vector3::new(0.6, 0.1, 0.05),
            UnitQuaternion::from_euler_angles(0.0, 0.0, FRAC_PI_2),
        );
        let local = Vector3::new(0.01, 0.0, 0.02);
        let world = pose.transform_point(&local);
        assert_relative_eq!(world, Vector3::new(0.6, 0.11, 0.07), epsilon = 1e-6);
        assert_relative_eq!(pose.inverse_transform_point(&world), local, epsilon = 1e-6);
    }

    #[test]
    fn compose_then_relative_recovers_local() {
        let base = PoseState::new(
            Vector3::new(1.0, 2.0, 3.0),
            UnitQuaternion::from_euler_angles(0.3, -0.2, 1.1),
        );
        let local = PoseState::new(
            Vector3::new(0.0, 0.0, 0.01),
            UnitQuaternion::from_euler_angles(0.0, 0.0, 0.4),
        );
        let combined = base.compose(&local);
        let back = base.relative(&combined);
        assert_relative_eq!(back.position, local.position, epsilon = 1e-5);
        assert_relative_eq!(back.orientation.angle_to(&local.orientation), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn quat_is_wxyz_order() {
        let pose = PoseState::identity();
        assert_eq!(pose.quat_wxyz(), [1.0, 0.0, 0.0, 0.0]);
    }
}
