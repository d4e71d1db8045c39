//! Operational-space impedance law with a dynamically consistent null space.

use assembly_core::config::CtrlConfig;
use assembly_core::math::wrap_to_pi;
use assembly_core::types::{
    ARM_DOF, Jacobian, JointVector, MassMatrix, PoseState, RobotSnapshot, TaskVector,
};
use assembly_ik::pose_error;
use nalgebra::{Matrix6, SMatrix};

use crate::estimator::VelocityEstimate;
use crate::gains::TaskGains;
use crate::inverse::robust_inverse;

/// Everything the controller reads for one instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerState {
    pub ee_pose: PoseState,
    /// `[linear; angular]` end-effector velocity.
    pub twist: TaskVector,
    pub joint_pos: JointVector,
    pub joint_vel: JointVector,
    pub jacobian: Jacobian,
    pub mass_matrix: MassMatrix,
}

impl ControllerState {
    /// Combine a provider snapshot with the estimated end-effector twist.
    pub fn from_snapshot(snapshot: &RobotSnapshot, velocity: &VelocityEstimate) -> Self {
        Self {
            ee_pose: snapshot.ee_pose,
            twist: velocity.as_task_vector(),
            joint_pos: snapshot.joint_pos,
            joint_vel: snapshot.joint_vel,
            jacobian: snapshot.jacobian,
            mass_matrix: snapshot.mass_matrix,
        }
    }
}

/// Controller output for one instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TorqueCommand {
    /// Clamped joint torques.
    pub joint_torque: JointVector,
    /// Task-space wrench `Kp * e - Kd * twist`, kept for diagnostics.
    pub wrench: TaskVector,
    /// Null-space component before clamping.
    pub null_torque: JointVector,
}

// ---------------------------------------------------------------------------
// ImpedanceController
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ImpedanceController {
    default_dof_pos: JointVector,
    kp_null: f32,
    kd_null: f32,
    torque_limit: f32,
    pinv_damping: f32,
}

impl ImpedanceController {
    pub fn new(
        default_dof_pos: JointVector,
        kp_null: f32,
        kd_null: f32,
        torque_limit: f32,
        pinv_damping: f32,
    ) -> Self {
        Self {
            default_dof_pos,
            kp_null,
            kd_null,
            torque_limit,
            pinv_damping,
        }
    }

    pub fn from_config(cfg: &CtrlConfig) -> Self {
        Self::new(
            JointVector::from_row_slice(&cfg.default_dof_pos),
            cfg.kp_null,
            cfg.kd_null,
            cfg.torque_limit,
            cfg.pinv_damping,
        )
    }

    pub const fn torque_limit(&self) -> f32 {
        self.torque_limit
    }

    /// Joint torques that drive `state.ee_pose` toward `target`.
    pub fn compute(
        &self,
        state: &ControllerState,
        target: &PoseState,
        gains: &TaskGains,
    ) -> TorqueCommand {
        let error = pose_error(&state.ee_pose, target).as_task_vector();
        let wrench = gains.prop().component_mul(&error) - gains.deriv().component_mul(&state.twist);

        let j = &state.jacobian;
        let m_inv = robust_inverse(&state.mass_matrix, self.pinv_damping);
        let lambda: Matrix6<f32> = robust_inverse(&(j * m_inv * j.transpose()), self.pinv_damping);

        let task_torque = j.transpose() * (lambda * wrench);
        let null_torque = self.null_space_torque(state, j, &m_inv, &lambda);

        let total = task_torque + null_torque;
        let joint_torque = if total.iter().all(|v| v.is_finite()) {
            total.map(|t| t.clamp(-self.torque_limit, self.torque_limit))
        } else {
            JointVector::zeros()
        };

        TorqueCommand {
            joint_torque,
            wrench,
            null_torque,
        }
    }

    /// `(I - J^T Jbar^T) (kp_null * wrap(q0 - q) - kd_null * qd)` with
    /// `Jbar^T = Lambda J M^-1`.
    fn null_space_torque(
        &self,
        state: &ControllerState,
        j: &Jacobian,
        m_inv: &MassMatrix,
        lambda: &Matrix6<f32>,
    ) -> JointVector {
        let posture = (self.default_dof_pos - state.joint_pos).map(wrap_to_pi);
        let desired = posture * self.kp_null - state.joint_vel * self.kd_null;
        let j_bar_t: SMatrix<f32, 6, ARM_DOF> = lambda * j * m_inv;
        let projector = MassMatrix::identity() - j.transpose() * j_bar_t;
        projector * desired
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
