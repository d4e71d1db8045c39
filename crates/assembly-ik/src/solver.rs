//! Damped Least Squares (Levenberg-Marquardt) differential IK step.

use assembly_core::config::IkConfig;
use assembly_core::math::rotation_error;
use assembly_core::types::{Jacobian, JointVector, PoseState, TaskVector};
use nalgebra::{Matrix6, Vector3};

// ---------------------------------------------------------------------------
// PoseError
// ---------------------------------------------------------------------------

/// Task-space error between a current and a target pose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseError {
    /// `target - current` (meters).
    pub position: Vector3<f32>,
    /// Axis-angle of `target * current^-1` (radians).
    pub rotation: Vector3<f32>,
}

impl PoseError {
    /// Stack as `[position; rotation]`.
    pub fn as_task_vector(&self) -> TaskVector {
        TaskVector::new(
            self.position.x,
            self.position.y,
            self.position.z,
            self.rotation.x,
            self.rotation.y,
            self.rotation.z,
        )
    }

    pub fn position_norm(&self) -> f32 {
        self.position.norm()
    }

    pub fn rotation_norm(&self) -> f32 {
        self.rotation.norm()
    }
}

/// Pose error from `current` to `target`, rotation sign-corrected so the
/// short arc is used.
pub fn pose_error(current: &PoseState, target: &PoseState) -> PoseError {
    PoseError {
        position: target.position - current.position,
        rotation: rotation_error(&current.orientation, &target.orientation),
    }
}

// ---------------------------------------------------------------------------
// DlsIk
// ---------------------------------------------------------------------------

/// Result of an iterative IK run for one instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IkResult {
    /// Whether the final error is within tolerance.
    pub converged: bool,
    /// Number of solver steps taken.
    pub iterations: u32,
    /// Final position error (meters).
    pub position_error: f32,
    /// Final rotation error (radians).
    pub rotation_error: f32,
}

/// Damped least squares step: `dq = J^T (J J^T + lambda^2 I)^-1 e`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DlsIk {
    damping: f32,
}

impl Default for DlsIk {
    fn default() -> Self {
        Self::new(0.1)
    }
}

impl DlsIk {
    /// Create a solver with damping `lambda`. Higher = more robust near
    /// singularities, but slower convergence.
    pub const fn new(damping: f32) -> Self {
        Self { damping }
    }

    pub const fn from_config(cfg: &IkConfig) -> Self {
        Self::new(cfg.damping)
    }

    pub const fn damping(&self) -> f32 {
        self.damping
    }

    /// Joint displacement that reduces `error` to first order.
    ///
    /// Returns zero when the damped system cannot be solved.
    pub fn delta(&self, jacobian: &Jacobian, error: &TaskVector) -> JointVector {
        let lambda_sq = self.damping * self.damping;
        let damped = jacobian * jacobian.transpose() + Matrix6::identity() * lambda_sq;
        let y = match damped.cholesky() {
            Some(chol) => chol.solve(error),
            None => match damped.try_inverse() {
                Some(inv) => inv * error,
                None => return JointVector::zeros(),
            },
        };
        let dq = jacobian.transpose() * y;
        if dq.iter().all(|v| v.is_finite()) {
            dq
        } else {
            JointVector::zeros()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
