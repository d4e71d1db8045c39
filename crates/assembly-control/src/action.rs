//! Policy action interpretation: smoothing, scaling, clipping, re-leveling.

use assembly_core::config::CtrlConfig;
use assembly_core::error::ValidationError;
use assembly_core::math::{AXIS_ANGLE_EPS, level_orientation, quat_from_axis_angle};
use assembly_core::types::{ControlTarget, PoseState, TaskVector};
use nalgebra::{UnitQuaternion, Vector3};

/// One raw policy action: `[dx, dy, dz, rx, ry, rz]` in unit scale.
pub type Action = [f32; 6];

/// Gripper aperture commanded by every action target.
pub const GRIPPER_CLOSED: f32 = 0.0;

// ---------------------------------------------------------------------------
// ActionParams
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ActionParams {
    pub ema_factor: f32,
    pub pos_threshold: Vector3<f32>,
    pub rot_threshold: Vector3<f32>,
    pub pos_bounds: Vector3<f32>,
    /// Map the yaw action from `[-1, 1]` to a single turning direction.
    pub unidirectional_rot: bool,
    pub level_roll: f32,
    pub level_pitch: f32,
}

impl ActionParams {
    pub fn from_config(cfg: &CtrlConfig, unidirectional_rot: bool) -> Self {
        Self {
            ema_factor: cfg.ema_factor,
            pos_threshold: Vector3::from(cfg.pos_action_threshold),
            rot_threshold: Vector3::from(cfg.rot_action_threshold),
            pos_bounds: Vector3::from(cfg.pos_action_bounds),
            unidirectional_rot,
            level_roll: cfg.level_roll,
            level_pitch: cfg.level_pitch,
        }
    }

    /// Target for a smoothed action relative to the current fingertip pose,
    /// with the position kept within `pos_bounds` of `frame`.
    pub fn target(
        &self,
        action: &TaskVector,
        current: &PoseState,
        frame: &Vector3<f32>,
    ) -> ControlTarget {
        let step = action.fixed_rows::<3>(0).component_mul(&self.pos_threshold);
        let offset = (current.position + step - frame)
            .zip_map(&self.pos_bounds, |d, b| d.clamp(-b, b));
        let position = frame + offset;

        let mut rot: Vector3<f32> = action.fixed_rows::<3>(3).into_owned();
        if self.unidirectional_rot {
            rot.z = -(rot.z + 1.0) * 0.5;
        }
        let rot = rot.component_mul(&self.rot_threshold);
        let orientation = quat_from_axis_angle(&rot, AXIS_ANGLE_EPS) * current.orientation;

        self.leveled(position, orientation)
    }

    /// Target that keeps the fingertip where it is, re-leveled but unclipped.
    pub fn hold_in_place(&self, current: &PoseState) -> ControlTarget {
        self.leveled(current.position, current.orientation)
    }

    fn leveled(&self, position: Vector3<f32>, orientation: UnitQuaternion<f32>) -> ControlTarget {
        let orientation = level_orientation(&orientation, self.level_roll, self.level_pitch);
        ControlTarget::new(PoseState::new(position, orientation), GRIPPER_CLOSED)
    }
}

// ---------------------------------------------------------------------------
// ActionProcessor
// ---------------------------------------------------------------------------

/// Batched EMA state over policy actions.
#[derive(Debug, Clone)]
pub struct ActionProcessor {
    params: ActionParams,
    actions: Vec<TaskVector>,
}

impl ActionProcessor {
    pub fn new(params: ActionParams, num_envs: usize) -> Self {
        Self {
            params,
            actions: vec![TaskVector::zeros(); num_envs],
        }
    }

    pub const fn params(&self) -> &ActionParams {
        &self.params
    }

    /// Blend `raw` into the smoothed actions: `a = ema * raw + (1 - ema) * a`.
    ///
    /// Rejects the whole batch, leaving the state untouched, if a row count
    /// differs or any value is non-finite.
    pub fn smooth(&mut self, raw: &[Action]) -> Result<(), ValidationError> {
        if raw.len() != self.actions.len() {
            return Err(ValidationError::ActionBatchMismatch {
                expected: self.actions.len(),
                got: raw.len(),
            });
        }
        if raw.iter().flatten().any(|v| !v.is_finite()) {
            return Err(ValidationError::ActionNotFinite);
        }
        let ema = self.params.ema_factor;
        for (a, row) in self.actions.iter_mut().zip(raw) {
            *a = TaskVector::from_row_slice(row) * ema + *a * (1.0 - ema);
        }
        Ok(())
    }

    pub fn actions(&self) -> &[TaskVector] {
        &self.actions
    }

    pub fn target(&self, env: usize, current: &PoseState, frame: &Vector3<f32>) -> ControlTarget {
        let action = self
            .actions
            .get(env)
            .copied()
            .unwrap_or_else(TaskVector::zeros);
        self.params.target(&action, current, frame)
    }

    pub fn hold_in_place(&self, current: &PoseState) -> ControlTarget {
        self.params.hold_in_place(current)
    }

    /// Zero the smoothed actions.
    pub fn reset(&mut self) {
        self.actions.fill(TaskVector::zeros());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::PI;

    fn processor(n: usize) -> ActionProcessor {
        ActionProcessor::new(ActionParams::from_config(&CtrlConfig::default(), false), n)
    }

    fn down_facing(position: Vector3<f32>, yaw: f32) -> PoseState {
        PoseState::new(position, UnitQuaternion::from_euler_angles(PI, 0.0, yaw))
    }

    #[test]
    fn ema_blends_with_previous_action() {
        let mut p = processor(1);
        p.smooth(&[[1.0, 0.0, 0.0, 0.0, 0.0, 0.0]]).unwrap();
        assert_relative_eq!(p.actions()[0][0], 0.2);
        p.smooth(&[[1.0, 0.0, 0.0, 0.0, 0.0, 0.0]]).unwrap();
        assert_relative_eq!(p.actions()[0][0], 0.2 + 0.8 * 0.2, epsilon = 1e-6);
    }

    #[test]
    fn rejects_bad_batches_without_mutation() {
        let mut p = processor(2);
        p.smooth(&[[1.0; 6], [1.0; 6]]).unwrap();
        let before = p.actions().to_vec();
        assert_eq!(
            p.smooth(&[[0.0; 6]]),
            Err(ValidationError::ActionBatchMismatch { expected: 2, got: 1 })
        );
        let mut bad = [[0.0; 6]; 2];
        bad[1][4] = f32::NAN;
        assert_eq!(p.smooth(&bad), Err(ValidationError::ActionNotFinite));
        assert_eq!(p.actions(), before.as_slice());
    }

    #[test]
    fn position_is_clipped_around_frame() {
        let params = ActionParams::from_config(&CtrlConfig::default(), false);
        let frame = Vector3::new(0.6, 0.0, 0.1);
        let current = down_facing(Vector3::new(0.69, 0.0, 0.1), 0.0);
        let action = TaskVector::new(1.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        let target = params.target(&action, &current, &frame);
        // 0.69 + 0.02 exceeds the 0.1 bound around the frame.
        assert_relative_eq!(target.pose.position.x, 0.7, epsilon = 1e-6);
        assert_eq!(target.gripper, GRIPPER_CLOSED);
    }

    #[test]
    fn orientation_is_releveled_keeping_yaw() {
        let params = ActionParams::from_config(&CtrlConfig::default(), false);
        let current = down_facing(Vector3::zeros(), 0.3);
        let action = TaskVector::new(0.0, 0.0, 0.0, 1.0, 1.0, 0.0);
        let target = params.target(&action, &current, &Vector3::zeros());
        let (roll, pitch, yaw) = target.pose.orientation.euler_angles();
        assert_relative_eq!(roll.abs(), PI, epsilon = 1e-4);
        assert_relative_eq!(pitch, 0.0, epsilon = 1e-4);
        assert_relative_eq!(yaw, 0.3, epsilon = 1e-4);
        assert!(target.pose.orientation.w >= 0.0);
    }

    #[test]
    fn unidirectional_yaw_never_turns_positive() {
        let params = ActionParams::from_config(&CtrlConfig::default(), true);
        let current = down_facing(Vector3::zeros(), 0.0);
        let origin = Vector3::zeros();
        // rz = -1 maps to zero rotation.
        let still = TaskVector::new(0.0, 0.0, 0.0, 0.0, 0.0, -1.0);
        let yaw = params.target(&still, &current, &origin).pose.orientation.euler_angles().2;
        assert_relative_eq!(yaw, 0.0, epsilon = 1e-5);
        // rz = 1 maps to a full negative step about world z.
        let turn = TaskVector::new(0.0, 0.0, 0.0, 0.0, 0.0, 1.0);
        let yaw = params.target(&turn, &current, &origin).pose.orientation.euler_angles().2;
        assert_relative_eq!(yaw, -0.01, epsilon = 1e-5);
    }

    #[test]
    fn hold_in_place_is_not_clipped() {
        let p = processor(1);
        let far = down_facing(Vector3::new(5.0, 5.0, 5.0), 0.1);
        let target = p.hold_in_place(&far);
        assert_relative_eq!(target.pose.position, far.position);
        let drift = target.pose.orientation.angle_to(&far.orientation);
        assert_relative_eq!(drift, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn reset_zeroes_state() {
        let mut p = processor(3);
        p.smooth(&[[1.0; 6]; 3]).unwrap();
        p.reset();
        assert!(p.actions().iter().all(|a| a.iter().all(|v| *v == 0.0)));
    }
}
