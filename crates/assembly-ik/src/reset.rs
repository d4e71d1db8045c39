//! Open-loop IK iterations against the simulator during resets.

use assembly_core::config::IkConfig;
use assembly_core::error::SimError;
use assembly_core::provider::{PhysicsProvider, check_batch};
use assembly_core::types::{JointVector, PoseState, RobotSnapshot};
use tracing::{debug, warn};

use crate::solver::{DlsIk, IkResult, PoseError, pose_error};

/// Iterates [`DlsIk`] on every instance, writing joint state and stepping
/// the provider, until a simulated-time budget runs out or all instances
/// are within tolerance.
#[derive(Debug, Clone)]
pub struct ResetIk {
    solver: DlsIk,
    time_budget_s: f64,
    pos_tolerance: f32,
    rot_tolerance: f32,
}

impl ResetIk {
    pub const fn new(solver: DlsIk, time_budget_s: f64, pos_tolerance: f32, rot_tolerance: f32) -> Self {
        Self {
            solver,
            time_budget_s,
            pos_tolerance,
            rot_tolerance,
        }
    }

    pub const fn from_config(cfg: &IkConfig) -> Self {
        Self::new(
            DlsIk::from_config(cfg),
            cfg.time_budget_s,
            cfg.pos_tolerance,
            cfg.rot_tolerance,
        )
    }

    fn within_tolerance(&self, err: &PoseError) -> bool {
        err.position_norm() <= self.pos_tolerance && err.rotation_norm() <= self.rot_tolerance
    }

    /// Drive every end effector toward `targets`.
    ///
    /// `gripper` holds the gripper target written alongside the arm joints.
    /// A shortfall is reported per instance in the returned [`IkResult`]s,
    /// never as an error.
    pub fn run<P: PhysicsProvider + ?Sized>(
        &self,
        provider: &mut P,
        targets: &[PoseState],
        gripper: &[f32],
    ) -> Result<Vec<IkResult>, SimError> {
        let n = provider.num_envs();
        check_batch(n, targets.len())?;
        check_batch(n, gripper.len())?;

        let dt = provider.physics_dt();
        let zero_vel = vec![JointVector::zeros(); n];
        let mut snapshots = provider.snapshots();
        let mut elapsed = 0.0;
        let mut iterations = 0u32;

        while elapsed < self.time_budget_s {
            let errors = errors_to(&snapshots, targets);
            if errors.iter().all(|e| self.within_tolerance(e)) {
                break;
            }

            let joint_pos: Vec<JointVector> = snapshots
                .iter()
                .zip(&errors)
                .map(|(snap, err)| {
                    snap.joint_pos + self.solver.delta(&snap.jacobian, &err.as_task_vector())
                })
                .collect();

            provider.write_joint_state(&joint_pos, &zero_vel)?;
            provider.set_joint_position_targets(&joint_pos, gripper)?;
            provider.step()?;

            elapsed += dt;
            iterations += 1;
            snapshots = provider.snapshots();
        }

        let results: Vec<IkResult> = errors_to(&snapshots, targets)
            .iter()
            .map(|err| IkResult {
                converged: self.within_tolerance(err),
                iterations,
                position_error: err.position_norm(),
                rotation_error: err.rotation_norm(),
            })
            .collect();

        let failed = results.iter().filter(|r| !r.converged).count();
        if failed > 0 {
            let worst = results
                .iter()
                .map(|r| r.position_error)
                .fold(0.0f32, f32::max);
            warn!(failed, worst_position_error = worst, "reset IK did not converge");
        } else {
            debug!(iterations, "reset IK converged");
        }
        Ok(results)
    }
}

fn errors_to(snapshots: &[RobotSnapshot], targets: &[PoseState]) -> Vec<PoseError> {
    snapshots
        .iter()
        .zip(targets)
        .map(|(snap, target)| pose_error(&snap.ee_pose, target))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assembly_physics::{GantryArm, GantryParams};
    use nalgebra::{UnitQuaternion, Vector3};
    use std::f32::consts::PI;

    fn arm(num_envs: usize) -> GantryArm {
        GantryArm::new(num_envs, 1.0 / 120.0, GantryParams::default())
    }

    #[test]
    fn converges_to_reachable_grasp_pose() {
        let mut provider = arm(2);
        let targets = vec![
            PoseState::new(
                Vector3::new(0.6, 0.0, 0.12),
                UnitQuaternion::from_euler_angles(PI, 0.0, 0.0),
            ),
            PoseState::new(
                Vector3::new(0.55, 0.04, 0.1),
                UnitQuaternion::from_euler_angles(PI, 0.0, 0.3),
            ),
        ];
        let ik = ResetIk::from_config(&IkConfig::default());
        let results = ik.run(&mut provider, &targets, &[0.005, 0.005]).unwrap();
        for r in &results {
            assert!(r.converged, "{r:?}");
        }
        let snaps = provider.snapshots();
        assert!((snaps[1].ee_pose.position - targets[1].position).norm() < 1e-3);
    }

    #[test]
    fn zero_budget_reports_without_stepping() {
        let mut provider = arm(1);
        let cfg = IkConfig {
            time_budget_s: 0.0,
            ..IkConfig::default()
        };
        let target = PoseState::from_position(Vector3::new(1.0, 1.0, 1.0));
        let results = ResetIk::from_config(&cfg)
            .run(&mut provider, &[target], &[0.0])
            .unwrap();
        assert_eq!(results[0].iterations, 0);
        assert!(!results[0].converged);
        assert!(provider.sim_time().abs() < 1e-12);
    }

    #[test]
    fn stops_early_when_already_at_target() {
        let mut provider = arm(1);
        let current = provider.snapshots()[0].ee_pose;
        let results = ResetIk::from_config(&IkConfig::default())
            .run(&mut provider, &[current], &[0.0])
            .unwrap();
        assert!(results[0].converged);
        assert_eq!(results[0].iterations, 0);
    }

    #[test]
    fn rejects_wrong_batch() {
        let mut provider = arm(2);
        let err = ResetIk::from_config(&IkConfig::default())
            .run(&mut provider, &[PoseState::identity()], &[0.0, 0.0])
            .unwrap_err();
        assert!(matches!(err, SimError::BatchSizeMismatch { .. }));
    }
}
