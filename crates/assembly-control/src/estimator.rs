//! Finite-difference velocities, refreshed once per simulated instant.

use assembly_core::error::SimError;
use assembly_core::math::axis_angle_from_quat;
use assembly_core::provider::check_batch;
use assembly_core::types::{JointVector, PoseState, RobotSnapshot, TaskVector};
use nalgebra::Vector3;

/// Finite-difference velocities for one instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityEstimate {
    pub linear: Vector3<f32>,
    pub angular: Vector3<f32>,
    pub joint: JointVector,
}

impl VelocityEstimate {
    pub fn zeros() -> Self {
        Self {
            linear: Vector3::zeros(),
            angular: Vector3::zeros(),
            joint: JointVector::zeros(),
        }
    }

    /// End-effector twist stacked as `[linear; angular]`.
    pub fn as_task_vector(&self) -> TaskVector {
        TaskVector::new(
            self.linear.x,
            self.linear.y,
            self.linear.z,
            self.angular.x,
            self.angular.y,
            self.angular.z,
        )
    }
}

impl Default for VelocityEstimate {
    fn default() -> Self {
        Self::zeros()
    }
}

/// Batched velocity estimator.
///
/// Differences the fingertip pose and the joint positions against the
/// previous sample, dividing by
/// the simulated time elapsed since that sample. Calling [`advance`] twice
/// at the same `sim_time` leaves the estimate unchanged.
///
/// [`advance`]: VelocityEstimator::advance
#[derive(Debug, Clone)]
pub struct VelocityEstimator {
    prev: Vec<PoseState>,
    prev_joint: Vec<JointVector>,
    estimates: Vec<VelocityEstimate>,
    last_update: f64,
}

impl VelocityEstimator {
    pub fn new(num_envs: usize) -> Self {
        Self {
            prev: vec![PoseState::identity(); num_envs],
            prev_joint: vec![JointVector::zeros(); num_envs],
            estimates: vec![VelocityEstimate::zeros(); num_envs],
            last_update: 0.0,
        }
    }

    pub fn num_envs(&self) -> usize {
        self.prev.len()
    }

    /// Seed the cache from the current poses and zero every estimate.
    pub fn reset(&mut self, sim_time: f64, snapshots: &[RobotSnapshot]) -> Result<(), SimError> {
        check_batch(self.prev.len(), snapshots.len())?;
        for (i, snap) in snapshots.iter().enumerate() {
            self.prev[i] = snap.ee_pose;
            self.prev_joint[i] = snap.joint_pos;
            self.estimates[i] = VelocityEstimate::zeros();
        }
        self.last_update = sim_time;
        Ok(())
    }

    /// Whether `sim_time` is later than the last refresh.
    pub fn is_stale(&self, sim_time: f64) -> bool {
        sim_time > self.last_update
    }

    /// Refresh the estimate if simulated time has advanced. Returns whether
    /// a refresh happened.
    pub fn advance(&mut self, sim_time: f64, snapshots: &[RobotSnapshot]) -> Result<bool, SimError> {
        check_batch(self.prev.len(), snapshots.len())?;
        if !self.is_stale(sim_time) {
            return Ok(false);
        }
        let dt = (sim_time - self.last_update) as f32;
        for (i, snap) in snapshots.iter().enumerate() {
            let pose = &snap.ee_pose;
            let prev = &self.prev[i];
            let delta = pose.orientation * prev.orientation.inverse();
            self.estimates[i] = VelocityEstimate {
                linear: (pose.position - prev.position) / dt,
                angular: axis_angle_from_quat(&delta) / dt,
                joint: (snap.joint_pos - self.prev_joint[i]) / dt,
            };
            self.prev[i] = *pose;
            self.prev_joint[i] = snap.joint_pos;
        }
        self.last_update = sim_time;
        Ok(true)
    }

    /// Latest estimate for `env`; zero when out of range.
    pub fn sample(&self, env: usize) -> VelocityEstimate {
        self.estimates.get(env).copied().unwrap_or_default()
    }

    pub fn estimates(&self) -> &[VelocityEstimate] {
        &self.estimates
    }

    pub fn last_update(&self) -> f64 {
        self.last_update
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::UnitQuaternion;

    fn snapshot(position: Vector3<f32>, yaw: f32) -> RobotSnapshot {
        RobotSnapshot {
            ee_pose: PoseState::new(position, UnitQuaternion::from_euler_angles(0.0, 0.0, yaw)),
            ..RobotSnapshot::default()
        }
    }

    #[test]
    fn differences_over_elapsed_time() {
        let mut est = VelocityEstimator::new(1);
        est.reset(0.0, &[snapshot(Vector3::zeros(), 0.0)]).unwrap();
        let refreshed = est
            .advance(0.1, &[snapshot(Vector3::new(0.01, 0.0, -0.02), 0.05)])
            .unwrap();
        assert!(refreshed);
        let v = est.sample(0);
        assert_relative_eq!(v.linear, Vector3::new(0.1, 0.0, -0.2), epsilon = 1e-4);
        assert_relative_eq!(v.angular, Vector3::new(0.0, 0.0, 0.5), epsilon = 1e-4);
    }

    #[test]
    fn joint_velocity_is_differenced() {
        let mut est = VelocityEstimator::new(1);
        est.reset(0.0, &[RobotSnapshot::default()]).unwrap();
        let mut moved = RobotSnapshot::default();
        moved.joint_pos[2] = 0.02;
        est.advance(0.01, &[moved]).unwrap();
        assert_relative_eq!(est.sample(0).joint[2], 2.0, epsilon = 1e-4);
        assert_relative_eq!(est.sample(0).joint[0], 0.0);
    }

    #[test]
    fn same_instant_is_idempotent() {
        let mut est = VelocityEstimator::new(1);
        est.reset(0.0, &[snapshot(Vector3::zeros(), 0.0)]).unwrap();
        est.advance(0.5, &[snapshot(Vector3::new(1.0, 0.0, 0.0), 0.0)])
            .unwrap();
        let first = est.sample(0);
        let refreshed = est
            .advance(0.5, &[snapshot(Vector3::new(5.0, 5.0, 5.0), 1.0)])
            .unwrap();
        assert!(!refreshed);
        assert_eq!(est.sample(0), first);
    }

    #[test]
    fn reset_zeroes_estimates() {
        let mut est = VelocityEstimator::new(2);
        let snaps = [snapshot(Vector3::zeros(), 0.0), snapshot(Vector3::zeros(), 0.0)];
        est.reset(0.0, &snaps).unwrap();
        let moved = [snapshot(Vector3::x(), 0.0), snapshot(Vector3::y(), 0.0)];
        est.advance(1.0, &moved).unwrap();
        est.reset(1.0, &moved).unwrap();
        assert!(est.estimates().iter().all(|t| *t == VelocityEstimate::zeros()));
        assert!(!est.is_stale(1.0));
    }

    #[test]
    fn sign_flipped_quaternion_reads_as_zero_rotation() {
        let mut est = VelocityEstimator::new(1);
        let q = UnitQuaternion::from_euler_angles(0.2, 0.0, 0.0);
        let start = RobotSnapshot {
            ee_pose: PoseState {
                position: Vector3::zeros(),
                orientation: q,
            },
            ..RobotSnapshot::default()
        };
        let flipped = RobotSnapshot {
            ee_pose: PoseState {
                position: Vector3::zeros(),
                orientation: UnitQuaternion::new_unchecked(-q.into_inner()),
            },
            ..RobotSnapshot::default()
        };
        est.reset(0.0, &[start]).unwrap();
        est.advance(0.01, &[flipped]).unwrap();
        assert_relative_eq!(est.sample(0).angular, Vector3::zeros(), epsilon = 1e-3);
    }

    #[test]
    fn rejects_wrong_batch() {
        let mut est = VelocityEstimator::new(2);
        assert!(est.advance(1.0, &[RobotSnapshot::default()]).is_err());
    }
}
