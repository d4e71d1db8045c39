//! Kinematic 7-joint gantry arm with a two-finger gripper.
//!
//! Joints 0..3 are prismatic along world x, y, z. Joints 3..7 form a
//! revolute wrist `Rz * Ry * Rx * Rz`, so the wrist is redundant by one
//! degree of freedom about the tool axis. The arm is gravity compensated;
//! joint torques drive a diagonal mass matrix.
//!
//! The held part is static until the closing gripper reaches its radius with
//! the part between the fingers. From then on it follows the fingertips
//! rigidly, except that it cannot sink below the floor of the fixed part's
//! hole.

use assembly_core::error::SimError;
use assembly_core::provider::{PhysicsProvider, check_batch};
use assembly_core::types::{ARM_DOF, Jacobian, JointVector, MassMatrix, PoseState, RobotSnapshot};
use nalgebra::{UnitQuaternion, Vector3};
use tracing::debug;

// ---------------------------------------------------------------------------
// GantryParams
// ---------------------------------------------------------------------------

/// Physical parameters of the gantry and the parts it handles.
#[derive(Debug, Clone, PartialEq)]
pub struct GantryParams {
    /// Fingertip position at zero prismatic displacement.
    pub base_offset: Vector3<f32>,
    /// Diagonal of the joint-space mass matrix.
    pub joint_inertia: [f32; ARM_DOF],
    /// Viscous joint damping (N*s/m or Nm*s/rad).
    pub joint_damping: f32,
    /// First-order rate (1/s) at which fingers track their target.
    pub gripper_rate: f32,
    /// Radius of the held part; fingers stop here when it is grasped.
    pub held_radius: f32,
    /// Length of the held part along its local z.
    pub held_height: f32,
    /// Maximum lateral offset between fingertips and part axis for a grasp.
    pub grasp_tolerance: f32,
    /// Lateral radius around the fixed origin inside which the hole floor
    /// stops the held part.
    pub floor_radius: f32,
}

impl Default for GantryParams {
    fn default() -> Self {
        Self {
            base_offset: Vector3::new(0.6, 0.0, 0.25),
            joint_inertia: [2.0, 2.0, 2.0, 0.05, 0.05, 0.05, 0.02],
            joint_damping: 0.0,
            gripper_rate: 40.0,
            held_radius: 0.007_986 / 2.0,
            held_height: 0.05,
            grasp_tolerance: 0.01,
            floor_radius: 0.02,
        }
    }
}

// ---------------------------------------------------------------------------
// Instance state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Instance {
    q: JointVector,
    qd: JointVector,
    torque: JointVector,
    q_target: JointVector,
    gripper_target: f32,
    gripper_pos: f32,
    held_pose: PoseState,
    fixed_pose: PoseState,
    /// Held pose relative to the fingertips while grasped.
    grasp: Option<PoseState>,
}

impl Instance {
    fn new() -> Self {
        Self {
            q: JointVector::zeros(),
            qd: JointVector::zeros(),
            torque: JointVector::zeros(),
            q_target: JointVector::zeros(),
            gripper_target: 0.0,
            gripper_pos: 0.0,
            held_pose: PoseState::identity(),
            fixed_pose: PoseState::identity(),
            grasp: None,
        }
    }
}

fn wrist_rotations(q: &JointVector) -> [UnitQuaternion<f32>; 4] {
    [
        UnitQuaternion::from_axis_angle(&Vector3::z_axis(), q[3]),
        UnitQuaternion::from_axis_angle(&Vector3::y_axis(), q[4]),
        UnitQuaternion::from_axis_angle(&Vector3::x_axis(), q[5]),
        UnitQuaternion::from_axis_angle(&Vector3::z_axis(), q[6]),
    ]
}

// ---------------------------------------------------------------------------
// GantryArm
// ---------------------------------------------------------------------------

/// Batched reference [`PhysicsProvider`].
#[derive(Debug, Clone)]
pub struct GantryArm {
    params: GantryParams,
    physics_dt: f64,
    sim_time: f64,
    gravity: [f32; 3],
    instances: Vec<Instance>,
}

impl GantryArm {
    pub fn new(num_envs: usize, physics_dt: f64, params: GantryParams) -> Self {
        Self {
            params,
            physics_dt,
            sim_time: 0.0,
            gravity: [0.0, 0.0, -9.81],
            instances: vec![Instance::new(); num_envs],
        }
    }

    pub const fn params(&self) -> &GantryParams {
        &self.params
    }

    pub const fn gravity(&self) -> [f32; 3] {
        self.gravity
    }

    /// Whether instance `env` currently holds its part.
    pub fn is_grasped(&self, env: usize) -> bool {
        self.instances.get(env).is_some_and(|i| i.grasp.is_some())
    }

    /// Last arm position target. Arm joints have zero drive stiffness, so
    /// targets are recorded but only torques move them.
    pub fn joint_position_target(&self, env: usize) -> Option<JointVector> {
        self.instances.get(env).map(|i| i.q_target)
    }

    /// Fingertip pose for joint positions `q`.
    pub fn forward_kinematics(&self, q: &JointVector) -> PoseState {
        let [r3, r4, r5, r6] = wrist_rotations(q);
        PoseState::new(
            self.params.base_offset + Vector3::new(q[0], q[1], q[2]),
            r3 * r4 * r5 * r6,
        )
    }

    /// Geometric Jacobian; linear rows from the prismatic joints, angular
    /// rows from the world-frame wrist axes.
    pub fn jacobian(q: &JointVector) -> Jacobian {
        let [r3, r4, r5, _] = wrist_rotations(q);
        let axes = [
            Vector3::z(),
            r3 * Vector3::y(),
            (r3 * r4) * Vector3::x(),
            (r3 * r4 * r5) * Vector3::z(),
        ];
        let mut j = Jacobian::zeros();
        j[(0, 0)] = 1.0;
        j[(1, 1)] = 1.0;
        j[(2, 2)] = 1.0;
        for (k, axis) in axes.iter().enumerate() {
            j.fixed_view_mut::<3, 1>(3, 3 + k).copy_from(axis);
        }
        j
    }

    pub fn mass_matrix(&self) -> MassMatrix {
        MassMatrix::from_diagonal(&JointVector::from_row_slice(&self.params.joint_inertia))
    }

    fn fingers_around_part(&self, ee: &PoseState, held: &PoseState) -> bool {
        let local = held.inverse_transform_point(&ee.position);
        let lateral = local.x.hypot(local.y);
        lateral <= self.params.grasp_tolerance
            && (0.0..=self.params.held_height).contains(&local.z)
    }

    /// Keep the held part above the hole floor when it is over the hole.
    fn clamp_to_floor(&self, held: PoseState, fixed: &PoseState) -> PoseState {
        let mut local = fixed.inverse_transform_point(&held.position);
        if local.z < 0.0 && local.x.hypot(local.y) <= self.params.floor_radius {
            local.z = 0.0;
            PoseState::new(fixed.transform_point(&local), held.orientation)
        } else {
            held
        }
    }

    fn step_instance(&self, inst: &mut Instance, dt: f32) {
        // Arm dynamics: M qdd = tau - c qd, semi-implicit Euler.
        for k in 0..ARM_DOF {
            let qdd = (inst.torque[k] - self.params.joint_damping * inst.qd[k])
                / self.params.joint_inertia[k];
            inst.qd[k] += qdd * dt;
            inst.q[k] += inst.qd[k] * dt;
        }
        let ee = self.forward_kinematics(&inst.q);

        // Fingers.
        let alpha = (self.params.gripper_rate * dt).min(1.0);
        let mut next = inst.gripper_pos + (inst.gripper_target - inst.gripper_pos) * alpha;
        let radius = self.params.held_radius;
        match inst.grasp {
            Some(_) if inst.gripper_target > radius => {
                inst.grasp = None;
                debug!("gantry released part");
            }
            Some(_) => next = radius,
            None if next <= radius
                && inst.gripper_pos >= radius
                && self.fingers_around_part(&ee, &inst.held_pose) =>
            {
                next = radius;
                inst.grasp = Some(ee.relative(&inst.held_pose));
            }
            None => {}
        }
        inst.gripper_pos = next.max(0.0);

        if let Some(rel) = inst.grasp {
            inst.held_pose = self.clamp_to_floor(ee.compose(&rel), &inst.fixed_pose);
        }
    }
}

impl PhysicsProvider for GantryArm {
    fn num_envs(&self) -> usize {
        self.instances.len()
    }

    fn physics_dt(&self) -> f64 {
        self.physics_dt
    }

    fn sim_time(&self) -> f64 {
        self.sim_time
    }

    fn snapshots(&self) -> Vec<RobotSnapshot> {
        let mass_matrix = self.mass_matrix();
        self.instances
            .iter()
            .map(|inst| {
                let jacobian = Self::jacobian(&inst.q);
                let twist = jacobian * inst.qd;
                RobotSnapshot {
                    ee_pose: self.forward_kinematics(&inst.q),
                    ee_linvel: twist.fixed_rows::<3>(0).into_owned(),
                    ee_angvel: twist.fixed_rows::<3>(3).into_owned(),
                    joint_pos: inst.q,
                    joint_vel: inst.qd,
                    gripper_pos: inst.gripper_pos,
                    jacobian,
                    mass_matrix,
                    held_pose: inst.held_pose,
                    fixed_pose: inst.fixed_pose,
                }
            })
            .collect()
    }

    fn write_joint_state(
        &mut self,
        positions: &[JointVector],
        velocities: &[JointVector],
    ) -> Result<(), SimError> {
        check_batch(self.instances.len(), positions.len())?;
        check_batch(self.instances.len(), velocities.len())?;
        for ((inst, q), qd) in self.instances.iter_mut().zip(positions).zip(velocities) {
            inst.q = *q;
            inst.qd = *qd;
        }
        Ok(())
    }

    fn set_joint_position_targets(
        &mut self,
        positions: &[JointVector],
        gripper: &[f32],
    ) -> Result<(), SimError> {
        check_batch(self.instances.len(), positions.len())?;
        check_batch(self.instances.len(), gripper.len())?;
        for ((inst, q), g) in self.instances.iter_mut().zip(positions).zip(gripper) {
            inst.q_target = *q;
            inst.gripper_target = *g;
        }
        Ok(())
    }

    fn set_joint_torques(&mut self, torques: &[JointVector]) -> Result<(), SimError> {
        check_batch(self.instances.len(), torques.len())?;
        for (inst, tau) in self.instances.iter_mut().zip(torques) {
            inst.torque = *tau;
        }
        Ok(())
    }

    fn write_held_poses(&mut self, poses: &[PoseState]) -> Result<(), SimError> {
        check_batch(self.instances.len(), poses.len())?;
        for (inst, pose) in self.instances.iter_mut().zip(poses) {
            inst.held_pose = *pose;
            inst.grasp = None;
        }
        Ok(())
    }

    fn write_fixed_poses(&mut self, poses: &[PoseState]) -> Result<(), SimError> {
        check_batch(self.instances.len(), poses.len())?;
        for (inst, pose) in self.instances.iter_mut().zip(poses) {
            inst.fixed_pose = *pose;
        }
        Ok(())
    }

    fn set_gravity(&mut self, gravity: [f32; 3]) {
        self.gravity = gravity;
    }

    #[allow(clippy::cast_possible_truncation)]
    fn step(&mut self) -> Result<(), SimError> {
        let dt = self.physics_dt as f32;
        let mut instances = std::mem::take(&mut self.instances);
        for inst in &mut instances {
            self.step_instance(inst, dt);
        }
        self.instances = instances;
        self.sim_time += self.physics_dt;

        if let Some(bad) = self
            .instances
            .iter()
            .position(|i| !i.q.iter().all(|v| v.is_finite()) || !i.held_pose.is_finite())
        {
            return Err(SimError::Diverged(bad));
        }
        Ok(())
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "gantry"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const DT: f64 = 1.0 / 120.0;

    fn single() -> GantryArm {
        GantryArm::new(1, DT, GantryParams::default())
    }

    #[test]
    fn forward_kinematics_at_zero() {
        let arm = single();
        let pose = arm.forward_kinematics(&JointVector::zeros());
        assert_relative_eq!(pose.position, Vector3::new(0.6, 0.0, 0.25));
        assert_relative_eq!(pose.orientation.angle(), 0.0);
    }

    #[test]
    fn jacobian_matches_finite_difference() {
        let arm = single();
        let q = JointVector::from_row_slice(&[0.01, -0.02, 0.03, 0.4, -0.3, 2.0, 0.7]);
        let j = GantryArm::jacobian(&q);
        let base = arm.forward_kinematics(&q);
        let h = 1e-3;
        for k in 0..ARM_DOF {
            let mut qh = q;
            qh[k] += h;
            let moved = arm.forward_kinematics(&qh);
            let lin = (moved.position - base.position) / h;
            let ang = assembly_core::math::rotation_error(&base.orientation, &moved.orientation) / h;
            assert_relative_eq!(lin, j.fixed_view::<3, 1>(0, k).into_owned(), epsilon = 1e-2);
            assert_relative_eq!(ang, j.fixed_view::<3, 1>(3, k).into_owned(), epsilon = 1e-2);
        }
    }

    #[test]
    fn torque_accelerates_prismatic_joint() {
        let mut arm = single();
        let mut tau = JointVector::zeros();
        tau[2] = 2.0;
        arm.set_joint_torques(&[tau]).unwrap();
        arm.step().unwrap();
        let snap = &arm.snapshots()[0];
        // 2 N on 2 kg.
        assert_relative_eq!(snap.joint_vel[2], DT as f32, epsilon = 1e-6);
        assert_relative_eq!(snap.ee_linvel.z, DT as f32, epsilon = 1e-6);
        assert!(snap.joint_pos[2] > 0.0);
    }

    #[test]
    fn torques_persist_until_replaced() {
        let mut arm = single();
        let mut tau = JointVector::zeros();
        tau[0] = 2.0;
        arm.set_joint_torques(&[tau]).unwrap();
        arm.step().unwrap();
        arm.step().unwrap();
        assert_relative_eq!(arm.snapshots()[0].joint_vel[0], 2.0 * DT as f32, epsilon = 1e-6);
    }

    fn arm_holding_part() -> GantryArm {
        let mut arm = single();
        let ee = arm.forward_kinematics(&JointVector::zeros());
        let held = PoseState::new(ee.position - Vector3::new(0.0, 0.0, 0.01), UnitQuaternion::identity());
        arm.write_held_poses(&[held]).unwrap();
        arm.set_joint_position_targets(&[JointVector::zeros()], &[0.005]).unwrap();
        for _ in 0..30 {
            arm.step().unwrap();
        }
        arm.set_joint_position_targets(&[JointVector::zeros()], &[0.0]).unwrap();
        for _ in 0..30 {
            arm.step().unwrap();
        }
        arm
    }

    #[test]
    fn closing_gripper_grasps_part_between_fingers() {
        let arm = arm_holding_part();
        assert!(arm.is_grasped(0));
        assert_relative_eq!(arm.snapshots()[0].gripper_pos, arm.params().held_radius);
    }

    #[test]
    fn grasped_part_follows_fingertips() {
        let mut arm = arm_holding_part();
        let before = arm.snapshots()[0].held_pose.position;
        let mut q = JointVector::zeros();
        q[0] = 0.02;
        arm.write_joint_state(&[q], &[JointVector::zeros()]).unwrap();
        arm.step().unwrap();
        let after = arm.snapshots()[0].held_pose.position;
        assert_relative_eq!(after - before, Vector3::new(0.02, 0.0, 0.0), epsilon = 1e-5);
    }

    #[test]
    fn empty_gripper_closes_fully() {
        let mut arm = single();
        arm.write_held_poses(&[PoseState::from_position(Vector3::new(5.0, 5.0, 0.0))])
            .unwrap();
        arm.set_joint_position_targets(&[JointVector::zeros()], &[0.0]).unwrap();
        for _ in 0..60 {
            arm.step().unwrap();
        }
        assert!(!arm.is_grasped(0));
        assert!(arm.snapshots()[0].gripper_pos < 1e-4);
    }

    #[test]
    fn hole_floor_stops_grasped_part() {
        let mut arm = arm_holding_part();
        let held = arm.snapshots()[0].held_pose;
        arm.write_fixed_poses(&[PoseState::from_position(held.position - Vector3::new(0.0, 0.0, 0.01))])
            .unwrap();
        let mut q = JointVector::zeros();
        q[2] = -0.05;
        arm.write_joint_state(&[q], &[JointVector::zeros()]).unwrap();
        arm.step().unwrap();
        let snap = &arm.snapshots()[0];
        assert_relative_eq!(snap.held_pose.position.z, snap.fixed_pose.position.z, epsilon = 1e-6);
    }

    #[test]
    fn wrist_rotation_is_reported_as_angular_velocity() {
        let mut arm = single();
        let mut qd = JointVector::zeros();
        qd[3] = 0.5;
        arm.write_joint_state(&[JointVector::zeros()], &[qd]).unwrap();
        let snap = &arm.snapshots()[0];
        assert_relative_eq!(snap.ee_angvel, Vector3::new(0.0, 0.0, 0.5), epsilon = 1e-6);
    }

    #[test]
    fn position_targets_do_not_move_arm() {
        let mut arm = single();
        let q = JointVector::repeat(0.1);
        arm.set_joint_position_targets(&[q], &[0.0]).unwrap();
        arm.step().unwrap();
        assert_eq!(arm.joint_position_target(0), Some(q));
        assert_relative_eq!(arm.snapshots()[0].joint_pos, JointVector::zeros());
    }

    #[test]
    fn batch_mismatch_is_rejected() {
        let mut arm = GantryArm::new(2, DT, GantryParams::default());
        assert!(arm.set_joint_torques(&[JointVector::zeros()]).is_err());
    }

    #[test]
    fn step_advances_time() {
        let mut arm = single();
        arm.step().unwrap();
        arm.step().unwrap();
        assert!((arm.sim_time() - 2.0 * DT).abs() < 1e-12);
    }
}
