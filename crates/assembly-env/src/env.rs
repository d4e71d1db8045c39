//! The batched insertion environment.

use assembly_control::{
    Action, ActionParams, ActionProcessor, ControllerState, GainSchedule, ImpedanceController,
    VelocityEstimator,
};
use assembly_core::config::AssemblyConfig;
use assembly_core::error::ConfigError;
use assembly_core::provider::PhysicsProvider;
use assembly_core::types::{ControlTarget, JointVector, PoseState, RobotSnapshot};
use assembly_ik::ResetIk;
use assembly_task::{
    Curriculum, InsertionClassifier, InsertionState, KeypointLayout, ObsFrame, ObsVector,
    ObservationLayout, ProximityReward, RewardEngine, RewardSummary, RewardTerms,
};
use nalgebra::{UnitQuaternion, Vector3};
use tracing::{debug, info, warn};

use crate::assets::AssetMeshes;
use crate::episode::{EpisodeTracker, ResetReport, StepExtras};
use crate::error::AssemblyResult;
use crate::randomize::ResetSampler;

/// Gripper aperture while approaching the part: a quarter wider than it.
const GRIPPER_OPEN_FACTOR: f32 = 1.25;

/// Policy and critic vectors for every instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Observations {
    pub policy: Vec<Vec<f32>>,
    pub critic: Vec<Vec<f32>>,
}

/// Everything returned by [`AssemblyEnv::step`].
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub observations: Vec<Vec<f32>>,
    pub states: Vec<Vec<f32>>,
    pub rewards: Vec<f32>,
    pub terms: Vec<RewardTerms>,
    pub dones: Vec<bool>,
    pub timeouts: Vec<bool>,
    pub extras: StepExtras,
}

// ---------------------------------------------------------------------------
// AssemblyEnv
// ---------------------------------------------------------------------------

/// Peg insertion over a batch of simulated instances.
///
/// Owns the controller, the estimator, and the episode clock. Reads and
/// updates the injected [`Curriculum`] at synchronized episode boundaries.
/// Every instance resets together.
pub struct AssemblyEnv<P: PhysicsProvider> {
    provider: P,
    config: AssemblyConfig,
    curriculum: Curriculum,

    actions: ActionProcessor,
    estimator: VelocityEstimator,
    gains: GainSchedule,
    controller: ImpedanceController,
    reset_ik: ResetIk,

    classifier: InsertionClassifier,
    keypoints: KeypointLayout,
    rewards: RewardEngine,
    policy_layout: ObservationLayout,
    critic_layout: ObservationLayout,

    sampler: ResetSampler,
    episode: EpisodeTracker,

    snapshots: Vec<RobotSnapshot>,
    targets: Vec<ControlTarget>,
    /// Socket tip in world frame, per instance.
    obs_frame: Vec<Vector3<f32>>,
    obs_noise: Vec<Vector3<f32>>,
    /// Center of the box the position targets are clipped to.
    action_frame: Vec<Vector3<f32>>,
    last_reset: Option<ResetReport>,
}

impl<P: PhysicsProvider> AssemblyEnv<P> {
    /// Validate `config` against `provider` and build every component.
    ///
    /// Draws the held-part surface samples once. Call [`reset`] before the
    /// first [`step`].
    ///
    /// [`reset`]: Self::reset
    /// [`step`]: Self::step
    pub fn new(
        provider: P,
        config: AssemblyConfig,
        curriculum: Curriculum,
        meshes: &AssetMeshes,
    ) -> AssemblyResult<Self> {
        config.validate()?;
        let n = provider.num_envs();
        if n != config.sim.num_envs {
            return Err(ConfigError::BatchSizeMismatch {
                expected: config.sim.num_envs,
                got: n,
            }
            .into());
        }
        if (provider.physics_dt() - config.sim.physics_dt).abs() > 1e-12 {
            warn!(
                provider_dt = provider.physics_dt(),
                config_dt = config.sim.physics_dt,
                "provider timestep differs from config"
            );
        }

        let task = &config.task;
        let mut sampler = ResetSampler::new(config.sim.seed);
        let proximity = ProximityReward::new(
            &meshes.held,
            &meshes.fixed,
            task.num_mesh_sample_points,
            task.proximity.clone(),
            sampler.rng_mut(),
        )?;

        let env = Self {
            actions: ActionProcessor::new(
                ActionParams::from_config(&config.ctrl, task.unidirectional_rot),
                n,
            ),
            estimator: VelocityEstimator::new(n),
            gains: GainSchedule::from_config(&config.ctrl)?,
            controller: ImpedanceController::from_config(&config.ctrl),
            reset_ik: ResetIk::from_config(&config.ctrl.ik),
            classifier: InsertionClassifier::from_config(task),
            keypoints: KeypointLayout::new(task.num_keypoints, task.keypoint_scale),
            rewards: RewardEngine::new(proximity),
            policy_layout: ObservationLayout::new(ObsVector::Policy, &config.obs_order)?,
            critic_layout: ObservationLayout::new(ObsVector::Critic, &config.state_order)?,
            sampler,
            episode: EpisodeTracker::new(n, config.sim.max_episode_length()),
            snapshots: provider.snapshots(),
            targets: vec![ControlTarget::default(); n],
            obs_frame: vec![Vector3::zeros(); n],
            obs_noise: vec![Vector3::zeros(); n],
            action_frame: vec![Vector3::zeros(); n],
            last_reset: None,
            provider,
            config,
            curriculum,
        };
        info!(
            num_envs = n,
            provider = env.provider.name(),
            obs_dim = env.policy_layout.dim(),
            state_dim = env.critic_layout.dim(),
            "assembly env ready"
        );
        Ok(env)
    }

    // -- accessors ----------------------------------------------------------

    pub fn num_envs(&self) -> usize {
        self.snapshots.len()
    }

    pub const fn config(&self) -> &AssemblyConfig {
        &self.config
    }

    pub const fn provider(&self) -> &P {
        &self.provider
    }

    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    pub const fn curriculum(&self) -> &Curriculum {
        &self.curriculum
    }

    pub const fn episode(&self) -> &EpisodeTracker {
        &self.episode
    }

    pub fn snapshots(&self) -> &[RobotSnapshot] {
        &self.snapshots
    }

    /// Control targets written by the latest controller update.
    pub fn targets(&self) -> &[ControlTarget] {
        &self.targets
    }

    pub fn action_frames(&self) -> &[Vector3<f32>] {
        &self.action_frame
    }

    pub const fn last_reset(&self) -> Option<&ResetReport> {
        self.last_reset.as_ref()
    }

    pub const fn policy_layout(&self) -> &ObservationLayout {
        &self.policy_layout
    }

    pub const fn critic_layout(&self) -> &ObservationLayout {
        &self.critic_layout
    }

    /// Fingertip goal per instance: the observed socket pose offset by the
    /// configured grasp point.
    pub fn fingertip_goals(&self) -> Vec<Vector3<f32>> {
        let local = Vector3::from(self.config.task.gripper_goal_pos_local);
        self.snapshots
            .iter()
            .map(|s| s.fixed_pose.transform_point(&local))
            .collect()
    }

    // -- step ---------------------------------------------------------------

    /// Apply one batch of policy actions over `decimation` physics steps.
    ///
    /// When the episode times out the whole batch is reset and the returned
    /// observations belong to the new episode.
    pub fn step(&mut self, actions: &[Action]) -> AssemblyResult<StepResult> {
        self.actions.smooth(actions)?;
        for _ in 0..self.config.sim.decimation {
            self.apply_action()?;
            self.provider.step()?;
        }
        self.episode.advance();
        self.refresh()?;

        let timed_out = self.episode.timed_out();
        let n = self.num_envs();

        let mut successes = Vec::with_capacity(n);
        let mut terms = Vec::with_capacity(n);
        for snap in &self.snapshots {
            let state = self.insertion_state(snap);
            let engaged = self.classifier.engaged(&state);
            let success = self.classifier.succeeded(&state);
            successes.push(success);
            terms.push(self.rewards.compute(
                &snap.held_pose,
                &snap.fixed_pose,
                engaged,
                success,
                &self.curriculum,
            ));
        }
        let rewards: Vec<f32> = terms.iter().map(RewardTerms::total).collect();
        let mut extras = StepExtras::with_rewards(RewardSummary::from_terms(&terms));

        if timed_out {
            #[allow(clippy::cast_precision_loss)]
            let rate = successes.iter().filter(|s| **s).count() as f32 / n as f32;
            extras.successes = Some(rate);
            if self.curriculum.enabled() {
                let step = self.curriculum.update(rate);
                info!(
                    success_rate = rate,
                    max_disp = self.curriculum.max_disp(),
                    ?step,
                    "episode boundary"
                );
            }
            extras.curr_max_disp = Some(self.curriculum.max_disp());
        }

        self.episode.record_successes(&successes);
        extras.success_times = self.episode.mean_success_time();

        if timed_out {
            self.reset_batch()?;
        }

        let obs = self.observe();
        Ok(StepResult {
            observations: obs.policy,
            states: obs.critic,
            rewards,
            terms,
            dones: vec![timed_out; n],
            timeouts: vec![timed_out; n],
            extras,
        })
    }

    fn insertion_state(&self, snap: &RobotSnapshot) -> InsertionState {
        InsertionState {
            held_z: snap.held_pose.position.z,
            fixed_z: snap.fixed_pose.position.z,
            keypoint_dist: self
                .keypoints
                .alignment_error(&snap.held_pose, &snap.fixed_pose),
            elapsed_steps: self.episode.length(),
        }
    }

    /// Pull fresh snapshots and advance the estimator if time moved.
    fn refresh(&mut self) -> AssemblyResult<()> {
        self.snapshots = self.provider.snapshots();
        self.estimator
            .advance(self.provider.sim_time(), &self.snapshots)?;
        Ok(())
    }

    /// Targets from the smoothed actions, then joint torques.
    fn apply_action(&mut self) -> AssemblyResult<()> {
        self.refresh()?;
        self.targets = self
            .snapshots
            .iter()
            .enumerate()
            .map(|(i, s)| self.actions.target(i, &s.ee_pose, &self.action_frame[i]))
            .collect();
        self.write_torques()
    }

    /// Hold the current fingertip pose with the gripper closing.
    fn hold_in_place(&mut self) -> AssemblyResult<()> {
        self.refresh()?;
        self.targets = self
            .snapshots
            .iter()
            .map(|s| self.actions.hold_in_place(&s.ee_pose))
            .collect();
        self.write_torques()
    }

    fn write_torques(&mut self) -> AssemblyResult<()> {
        let gains = self.gains.active();
        let torques: Vec<JointVector> = self
            .snapshots
            .iter()
            .zip(&self.targets)
            .enumerate()
            .map(|(i, (snap, target))| {
                let state = ControllerState::from_snapshot(snap, &self.estimator.sample(i));
                self.controller
                    .compute(&state, &target.pose, gains)
                    .joint_torque
            })
            .collect();
        let joint_targets: Vec<JointVector> = self.snapshots.iter().map(|s| s.joint_pos).collect();
        let gripper: Vec<f32> = self.targets.iter().map(|t| t.gripper).collect();
        self.provider.set_joint_torques(&torques)?;
        self.provider
            .set_joint_position_targets(&joint_targets, &gripper)?;
        Ok(())
    }

    // -- reset --------------------------------------------------------------

    /// Reset every instance and return the first observations.
    pub fn reset(&mut self) -> AssemblyResult<Observations> {
        self.reset_batch()?;
        Ok(self.observe())
    }

    fn step_no_action(&mut self) -> AssemblyResult<()> {
        self.provider.step()?;
        self.refresh()
    }

    fn reset_batch(&mut self) -> AssemblyResult<()> {
        let n = self.num_envs();
        let task = self.config.task.clone();
        let ctrl = &self.config.ctrl;
        let open = task.held_asset.diameter / 2.0 * GRIPPER_OPEN_FACTOR;
        let default_q = JointVector::from_row_slice(&ctrl.default_dof_pos);
        let zeros = vec![JointVector::zeros(); n];

        self.provider.set_gravity([0.0; 3]);
        self.provider.set_joint_torques(&zeros)?;

        // Assets and arm to their defaults.
        let held_default = PoseState::from_position(Vector3::from(task.held_asset.default_pos));
        let fixed_default = PoseState::from_position(Vector3::from(task.fixed_asset.default_pos));
        self.provider.write_held_poses(&vec![held_default; n])?;
        self.provider.write_fixed_poses(&vec![fixed_default; n])?;
        let arm = vec![default_q; n];
        self.provider.write_joint_state(&arm, &zeros)?;
        self.provider.set_joint_position_targets(&arm, &vec![open; n])?;
        self.step_no_action()?;

        // Fixed part, observation frame at the socket tip.
        let fixed: Vec<PoseState> = (0..n).map(|_| self.sampler.fixed_pose(&task)).collect();
        self.provider.write_fixed_poses(&fixed)?;
        let tip = Vector3::new(0.0, 0.0, task.fixed_asset.tip_height());
        self.obs_frame = fixed.iter().map(|f| f.transform_point(&tip)).collect();
        let std = self.config.obs_rand.fixed_asset_pos;
        self.obs_noise = (0..n).map(|_| self.sampler.gaussian(&std)).collect();
        self.step_no_action()?;

        // Held part at a curriculum-drawn depth.
        let displacements: Vec<f32> = (0..n)
            .map(|_| self.curriculum.sample_displacement(self.sampler.rng_mut()))
            .collect();
        let held: Vec<PoseState> = fixed
            .iter()
            .zip(&displacements)
            .map(|(f, d)| self.sampler.held_pose(f, &task, *d))
            .collect();
        self.provider.write_held_poses(&held)?;
        self.step_no_action()?;

        // Fingertips to the grasp point.
        let [roll, pitch, yaw] = task.hand_init_orn;
        let hand = UnitQuaternion::from_euler_angles(roll, pitch, yaw);
        let local = Vector3::from(task.gripper_goal_pos_local);
        let grasp: Vec<PoseState> = self
            .snapshots
            .iter()
            .map(|s| PoseState::new(s.held_pose.transform_point(&local), hand))
            .collect();
        let ik = self.reset_ik.run(&mut self.provider, &grasp, &vec![open; n])?;
        self.step_no_action()?;

        // Close the gripper in place with the reset gains.
        self.gains.use_reset();
        self.step_no_action()?;
        let dt = self.provider.physics_dt();
        let mut elapsed = 0.0;
        while elapsed < self.config.ctrl.grasp_time_s {
            self.hold_in_place()?;
            self.step_no_action()?;
            elapsed += dt;
        }

        let bad_grasps = bad_grasp_indices(&self.snapshots, task.bad_grasp_thresh);
        if !bad_grasps.is_empty() {
            warn!(count = bad_grasps.len(), "bad grasps after reset");
        }

        self.estimator
            .reset(self.provider.sim_time(), &self.snapshots)?;
        self.actions.reset();
        self.action_frame = self
            .obs_frame
            .iter()
            .zip(&self.obs_noise)
            .map(|(f, e)| f + e)
            .collect();
        self.gains.use_default();
        self.provider.set_gravity(self.config.sim.gravity);
        self.episode.reset();

        let report = ResetReport {
            ik,
            bad_grasps,
            displacements,
        };
        debug!(
            ik_failures = report.ik_failures(),
            max_disp = self.curriculum.max_disp(),
            "reset done"
        );
        self.last_reset = Some(report);
        Ok(())
    }

    // -- observations -------------------------------------------------------

    fn observe(&self) -> Observations {
        let goals = self.fingertip_goals();
        let frames: Vec<ObsFrame> = self
            .snapshots
            .iter()
            .zip(goals)
            .map(|(s, goal_pos)| ObsFrame {
                joint_pos: s.joint_pos,
                joint_vel: s.joint_vel,
                fingertip: s.ee_pose,
                ee_linvel: s.ee_linvel,
                ee_angvel: s.ee_angvel,
                goal_pos,
                goal_quat: UnitQuaternion::identity(),
                held: s.held_pose,
            })
            .collect();
        Observations {
            policy: self.policy_layout.assemble_batch(&frames),
            critic: self.critic_layout.assemble_batch(&frames),
        }
    }
}

/// Instances whose held part sits more than `thresh` on the -y side of the
/// fixed part. The check is one-sided.
fn bad_grasp_indices(snapshots: &[RobotSnapshot], thresh: f32) -> Vec<usize> {
    snapshots
        .iter()
        .enumerate()
        .filter(|(_, s)| s.fixed_pose.position.y - s.held_pose.position.y > thresh)
        .map(|(i, _)| i)
        .collect()
}

impl<P: PhysicsProvider> std::fmt::Debug for AssemblyEnv<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssemblyEnv")
            .field("provider", &self.provider.name())
            .field("num_envs", &self.num_envs())
            .field("episode_length", &self.episode.length())
            .field("max_disp", &self.curriculum.max_disp())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offset_snapshot(dy: f32) -> RobotSnapshot {
        let mut snap = RobotSnapshot::default();
        snap.fixed_pose.position.y = 0.2;
        snap.held_pose.position.y = 0.2 + dy;
        snap
    }

    #[test]
    fn bad_grasp_flags_only_held_part_behind_fixed() {
        let snapshots = [
            offset_snapshot(0.0),
            offset_snapshot(-0.06),
            offset_snapshot(0.06),
            offset_snapshot(-0.04),
        ];
        assert_eq!(bad_grasp_indices(&snapshots, 0.05), vec![1]);
    }

    #[test]
    fn bad_grasp_empty_batch() {
        assert!(bad_grasp_indices(&[], 0.05).is_empty());
    }
}
