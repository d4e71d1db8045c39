use std::f32::consts::PI;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Serde default functions
// ---------------------------------------------------------------------------

const fn default_physics_dt() -> f64 {
    1.0 / 120.0
}
const fn default_decimation() -> u32 {
    8
}
const fn default_episode_length_s() -> f64 {
    5.0
}
const fn default_num_envs() -> usize {
    128
}
const fn default_gravity() -> [f32; 3] {
    [0.0, 0.0, -9.81]
}
const fn default_true() -> bool {
    true
}

const fn default_ema_factor() -> f32 {
    0.2
}
const fn default_pos_action_bounds() -> [f32; 3] {
    [0.1, 0.1, 0.1]
}
const fn default_pos_action_threshold() -> [f32; 3] {
    [0.02, 0.02, 0.02]
}
const fn default_rot_action_threshold() -> [f32; 3] {
    [0.01, 0.01, 0.01]
}
const fn default_task_prop_gains() -> [f32; 6] {
    [1000.0, 1000.0, 1000.0, 50.0, 50.0, 50.0]
}
const fn default_rot_deriv_scale() -> f32 {
    1.0
}
const fn default_reset_rot_deriv_scale() -> f32 {
    10.0
}
const fn default_dof_pos() -> [f32; 7] {
    [0.0, 0.0, 0.0, -1.870, 0.0, 1.8675, 0.785_398]
}
const fn default_kp_null() -> f32 {
    10.0
}
const fn default_kd_null() -> f32 {
    6.3246
}
const fn default_torque_limit() -> f32 {
    100.0
}
const fn default_level_roll() -> f32 {
    PI
}
const fn default_pinv_damping() -> f32 {
    1.0e-3
}
const fn default_grasp_time_s() -> f64 {
    0.25
}
const fn default_ik_damping() -> f32 {
    0.1
}
const fn default_ik_time_budget_s() -> f64 {
    0.25
}
const fn default_ik_pos_tolerance() -> f32 {
    1.0e-4
}
const fn default_ik_rot_tolerance() -> f32 {
    1.0e-3
}

const fn default_held_diameter() -> f32 {
    0.007_986
}
const fn default_held_height() -> f32 {
    0.050
}
const fn default_fixed_diameter() -> f32 {
    0.0081
}
const fn default_fixed_height() -> f32 {
    0.050_896
}
const fn default_fixed_default_pos() -> [f32; 3] {
    [0.6, 0.0, 0.05]
}
const fn default_held_default_pos() -> [f32; 3] {
    [0.0, 0.4, 0.1]
}
const fn default_num_keypoints() -> usize {
    4
}
const fn default_keypoint_scale() -> f32 {
    0.15
}
const fn default_engage_height_thresh() -> f32 {
    0.01
}
const fn default_success_height_thresh() -> f32 {
    0.003
}
const fn default_close_error_thresh() -> f32 {
    0.015
}
const fn default_num_mesh_sample_points() -> usize {
    1000
}
const fn default_hand_init_orn() -> [f32; 3] {
    [3.1416, 0.0, 0.0]
}
const fn default_gripper_goal_pos_local() -> [f32; 3] {
    [0.0, 0.0, 0.01]
}
const fn default_fixed_asset_init_pos_noise() -> [f32; 3] {
    [0.05, 0.05, 0.05]
}
const fn default_fixed_asset_init_orn_range_deg() -> f32 {
    10.0
}
const fn default_held_asset_init_pos_noise() -> [f32; 3] {
    [0.01, 0.01, 0.01]
}
const fn default_bad_grasp_thresh() -> f32 {
    0.05
}

const fn default_initial_max_disp() -> f32 {
    0.01
}
const fn default_curriculum_success_thresh() -> f32 {
    0.75
}
const fn default_curriculum_failure_thresh() -> f32 {
    0.5
}
const fn default_curriculum_height_step() -> [f32; 2] {
    [-0.005, 0.003]
}
const fn default_curriculum_height_bound() -> [f32; 2] {
    [-0.01, 0.01]
}

const fn default_kernel_a() -> f32 {
    100.0
}
const fn default_exponential_scale() -> f32 {
    0.01
}
const fn default_obs_fixed_asset_pos() -> [f32; 3] {
    [0.001, 0.001, 0.001]
}

fn default_obs_order() -> Vec<String> {
    [
        "joint_pos",
        "fingertip_pos",
        "fingertip_quat",
        "fingertip_goal_pos",
        "fingertip_goal_quat",
        "delta_pos",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect()
}

fn default_state_order() -> Vec<String> {
    [
        "joint_pos",
        "joint_vel",
        "fingertip_pos",
        "fingertip_quat",
        "ee_linvel",
        "ee_angvel",
        "fingertip_goal_pos",
        "fingertip_goal_quat",
        "held_pos",
        "held_quat",
        "delta_pos",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect()
}

fn ensure(cond: bool, field: &str, message: &str) -> Result<(), ConfigError> {
    if cond {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, message))
    }
}

fn all_non_negative(values: &[f32]) -> bool {
    values.iter().all(|v| v.is_finite() && *v >= 0.0)
}

// ---------------------------------------------------------------------------
// SimConfig
// ---------------------------------------------------------------------------

/// Simulation timing and batch layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Physics timestep in seconds (default: 1/120).
    #[serde(default = "default_physics_dt")]
    pub physics_dt: f64,

    /// Physics substeps per policy step (default: 8).
    #[serde(default = "default_decimation")]
    pub decimation: u32,

    /// Episode duration in seconds (default: 5.0).
    #[serde(default = "default_episode_length_s")]
    pub episode_length_s: f64,

    /// Number of parallel instances (default: 128).
    #[serde(default = "default_num_envs")]
    pub num_envs: usize,

    /// Master random seed.
    #[serde(default)]
    pub seed: u64,

    /// Gravity vector [x, y, z] in m/s^2, restored after each reset.
    #[serde(default = "default_gravity")]
    pub gravity: [f32; 3],
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            physics_dt: default_physics_dt(),
            decimation: default_decimation(),
            episode_length_s: default_episode_length_s(),
            num_envs: default_num_envs(),
            seed: 0,
            gravity: default_gravity(),
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.physics_dt > 0.0) {
            return Err(ConfigError::InvalidPhysicsDt(self.physics_dt));
        }
        ensure(self.decimation >= 1, "sim.decimation", "must be >= 1")?;
        ensure(
            self.episode_length_s > 0.0,
            "sim.episode_length_s",
            "must be > 0",
        )?;
        ensure(self.num_envs >= 1, "sim.num_envs", "must be >= 1")
    }

    /// Seconds of simulated time per policy step.
    pub fn control_dt(&self) -> f64 {
        self.physics_dt * f64::from(self.decimation)
    }

    /// Policy steps per episode.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn max_episode_length(&self) -> u32 {
        let steps = self.episode_length_s / self.control_dt();
        (steps - 1.0e-9).ceil().max(1.0) as u32
    }
}

// ---------------------------------------------------------------------------
// CtrlConfig
// ---------------------------------------------------------------------------

/// Reset-time differential IK settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IkConfig {
    /// DLS damping (lambda).
    #[serde(default = "default_ik_damping")]
    pub damping: f32,

    /// Simulated seconds spent iterating before giving up.
    #[serde(default = "default_ik_time_budget_s")]
    pub time_budget_s: f64,

    /// Position error tolerance (meters).
    #[serde(default = "default_ik_pos_tolerance")]
    pub pos_tolerance: f32,

    /// Rotation error tolerance (radians).
    #[serde(default = "default_ik_rot_tolerance")]
    pub rot_tolerance: f32,
}

impl Default for IkConfig {
    fn default() -> Self {
        Self {
            damping: default_ik_damping(),
            time_budget_s: default_ik_time_budget_s(),
            pos_tolerance: default_ik_pos_tolerance(),
            rot_tolerance: default_ik_rot_tolerance(),
        }
    }
}

impl IkConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure(
            self.damping.is_finite() && self.damping > 0.0,
            "ctrl.ik.damping",
            "must be > 0",
        )?;
        ensure(
            self.time_budget_s >= 0.0,
            "ctrl.ik.time_budget_s",
            "must be >= 0",
        )?;
        ensure(
            self.pos_tolerance >= 0.0 && self.rot_tolerance >= 0.0,
            "ctrl.ik",
            "tolerances must be >= 0",
        )
    }
}

/// Action interpretation and task-space controller settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CtrlConfig {
    /// Exponential smoothing factor applied to incoming actions.
    #[serde(default = "default_ema_factor")]
    pub ema_factor: f32,

    /// Per-axis bound (m) of the target around the action frame.
    #[serde(default = "default_pos_action_bounds")]
    pub pos_action_bounds: [f32; 3],

    /// Per-axis scale from unit action to meters.
    #[serde(default = "default_pos_action_threshold")]
    pub pos_action_threshold: [f32; 3],

    /// Per-axis scale from unit action to radians.
    #[serde(default = "default_rot_action_threshold")]
    pub rot_action_threshold: [f32; 3],

    #[serde(default = "default_task_prop_gains")]
    pub default_task_prop_gains: [f32; 6],

    #[serde(default = "default_rot_deriv_scale")]
    pub default_rot_deriv_scale: f32,

    #[serde(default = "default_task_prop_gains")]
    pub reset_task_prop_gains: [f32; 6],

    #[serde(default = "default_reset_rot_deriv_scale")]
    pub reset_rot_deriv_scale: f32,

    /// Null-space posture and the arm's reset posture.
    #[serde(default = "default_dof_pos")]
    pub default_dof_pos: [f32; 7],

    #[serde(default = "default_kp_null")]
    pub kp_null: f32,

    #[serde(default = "default_kd_null")]
    pub kd_null: f32,

    /// Symmetric per-joint torque clamp (Nm).
    #[serde(default = "default_torque_limit")]
    pub torque_limit: f32,

    /// Roll imposed on every orientation target.
    #[serde(default = "default_level_roll")]
    pub level_roll: f32,

    /// Pitch imposed on every orientation target.
    #[serde(default)]
    pub level_pitch: f32,

    /// Damping used when a matrix inverse falls back to a pseudo-inverse.
    #[serde(default = "default_pinv_damping")]
    pub pinv_damping: f32,

    /// Simulated seconds spent closing the gripper during a reset.
    #[serde(default = "default_grasp_time_s")]
    pub grasp_time_s: f64,

    #[serde(default)]
    pub ik: IkConfig,
}

impl Default for CtrlConfig {
    fn default() -> Self {
        Self {
            ema_factor: default_ema_factor(),
            pos_action_bounds: default_pos_action_bounds(),
            pos_action_threshold: default_pos_action_threshold(),
            rot_action_threshold: default_rot_action_threshold(),
            default_task_prop_gains: default_task_prop_gains(),
            default_rot_deriv_scale: default_rot_deriv_scale(),
            reset_task_prop_gains: default_task_prop_gains(),
            reset_rot_deriv_scale: default_reset_rot_deriv_scale(),
            default_dof_pos: default_dof_pos(),
            kp_null: default_kp_null(),
            kd_null: default_kd_null(),
            torque_limit: default_torque_limit(),
            level_roll: default_level_roll(),
            level_pitch: 0.0,
            pinv_damping: default_pinv_damping(),
            grasp_time_s: default_grasp_time_s(),
            ik: IkConfig::default(),
        }
    }
}

impl CtrlConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure(
            self.ema_factor > 0.0 && self.ema_factor <= 1.0,
            "ctrl.ema_factor",
            "must be in (0, 1]",
        )?;
        ensure(
            all_non_negative(&self.pos_action_bounds),
            "ctrl.pos_action_bounds",
            "must be finite and >= 0",
        )?;
        ensure(
            all_non_negative(&self.pos_action_threshold)
                && all_non_negative(&self.rot_action_threshold),
            "ctrl.action_threshold",
            "must be finite and >= 0",
        )?;
        for gains in [&self.default_task_prop_gains, &self.reset_task_prop_gains] {
            if let Some((index, value)) = gains
                .iter()
                .enumerate()
                .find(|(_, v)| !v.is_finite() || **v < 0.0)
            {
                return Err(ConfigError::InvalidGain {
                    index,
                    value: *value,
                });
            }
        }
        ensure(
            self.default_rot_deriv_scale > 0.0 && self.reset_rot_deriv_scale > 0.0,
            "ctrl.rot_deriv_scale",
            "must be > 0",
        )?;
        ensure(
            self.kp_null >= 0.0 && self.kd_null >= 0.0,
            "ctrl.null_gains",
            "must be >= 0",
        )?;
        ensure(
            self.torque_limit.is_finite() && self.torque_limit > 0.0,
            "ctrl.torque_limit",
            "must be > 0",
        )?;
        ensure(
            self.pinv_damping > 0.0,
            "ctrl.pinv_damping",
            "must be > 0",
        )?;
        ensure(
            self.grasp_time_s >= 0.0,
            "ctrl.grasp_time_s",
            "must be >= 0",
        )?;
        self.ik.validate()
    }
}

// ---------------------------------------------------------------------------
// Assets
// ---------------------------------------------------------------------------

/// Held part (plug). Its origin sits at the bottom face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeldAssetConfig {
    /// Outer diameter; also sets the open gripper width.
    #[serde(default = "default_held_diameter")]
    pub diameter: f32,

    #[serde(default = "default_held_height")]
    pub height: f32,

    /// Spawn position before randomization.
    #[serde(default = "default_held_default_pos")]
    pub default_pos: [f32; 3],

    /// Optional Wavefront OBJ surface; a cylinder is generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh_path: Option<String>,
}

impl Default for HeldAssetConfig {
    fn default() -> Self {
        Self {
            diameter: default_held_diameter(),
            height: default_held_height(),
            default_pos: default_held_default_pos(),
            mesh_path: None,
        }
    }
}

/// Fixed part (socket). Its origin sits at the bottom of the hole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedAssetConfig {
    /// Hole diameter.
    #[serde(default = "default_fixed_diameter")]
    pub diameter: f32,

    /// Hole depth above the origin.
    #[serde(default = "default_fixed_height")]
    pub height: f32,

    /// Extra height between the hole depth and the socket tip.
    #[serde(default)]
    pub base_height: f32,

    #[serde(default = "default_fixed_default_pos")]
    pub default_pos: [f32; 3],

    /// Optional Wavefront OBJ surface; a tube is generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh_path: Option<String>,
}

impl Default for FixedAssetConfig {
    fn default() -> Self {
        Self {
            diameter: default_fixed_diameter(),
            height: default_fixed_height(),
            base_height: 0.0,
            default_pos: default_fixed_default_pos(),
            mesh_path: None,
        }
    }
}

impl FixedAssetConfig {
    /// Height of the socket tip above the fixed origin.
    pub fn tip_height(&self) -> f32 {
        self.height + self.base_height
    }
}

// ---------------------------------------------------------------------------
// CurriculumConfig
// ---------------------------------------------------------------------------

/// How the curriculum reward scale grows across the displacement bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardScaleShape {
    #[default]
    Linear,
    Smoothstep,
}

/// Success-rate-driven curriculum over the plug's initial insertion depth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurriculumConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Starting `max_disp` when enabled.
    #[serde(default = "default_initial_max_disp")]
    pub initial_max_disp: f32,

    /// Batch success rate at or above which the task tightens.
    #[serde(default = "default_curriculum_success_thresh")]
    pub success_threshold: f32,

    /// Batch success rate at or below which the task loosens.
    #[serde(default = "default_curriculum_failure_thresh")]
    pub failure_threshold: f32,

    /// `[tighten, loosen]` increments; tighten is negative, loosen positive.
    #[serde(default = "default_curriculum_height_step")]
    pub height_step: [f32; 2],

    /// `[low, high]` bounds on `max_disp`.
    #[serde(default = "default_curriculum_height_bound")]
    pub height_bound: [f32; 2],

    #[serde(default)]
    pub reward_scale_shape: RewardScaleShape,
}

impl Default for CurriculumConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_max_disp: default_initial_max_disp(),
            success_threshold: default_curriculum_success_thresh(),
            failure_threshold: default_curriculum_failure_thresh(),
            height_step: default_curriculum_height_step(),
            height_bound: default_curriculum_height_bound(),
            reward_scale_shape: RewardScaleShape::default(),
        }
    }
}

impl CurriculumConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let [low, high] = self.height_bound;
        if !low.is_finite() || !high.is_finite() {
            return Err(ConfigError::invalid(
                "task.curriculum.height_bound",
                "must be finite",
            ));
        }
        if low > high {
            return Err(ConfigError::CurriculumBoundsInverted { low, high });
        }
        let [tighten, loosen] = self.height_step;
        ensure(
            tighten < 0.0,
            "task.curriculum.height_step",
            "tighten step must be negative",
        )?;
        ensure(
            loosen > 0.0,
            "task.curriculum.height_step",
            "loosen step must be positive",
        )?;
        let unit = 0.0..=1.0;
        ensure(
            unit.contains(&self.success_threshold) && unit.contains(&self.failure_threshold),
            "task.curriculum.thresholds",
            "must be in [0, 1]",
        )?;
        ensure(
            self.failure_threshold <= self.success_threshold,
            "task.curriculum.thresholds",
            "failure threshold must not exceed success threshold",
        )?;
        ensure(
            self.initial_max_disp.is_finite(),
            "task.curriculum.initial_max_disp",
            "must be finite",
        )
    }
}

// ---------------------------------------------------------------------------
// ProximityConfig
// ---------------------------------------------------------------------------

/// Bounded, strictly decreasing map from surface distance to reward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Squash {
    /// `1 / (exp(-a x) + b + exp(a x))`.
    Kernel {
        #[serde(default = "default_kernel_a")]
        a: f32,
        #[serde(default)]
        b: f32,
    },
    /// `exp(-x / scale)`.
    Exponential {
        #[serde(default = "default_exponential_scale")]
        scale: f32,
    },
}

impl Default for Squash {
    fn default() -> Self {
        Self::Kernel {
            a: default_kernel_a(),
            b: 0.0,
        }
    }
}

/// How per-sample distances collapse into one number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceAggregate {
    #[default]
    Mean,
    Min,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProximityConfig {
    #[serde(default)]
    pub squash: Squash,
    #[serde(default)]
    pub aggregate: DistanceAggregate,
}

impl ProximityConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.squash {
            Squash::Kernel { a, b } => ensure(
                a.is_finite() && a > 0.0 && b.is_finite() && b >= 0.0,
                "task.proximity.squash",
                "kernel requires a > 0 and b >= 0",
            ),
            Squash::Exponential { scale } => ensure(
                scale.is_finite() && scale > 0.0,
                "task.proximity.squash",
                "exponential requires scale > 0",
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// TaskConfig
// ---------------------------------------------------------------------------

/// Insertion task geometry, thresholds, and randomization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskConfig {
    #[serde(default)]
    pub held_asset: HeldAssetConfig,

    #[serde(default)]
    pub fixed_asset: FixedAssetConfig,

    #[serde(default = "default_num_keypoints")]
    pub num_keypoints: usize,

    #[serde(default = "default_keypoint_scale")]
    pub keypoint_scale: f32,

    #[serde(default = "default_engage_height_thresh")]
    pub engage_height_thresh: f32,

    #[serde(default = "default_success_height_thresh")]
    pub success_height_thresh: f32,

    #[serde(default = "default_close_error_thresh")]
    pub close_error_thresh: f32,

    /// Surface samples drawn on the held part for the proximity reward.
    #[serde(default = "default_num_mesh_sample_points")]
    pub num_mesh_sample_points: usize,

    /// Remap the yaw action to `[-1, 0]` so the wrist only turns one way.
    #[serde(default)]
    pub unidirectional_rot: bool,

    /// Grasp orientation as extrinsic XYZ Euler angles.
    #[serde(default = "default_hand_init_orn")]
    pub hand_init_orn: [f32; 3],

    /// Fingertip goal relative to the part origin.
    #[serde(default = "default_gripper_goal_pos_local")]
    pub gripper_goal_pos_local: [f32; 3],

    /// Half-width of the uniform noise added to the fixed part position.
    #[serde(default = "default_fixed_asset_init_pos_noise")]
    pub fixed_asset_init_pos_noise: [f32; 3],

    #[serde(default)]
    pub fixed_asset_init_orn_deg: f32,

    #[serde(default = "default_fixed_asset_init_orn_range_deg")]
    pub fixed_asset_init_orn_range_deg: f32,

    /// Half-width of the lateral noise for partially inserted plugs.
    #[serde(default = "default_held_asset_init_pos_noise")]
    pub held_asset_init_pos_noise: [f32; 3],

    /// Lateral offset (m) between target and held base that flags a bad grasp.
    #[serde(default = "default_bad_grasp_thresh")]
    pub bad_grasp_thresh: f32,

    #[serde(default)]
    pub curriculum: CurriculumConfig,

    #[serde(default)]
    pub proximity: ProximityConfig,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            held_asset: HeldAssetConfig::default(),
            fixed_asset: FixedAssetConfig::default(),
            num_keypoints: default_num_keypoints(),
            keypoint_scale: default_keypoint_scale(),
            engage_height_thresh: default_engage_height_thresh(),
            success_height_thresh: default_success_height_thresh(),
            close_error_thresh: default_close_error_thresh(),
            num_mesh_sample_points: default_num_mesh_sample_points(),
            unidirectional_rot: false,
            hand_init_orn: default_hand_init_orn(),
            gripper_goal_pos_local: default_gripper_goal_pos_local(),
            fixed_asset_init_pos_noise: default_fixed_asset_init_pos_noise(),
            fixed_asset_init_orn_deg: 0.0,
            fixed_asset_init_orn_range_deg: default_fixed_asset_init_orn_range_deg(),
            held_asset_init_pos_noise: default_held_asset_init_pos_noise(),
            bad_grasp_thresh: default_bad_grasp_thresh(),
            curriculum: CurriculumConfig::default(),
            proximity: ProximityConfig::default(),
        }
    }
}

impl TaskConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure(
            self.held_asset.diameter > 0.0 && self.held_asset.height > 0.0,
            "task.held_asset",
            "dimensions must be > 0",
        )?;
        ensure(
            self.fixed_asset.diameter > 0.0 && self.fixed_asset.height > 0.0,
            "task.fixed_asset",
            "dimensions must be > 0",
        )?;
        ensure(self.num_keypoints >= 2, "task.num_keypoints", "must be >= 2")?;
        ensure(
            self.keypoint_scale > 0.0,
            "task.keypoint_scale",
            "must be > 0",
        )?;
        ensure(
            self.engage_height_thresh.is_finite()
                && self.success_height_thresh.is_finite()
                && self.close_error_thresh > 0.0,
            "task.thresholds",
            "must be finite, close_error_thresh > 0",
        )?;
        ensure(
            self.num_mesh_sample_points >= 1,
            "task.num_mesh_sample_points",
            "must be >= 1",
        )?;
        ensure(
            all_non_negative(&self.fixed_asset_init_pos_noise)
                && all_non_negative(&self.held_asset_init_pos_noise),
            "task.init_pos_noise",
            "must be finite and >= 0",
        )?;
        ensure(
            self.fixed_asset_init_orn_range_deg >= 0.0,
            "task.fixed_asset_init_orn_range_deg",
            "must be >= 0",
        )?;
        self.curriculum.validate()?;
        self.proximity.validate()
    }
}

// ---------------------------------------------------------------------------
// ObsRandConfig
// ---------------------------------------------------------------------------

/// Observation noise drawn once per episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObsRandConfig {
    /// Gaussian standard deviation on the observed fixed-part position.
    #[serde(default = "default_obs_fixed_asset_pos")]
    pub fixed_asset_pos: [f32; 3],
}

impl Default for ObsRandConfig {
    fn default() -> Self {
        Self {
            fixed_asset_pos: default_obs_fixed_asset_pos(),
        }
    }
}

// ---------------------------------------------------------------------------
// AssemblyConfig
// ---------------------------------------------------------------------------

/// Top-level configuration for the insertion environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblyConfig {
    #[serde(default)]
    pub sim: SimConfig,

    #[serde(default)]
    pub ctrl: CtrlConfig,

    #[serde(default)]
    pub task: TaskConfig,

    #[serde(default)]
    pub obs_rand: ObsRandConfig,

    /// Field order of the policy observation vector.
    #[serde(default = "default_obs_order")]
    pub obs_order: Vec<String>,

    /// Field order of the critic state vector.
    #[serde(default = "default_state_order")]
    pub state_order: Vec<String>,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            sim: SimConfig::default(),
            ctrl: CtrlConfig::default(),
            task: TaskConfig::default(),
            obs_rand: ObsRandConfig::default(),
            obs_order: default_obs_order(),
            state_order: default_state_order(),
        }
    }
}

impl AssemblyConfig {
    /// Validate every section. Returns the first error encountered.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sim.validate()?;
        self.ctrl.validate()?;
        self.task.validate()?;
        ensure(
            all_non_negative(&self.obs_rand.fixed_asset_pos),
            "obs_rand.fixed_asset_pos",
            "must be finite and >= 0",
        )
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_validate() {
        AssemblyConfig::default().validate().unwrap();
    }

    #[test]
    fn max_episode_length_from_defaults() {
        let sim = SimConfig::default();
        // 5 s at 15 Hz policy rate.
        assert_eq!(sim.max_episode_length(), 75);
        assert!((sim.control_dt() - 8.0 / 120.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_zero_physics_dt() {
        let sim = SimConfig {
            physics_dt: 0.0,
            ..SimConfig::default()
        };
        assert!(matches!(sim.validate(), Err(ConfigError::InvalidPhysicsDt(_))));
    }

    #[test]
    fn rejects_inverted_curriculum_bounds() {
        let cfg = CurriculumConfig {
            height_bound: [0.02, -0.01],
            ..CurriculumConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::CurriculumBoundsInverted { .. })
        ));
    }

    #[test]
    fn rejects_wrong_sign_steps() {
        let cfg = CurriculumConfig {
            height_step: [0.005, 0.003],
            ..CurriculumConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_negative_gain() {
        let mut ctrl = CtrlConfig::default();
        ctrl.reset_task_prop_gains[4] = -1.0;
        assert!(matches!(
            ctrl.validate(),
            Err(ConfigError::InvalidGain { index: 4, .. })
        ));
    }

    #[test]
    fn rejects_ema_out_of_range() {
        let ctrl = CtrlConfig {
            ema_factor: 1.5,
            ..CtrlConfig::default()
        };
        assert!(ctrl.validate().is_err());
    }

    #[test]
    fn rejects_non_positive_kernel() {
        let prox = ProximityConfig {
            squash: Squash::Kernel { a: 0.0, b: 0.0 },
            ..ProximityConfig::default()
        };
        assert!(prox.validate().is_err());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg = AssemblyConfig::from_toml_str(
            r#"
            [sim]
            num_envs = 4

            [task.curriculum]
            reward_scale_shape = "smoothstep"

            [task.proximity.squash]
            kind = "exponential"
            scale = 0.02
            "#,
        )
        .unwrap();
        assert_eq!(cfg.sim.num_envs, 4);
        assert_eq!(cfg.sim.decimation, 8);
        assert_eq!(
            cfg.task.curriculum.reward_scale_shape,
            RewardScaleShape::Smoothstep
        );
        assert_eq!(cfg.task.proximity.squash, Squash::Exponential { scale: 0.02 });
        assert_eq!(cfg.obs_order.len(), 6);
        assert_eq!(cfg.state_order.len(), 11);
    }

    #[test]
    fn toml_roundtrip_preserves_config() {
        let cfg = AssemblyConfig::default();
        let text = cfg.to_toml_string().unwrap();
        let back = AssemblyConfig::from_toml_str(&text).unwrap();
        assert_eq!(cfg, back);
    }

    #[test]
    fn from_file_reads_and_validates() {
        let dir = std::env::temp_dir().join("assembly_core_config_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "[task.curriculum]\nheight_bound = [0.5, 0.1]").unwrap();
        drop(f);
        assert!(matches!(
            AssemblyConfig::from_file(&path),
            Err(ConfigError::CurriculumBoundsInverted { .. })
        ));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn from_file_missing_is_io_error() {
        let result = AssemblyConfig::from_file("/nonexistent/assembly.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
