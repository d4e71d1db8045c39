//! Per-episode randomization of part poses and observation noise.

use assembly_core::config::TaskConfig;
use assembly_core::types::PoseState;
use nalgebra::{UnitQuaternion, Vector3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

/// Uniform in `[-w, w]` per axis.
fn symmetric<R: Rng + ?Sized>(rng: &mut R, half_width: &[f32; 3]) -> Vector3<f32> {
    Vector3::from_fn(|i, _| {
        let u: f32 = rng.r#gen();
        (2.0 * u - 1.0) * half_width[i]
    })
}

/// Seeded source of every reset-time random draw.
#[derive(Debug, Clone)]
pub struct ResetSampler {
    rng: ChaCha8Rng,
}

impl ResetSampler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn rng_mut(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    /// Default fixed pose shifted by uniform noise and turned about z by
    /// `init + range * U[0, 1)` degrees.
    pub fn fixed_pose(&mut self, task: &TaskConfig) -> PoseState {
        let position = Vector3::from(task.fixed_asset.default_pos)
            + symmetric(&mut self.rng, &task.fixed_asset_init_pos_noise);
        let u: f32 = self.rng.r#gen();
        let yaw = (task.fixed_asset_init_orn_deg + task.fixed_asset_init_orn_range_deg * u)
            .to_radians();
        PoseState::new(position, UnitQuaternion::from_euler_angles(0.0, 0.0, yaw))
    }

    /// Zero-mean Gaussian noise with per-axis standard deviation `std`.
    pub fn gaussian(&mut self, std: &[f32; 3]) -> Vector3<f32> {
        Vector3::from_fn(|i, _| {
            let z: f32 = self.rng.sample(StandardNormal);
            z * std[i]
        })
    }

    /// Held pose sitting `disp` below the socket tip, aligned with the fixed
    /// part. Negative displacements leave the plug above the tip, where it
    /// also gets lateral noise.
    pub fn held_pose(&mut self, fixed: &PoseState, task: &TaskConfig, disp: f32) -> PoseState {
        let noise = symmetric(&mut self.rng, &task.held_asset_init_pos_noise);
        let mut position = fixed.position;
        position.z += task.fixed_asset.tip_height() - disp;
        if disp < 0.0 {
            position.x += noise.x;
            position.y += noise.y;
        }
        PoseState::new(position, fixed.orientation)
    }
}
