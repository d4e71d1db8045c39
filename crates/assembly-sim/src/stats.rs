//! Training statistics across episodes.
//!
//! [`TrainingStats`] accumulates step and episode counts plus the success
//! rate and curriculum difficulty reported at each episode boundary.

use bevy::prelude::*;

use crate::resources::{CurriculumStatus, LastStep};

// ---------------------------------------------------------------------------
// TrainingStats
// ---------------------------------------------------------------------------

/// Bevy resource that tracks cumulative statistics across episodes.
#[derive(Resource, Clone, Debug, Default, PartialEq)]
pub struct TrainingStats {
    /// Successful environment steps.
    pub total_steps: u64,
    /// Completed full-batch episodes.
    pub episodes_completed: u32,
    /// Batch success rate at each episode boundary.
    pub success_history: Vec<f32>,
    /// `max_disp` after each curriculum update.
    pub max_disp_history: Vec<f32>,
    /// Mean first-success step, for episodes with at least one success.
    pub success_time_history: Vec<f32>,
    /// Sum of batch-mean rewards over the current episode.
    pub episode_reward: f32,
    /// Batch-mean return of each completed episode.
    pub return_history: Vec<f32>,
}

impl TrainingStats {
    pub const fn new() -> Self {
        Self {
            total_steps: 0,
            episodes_completed: 0,
            success_history: Vec::new(),
            max_disp_history: Vec::new(),
            success_time_history: Vec::new(),
            episode_reward: 0.0,
            return_history: Vec::new(),
        }
    }

    /// Mean success rate over the last `window` episodes.
    pub fn recent_success_rate(&self, window: usize) -> Option<f32> {
        if window == 0 || self.success_history.is_empty() {
            return None;
        }
        let start = self.success_history.len().saturating_sub(window);
        let recent = &self.success_history[start..];
        #[allow(clippy::cast_precision_loss)]
        Some(recent.iter().sum::<f32>() / recent.len() as f32)
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

/// Folds the latest step into [`TrainingStats`] and the curriculum mirror.
#[allow(clippy::needless_pass_by_value)]
pub fn training_stats_system(
    last: Res<LastStep>,
    mut stats: ResMut<TrainingStats>,
    mut status: ResMut<CurriculumStatus>,
) {
    if !last.is_changed() {
        return;
    }
    let Some(result) = last.result.as_ref() else {
        return;
    };

    stats.total_steps += 1;
    if !result.rewards.is_empty() {
        #[allow(clippy::cast_precision_loss)]
        let mean = result.rewards.iter().sum::<f32>() / result.rewards.len() as f32;
        stats.episode_reward += mean;
    }

    let Some(rate) = result.extras.successes else {
        return;
    };
    stats.episodes_completed += 1;
    stats.success_history.push(rate);
    let episode_return = stats.episode_reward;
    stats.return_history.push(episode_return);
    stats.episode_reward = 0.0;
    if let Some(disp) = result.extras.curr_max_disp {
        stats.max_disp_history.push(disp);
    }
    if let Some(t) = result.extras.success_times {
        stats.success_time_history.push(t);
    }
    status.last_success_rate = Some(rate);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
