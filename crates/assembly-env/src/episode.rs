//! Batch-wide episode clock, first-success bookkeeping, and step extras.

use assembly_ik::IkResult;
use assembly_task::RewardSummary;

// ---------------------------------------------------------------------------
// EpisodeTracker
// ---------------------------------------------------------------------------

/// All instances share one episode clock since they reset together.
#[derive(Debug, Clone)]
pub struct EpisodeTracker {
    length: u32,
    max_length: u32,
    succeeded: Vec<bool>,
    /// Step of the first success per instance; zero until it happens.
    success_times: Vec<u32>,
}

impl EpisodeTracker {
    pub fn new(num_envs: usize, max_length: u32) -> Self {
        Self {
            length: 0,
            max_length,
            succeeded: vec![false; num_envs],
            success_times: vec![0; num_envs],
        }
    }

    pub const fn length(&self) -> u32 {
        self.length
    }

    pub const fn max_length(&self) -> u32 {
        self.max_length
    }

    pub fn advance(&mut self) -> u32 {
        self.length += 1;
        self.length
    }

    /// `length >= max_length - 1`.
    pub const fn timed_out(&self) -> bool {
        self.length >= self.max_length.saturating_sub(1)
    }

    /// Record the current step as the first success time of every instance
    /// succeeding for the first time this episode.
    pub fn record_successes(&mut self, successes: &[bool]) {
        for ((done, time), &now) in self
            .succeeded
            .iter_mut()
            .zip(&mut self.success_times)
            .zip(successes)
        {
            if now && !*done {
                *done = true;
                *time = self.length;
            }
        }
    }

    pub fn succeeded(&self) -> &[bool] {
        &self.succeeded
    }

    /// Mean first-success step over instances that have succeeded.
    pub fn mean_success_time(&self) -> Option<f32> {
        let (sum, count) = self
            .success_times
            .iter()
            .filter(|t| **t > 0)
            .fold((0u64, 0u32), |(s, c), t| (s + u64::from(*t), c + 1));
        (count > 0).then(|| sum as f32 / count as f32)
    }

    pub fn reset(&mut self) {
        self.length = 0;
        self.succeeded.fill(false);
        self.success_times.fill(0);
    }
}

// ---------------------------------------------------------------------------
// StepExtras
// ---------------------------------------------------------------------------

/// Diagnostics returned with every step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepExtras {
    /// Batch success fraction; only at episode boundaries.
    pub successes: Option<f32>,
    /// Curriculum difficulty after the boundary update.
    pub curr_max_disp: Option<f32>,
    /// Mean first-success step, once any instance has succeeded.
    pub success_times: Option<f32>,
    pub logs_rew_proximity: f32,
    pub logs_rew_engaged: f32,
    pub logs_rew_success: f32,
}

impl StepExtras {
    pub fn with_rewards(summary: RewardSummary) -> Self {
        Self {
            logs_rew_proximity: summary.proximity,
            logs_rew_engaged: summary.engaged,
            logs_rew_success: summary.success,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// ResetReport
// ---------------------------------------------------------------------------

/// Outcome of the last full-batch reset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResetReport {
    pub ik: Vec<IkResult>,
    /// Instances whose part ended up too far from the socket after grasping.
    pub bad_grasps: Vec<usize>,
    /// Curriculum displacement drawn for each instance.
    pub displacements: Vec<f32>,
}

impl ResetReport {
    pub fn ik_failures(&self) -> usize {
        self.ik.iter().filter(|r| !r.converged).count()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn times_out_one_step_early() {
        let mut ep = EpisodeTracker::new(1, 75);
        for _ in 0..73 {
            ep.advance();
        }
        assert!(!ep.timed_out());
        ep.advance();
        assert!(ep.timed_out());
        assert_eq!(ep.length(), 74);
    }

    #[test]
    fn first_success_time_is_kept() {
        let mut ep = EpisodeTracker::new(3, 75);
        ep.advance();
        ep.advance();
        ep.record_successes(&[true, false, false]);
        ep.advance();
        ep.record_successes(&[true, false, true]);
        assert_eq!(ep.succeeded(), &[true, false, true]);
        assert_relative_eq!(ep.mean_success_time().unwrap(), 2.5);
    }

    #[test]
    fn no_success_no_time() {
        let mut ep = EpisodeTracker::new(2, 10);
        ep.advance();
        ep.record_successes(&[false, false]);
        assert_eq!(ep.mean_success_time(), None);
    }

    #[test]
    fn reset_clears_everything() {
        let mut ep = EpisodeTracker::new(2, 10);
        ep.advance();
        ep.record_successes(&[true, true]);
        ep.reset();
        assert_eq!(ep.length(), 0);
        assert_eq!(ep.succeeded(), &[false, false]);
        assert_eq!(ep.mean_success_time(), None);
    }

    #[test]
    fn extras_carry_reward_means() {
        let extras = StepExtras::with_rewards(RewardSummary {
            proximity: 0.3,
            engaged: 0.5,
            success: 0.25,
        });
        assert_relative_eq!(extras.logs_rew_engaged, 0.5);
        assert_eq!(extras.successes, None);
    }
}
