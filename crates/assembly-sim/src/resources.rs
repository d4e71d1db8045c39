//! Bevy resources wrapping the batched environment and its step output.

use assembly_control::Action;
use assembly_core::provider::PhysicsProvider;
use assembly_env::{AssemblyEnv, AssemblyResult, Observations, StepResult};
use assembly_task::Curriculum;
use bevy::prelude::*;

// ---------------------------------------------------------------------------
// EnvResource
// ---------------------------------------------------------------------------

/// The environment as a Bevy resource.
///
/// Systems in [`AssemblySet::Step`](crate::AssemblySet::Step) are the only
/// writers.
#[derive(Resource)]
pub struct EnvResource<P: PhysicsProvider + Send + Sync + 'static> {
    env: AssemblyEnv<P>,
}

impl<P: PhysicsProvider + Send + Sync + 'static> EnvResource<P> {
    /// Reset `env` and wrap it, returning the first observations.
    pub fn new(mut env: AssemblyEnv<P>) -> AssemblyResult<(Self, Observations)> {
        let obs = env.reset()?;
        Ok((Self { env }, obs))
    }

    pub const fn env(&self) -> &AssemblyEnv<P> {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut AssemblyEnv<P> {
        &mut self.env
    }

    pub fn into_inner(self) -> AssemblyEnv<P> {
        self.env
    }
}

// ---------------------------------------------------------------------------
// PolicyActions
// ---------------------------------------------------------------------------

/// Actions consumed by the next environment step, one per instance.
#[derive(Resource, Clone, Debug, Default, PartialEq)]
pub struct PolicyActions(pub Vec<Action>);

impl PolicyActions {
    pub fn zeros(num_envs: usize) -> Self {
        Self(vec![[0.0; 6]; num_envs])
    }
}

// ---------------------------------------------------------------------------
// LatestObservations / LastStep
// ---------------------------------------------------------------------------

/// Observations the policy should act on next.
#[derive(Resource, Clone, Debug, Default, PartialEq)]
pub struct LatestObservations(pub Observations);

/// Outcome of the most recent step attempt.
#[derive(Resource, Clone, Debug, Default)]
pub struct LastStep {
    /// `None` before the first step and after a failed one.
    pub result: Option<StepResult>,
    /// Failed step attempts since startup.
    pub errors: u64,
}

impl LastStep {
    /// True when the last step closed an episode.
    pub fn at_boundary(&self) -> bool {
        self.result
            .as_ref()
            .is_some_and(|r| r.extras.successes.is_some())
    }
}

// ---------------------------------------------------------------------------
// CurriculumStatus
// ---------------------------------------------------------------------------

/// Read-only mirror of the environment's curriculum.
#[derive(Resource, Clone, Debug, Default, PartialEq)]
pub struct CurriculumStatus {
    pub enabled: bool,
    pub max_disp: f32,
    pub reward_scale: f32,
    pub updates: u64,
    /// Success rate reported at the latest episode boundary.
    pub last_success_rate: Option<f32>,
}

impl CurriculumStatus {
    pub(crate) fn mirror(&mut self, curriculum: &Curriculum) {
        self.enabled = curriculum.enabled();
        self.max_disp = curriculum.max_disp();
        self.reward_scale = curriculum.reward_scale();
        self.updates = curriculum.updates();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assembly_core::config::CurriculumConfig;
    use assembly_env::StepExtras;

    #[test]
    fn zero_actions_cover_batch() {
        let actions = PolicyActions::zeros(3);
        assert_eq!(actions.0.len(), 3);
        assert!(actions.0.iter().flatten().all(|&a| a == 0.0));
    }

    #[test]
    fn boundary_follows_success_extra() {
        let mut last = LastStep::default();
        assert!(!last.at_boundary());

        last.result = Some(StepResult {
            observations: Vec::new(),
            states: Vec::new(),
            rewards: Vec::new(),
            terms: Vec::new(),
            dones: Vec::new(),
            timeouts: Vec::new(),
            extras: StepExtras::default(),
        });
        assert!(!last.at_boundary());

        if let Some(r) = last.result.as_mut() {
            r.extras.successes = Some(0.5);
        }
        assert!(last.at_boundary());
    }

    #[test]
    fn mirror_copies_curriculum() {
        let curriculum = Curriculum::new(&CurriculumConfig::default()).unwrap();
        let mut status = CurriculumStatus::default();
        status.mirror(&curriculum);
        assert!(status.enabled);
        assert!((status.max_disp - curriculum.max_disp()).abs() < f32::EPSILON);
        assert!((status.reward_scale - curriculum.reward_scale()).abs() < f32::EPSILON);
        assert_eq!(status.updates, 0);
        assert!(status.last_success_rate.is_none());
    }
}
