//! Bevy integration for the assembly environment.
//!
//! [`AssemblySimPlugin`] steps an [`AssemblyEnv`] once per `Update`, reading
//! [`PolicyActions`] and publishing [`LastStep`], [`LatestObservations`],
//! [`CurriculumStatus`] and [`TrainingStats`].
//!
//! # Example
//!
//! ```no_run
//! use assembly_env::{AssemblyEnv, AssemblyResult};
//! use assembly_physics::GantryArm;
//! use assembly_sim::{AssemblySimPlugin, insert_env};
//! use bevy::prelude::*;
//!
//! fn run(env: AssemblyEnv<GantryArm>) -> AssemblyResult<()> {
//!     let mut app = App::new();
//!     insert_env(&mut app, env)?;
//!     app.add_plugins(AssemblySimPlugin::<GantryArm>::new());
//!     app.update();
//!     Ok(())
//! }
//! ```
//!
//! [`AssemblyEnv`]: assembly_env::AssemblyEnv

pub mod resources;
pub mod stats;
pub mod systems;

use std::marker::PhantomData;

use assembly_core::provider::PhysicsProvider;
use assembly_env::{AssemblyEnv, AssemblyResult};
use bevy::prelude::*;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use resources::{CurriculumStatus, EnvResource, LastStep, LatestObservations, PolicyActions};
pub use stats::TrainingStats;
pub use systems::env_step_system;

// ---------------------------------------------------------------------------
// AssemblySet
// ---------------------------------------------------------------------------

/// Ordering within `Update`: policy writes actions, the env steps, then
/// statistics are recorded.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssemblySet {
    Policy,
    Step,
    Record,
}

// ---------------------------------------------------------------------------
// insert_env
// ---------------------------------------------------------------------------

/// Reset `env` and insert it with zero actions and its first observations.
pub fn insert_env<P: PhysicsProvider + Send + Sync + 'static>(
    app: &mut App,
    env: AssemblyEnv<P>,
) -> AssemblyResult<()> {
    let num_envs = env.num_envs();
    let (resource, obs) = EnvResource::new(env)?;
    let mut status = CurriculumStatus::default();
    status.mirror(resource.env().curriculum());
    app.insert_resource(resource)
        .insert_resource(PolicyActions::zeros(num_envs))
        .insert_resource(LatestObservations(obs))
        .insert_resource(status);
    Ok(())
}

// ---------------------------------------------------------------------------
// AssemblySimPlugin
// ---------------------------------------------------------------------------

/// Steps [`EnvResource<P>`] each frame and tracks [`TrainingStats`].
///
/// Stepping is skipped until an environment is inserted, see [`insert_env`].
pub struct AssemblySimPlugin<P> {
    _provider: PhantomData<fn() -> P>,
}

impl<P> AssemblySimPlugin<P> {
    pub const fn new() -> Self {
        Self {
            _provider: PhantomData,
        }
    }
}

impl<P> Default for AssemblySimPlugin<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: PhysicsProvider + Send + Sync + 'static> Plugin for AssemblySimPlugin<P> {
    fn build(&self, app: &mut App) {
        app.init_resource::<PolicyActions>()
            .init_resource::<LatestObservations>()
            .init_resource::<LastStep>()
            .init_resource::<CurriculumStatus>()
            .init_resource::<TrainingStats>()
            .configure_sets(
                Update,
                (AssemblySet::Policy, AssemblySet::Step, AssemblySet::Record).chain(),
            )
            .add_systems(
                Update,
                (
                    env_step_system::<P>
                        .in_set(AssemblySet::Step)
                        .run_if(resource_exists::<EnvResource<P>>),
                    stats::training_stats_system.in_set(AssemblySet::Record),
                ),
            );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
