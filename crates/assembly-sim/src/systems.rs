//! Systems that drive the environment from the Bevy schedule.

use assembly_core::provider::PhysicsProvider;
use assembly_env::Observations;
use bevy::prelude::*;
use tracing::{error, info};

use crate::resources::{CurriculumStatus, EnvResource, LastStep, LatestObservations, PolicyActions};

/// Step the environment once with the current [`PolicyActions`].
///
/// A failed step is logged and counted in [`LastStep::errors`]; the schedule
/// keeps running.
#[allow(clippy::needless_pass_by_value)]
pub fn env_step_system<P: PhysicsProvider + Send + Sync + 'static>(
    mut env: ResMut<EnvResource<P>>,
    actions: Res<PolicyActions>,
    mut last: ResMut<LastStep>,
    mut obs: ResMut<LatestObservations>,
    mut status: ResMut<CurriculumStatus>,
) {
    match env.env_mut().step(&actions.0) {
        Ok(result) => {
            obs.0 = Observations {
                policy: result.observations.clone(),
                critic: result.states.clone(),
            };
            status.mirror(env.env().curriculum());
            if let Some(rate) = result.extras.successes {
                info!(
                    success_rate = rate,
                    max_disp = status.max_disp,
                    updates = status.updates,
                    "episode complete"
                );
            }
            last.result = Some(result);
        }
        Err(err) => {
            error!(%err, "assembly env step failed");
            last.result = None;
            last.errors += 1;
        }
    }
}
