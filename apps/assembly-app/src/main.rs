//! Peg/hole assembly rollout CLI.
//!
//! Provides three modes of operation:
//! - `headless`: Run full-batch episodes on the gantry provider and print statistics
//! - `config`: Print the default configuration as TOML
//! - `info`: Print crate versions and the resolved environment layout

use std::path::PathBuf;
use std::process::ExitCode;

use bevy::prelude::*;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use assembly_core::config::AssemblyConfig;
use assembly_core::provider::PhysicsProvider;
use assembly_env::{AssemblyEnv, AssemblyError, AssemblyResult, AssetMeshes};
use assembly_physics::{GantryArm, GantryParams};
use assembly_sim::{
    AssemblySet, AssemblySimPlugin, CurriculumStatus, EnvResource, PolicyActions, TrainingStats,
    insert_env,
};
use assembly_task::Curriculum;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

/// Batched peg/hole insertion with an impedance-controlled gantry arm.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// TOML configuration file; defaults are used when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run episodes locally and print statistics.
    Headless {
        /// Number of full-batch episodes to run.
        #[arg(short = 'n', long, default_value_t = 1)]
        episodes: u32,

        /// Override the number of parallel instances.
        #[arg(short, long)]
        envs: Option<usize>,

        /// Override the random seed.
        #[arg(short, long)]
        seed: Option<u64>,

        /// Send zero actions instead of the scripted insertion policy.
        #[arg(long)]
        idle: bool,
    },

    /// Print the default configuration as TOML.
    Config,

    /// Print crate information.
    Info,
}

// ---------------------------------------------------------------------------
// Scripted policy
// ---------------------------------------------------------------------------

/// Drives each fingertip straight at its goal, saturating at unit actions.
#[allow(clippy::needless_pass_by_value)]
fn scripted_policy_system(env: Res<EnvResource<GantryArm>>, mut actions: ResMut<PolicyActions>) {
    let env = env.env();
    let threshold = env.config().ctrl.pos_action_threshold;
    actions.0 = env
        .snapshots()
        .iter()
        .zip(env.fingertip_goals())
        .map(|(snap, goal)| {
            let delta = goal - snap.ee_pose.position;
            let mut action = [0.0; 6];
            for (i, a) in action.iter_mut().take(3).enumerate() {
                *a = (delta[i] / threshold[i]).clamp(-1.0, 1.0);
            }
            action
        })
        .collect();
}

// ---------------------------------------------------------------------------
// Mode implementations
// ---------------------------------------------------------------------------

fn load_config(path: Option<&PathBuf>) -> AssemblyResult<AssemblyConfig> {
    let cfg = match path {
        Some(path) => {
            info!(path = %path.display(), "loading config");
            AssemblyConfig::from_file(path)?
        }
        None => AssemblyConfig::default(),
    };
    Ok(cfg)
}

fn build_env(cfg: AssemblyConfig) -> AssemblyResult<AssemblyEnv<GantryArm>> {
    let provider = GantryArm::new(cfg.sim.num_envs, cfg.sim.physics_dt, GantryParams::default());
    let meshes = AssetMeshes::from_config(&cfg.task)?;
    let curriculum = Curriculum::new(&cfg.task.curriculum)?;
    AssemblyEnv::new(provider, cfg, curriculum, &meshes)
}

fn run_headless(
    mut cfg: AssemblyConfig,
    episodes: u32,
    envs: Option<usize>,
    seed: Option<u64>,
    idle: bool,
) -> AssemblyResult<()> {
    if let Some(n) = envs {
        cfg.sim.num_envs = n;
    }
    if let Some(seed) = seed {
        cfg.sim.seed = seed;
    }
    let max_steps = cfg.sim.max_episode_length();

    let mut app = App::new();
    insert_env(&mut app, build_env(cfg)?)?;
    app.add_plugins(AssemblySimPlugin::<GantryArm>::new());
    if !idle {
        app.add_systems(Update, scripted_policy_system.in_set(AssemblySet::Policy));
    }
    app.finish();
    app.cleanup();

    for ep in 0..episodes {
        let done_before = app.world().resource::<TrainingStats>().episodes_completed;
        for _ in 0..max_steps {
            app.update();
            if app.world().resource::<TrainingStats>().episodes_completed > done_before {
                break;
            }
        }

        let stats = app.world().resource::<TrainingStats>();
        let status = app.world().resource::<CurriculumStatus>();
        println!(
            "episode {}: success_rate={:.3}, return={:.3}, max_disp={:.4}",
            ep + 1,
            stats.success_history.last().copied().unwrap_or(0.0),
            stats.return_history.last().copied().unwrap_or(0.0),
            status.max_disp,
        );
    }

    let stats = app.world().resource::<TrainingStats>();
    println!(
        "\ntotal: episodes={}, steps={}, mean_success={:.3}",
        stats.episodes_completed,
        stats.total_steps,
        stats.recent_success_rate(stats.success_history.len()).unwrap_or(0.0)
    );
    Ok(())
}

fn run_config() -> AssemblyResult<()> {
    print!("{}", AssemblyConfig::default().to_toml_string()?);
    Ok(())
}

fn run_info(cfg: AssemblyConfig) -> AssemblyResult<()> {
    let env = build_env(cfg)?;
    let cfg = env.config();

    println!("assembly v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("crates:");
    println!("  assembly-core     {}", env!("CARGO_PKG_VERSION"));
    println!("  assembly-env      {}", env!("CARGO_PKG_VERSION"));
    println!("  assembly-physics  {}", env!("CARGO_PKG_VERSION"));
    println!("  assembly-sim      {}", env!("CARGO_PKG_VERSION"));
    println!("  assembly-task     {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("provider:   {}", env.provider().name());
    println!("num_envs:   {}", env.num_envs());
    println!("control_dt: {:.4}s", cfg.sim.control_dt());
    println!("max_steps:  {}", cfg.sim.max_episode_length());
    println!(
        "obs:        {} ({})",
        env.policy_layout().dim(),
        cfg.obs_order.join(", ")
    );
    println!(
        "state:      {} ({})",
        env.critic_layout().dim(),
        cfg.state_order.join(", ")
    );
    println!();
    println!("edition: 2024");
    Ok(())
}

fn run(cli: Cli) -> AssemblyResult<()> {
    let cfg = load_config(cli.config.as_ref())?;
    match cli.command {
        Some(Commands::Headless {
            episodes,
            envs,
            seed,
            idle,
        }) => run_headless(cfg, episodes, envs, seed, idle),
        Some(Commands::Config) => run_config(),
        Some(Commands::Info) => run_info(cfg),
        // Default: one scripted episode
        None => run_headless(cfg, 1, None, None, false),
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err @ AssemblyError::Config(_)) => {
            error!(%err, "invalid configuration");
            ExitCode::from(2)
        }
        Err(err) => {
            error!(%err, "run failed");
            ExitCode::FAILURE
        }
    }
}
