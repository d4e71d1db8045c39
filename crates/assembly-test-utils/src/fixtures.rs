//! Geometry, configuration, and state builders shared across test suites.

use assembly_core::config::AssemblyConfig;
use assembly_core::types::PoseState;
use assembly_geometry::TriMesh;
use nalgebra::{UnitQuaternion, Vector3};

/// Cylinder plug matching the default held asset, origin at its bottom face.
pub fn plug_mesh() -> TriMesh {
    let cfg = AssemblyConfig::default();
    TriMesh::cylinder(
        cfg.task.held_asset.diameter / 2.0,
        cfg.task.held_asset.height,
        16,
    )
    .expect("plug primitive dimensions are positive")
}

/// Socket matching the default fixed asset, origin at the hole floor.
pub fn socket_mesh() -> TriMesh {
    let cfg = AssemblyConfig::default();
    let hole = cfg.task.fixed_asset.diameter / 2.0;
    TriMesh::socket(hole, hole * 3.0, cfg.task.fixed_asset.tip_height(), 0.005, 16)
        .expect("socket primitive dimensions are positive")
}

/// Default configuration shrunk to `num_envs` instances and a light
/// proximity sample count.
pub fn small_config(num_envs: usize) -> AssemblyConfig {
    let mut cfg = AssemblyConfig::default();
    cfg.sim.num_envs = num_envs;
    cfg.sim.seed = 7;
    cfg.task.num_mesh_sample_points = 64;
    cfg
}

/// Pose from a position and a yaw angle.
pub fn pose(x: f32, y: f32, z: f32, yaw: f32) -> PoseState {
    PoseState::new(
        Vector3::new(x, y, z),
        UnitQuaternion::from_euler_angles(0.0, 0.0, yaw),
    )
}
