//! Held and fixed part meshes, loaded from OBJ files or built from the
//! configured dimensions.

use assembly_core::config::TaskConfig;
use assembly_geometry::{DEFAULT_SEGMENTS, GeometryResult, TriMesh};
use tracing::info;

/// Wall thickness of the generated socket, as a multiple of the hole radius.
const SOCKET_OUTER_FACTOR: f32 = 3.0;
/// Solid material below the generated socket's hole floor (m).
const SOCKET_FLOOR: f32 = 0.005;

#[derive(Debug, Clone)]
pub struct AssetMeshes {
    /// Plug, origin at its bottom face.
    pub held: TriMesh,
    /// Socket, origin at the hole floor.
    pub fixed: TriMesh,
}

impl AssetMeshes {
    pub fn from_config(task: &TaskConfig) -> GeometryResult<Self> {
        let held = match &task.held_asset.mesh_path {
            Some(path) => {
                info!(path = %path, "loading held mesh");
                TriMesh::from_obj_file(path)?
            }
            None => TriMesh::cylinder(
                task.held_asset.diameter / 2.0,
                task.held_asset.height,
                DEFAULT_SEGMENTS,
            )?,
        };
        let fixed = match &task.fixed_asset.mesh_path {
            Some(path) => {
                info!(path = %path, "loading fixed mesh");
                TriMesh::from_obj_file(path)?
            }
            None => {
                let hole = task.fixed_asset.diameter / 2.0;
                TriMesh::socket(
                    hole,
                    hole * SOCKET_OUTER_FACTOR,
                    task.fixed_asset.tip_height(),
                    SOCKET_FLOOR,
                    DEFAULT_SEGMENTS,
                )?
            }
        };
        Ok(Self { held, fixed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assembly_geometry::GeometryError;

    #[test]
    fn primitives_match_configured_dimensions() {
        let task = TaskConfig::default();
        let meshes = AssetMeshes::from_config(&task).unwrap();
        let (lo, hi) = meshes.held.bounds();
        assert!((hi.z - lo.z - task.held_asset.height).abs() < 1e-6);
        let (lo, hi) = meshes.fixed.bounds();
        assert!((hi.z - task.fixed_asset.tip_height()).abs() < 1e-6);
        assert!((lo.z + SOCKET_FLOOR).abs() < 1e-6);
    }

    #[test]
    fn missing_obj_file_is_io_error() {
        let mut task = TaskConfig::default();
        task.held_asset.mesh_path = Some("/nonexistent/plug.obj".into());
        assert!(matches!(
            AssetMeshes::from_config(&task),
            Err(GeometryError::Io(_))
        ));
    }
}
