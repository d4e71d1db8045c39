//! Geometry for the proximity reward: triangle meshes of the held and fixed
//! parts, area-weighted surface sampling, and nearest-surface queries.
//!
//! # Architecture
//!
//! ```text
//! TriMesh (held)  ──► SurfaceSampler ──► local surface points (once)
//! TriMesh (fixed) ──► ProximityQuery ──► unsigned distance (every step)
//! ```

pub mod error;
pub mod mesh;
pub mod query;
pub mod sampler;

pub use error::{GeometryError, GeometryResult};
pub use mesh::{DEFAULT_SEGMENTS, TriMesh};
pub use query::{ProximityQuery, closest_point_on_triangle};
pub use sampler::SurfaceSampler;
