//! Area-weighted uniform sampling of points on a mesh surface.

use nalgebra::{Point3, Vector3};
use rand::Rng;
use rand::SeedableRng;
use rand::distributions::{Distribution, WeightedIndex};
use rand_chacha::ChaCha8Rng;

use crate::error::{GeometryError, GeometryResult};
use crate::mesh::TriMesh;

/// Draws points uniformly over a mesh surface.
///
/// Faces are picked with probability proportional to their area, then a
/// point is drawn uniformly inside the face.
#[derive(Debug, Clone)]
pub struct SurfaceSampler {
    triangles: Vec<[Point3<f32>; 3]>,
    weights: WeightedIndex<f32>,
}

impl SurfaceSampler {
    pub fn new(mesh: &TriMesh) -> GeometryResult<Self> {
        let triangles: Vec<_> = (0..mesh.face_count()).map(|i| mesh.triangle(i)).collect();
        let areas: Vec<f32> = (0..mesh.face_count())
            .map(|i| mesh.triangle_area(i))
            .collect();
        let weights = WeightedIndex::new(&areas).map_err(|_| GeometryError::ZeroArea)?;
        Ok(Self { triangles, weights })
    }

    /// Draw `count` surface points in the mesh's local frame.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, count: usize) -> Vec<Vector3<f32>> {
        (0..count)
            .map(|_| {
                let [a, b, c] = &self.triangles[self.weights.sample(rng)];
                let r1: f32 = rng.r#gen();
                let r2: f32 = rng.r#gen();
                let s = r1.sqrt();
                a.coords * (1.0 - s) + b.coords * (s * (1.0 - r2)) + c.coords * (s * r2)
            })
            .collect()
    }

    /// Deterministic sampling driven by a `ChaCha8Rng` seeded from `seed`.
    pub fn sample_seeded(&self, seed: u64, count: usize) -> Vec<Vector3<f32>> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        self.sample(&mut rng, count)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
