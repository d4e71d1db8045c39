//! Dense proximity shaping plus sparse engagement and success bonuses.

use assembly_core::config::{DistanceAggregate, ProximityConfig, Squash};
use assembly_core::types::PoseState;
use assembly_geometry::{GeometryResult, ProximityQuery, SurfaceSampler, TriMesh};
use nalgebra::Vector3;
use rand::Rng;

use crate::curriculum::Curriculum;

/// Bounded, strictly decreasing map from a non-negative distance to reward.
pub fn squash(kind: &Squash, distance: f32) -> f32 {
    match *kind {
        Squash::Kernel { a, b } => 1.0 / ((-a * distance).exp() + b + (a * distance).exp()),
        Squash::Exponential { scale } => (-distance / scale).exp(),
    }
}

// ---------------------------------------------------------------------------
// ProximityReward
// ---------------------------------------------------------------------------

/// Held-part surface samples scored against the fixed part's surface.
#[derive(Debug, Clone)]
pub struct ProximityReward {
    samples: Vec<Vector3<f32>>,
    query: ProximityQuery,
    config: ProximityConfig,
}

impl ProximityReward {
    /// Sample `count` points on `held` once and index `fixed` for queries.
    pub fn new<R: Rng + ?Sized>(
        held: &TriMesh,
        fixed: &TriMesh,
        count: usize,
        config: ProximityConfig,
        rng: &mut R,
    ) -> GeometryResult<Self> {
        let samples = SurfaceSampler::new(held)?.sample(rng, count);
        Ok(Self::from_parts(samples, ProximityQuery::new(fixed), config))
    }

    pub fn from_parts(
        samples: Vec<Vector3<f32>>,
        query: ProximityQuery,
        config: ProximityConfig,
    ) -> Self {
        Self {
            samples,
            query,
            config,
        }
    }

    pub fn samples(&self) -> &[Vector3<f32>] {
        &self.samples
    }

    /// Aggregated surface distance; infinite without samples.
    pub fn distance(&self, held: &PoseState, fixed: &PoseState) -> f32 {
        let distances = self.samples.iter().map(|s| {
            let world = held.transform_point(s);
            self.query.distance_to(&fixed.inverse_transform_point(&world))
        });
        match self.config.aggregate {
            DistanceAggregate::Min => distances.fold(f32::INFINITY, f32::min),
            DistanceAggregate::Mean => {
                if self.samples.is_empty() {
                    f32::INFINITY
                } else {
                    distances.sum::<f32>() / self.samples.len() as f32
                }
            }
        }
    }

    pub fn evaluate(&self, held: &PoseState, fixed: &PoseState) -> f32 {
        squash(&self.config.squash, self.distance(held, fixed))
    }
}

// ---------------------------------------------------------------------------
// RewardEngine
// ---------------------------------------------------------------------------

/// Per-instance reward decomposition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardTerms {
    pub proximity: f32,
    pub engaged: f32,
    pub success: f32,
    /// Curriculum multiplier; 1 when the curriculum is disabled.
    pub scale: f32,
}

impl RewardTerms {
    pub fn total(&self) -> f32 {
        (self.proximity + self.engaged + self.success) * self.scale
    }
}

/// Batch means of the unscaled reward terms.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RewardSummary {
    pub proximity: f32,
    pub engaged: f32,
    pub success: f32,
}

impl RewardSummary {
    pub fn from_terms(terms: &[RewardTerms]) -> Self {
        if terms.is_empty() {
            return Self::default();
        }
        let n = terms.len() as f32;
        let (p, e, s) = terms.iter().fold((0.0, 0.0, 0.0), |(p, e, s), t| {
            (p + t.proximity, e + t.engaged, s + t.success)
        });
        Self {
            proximity: p / n,
            engaged: e / n,
            success: s / n,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RewardEngine {
    proximity: ProximityReward,
}

impl RewardEngine {
    pub const fn new(proximity: ProximityReward) -> Self {
        Self { proximity }
    }

    pub const fn proximity(&self) -> &ProximityReward {
        &self.proximity
    }

    pub fn compute(
        &self,
        held: &PoseState,
        fixed: &PoseState,
        engaged: bool,
        success: bool,
        curriculum: &Curriculum,
    ) -> RewardTerms {
        RewardTerms {
            proximity: self.proximity.evaluate(held, fixed),
            engaged: f32::from(u8::from(engaged)),
            success: f32::from(u8::from(success)),
            scale: if curriculum.enabled() {
                curriculum.reward_scale()
            } else {
                1.0
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
