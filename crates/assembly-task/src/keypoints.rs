//! Keypoints along the insertion axis, used to measure alignment.

use assembly_core::error::ValidationError;
use assembly_core::types::PoseState;
use nalgebra::Vector3;

/// `count` offsets along local z at `linspace(0, 1, count) - 0.5`, times
/// `scale`.
pub fn keypoint_offsets(count: usize, scale: f32) -> Vec<Vector3<f32>> {
    (0..count)
        .map(|i| {
            let t = if count > 1 {
                i as f32 / (count - 1) as f32
            } else {
                0.0
            };
            Vector3::new(0.0, 0.0, (t - 0.5) * scale)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// KeypointSet
// ---------------------------------------------------------------------------

/// World-frame keypoints attached to one pose.
#[derive(Debug, Clone, PartialEq)]
pub struct KeypointSet {
    points: Vec<Vector3<f32>>,
}

impl KeypointSet {
    pub fn on_pose(pose: &PoseState, offsets: &[Vector3<f32>]) -> Self {
        Self {
            points: offsets.iter().map(|o| pose.transform_point(o)).collect(),
        }
    }

    pub fn points(&self) -> &[Vector3<f32>] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Mean point-to-point distance to `other`; zero for empty sets.
    pub fn mean_distance(&self, other: &Self) -> Result<f32, ValidationError> {
        if self.len() != other.len() {
            return Err(ValidationError::KeypointCountMismatch {
                held: self.len(),
                fixed: other.len(),
            });
        }
        if self.is_empty() {
            return Ok(0.0);
        }
        let sum: f32 = self
            .points
            .iter()
            .zip(&other.points)
            .map(|(a, b)| (a - b).norm())
            .sum();
        Ok(sum / self.len() as f32)
    }
}

// ---------------------------------------------------------------------------
// KeypointLayout
// ---------------------------------------------------------------------------

/// Shared offsets for the held and fixed keypoint sets.
#[derive(Debug, Clone, PartialEq)]
pub struct KeypointLayout {
    offsets: Vec<Vector3<f32>>,
}

impl KeypointLayout {
    pub fn new(count: usize, scale: f32) -> Self {
        Self {
            offsets: keypoint_offsets(count, scale),
        }
    }

    pub fn offsets(&self) -> &[Vector3<f32>] {
        &self.offsets
    }

    /// Mean distance between keypoints on the held part and on its mated
    /// target, the fixed part's frame.
    pub fn alignment_error(&self, held: &PoseState, fixed: &PoseState) -> f32 {
        let held = KeypointSet::on_pose(held, &self.offsets);
        let fixed = KeypointSet::on_pose(fixed, &self.offsets);
        // Both sets share `offsets`, so their sizes always agree.
        held.mean_distance(&fixed).unwrap_or(f32::INFINITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
