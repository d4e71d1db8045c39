//! Engagement and success classification for an insertion.

use assembly_core::config::TaskConfig;

/// Per-instance inputs, recomputed every step and never cached across
/// classifier calls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InsertionState {
    /// Held-part origin height.
    pub held_z: f32,
    /// Fixed-part origin height.
    pub fixed_z: f32,
    /// Mean held-to-target keypoint distance.
    pub keypoint_dist: f32,
    /// Steps elapsed in the current episode.
    pub elapsed_steps: u32,
}

/// `held_z < fixed_z + height_thresh`, keypoints closer than
/// `close_error_thresh` on average, and at least one step elapsed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InsertionClassifier {
    pub engage_height_thresh: f32,
    pub success_height_thresh: f32,
    pub close_error_thresh: f32,
}

impl InsertionClassifier {
    pub fn from_config(cfg: &TaskConfig) -> Self {
        Self {
            engage_height_thresh: cfg.engage_height_thresh,
            success_height_thresh: cfg.success_height_thresh,
            close_error_thresh: cfg.close_error_thresh,
        }
    }

    pub fn is_inserted(&self, state: &InsertionState, height_thresh: f32) -> bool {
        let below = state.held_z < state.fixed_z + height_thresh;
        let centered = state.keypoint_dist < self.close_error_thresh;
        below && centered && state.elapsed_steps > 0
    }

    pub fn engaged(&self, state: &InsertionState) -> bool {
        self.is_inserted(state, self.engage_height_thresh)
    }

    pub fn succeeded(&self, state: &InsertionState) -> bool {
        self.is_inserted(state, self.success_height_thresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn classifier() -> InsertionClassifier {
        InsertionClassifier::from_config(&TaskConfig::default())
    }

    fn state(held_z: f32, keypoint_dist: f32, elapsed_steps: u32) -> InsertionState {
        InsertionState {
            held_z,
            fixed_z: 0.05,
            keypoint_dist,
            elapsed_steps,
        }
    }

    #[test]
    fn mated_pose_is_engaged_and_successful() {
        let s = state(0.05, 0.0, 1);
        assert!(classifier().engaged(&s));
        assert!(classifier().succeeded(&s));
    }

    #[test]
    fn first_step_is_never_positive() {
        let s = state(0.05, 0.0, 0);
        assert!(!classifier().engaged(&s));
        assert!(!classifier().succeeded(&s));
    }

    #[test]
    fn between_thresholds_is_engaged_only() {
        // 5 mm above the fixed origin: past the 3 mm success bound, inside
        // the 10 mm engagement bound.
        let s = state(0.055, 0.005, 3);
        assert!(classifier().engaged(&s));
        assert!(!classifier().succeeded(&s));
    }

    #[test]
    fn far_above_is_neither() {
        let s = state(0.07, 0.02, 3);
        assert!(!classifier().engaged(&s));
        assert!(!classifier().succeeded(&s));
    }

    #[test]
    fn misaligned_is_neither() {
        let s = state(0.05, 0.02, 3);
        assert!(!classifier().engaged(&s));
    }

    #[test]
    fn aligned_part_above_success_bound_engages_once_loosened() {
        let c = InsertionClassifier {
            engage_height_thresh: 0.01,
            success_height_thresh: 0.003,
            close_error_thresh: 0.015,
        };

        // 2 cm above the success bound, every other axis aligned.
        let high = state(0.05 + 0.003 + 0.02, 0.0, 1);
        assert!(!c.succeeded(&high));
        assert!(!c.is_inserted(&high, 0.003));

        // Same aligned inputs, now under the 1 cm engagement bound.
        let low = state(0.05 + 0.008, 0.0, 1);
        assert!(!c.succeeded(&low));
        assert!(c.engaged(&low));
        assert!(c.is_inserted(&low, 0.01));
        assert!(!c.is_inserted(&low, 0.003));
    }

    proptest! {
        #[test]
        fn success_implies_engagement(
            dz in -0.05f32..0.05,
            dist in 0.0f32..0.03,
            steps in 0u32..100,
        ) {
            let s = state(0.05 + dz, dist, steps);
            let c = classifier();
            prop_assert!(!c.succeeded(&s) || c.engaged(&s));
        }
    }
}
