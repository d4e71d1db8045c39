//! Task logic for peg-in-hole insertion.
//!
//! Keypoint alignment, the engagement/success classifier, the
//! success-driven [`Curriculum`], the [`RewardEngine`], and the observation
//! layouts consumed by the policy and critic.

pub mod classifier;
pub mod curriculum;
pub mod keypoints;
pub mod observation;
pub mod reward;

pub use classifier::{InsertionClassifier, InsertionState};
pub use curriculum::{Curriculum, CurriculumStep};
pub use keypoints::{KeypointLayout, KeypointSet, keypoint_offsets};
pub use observation::{ObsField, ObsFrame, ObsVector, ObservationLayout};
pub use reward::{ProximityReward, RewardEngine, RewardSummary, RewardTerms, squash};
