//! Success-based curriculum over the plug's initial insertion depth.

use assembly_core::config::{CurriculumConfig, RewardScaleShape};
use assembly_core::error::ConfigError;
use rand::Rng;
use tracing::debug;

/// Direction of the last curriculum update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurriculumStep {
    Tightened,
    Loosened,
    Unchanged,
}

/// Owner of the difficulty scalar `max_disp`.
///
/// `max_disp` is the largest downward displacement of the plug from the
/// socket tip at reset. Lower is harder. It stays within
/// `[bound_low, bound_high]` and changes only through [`update`].
///
/// [`update`]: Curriculum::update
#[derive(Debug, Clone, PartialEq)]
pub struct Curriculum {
    enabled: bool,
    max_disp: f32,
    bound_low: f32,
    bound_high: f32,
    success_threshold: f32,
    failure_threshold: f32,
    tighten_step: f32,
    loosen_step: f32,
    shape: RewardScaleShape,
    updates: u64,
}

impl Curriculum {
    /// Validate `cfg` and build the curriculum from it.
    pub fn new(cfg: &CurriculumConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        Ok(Self::from_validated(cfg))
    }

    /// Requires `height_bound[0] <= height_bound[1]`, both finite.
    fn from_validated(cfg: &CurriculumConfig) -> Self {
        let [bound_low, bound_high] = cfg.height_bound;
        let [tighten_step, loosen_step] = cfg.height_step;
        let start = if cfg.enabled {
            cfg.initial_max_disp
        } else {
            bound_low
        };
        Self {
            enabled: cfg.enabled,
            max_disp: start.clamp(bound_low, bound_high),
            bound_low,
            bound_high,
            success_threshold: cfg.success_threshold,
            failure_threshold: cfg.failure_threshold,
            tighten_step,
            loosen_step,
            shape: cfg.reward_scale_shape,
            updates: 0,
        }
    }

    pub const fn enabled(&self) -> bool {
        self.enabled
    }

    pub const fn max_disp(&self) -> f32 {
        self.max_disp
    }

    pub const fn bounds(&self) -> (f32, f32) {
        (self.bound_low, self.bound_high)
    }

    /// Number of updates applied so far.
    pub const fn updates(&self) -> u64 {
        self.updates
    }

    /// Adjust `max_disp` from a batch success rate. NaN counts as 0.
    pub fn update(&mut self, success_rate: f32) -> CurriculumStep {
        let rate = if success_rate.is_nan() {
            0.0
        } else {
            success_rate.clamp(0.0, 1.0)
        };
        let (step, delta) = if rate >= self.success_threshold {
            (CurriculumStep::Tightened, self.tighten_step)
        } else if rate <= self.failure_threshold {
            (CurriculumStep::Loosened, self.loosen_step)
        } else {
            (CurriculumStep::Unchanged, 0.0)
        };
        self.max_disp = (self.max_disp + delta).clamp(self.bound_low, self.bound_high);
        self.updates += 1;
        debug!(rate, max_disp = self.max_disp, ?step, "curriculum update");
        step
    }

    /// Reward multiplier in `[0, 1]`, non-decreasing in `max_disp`.
    pub fn reward_scale(&self) -> f32 {
        self.reward_scale_at(self.max_disp)
    }

    pub fn reward_scale_at(&self, max_disp: f32) -> f32 {
        let span = self.bound_high - self.bound_low;
        if span <= 0.0 {
            return 1.0;
        }
        let t = ((max_disp - self.bound_low) / span).clamp(0.0, 1.0);
        match self.shape {
            RewardScaleShape::Linear => t,
            RewardScaleShape::Smoothstep => t * t * (3.0 - 2.0 * t),
        }
    }

    /// Displacement for one reset, uniform in `[bound_low, max_disp]`.
    pub fn sample_displacement<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        let u: f32 = rng.r#gen();
        self.bound_low + (self.max_disp - self.bound_low) * u
    }
}

impl Default for Curriculum {
    fn default() -> Self {
        Self::from_validated(&CurriculumConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use assembly_test_utils::seeded_rng;
    use proptest::prelude::*;

    #[test]
    fn starts_at_initial_when_enabled() {
        let c = Curriculum::default();
        assert_relative_eq!(c.max_disp(), 0.01);
    }

    #[test]
    fn starts_at_low_bound_when_disabled() {
        let cfg = CurriculumConfig {
            enabled: false,
            ..CurriculumConfig::default()
        };
        assert_relative_eq!(Curriculum::new(&cfg).unwrap().max_disp(), -0.01);
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let cfg = CurriculumConfig {
            height_bound: [0.01, -0.01],
            ..CurriculumConfig::default()
        };
        assert!(matches!(
            Curriculum::new(&cfg),
            Err(ConfigError::CurriculumBoundsInverted { .. })
        ));
    }

    #[test]
    fn nan_bound_is_rejected() {
        let cfg = CurriculumConfig {
            height_bound: [f32::NAN, 0.01],
            ..CurriculumConfig::default()
        };
        assert!(matches!(
            Curriculum::new(&cfg),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn default_matches_validated_default_config() {
        let built = Curriculum::new(&CurriculumConfig::default()).unwrap();
        assert_eq!(built, Curriculum::default());
    }

    #[test]
    fn high_success_tightens() {
        let mut c = Curriculum::default();
        assert_eq!(c.update(1.0), CurriculumStep::Tightened);
        assert_relative_eq!(c.max_disp(), 0.005, epsilon = 1e-6);
    }

    #[test]
    fn failure_loosens_and_saturates() {
        let mut c = Curriculum::default();
        assert_eq!(c.update(0.0), CurriculumStep::Loosened);
        assert_relative_eq!(c.max_disp(), 0.01);
    }

    #[test]
    fn between_thresholds_is_unchanged() {
        let mut c = Curriculum::default();
        let mid = (c.success_threshold + c.failure_threshold) / 2.0;
        assert_eq!(c.update(mid), CurriculumStep::Unchanged);
        assert_relative_eq!(c.max_disp(), 0.01);
    }

    #[test]
    fn nan_rate_counts_as_failure() {
        let mut c = Curriculum::default();
        c.update(1.0);
        assert_eq!(c.update(f32::NAN), CurriculumStep::Loosened);
    }

    #[test]
    fn repeated_success_hits_low_bound() {
        let mut c = Curriculum::default();
        for _ in 0..20 {
            c.update(1.0);
        }
        assert_relative_eq!(c.max_disp(), -0.01);
        assert_eq!(c.updates(), 20);
    }

    #[test]
    fn reward_scale_spans_unit_interval() {
        let c = Curriculum::default();
        assert_relative_eq!(c.reward_scale_at(-0.01), 0.0);
        assert_relative_eq!(c.reward_scale_at(0.0), 0.5);
        assert_relative_eq!(c.reward_scale_at(0.01), 1.0);
    }

    #[test]
    fn degenerate_bounds_scale_to_one() {
        let cfg = CurriculumConfig {
            height_bound: [0.0, 0.0],
            initial_max_disp: 0.0,
            ..CurriculumConfig::default()
        };
        assert_relative_eq!(Curriculum::new(&cfg).unwrap().reward_scale(), 1.0);
    }

    #[test]
    fn displacement_samples_stay_in_range() {
        let mut c = Curriculum::default();
        c.update(1.0);
        let mut rng = seeded_rng(3);
        for _ in 0..500 {
            let d = c.sample_displacement(&mut rng);
            assert!((-0.01..=c.max_disp()).contains(&d), "{d}");
        }
    }

    proptest! {
        #[test]
        fn bounds_hold_after_any_updates(rates in proptest::collection::vec(-0.5f32..1.5, 0..40)) {
            let mut c = Curriculum::default();
            for r in rates {
                c.update(r);
                prop_assert!(c.max_disp() >= -0.01 && c.max_disp() <= 0.01);
            }
        }

        #[test]
        fn reward_scale_is_monotone(a in -0.02f32..0.02, b in -0.02f32..0.02, smooth in any::<bool>()) {
            let cfg = CurriculumConfig {
                reward_scale_shape: if smooth {
                    RewardScaleShape::Smoothstep
                } else {
                    RewardScaleShape::Linear
                },
                ..CurriculumConfig::default()
            };
            let c = Curriculum::new(&cfg).unwrap();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let (s_lo, s_hi) = (c.reward_scale_at(lo), c.reward_scale_at(hi));
            prop_assert!(s_lo <= s_hi);
            prop_assert!((0.0..=1.0).contains(&s_lo) && (0.0..=1.0).contains(&s_hi));
        }
    }
}
