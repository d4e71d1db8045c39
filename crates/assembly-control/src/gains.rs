//! Critically damped task-space gains and the default/reset gain schedule.

use assembly_core::config::CtrlConfig;
use assembly_core::error::ConfigError;
use assembly_core::types::TaskVector;

// ---------------------------------------------------------------------------
// TaskGains
// ---------------------------------------------------------------------------

/// Proportional gains and the derivative gains derived from them.
///
/// `deriv = 2 * sqrt(prop)`, with the rotational part divided by
/// `rot_deriv_scale`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaskGains {
    prop: TaskVector,
    deriv: TaskVector,
}

impl TaskGains {
    pub fn new(prop: [f32; 6], rot_deriv_scale: f32) -> Result<Self, ConfigError> {
        if let Some((index, value)) = prop
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite() || **v < 0.0)
        {
            return Err(ConfigError::InvalidGain {
                index,
                value: *value,
            });
        }
        if !(rot_deriv_scale.is_finite() && rot_deriv_scale > 0.0) {
            return Err(ConfigError::invalid(
                "rot_deriv_scale",
                format!("{rot_deriv_scale} (must be > 0)"),
            ));
        }
        let prop = TaskVector::from_row_slice(&prop);
        let mut deriv = prop.map(|k| 2.0 * k.sqrt());
        for k in 3..6 {
            deriv[k] /= rot_deriv_scale;
        }
        Ok(Self { prop, deriv })
    }

    pub const fn prop(&self) -> &TaskVector {
        &self.prop
    }

    pub const fn deriv(&self) -> &TaskVector {
        &self.deriv
    }
}

// ---------------------------------------------------------------------------
// GainSchedule
// ---------------------------------------------------------------------------

/// Which gain set is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GainMode {
    #[default]
    Default,
    /// Stiffer rotational damping used while a reset closes the gripper.
    Reset,
}

/// The two gain sets, swapped explicitly.
#[derive(Debug, Clone, PartialEq)]
pub struct GainSchedule {
    default: TaskGains,
    reset: TaskGains,
    mode: GainMode,
}

impl GainSchedule {
    pub const fn new(default: TaskGains, reset: TaskGains) -> Self {
        Self {
            default,
            reset,
            mode: GainMode::Default,
        }
    }

    pub fn from_config(cfg: &CtrlConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(
            TaskGains::new(cfg.default_task_prop_gains, cfg.default_rot_deriv_scale)?,
            TaskGains::new(cfg.reset_task_prop_gains, cfg.reset_rot_deriv_scale)?,
        ))
    }

    pub const fn active(&self) -> &TaskGains {
        match self.mode {
            GainMode::Default => &self.default,
            GainMode::Reset => &self.reset,
        }
    }

    pub const fn mode(&self) -> GainMode {
        self.mode
    }

    pub fn use_reset(&mut self) {
        self.mode = GainMode::Reset;
    }

    pub fn use_default(&mut self) {
        self.mode = GainMode::Default;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn derivative_gains_are_critically_damped() {
        let gains = TaskGains::new([1000.0, 1000.0, 1000.0, 50.0, 50.0, 50.0], 1.0).unwrap();
        assert_relative_eq!(gains.deriv()[0], 2.0 * 1000.0f32.sqrt());
        assert_relative_eq!(gains.deriv()[4], 2.0 * 50.0f32.sqrt());
    }

    #[test]
    fn rot_deriv_scale_only_touches_rotation() {
        let gains = TaskGains::new([1000.0, 1000.0, 1000.0, 50.0, 50.0, 50.0], 10.0).unwrap();
        assert_relative_eq!(gains.deriv()[2], 2.0 * 1000.0f32.sqrt());
        assert_relative_eq!(gains.deriv()[5], 2.0 * 50.0f32.sqrt() / 10.0);
    }

    #[test]
    fn rejects_negative_gain() {
        let err = TaskGains::new([1.0, 1.0, -1.0, 1.0, 1.0, 1.0], 1.0).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidGain { index: 2, .. }));
    }

    #[test]
    fn rejects_zero_rot_deriv_scale() {
        assert!(TaskGains::new([1.0; 6], 0.0).is_err());
    }

    #[test]
    fn schedule_swaps_explicitly() {
        let mut schedule = GainSchedule::from_config(&CtrlConfig::default()).unwrap();
        assert_eq!(schedule.mode(), GainMode::Default);
        let default_kd = schedule.active().deriv()[3];
        schedule.use_reset();
        assert_eq!(schedule.mode(), GainMode::Reset);
        assert_relative_eq!(schedule.active().deriv()[3], default_kd / 10.0);
        schedule.use_default();
        assert_relative_eq!(schedule.active().deriv()[3], default_kd);
    }
}
