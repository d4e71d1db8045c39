//! Named observation fields assembled into policy and critic vectors.

use std::fmt;
use std::str::FromStr;

use assembly_core::error::ConfigError;
use assembly_core::math::quat_wxyz;
use assembly_core::types::{JointVector, PoseState};
use nalgebra::{UnitQuaternion, Vector3};

// ---------------------------------------------------------------------------
// ObsField
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObsField {
    JointPos,
    JointVel,
    FingertipPos,
    FingertipQuat,
    EeLinvel,
    EeAngvel,
    FingertipGoalPos,
    FingertipGoalQuat,
    HeldPos,
    HeldQuat,
    DeltaPos,
}

impl ObsField {
    pub const ALL: [Self; 11] = [
        Self::JointPos,
        Self::JointVel,
        Self::FingertipPos,
        Self::FingertipQuat,
        Self::EeLinvel,
        Self::EeAngvel,
        Self::FingertipGoalPos,
        Self::FingertipGoalQuat,
        Self::HeldPos,
        Self::HeldQuat,
        Self::DeltaPos,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::JointPos => "joint_pos",
            Self::JointVel => "joint_vel",
            Self::FingertipPos => "fingertip_pos",
            Self::FingertipQuat => "fingertip_quat",
            Self::EeLinvel => "ee_linvel",
            Self::EeAngvel => "ee_angvel",
            Self::FingertipGoalPos => "fingertip_goal_pos",
            Self::FingertipGoalQuat => "fingertip_goal_quat",
            Self::HeldPos => "held_pos",
            Self::HeldQuat => "held_quat",
            Self::DeltaPos => "delta_pos",
        }
    }

    pub const fn dim(self) -> usize {
        match self {
            Self::JointPos | Self::JointVel => 7,
            Self::FingertipQuat | Self::FingertipGoalQuat | Self::HeldQuat => 4,
            _ => 3,
        }
    }

    /// Whether the policy vector may carry this field. The critic carries
    /// every field.
    pub const fn in_policy(self) -> bool {
        matches!(
            self,
            Self::JointPos
                | Self::FingertipPos
                | Self::FingertipQuat
                | Self::FingertipGoalPos
                | Self::FingertipGoalQuat
                | Self::DeltaPos
        )
    }
}

impl fmt::Display for ObsField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ObsField {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| ConfigError::UnknownObservationField(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// ObsVector
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObsVector {
    Policy,
    Critic,
}

impl ObsVector {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Policy => "policy",
            Self::Critic => "critic",
        }
    }

    pub const fn allows(self, field: ObsField) -> bool {
        match self {
            Self::Policy => field.in_policy(),
            Self::Critic => true,
        }
    }
}

// ---------------------------------------------------------------------------
// ObsFrame
// ---------------------------------------------------------------------------

/// Per-instance quantities every observation field is read from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObsFrame {
    pub joint_pos: JointVector,
    pub joint_vel: JointVector,
    pub fingertip: PoseState,
    pub ee_linvel: Vector3<f32>,
    pub ee_angvel: Vector3<f32>,
    pub goal_pos: Vector3<f32>,
    pub goal_quat: UnitQuaternion<f32>,
    pub held: PoseState,
}

impl ObsFrame {
    fn write(&self, field: ObsField, out: &mut Vec<f32>) {
        match field {
            ObsField::JointPos => out.extend(self.joint_pos.iter()),
            ObsField::JointVel => out.extend(self.joint_vel.iter()),
            ObsField::FingertipPos => out.extend(self.fingertip.position.iter()),
            ObsField::FingertipQuat => out.extend(self.fingertip.quat_wxyz()),
            ObsField::EeLinvel => out.extend(self.ee_linvel.iter()),
            ObsField::EeAngvel => out.extend(self.ee_angvel.iter()),
            ObsField::FingertipGoalPos => out.extend(self.goal_pos.iter()),
            ObsField::FingertipGoalQuat => out.extend(quat_wxyz(&self.goal_quat)),
            ObsField::HeldPos => out.extend(self.held.position.iter()),
            ObsField::HeldQuat => out.extend(self.held.quat_wxyz()),
            ObsField::DeltaPos => out.extend((self.goal_pos - self.fingertip.position).iter()),
        }
    }
}

// ---------------------------------------------------------------------------
// ObservationLayout
// ---------------------------------------------------------------------------

/// Validated field order for one observation vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationLayout {
    vector: ObsVector,
    fields: Vec<ObsField>,
    dim: usize,
}

impl ObservationLayout {
    pub fn new<S: AsRef<str>>(vector: ObsVector, names: &[S]) -> Result<Self, ConfigError> {
        let fields = names
            .iter()
            .map(|name| {
                let field: ObsField = name.as_ref().parse()?;
                if vector.allows(field) {
                    Ok(field)
                } else {
                    Err(ConfigError::FieldNotAvailable {
                        field: field.name().to_string(),
                        vector: vector.name(),
                    })
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        let dim = fields.iter().map(|f| f.dim()).sum();
        Ok(Self {
            vector,
            fields,
            dim,
        })
    }

    pub const fn vector(&self) -> ObsVector {
        self.vector
    }

    pub fn fields(&self) -> &[ObsField] {
        &self.fields
    }

    pub const fn dim(&self) -> usize {
        self.dim
    }

    /// Start index of the first occurrence of `field`.
    pub fn offset_of(&self, field: ObsField) -> Option<usize> {
        let mut offset = 0;
        for f in &self.fields {
            if *f == field {
                return Some(offset);
            }
            offset += f.dim();
        }
        None
    }

    pub fn assemble(&self, frame: &ObsFrame) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.dim);
        for field in &self.fields {
            frame.write(*field, &mut out);
        }
        out
    }

    pub fn assemble_batch(&self, frames: &[ObsFrame]) -> Vec<Vec<f32>> {
        frames.iter().map(|f| self.assemble(f)).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
