//! Target presence states
//!
//! Reported states come from the perception side; the logical state set adds
//! the synthetic far state inferred from health stability.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Target state as reported by the observation source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetPresenceState {
    /// Nothing selected
    NoTarget,
    /// Selected target with an empty health bar
    DeadTarget,
    /// Selected target that still has health
    AliveTarget,
}

impl TargetPresenceState {
    /// Machine name used in logs and replay files
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetPresenceState::NoTarget => "no_target",
            TargetPresenceState::DeadTarget => "dead_target",
            TargetPresenceState::AliveTarget => "alive_target",
        }
    }

    /// Whether the engagement is over for this state
    pub fn ends_engagement(&self) -> bool {
        matches!(
            self,
            TargetPresenceState::NoTarget | TargetPresenceState::DeadTarget
        )
    }
}

impl fmt::Display for TargetPresenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetPresenceState {
    type Err = StateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "no_target" | "none" | "no" => Ok(TargetPresenceState::NoTarget),
            "dead_target" | "dead" => Ok(TargetPresenceState::DeadTarget),
            "alive_target" | "alive" => Ok(TargetPresenceState::AliveTarget),
            _ => Err(StateParseError(s.to_string())),
        }
    }
}

/// Logical states the controller binds command sequences to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalState {
    NoTarget,
    DeadTarget,
    AliveTarget,
    /// Alive target whose health has plateaued (out of range)
    FarTarget,
}

impl LogicalState {
    /// All logical states, in registry order
    pub const ALL: [LogicalState; 4] = [
        LogicalState::NoTarget,
        LogicalState::DeadTarget,
        LogicalState::AliveTarget,
        LogicalState::FarTarget,
    ];

    /// Slot of this state in fixed-size per-state tables
    pub(crate) fn index(self) -> usize {
        match self {
            LogicalState::NoTarget => 0,
            LogicalState::DeadTarget => 1,
            LogicalState::AliveTarget => 2,
            LogicalState::FarTarget => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalState::NoTarget => "no_target",
            LogicalState::DeadTarget => "dead_target",
            LogicalState::AliveTarget => "alive_target",
            LogicalState::FarTarget => "far_target",
        }
    }

    /// Whether the target is engaged (alive or far)
    pub fn is_engaged(&self) -> bool {
        matches!(self, LogicalState::AliveTarget | LogicalState::FarTarget)
    }
}

impl From<TargetPresenceState> for LogicalState {
    fn from(state: TargetPresenceState) -> Self {
        match state {
            TargetPresenceState::NoTarget => LogicalState::NoTarget,
            TargetPresenceState::DeadTarget => LogicalState::DeadTarget,
            TargetPresenceState::AliveTarget => LogicalState::AliveTarget,
        }
    }
}

impl fmt::Display for LogicalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognised reported-state label
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognised target state: {0:?}")]
pub struct StateParseError(pub String);
