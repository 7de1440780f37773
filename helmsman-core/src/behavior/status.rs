use serde::{Deserialize, Serialize};

use crate::objective::PlateauCheck;
use crate::refinery::LogicCase;

/// Behavior lifecycle
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AvoidMode {
    /// Watching the contact, not yet inside the outer distance
    Idle,
    /// Emitting a preference function every cycle
    Running,
    /// Finished with this contact; emits nothing further
    Complete,
}

impl Default for AvoidMode {
    fn default() -> Self {
        AvoidMode::Idle
    }
}

/// How the preference function is filled
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BuildStrategy {
    /// Evaluate every course/speed cell
    DirectGrid,
    /// Certified safe regions as plateaus, the rest evaluated
    Refinery,
    /// Three-axis grid with a collision depth, evaluated directly
    DepthGrid,
}

/// Why the behavior completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CompletionReason {
    FilterFailed,
    RangeOpened,
    ContactRetired,
}

/// Signals reported to the host after every cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BehaviorStatus {
    pub time: f64,
    pub mode: AvoidMode,
    /// Time the current mode was entered
    pub mode_since: f64,
    pub completion: Option<CompletionReason>,
    pub relevance: f64,
    pub range: f64,
    pub closing_speed: f64,
    /// A preference function was emitted this cycle
    pub avoiding: bool,
    pub strategy: Option<BuildStrategy>,
    /// Collision distance handed to the objective this cycle
    pub collision_distance: Option<f64>,
    pub logic_case: Option<LogicCase>,
    pub total_evals: usize,
    pub plateau_check: Option<PlateauCheck>,
    pub valid: Option<bool>,
    pub warnings: Vec<String>,
}

impl BehaviorStatus {
    /// Host-facing variable/value pairs, named the way the host posts them
    pub fn postings(&self, contact: &str) -> Vec<(String, String)> {
        let mut out = vec![
            (format!("RANGE_AVD_{}", contact), format!("{:.1}", self.range)),
            (
                format!("CLSG_SPD_AVD_{}", contact),
                format!("{:.1}", self.closing_speed),
            ),
            ("AVOIDING".to_string(), self.avoiding.to_string()),
            ("AVD_RELEVANCE".to_string(), format!("{:.3}", self.relevance)),
            ("AVD_TOTAL_EVALS".to_string(), self.total_evals.to_string()),
        ];
        if let Some(check) = &self.plateau_check {
            out.push(("PLATEAU_CHECK_OK".to_string(), check.ok().to_string()));
            if !check.ok() {
                out.push(("PLATEAU_WORST_FAIL".to_string(), check.worst_fail.to_string()));
            }
        }
        if let Some(case) = self.logic_case {
            out.push(("PLATEAU_LOGIC_CASE".to_string(), case.to_string()));
        }
        if let Some(valid) = self.valid {
            out.push(("VALID_CHECK_OK".to_string(), valid.to_string()));
        }
        out
    }
}
