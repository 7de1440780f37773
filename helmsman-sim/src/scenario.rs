//! Scenario Files
//!
//! A scenario is a JSON document describing ownship, the contacts around it,
//! the decision domain and the behavior template every contact gets. Unknown
//! top-level fields are rejected; missing fields fall back to their defaults.
//!
//! # Example
//!
//! ```json
//! {
//!   "name": "head_on",
//!   "dt": 1.0,
//!   "steps": 300,
//!   "ownship": { "x": 0, "y": 0, "heading": 0, "speed": 3 },
//!   "contacts": [
//!     { "name": "henry", "x": 0, "y": 600, "heading": 180, "speed": 3 }
//!   ],
//!   "behavior": { "pwt_outer_dist": 300, "use_refinery": true }
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use helmsman_core::config::AvoidCollisionConfig;
use helmsman_core::contact::ContactReport;
use helmsman_core::domain::{DecisionDomain, DEPTH};
use helmsman_core::error::{ConfigError, DomainError};
use helmsman_core::Kinematics;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_DT: f64 = 1.0;
const DEFAULT_STEPS: usize = 300;
const DEFAULT_CRUISE_PRIORITY: f64 = 50.0;

/// Errors loading or validating a scenario
#[derive(Error, Debug, Diagnostic)]
pub enum ScenarioError {
    #[error("cannot read scenario {}", path.display())]
    #[diagnostic(code(helmsman::scenario::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse scenario")]
    #[diagnostic(
        code(helmsman::scenario::parse),
        help("scenario files are JSON; see scenarios/ for a template")
    )]
    Parse(#[from] serde_json::Error),

    #[error("invalid decision domain")]
    #[diagnostic(code(helmsman::scenario::domain))]
    Domain(#[from] DomainError),

    #[error("invalid behavior parameter for contact {contact}")]
    #[diagnostic(code(helmsman::scenario::config))]
    Config {
        contact: String,
        #[source]
        source: ConfigError,
    },

    #[error("invalid scenario: {0}")]
    #[diagnostic(code(helmsman::scenario::invalid))]
    Invalid(String),
}

/// Ownship starting state and cruise intent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnshipConfig {
    #[serde(flatten)]
    pub start: Kinematics,
    /// Heading ownship wants to hold when nothing is in the way.
    /// Defaults to the starting heading.
    #[serde(default)]
    pub cruise_heading: Option<f64>,
    /// Defaults to the starting speed
    #[serde(default)]
    pub cruise_speed: Option<f64>,
    #[serde(default = "default_cruise_priority")]
    pub cruise_priority: f64,
}

fn default_cruise_priority() -> f64 {
    DEFAULT_CRUISE_PRIORITY
}

impl OwnshipConfig {
    pub fn cruise_heading(&self) -> f64 {
        self.cruise_heading.unwrap_or(self.start.heading)
    }

    pub fn cruise_speed(&self) -> f64 {
        self.cruise_speed.unwrap_or(self.start.speed)
    }
}

impl Default for OwnshipConfig {
    fn default() -> Self {
        OwnshipConfig {
            start: Kinematics::default(),
            cruise_heading: None,
            cruise_speed: None,
            cruise_priority: DEFAULT_CRUISE_PRIORITY,
        }
    }
}

/// One simulated contact. It travels a straight line and reports its
/// position every `report_every` cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactConfig {
    pub name: String,
    #[serde(flatten)]
    pub start: Kinematics,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub vtype: String,
    #[serde(default = "default_report_every")]
    pub report_every: usize,
    /// Simulation time after which the contact appears on the retired list
    #[serde(default)]
    pub retire_at: Option<f64>,
    /// Per-contact behavior options applied over the scenario template
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

fn default_report_every() -> usize {
    1
}

impl ContactConfig {
    /// Position report for this contact at `utc`
    pub fn report(&self, kinematics: Kinematics, utc: f64) -> ContactReport {
        ContactReport {
            name: self.name.clone(),
            kinematics,
            utc,
            group: self.group.clone(),
            vtype: self.vtype.clone(),
        }
    }
}

/// Optional third axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DepthConfig {
    pub low: f64,
    pub high: f64,
    pub points: usize,
}

/// Decision grid shared by every behavior and the helm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DomainConfig {
    pub course_points: usize,
    pub max_speed: f64,
    pub speed_points: usize,
    pub depth: Option<DepthConfig>,
}

impl Default for DomainConfig {
    fn default() -> Self {
        DomainConfig {
            course_points: 360,
            max_speed: 5.0,
            speed_points: 26,
            depth: None,
        }
    }
}

impl DomainConfig {
    pub fn build(&self) -> Result<DecisionDomain, DomainError> {
        let mut domain =
            DecisionDomain::course_speed(self.course_points, self.max_speed, self.speed_points)?;
        if let Some(depth) = &self.depth {
            domain.add_axis(DEPTH, depth.low, depth.high, depth.points)?;
        }
        Ok(domain)
    }
}

/// A complete simulation scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Scenario {
    pub name: String,
    /// Seconds per cycle
    pub dt: f64,
    pub steps: usize,
    pub ownship: OwnshipConfig,
    pub contacts: Vec<ContactConfig>,
    pub domain: DomainConfig,
    /// Behavior template. `contact` is filled in per contact.
    pub behavior: AvoidCollisionConfig,
}

impl Default for Scenario {
    fn default() -> Self {
        Scenario {
            name: String::new(),
            dt: DEFAULT_DT,
            steps: DEFAULT_STEPS,
            ownship: OwnshipConfig::default(),
            contacts: Vec::new(),
            domain: DomainConfig::default(),
            behavior: AvoidCollisionConfig::default(),
        }
    }
}

impl Scenario {
    /// Read and validate a scenario file
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let text = std::fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut scenario = Self::from_json(&text)?;
        if scenario.name.is_empty() {
            if let Some(stem) = path.file_stem() {
                scenario.name = stem.to_string_lossy().into_owned();
            }
        }
        log::debug!(
            "loaded scenario {} with {} contacts",
            scenario.name,
            scenario.contacts.len()
        );
        Ok(scenario)
    }

    pub fn from_json(text: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = serde_json::from_str(text)?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn validate(&self) -> Result<(), ScenarioError> {
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(ScenarioError::Invalid(format!("dt must be positive, got {}", self.dt)));
        }
        if self.steps == 0 {
            return Err(ScenarioError::Invalid("steps must be at least 1".to_string()));
        }
        if !self.ownship.start.is_finite() {
            return Err(ScenarioError::Invalid("ownship start is not finite".to_string()));
        }
        let mut names = BTreeSet::new();
        for contact in &self.contacts {
            let key = contact.name.trim().to_uppercase();
            if key.is_empty() {
                return Err(ScenarioError::Invalid("contact without a name".to_string()));
            }
            if !names.insert(key) {
                return Err(ScenarioError::Invalid(format!(
                    "duplicate contact {}",
                    contact.name
                )));
            }
            if !contact.start.is_finite() {
                return Err(ScenarioError::Invalid(format!(
                    "contact {} start is not finite",
                    contact.name
                )));
            }
            if contact.report_every == 0 {
                return Err(ScenarioError::Invalid(format!(
                    "contact {} report_every must be at least 1",
                    contact.name
                )));
            }
        }
        self.domain.build()?;
        Ok(())
    }

    /// Apply a string option to the behavior template
    pub fn set_param(&mut self, param: &str, value: &str) -> Result<(), ScenarioError> {
        self.behavior
            .set_param(param, value)
            .map_err(|source| ScenarioError::Config {
                contact: "*".to_string(),
                source,
            })
    }

    /// Template configuration adapted for one contact
    pub fn behavior_for(&self, contact: &ContactConfig) -> Result<AvoidCollisionConfig, ScenarioError> {
        let mut config = self.behavior.clone();
        let wrap = |source: ConfigError| ScenarioError::Config {
            contact: contact.name.clone(),
            source,
        };
        config.set_param("contact", &contact.name).map_err(wrap)?;
        for (param, value) in &contact.params {
            config.set_param(param, value).map_err(wrap)?;
        }
        Ok(config)
    }
}
