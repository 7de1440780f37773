//! Error types for the decision core.
//!
//! None of these are fatal to the host. The behavior turns each one into a
//! logged warning and, at worst, emits no preference function for a cycle.

use thiserror::Error;

/// A configuration parameter was rejected. The previous value is kept.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("unknown parameter: {0}")]
    UnknownParam(String),

    #[error("invalid value for {param}: {value:?} ({reason})")]
    InvalidValue {
        param: String,
        value: String,
        reason: &'static str,
    },
}

impl ConfigError {
    pub fn invalid(param: &str, value: &str, reason: &'static str) -> Self {
        ConfigError::InvalidValue {
            param: param.to_string(),
            value: value.to_string(),
            reason,
        }
    }
}

/// Problems building a decision domain
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("axis {0} already present")]
    DuplicateAxis(String),

    #[error("axis {name} has invalid bounds [{low}, {high}]")]
    InvalidBounds { name: String, low: f64, high: f64 },

    #[error("axis {name} has invalid point count {points}")]
    InvalidPoints { name: String, points: usize },

    #[error("domain has no axis named {0}")]
    MissingAxis(String),
}

/// Reasons the refiner declines to produce safe regions
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RefineError {
    #[error("CPA engine has not been initialized")]
    EngineNotInitialized,

    #[error("inconsistent distances: min {min}, max {max}")]
    InconsistentDistances { min: f64, max: f64 },

    #[error("time horizon must be non-negative, got {0}")]
    InvalidHorizon(f64),

    #[error("domain lacks a usable {0} axis")]
    MissingAxis(&'static str),

    #[error("domain must hold exactly the course and speed axes, found {0}")]
    UnsupportedAxes(usize),

    #[error("speed axis starts below zero ({0})")]
    NegativeSpeedAxis(f64),
}

/// Contact position extrapolation failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtrapolationError {
    #[error("extrapolator has no position report")]
    NoReport,

    #[error("requested time {requested} precedes report time {reported}")]
    TimeBeforeReport { requested: f64, reported: f64 },

    #[error("invalid decay window [{start}, {end}]")]
    InvalidDecay { start: f64, end: f64 },
}

/// Kinematics needed for a cycle were unavailable
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlatformError {
    #[error("ownship kinematics unavailable")]
    OwnshipUnavailable,

    #[error("contact {0} kinematics unavailable")]
    ContactUnavailable(String),

    #[error("contact {name} report is stale ({age:.1}s old)")]
    StaleContact { name: String, age: f64 },

    #[error("no contact name configured")]
    NoContactName,
}

/// The objective function could not be set up for this domain
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ObjectiveError {
    #[error("CPA engine has not been initialized")]
    EngineNotInitialized,

    #[error("inconsistent utility distances: collision {min}, all clear {max}")]
    InconsistentDistances { min: f64, max: f64 },

    #[error("time on leg must be non-negative, got {0}")]
    InvalidTimeOnLeg(f64),

    #[error("domain lacks a {0} axis")]
    MissingAxis(&'static str),
}
