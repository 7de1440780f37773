//! Collision avoidance behavior configuration.
//!
//! A typed struct with the same snake_case keys the host uses for its
//! string options. [`AvoidCollisionConfig::set_param`] accepts those
//! string pairs and rejects bad values, leaving the previous value in place.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut config = AvoidCollisionConfig::default();
//! config.set_param("contact", "henry")?;
//! config.set_param("pwt_outer_dist", "250")?;
//! if let Err(e) = config.set_param("pwt_grade", "cubic") {
//!     log::warn!("config: {}", e);
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::contact::ContactFilter;
use crate::error::ConfigError;
use crate::extrapolate::{DEFAULT_DECAY_END, DEFAULT_DECAY_START};

/// Shape of the relevance curve between the outer and inner distances
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
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum PwtGrade {
    Linear,
    Quadratic,
    /// Power 1.5
    Quasi,
}

impl Default for PwtGrade {
    fn default() -> Self {
        PwtGrade::Quasi
    }
}

impl PwtGrade {
    /// Apply the grade to a linear proximity fraction in `[0, 1]`
    pub fn apply(&self, pct: f64) -> f64 {
        match self {
            PwtGrade::Linear => pct,
            PwtGrade::Quadratic => pct * pct,
            PwtGrade::Quasi => pct.powf(1.5),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvoidCollisionConfig {
    /// Contact name, stored uppercase
    pub contact: String,
    pub priority: f64,

    /// Relevance is 1 at or inside this range
    pub pwt_inner_dist: f64,
    /// Relevance is 0 at or beyond this range
    pub pwt_outer_dist: f64,
    /// CPA at or below this scores the minimum utility
    pub min_util_cpa_dist: f64,
    /// CPA at or above this scores the maximum utility
    pub max_util_cpa_dist: f64,
    /// Range beyond which the behavior completes (with a 10% margin)
    pub completed_dist: f64,
    pub pwt_grade: PwtGrade,

    pub time_on_leg: f64,
    pub use_refinery: bool,
    pub check_plateaus: bool,
    pub pcheck_thresh: f64,
    pub check_validity: bool,
    pub verbose: bool,

    /// Depth at and below which the contact is no threat. 0 disables.
    pub collision_depth: f64,

    pub extrapolate: bool,
    pub decay_start: f64,
    pub decay_end: f64,

    /// Missing contact data is a warning rather than an error
    pub on_no_contact_ok: bool,
    /// Complete once the contact has been retired this many seconds
    pub complete_after_retired: Option<f64>,
    /// Contact reports older than this many seconds are stale
    pub max_contact_age: Option<f64>,

    pub filter: ContactFilter,
}

impl Default for AvoidCollisionConfig {
    fn default() -> Self {
        Self {
            contact: String::new(),
            priority: 100.0,
            pwt_inner_dist: 50.0,
            pwt_outer_dist: 200.0,
            min_util_cpa_dist: 10.0,
            max_util_cpa_dist: 75.0,
            completed_dist: 500.0,
            pwt_grade: PwtGrade::default(),
            time_on_leg: 120.0,
            use_refinery: false,
            check_plateaus: false,
            pcheck_thresh: 0.001,
            check_validity: false,
            verbose: false,
            collision_depth: 0.0,
            extrapolate: true,
            decay_start: DEFAULT_DECAY_START,
            decay_end: DEFAULT_DECAY_END,
            on_no_contact_ok: true,
            complete_after_retired: None,
            max_contact_age: None,
            filter: ContactFilter::default(),
        }
    }
}

// =============================================================================
// String parsing
// =============================================================================

fn parse_number(param: &str, value: &str) -> Result<f64, ConfigError> {
    let v: f64 = value
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(param, value, "not a number"))?;
    if !v.is_finite() {
        return Err(ConfigError::invalid(param, value, "not a finite number"));
    }
    Ok(v)
}

fn parse_non_neg(param: &str, value: &str) -> Result<f64, ConfigError> {
    let v = parse_number(param, value)?;
    if v < 0.0 {
        return Err(ConfigError::invalid(param, value, "must be non-negative"));
    }
    Ok(v)
}

fn parse_bool(param: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ConfigError::invalid(param, value, "expected true or false")),
    }
}

/// Set the low member of an ordered pair, dragging the high member up
fn set_min_of_pair(min: &mut f64, max: &mut f64, value: f64) {
    *min = value;
    if *max < value {
        *max = value;
    }
}

/// Set the high member of an ordered pair, dragging the low member down
fn set_max_of_pair(min: &mut f64, max: &mut f64, value: f64) {
    *max = value;
    if *min > value {
        *min = value;
    }
}

impl AvoidCollisionConfig {
    /// Apply one string option. On error nothing changes.
    pub fn set_param(&mut self, param: &str, value: &str) -> Result<(), ConfigError> {
        let param = param.trim().to_lowercase();
        let param = param.as_str();
        match param {
            "contact" => {
                let name = value.trim();
                if name.is_empty() {
                    return Err(ConfigError::invalid(param, value, "empty contact name"));
                }
                self.contact = name.to_uppercase();
            }
            "priority" | "pwt" => self.priority = parse_non_neg(param, value)?,
            "pwt_inner_dist" => {
                let v = parse_non_neg(param, value)?;
                set_min_of_pair(&mut self.pwt_inner_dist, &mut self.pwt_outer_dist, v);
            }
            "pwt_outer_dist" => {
                let v = parse_non_neg(param, value)?;
                set_max_of_pair(&mut self.pwt_inner_dist, &mut self.pwt_outer_dist, v);
            }
            "min_util_cpa_dist" => {
                let v = parse_non_neg(param, value)?;
                set_min_of_pair(&mut self.min_util_cpa_dist, &mut self.max_util_cpa_dist, v);
            }
            "max_util_cpa_dist" => {
                let v = parse_non_neg(param, value)?;
                set_max_of_pair(&mut self.min_util_cpa_dist, &mut self.max_util_cpa_dist, v);
            }
            "completed_dist" => self.completed_dist = parse_non_neg(param, value)?,
            "pwt_grade" => {
                self.pwt_grade = value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::invalid(param, value, "expected linear, quadratic or quasi"))?;
            }
            "time_on_leg" => self.time_on_leg = parse_non_neg(param, value)?,
            "use_refinery" => self.use_refinery = parse_bool(param, value)?,
            "check_plateaus" => self.check_plateaus = parse_bool(param, value)?,
            "pcheck_thresh" => self.pcheck_thresh = parse_non_neg(param, value)?,
            "check_validity" => self.check_validity = parse_bool(param, value)?,
            "verbose" => self.verbose = parse_bool(param, value)?,
            "collision_depth" => {
                let v = parse_number(param, value)?;
                if v <= 0.0 {
                    return Err(ConfigError::invalid(param, value, "must be positive"));
                }
                self.collision_depth = v;
            }
            "extrapolate" => self.extrapolate = parse_bool(param, value)?,
            "decay" => {
                let (start, end) = value
                    .split_once(',')
                    .ok_or_else(|| ConfigError::invalid(param, value, "expected start,end"))?;
                let start = parse_number(param, start)?;
                let end = parse_number(param, end)?;
                if start < 0.0 || start > end {
                    return Err(ConfigError::invalid(param, value, "need 0 <= start <= end"));
                }
                self.decay_start = start;
                self.decay_end = end;
            }
            "on_no_contact_ok" => self.on_no_contact_ok = parse_bool(param, value)?,
            "complete_after_retired" => {
                self.complete_after_retired = Some(parse_non_neg(param, value)?)
            }
            "max_contact_age" => self.max_contact_age = Some(parse_non_neg(param, value)?),
            "match_group" | "match_contact_group" => self.filter.add_match_group(value)?,
            "ignore_group" | "ignore_contact_group" => self.filter.add_ignore_group(value)?,
            "match_type" | "contact_type_required" => self.filter.add_match_type(value)?,
            "ignore_type" => self.filter.add_ignore_type(value)?,
            "strict_ignore" => self.filter.set_strict_ignore(parse_bool(param, value)?),
            _ => return Err(ConfigError::UnknownParam(param.to_string())),
        }
        self.enforce_completed_dist();
        Ok(())
    }

    /// Apply a list of options, returning the ones that were rejected.
    pub fn apply_params<'a>(
        &mut self,
        params: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Vec<ConfigError> {
        params
            .into_iter()
            .filter_map(|(param, value)| self.set_param(param, value).err())
            .collect()
    }

    fn enforce_completed_dist(&mut self) {
        if self.completed_dist < self.pwt_outer_dist {
            self.completed_dist = self.pwt_outer_dist;
        }
    }

    /// Check a configuration built field by field (for example from JSON).
    /// Raises `completed_dist` to `pwt_outer_dist`; everything else that is
    /// out of range is an error.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        let non_neg = [
            ("priority", self.priority),
            ("pwt_inner_dist", self.pwt_inner_dist),
            ("pwt_outer_dist", self.pwt_outer_dist),
            ("min_util_cpa_dist", self.min_util_cpa_dist),
            ("max_util_cpa_dist", self.max_util_cpa_dist),
            ("completed_dist", self.completed_dist),
            ("time_on_leg", self.time_on_leg),
            ("pcheck_thresh", self.pcheck_thresh),
            ("collision_depth", self.collision_depth),
            ("decay_start", self.decay_start),
        ];
        for (param, v) in non_neg {
            if !v.is_finite() || v < 0.0 {
                return Err(ConfigError::invalid(param, &v.to_string(), "must be non-negative"));
            }
        }
        if self.pwt_inner_dist > self.pwt_outer_dist {
            return Err(ConfigError::invalid(
                "pwt_inner_dist",
                &self.pwt_inner_dist.to_string(),
                "exceeds pwt_outer_dist",
            ));
        }
        if self.min_util_cpa_dist > self.max_util_cpa_dist {
            return Err(ConfigError::invalid(
                "min_util_cpa_dist",
                &self.min_util_cpa_dist.to_string(),
                "exceeds max_util_cpa_dist",
            ));
        }
        if !self.decay_end.is_finite() || self.decay_start > self.decay_end {
            return Err(ConfigError::invalid(
                "decay",
                &format!("{},{}", self.decay_start, self.decay_end),
                "need 0 <= start <= end",
            ));
        }
        self.enforce_completed_dist();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = AvoidCollisionConfig::default();
        assert_eq!(c.pwt_grade, PwtGrade::Quasi);
        assert_eq!(c.completed_dist, 500.0);
        assert_eq!(c.time_on_leg, 120.0);
        assert!(!c.use_refinery);
        assert!(c.extrapolate);
        assert_eq!((c.decay_start, c.decay_end), (15.0, 30.0));
    }

    #[test]
    fn test_invalid_value_keeps_previous() {
        let mut c = AvoidCollisionConfig::default();
        assert!(c.set_param("pwt_grade", "cubic").is_err());
        assert_eq!(c.pwt_grade, PwtGrade::Quasi);
        assert!(c.set_param("time_on_leg", "-5").is_err());
        assert!(c.set_param("time_on_leg", "abc").is_err());
        assert_eq!(c.time_on_leg, 120.0);
        assert!(c.set_param("use_refinery", "maybe").is_err());
        assert!(!c.use_refinery);
        assert!(c.set_param("decay", "30,15").is_err());
        assert_eq!((c.decay_start, c.decay_end), (15.0, 30.0));
        assert_eq!(
            c.set_param("bogus", "1"),
            Err(ConfigError::UnknownParam("bogus".to_string()))
        );
    }

    #[test]
    fn test_accepted_values() {
        let mut c = AvoidCollisionConfig::default();
        c.set_param("contact", "henry").unwrap();
        c.set_param("PWT_GRADE", "Linear").unwrap();
        c.set_param("use_refinery", "TRUE").unwrap();
        c.set_param("decay", "10, 20").unwrap();
        c.set_param("collision_depth", "25").unwrap();
        assert_eq!(c.contact, "HENRY");
        assert_eq!(c.pwt_grade, PwtGrade::Linear);
        assert!(c.use_refinery);
        assert_eq!((c.decay_start, c.decay_end), (10.0, 20.0));
        assert_eq!(c.collision_depth, 25.0);
        assert!(c.set_param("collision_depth", "0").is_err());
    }

    #[test]
    fn test_pairs_drag() {
        let mut c = AvoidCollisionConfig::default();
        c.set_param("pwt_inner_dist", "300").unwrap();
        assert_eq!((c.pwt_inner_dist, c.pwt_outer_dist), (300.0, 300.0));
        c.set_param("pwt_outer_dist", "100").unwrap();
        assert_eq!((c.pwt_inner_dist, c.pwt_outer_dist), (100.0, 100.0));

        c.set_param("max_util_cpa_dist", "5").unwrap();
        assert_eq!((c.min_util_cpa_dist, c.max_util_cpa_dist), (5.0, 5.0));
        c.set_param("min_util_cpa_dist", "20").unwrap();
        assert_eq!((c.min_util_cpa_dist, c.max_util_cpa_dist), (20.0, 20.0));
    }

    #[test]
    fn test_completed_dist_follows_outer() {
        let mut c = AvoidCollisionConfig::default();
        c.set_param("pwt_outer_dist", "800").unwrap();
        assert_eq!(c.completed_dist, 800.0);
        c.set_param("completed_dist", "100").unwrap();
        assert_eq!(c.completed_dist, 800.0);
    }

    #[test]
    fn test_apply_params_collects_errors() {
        let mut c = AvoidCollisionConfig::default();
        let errors = c.apply_params([
            ("contact", "ben"),
            ("pwt_grade", "steep"),
            ("match_type", "ship"),
            ("ignore_type", "ship"),
        ]);
        assert_eq!(errors.len(), 2);
        assert_eq!(c.contact, "BEN");
        assert!(c.filter.check("", "ship"));
    }

    #[test]
    fn test_grade_shapes() {
        assert_eq!(PwtGrade::Linear.apply(0.25), 0.25);
        assert_eq!(PwtGrade::Quadratic.apply(0.5), 0.25);
        assert!((PwtGrade::Quasi.apply(0.25) - 0.125).abs() < 1e-12);
        for grade in [PwtGrade::Linear, PwtGrade::Quadratic, PwtGrade::Quasi] {
            assert_eq!(grade.apply(0.0), 0.0);
            assert_eq!(grade.apply(1.0), 1.0);
        }
        assert_eq!(PwtGrade::Quasi.to_string(), "quasi");
    }

    #[test]
    fn test_json_round_trip_and_validate() {
        let json = r#"{"contact": "ALPHA", "pwt_outer_dist": 900, "pwt_grade": "linear"}"#;
        let mut c: AvoidCollisionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(c.pwt_grade, PwtGrade::Linear);
        assert_eq!(c.min_util_cpa_dist, 10.0);
        c.validate().unwrap();
        assert_eq!(c.completed_dist, 900.0);

        c.pwt_inner_dist = 1000.0;
        assert!(c.validate().is_err());
    }
}
