//! Collision Avoidance Behavior
//!
//! One [`AvoidCollision`] instance watches one contact. The host calls
//! [`AvoidCollision::run_cycle`] once per control cycle with fresh ownship
//! and contact data; the behavior answers with a weighted preference
//! function over course and speed, or nothing.
//!
//! # Lifecycle
//!
//! ```text
//!   Idle ──(filter holds, range < pwt_outer_dist)──► Running
//!     │                                                  │
//!     └──(filter fails, range >= 1.1 × completed_dist, ──┘
//!         contact retired)──────────────────────────► Complete
//! ```
//!
//! The 10% margin on the completed distance keeps the behavior from being
//! spawned and completed on the same range.
//!
//! # Cycle
//!
//! 1. Refresh the contact (extrapolated when enabled)
//! 2. Relevance from range, 0 at the outer distance and 1 at the inner
//! 3. Build the function with the configured [`BuildStrategy`]
//! 4. Normalize to 0..100 and weight by relevance × priority
//!
//! Missing or stale kinematics skip the cycle with a warning.

mod status;

pub use status::{AvoidMode, BehaviorStatus, BuildStrategy, CompletionReason};

use crate::config::AvoidCollisionConfig;
use crate::contact::{ContactReport, ContactTracker};
use crate::cpa::CpaEngine;
use crate::domain::{DecisionDomain, COURSE, DEPTH, SPEED};
use crate::error::{ConfigError, PlatformError};
use crate::geometry::Kinematics;
use crate::objective::{AvoidCollisionObjective, GridReflector, PreferenceFunction};
use crate::refinery::Refinery;

/// Completion happens this fraction beyond the configured completed distance
const COMPLETED_MARGIN: f64 = 0.1;

/// Normalized utility range handed to the host
const NORMALIZED_LOW: f64 = 0.0;
const NORMALIZED_HIGH: f64 = 100.0;

/// One cycle's inputs from the host
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleInput<'a> {
    pub time: f64,
    pub ownship: Option<&'a Kinematics>,
    pub contact: Option<&'a ContactReport>,
    /// Names on the host's retired-contacts list
    pub retired: &'a [String],
}

#[derive(Debug, Clone)]
pub struct AvoidCollision {
    config: AvoidCollisionConfig,
    domain: DecisionDomain,
    tracker: ContactTracker,
    mode: AvoidMode,
    mode_since: f64,
    status: BehaviorStatus,
}

impl AvoidCollision {
    pub fn new(mut config: AvoidCollisionConfig, domain: DecisionDomain) -> Result<Self, ConfigError> {
        config.validate()?;
        check_collision_depth(&mut config, &domain)?;
        let mut tracker = ContactTracker::new(&config.contact);
        tracker.configure(&config);
        Ok(Self {
            config,
            domain,
            tracker,
            mode: AvoidMode::Idle,
            mode_since: 0.0,
            status: BehaviorStatus::default(),
        })
    }

    /// Apply one string option. Rejected values leave the configuration
    /// unchanged.
    pub fn set_param(&mut self, param: &str, value: &str) -> Result<(), ConfigError> {
        let mut candidate = self.config.clone();
        candidate.set_param(param, value)?;
        check_collision_depth(&mut candidate, &self.domain)?;
        if candidate.collision_depth != self.config.collision_depth {
            log::debug!("collision depth now {}", candidate.collision_depth);
        }
        self.config = candidate;
        self.tracker.configure(&self.config);
        Ok(())
    }

    pub fn config(&self) -> &AvoidCollisionConfig {
        &self.config
    }

    pub fn domain(&self) -> &DecisionDomain {
        &self.domain
    }

    pub fn mode(&self) -> AvoidMode {
        self.mode
    }

    pub fn status(&self) -> &BehaviorStatus {
        &self.status
    }

    pub fn tracker(&self) -> &ContactTracker {
        &self.tracker
    }

    /// Which builder a cycle would use with the present configuration
    pub fn strategy(&self) -> BuildStrategy {
        if self.config.collision_depth > 0.0 && self.domain.has_axis(DEPTH) {
            BuildStrategy::DepthGrid
        } else if self.config.use_refinery {
            BuildStrategy::Refinery
        } else {
            BuildStrategy::DirectGrid
        }
    }

    /// Relevance for a given range: exactly 0 at or beyond the outer
    /// distance, exactly 1 at or inside the inner distance, graded between.
    pub fn relevance(&self, range: f64) -> f64 {
        let (inner, outer) = (self.config.pwt_inner_dist, self.config.pwt_outer_dist);
        if !range.is_finite() || range >= outer {
            return 0.0;
        }
        if range <= inner {
            return 1.0;
        }
        let pct = (outer - range) / (outer - inner);
        self.config.pwt_grade.apply(pct).clamp(0.0, 1.0)
    }

    /// Range at which a running behavior completes
    pub fn completion_range(&self) -> f64 {
        let d = self.config.completed_dist;
        d + d * COMPLETED_MARGIN
    }

    fn set_mode(&mut self, mode: AvoidMode, time: f64) {
        if mode != self.mode {
            log::info!(
                "{}: {} -> {} at {:.1}",
                self.tracker.name(),
                self.mode,
                mode,
                time
            );
            self.mode = mode;
            self.mode_since = time;
        }
    }

    fn complete(&mut self, reason: CompletionReason, time: f64) {
        self.status.completion = Some(reason);
        self.set_mode(AvoidMode::Complete, time);
    }

    /// Run one control cycle. Returns the weighted, normalized preference
    /// function, or `None` when the behavior has nothing to say.
    pub fn run_cycle(&mut self, input: CycleInput<'_>) -> Option<PreferenceFunction> {
        let mut status = BehaviorStatus {
            time: input.time,
            completion: self.status.completion,
            ..BehaviorStatus::default()
        };
        let ipf = self.cycle(&input, &mut status);
        status.mode = self.mode;
        status.mode_since = self.mode_since;
        status.completion = self.status.completion.or(status.completion);
        status.avoiding = ipf.is_some();
        self.status = status;
        ipf
    }

    fn cycle(
        &mut self,
        input: &CycleInput<'_>,
        status: &mut BehaviorStatus,
    ) -> Option<PreferenceFunction> {
        if self.mode == AvoidMode::Complete {
            return None;
        }

        let engine = match self.tracker.update(input.time, input.ownship, input.contact) {
            Ok(engine) => engine,
            Err(e) => {
                self.report_platform_error(&e);
                status.warnings.push(e.to_string());
                return None;
            }
        };
        let range = engine.range();
        status.range = range;
        status.closing_speed = self.tracker.state().map(|s| s.closing_speed).unwrap_or(0.0);

        if self.tracker.note_retired_list(input.time, input.retired) {
            self.complete(CompletionReason::ContactRetired, input.time);
            return None;
        }
        if !self.tracker.filter_check_holds() {
            self.complete(CompletionReason::FilterFailed, input.time);
            return None;
        }
        if range >= self.completion_range() {
            self.complete(CompletionReason::RangeOpened, input.time);
            return None;
        }

        if self.mode == AvoidMode::Idle {
            if range >= self.config.pwt_outer_dist {
                return None;
            }
            self.set_mode(AvoidMode::Running, input.time);
        }

        let relevance = self.relevance(range);
        status.relevance = relevance;
        if relevance <= 0.0 {
            return None;
        }

        let mut ipf = self.build(&engine, range, status)?;
        ipf.normalize(NORMALIZED_LOW, NORMALIZED_HIGH);
        ipf.set_weight(relevance * self.config.priority);
        if self.config.check_validity {
            let valid = ipf.is_valid();
            if self.config.verbose {
                log::info!("{}: valid function {}", self.tracker.name(), valid);
            }
            status.valid = Some(valid);
        }
        log::debug!(
            "{}: range {:.1} relevance {:.3} weight {:.2} evals {}",
            self.tracker.name(),
            range,
            relevance,
            ipf.weight(),
            status.total_evals
        );
        Some(ipf)
    }

    fn report_platform_error(&self, e: &PlatformError) {
        match e {
            PlatformError::ContactUnavailable(_) | PlatformError::StaleContact { .. }
                if !self.config.on_no_contact_ok =>
            {
                log::error!("{}", e)
            }
            _ => log::warn!("{}", e),
        }
    }

    fn build(
        &self,
        engine: &CpaEngine,
        range: f64,
        status: &mut BehaviorStatus,
    ) -> Option<PreferenceFunction> {
        let strategy = self.strategy();
        status.strategy = Some(strategy);
        match strategy {
            BuildStrategy::DepthGrid => self.build_depth(engine, status),
            BuildStrategy::DirectGrid | BuildStrategy::Refinery => {
                self.build_course_speed(engine, range, strategy, status)
            }
        }
    }

    fn build_depth(&self, engine: &CpaEngine, status: &mut BehaviorStatus) -> Option<PreferenceFunction> {
        let cfg = &self.config;
        status.collision_distance = Some(cfg.min_util_cpa_dist);
        let objective = match AvoidCollisionObjective::new(
            engine,
            &self.domain,
            cfg.time_on_leg,
            cfg.min_util_cpa_dist,
            cfg.max_util_cpa_dist,
        ) {
            Ok(objective) => objective.with_collision_depth(cfg.collision_depth),
            Err(e) => {
                log::warn!("{}: unable to init objective: {}", self.tracker.name(), e);
                status.warnings.push(e.to_string());
                return None;
            }
        };
        let mut reflector = GridReflector::new(&objective, &self.domain);
        let ipf = reflector.create();
        status.total_evals = reflector.total_evals();
        Some(ipf)
    }

    fn build_course_speed(
        &self,
        engine: &CpaEngine,
        range: f64,
        strategy: BuildStrategy,
        status: &mut BehaviorStatus,
    ) -> Option<PreferenceFunction> {
        let cfg = &self.config;
        let domain = match self.domain.sub_domain(&[COURSE, SPEED]) {
            Ok(domain) => domain,
            Err(e) => {
                log::warn!("{}: {}", self.tracker.name(), e);
                status.warnings.push(e.to_string());
                return None;
            }
        };

        // Inside the collision distance, keep a gradient by halving range
        let collision_distance = if range <= cfg.min_util_cpa_dist {
            range / 2.0
        } else {
            cfg.min_util_cpa_dist
        };
        status.collision_distance = Some(collision_distance);

        let objective = match AvoidCollisionObjective::new(
            engine,
            &domain,
            cfg.time_on_leg,
            collision_distance,
            cfg.max_util_cpa_dist,
        ) {
            Ok(objective) => objective,
            Err(e) => {
                log::warn!("{}: unable to init objective: {}", self.tracker.name(), e);
                status.warnings.push(e.to_string());
                return None;
            }
        };
        let mut reflector = GridReflector::new(&objective, &domain);

        if strategy == BuildStrategy::Refinery {
            let refinery = Refinery::new(cfg.min_util_cpa_dist, cfg.max_util_cpa_dist, cfg.time_on_leg);
            match refinery.refine(engine, &domain) {
                Ok(outcome) => {
                    status.total_evals += outcome.queries;
                    status.logic_case = Some(outcome.logic_case);
                    for region in outcome.regions {
                        reflector.add_plateau(region);
                    }
                    if cfg.check_plateaus {
                        reflector.set_pcheck_thresh(cfg.pcheck_thresh);
                        let check = reflector.check_plateaus();
                        if cfg.verbose {
                            for line in &check.failures {
                                log::info!("{}: plateau check {}", self.tracker.name(), line);
                            }
                            log::info!(
                                "{}: plateaus ok {} case {}",
                                self.tracker.name(),
                                check.ok(),
                                outcome.logic_case
                            );
                        }
                        if !check.ok() {
                            log::warn!(
                                "{}: plateau worst fail {}",
                                self.tracker.name(),
                                check.worst_fail
                            );
                        }
                        status.plateau_check = Some(check);
                    }
                }
                Err(e) => {
                    // Fall back to evaluating every cell
                    log::warn!("{}: refinery: {}", self.tracker.name(), e);
                    status.warnings.push(e.to_string());
                }
            }
        }

        let ipf = reflector.create();
        status.total_evals += reflector.total_evals();
        status.warnings.extend(reflector.warnings().iter().cloned());
        Some(ipf)
    }
}

/// A collision depth needs a depth axis. A depth at or past the bottom of
/// the axis is ignored rather than rejected.
fn check_collision_depth(
    config: &mut AvoidCollisionConfig,
    domain: &DecisionDomain,
) -> Result<(), ConfigError> {
    if config.collision_depth <= 0.0 {
        return Ok(());
    }
    let depth = config.collision_depth;
    let axis = domain.axis_named(DEPTH).ok_or_else(|| {
        ConfigError::invalid("collision_depth", &depth.to_string(), "domain has no depth axis")
    })?;
    if depth >= axis.high {
        log::debug!("collision depth {} beyond depth axis, ignored", depth);
        config.collision_depth = 0.0;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PwtGrade;

    fn domain() -> DecisionDomain {
        DecisionDomain::course_speed(36, 5.0, 11).unwrap()
    }

    fn config() -> AvoidCollisionConfig {
        let mut c = AvoidCollisionConfig::default();
        c.set_param("contact", "alpha").unwrap();
        c.set_param("extrapolate", "false").unwrap();
        c
    }

    fn report(x: f64, y: f64, heading: f64, speed: f64) -> ContactReport {
        ContactReport {
            name: "alpha".to_string(),
            kinematics: Kinematics::new(x, y, heading, speed),
            utc: 0.0,
            group: String::new(),
            vtype: String::new(),
        }
    }

    fn cycle(
        b: &mut AvoidCollision,
        time: f64,
        os: &Kinematics,
        cn: &ContactReport,
    ) -> Option<PreferenceFunction> {
        b.run_cycle(CycleInput {
            time,
            ownship: Some(os),
            contact: Some(cn),
            retired: &[],
        })
    }

    #[test]
    fn test_relevance_boundaries() {
        for grade in ["linear", "quadratic", "quasi"] {
            let mut c = config();
            c.set_param("pwt_grade", grade).unwrap();
            let b = AvoidCollision::new(c, domain()).unwrap();
            assert_eq!(b.relevance(200.0), 0.0, "{}", grade);
            assert_eq!(b.relevance(250.0), 0.0, "{}", grade);
            assert_eq!(b.relevance(50.0), 1.0, "{}", grade);
            assert_eq!(b.relevance(10.0), 1.0, "{}", grade);
            let mid = b.relevance(125.0);
            assert!(mid > 0.0 && mid < 1.0, "{}", grade);
        }
        let mut c = config();
        c.pwt_grade = PwtGrade::Linear;
        let b = AvoidCollision::new(c, domain()).unwrap();
        assert!((b.relevance(125.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_idle_until_inside_outer_distance() {
        let mut b = AvoidCollision::new(config(), domain()).unwrap();
        let os = Kinematics::new(0.0, 0.0, 0.0, 2.0);
        assert!(cycle(&mut b, 0.0, &os, &report(0.0, 300.0, 180.0, 2.0)).is_none());
        assert_eq!(b.mode(), AvoidMode::Idle);
        assert!(!b.status().avoiding);

        let ipf = cycle(&mut b, 1.0, &os, &report(0.0, 150.0, 180.0, 2.0)).unwrap();
        assert_eq!(b.mode(), AvoidMode::Running);
        assert_eq!(b.status().mode_since, 1.0);
        assert!(b.status().avoiding);
        assert_eq!(b.status().strategy, Some(BuildStrategy::DirectGrid));

        let (lo, hi) = ipf.min_max().unwrap();
        assert_eq!((lo, hi), (0.0, 100.0));
        let expected = b.relevance(150.0) * 100.0;
        assert!((ipf.weight() - expected).abs() < 1e-9);
        assert_eq!(b.status().total_evals, 36 * 11);
    }

    #[test]
    fn test_completion_hysteresis() {
        let mut c = config();
        c.set_param("pwt_outer_dist", "100").unwrap();
        c.set_param("completed_dist", "100").unwrap();
        let mut b = AvoidCollision::new(c, domain()).unwrap();
        let os = Kinematics::new(0.0, 0.0, 0.0, 0.0);

        cycle(&mut b, 0.0, &os, &report(0.0, 90.0, 0.0, 1.0));
        assert_eq!(b.mode(), AvoidMode::Running);
        for (t, y) in [(1.0, 100.0), (2.0, 105.0), (3.0, 109.9)] {
            assert!(cycle(&mut b, t, &os, &report(0.0, y, 0.0, 1.0)).is_none());
            assert_eq!(b.mode(), AvoidMode::Running, "range {}", y);
        }
        cycle(&mut b, 4.0, &os, &report(0.0, 110.0, 0.0, 1.0));
        assert_eq!(b.mode(), AvoidMode::Complete);
        assert_eq!(b.status().completion, Some(CompletionReason::RangeOpened));
        assert_eq!(b.status().mode_since, 4.0);

        // Complete is final
        assert!(cycle(&mut b, 5.0, &os, &report(0.0, 20.0, 180.0, 1.0)).is_none());
        assert_eq!(b.mode(), AvoidMode::Complete);
    }

    #[test]
    fn test_stale_kinematics_skip_cycle() {
        let mut c = config();
        c.set_param("max_contact_age", "5").unwrap();
        let mut b = AvoidCollision::new(c, domain()).unwrap();
        let cn = report(0.0, 100.0, 180.0, 2.0);
        let out = b.run_cycle(CycleInput {
            time: 0.0,
            ownship: None,
            contact: Some(&cn),
            retired: &[],
        });
        assert!(out.is_none());
        assert_eq!(b.mode(), AvoidMode::Idle);
        assert_eq!(b.status().warnings.len(), 1);

        let os = Kinematics::new(0.0, 0.0, 0.0, 2.0);
        assert!(cycle(&mut b, 10.0, &os, &cn).is_none());
        assert!(b.status().warnings[0].contains("stale"));
        assert!(cycle(&mut b, 3.0, &os, &cn).is_some());
    }

    #[test]
    fn test_refinery_matches_direct_grid() {
        let os = Kinematics::new(0.0, 0.0, 45.0, 2.0);
        let cn = report(60.0, 120.0, 200.0, 3.0);

        let mut direct = AvoidCollision::new(config(), domain()).unwrap();
        let expected = cycle(&mut direct, 0.0, &os, &cn).unwrap();

        let mut c = config();
        c.set_param("use_refinery", "true").unwrap();
        c.set_param("check_plateaus", "true").unwrap();
        c.set_param("check_validity", "true").unwrap();
        let mut refined = AvoidCollision::new(c, domain()).unwrap();
        let got = cycle(&mut refined, 0.0, &os, &cn).unwrap();

        assert_eq!(got, expected);
        let status = refined.status();
        assert_eq!(status.strategy, Some(BuildStrategy::Refinery));
        assert!(status.logic_case.is_some());
        assert_eq!(status.plateau_check.as_ref().map(|c| c.ok()), Some(true));
        assert_eq!(status.valid, Some(true));
        let postings = status.postings("ALPHA");
        assert!(postings.contains(&("PLATEAU_CHECK_OK".to_string(), "true".to_string())));
    }

    #[test]
    fn test_collision_distance_halved_when_close() {
        let mut b = AvoidCollision::new(config(), domain()).unwrap();
        let os = Kinematics::new(0.0, 0.0, 0.0, 1.0);
        cycle(&mut b, 0.0, &os, &report(0.0, 8.0, 90.0, 1.0)).unwrap();
        assert_eq!(b.status().collision_distance, Some(4.0));
        cycle(&mut b, 1.0, &os, &report(0.0, 40.0, 90.0, 1.0)).unwrap();
        assert_eq!(b.status().collision_distance, Some(10.0));
    }

    #[test]
    fn test_filter_and_retired_complete() {
        let mut c = config();
        c.set_param("ignore_group", "friendly").unwrap();
        let mut b = AvoidCollision::new(c.clone(), domain()).unwrap();
        let os = Kinematics::new(0.0, 0.0, 0.0, 1.0);
        let mut cn = report(0.0, 100.0, 180.0, 1.0);
        cn.group = "Friendly".to_string();
        assert!(cycle(&mut b, 0.0, &os, &cn).is_none());
        assert_eq!(b.status().completion, Some(CompletionReason::FilterFailed));

        c.set_param("complete_after_retired", "2").unwrap();
        let mut b = AvoidCollision::new(c, domain()).unwrap();
        let cn = report(0.0, 100.0, 180.0, 1.0);
        let retired = vec!["alpha".to_string()];
        for t in [0.0, 1.0, 2.0] {
            b.run_cycle(CycleInput {
                time: t,
                ownship: Some(&os),
                contact: Some(&cn),
                retired: &retired,
            });
            assert_ne!(b.mode(), AvoidMode::Complete);
        }
        b.run_cycle(CycleInput {
            time: 3.0,
            ownship: Some(&os),
            contact: Some(&cn),
            retired: &retired,
        });
        assert_eq!(b.status().completion, Some(CompletionReason::ContactRetired));
    }

    #[test]
    fn test_depth_strategy() {
        let mut d = domain();
        d.add_axis(DEPTH, 0.0, 50.0, 6).unwrap();

        // No depth axis: collision depth refused, config unchanged
        let mut flat = AvoidCollision::new(config(), domain()).unwrap();
        assert!(flat.set_param("collision_depth", "20").is_err());
        assert_eq!(flat.config().collision_depth, 0.0);

        let mut b = AvoidCollision::new(config(), d).unwrap();
        b.set_param("collision_depth", "80").unwrap();
        assert_eq!(b.config().collision_depth, 0.0);
        b.set_param("collision_depth", "20").unwrap();
        assert_eq!(b.strategy(), BuildStrategy::DepthGrid);

        let os = Kinematics::new(0.0, 0.0, 0.0, 2.0);
        let ipf = cycle(&mut b, 0.0, &os, &report(0.0, 100.0, 180.0, 2.0)).unwrap();
        assert_eq!(ipf.domain().size(), 3);
        // Deep cells are clear even on a collision course
        assert_eq!(ipf.utility_at(&[0, 10, 5]), Some(100.0));
        assert_eq!(ipf.utility_at(&[0, 10, 0]), Some(0.0));
    }

    #[test]
    fn test_set_param_renames_contact() {
        let mut b = AvoidCollision::new(config(), domain()).unwrap();
        assert!(b.set_param("pwt_grade", "steep").is_err());
        assert_eq!(b.config().pwt_grade, PwtGrade::Quasi);
        b.set_param("contact", "bravo").unwrap();
        assert_eq!(b.tracker().name(), "BRAVO");
    }
}
