//! Helm arbitration for the simulator.
//!
//! Combines the preference functions of every active behavior by weighted
//! sum and picks the best cell. Ownship's own wish to keep its cruise
//! heading and speed enters as one more function, so with no contacts in
//! play the helm holds course.

use helmsman_core::domain::{DecisionDomain, COURSE, DEPTH, SPEED};
use helmsman_core::geometry::ang_diff;
use helmsman_core::objective::{GridReflector, Objective, MAX_UTILITY};
use helmsman_core::{Kinematics, PreferenceFunction};
use serde::{Deserialize, Serialize};

/// Share of the cruise utility carried by the course term
const CRUISE_COURSE_SHARE: f64 = 0.75;

/// Straight-line motion over `dt` seconds
pub fn advance(k: &Kinematics, dt: f64) -> Kinematics {
    let (x, y) = k.projected(dt);
    Kinematics { x, y, ..*k }
}

/// Prefers cells close to a cruise heading and speed
pub struct CruiseObjective<'a> {
    domain: &'a DecisionDomain,
    heading: f64,
    speed: f64,
}

impl<'a> CruiseObjective<'a> {
    pub fn new(domain: &'a DecisionDomain, heading: f64, speed: f64) -> Self {
        Self {
            domain,
            heading,
            speed,
        }
    }

    /// Weighted cruise function over the whole domain
    pub fn build(&self, priority: f64) -> PreferenceFunction {
        let mut reflector = GridReflector::new(self, self.domain);
        let mut ipf = reflector.create();
        ipf.set_weight(priority);
        ipf
    }
}

impl Objective for CruiseObjective<'_> {
    fn evaluate(&self, indices: &[usize]) -> f64 {
        let value = |name: &str| {
            let axis = self.domain.index_of(name)?;
            self.domain.value_at(axis, *indices.get(axis)?)
        };
        let course_term = match value(COURSE) {
            Some(course) => 1.0 - ang_diff(course, self.heading) / 180.0,
            None => 1.0,
        };
        let speed_term = match (value(SPEED), self.domain.axis_named(SPEED)) {
            (Some(speed), Some(axis)) if axis.high > axis.low => {
                1.0 - ((speed - self.speed).abs() / (axis.high - axis.low)).min(1.0)
            }
            _ => 1.0,
        };
        MAX_UTILITY
            * (CRUISE_COURSE_SHARE * course_term + (1.0 - CRUISE_COURSE_SHARE) * speed_term)
    }

    fn known_max(&self) -> Option<f64> {
        Some(MAX_UTILITY)
    }
}

/// The cell the helm settled on
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HelmDecision {
    pub course: f64,
    pub speed: f64,
    pub depth: Option<f64>,
    /// Weighted-sum utility of the chosen cell
    pub utility: f64,
}

/// Weighted-sum arbitration. Functions over a different domain than the
/// first one are skipped with a warning. Ties go to the first cell in
/// row-major order.
pub fn decide(functions: &[PreferenceFunction]) -> Option<HelmDecision> {
    let domain = functions.first()?.domain();
    let mut sums = vec![0.0; domain.total_points()];
    for ipf in functions {
        if ipf.domain() != domain || ipf.len() != sums.len() {
            log::warn!("helm: skipping function over a mismatched domain");
            continue;
        }
        let weight = ipf.weight();
        for (sum, u) in sums.iter_mut().zip(ipf.as_slice()) {
            *sum += weight * u;
        }
    }

    let mut best: Option<(usize, f64)> = None;
    for (offset, &u) in sums.iter().enumerate() {
        if best.map_or(true, |(_, b)| u > b) {
            best = Some((offset, u));
        }
    }
    let (offset, utility) = best?;
    let indices = domain.unflatten(offset)?;
    let value = |name: &str| {
        let axis = domain.index_of(name)?;
        domain.value_at(axis, indices[axis])
    };
    Some(HelmDecision {
        course: value(COURSE)?,
        speed: value(SPEED)?,
        depth: value(DEPTH),
        utility,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain() -> DecisionDomain {
        DecisionDomain::course_speed(36, 4.0, 9).unwrap()
    }

    #[test]
    fn test_advance() {
        let k = Kinematics::new(10.0, 0.0, 90.0, 2.0);
        let next = advance(&k, 5.0);
        assert!((next.x - 20.0).abs() < 1e-9);
        assert!(next.y.abs() < 1e-9);
        assert_eq!(next.heading, 90.0);
        assert_eq!(next.speed, 2.0);
    }

    #[test]
    fn test_cruise_peaks_at_cruise_cell() {
        let d = domain();
        let cruise = CruiseObjective::new(&d, 90.0, 2.0);
        // Course index 9 is 90 degrees, speed index 4 is 2.0
        assert_eq!(cruise.evaluate(&[9, 4]), MAX_UTILITY);
        assert!(cruise.evaluate(&[27, 4]) < cruise.evaluate(&[9, 4]));
        assert!(cruise.evaluate(&[9, 0]) < cruise.evaluate(&[9, 4]));
        // Reverse course at cruise speed keeps only the speed share
        assert!((cruise.evaluate(&[27, 4]) - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_decide_holds_cruise_alone() {
        let d = domain();
        let ipf = CruiseObjective::new(&d, 90.0, 2.0).build(50.0);
        let decision = decide(&[ipf]).unwrap();
        assert_eq!(decision.course, 90.0);
        assert_eq!(decision.speed, 2.0);
        assert_eq!(decision.depth, None);
        assert!((decision.utility - 50.0 * MAX_UTILITY).abs() < 1e-6);
    }

    #[test]
    fn test_decide_weighted_sum() {
        let d = domain();
        let cruise = CruiseObjective::new(&d, 0.0, 2.0).build(10.0);
        // A heavy function that forbids every course but 180
        let mut avoid = PreferenceFunction::filled(&d, 0.0);
        for s in 0..9 {
            avoid.set_utility(&[18, s], 100.0);
        }
        avoid.set_weight(100.0);
        let decision = decide(&[cruise, avoid]).unwrap();
        assert_eq!(decision.course, 180.0);
        // Speed is still settled by the cruise preference
        assert_eq!(decision.speed, 2.0);
    }

    #[test]
    fn test_decide_skips_mismatched_domain() {
        let d = domain();
        let other = DecisionDomain::course_speed(12, 4.0, 5).unwrap();
        let cruise = CruiseObjective::new(&d, 270.0, 1.0).build(1.0);
        let mut stray = PreferenceFunction::filled(&other, 100.0);
        stray.set_weight(1000.0);
        let decision = decide(&[cruise, stray]).unwrap();
        assert_eq!(decision.course, 270.0);
        assert_eq!(decision.speed, 1.0);
    }

    #[test]
    fn test_decide_empty() {
        assert!(decide(&[]).is_none());
    }
}
