//! Maneuver Preference Functions
//!
//! Turns CPA predictions into a utility for every cell of the decision
//! domain. The arbitration runtime only sees the resulting
//! [`PreferenceFunction`]; how it was filled is up to the behavior.
//!
//! # Architecture
//!
//! ```text
//! CpaEngine ──► AvoidCollisionObjective ──► GridReflector ──► PreferenceFunction
//!                                              ▲
//!                         SafeRegion plateaus ─┘
//! ```
//!
//! The reflector gives plateau cells the objective's known maximum without
//! evaluating them and evaluates every other cell directly.
//!
//! # Example
//!
//! ```rust,ignore
//! let objective = AvoidCollisionObjective::new(&engine, &domain, 120.0, 10.0, 75.0)?;
//! let mut reflector = GridReflector::new(&objective, &domain);
//! for region in regions {
//!     reflector.add_plateau(region);
//! }
//! let mut ipf = reflector.create();
//! ipf.normalize(0.0, 100.0);
//! ```

use serde::{Deserialize, Serialize};

use crate::cpa::CpaEngine;
use crate::domain::{DecisionDomain, DomainAxis, COURSE, DEPTH, SPEED};
use crate::error::ObjectiveError;
use crate::refinery::SafeRegion;

pub const MIN_UTILITY: f64 = 0.0;
pub const MAX_UTILITY: f64 = 100.0;

/// Utility of a CPA exactly at the collision distance
const COLLISION_EDGE_UTILITY: f64 = 25.0;

/// Something that scores one grid cell
pub trait Objective {
    /// Utility of the cell with per-axis grid `indices`
    fn evaluate(&self, indices: &[usize]) -> f64;

    /// Largest utility this objective can return, when known
    fn known_max(&self) -> Option<f64> {
        None
    }
}

// =============================================================================
// Collision avoidance objective
// =============================================================================

/// Scores a (course, speed[, depth]) cell by the CPA ownship would reach
/// against one contact within the time on leg.
#[derive(Debug, Clone)]
pub struct AvoidCollisionObjective<'a> {
    engine: &'a CpaEngine,
    course_ix: usize,
    speed_ix: usize,
    course: DomainAxis,
    speed: DomainAxis,
    depth: Option<(usize, DomainAxis)>,
    time_on_leg: f64,
    collision_distance: f64,
    all_clear_distance: f64,
    collision_depth: f64,
}

impl<'a> AvoidCollisionObjective<'a> {
    pub fn new(
        engine: &'a CpaEngine,
        domain: &DecisionDomain,
        time_on_leg: f64,
        collision_distance: f64,
        all_clear_distance: f64,
    ) -> Result<Self, ObjectiveError> {
        if !engine.is_initialized() {
            return Err(ObjectiveError::EngineNotInitialized);
        }
        if !time_on_leg.is_finite() || time_on_leg < 0.0 {
            return Err(ObjectiveError::InvalidTimeOnLeg(time_on_leg));
        }
        let (min, max) = (collision_distance, all_clear_distance);
        if !(min.is_finite() && max.is_finite()) || min < 0.0 || min > max {
            return Err(ObjectiveError::InconsistentDistances { min, max });
        }

        let course_ix = domain.index_of(COURSE).ok_or(ObjectiveError::MissingAxis(COURSE))?;
        let speed_ix = domain.index_of(SPEED).ok_or(ObjectiveError::MissingAxis(SPEED))?;
        let axis = |ix: usize, name: &'static str| {
            domain.axis(ix).cloned().ok_or(ObjectiveError::MissingAxis(name))
        };
        let depth = match domain.index_of(DEPTH) {
            Some(ix) => Some((ix, axis(ix, DEPTH)?)),
            None => None,
        };

        Ok(Self {
            engine,
            course_ix,
            speed_ix,
            course: axis(course_ix, COURSE)?,
            speed: axis(speed_ix, SPEED)?,
            depth,
            time_on_leg,
            collision_distance,
            all_clear_distance,
            collision_depth: 0.0,
        })
    }

    /// Cells at or below `depth` on the depth axis are treated as clear of
    /// the contact. Ignored without a depth axis or when not positive.
    pub fn with_collision_depth(mut self, depth: f64) -> Self {
        if self.depth.is_some() && depth > 0.0 {
            self.collision_depth = depth;
        }
        self
    }

    pub fn engine(&self) -> &CpaEngine {
        self.engine
    }

    pub fn collision_distance(&self) -> f64 {
        self.collision_distance
    }

    pub fn all_clear_distance(&self) -> f64 {
        self.all_clear_distance
    }

    /// Utility of a predicted CPA distance
    pub fn metric(&self, cpa: f64) -> f64 {
        let (min, max) = (self.collision_distance, self.all_clear_distance);
        if cpa < min {
            return MIN_UTILITY;
        }
        if cpa > max {
            return MAX_UTILITY;
        }
        if max <= min {
            return COLLISION_EDGE_UTILITY;
        }
        COLLISION_EDGE_UTILITY + (MAX_UTILITY - COLLISION_EDGE_UTILITY) * (cpa - min) / (max - min)
    }

    /// Utility of a continuous course and speed
    pub fn eval_point(&self, course: f64, speed: f64) -> f64 {
        self.metric(self.engine.eval_cpa(course, speed, self.time_on_leg))
    }
}

impl Objective for AvoidCollisionObjective<'_> {
    fn evaluate(&self, indices: &[usize]) -> f64 {
        if let Some((ix, axis)) = &self.depth {
            if self.collision_depth > 0.0 {
                let depth = indices.get(*ix).and_then(|&i| axis.value_at(i));
                if matches!(depth, Some(d) if d >= self.collision_depth) {
                    return MAX_UTILITY;
                }
            }
        }
        let course = indices.get(self.course_ix).and_then(|&i| self.course.value_at(i));
        let speed = indices.get(self.speed_ix).and_then(|&i| self.speed.value_at(i));
        match (course, speed) {
            (Some(course), Some(speed)) => self.eval_point(course, speed),
            _ => MIN_UTILITY,
        }
    }

    fn known_max(&self) -> Option<f64> {
        Some(MAX_UTILITY)
    }
}

// =============================================================================
// Preference function
// =============================================================================

/// Dense utility grid over a decision domain, row-major in axis order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceFunction {
    domain: DecisionDomain,
    utilities: Vec<f64>,
    weight: f64,
}

impl PreferenceFunction {
    /// Every cell set to `value`, weight 1
    pub fn filled(domain: &DecisionDomain, value: f64) -> Self {
        Self {
            domain: domain.clone(),
            utilities: vec![value; domain.total_points()],
            weight: 1.0,
        }
    }

    pub fn domain(&self) -> &DecisionDomain {
        &self.domain
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.utilities
    }

    pub fn len(&self) -> usize {
        self.utilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.utilities.is_empty()
    }

    /// Unweighted utility at per-axis `indices`
    pub fn utility_at(&self, indices: &[usize]) -> Option<f64> {
        let offset = self.domain.flat_index(indices)?;
        self.utilities.get(offset).copied()
    }

    /// Utility scaled by the function's weight
    pub fn weighted_at(&self, indices: &[usize]) -> Option<f64> {
        self.utility_at(indices).map(|u| u * self.weight)
    }

    pub fn set_utility(&mut self, indices: &[usize], value: f64) -> bool {
        match self.domain.flat_index(indices) {
            Some(offset) => {
                self.utilities[offset] = value;
                true
            }
            None => false,
        }
    }

    /// Lowest and highest utility, `None` when empty
    pub fn min_max(&self) -> Option<(f64, f64)> {
        let mut iter = self.utilities.iter().copied();
        let first = iter.next()?;
        Some(iter.fold((first, first), |(lo, hi), u| (lo.min(u), hi.max(u))))
    }

    /// Rescale utilities linearly onto `[lo, hi]`. A flat function is set
    /// to `hi`.
    pub fn normalize(&mut self, lo: f64, hi: f64) {
        let Some((min, max)) = self.min_max() else {
            return;
        };
        let span = max - min;
        if span <= 0.0 {
            self.utilities.iter_mut().for_each(|u| *u = hi);
            return;
        }
        let scale = (hi - lo) / span;
        for u in self.utilities.iter_mut() {
            *u = lo + (*u - min) * scale;
        }
    }

    /// Cell with the highest utility; ties go to the first cell in
    /// row-major order.
    pub fn best_cell(&self) -> Option<(Vec<usize>, f64)> {
        let mut best: Option<(usize, f64)> = None;
        for (offset, &u) in self.utilities.iter().enumerate() {
            if best.map_or(true, |(_, b)| u > b) {
                best = Some((offset, u));
            }
        }
        let (offset, u) = best?;
        Some((self.domain.unflatten(offset)?, u))
    }

    /// Every utility finite and the weight non-negative
    pub fn is_valid(&self) -> bool {
        self.weight.is_finite()
            && self.weight >= 0.0
            && self.utilities.len() == self.domain.total_points()
            && self.utilities.iter().all(|u| u.is_finite())
    }
}

// =============================================================================
// Grid reflector
// =============================================================================

/// Result of re-evaluating every plateau cell
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlateauCheck {
    /// Largest deviation above the threshold, 0 when every cell passed
    pub worst_fail: f64,
    pub cells_checked: usize,
    /// One line per failing cell
    pub failures: Vec<String>,
}

impl PlateauCheck {
    pub fn ok(&self) -> bool {
        self.worst_fail == 0.0
    }
}

/// Fills a [`PreferenceFunction`] from an [`Objective`], skipping the
/// evaluation of cells inside registered plateaus.
#[derive(Debug)]
pub struct GridReflector<'a, O: Objective> {
    objective: &'a O,
    domain: &'a DecisionDomain,
    plateaus: Vec<SafeRegion>,
    pcheck_thresh: f64,
    total_evals: usize,
    warnings: Vec<String>,
}

impl<'a, O: Objective> GridReflector<'a, O> {
    pub fn new(objective: &'a O, domain: &'a DecisionDomain) -> Self {
        Self {
            objective,
            domain,
            plateaus: Vec::new(),
            pcheck_thresh: 0.001,
            total_evals: 0,
            warnings: Vec::new(),
        }
    }

    /// Register a course/speed box as uniformly at the objective's maximum.
    /// Rejected with a warning if the domain lacks those axes, the box is
    /// out of bounds, or the objective has no known maximum.
    pub fn add_plateau(&mut self, region: SafeRegion) -> bool {
        let fits = match self.course_speed_points() {
            Some((courses, speeds)) => {
                region.course_lo <= region.course_hi
                    && region.speed_lo <= region.speed_hi
                    && region.course_hi < courses
                    && region.speed_hi < speeds
            }
            None => false,
        };
        if !fits || self.objective.known_max().is_none() {
            self.warnings.push(format!("plateau rejected: {:?}", region));
            return false;
        }
        self.plateaus.push(region);
        true
    }

    pub fn set_pcheck_thresh(&mut self, thresh: f64) {
        if thresh.is_finite() && thresh >= 0.0 {
            self.pcheck_thresh = thresh;
        }
    }

    pub fn plateaus(&self) -> &[SafeRegion] {
        &self.plateaus
    }

    /// Objective evaluations made by the last [`GridReflector::create`]
    pub fn total_evals(&self) -> usize {
        self.total_evals
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    fn course_speed_points(&self) -> Option<(usize, usize)> {
        let course = self.domain.axis_named(COURSE)?;
        let speed = self.domain.axis_named(SPEED)?;
        Some((course.points, speed.points))
    }

    /// Course-major mask of cells covered by any plateau
    fn plateau_mask(&self) -> Option<(Vec<bool>, usize)> {
        if self.plateaus.is_empty() {
            return None;
        }
        let (courses, speeds) = self.course_speed_points()?;
        let mut mask = vec![false; courses * speeds];
        for region in &self.plateaus {
            for (c, s) in region.cells() {
                mask[c * speeds + s] = true;
            }
        }
        Some((mask, speeds))
    }

    /// Build the full function
    pub fn create(&mut self) -> PreferenceFunction {
        self.total_evals = 0;
        let mut ipf = PreferenceFunction::filled(self.domain, MIN_UTILITY);
        let plateau_value = self.objective.known_max().unwrap_or(MAX_UTILITY);
        let mask = self.plateau_mask();
        let course_ix = self.domain.index_of(COURSE);
        let speed_ix = self.domain.index_of(SPEED);

        for offset in 0..ipf.utilities.len() {
            let Some(indices) = self.domain.unflatten(offset) else {
                continue;
            };
            let in_plateau = match (&mask, course_ix, speed_ix) {
                (Some((mask, speeds)), Some(c), Some(s)) => {
                    mask[indices[c] * speeds + indices[s]]
                }
                _ => false,
            };
            ipf.utilities[offset] = if in_plateau {
                plateau_value
            } else {
                self.total_evals += 1;
                self.objective.evaluate(&indices)
            };
        }

        log::trace!(
            "reflector: {} cells, {} evaluated, {} plateaus",
            ipf.len(),
            self.total_evals,
            self.plateaus.len()
        );
        ipf
    }

    /// Evaluate every plateau cell and compare against the objective's
    /// maximum. Cells differing by more than the check threshold fail.
    pub fn check_plateaus(&self) -> PlateauCheck {
        let mut check = PlateauCheck::default();
        if self.plateaus.is_empty() {
            return check;
        }
        let Some(max) = self.objective.known_max() else {
            check.worst_fail = 1.0;
            return check;
        };
        let (Some(course_ix), Some(speed_ix)) =
            (self.domain.index_of(COURSE), self.domain.index_of(SPEED))
        else {
            check.worst_fail = 1.0;
            return check;
        };

        let mut indices = vec![0; self.domain.size()];
        for region in &self.plateaus {
            for (c, s) in region.cells() {
                indices[course_ix] = c;
                indices[speed_ix] = s;
                let value = self.objective.evaluate(&indices);
                check.cells_checked += 1;
                let delta = (value - max).abs();
                if delta > self.pcheck_thresh {
                    check.worst_fail = check.worst_fail.max(delta);
                    check.failures.push(format!(
                        "course[{}] speed[{}] --> max:{}, ptval:{}, delta:{}",
                        c, s, max, value, delta
                    ));
                }
            }
        }
        check
    }
}
