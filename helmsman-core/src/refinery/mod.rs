//! Decision-Space Refinery
//!
//! Finds axis-aligned boxes of the (course, speed) grid that are certified
//! safe against one contact, so the objective builder can give them a single
//! utility instead of evaluating every cell.
//!
//! # Soundness
//!
//! Every cell inside a returned [`SafeRegion`] has
//! `engine.eval_cpa(course, speed, horizon) >= threshold`. Safe cells that
//! no region covers are allowed; callers evaluate those directly.
//!
//! # Approach
//!
//! For a fixed heading the unsafe ownship speeds form a single interval
//! (see [`cone`](self::cone)), computed in closed form from the engine's
//! heading tables. Snapping that interval outward onto the speed grid gives
//! an unsafe band per course column. The situation is then classified into
//! one of four [`LogicCase`]s, which pick the seed headings and speed levels
//! the sweeps start from:
//!
//! - a low-speed box spanning every heading, up to the lowest unsafe speed
//! - wedges of wholly safe headings grown from each seed
//! - speed-banded boxes grown from each seed at a few speed levels
//!
//! # Example
//!
//! ```rust,ignore
//! use helmsman_core::refinery::find_safe_regions;
//!
//! let regions = find_safe_regions(&engine, &domain, 75.0, 120.0);
//! for region in &regions {
//!     println!("safe: course {:?} speed {:?}", region.course_range(), region.speed_range());
//! }
//! ```

mod cone;
mod sweep;

pub use cone::{Interval, UnsafeCone};
pub use sweep::{ColumnBands, Sweep};

use serde::{Deserialize, Serialize};

use crate::cpa::CpaEngine;
use crate::domain::{DecisionDomain, DomainAxis, SnapMode, COURSE, DEPTH, SPEED};
use crate::error::RefineError;
use crate::geometry::angle360;

/// Relative margin added to the threshold so cells that sit on the
/// boundary within rounding error are never certified.
const THRESHOLD_MARGIN: f64 = 1e-6;

/// Which search strategy applies, from ownship's position relative to the
/// contact's beam line and its track.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LogicCase {
    /// Behind the beam, track offset at least the threshold
    AftOutCone,
    /// Behind the beam, within the threshold of the contact's track
    AftInCone,
    /// Ahead of the beam, track offset at least the threshold
    ForeOutCone,
    /// Ahead of the beam, within the threshold of the contact's track
    ForeInCone,
}

impl LogicCase {
    pub fn is_fore(&self) -> bool {
        matches!(self, LogicCase::ForeOutCone | LogicCase::ForeInCone)
    }

    pub fn in_cone(&self) -> bool {
        matches!(self, LogicCase::AftInCone | LogicCase::ForeInCone)
    }
}

/// Classify ownship's situation relative to the contact.
///
/// On the beam counts as fore. Ownship is in the collision cone when its
/// distance to the contact's track line is below `threshold`.
pub fn classify(engine: &CpaEngine, threshold: f64) -> LogicCase {
    let aft = engine.aft_of_contact() && !engine.fore_of_contact();
    let in_cone = engine.range_gamma() < threshold;
    match (aft, in_cone) {
        (true, false) => LogicCase::AftOutCone,
        (true, true) => LogicCase::AftInCone,
        (false, false) => LogicCase::ForeOutCone,
        (false, true) => LogicCase::ForeInCone,
    }
}

/// Inclusive box of grid indices over the course and speed axes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SafeRegion {
    pub course_lo: usize,
    pub course_hi: usize,
    pub speed_lo: usize,
    pub speed_hi: usize,
}

impl SafeRegion {
    pub fn new(course_lo: usize, course_hi: usize, speed_lo: usize, speed_hi: usize) -> Self {
        Self {
            course_lo,
            course_hi,
            speed_lo,
            speed_hi,
        }
    }

    pub fn course_range(&self) -> std::ops::RangeInclusive<usize> {
        self.course_lo..=self.course_hi
    }

    pub fn speed_range(&self) -> std::ops::RangeInclusive<usize> {
        self.speed_lo..=self.speed_hi
    }

    pub fn contains(&self, course: usize, speed: usize) -> bool {
        self.course_range().contains(&course) && self.speed_range().contains(&speed)
    }

    /// True if `other` lies entirely inside this box
    pub fn encloses(&self, other: &SafeRegion) -> bool {
        self.course_lo <= other.course_lo
            && self.course_hi >= other.course_hi
            && self.speed_lo <= other.speed_lo
            && self.speed_hi >= other.speed_hi
    }

    pub fn cell_count(&self) -> usize {
        (self.course_hi + 1 - self.course_lo) * (self.speed_hi + 1 - self.speed_lo)
    }

    /// Every `(course, speed)` index pair in the box
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.course_range()
            .flat_map(move |c| self.speed_range().map(move |s| (c, s)))
    }
}

/// Regions plus the diagnostics the behavior reports
#[derive(Debug, Clone)]
pub struct RefineOutcome {
    pub regions: Vec<SafeRegion>,
    pub logic_case: LogicCase,
    pub bands: ColumnBands,
    /// Per-heading band computations made
    pub queries: usize,
}

/// Safe-region finder configured with the objective's distances and the
/// look-ahead horizon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Refinery {
    /// Collision distance; only validated here
    pub min_dist: f64,
    /// Regions are certified to keep the CPA at or above this
    pub max_dist: f64,
    pub time_horizon: f64,
}

impl Refinery {
    pub fn new(min_dist: f64, max_dist: f64, time_horizon: f64) -> Self {
        Self {
            min_dist,
            max_dist,
            time_horizon,
        }
    }

    /// Check distances, engine and domain. Returns the course and speed
    /// axis positions.
    pub fn validate(
        &self,
        engine: &CpaEngine,
        domain: &DecisionDomain,
    ) -> Result<(usize, usize), RefineError> {
        let (min, max) = (self.min_dist, self.max_dist);
        if !(min.is_finite() && max.is_finite()) || min < 0.0 || max < 0.0 || min > max {
            return Err(RefineError::InconsistentDistances { min, max });
        }
        if !self.time_horizon.is_finite() || self.time_horizon < 0.0 {
            return Err(RefineError::InvalidHorizon(self.time_horizon));
        }
        if !engine.is_initialized() {
            return Err(RefineError::EngineNotInitialized);
        }
        if domain.has_axis(DEPTH) || domain.size() > 2 {
            return Err(RefineError::UnsupportedAxes(domain.size()));
        }
        let course_ix = domain.index_of(COURSE).ok_or(RefineError::MissingAxis(COURSE))?;
        let speed_ix = domain.index_of(SPEED).ok_or(RefineError::MissingAxis(SPEED))?;
        let speed = domain.axis(speed_ix).ok_or(RefineError::MissingAxis(SPEED))?;
        if speed.low < 0.0 {
            return Err(RefineError::NegativeSpeedAxis(speed.low));
        }
        Ok((course_ix, speed_ix))
    }

    /// Find safe regions for the contact held by `engine`.
    pub fn refine(
        &self,
        engine: &CpaEngine,
        domain: &DecisionDomain,
    ) -> Result<RefineOutcome, RefineError> {
        let (course_ix, speed_ix) = self.validate(engine, domain)?;
        let course = domain.axis(course_ix).ok_or(RefineError::MissingAxis(COURSE))?;
        let speed = domain.axis(speed_ix).ok_or(RefineError::MissingAxis(SPEED))?;

        let threshold = self.max_dist * (1.0 + THRESHOLD_MARGIN) + THRESHOLD_MARGIN;
        let logic_case = classify(engine, self.max_dist);
        let circular = course.is_circular();

        let (bands, queries) = match UnsafeCone::new(engine, threshold, self.time_horizon) {
            Some(cone) => (
                compute_bands(engine, course, speed, &cone, circular),
                course.points,
            ),
            None if self.time_horizon == 0.0 && engine.range() > threshold => {
                // No look-ahead: every candidate keeps the current range
                let bands = ColumnBands::new(vec![None; course.points], speed.points, circular);
                (bands, 0)
            }
            None => {
                log::debug!(
                    "refinery: range {:.1} within threshold {:.1}, nothing certifiable",
                    engine.range(),
                    self.max_dist
                );
                let all = Some((0, speed.points - 1));
                let bands = ColumnBands::new(vec![all; course.points], speed.points, circular);
                return Ok(RefineOutcome {
                    regions: Vec::new(),
                    logic_case,
                    bands,
                    queries: 0,
                });
            }
        };

        let regions = build_regions(engine, course, speed, &bands, logic_case);
        log::debug!(
            "refinery: case {} produced {} regions covering {} cells",
            logic_case,
            regions.len(),
            regions.iter().map(|r| r.cell_count()).sum::<usize>()
        );
        Ok(RefineOutcome {
            regions,
            logic_case,
            bands,
            queries,
        })
    }
}

/// Safe regions for `engine` over `domain`, or an empty list (with a
/// logged warning) when the inputs are unusable.
pub fn find_safe_regions(
    engine: &CpaEngine,
    domain: &DecisionDomain,
    threshold: f64,
    time_horizon: f64,
) -> Vec<SafeRegion> {
    match Refinery::new(0.0, threshold, time_horizon).refine(engine, domain) {
        Ok(outcome) => outcome.regions,
        Err(e) => {
            log::warn!("refinery: {}", e);
            Vec::new()
        }
    }
}

// =============================================================================
// Band computation
// =============================================================================

fn compute_bands(
    engine: &CpaEngine,
    course: &DomainAxis,
    speed: &DomainAxis,
    cone: &UnsafeCone,
    circular: bool,
) -> ColumnBands {
    let bands = (0..course.points)
        .map(|ci| {
            let heading = course.value_at(ci).unwrap_or(course.low);
            cone.unsafe_speeds(engine.heading_unit(heading))
                .and_then(|interval| snap_band(speed, interval))
        })
        .collect();
    ColumnBands::new(bands, speed.points, circular)
}

/// Map an open unsafe speed interval onto grid indices, rounding the low
/// end down and the high end up so every unsafe grid speed is included.
fn snap_band(speed: &DomainAxis, interval: Interval) -> Option<(usize, usize)> {
    let slack = 1e-9 * (1.0 + speed.high.abs());
    if interval.hi < speed.low - slack || interval.lo > speed.high + slack {
        return None;
    }
    let last = speed.points - 1;
    let first = if interval.lo <= speed.low {
        0
    } else {
        speed.discrete_index(interval.lo, SnapMode::Lower)
    };
    let end = if interval.hi >= speed.high {
        last
    } else {
        speed.discrete_index(interval.hi, SnapMode::Higher)
    };
    Some((first, end.max(first)))
}

// =============================================================================
// Region construction
// =============================================================================

/// Seed headings for each case, in search order
fn seed_headings(engine: &CpaEngine, case: LogicCase) -> Vec<f64> {
    let cnh = engine.contact_heading();
    let flee = engine.bearing_contact_to_ownship();
    let off_track = angle360(engine.theta_gamma() + 180.0);
    let reciprocal = angle360(cnh + 180.0);
    match case {
        LogicCase::AftOutCone => vec![flee, cnh, off_track],
        LogicCase::AftInCone => vec![flee, reciprocal, off_track],
        LogicCase::ForeOutCone => vec![cnh, flee, off_track],
        LogicCase::ForeInCone => vec![reciprocal, flee, off_track],
    }
}

/// Speed-index floors for the banded sweeps: the contact's speed and the
/// thirds above it, plus quarters of the axis when inside the cone.
fn speed_levels(engine: &CpaEngine, speed: &DomainAxis, case: LogicCase) -> Vec<usize> {
    let last = speed.points - 1;
    let mut levels = Vec::new();
    if engine.contact_speed() <= speed.high {
        let k0 = speed.discrete_index(engine.contact_speed(), SnapMode::Higher);
        let span = last - k0.min(last);
        levels.extend([k0, k0 + span / 3, k0 + 2 * span / 3]);
    }
    if case.in_cone() {
        levels.extend([last / 4, last / 2, 3 * last / 4, last]);
    }
    levels.retain(|&k| k <= last);
    levels.sort_unstable();
    levels.dedup();
    levels
}

fn build_regions(
    engine: &CpaEngine,
    course: &DomainAxis,
    speed: &DomainAxis,
    bands: &ColumnBands,
    case: LogicCase,
) -> Vec<SafeRegion> {
    let n = course.points;
    let last_speed = speed.points - 1;
    let mut regions = Vec::new();

    // Low speeds safe on every heading
    if let Some(ceiling) = bands.common_low_ceiling() {
        regions.extend(bands.run_to_regions((0, n), 0, ceiling));
    }

    let seeds: Vec<usize> = seed_headings(engine, case)
        .into_iter()
        .map(|h| course.discrete_index(h, SnapMode::Nearest))
        .collect();

    // Wedges of headings safe at every speed
    for &seed in &seeds {
        if let Some(run) = bands.grow_run(seed, |c| bands.column_clear(c)) {
            regions.extend(bands.run_to_regions(run, 0, last_speed));
        }
    }

    // Speed-banded boxes
    let mut levels = speed_levels(engine, speed, case);
    for &seed in &seeds {
        if let Some((_, hi)) = bands.band(seed) {
            if hi < last_speed {
                levels.push(hi + 1);
            }
        }
    }
    levels.sort_unstable();
    levels.dedup();

    for &seed in &seeds {
        for &level in &levels {
            for run in bands.seeded_runs(seed, |c| bands.clear_from(c, level)) {
                regions.extend(bands.run_to_regions(run, level, last_speed));
            }
        }
    }

    prune(regions)
}

/// Drop duplicates and boxes enclosed by another box.
fn prune(mut regions: Vec<SafeRegion>) -> Vec<SafeRegion> {
    regions.sort_by_key(|r| (r.course_lo, r.speed_lo, r.course_hi, r.speed_hi));
    regions.dedup();
    let keep: Vec<bool> = regions
        .iter()
        .enumerate()
        .map(|(i, r)| {
            !regions
                .iter()
                .enumerate()
                .any(|(j, other)| i != j && other.encloses(r))
        })
        .collect();
    regions
        .into_iter()
        .zip(keep)
        .filter(|(_, k)| *k)
        .map(|(r, _)| r)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Kinematics;

    const THRESHOLD: f64 = 100.0;
    const HORIZON: f64 = 120.0;

    fn domain() -> DecisionDomain {
        DecisionDomain::course_speed(36, 9.0, 10).unwrap()
    }

    fn contact() -> Kinematics {
        Kinematics::new(0.0, 0.0, 0.0, 4.0)
    }

    fn assert_sound(engine: &CpaEngine, domain: &DecisionDomain, regions: &[SafeRegion]) {
        for region in regions {
            for (ci, si) in region.cells() {
                let h = domain.value_at(0, ci).unwrap();
                let v = domain.value_at(1, si).unwrap();
                let cpa = engine.eval_cpa(h, v, HORIZON);
                assert!(
                    cpa >= THRESHOLD,
                    "region {:?} covers unsafe cell h {} v {} cpa {}",
                    region,
                    h,
                    v,
                    cpa
                );
            }
        }
    }

    #[test]
    fn test_classify_four_cases() {
        let cases = [
            ((300.0, -400.0), LogicCase::AftOutCone),
            ((50.0, -400.0), LogicCase::AftInCone),
            ((300.0, 400.0), LogicCase::ForeOutCone),
            ((50.0, 400.0), LogicCase::ForeInCone),
        ];
        for ((x, y), expected) in cases {
            let engine = CpaEngine::new(&contact(), x, y);
            assert_eq!(classify(&engine, THRESHOLD), expected);
        }
    }

    #[test]
    fn test_exhaustive_soundness_four_cases() {
        let domain = domain();
        let positions = [(300.0, -400.0), (50.0, -400.0), (300.0, 400.0), (50.0, 400.0)];
        for (x, y) in positions {
            let engine = CpaEngine::new(&contact(), x, y);
            let outcome = Refinery::new(10.0, THRESHOLD, HORIZON)
                .refine(&engine, &domain)
                .unwrap();
            assert!(!outcome.regions.is_empty(), "no regions at ({}, {})", x, y);
            assert_sound(&engine, &domain, &outcome.regions);
        }
    }

    #[test]
    fn test_soundness_many_geometries() {
        let domain = domain();
        for bearing in (0..360).step_by(20) {
            for heading in (0..360).step_by(45) {
                for &range in &[150.0, 400.0, 900.0] {
                    let b = (bearing as f64).to_radians();
                    let contact = Kinematics::new(range * b.sin(), range * b.cos(), heading as f64, 3.0);
                    let engine = CpaEngine::new(&contact, 0.0, 0.0);
                    let regions = find_safe_regions(&engine, &domain, THRESHOLD, HORIZON);
                    assert_sound(&engine, &domain, &regions);
                }
            }
        }
    }

    #[test]
    fn test_regions_inside_grid_and_not_enclosed() {
        let domain = domain();
        let engine = CpaEngine::new(&contact(), 50.0, 400.0);
        let regions = find_safe_regions(&engine, &domain, THRESHOLD, HORIZON);
        for (i, r) in regions.iter().enumerate() {
            assert!(r.course_lo <= r.course_hi && r.course_hi < 36);
            assert!(r.speed_lo <= r.speed_hi && r.speed_hi < 10);
            for (j, other) in regions.iter().enumerate() {
                assert!(i == j || !other.encloses(r));
            }
        }
    }

    #[test]
    fn test_far_opening_contact_fully_covered() {
        let domain = domain();
        let engine = CpaEngine::new(&Kinematics::new(0.0, 5000.0, 0.0, 5.0), 0.0, 0.0);
        let regions = find_safe_regions(&engine, &domain, THRESHOLD, HORIZON);
        assert_eq!(regions, vec![SafeRegion::new(0, 35, 0, 9)]);
    }

    #[test]
    fn test_within_threshold_returns_nothing() {
        let domain = domain();
        let engine = CpaEngine::new(&contact(), 30.0, 30.0);
        let outcome = Refinery::new(0.0, THRESHOLD, HORIZON).refine(&engine, &domain).unwrap();
        assert!(outcome.regions.is_empty());
    }

    #[test]
    fn test_zero_horizon_everything_safe() {
        let domain = domain();
        let engine = CpaEngine::new(&contact(), 0.0, 400.0);
        let regions = find_safe_regions(&engine, &domain, THRESHOLD, 0.0);
        assert_eq!(regions, vec![SafeRegion::new(0, 35, 0, 9)]);
    }

    #[test]
    fn test_validation_failures() {
        let domain = domain();
        let engine = CpaEngine::new(&contact(), 0.0, 400.0);

        let err = Refinery::new(0.0, 50.0, 60.0).refine(&CpaEngine::default(), &domain);
        assert!(matches!(err, Err(RefineError::EngineNotInitialized)));

        let err = Refinery::new(80.0, 50.0, 60.0).refine(&engine, &domain);
        assert!(matches!(err, Err(RefineError::InconsistentDistances { .. })));

        let err = Refinery::new(-1.0, 50.0, 60.0).refine(&engine, &domain);
        assert!(matches!(err, Err(RefineError::InconsistentDistances { .. })));

        let err = Refinery::new(0.0, 50.0, -5.0).refine(&engine, &domain);
        assert!(matches!(err, Err(RefineError::InvalidHorizon(_))));

        let mut no_speed = DecisionDomain::new();
        no_speed.add_axis(COURSE, 0.0, 350.0, 36).unwrap();
        let err = Refinery::new(0.0, 50.0, 60.0).refine(&engine, &no_speed);
        assert!(matches!(err, Err(RefineError::MissingAxis(SPEED))));

        let mut with_depth = domain.clone();
        with_depth.add_axis(DEPTH, 0.0, 100.0, 11).unwrap();
        let err = Refinery::new(0.0, 50.0, 60.0).refine(&engine, &with_depth);
        assert!(matches!(err, Err(RefineError::UnsupportedAxes(3))));

        // The free function degrades to an empty list
        assert!(find_safe_regions(&CpaEngine::default(), &domain, 50.0, 60.0).is_empty());
    }

    #[test]
    fn test_fine_grid_soundness() {
        let mut domain = DecisionDomain::new();
        domain.add_axis(COURSE, 0.0, 359.0, 360).unwrap();
        domain.add_axis(SPEED, 0.0, 6.0, 31).unwrap();
        let engine = CpaEngine::new(&Kinematics::new(-150.0, 350.0, 120.0, 3.5), 0.0, 0.0);
        let outcome = Refinery::new(0.0, THRESHOLD, HORIZON).refine(&engine, &domain).unwrap();
        assert!(!outcome.regions.is_empty());
        assert_sound(&engine, &domain, &outcome.regions);
        // Covers a meaningful share of the safe cells
        let covered: usize = outcome.regions.iter().map(|r| r.cell_count()).sum();
        assert!(covered > 0);
    }

    #[test]
    fn test_logic_case_strings() {
        assert_eq!(LogicCase::ForeInCone.to_string(), "fore_in_cone");
        assert_eq!("aft_out_cone".parse::<LogicCase>().unwrap(), LogicCase::AftOutCone);
        assert!(LogicCase::ForeOutCone.is_fore());
        assert!(LogicCase::AftInCone.in_cone());
    }
}
