//! Dead-reckoning of a contact from its last position report.
//!
//! The contact keeps its reported heading. It holds its reported speed for
//! `decay_start` seconds after the report, then slows linearly to a stop at
//! `decay_end`, so a contact that stops reporting does not run off forever.

use serde::{Deserialize, Serialize};

use crate::error::ExtrapolationError;
use crate::geometry::{heading_vector, Kinematics};

pub const DEFAULT_DECAY_START: f64 = 15.0;
pub const DEFAULT_DECAY_END: f64 = 30.0;

/// One contact report: pose plus the time it was taken
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionReport {
    pub kinematics: Kinematics,
    pub utc: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearExtrapolator {
    report: Option<PositionReport>,
    decay_start: f64,
    decay_end: f64,
}

impl Default for LinearExtrapolator {
    fn default() -> Self {
        Self {
            report: None,
            decay_start: DEFAULT_DECAY_START,
            decay_end: DEFAULT_DECAY_END,
        }
    }
}

impl LinearExtrapolator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Change the decay window. Requires `0 <= start <= end`; the previous
    /// window is kept on error.
    pub fn set_decay(&mut self, start: f64, end: f64) -> Result<(), ExtrapolationError> {
        if !(start.is_finite() && end.is_finite()) || start < 0.0 || start > end {
            return Err(ExtrapolationError::InvalidDecay { start, end });
        }
        self.decay_start = start;
        self.decay_end = end;
        Ok(())
    }

    pub fn decay(&self) -> (f64, f64) {
        (self.decay_start, self.decay_end)
    }

    pub fn set_position(&mut self, kinematics: Kinematics, utc: f64) {
        self.report = Some(PositionReport { kinematics, utc });
    }

    pub fn report(&self) -> Option<&PositionReport> {
        self.report.as_ref()
    }

    /// Distance run in `elapsed` seconds after the report
    fn distance_run(&self, speed: f64, elapsed: f64) -> f64 {
        let cruise = elapsed.min(self.decay_start);
        let mut distance = speed * cruise;
        let window = self.decay_end - self.decay_start;
        if elapsed > self.decay_start && window > 0.0 {
            // Speed falls as speed * (1 - tau / window)
            let tau = (elapsed - self.decay_start).min(window);
            distance += speed * (tau - tau * tau / (2.0 * window));
        }
        distance
    }

    /// Extrapolated speed `elapsed` seconds after the report
    fn speed_after(&self, speed: f64, elapsed: f64) -> f64 {
        if elapsed <= self.decay_start {
            return speed;
        }
        let window = self.decay_end - self.decay_start;
        if window <= 0.0 || elapsed >= self.decay_end {
            return 0.0;
        }
        speed * (1.0 - (elapsed - self.decay_start) / window)
    }

    /// Contact position at `time`
    pub fn position(&self, time: f64) -> Result<(f64, f64), ExtrapolationError> {
        let k = self.extrapolate(time)?;
        Ok((k.x, k.y))
    }

    /// Contact pose at `time`: extrapolated position, reported heading and
    /// decayed speed.
    pub fn extrapolate(&self, time: f64) -> Result<Kinematics, ExtrapolationError> {
        let report = self.report.ok_or(ExtrapolationError::NoReport)?;
        let elapsed = time - report.utc;
        if !elapsed.is_finite() || elapsed < 0.0 {
            return Err(ExtrapolationError::TimeBeforeReport {
                requested: time,
                reported: report.utc,
            });
        }

        let k = report.kinematics;
        let distance = self.distance_run(k.speed, elapsed);
        let (east, north) = heading_vector(k.heading);
        Ok(Kinematics::new(
            k.x + east * distance,
            k.y + north * distance,
            k.heading,
            self.speed_after(k.speed, elapsed),
        ))
    }
}
