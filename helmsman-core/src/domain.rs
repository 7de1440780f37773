//! Discretized Decision Domain
//!
//! An ordered set of named axes (normally `course`, `speed` and optionally
//! `depth`), each with a low and high bound and a number of equally spaced
//! grid points. Grid coordinates are plain indices into each axis.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Name of the heading axis
pub const COURSE: &str = "course";
/// Name of the speed axis
pub const SPEED: &str = "speed";
/// Name of the depth axis
pub const DEPTH: &str = "depth";

/// How a continuous value maps onto the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapMode {
    /// Largest grid point at or below the value
    Lower,
    /// Closest grid point, ties go down
    Nearest,
    /// Smallest grid point at or above the value
    Higher,
}

impl Default for SnapMode {
    fn default() -> Self {
        SnapMode::Nearest
    }
}

/// One named axis of the decision domain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainAxis {
    pub name: String,
    pub low: f64,
    pub high: f64,
    pub points: usize,
}

impl DomainAxis {
    /// Spacing between adjacent grid points. Zero on a one-point axis.
    pub fn delta(&self) -> f64 {
        if self.points > 1 {
            (self.high - self.low) / (self.points - 1) as f64
        } else {
            0.0
        }
    }

    /// Value of grid point `index`
    pub fn value_at(&self, index: usize) -> Option<f64> {
        if index >= self.points {
            return None;
        }
        Some(self.low + self.delta() * index as f64)
    }

    /// Grid index for `value`, snapped per `snap` and clamped to the axis.
    pub fn discrete_index(&self, value: f64, snap: SnapMode) -> usize {
        let delta = self.delta();
        if delta <= 0.0 || value <= self.low {
            return 0;
        }
        let last = self.points - 1;
        if value >= self.high {
            return last;
        }
        let raw = (value - self.low) / delta;
        // Absorb rounding noise so exact grid values never snap away
        let nearest = raw.round();
        let pos = if (raw - nearest).abs() < 1e-9 { nearest } else { raw };
        let index = match snap {
            SnapMode::Lower => pos.floor(),
            SnapMode::Higher => pos.ceil(),
            SnapMode::Nearest => {
                let down = pos.floor();
                if pos - down > 0.5 {
                    down + 1.0
                } else {
                    down
                }
            }
        };
        (index as usize).min(last)
    }

    /// Largest grid value strictly below `value`
    pub fn next_lower_value(&self, value: f64) -> Option<f64> {
        let index = self.discrete_index(value, SnapMode::Higher);
        let candidate = self.value_at(index)?;
        if candidate < value - 1e-9 {
            return Some(candidate);
        }
        if index == 0 {
            return None;
        }
        self.value_at(index - 1)
    }

    /// Smallest grid value strictly above `value`
    pub fn next_higher_value(&self, value: f64) -> Option<f64> {
        let index = self.discrete_index(value, SnapMode::Lower);
        let candidate = self.value_at(index)?;
        if candidate > value + 1e-9 {
            return Some(candidate);
        }
        self.value_at(index + 1)
    }

    /// True for a course axis that covers the whole circle, so index 0
    /// neighbours the last index.
    pub fn is_circular(&self) -> bool {
        self.name == COURSE && self.points > 1 && (self.high - self.low + self.delta()) >= 360.0 - 1e-9
    }
}

/// The (course, speed[, depth]) grid a behavior expresses preferences over
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DecisionDomain {
    axes: Vec<DomainAxis>,
}

impl DecisionDomain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Course over the full circle and speed from zero to `max_speed`.
    pub fn course_speed(
        course_points: usize,
        max_speed: f64,
        speed_points: usize,
    ) -> Result<Self, DomainError> {
        let mut domain = DecisionDomain::new();
        let course_high = 360.0 - 360.0 / course_points.max(1) as f64;
        domain.add_axis(COURSE, 0.0, course_high, course_points)?;
        domain.add_axis(SPEED, 0.0, max_speed, speed_points)?;
        Ok(domain)
    }

    /// Append an axis. Names must be unique, bounds finite and ordered, and
    /// every axis needs at least one point.
    pub fn add_axis(
        &mut self,
        name: &str,
        low: f64,
        high: f64,
        points: usize,
    ) -> Result<(), DomainError> {
        if self.index_of(name).is_some() {
            return Err(DomainError::DuplicateAxis(name.to_string()));
        }
        if !low.is_finite() || !high.is_finite() || low > high {
            return Err(DomainError::InvalidBounds {
                name: name.to_string(),
                low,
                high,
            });
        }
        if points == 0 || (points == 1 && low != high) {
            return Err(DomainError::InvalidPoints {
                name: name.to_string(),
                points,
            });
        }
        self.axes.push(DomainAxis {
            name: name.to_string(),
            low,
            high,
            points,
        });
        Ok(())
    }

    /// Number of axes
    pub fn size(&self) -> usize {
        self.axes.len()
    }

    /// Total number of grid cells
    pub fn total_points(&self) -> usize {
        if self.axes.is_empty() {
            return 0;
        }
        self.axes.iter().map(|a| a.points).product()
    }

    pub fn axes(&self) -> &[DomainAxis] {
        &self.axes
    }

    pub fn axis(&self, index: usize) -> Option<&DomainAxis> {
        self.axes.get(index)
    }

    pub fn axis_named(&self, name: &str) -> Option<&DomainAxis> {
        self.axes.iter().find(|a| a.name == name)
    }

    /// Position of the axis called `name`
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.axes.iter().position(|a| a.name == name)
    }

    pub fn has_axis(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    pub fn value_at(&self, axis: usize, index: usize) -> Option<f64> {
        self.axes.get(axis)?.value_at(index)
    }

    pub fn discrete_index(&self, axis: usize, value: f64, snap: SnapMode) -> Option<usize> {
        Some(self.axes.get(axis)?.discrete_index(value, snap))
    }

    pub fn next_lower_value(&self, axis: usize, value: f64) -> Option<f64> {
        self.axes.get(axis)?.next_lower_value(value)
    }

    pub fn next_higher_value(&self, axis: usize, value: f64) -> Option<f64> {
        self.axes.get(axis)?.next_higher_value(value)
    }

    pub fn is_circular(&self, axis: usize) -> bool {
        self.axes.get(axis).map(|a| a.is_circular()).unwrap_or(false)
    }

    /// A domain holding only the named axes, in the order given.
    pub fn sub_domain(&self, names: &[&str]) -> Result<DecisionDomain, DomainError> {
        let mut sub = DecisionDomain::new();
        for name in names {
            let axis = self
                .axis_named(name)
                .ok_or_else(|| DomainError::MissingAxis(name.to_string()))?;
            sub.add_axis(&axis.name, axis.low, axis.high, axis.points)?;
        }
        Ok(sub)
    }

    /// Convert per-axis indices into a flat row-major cell offset.
    pub fn flat_index(&self, indices: &[usize]) -> Option<usize> {
        if indices.len() != self.axes.len() {
            return None;
        }
        let mut offset = 0;
        for (axis, &i) in self.axes.iter().zip(indices) {
            if i >= axis.points {
                return None;
            }
            offset = offset * axis.points + i;
        }
        Some(offset)
    }

    /// Inverse of [`DecisionDomain::flat_index`]
    pub fn unflatten(&self, mut offset: usize) -> Option<Vec<usize>> {
        if offset >= self.total_points() {
            return None;
        }
        let mut indices = vec![0; self.axes.len()];
        for (slot, axis) in indices.iter_mut().zip(self.axes.iter()).rev() {
            *slot = offset % axis.points;
            offset /= axis.points;
        }
        Some(indices)
    }
}
