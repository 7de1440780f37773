//! Per-heading unsafe speed bands and the bounded sweeps that grow safe
//! boxes out of them.
//!
//! Every sweep walks at most once around the course axis, so the total
//! work is linear in the number of course points per sweep.

use super::SafeRegion;

/// Unsafe speed indices for every course column, as an inclusive
/// `(first, last)` band, or `None` when the whole column is safe.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnBands {
    bands: Vec<Option<(usize, usize)>>,
    speed_points: usize,
    circular: bool,
}

/// Direction of travel along the course axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sweep {
    Port,
    Starboard,
}

impl ColumnBands {
    pub fn new(bands: Vec<Option<(usize, usize)>>, speed_points: usize, circular: bool) -> Self {
        Self {
            bands,
            speed_points,
            circular,
        }
    }

    pub fn columns(&self) -> usize {
        self.bands.len()
    }

    pub fn band(&self, column: usize) -> Option<(usize, usize)> {
        self.bands.get(column).copied().flatten()
    }

    pub fn as_slice(&self) -> &[Option<(usize, usize)>] {
        &self.bands
    }

    fn last_speed(&self) -> usize {
        self.speed_points.saturating_sub(1)
    }

    /// Whole column safe
    pub fn column_clear(&self, column: usize) -> bool {
        self.band(column).is_none()
    }

    /// Every speed at or above `floor` is safe in this column
    pub fn clear_from(&self, column: usize, floor: usize) -> bool {
        match self.band(column) {
            None => true,
            Some((_, hi)) => hi < floor,
        }
    }

    /// Every speed at or below `ceiling` is safe in this column
    pub fn clear_to(&self, column: usize, ceiling: usize) -> bool {
        match self.band(column) {
            None => true,
            Some((lo, _)) => lo > ceiling,
        }
    }

    /// Highest speed index that is safe in every column, together with
    /// all speeds below it. `None` if speed index 0 is unsafe somewhere.
    pub fn common_low_ceiling(&self) -> Option<usize> {
        let mut ceiling = self.last_speed();
        for band in self.bands.iter().flatten() {
            if band.0 == 0 {
                return None;
            }
            ceiling = ceiling.min(band.0 - 1);
        }
        if self.speed_points == 0 {
            None
        } else {
            Some(ceiling)
        }
    }

    fn step(&self, column: usize, dir: Sweep) -> Option<usize> {
        let n = self.columns();
        match dir {
            Sweep::Starboard => {
                if column + 1 < n {
                    Some(column + 1)
                } else if self.circular {
                    Some(0)
                } else {
                    None
                }
            }
            Sweep::Port => {
                if column > 0 {
                    Some(column - 1)
                } else if self.circular {
                    Some(n - 1)
                } else {
                    None
                }
            }
        }
    }

    /// First column satisfying `ok`, walking from `seed` (exclusive) in
    /// direction `dir`. At most one pass around the axis.
    pub fn find_outward(
        &self,
        seed: usize,
        dir: Sweep,
        ok: impl Fn(usize) -> bool,
    ) -> Option<usize> {
        let mut column = seed;
        for _ in 1..self.columns() {
            column = self.step(column, dir)?;
            if ok(column) {
                return Some(column);
            }
        }
        None
    }

    /// Maximal run of columns satisfying `ok` that contains `seed`, as
    /// `(start, len)` walking to starboard from `start`. May wrap.
    pub fn grow_run(&self, seed: usize, ok: impl Fn(usize) -> bool) -> Option<(usize, usize)> {
        let n = self.columns();
        if seed >= n || !ok(seed) {
            return None;
        }

        let mut len = 1;
        let mut start = seed;
        while len < n {
            match self.step(start, Sweep::Port) {
                Some(prev) if ok(prev) => {
                    start = prev;
                    len += 1;
                }
                _ => break,
            }
        }
        let mut end = seed;
        while len < n {
            match self.step(end, Sweep::Starboard) {
                Some(next) if ok(next) => {
                    end = next;
                    len += 1;
                }
                _ => break,
            }
        }
        Some((start, len))
    }

    /// Safe boxes from a seeded sweep: if the seed column satisfies `ok`,
    /// the run through it; otherwise the first qualifying run on each side.
    pub fn seeded_runs(&self, seed: usize, ok: impl Fn(usize) -> bool + Copy) -> Vec<(usize, usize)> {
        if let Some(run) = self.grow_run(seed, ok) {
            return vec![run];
        }
        let mut runs = Vec::new();
        for dir in [Sweep::Port, Sweep::Starboard] {
            if let Some(column) = self.find_outward(seed, dir, ok) {
                if let Some(run) = self.grow_run(column, ok) {
                    if !runs.contains(&run) {
                        runs.push(run);
                    }
                }
            }
        }
        runs
    }

    /// Turn a course run and a speed span into one or two boxes, splitting
    /// where the run wraps past the last course column.
    pub fn run_to_regions(
        &self,
        run: (usize, usize),
        speed_lo: usize,
        speed_hi: usize,
    ) -> Vec<SafeRegion> {
        let n = self.columns();
        let (start, len) = run;
        if len == 0 || speed_lo > speed_hi || speed_hi > self.last_speed() {
            return Vec::new();
        }
        if len >= n {
            return vec![SafeRegion::new(0, n - 1, speed_lo, speed_hi)];
        }
        let end = start + len - 1;
        if end < n {
            vec![SafeRegion::new(start, end, speed_lo, speed_hi)]
        } else {
            vec![
                SafeRegion::new(start, n - 1, speed_lo, speed_hi),
                SafeRegion::new(0, end - n, speed_lo, speed_hi),
            ]
        }
    }
}
