//! Fixed-size per-heading lookup tables.
//!
//! A table always holds exactly `N` entries covering one full turn, so the
//! entry for a heading is found by `floor(heading * N / 360) mod N`. Tables
//! are built once per engine reset and never resized.

use crate::geometry::angle360;

/// Entries in the integer-degree tables used by every candidate query.
pub const HEADING_CACHE_SIZE: usize = 360;

/// Entries in the tenth-of-a-degree tables.
pub const FINE_CACHE_SIZE: usize = 3600;

/// A lookup table with one entry per `360 / N` degrees of heading.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadingTable<const N: usize> {
    values: Vec<f64>,
}

/// One entry per integer degree.
pub type DegreeTable = HeadingTable<HEADING_CACHE_SIZE>;

/// One entry per tenth of a degree.
pub type FineTable = HeadingTable<FINE_CACHE_SIZE>;

impl<const N: usize> HeadingTable<N> {
    /// Entries per degree of heading
    #[inline]
    pub fn resolution() -> f64 {
        N as f64 / 360.0
    }

    /// A table of zeros
    pub fn zeroed() -> Self {
        Self { values: vec![0.0; N] }
    }

    /// A table filled with a constant
    pub fn filled(value: f64) -> Self {
        Self {
            values: vec![value; N],
        }
    }

    /// Build a table by evaluating `f` at the heading of each entry.
    pub fn from_fn(mut f: impl FnMut(f64) -> f64) -> Self {
        let res = Self::resolution();
        let values = (0..N).map(|i| f(i as f64 / res)).collect();
        Self { values }
    }

    /// Index of the entry covering `heading`. Headings outside `[0, 360)`
    /// are wrapped first.
    #[inline]
    pub fn index(heading: f64) -> usize {
        let h = if (0.0..360.0).contains(&heading) {
            heading
        } else {
            angle360(heading)
        };
        ((h * Self::resolution()).floor() as usize) % N
    }

    /// Heading (degrees) of the entry at `index`
    #[inline]
    pub fn heading_of(index: usize) -> f64 {
        (index % N) as f64 / Self::resolution()
    }

    /// Value for a heading in degrees
    #[inline]
    pub fn get(&self, heading: f64) -> f64 {
        self.values[Self::index(heading)]
    }

    /// Value at a raw index (wrapped)
    #[inline]
    pub fn at(&self, index: usize) -> f64 {
        self.values[index % N]
    }

    pub fn len(&self) -> usize {
        N
    }

    pub fn is_empty(&self) -> bool {
        N == 0
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }
}

impl<const N: usize> Default for HeadingTable<N> {
    fn default() -> Self {
        Self::zeroed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_lengths_fixed() {
        assert_eq!(DegreeTable::zeroed().len(), 360);
        assert_eq!(FineTable::zeroed().len(), 3600);
        assert_eq!(DegreeTable::from_fn(|h| h).as_slice().len(), 360);
    }

    #[test]
    fn test_index_floors_and_wraps() {
        assert_eq!(DegreeTable::index(0.0), 0);
        assert_eq!(DegreeTable::index(45.9), 45);
        assert_eq!(DegreeTable::index(359.99), 359);
        assert_eq!(DegreeTable::index(360.0), 0);
        assert_eq!(DegreeTable::index(-1.0), 359);
        assert_eq!(DegreeTable::index(725.5), 5);
        assert_eq!(FineTable::index(45.97), 459);
    }

    #[test]
    fn test_from_fn_headings() {
        let t = DegreeTable::from_fn(|h| h * 2.0);
        assert_eq!(t.get(10.4), 20.0);
        let f = FineTable::from_fn(|h| h);
        assert!((f.at(455) - 45.5).abs() < 1e-12);
        assert_eq!(FineTable::heading_of(10), 1.0);
    }
}
