//! Square, row-major grid stored as one flat buffer with a stride.
//!
//! A `Grid` only exists on the coordinator: before distribution and after
//! assembly. Workers never hold one.

use crate::relax_error::RelaxError;
use itertools::Itertools;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::fmt;

/// Fixed 5x5 data the solver has always been checked against.
const SAMPLE: [[f64; 5]; 5] = [
    [8.404724, 7.569421, 2.292463, 9.467519, 4.212304],
    [5.116189, 9.763912, 1.046068, 8.074366, 7.547208],
    [2.94646, 8.876242, 8.991023, 8.288983, 6.927029],
    [9.551567, 7.468525, 7.99688, 9.027695, 5.143387],
    [3.751949, 5.633357, 7.095444, 9.030868, 6.725292],
];

#[derive(Clone, Debug, PartialEq)]
pub struct Grid {
    dimension: usize,
    values: Vec<f64>,
}

impl Grid {
    /// Wrap a flat row-major buffer of `dimension * dimension` values.
    pub fn from_values(dimension: usize, values: Vec<f64>) -> Result<Self, RelaxError> {
        let expected = dimension * dimension;
        if values.len() != expected {
            return Err(RelaxError::ShapeMismatch {
                expected,
                found: values.len(),
            });
        }
        Ok(Self { dimension, values })
    }

    /// Build from nested rows; every row must be as long as there are rows.
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self, RelaxError> {
        let dimension = rows.len();
        let mut values = Vec::with_capacity(dimension * dimension);
        for row in rows {
            let row = row.as_ref();
            if row.len() != dimension {
                return Err(RelaxError::ShapeMismatch {
                    expected: dimension,
                    found: row.len(),
                });
            }
            values.extend_from_slice(row);
        }
        Ok(Self { dimension, values })
    }

    pub fn filled(dimension: usize, value: f64) -> Self {
        Self {
            dimension,
            values: vec![value; dimension * dimension],
        }
    }

    /// The fixed 5x5 test grid.
    pub fn sample() -> Self {
        Self {
            dimension: 5,
            values: SAMPLE.iter().flatten().copied().collect(),
        }
    }

    /// Values uniformly drawn from `[0, 10)`; the same seed always yields the
    /// same grid.
    pub fn random(dimension: usize, seed: u64) -> Self {
        let mut rng = SmallRng::seed_from_u64(seed);
        let values = (0..dimension * dimension)
            .map(|_| rng.gen_range(0.0..10.0))
            .collect();
        Self { dimension, values }
    }

    /// Number of rows (and columns).
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Distance between the starts of two consecutive rows.
    pub fn stride(&self) -> usize {
        self.dimension
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.stride() + col]
    }

    pub fn row(&self, row: usize) -> &[f64] {
        let start = row * self.stride();
        &self.values[start..start + self.dimension]
    }

    pub fn row_mut(&mut self, row: usize) -> &mut [f64] {
        let start = row * self.stride();
        let end = start + self.dimension;
        &mut self.values[start..end]
    }

    /// Contiguous block of `count` rows starting at grid row `first`.
    pub fn rows_block(&self, first: usize, count: usize) -> &[f64] {
        let start = first * self.stride();
        &self.values[start..start + count * self.stride()]
    }

    pub fn rows_block_mut(&mut self, first: usize, count: usize) -> &mut [f64] {
        let start = first * self.stride();
        let end = start + count * self.stride();
        &mut self.values[start..end]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.values.chunks_exact(self.dimension.max(1))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.rows() {
            writeln!(f, "{}", row.iter().map(|v| format!("{v:.6}")).join("\t"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_matches_fixture_rows() {
        let g = Grid::sample();
        assert_eq!(g.dimension(), 5);
        assert_eq!(g.row(0)[0], 8.404724);
        assert_eq!(g.get(2, 2), 8.991023);
        assert_eq!(g.row(4)[4], 6.725292);
    }

    #[test]
    fn from_rows_rejects_ragged_input() {
        let rows = vec![vec![1.0, 2.0], vec![3.0]];
        assert_eq!(
            Grid::from_rows(&rows),
            Err(RelaxError::ShapeMismatch {
                expected: 2,
                found: 1
            })
        );
    }

    #[test]
    fn from_values_checks_length() {
        assert!(Grid::from_values(3, vec![0.0; 9]).is_ok());
        assert!(Grid::from_values(3, vec![0.0; 8]).is_err());
    }

    #[test]
    fn random_is_seeded_and_bounded() {
        let a = Grid::random(7, 42);
        let b = Grid::random(7, 42);
        assert_eq!(a, b);
        assert!(a.as_slice().iter().all(|v| (0.0..10.0).contains(v)));
        assert_ne!(a, Grid::random(7, 43));
    }

    #[test]
    fn rows_block_is_contiguous() {
        let g = Grid::from_values(3, (0..9).map(f64::from).collect()).unwrap();
        assert_eq!(g.rows_block(1, 2), &[3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn display_uses_six_decimals() {
        let g = Grid::filled(3, 1.5);
        let text = g.to_string();
        assert_eq!(text.lines().count(), 3);
        assert_eq!(text.lines().next(), Some("1.500000\t1.500000\t1.500000"));
    }
}
