//! Contiguous row-block partitioning of the grid interior.
//!
//! Every worker derives the same table from `(dimension, workers)`, so no
//! communication is needed to agree on who owns which rows.

use crate::relax_error::RelaxError;

/// Rows owned by one worker, relative to the interior (grid row 1 is
/// interior row 0).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RowRange {
    pub count: usize,
    pub offset: usize,
}

impl RowRange {
    /// Grid index of the first owned row (skips the fixed top row).
    pub fn first_grid_row(&self) -> usize {
        self.offset + 1
    }

    /// One past the grid index of the last owned row.
    pub fn end_grid_row(&self) -> usize {
        self.offset + self.count + 1
    }
}

/// Worker index → [`RowRange`], ordered by rank.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RowTable {
    ranges: Vec<RowRange>,
}

impl RowTable {
    /// Table for an N×N grid: validates the dimension, then splits rows
    /// `1..N-1` among `workers`.
    pub fn for_grid(dimension: usize, workers: usize) -> Result<Self, RelaxError> {
        if dimension < 3 {
            return Err(RelaxError::GridTooSmall { dimension });
        }
        row_table(dimension - 2, workers)
    }

    pub fn get(&self, rank: usize) -> Option<RowRange> {
        self.ranges.get(rank).copied()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = RowRange> + '_ {
        self.ranges.iter().copied()
    }

    /// Sum of all counts; equals the interior row count.
    pub fn total_rows(&self) -> usize {
        self.ranges.iter().map(|r| r.count).sum()
    }

    pub fn last_rank(&self) -> usize {
        self.ranges.len().saturating_sub(1)
    }
}

/// Split `interior_rows` among `workers` as evenly as possible.
///
/// The first `interior_rows % workers` workers receive one extra row.
///
/// # Errors
/// [`RelaxError::NoWorkers`] when `workers == 0`, and
/// [`RelaxError::TooManyWorkers`] when some worker would own no row.
pub fn row_table(interior_rows: usize, workers: usize) -> Result<RowTable, RelaxError> {
    if workers == 0 {
        return Err(RelaxError::NoWorkers);
    }
    if workers > interior_rows {
        return Err(RelaxError::TooManyWorkers {
            workers,
            rows: interior_rows,
        });
    }
    let base = interior_rows / workers;
    let mut remaining = interior_rows % workers;
    let mut offset = 0;
    let mut ranges = Vec::with_capacity(workers);
    for _ in 0..workers {
        let count = if remaining > 0 {
            remaining -= 1;
            base + 1
        } else {
            base
        };
        ranges.push(RowRange { count, offset });
        offset += count;
    }
    Ok(RowTable { ranges })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remainder_goes_to_leading_workers() {
        let t = row_table(10, 4).unwrap();
        let counts: Vec<_> = t.iter().map(|r| r.count).collect();
        let offsets: Vec<_> = t.iter().map(|r| r.offset).collect();
        assert_eq!(counts, vec![3, 3, 2, 2]);
        assert_eq!(offsets, vec![0, 3, 6, 8]);
        assert_eq!(t.total_rows(), 10);
    }

    #[test]
    fn single_worker_owns_everything() {
        let t = row_table(3, 1).unwrap();
        assert_eq!(t.get(0), Some(RowRange { count: 3, offset: 0 }));
        assert_eq!(t.get(1), None);
    }

    #[test]
    fn rejects_more_workers_than_rows() {
        assert_eq!(
            row_table(3, 4),
            Err(RelaxError::TooManyWorkers {
                workers: 4,
                rows: 3
            })
        );
        assert_eq!(row_table(3, 0), Err(RelaxError::NoWorkers));
    }

    #[test]
    fn grid_table_skips_edge_rows() {
        let t = RowTable::for_grid(10, 2).unwrap();
        assert_eq!(t.total_rows(), 8);
        let r1 = t.get(1).unwrap();
        assert_eq!((r1.first_grid_row(), r1.end_grid_row()), (5, 9));
        assert_eq!(
            RowTable::for_grid(2, 1),
            Err(RelaxError::GridTooSmall { dimension: 2 })
        );
    }
}
