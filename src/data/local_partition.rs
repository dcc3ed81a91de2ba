//! A worker's slice of the grid: its owned rows framed by two halo slots.
//!
//! Slot 0 sits above the first owned row and slot `count + 1` below the last
//! one. Each slot carries an explicit [`RowRole`], so the fixed grid edges
//! held by the first and last worker can never be mistaken for exchanged
//! halo rows.

use crate::algs::partition::RowRange;
use crate::relax_error::RelaxError;
use itertools::Itertools;
use std::fmt;

/// What a row slot of a [`LocalPartition`] holds.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RowRole {
    /// Top or bottom row of the whole grid; never exchanged.
    FixedEdge,
    /// Copy of a neighbour's boundary row, overwritten by exchanges.
    Halo,
    /// Relaxed by this worker.
    Owned,
}

/// Direction of a neighbour in the rank order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    /// Towards rank - 1.
    Up,
    /// Towards rank + 1.
    Down,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Up, Side::Down];

    /// Rank of the neighbour on this side, if any.
    pub fn neighbor(self, rank: usize, size: usize) -> Option<usize> {
        match self {
            Side::Up => rank.checked_sub(1),
            Side::Down => (rank + 1 < size).then_some(rank + 1),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LocalPartition {
    rank: usize,
    range: RowRange,
    stride: usize,
    values: Vec<f64>,
    roles: Vec<RowRole>,
}

impl LocalPartition {
    /// Build the working buffer from `count * stride` owned values.
    ///
    /// `top`/`bottom` are the grid's fixed edge rows for the first and last
    /// worker; a missing edge becomes a zeroed halo slot.
    pub fn new(
        rank: usize,
        range: RowRange,
        stride: usize,
        owned: &[f64],
        top: Option<&[f64]>,
        bottom: Option<&[f64]>,
    ) -> Result<Self, RelaxError> {
        let expected = range.count * stride;
        if owned.len() != expected {
            return Err(RelaxError::ShapeMismatch {
                expected,
                found: owned.len(),
            });
        }
        for edge in [top, bottom].into_iter().flatten() {
            if edge.len() != stride {
                return Err(RelaxError::ShapeMismatch {
                    expected: stride,
                    found: edge.len(),
                });
            }
        }

        let slots = range.count + 2;
        let mut values = Vec::with_capacity(slots * stride);
        let mut roles = Vec::with_capacity(slots);

        match top {
            Some(row) => {
                values.extend_from_slice(row);
                roles.push(RowRole::FixedEdge);
            }
            None => {
                values.resize(stride, 0.0);
                roles.push(RowRole::Halo);
            }
        }
        values.extend_from_slice(owned);
        roles.extend(std::iter::repeat_n(RowRole::Owned, range.count));
        match bottom {
            Some(row) => {
                values.extend_from_slice(row);
                roles.push(RowRole::FixedEdge);
            }
            None => {
                values.resize(slots * stride, 0.0);
                roles.push(RowRole::Halo);
            }
        }

        Ok(Self {
            rank,
            range,
            stride,
            values,
            roles,
        })
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn range(&self) -> RowRange {
        self.range
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Number of owned rows.
    pub fn owned_rows(&self) -> usize {
        self.range.count
    }

    /// Owned rows plus the two halo slots.
    pub fn slots(&self) -> usize {
        self.roles.len()
    }

    pub fn role(&self, slot: usize) -> RowRole {
        self.roles[slot]
    }

    pub fn row(&self, slot: usize) -> &[f64] {
        let start = slot * self.stride;
        &self.values[start..start + self.stride]
    }

    fn row_mut(&mut self, slot: usize) -> &mut [f64] {
        let start = slot * self.stride;
        let end = start + self.stride;
        &mut self.values[start..end]
    }

    /// Slot holding the row borrowed from the `side` neighbour.
    pub fn halo_slot(&self, side: Side) -> usize {
        match side {
            Side::Up => 0,
            Side::Down => self.range.count + 1,
        }
    }

    /// Slot of the owned row that the `side` neighbour needs.
    pub fn boundary_slot(&self, side: Side) -> usize {
        match side {
            Side::Up => 1,
            Side::Down => self.range.count,
        }
    }

    pub fn boundary_row(&self, side: Side) -> &[f64] {
        self.row(self.boundary_slot(side))
    }

    /// Writable halo row, or `None` when that side is a fixed grid edge.
    pub fn halo_row_mut(&mut self, side: Side) -> Option<&mut [f64]> {
        let slot = self.halo_slot(side);
        match self.roles[slot] {
            RowRole::Halo => Some(self.row_mut(slot)),
            _ => None,
        }
    }

    /// The fixed grid edge on `side`, if this worker holds it.
    pub fn edge_row(&self, side: Side) -> Option<&[f64]> {
        let slot = self.halo_slot(side);
        (self.roles[slot] == RowRole::FixedEdge).then(|| self.row(slot))
    }

    /// Owned rows only, flattened.
    pub fn owned(&self) -> &[f64] {
        &self.values[self.stride..(self.range.count + 1) * self.stride]
    }

    /// Whole buffer, halo slots included.
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.values
    }
}

impl fmt::Display for LocalPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for slot in 0..self.slots() {
            let row = self.row(slot).iter().map(|v| format!("{v:.6}")).join("\t");
            writeln!(f, "{}[{}]: \t{}", self.rank, slot, row)?;
        }
        Ok(())
    }
}
