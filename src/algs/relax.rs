//! Four-point Jacobi relaxation of a partition's owned cells.
//!
//! New values are computed from the previous sweep only (into a scratch
//! buffer) and written back afterwards, so the result does not depend on how
//! the grid was split into partitions.

use crate::data::local_partition::LocalPartition;
#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// `true` if both values fall into the same precision bucket,
/// i.e. `trunc(previous / precision) == trunc(current / precision)`.
///
/// This is a bucket test, not a bound on `|previous - current|`: two values
/// either side of a bucket boundary fail however close they are.
pub fn in_precision(previous: f64, current: f64, precision: f64) -> bool {
    (previous / precision).trunc() == (current / precision).trunc()
}

/// Mean of the four orthogonal neighbours for the interior columns of `slot`.
fn relax_row(values: &[f64], stride: usize, slot: usize, out: &mut [f64]) {
    let base = slot * stride;
    for col in 1..stride - 1 {
        let idx = base + col;
        let below = values[idx + stride];
        let above = values[idx - stride];
        let right = values[idx + 1];
        let left = values[idx - 1];
        out[col] = (below + above + right + left) / 4.0;
    }
}

/// Sweeps a [`LocalPartition`], reusing one scratch buffer across sweeps.
#[derive(Clone, Debug)]
pub struct RelaxKernel {
    precision: f64,
    scratch: Vec<f64>,
}

impl RelaxKernel {
    pub fn new(precision: f64) -> Self {
        Self {
            precision,
            scratch: Vec::new(),
        }
    }

    pub fn precision(&self) -> f64 {
        self.precision
    }

    /// Relax every owned cell once. Returns `true` iff every cell stayed in
    /// its precision bucket. All cells are updated either way.
    pub fn sweep(&mut self, part: &mut LocalPartition) -> bool {
        let stride = part.stride();
        let rows = part.owned_rows();
        if stride < 3 || rows == 0 {
            return true;
        }
        self.scratch.resize(rows * stride, 0.0);

        let values = part.as_slice();
        #[cfg(feature = "rayon")]
        self.scratch
            .par_chunks_mut(stride)
            .enumerate()
            .for_each(|(i, out)| relax_row(values, stride, i + 1, out));
        #[cfg(not(feature = "rayon"))]
        self.scratch
            .chunks_mut(stride)
            .enumerate()
            .for_each(|(i, out)| relax_row(values, stride, i + 1, out));

        let mut converged = true;
        let values = part.as_mut_slice();
        for (i, fresh) in self.scratch.chunks(stride).enumerate() {
            let base = (i + 1) * stride;
            for col in 1..stride - 1 {
                let previous = values[base + col];
                let current = fresh[col];
                if converged {
                    converged = in_precision(previous, current, self.precision);
                }
                values[base + col] = current;
            }
        }
        converged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::partition::RowRange;

    #[test]
    fn bucket_uses_truncation() {
        assert!(in_precision(1.234, 1.239, 0.01));
        assert!(!in_precision(1.239, 1.241, 0.01));
        // truncation towards zero puts both sides of zero in bucket 0
        assert!(in_precision(-0.005, 0.005, 0.01));
    }

    #[test]
    fn single_cell_takes_neighbour_mean() {
        let top = [0.0, 1.0, 0.0];
        let bottom = [0.0, 3.0, 0.0];
        let mut p = LocalPartition::new(
            0,
            RowRange { count: 1, offset: 0 },
            3,
            &[2.0, 100.0, 4.0],
            Some(&top),
            Some(&bottom),
        )
        .unwrap();
        let mut k = RelaxKernel::new(0.01);
        assert!(!k.sweep(&mut p));
        assert_eq!(p.row(1), &[2.0, 2.5, 4.0]);
        // neighbours did not move, so the next sweep is a fixed point
        assert!(k.sweep(&mut p));
        assert_eq!(p.row(1), &[2.0, 2.5, 4.0]);
    }

    #[test]
    fn reads_previous_values_only() {
        // two owned rows: the second row's update must see the first row's
        // old value, not the one written earlier in the same sweep
        let edge = [0.0; 3];
        let mut p = LocalPartition::new(
            0,
            RowRange { count: 2, offset: 0 },
            3,
            &[0.0, 8.0, 0.0, 0.0, 0.0, 0.0],
            Some(&edge),
            Some(&edge),
        )
        .unwrap();
        RelaxKernel::new(0.1).sweep(&mut p);
        assert_eq!(p.row(1)[1], 0.0);
        assert_eq!(p.row(2)[1], 2.0);
    }
}
