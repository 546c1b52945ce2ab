//! Hard rounding from a doubly-stochastic ψ to a permutation matrix.

use tch::{Device, Kind, Tensor};

use crate::error::{Error, Result};
use crate::matching::solve_assignment;

/// Rounds a relaxed assignment to the nearest-by-mass hard permutation.
///
/// Solves the exact assignment problem on `-ψ` per batch item, maximizing
/// the total ψ-mass carried by the chosen permutation.
#[derive(Debug, Clone, Default)]
pub struct Rounder;

impl Rounder {
    pub fn new() -> Self {
        Rounder
    }

    /// Rounds a `[batch, n, n]` ψ to 0/1 permutation matrices of the same
    /// shape.
    ///
    /// Any non-finite entry anywhere in the batch fails the whole batch with
    /// [`Error::NumericDivergence`]; a partial permutation is never returned.
    /// The caller must abort the training step before touching the replay
    /// buffer.
    pub fn round(&self, psi: &Tensor) -> Result<Tensor> {
        let size = psi.size();
        debug_assert_eq!(size.len(), 3);
        let (batch, n) = (size[0] as usize, size[1] as usize);

        let flat: Vec<f64> = psi
            .detach()
            .to_device(Device::Cpu)
            .to_kind(Kind::Double)
            .flatten(0, -1)
            .try_into()?;
        if !flat.iter().all(|v| v.is_finite()) {
            return Err(Error::NumericDivergence);
        }

        let mut perms = vec![0.0f32; batch * n * n];
        for b in 0..batch {
            let base = b * n * n;
            let cost: Vec<Vec<f64>> = (0..n)
                .map(|i| (0..n).map(|j| -flat[base + i * n + j]).collect())
                .collect();
            let (assignment, _) = solve_assignment(&cost);
            for (i, &j) in assignment.iter().enumerate() {
                perms[base + i * n + j] = 1.0;
            }
        }

        Ok(Tensor::from_slice(&perms)
            .reshape([batch as i64, n as i64, n as i64])
            .to_kind(Kind::Float)
            .to_device(psi.device()))
    }
}

/// Checks that a `[batch, n, n]` tensor holds valid permutation matrices:
/// entries in {0, 1} with exactly one 1 per row and column.
pub fn is_permutation_batch(actions: &Tensor) -> bool {
    let binary = actions
        .eq(0.0)
        .logical_or(&actions.eq(1.0))
        .all()
        .int64_value(&[])
        == 1;
    if !binary {
        return false;
    }
    let rows = actions.sum_dim_intlist([-1].as_slice(), false, Kind::Float);
    let cols = actions.sum_dim_intlist([-2].as_slice(), false, Kind::Float);
    rows.eq(1.0).all().int64_value(&[]) == 1 && cols.eq(1.0).all().int64_value(&[]) == 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinkhorn::Sinkhorn;

    #[test]
    fn rounds_to_valid_permutations() {
        let scores = Tensor::randn([4, 8, 8], (Kind::Float, Device::Cpu));
        let psi = Sinkhorn::new(10, 0.5).forward(&scores);
        let actions = Rounder::new().round(&psi).unwrap();
        assert_eq!(actions.size(), &[4, 8, 8]);
        assert!(is_permutation_batch(&actions));
    }

    #[test]
    fn picks_dominant_entries() {
        // ψ already close to a permutation: rounding must recover it.
        let psi = Tensor::from_slice(&[
            0.9f32, 0.05, 0.05, //
            0.05, 0.05, 0.9, //
            0.05, 0.9, 0.05,
        ])
        .reshape([1, 3, 3]);
        let action = Rounder::new().round(&psi).unwrap();
        let expected = Tensor::from_slice(&[
            1.0f32, 0.0, 0.0, //
            0.0, 0.0, 1.0, //
            0.0, 1.0, 0.0,
        ])
        .reshape([1, 3, 3]);
        assert_eq!(
            action.eq_tensor(&expected).all().int64_value(&[]),
            1,
            "rounded away from the dominant permutation"
        );
    }

    #[test]
    fn single_nan_fails_whole_batch() {
        let mut values = vec![0.25f32; 2 * 4 * 4];
        values[5] = f32::NAN;
        let psi = Tensor::from_slice(&values).reshape([2, 4, 4]);
        let err = Rounder::new().round(&psi).unwrap_err();
        assert!(matches!(err, Error::NumericDivergence));
    }

    #[test]
    fn infinite_entry_also_fails() {
        let mut values = vec![0.25f32; 4 * 4];
        values[0] = f32::INFINITY;
        let psi = Tensor::from_slice(&values).reshape([1, 4, 4]);
        assert!(matches!(
            Rounder::new().round(&psi),
            Err(Error::NumericDivergence)
        ));
    }

    #[test]
    fn permutation_check_rejects_doubled_row() {
        let bad = Tensor::from_slice(&[
            1.0f32, 1.0, //
            0.0, 0.0,
        ])
        .reshape([1, 2, 2]);
        assert!(!is_permutation_batch(&bad));
    }

    #[test]
    fn permutation_check_rejects_fractional() {
        let bad = Tensor::from_slice(&[
            0.5f32, 0.5, //
            0.5, 0.5,
        ])
        .reshape([1, 2, 2]);
        assert!(!is_permutation_batch(&bad));
    }
}
