//! Differentiable relaxation of a permutation via Sinkhorn normalization.
//!
//! For a positive matrix, alternating row/column rescaling is a fixed-point
//! iteration toward the unique doubly-stochastic scaling; truncating it at a
//! fixed iteration count keeps the layer differentiable and bounded, which is
//! what lets a discrete assignment decision train by gradient descent.

use tch::{Kind, Tensor};

/// Sinkhorn normalization layer.
///
/// Maps an unconstrained score matrix `M` to `ψ ≈` doubly-stochastic via
/// `exp(M/τ)` followed by `iterations` rounds of row- then
/// column-normalization. Operates on batched `[batch, n, n]` tensors.
///
/// No error conditions: non-finite inputs or a degenerate τ produce NaN,
/// which the [`Rounder`](crate::rounding::Rounder) detects downstream.
#[derive(Debug, Clone)]
pub struct Sinkhorn {
    iterations: u32,
    tau: f64,
}

impl Sinkhorn {
    /// Creates a layer with the given iteration count and temperature τ.
    /// Smaller τ sharpens ψ toward a hard permutation.
    pub fn new(iterations: u32, tau: f64) -> Self {
        Self { iterations, tau }
    }

    /// Normalizes a `[batch, n, n]` score matrix into ψ.
    pub fn forward(&self, scores: &Tensor) -> Tensor {
        let mut psi = (scores / self.tau).exp();
        for _ in 0..self.iterations {
            psi = &psi / psi.sum_dim_intlist([-1].as_slice(), true, Kind::Float);
            psi = &psi / psi.sum_dim_intlist([-2].as_slice(), true, Kind::Float);
        }
        psi
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::Device;

    fn assert_doubly_stochastic(psi: &Tensor, tol: f64) {
        let rows = psi.sum_dim_intlist([-1].as_slice(), false, Kind::Float);
        let cols = psi.sum_dim_intlist([-2].as_slice(), false, Kind::Float);
        let row_dev: f64 = (rows - 1.0).abs().max().double_value(&[]);
        let col_dev: f64 = (cols - 1.0).abs().max().double_value(&[]);
        assert!(row_dev < tol, "row sums off by {}", row_dev);
        assert!(col_dev < tol, "col sums off by {}", col_dev);
    }

    #[test]
    fn output_rows_and_columns_normalize() {
        let scores = Tensor::randn([3, 6, 6], (Kind::Float, Device::Cpu));
        let psi = Sinkhorn::new(10, 1.0).forward(&scores);
        assert_doubly_stochastic(&psi, 1e-3);
    }

    #[test]
    fn entries_stay_in_unit_interval() {
        let scores = Tensor::randn([2, 5, 5], (Kind::Float, Device::Cpu)) * 3.0;
        let psi = Sinkhorn::new(10, 0.5).forward(&scores);
        let min: f64 = psi.min().double_value(&[]);
        let max: f64 = psi.max().double_value(&[]);
        assert!(min >= 0.0);
        assert!(max <= 1.0 + 1e-6);
    }

    #[test]
    fn constant_scores_converge_to_uniform() {
        // All-equal scores must land on the uniform matrix (every entry 1/n)
        // after even a few iterations.
        let n = 4;
        let scores = Tensor::ones([1, n, n], (Kind::Float, Device::Cpu));
        let psi = Sinkhorn::new(3, 0.05).forward(&scores);
        let dev: f64 = (psi - 1.0 / n as f64).abs().max().double_value(&[]);
        assert!(dev < 1e-6, "deviation from uniform: {}", dev);
    }

    #[test]
    fn low_temperature_sharpens_toward_permutation() {
        let scores = Tensor::from_slice(&[
            5.0f32, 0.0, 0.0, //
            0.0, 5.0, 0.0, //
            0.0, 0.0, 5.0,
        ])
        .reshape([1, 3, 3]);
        // τ = 0.5 keeps exp(M/τ) finite in f32 while still concentrating
        // nearly all mass on the diagonal.
        let psi = Sinkhorn::new(20, 0.5).forward(&scores);
        let diag_min: f64 = psi
            .squeeze_dim(0)
            .diag(0)
            .min()
            .double_value(&[]);
        assert!(diag_min > 0.99, "diagonal mass {}", diag_min);
    }

    #[test]
    fn nan_scores_propagate() {
        let scores = Tensor::from_slice(&[f32::NAN, 0.0, 0.0, 0.0]).reshape([1, 2, 2]);
        let psi = Sinkhorn::new(5, 1.0).forward(&scores);
        let finite: bool = psi.isfinite().all().int64_value(&[]) == 1;
        assert!(!finite);
    }
}
