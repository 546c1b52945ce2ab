//! Exploration noise: 2-exchange row swaps and the ε schedule.

use rand::rngs::StdRng;
use rand::Rng;
use tch::Tensor;

/// Applies `k` random 2-exchange perturbations to a (ψ, action) pair.
///
/// Each exchange picks two row indices uniformly at random and swaps those
/// rows in both tensors across the whole batch. Swapping two rows of a
/// doubly-stochastic matrix keeps it doubly-stochastic, and swapping rows of
/// a permutation matrix keeps it a permutation, so both invariants survive.
///
/// New tensors are constructed; the inputs are never mutated in place.
pub fn two_exchange(
    psi: &Tensor,
    action: &Tensor,
    n_nodes: usize,
    k: usize,
    rng: &mut StdRng,
) -> (Tensor, Tensor) {
    let mut order: Vec<i64> = (0..n_nodes as i64).collect();
    for _ in 0..k {
        let a = rng.gen_range(0..n_nodes);
        let b = rng.gen_range(0..n_nodes);
        order.swap(a, b);
    }
    let index = Tensor::from_slice(&order).to_device(psi.device());
    (psi.index_select(1, &index), action.index_select(1, &index))
}

/// Linearly decaying exploration probability.
///
/// ε decreases by a fixed per-step increment until it reaches the floor,
/// then holds. The increment is derived from a target decay ratio over a
/// given number of steps.
#[derive(Debug, Clone)]
pub struct EpsilonSchedule {
    epsilon: f64,
    decrement: f64,
    floor: f64,
}

impl EpsilonSchedule {
    /// Default ε floor.
    pub const FLOOR: f64 = 0.01;

    /// Builds a schedule that shrinks `epsilon` toward `epsilon × rate`
    /// linearly over `decay_steps` steps and keeps decaying at that slope
    /// until the floor.
    pub fn new(epsilon: f64, rate: f64, decay_steps: u64) -> Self {
        let decrement = epsilon * (1.0 - rate) / decay_steps.max(1) as f64;
        Self {
            epsilon,
            decrement,
            floor: Self::FLOOR,
        }
    }

    /// Current ε.
    pub fn value(&self) -> f64 {
        self.epsilon
    }

    /// Advances the schedule by one training step.
    pub fn advance(&mut self) {
        if self.epsilon > self.floor {
            self.epsilon = (self.epsilon - self.decrement).max(self.floor);
        }
    }

    /// Draws whether this step explores.
    pub fn roll(&self, rng: &mut StdRng) -> bool {
        rng.gen::<f64>() < self.epsilon
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rounding::is_permutation_batch;
    use crate::sinkhorn::Sinkhorn;
    use rand::SeedableRng;
    use tch::{Device, Kind};

    #[test]
    fn swap_preserves_both_invariants() {
        let mut rng = StdRng::seed_from_u64(3);
        let scores = Tensor::randn([2, 6, 6], (Kind::Float, Device::Cpu));
        let psi = Sinkhorn::new(10, 0.5).forward(&scores);
        let action = crate::rounding::Rounder::new().round(&psi).unwrap();

        let (psi2, action2) = two_exchange(&psi, &action, 6, 2, &mut rng);

        assert!(is_permutation_batch(&action2));
        let rows = psi2.sum_dim_intlist([-1].as_slice(), false, Kind::Float);
        let cols = psi2.sum_dim_intlist([-2].as_slice(), false, Kind::Float);
        assert!((rows - 1.0).abs().max().double_value(&[]) < 1e-3);
        assert!((cols - 1.0).abs().max().double_value(&[]) < 1e-3);
    }

    #[test]
    fn swap_does_not_mutate_inputs() {
        let mut rng = StdRng::seed_from_u64(9);
        let psi = Tensor::eye(4, (Kind::Float, Device::Cpu)).reshape([1, 4, 4]);
        let action = psi.copy();
        let before = psi.copy();
        let _ = two_exchange(&psi, &action, 4, 3, &mut rng);
        assert_eq!(psi.eq_tensor(&before).all().int64_value(&[]), 1);
    }

    #[test]
    fn schedule_decays_linearly_to_floor() {
        let mut schedule = EpsilonSchedule::new(1.0, 0.0, 10);
        // Decrement = 0.1 per step.
        schedule.advance();
        assert!((schedule.value() - 0.9).abs() < 1e-12);
        for _ in 0..100 {
            schedule.advance();
        }
        assert_eq!(schedule.value(), EpsilonSchedule::FLOOR);
    }

    #[test]
    fn schedule_holds_at_floor() {
        let mut schedule = EpsilonSchedule::new(0.01, 0.5, 10);
        schedule.advance();
        assert_eq!(schedule.value(), EpsilonSchedule::FLOOR);
    }
}
