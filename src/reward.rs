//! Task reward evaluation for applied permutations.
//!
//! Sign convention, fixed per task and relied on by the trainer: reward is
//! always maximized. Sort and tsp rewards are the negated task cost; the
//! mwm2D reward is the positive matching weight, since training targets
//! maximum-weight matchings.

use tch::{Kind, Tensor};

use crate::task::Task;

/// Reorders the rows of `states` `[b, n, f]` by a permutation `[b, n, n]`.
pub fn apply_permutation(states: &Tensor, action: &Tensor) -> Tensor {
    states.transpose(1, 2).matmul(action).transpose(1, 2)
}

/// Per-instance reward for a batch of applied permutations.
///
/// `states` is `[b, rows, n_features]` (rows = 2n for matching), `action`
/// is a `[b, n, n]` permutation batch. Returns `[b]`.
pub fn reward(task: Task, states: &Tensor, action: &Tensor) -> Tensor {
    match task {
        Task::Sort => -successive_difference(&apply_permutation(states, action)),
        Task::Tsp => -tour_length(&apply_permutation(states, action)),
        Task::Mwm2D => matching_weight(states, action),
    }
}

/// Total absolute difference between successive values of `[b, n, 1]`
/// sequences. Minimized (down to the value range) exactly by monotone
/// orderings.
pub fn successive_difference(sequence: &Tensor) -> Tensor {
    let n = sequence.size()[1];
    let head = sequence.narrow(1, 0, n - 1);
    let tail = sequence.narrow(1, 1, n - 1);
    (tail - head)
        .abs()
        .sum_dim_intlist([1, 2].as_slice(), false, Kind::Float)
}

/// Closed-tour length over `[b, n, 2]` point sequences.
pub fn tour_length(points: &Tensor) -> Tensor {
    let next = points.roll([-1], [1]);
    (next - points)
        .pow_tensor_scalar(2)
        .sum_dim_intlist([2].as_slice(), false, Kind::Float)
        .sqrt()
        .sum_dim_intlist([1].as_slice(), false, Kind::Float)
}

/// Matching weight: the permutation reorders group B, then matched pairs
/// `(A_i, B'_i)` contribute their Euclidean distance.
///
/// `states` is `[b, 2n, f]` with group A first.
pub fn matching_weight(states: &Tensor, action: &Tensor) -> Tensor {
    let n = action.size()[1];
    let group_a = states.narrow(1, 0, n);
    let group_b = states.narrow(1, n, n);
    let permuted_b = apply_permutation(&group_b, action);
    (group_a - permuted_b)
        .pow_tensor_scalar(2)
        .sum_dim_intlist([2].as_slice(), false, Kind::Float)
        .sqrt()
        .sum_dim_intlist([1].as_slice(), false, Kind::Float)
}

/// Proximity of ψ to the chosen Birkhoff-polytope vertex: `Σ(ψ ⊙ action)/n`
/// per instance. 1.0 means ψ already sits on the permutation.
pub fn birkhoff_proximity(psi: &Tensor, action: &Tensor) -> Tensor {
    let n = action.size()[1];
    (psi * action).sum_dim_intlist([1, 2].as_slice(), false, Kind::Float) / n as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::Device;

    fn identity_action(n: i64) -> Tensor {
        Tensor::eye(n, (Kind::Float, Device::Cpu)).reshape([1, n, n])
    }

    fn permutation(rows: &[i64]) -> Tensor {
        let n = rows.len() as i64;
        let mut values = vec![0.0f32; (n * n) as usize];
        for (i, &j) in rows.iter().enumerate() {
            values[i * n as usize + j as usize] = 1.0;
        }
        Tensor::from_slice(&values).reshape([1, n, n])
    }

    #[test]
    fn sorted_sequence_maximizes_sort_reward() {
        let states = Tensor::from_slice(&[0.4f32, 0.1, 0.3, 0.2]).reshape([1, 4, 1]);
        // Permutation placing values in ascending order: 0.1 0.2 0.3 0.4.
        let sorting = permutation(&[3, 0, 2, 1]);
        let sorted_reward = reward(Task::Sort, &states, &sorting).double_value(&[0]);
        let unsorted_reward = reward(Task::Sort, &states, &identity_action(4)).double_value(&[0]);
        // Ascending order attains the minimum cost: -(0.4 - 0.1).
        assert!((sorted_reward + 0.3).abs() < 1e-6);
        assert!(sorted_reward > unsorted_reward);
    }

    #[test]
    fn tour_length_on_unit_square() {
        let states =
            Tensor::from_slice(&[0.0f32, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0]).reshape([1, 4, 2]);
        let r = reward(Task::Tsp, &states, &identity_action(4)).double_value(&[0]);
        assert!((r + 4.0).abs() < 1e-5);
    }

    #[test]
    fn matching_weight_identity_pairs_in_order() {
        // A = (0,0),(10,10); B = (0,1),(10,9). Identity pairing weight ≈ 2.
        let states = Tensor::from_slice(&[
            0.0f32, 0.0, 10.0, 10.0, // group A
            0.0, 1.0, 10.0, 9.0, // group B
        ])
        .reshape([1, 4, 2]);
        let w = matching_weight(&states, &identity_action(2)).double_value(&[0]);
        assert!((w - 2.0).abs() < 1e-5);
    }

    #[test]
    fn matching_weight_swap_pairs_across() {
        let states = Tensor::from_slice(&[
            0.0f32, 0.0, 10.0, 10.0, //
            0.0, 1.0, 10.0, 9.0,
        ])
        .reshape([1, 4, 2]);
        let swap = permutation(&[1, 0]);
        let w = matching_weight(&states, &swap).double_value(&[0]);
        let expected = 2.0 * (100.0f64 + 81.0).sqrt();
        assert!((w - expected).abs() < 1e-4);
    }

    #[test]
    fn birkhoff_proximity_is_one_on_vertices() {
        let action = permutation(&[2, 0, 1]);
        let p = birkhoff_proximity(&action, &action).double_value(&[0]);
        assert!((p - 1.0).abs() < 1e-6);
    }

    #[test]
    fn birkhoff_proximity_uniform_is_one_over_n() {
        let n = 5;
        let psi = Tensor::full(
            [1, n, n],
            1.0 / n as f64,
            (Kind::Float, Device::Cpu),
        );
        let action = identity_action(n);
        let p = birkhoff_proximity(&psi, &action).double_value(&[0]);
        assert!((p - 1.0 / n as f64).abs() < 1e-6);
    }
}
