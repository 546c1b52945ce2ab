//! Fixed-capacity replay buffer for off-policy updates.

use rand::rngs::StdRng;
use rand::Rng;
use tch::Tensor;

/// One environment interaction: state, hard action, soft action, reward.
///
/// Tensors are expected detached; the buffer takes exclusive ownership. A
/// transition is created once per step, sampled with replacement many times,
/// and dies only when the ring wraps over its slot.
#[derive(Debug)]
pub struct Transition {
    /// Instance state `[rows, n_features]`.
    pub state: Tensor,
    /// Hard permutation `[n, n]`.
    pub action: Tensor,
    /// Soft relaxed assignment `[n, n]`.
    pub psi: Tensor,
    /// Scalar task reward.
    pub reward: f64,
}

/// A minibatch sampled from the buffer, stacked along dim 0.
#[derive(Debug)]
pub struct TransitionBatch {
    pub states: Tensor,
    pub actions: Tensor,
    pub psis: Tensor,
    pub rewards: Tensor,
}

/// Ring buffer of transitions: an arena of at most `capacity` slots with a
/// monotonically increasing write cursor taken modulo capacity.
///
/// `append` is O(1) and never blocks; once full, each append overwrites the
/// oldest slot. Entries are never individually deleted.
#[derive(Debug)]
pub struct ReplayBuffer {
    slots: Vec<Transition>,
    cursor: usize,
    capacity: usize,
}

impl ReplayBuffer {
    /// Creates an empty buffer with the given capacity.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "replay buffer capacity must be positive");
        Self {
            slots: Vec::with_capacity(capacity),
            cursor: 0,
            capacity,
        }
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no transitions are stored yet.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Maximum number of stored transitions.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends a transition, overwriting the oldest once at capacity.
    pub fn append(&mut self, transition: Transition) {
        if self.slots.len() < self.capacity {
            self.slots.push(transition);
        } else {
            self.slots[self.cursor % self.capacity] = transition;
        }
        self.cursor += 1;
    }

    /// Samples `batch_size` transitions uniformly with replacement and
    /// stacks them into batch tensors.
    ///
    /// Precondition: `len() >= batch_size`; callers must check occupancy
    /// first.
    pub fn sample(&self, batch_size: usize, rng: &mut StdRng) -> TransitionBatch {
        assert!(
            self.slots.len() >= batch_size,
            "sampled {} from buffer holding {}",
            batch_size,
            self.slots.len()
        );
        let mut states = Vec::with_capacity(batch_size);
        let mut actions = Vec::with_capacity(batch_size);
        let mut psis = Vec::with_capacity(batch_size);
        let mut rewards = Vec::with_capacity(batch_size);
        for _ in 0..batch_size {
            let t = &self.slots[rng.gen_range(0..self.slots.len())];
            states.push(t.state.shallow_clone());
            actions.push(t.action.shallow_clone());
            psis.push(t.psi.shallow_clone());
            rewards.push(t.reward as f32);
        }
        TransitionBatch {
            states: Tensor::stack(&states, 0),
            actions: Tensor::stack(&actions, 0),
            psis: Tensor::stack(&psis, 0),
            rewards: Tensor::from_slice(&rewards),
        }
    }
}
