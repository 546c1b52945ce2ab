//! Configuration for the actor-critic trainer.
//!
//! A flat mapping of named options consumed read-only by the core; a CLI or
//! config-file layer is expected to populate it.

use crate::error::{Error, Result};
use crate::task::Task;

/// Network architecture variant for the actor/critic pair.
///
/// Variants are selected by configuration, never by inheritance: each maps to
/// a concrete actor and critic sharing the same forward contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Arch {
    /// Per-point MLP producing the score matrix directly.
    Mlp,
    /// Embedding followed by a (optionally bidirectional) GRU over the
    /// point sequence. For single-group tasks (sort, tsp).
    Sequential,
    /// Siamese embedding of the two point groups combined by an outer
    /// product. Required for the matching task.
    Matching,
}

/// Configuration for the Sinkhorn policy-gradient trainer.
///
/// Defaults mirror the reference hyperparameters for the 10-node tasks.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpgConfig {
    // --- Problem ---
    /// Task to train on.
    pub task: Task,
    /// Problem size N (nodes per group).
    pub n_nodes: usize,
    /// Architecture variant.
    pub arch: Arch,

    // --- Model ---
    /// Point embedding dimension.
    pub embedding_dim: usize,
    /// GRU hidden dimension.
    pub rnn_dim: usize,
    /// Whether the sequential GRU runs bidirectionally.
    pub bidirectional: bool,
    /// Number of Sinkhorn row/column normalization rounds.
    pub sinkhorn_iters: u32,
    /// Sinkhorn temperature τ; smaller values sharpen ψ toward a permutation.
    pub sinkhorn_tau: f64,

    // --- Optimization ---
    /// Actor learning rate.
    pub actor_lr: f64,
    /// Critic learning rate.
    pub critic_lr: f64,
    /// Multiplicative actor LR decay factor.
    pub actor_lr_decay_rate: f64,
    /// Steps between actor LR decays.
    pub actor_lr_decay_step: u64,
    /// Multiplicative critic LR decay factor.
    pub critic_lr_decay_rate: f64,
    /// Steps between critic LR decays.
    pub critic_lr_decay_step: u64,
    /// Gradient-norm clipping threshold for both networks.
    pub max_grad_norm: f64,
    /// Whether the critic adds the soft/hard consistency loss.
    pub critic_aux_loss: bool,

    // --- Exploration ---
    /// Number of 2-exchange row swaps applied when exploring.
    pub k_exchange: usize,
    /// Initial exploration probability ε.
    pub epsilon: f64,
    /// Target decay ratio for ε over one decay period.
    pub epsilon_decay_rate: f64,
    /// Number of steps over which ε decays by the ratio above.
    pub epsilon_decay_step: u64,

    // --- Replay ---
    /// Replay buffer capacity (transitions).
    pub buffer_capacity: usize,
    /// Instances stepped together per environment interaction.
    pub parallel_envs: usize,
    /// Minibatch size sampled from the buffer for each update.
    pub batch_size: usize,

    // --- Misc ---
    /// Steps between progress log lines.
    pub log_step: u64,
    /// RNG seed for exploration and replay sampling.
    pub seed: u64,
}

impl SpgConfig {
    /// Creates a configuration for the given task and problem size with
    /// reference defaults and a task-appropriate architecture.
    pub fn for_task(task: Task, n_nodes: usize) -> Self {
        let arch = match task {
            Task::Mwm2D => Arch::Matching,
            Task::Sort | Task::Tsp => Arch::Sequential,
        };
        Self {
            task,
            n_nodes,
            arch,
            ..Self::default()
        }
    }

    /// Number of rows in a state tensor for this configuration.
    pub fn state_rows(&self) -> usize {
        self.task.state_rows(self.n_nodes)
    }

    /// Validates option combinations.
    ///
    /// Fatal at startup: the trainer refuses to construct from an invalid
    /// configuration.
    pub fn validate(&self) -> Result<()> {
        if self.n_nodes < 2 {
            return Err(Error::Config(format!(
                "n_nodes must be at least 2, got {}",
                self.n_nodes
            )));
        }
        if !(self.sinkhorn_tau > 0.0) {
            return Err(Error::Config(format!(
                "sinkhorn_tau must be positive, got {}",
                self.sinkhorn_tau
            )));
        }
        if self.sinkhorn_iters == 0 {
            return Err(Error::Config("sinkhorn_iters must be positive".into()));
        }
        if self.batch_size == 0 || self.batch_size > self.buffer_capacity {
            return Err(Error::Config(format!(
                "batch_size {} must be in 1..=buffer_capacity ({})",
                self.batch_size, self.buffer_capacity
            )));
        }
        if self.parallel_envs == 0 {
            return Err(Error::Config("parallel_envs must be positive".into()));
        }
        if self.actor_lr_decay_step == 0 || self.critic_lr_decay_step == 0 {
            return Err(Error::Config(
                "learning-rate decay steps must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.epsilon) {
            return Err(Error::Config(format!(
                "epsilon must be in [0, 1], got {}",
                self.epsilon
            )));
        }
        match (self.task, self.arch) {
            (Task::Mwm2D, Arch::Matching) => {}
            (Task::Mwm2D, arch) => {
                return Err(Error::Config(format!(
                    "task mwm2D requires the Matching architecture, got {:?}",
                    arch
                )));
            }
            (task, Arch::Matching) => {
                return Err(Error::Config(format!(
                    "the Matching architecture only supports mwm2D, got task {}",
                    task
                )));
            }
            _ => {}
        }
        Ok(())
    }
}

impl Default for SpgConfig {
    fn default() -> Self {
        Self {
            task: Task::Tsp,
            n_nodes: 10,
            arch: Arch::Sequential,
            embedding_dim: 128,
            rnn_dim: 128,
            bidirectional: true,
            sinkhorn_iters: 10,
            sinkhorn_tau: 0.05,
            actor_lr: 3e-4,
            critic_lr: 3e-4,
            actor_lr_decay_rate: 0.95,
            actor_lr_decay_step: 50_000,
            critic_lr_decay_rate: 0.95,
            critic_lr_decay_step: 5_000,
            max_grad_norm: 1.0,
            critic_aux_loss: true,
            k_exchange: 2,
            epsilon: 1.0,
            epsilon_decay_rate: 0.97,
            epsilon_decay_step: 500_000,
            buffer_capacity: 1_000_000,
            parallel_envs: 32,
            batch_size: 128,
            log_step: 100,
            seed: 1234,
        }
    }
}
