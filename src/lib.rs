//! sinkrl - Sinkhorn-relaxed reinforcement learning for combinatorial
//! assignment problems.
//!
//! Trains an actor-critic agent to approximate solutions to sorting,
//! TSP-like tours, and 2D bipartite matching by learning a differentiable
//! relaxation of a permutation matrix (Sinkhorn normalization), rounding it
//! back to a hard permutation with an exact assignment solver, and learning
//! off-policy from a replay buffer of (state, action, ψ, reward) tuples.

pub mod actor;
pub mod config;
pub mod critic;
pub mod dataset;
pub mod error;
pub mod exploration;
pub mod matching;
pub mod metrics;
pub mod replay;
pub mod reward;
pub mod rounding;
pub mod sinkhorn;
pub mod task;
pub mod trainer;

pub use actor::{build_actor, PermutationActor, Proposal};
pub use config::{Arch, SpgConfig};
pub use critic::{build_critic, PermutationCritic};
pub use dataset::{
    generate, GeneratorConfig, Instance, InstanceDataset, Label, Split, SplitDirs,
    SplitSelection,
};
pub use error::{Error, Result};
pub use exploration::EpsilonSchedule;
pub use matching::{optimal_matching, Matching, MatchingObjective};
pub use metrics::{EvalReport, MetricsSink, NullSink, StderrSink};
pub use replay::{ReplayBuffer, Transition};
pub use rounding::Rounder;
pub use sinkhorn::Sinkhorn;
pub use task::Task;
pub use trainer::{EpochSummary, SpgTrainer, StepStats, TrainingState};
