//! Actor networks: feature extraction → score matrix → Sinkhorn → rounding.
//!
//! Three concrete variants share the [`PermutationActor`] contract and are
//! selected by [`Arch`](crate::config::Arch) configuration. The feature
//! extractor is an opaque differentiable map; everything downstream of the
//! score matrix is common.

use std::path::Path;

use tch::nn::{self, Module, RNN};
use tch::{Device, Tensor};

use crate::config::{Arch, SpgConfig};
use crate::error::Result;
use crate::rounding::Rounder;
use crate::sinkhorn::Sinkhorn;

/// Output of one actor forward pass.
#[derive(Debug)]
pub struct Proposal {
    /// Soft relaxed assignment `[b, n, n]`, differentiable.
    pub psi: Tensor,
    /// Hard permutation `[b, n, n]`, present when rounding was requested.
    /// Not connected to the gradient graph.
    pub action: Option<Tensor>,
}

/// A policy producing (soft, hard) permutation pairs from instance states.
pub trait PermutationActor {
    /// Raw score matrix `M` `[b, n, n]` from a state batch.
    fn scores(&self, states: &Tensor) -> Tensor;

    /// The Sinkhorn layer applied to the scores.
    fn sinkhorn(&self) -> &Sinkhorn;

    /// Trainable parameters.
    fn var_store(&self) -> &nn::VarStore;

    /// Trainable parameters, for optimizer construction and loading.
    fn var_store_mut(&mut self) -> &mut nn::VarStore;

    /// Runs the full pipeline: scores → ψ; with `round`, also the hard
    /// permutation. Non-finite ψ surfaces as
    /// [`Error::NumericDivergence`](crate::error::Error::NumericDivergence)
    /// and the caller must abort the step.
    fn propose(&self, states: &Tensor, round: bool) -> Result<Proposal> {
        let scores = self.scores(states);
        let psi = self.sinkhorn().forward(&scores);
        let action = if round {
            Some(Rounder::new().round(&psi)?)
        } else {
            None
        };
        Ok(Proposal { psi, action })
    }

    /// Saves the network weights.
    fn save(&self, path: &Path) -> Result<()> {
        self.var_store().save(path)?;
        Ok(())
    }

    /// Loads previously saved weights into this network.
    fn load(&mut self, path: &Path) -> Result<()> {
        self.var_store_mut().load(path)?;
        Ok(())
    }
}

/// Builds the actor variant selected by the configuration.
///
/// The configuration must already be validated; arch/task mismatches are
/// rejected there.
pub fn build_actor(config: &SpgConfig, device: Device) -> Result<Box<dyn PermutationActor>> {
    config.validate()?;
    Ok(match config.arch {
        Arch::Mlp => Box::new(MlpActor::new(config, device)),
        Arch::Sequential => Box::new(SequentialActor::new(config, device)),
        Arch::Matching => Box::new(MatchingActor::new(config, device)),
    })
}

/// Per-point MLP actor: `n_features → embedding → n_nodes` scores.
pub struct MlpActor {
    vs: nn::VarStore,
    fc1: nn::Linear,
    fc2: nn::Linear,
    sinkhorn: Sinkhorn,
}

impl MlpActor {
    pub fn new(config: &SpgConfig, device: Device) -> Self {
        let vs = nn::VarStore::new(device);
        let p = &vs.root();
        let fc1 = nn::linear(
            p / "fc1",
            config.task.n_features() as i64,
            config.embedding_dim as i64,
            Default::default(),
        );
        let fc2 = nn::linear(
            p / "fc2",
            config.embedding_dim as i64,
            config.n_nodes as i64,
            Default::default(),
        );
        let sinkhorn = Sinkhorn::new(config.sinkhorn_iters, config.sinkhorn_tau);
        Self {
            vs,
            fc1,
            fc2,
            sinkhorn,
        }
    }
}

impl PermutationActor for MlpActor {
    fn scores(&self, states: &Tensor) -> Tensor {
        let x = self.fc1.forward(states).leaky_relu();
        self.fc2.forward(&x)
    }

    fn sinkhorn(&self) -> &Sinkhorn {
        &self.sinkhorn
    }

    fn var_store(&self) -> &nn::VarStore {
        &self.vs
    }

    fn var_store_mut(&mut self) -> &mut nn::VarStore {
        &mut self.vs
    }
}

/// Sequential actor: point embedding, (optionally bidirectional) GRU over
/// the sequence, then projection to per-node scores.
pub struct SequentialActor {
    vs: nn::VarStore,
    embedding: nn::Linear,
    gru: nn::GRU,
    fc1: nn::Linear,
    fc2: nn::Linear,
    sinkhorn: Sinkhorn,
}

impl SequentialActor {
    pub fn new(config: &SpgConfig, device: Device) -> Self {
        let vs = nn::VarStore::new(device);
        let p = &vs.root();
        let embedding = nn::linear(
            p / "embedding",
            config.task.n_features() as i64,
            config.embedding_dim as i64,
            Default::default(),
        );
        let gru = nn::gru(
            &(p / "gru"),
            config.embedding_dim as i64,
            config.rnn_dim as i64,
            nn::RNNConfig {
                bidirectional: config.bidirectional,
                ..Default::default()
            },
        );
        let directions = if config.bidirectional { 2 } else { 1 };
        let fc1 = nn::linear(
            p / "fc1",
            (config.rnn_dim * directions) as i64,
            config.embedding_dim as i64,
            Default::default(),
        );
        let fc2 = nn::linear(
            p / "fc2",
            config.embedding_dim as i64,
            config.n_nodes as i64,
            Default::default(),
        );
        let sinkhorn = Sinkhorn::new(config.sinkhorn_iters, config.sinkhorn_tau);
        Self {
            vs,
            embedding,
            gru,
            fc1,
            fc2,
            sinkhorn,
        }
    }
}

impl PermutationActor for SequentialActor {
    fn scores(&self, states: &Tensor) -> Tensor {
        let x = self.embedding.forward(states).leaky_relu();
        let (h, _) = self.gru.seq(&x);
        let x = self.fc1.forward(&h).leaky_relu();
        self.fc2.forward(&x)
    }

    fn sinkhorn(&self) -> &Sinkhorn {
        &self.sinkhorn
    }

    fn var_store(&self) -> &nn::VarStore {
        &self.vs
    }

    fn var_store_mut(&mut self) -> &mut nn::VarStore {
        &mut self.vs
    }
}

/// Siamese matching actor for two-group instances.
///
/// Both point groups pass through a shared embedding; their outer product
/// yields an `n × n` interaction matrix which a GRU refines row by row
/// before projection to scores.
pub struct MatchingActor {
    vs: nn::VarStore,
    embedding: nn::Linear,
    gru: nn::GRU,
    fc1: nn::Linear,
    sinkhorn: Sinkhorn,
    n_nodes: i64,
}

impl MatchingActor {
    pub fn new(config: &SpgConfig, device: Device) -> Self {
        let vs = nn::VarStore::new(device);
        let p = &vs.root();
        let embedding = nn::linear(
            p / "embedding",
            config.task.n_features() as i64,
            config.embedding_dim as i64,
            Default::default(),
        );
        let gru = nn::gru(
            &(p / "gru"),
            config.n_nodes as i64,
            config.rnn_dim as i64,
            Default::default(),
        );
        let fc1 = nn::linear(
            p / "fc1",
            config.rnn_dim as i64,
            config.n_nodes as i64,
            Default::default(),
        );
        let sinkhorn = Sinkhorn::new(config.sinkhorn_iters, config.sinkhorn_tau);
        Self {
            vs,
            embedding,
            gru,
            fc1,
            sinkhorn,
            n_nodes: config.n_nodes as i64,
        }
    }
}

impl PermutationActor for MatchingActor {
    fn scores(&self, states: &Tensor) -> Tensor {
        let n = self.n_nodes;
        let g1 = self.embedding.forward(&states.narrow(1, 0, n)).leaky_relu();
        let g2 = self.embedding.forward(&states.narrow(1, n, n)).leaky_relu();
        let x = g2.bmm(&g1.transpose(2, 1));
        let (h, _) = self.gru.seq(&x);
        self.fc1.forward(&h)
    }

    fn sinkhorn(&self) -> &Sinkhorn {
        &self.sinkhorn
    }

    fn var_store(&self) -> &nn::VarStore {
        &self.vs
    }

    fn var_store_mut(&mut self) -> &mut nn::VarStore {
        &mut self.vs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rounding::is_permutation_batch;
    use crate::task::Task;
    use tch::Kind;

    fn random_states(config: &SpgConfig, batch: i64) -> Tensor {
        Tensor::rand(
            [
                batch,
                config.state_rows() as i64,
                config.task.n_features() as i64,
            ],
            (Kind::Float, Device::Cpu),
        )
    }

    #[test]
    fn sequential_actor_produces_square_psi() {
        let config = SpgConfig::for_task(Task::Tsp, 6);
        let actor = build_actor(&config, Device::Cpu).unwrap();
        let states = random_states(&config, 3);
        let proposal = actor.propose(&states, false).unwrap();
        assert_eq!(proposal.psi.size(), &[3, 6, 6]);
        assert!(proposal.action.is_none());
    }

    #[test]
    fn matching_actor_rounds_to_permutations() {
        let config = SpgConfig::for_task(Task::Mwm2D, 5);
        let actor = build_actor(&config, Device::Cpu).unwrap();
        let states = random_states(&config, 2);
        let proposal = actor.propose(&states, true).unwrap();
        assert_eq!(proposal.psi.size(), &[2, 5, 5]);
        let action = proposal.action.unwrap();
        assert!(is_permutation_batch(&action));
    }

    #[test]
    fn mlp_actor_psi_is_nearly_doubly_stochastic() {
        let config = SpgConfig {
            arch: Arch::Mlp,
            ..SpgConfig::for_task(Task::Sort, 8)
        };
        let actor = build_actor(&config, Device::Cpu).unwrap();
        let states = random_states(&config, 4);
        let proposal = actor.propose(&states, false).unwrap();
        let rows = proposal
            .psi
            .sum_dim_intlist([-1].as_slice(), false, Kind::Float);
        assert!((rows - 1.0).abs().max().double_value(&[]) < 1e-2);
    }

    #[test]
    fn build_rejects_invalid_combination() {
        let config = SpgConfig {
            arch: Arch::Matching,
            ..SpgConfig::for_task(Task::Sort, 8)
        };
        assert!(build_actor(&config, Device::Cpu).is_err());
    }
}
