//! Critic networks estimating the value of a (state, permutation) pair.
//!
//! The same forward contract serves both invocation modes: regression on
//! hard actions sampled from the replay buffer and the policy-gradient pass
//! on live soft actions. An action input may therefore be a 0/1 permutation
//! or a doubly-stochastic ψ.

use std::path::Path;

use tch::nn::{self, Module, RNN};
use tch::{Device, Tensor};

use crate::config::{Arch, SpgConfig};
use crate::error::Result;

/// Value estimator over (state, action-or-ψ) pairs.
pub trait PermutationCritic {
    /// Returns `Q(s, a)` as a `[b]` tensor.
    fn value(&self, states: &Tensor, actions: &Tensor) -> Tensor;

    /// Trainable parameters.
    fn var_store(&self) -> &nn::VarStore;

    /// Trainable parameters, for optimizer construction and loading.
    fn var_store_mut(&mut self) -> &mut nn::VarStore;

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

/// Builds the critic variant paired with the configured actor architecture.
pub fn build_critic(config: &SpgConfig, device: Device) -> Result<Box<dyn PermutationCritic>> {
    config.validate()?;
    Ok(match config.arch {
        Arch::Mlp => Box::new(MlpCritic::new(config, device)),
        Arch::Sequential => Box::new(SequentialCritic::new(config, device)),
        Arch::Matching => Box::new(MatchingCritic::new(config, device)),
    })
}

/// MLP critic: embeds state and action rows, combines, reduces to a scalar.
pub struct MlpCritic {
    vs: nn::VarStore,
    embed_state: nn::Linear,
    embed_action: nn::Linear,
    combine: nn::Linear,
    out_feature: nn::Linear,
    out_nodes: nn::Linear,
}

impl MlpCritic {
    pub fn new(config: &SpgConfig, device: Device) -> Self {
        let vs = nn::VarStore::new(device);
        let p = &vs.root();
        let hidden = config.embedding_dim as i64;
        let embed_state = nn::linear(
            p / "embed_state",
            config.task.n_features() as i64,
            hidden,
            Default::default(),
        );
        let embed_action = nn::linear(
            p / "embed_action",
            config.n_nodes as i64,
            hidden,
            Default::default(),
        );
        let combine = nn::linear(p / "combine", hidden, hidden, Default::default());
        let out_feature = nn::linear(p / "out_feature", hidden, 1, Default::default());
        let out_nodes = nn::linear(
            p / "out_nodes",
            config.n_nodes as i64,
            1,
            Default::default(),
        );
        Self {
            vs,
            embed_state,
            embed_action,
            combine,
            out_feature,
            out_nodes,
        }
    }
}

impl PermutationCritic for MlpCritic {
    fn value(&self, states: &Tensor, actions: &Tensor) -> Tensor {
        let x = self.embed_state.forward(states).leaky_relu();
        let p = self.embed_action.forward(actions).leaky_relu();
        let xp = self.combine.forward(&(x + p)).leaky_relu();
        let per_node = self.out_feature.forward(&xp);
        self.out_nodes
            .forward(&per_node.transpose(2, 1))
            .reshape([-1])
    }

    fn var_store(&self) -> &nn::VarStore {
        &self.vs
    }

    fn var_store_mut(&mut self) -> &mut nn::VarStore {
        &mut self.vs
    }
}

/// Sequential critic: embeds state and action, combines, runs a GRU over
/// the node sequence, reduces to a scalar.
pub struct SequentialCritic {
    vs: nn::VarStore,
    embed_state: nn::Linear,
    embed_action: nn::Linear,
    combine: nn::Linear,
    gru: nn::GRU,
    project: nn::Linear,
    out_feature: nn::Linear,
    out_nodes: nn::Linear,
}

impl SequentialCritic {
    pub fn new(config: &SpgConfig, device: Device) -> Self {
        let vs = nn::VarStore::new(device);
        let p = &vs.root();
        let emb = config.embedding_dim as i64;
        let embed_state = nn::linear(
            p / "embed_state",
            config.task.n_features() as i64,
            emb,
            Default::default(),
        );
        let embed_action = nn::linear(
            p / "embed_action",
            config.n_nodes as i64,
            emb,
            Default::default(),
        );
        let combine = nn::linear(p / "combine", emb, emb, Default::default());
        let gru = nn::gru(&(p / "gru"), emb, config.rnn_dim as i64, Default::default());
        let project = nn::linear(p / "project", config.rnn_dim as i64, emb, Default::default());
        let out_feature = nn::linear(p / "out_feature", emb, 1, Default::default());
        let out_nodes = nn::linear(
            p / "out_nodes",
            config.n_nodes as i64,
            1,
            Default::default(),
        );
        Self {
            vs,
            embed_state,
            embed_action,
            combine,
            gru,
            project,
            out_feature,
            out_nodes,
        }
    }
}

impl PermutationCritic for SequentialCritic {
    fn value(&self, states: &Tensor, actions: &Tensor) -> Tensor {
        let x = self.embed_state.forward(states).leaky_relu();
        let p = self.embed_action.forward(actions).leaky_relu();
        let xp = self.combine.forward(&(x + p)).leaky_relu();
        let (h, _) = self.gru.seq(&xp);
        let h = self.project.forward(&h).leaky_relu();
        let per_node = self.out_feature.forward(&h);
        self.out_nodes
            .forward(&per_node.transpose(2, 1))
            .reshape([-1])
    }

    fn var_store(&self) -> &nn::VarStore {
        &self.vs
    }

    fn var_store_mut(&mut self) -> &mut nn::VarStore {
        &mut self.vs
    }
}

/// Siamese matching critic: outer product of the two embedded groups plus
/// an embedded action, refined by a GRU.
pub struct MatchingCritic {
    vs: nn::VarStore,
    embedding: nn::Linear,
    embed_action: nn::Linear,
    gru: nn::GRU,
    project: nn::Linear,
    combine: nn::Linear,
    out_feature: nn::Linear,
    out_nodes: nn::Linear,
    n_nodes: i64,
}

impl MatchingCritic {
    pub fn new(config: &SpgConfig, device: Device) -> Self {
        let vs = nn::VarStore::new(device);
        let p = &vs.root();
        let emb = config.embedding_dim as i64;
        let n = config.n_nodes as i64;
        let embedding = nn::linear(
            p / "embedding",
            config.task.n_features() as i64,
            emb,
            Default::default(),
        );
        let embed_action = nn::linear(p / "embed_action", n, emb, Default::default());
        let gru = nn::gru(&(p / "gru"), n, config.rnn_dim as i64, Default::default());
        let project = nn::linear(p / "project", config.rnn_dim as i64, emb, Default::default());
        let combine = nn::linear(p / "combine", emb, emb, Default::default());
        let out_feature = nn::linear(p / "out_feature", emb, 1, Default::default());
        let out_nodes = nn::linear(p / "out_nodes", n, 1, Default::default());
        Self {
            vs,
            embedding,
            embed_action,
            gru,
            project,
            combine,
            out_feature,
            out_nodes,
            n_nodes: n,
        }
    }
}

impl PermutationCritic for MatchingCritic {
    fn value(&self, states: &Tensor, actions: &Tensor) -> Tensor {
        let n = self.n_nodes;
        let g1 = self.embedding.forward(&states.narrow(1, 0, n)).leaky_relu();
        let g2 = self.embedding.forward(&states.narrow(1, n, n)).leaky_relu();
        let x = g2.bmm(&g1.transpose(2, 1)).leaky_relu();
        let (h, _) = self.gru.seq(&x);
        let h = self.project.forward(&h).leaky_relu();
        let p = self.embed_action.forward(actions).leaky_relu();
        let xp = self.combine.forward(&(h + p)).leaky_relu();
        let per_node = self.out_feature.forward(&xp);
        self.out_nodes
            .forward(&per_node.transpose(2, 1))
            .reshape([-1])
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
    use crate::task::Task;
    use tch::Kind;

    fn states_for(config: &SpgConfig, batch: i64) -> Tensor {
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
    fn sequential_critic_outputs_scalar_per_instance() {
        let config = SpgConfig::for_task(Task::Tsp, 6);
        let critic = build_critic(&config, Device::Cpu).unwrap();
        let states = states_for(&config, 4);
        let actions = Tensor::eye(6, (Kind::Float, Device::Cpu))
            .reshape([1, 6, 6])
            .repeat([4, 1, 1]);
        let q = critic.value(&states, &actions);
        assert_eq!(q.size(), &[4]);
    }

    #[test]
    fn matching_critic_accepts_soft_and_hard_actions() {
        let config = SpgConfig::for_task(Task::Mwm2D, 5);
        let critic = build_critic(&config, Device::Cpu).unwrap();
        let states = states_for(&config, 2);
        let hard = Tensor::eye(5, (Kind::Float, Device::Cpu))
            .reshape([1, 5, 5])
            .repeat([2, 1, 1]);
        let soft = Tensor::full([2, 5, 5], 0.2, (Kind::Float, Device::Cpu));
        assert_eq!(critic.value(&states, &hard).size(), &[2]);
        assert_eq!(critic.value(&states, &soft).size(), &[2]);
    }

    #[test]
    fn mlp_critic_shape() {
        let config = SpgConfig {
            arch: Arch::Mlp,
            ..SpgConfig::for_task(Task::Sort, 4)
        };
        let critic = build_critic(&config, Device::Cpu).unwrap();
        let states = states_for(&config, 3);
        let actions = Tensor::eye(4, (Kind::Float, Device::Cpu))
            .reshape([1, 4, 4])
            .repeat([3, 1, 1]);
        assert_eq!(critic.value(&states, &actions).size(), &[3]);
    }
}
