//! Off-policy actor-critic training loop.
//!
//! One step: actor proposes a (soft, hard) pair for a state batch, the task
//! reward is computed on the hard permutation, transitions enter the replay
//! buffer, and once occupancy allows it the critic regresses on sampled hard
//! actions while the actor ascends the critic's value of its live soft
//! actions.

use std::path::Path;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tch::nn::{self, OptimizerConfig};
use tch::{Device, Kind, Tensor};

use crate::actor::{build_actor, PermutationActor};
use crate::config::SpgConfig;
use crate::critic::{build_critic, PermutationCritic};
use crate::dataset::InstanceDataset;
use crate::error::{Error, Result};
use crate::exploration::{two_exchange, EpsilonSchedule};
use crate::metrics::{EvalReport, MetricsSink};
use crate::replay::{ReplayBuffer, Transition};
use crate::reward::{birkhoff_proximity, reward};

/// Mutable per-run training state, threaded explicitly through each step.
#[derive(Debug, Clone)]
pub struct TrainingState {
    /// Completed training steps.
    pub step: u64,
    /// Exploration schedule.
    pub epsilon: EpsilonSchedule,
}

impl TrainingState {
    /// Fresh state at step 0 with the configured ε schedule.
    pub fn new(config: &SpgConfig) -> Self {
        Self {
            step: 0,
            epsilon: EpsilonSchedule::new(
                config.epsilon,
                config.epsilon_decay_rate,
                config.epsilon_decay_step,
            ),
        }
    }
}

/// Per-step statistics.
#[derive(Debug, Clone)]
pub struct StepStats {
    /// Mean task reward over the step's batch.
    pub mean_reward: f64,
    /// Mean ψ-to-vertex proximity over the batch.
    pub mean_birkhoff: f64,
    /// ε in effect when the step ran.
    pub epsilon: f64,
    /// Critic loss, once the buffer holds a full minibatch.
    pub critic_loss: Option<f64>,
    /// Actor loss, once the buffer holds a full minibatch.
    pub actor_loss: Option<f64>,
}

/// Summary of one pass over a training dataset.
#[derive(Debug, Clone)]
pub struct EpochSummary {
    /// Steps that completed normally.
    pub steps: u64,
    /// Steps dropped due to numeric divergence.
    pub aborted_steps: u64,
    /// Mean reward over completed steps.
    pub mean_reward: f64,
}

/// Sinkhorn policy-gradient trainer.
pub struct SpgTrainer {
    config: SpgConfig,
    device: Device,
    actor: Box<dyn PermutationActor>,
    critic: Box<dyn PermutationCritic>,
    actor_opt: nn::Optimizer,
    critic_opt: nn::Optimizer,
    actor_lr: f64,
    critic_lr: f64,
    buffer: ReplayBuffer,
    rng: StdRng,
}

impl SpgTrainer {
    /// Builds the actor/critic pair and optimizers for a validated
    /// configuration.
    pub fn new(config: SpgConfig, device: Device) -> Result<Self> {
        config.validate()?;
        let mut actor = build_actor(&config, device)?;
        let mut critic = build_critic(&config, device)?;
        let actor_opt = nn::Adam::default().build(actor.var_store_mut(), config.actor_lr)?;
        let critic_opt = nn::Adam::default().build(critic.var_store_mut(), config.critic_lr)?;
        let buffer = ReplayBuffer::new(config.buffer_capacity);
        let rng = StdRng::seed_from_u64(config.seed);
        let (actor_lr, critic_lr) = (config.actor_lr, config.critic_lr);
        Ok(Self {
            config,
            device,
            actor,
            critic,
            actor_opt,
            critic_opt,
            actor_lr,
            critic_lr,
            buffer,
            rng,
        })
    }

    /// The trainer's configuration.
    pub fn config(&self) -> &SpgConfig {
        &self.config
    }

    /// Current replay buffer occupancy.
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    /// The trained actor.
    pub fn actor(&self) -> &dyn PermutationActor {
        self.actor.as_ref()
    }

    /// Runs one training step on a `[b, rows, n_features]` state batch.
    ///
    /// On [`Error::NumericDivergence`] the step aborts before any buffer
    /// append; the buffer is never left partially updated.
    pub fn step(&mut self, states: &Tensor, ts: &mut TrainingState) -> Result<StepStats> {
        let epsilon = ts.epsilon.value();

        // Collection pass: no gradients needed, rounding required.
        let proposal = tch::no_grad(|| self.actor.propose(states, true))?;
        let psi = proposal.psi;
        let action = proposal.action.expect("rounding requested");

        // ε-greedy 2-exchange noise on fresh tensors.
        let (psi, action) = if ts.epsilon.roll(&mut self.rng) {
            two_exchange(
                &psi,
                &action,
                self.config.n_nodes,
                self.config.k_exchange,
                &mut self.rng,
            )
        } else {
            (psi, action)
        };
        ts.epsilon.advance();

        let rewards_t = reward(self.config.task, states, &action);
        let rewards: Vec<f64> = rewards_t.to_kind(Kind::Double).try_into()?;
        let proximity: f64 = birkhoff_proximity(&psi, &action)
            .mean(Kind::Float)
            .double_value(&[]);

        let batch = states.size()[0];
        for b in 0..batch {
            self.buffer.append(Transition {
                state: states.get(b).detach().copy(),
                action: action.get(b).copy(),
                psi: psi.get(b).copy(),
                reward: rewards[b as usize],
            });
        }

        let (critic_loss, actor_loss) = if self.buffer.len() >= self.config.batch_size {
            let (c, a) = self.update()?;
            (Some(c), Some(a))
        } else {
            (None, None)
        };

        ts.step += 1;
        self.decay_learning_rates(ts.step);

        Ok(StepStats {
            mean_reward: rewards.iter().sum::<f64>() / rewards.len() as f64,
            mean_birkhoff: proximity,
            epsilon,
            critic_loss,
            actor_loss,
        })
    }

    /// Samples a minibatch and applies the critic and actor updates.
    fn update(&mut self) -> Result<(f64, f64)> {
        let batch = self.buffer.sample(self.config.batch_size, &mut self.rng);
        let states = batch.states.to_device(self.device);
        let actions = batch.actions.to_device(self.device);
        let psis = batch.psis.to_device(self.device);
        let targets = batch.rewards.to_device(self.device);

        // Critic regression: hard actions from the buffer against observed
        // rewards, plus the optional soft/hard consistency term with the
        // hard value as a fixed target.
        let hard_q = self.critic.value(&states, &actions);
        let mut critic_loss = hard_q.mse_loss(&targets, tch::Reduction::Mean);
        if self.config.critic_aux_loss {
            let soft_q = self.critic.value(&states, &psis);
            critic_loss =
                critic_loss + soft_q.mse_loss(&hard_q.detach(), tch::Reduction::Mean);
        }
        let critic_loss_value = critic_loss.double_value(&[]);
        self.critic_opt.zero_grad();
        critic_loss.backward();
        self.critic_opt.clip_grad_norm(self.config.max_grad_norm);
        self.critic_opt.step();

        // Policy gradient: the actor maximizes the critic's value of its
        // live soft action; only actor parameters step, so the critic is
        // held fixed for this pass.
        self.critic_opt.zero_grad();
        self.actor_opt.zero_grad();
        let proposal = self.actor.propose(&states, false)?;
        let actor_loss = -self
            .critic
            .value(&states, &proposal.psi)
            .mean(Kind::Float);
        let actor_loss_value = actor_loss.double_value(&[]);
        actor_loss.backward();
        self.actor_opt.clip_grad_norm(self.config.max_grad_norm);
        self.actor_opt.step();

        Ok((critic_loss_value, actor_loss_value))
    }

    fn decay_learning_rates(&mut self, step: u64) {
        if step % self.config.actor_lr_decay_step == 0 {
            self.actor_lr *= self.config.actor_lr_decay_rate;
            self.actor_opt.set_lr(self.actor_lr);
        }
        if step % self.config.critic_lr_decay_step == 0 {
            self.critic_lr *= self.config.critic_lr_decay_rate;
            self.critic_opt.set_lr(self.critic_lr);
        }
    }

    /// Runs one pass over a training split.
    ///
    /// Steps that diverge numerically are dropped and counted; everything
    /// else propagates. Progress is logged to the sink every
    /// `config.log_step` steps.
    pub fn train_epoch(
        &mut self,
        dataset: &InstanceDataset,
        ts: &mut TrainingState,
        sink: &mut dyn MetricsSink,
    ) -> Result<EpochSummary> {
        let mut steps = 0u64;
        let mut aborted = 0u64;
        let mut reward_sum = 0.0;

        let batches: Vec<Vec<usize>> = dataset.batches(self.config.parallel_envs).collect();
        for indices in batches {
            let states = dataset.state_batch(&indices, self.device)?;
            match self.step(&states, ts) {
                Ok(stats) => {
                    steps += 1;
                    reward_sum += stats.mean_reward;
                    if ts.step % self.config.log_step == 0 {
                        sink.log("train/mean_reward", stats.mean_reward, ts.step);
                        sink.log("train/birkhoff_proximity", stats.mean_birkhoff, ts.step);
                        sink.log("train/epsilon", stats.epsilon, ts.step);
                        if let Some(loss) = stats.critic_loss {
                            sink.log("train/critic_loss", loss, ts.step);
                        }
                        if let Some(loss) = stats.actor_loss {
                            sink.log("train/actor_loss", loss, ts.step);
                        }
                    }
                }
                Err(Error::NumericDivergence) => {
                    aborted += 1;
                    sink.log("train/aborted_steps", aborted as f64, ts.step);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(EpochSummary {
            steps,
            aborted_steps: aborted,
            mean_reward: if steps > 0 {
                reward_sum / steps as f64
            } else {
                0.0
            },
        })
    }

    /// Greedy evaluation over a split, without gradient tracking.
    pub fn evaluate(&self, dataset: &InstanceDataset, batch_size: usize) -> Result<EvalReport> {
        EvalReport::evaluate(
            self.actor.as_ref(),
            self.config.task,
            dataset,
            batch_size,
            self.device,
        )
    }

    /// Saves actor and critic weights.
    pub fn save(&self, actor_path: &Path, critic_path: &Path) -> Result<()> {
        self.actor.save(actor_path)?;
        self.critic.save(critic_path)
    }

    /// Restores actor and critic weights saved by [`SpgTrainer::save`].
    pub fn load(&mut self, actor_path: &Path, critic_path: &Path) -> Result<()> {
        self.actor.load(actor_path)?;
        self.critic.load(critic_path)
    }
}
