use burn::{
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkBytesRecorder, Recorder},
    tensor::{backend::AutodiffBackend, ElementConversion},
};
use log::{debug, info, warn};
use nn::loss::{MseLoss, Reduction};
use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};

use crate::{
    decay,
    error::Error,
    exploration::{Choice, EpsilonGreedy},
    memory::{Exp, ReplayMemory},
    store::Store,
};

use super::{QNet, QNetConfig};

type CheckpointRecorder = NamedMpkBytesRecorder<FullPrecisionSettings>;

/// Object-safe handle on a burn optimizer over [`QNet`]
///
/// [`AdamConfig::init`] returns an unnameable type, so the trainer keeps it boxed behind
/// this trait.
trait QOptimizer<B: AutodiffBackend> {
    fn update(&mut self, lr: f64, net: QNet<B>, grads: GradientsParams) -> QNet<B>;

    fn record_bytes(&self) -> crate::Result<Vec<u8>>;

    /// Consume `self`, returning an optimizer carrying the state encoded in `bytes`
    fn restored(
        self: Box<Self>,
        bytes: Vec<u8>,
        device: &B::Device,
    ) -> crate::Result<Box<dyn QOptimizer<B>>>;
}

impl<B, O> QOptimizer<B> for O
where
    B: AutodiffBackend,
    O: Optimizer<QNet<B>, B> + 'static,
{
    fn update(&mut self, lr: f64, net: QNet<B>, grads: GradientsParams) -> QNet<B> {
        self.step(lr, net, grads)
    }

    fn record_bytes(&self) -> crate::Result<Vec<u8>> {
        <CheckpointRecorder as Recorder<B>>::record(&CheckpointRecorder::new(), self.to_record(), ())
            .map_err(record_error)
    }

    fn restored(
        self: Box<Self>,
        bytes: Vec<u8>,
        device: &B::Device,
    ) -> crate::Result<Box<dyn QOptimizer<B>>> {
        let record = <CheckpointRecorder as Recorder<B>>::load(&CheckpointRecorder::new(), bytes, device)
            .map_err(record_error)?;
        Ok(Box::new((*self).load_record(record)))
    }
}

fn adam<B: AutodiffBackend>() -> Box<dyn QOptimizer<B>> {
    Box::new(AdamConfig::new().init::<B, QNet<B>>())
}

/// Configuration for the [`Trainer`]
#[derive(Config, Debug)]
pub struct TrainerConfig {
    /// Length of the perception vector
    pub state_dim: usize,
    /// Number of discrete actions
    pub action_dim: usize,
    #[config(default = 1e-3)]
    pub lr: f64,
    /// The discount factor
    #[config(default = 0.99)]
    pub gamma: f32,
    #[config(default = 1.0)]
    pub epsilon_start: f32,
    #[config(default = 0.05)]
    pub epsilon_min: f32,
    /// Multiplier applied to epsilon at the end of every episode
    #[config(default = 0.998)]
    pub epsilon_decay: f32,
    #[config(default = 64)]
    pub batch_size: usize,
    #[config(default = 50000)]
    pub memory_size: usize,
    /// Gradient updates between hard copies of the online estimator into the target
    #[config(default = 1000)]
    pub target_sync_every: u64,
    #[config(default = 128)]
    pub hidden: usize,
}

impl TrainerConfig {
    fn model(&self) -> QNetConfig {
        QNetConfig::new(self.state_dim, self.action_dim).with_hidden(self.hidden)
    }

    fn validate(&self) -> crate::Result<()> {
        let problem = if self.state_dim == 0 || self.action_dim == 0 {
            "state and action dimensions must be non-zero"
        } else if self.batch_size == 0 || self.memory_size < self.batch_size {
            "replay memory must hold at least one non-empty batch"
        } else if self.target_sync_every == 0 {
            "target sync period must be non-zero"
        } else if !(0.0..=1.0).contains(&self.epsilon_start) {
            "epsilon must start in [0, 1]"
        } else {
            return Ok(());
        };
        Err(Error::InvalidConfig(problem.to_owned()))
    }
}

/// Serialized trainer state, encoded as MessagePack
#[derive(Serialize, Deserialize)]
struct Checkpoint {
    #[serde(with = "raw_bytes")]
    model: Vec<u8>,
    #[serde(with = "raw_bytes")]
    optimizer: Vec<u8>,
    epsilon: f32,
    state_dim: usize,
    action_dim: usize,
}

/// Encode recorder output as one binary blob instead of a sequence of integers
mod raw_bytes {
    use std::fmt;

    use serde::{de, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        struct BytesVisitor;

        impl<'de> de::Visitor<'de> for BytesVisitor {
            type Value = Vec<u8>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a byte array")
            }

            fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Vec<u8>, E> {
                Ok(v.to_vec())
            }

            fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Vec<u8>, E> {
                Ok(v)
            }
        }

        deserializer.deserialize_byte_buf(BytesVisitor)
    }
}

fn record_error(e: impl std::fmt::Debug) -> Error {
    Error::Record(format!("{e:?}"))
}

/// An online Deep Q-learning trainer with experience replay and a hard-synced target network
///
/// ### Generics
/// - `B`: A burn autodiff backend
///
/// The target network is only ever used to compute bootstrapped targets, never for
/// action selection.
pub struct Trainer<B: AutodiffBackend> {
    policy_net: Option<QNet<B>>,
    target_net: QNet<B>,
    optimizer: Box<dyn QOptimizer<B>>,
    memory: ReplayMemory,
    loss: MseLoss<B>,
    exploration: EpsilonGreedy<decay::Geometric>,
    config: TrainerConfig,
    device: B::Device,
    train_steps: u64,
}

impl<B: AutodiffBackend> Trainer<B> {
    pub fn new(config: TrainerConfig, device: B::Device) -> crate::Result<Self> {
        config.validate()?;
        let schedule =
            decay::Geometric::new(config.epsilon_decay, config.epsilon_start, config.epsilon_min)?;
        let policy_net = config.model().init::<B>(&device);

        Ok(Self {
            target_net: policy_net.clone(),
            policy_net: Some(policy_net),
            optimizer: adam(),
            memory: ReplayMemory::new(config.memory_size, config.batch_size),
            loss: MseLoss::new(),
            exploration: EpsilonGreedy::new(schedule),
            config,
            device,
            train_steps: 0,
        })
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn epsilon(&self) -> f32 {
        self.exploration.epsilon()
    }

    pub fn memory_len(&self) -> usize {
        self.memory.len()
    }

    /// Number of gradient updates performed since creation or the last reset
    pub fn train_steps(&self) -> u64 {
        self.train_steps
    }

    fn policy(&self) -> &QNet<B> {
        self.policy_net
            .as_ref()
            .expect("policy network is only taken for the duration of an update")
    }

    fn batch_tensor<S: AsRef<[f32]>>(&self, rows: &[S]) -> Tensor<B, 2> {
        let flat = rows
            .iter()
            .flat_map(|row| row.as_ref().iter().copied())
            .collect::<Vec<_>>();
        let shape = Shape::new([rows.len(), self.config.state_dim]);
        Tensor::from_floats(Data::new(flat, shape), &self.device)
    }

    /// Predicted action values for one perception vector
    pub fn q_values(&self, state: &[f32]) -> Vec<f32> {
        self.policy()
            .forward(self.batch_tensor(&[state]))
            .into_data()
            .convert::<f32>()
            .value
    }

    #[cfg(test)]
    fn target_q_values(&self, state: &[f32]) -> Vec<f32> {
        self.target_net
            .forward(self.batch_tensor(&[state]))
            .into_data()
            .convert::<f32>()
            .value
    }

    /// The action the online estimator values most
    pub fn greedy_action(&self, state: &[f32]) -> usize {
        let output = self
            .policy()
            .forward(self.batch_tensor(&[state]))
            .argmax(1)
            .into_scalar();
        output.elem::<i64>() as usize
    }

    /// Invoke the estimator along with the exploration policy to choose an action index
    pub fn select_action(&self, state: &[f32]) -> usize {
        match self.exploration.choose() {
            Choice::Explore => thread_rng().gen_range(0..self.config.action_dim),
            Choice::Exploit => self.greedy_action(state),
        }
    }

    pub fn store_experience(
        &mut self,
        state: Vec<f32>,
        action: usize,
        reward: f32,
        next_state: Vec<f32>,
        terminal: bool,
    ) {
        self.memory.push(Exp {
            state,
            action,
            reward,
            next_state,
            terminal,
        });
    }

    /// Perform one DQN learning step on a uniformly sampled minibatch
    ///
    /// **Returns** the batch loss, or `None` (leaving all parameters untouched) while
    /// fewer than one batch of experiences is stored
    pub fn train_step(&mut self) -> Option<f32> {
        let batch = self.memory.sample_zipped()?;
        let n = batch.len();

        let states = self.batch_tensor(&batch.states);
        let next_states = self.batch_tensor(&batch.next_states);
        let actions = Tensor::<B, 1, Int>::from_ints(
            Data::new(
                batch.actions.iter().map(|&a| a as i32).collect::<Vec<_>>(),
                Shape::new([n]),
            ),
            &self.device,
        );
        let rewards = Tensor::<B, 1>::from_floats(Data::new(batch.rewards, Shape::new([n])), &self.device);
        let terminals = Tensor::<B, 1>::from_floats(
            Data::new(
                batch
                    .terminals
                    .iter()
                    .map(|&t| if t { 1.0 } else { 0.0 })
                    .collect::<Vec<f32>>(),
                Shape::new([n]),
            ),
            &self.device,
        );

        let policy_net = self.policy_net.take()?;

        // Q values of the actions actually taken
        let q_values = policy_net
            .forward(states)
            .gather(1, actions.unsqueeze_dim::<2>(1))
            .squeeze::<1>(1);

        // Bootstrapped one-step targets from the frozen network, zeroed past terminal states
        let max_next_q = self
            .target_net
            .forward(next_states)
            .max_dim(1)
            .squeeze::<1>(1)
            .detach();
        let continuing = terminals.neg().add_scalar(1.0);
        let targets = rewards + max_next_q.mul(continuing).mul_scalar(self.config.gamma);

        let loss = self.loss.forward(q_values, targets, Reduction::Mean);
        let loss_value = loss.clone().into_scalar().elem::<f32>();

        let grads = GradientsParams::from_grads(loss.backward(), &policy_net);
        self.policy_net = Some(self.optimizer.update(self.config.lr, policy_net, grads));
        self.train_steps += 1;

        if self.train_steps % self.config.target_sync_every == 0 {
            self.sync_target();
        }

        Some(loss_value)
    }

    /// Hard-copy the online estimator's parameters into the target estimator
    pub fn sync_target(&mut self) {
        self.target_net = self.policy().clone();
        debug!("target network synced after {} updates", self.train_steps);
    }

    pub fn decay_epsilon(&mut self) {
        self.exploration.decay();
    }

    /// Serialize estimator, optimizer and exploration state into `store`
    pub fn save(&self, store: &impl Store, path: &str) -> crate::Result<()> {
        let model = <CheckpointRecorder as Recorder<B>>::record(
            &CheckpointRecorder::new(),
            self.policy().clone().into_record(),
            (),
        )
        .map_err(record_error)?;
        let optimizer = self.optimizer.record_bytes()?;

        let checkpoint = Checkpoint {
            model,
            optimizer,
            epsilon: self.epsilon(),
            state_dim: self.config.state_dim,
            action_dim: self.config.action_dim,
        };
        store.save(path, &rmp_serde::to_vec_named(&checkpoint)?)?;
        debug!("checkpoint saved to {path}");
        Ok(())
    }

    /// Restore from `store`, touching nothing unless the whole checkpoint is usable
    ///
    /// **Returns** `Ok(false)` if no checkpoint exists at `path`
    pub fn try_load(&mut self, store: &impl Store, path: &str) -> crate::Result<bool> {
        let Some(bytes) = store.load(path)? else {
            return Ok(false);
        };
        let checkpoint: Checkpoint = rmp_serde::from_slice(&bytes)?;

        for (expected, found) in [
            (self.config.state_dim, checkpoint.state_dim),
            (self.config.action_dim, checkpoint.action_dim),
        ] {
            if expected != found {
                return Err(Error::DimensionMismatch { expected, found });
            }
        }

        let model_record = <CheckpointRecorder as Recorder<B>>::load(
            &CheckpointRecorder::new(),
            checkpoint.model,
            &self.device,
        )
        .map_err(record_error)?;
        let optimizer = adam::<B>().restored(checkpoint.optimizer, &self.device)?;

        let policy_net = self
            .config
            .model()
            .init::<B>(&self.device)
            .load_record(model_record);

        self.target_net = policy_net.clone();
        self.policy_net = Some(policy_net);
        self.optimizer = optimizer;
        self.exploration.restore(checkpoint.epsilon);
        Ok(true)
    }

    /// Best-effort [`Trainer::try_load`]: any failure is logged and training starts fresh
    pub fn load(&mut self, store: &impl Store, path: &str) -> bool {
        match self.try_load(store, path) {
            Ok(true) => {
                info!("loaded checkpoint {path} (epsilon {:.3})", self.epsilon());
                true
            }
            Ok(false) => false,
            Err(e) => {
                warn!("checkpoint {path} rejected, starting fresh: {e}");
                false
            }
        }
    }

    /// Reinitialize both estimators and the optimizer, reset epsilon and clear replay memory
    pub fn reset_training(&mut self) {
        let policy_net = self.config.model().init::<B>(&self.device);
        self.target_net = policy_net.clone();
        self.policy_net = Some(policy_net);
        self.optimizer = adam();
        self.exploration.reset();
        self.memory.clear();
        self.train_steps = 0;
        info!("training state reset");
    }
}
