/// Represents a single recorded transition
#[derive(Debug, Clone, PartialEq)]
pub struct Exp {
    /// The perception vector before taking the action
    pub state: Vec<f32>,
    /// The index of the action taken in the given state
    pub action: usize,
    /// The reward received after taking the action
    pub reward: f32,
    /// The perception vector recomputed after the action is taken
    pub next_state: Vec<f32>,
    /// Whether the transition ended the episode
    pub terminal: bool,
}

/// A zipped batch of [experiences](Exp)
#[derive(Clone, Debug, Default)]
pub struct ExpBatch {
    pub states: Vec<Vec<f32>>,
    pub actions: Vec<usize>,
    pub rewards: Vec<f32>,
    pub next_states: Vec<Vec<f32>>,
    pub terminals: Vec<bool>,
}

impl ExpBatch {
    /// Construct an `ExpBatch` from an iterator of [experiences](Exp) and a specified batch size
    pub fn from_iter<'a>(iter: impl IntoIterator<Item = &'a Exp>, batch_size: usize) -> Self {
        let batch = Self {
            states: Vec::with_capacity(batch_size),
            actions: Vec::with_capacity(batch_size),
            rewards: Vec::with_capacity(batch_size),
            next_states: Vec::with_capacity(batch_size),
            terminals: Vec::with_capacity(batch_size),
        };

        iter.into_iter().fold(batch, |mut b, e| {
            b.states.push(e.state.clone());
            b.actions.push(e.action);
            b.rewards.push(e.reward);
            b.next_states.push(e.next_state.clone());
            b.terminals.push(e.terminal);
            b
        })
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
