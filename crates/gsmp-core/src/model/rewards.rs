//! Reward structures over an ACTMC.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ctmc::Actmc;
use super::event::Event;

/// Source of rewards for potato analysis.
pub trait RewardModel {
    /// Reward rate earned while residing in `state`: the state reward plus
    /// every outgoing CTMC transition reward weighted by its rate.
    fn merged_state_reward(&self, actmc: &Actmc, state: usize) -> f64;

    /// One-shot reward earned when `event` fires in `state`.
    fn event_reward(&self, event: &Event, state: usize) -> f64;
}

/// Explicit state, transition and event rewards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActmcRewards {
    state_rewards: BTreeMap<usize, f64>,
    /// `transition_rewards[from][to]`, earned each time the CTMC moves.
    transition_rewards: BTreeMap<usize, BTreeMap<usize, f64>>,
    /// `event_rewards[event id][state]`, earned when the event fires.
    event_rewards: BTreeMap<String, BTreeMap<usize, f64>>,
}

impl ActmcRewards {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_state_reward(&mut self, state: usize, reward: f64) {
        self.state_rewards.insert(state, reward);
    }

    pub fn add_to_state_reward(&mut self, state: usize, reward: f64) {
        *self.state_rewards.entry(state).or_insert(0.0) += reward;
    }

    pub fn set_transition_reward(&mut self, from: usize, to: usize, reward: f64) {
        self.transition_rewards.entry(from).or_default().insert(to, reward);
    }

    pub fn set_event_reward(&mut self, event_id: &str, state: usize, reward: f64) {
        self.event_rewards
            .entry(event_id.to_string())
            .or_default()
            .insert(state, reward);
    }

    pub fn state_reward(&self, state: usize) -> f64 {
        self.state_rewards.get(&state).copied().unwrap_or(0.0)
    }

    pub fn transition_reward(&self, from: usize, to: usize) -> f64 {
        self.transition_rewards
            .get(&from)
            .and_then(|row| row.get(&to))
            .copied()
            .unwrap_or(0.0)
    }
}

impl RewardModel for ActmcRewards {
    fn merged_state_reward(&self, actmc: &Actmc, state: usize) -> f64 {
        let transitions: f64 = actmc
            .rates_from(state)
            .map(|(to, rate)| rate * self.transition_reward(state, to))
            .sum();
        self.state_reward(state) + transitions
    }

    fn event_reward(&self, event: &Event, state: usize) -> f64 {
        self.event_rewards
            .get(event.id())
            .and_then(|row| row.get(&state))
            .copied()
            .unwrap_or(0.0)
    }
}
