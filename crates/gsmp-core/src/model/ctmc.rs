//! ACTMC: a CTMC whose states may additionally run one timed event each.

use std::collections::{BTreeMap, BTreeSet};

use gsmp_common::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::event::Event;
use crate::logging::targets;

/// CTMC with exponential rates plus non-exponential events.
///
/// At most one event may be active in any state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Actmc {
    num_states: usize,
    #[serde(default)]
    initial_states: BTreeSet<usize>,
    /// `rates[s]` maps target state to transition rate. Trailing states
    /// without outgoing rates may have no row.
    #[serde(default)]
    rates: Vec<BTreeMap<usize, f64>>,
    #[serde(default)]
    events: Vec<Event>,
}

impl Actmc {
    pub fn new(num_states: usize) -> Self {
        Self {
            num_states,
            initial_states: BTreeSet::new(),
            rates: vec![BTreeMap::new(); num_states],
            events: Vec::new(),
        }
    }

    /// Parse a model from JSON and validate it.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut actmc: Actmc = serde_json::from_str(json)?;
        actmc.validate()?;
        for (state, row) in actmc.rates.iter_mut().enumerate() {
            row.remove(&state);
            row.retain(|_, rate| *rate > 0.0);
        }
        Ok(actmc)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn num_states(&self) -> usize {
        self.num_states
    }

    fn check_state(&self, state: usize) -> Result<()> {
        if state < self.num_states {
            Ok(())
        } else {
            Err(Error::StateOutOfRange {
                state,
                num_states: self.num_states,
            })
        }
    }

    pub fn add_initial_state(&mut self, state: usize) -> Result<()> {
        self.check_state(state)?;
        self.initial_states.insert(state);
        Ok(())
    }

    pub fn initial_states(&self) -> &BTreeSet<usize> {
        &self.initial_states
    }

    pub fn is_initial(&self, state: usize) -> bool {
        self.initial_states.contains(&state)
    }

    /// Add `rate` to the transition `from -> to`. Self-loops do not change
    /// CTMC behaviour and are dropped.
    pub fn add_rate(&mut self, from: usize, to: usize, rate: f64) -> Result<()> {
        self.check_state(from)?;
        self.check_state(to)?;
        if !(rate.is_finite() && rate >= 0.0) {
            return Err(Error::InvalidParameter(format!(
                "rate {from} -> {to} must be finite and non-negative, got {rate}"
            )));
        }
        if from == to || rate == 0.0 {
            return Ok(());
        }
        if self.rates.len() <= from {
            self.rates.resize(from + 1, BTreeMap::new());
        }
        *self.rates[from].entry(to).or_insert(0.0) += rate;
        Ok(())
    }

    /// Outgoing `(target, rate)` pairs of `state`.
    pub fn rates_from(&self, state: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.rates
            .get(state)
            .into_iter()
            .flat_map(|row| row.iter().map(|(t, r)| (*t, *r)))
    }

    pub fn rate(&self, from: usize, to: usize) -> f64 {
        self.rates
            .get(from)
            .and_then(|row| row.get(&to))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn exit_rate(&self, state: usize) -> f64 {
        self.rates_from(state).map(|(_, r)| r).sum()
    }

    /// Largest exit rate over all states.
    pub fn max_exit_rate(&self) -> f64 {
        (0..self.num_states)
            .map(|s| self.exit_rate(s))
            .fold(0.0, f64::max)
    }

    /// Add a timed event, rejecting overlaps with already active events.
    pub fn add_event(&mut self, event: Event) -> Result<()> {
        event.validate(self.num_states)?;
        if self.events.iter().any(|e| e.id() == event.id()) {
            return Err(Error::InvalidModel(format!(
                "duplicate event identifier {:?}",
                event.id()
            )));
        }
        for existing in &self.events {
            if let Some(state) = existing.active_states().intersection(event.active_states()).next() {
                return Err(Error::InvalidModel(format!(
                    "events {:?} and {:?} are both active in state {state}",
                    existing.id(),
                    event.id()
                )));
            }
        }
        debug!(
            target: targets::MODEL,
            event = event.id(),
            family = event.distribution().family(),
            active = event.active_states().len(),
            "event added"
        );
        self.events.push(event);
        Ok(())
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn num_events(&self) -> usize {
        self.events.len()
    }

    pub fn event(&self, id: &str) -> Option<&Event> {
        self.events.iter().find(|e| e.id() == id)
    }

    /// The event running in `state`, if any.
    pub fn active_event(&self, state: usize) -> Option<&Event> {
        self.events.iter().find(|e| e.is_active(state))
    }

    /// Check state ranges, rates and the one-event-per-state rule.
    pub fn validate(&self) -> Result<()> {
        if self.rates.len() > self.num_states {
            return Err(Error::InvalidModel(format!(
                "{} rate rows for {} states",
                self.rates.len(),
                self.num_states
            )));
        }
        for &state in &self.initial_states {
            self.check_state(state)?;
        }
        for (from, row) in self.rates.iter().enumerate() {
            for (&to, &rate) in row {
                self.check_state(to)?;
                if !(rate.is_finite() && rate >= 0.0) {
                    return Err(Error::InvalidParameter(format!(
                        "rate {from} -> {to} must be finite and non-negative, got {rate}"
                    )));
                }
            }
        }
        let mut owner: BTreeMap<usize, &str> = BTreeMap::new();
        let mut ids = BTreeSet::new();
        for event in &self.events {
            event.validate(self.num_states)?;
            if !ids.insert(event.id()) {
                return Err(Error::InvalidModel(format!(
                    "duplicate event identifier {:?}",
                    event.id()
                )));
            }
            for &state in event.active_states() {
                if let Some(other) = owner.insert(state, event.id()) {
                    return Err(Error::InvalidModel(format!(
                        "events {other:?} and {:?} are both active in state {state}",
                        event.id()
                    )));
                }
            }
        }
        Ok(())
    }
}
