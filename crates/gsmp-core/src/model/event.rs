//! Timed events of an ACTMC.
//!
//! An event is active in a set of states. While it is active its timer runs;
//! when the timer fires in state `s`, the next state is drawn from the firing
//! kernel of `s`.

use std::collections::{BTreeMap, BTreeSet};

use gsmp_common::{Distribution, Error, Result};
use serde::{Deserialize, Serialize};

/// Firing-time distribution of an event timer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum EventDistribution {
    Exponential { rate: f64 },
    Erlang { rate: f64, phases: u64 },
    Dirac { timeout: f64 },
    Weibull { scale: f64, shape: f64 },
}

impl EventDistribution {
    /// Build from a family name and up to two numeric parameters, as they
    /// appear in modelling-language declarations.
    ///
    /// Parameter order: exponential `(rate)`, erlang `(rate, phases)`, dirac
    /// `(timeout)`, weibull `(scale, shape)`.
    pub fn from_parts(family: &str, first: f64, second: f64) -> Result<Self> {
        let distribution = match family.to_ascii_lowercase().as_str() {
            "exponential" | "exp" => EventDistribution::Exponential { rate: first },
            "erlang" => {
                if !(second.is_finite() && second >= 1.0 && second.fract() == 0.0) {
                    return Err(Error::InvalidParameter(format!(
                        "erlang phases must be a positive integer, got {second}"
                    )));
                }
                EventDistribution::Erlang {
                    rate: first,
                    phases: second as u64,
                }
            }
            "dirac" | "deterministic" => EventDistribution::Dirac { timeout: first },
            "weibull" => EventDistribution::Weibull {
                scale: first,
                shape: second,
            },
            other => return Err(Error::UnsupportedDistribution(other.to_string())),
        };
        distribution.validate()?;
        Ok(distribution)
    }

    pub fn family(&self) -> &'static str {
        match self {
            EventDistribution::Exponential { .. } => "exponential",
            EventDistribution::Erlang { .. } => "erlang",
            EventDistribution::Dirac { .. } => "dirac",
            EventDistribution::Weibull { .. } => "weibull",
        }
    }

    /// Reject degenerate parameters before any computation.
    pub fn validate(&self) -> Result<()> {
        fn positive(name: &str, value: f64) -> Result<()> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(Error::InvalidParameter(format!(
                    "{name} must be finite and positive, got {value}"
                )))
            }
        }

        match *self {
            EventDistribution::Exponential { rate } => positive("exponential rate", rate),
            EventDistribution::Erlang { rate, phases } => {
                positive("erlang rate", rate)?;
                if phases == 0 {
                    return Err(Error::InvalidParameter("erlang phases must be at least 1".into()));
                }
                Ok(())
            }
            EventDistribution::Dirac { timeout } => {
                if timeout.is_finite() && timeout >= 0.0 {
                    Ok(())
                } else {
                    Err(Error::InvalidParameter(format!(
                        "dirac timeout must be finite and non-negative, got {timeout}"
                    )))
                }
            }
            EventDistribution::Weibull { scale, shape } => {
                positive("weibull scale", scale)?;
                positive("weibull shape", shape)
            }
        }
    }
}

/// A timed event with its active states and firing kernels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    id: String,
    distribution: EventDistribution,
    #[serde(default)]
    active: BTreeSet<usize>,
    #[serde(default)]
    kernels: BTreeMap<usize, Distribution>,
}

impl Event {
    pub fn new(id: impl Into<String>, distribution: EventDistribution) -> Self {
        Self {
            id: id.into(),
            distribution,
            active: BTreeSet::new(),
            kernels: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn distribution(&self) -> &EventDistribution {
        &self.distribution
    }

    pub fn set_distribution(&mut self, distribution: EventDistribution) {
        self.distribution = distribution;
    }

    /// Add `prob` to the firing probability `from -> to`; `from` becomes active.
    pub fn add_to_probability(&mut self, from: usize, to: usize, prob: f64) {
        self.kernels.entry(from).or_default().add(to, prob);
        self.active.insert(from);
    }

    pub fn set_active(&mut self, state: usize) {
        self.active.insert(state);
    }

    pub fn set_passive(&mut self, state: usize) {
        self.active.remove(&state);
    }

    pub fn is_active(&self, state: usize) -> bool {
        self.active.contains(&state)
    }

    /// Active states in ascending order.
    pub fn active_states(&self) -> &BTreeSet<usize> {
        &self.active
    }

    /// Firing kernel of `state`.
    pub fn transitions_of(&self, state: usize) -> Option<&Distribution> {
        self.kernels.get(&state)
    }

    /// States any firing kernel can lead to.
    pub fn targets(&self) -> BTreeSet<usize> {
        self.kernels.values().flat_map(|k| k.support()).collect()
    }

    /// Check parameters and kernels against a model with `num_states` states.
    pub fn validate(&self, num_states: usize) -> Result<()> {
        self.distribution.validate()?;
        for &state in &self.active {
            if state >= num_states {
                return Err(Error::StateOutOfRange { state, num_states });
            }
        }
        for (&from, kernel) in &self.kernels {
            if !self.active.contains(&from) {
                return Err(Error::InvalidModel(format!(
                    "event {:?} has a firing kernel for passive state {from}",
                    self.id
                )));
            }
            if !kernel.is_valid() {
                return Err(Error::InvalidModel(format!(
                    "event {:?} has a negative or non-finite firing probability in state {from}",
                    self.id
                )));
            }
            if let Some((to, _)) = kernel.iter().find(|(to, _)| *to >= num_states) {
                return Err(Error::StateOutOfRange {
                    state: to,
                    num_states,
                });
            }
        }
        Ok(())
    }
}
