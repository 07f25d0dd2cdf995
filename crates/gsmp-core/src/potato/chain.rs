//! The potato of an event and its uniformized chain.
//!
//! Local indices list the potato states first and then the successor states,
//! each in ascending global order. Successors are absorbing. The step matrix
//! `P = I + Q/λ` is never stored: both multiplication primitives apply it on
//! the fly from the exact generator rates.

use std::collections::{BTreeMap, BTreeSet};

use bigdecimal::BigDecimal;
use gsmp_common::{Error, Result};
use gsmp_math::{from_f64, Precision};
use num_traits::{One, Zero};
use tracing::debug;

use crate::logging::targets;
use crate::model::{Actmc, Event};

#[derive(Debug, Clone, PartialEq)]
pub struct PotatoChain {
    states: Vec<usize>,
    successors: Vec<usize>,
    entrances: BTreeSet<usize>,
    to_local: BTreeMap<usize, usize>,
    /// Off-diagonal generator rates of potato states, by local index.
    rates: Vec<Vec<(usize, BigDecimal)>>,
    exit_rates: Vec<BigDecimal>,
    uniformization_rate: BigDecimal,
}

impl PotatoChain {
    /// Derive potato, entrances, successors and the uniformization rate.
    pub fn build(actmc: &Actmc, event: &Event) -> Result<Self> {
        let num_states = actmc.num_states();
        let potato = event.active_states();
        if potato.is_empty() {
            return Err(Error::InvalidModel(format!(
                "event {:?} is not active in any state",
                event.id()
            )));
        }
        if let Some(&state) = potato.iter().find(|&&s| s >= num_states) {
            return Err(Error::StateOutOfRange { state, num_states });
        }

        let mut successors = BTreeSet::new();
        for &state in potato {
            for (to, rate) in actmc.rates_from(state) {
                if rate > 0.0 && !potato.contains(&to) {
                    successors.insert(to);
                }
            }
            let kernel = event.transitions_of(state).ok_or_else(|| {
                Error::InvalidModel(format!(
                    "event {:?} has no firing kernel for active state {state}",
                    event.id()
                ))
            })?;
            for to in kernel.support() {
                if potato.contains(&to) {
                    return Err(Error::InvalidModel(format!(
                        "event {:?} fires from state {state} back into its own potato state {to}",
                        event.id()
                    )));
                }
                if to >= num_states {
                    return Err(Error::StateOutOfRange { state: to, num_states });
                }
                successors.insert(to);
            }
        }

        let entrances = find_entrances(actmc, event);

        let states: Vec<usize> = potato.iter().copied().collect();
        let successors: Vec<usize> = successors.into_iter().collect();
        let to_local: BTreeMap<usize, usize> = states
            .iter()
            .chain(successors.iter())
            .enumerate()
            .map(|(local, &global)| (global, local))
            .collect();

        let mut rates = Vec::with_capacity(states.len());
        let mut exit_rates = Vec::with_capacity(states.len());
        let mut max_exit = BigDecimal::zero();
        for &state in &states {
            let mut row = Vec::new();
            let mut exit = BigDecimal::zero();
            for (to, rate) in actmc.rates_from(state) {
                if rate <= 0.0 {
                    continue;
                }
                let rate = from_f64(rate).ok_or_else(|| {
                    Error::InvalidParameter(format!("rate {state} -> {to} is not finite"))
                })?;
                exit = &exit + &rate;
                // every positive-rate target is a potato state or a successor
                if let Some(&local) = to_local.get(&to) {
                    row.push((local, rate));
                }
            }
            if exit > max_exit {
                max_exit = exit.clone();
            }
            rates.push(row);
            exit_rates.push(exit);
        }
        let uniformization_rate = if max_exit.is_zero() {
            BigDecimal::one()
        } else {
            max_exit
        };

        debug!(
            target: targets::CHAIN,
            event = event.id(),
            potato = states.len(),
            successors = successors.len(),
            entrances = entrances.len(),
            rate = %uniformization_rate,
            "potato chain built"
        );

        Ok(Self {
            states,
            successors,
            entrances,
            to_local,
            rates,
            exit_rates,
            uniformization_rate,
        })
    }

    /// Potato states in ascending order.
    pub fn states(&self) -> &[usize] {
        &self.states
    }

    pub fn successors(&self) -> &[usize] {
        &self.successors
    }

    pub fn entrances(&self) -> &BTreeSet<usize> {
        &self.entrances
    }

    pub fn num_potato_states(&self) -> usize {
        self.states.len()
    }

    /// Potato states plus successors.
    pub fn num_states(&self) -> usize {
        self.states.len() + self.successors.len()
    }

    pub fn contains(&self, global: usize) -> bool {
        self.states.binary_search(&global).is_ok()
    }

    pub fn to_local(&self, global: usize) -> Option<usize> {
        self.to_local.get(&global).copied()
    }

    pub fn to_global(&self, local: usize) -> usize {
        if local < self.states.len() {
            self.states[local]
        } else {
            self.successors[local - self.states.len()]
        }
    }

    pub fn is_potato_local(&self, local: usize) -> bool {
        local < self.states.len()
    }

    pub fn uniformization_rate(&self) -> &BigDecimal {
        &self.uniformization_rate
    }

    /// Exit rate of a potato state, by local index.
    pub fn exit_rate(&self, local: usize) -> Option<&BigDecimal> {
        self.exit_rates.get(local)
    }

    /// Forward step `out = v P`.
    pub fn vector_matrix_multiply(&self, v: &[BigDecimal], out: &mut [BigDecimal], ctx: &Precision) {
        out.clone_from_slice(v);
        let lambda = &self.uniformization_rate;
        for (i, row) in self.rates.iter().enumerate() {
            if v[i].is_zero() {
                continue;
            }
            let leaving = ctx.div(&ctx.mul(&v[i], &self.exit_rates[i]), lambda);
            out[i] = ctx.sub(&out[i], &leaving);
            for (j, rate) in row {
                let flow = ctx.div(&ctx.mul(&v[i], rate), lambda);
                out[*j] = ctx.add(&out[*j], &flow);
            }
        }
    }

    /// Backward step `out = P v`.
    pub fn matrix_vector_multiply(&self, v: &[BigDecimal], out: &mut [BigDecimal], ctx: &Precision) {
        out.clone_from_slice(v);
        let lambda = &self.uniformization_rate;
        for (i, row) in self.rates.iter().enumerate() {
            let mut drift = -ctx.mul(&v[i], &self.exit_rates[i]);
            for (j, rate) in row {
                drift = ctx.add(&drift, &ctx.mul(rate, &v[*j]));
            }
            out[i] = ctx.add(&v[i], &ctx.div(&drift, lambda));
        }
    }
}

/// Potato states that are initial, entered by a CTMC transition from outside
/// the potato, or targeted by another event's firing kernel.
fn find_entrances(actmc: &Actmc, event: &Event) -> BTreeSet<usize> {
    let potato = event.active_states();
    let mut entrances: BTreeSet<usize> = potato
        .iter()
        .copied()
        .filter(|s| actmc.is_initial(*s))
        .collect();

    for from in 0..actmc.num_states() {
        if potato.contains(&from) {
            continue;
        }
        for (to, rate) in actmc.rates_from(from) {
            if rate > 0.0 && potato.contains(&to) {
                entrances.insert(to);
            }
        }
    }

    for other in actmc.events() {
        if other.id() == event.id() {
            continue;
        }
        for target in other.targets() {
            if potato.contains(&target) {
                entrances.insert(target);
            }
        }
    }
    entrances
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EventDistribution;

    fn dec(s: &str) -> BigDecimal {
        s.parse().unwrap()
    }

    /// Potato {0, 1}: 0 -> 1 at 2, 1 -> 0 at 1, 1 -> 2 at 1; firing 0 -> 3, 1 -> 4.
    fn three_state() -> Actmc {
        let mut m = Actmc::new(5);
        m.add_rate(0, 1, 2.0).unwrap();
        m.add_rate(1, 0, 1.0).unwrap();
        m.add_rate(1, 2, 1.0).unwrap();
        m.add_rate(2, 1, 0.5).unwrap();
        m.add_initial_state(0).unwrap();
        let mut e = Event::new("t", EventDistribution::Dirac { timeout: 1.0 });
        e.add_to_probability(0, 3, 1.0);
        e.add_to_probability(1, 4, 1.0);
        m.add_event(e).unwrap();
        m
    }

    #[test]
    fn structure_and_index_maps() {
        let m = three_state();
        let chain = PotatoChain::build(&m, m.event("t").unwrap()).unwrap();
        assert_eq!(chain.states(), &[0, 1]);
        assert_eq!(chain.successors(), &[2, 3, 4]);
        assert_eq!(chain.entrances().iter().copied().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(chain.uniformization_rate(), &BigDecimal::from(2));
        assert_eq!(chain.to_local(3), Some(3));
        assert_eq!(chain.to_global(2), 2);
        assert_eq!(chain.to_local(9), None);
        assert!(chain.contains(1));
        assert!(!chain.contains(2));
    }

    #[test]
    fn forward_step_rows_sum_to_one() {
        let m = three_state();
        let chain = PotatoChain::build(&m, m.event("t").unwrap()).unwrap();
        let ctx = Precision::new(30);
        let mut v = vec![BigDecimal::zero(); chain.num_states()];
        v[1] = BigDecimal::one();
        let mut out = v.clone();
        chain.vector_matrix_multiply(&v, &mut out, &ctx);
        // row of state 1: stay 0, to 0 one half, to 2 one half
        assert!(out[1].is_zero());
        assert_eq!(out[0], dec("0.5"));
        assert_eq!(out[2], dec("0.5"));
        let total = out.iter().fold(BigDecimal::zero(), |acc, x| acc + x);
        assert_eq!(total, BigDecimal::one());
    }

    #[test]
    fn backward_step_is_transpose_of_forward() {
        let m = three_state();
        let chain = PotatoChain::build(&m, m.event("t").unwrap()).unwrap();
        let ctx = Precision::new(30);
        let n = chain.num_states();
        let r: Vec<BigDecimal> = (0..n).map(|i| BigDecimal::from(i as u32 + 1)).collect();
        let mut pr = r.clone();
        chain.matrix_vector_multiply(&r, &mut pr, &ctx);
        for i in 0..n {
            let mut unit = vec![BigDecimal::zero(); n];
            unit[i] = BigDecimal::one();
            let mut row = unit.clone();
            chain.vector_matrix_multiply(&unit, &mut row, &ctx);
            let dot = row.iter().zip(&r).fold(BigDecimal::zero(), |acc, (a, b)| acc + a * b);
            assert_eq!(dot, pr[i], "row {i}");
        }
    }

    #[test]
    fn successors_are_absorbing() {
        let m = three_state();
        let chain = PotatoChain::build(&m, m.event("t").unwrap()).unwrap();
        let ctx = Precision::new(30);
        let mut v = vec![BigDecimal::zero(); chain.num_states()];
        v[4] = BigDecimal::one();
        let mut out = v.clone();
        chain.vector_matrix_multiply(&v, &mut out, &ctx);
        assert_eq!(out, v);
    }

    #[test]
    fn zero_exit_rates_fall_back_to_unit_rate() {
        let mut m = Actmc::new(2);
        let mut e = Event::new("t", EventDistribution::Dirac { timeout: 1.0 });
        e.add_to_probability(0, 1, 1.0);
        m.add_event(e).unwrap();
        let chain = PotatoChain::build(&m, m.event("t").unwrap()).unwrap();
        assert_eq!(chain.uniformization_rate(), &BigDecimal::one());
        assert!(chain.entrances().is_empty());
    }

    #[test]
    fn entrances_include_other_event_targets() {
        let mut m = Actmc::new(4);
        let mut a = Event::new("a", EventDistribution::Dirac { timeout: 1.0 });
        a.add_to_probability(0, 1, 1.0);
        let mut b = Event::new("b", EventDistribution::Dirac { timeout: 1.0 });
        b.add_to_probability(1, 2, 1.0);
        m.add_event(a).unwrap();
        m.add_event(b).unwrap();
        let chain = PotatoChain::build(&m, m.event("b").unwrap()).unwrap();
        assert!(chain.entrances().contains(&1));
    }

    #[test]
    fn structural_errors() {
        let mut m = Actmc::new(3);
        let mut e = Event::new("self", EventDistribution::Dirac { timeout: 1.0 });
        e.add_to_probability(0, 1, 1.0);
        e.add_to_probability(1, 2, 1.0);
        m.add_event(e).unwrap();
        // kernel of 0 targets 1, which is in the potato
        let err = PotatoChain::build(&m, m.event("self").unwrap()).unwrap_err();
        assert!(matches!(err, Error::InvalidModel(_)));

        let mut m = Actmc::new(3);
        let mut e = Event::new("bare", EventDistribution::Dirac { timeout: 1.0 });
        e.set_active(0);
        m.add_event(e).unwrap();
        let err = PotatoChain::build(&m, m.event("bare").unwrap()).unwrap_err();
        assert!(matches!(err, Error::InvalidModel(_)));

        let m = Actmc::new(3);
        let idle = Event::new("idle", EventDistribution::Dirac { timeout: 1.0 });
        assert!(matches!(PotatoChain::build(&m, &idle), Err(Error::InvalidModel(_))));
    }
}
