//! Turning transient polynomials into potato results.
//!
//! A raw polynomial `P` stands for `F(t) = P(t) e^(-λt)`. Each timer family
//! maps it to `E[F(T)]` for its firing time `T`:
//!
//! - Dirac: `F(timeout)`.
//! - Erlang(μ, k): `μ^k/(k-1)! ∫ t^(k-1) P(t) e^(-(λ+μ)t) dt`, in closed form
//!   from the moments `m!/(λ+μ)^(m+1)`.
//! - Weibull(s, k): `P` times the Taylor polynomial of `e^(-(t/s)^k - λt)`
//!   and the density factor `(k/s)(t/s)^(k-1)`, integrated from zero up to
//!   a cutoff found by [`compute_integral_ceil`].

use std::collections::BTreeMap;

use bigdecimal::BigDecimal;
use gsmp_common::{AnalysisConfig, Error, Result};
use gsmp_math::{from_f64, to_f64, Polynomial, Precision};
use num_traits::{One, ToPrimitive, Zero};
use tracing::debug;

use super::chain::PotatoChain;
use super::transient::{iterate, weibull_taylor, weibull_taylor_size, Direction, Truncation};
use crate::logging::targets;
use crate::model::{Actmc, Event, EventDistribution, RewardModel};

/// Family-specific expectation over the firing time.
#[derive(Debug, Clone, PartialEq)]
pub enum TimerKernel {
    Dirac {
        timeout: BigDecimal,
        /// `e^(-λ·timeout)`
        damping: BigDecimal,
    },
    Erlang {
        phases: u64,
        /// `λ + μ`
        total_rate: BigDecimal,
        /// `μ^k / (k-1)!`
        factor: BigDecimal,
    },
    Weibull(WeibullKernel),
}

/// Taylor data and integration cutoff for a Weibull timer.
#[derive(Debug, Clone, PartialEq)]
pub struct WeibullKernel {
    /// Taylor polynomial times the density factor `(k/s)(1/s)^(k-1) t^(k-1)`.
    weighted_taylor: Polynomial,
    taylor_size: usize,
    ceiling: BigDecimal,
}

impl WeibullKernel {
    pub fn taylor_size(&self) -> usize {
        self.taylor_size
    }

    /// Upper integration bound.
    pub fn ceiling(&self) -> &BigDecimal {
        &self.ceiling
    }
}

impl TimerKernel {
    /// Prepare the kernel for `distribution` on a chain with rate λ.
    pub fn build(
        distribution: &EventDistribution,
        truncation: &Truncation,
        kappa: &BigDecimal,
        config: &AnalysisConfig,
        ctx: &Precision,
    ) -> Result<Self> {
        let lambda = truncation.rate();
        let invalid = || Error::InvalidParameter(format!("{distribution:?} has non-finite parameters"));
        match *distribution {
            EventDistribution::Dirac { timeout } => {
                let timeout = from_f64(timeout).ok_or_else(invalid)?;
                let damping = dirac_damping(lambda, &timeout, ctx);
                Ok(TimerKernel::Dirac { timeout, damping })
            }
            EventDistribution::Exponential { rate } => {
                let rate = from_f64(rate).ok_or_else(invalid)?;
                Ok(erlang_kernel(lambda, &rate, 1, ctx))
            }
            EventDistribution::Erlang { rate, phases } => {
                let rate = from_f64(rate).ok_or_else(invalid)?;
                Ok(erlang_kernel(lambda, &rate, phases, ctx))
            }
            EventDistribution::Weibull { scale, shape } => {
                WeibullKernel::build(scale, shape, truncation, kappa, config, ctx).map(TimerKernel::Weibull)
            }
        }
    }

    /// Map a raw polynomial to the form that [`TimerKernel::value`] reads.
    ///
    /// Dirac keeps `P`; Erlang multiplies by `t^(k-1)`; Weibull multiplies by
    /// the weighted Taylor polynomial and takes the antiderivative.
    pub fn transform(&self, raw: &Polynomial, ctx: &Precision) -> Result<Polynomial> {
        match self {
            TimerKernel::Dirac { .. } => Ok(raw.clone()),
            TimerKernel::Erlang { phases, .. } => {
                let shift = Polynomial::monomial(BigDecimal::from(phases - 1), BigDecimal::one());
                Ok(raw.multiply(&shift, ctx))
            }
            TimerKernel::Weibull(weibull) => raw
                .multiply(&weibull.weighted_taylor, ctx)
                .antiderivative(ctx)
                .ok_or_else(|| Error::NumericalInstability("weibull integrand has a t^-1 term".into())),
        }
    }

    /// Expected value over the firing time of a transformed polynomial.
    pub fn value(&self, transformed: &Polynomial, ctx: &Precision) -> Result<BigDecimal> {
        match self {
            TimerKernel::Dirac { timeout, damping } => Ok(ctx.mul(&transformed.evaluate(timeout, ctx), damping)),
            TimerKernel::Erlang {
                total_rate, factor, ..
            } => {
                let mut sum = BigDecimal::zero();
                // m! / (λ+μ)^(m+1), advanced one power at a time
                let mut moment = ctx.inverse(total_rate);
                let mut order = 0u64;
                for (exponent, coefficient) in transformed.terms() {
                    let m = integer_exponent(exponent)?;
                    while order < m {
                        order += 1;
                        moment = ctx.div(&ctx.mul(&moment, &BigDecimal::from(order)), total_rate);
                    }
                    sum = ctx.add(&sum, &ctx.mul(coefficient, &moment));
                }
                Ok(ctx.mul(&sum, factor))
            }
            TimerKernel::Weibull(weibull) => Ok(transformed.evaluate(&weibull.ceiling, ctx)),
        }
    }

    pub fn weibull(&self) -> Option<&WeibullKernel> {
        match self {
            TimerKernel::Weibull(weibull) => Some(weibull),
            _ => None,
        }
    }
}

impl WeibullKernel {
    fn build(
        scale: f64,
        shape: f64,
        truncation: &Truncation,
        kappa: &BigDecimal,
        config: &AnalysisConfig,
        ctx: &Precision,
    ) -> Result<Self> {
        let kappa_f = to_f64(kappa);
        let density = weibull_density_factor(scale, shape, ctx)?;
        let mut size = weibull_taylor_size(scale, shape, truncation.right());
        let mut growth = 0u32;
        let mut previous: Option<BigDecimal> = None;
        loop {
            let taylor = weibull_taylor(scale, shape, truncation.rate(), size, ctx)?;
            let weighted_taylor = taylor.multiply(&density, ctx);
            let cdf = weighted_taylor
                .antiderivative(ctx)
                .ok_or_else(|| Error::NumericalInstability("weibull density has a t^-1 term".into()))?;
            let ceiling = compute_integral_ceil(&cdf, scale, shape, config.integral_ceil_max_steps, ctx)?;

            // exact Weibull survival at the cutoff; successor occupancy does
            // not decay, so all of it is missing mass
            let survival = (-(to_f64(&ceiling) / scale).powf(shape)).exp();
            debug!(
                target: targets::EVALUATOR,
                taylor_size = size,
                ceiling = %ceiling.with_prec(12),
                survival,
                "weibull integration cutoff"
            );
            if survival <= kappa_f {
                return Ok(Self {
                    weighted_taylor,
                    taylor_size: size,
                    ceiling,
                });
            }
            let stalled = previous.as_ref().is_some_and(|last| ceiling <= *last);
            if stalled || growth >= config.taylor_growth_limit {
                return Err(Error::NumericalInstability(format!(
                    "weibull({scale}, {shape}) cutoff stuck at {} with survival {survival:e} above kappa \
                     after {growth} taylor extensions",
                    ceiling.with_prec(12)
                )));
            }
            previous = Some(ceiling);
            size += size / 2;
            growth += 1;
        }
    }
}

/// `(k/s)(1/s)^(k-1) t^(k-1)`.
fn weibull_density_factor(scale: f64, shape: f64, ctx: &Precision) -> Result<Polynomial> {
    let invalid = || Error::InvalidParameter(format!("weibull parameters ({scale}, {shape}) are not representable"));
    let s = from_f64(scale).ok_or_else(invalid)?;
    let k = from_f64(shape).ok_or_else(invalid)?;
    let k_minus_one = &k - BigDecimal::one();
    let power = ctx
        .pow(&ctx.inverse(&s), &k_minus_one)
        .ok_or_else(|| Error::NumericalInstability(format!("(1/{s})^({k_minus_one}) did not converge")))?;
    let factor = ctx.mul(&ctx.div(&k, &s), &power);
    Ok(Polynomial::monomial(k_minus_one, factor))
}

fn dirac_damping(lambda: &BigDecimal, timeout: &BigDecimal, ctx: &Precision) -> BigDecimal {
    ctx.exp(&-ctx.mul(lambda, timeout))
}

fn erlang_kernel(lambda: &BigDecimal, rate: &BigDecimal, phases: u64, ctx: &Precision) -> TimerKernel {
    let mut factorial = BigDecimal::one();
    for i in 2..phases {
        factorial = ctx.mul(&factorial, &BigDecimal::from(i));
    }
    let factor = ctx.div(&ctx.powi(rate, phases), &factorial);
    TimerKernel::Erlang {
        phases,
        total_rate: ctx.add(lambda, rate),
        factor,
    }
}

fn integer_exponent(exponent: &BigDecimal) -> Result<u64> {
    if exponent.is_integer() {
        if let Some(m) = exponent.to_u64() {
            return Ok(m);
        }
    }
    Err(Error::NumericalInstability(format!(
        "erlang integrand has non-integer exponent {exponent}"
    )))
}

/// Upper integration bound for the antiderivative `cdf` of a Weibull
/// integrand: as far out as the truncated series still behaves like a
/// distribution function.
///
/// An upslope walk in steps of `5s/(100k)` runs while the increase grows,
/// then four passes with steps `5s/k`, `/10`, `/100` and `/1000` walk while
/// the increase shrinks. Between passes the walk backs off one step, or two
/// when the pass advanced at least twice. Each walk is capped at `max_steps`.
pub fn compute_integral_ceil(
    cdf: &Polynomial,
    scale: f64,
    shape: f64,
    max_steps: usize,
    ctx: &Precision,
) -> Result<BigDecimal> {
    let invalid = || Error::InvalidParameter(format!("weibull parameters ({scale}, {shape}) are not representable"));
    let s = from_f64(scale).ok_or_else(invalid)?;
    let k = from_f64(shape).ok_or_else(invalid)?;
    let runaway = || Error::NumericalInstability(format!("integration cutoff search exceeded {max_steps} steps"));

    let mut increment = ctx.div(&ctx.mul(&BigDecimal::from(5), &s), &k);
    let upslope_step = ctx.div(&increment, &BigDecimal::from(100));

    let mut b = BigDecimal::zero();
    let mut prob = BigDecimal::zero();
    let mut last_prob;
    let mut diff = BigDecimal::zero();
    let mut last_diff;
    let mut steps = 0usize;
    loop {
        b = ctx.add(&b, &upslope_step);
        last_prob = prob;
        prob = cdf.evaluate(&b, ctx);
        last_diff = diff;
        diff = ctx.sub(&prob, &last_prob);
        if diff < last_diff || prob <= last_prob {
            break;
        }
        steps += 1;
        if steps >= max_steps {
            return Err(runaway());
        }
    }

    diff = BigDecimal::one();
    const PASSES: usize = 4;
    for pass in 0..PASSES {
        if pass > 0 {
            increment = ctx.div(&increment, &BigDecimal::from(10));
        }
        let mut advanced = 0usize;
        loop {
            b = ctx.add(&b, &increment);
            last_prob = prob;
            prob = cdf.evaluate(&b, ctx);
            last_diff = diff;
            diff = ctx.sub(&prob, &last_prob);
            if diff > last_diff {
                break;
            }
            advanced += 1;
            if prob <= last_prob {
                break;
            }
            if advanced >= max_steps {
                return Err(runaway());
            }
        }
        if pass + 1 == PASSES {
            break;
        }
        b = ctx.sub(&b, &increment);
        prob = last_prob;
        diff = last_diff;
        if advanced >= 2 {
            b = ctx.sub(&b, &increment);
            prob = cdf.evaluate(&b, ctx);
            diff = BigDecimal::one();
        }
    }

    let ceiling = ctx.sub(&b, &increment);
    if ceiling <= BigDecimal::zero() {
        return Err(Error::NumericalInstability(format!(
            "integration cutoff collapsed to {ceiling}"
        )));
    }
    Ok(ceiling)
}

/// Everything known about one entrance.
#[derive(Debug, Clone, PartialEq)]
pub struct EntranceResults {
    /// Transformed cumulative-form polynomials of potato states, by global state.
    pub times_polynomials: BTreeMap<usize, Polynomial>,
    /// Transformed after-event polynomials of successors, by global state.
    pub distribution_polynomials: BTreeMap<usize, Polynomial>,
    /// Raw occupancy polynomials of every local state, by global state.
    pub occupancy: BTreeMap<usize, Polynomial>,
    pub mean_times: BTreeMap<usize, BigDecimal>,
    pub before_event: BTreeMap<usize, BigDecimal>,
    pub mean_distribution: BTreeMap<usize, BigDecimal>,
    pub final_iterate: BTreeMap<usize, BigDecimal>,
}

/// Run the forward iteration from potato-local `entrance` and evaluate it.
pub fn evaluate_entrance(
    chain: &PotatoChain,
    truncation: &Truncation,
    kernel: &TimerKernel,
    event: &Event,
    entrance: usize,
    ctx: &Precision,
) -> Result<EntranceResults> {
    let mut seed = vec![BigDecimal::zero(); chain.num_states()];
    seed[entrance] = BigDecimal::one();
    let iteration = iterate(chain, truncation, seed, Direction::Forward, ctx);

    let mut times_polynomials = BTreeMap::new();
    let mut mean_times = BTreeMap::new();
    for local in 0..chain.num_potato_states() {
        let transformed = kernel.transform(&iteration.cumulative[local], ctx)?;
        mean_times.insert(chain.to_global(local), kernel.value(&transformed, ctx)?);
        times_polynomials.insert(chain.to_global(local), transformed);
    }

    let mut before_event = BTreeMap::new();
    for (local, raw) in iteration.occupancy.iter().enumerate() {
        let value = kernel.value(&kernel.transform(raw, ctx)?, ctx)?;
        before_event.insert(chain.to_global(local), value);
    }

    let after_event = redistribute(chain, event, &iteration.occupancy, ctx)?;
    let mut distribution_polynomials = BTreeMap::new();
    let mut mean_distribution = BTreeMap::new();
    for (state, raw) in after_event {
        let transformed = kernel.transform(&raw, ctx)?;
        mean_distribution.insert(state, kernel.value(&transformed, ctx)?);
        distribution_polynomials.insert(state, transformed);
    }
    normalize(&mut mean_distribution, chain.to_global(entrance), ctx)?;

    let occupancy = iteration
        .occupancy
        .into_iter()
        .enumerate()
        .map(|(local, p)| (chain.to_global(local), p))
        .collect();
    let final_iterate = iteration
        .final_iterate
        .into_iter()
        .enumerate()
        .map(|(local, v)| (chain.to_global(local), v))
        .collect();

    debug!(
        target: targets::EVALUATOR,
        entrance = chain.to_global(entrance),
        successors = mean_distribution.len(),
        "entrance evaluated"
    );
    Ok(EntranceResults {
        times_polynomials,
        distribution_polynomials,
        occupancy,
        mean_times,
        before_event,
        mean_distribution,
        final_iterate,
    })
}

/// Push each potato state's occupancy through the firing kernel; successor
/// occupancy passes through unchanged.
pub fn redistribute(
    chain: &PotatoChain,
    event: &Event,
    occupancy: &[Polynomial],
    ctx: &Precision,
) -> Result<BTreeMap<usize, Polynomial>> {
    let mut after: BTreeMap<usize, Polynomial> = chain
        .successors()
        .iter()
        .map(|&s| (s, Polynomial::new()))
        .collect();
    for (local, poly) in occupancy.iter().enumerate() {
        let global = chain.to_global(local);
        if !chain.is_potato_local(local) {
            if let Some(target) = after.get_mut(&global) {
                target.add(poly, ctx);
            }
            continue;
        }
        if poly.is_empty() {
            continue;
        }
        let kernel = event.transitions_of(global).ok_or_else(|| {
            Error::InvalidModel(format!("event {:?} has no firing kernel for state {global}", event.id()))
        })?;
        for (to, prob) in kernel.iter() {
            if prob <= 0.0 {
                continue;
            }
            let weight = from_f64(prob)
                .ok_or_else(|| Error::InvalidModel(format!("firing probability {global} -> {to} is not finite")))?;
            let mut moved = poly.clone();
            moved.scale(&weight, ctx);
            after.entry(to).or_default().add(&moved, ctx);
        }
    }
    Ok(after)
}

/// Rescale to unit mass, logging how far the raw sum drifted.
fn normalize(distribution: &mut BTreeMap<usize, BigDecimal>, entrance: usize, ctx: &Precision) -> Result<()> {
    let total = distribution.values().fold(BigDecimal::zero(), |acc, v| ctx.add(&acc, v));
    if total <= BigDecimal::zero() {
        return Err(Error::NumericalInstability(format!(
            "after-event distribution from entrance {entrance} has no mass"
        )));
    }
    let drift = to_f64(&ctx.sub(&total, &BigDecimal::one())).abs();
    debug!(target: targets::EVALUATOR, entrance, drift, "after-event renormalization");
    for value in distribution.values_mut() {
        *value = ctx.div(value, &total);
    }
    Ok(())
}

/// Reward polynomials and values for every potato state.
#[derive(Debug, Clone, PartialEq)]
pub struct RewardResults {
    /// Transformed cumulative form seeded with merged state rewards.
    pub accumulated_polynomials: BTreeMap<usize, Polynomial>,
    /// Transformed occupancy form seeded with firing rewards.
    pub firing_polynomials: BTreeMap<usize, Polynomial>,
    /// Reward accumulated before the event fires.
    pub before_event: BTreeMap<usize, BigDecimal>,
    /// Accumulated plus firing reward.
    pub total: BTreeMap<usize, BigDecimal>,
}

/// Backward passes over rewards, shared by all entrances.
pub fn evaluate_rewards(
    chain: &PotatoChain,
    truncation: &Truncation,
    kernel: &TimerKernel,
    actmc: &Actmc,
    event: &Event,
    rewards: &dyn RewardModel,
    ctx: &Precision,
) -> Result<RewardResults> {
    let n = chain.num_states();
    let mut state_seed = vec![BigDecimal::zero(); n];
    let mut firing_seed = vec![BigDecimal::zero(); n];
    for local in 0..chain.num_potato_states() {
        let global = chain.to_global(local);
        state_seed[local] = reward_value(rewards.merged_state_reward(actmc, global), global)?;
        firing_seed[local] = reward_value(rewards.event_reward(event, global), global)?;
    }

    let accumulated = backward_form(chain, truncation, kernel, state_seed, Form::Cumulative, ctx)?;
    let firing = backward_form(chain, truncation, kernel, firing_seed, Form::Occupancy, ctx)?;

    let mut before_event = BTreeMap::new();
    let mut total = BTreeMap::new();
    for local in 0..chain.num_potato_states() {
        let global = chain.to_global(local);
        let stay = match accumulated.get(&global) {
            Some(p) => kernel.value(p, ctx)?,
            None => BigDecimal::zero(),
        };
        let fire = match firing.get(&global) {
            Some(p) => kernel.value(p, ctx)?,
            None => BigDecimal::zero(),
        };
        total.insert(global, ctx.add(&stay, &fire));
        before_event.insert(global, stay);
    }
    debug!(target: targets::EVALUATOR, states = total.len(), "rewards evaluated");
    Ok(RewardResults {
        accumulated_polynomials: accumulated,
        firing_polynomials: firing,
        before_event,
        total,
    })
}

#[derive(Debug, Clone, Copy)]
enum Form {
    Occupancy,
    Cumulative,
}

/// Transformed polynomials of one backward form; empty for an all-zero seed.
fn backward_form(
    chain: &PotatoChain,
    truncation: &Truncation,
    kernel: &TimerKernel,
    seed: Vec<BigDecimal>,
    form: Form,
    ctx: &Precision,
) -> Result<BTreeMap<usize, Polynomial>> {
    if seed.iter().all(Zero::is_zero) {
        return Ok(BTreeMap::new());
    }
    let iteration = iterate(chain, truncation, seed, Direction::Backward, ctx);
    let raw = match form {
        Form::Occupancy => iteration.occupancy,
        Form::Cumulative => iteration.cumulative,
    };
    raw.iter()
        .take(chain.num_potato_states())
        .enumerate()
        .map(|(local, p)| Ok((chain.to_global(local), kernel.transform(p, ctx)?)))
        .collect()
}

fn reward_value(reward: f64, state: usize) -> Result<BigDecimal> {
    from_f64(reward).ok_or_else(|| Error::InvalidParameter(format!("reward of state {state} is not finite")))
}
