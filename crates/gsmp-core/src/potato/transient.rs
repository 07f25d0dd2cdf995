//! Symbolic transient distributions of the uniformized potato chain.
//!
//! With `w_i ≈ λ^i / i!` from the truncated Poisson weights and `v_n` the
//! n-th iterate of the chain, the probability of residing in local state `s`
//! at time `t` is `e^(-λt) · Σ_i w_i v_i[s] t^i` (occupancy form) and the
//! expected time spent there up to `t` is
//! `e^(-λt) · Σ_i (w_i / λ) Σ_{n<i} v_n[s] t^i` (cumulative form). Both
//! polynomials are built by one pass over the iterates and can then be
//! evaluated or integrated against any firing-time density.

use std::f64::consts::E;

use bigdecimal::BigDecimal;
use gsmp_common::{AnalysisConfig, Error, Result};
use gsmp_math::{from_f64, BinomialRows, FoxGlynn, Polynomial, Precision};
use num_traits::{One, Zero};
use tracing::{debug, trace};

use super::chain::PotatoChain;
use super::precision::PrecisionPlan;
use crate::logging::targets;

/// Truncated Poisson weights rescaled to `w_i ≈ λ^i / i!`.
#[derive(Debug, Clone, PartialEq)]
pub struct Truncation {
    left: usize,
    right: usize,
    weights: Vec<BigDecimal>,
    rate: BigDecimal,
}

impl Truncation {
    /// Run the Poisson truncation at the chain's uniformization rate.
    pub fn compute(chain: &PotatoChain, plan: &PrecisionPlan, config: &AnalysisConfig) -> Result<Self> {
        let ctx = plan.working();
        let rate = chain.uniformization_rate().clone();
        let overflow = || Error::TruncationOverflow {
            rate: rate.to_string(),
            digits: plan.truncation_digits(),
        };
        let lower_guard = from_f64(config.lower_guard).ok_or_else(overflow)?;
        let upper_guard = from_f64(config.upper_guard).ok_or_else(overflow)?;
        let fox_glynn = FoxGlynn::compute(
            &rate,
            &lower_guard,
            &upper_guard,
            &plan.truncation_accuracy(),
            config.max_truncation_points,
            ctx,
        )
        .ok_or_else(overflow)?;

        // w_i / W approximates e^-λ λ^i / i!; drop the e^-λ
        let factor = ctx.div(&ctx.exp(&rate), fox_glynn.total_weight());
        let weights = fox_glynn.weights().iter().map(|w| ctx.mul(w, &factor)).collect();

        debug!(
            target: targets::TRANSIENT,
            left = fox_glynn.left(),
            right = fox_glynn.right(),
            rate = %rate,
            "poisson truncation"
        );
        Ok(Self {
            left: fox_glynn.left(),
            right: fox_glynn.right(),
            weights,
            rate,
        })
    }

    pub fn left(&self) -> usize {
        self.left
    }

    pub fn right(&self) -> usize {
        self.right
    }

    /// The uniformization rate λ the weights belong to.
    pub fn rate(&self) -> &BigDecimal {
        &self.rate
    }

    /// `w_i` for `left <= i <= right`.
    pub fn weight(&self, i: usize) -> Option<&BigDecimal> {
        if i < self.left {
            return None;
        }
        self.weights.get(i - self.left)
    }
}

/// Which way the chain is stepped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `v ↦ vP`: the seed is an initial distribution.
    Forward,
    /// `v ↦ Pv`: the seed is a per-state value (a reward).
    Backward,
}

/// Polynomials per local state plus the last iterate.
#[derive(Debug, Clone, PartialEq)]
pub struct Iteration {
    pub occupancy: Vec<Polynomial>,
    pub cumulative: Vec<Polynomial>,
    pub final_iterate: Vec<BigDecimal>,
}

/// Step the chain through powers `0..=right` from `seed`, collecting both
/// polynomial forms for every local state.
pub fn iterate(
    chain: &PotatoChain,
    truncation: &Truncation,
    seed: Vec<BigDecimal>,
    direction: Direction,
    ctx: &Precision,
) -> Iteration {
    let n = chain.num_states();
    let mut occupancy = vec![Polynomial::new(); n];
    let mut cumulative = vec![Polynomial::new(); n];
    let mut running = vec![BigDecimal::zero(); n];
    let mut current = seed;
    let mut next = current.clone();

    for i in 0..=truncation.right() {
        if let Some(w) = truncation.weight(i) {
            let exponent = BigDecimal::from(i as u64);
            let w_over_rate = ctx.div(w, truncation.rate());
            for s in 0..n {
                if !current[s].is_zero() {
                    occupancy[s].add_term(exponent.clone(), &ctx.mul(w, &current[s]), ctx);
                }
                if !running[s].is_zero() {
                    cumulative[s].add_term(exponent.clone(), &ctx.mul(&w_over_rate, &running[s]), ctx);
                }
            }
        }
        if i == truncation.right() {
            break;
        }
        for s in 0..n {
            running[s] = ctx.add(&running[s], &current[s]);
        }
        match direction {
            Direction::Forward => chain.vector_matrix_multiply(&current, &mut next, ctx),
            Direction::Backward => chain.matrix_vector_multiply(&current, &mut next, ctx),
        }
        std::mem::swap(&mut current, &mut next);
    }

    trace!(
        target: targets::TRANSIENT,
        ?direction,
        iterations = truncation.right() + 1,
        "power iteration finished"
    );
    Iteration {
        occupancy,
        cumulative,
        final_iterate: current,
    }
}

/// Initial Taylor degree for a Weibull timer over a window ending at `right`:
/// `right + ⌊(s + s·right/(2e^k))(e^(1/k - 1) + 1 - 1/e)⌋`.
pub fn weibull_taylor_size(scale: f64, shape: f64, right: usize) -> usize {
    let spread = (scale + 0.5 * scale * right as f64 / shape.exp()) * ((1.0 / shape - 1.0).exp() + 1.0 - 1.0 / E);
    if spread.is_finite() && spread > 0.0 {
        right + spread.floor() as usize
    } else {
        right
    }
}

/// Taylor polynomial of `e^(-(t/s)^k - λt)` with `size + 1` terms of the
/// outer series `Σ_n (a t^k + b t)^n / n!`, each power expanded binomially.
pub fn weibull_taylor(scale: f64, shape: f64, rate: &BigDecimal, size: usize, ctx: &Precision) -> Result<Polynomial> {
    let invalid = || Error::InvalidParameter(format!("weibull parameters ({scale}, {shape}) are not representable"));
    let scale = from_f64(scale).ok_or_else(invalid)?;
    let shape = from_f64(shape).ok_or_else(invalid)?;
    let a = -ctx
        .pow(&ctx.inverse(&scale), &shape)
        .ok_or_else(|| Error::NumericalInstability(format!("(1/{scale})^{shape} did not converge")))?;
    let b = -rate.clone();

    let mut a_powers = Vec::with_capacity(size + 1);
    let mut b_powers = Vec::with_capacity(size + 1);
    let (mut ap, mut bp) = (BigDecimal::one(), BigDecimal::one());
    for _ in 0..=size {
        a_powers.push(ap.clone());
        b_powers.push(bp.clone());
        ap = ctx.mul(&ap, &a);
        bp = ctx.mul(&bp, &b);
    }

    let mut taylor = Polynomial::new();
    let mut inverse_factorial = BigDecimal::one();
    for (n, row) in BinomialRows::new().take(size + 1).enumerate() {
        for (j, binomial) in row.iter().enumerate() {
            // j factors of b t, n - j factors of a t^k
            let weibull_power = n - j;
            let exponent = &shape * BigDecimal::from(weibull_power as u64) + BigDecimal::from(j as u64);
            let coefficient = ctx.mul(
                &ctx.mul(&BigDecimal::new(binomial.clone(), 0), &a_powers[weibull_power]),
                &ctx.mul(&b_powers[j], &inverse_factorial),
            );
            taylor.add_term(exponent, &coefficient, ctx);
        }
        inverse_factorial = ctx.div(&inverse_factorial, &BigDecimal::from(n as u64 + 1));
    }
    Ok(taylor)
}
