//! Fox-Glynn truncation of Poisson probabilities.
//!
//! Produces a window `[left, right]` and unnormalized weights `w_i`
//! proportional to `rate^i / i!` whose total `W` is also reported, so that
//! `w_i / W` approximates the Poisson(rate) probabilities with at most
//! `accuracy` of the mass outside the window.
//!
//! Weights start at `upper_guard / (1e10 * (right - left + 1))` at the mode and
//! are filled outward with the exact ratios of neighbouring probabilities.

use std::f64::consts::{LN_10, LN_2};

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_traits::Zero;

use super::decimal::{log10_approx, to_f64, Precision};
use super::window::poisson_window;

/// Truncated, unnormalized Poisson weights.
#[derive(Debug, Clone, PartialEq)]
pub struct FoxGlynn {
    left: usize,
    right: usize,
    weights: Vec<BigDecimal>,
    total_weight: BigDecimal,
}

impl FoxGlynn {
    /// Compute the truncation window and weights at `precision`.
    ///
    /// Returns `None` when the window cannot be represented: non-positive or
    /// non-finite rate, non-positive accuracy, more than `max_points` points,
    /// or a weight that underflows `lower_guard`.
    pub fn compute(
        rate: &BigDecimal,
        lower_guard: &BigDecimal,
        upper_guard: &BigDecimal,
        accuracy: &BigDecimal,
        max_points: usize,
        precision: &Precision,
    ) -> Option<Self> {
        let rate_f = to_f64(rate);
        if !(rate_f.is_finite() && rate_f > 0.0) || *accuracy <= BigDecimal::zero() {
            return None;
        }
        let ln_half_accuracy = log10_approx(accuracy) * LN_10 - LN_2;
        let window = poisson_window(rate_f, ln_half_accuracy, max_points)?;
        let (left, right) = (window.left, window.right);
        let mode = (rate_f.floor() as usize).clamp(left, right);

        let points = right - left + 1;
        let start_divisor = BigDecimal::new(BigInt::from(points), -10);
        let mut weights = vec![BigDecimal::zero(); points];
        weights[mode - left] = precision.div(upper_guard, &start_divisor);

        for i in mode..right {
            let scaled = precision.mul(&weights[i - left], rate);
            weights[i + 1 - left] = precision.div(&scaled, &BigDecimal::from(i as u64 + 1));
        }
        for i in (left + 1..=mode).rev() {
            let scaled = precision.mul(&weights[i - left], &BigDecimal::from(i as u64));
            weights[i - 1 - left] = precision.div(&scaled, rate);
        }

        if weights.iter().any(|w| w < lower_guard) {
            return None;
        }

        let mut total_weight = BigDecimal::zero();
        for w in &weights {
            total_weight = precision.add(&total_weight, w);
        }

        Some(Self {
            left,
            right,
            weights,
            total_weight,
        })
    }

    pub fn left(&self) -> usize {
        self.left
    }

    pub fn right(&self) -> usize {
        self.right
    }

    /// Weights for indices `left..=right`, in order.
    pub fn weights(&self) -> &[BigDecimal] {
        &self.weights
    }

    /// Weight at absolute index `i`, if inside the window.
    pub fn weight(&self, i: usize) -> Option<&BigDecimal> {
        if i < self.left {
            return None;
        }
        self.weights.get(i - self.left)
    }

    pub fn total_weight(&self) -> &BigDecimal {
        &self.total_weight
    }
}
