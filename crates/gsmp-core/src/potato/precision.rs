//! Working precision and truncation accuracy for one event.
//!
//! All digit counts are decimal digits. `required` is what the results need
//! to be correct to κ; the Poisson truncation is asked for `truncation`
//! digits, which adds the family-specific inflation and coverage of the
//! timer's own window on top.

use std::f64::consts::{E, LN_10, LN_2, LOG10_E};

use bigdecimal::BigDecimal;
use gsmp_common::{AnalysisConfig, Error, Result};
use gsmp_math::{
    allowed_error, decimal_digits, log10_approx, negative_binomial_window, poisson_coverage_digits, poisson_window,
    CoverageWindow, Precision,
};
use num_traits::{One, Zero};
use tracing::debug;

use crate::logging::targets;
use crate::model::EventDistribution;

/// Precision demands past this are treated as unrepresentable.
const MAX_DIGITS: u64 = 100_000;

/// Constant part of the Weibull demand; Taylor cancellation eats into it.
const WEIBULL_BASE_DIGITS: f64 = 100.0;

/// Digit counts derived from κ and the timer.
#[derive(Debug, Clone, PartialEq)]
pub struct PrecisionPlan {
    kappa: BigDecimal,
    required_digits: u64,
    inflation_digits: u64,
    truncation_digits: u64,
    working: Precision,
}

impl PrecisionPlan {
    /// Derive the plan for `distribution` at error bound `kappa`.
    ///
    /// `uniformization_rate` is the potato's λ; `max_exit_rate` is the largest
    /// exit rate of the whole ACTMC, which the Weibull demand scales with.
    pub fn derive(
        distribution: &EventDistribution,
        kappa: &BigDecimal,
        uniformization_rate: f64,
        max_exit_rate: f64,
        config: &AnalysisConfig,
    ) -> Result<Self> {
        distribution.validate()?;
        if !(*kappa > BigDecimal::zero() && *kappa < BigDecimal::one()) {
            return Err(Error::InvalidParameter(format!("kappa must lie in (0, 1), got {kappa}")));
        }
        let base = decimal_digits(kappa);
        let ln_half_kappa = log10_approx(kappa) * LN_10 - LN_2;
        let lambda = uniformization_rate;
        let max_points = config.max_truncation_points;
        let overflow = |digits: u64| Error::TruncationOverflow {
            rate: lambda.to_string(),
            digits,
        };

        let (required, inflation, truncation) = match *distribution {
            EventDistribution::Dirac { timeout } => {
                let required = to_digits(base as f64 + 7.0 * timeout.floor()).ok_or_else(|| overflow(base))?;
                let window = poisson_window(lambda * timeout, ln_half_kappa, max_points).ok_or_else(|| overflow(required))?;
                (required, 0, required.max(coverage_digits(lambda, &window)))
            }
            EventDistribution::Exponential { rate } => {
                let required = base + 1;
                let window = negative_binomial_window(lambda, rate, 1, ln_half_kappa, max_points)
                    .ok_or_else(|| overflow(required))?;
                (required, 0, required.max(coverage_digits(lambda, &window)))
            }
            EventDistribution::Erlang { rate, phases } => {
                let required = base.saturating_add(phases);
                if required > MAX_DIGITS {
                    return Err(overflow(required));
                }
                let window = negative_binomial_window(lambda, rate, phases, ln_half_kappa, max_points)
                    .ok_or_else(|| overflow(required))?;
                (required, 0, required.max(coverage_digits(lambda, &window)))
            }
            EventDistribution::Weibull { scale, shape } => {
                let required = weibull_required_digits(base, scale, shape, max_exit_rate).ok_or_else(|| overflow(base))?;
                let inflation = weibull_inflation_digits(scale, shape).ok_or_else(|| overflow(required))?;
                // the window has to start at zero: e^-λ must stay resolved
                let left_at_zero = to_digits((lambda * LOG10_E).ceil() + 2.0).ok_or_else(|| overflow(required))?;
                let horizon = weibull_horizon(scale, shape, kappa);
                let working_digits = required.saturating_add(config.guard_digits);
                let cancellation = weibull_cancellation_digits(scale, shape, lambda, horizon);
                if cancellation.is_nan() || cancellation + base as f64 > working_digits as f64 {
                    return Err(Error::NumericalInstability(format!(
                        "weibull({scale}, {shape}) at rate {lambda} loses {cancellation} digits before its survival \
                         drops below kappa, only {working_digits} are carried; use a coarser kappa"
                    )));
                }
                // the chain has to stay resolved up to the horizon
                let window = poisson_window(lambda * horizon, ln_half_kappa, max_points).ok_or_else(|| overflow(required))?;
                let truncation = (required + inflation).max(left_at_zero).max(coverage_digits(lambda, &window));
                (required, inflation, truncation)
            }
        };

        let working_digits = required.saturating_add(config.guard_digits);
        if working_digits > MAX_DIGITS || truncation > MAX_DIGITS {
            return Err(overflow(truncation));
        }
        let plan = Self {
            kappa: kappa.clone(),
            required_digits: required,
            inflation_digits: inflation,
            truncation_digits: truncation,
            working: Precision::new(working_digits),
        };
        debug!(
            target: targets::PRECISION,
            family = distribution.family(),
            required,
            inflation,
            truncation,
            working = working_digits,
            "precision derived"
        );
        Ok(plan)
    }

    pub fn kappa(&self) -> &BigDecimal {
        &self.kappa
    }

    /// Digits the results must be correct to.
    pub fn required_digits(&self) -> u64 {
        self.required_digits
    }

    pub fn inflation_digits(&self) -> u64 {
        self.inflation_digits
    }

    /// Digits requested from the Poisson truncation.
    pub fn truncation_digits(&self) -> u64 {
        self.truncation_digits
    }

    /// Error bound handed to the Poisson truncation.
    pub fn truncation_accuracy(&self) -> BigDecimal {
        allowed_error(self.truncation_digits)
    }

    /// Context all arithmetic runs at.
    pub fn working(&self) -> &Precision {
        &self.working
    }
}

/// `100 + base + ⌊m⌋ + 5⌊k⌋ + ⌊10/k⌋ + ⌊s⌋ + ⌈ln((s + ⌊m⌋)·base·k)⌉⁺`.
fn weibull_required_digits(base: u64, scale: f64, shape: f64, max_exit_rate: f64) -> Option<u64> {
    let m = max_exit_rate.floor();
    let log_term = ((scale + m) * base as f64 * shape).ln().ceil().max(0.0);
    to_digits(
        WEIBULL_BASE_DIGITS
            + base as f64
            + m
            + 5.0 * shape.floor()
            + (10.0 / shape).floor()
            + scale.floor()
            + log_term,
    )
}

/// `⌊((s + s/e^k)(e^(1/k - 1) + 1 - 1/e))²⌋`.
fn weibull_inflation_digits(scale: f64, shape: f64) -> Option<u64> {
    let spread = (scale + scale / shape.exp()) * ((1.0 / shape - 1.0).exp() + 1.0 - 1.0 / E);
    to_digits((spread * spread).floor())
}

/// Time past which a Weibull(s, k) timer is still pending with probability
/// at most κ: `s·ln(1/κ)^(1/k)`.
fn weibull_horizon(scale: f64, shape: f64, kappa: &BigDecimal) -> f64 {
    scale * (-log10_approx(kappa) * LN_10).powf(1.0 / shape)
}

/// Digits cancelled when the integrand is evaluated at `horizon`.
///
/// The occupancy polynomial grows like `e^(λt)` and the Taylor terms like
/// `e^((t/s)^k + λt)`, while their product decays like `e^(-(t/s)^k)`.
fn weibull_cancellation_digits(scale: f64, shape: f64, lambda: f64, horizon: f64) -> f64 {
    ((2.0 * lambda * horizon + (horizon / scale).powf(shape)) * LOG10_E).ceil()
}

/// Digits that keep every index of `window` inside the Poisson(λ) truncation.
fn coverage_digits(lambda: f64, window: &CoverageWindow) -> u64 {
    poisson_coverage_digits(lambda, window.right).max(poisson_coverage_digits(lambda, window.left))
}

fn to_digits(x: f64) -> Option<u64> {
    if x.is_finite() && x >= 0.0 && x <= MAX_DIGITS as f64 {
        Some(x as u64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kappa(s: &str) -> BigDecimal {
        s.parse().unwrap()
    }

    fn derive(d: EventDistribution, lambda: f64) -> Result<PrecisionPlan> {
        PrecisionPlan::derive(&d, &kappa("1e-10"), lambda, lambda, &AnalysisConfig::default())
    }

    #[test]
    fn weibull_unit_scale_shape_two() {
        let plan = derive(EventDistribution::Weibull { scale: 1.0, shape: 2.0 }, 1.0).unwrap();
        assert_eq!(plan.required_digits(), 131);
        assert_eq!(plan.inflation_digits(), 1);
        assert_eq!(plan.truncation_digits(), 132);
        assert_eq!(plan.working().digits(), 141);
    }

    #[test]
    fn weibull_fast_chain_keeps_window_at_zero() {
        let plan = derive(EventDistribution::Weibull { scale: 1.0, shape: 2.0 }, 20.0).unwrap();
        assert!(plan.truncation_digits() >= (20.0 * LOG10_E).ceil() as u64 + 2);
    }

    #[test]
    fn weibull_window_reaches_the_horizon() {
        let kappa = kappa("1e-6");
        let d = EventDistribution::Weibull { scale: 1.0, shape: 0.8 };
        let plan = PrecisionPlan::derive(&d, &kappa, 1.0, 1.0, &AnalysisConfig::default()).unwrap();

        let horizon = weibull_horizon(1.0, 0.8, &kappa);
        assert!((horizon - 26.6).abs() < 0.1, "{horizon}");
        assert!(plan.truncation_digits() >= poisson_coverage_digits(1.0, horizon as usize));
    }

    #[test]
    fn weibull_beyond_working_precision_is_rejected() {
        let config = AnalysisConfig::default();
        // heavy tail: the horizon sits near t = 191
        let heavy = EventDistribution::Weibull { scale: 1.0, shape: 0.5 };
        let err = PrecisionPlan::derive(&heavy, &kappa("1e-6"), 1.0, 1.0, &config).unwrap_err();
        assert!(matches!(err, Error::NumericalInstability(_)), "{err}");

        let fast = EventDistribution::Weibull { scale: 1.0, shape: 2.0 };
        let err = PrecisionPlan::derive(&fast, &kappa("1e-10"), 500.0, 500.0, &config).unwrap_err();
        assert!(matches!(err, Error::NumericalInstability(_)), "{err}");

        // a lighter tail at the same kappa fits
        let light = EventDistribution::Weibull { scale: 1.0, shape: 0.8 };
        assert!(PrecisionPlan::derive(&light, &kappa("1e-6"), 1.0, 1.0, &config).is_ok());
    }

    #[test]
    fn dirac_digits_grow_with_timeout() {
        let plan = derive(EventDistribution::Dirac { timeout: 2.0 }, 1.0).unwrap();
        assert_eq!(plan.required_digits(), 24);
        assert_eq!(plan.working().digits(), 34);
        assert!(plan.truncation_digits() >= 24);

        let longer = derive(EventDistribution::Dirac { timeout: 40.0 }, 1.0).unwrap();
        assert_eq!(longer.required_digits(), 290);
        // Poisson(40) reaches far past the unit-rate mode
        assert!(longer.truncation_digits() >= poisson_coverage_digits(1.0, 60));
    }

    #[test]
    fn erlang_adds_one_digit_per_phase() {
        let plan = derive(EventDistribution::Erlang { rate: 2.0, phases: 3 }, 1.0).unwrap();
        assert_eq!(plan.required_digits(), 13);
        let exp = derive(EventDistribution::Exponential { rate: 2.0 }, 1.0).unwrap();
        assert_eq!(exp.required_digits(), 11);
    }

    #[test]
    fn kappa_outside_unit_interval_is_rejected() {
        let d = EventDistribution::Dirac { timeout: 1.0 };
        let config = AnalysisConfig::default();
        for bad in ["0", "1", "-0.5", "3"] {
            let err = PrecisionPlan::derive(&d, &kappa(bad), 1.0, 1.0, &config).unwrap_err();
            assert!(matches!(err, Error::InvalidParameter(_)), "{bad}");
        }
    }

    #[test]
    fn degenerate_timer_is_rejected_before_any_work() {
        let err = derive(EventDistribution::Weibull { scale: -1.0, shape: 2.0 }, 1.0).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
    }

    #[test]
    fn oversized_windows_overflow() {
        let config = AnalysisConfig {
            max_truncation_points: 10,
            ..AnalysisConfig::default()
        };
        let err = PrecisionPlan::derive(
            &EventDistribution::Dirac { timeout: 100.0 },
            &kappa("1e-10"),
            5.0,
            5.0,
            &config,
        )
        .unwrap_err();
        assert!(matches!(err, Error::TruncationOverflow { .. }));
    }
}
