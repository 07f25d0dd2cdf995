//! Coverage windows of discrete distributions.
//!
//! A window `[left, right]` covers all but `accuracy` of the mass: at most
//! `accuracy / 2` lies on either side. The walk runs outward from the mode in
//! the log domain and stops once a geometric bound on the remaining tail
//! drops below the budget.

use std::f64::consts::LN_10;

use serde::{Deserialize, Serialize};

use super::stable::{negative_binomial_log_pmf, poisson_log_pmf};

/// Poisson rates below this always start their window at zero.
const SMALL_RATE: f64 = 25.0;

/// Inclusive index range holding the bulk of a distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageWindow {
    pub left: usize,
    pub right: usize,
}

impl CoverageWindow {
    pub fn len(&self) -> usize {
        self.right - self.left + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, other: &CoverageWindow) -> bool {
        self.left <= other.left && other.right <= self.right
    }
}

/// Window of Poisson(`rate`) leaving at most `e^ln_half_accuracy` in each tail.
///
/// Returns `None` for a negative or non-finite rate, or a window wider than
/// `max_points`.
pub fn poisson_window(rate: f64, ln_half_accuracy: f64, max_points: usize) -> Option<CoverageWindow> {
    if !rate.is_finite() || rate < 0.0 {
        return None;
    }
    let mode = rate.floor() as usize;
    walk(
        mode,
        poisson_log_pmf(mode as u64, rate),
        |i| rate / (i as f64 + 1.0),
        |i| i as f64 / rate,
        ln_half_accuracy,
        max_points,
        rate < SMALL_RATE,
    )
}

/// Window of the number of Poisson(`rate`) arrivals before an Erlang timer
/// with `phases` phases of rate `phase_rate` completes.
pub fn negative_binomial_window(
    rate: f64,
    phase_rate: f64,
    phases: u64,
    ln_half_accuracy: f64,
    max_points: usize,
) -> Option<CoverageWindow> {
    if !(rate.is_finite() && phase_rate.is_finite()) || rate < 0.0 || phase_rate <= 0.0 || phases == 0 {
        return None;
    }
    let p = phase_rate / (rate + phase_rate);
    let q = 1.0 - p;
    let k = phases as f64;
    let mode = if phases > 1 {
        ((k - 1.0) * q / p).floor() as usize
    } else {
        0
    };
    walk(
        mode,
        negative_binomial_log_pmf(mode as u64, phases, p),
        |i| (i as f64 + k) / (i as f64 + 1.0) * q,
        |i| {
            if i == 0 {
                0.0
            } else {
                i as f64 / ((i as f64 + k - 1.0) * q)
            }
        },
        ln_half_accuracy,
        max_points,
        false,
    )
}

/// Decimal digits needed so that Poisson(`rate`) mass at `index` is still
/// resolved: `ceil(-log10 P(index)) + 1`.
pub fn poisson_coverage_digits(rate: f64, index: usize) -> u64 {
    let digits = (-poisson_log_pmf(index as u64, rate) / LN_10).ceil() + 1.0;
    if digits.is_finite() && digits > 0.0 {
        digits as u64
    } else {
        0
    }
}

/// `up(i) = pmf(i + 1) / pmf(i)` and `down(i) = pmf(i - 1) / pmf(i)`; `up`
/// must be non-increasing so the tail bound is geometric.
fn walk(
    mode: usize,
    ln_mode_pmf: f64,
    up: impl Fn(usize) -> f64,
    down: impl Fn(usize) -> f64,
    ln_half_accuracy: f64,
    max_points: usize,
    left_at_zero: bool,
) -> Option<CoverageWindow> {
    if ln_mode_pmf.is_nan() {
        return None;
    }

    let mut right = mode;
    let mut ln_p = ln_mode_pmf;
    loop {
        let ln_next = ln_p + up(right).ln();
        let ratio = up(right + 1);
        if ratio < 1.0 && ln_next - (1.0 - ratio).ln() <= ln_half_accuracy {
            break;
        }
        ln_p = ln_next;
        right += 1;
        if right - mode > max_points {
            return None;
        }
    }

    let mut left = mode;
    if left_at_zero {
        left = 0;
    } else {
        let mut ln_p = ln_mode_pmf;
        while left > 0 {
            let ln_prev = ln_p + down(left).ln();
            let ratio = down(left - 1);
            if ratio < 1.0 && ln_prev - (1.0 - ratio).ln() <= ln_half_accuracy {
                break;
            }
            ln_p = ln_prev;
            left -= 1;
        }
    }

    let window = CoverageWindow { left, right };
    if window.len() > max_points {
        return None;
    }
    Some(window)
}
