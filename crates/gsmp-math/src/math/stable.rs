//! Log-domain special functions used to size truncation windows.
//!
//! These run in double precision: they only decide how many terms and digits
//! the arbitrary-precision stages need, never the values themselves.

use std::f64::consts::PI;

const LOG_SQRT_2PI: f64 = 0.918_938_533_204_672_8; // 0.5 * ln(2*pi)
const LANCZOS_G: f64 = 7.0;
#[allow(clippy::excessive_precision)] // published Lanczos coefficients
const LANCZOS_COEFFS: [f64; 9] = [
    0.999_999_999_999_809_93,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_1,
    -176.615_029_162_140_59,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_571_6e-6,
    1.505_632_735_149_311_6e-7,
];

/// Natural log of the Gamma function (log |Gamma(z)|).
///
/// Lanczos approximation with reflection for z < 0.5.
pub fn log_gamma(z: f64) -> f64 {
    if z.is_nan() || z == f64::NEG_INFINITY {
        return f64::NAN;
    }
    if z == f64::INFINITY {
        return f64::INFINITY;
    }
    if z <= 0.0 && (z - z.round()).abs() < 1e-15 {
        return f64::NAN;
    }
    if z < 0.5 {
        let sin_pi = (PI * z).sin();
        if sin_pi == 0.0 {
            return f64::NAN;
        }
        return PI.ln() - sin_pi.abs().ln() - log_gamma(1.0 - z);
    }

    let z_minus = z - 1.0;
    let mut x = LANCZOS_COEFFS[0];
    for (i, coeff) in LANCZOS_COEFFS.iter().enumerate().skip(1) {
        x += coeff / (z_minus + i as f64);
    }
    let t = z_minus + LANCZOS_G + 0.5;
    LOG_SQRT_2PI + (z_minus + 0.5) * t.ln() - t + x.ln()
}

/// log(n!).
pub fn log_factorial(n: u64) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    log_gamma((n as f64) + 1.0)
}

/// log(n choose k).
pub fn log_binomial(n: u64, k: u64) -> f64 {
    if k > n {
        return f64::NEG_INFINITY;
    }
    if k == 0 || k == n {
        return 0.0;
    }
    log_factorial(n) - log_factorial(k) - log_factorial(n - k)
}

/// log P(N = n) for N ~ Poisson(rate).
///
/// A zero rate puts all mass on n = 0.
pub fn poisson_log_pmf(n: u64, rate: f64) -> f64 {
    if rate.is_nan() || rate < 0.0 {
        return f64::NAN;
    }
    if rate == 0.0 {
        return if n == 0 { 0.0 } else { f64::NEG_INFINITY };
    }
    n as f64 * rate.ln() - rate - log_factorial(n)
}

/// log P(N = n) where N counts failures before the `successes`-th success
/// with per-trial success probability `p`.
///
/// This is the number of Poisson(λ) arrivals during an Erlang(μ, k) delay
/// when `p = μ / (λ + μ)` and `successes = k`.
pub fn negative_binomial_log_pmf(n: u64, successes: u64, p: f64) -> f64 {
    if !(0.0..=1.0).contains(&p) || successes == 0 {
        return f64::NAN;
    }
    if p == 1.0 {
        return if n == 0 { 0.0 } else { f64::NEG_INFINITY };
    }
    if p == 0.0 {
        return f64::NEG_INFINITY;
    }
    log_binomial(n + successes - 1, n) + successes as f64 * p.ln() + n as f64 * (1.0 - p).ln()
}
