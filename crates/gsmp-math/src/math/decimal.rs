//! Decimal precision context and elementary functions at a fixed number of
//! significant digits.
//!
//! Every helper rounds its result to the context's digit count. The context is
//! passed explicitly through all polynomial and potato computations; there is
//! no ambient or global precision.

use std::f64::consts::{LN_10, LOG10_2};

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_traits::{One, ToPrimitive, Zero};
use serde::{Deserialize, Serialize};

const EXP_GUARD_DIGITS: u64 = 10;
const LN_GUARD_DIGITS: u64 = 10;
const POW_GUARD_DIGITS: u64 = 5;
const MAX_HALLEY_ITERS: usize = 64;

/// Number of significant decimal digits kept by every operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Precision {
    digits: u64,
}

impl Precision {
    /// Create a context keeping `digits` significant digits (at least one).
    pub fn new(digits: u64) -> Self {
        Self {
            digits: digits.max(1),
        }
    }

    pub fn digits(&self) -> u64 {
        self.digits
    }

    /// Same context with `extra` additional digits.
    pub fn widened(&self, extra: u64) -> Self {
        Self::new(self.digits + extra)
    }

    pub fn round(&self, x: BigDecimal) -> BigDecimal {
        x.with_prec(self.digits)
    }

    pub fn add(&self, a: &BigDecimal, b: &BigDecimal) -> BigDecimal {
        self.round(a + b)
    }

    pub fn sub(&self, a: &BigDecimal, b: &BigDecimal) -> BigDecimal {
        self.round(a - b)
    }

    pub fn mul(&self, a: &BigDecimal, b: &BigDecimal) -> BigDecimal {
        self.round(a * b)
    }

    /// Quotient rounded to the context.
    ///
    /// # Panics
    /// Panics if `b` is zero. Callers only divide by rates, factorial
    /// indices and normalizing sums they have already checked.
    pub fn div(&self, a: &BigDecimal, b: &BigDecimal) -> BigDecimal {
        if a.is_zero() {
            return BigDecimal::zero();
        }
        let (ma, sa) = a.as_bigint_and_exponent();
        let (mb, sb) = b.as_bigint_and_exponent();
        let shift = (self.digits as i64 + approx_digit_count(&mb) - approx_digit_count(&ma) + 2).max(0);
        let quotient = (ma * ten_pow(shift as u32)) / mb;
        self.round(BigDecimal::new(quotient, sa - sb + shift))
    }

    pub fn inverse(&self, x: &BigDecimal) -> BigDecimal {
        self.div(&BigDecimal::one(), x)
    }

    /// `base^n` by binary exponentiation.
    pub fn powi(&self, base: &BigDecimal, n: u64) -> BigDecimal {
        if n == 0 {
            return BigDecimal::one();
        }
        let bits = u64::from(64 - n.leading_zeros());
        let work = self.widened(POW_GUARD_DIGITS + bits / 3);
        let mut result = BigDecimal::one();
        let mut square = work.round(base.clone());
        let mut k = n;
        while k > 0 {
            if k & 1 == 1 {
                result = work.mul(&result, &square);
            }
            k >>= 1;
            if k > 0 {
                square = work.mul(&square, &square);
            }
        }
        self.round(result)
    }

    /// `e^x`.
    ///
    /// Positive arguments are halved until below 1/2, summed as a Taylor
    /// series and squared back. Negative arguments go through the reciprocal.
    pub fn exp(&self, x: &BigDecimal) -> BigDecimal {
        if x.is_zero() {
            return BigDecimal::one();
        }
        if *x < BigDecimal::zero() {
            let positive = self.widened(2).exp(&(-x.clone()));
            return self.inverse(&positive);
        }

        let magnitude = log10_approx(x);
        let halvings = if magnitude > -LOG10_2 {
            (magnitude / LOG10_2 + 1.0).ceil().max(0.0) as u32
        } else {
            0
        };
        let work = self.widened(EXP_GUARD_DIGITS + (f64::from(halvings) * LOG10_2).ceil() as u64);

        let half = BigDecimal::new(BigInt::from(5), 1);
        let mut reduced = work.round(x.clone());
        for _ in 0..halvings {
            reduced = work.mul(&reduced, &half);
        }

        let cutoff = -(work.digits() as f64) - 1.0;
        let max_terms = 4 * work.digits() + 16;
        let mut sum = BigDecimal::one();
        let mut term = BigDecimal::one();
        for i in 1..=max_terms {
            term = work.div(&work.mul(&term, &reduced), &BigDecimal::from(i));
            if term.is_zero() || log10_approx(&term) < cutoff {
                break;
            }
            sum = work.add(&sum, &term);
        }

        for _ in 0..halvings {
            sum = work.mul(&sum, &sum);
        }
        self.round(sum)
    }

    /// Natural logarithm; `None` for non-positive arguments.
    ///
    /// Halley iteration on `e^y = x` from a double-precision starting guess.
    pub fn ln(&self, x: &BigDecimal) -> Option<BigDecimal> {
        if *x <= BigDecimal::zero() {
            return None;
        }
        if x.is_one() {
            return Some(BigDecimal::zero());
        }
        let work = self.widened(LN_GUARD_DIGITS);
        let two = BigDecimal::from(2);
        let mut y = from_f64(log10_approx(x) * LN_10)?;
        for _ in 0..MAX_HALLEY_ITERS {
            let ey = work.exp(&y);
            let numerator = work.mul(&two, &work.sub(x, &ey));
            let step = work.div(&numerator, &work.add(x, &ey));
            y = work.add(&y, &step);
            let tolerance = log10_approx(&y).max(0.0) - work.digits() as f64;
            if step.is_zero() || log10_approx(&step) < tolerance {
                break;
            }
        }
        Some(self.round(y))
    }

    /// `base^exponent` for a non-negative base and real exponent.
    ///
    /// Returns `None` for a negative base, or a zero base with a non-positive
    /// exponent other than zero.
    pub fn pow(&self, base: &BigDecimal, exponent: &BigDecimal) -> Option<BigDecimal> {
        let zero = BigDecimal::zero();
        if *base < zero {
            return None;
        }
        if exponent.is_zero() {
            return Some(BigDecimal::one());
        }
        if base.is_zero() {
            return if *exponent > zero { Some(zero) } else { None };
        }
        if exponent.is_integer() {
            if let Some(n) = exponent.abs().to_u64() {
                let value = self.powi(base, n);
                return Some(if *exponent < zero {
                    self.inverse(&value)
                } else {
                    value
                });
            }
        }

        // exp amplifies absolute error in e*ln(b) into relative error of the result
        let ln_estimate = (log10_approx(base) * LN_10).abs();
        let magnitude = log10_approx(exponent) + ln_estimate.log10();
        let work = self.widened(POW_GUARD_DIGITS + magnitude.max(0.0).ceil() as u64);
        let ln_base = work.ln(base)?;
        Some(self.round(work.exp(&work.mul(exponent, &ln_base))))
    }
}

/// Exact decimal value of a finite double, by its shortest round-trip text.
pub fn from_f64(x: f64) -> Option<BigDecimal> {
    if !x.is_finite() {
        return None;
    }
    x.to_string().parse().ok()
}

/// Nearest double; NaN if the value cannot be represented at all.
pub fn to_f64(x: &BigDecimal) -> f64 {
    ToPrimitive::to_f64(x).unwrap_or(f64::NAN)
}

/// Approximate `log10 |x|`, valid for magnitudes far outside the double range.
///
/// Returns negative infinity for zero.
pub fn log10_approx(x: &BigDecimal) -> f64 {
    let (mantissa, scale) = x.as_bigint_and_exponent();
    let magnitude = mantissa.magnitude();
    let bits = magnitude.bits();
    if bits == 0 {
        return f64::NEG_INFINITY;
    }
    let (lead, dropped) = if bits > 64 {
        (magnitude >> (bits - 64), bits - 64)
    } else {
        (magnitude.clone(), 0)
    };
    let lead = lead.to_f64().unwrap_or(f64::MAX);
    lead.log10() + dropped as f64 * LOG10_2 - scale as f64
}

/// Number of decimal digits an error bound asks for: `ceil(-log10 x)`, at
/// least one.
pub fn decimal_digits(x: &BigDecimal) -> u64 {
    let digits = (-log10_approx(x)).ceil();
    if digits.is_finite() && digits >= 1.0 {
        digits as u64
    } else if digits.is_infinite() && digits > 0.0 {
        u64::MAX
    } else {
        1
    }
}

/// `10^-digits`.
pub fn allowed_error(digits: u64) -> BigDecimal {
    BigDecimal::new(BigInt::one(), digits as i64)
}

fn ten_pow(n: u32) -> BigInt {
    BigInt::from(10u32).pow(n)
}

fn approx_digit_count(m: &BigInt) -> i64 {
    let bits = m.magnitude().bits();
    if bits == 0 {
        return 0;
    }
    (bits as f64 * LOG10_2).floor() as i64 + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    const E_50: &str = "2.71828182845904523536028747135266249775724709369995";
    const SQRT2_50: &str = "1.41421356237309504880168872420969807856967187537694";
    const LN2_50: &str = "0.69314718055994530941723212145817656807550013436025";

    fn dec(s: &str) -> BigDecimal {
        s.parse().unwrap()
    }

    fn close(a: &BigDecimal, b: &BigDecimal, digits: u64) -> bool {
        (a - b).abs() < allowed_error(digits)
    }

    #[test]
    fn exp_of_one_is_e() {
        let ctx = Precision::new(50);
        let e = ctx.exp(&BigDecimal::one());
        assert!(close(&e, &dec(E_50), 45), "got {e}");
    }

    #[test]
    fn exp_of_negative_is_reciprocal() {
        let ctx = Precision::new(40);
        let x = dec("3.25");
        let product = ctx.mul(&ctx.exp(&x), &ctx.exp(&-x));
        assert!(close(&product, &BigDecimal::one(), 35));
    }

    #[test]
    fn exp_large_argument_keeps_relative_precision() {
        let ctx = Precision::new(30);
        let x = BigDecimal::from(200);
        let direct = ctx.exp(&x);
        let halves = ctx.exp(&BigDecimal::from(100));
        let squared = ctx.mul(&halves, &halves);
        let rel = ctx.div(&(&direct - &squared).abs(), &direct);
        assert!(rel < allowed_error(25));
    }

    #[test]
    fn ln_of_two() {
        let ctx = Precision::new(50);
        let ln2 = ctx.ln(&BigDecimal::from(2)).unwrap();
        assert!(close(&ln2, &dec(LN2_50), 45), "got {ln2}");
    }

    #[test]
    fn ln_inverts_exp() {
        let ctx = Precision::new(40);
        for s in ["0.001", "0.5", "7", "123.456"] {
            let x = dec(s);
            let back = ctx.ln(&ctx.exp(&x)).unwrap();
            assert!(close(&back, &x, 30), "{s}: got {back}");
        }
    }

    #[test]
    fn ln_rejects_non_positive() {
        let ctx = Precision::new(20);
        assert!(ctx.ln(&BigDecimal::zero()).is_none());
        assert!(ctx.ln(&dec("-1")).is_none());
    }

    #[test]
    fn div_one_third() {
        let ctx = Precision::new(30);
        let third = ctx.div(&BigDecimal::one(), &BigDecimal::from(3));
        let back = ctx.mul(&third, &BigDecimal::from(3));
        assert!(close(&back, &BigDecimal::one(), 28));
        assert!(third.to_string().starts_with("0.3333333333"));
    }

    #[test]
    fn pow_fractional_exponent() {
        let ctx = Precision::new(50);
        let root = ctx.pow(&BigDecimal::from(2), &dec("0.5")).unwrap();
        assert!(close(&root, &dec(SQRT2_50), 44), "got {root}");
    }

    #[test]
    fn pow_integer_fast_path_and_negative_exponent() {
        let ctx = Precision::new(30);
        assert_eq!(ctx.pow(&BigDecimal::from(3), &BigDecimal::from(4)).unwrap(), BigDecimal::from(81));
        let inv = ctx.pow(&BigDecimal::from(4), &BigDecimal::from(-2)).unwrap();
        assert!(close(&inv, &dec("0.0625"), 28));
    }

    #[test]
    fn pow_edge_cases() {
        let ctx = Precision::new(20);
        let zero = BigDecimal::zero();
        assert_eq!(ctx.pow(&zero, &dec("1.5")).unwrap(), zero);
        assert_eq!(ctx.pow(&zero, &zero).unwrap(), BigDecimal::one());
        assert!(ctx.pow(&zero, &dec("-1")).is_none());
        assert!(ctx.pow(&dec("-2"), &dec("0.5")).is_none());
    }

    #[test]
    fn powi_matches_repeated_multiplication() {
        let ctx = Precision::new(40);
        let base = dec("1.0001");
        let mut expected = BigDecimal::one();
        for _ in 0..37 {
            expected = ctx.widened(10).mul(&expected, &base);
        }
        assert!(close(&ctx.powi(&base, 37), &expected, 35));
    }

    #[test]
    fn log10_approx_and_digits() {
        assert_eq!(log10_approx(&dec("0.0000000001")), -10.0);
        assert!((log10_approx(&dec("12345.6")) - 12345.6f64.log10()).abs() < 1e-12);
        assert_eq!(log10_approx(&BigDecimal::zero()), f64::NEG_INFINITY);
        assert_eq!(decimal_digits(&dec("1e-10")), 10);
        assert_eq!(decimal_digits(&dec("2e-10")), 10);
        assert_eq!(decimal_digits(&dec("0.5")), 1);
        assert_eq!(decimal_digits(&BigDecimal::from(3)), 1);
    }

    #[test]
    fn log10_approx_huge_mantissa() {
        let big = BigDecimal::new(ten_pow(400), 0);
        assert!((log10_approx(&big) - 400.0).abs() < 1e-9);
    }

    #[test]
    fn from_f64_is_exact_text() {
        assert_eq!(from_f64(1e-10).unwrap(), dec("0.0000000001"));
        assert_eq!(from_f64(2.5).unwrap(), dec("2.5"));
        assert!(from_f64(f64::NAN).is_none());
        assert!(from_f64(f64::INFINITY).is_none());
    }

    #[test]
    fn allowed_error_is_power_of_ten() {
        assert_eq!(allowed_error(3), dec("0.001"));
    }
}
