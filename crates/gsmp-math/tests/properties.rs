//! Property-based tests for gsmp-math numerical functions.
//!
//! Uses proptest to check algebraic identities of the precision context and
//! the polynomial algebra across random inputs.

use bigdecimal::BigDecimal;
use gsmp_math::{
    allowed_error, from_f64, poisson_log_pmf, poisson_window, FoxGlynn,
    Polynomial, Precision,
};
use num_traits::Zero;
use proptest::prelude::*;

const DIGITS: u64 = 40;

fn ctx() -> Precision {
    Precision::new(DIGITS)
}

fn dec(x: f64) -> BigDecimal {
    from_f64(x).unwrap()
}

fn close(a: &BigDecimal, b: &BigDecimal, digits: u64) -> bool {
    let scale = a.abs().max(b.abs()).max(BigDecimal::from(1));
    (a - b).abs() <= scale * allowed_error(digits)
}

/// Polynomial with small non-negative integer exponents.
fn polynomial(terms: &[(u32, f64)]) -> Polynomial {
    let mut p = Polynomial::new();
    for (exponent, coefficient) in terms {
        p.add_term(BigDecimal::from(*exponent), &dec(*coefficient), &ctx());
    }
    p
}

fn terms_strategy() -> impl Strategy<Value = Vec<(u32, f64)>> {
    prop::collection::vec((0u32..8, -10.0..10.0f64), 1..6)
}

// ============================================================================
// Precision properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// exp(a + b) = exp(a) exp(b).
    #[test]
    fn exp_is_additive(a in -20.0..20.0f64, b in -20.0..20.0f64) {
        let c = ctx();
        let (da, db) = (dec(a), dec(b));
        let lhs = c.exp(&(&da + &db));
        let rhs = c.mul(&c.exp(&da), &c.exp(&db));
        prop_assert!(close(&lhs, &rhs, DIGITS - 6), "exp({a}+{b}): {lhs} vs {rhs}");
    }

    /// ln is the inverse of exp on positive arguments.
    #[test]
    fn ln_inverts_exp(x in 1e-6..1e6f64) {
        let c = ctx();
        let dx = dec(x);
        let back = c.exp(&c.ln(&dx).unwrap());
        prop_assert!(close(&back, &dx, DIGITS - 6), "exp(ln({x})) = {back}");
    }

    /// Division undoes multiplication.
    #[test]
    fn div_inverts_mul(a in -1e6..1e6f64, b in 1e-3..1e6f64) {
        let c = ctx();
        let (da, db) = (dec(a), dec(b));
        let back = c.div(&c.mul(&da, &db), &db);
        prop_assert!(close(&back, &da, DIGITS - 2));
    }

    /// Integer powers agree with the general power function.
    #[test]
    fn powi_agrees_with_pow(base in 0.1..5.0f64, n in 0u64..40) {
        let c = ctx();
        let db = dec(base);
        let via_pow = c.pow(&db, &BigDecimal::from(n)).unwrap();
        let via_exp = c.exp(&c.mul(&BigDecimal::from(n), &c.ln(&db).unwrap()));
        prop_assert!(close(&via_pow, &via_exp, DIGITS - 8));
    }
}

// ============================================================================
// Polynomial properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Evaluation is a ring homomorphism for multiplication.
    #[test]
    fn evaluate_respects_multiply(a in terms_strategy(), b in terms_strategy(), x in 0.0..3.0f64) {
        let c = ctx();
        let (pa, pb) = (polynomial(&a), polynomial(&b));
        let dx = dec(x);
        let lhs = pa.multiply(&pb, &c).evaluate(&dx, &c);
        let rhs = c.mul(&pa.evaluate(&dx, &c), &pb.evaluate(&dx, &c));
        prop_assert!(close(&lhs, &rhs, DIGITS - 10), "{lhs} vs {rhs}");
    }

    /// Evaluation is additive.
    #[test]
    fn evaluate_respects_add(a in terms_strategy(), b in terms_strategy(), x in 0.0..3.0f64) {
        let c = ctx();
        let (mut pa, pb) = (polynomial(&a), polynomial(&b));
        let dx = dec(x);
        let separate = c.add(&pa.evaluate(&dx, &c), &pb.evaluate(&dx, &c));
        pa.add(&pb, &c);
        prop_assert!(close(&pa.evaluate(&dx, &c), &separate, DIGITS - 10));
    }

    /// Scaling commutes with evaluation.
    #[test]
    fn evaluate_respects_scale(a in terms_strategy(), k in -5.0..5.0f64, x in 0.0..3.0f64) {
        let c = ctx();
        let mut p = polynomial(&a);
        let dx = dec(x);
        let expected = c.mul(&p.evaluate(&dx, &c), &dec(k));
        p.scale(&dec(k), &c);
        prop_assert!(close(&p.evaluate(&dx, &c), &expected, DIGITS - 10));
    }

    /// The antiderivative vanishes at zero and its central difference
    /// recovers the polynomial.
    #[test]
    fn antiderivative_differentiates_back(a in terms_strategy(), x in 0.1..2.0f64) {
        let c = ctx();
        let p = polynomial(&a);
        let anti = p.antiderivative(&c).unwrap();
        prop_assert!(anti.evaluate(&BigDecimal::zero(), &c).is_zero());

        let h = dec(1e-8);
        let dx = dec(x);
        let rise = anti.evaluate(&(&dx + &h), &c) - anti.evaluate(&(&dx - &h), &c);
        let slope = c.div(&rise, &(&h + &h));
        let value = p.evaluate(&dx, &c);
        let tolerance = value.abs().max(BigDecimal::from(1)) * dec(1e-5);
        prop_assert!((slope - value).abs() <= tolerance);
    }
}

// ============================================================================
// Truncation properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Poisson windows contain the mode and leave less than the budget outside.
    #[test]
    fn poisson_window_contains_mode(rate in 0.01..500.0f64, digits in 3u32..10) {
        let accuracy = 10f64.powi(-(digits as i32));
        let w = poisson_window(rate, (accuracy / 2.0).ln(), 1_000_000).unwrap();
        let mode = rate.floor() as usize;
        prop_assert!(w.left <= mode && mode <= w.right);
        let inside: f64 = (w.left..=w.right)
            .map(|n| poisson_log_pmf(n as u64, rate).exp())
            .sum();
        prop_assert!(1.0 - inside <= accuracy + 1e-11);
    }

    /// Fox-Glynn weight ratios are the Poisson ratios.
    #[test]
    fn fox_glynn_weight_ratios(rate in 0.5..60.0f64) {
        let c = Precision::new(30);
        let lo: BigDecimal = "1e-300".parse().unwrap();
        let hi: BigDecimal = "1e300".parse().unwrap();
        let fg = FoxGlynn::compute(&dec(rate), &lo, &hi, &allowed_error(10), 100_000, &c).unwrap();
        let mode = rate.floor() as usize;
        let ratio = gsmp_math::to_f64(&c.div(fg.weight(mode).unwrap(), fg.total_weight()));
        let expected = poisson_log_pmf(mode as u64, rate).exp();
        prop_assert!((ratio - expected).abs() <= 1e-9 * expected.max(1e-3));
        prop_assert!(fg.left() <= mode && mode <= fg.right());
    }
}
