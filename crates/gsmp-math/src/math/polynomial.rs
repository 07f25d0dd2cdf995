//! Sparse polynomials in one variable with real exponents.
//!
//! Exponents are arbitrary decimals (Weibull shapes make them fractional), so
//! terms live in an ordered map from exponent to coefficient. Every operation
//! takes the precision its coefficients are rounded to.

use std::collections::BTreeMap;

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_traits::{One, ToPrimitive, Zero};

use super::decimal::Precision;

const EVAL_GUARD_DIGITS: u64 = 5;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Polynomial {
    terms: BTreeMap<BigDecimal, BigDecimal>,
}

impl Polynomial {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn constant(value: BigDecimal) -> Self {
        Self::monomial(BigDecimal::zero(), value)
    }

    /// `coefficient * t^exponent`.
    pub fn monomial(exponent: BigDecimal, coefficient: BigDecimal) -> Self {
        let mut terms = BTreeMap::new();
        terms.insert(exponent.normalized(), coefficient);
        Self { terms }
    }

    pub fn num_terms(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Terms in ascending exponent order.
    pub fn terms(&self) -> impl Iterator<Item = (&BigDecimal, &BigDecimal)> {
        self.terms.iter()
    }

    pub fn coefficient(&self, exponent: &BigDecimal) -> Option<&BigDecimal> {
        self.terms.get(exponent)
    }

    /// Largest exponent present.
    pub fn degree(&self) -> Option<&BigDecimal> {
        self.terms.keys().next_back()
    }

    /// Add `coefficient * t^exponent`, merging with an existing term.
    pub fn add_term(&mut self, exponent: BigDecimal, coefficient: &BigDecimal, precision: &Precision) {
        self.terms
            .entry(exponent.normalized())
            .and_modify(|c| {
                let sum = precision.add(c, coefficient);
                *c = sum;
            })
            .or_insert_with(|| precision.round(coefficient.clone()));
    }

    pub fn add(&mut self, other: &Polynomial, precision: &Precision) {
        for (exponent, coefficient) in &other.terms {
            self.add_term(exponent.clone(), coefficient, precision);
        }
    }

    /// Multiply every coefficient by `factor`.
    pub fn scale(&mut self, factor: &BigDecimal, precision: &Precision) {
        for coefficient in self.terms.values_mut() {
            let scaled = precision.mul(coefficient, factor);
            *coefficient = scaled;
        }
    }

    pub fn multiply(&self, other: &Polynomial, precision: &Precision) -> Polynomial {
        let mut product = Polynomial::new();
        for (ea, ca) in &self.terms {
            for (eb, cb) in &other.terms {
                product.add_term(ea + eb, &precision.mul(ca, cb), precision);
            }
        }
        product
    }

    /// Term-wise antiderivative with zero constant.
    ///
    /// Returns `None` if a term has exponent -1, whose antiderivative is
    /// logarithmic.
    pub fn antiderivative(&self, precision: &Precision) -> Option<Polynomial> {
        let mut result = Polynomial::new();
        for (exponent, coefficient) in &self.terms {
            let raised = exponent + BigDecimal::one();
            if raised.is_zero() {
                return None;
            }
            let value = precision.div(coefficient, &raised);
            result.terms.insert(raised.normalized(), value);
        }
        Some(result)
    }

    /// Value at `x >= 0`.
    ///
    /// Integer parts of the exponents are reached incrementally in ascending
    /// order and fractional parts are cached, so the cost is close to one
    /// multiplication per term for the integer-exponent polynomials.
    /// A non-positive `x` evaluates to the constant term alone.
    pub fn evaluate(&self, x: &BigDecimal, precision: &Precision) -> BigDecimal {
        let work = precision.widened(EVAL_GUARD_DIGITS);
        let zero = BigDecimal::zero();
        if *x <= zero {
            return self
                .terms
                .get(&zero)
                .map(|c| precision.round(c.clone()))
                .unwrap_or_default();
        }

        let mut sum = BigDecimal::zero();
        let mut power_index: u64 = 0;
        let mut power = BigDecimal::one();
        let mut fractional: Vec<(BigDecimal, BigDecimal)> = Vec::new();
        for (exponent, coefficient) in &self.terms {
            let (whole, frac) = split_exponent(exponent);
            let integral = if whole >= 0 {
                let whole = whole as u64;
                if whole >= power_index {
                    let step = work.powi(x, whole - power_index);
                    power = work.mul(&power, &step);
                    power_index = whole;
                    power.clone()
                } else {
                    work.powi(x, whole)
                }
            } else {
                work.inverse(&work.powi(x, whole.unsigned_abs()))
            };

            let value = if frac.is_zero() {
                integral
            } else {
                let cached = fractional.iter().find(|(f, _)| *f == frac).map(|(_, v)| v.clone());
                let frac_power = match cached {
                    Some(v) => v,
                    None => {
                        let v = work.pow(x, &frac).unwrap_or_default();
                        fractional.push((frac, v.clone()));
                        v
                    }
                };
                work.mul(&integral, &frac_power)
            };
            sum = work.add(&sum, &work.mul(coefficient, &value));
        }
        precision.round(sum)
    }
}

/// Split an exponent into its integer part (truncated toward zero) and the
/// remaining fraction.
fn split_exponent(exponent: &BigDecimal) -> (i64, BigDecimal) {
    let (mantissa, scale) = exponent.as_bigint_and_exponent();
    let whole = if scale <= 0 {
        mantissa * BigInt::from(10u32).pow((-scale) as u32)
    } else {
        mantissa / BigInt::from(10u32).pow(scale as u32)
    };
    let frac = exponent - BigDecimal::from(whole.clone());
    (whole.to_i64().unwrap_or(i64::MAX), frac)
}
