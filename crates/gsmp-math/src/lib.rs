//! GSMP math utilities: decimal precision, polynomials and Poisson truncation.

pub mod math;

pub use math::binomial::BinomialRows;
pub use math::decimal::{allowed_error, decimal_digits, from_f64, log10_approx, to_f64, Precision};
pub use math::fox_glynn::FoxGlynn;
pub use math::polynomial::Polynomial;
pub use math::stable::*;
pub use math::window::{
    negative_binomial_window, poisson_coverage_digits, poisson_window, CoverageWindow,
};
