//! Core math modules.

pub mod binomial;
pub mod decimal;
pub mod fox_glynn;
pub mod polynomial;
pub mod stable;
pub mod window;
