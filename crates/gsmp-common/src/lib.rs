//! GSMP potato analysis common types, errors, and configuration.
//!
//! This crate provides the pieces shared by the model and analysis crates:
//! - The unified error type with stable codes
//! - Sparse discrete distributions over CTMC states
//! - Analysis configuration loading and validation

pub mod config;
pub mod distribution;
pub mod error;

pub use config::{AnalysisConfig, ConfigPaths, ConfigResolution, ConfigResolver, ConfigSource};
pub use distribution::Distribution;
pub use error::{Error, ErrorCategory, Result};
