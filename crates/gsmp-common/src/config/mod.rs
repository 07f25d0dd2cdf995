//! Analysis configuration loading and validation.
//!
//! This module provides:
//! - The typed `AnalysisConfig` (kappa, guard digits, truncation limits)
//! - Deterministic resolution (explicit path > env > XDG > defaults)
//! - Semantic validation

pub mod resolve;

pub use resolve::{ConfigPaths, ConfigResolver};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Numerical settings for potato analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Absolute error bound on every reported result.
    pub kappa: f64,
    /// Decimal digits carried beyond the required precision.
    pub guard_digits: u64,
    /// Smallest Poisson weight the truncation oracle may produce.
    pub lower_guard: f64,
    /// Largest Poisson weight the truncation oracle may produce.
    pub upper_guard: f64,
    /// Widest Poisson window accepted before reporting overflow.
    pub max_truncation_points: usize,
    /// How many times the Weibull Taylor polynomial may grow by half.
    pub taylor_growth_limit: u32,
    /// Step cap for each walk of the Weibull integration-cutoff search.
    pub integral_ceil_max_steps: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            kappa: 1e-10,
            guard_digits: 10,
            lower_guard: 1e-300,
            upper_guard: 1e300,
            max_truncation_points: 1_000_000,
            taylor_growth_limit: 8,
            integral_ceil_max_steps: 100_000,
        }
    }
}

impl AnalysisConfig {
    /// Validate configuration semantically.
    pub fn validate(&self) -> Result<()> {
        if !(self.kappa.is_finite() && self.kappa > 0.0 && self.kappa < 1.0) {
            return Err(Error::Config(format!(
                "kappa must be in (0, 1), got {}",
                self.kappa
            )));
        }
        if !(self.lower_guard.is_finite() && self.lower_guard > 0.0) {
            return Err(Error::Config(format!(
                "lower_guard must be positive, got {}",
                self.lower_guard
            )));
        }
        if !(self.upper_guard.is_finite() && self.upper_guard > self.lower_guard) {
            return Err(Error::Config(format!(
                "upper_guard must exceed lower_guard, got {} <= {}",
                self.upper_guard, self.lower_guard
            )));
        }
        if self.max_truncation_points == 0 {
            return Err(Error::Config("max_truncation_points must be positive".into()));
        }
        if self.integral_ceil_max_steps == 0 {
            return Err(Error::Config("integral_ceil_max_steps must be positive".into()));
        }
        Ok(())
    }
}

/// Where a loaded configuration came from.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    /// Path to the config file, or None if using defaults
    pub path: Option<String>,
    /// SHA-256 hash of file contents, or None if defaults
    pub hash: Option<String>,
    /// How this source was resolved
    pub resolution: ConfigResolution,
    /// Whether GSMP_KAPPA replaced the file's kappa
    pub kappa_from_env: bool,
}

/// How a config file was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigResolution {
    /// From an explicit path given by the caller
    Explicit,
    /// From the GSMP_CONFIG environment variable
    EnvVar,
    /// From the XDG config directory
    XdgConfig,
    /// Using built-in defaults
    Default,
}

impl std::fmt::Display for ConfigResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigResolution::Explicit => write!(f, "explicit"),
            ConfigResolution::EnvVar => write!(f, "env"),
            ConfigResolution::XdgConfig => write!(f, "xdg"),
            ConfigResolution::Default => write!(f, "default"),
        }
    }
}
