//! Error types for GSMP potato analysis.
//!
//! This module provides structured error handling with:
//! - Stable error codes for machine parsing
//! - Category classification for error grouping
//! - Recoverability hints for automation
//! - Remediation suggestions for humans
//!
//! # Human-Facing Output
//!
//! ```text
//! ✗ Precision Not Set
//!   Reason: kappa was never set for event "timeout"
//!   Fix: Call set_kappa (or load an AnalysisConfig) before requesting results.
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for GSMP analysis operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Configuration and parameter errors.
    Config,
    /// Structural problems in the ACTMC or its events.
    Model,
    /// Truncation, precision and numerical errors during analysis.
    Analysis,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Model => write!(f, "model"),
            ErrorCategory::Analysis => write!(f, "analysis"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Unified error type for GSMP analysis.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    // Model errors (20-29)
    #[error("invalid model: {0}")]
    InvalidModel(String),

    #[error("state {state} out of range (model has {num_states} states)")]
    StateOutOfRange { state: usize, num_states: usize },

    #[error("state {state} is not in the potato")]
    NotInPotato { state: usize },

    #[error("unsupported distribution: {0}")]
    UnsupportedDistribution(String),

    // Analysis errors (30-39)
    #[error("precision not set: {0}")]
    MissingPrecision(String),

    #[error("Poisson truncation overflow at rate {rate} with {digits} digits")]
    TruncationOverflow { rate: String, digits: u64 },

    #[error("numerical instability detected: {0}")]
    NumericalInstability(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Configuration errors
    /// - 20-29: Model errors
    /// - 30-39: Analysis errors
    /// - 60-69: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidParameter(_) => 11,
            Error::InvalidModel(_) => 20,
            Error::StateOutOfRange { .. } => 21,
            Error::NotInPotato { .. } => 22,
            Error::UnsupportedDistribution(_) => 23,
            Error::MissingPrecision(_) => 30,
            Error::TruncationOverflow { .. } => 31,
            Error::NumericalInstability(_) => 32,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::InvalidParameter(_) => ErrorCategory::Config,

            Error::InvalidModel(_)
            | Error::StateOutOfRange { .. }
            | Error::NotInPotato { .. }
            | Error::UnsupportedDistribution(_) => ErrorCategory::Model,

            Error::MissingPrecision(_)
            | Error::TruncationOverflow { .. }
            | Error::NumericalInstability(_) => ErrorCategory::Analysis,

            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Returns whether this error is potentially recoverable.
    ///
    /// Recoverable errors go away after fixing the configuration or the
    /// model, setting a precision, or choosing a coarser one.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Config(_) => true,
            Error::InvalidParameter(_) => true,

            Error::InvalidModel(_) => true,
            Error::StateOutOfRange { .. } => false, // caller bug
            Error::NotInPotato { .. } => false,     // caller bug
            Error::UnsupportedDistribution(_) => false,

            Error::MissingPrecision(_) => true,
            Error::TruncationOverflow { .. } => true, // coarser kappa
            Error::NumericalInstability(_) => false,

            Error::Io(_) => true,
            Error::Json(_) => true,
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::Config(_) => {
                "Check the analysis config file (GSMP_CONFIG or ~/.config/gsmp/analysis.json) for invalid values."
            }
            Error::InvalidParameter(_) => {
                "Use a finite, positive kappa and distribution parameters (timeout >= 0, scale/shape/rate > 0, phases >= 1)."
            }
            Error::InvalidModel(_) => {
                "Check that every active state has a firing kernel and that no kernel targets the event's own active states."
            }
            Error::StateOutOfRange { .. } => {
                "State indices must be below the number of states in the ACTMC."
            }
            Error::NotInPotato { .. } => {
                "Request results only for states where the event is active; list them with Potato::states()."
            }
            Error::UnsupportedDistribution(_) => {
                "Only exponential, Erlang, Dirac and Weibull timers are supported."
            }
            Error::MissingPrecision(_) => {
                "Call set_kappa (or load an AnalysisConfig) before requesting results."
            }
            Error::TruncationOverflow { .. } => {
                "The Poisson window cannot be represented. Relax kappa, raise max_truncation_points, or widen the guards."
            }
            Error::NumericalInstability(_) => {
                "Internal numerical issue. Report with the model JSON and the kappa used."
            }
            Error::Io(_) => "Check that the file exists and is readable.",
            Error::Json(_) => {
                "Invalid JSON in file. Check syntax with 'jq . <file>' or restore from backup."
            }
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::Config(_) => "Configuration Error",
            Error::InvalidParameter(_) => "Invalid Parameter",
            Error::InvalidModel(_) => "Invalid Model",
            Error::StateOutOfRange { .. } => "State Out Of Range",
            Error::NotInPotato { .. } => "State Not In Potato",
            Error::UnsupportedDistribution(_) => "Unsupported Distribution",
            Error::MissingPrecision(_) => "Precision Not Set",
            Error::TruncationOverflow { .. } => "Truncation Overflow",
            Error::NumericalInstability(_) => "Numerical Instability",
            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Parse Error",
        }
    }

    /// Headline, reason and fix on three lines.
    pub fn human_report(&self) -> String {
        format!(
            "✗ {}\n  Reason: {}\n  Fix: {}",
            self.headline(),
            self,
            self.remediation()
        )
    }
}
