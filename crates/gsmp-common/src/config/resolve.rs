//! Configuration resolution for GSMP analysis.
//!
//! Implements deterministic config resolution order:
//! 1. Explicit path given by the caller
//! 2. Environment variable (GSMP_CONFIG)
//! 3. XDG config (`$XDG_CONFIG_HOME/gsmp/analysis.json`, then `~/.config/gsmp/`)
//! 4. Built-in defaults
//!
//! `GSMP_KAPPA` overrides kappa from whichever source was used.

use std::env;
use std::fs;
use std::path::PathBuf;

use sha2::{Digest, Sha256};

use super::{AnalysisConfig, ConfigResolution, ConfigSource};
use crate::error::{Error, Result};

pub const CONFIG_ENV: &str = "GSMP_CONFIG";
pub const KAPPA_ENV: &str = "GSMP_KAPPA";
const CONFIG_DIR_NAME: &str = "gsmp";
const CONFIG_FILE_NAME: &str = "analysis.json";

/// Configuration file paths.
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    /// Explicit path to analysis.json
    pub config_path: Option<PathBuf>,
}

/// Configuration resolver with deterministic resolution order.
#[derive(Debug)]
pub struct ConfigResolver {
    paths: ConfigPaths,
}

impl ConfigResolver {
    pub fn new(paths: ConfigPaths) -> Self {
        ConfigResolver { paths }
    }

    /// Create a resolver with no explicit path.
    pub fn with_defaults() -> Self {
        ConfigResolver {
            paths: ConfigPaths::default(),
        }
    }

    /// Resolve the config directory (`.../gsmp`).
    pub fn resolve_config_dir(&self) -> Option<PathBuf> {
        if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
            return Some(PathBuf::from(xdg).join(CONFIG_DIR_NAME));
        }
        dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME))
    }

    /// Resolve the analysis.json path.
    pub fn resolve_config_path(&self) -> (Option<PathBuf>, ConfigResolution) {
        // 1. Explicit
        if let Some(ref path) = self.paths.config_path {
            return (Some(path.clone()), ConfigResolution::Explicit);
        }

        // 2. GSMP_CONFIG env var
        if let Ok(path) = env::var(CONFIG_ENV) {
            return (Some(PathBuf::from(path)), ConfigResolution::EnvVar);
        }

        // 3. XDG config dir
        if let Some(config_dir) = self.resolve_config_dir() {
            let path = config_dir.join(CONFIG_FILE_NAME);
            if path.exists() {
                return (Some(path), ConfigResolution::XdgConfig);
            }
        }

        // 4. Default
        (None, ConfigResolution::Default)
    }

    /// Load the configuration from the resolved path or defaults, apply the
    /// kappa override and validate.
    pub fn load(&self) -> Result<(AnalysisConfig, ConfigSource)> {
        let (path, resolution) = self.resolve_config_path();

        let (mut config, mut source) = match path {
            Some(p) => {
                let content = fs::read_to_string(&p).map_err(|e| {
                    Error::Config(format!("failed to read config from {}: {}", p.display(), e))
                })?;

                let hash = compute_sha256(&content);

                let config: AnalysisConfig = serde_json::from_str(&content).map_err(|e| {
                    Error::Config(format!("failed to parse {}: {}", p.display(), e))
                })?;

                (
                    config,
                    ConfigSource {
                        path: Some(p.to_string_lossy().to_string()),
                        hash: Some(hash),
                        resolution,
                        kappa_from_env: false,
                    },
                )
            }
            None => (
                AnalysisConfig::default(),
                ConfigSource {
                    path: None,
                    hash: None,
                    resolution: ConfigResolution::Default,
                    kappa_from_env: false,
                },
            ),
        };

        if let Ok(raw) = env::var(KAPPA_ENV) {
            config.kappa = raw.trim().parse().map_err(|e| {
                Error::Config(format!("{KAPPA_ENV}={raw:?} is not a number: {e}"))
            })?;
            source.kappa_from_env = true;
        }

        config.validate()?;
        Ok((config, source))
    }
}

/// Compute SHA-256 hash of a string.
fn compute_sha256(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_hash_is_hex() {
        let hash = compute_sha256("kappa");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn explicit_path_wins() {
        let resolver = ConfigResolver::new(ConfigPaths {
            config_path: Some(PathBuf::from("/explicit/analysis.json")),
        });
        let (path, resolution) = resolver.resolve_config_path();
        assert_eq!(resolution, ConfigResolution::Explicit);
        assert_eq!(path, Some(PathBuf::from("/explicit/analysis.json")));
    }

    #[test]
    fn missing_explicit_file_is_config_error() {
        let resolver = ConfigResolver::new(ConfigPaths {
            config_path: Some(PathBuf::from("/nonexistent/gsmp/analysis.json")),
        });
        let err = resolver.load().unwrap_err();
        assert_eq!(err.code(), 10);
    }
}
