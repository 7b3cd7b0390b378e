//! # Server Configuration
//!
//! Defaults, optionally overlaid by a YAML file named in `NEXO_CONFIG`, then
//! by individual environment variables:
//!
//! | Variable                  | Field                 | Default                          |
//! |---------------------------|-----------------------|----------------------------------|
//! | `PORT`                    | `port`                | `8000`                           |
//! | `NEXO_DATA_DIR`           | `data_dir`            | `server/_data`                   |
//! | `NEXO_STORAGE`            | `storage`             | `file`                           |
//! | `NEXO_THRESHOLD`          | `threshold`           | `2`                              |
//! | `NEXO_COSIGNERS`          | `cosigners`           | `3`                              |
//! | `NEXO_SIGNING_MODE`       | `signing_mode`        | `threshold`                      |
//! | `NEXO_REJECT_UNDERSIGNED` | `reject_undersigned`  | `false`                          |
//! | `NEXO_COSIGNER_KEY_DIR`   | `cosigner_key_dir`    | `server/_secrets/dev_cosigners`  |

use std::path::{Path, PathBuf};
use std::str::FromStr;

use nexo_crypto::SigningMode;
use serde::Deserialize;
use thiserror::Error;

/// Names the YAML config file.
pub const CONFIG_ENV: &str = "NEXO_CONFIG";

/// Configuration loading failure.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The YAML file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// File path.
        path: String,
        /// IO error.
        #[source]
        source: std::io::Error,
    },

    /// The YAML file is malformed.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// File path.
        path: String,
        /// Parser error.
        #[source]
        source: serde_yaml::Error,
    },

    /// An environment variable has an unusable value.
    #[error("invalid value for {var}: {reason}")]
    InvalidEnv {
        /// Variable name.
        var: &'static str,
        /// What was wrong.
        reason: String,
    },
}

/// Where leaves and STHs are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// JSON Lines files under `data_dir`.
    #[default]
    File,
    /// Process memory only.
    Memory,
}

impl FromStr for StorageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(Self::File),
            "memory" => Ok(Self::Memory),
            other => Err(format!("expected \"file\" or \"memory\", got {other:?}")),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen port.
    pub port: u16,
    /// Directory holding `users.jsonl` and `sth.jsonl`.
    pub data_dir: PathBuf,
    /// Storage backend.
    pub storage: StorageKind,
    /// Signatures required per STH.
    pub threshold: usize,
    /// Number of cosigners.
    pub cosigners: usize,
    /// Stop at the threshold or collect every signature.
    pub signing_mode: SigningMode,
    /// Refuse to publish under-signed STHs.
    pub reject_undersigned: bool,
    /// Where dev cosigner keys are read from and generated into.
    pub cosigner_key_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            data_dir: PathBuf::from("server/_data"),
            storage: StorageKind::File,
            threshold: 2,
            cosigners: 3,
            signing_mode: SigningMode::Threshold,
            reject_undersigned: false,
            cosigner_key_dir: PathBuf::from("server/_secrets/dev_cosigners"),
        }
    }
}

fn parse_env<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidEnv {
        var,
        reason: e.to_string(),
    })
}

fn parse_bool(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ConfigError::InvalidEnv {
            var,
            reason: format!("expected a boolean, got {other:?}"),
        }),
    }
}

impl ServerConfig {
    /// Parse a YAML config file. Missing fields take their defaults.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Overlay environment variables read through `env`.
    pub fn apply_env<F>(mut self, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = env("PORT") {
            self.port = parse_env("PORT", &v)?;
        }
        if let Some(v) = env("NEXO_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = env("NEXO_STORAGE") {
            self.storage = parse_env("NEXO_STORAGE", &v)?;
        }
        if let Some(v) = env("NEXO_THRESHOLD") {
            self.threshold = parse_env("NEXO_THRESHOLD", &v)?;
        }
        if let Some(v) = env("NEXO_COSIGNERS") {
            self.cosigners = parse_env("NEXO_COSIGNERS", &v)?;
        }
        if let Some(v) = env("NEXO_SIGNING_MODE") {
            self.signing_mode = parse_env("NEXO_SIGNING_MODE", &v)?;
        }
        if let Some(v) = env("NEXO_REJECT_UNDERSIGNED") {
            self.reject_undersigned = parse_bool("NEXO_REJECT_UNDERSIGNED", &v)?;
        }
        if let Some(v) = env("NEXO_COSIGNER_KEY_DIR") {
            self.cosigner_key_dir = PathBuf::from(v);
        }
        Ok(self)
    }

    /// Load from `NEXO_CONFIG` (if set) and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|k| std::env::var(k).ok())
    }

    /// Load using `env` in place of the process environment.
    pub fn load_with<F>(env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base = match env(CONFIG_ENV) {
            Some(path) => Self::from_yaml_file(Path::new(&path))?,
            None => Self::default(),
        };
        base.apply_env(env)
    }
}
