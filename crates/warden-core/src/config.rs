//! Runtime configuration
//!
//! Loaded from TOML, then overridden by `WARDEN_*` environment variables,
//! then validated. Every field has a default so an empty file is valid.

use crate::errors::{Result, WardenError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "WARDEN_";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WardenConfig {
    /// Capability issuance
    pub capability: CapabilityConfig,
    /// Approval deadlines
    pub timeouts: TimeoutConfig,
    /// Signature backend selection
    pub crypto: CryptoConfig,
    /// Network coordinates
    pub network: NetworkConfig,
    /// Persistence backend
    pub storage: StorageConfig,
    /// Log output
    pub logging: LoggingConfig,
}

/// Capability issuance settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CapabilityConfig {
    /// Lifetime when a request does not name one
    pub default_ttl_seconds: u64,
    /// Longest lifetime a request may ask for
    pub max_ttl_seconds: u64,
    /// Start nonces at a random base instead of zero
    pub random_nonce_base: bool,
}

impl Default for CapabilityConfig {
    fn default() -> Self {
        Self {
            default_ttl_seconds: 3_600,
            max_ttl_seconds: 30 * 24 * 3_600,
            random_nonce_base: false,
        }
    }
}

/// Approval deadlines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutConfig {
    /// Capability approval deadline
    pub capability_request_ms: u64,
    /// Connection approval deadline
    pub connection_request_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            capability_request_ms: 300_000,
            connection_request_ms: 60_000,
        }
    }
}

/// Which Ed25519 verifier to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureBackend {
    /// Native verifier, software fallback when native is unavailable
    #[default]
    Auto,
    /// Native verifier only
    Native,
    /// Software verifier only
    Software,
}

impl std::str::FromStr for SignatureBackend {
    type Err = WardenError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "native" => Ok(Self::Native),
            "software" => Ok(Self::Software),
            other => Err(WardenError::validation(format!(
                "unknown signature backend {other:?}"
            ))),
        }
    }
}

/// Signature backend settings
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CryptoConfig {
    /// Verifier selection
    pub signature_backend: SignatureBackend,
}

/// Network coordinates stamped into capabilities
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkConfig {
    /// Network name reported to applications
    pub name: String,
    /// Branch used when a request does not name one
    pub default_branch: String,
    /// Current epoch
    pub epoch: u64,
    /// Linked EVM address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evm_address: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            name: "mainnet".to_string(),
            default_branch: "main".to_string(),
            epoch: 0,
            evm_address: None,
        }
    }
}

/// Persistence backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process memory
    #[default]
    Memory,
    /// Files under `StorageConfig::path`
    Filesystem,
}

/// Persistence settings
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Backend
    pub backend: StorageBackend,
    /// Directory for the filesystem backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `warden_authorization=debug`
    pub level: String,
    /// Include span targets in output
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            with_target: true,
        }
    }
}

impl WardenConfig {
    /// Parse TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| WardenError::validation(format!("invalid config: {e}")))
    }

    /// Read and parse a TOML file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            WardenError::storage(format!("failed to read config {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| WardenError::serialization(e.to_string()))
    }

    /// Apply overrides from the process environment
    pub fn merge_with_env(&mut self) -> Result<()> {
        self.merge_env_from(std::env::vars())
    }

    /// Apply `WARDEN_*` overrides from an iterator of variables
    pub fn merge_env_from<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match name {
                "DEFAULT_TTL_SECONDS" => {
                    self.capability.default_ttl_seconds = parse_number(&key, &value)?;
                }
                "MAX_TTL_SECONDS" => self.capability.max_ttl_seconds = parse_number(&key, &value)?,
                "RANDOM_NONCE_BASE" => {
                    self.capability.random_nonce_base = parse_bool(&key, &value)?;
                }
                "CAPABILITY_TIMEOUT_MS" => {
                    self.timeouts.capability_request_ms = parse_number(&key, &value)?;
                }
                "CONNECTION_TIMEOUT_MS" => {
                    self.timeouts.connection_request_ms = parse_number(&key, &value)?;
                }
                "SIGNATURE_BACKEND" => self.crypto.signature_backend = value.parse()?,
                "NETWORK" => self.network.name = value,
                "BRANCH" => self.network.default_branch = value,
                "EPOCH" => self.network.epoch = parse_number(&key, &value)?,
                "STORAGE_PATH" => {
                    self.storage.backend = StorageBackend::Filesystem;
                    self.storage.path = Some(PathBuf::from(value));
                }
                "LOG_LEVEL" => self.logging.level = value,
                _ => {}
            }
        }
        Ok(())
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.capability.default_ttl_seconds == 0 {
            return Err(WardenError::validation("default_ttl_seconds must be positive"));
        }
        if self.capability.default_ttl_seconds > self.capability.max_ttl_seconds {
            return Err(WardenError::validation(
                "default_ttl_seconds must not exceed max_ttl_seconds",
            ));
        }
        if self.capability.max_ttl_seconds.checked_mul(1_000).is_none() {
            return Err(WardenError::validation(
                "max_ttl_seconds does not fit in milliseconds",
            ));
        }
        if self.timeouts.capability_request_ms == 0 || self.timeouts.connection_request_ms == 0 {
            return Err(WardenError::validation("approval timeouts must be positive"));
        }
        if self.network.default_branch.is_empty() {
            return Err(WardenError::validation("default_branch must not be empty"));
        }
        if self.storage.backend == StorageBackend::Filesystem && self.storage.path.is_none() {
            return Err(WardenError::validation(
                "filesystem storage requires storage.path",
            ));
        }
        Ok(())
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| WardenError::validation(format!("{key} must be an unsigned integer")))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(WardenError::validation(format!("{key} must be a boolean"))),
    }
}
