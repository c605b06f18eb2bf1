//! Unified error system for Warden
//!
//! One error type covers the protocol taxonomy (validation, scope, signature,
//! lifecycle, origin/branch/epoch binding, nonces, domain separation, user
//! interaction) plus the infrastructure failures handlers can raise. Every
//! variant maps to a stable [`ErrorCode`] that crosses the wire.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error type for all Warden operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum WardenError {
    /// Malformed input or a request that cannot be satisfied as stated
    #[error("Validation failed: {message}")]
    Validation {
        /// What was wrong with the input
        message: String,
    },

    /// Capability lookup or lifecycle failure
    #[error("Capability error: {message}")]
    Capability {
        /// Description of the failure
        message: String,
    },

    /// Method or scope not covered by the capability
    #[error("Scope violation: {message}")]
    ScopeViolation {
        /// Description of the violation
        message: String,
    },

    /// Signature missing, malformed or not valid for the wallet key
    #[error("Signature invalid: {message}")]
    SignatureInvalid {
        /// Description of the failure
        message: String,
    },

    /// Capability is past its expiry
    #[error("Capability expired: {capability_id}")]
    CapabilityExpired {
        /// Identifier of the expired capability
        capability_id: String,
    },

    /// Capability has been revoked
    #[error("Capability revoked: {capability_id}")]
    CapabilityRevoked {
        /// Identifier of the revoked capability
        capability_id: String,
    },

    /// Invocation origin does not match the capability binding
    #[error("Origin mismatch: expected {expected}, got {actual}")]
    OriginMismatch {
        /// Origin the capability is bound to
        expected: String,
        /// Origin presented by the caller
        actual: String,
    },

    /// Invocation branch does not match the capability
    #[error("Branch mismatch: expected {expected}, got {actual}")]
    BranchMismatch {
        /// Branch the capability is bound to
        expected: String,
        /// Branch carried by the invocation
        actual: String,
    },

    /// Invocation epoch does not match the capability
    #[error("Epoch mismatch: expected {expected}, got {actual}")]
    EpochMismatch {
        /// Epoch the capability is bound to
        expected: u64,
        /// Epoch carried by the invocation
        actual: u64,
    },

    /// Replayed, skipped or rolled-back nonce
    #[error("Nonce violation: expected {expected}, got {actual}")]
    NonceViolation {
        /// Nonce the manager would accept
        expected: u64,
        /// Nonce that was presented
        actual: u64,
    },

    /// Digest consumed under a different domain than it was produced for
    #[error("Domain separation violated: expected {expected}, got {actual}")]
    DomainSeparation {
        /// Domain the consumer required
        expected: String,
        /// Domain the digest was produced under
        actual: String,
    },

    /// User declined an approval prompt
    #[error("User rejected request: {message}")]
    UserRejected {
        /// Reason supplied by the approver, if any
        message: String,
    },

    /// Pending request exceeded its deadline
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout {
        /// Deadline that elapsed
        timeout_ms: u64,
    },

    /// No wallet is available to service the request
    #[error("Wallet not installed")]
    NotInstalled,

    /// Caller has no live session with the wallet
    #[error("Not connected: {message}")]
    NotConnected {
        /// Description of the missing session
        message: String,
    },

    /// Cryptographic primitive failed
    #[error("Crypto error: {message}")]
    Crypto {
        /// Error message describing the cryptographic failure
        message: String,
    },

    /// Storage operation failed
    #[error("Storage error: {message}")]
    Storage {
        /// Error message describing the storage failure
        message: String,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message describing the serialization failure
        message: String,
    },

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// Error message describing the internal error
        message: String,
    },
}

impl WardenError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a capability error
    pub fn capability(message: impl Into<String>) -> Self {
        Self::Capability {
            message: message.into(),
        }
    }

    /// Create a scope violation error
    pub fn scope_violation(message: impl Into<String>) -> Self {
        Self::ScopeViolation {
            message: message.into(),
        }
    }

    /// Create a signature error
    pub fn signature_invalid(message: impl Into<String>) -> Self {
        Self::SignatureInvalid {
            message: message.into(),
        }
    }

    /// Create an expired-capability error
    pub fn expired(capability_id: impl fmt::Display) -> Self {
        Self::CapabilityExpired {
            capability_id: capability_id.to_string(),
        }
    }

    /// Create a revoked-capability error
    pub fn revoked(capability_id: impl fmt::Display) -> Self {
        Self::CapabilityRevoked {
            capability_id: capability_id.to_string(),
        }
    }

    /// Create a user rejection error
    pub fn user_rejected(message: impl Into<String>) -> Self {
        Self::UserRejected {
            message: message.into(),
        }
    }

    /// Create a not-connected error
    pub fn not_connected(message: impl Into<String>) -> Self {
        Self::NotConnected {
            message: message.into(),
        }
    }

    /// Create a crypto error
    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Crypto {
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Stable code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { .. } => ErrorCode::Validation,
            Self::Capability { .. } => ErrorCode::Capability,
            Self::ScopeViolation { .. } => ErrorCode::ScopeViolation,
            Self::SignatureInvalid { .. } => ErrorCode::SignatureInvalid,
            Self::CapabilityExpired { .. } => ErrorCode::CapabilityExpired,
            Self::CapabilityRevoked { .. } => ErrorCode::CapabilityRevoked,
            Self::OriginMismatch { .. } => ErrorCode::OriginMismatch,
            Self::BranchMismatch { .. } => ErrorCode::BranchMismatch,
            Self::EpochMismatch { .. } => ErrorCode::EpochMismatch,
            Self::NonceViolation { .. } => ErrorCode::NonceViolation,
            Self::DomainSeparation { .. } => ErrorCode::DomainSeparation,
            Self::UserRejected { .. } => ErrorCode::UserRejected,
            Self::Timeout { .. } => ErrorCode::Timeout,
            Self::NotInstalled => ErrorCode::NotInstalled,
            Self::NotConnected { .. } => ErrorCode::NotConnected,
            Self::Crypto { .. } => ErrorCode::Crypto,
            Self::Storage { .. } => ErrorCode::Storage,
            Self::Serialization { .. } => ErrorCode::Serialization,
            Self::Internal { .. } => ErrorCode::Internal,
        }
    }

    /// Message with the error code prepended, as sent across the boundary
    pub fn to_wire_string(&self) -> String {
        format!("[{}] {}", self.code(), self)
    }
}

/// Stable, wire-visible error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// See [`WardenError::Validation`]
    #[serde(rename = "VALIDATION_ERROR")]
    Validation,
    /// See [`WardenError::Capability`]
    #[serde(rename = "CAPABILITY_ERROR")]
    Capability,
    /// See [`WardenError::ScopeViolation`]
    ScopeViolation,
    /// See [`WardenError::SignatureInvalid`]
    SignatureInvalid,
    /// See [`WardenError::CapabilityExpired`]
    CapabilityExpired,
    /// See [`WardenError::CapabilityRevoked`]
    CapabilityRevoked,
    /// See [`WardenError::OriginMismatch`]
    OriginMismatch,
    /// See [`WardenError::BranchMismatch`]
    BranchMismatch,
    /// See [`WardenError::EpochMismatch`]
    EpochMismatch,
    /// See [`WardenError::NonceViolation`]
    NonceViolation,
    /// See [`WardenError::DomainSeparation`]
    DomainSeparation,
    /// See [`WardenError::UserRejected`]
    UserRejected,
    /// See [`WardenError::Timeout`]
    Timeout,
    /// See [`WardenError::NotInstalled`]
    NotInstalled,
    /// See [`WardenError::NotConnected`]
    NotConnected,
    /// See [`WardenError::Crypto`]
    #[serde(rename = "CRYPTO_ERROR")]
    Crypto,
    /// See [`WardenError::Storage`]
    #[serde(rename = "STORAGE_ERROR")]
    Storage,
    /// See [`WardenError::Serialization`]
    #[serde(rename = "SERIALIZATION_ERROR")]
    Serialization,
    /// See [`WardenError::Internal`]
    #[serde(rename = "INTERNAL_ERROR")]
    Internal,
}

impl ErrorCode {
    /// Code as it appears on the wire
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION_ERROR",
            Self::Capability => "CAPABILITY_ERROR",
            Self::ScopeViolation => "SCOPE_VIOLATION",
            Self::SignatureInvalid => "SIGNATURE_INVALID",
            Self::CapabilityExpired => "CAPABILITY_EXPIRED",
            Self::CapabilityRevoked => "CAPABILITY_REVOKED",
            Self::OriginMismatch => "ORIGIN_MISMATCH",
            Self::BranchMismatch => "BRANCH_MISMATCH",
            Self::EpochMismatch => "EPOCH_MISMATCH",
            Self::NonceViolation => "NONCE_VIOLATION",
            Self::DomainSeparation => "DOMAIN_SEPARATION",
            Self::UserRejected => "USER_REJECTED",
            Self::Timeout => "TIMEOUT",
            Self::NotInstalled => "NOT_INSTALLED",
            Self::NotConnected => "NOT_CONNECTED",
            Self::Crypto => "CRYPTO_ERROR",
            Self::Storage => "STORAGE_ERROR",
            Self::Serialization => "SERIALIZATION_ERROR",
            Self::Internal => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Standard Result type for Warden operations
pub type Result<T> = std::result::Result<T, WardenError>;

impl From<serde_json::Error> for WardenError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<std::io::Error> for WardenError {
    fn from(err: std::io::Error) -> Self {
        Self::storage(err.to_string())
    }
}
