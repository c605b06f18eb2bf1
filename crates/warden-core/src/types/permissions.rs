//! Coarse per-origin permissions

use crate::types::TimestampMs;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wallet-level permission an origin can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletCapability {
    /// See the wallet address
    ViewAddress,
    /// See balances
    ViewBalance,
    /// Request message signatures
    SignMessage,
    /// Request transactions
    SendTransaction,
    /// Request capabilities and invoke circle methods
    InvokeCircle,
}

impl fmt::Display for WalletCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ViewAddress => "view_address",
            Self::ViewBalance => "view_balance",
            Self::SignMessage => "sign_message",
            Self::SendTransaction => "send_transaction",
            Self::InvokeCircle => "invoke_circle",
        };
        f.write_str(name)
    }
}

/// Permissions granted to one origin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantedCapabilities {
    /// Origin the grant belongs to
    pub origin: String,
    /// Display name supplied by the application
    pub app_name: String,
    /// Icon URL supplied by the application
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_icon: Option<String>,
    /// Granted permissions, sorted and unique
    pub capabilities: Vec<WalletCapability>,
    /// Approval time (ms)
    pub granted_at: TimestampMs,
    /// Expiry (ms), if the grant is time-limited
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<TimestampMs>,
    /// Last time the origin used the grant (ms)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<TimestampMs>,
    /// Time of the last write (ms)
    pub last_updated: TimestampMs,
}

impl GrantedCapabilities {
    /// Whether the grant has lapsed at `now`
    pub fn is_expired_at(&self, now: TimestampMs) -> bool {
        self.expires_at.is_some_and(|expiry| now >= expiry)
    }

    /// Whether `capability` is granted
    pub fn has(&self, capability: WalletCapability) -> bool {
        self.capabilities.contains(&capability)
    }
}
