//! Capability scopes and method requirements
//!
//! Scopes are totally ordered: `read < write < compute`. A capability with
//! scope `s` may call any method whose required scope is at most `s`.

use crate::errors::{Result, WardenError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Permission level granted by a capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Query state without side effects
    Read,
    /// Mutate state
    Write,
    /// Run arbitrary computation
    Compute,
}

impl Scope {
    /// Wire name
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Compute => "compute",
        }
    }

    /// Whether this scope covers `required`
    pub fn permits(&self, required: Scope) -> bool {
        *self >= required
    }
}

impl FromStr for Scope {
    type Err = WardenError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            "compute" => Ok(Self::Compute),
            other => Err(WardenError::validation(format!(
                "unknown scope {other:?}, expected read, write or compute"
            ))),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scope each method requires; unlisted methods need [`Scope::Compute`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodPolicy {
    required: BTreeMap<String, Scope>,
}

impl MethodPolicy {
    /// Policy with no listed methods
    pub fn empty() -> Self {
        Self {
            required: BTreeMap::new(),
        }
    }

    /// Add or replace a method requirement
    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>, scope: Scope) -> Self {
        self.required.insert(method.into(), scope);
        self
    }

    /// Scope required to call `method`
    pub fn required_scope(&self, method: &str) -> Scope {
        self.required.get(method).copied().unwrap_or(Scope::Compute)
    }
}

impl Default for MethodPolicy {
    fn default() -> Self {
        Self::empty()
            .with_method("get_address", Scope::Read)
            .with_method("get_balance", Scope::Read)
            .with_method("get_nonce", Scope::Read)
            .with_method("get_history", Scope::Read)
            .with_method("sign_message", Scope::Write)
            .with_method("send_transaction", Scope::Write)
            .with_method("call_contract", Scope::Write)
            .with_method("compute", Scope::Compute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering() {
        assert!(Scope::Compute.permits(Scope::Read));
        assert!(Scope::Write.permits(Scope::Write));
        assert!(!Scope::Read.permits(Scope::Write));
    }

    #[test]
    fn parsing() {
        assert_eq!("write".parse::<Scope>().unwrap(), Scope::Write);
        assert!("admin".parse::<Scope>().is_err());
        assert_eq!(serde_json::to_string(&Scope::Compute).unwrap(), "\"compute\"");
    }

    #[test]
    fn unknown_methods_require_compute() {
        let policy = MethodPolicy::default();
        assert_eq!(policy.required_scope("get_balance"), Scope::Read);
        assert_eq!(policy.required_scope("mystery"), Scope::Compute);
    }
}
