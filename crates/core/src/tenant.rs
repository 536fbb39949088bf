//! Tenant identity.
//!
//! Every deployment serves several independent events ("activities") from a
//! single backend. A [`Tenant`] names one of them and is threaded explicitly
//! through every operation that touches tenant-scoped state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an event whose data is isolated from every other event.
///
/// The empty tenant is valid and means "no namespacing".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tenant(String);

impl Tenant {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into().trim().to_string())
    }

    /// The unnamed tenant; keys are stored without a prefix.
    pub fn none() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Prefix `key` with this tenant, or return it unchanged for the empty tenant.
    pub fn namespace(&self, key: &str) -> String {
        if self.0.is_empty() {
            key.to_string()
        } else {
            format!("{}:{}", self.0, key)
        }
    }
}

impl fmt::Display for Tenant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "<none>")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl From<&str> for Tenant {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_prefixes_key() {
        let tenant = Tenant::new("expo-2024");
        assert_eq!(tenant.namespace("task:No.1001"), "expo-2024:task:No.1001");
    }

    #[test]
    fn test_empty_tenant_leaves_key_unchanged() {
        assert_eq!(Tenant::none().namespace("task:No.1001"), "task:No.1001");
        assert_eq!(Tenant::new("   ").namespace("k"), "k");
    }

    #[test]
    fn test_display() {
        assert_eq!(Tenant::new("a").to_string(), "a");
        assert_eq!(Tenant::none().to_string(), "<none>");
    }
}
