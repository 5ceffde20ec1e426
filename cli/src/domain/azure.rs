//! Values returned by the cloud API wrapper.

use serde::Deserialize;

/// The subscription a context deploys into.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub name: String,
    #[serde(rename = "tenantId")]
    pub tenant_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResourceGroup {
    pub name: String,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ManagedIdentity {
    pub name: String,
    #[serde(rename = "principalId")]
    pub principal_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StorageAccount {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KeyVault {
    pub name: String,
}

/// A key vault key. `kid` is the full versioned identifier URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyVaultKey {
    pub name: String,
    pub kid: String,
}

impl KeyVaultKey {
    /// Last path segment of the key identifier.
    #[must_use]
    pub fn version(&self) -> &str {
        self.kid.rsplit('/').next().unwrap_or_default()
    }
}
