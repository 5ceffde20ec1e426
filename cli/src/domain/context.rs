//! Local deployment contexts and the backend resource names they derive.

use std::collections::BTreeMap;

use dsh_common::naming::{alphanumeric, replace_separators, truncate_tokens};
use dsh_common::{AzureLocation, Guid};
use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;

/// Blob container holding configuration documents.
pub const CONFIG_CONTAINER: &str = "config";
/// Blob container used as the Pulumi state backend.
pub const PULUMI_CONTAINER: &str = "pulumi";
/// Name of the key vault key used by the Pulumi secrets provider.
pub const PULUMI_ENCRYPTION_KEY: &str = "pulumi-encryption-key";

/// A named Azure subscription plus admin group hosting one SHM and its SREs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Context {
    pub admin_group_id: Guid,
    pub description: String,
    pub name: String,
    pub subscription_name: String,
    pub location: AzureLocation,
    #[serde(skip)]
    key: String,
}

impl Context {
    #[must_use]
    pub fn new(
        key: &str,
        name: &str,
        admin_group_id: Guid,
        subscription_name: &str,
        location: AzureLocation,
    ) -> Self {
        Self {
            admin_group_id,
            description: name.to_string(),
            name: name.to_string(),
            subscription_name: subscription_name.to_string(),
            location,
            key: key.to_string(),
        }
    }

    /// Key under which this context is stored.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn resource_group_name(&self) -> String {
        format!("shm-{}-rg", self.key)
    }

    #[must_use]
    pub fn storage_account_name(&self) -> String {
        let alnum = alphanumeric(&self.key).to_lowercase();
        truncate_tokens(&["shm", &alnum, "context"], 24).concat()
    }

    #[must_use]
    pub fn key_vault_name(&self) -> String {
        let alnum = alphanumeric(&self.key).to_lowercase();
        truncate_tokens(&["shm", &alnum, "context"], 22).join("-")
    }

    #[must_use]
    pub fn managed_identity_name(&self) -> String {
        format!("shm-{}-identity-reader-context", self.key)
    }

    /// Backend URL for Pulumi state, relative to the storage account in the
    /// environment.
    #[must_use]
    pub fn pulumi_backend_url(&self) -> String {
        format!("azblob://{PULUMI_CONTAINER}")
    }

    #[must_use]
    pub fn pulumi_secrets_provider_url(&self) -> String {
        format!(
            "azurekeyvault://{}.vault.azure.net/keys/{PULUMI_ENCRYPTION_KEY}",
            self.key_vault_name()
        )
    }

    #[must_use]
    pub fn tags(&self) -> Vec<(String, String)> {
        vec![
            ("component".to_string(), "context".to_string()),
            ("deployment".to_string(), self.name.clone()),
            ("deployed by".to_string(), "Data Safe Haven".to_string()),
            ("project".to_string(), "Data Safe Haven".to_string()),
        ]
    }

    #[must_use]
    pub fn config_blobs(&self) -> BlobLocation {
        self.blob_location(CONFIG_CONTAINER)
    }

    #[must_use]
    pub fn pulumi_blobs(&self) -> BlobLocation {
        self.blob_location(PULUMI_CONTAINER)
    }

    fn blob_location(&self, container: &str) -> BlobLocation {
        BlobLocation {
            resource_group: self.resource_group_name(),
            storage_account: self.storage_account_name(),
            container: container.to_string(),
        }
    }
}

/// Where a group of blobs lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobLocation {
    pub resource_group: String,
    pub storage_account: String,
    pub container: String,
}

/// Fields that `context update` may change.
#[derive(Debug, Default)]
pub struct ContextUpdate {
    pub admin_group_id: Option<Guid>,
    pub name: Option<String>,
    pub subscription_name: Option<String>,
    pub location: Option<AzureLocation>,
}

/// The local `contexts.yaml` file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContextSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected: Option<String>,
    #[serde(default)]
    pub contexts: BTreeMap<String, Context>,
}

impl ContextSettings {
    pub const FILENAME: &'static str = "contexts.yaml";

    /// Derive the storage key for a human-readable context name.
    #[must_use]
    pub fn key_for(name: &str) -> String {
        replace_separators(name, "").to_lowercase()
    }

    /// Restore the skipped `key` field after deserialising.
    pub fn attach_keys(&mut self) {
        for (key, context) in &mut self.contexts {
            context.key.clone_from(key);
        }
    }

    #[must_use]
    pub fn available(&self) -> Vec<&str> {
        self.contexts.keys().map(String::as_str).collect()
    }

    /// The selected context.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoContextSelected`] if nothing is selected, or
    /// [`ConfigError::UnknownContext`] if the selection is stale.
    pub fn assert_context(&self) -> Result<&Context, ConfigError> {
        let key = self.selected.as_deref().ok_or(ConfigError::NoContextSelected)?;
        self.contexts
            .get(key)
            .ok_or_else(|| ConfigError::UnknownContext(key.to_string()))
    }

    /// Add a context and select it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ContextExists`] if the key is taken.
    pub fn add(&mut self, context: Context) -> Result<(), ConfigError> {
        let key = context.key.clone();
        if self.contexts.contains_key(&key) {
            return Err(ConfigError::ContextExists(key));
        }
        self.contexts.insert(key.clone(), context);
        self.selected = Some(key);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownContext`] if `key` is not defined.
    pub fn switch(&mut self, key: &str) -> Result<(), ConfigError> {
        if !self.contexts.contains_key(key) {
            return Err(ConfigError::UnknownContext(key.to_string()));
        }
        self.selected = Some(key.to_string());
        Ok(())
    }

    /// Remove a context, clearing the selection if it was selected.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownContext`] if `key` is not defined.
    pub fn remove(&mut self, key: &str) -> Result<Context, ConfigError> {
        let removed = self
            .contexts
            .remove(key)
            .ok_or_else(|| ConfigError::UnknownContext(key.to_string()))?;
        if self.selected.as_deref() == Some(key) {
            self.selected = None;
        }
        Ok(removed)
    }

    /// Update the selected context.
    ///
    /// # Errors
    ///
    /// Fails as [`Self::assert_context`] does.
    pub fn update(&mut self, update: ContextUpdate) -> Result<&Context, ConfigError> {
        let key = self.selected.clone().ok_or(ConfigError::NoContextSelected)?;
        let context = self
            .contexts
            .get_mut(&key)
            .ok_or_else(|| ConfigError::UnknownContext(key.clone()))?;
        if let Some(id) = update.admin_group_id {
            context.admin_group_id = id;
        }
        if let Some(name) = update.name {
            context.description.clone_from(&name);
            context.name = name;
        }
        if let Some(subscription) = update.subscription_name {
            context.subscription_name = subscription;
        }
        if let Some(location) = update.location {
            context.location = location;
        }
        Ok(context)
    }
}
