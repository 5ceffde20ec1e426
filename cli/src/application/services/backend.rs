//! Application service: create and remove a context's backend resources.

use anyhow::{Context as _, Result};
use tracing::info;

use crate::application::ports::{KeyVaultRequest, ProgressReporter, ResourceManager};
use crate::domain::context::{CONFIG_CONTAINER, Context, PULUMI_CONTAINER, PULUMI_ENCRYPTION_KEY};
use crate::domain::error::AzureError;

/// Identifiers learnt while creating the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSummary {
    pub subscription_id: String,
    pub tenant_id: String,
    pub key_vault: String,
    pub encryption_key_version: String,
}

/// Ensure every backend resource for `context` exists.
///
/// # Errors
///
/// Any failure is wrapped as "Failed to create backend resources.".
pub async fn create(
    cloud: &impl ResourceManager,
    context: &Context,
    reporter: &impl ProgressReporter,
) -> Result<BackendSummary> {
    create_resources(cloud, context, reporter)
        .await
        .context("Failed to create backend resources.")
}

async fn create_resources(
    cloud: &impl ResourceManager,
    context: &Context,
    reporter: &impl ProgressReporter,
) -> Result<BackendSummary> {
    let tags = context.tags();
    let subscription = cloud.subscription().await?;
    info!(subscription = %subscription.name, id = %subscription.id, "using subscription");

    reporter.step("ensuring resource group...");
    let group_name = context.resource_group_name();
    let group = cloud
        .ensure_resource_group(&group_name, context.location.as_str(), &tags)
        .await?;
    if group.name.is_empty() {
        return Err(AzureError::NotCreated {
            kind: "Resource group",
            name: group_name,
        }
        .into());
    }

    reporter.step("ensuring managed identity...");
    let identity = cloud
        .ensure_managed_identity(&context.managed_identity_name(), &group.name, &group.location)
        .await?;

    reporter.step("ensuring storage account...");
    let account_name = context.storage_account_name();
    let account = cloud
        .ensure_storage_account(&account_name, &group.name, &group.location, &tags)
        .await?;
    if account.name.is_empty() {
        return Err(AzureError::NotCreated {
            kind: "Storage account",
            name: account_name,
        }
        .into());
    }
    for container in [CONFIG_CONTAINER, PULUMI_CONTAINER] {
        cloud
            .ensure_storage_blob_container(container, &group.name, &account.name)
            .await?;
    }

    reporter.step("ensuring key vault...");
    let vault_name = context.key_vault_name();
    let vault = cloud
        .ensure_keyvault(
            &KeyVaultRequest {
                name: &vault_name,
                resource_group: &group.name,
                location: &group.location,
                admin_group_id: context.admin_group_id.as_str(),
                tags: &tags,
            },
            &identity,
        )
        .await?;
    if vault.name.is_empty() {
        return Err(AzureError::NotCreated {
            kind: "Keyvault",
            name: vault_name,
        }
        .into());
    }
    let key = cloud.ensure_keyvault_key(PULUMI_ENCRYPTION_KEY, &vault.name).await?;

    reporter.success("backend resources ready");
    Ok(BackendSummary {
        subscription_id: subscription.id,
        tenant_id: subscription.tenant_id,
        key_vault: vault.name,
        encryption_key_version: key.version().to_string(),
    })
}

/// Remove the context's resource group and everything in it.
///
/// # Errors
///
/// Any failure is wrapped as "Failed to destroy backend resources.".
pub async fn teardown(
    cloud: &impl ResourceManager,
    context: &Context,
    reporter: &impl ProgressReporter,
) -> Result<()> {
    reporter.step("removing backend resource group...");
    cloud
        .remove_resource_group(&context.resource_group_name())
        .await
        .context("Failed to destroy backend resources.")?;
    reporter.success("backend resources removed");
    Ok(())
}
