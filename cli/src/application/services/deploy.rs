//! Application service: deploy and tear down SHM and SRE stacks.
//!
//! Imports only from `crate::domain` and `crate::application`. The
//! `pulumi.yaml` record is uploaded after every deployment, successful or
//! not, so an encryption key learnt from a fresh stack is never lost.

use anyhow::{Context as _, Result};
use dsh_common::naming::password;
use tracing::info;

use crate::application::ports::{AutomationEngine, BlobStorage, ProgressReporter};
use crate::application::services::document;
use crate::application::services::project_manager::{ManagerSettings, ProjectManager, ProjectTarget};
use crate::domain::config::{ShmConfig, SreConfig};
use crate::domain::context::Context;
use crate::domain::pulumi::PulumiConfig;

/// Secret shared between the SHM and its SREs for directory lookups.
pub const LDAP_SEARCH_PASSWORD: &str = "shm-ldap-search-password";

/// Database administrator passwords generated once per SRE.
pub const SRE_GENERATED_SECRETS: &[&str] = &[
    "password-database-admin",
    "password-gitea-database-admin",
    "password-hedgedoc-database-admin",
];

/// Public SHM options an SRE reads from the SHM stack.
pub const SHM_COPIED_OPTIONS: &[&str] = &["shm-admin-group-id", "shm-entra-tenant-id", "shm-fqdn"];

const GENERATED_PASSWORD_LENGTH: usize = 20;

/// Environment the engine needs to reach the context's state backend.
///
/// # Errors
///
/// Fails if the storage account key cannot be read.
pub async fn pulumi_account_env(
    blobs: &impl BlobStorage,
    context: &Context,
) -> Result<Vec<(String, String)>> {
    let location = context.pulumi_blobs();
    let key = blobs
        .storage_account_key(&location)
        .await
        .context("Could not read storage account key.")?;
    Ok(vec![
        ("AZURE_STORAGE_ACCOUNT".to_string(), location.storage_account),
        ("AZURE_STORAGE_KEY".to_string(), key),
        ("AZURE_KEYVAULT_AUTH_VIA_CLI".to_string(), "true".to_string()),
    ])
}

/// Load `pulumi.yaml`, or start an empty record if there is none yet.
///
/// # Errors
///
/// Fails if the record exists but cannot be read.
pub async fn load_pulumi_config(blobs: &impl BlobStorage, context: &Context) -> Result<PulumiConfig> {
    Ok(document::load_remote_or_none(blobs, context, PulumiConfig::FILENAME)
        .await?
        .unwrap_or_default())
}

async fn with_account_env(
    blobs: &impl BlobStorage,
    context: &Context,
    settings: &ManagerSettings,
) -> Result<ManagerSettings> {
    let mut settings = settings.clone();
    settings.env = pulumi_account_env(blobs, context).await?;
    Ok(settings)
}

/// Options set on the SHM stack.
#[must_use]
pub fn shm_options(config: &ShmConfig) -> Vec<(&'static str, String)> {
    vec![
        ("azure-native:location", config.azure.location.to_string()),
        ("azure-native:subscriptionId", config.azure.subscription_id.to_string()),
        ("azure-native:tenantId", config.azure.tenant_id.to_string()),
        ("shm-admin-group-id", config.shm.admin_group_id.to_string()),
        ("shm-entra-tenant-id", config.shm.entra_tenant_id.to_string()),
        ("shm-fqdn", config.shm.fqdn.to_string()),
    ]
}

/// Options set on an SRE stack. List values are JSON arrays.
///
/// # Errors
///
/// Fails if a list cannot be encoded.
pub fn sre_options(config: &SreConfig) -> Result<Vec<(&'static str, String)>> {
    let sre = &config.sre;
    Ok(vec![
        ("azure-native:location", config.azure.location.to_string()),
        ("azure-native:subscriptionId", config.azure.subscription_id.to_string()),
        ("azure-native:tenantId", config.azure.tenant_id.to_string()),
        ("sre-admin-email-address", sre.admin_email_address.to_string()),
        ("sre-admin-ip-addresses", serde_json::to_string(&sre.admin_ip_addresses)?),
        ("sre-databases", serde_json::to_string(&sre.databases)?),
        (
            "sre-data-provider-ip-addresses",
            serde_json::to_string(&sre.data_provider_ip_addresses)?,
        ),
        ("sre-remote-desktop-allow-copy", sre.remote_desktop.allow_copy.to_string()),
        ("sre-remote-desktop-allow-paste", sre.remote_desktop.allow_paste.to_string()),
        (
            "sre-research-user-ip-addresses",
            serde_json::to_string(&sre.research_user_ip_addresses)?,
        ),
        ("sre-software-packages", sre.software_packages.to_string()),
        ("sre-timezone", sre.timezone.to_string()),
        ("sre-workspace-skus", serde_json::to_string(&sre.workspace_skus)?),
    ])
}

/// Deploy the SHM stack for `context`.
///
/// # Errors
///
/// Fails if the deployment fails or the record cannot be uploaded.
pub async fn deploy_shm(
    engine: &impl AutomationEngine,
    blobs: &impl BlobStorage,
    context: &Context,
    config: &ShmConfig,
    settings: &ManagerSettings,
    force: bool,
    reporter: &impl ProgressReporter,
) -> Result<()> {
    let record = load_pulumi_config(blobs, context).await?;
    let settings = with_account_env(blobs, context, settings).await?;
    let mut manager =
        ProjectManager::new(engine, blobs, context, record, ProjectTarget::shm(), settings, true)?;

    for (name, value) in shm_options(config) {
        manager.add_option(name, &value, true);
    }
    manager.add_secret(LDAP_SEARCH_PASSWORD, &password(GENERATED_PASSWORD_LENGTH), false);

    reporter.step("deploying SHM...");
    let result = manager.deploy(force).await;
    upload_record(blobs, context, &manager.into_pulumi_config()).await?;
    result?;
    reporter.success("SHM deployed");
    Ok(())
}

/// Deploy the SRE described by `config`. The SHM must already be deployed.
///
/// # Errors
///
/// Fails if the SHM is not defined, a shared value cannot be read from the
/// SHM stack, the deployment fails, or the record cannot be uploaded.
pub async fn deploy_sre(
    engine: &impl AutomationEngine,
    blobs: &impl BlobStorage,
    context: &Context,
    config: &SreConfig,
    settings: &ManagerSettings,
    force: bool,
    reporter: &impl ProgressReporter,
) -> Result<()> {
    let record = load_pulumi_config(blobs, context).await?;
    let settings = with_account_env(blobs, context, settings).await?;
    let mut shm_manager = ProjectManager::new(
        engine,
        blobs,
        context,
        record.clone(),
        ProjectTarget::shm(),
        settings.clone(),
        false,
    )?;
    let target = ProjectTarget::sre(config.name.as_str());
    let mut manager = ProjectManager::new(engine, blobs, context, record, target, settings, true)?;

    for (name, value) in sre_options(config)? {
        manager.add_option(name, &value, true);
    }
    for name in SRE_GENERATED_SECRETS {
        manager.add_secret(name, &password(GENERATED_PASSWORD_LENGTH), false);
    }

    reporter.step(&format!("deploying SRE '{}'...", config.name));
    let result = async {
        for name in SHM_COPIED_OPTIONS {
            manager.copy_option(name, &mut shm_manager).await?;
        }
        manager.copy_secret(LDAP_SEARCH_PASSWORD, &mut shm_manager).await?;
        manager.deploy(force).await
    }
    .await;
    upload_record(blobs, context, &manager.into_pulumi_config()).await?;
    result?;
    reporter.success(&format!("SRE '{}' deployed", config.name));
    Ok(())
}

/// Tear down a deployed stack and drop it from the record.
///
/// # Errors
///
/// Fails if the project is not defined, teardown fails, or the record
/// cannot be uploaded.
pub async fn teardown(
    engine: &impl AutomationEngine,
    blobs: &impl BlobStorage,
    context: &Context,
    target: ProjectTarget,
    settings: &ManagerSettings,
    force: bool,
    reporter: &impl ProgressReporter,
) -> Result<()> {
    let record = load_pulumi_config(blobs, context).await?;
    let settings = with_account_env(blobs, context, settings).await?;
    let project = target.project.clone();
    let mut manager = ProjectManager::new(engine, blobs, context, record, target, settings, false)?;

    reporter.step(&format!("tearing down '{project}'..."));
    manager.teardown(force).await?;

    let mut record = manager.into_pulumi_config();
    record.remove(&project)?;
    upload_record(blobs, context, &record).await?;
    info!(project = %project, "removed project from Pulumi configuration");
    reporter.success(&format!("'{project}' torn down"));
    Ok(())
}

/// Run a non-interactive engine command against a deployed stack.
///
/// # Errors
///
/// Fails if the project is not defined or the command fails.
pub async fn run_command(
    engine: &impl AutomationEngine,
    blobs: &impl BlobStorage,
    context: &Context,
    target: ProjectTarget,
    settings: &ManagerSettings,
    command: &str,
) -> Result<String> {
    let record = load_pulumi_config(blobs, context).await?;
    let settings = with_account_env(blobs, context, settings).await?;
    let mut manager = ProjectManager::new(engine, blobs, context, record, target, settings, false)?;
    manager.run_pulumi_command(command).await
}

async fn upload_record(blobs: &impl BlobStorage, context: &Context, record: &PulumiConfig) -> Result<()> {
    document::upload(blobs, context, record)
        .await
        .context("Could not upload Pulumi configuration.")
}
