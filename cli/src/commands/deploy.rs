//! `dsh deploy`: deploy the SHM or an SRE of the selected context.

use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Subcommand};
use dsh_common::{
    AzureLocation, AzureVmSku, DatabaseSystem, EmailAddress, Fqdn, Guid, IpAddress,
    SoftwarePackageCategory, TimeZone,
};

use crate::app::AppContext;
use crate::application::ports::BlobStorage;
use crate::application::services::{deploy, document};
use crate::domain::config::{Document, ShmConfig, ShmOverrides, SreConfig, SreOverrides, sre_config_name};
use crate::domain::context::Context;
use crate::output::TerminalReporter;

/// Deploy subcommands.
#[derive(Subcommand)]
pub enum DeployCommand {
    /// Deploy the Safe Haven Management environment
    Shm(ShmArgs),
    /// Deploy a Secure Research Environment
    Sre(SreArgs),
}

#[derive(Args)]
pub struct ShmArgs {
    /// Tenant ID of the Entra ID used to manage users
    #[arg(long)]
    pub entra_tenant_id: Option<Guid>,
    /// Domain name users will belong to
    #[arg(long)]
    pub fqdn: Option<Fqdn>,
    /// Azure location to deploy into
    #[arg(long)]
    pub location: Option<AzureLocation>,
    /// Cancel any in-progress operation on the stack first
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct SreArgs {
    /// Name of the SRE to deploy
    pub name: String,
    /// Email address shared by all administrators
    #[arg(long)]
    pub admin_email: Option<EmailAddress>,
    /// IP address or CIDR range used by administrators (repeatable)
    #[arg(long = "admin-ip")]
    pub admin_ips: Vec<IpAddress>,
    /// Allow copying text out of the environment
    #[arg(long)]
    pub allow_copy: bool,
    /// Allow pasting text into the environment
    #[arg(long)]
    pub allow_paste: bool,
    /// IP address or CIDR range used by data providers (repeatable)
    #[arg(long = "data-provider-ip")]
    pub data_provider_ips: Vec<IpAddress>,
    /// IP address or CIDR range used by research users (repeatable)
    #[arg(long = "user-ip")]
    pub user_ips: Vec<IpAddress>,
    /// Azure VM SKU for secure research desktops (repeatable)
    #[arg(long = "workspace-sku")]
    pub workspace_skus: Vec<AzureVmSku>,
    /// Database system to offer to users (repeatable)
    #[arg(long = "database", value_enum)]
    pub databases: Vec<DatabaseSystem>,
    /// Which packages users may install from external repositories
    #[arg(long, value_enum)]
    pub software_packages: Option<SoftwarePackageCategory>,
    /// Timezone used by the environment
    #[arg(long)]
    pub timezone: Option<TimeZone>,
    /// Cancel any in-progress operation on the stack first
    #[arg(long)]
    pub force: bool,
}

/// Run the deploy command.
///
/// # Errors
///
/// Returns an error if no context is selected, the configuration cannot be
/// loaded or uploaded, or the deployment fails.
pub async fn run(app: &AppContext, cmd: DeployCommand) -> Result<ExitCode> {
    match cmd {
        DeployCommand::Shm(args) => shm(app, args).await,
        DeployCommand::Sre(args) => sre(app, args).await,
    }
}

async fn shm(app: &AppContext, args: ShmArgs) -> Result<ExitCode> {
    let context = app.selected_context()?;
    let blobs = app.azure(&context);
    let mut config: ShmConfig = document::load_remote(&blobs, &context, ShmConfig::FILENAME).await?;
    let original = config.clone();
    let summary = config.update(ShmOverrides {
        entra_tenant_id: args.entra_tenant_id,
        fqdn: args.fqdn,
        location: args.location,
    });
    for (label, value) in &summary {
        app.output.setting(label, value);
    }
    upload_if_changed(app, &blobs, &context, &original, &config).await?;

    let engine = app.pulumi()?;
    let reporter = TerminalReporter::new(&app.output);
    deploy::deploy_shm(
        &engine,
        &blobs,
        &context,
        &config,
        &app.manager_settings()?,
        args.force,
        &reporter,
    )
    .await?;
    Ok(ExitCode::SUCCESS)
}

async fn sre(app: &AppContext, args: SreArgs) -> Result<ExitCode> {
    let context = app.selected_context()?;
    let blobs = app.azure(&context);
    let mut config: SreConfig =
        document::load_remote(&blobs, &context, &sre_config_name(&args.name)).await?;
    let original = config.clone();
    let (summary, dropped) = config.update(SreOverrides {
        admin_email_address: args.admin_email,
        admin_ip_addresses: args.admin_ips,
        allow_copy: args.allow_copy,
        allow_paste: args.allow_paste,
        data_provider_ip_addresses: args.data_provider_ips,
        databases: args.databases,
        research_user_ip_addresses: args.user_ips,
        software_packages: args.software_packages,
        timezone: args.timezone,
        workspace_skus: args.workspace_skus,
    });
    if dropped {
        app.output.warn("Duplicate databases were removed.");
    }
    for (label, value) in &summary {
        app.output.setting(label, value);
    }
    upload_if_changed(app, &blobs, &context, &original, &config).await?;

    let engine = app.pulumi()?;
    let reporter = TerminalReporter::new(&app.output);
    deploy::deploy_sre(
        &engine,
        &blobs,
        &context,
        &config,
        &app.manager_settings()?,
        args.force,
        &reporter,
    )
    .await?;
    Ok(ExitCode::SUCCESS)
}

async fn upload_if_changed<D: Document + PartialEq>(
    app: &AppContext,
    blobs: &impl BlobStorage,
    context: &Context,
    original: &D,
    updated: &D,
) -> Result<()> {
    if original == updated {
        return Ok(());
    }
    app.output.info(&format!("Uploading updated {} configuration.", D::KIND));
    document::upload(blobs, context, updated).await
}
