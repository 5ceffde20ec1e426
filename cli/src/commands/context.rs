//! `dsh context`: manage local deployment contexts and their backends.

use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Subcommand};
use dsh_common::{AzureLocation, Guid};

use crate::app::AppContext;
use crate::application::ports::ContextStore;
use crate::application::services::backend;
use crate::domain::context::{Context, ContextSettings, ContextUpdate};
use crate::output::TerminalReporter;

/// Context subcommands.
#[derive(Subcommand)]
pub enum ContextCommand {
    /// Add a new context and select it
    Add(AddArgs),
    /// List the available contexts
    Available,
    /// Create the backend resources of the selected context
    Create,
    /// Remove a context
    Remove {
        /// Key of the context to remove
        key: String,
    },
    /// Show the selected context
    Show,
    /// Switch the selected context
    Switch {
        /// Key of the context to select
        key: String,
    },
    /// Remove the backend resources of the selected context
    Teardown,
    /// Update the selected context
    Update(UpdateArgs),
}

#[derive(Args)]
pub struct AddArgs {
    /// Object ID of the group containing all infrastructure administrators
    #[arg(long)]
    pub admin_group: Guid,
    /// Azure location for the backend resources
    #[arg(long)]
    pub location: AzureLocation,
    /// Human-readable name; the key is derived from it
    #[arg(long)]
    pub name: String,
    /// Name of the Azure subscription to deploy into
    #[arg(long)]
    pub subscription: String,
}

#[derive(Args)]
pub struct UpdateArgs {
    #[arg(long)]
    pub admin_group: Option<Guid>,
    #[arg(long)]
    pub location: Option<AzureLocation>,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub subscription: Option<String>,
}

/// Run the context command.
///
/// # Errors
///
/// Returns an error if the contexts file cannot be read or written, the
/// requested context does not exist, or backend resources cannot be managed.
pub async fn run(app: &AppContext, cmd: ContextCommand) -> Result<ExitCode> {
    match cmd {
        ContextCommand::Add(args) => add(app, args),
        ContextCommand::Available => available(app),
        ContextCommand::Create => create(app).await,
        ContextCommand::Remove { key } => remove(app, &key),
        ContextCommand::Show => show(app),
        ContextCommand::Switch { key } => switch(app, &key),
        ContextCommand::Teardown => teardown(app).await,
        ContextCommand::Update(args) => update(app, args),
    }
}

fn add(app: &AppContext, args: AddArgs) -> Result<ExitCode> {
    let mut settings = app.contexts()?;
    let key = ContextSettings::key_for(&args.name);
    settings.add(Context::new(
        &key,
        &args.name,
        args.admin_group,
        &args.subscription,
        args.location,
    ))?;
    app.context_store.save(&settings)?;
    app.output.success(&format!("Added and selected context '{key}'"));
    Ok(ExitCode::SUCCESS)
}

fn available(app: &AppContext) -> Result<ExitCode> {
    let settings = app.contexts()?;
    let keys = settings.available();
    if keys.is_empty() {
        app.output.info("No contexts defined");
        return Ok(ExitCode::SUCCESS);
    }
    for key in keys {
        if settings.selected.as_deref() == Some(key) {
            println!("{key}*");
        } else {
            println!("{key}");
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn show(app: &AppContext) -> Result<ExitCode> {
    let settings = app.contexts()?;
    let context = settings.assert_context()?;
    app.output.header(&format!("Current context: {}", context.key()));
    app.output.kv("Name:", &context.name);
    app.output.kv("Admin group ID:", context.admin_group_id.as_str());
    app.output.kv("Subscription name:", &context.subscription_name);
    app.output.kv("Location:", context.location.as_str());
    Ok(ExitCode::SUCCESS)
}

fn switch(app: &AppContext, key: &str) -> Result<ExitCode> {
    let mut settings = app.contexts()?;
    settings.switch(key)?;
    app.context_store.save(&settings)?;
    app.output.success(&format!("Switched context to '{key}'"));
    Ok(ExitCode::SUCCESS)
}

fn update(app: &AppContext, args: UpdateArgs) -> Result<ExitCode> {
    let mut settings = app.contexts()?;
    let key = settings
        .update(ContextUpdate {
            admin_group_id: args.admin_group,
            name: args.name,
            subscription_name: args.subscription,
            location: args.location,
        })?
        .key()
        .to_string();
    app.context_store.save(&settings)?;
    app.output.success(&format!("Updated context '{key}'"));
    Ok(ExitCode::SUCCESS)
}

fn remove(app: &AppContext, key: &str) -> Result<ExitCode> {
    let mut settings = app.contexts()?;
    settings.remove(key)?;
    app.context_store.save(&settings)?;
    app.output.success(&format!("Removed context '{key}'"));
    Ok(ExitCode::SUCCESS)
}

async fn create(app: &AppContext) -> Result<ExitCode> {
    let context = app.selected_context()?;
    let cloud = app.azure(&context);
    let reporter = TerminalReporter::new(&app.output);
    let summary = backend::create(&cloud, &context, &reporter).await?;
    app.output.kv("Subscription ID:", &summary.subscription_id);
    app.output.kv("Tenant ID:", &summary.tenant_id);
    app.output.kv("Key vault:", &summary.key_vault);
    app.output.kv("Encryption key version:", &summary.encryption_key_version);
    Ok(ExitCode::SUCCESS)
}

async fn teardown(app: &AppContext) -> Result<ExitCode> {
    let context = app.selected_context()?;
    let prompt = format!(
        "Remove all backend resources of context '{}'? This cannot be undone.",
        context.key()
    );
    if !app.confirm(&prompt, true)? {
        app.output.info("Backend teardown cancelled");
        return Ok(ExitCode::SUCCESS);
    }
    let cloud = app.azure(&context);
    let reporter = TerminalReporter::new(&app.output);
    backend::teardown(&cloud, &context, &reporter).await?;
    Ok(ExitCode::SUCCESS)
}
