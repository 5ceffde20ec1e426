//! `dsh pulumi`: run engine commands against a deployed SRE stack.

use std::process::ExitCode;

use anyhow::Result;
use clap::Subcommand;

use crate::app::AppContext;
use crate::application::services::deploy;
use crate::application::services::project_manager::ProjectTarget;

/// Pulumi subcommands.
#[derive(Subcommand)]
pub enum PulumiCommand {
    /// Run a non-interactive engine command, e.g. "stack output"
    Run {
        /// Name of the SRE whose stack the command targets
        sre_name: String,
        /// Engine command and its arguments, as one string
        command: String,
    },
}

/// Run the pulumi command.
///
/// # Errors
///
/// Returns an error if no context is selected, the SRE is not deployed, or
/// the engine command fails.
pub async fn run(app: &AppContext, cmd: PulumiCommand) -> Result<ExitCode> {
    let PulumiCommand::Run { sre_name, command } = cmd;
    let context = app.selected_context()?;
    let blobs = app.azure(&context);
    let engine = app.pulumi()?;
    let stdout = deploy::run_command(
        &engine,
        &blobs,
        &context,
        ProjectTarget::sre(&sre_name),
        &app.manager_settings()?,
        &command,
    )
    .await?;
    app.output.document(&stdout);
    Ok(ExitCode::SUCCESS)
}
