//! `dsh teardown`: destroy the SHM or an SRE of the selected context.

use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::app::AppContext;
use crate::application::services::deploy;
use crate::application::services::project_manager::ProjectTarget;
use crate::output::TerminalReporter;

/// Teardown subcommands.
#[derive(Subcommand)]
pub enum TeardownCommand {
    /// Tear down the Safe Haven Management environment
    Shm(ForceArgs),
    /// Tear down a Secure Research Environment
    Sre {
        /// Name of the SRE to tear down
        name: String,
        #[command(flatten)]
        force: ForceArgs,
    },
}

#[derive(Args)]
pub struct ForceArgs {
    /// Cancel any in-progress operation on the stack first
    #[arg(long)]
    pub force: bool,
}

/// Run the teardown command.
///
/// # Errors
///
/// Returns an error if no context is selected, the project is not defined,
/// or the teardown fails.
pub async fn run(app: &AppContext, cmd: TeardownCommand) -> Result<ExitCode> {
    let (target, force) = match cmd {
        TeardownCommand::Shm(args) => (ProjectTarget::shm(), args.force),
        TeardownCommand::Sre { name, force } => (ProjectTarget::sre(&name), force.force),
    };
    let context = app.selected_context()?;
    let prompt = format!(
        "Destroy every resource in '{}'? This cannot be undone.",
        target.project
    );
    if !app.confirm(&prompt, true)? {
        app.output.info("Teardown cancelled");
        return Ok(ExitCode::SUCCESS);
    }
    let blobs = app.azure(&context);
    let engine = app.pulumi()?;
    let reporter = TerminalReporter::new(&app.output);
    deploy::teardown(
        &engine,
        &blobs,
        &context,
        target,
        &app.manager_settings()?,
        force,
        &reporter,
    )
    .await?;
    Ok(ExitCode::SUCCESS)
}
