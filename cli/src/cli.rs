//! CLI argument parsing with clap derive

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::{AppContext, AppFlags, BehaviourFlags, OutputFlags};
use crate::commands;

/// Deploy and manage Data Safe Haven research environments on Azure
#[derive(Parser)]
#[command(
    name = "dsh",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Forward engine debug output and log at debug level
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(
        long,
        global = true,
        env = "NO_COLOR",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    pub no_color: bool,

    /// Answer every confirmation with its default
    #[arg(short, long, global = true)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Manage deployment contexts
    #[command(subcommand)]
    Context(commands::context::ContextCommand),

    /// Manage SHM and SRE configuration documents
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),

    /// Deploy an SHM or SRE
    #[command(subcommand)]
    Deploy(commands::deploy::DeployCommand),

    /// Tear down an SHM or SRE
    #[command(subcommand)]
    Teardown(commands::teardown::TeardownCommand),

    /// Run engine commands against a deployed stack
    #[command(subcommand)]
    Pulumi(commands::pulumi::PulumiCommand),
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn run(self) -> Result<ExitCode> {
        let Cli {
            verbose,
            quiet,
            no_color,
            yes,
            command,
        } = self;
        let app = AppContext::new(&AppFlags {
            output: OutputFlags {
                no_color,
                quiet,
                verbose,
            },
            behaviour: BehaviourFlags { yes },
        });
        match command {
            Command::Context(cmd) => commands::context::run(&app, cmd).await,
            Command::Config(cmd) => commands::config::run(&app, cmd).await,
            Command::Deploy(cmd) => commands::deploy::run(&app, cmd).await,
            Command::Teardown(cmd) => commands::teardown::run(&app, cmd).await,
            Command::Pulumi(cmd) => commands::pulumi::run(&app, cmd).await,
        }
    }
}
