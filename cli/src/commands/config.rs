//! `dsh config`: show, template and upload SHM/SRE configuration documents.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context as _, Result};
use clap::Subcommand;

use crate::app::AppContext;
use crate::application::services::document;
use crate::domain::config::{Document, ShmConfig, SreConfig, sre_config_name};

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the SHM configuration of the selected context
    ShowShm {
        /// Write to this file instead of printing
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Print a template SHM configuration
    TemplateShm {
        /// Write to this file instead of printing
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Upload an SHM configuration file
    UploadShm {
        /// Path to the SHM configuration
        file: PathBuf,
    },
    /// Print the configuration of an SRE
    ShowSre {
        /// Name of the SRE
        name: String,
        /// Write to this file instead of printing
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Print a template SRE configuration
    TemplateSre {
        /// Write to this file instead of printing
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Upload an SRE configuration file
    UploadSre {
        /// Path to the SRE configuration
        file: PathBuf,
    },
}

/// Run the config command.
///
/// # Errors
///
/// Returns an error if no context is selected, a document cannot be read,
/// parsed or written, or blob storage cannot be reached.
pub async fn run(app: &AppContext, cmd: ConfigCommand) -> Result<ExitCode> {
    match cmd {
        ConfigCommand::ShowShm { file } => {
            show::<ShmConfig>(app, ShmConfig::FILENAME, file.as_deref()).await
        }
        ConfigCommand::TemplateShm { file } => template(app, &ShmConfig::template(), file.as_deref()),
        ConfigCommand::UploadShm { file } => upload::<ShmConfig>(app, &file).await,
        ConfigCommand::ShowSre { name, file } => {
            show::<SreConfig>(app, &sre_config_name(&name), file.as_deref()).await
        }
        ConfigCommand::TemplateSre { file } => template(app, &SreConfig::template(), file.as_deref()),
        ConfigCommand::UploadSre { file } => upload::<SreConfig>(app, &file).await,
    }
}

fn emit(app: &AppContext, yaml: &str, file: Option<&Path>) -> Result<()> {
    match file {
        Some(path) => {
            std::fs::write(path, yaml).with_context(|| format!("cannot write {}", path.display()))?;
            app.output.success(&format!("Wrote {}", path.display()));
        }
        None => app.output.document(yaml),
    }
    Ok(())
}

async fn show<D: Document>(app: &AppContext, filename: &str, file: Option<&Path>) -> Result<ExitCode> {
    let context = app.selected_context()?;
    let blobs = app.azure(&context);
    let config: D = document::load_remote(&blobs, &context, filename).await?;
    emit(app, &config.to_yaml()?, file)?;
    Ok(ExitCode::SUCCESS)
}

fn template(app: &AppContext, template: &serde_yaml::Value, file: Option<&Path>) -> Result<ExitCode> {
    let yaml = serde_yaml::to_string(template).context("cannot serialize template")?;
    emit(app, &yaml, file)?;
    Ok(ExitCode::SUCCESS)
}

async fn upload<D: Document>(app: &AppContext, file: &Path) -> Result<ExitCode> {
    let yaml = std::fs::read_to_string(file)
        .with_context(|| format!("cannot read {}", file.display()))?;
    let config = D::from_yaml(&yaml)?;

    let context = app.selected_context()?;
    let blobs = app.azure(&context);
    if document::remote_exists(&blobs, &context, &config.filename()).await? {
        let diff = document::remote_yaml_diff(&blobs, &context, &config).await?;
        if diff.is_empty() {
            app.output.info("No changes, won't upload configuration.");
            return Ok(ExitCode::SUCCESS);
        }
        app.output.diff(&diff);
        let prompt = "Configuration has changed, do you want to overwrite the remote configuration?";
        if !app.confirm(prompt, false)? {
            app.output.info("Remote configuration left unchanged.");
            return Ok(ExitCode::SUCCESS);
        }
    }
    document::upload(&blobs, &context, &config).await?;
    app.output.success(&format!("Uploaded {}", config.filename()));
    Ok(ExitCode::SUCCESS)
}
