//! Application context: unified state passed to every command handler.
//!
//! `AppContext` carries the output context, the interactive/non-interactive
//! switch, the local context store and the engine settings derived from the
//! environment. Adapters for `az` and `pulumi` are built on demand because
//! they depend on the selected context's subscription.

use std::path::PathBuf;

use anyhow::{Context as _, Result};

use crate::application::ports::ContextStore;
use crate::application::services::project_manager::ManagerSettings;
use crate::domain::context::{Context, ContextSettings};
use crate::domain::retry::DestroyRetryPolicy;
use crate::infra::azure::AzureCli;
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::context_store::YamlContextStore;
use crate::infra::pulumi::PulumiCli;
use crate::output::OutputContext;

/// Directory of the declarative Pulumi program.
pub const PROGRAM_DIR_ENV: &str = "DSH_PULUMI_PROGRAM";
/// Runtime named in the generated `Pulumi.yaml`.
pub const RUNTIME_ENV: &str = "DSH_PULUMI_RUNTIME";

const DEFAULT_PROGRAM_DIR: &str = "program";
const DEFAULT_RUNTIME: &str = "python";

/// Output rendering flags.
pub struct OutputFlags {
    /// Disable ANSI color output.
    pub no_color: bool,
    /// Suppress non-error output.
    pub quiet: bool,
    /// Forward engine debug output.
    pub verbose: bool,
}

/// Behaviour flags.
pub struct BehaviourFlags {
    /// Skip interactive prompts (also set by `CI` / `DSH_YES` env vars).
    pub yes: bool,
}

/// Flags passed from the top-level CLI to `AppContext::new`.
pub struct AppFlags {
    /// Output rendering options.
    pub output: OutputFlags,
    /// Behaviour options.
    pub behaviour: BehaviourFlags,
}

/// Unified application context passed to every command handler.
pub struct AppContext {
    /// Terminal output context (colors, quiet mode).
    pub output: OutputContext,
    /// Local `contexts.yaml` store.
    pub context_store: YamlContextStore,
    /// When `true`, skip interactive prompts and use defaults.
    ///
    /// Set when `--yes` / `-y` is passed, or when the `CI` or `DSH_YES`
    /// environment variables are present.
    pub non_interactive: bool,
    pub verbose: bool,
}

impl AppContext {
    /// Construct an `AppContext` from top-level CLI flags.
    #[must_use]
    pub fn new(flags: &AppFlags) -> Self {
        let ci_env = std::env::var("CI").is_ok() || std::env::var("DSH_YES").is_ok();
        Self {
            output: OutputContext::new(flags.output.no_color, flags.output.quiet),
            context_store: YamlContextStore::default(),
            non_interactive: flags.behaviour.yes || ci_env,
            verbose: flags.output.verbose,
        }
    }

    /// Ask the user for confirmation.
    ///
    /// When `non_interactive` is `true` (CI, `--yes` flag, or `DSH_YES` env),
    /// returns `default` immediately without prompting.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal prompt fails (e.g. no TTY available).
    pub fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        if self.non_interactive {
            return Ok(default);
        }
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()?;
        Ok(confirmed)
    }

    /// Load the local contexts file.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be read or parsed.
    pub fn contexts(&self) -> Result<ContextSettings> {
        self.context_store.load()
    }

    /// The currently selected context.
    ///
    /// # Errors
    ///
    /// Fails if no context is selected or the contexts file is unreadable.
    pub fn selected_context(&self) -> Result<Context> {
        let settings = self.contexts()?;
        Ok(settings.assert_context()?.clone())
    }

    /// `az` adapter bound to the context's subscription.
    #[must_use]
    pub fn azure(&self, context: &Context) -> AzureCli<TokioCommandRunner> {
        AzureCli::new(TokioCommandRunner::default(), &context.subscription_name)
    }

    /// `pulumi` adapter with a fresh working directory.
    ///
    /// # Errors
    ///
    /// Fails if the working directory cannot be created.
    pub fn pulumi(&self) -> Result<PulumiCli<TokioCommandRunner>> {
        PulumiCli::new(TokioCommandRunner::default())
    }

    /// Engine settings from `DSH_PULUMI_PROGRAM` and `DSH_PULUMI_RUNTIME`.
    ///
    /// # Errors
    ///
    /// Fails if the program directory cannot be made absolute.
    pub fn manager_settings(&self) -> Result<ManagerSettings> {
        let program_dir = std::env::var(PROGRAM_DIR_ENV)
            .map_or_else(|_| PathBuf::from(DEFAULT_PROGRAM_DIR), PathBuf::from);
        let program_dir = std::path::absolute(&program_dir)
            .with_context(|| format!("cannot resolve {}", program_dir.display()))?;
        let runtime = std::env::var(RUNTIME_ENV).unwrap_or_else(|_| DEFAULT_RUNTIME.to_string());
        Ok(ManagerSettings {
            program_dir,
            runtime,
            env: Vec::new(),
            verbose: self.verbose,
            retry: DestroyRetryPolicy::default(),
        })
    }
}
