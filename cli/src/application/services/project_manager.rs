//! Application service: lifecycle of one Pulumi stack.
//!
//! A `ProjectManager` owns the `pulumi.yaml` record for the duration of an
//! operation. It loads the stack lazily, reconciles queued configuration
//! options, runs engine operations and writes the resulting stack
//! configuration and encryption key back into the record. Callers get the
//! record back with [`ProjectManager::into_pulumi_config`] and upload it.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use tracing::{debug, error, info, warn};

use crate::application::ports::{AutomationEngine, BlobStorage};
use crate::domain::context::Context;
use crate::domain::error::{AzureError, CommandError, PulumiError};
use crate::domain::pulumi::{
    ConfigValue, OperationOptions, OperationSummary, PROJECT_NAME, PendingOption, ProjectSettings,
    PulumiConfig, REQUIRED_PLUGINS, Stack, StackSettings,
};
use crate::domain::retry::DestroyRetryPolicy;

/// How the manager talks to the engine.
#[derive(Debug, Clone)]
pub struct ManagerSettings {
    /// Directory containing the declarative program.
    pub program_dir: PathBuf,
    pub runtime: String,
    /// Extra environment for every engine call (storage account credentials).
    pub env: Vec<(String, String)>,
    pub verbose: bool,
    pub retry: DestroyRetryPolicy,
}

/// Identifies the record entry and the engine stack a manager drives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectTarget {
    /// Key in `pulumi.yaml`.
    pub project: String,
    /// Engine stack name.
    pub stack: String,
}

impl ProjectTarget {
    #[must_use]
    pub fn shm() -> Self {
        Self {
            project: "shm".to_string(),
            stack: "shm".to_string(),
        }
    }

    #[must_use]
    pub fn sre(name: &str) -> Self {
        let sanitised = dsh_common::naming::sanitise_sre_name(name);
        Self {
            project: sanitised.clone(),
            stack: format!("sre-{sanitised}"),
        }
    }
}

/// Drives one stack through the automation engine.
pub struct ProjectManager<'a, E, B> {
    engine: &'a E,
    blobs: &'a B,
    context: &'a Context,
    settings: ManagerSettings,
    target: ProjectTarget,
    pulumi_config: PulumiConfig,
    stack: Option<Stack>,
    outputs: Option<BTreeMap<String, serde_json::Value>>,
    options: Vec<(String, PendingOption)>,
}

impl<'a, E: AutomationEngine, B: BlobStorage> ProjectManager<'a, E, B> {
    /// Create a manager for `target`.
    ///
    /// With `create_project` the record gains an empty entry for the project
    /// if it has none.
    ///
    /// # Errors
    ///
    /// Returns [`PulumiError::ProjectNotDefined`] when `create_project` is
    /// false and the record has no entry for the project.
    pub fn new(
        engine: &'a E,
        blobs: &'a B,
        context: &'a Context,
        mut pulumi_config: PulumiConfig,
        target: ProjectTarget,
        settings: ManagerSettings,
        create_project: bool,
    ) -> Result<Self> {
        if create_project {
            pulumi_config.create_or_select_project(&target.project);
        } else if !pulumi_config.contains(&target.project) {
            return Err(PulumiError::ProjectNotDefined(target.project).into());
        }
        Ok(Self {
            engine,
            blobs,
            context,
            settings,
            target,
            pulumi_config,
            stack: None,
            outputs: None,
            options: Vec::new(),
        })
    }

    #[must_use]
    pub fn pulumi_config(&self) -> &PulumiConfig {
        &self.pulumi_config
    }

    /// Give back the record, including any key or configuration learnt from
    /// the engine.
    #[must_use]
    pub fn into_pulumi_config(self) -> PulumiConfig {
        self.pulumi_config
    }

    fn project_settings(&self) -> ProjectSettings {
        ProjectSettings {
            name: PROJECT_NAME.to_string(),
            runtime: self.settings.runtime.clone(),
            main: self.settings.program_dir.clone(),
            backend_url: self.context.pulumi_backend_url(),
        }
    }

    fn stack_settings(&self) -> Result<StackSettings> {
        let project = self.pulumi_config.get(&self.target.project)?;
        Ok(StackSettings {
            secrets_provider: Some(self.context.pulumi_secrets_provider_url()),
            encrypted_key: self.pulumi_config.encrypted_key.clone(),
            config: project.stack_config.clone(),
        })
    }

    fn operation_options(&self) -> OperationOptions {
        OperationOptions {
            verbose: self.settings.verbose,
            ..OperationOptions::default()
        }
    }

    /// Load the stack, creating it if needed.
    ///
    /// The stack is only cached once its encrypted key has been checked
    /// against the record, so a mismatch fails every later call too.
    ///
    /// # Errors
    ///
    /// Fails if the engine cannot create or select the stack, if the stack's
    /// encrypted key does not match the record, or if plugin installation
    /// fails.
    pub async fn stack(&mut self) -> Result<Stack> {
        if let Some(stack) = &self.stack {
            return Ok(stack.clone());
        }
        debug!(stack = %self.target.stack, "creating or loading stack");
        let stack = match self
            .engine
            .create_or_select_stack(
                &self.project_settings(),
                &self.target.stack,
                &self.stack_settings()?,
                &self.settings.env,
            )
            .await
        {
            Ok(stack) => stack,
            Err(err) => {
                log_exception(&err);
                return Err(err.context(format!("Could not load Pulumi stack {}.", self.target.stack)));
            }
        };
        info!(stack = %stack.name, "loaded stack");
        self.update_encrypted_key(&stack).await?;
        self.install_plugins(&stack).await?;
        self.stack = Some(stack.clone());
        Ok(stack)
    }

    async fn update_encrypted_key(&mut self, stack: &Stack) -> Result<()> {
        let stack_key = self
            .engine
            .stack_settings(stack)
            .await
            .with_context(|| format!("Could not load Pulumi stack {}.", stack.name))?
            .encrypted_key;
        match self.pulumi_config.encrypted_key.as_deref() {
            None => {
                self.pulumi_config.encrypted_key = stack_key;
                Ok(())
            }
            Some(expected) if stack_key.as_deref() == Some(expected) => Ok(()),
            Some(_) => Err(PulumiError::EncryptedKeyMismatch.into()),
        }
    }

    async fn install_plugins(&self, stack: &Stack) -> Result<()> {
        debug!("installing required Pulumi plugins");
        for (name, version) in REQUIRED_PLUGINS {
            self.engine
                .install_plugin(stack, name, version)
                .await
                .context("Installing Pulumi plugins failed.")?;
        }
        Ok(())
    }

    // ── Configuration ────────────────────────────────────────────────────

    /// Queue a public configuration option.
    pub fn add_option(&mut self, name: &str, value: &str, replace: bool) {
        self.queue(name, value, false, replace);
    }

    /// Queue a secret configuration option.
    pub fn add_secret(&mut self, name: &str, value: &str, replace: bool) {
        self.queue(name, value, true, replace);
    }

    fn queue(&mut self, name: &str, value: &str, secret: bool, replace: bool) {
        let option = PendingOption {
            value: value.to_string(),
            secret,
            replace,
        };
        match self.options.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => *existing = option,
            None => self.options.push((name.to_string(), option)),
        }
    }

    /// Names of options waiting to be applied, in insertion order.
    #[must_use]
    pub fn pending_options(&self) -> Vec<&str> {
        self.options.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Apply every queued option and empty the queue.
    ///
    /// # Errors
    ///
    /// Fails if any option cannot be written. The queue is left intact.
    pub async fn apply_config_options(&mut self) -> Result<()> {
        debug!("updating Pulumi configuration");
        let options = self.options.clone();
        for (name, option) in &options {
            let result = if option.replace {
                self.set_config(name, &option.value, option.secret).await
            } else {
                self.ensure_config(name, &option.value, option.secret).await
            };
            result.context("Applying Pulumi configuration options failed.")?;
        }
        self.options.clear();
        Ok(())
    }

    /// Set a value only if the stack does not already have one.
    ///
    /// # Errors
    ///
    /// Fails if the stack cannot be loaded, the existing value cannot be
    /// read for a reason other than the engine rejecting the lookup, or the
    /// value cannot be written.
    pub async fn ensure_config(&mut self, name: &str, value: &str, secret: bool) -> Result<()> {
        let stack = self.stack().await?;
        match self.engine.get_config(&stack, name).await {
            Ok(_) => Ok(()),
            Err(err) if command_error(&err).is_some() => self.set_config(name, value, secret).await,
            Err(err) => Err(err.context(format!("Could not read configuration value '{name}'."))),
        }
    }

    /// Set a value, overwriting any existing one.
    ///
    /// # Errors
    ///
    /// Fails if the stack cannot be loaded or the value cannot be written.
    pub async fn set_config(&mut self, name: &str, value: &str, secret: bool) -> Result<()> {
        let stack = self.stack().await?;
        let value = ConfigValue {
            value: value.to_string(),
            secret,
        };
        self.engine.set_config(&stack, name, &value).await?;
        self.update_project(&stack).await
    }

    /// Copy the persisted stack configuration into the record.
    async fn update_project(&mut self, stack: &Stack) -> Result<()> {
        let settings = self.engine.stack_settings(stack).await?;
        self.pulumi_config.get_mut(&self.target.project)?.stack_config = settings.config;
        Ok(())
    }

    /// Read a configuration value.
    ///
    /// # Errors
    ///
    /// Returns [`PulumiError::SecretNotFound`] if the stack has no such value.
    pub async fn secret(&mut self, name: &str) -> Result<String> {
        let stack = self.stack().await?;
        match self.engine.get_config(&stack, name).await {
            Ok(value) => Ok(value.value),
            Err(err) => {
                log_exception(&err);
                Err(err.context(PulumiError::SecretNotFound(name.to_string())))
            }
        }
    }

    /// Queue a public option holding the value `other` has for `name`.
    ///
    /// # Errors
    ///
    /// Fails if `other` has no such value.
    pub async fn copy_option<E2, B2>(
        &mut self,
        name: &str,
        other: &mut ProjectManager<'_, E2, B2>,
    ) -> Result<()>
    where
        E2: AutomationEngine,
        B2: BlobStorage,
    {
        let value = other.secret(name).await?;
        self.add_option(name, &value, true);
        Ok(())
    }

    /// Queue a secret holding the value `other` has for `name`.
    ///
    /// # Errors
    ///
    /// Fails if `other` has no such value.
    pub async fn copy_secret<E2, B2>(
        &mut self,
        name: &str,
        other: &mut ProjectManager<'_, E2, B2>,
    ) -> Result<()>
    where
        E2: AutomationEngine,
        B2: BlobStorage,
    {
        let value = other.secret(name).await?;
        self.add_secret(name, &value, true);
        Ok(())
    }

    // ── Operations ───────────────────────────────────────────────────────

    /// Apply options, then refresh, preview and update.
    ///
    /// # Errors
    ///
    /// Any failure is wrapped as "Pulumi deployment failed.".
    pub async fn deploy(&mut self, force: bool) -> Result<()> {
        async {
            self.apply_config_options().await?;
            if force {
                self.cancel().await?;
            }
            self.refresh().await?;
            self.preview().await?;
            self.update().await
        }
        .await
        .context("Pulumi deployment failed.")
    }

    /// Refresh, then destroy every resource and remove the stack.
    ///
    /// # Errors
    ///
    /// Any failure is wrapped as "Tearing down Pulumi infrastructure failed.".
    pub async fn teardown(&mut self, force: bool) -> Result<()> {
        let result = async {
            self.refresh().await?;
            if force {
                self.cancel().await?;
            }
            self.destroy().await
        }
        .await;
        result.map_err(|err| {
            log_exception(&err);
            err.context("Tearing down Pulumi infrastructure failed.")
        })
    }

    /// Best-effort cancel of an in-progress operation.
    ///
    /// # Errors
    ///
    /// Fails only if the stack cannot be loaded.
    pub async fn cancel(&mut self) -> Result<()> {
        let stack = self.stack().await?;
        warn!(stack = %stack.name, "cancelling ongoing Pulumi operation");
        if let Err(err) = self.engine.cancel(&stack).await {
            error!(stack = %stack.name, error = %err, "no ongoing Pulumi operation found");
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Wrapped as "Pulumi refresh failed.".
    pub async fn refresh(&mut self) -> Result<()> {
        let result = async {
            let stack = self.stack().await?;
            info!(stack = %stack.name, "refreshing stack");
            // Parallel refresh can deadlock the engine.
            self.engine
                .refresh(&stack, OperationOptions::serial(self.settings.verbose))
                .await
        }
        .await;
        match result {
            Ok(_) => Ok(()),
            Err(err) => {
                log_exception(&err);
                Err(err.context("Pulumi refresh failed."))
            }
        }
    }

    /// Show the changes an update would make. Engine failures are ignored.
    ///
    /// # Errors
    ///
    /// Fails, wrapped as "Pulumi preview failed.", only if the stack cannot
    /// be loaded or the engine cannot be run at all.
    pub async fn preview(&mut self) -> Result<()> {
        let stack = self.stack().await.context("Pulumi preview failed.")?;
        info!(stack = %stack.name, "previewing changes");
        let options = OperationOptions {
            diff: true,
            ..OperationOptions::serial(self.settings.verbose)
        };
        match self.engine.preview(&stack, options).await {
            Ok(_) => Ok(()),
            Err(err) if command_error(&err).is_some() => {
                debug!(error = %err, "ignoring preview failure");
                Ok(())
            }
            Err(err) => Err(err.context("Pulumi preview failed.")),
        }
    }

    /// Apply changes and persist the resulting configuration.
    ///
    /// # Errors
    ///
    /// Wrapped as "Pulumi update failed.".
    pub async fn update(&mut self) -> Result<()> {
        let result = async {
            let stack = self.stack().await?;
            info!(stack = %stack.name, "applying changes to stack");
            let summary = self.engine.up(&stack, self.operation_options()).await?;
            evaluate(&summary)?;
            self.update_project(&stack).await
        }
        .await;
        result.map_err(|err| {
            log_exception(&err);
            err.context("Pulumi update failed.")
        })
    }

    /// Destroy every resource, retrying transient failures, then remove the
    /// stack and its backup blob.
    ///
    /// # Errors
    ///
    /// Wrapped as "Pulumi destroy failed.".
    pub async fn destroy(&mut self) -> Result<()> {
        async {
            let stack = self.stack().await?;
            self.destroy_resources(&stack).await?;
            self.remove_stack(&stack).await?;
            self.remove_stack_backup(&stack).await
        }
        .await
        .context("Pulumi destroy failed.")
    }

    async fn destroy_resources(&self, stack: &Stack) -> Result<()> {
        let policy = &self.settings.retry;
        loop {
            match self.engine.destroy(stack, self.operation_options()).await {
                Ok(summary) => return evaluate(&summary),
                Err(err) if policy.is_transient(&err) => {
                    warn!(
                        stack = %stack.name,
                        backoff_secs = policy.backoff.as_secs(),
                        "resource still in use, retrying destroy"
                    );
                    tokio::time::sleep(policy.backoff).await;
                }
                Err(err) => {
                    log_exception(&err);
                    return Err(err.context("Pulumi resource destruction failed."));
                }
            }
        }
    }

    async fn remove_stack(&self, stack: &Stack) -> Result<()> {
        debug!(stack = %stack.name, "removing Pulumi stack");
        if let Err(err) = self.engine.remove_stack(stack).await {
            log_exception(&err);
            if !command_error(&err).is_some_and(|cmd| cmd.mentions("no stack named")) {
                return Err(err.context("Pulumi stack could not be removed."));
            }
        }
        info!(stack = %stack.name, "removed Pulumi stack");
        Ok(())
    }

    async fn remove_stack_backup(&self, stack: &Stack) -> Result<()> {
        let blob_name = stack.backup_blob_name();
        debug!(blob = %blob_name, "removing Pulumi stack backup");
        match self
            .blobs
            .remove_blob(&self.context.pulumi_blobs(), &blob_name)
            .await
        {
            Ok(()) => {
                debug!(blob = %blob_name, "removed Pulumi stack backup");
                Ok(())
            }
            Err(err)
                if matches!(
                    err.downcast_ref::<AzureError>(),
                    Some(AzureError::BlobNotFound(_))
                ) =>
            {
                warn!(blob = %blob_name, "Pulumi stack backup could not be found");
                Ok(())
            }
            Err(err) => Err(err.context("Pulumi stack backup could not be removed.")),
        }
    }

    /// A named stack output. Outputs are read once and cached.
    ///
    /// # Errors
    ///
    /// Returns [`PulumiError::OutputNotFound`] if the stack has no such output.
    pub async fn output(&mut self, name: &str) -> Result<serde_json::Value> {
        if self.outputs.is_none() {
            let stack = self.stack().await?;
            self.outputs = Some(self.engine.outputs(&stack).await?);
        }
        self.outputs
            .as_ref()
            .and_then(|outputs| outputs.get(name))
            .cloned()
            .ok_or_else(|| PulumiError::OutputNotFound(name.to_string()).into())
    }

    /// Run a non-interactive engine command against this stack.
    ///
    /// # Errors
    ///
    /// Wrapped as "Failed to run command.".
    pub async fn run_pulumi_command(&mut self, command: &str) -> Result<String> {
        let stack = self.stack().await?;
        let args: Vec<&str> = command.split_whitespace().collect();
        self.engine
            .run_command(&stack, &args)
            .await
            .inspect_err(log_exception)
            .context("Failed to run command.")
    }
}

/// Check an operation summary.
///
/// # Errors
///
/// Returns [`PulumiError::OperationFailed`] unless the result is `succeeded`.
pub fn evaluate(summary: &OperationSummary) -> Result<()> {
    if summary.is_success() {
        info!("Pulumi operation succeeded");
        Ok(())
    } else {
        error!(result = %summary.result, "Pulumi operation failed");
        Err(PulumiError::OperationFailed.into())
    }
}

fn command_error(err: &anyhow::Error) -> Option<&CommandError> {
    err.chain().find_map(|cause| cause.downcast_ref::<CommandError>())
}

/// Log the engine's stderr for a failed command.
fn log_exception(err: &anyhow::Error) {
    if let Some(cmd) = command_error(err) {
        for line in cmd.stderr.lines().filter(|line| !line.trim().is_empty()) {
            error!(command = %cmd.command, "Pulumi output: {line}");
        }
    }
}
