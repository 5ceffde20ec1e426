//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain`, never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;

use anyhow::Result;

use crate::domain::azure::{
    KeyVault, KeyVaultKey, ManagedIdentity, ResourceGroup, StorageAccount, Subscription,
};
use crate::domain::context::{BlobLocation, ContextSettings};
use crate::domain::pulumi::{
    ConfigValue, OperationOptions, OperationSummary, ProjectSettings, Stack, StackSettings,
};

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Environment and working directory for a spawned process.
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions<'a> {
    pub env: &'a [(String, String)],
    pub cwd: Option<&'a Path>,
    /// Overrides the runner's default timeout.
    pub timeout: Option<Duration>,
}

/// Abstracts process execution so infrastructure can be swapped or mocked.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program and capture its output.
    ///
    /// Implementations should delegate to `run_with_options` using the
    /// instance's configured default timeout.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output>;
    /// Run a program with extra environment, a working directory, or a
    /// custom timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds its
    /// timeout. On timeout, the child process must be killed (not left
    /// orphaned).
    async fn run_with_options(
        &self,
        program: &str,
        args: &[&str],
        options: &ProcessOptions<'_>,
    ) -> Result<Output>;
}

impl<T: CommandRunner> CommandRunner for &T {
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output> {
        T::run(self, program, args).await
    }

    async fn run_with_options(
        &self,
        program: &str,
        args: &[&str],
        options: &ProcessOptions<'_>,
    ) -> Result<Output> {
        T::run_with_options(self, program, args, options).await
    }
}

// ── Automation Engine Ports ───────────────────────────────────────────────────

/// Stack creation, inspection and removal.
#[allow(async_fn_in_trait)]
pub trait StackWorkspace {
    /// Create the stack if it does not exist, otherwise select it.
    ///
    /// `settings` seeds the stack settings file (persisted config, encrypted
    /// key, secrets provider) before the engine sees it.
    async fn create_or_select_stack(
        &self,
        project: &ProjectSettings,
        stack_name: &str,
        settings: &StackSettings,
        env: &[(String, String)],
    ) -> Result<Stack>;
    /// Read back the stack settings file as the engine left it.
    async fn stack_settings(&self, stack: &Stack) -> Result<StackSettings>;
    async fn install_plugin(&self, stack: &Stack, name: &str, version: &str) -> Result<()>;
    async fn remove_stack(&self, stack: &Stack) -> Result<()>;
}

/// Reading and writing stack configuration values.
#[allow(async_fn_in_trait)]
pub trait StackConfigurator {
    /// # Errors
    ///
    /// Fails if the key is not set.
    async fn get_config(&self, stack: &Stack, key: &str) -> Result<ConfigValue>;
    async fn set_config(&self, stack: &Stack, key: &str, value: &ConfigValue) -> Result<()>;
}

/// Engine operations against a loaded stack.
#[allow(async_fn_in_trait)]
pub trait StackOperations {
    async fn refresh(&self, stack: &Stack, options: OperationOptions) -> Result<OperationSummary>;
    async fn preview(&self, stack: &Stack, options: OperationOptions) -> Result<OperationSummary>;
    async fn up(&self, stack: &Stack, options: OperationOptions) -> Result<OperationSummary>;
    async fn destroy(&self, stack: &Stack, options: OperationOptions) -> Result<OperationSummary>;
    /// Cancel any in-progress update.
    async fn cancel(&self, stack: &Stack) -> Result<()>;
    async fn outputs(&self, stack: &Stack) -> Result<BTreeMap<String, serde_json::Value>>;
    /// Run an arbitrary non-interactive engine command and return its stdout.
    async fn run_command(&self, stack: &Stack, args: &[&str]) -> Result<String>;
}

/// Composite trait: any type implementing all three sub-traits is an
/// `AutomationEngine`.
pub trait AutomationEngine: StackWorkspace + StackConfigurator + StackOperations {}

/// Blanket implementation: any type implementing all three sub-traits is an
/// `AutomationEngine`.
impl<T> AutomationEngine for T where T: StackWorkspace + StackConfigurator + StackOperations {}

// ── Cloud Ports ───────────────────────────────────────────────────────────────

/// Blob storage inside a context's storage account.
#[allow(async_fn_in_trait)]
pub trait BlobStorage {
    async fn blob_exists(&self, location: &BlobLocation, blob_name: &str) -> Result<bool>;
    /// # Errors
    ///
    /// Fails with [`crate::domain::AzureError::BlobNotFound`] when the blob is
    /// missing.
    async fn download_blob(&self, location: &BlobLocation, blob_name: &str) -> Result<String>;
    async fn upload_blob(&self, location: &BlobLocation, blob_name: &str, contents: &str)
    -> Result<()>;
    /// # Errors
    ///
    /// Fails with [`crate::domain::AzureError::BlobNotFound`] when the blob is
    /// missing.
    async fn remove_blob(&self, location: &BlobLocation, blob_name: &str) -> Result<()>;
    async fn storage_account_key(&self, location: &BlobLocation) -> Result<String>;
}

/// Resource-level operations used to build and remove a context backend.
#[allow(async_fn_in_trait)]
pub trait ResourceManager {
    async fn subscription(&self) -> Result<Subscription>;
    async fn ensure_resource_group(
        &self,
        name: &str,
        location: &str,
        tags: &[(String, String)],
    ) -> Result<ResourceGroup>;
    async fn remove_resource_group(&self, name: &str) -> Result<()>;
    async fn ensure_managed_identity(
        &self,
        name: &str,
        resource_group: &str,
        location: &str,
    ) -> Result<ManagedIdentity>;
    async fn ensure_storage_account(
        &self,
        name: &str,
        resource_group: &str,
        location: &str,
        tags: &[(String, String)],
    ) -> Result<StorageAccount>;
    async fn ensure_storage_blob_container(
        &self,
        container: &str,
        resource_group: &str,
        storage_account: &str,
    ) -> Result<()>;
    async fn ensure_keyvault(
        &self,
        request: &KeyVaultRequest<'_>,
        identity: &ManagedIdentity,
    ) -> Result<KeyVault>;
    async fn ensure_keyvault_key(&self, key_name: &str, key_vault: &str) -> Result<KeyVaultKey>;
}

/// Parameters for creating a key vault.
#[derive(Debug, Clone)]
pub struct KeyVaultRequest<'a> {
    pub name: &'a str,
    pub resource_group: &'a str,
    pub location: &'a str,
    pub admin_group_id: &'a str,
    pub tags: &'a [(String, String)],
}

/// Composite trait: blob storage plus resource management.
pub trait CloudApi: BlobStorage + ResourceManager {}

impl<T> CloudApi for T where T: BlobStorage + ResourceManager {}

// ── Local Settings Port ───────────────────────────────────────────────────────

/// Abstracts persistence of the local context settings file.
pub trait ContextStore {
    /// Load settings, returning defaults if the file does not exist.
    fn load(&self) -> Result<ContextSettings>;
    fn save(&self, settings: &ContextSettings) -> Result<()>;
    fn path(&self) -> Result<PathBuf>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait, no async needed.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}
