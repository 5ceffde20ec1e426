//! Shared mock infrastructure for unit tests.
//!
//! Each mock records the calls it receives behind a `Mutex` so tests can
//! assert on ordering, and carries a small amount of scripted state
//! (failures to return, values to report).

#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;
use std::process::Output;
use std::sync::Mutex;

use anyhow::Result;
use dsh_cli::application::ports::{
    BlobStorage, CommandRunner, KeyVaultRequest, ProcessOptions, ProgressReporter,
    ResourceManager, StackConfigurator, StackOperations, StackWorkspace,
};
use dsh_cli::domain::azure::{
    KeyVault, KeyVaultKey, ManagedIdentity, ResourceGroup, StorageAccount, Subscription,
};
use dsh_cli::domain::context::BlobLocation;
use dsh_cli::domain::error::AzureError;
use dsh_cli::domain::pulumi::{
    ConfigValue, OperationOptions, OperationSummary, ProjectSettings, Stack, StackSettings,
};

use crate::helpers::{command_failure, ok_output};

// ── Automation engine ────────────────────────────────────────────────────────

/// Scripted engine state.
#[derive(Default)]
pub struct EngineState {
    /// Every call, formatted as `"<method> <detail>"`.
    pub calls: Vec<String>,
    pub config: BTreeMap<String, ConfigValue>,
    /// Key the engine reports in the stack settings file.
    pub stack_key: Option<String>,
    /// Settings handed to the most recent `create_or_select_stack`.
    pub created_with: Option<StackSettings>,
    /// Stderr of destroy attempts that fail, consumed in order.
    pub destroy_failures: VecDeque<String>,
    pub create_failure: Option<String>,
    /// Error `get_config` returns without reaching the engine (timeout, spawn failure).
    pub get_config_failure: Option<String>,
    pub refresh_failure: Option<String>,
    pub preview_failure: Option<String>,
    pub up_failure: Option<String>,
    pub remove_stack_failure: Option<String>,
    pub cancel_fails: bool,
    pub outputs: BTreeMap<String, serde_json::Value>,
    pub last_options: Option<OperationOptions>,
}

pub struct MockEngine {
    pub state: Mutex<EngineState>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::with_key(Some("engine-key"))
    }

    pub fn with_key(key: Option<&str>) -> Self {
        Self {
            state: Mutex::new(EngineState {
                stack_key: key.map(str::to_string),
                ..EngineState::default()
            }),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls whose method name is `method`.
    pub fn calls_to(&self, method: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.split(' ').next() == Some(method))
            .collect()
    }

    /// Method names only, in order.
    pub fn methods(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .map(|c| c.split(' ').next().unwrap_or_default().to_string())
            .collect()
    }

    pub fn seed_config(&self, key: &str, value: &str, secret: bool) {
        self.state.lock().unwrap().config.insert(
            key.to_string(),
            ConfigValue {
                value: value.to_string(),
                secret,
            },
        );
    }

    pub fn config_value(&self, key: &str) -> Option<String> {
        self.state.lock().unwrap().config.get(key).map(|v| v.value.clone())
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn scripted(&self, failure: Option<String>, command: &str) -> Result<OperationSummary> {
        match failure {
            Some(stderr) => Err(command_failure(command, &stderr)),
            None => Ok(OperationSummary::succeeded("")),
        }
    }
}

impl StackWorkspace for MockEngine {
    async fn create_or_select_stack(
        &self,
        project: &ProjectSettings,
        stack_name: &str,
        settings: &StackSettings,
        env: &[(String, String)],
    ) -> Result<Stack> {
        self.record(format!("create_or_select_stack {stack_name}"));
        let mut state = self.state.lock().unwrap();
        state.created_with = Some(settings.clone());
        if let Some(stderr) = state.create_failure.clone() {
            return Err(command_failure("pulumi stack select", &stderr));
        }
        Ok(Stack {
            project_name: project.name.clone(),
            name: stack_name.to_string(),
            work_dir: PathBuf::from("/tmp/dsh-mock").join(stack_name),
            env: env.to_vec(),
        })
    }

    async fn stack_settings(&self, _stack: &Stack) -> Result<StackSettings> {
        let state = self.state.lock().unwrap();
        Ok(StackSettings {
            secrets_provider: None,
            encrypted_key: state.stack_key.clone(),
            config: state
                .config
                .iter()
                .map(|(k, v)| (k.clone(), serde_yaml::Value::String(v.value.clone())))
                .collect(),
        })
    }

    async fn install_plugin(&self, _stack: &Stack, name: &str, version: &str) -> Result<()> {
        self.record(format!("install_plugin {name}@{version}"));
        Ok(())
    }

    async fn remove_stack(&self, stack: &Stack) -> Result<()> {
        self.record(format!("remove_stack {}", stack.name));
        match self.state.lock().unwrap().remove_stack_failure.clone() {
            Some(stderr) => Err(command_failure("pulumi stack rm", &stderr)),
            None => Ok(()),
        }
    }
}

impl StackConfigurator for MockEngine {
    async fn get_config(&self, _stack: &Stack, key: &str) -> Result<ConfigValue> {
        self.record(format!("get_config {key}"));
        let state = self.state.lock().unwrap();
        if let Some(message) = state.get_config_failure.clone() {
            anyhow::bail!(message);
        }
        state
            .config
            .get(key)
            .cloned()
            .ok_or_else(|| {
                command_failure(
                    "pulumi config get",
                    &format!("error: configuration key '{key}' not found for stack"),
                )
            })
    }

    async fn set_config(&self, _stack: &Stack, key: &str, value: &ConfigValue) -> Result<()> {
        let kind = if value.secret { "secret" } else { "plain" };
        self.record(format!("set_config {key} {kind}"));
        self.state
            .lock()
            .unwrap()
            .config
            .insert(key.to_string(), value.clone());
        Ok(())
    }
}

impl StackOperations for MockEngine {
    async fn refresh(&self, stack: &Stack, options: OperationOptions) -> Result<OperationSummary> {
        self.record(format!("refresh {}", stack.name));
        let failure = {
            let mut state = self.state.lock().unwrap();
            state.last_options = Some(options);
            state.refresh_failure.clone()
        };
        self.scripted(failure, "pulumi refresh")
    }

    async fn preview(&self, stack: &Stack, options: OperationOptions) -> Result<OperationSummary> {
        self.record(format!("preview {}", stack.name));
        let failure = {
            let mut state = self.state.lock().unwrap();
            state.last_options = Some(options);
            state.preview_failure.clone()
        };
        self.scripted(failure, "pulumi preview")
    }

    async fn up(&self, stack: &Stack, options: OperationOptions) -> Result<OperationSummary> {
        self.record(format!("up {}", stack.name));
        let failure = {
            let mut state = self.state.lock().unwrap();
            state.last_options = Some(options);
            state.up_failure.clone()
        };
        self.scripted(failure, "pulumi up")
    }

    async fn destroy(&self, stack: &Stack, _options: OperationOptions) -> Result<OperationSummary> {
        self.record(format!("destroy {}", stack.name));
        let failure = self.state.lock().unwrap().destroy_failures.pop_front();
        self.scripted(failure, "pulumi destroy")
    }

    async fn cancel(&self, stack: &Stack) -> Result<()> {
        self.record(format!("cancel {}", stack.name));
        if self.state.lock().unwrap().cancel_fails {
            return Err(command_failure("pulumi cancel", "error: no stack update in progress"));
        }
        Ok(())
    }

    async fn outputs(&self, stack: &Stack) -> Result<BTreeMap<String, serde_json::Value>> {
        self.record(format!("outputs {}", stack.name));
        Ok(self.state.lock().unwrap().outputs.clone())
    }

    async fn run_command(&self, _stack: &Stack, args: &[&str]) -> Result<String> {
        self.record(format!("run_command {}", args.join(" ")));
        Ok(format!("ran {}", args.join(" ")))
    }
}

// ── Blob storage ─────────────────────────────────────────────────────────────

/// In-memory blob storage keyed by `(container, blob)`.
#[derive(Default)]
pub struct MemoryBlobs {
    pub blobs: Mutex<BTreeMap<(String, String), String>>,
    pub calls: Mutex<Vec<String>>,
    pub fail_remove: Mutex<Option<String>>,
}

impl MemoryBlobs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, container: &str, name: &str, contents: &str) {
        self.blobs
            .lock()
            .unwrap()
            .insert((container.to_string(), name.to_string()), contents.to_string());
    }

    pub fn get(&self, container: &str, name: &str) -> Option<String> {
        self.blobs
            .lock()
            .unwrap()
            .get(&(container.to_string(), name.to_string()))
            .cloned()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl BlobStorage for MemoryBlobs {
    async fn blob_exists(&self, location: &BlobLocation, blob_name: &str) -> Result<bool> {
        self.record(format!("exists {}/{blob_name}", location.container));
        Ok(self.get(&location.container, blob_name).is_some())
    }

    async fn download_blob(&self, location: &BlobLocation, blob_name: &str) -> Result<String> {
        self.record(format!("download {}/{blob_name}", location.container));
        self.get(&location.container, blob_name)
            .ok_or_else(|| AzureError::BlobNotFound(blob_name.to_string()).into())
    }

    async fn upload_blob(&self, location: &BlobLocation, blob_name: &str, contents: &str) -> Result<()> {
        self.record(format!("upload {}/{blob_name}", location.container));
        self.put(&location.container, blob_name, contents);
        Ok(())
    }

    async fn remove_blob(&self, location: &BlobLocation, blob_name: &str) -> Result<()> {
        self.record(format!("remove {}/{blob_name}", location.container));
        if let Some(message) = self.fail_remove.lock().unwrap().clone() {
            anyhow::bail!(message);
        }
        self.blobs
            .lock()
            .unwrap()
            .remove(&(location.container.clone(), blob_name.to_string()))
            .map(|_| ())
            .ok_or_else(|| AzureError::BlobNotFound(blob_name.to_string()).into())
    }

    async fn storage_account_key(&self, _location: &BlobLocation) -> Result<String> {
        Ok("account-key".to_string())
    }
}

// ── Resource manager ─────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockResourceManager {
    pub calls: Mutex<Vec<String>>,
    /// Report an empty storage account name, as a failed create would.
    pub blank_storage_account: bool,
    pub fail_keyvault: bool,
}

impl MockResourceManager {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl ResourceManager for MockResourceManager {
    async fn subscription(&self) -> Result<Subscription> {
        self.record("subscription".to_string());
        Ok(Subscription {
            id: "10de18e7-b238-6f1e-a4ad-772708929203".to_string(),
            name: "Data Safe Haven Acme".to_string(),
            tenant_id: "1d93a235-0c16-4f39-adff-a550ea31b5c5".to_string(),
        })
    }

    async fn ensure_resource_group(
        &self,
        name: &str,
        location: &str,
        _tags: &[(String, String)],
    ) -> Result<ResourceGroup> {
        self.record(format!("resource_group {name}"));
        Ok(ResourceGroup {
            name: name.to_string(),
            location: location.to_string(),
        })
    }

    async fn remove_resource_group(&self, name: &str) -> Result<()> {
        self.record(format!("remove_resource_group {name}"));
        Ok(())
    }

    async fn ensure_managed_identity(
        &self,
        name: &str,
        _resource_group: &str,
        _location: &str,
    ) -> Result<ManagedIdentity> {
        self.record(format!("managed_identity {name}"));
        Ok(ManagedIdentity {
            name: name.to_string(),
            principal_id: "7c0d2b39-0f3a-4b16-9c5d-2f8e1a6b4c3d".to_string(),
        })
    }

    async fn ensure_storage_account(
        &self,
        name: &str,
        _resource_group: &str,
        _location: &str,
        _tags: &[(String, String)],
    ) -> Result<StorageAccount> {
        self.record(format!("storage_account {name}"));
        let name = if self.blank_storage_account {
            String::new()
        } else {
            name.to_string()
        };
        Ok(StorageAccount { name })
    }

    async fn ensure_storage_blob_container(
        &self,
        container: &str,
        _resource_group: &str,
        _storage_account: &str,
    ) -> Result<()> {
        self.record(format!("container {container}"));
        Ok(())
    }

    async fn ensure_keyvault(
        &self,
        request: &KeyVaultRequest<'_>,
        _identity: &ManagedIdentity,
    ) -> Result<KeyVault> {
        self.record(format!("keyvault {}", request.name));
        if self.fail_keyvault {
            anyhow::bail!("vault name is already in use");
        }
        Ok(KeyVault {
            name: request.name.to_string(),
        })
    }

    async fn ensure_keyvault_key(&self, key_name: &str, key_vault: &str) -> Result<KeyVaultKey> {
        self.record(format!("keyvault_key {key_name}"));
        Ok(KeyVaultKey {
            name: key_name.to_string(),
            kid: format!("https://{key_vault}.vault.azure.net/keys/{key_name}/0123abcd"),
        })
    }
}

// ── Command runner ───────────────────────────────────────────────────────────

/// One recorded process invocation.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
}

/// Records invocations and replays scripted outputs (default: empty success).
#[derive(Default)]
pub struct RecordingRunner {
    pub invocations: Mutex<Vec<Invocation>>,
    pub responses: Mutex<VecDeque<Output>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, output: Output) -> Self {
        self.responses.lock().unwrap().push_back(output);
        self
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }
}

impl CommandRunner for RecordingRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output> {
        self.run_with_options(program, args, &ProcessOptions::default())
            .await
    }

    async fn run_with_options(
        &self,
        program: &str,
        args: &[&str],
        options: &ProcessOptions<'_>,
    ) -> Result<Output> {
        self.invocations.lock().unwrap().push(Invocation {
            program: program.to_string(),
            args: args.iter().map(|a| (*a).to_string()).collect(),
            env: options.env.to_vec(),
            cwd: options.cwd.map(std::path::Path::to_path_buf),
        });
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| ok_output(b"")))
    }
}

// ── Progress reporter ────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingReporter {
    pub events: Mutex<Vec<String>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressReporter for RecordingReporter {
    fn step(&self, message: &str) {
        self.events.lock().unwrap().push(format!("step: {message}"));
    }
    fn success(&self, message: &str) {
        self.events.lock().unwrap().push(format!("success: {message}"));
    }
    fn warn(&self, message: &str) {
        self.events.lock().unwrap().push(format!("warn: {message}"));
    }
}
