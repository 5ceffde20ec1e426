//! Records and value types for Pulumi stacks.
//!
//! Pure data only. The engine itself is reached through
//! [`crate::application::ports::AutomationEngine`].

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::config::Document;
use crate::domain::error::ConfigError;

/// Pulumi project name shared by every stack.
pub const PROJECT_NAME: &str = "data-safe-haven";

/// Engine plugins installed after a stack is loaded: `(name, version)`.
pub const REQUIRED_PLUGINS: &[(&str, &str)] = &[("azure-native", "2.24.0"), ("random", "4.15.0")];

// ── Persisted record ─────────────────────────────────────────────────────────

/// Persisted configuration of a single stack.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PulumiProject {
    #[serde(default)]
    pub stack_config: BTreeMap<String, serde_yaml::Value>,
}

/// The `pulumi.yaml` record: every project in a context plus the shared
/// encryption key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PulumiConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_key: Option<String>,
    #[serde(default)]
    pub projects: BTreeMap<String, PulumiProject>,
}

impl PulumiConfig {
    pub const FILENAME: &'static str = "pulumi.yaml";

    /// # Errors
    ///
    /// Returns [`ConfigError::NoPulumiProject`] if `name` is not present.
    pub fn get(&self, name: &str) -> Result<&PulumiProject, ConfigError> {
        self.projects
            .get(name)
            .ok_or_else(|| ConfigError::NoPulumiProject(name.to_string()))
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::NoPulumiProject`] if `name` is not present.
    pub fn get_mut(&mut self, name: &str) -> Result<&mut PulumiProject, ConfigError> {
        self.projects
            .get_mut(name)
            .ok_or_else(|| ConfigError::NoPulumiProject(name.to_string()))
    }

    /// Add a new project.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::PulumiProjectExists`] if `name` is taken.
    pub fn insert(&mut self, name: &str, project: PulumiProject) -> Result<(), ConfigError> {
        if self.projects.contains_key(name) {
            return Err(ConfigError::PulumiProjectExists(name.to_string()));
        }
        self.projects.insert(name.to_string(), project);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::NoPulumiProject`] if `name` is not present.
    pub fn remove(&mut self, name: &str) -> Result<PulumiProject, ConfigError> {
        self.projects
            .remove(name)
            .ok_or_else(|| ConfigError::NoPulumiProject(name.to_string()))
    }

    /// Return the named project, inserting an empty one first if needed.
    pub fn create_or_select_project(&mut self, name: &str) -> &mut PulumiProject {
        self.projects.entry(name.to_string()).or_default()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.projects.contains_key(name)
    }

    #[must_use]
    pub fn project_names(&self) -> Vec<&str> {
        self.projects.keys().map(String::as_str).collect()
    }
}

impl Document for PulumiConfig {
    const KIND: &'static str = "Pulumi";

    fn filename(&self) -> String {
        Self::FILENAME.to_string()
    }
}

// ── Engine values ────────────────────────────────────────────────────────────

/// Settings written to the engine's project file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectSettings {
    pub name: String,
    pub runtime: String,
    /// Directory containing the declarative program.
    pub main: PathBuf,
    pub backend_url: String,
}

/// Contents of the engine's per-stack settings file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StackSettings {
    #[serde(rename = "secretsprovider", default, skip_serializing_if = "Option::is_none")]
    pub secrets_provider: Option<String>,
    #[serde(rename = "encryptedkey", default, skip_serializing_if = "Option::is_none")]
    pub encrypted_key: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config: BTreeMap<String, serde_yaml::Value>,
}

/// A loaded stack: identity plus the environment handed to every engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stack {
    pub project_name: String,
    pub name: String,
    pub work_dir: PathBuf,
    pub env: Vec<(String, String)>,
}

impl Stack {
    /// Blob holding the engine's backup of this stack's state.
    #[must_use]
    pub fn backup_blob_name(&self) -> String {
        format!(".pulumi/stacks/{}/{}.json.bak", self.project_name, self.name)
    }
}

/// A configuration value as reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValue {
    pub value: String,
    pub secret: bool,
}

/// Flags passed to refresh/preview/up/destroy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationOptions {
    /// Limit on concurrent resource operations; `None` uses the engine default.
    pub parallel: Option<u32>,
    pub diff: bool,
    pub verbose: bool,
}

impl OperationOptions {
    #[must_use]
    pub fn serial(verbose: bool) -> Self {
        Self {
            parallel: Some(1),
            diff: false,
            verbose,
        }
    }
}

/// Outcome of an engine operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationSummary {
    /// `"succeeded"` on success; anything else is a failure.
    pub result: String,
    pub output: String,
}

impl OperationSummary {
    #[must_use]
    pub fn succeeded(output: impl Into<String>) -> Self {
        Self {
            result: "succeeded".to_string(),
            output: output.into(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result == "succeeded"
    }
}

/// A queued configuration option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOption {
    pub value: String,
    pub secret: bool,
    /// Overwrite an existing value (`set`) rather than only fill a gap (`ensure`).
    pub replace: bool,
}
