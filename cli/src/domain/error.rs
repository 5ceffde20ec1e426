//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator. Callers that need to branch on a failure recover the
//! typed error with `anyhow::Error::downcast_ref`.

use std::fmt;

use thiserror::Error;

// ── External command errors ───────────────────────────────────────────────────

/// A `pulumi` or `az` invocation that exited unsuccessfully.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct CommandError {
    /// Program and leading subcommand, e.g. `pulumi destroy`.
    pub command: String,
    /// Exit code, or `None` if the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "command '{}' failed (code {code})", self.command)?,
            None => write!(f, "command '{}' failed (code none)", self.command)?,
        }
        write!(f, "\n stdout: {}\n stderr: {}", self.stdout.trim(), self.stderr.trim())
    }
}

impl CommandError {
    /// Whether `needle` appears anywhere in the command's output.
    #[must_use]
    pub fn mentions(&self, needle: &str) -> bool {
        self.stderr.contains(needle) || self.stdout.contains(needle)
    }
}

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors related to configuration documents and local settings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Could not parse {kind} configuration as YAML.")]
    ParseYaml { kind: &'static str },

    #[error("Unable to parse {kind} configuration as a dict.")]
    NotAMapping { kind: &'static str },

    #[error("Could not load {kind} configuration.\n{reason}")]
    Invalid { kind: &'static str, reason: String },

    #[error("Could not serialise {kind} configuration.")]
    Serialise { kind: &'static str },

    #[error("No configuration for DSH Pulumi Project {0}.")]
    NoPulumiProject(String),

    #[error("Stack {0} already exists.")]
    PulumiProjectExists(String),

    #[error("No context selected. Use `dsh context switch` to select one.")]
    NoContextSelected,

    #[error("Context '{0}' is not defined.")]
    UnknownContext(String),

    #[error("Context '{0}' already exists.")]
    ContextExists(String),
}

// ── Azure errors ──────────────────────────────────────────────────────────────

/// Errors reported by the cloud API wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AzureError {
    #[error("Blob '{0}' does not exist.")]
    BlobNotFound(String),

    #[error("{kind} '{name}' was not created.")]
    NotCreated { kind: &'static str, name: String },

    #[error("Could not parse Azure CLI output for {0}.")]
    UnexpectedOutput(String),
}

// ── Pulumi errors ─────────────────────────────────────────────────────────────

/// Errors raised by the stack lifecycle manager.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PulumiError {
    #[error("No SHM/SRE named {0} is defined.")]
    ProjectNotDefined(String),

    #[error("Stack encrypted key does not match project encrypted key")]
    EncryptedKeyMismatch,

    #[error("Pulumi operation failed.")]
    OperationFailed,

    #[error("Secret '{0}' was not found.")]
    SecretNotFound(String),

    #[error("No output named '{0}' was found.")]
    OutputNotFound(String),
}
