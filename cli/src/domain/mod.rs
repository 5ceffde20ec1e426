//! Domain layer: pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod azure;
pub mod config;
pub mod context;
pub mod error;
pub mod pulumi;
pub mod retry;

pub use config::{Document, ShmConfig, SreConfig, sre_config_name};
pub use context::{BlobLocation, Context, ContextSettings};
pub use error::{AzureError, CommandError, ConfigError, PulumiError};
pub use pulumi::{PulumiConfig, PulumiProject, Stack};
pub use retry::DestroyRetryPolicy;
