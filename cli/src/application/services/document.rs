//! Application service: configuration documents in the context's blob
//! storage.

use anyhow::{Context as _, Result};
use similar::{ChangeTag, TextDiff};

use crate::application::ports::BlobStorage;
use crate::domain::config::Document;
use crate::domain::context::Context;
use crate::domain::error::AzureError;

/// Whether a blob named `filename` exists in the config container.
///
/// # Errors
///
/// Fails if the storage account cannot be queried.
pub async fn remote_exists(blobs: &impl BlobStorage, context: &Context, filename: &str) -> Result<bool> {
    blobs.blob_exists(&context.config_blobs(), filename).await
}

/// Download and validate a document.
///
/// # Errors
///
/// Fails if the blob is missing or does not validate as `D`.
pub async fn load_remote<D: Document>(
    blobs: &impl BlobStorage,
    context: &Context,
    filename: &str,
) -> Result<D> {
    let yaml = blobs
        .download_blob(&context.config_blobs(), filename)
        .await
        .with_context(|| format!("Could not download {} configuration.", D::KIND))?;
    Ok(D::from_yaml(&yaml)?)
}

/// Download a document if present, otherwise return `None`.
///
/// # Errors
///
/// Fails if the blob exists but cannot be read or validated.
pub async fn load_remote_or_none<D: Document>(
    blobs: &impl BlobStorage,
    context: &Context,
    filename: &str,
) -> Result<Option<D>> {
    match blobs.download_blob(&context.config_blobs(), filename).await {
        Ok(yaml) => Ok(Some(D::from_yaml(&yaml)?)),
        Err(err) if matches!(err.downcast_ref::<AzureError>(), Some(AzureError::BlobNotFound(_))) => {
            Ok(None)
        }
        Err(err) => Err(err.context(format!("Could not download {} configuration.", D::KIND))),
    }
}

/// Serialise and upload a document under its own filename.
///
/// # Errors
///
/// Fails if serialisation or upload fails.
pub async fn upload<D: Document>(blobs: &impl BlobStorage, context: &Context, document: &D) -> Result<()> {
    let yaml = document.to_yaml()?;
    blobs
        .upload_blob(&context.config_blobs(), &document.filename(), &yaml)
        .await
        .with_context(|| format!("Could not upload {} configuration.", D::KIND))
}

/// Unified diff from the remote copy of `document` to the local one.
///
/// Returns an empty list when they are identical. Both sides are
/// re-serialised so formatting differences do not count as changes.
///
/// # Errors
///
/// Fails if the remote copy cannot be loaded.
pub async fn remote_yaml_diff<D: Document>(
    blobs: &impl BlobStorage,
    context: &Context,
    document: &D,
) -> Result<Vec<String>> {
    let remote: D = load_remote(blobs, context, &document.filename()).await?;
    Ok(yaml_diff(&remote.to_yaml()?, &document.to_yaml()?))
}

/// Line diff between two YAML texts, each line prefixed with `+`, `-` or ` `.
#[must_use]
pub fn yaml_diff(old: &str, new: &str) -> Vec<String> {
    if old == new {
        return Vec::new();
    }
    TextDiff::from_lines(old, new)
        .iter_all_changes()
        .map(|change| {
            let sign = match change.tag() {
                ChangeTag::Delete => "-",
                ChangeTag::Insert => "+",
                ChangeTag::Equal => " ",
            };
            format!("{sign}{}", change.value().trim_end_matches('\n'))
        })
        .collect()
}
