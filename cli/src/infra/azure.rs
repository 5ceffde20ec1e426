//! Infrastructure implementation of the cloud ports.
//!
//! `AzureCli<R>` routes every call through the `az` command-line tool.
//! Resource creation is idempotent: each `ensure_*` looks the resource up
//! first and only creates it when missing. Blob operations authenticate with
//! the storage account key, which is read once per account and cached.

use std::collections::BTreeMap;
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::application::ports::{BlobStorage, CommandRunner, KeyVaultRequest, ResourceManager};
use crate::domain::azure::{
    KeyVault, KeyVaultKey, ManagedIdentity, ResourceGroup, StorageAccount, Subscription,
};
use crate::domain::context::BlobLocation;
use crate::domain::error::{AzureError, CommandError};
use crate::infra::command_runner::checked;

const AZ: &str = "az";

/// Substrings the CLI prints when a blob is missing.
const BLOB_MISSING: &[&str] = &["BlobNotFound", "The specified blob does not exist"];

#[derive(Deserialize)]
struct Exists {
    exists: bool,
}

#[derive(Deserialize)]
struct KeyBundle {
    key: KeyId,
}

#[derive(Deserialize)]
struct KeyId {
    kid: String,
}

/// Infrastructure adapter that routes all `az` calls through a `CommandRunner`.
///
/// Generic over `R: CommandRunner` so that tests can inject a mock runner
/// without spawning real processes.
pub struct AzureCli<R: CommandRunner> {
    runner: R,
    subscription: String,
    account_keys: Mutex<BTreeMap<String, String>>,
}

impl<R: CommandRunner> AzureCli<R> {
    #[must_use]
    pub fn new(runner: R, subscription: &str) -> Self {
        Self {
            runner,
            subscription: subscription.to_string(),
            account_keys: Mutex::new(BTreeMap::new()),
        }
    }

    /// Run `az <args> --subscription <name> --only-show-errors`.
    async fn az(&self, args: &[&str]) -> Result<String> {
        let mut full: Vec<&str> = args.to_vec();
        full.extend(["--subscription", self.subscription.as_str(), "--only-show-errors"]);
        let output = self.runner.run(AZ, &full).await?;
        let label = format!("{AZ} {}", args.iter().take(3).copied().collect::<Vec<_>>().join(" "));
        Ok(checked(&label, &output)?)
    }

    /// Like [`Self::az`] but parse stdout as JSON.
    async fn az_json<T: DeserializeOwned>(&self, what: &str, args: &[&str]) -> Result<T> {
        let mut full: Vec<&str> = args.to_vec();
        full.extend(["--output", "json"]);
        let stdout = self.az(&full).await?;
        serde_json::from_str(&stdout).map_err(|_| AzureError::UnexpectedOutput(what.to_string()).into())
    }

    async fn account_key(&self, location: &BlobLocation) -> Result<String> {
        if let Some(key) = self
            .account_keys
            .lock()
            .ok()
            .and_then(|keys| keys.get(&location.storage_account).cloned())
        {
            return Ok(key);
        }
        let key = self
            .az(&[
                "storage",
                "account",
                "keys",
                "list",
                "--account-name",
                &location.storage_account,
                "--resource-group",
                &location.resource_group,
                "--query",
                "[0].value",
                "--output",
                "tsv",
            ])
            .await
            .with_context(|| format!("cannot read keys for {}", location.storage_account))?
            .trim()
            .to_string();
        if let Ok(mut keys) = self.account_keys.lock() {
            keys.insert(location.storage_account.clone(), key.clone());
        }
        Ok(key)
    }

    /// Run a blob command, mapping "blob missing" output to
    /// [`AzureError::BlobNotFound`].
    async fn blob_command(
        &self,
        location: &BlobLocation,
        blob_name: &str,
        verb: &str,
        extra: &[&str],
    ) -> Result<String> {
        let key = self.account_key(location).await?;
        let mut args = vec![
            "storage",
            "blob",
            verb,
            "--account-name",
            location.storage_account.as_str(),
            "--account-key",
            key.as_str(),
            "--container-name",
            location.container.as_str(),
            "--name",
            blob_name,
        ];
        args.extend_from_slice(extra);
        match self.az(&args).await {
            Ok(stdout) => Ok(stdout),
            Err(err) if is_blob_missing(&err) => Err(AzureError::BlobNotFound(blob_name.to_string()).into()),
            Err(err) => Err(err),
        }
    }
}

fn is_blob_missing(err: &anyhow::Error) -> bool {
    err.downcast_ref::<CommandError>()
        .is_some_and(|cmd| BLOB_MISSING.iter().any(|needle| cmd.mentions(needle)))
}

fn tag_args(tags: &[(String, String)]) -> Vec<String> {
    tags.iter().map(|(k, v)| format!("{k}={v}")).collect()
}

impl<R: CommandRunner> BlobStorage for AzureCli<R> {
    async fn blob_exists(&self, location: &BlobLocation, blob_name: &str) -> Result<bool> {
        let stdout = self
            .blob_command(location, blob_name, "exists", &["--output", "json"])
            .await?;
        let parsed: Exists = serde_json::from_str(&stdout)
            .map_err(|_| AzureError::UnexpectedOutput("storage blob exists".to_string()))?;
        Ok(parsed.exists)
    }

    async fn download_blob(&self, location: &BlobLocation, blob_name: &str) -> Result<String> {
        let dir = tempfile::tempdir().context("cannot create download directory")?;
        let path = dir.path().join("blob");
        let path_str = path.to_string_lossy().into_owned();
        self.blob_command(
            location,
            blob_name,
            "download",
            &["--file", &path_str, "--output", "none"],
        )
        .await?;
        debug!(blob = blob_name, container = %location.container, "downloaded blob");
        std::fs::read_to_string(&path).with_context(|| format!("cannot read downloaded blob {blob_name}"))
    }

    async fn upload_blob(&self, location: &BlobLocation, blob_name: &str, contents: &str) -> Result<()> {
        let dir = tempfile::tempdir().context("cannot create upload directory")?;
        let path = dir.path().join("blob");
        std::fs::write(&path, contents).context("cannot stage blob for upload")?;
        let path_str = path.to_string_lossy().into_owned();
        self.blob_command(
            location,
            blob_name,
            "upload",
            &["--file", &path_str, "--overwrite", "--output", "none"],
        )
        .await?;
        info!(blob = blob_name, container = %location.container, "uploaded blob");
        Ok(())
    }

    async fn remove_blob(&self, location: &BlobLocation, blob_name: &str) -> Result<()> {
        self.blob_command(location, blob_name, "delete", &["--output", "none"])
            .await?;
        info!(blob = blob_name, container = %location.container, "removed blob");
        Ok(())
    }

    async fn storage_account_key(&self, location: &BlobLocation) -> Result<String> {
        self.account_key(location).await
    }
}

impl<R: CommandRunner> ResourceManager for AzureCli<R> {
    async fn subscription(&self) -> Result<Subscription> {
        self.az_json("account show", &["account", "show"]).await
    }

    async fn ensure_resource_group(
        &self,
        name: &str,
        location: &str,
        tags: &[(String, String)],
    ) -> Result<ResourceGroup> {
        let tags = tag_args(tags);
        let mut args = vec!["group", "create", "--name", name, "--location", location, "--tags"];
        args.extend(tags.iter().map(String::as_str));
        let group: ResourceGroup = self.az_json("group create", &args).await?;
        info!(resource_group = %group.name, "ensured resource group");
        Ok(group)
    }

    async fn remove_resource_group(&self, name: &str) -> Result<()> {
        let exists = self.az(&["group", "exists", "--name", name]).await?;
        if exists.trim() != "true" {
            info!(resource_group = name, "resource group does not exist");
            return Ok(());
        }
        self.az(&["group", "delete", "--name", name, "--yes"]).await?;
        info!(resource_group = name, "removed resource group");
        Ok(())
    }

    async fn ensure_managed_identity(
        &self,
        name: &str,
        resource_group: &str,
        location: &str,
    ) -> Result<ManagedIdentity> {
        let identity: ManagedIdentity = self
            .az_json(
                "identity create",
                &[
                    "identity",
                    "create",
                    "--name",
                    name,
                    "--resource-group",
                    resource_group,
                    "--location",
                    location,
                ],
            )
            .await?;
        info!(identity = %identity.name, "ensured managed identity");
        Ok(identity)
    }

    async fn ensure_storage_account(
        &self,
        name: &str,
        resource_group: &str,
        location: &str,
        tags: &[(String, String)],
    ) -> Result<StorageAccount> {
        if let Ok(account) = self
            .az_json::<StorageAccount>(
                "storage account show",
                &["storage", "account", "show", "--name", name, "--resource-group", resource_group],
            )
            .await
        {
            debug!(storage_account = name, "storage account exists");
            return Ok(account);
        }
        let tags = tag_args(tags);
        let mut args = vec![
            "storage",
            "account",
            "create",
            "--name",
            name,
            "--resource-group",
            resource_group,
            "--location",
            location,
            "--kind",
            "StorageV2",
            "--sku",
            "Standard_LRS",
            "--min-tls-version",
            "TLS1_2",
            "--allow-blob-public-access",
            "false",
            "--tags",
        ];
        args.extend(tags.iter().map(String::as_str));
        let account: StorageAccount = self.az_json("storage account create", &args).await?;
        info!(storage_account = %account.name, "created storage account");
        Ok(account)
    }

    async fn ensure_storage_blob_container(
        &self,
        container: &str,
        resource_group: &str,
        storage_account: &str,
    ) -> Result<()> {
        let exists: Exists = self
            .az_json(
                "storage container-rm exists",
                &[
                    "storage",
                    "container-rm",
                    "exists",
                    "--name",
                    container,
                    "--storage-account",
                    storage_account,
                    "--resource-group",
                    resource_group,
                ],
            )
            .await?;
        if !exists.exists {
            self.az(&[
                "storage",
                "container-rm",
                "create",
                "--name",
                container,
                "--storage-account",
                storage_account,
                "--resource-group",
                resource_group,
                "--public-access",
                "off",
                "--output",
                "none",
            ])
            .await?;
        }
        info!(container, storage_account, "ensured blob container");
        Ok(())
    }

    async fn ensure_keyvault(
        &self,
        request: &KeyVaultRequest<'_>,
        identity: &ManagedIdentity,
    ) -> Result<KeyVault> {
        let vault = match self
            .az_json::<KeyVault>(
                "keyvault show",
                &["keyvault", "show", "--name", request.name, "--resource-group", request.resource_group],
            )
            .await
        {
            Ok(vault) => vault,
            Err(_) => {
                let tags = tag_args(request.tags);
                let mut args = vec![
                    "keyvault",
                    "create",
                    "--name",
                    request.name,
                    "--resource-group",
                    request.resource_group,
                    "--location",
                    request.location,
                    "--sku",
                    "standard",
                    "--enable-rbac-authorization",
                    "false",
                    "--enable-purge-protection",
                    "true",
                    "--tags",
                ];
                args.extend(tags.iter().map(String::as_str));
                self.az_json("keyvault create", &args).await?
            }
        };
        for (object_id, permissions) in [
            (request.admin_group_id, "all"),
            (identity.principal_id.as_str(), "get list"),
        ] {
            let mut args = vec!["keyvault", "set-policy", "--name", vault.name.as_str(), "--object-id", object_id];
            for kind in ["--key-permissions", "--secret-permissions", "--certificate-permissions"] {
                args.push(kind);
                args.extend(permissions.split(' '));
            }
            args.extend(["--output", "none"]);
            self.az(&args).await?;
        }
        info!(key_vault = %vault.name, "ensured key vault");
        Ok(vault)
    }

    async fn ensure_keyvault_key(&self, key_name: &str, key_vault: &str) -> Result<KeyVaultKey> {
        let show = self
            .az_json::<KeyBundle>(
                "keyvault key show",
                &["keyvault", "key", "show", "--vault-name", key_vault, "--name", key_name],
            )
            .await;
        let bundle = match show {
            Ok(bundle) => bundle,
            Err(_) => {
                self.az_json(
                    "keyvault key create",
                    &[
                        "keyvault",
                        "key",
                        "create",
                        "--vault-name",
                        key_vault,
                        "--name",
                        key_name,
                        "--kty",
                        "RSA",
                        "--size",
                        "2048",
                    ],
                )
                .await?
            }
        };
        info!(key = key_name, key_vault, "ensured key vault key");
        Ok(KeyVaultKey {
            name: key_name.to_string(),
            kid: bundle.key.kid,
        })
    }
}
