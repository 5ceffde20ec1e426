//! Configuration documents for SHM and SRE deployments.
//!
//! Pure functions only: no I/O, no async, no filesystem access.

use dsh_common::naming::sanitise_sre_name;
use dsh_common::{
    AzureLocation, AzureVmSku, ConfigName, DatabaseSystem, EmailAddress, Fqdn, Guid, IpAddress,
    SoftwarePackageCategory, TimeZone, UniqueList,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;

// ── Document trait ───────────────────────────────────────────────────────────

/// A YAML document persisted in the context's blob storage.
pub trait Document: Serialize + DeserializeOwned {
    /// Human-readable document kind used in error messages.
    const KIND: &'static str;

    /// Blob name under which this document is stored.
    fn filename(&self) -> String;

    /// Parse and validate a YAML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ParseYaml`] for malformed YAML,
    /// [`ConfigError::NotAMapping`] when the document is not a mapping, and
    /// [`ConfigError::Invalid`] when any field fails validation.
    fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let value: serde_yaml::Value =
            serde_yaml::from_str(yaml).map_err(|_| ConfigError::ParseYaml { kind: Self::KIND })?;
        if !value.is_mapping() {
            return Err(ConfigError::NotAMapping { kind: Self::KIND });
        }
        serde_yaml::from_value(value).map_err(|e| ConfigError::Invalid {
            kind: Self::KIND,
            reason: e.to_string(),
        })
    }

    /// Serialise to YAML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Serialise`] if serialisation fails.
    fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|_| ConfigError::Serialise { kind: Self::KIND })
    }
}

// ── Sections ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSectionAzure {
    pub location: AzureLocation,
    pub subscription_id: Guid,
    pub tenant_id: Guid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSectionShm {
    pub admin_group_id: Guid,
    pub entra_tenant_id: Guid,
    pub fqdn: Fqdn,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSubsectionRemoteDesktopOpts {
    #[serde(default)]
    pub allow_copy: bool,
    #[serde(default)]
    pub allow_paste: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSectionSre {
    pub admin_email_address: EmailAddress,
    #[serde(default)]
    pub admin_ip_addresses: Vec<IpAddress>,
    #[serde(default)]
    pub databases: UniqueList<DatabaseSystem>,
    #[serde(default)]
    pub data_provider_ip_addresses: Vec<IpAddress>,
    #[serde(default)]
    pub remote_desktop: ConfigSubsectionRemoteDesktopOpts,
    #[serde(default)]
    pub research_user_ip_addresses: Vec<IpAddress>,
    #[serde(default)]
    pub software_packages: SoftwarePackageCategory,
    #[serde(default)]
    pub timezone: TimeZone,
    #[serde(default)]
    pub workspace_skus: Vec<AzureVmSku>,
}

// ── SHM ──────────────────────────────────────────────────────────────────────

/// Settings for the management hub of a context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShmConfig {
    pub azure: ConfigSectionAzure,
    pub shm: ConfigSectionShm,
}

impl ShmConfig {
    pub const FILENAME: &'static str = "shm.yaml";

    /// Template with explanatory strings in place of every value.
    #[must_use]
    pub fn template() -> serde_yaml::Value {
        yaml_template(&[
            ("azure", azure_template()),
            (
                "shm",
                mapping(&[
                    (
                        "admin_group_id",
                        text("ID of a security group that contains all Azure infrastructure admins"),
                    ),
                    (
                        "entra_tenant_id",
                        text("Tenant ID for the Entra ID used to manage TRE users"),
                    ),
                    ("fqdn", text("Domain you want your users to belong to and where your TRE will be deployed")),
                ]),
            ),
        ])
    }

    /// Apply command-line overrides, returning a summary of the resulting values.
    pub fn update(&mut self, overrides: ShmOverrides) -> Vec<(&'static str, String)> {
        if let Some(id) = overrides.entra_tenant_id {
            self.shm.entra_tenant_id = id;
        }
        if let Some(fqdn) = overrides.fqdn {
            self.shm.fqdn = fqdn;
        }
        if let Some(location) = overrides.location {
            self.azure.location = location;
        }
        vec![
            ("Entra tenant ID", self.shm.entra_tenant_id.to_string()),
            ("Fully-qualified domain name", self.shm.fqdn.to_string()),
            ("Azure location", self.azure.location.to_string()),
        ]
    }
}

impl Document for ShmConfig {
    const KIND: &'static str = "SHM";

    fn filename(&self) -> String {
        Self::FILENAME.to_string()
    }
}

/// Optional values that replace fields of an [`ShmConfig`].
#[derive(Debug, Default)]
pub struct ShmOverrides {
    pub entra_tenant_id: Option<Guid>,
    pub fqdn: Option<Fqdn>,
    pub location: Option<AzureLocation>,
}

// ── SRE ──────────────────────────────────────────────────────────────────────

/// Construct the blob name for the SRE called `sre_name`.
#[must_use]
pub fn sre_config_name(sre_name: &str) -> String {
    format!("sre-{}.yaml", sanitise_sre_name(sre_name))
}

/// Settings for one secure research environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SreConfig {
    pub azure: ConfigSectionAzure,
    pub name: ConfigName,
    pub sre: ConfigSectionSre,
}

impl SreConfig {
    /// Template with explanatory strings in place of every value.
    #[must_use]
    pub fn template() -> serde_yaml::Value {
        yaml_template(&[
            ("azure", azure_template()),
            ("name", text("Name of this SRE deployment")),
            (
                "sre",
                mapping(&[
                    ("admin_email_address", text("Email address shared by all administrators")),
                    (
                        "admin_ip_addresses",
                        list("List of IP addresses belonging to administrators"),
                    ),
                    ("databases", list("List of database systems to deploy")),
                    (
                        "data_provider_ip_addresses",
                        list("List of IP addresses belonging to data providers"),
                    ),
                    (
                        "remote_desktop",
                        mapping(&[
                            (
                                "allow_copy",
                                text("True/False: whether to allow copying text out of the environment"),
                            ),
                            (
                                "allow_paste",
                                text("True/False: whether to allow pasting text into the environment"),
                            ),
                        ]),
                    ),
                    (
                        "research_user_ip_addresses",
                        list("List of IP addresses belonging to users"),
                    ),
                    (
                        "software_packages",
                        text("any/pre-approved/none: which packages from external repositories to allow"),
                    ),
                    ("timezone", text("Timezone in pytz format (eg. Europe/London)")),
                    (
                        "workspace_skus",
                        list("List of Azure VM SKUs - see cloudprice.net for list of valid SKUs"),
                    ),
                ]),
            ),
        ])
    }

    /// Apply command-line overrides, returning a summary of the resulting values.
    ///
    /// Duplicate databases are discarded; the returned flag reports whether
    /// any were dropped.
    pub fn update(&mut self, overrides: SreOverrides) -> (Vec<(&'static str, String)>, bool) {
        let sre = &mut self.sre;
        if let Some(email) = overrides.admin_email_address {
            sre.admin_email_address = email;
        }
        if !overrides.admin_ip_addresses.is_empty() {
            sre.admin_ip_addresses = overrides.admin_ip_addresses;
        }
        if overrides.allow_copy {
            sre.remote_desktop.allow_copy = true;
        }
        if overrides.allow_paste {
            sre.remote_desktop.allow_paste = true;
        }
        if !overrides.data_provider_ip_addresses.is_empty() {
            sre.data_provider_ip_addresses = overrides.data_provider_ip_addresses;
        }
        let mut dropped = false;
        if !overrides.databases.is_empty() {
            let mut databases = overrides.databases;
            databases.sort();
            let (unique, had_duplicates) = UniqueList::dedup_from(databases);
            sre.databases = unique;
            dropped = had_duplicates;
        }
        if let Some(category) = overrides.software_packages {
            sre.software_packages = category;
        }
        if let Some(timezone) = overrides.timezone {
            sre.timezone = timezone;
        }
        if !overrides.research_user_ip_addresses.is_empty() {
            sre.research_user_ip_addresses = overrides.research_user_ip_addresses;
        }
        if !overrides.workspace_skus.is_empty() {
            sre.workspace_skus = overrides.workspace_skus;
        }

        let summary = vec![
            ("Admin email address", sre.admin_email_address.to_string()),
            ("IP addresses used by administrators", join(&sre.admin_ip_addresses)),
            (
                "Copying text out of the SRE",
                allowed(sre.remote_desktop.allow_copy).to_string(),
            ),
            (
                "Pasting text into the SRE",
                allowed(sre.remote_desktop.allow_paste).to_string(),
            ),
            ("IP addresses used by data providers", join(&sre.data_provider_ip_addresses)),
            ("Databases available to users", join(sre.databases.as_slice())),
            ("Software packages installable from", sre.software_packages.to_string()),
            ("Timezone", sre.timezone.to_string()),
            ("IP addresses used by users", join(&sre.research_user_ip_addresses)),
            ("Workspace SKUs", join(&sre.workspace_skus)),
        ];
        (summary, dropped)
    }
}

impl Document for SreConfig {
    const KIND: &'static str = "SRE";

    fn filename(&self) -> String {
        sre_config_name(self.name.as_str())
    }
}

/// Optional values that replace fields of an [`SreConfig`].
///
/// Empty lists and `false` flags leave the stored value untouched.
#[derive(Debug, Default)]
pub struct SreOverrides {
    pub admin_email_address: Option<EmailAddress>,
    pub admin_ip_addresses: Vec<IpAddress>,
    pub allow_copy: bool,
    pub allow_paste: bool,
    pub data_provider_ip_addresses: Vec<IpAddress>,
    pub databases: Vec<DatabaseSystem>,
    pub research_user_ip_addresses: Vec<IpAddress>,
    pub software_packages: Option<SoftwarePackageCategory>,
    pub timezone: Option<TimeZone>,
    pub workspace_skus: Vec<AzureVmSku>,
}

// ── Template helpers ─────────────────────────────────────────────────────────

fn azure_template() -> serde_yaml::Value {
    mapping(&[
        ("location", text("Azure location where SRE resources will be deployed")),
        (
            "subscription_id",
            text("ID of the Azure subscription that the TRE will be deployed to"),
        ),
        (
            "tenant_id",
            text("Home tenant for the Azure account used to deploy infrastructure: `az account show`"),
        ),
    ])
}

fn yaml_template(entries: &[(&str, serde_yaml::Value)]) -> serde_yaml::Value {
    mapping(entries)
}

fn mapping(entries: &[(&str, serde_yaml::Value)]) -> serde_yaml::Value {
    let mut map = serde_yaml::Mapping::new();
    for (key, value) in entries {
        map.insert(serde_yaml::Value::from(*key), value.clone());
    }
    serde_yaml::Value::Mapping(map)
}

fn text(placeholder: &str) -> serde_yaml::Value {
    serde_yaml::Value::from(placeholder)
}

fn list(placeholder: &str) -> serde_yaml::Value {
    serde_yaml::Value::Sequence(vec![text(placeholder)])
}

fn join<T: std::fmt::Display>(items: &[T]) -> String {
    let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
    format!("[{}]", parts.join(", "))
}

fn allowed(flag: bool) -> &'static str {
    if flag { "allowed" } else { "forbidden" }
}

// ── Unit tests ───────────────────────────────────────────────────────────────
