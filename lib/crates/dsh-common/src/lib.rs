//! Shared value types for the Data Safe Haven tooling.
//!
//! Every type here validates its input when constructed, whether from a
//! string (`FromStr`, used by clap) or from a YAML/JSON document (serde), so a
//! value that exists is always well formed.

pub mod enums;
pub mod naming;
pub mod types;

pub use enums::{DatabaseSystem, SoftwarePackageCategory};
pub use types::{
    AzureLocation, AzureVmSku, ConfigName, EmailAddress, Fqdn, Guid, IpAddress, TimeZone,
    UniqueList, ValidationError,
};
