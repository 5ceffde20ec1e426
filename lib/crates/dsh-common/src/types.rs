use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use ipnet::Ipv4Net;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Reasons a value was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Expected GUID, for example '3d4c1a2e-7b4f-4c3e-9f1a-2b3c4d5e6f70', got '{0}'.")]
    Guid(String),

    #[error("Expected valid email address, for example 'sherlock@holmes.com', got '{0}'.")]
    Email(String),

    #[error("Expected valid IPv4 address or CIDR range, for example '1.2.3.4' or '1.2.3.0/24', got '{0}'.")]
    IpAddress(String),

    #[error("Expected valid fully qualified domain name, for example 'example.com', got '{0}'.")]
    Fqdn(String),

    #[error("Expected valid Azure location, for example 'uksouth', got '{0}'.")]
    AzureLocation(String),

    #[error("Expected valid Azure VM SKU, for example 'Standard_D2s_v4', got '{0}'.")]
    AzureVmSku(String),

    #[error("Expected valid timezone, for example 'Europe/London', got '{0}'.")]
    TimeZone(String),

    #[error("Expected valid name of 1-64 lowercase letters, digits or hyphens, got '{0}'.")]
    ConfigName(String),

    #[error("All items must be unique.")]
    NotUnique,
}

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("static regex")
});
static LOCATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]+[0-9]?[a-z]*$").expect("static regex"));
static VM_SKU_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(Standard|Basic)_\w+$").expect("static regex"));
static CONFIG_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9-]{1,64}$").expect("static regex"));

/// Declares a string newtype whose only constructor is a validating parser.
macro_rules! validated_string {
    ($(#[$meta:meta])* $name:ident, $parse:path) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Borrow the normalised string form.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $parse(s).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

validated_string!(
    /// A hyphenated GUID, stored lowercase.
    Guid,
    parse_guid
);
validated_string!(
    /// An email address.
    EmailAddress,
    parse_email
);
validated_string!(
    /// An IPv4 network in CIDR form. Bare addresses are normalised to `/32`.
    IpAddress,
    parse_ip_address
);
validated_string!(
    /// A fully qualified domain name, stored lowercase.
    Fqdn,
    parse_fqdn
);
validated_string!(
    /// An Azure region name such as `uksouth`.
    AzureLocation,
    parse_location
);
validated_string!(
    /// An Azure virtual machine SKU such as `Standard_D2s_v4`.
    AzureVmSku,
    parse_vm_sku
);
validated_string!(
    /// An IANA timezone name.
    TimeZone,
    parse_timezone
);
validated_string!(
    /// The name of a deployable component.
    ConfigName,
    parse_config_name
);

fn parse_guid(s: &str) -> Result<String, ValidationError> {
    let trimmed = s.trim();
    // Uuid also accepts simple and braced forms; documents must be hyphenated.
    if trimmed.len() != 36 {
        return Err(ValidationError::Guid(s.to_string()));
    }
    uuid::Uuid::parse_str(trimmed)
        .map(|id| id.hyphenated().to_string())
        .map_err(|_| ValidationError::Guid(s.to_string()))
}

fn parse_email(s: &str) -> Result<String, ValidationError> {
    let trimmed = s.trim();
    if EMAIL_RE.is_match(trimmed) {
        Ok(trimmed.to_string())
    } else {
        Err(ValidationError::Email(s.to_string()))
    }
}

fn parse_ip_address(s: &str) -> Result<String, ValidationError> {
    let trimmed = s.trim();
    let net = if trimmed.contains('/') {
        trimmed
            .parse::<Ipv4Net>()
            .map_err(|_| ValidationError::IpAddress(s.to_string()))?
    } else {
        let addr = trimmed
            .parse::<std::net::Ipv4Addr>()
            .map_err(|_| ValidationError::IpAddress(s.to_string()))?;
        Ipv4Net::from(addr)
    };
    // Host bits set means this is an address inside a range, not a range.
    if net.trunc() != net {
        return Err(ValidationError::IpAddress(s.to_string()));
    }
    Ok(net.to_string())
}

fn parse_fqdn(s: &str) -> Result<String, ValidationError> {
    let candidate = s.trim().trim_end_matches('.').to_ascii_lowercase();
    let err = || ValidationError::Fqdn(s.to_string());
    if candidate.is_empty() || candidate.len() > 253 {
        return Err(err());
    }
    let labels: Vec<&str> = candidate.split('.').collect();
    if labels.len() < 2 {
        return Err(err());
    }
    for label in &labels {
        let valid = !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !valid {
            return Err(err());
        }
    }
    if labels
        .last()
        .is_some_and(|tld| !tld.chars().all(|c| c.is_ascii_alphabetic()))
    {
        return Err(err());
    }
    Ok(candidate)
}

fn parse_location(s: &str) -> Result<String, ValidationError> {
    if LOCATION_RE.is_match(s) {
        Ok(s.to_string())
    } else {
        Err(ValidationError::AzureLocation(s.to_string()))
    }
}

fn parse_vm_sku(s: &str) -> Result<String, ValidationError> {
    if VM_SKU_RE.is_match(s) {
        Ok(s.to_string())
    } else {
        Err(ValidationError::AzureVmSku(s.to_string()))
    }
}

fn parse_timezone(s: &str) -> Result<String, ValidationError> {
    s.parse::<chrono_tz::Tz>()
        .map(|tz| tz.name().to_string())
        .map_err(|_| ValidationError::TimeZone(s.to_string()))
}

fn parse_config_name(s: &str) -> Result<String, ValidationError> {
    if CONFIG_NAME_RE.is_match(s) {
        Ok(s.to_string())
    } else {
        Err(ValidationError::ConfigName(s.to_string()))
    }
}

impl Default for TimeZone {
    fn default() -> Self {
        Self("Etc/UTC".to_string())
    }
}

// ── UniqueList ───────────────────────────────────────────────────────────────

/// A list whose items are pairwise distinct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct UniqueList<T>(Vec<T>);

impl<T: PartialEq> UniqueList<T> {
    /// Build a list, rejecting duplicates.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::NotUnique`] if any item appears twice.
    pub fn new(items: Vec<T>) -> Result<Self, ValidationError> {
        for (i, item) in items.iter().enumerate() {
            if items[..i].contains(item) {
                return Err(ValidationError::NotUnique);
            }
        }
        Ok(Self(items))
    }

    /// Build a list, silently dropping later duplicates.
    ///
    /// Returns the list and whether anything was dropped.
    #[must_use]
    pub fn dedup_from(items: Vec<T>) -> (Self, bool) {
        let original = items.len();
        let mut kept: Vec<T> = Vec::with_capacity(original);
        for item in items {
            if !kept.contains(&item) {
                kept.push(item);
            }
        }
        let dropped = kept.len() != original;
        (Self(kept), dropped)
    }
}

impl<T> UniqueList<T> {
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.0.iter()
    }
}

impl<T> Default for UniqueList<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<'de, T: Deserialize<'de> + PartialEq> Deserialize<'de> for UniqueList<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let items = Vec::<T>::deserialize(deserializer)?;
        Self::new(items).map_err(serde::de::Error::custom)
    }
}

impl<'a, T> IntoIterator for &'a UniqueList<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
