use std::fmt;

use serde::{Deserialize, Serialize};

/// Database engines that can be offered to SRE users.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum DatabaseSystem {
    MicrosoftSqlServer,
    Postgresql,
}

impl DatabaseSystem {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MicrosoftSqlServer => "microsoft-sql-server",
            Self::Postgresql => "postgresql",
        }
    }
}

impl fmt::Display for DatabaseSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which packages users may install from external repositories.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum SoftwarePackageCategory {
    Any,
    PreApproved,
    #[default]
    None,
}

impl SoftwarePackageCategory {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::PreApproved => "pre-approved",
            Self::None => "none",
        }
    }
}

impl fmt::Display for SoftwarePackageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
