//! Retry policy for stack destruction.

use std::time::Duration;

use crate::domain::error::CommandError;

/// Engine error substrings that mean "a dependent resource is still being
/// removed; try again".
pub const TRANSIENT_DESTROY_ERRORS: &[&str] = &[
    "Linked Service is used by a solution",
    "NetworkProfileAlreadyInUseWithContainerNics",
    "InUseSubnetCannotBeDeleted",
];

/// Retry the whole destroy call, indefinitely, while the failure is transient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestroyRetryPolicy {
    pub backoff: Duration,
    pub transient: &'static [&'static str],
}

impl Default for DestroyRetryPolicy {
    fn default() -> Self {
        Self {
            backoff: Duration::from_secs(10),
            transient: TRANSIENT_DESTROY_ERRORS,
        }
    }
}

impl DestroyRetryPolicy {
    /// Whether `err` is a failed engine command mentioning a transient error.
    #[must_use]
    pub fn is_transient(&self, err: &anyhow::Error) -> bool {
        err.chain()
            .filter_map(|cause| cause.downcast_ref::<CommandError>())
            .any(|cmd| self.transient.iter().any(|needle| cmd.mentions(needle)))
    }
}
