//! Command implementations

pub mod config;
pub mod context;
pub mod deploy;
pub mod pulumi;
pub mod teardown;
