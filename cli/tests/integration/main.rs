//! Integration tests for the dsh CLI
//!
//! These tests spawn the actual binary and test end-to-end behavior.
//! None of them reach Azure: they cover argument parsing, templates and the
//! local contexts file.

mod config_command;
mod context_command;
