//! Attach child entry point
//!
//! Reached only through the re-exec done by `attach`. Without the attach
//! credential in the environment it answers like any unknown subcommand.

use anyhow::{Context, Result};
use netweave_core::NetConfig;
use netweave_namespace::{ATTACH_AUTH_ENV, NSENTER_COMMAND};
use std::path::Path;

pub fn execute(config: &NetConfig, path: &Path, name: &str) -> Result<i32> {
    if std::env::var_os(ATTACH_AUTH_ENV).is_none_or(|v| v != "1") {
        eprintln!("error: unrecognized subcommand '{NSENTER_COMMAND}'");
        return Ok(2);
    }

    // Only returns on failure
    let never = netweave_namespace::enter_and_exec_shell(path, name, config)
        .with_context(|| format!("Failed to enter namespace {}", path.display()))?;
    match never {}
}
