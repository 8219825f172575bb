//! Exec command implementation

use anyhow::{Context, Result};
use netweave_fabric::ContainerManager;

use super::{exit_code, require_root};

pub fn execute(manager: &ContainerManager, ident: &str, command: &[String]) -> Result<i32> {
    let container = manager
        .find(ident)
        .with_context(|| format!("No such container: {ident}"))?;

    require_root("exec")?;

    tracing::debug!(container = %container.name, command = ?command, "Executing");

    let status = manager
        .exec(&container, command)
        .with_context(|| format!("Failed to run {:?} in '{}'", command, container.name))?;

    Ok(exit_code(status))
}
