//! Attach command implementation

use anyhow::{Context, Result};
use netweave_fabric::ContainerManager;

use super::{exit_code, require_root};

pub fn execute(manager: &ContainerManager, ident: &str) -> Result<i32> {
    let container = manager
        .find(ident)
        .with_context(|| format!("No such container: {ident}"))?;

    require_root("attach")?;

    tracing::debug!(container = %container.name, "Attaching");

    let status = manager
        .attach(&container)
        .with_context(|| format!("Failed to attach to '{}'", container.name))?;

    Ok(exit_code(status))
}
